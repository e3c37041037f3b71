#![cfg(target_arch = "wasm32")]

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use changelog_core::{
    resolve_config, ChangelogEntry, ConfigOverrides, HandlerId, ScriptAttributes, WidgetConfig,
    WidgetError,
};
use changelog_ui::{run_load, Controller, LoadTicket, WidgetHooks};
use js_sys::{Array, Function, Object, Reflect};
use log::LevelFilter;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, Window};

use crate::bridge;
use crate::client::HttpChangelogClient;
use crate::dom::{EventSink, ShadowTarget, TargetEvent};
use crate::logger;
use crate::storage::LocalStorageStore;

pub const GLOBAL_CONFIG_NAME: &str = "SignalboardChangelogConfig";
const SCRIPT_SELECTOR: &str = "script[data-public-key]";

pub type WidgetController = Controller<ShadowTarget, LocalStorageStore>;
pub type SharedController = Rc<RefCell<WidgetController>>;

struct WidgetInner {
    controller: SharedController,
    client: Rc<HttpChangelogClient>,
    handler: Cell<Option<HandlerId>>,
}

/// Handle returned to JavaScript and exposed as `Signalboard.changelogWidget`.
#[wasm_bindgen]
#[derive(Clone)]
pub struct ChangelogWidget {
    inner: Rc<WidgetInner>,
}

#[wasm_bindgen]
impl ChangelogWidget {
    pub fn open(&self) {
        self.with_controller(WidgetController::open);
    }

    pub fn close(&self) {
        self.with_controller(WidgetController::close);
    }

    pub fn toggle(&self) {
        self.with_controller(WidgetController::toggle);
    }

    pub fn retry(&self) {
        if let Some(Some(ticket)) = self.with_controller(WidgetController::retry) {
            spawn_load(&self.inner.controller, &self.inner.client, ticket);
        }
    }

    #[wasm_bindgen(js_name = markAsRead)]
    pub fn mark_as_read(&self) {
        self.with_controller(WidgetController::mark_all_as_read);
    }

    #[wasm_bindgen(js_name = unreadCount)]
    pub fn unread_count(&self) -> u32 {
        self.inner
            .controller
            .try_borrow()
            .map(|controller| controller.unread_count() as u32)
            .unwrap_or(0)
    }

    #[wasm_bindgen(getter, js_name = publicKey)]
    pub fn public_key(&self) -> String {
        self.inner
            .controller
            .try_borrow()
            .map(|controller| controller.config().public_key.clone())
            .unwrap_or_default()
    }

    /// Removes the widget from the page and unregisters its command handler.
    pub fn destroy(&self) {
        self.with_controller(WidgetController::destroy);
        if let Some(id) = self.inner.handler.take() {
            if let Err(err) = bridge::uninstall(id) {
                log::warn!("could not update Signalboard.changelogWidget: {err:?}");
            }
        }
    }
}

impl ChangelogWidget {
    fn with_controller<R>(&self, f: impl FnOnce(&mut WidgetController) -> R) -> Option<R> {
        match self.inner.controller.try_borrow_mut() {
            Ok(mut controller) => Some(f(&mut controller)),
            Err(_) => {
                log::warn!("changelog widget busy, call ignored");
                None
            }
        }
    }
}

fn spawn_load(controller: &SharedController, client: &Rc<HttpChangelogClient>, ticket: LoadTicket) {
    let controller = Rc::clone(controller);
    let client = Rc::clone(client);
    spawn_local(async move {
        let outcome = run_load(&controller, client.as_ref(), ticket).await;
        log::debug!("changelog load finished: {outcome:?}");
    });
}

fn event_sink(controller: Weak<RefCell<WidgetController>>, client: Rc<HttpChangelogClient>) -> EventSink {
    Rc::new(move |event: TargetEvent| {
        let Some(controller) = controller.upgrade() else {
            return;
        };
        let ticket = match controller.try_borrow_mut() {
            Ok(mut ctrl) => match event {
                TargetEvent::Action(action) => ctrl.handle_action(action),
                TargetEvent::TriggerClick(anchor) => {
                    ctrl.toggle_at(anchor);
                    None
                }
            },
            Err(_) => {
                log::warn!("changelog widget busy, dropping {event:?}");
                None
            }
        };
        if let Some(ticket) = ticket {
            spawn_load(&controller, &client, ticket);
        }
    })
}

/// Queues a host callback so it never runs while the controller is borrowed.
fn deferred(callback: Function) -> Box<dyn FnMut()> {
    Box::new(move || {
        let callback = callback.clone();
        spawn_local(async move {
            if let Err(err) = callback.call0(&JsValue::UNDEFINED) {
                log::warn!("changelog callback threw: {err:?}");
            }
        });
    })
}

fn deferred_entry(callback: Function) -> Box<dyn FnMut(&ChangelogEntry)> {
    Box::new(move |entry: &ChangelogEntry| {
        let payload = match to_value(entry) {
            Ok(payload) => payload,
            Err(err) => {
                log::warn!("could not pass entry to onEntryClick: {err}");
                return;
            }
        };
        let callback = callback.clone();
        spawn_local(async move {
            if let Err(err) = callback.call1(&JsValue::UNDEFINED, &payload) {
                log::warn!("onEntryClick threw: {err:?}");
            }
        });
    })
}

fn function_property(object: &JsValue, name: &str) -> Option<Function> {
    Reflect::get(object, &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.dyn_into::<Function>().ok())
}

fn read_hooks(config_object: &JsValue) -> WidgetHooks {
    if !config_object.is_object() {
        return WidgetHooks::default();
    }
    WidgetHooks {
        on_open: function_property(config_object, "onOpen").map(deferred),
        on_close: function_property(config_object, "onClose").map(deferred),
        on_entry_click: function_property(config_object, "onEntryClick").map(deferred_entry),
    }
}

/// Copies the plain-data fields of a config object, leaving callbacks behind.
fn read_overrides(config_object: &JsValue) -> Result<Option<ConfigOverrides>, JsValue> {
    if config_object.is_undefined() || config_object.is_null() {
        return Ok(None);
    }
    let Some(object) = config_object.dyn_ref::<Object>() else {
        log::warn!("{GLOBAL_CONFIG_NAME} is not an object, ignoring it");
        return Ok(None);
    };
    let data = Object::new();
    for entry in Object::entries(object).iter() {
        let pair = entry.unchecked_into::<Array>();
        let value = pair.get(1);
        if value.is_function() {
            continue;
        }
        Reflect::set(&data, &pair.get(0), &value)?;
    }
    match from_value::<ConfigOverrides>(data.into()) {
        Ok(overrides) => Ok(Some(overrides)),
        Err(err) => {
            log::warn!("ignoring unreadable {GLOBAL_CONFIG_NAME}: {err}");
            Ok(None)
        }
    }
}

fn read_script_attributes(document: &Document) -> Option<ScriptAttributes> {
    let script = document.query_selector(SCRIPT_SELECTOR).ok().flatten()?;
    let attrs = script
        .get_attribute_names()
        .iter()
        .filter_map(|name| name.as_string())
        .filter(|name| name.starts_with("data-"))
        .filter_map(|name| {
            let value = script.get_attribute(&name)?;
            Some((name, value))
        })
        .collect::<ScriptAttributes>();
    Some(attrs)
}

fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("window is unavailable"))
}

fn format_widget_error(err: WidgetError) -> JsValue {
    JsValue::from_str(&format!("Signalboard changelog: {err}"))
}

fn mount(window: &Window, config: WidgetConfig, hooks: WidgetHooks) -> Result<ChangelogWidget, JsValue> {
    if config.debug {
        logger::raise_level(LevelFilter::Debug);
    }
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("document is unavailable"))?;
    let client = Rc::new(HttpChangelogClient::new(&config));
    let public_key = config.public_key.clone();

    let controller: SharedController = Rc::new_cyclic(|weak| {
        let sink = event_sink(weak.clone(), Rc::clone(&client));
        let target = ShadowTarget::new(window.clone(), document, sink);
        RefCell::new(Controller::new(config, target, LocalStorageStore).with_hooks(hooks))
    });

    let ticket = controller.borrow_mut().init();
    let Some(ticket) = ticket else {
        return Err(JsValue::from_str("Signalboard changelog: could not mount widget"));
    };
    spawn_load(&controller, &client, ticket);

    let widget = ChangelogWidget {
        inner: Rc::new(WidgetInner {
            controller,
            client,
            handler: Cell::new(None),
        }),
    };
    let handler = bridge::install(
        window,
        &public_key,
        &widget.inner.controller,
        JsValue::from(widget.clone()),
    )?;
    widget.inner.handler.set(Some(handler));
    log::debug!("changelog widget mounted for {public_key}");
    Ok(widget)
}

/// Mounts a widget from an explicit config object (same shape as
/// `window.SignalboardChangelogConfig`).
#[wasm_bindgen(js_name = initChangelogWidget)]
pub fn init_changelog_widget(config: JsValue) -> Result<ChangelogWidget, JsValue> {
    console_error_panic_hook::set_once();
    logger::init(LevelFilter::Warn);

    let window = window()?;
    let overrides = read_overrides(&config)?;
    let config_value = resolve_config(overrides, None).map_err(format_widget_error)?;
    mount(&window, config_value, read_hooks(&config))
}

/// Script-tag entry point: runs when the module loads and mounts a widget if
/// the page carries a global config or a `script[data-public-key]` tag.
/// Failures are logged; the host page never sees an exception.
#[wasm_bindgen(start)]
pub fn boot() {
    console_error_panic_hook::set_once();
    logger::init(LevelFilter::Warn);

    if let Err(err) = boot_from_page() {
        log::error!("changelog widget failed to start: {err:?}");
    }
}

fn boot_from_page() -> Result<(), JsValue> {
    let window = window()?;
    let global = Reflect::get(&window, &JsValue::from_str(GLOBAL_CONFIG_NAME))?;
    let overrides = read_overrides(&global)?;
    let script = window.document().and_then(|document| read_script_attributes(&document));

    let config = match resolve_config(overrides, script.as_ref()) {
        Ok(config) => config,
        Err(WidgetError::MissingPublicKey) => {
            log::debug!("no changelog configuration on this page");
            return Ok(());
        }
        Err(err) => return Err(format_widget_error(err)),
    };
    mount(&window, config, read_hooks(&global))?;
    Ok(())
}
