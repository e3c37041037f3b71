#![cfg(target_arch = "wasm32")]

//! `window.Signalboard(name, options)` command bridge.
//!
//! The dispatcher installed on the window consults the widget registry first.
//! Commands no widget handles are forwarded to whatever function was on
//! `window.Signalboard` before, and enumerable properties of the previous value
//! are copied onto the dispatcher. Installing a second widget in the same
//! module reuses the dispatcher; its handler takes precedence.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use changelog_core::{
    ChangelogCommand, Command, CommandHandler, CommandRegistry, CommandReply, Dispatch, HandlerId,
};
use js_sys::{Function, Object, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Window;

use crate::widget::{SharedController, WidgetController};

pub const GLOBAL_NAME: &str = "Signalboard";
const WIDGET_PROPERTY: &str = "changelogWidget";
const TARGET_PROPERTY: &str = "publicKey";

struct InstalledDispatcher {
    dispatcher: Function,
    previous: JsValue,
}

thread_local! {
    static REGISTRY: RefCell<CommandRegistry> = RefCell::new(CommandRegistry::new());
    static DISPATCHER: RefCell<Option<InstalledDispatcher>> = const { RefCell::new(None) };
    /// JS handles of live widgets, oldest first.
    static WIDGETS: RefCell<Vec<(HandlerId, JsValue)>> = const { RefCell::new(Vec::new()) };
}

struct ControllerHandler(Weak<RefCell<WidgetController>>);

impl CommandHandler for ControllerHandler {
    fn handle(&self, command: ChangelogCommand) -> Option<CommandReply> {
        let controller = self.0.upgrade()?;
        let Ok(mut controller) = controller.try_borrow_mut() else {
            log::warn!("changelog widget busy, dropping {}", command.name());
            return None;
        };
        controller.handle_command(command)
    }
}

/// Registers `controller` under `public_key` and makes sure the window
/// dispatcher is in place. `widget` is exposed as `Signalboard.changelogWidget`.
pub fn install(
    window: &Window,
    public_key: &str,
    controller: &SharedController,
    widget: JsValue,
) -> Result<HandlerId, JsValue> {
    let id = REGISTRY.with(|registry| {
        registry
            .borrow_mut()
            .install(public_key, ControllerHandler(Rc::downgrade(controller)))
    });

    let existing = Reflect::get(window, &JsValue::from_str(GLOBAL_NAME))?;
    if !is_current_dispatcher(&existing) {
        let previous_fn = existing.dyn_ref::<Function>().cloned();
        let dispatcher = build_dispatcher(previous_fn);
        if existing.is_object() || existing.is_function() {
            copy_properties(existing.unchecked_ref::<Object>(), &dispatcher);
        }
        Reflect::set(window, &JsValue::from_str(GLOBAL_NAME), &dispatcher)?;
        DISPATCHER.with(|slot| {
            *slot.borrow_mut() = Some(InstalledDispatcher {
                dispatcher,
                previous: existing,
            })
        });
    }

    WIDGETS.with(|widgets| widgets.borrow_mut().push((id, widget)));
    publish_latest_widget(window)?;
    Ok(id)
}

/// Unregisters a widget. `Signalboard.changelogWidget` moves to the newest
/// surviving widget, or is removed when none is left.
pub fn uninstall(id: HandlerId) -> Result<bool, JsValue> {
    let removed = REGISTRY.with(|registry| registry.borrow_mut().uninstall(id));
    WIDGETS.with(|widgets| widgets.borrow_mut().retain(|(widget_id, _)| *widget_id != id));
    if let Some(window) = web_sys::window() {
        publish_latest_widget(&window)?;
    }
    Ok(removed)
}

/// Drops every handler and puts the previous `window.Signalboard` value back,
/// provided nobody replaced the dispatcher in the meantime.
pub fn teardown(window: &Window) -> Result<(), JsValue> {
    REGISTRY.with(|registry| registry.borrow_mut().teardown());
    WIDGETS.with(|widgets| widgets.borrow_mut().clear());
    let installed = DISPATCHER.with(|slot| slot.borrow_mut().take());
    let Some(installed) = installed else {
        return Ok(());
    };
    let current = Reflect::get(window, &JsValue::from_str(GLOBAL_NAME))?;
    if Object::is(&current, &installed.dispatcher) {
        Reflect::delete_property(
            installed.dispatcher.unchecked_ref(),
            &JsValue::from_str(WIDGET_PROPERTY),
        )?;
        if installed.previous.is_undefined() {
            Reflect::delete_property(window, &JsValue::from_str(GLOBAL_NAME))?;
        } else {
            Reflect::set(window, &JsValue::from_str(GLOBAL_NAME), &installed.previous)?;
        }
    }
    Ok(())
}

pub fn handler_count() -> usize {
    REGISTRY.with(|registry| registry.borrow().len())
}

fn publish_latest_widget(window: &Window) -> Result<(), JsValue> {
    let current = Reflect::get(window, &JsValue::from_str(GLOBAL_NAME))?;
    if !current.is_function() && !current.is_object() {
        return Ok(());
    }
    let key = JsValue::from_str(WIDGET_PROPERTY);
    let latest = WIDGETS.with(|widgets| widgets.borrow().last().map(|(_, widget)| widget.clone()));
    match latest {
        Some(widget) => Reflect::set(&current, &key, &widget)?,
        None => Reflect::delete_property(current.unchecked_ref(), &key)?,
    };
    Ok(())
}

/// Copies own enumerable properties one by one. Keys a function cannot take
/// (`name`, `length`) are skipped.
fn copy_properties(source: &Object, target: &Function) {
    for key in Object::keys(source).iter() {
        let copied = Reflect::get(source, &key)
            .and_then(|value| Reflect::set(target, &key, &value));
        if !matches!(copied, Ok(true)) {
            log::debug!("not copying Signalboard property {key:?}");
        }
    }
}

fn is_current_dispatcher(value: &JsValue) -> bool {
    DISPATCHER.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|installed| Object::is(value, &installed.dispatcher))
            .unwrap_or(false)
    })
}

fn target_key(options: &JsValue) -> Option<String> {
    if !options.is_object() {
        return None;
    }
    Reflect::get(options, &JsValue::from_str(TARGET_PROPERTY))
        .ok()
        .and_then(|value| value.as_string())
}

fn forward(previous: Option<&Function>, name: &JsValue, options: &JsValue) -> JsValue {
    let Some(previous) = previous else {
        return JsValue::UNDEFINED;
    };
    previous
        .call2(&JsValue::UNDEFINED, name, options)
        .unwrap_or_else(|err| {
            log::warn!("previous Signalboard handler threw: {err:?}");
            JsValue::UNDEFINED
        })
}

fn build_dispatcher(previous: Option<Function>) -> Function {
    let dispatch = move |name: JsValue, options: JsValue| -> JsValue {
        let Some(command_name) = name.as_string() else {
            return forward(previous.as_ref(), &name, &options);
        };
        let command = Command::parse(&command_name, target_key(&options).as_deref());
        let outcome = REGISTRY.with(|registry| registry.borrow().dispatch(&command));
        match outcome {
            Dispatch::Handled(CommandReply::UnreadCount(count)) => JsValue::from_f64(count as f64),
            Dispatch::Handled(CommandReply::Done) => JsValue::UNDEFINED,
            Dispatch::PassThrough => forward(previous.as_ref(), &name, &options),
        }
    };
    Closure::wrap(Box::new(dispatch) as Box<dyn FnMut(JsValue, JsValue) -> JsValue>)
        .into_js_value()
        .unchecked_into::<Function>()
}
