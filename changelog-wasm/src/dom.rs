#![cfg(target_arch = "wasm32")]

//! Shadow-DOM render target.
//!
//! The widget lives in an open shadow root attached to a host `<div>` at the
//! end of `<body>`. Every render replaces the children of one persistent
//! container; a single delegated click listener on that container maps
//! `data-action` nodes to [`UiAction`]s.

use std::rc::Rc;

use changelog_core::{Anchor, WidgetError};
use changelog_ui::{
    Node as ViewNode, RenderTarget, UiAction, ACTION_ATTR, ENTRY_ID_ATTR, TRIGGER_BADGE_ATTR,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, ShadowRoot, ShadowRootInit, ShadowRootMode, Window};

const HOST_ATTR: &str = "data-signalboard-changelog-root";
const PANEL_WIDTH: f64 = 380.0;
const ANCHOR_GAP: f64 = 8.0;
const VIEWPORT_MARGIN: f64 = 12.0;

/// Interaction reported from the DOM to whoever owns the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetEvent {
    Action(UiAction),
    TriggerClick(Anchor),
}

pub type EventSink = Rc<dyn Fn(TargetEvent)>;

struct TriggerBinding {
    element: Element,
    listener: Closure<dyn FnMut(Event)>,
}

struct Mounted {
    host: Element,
    shadow: ShadowRoot,
    container: Element,
    click_listener: Closure<dyn FnMut(Event)>,
}

pub struct ShadowTarget {
    window: Window,
    document: Document,
    events: EventSink,
    mounted: Option<Mounted>,
    style_injected: bool,
    triggers: Vec<TriggerBinding>,
}

impl ShadowTarget {
    pub fn new(window: Window, document: Document, events: EventSink) -> Self {
        Self {
            window,
            document,
            events,
            mounted: None,
            style_injected: false,
            triggers: Vec::new(),
        }
    }

    fn mounted(&self) -> Result<&Mounted, WidgetError> {
        self.mounted
            .as_ref()
            .ok_or_else(|| WidgetError::Render("widget is not mounted".into()))
    }

    fn trigger_anchor(window: &Window, element: &Element) -> Anchor {
        let rect = element.get_bounding_client_rect();
        let viewport = window
            .inner_width()
            .ok()
            .and_then(|width| width.as_f64())
            .unwrap_or(f64::MAX);
        let max_left = (viewport - PANEL_WIDTH - VIEWPORT_MARGIN).max(0.0);
        Anchor {
            top: rect.bottom() + ANCHOR_GAP,
            left: rect.left().min(max_left),
        }
    }
}

fn dom_error(context: &str, err: JsValue) -> WidgetError {
    WidgetError::Render(format!("{context}: {err:?}"))
}

fn delegated_action(event: &Event) -> Option<UiAction> {
    let target = event.target()?.dyn_into::<Element>().ok()?;
    let node = target
        .closest(&format!("[{ACTION_ATTR}]"))
        .ok()
        .flatten()?;
    let action = node.get_attribute(ACTION_ATTR)?;
    let entry_id = node.get_attribute(ENTRY_ID_ATTR);
    UiAction::from_attributes(&action, entry_id.as_deref())
}

fn append_view(document: &Document, parent: &web_sys::Node, view: &ViewNode) -> Result<(), JsValue> {
    match view {
        ViewNode::Text(text) => {
            parent.append_child(&document.create_text_node(text))?;
        }
        ViewNode::Fragment(children) => {
            for child in children {
                append_view(document, parent, child)?;
            }
        }
        ViewNode::Element(element) => {
            let node = document.create_element(element.tag)?;
            for (name, value) in &element.attrs {
                node.set_attribute(name, value)?;
            }
            for child in &element.children {
                append_view(document, &node, child)?;
            }
            parent.append_child(&node)?;
        }
    }
    Ok(())
}

impl RenderTarget for ShadowTarget {
    fn mount(&mut self) -> Result<(), WidgetError> {
        if self.mounted.is_some() {
            return Ok(());
        }
        let body = self
            .document
            .body()
            .ok_or_else(|| WidgetError::Render("document has no <body>".into()))?;

        let host = self
            .document
            .create_element("div")
            .map_err(|err| dom_error("create host", err))?;
        host.set_attribute(HOST_ATTR, "")
            .map_err(|err| dom_error("tag host", err))?;
        let shadow = host
            .attach_shadow(&ShadowRootInit::new(ShadowRootMode::Open))
            .map_err(|err| dom_error("attach shadow root", err))?;
        let container = self
            .document
            .create_element("div")
            .map_err(|err| dom_error("create container", err))?;
        shadow
            .append_child(&container)
            .map_err(|err| dom_error("append container", err))?;

        let events = Rc::clone(&self.events);
        let click_listener = Closure::wrap(Box::new(move |event: Event| {
            if let Some(action) = delegated_action(&event) {
                events(TargetEvent::Action(action));
            }
        }) as Box<dyn FnMut(Event)>);
        container
            .add_event_listener_with_callback("click", click_listener.as_ref().unchecked_ref())
            .map_err(|err| dom_error("listen for clicks", err))?;

        body.append_child(&host)
            .map_err(|err| dom_error("append host", err))?;

        self.mounted = Some(Mounted {
            host,
            shadow,
            container,
            click_listener,
        });
        Ok(())
    }

    fn prefers_dark_scheme(&self) -> bool {
        self.window
            .match_media("(prefers-color-scheme: dark)")
            .ok()
            .flatten()
            .map(|query| query.matches())
            .unwrap_or(false)
    }

    fn inject_style_once(&mut self, css: &str) -> Result<(), WidgetError> {
        if self.style_injected {
            return Ok(());
        }
        let mounted = self.mounted()?;
        let style = self
            .document
            .create_element("style")
            .map_err(|err| dom_error("create style", err))?;
        style.set_text_content(Some(css));
        let container: &web_sys::Node = &mounted.container;
        mounted
            .shadow
            .insert_before(&style, Some(container))
            .map_err(|err| dom_error("insert style", err))?;
        self.style_injected = true;
        Ok(())
    }

    fn render(&mut self, view: &ViewNode) -> Result<(), WidgetError> {
        let mounted = self.mounted()?;
        mounted.container.set_text_content(None);
        append_view(&self.document, &mounted.container, view)
            .map_err(|err| dom_error("build view", err))
    }

    fn bind_triggers(&mut self, selector: &str) -> Result<usize, WidgetError> {
        self.unbind_triggers();
        let nodes = self
            .document
            .query_selector_all(selector)
            .map_err(|err| WidgetError::Render(format!("invalid trigger selector {selector:?}: {err:?}")))?;

        for index in 0..nodes.length() {
            let Some(element) = nodes.item(index).and_then(|node| node.dyn_into::<Element>().ok())
            else {
                continue;
            };
            let events = Rc::clone(&self.events);
            let window = self.window.clone();
            let anchor_source = element.clone();
            let listener = Closure::wrap(Box::new(move |event: Event| {
                event.prevent_default();
                let anchor = ShadowTarget::trigger_anchor(&window, &anchor_source);
                events(TargetEvent::TriggerClick(anchor));
            }) as Box<dyn FnMut(Event)>);
            element
                .add_event_listener_with_callback("click", listener.as_ref().unchecked_ref())
                .map_err(|err| dom_error("listen on trigger", err))?;
            self.triggers.push(TriggerBinding { element, listener });
        }
        Ok(self.triggers.len())
    }

    fn sync_trigger_badges(&mut self, unread: usize) {
        let selector = format!("[{TRIGGER_BADGE_ATTR}]");
        let label = unread.to_string();
        for binding in &self.triggers {
            let Ok(badges) = binding.element.query_selector_all(&selector) else {
                continue;
            };
            for index in 0..badges.length() {
                let Some(badge) = badges.item(index).and_then(|node| node.dyn_into::<Element>().ok())
                else {
                    continue;
                };
                badge.set_text_content(Some(&label));
                let result = if unread == 0 {
                    badge.set_attribute("hidden", "")
                } else {
                    badge.remove_attribute("hidden")
                };
                if let Err(err) = result {
                    log::debug!("could not update trigger badge: {err:?}");
                }
            }
        }
    }

    fn unbind_triggers(&mut self) {
        for binding in self.triggers.drain(..) {
            if let Err(err) = binding
                .element
                .remove_event_listener_with_callback("click", binding.listener.as_ref().unchecked_ref())
            {
                log::debug!("could not remove trigger listener: {err:?}");
            }
        }
    }

    fn unmount(&mut self) {
        let Some(mounted) = self.mounted.take() else {
            return;
        };
        if let Err(err) = mounted.container.remove_event_listener_with_callback(
            "click",
            mounted.click_listener.as_ref().unchecked_ref(),
        ) {
            log::debug!("could not remove click listener: {err:?}");
        }
        mounted.host.remove();
        self.style_injected = false;
    }
}
