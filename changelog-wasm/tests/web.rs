#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;

use changelog_core::WatermarkStore;
use changelog_ui::{Element, Node, RenderTarget, UiAction};
use changelog_wasm::bridge;
use changelog_wasm::storage::LocalStorageStore;
use changelog_wasm::{init_changelog_widget, ShadowTarget, TargetEvent};
use js_sys::{Function, Object, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn window() -> web_sys::Window {
    web_sys::window().expect("window")
}

fn config(public_key: &str) -> JsValue {
    let config = Object::new();
    Reflect::set(&config, &"publicKey".into(), &public_key.into()).unwrap();
    Reflect::set(&config, &"apiBase".into(), &"http://127.0.0.1:9".into()).unwrap();
    config.into()
}

fn call(name: &str, options: &JsValue) -> JsValue {
    let dispatcher = Reflect::get(&window(), &bridge::GLOBAL_NAME.into())
        .unwrap()
        .dyn_into::<Function>()
        .expect("Signalboard is a function");
    dispatcher
        .call2(&JsValue::UNDEFINED, &name.into(), options)
        .unwrap()
}

fn reset_global() {
    bridge::teardown(&window()).unwrap();
    Reflect::delete_property(&window(), &bridge::GLOBAL_NAME.into()).unwrap();
}

#[wasm_bindgen_test]
fn local_storage_round_trip() {
    let store = LocalStorageStore;
    store.store("pk_web_storage", 1_700_000_000_000).unwrap();
    assert_eq!(store.load("pk_web_storage").unwrap(), Some(1_700_000_000_000));

    let storage = window().local_storage().unwrap().unwrap();
    assert_eq!(
        storage
            .get_item("signalboard_changelog_last_seen_pk_web_storage")
            .unwrap()
            .as_deref(),
        Some("1700000000000")
    );
    storage
        .remove_item("signalboard_changelog_last_seen_pk_web_storage")
        .unwrap();
}

#[wasm_bindgen_test]
fn bridge_keeps_previous_dispatcher_and_properties() {
    reset_global();
    let previous = Function::new_with_args("name", "return 'previous:' + name;");
    Reflect::set(&previous, &"version".into(), &"2.1".into()).unwrap();
    Reflect::set(&window(), &bridge::GLOBAL_NAME.into(), &previous).unwrap();

    let widget = init_changelog_widget(config("pk_web_bridge")).unwrap();

    assert_eq!(call("identify", &JsValue::UNDEFINED).as_string().as_deref(), Some("previous:identify"));
    assert_eq!(call("get_unread_changelog_count", &JsValue::UNDEFINED).as_f64(), Some(0.0));

    let current = Reflect::get(&window(), &bridge::GLOBAL_NAME.into()).unwrap();
    assert_eq!(
        Reflect::get(&current, &"version".into()).unwrap().as_string().as_deref(),
        Some("2.1")
    );
    assert!(Reflect::get(&current, &"changelogWidget".into()).unwrap().is_object());

    widget.destroy();
    assert_eq!(bridge::handler_count(), 0);
    reset_global();
}

#[wasm_bindgen_test]
fn bridge_wraps_plain_object_and_targets_by_public_key() {
    reset_global();
    let existing = Object::new();
    Reflect::set(&existing, &"queue".into(), &JsValue::from_f64(3.0)).unwrap();
    Reflect::set(&existing, &"name".into(), &"host-config".into()).unwrap();
    Reflect::set(&existing, &"length".into(), &JsValue::from_f64(2.0)).unwrap();
    Reflect::set(&window(), &bridge::GLOBAL_NAME.into(), &existing).unwrap();

    let first = init_changelog_widget(config("pk_web_first")).unwrap();
    let second = init_changelog_widget(config("pk_web_second")).unwrap();
    assert_eq!(bridge::handler_count(), 2);

    let current = Reflect::get(&window(), &bridge::GLOBAL_NAME.into()).unwrap();
    assert!(current.is_function());
    assert_eq!(Reflect::get(&current, &"queue".into()).unwrap().as_f64(), Some(3.0));

    let options = Object::new();
    Reflect::set(&options, &"publicKey".into(), &"pk_web_unknown".into()).unwrap();
    assert!(call("open_changelog", &options.into()).is_undefined());

    assert!(call("unknown_command", &JsValue::UNDEFINED).is_undefined());

    first.destroy();
    second.destroy();
    reset_global();
}

fn published_widget_key() -> Option<String> {
    let current = Reflect::get(&window(), &bridge::GLOBAL_NAME.into()).unwrap();
    let widget = Reflect::get(&current, &"changelogWidget".into()).unwrap();
    if widget.is_undefined() {
        return None;
    }
    Reflect::get(&widget, &"publicKey".into()).unwrap().as_string()
}

#[wasm_bindgen_test]
fn bridge_installs_fresh_dispatcher_and_teardown_removes_it() {
    reset_global();
    assert!(Reflect::get(&window(), &bridge::GLOBAL_NAME.into())
        .unwrap()
        .is_undefined());

    let widget = init_changelog_widget(config("pk_web_fresh")).unwrap();
    let current = Reflect::get(&window(), &bridge::GLOBAL_NAME.into()).unwrap();
    assert!(current.is_function());
    assert_eq!(published_widget_key().as_deref(), Some("pk_web_fresh"));
    assert!(call("unknown_command", &JsValue::UNDEFINED).is_undefined());

    bridge::teardown(&window()).unwrap();
    assert!(Reflect::get(&window(), &bridge::GLOBAL_NAME.into())
        .unwrap()
        .is_undefined());
    assert_eq!(bridge::handler_count(), 0);

    widget.destroy();
    assert!(Reflect::get(&window(), &bridge::GLOBAL_NAME.into())
        .unwrap()
        .is_undefined());
}

#[wasm_bindgen_test]
fn destroyed_widget_is_no_longer_published() {
    reset_global();
    let first = init_changelog_widget(config("pk_web_older")).unwrap();
    let second = init_changelog_widget(config("pk_web_newer")).unwrap();
    assert_eq!(published_widget_key().as_deref(), Some("pk_web_newer"));

    second.destroy();
    assert_eq!(published_widget_key().as_deref(), Some("pk_web_older"));

    first.destroy();
    assert_eq!(published_widget_key(), None);
    reset_global();
}

#[wasm_bindgen_test]
fn mistyped_config_fields_do_not_block_mounting() {
    let config = config("pk_web_lenient");
    Reflect::set(&config, &"maxEntries".into(), &"5".into()).unwrap();
    Reflect::set(&config, &"autoOpenForNew".into(), &JsValue::from_f64(1.0)).unwrap();

    reset_global();
    let widget = init_changelog_widget(config).unwrap();
    assert_eq!(widget.public_key(), "pk_web_lenient");
    widget.destroy();
    reset_global();
}

#[wasm_bindgen_test]
fn shadow_target_builds_inert_text() {
    let events = Rc::new(RefCell::new(Vec::new()));
    let recorded = Rc::clone(&events);
    let sink = Rc::new(move |event: TargetEvent| recorded.borrow_mut().push(event));
    let document = window().document().unwrap();
    let mut target = ShadowTarget::new(window(), document.clone(), sink);

    target.mount().unwrap();
    target.inject_style_once(":host{all:initial}").unwrap();
    target.inject_style_once(":host{color:red}").unwrap();
    let view = Node::from(
        Element::new("button")
            .attr("data-action", "close")
            .text("<script>alert(1)</script>"),
    );
    target.render(&view).unwrap();

    let host = document
        .query_selector("[data-signalboard-changelog-root]")
        .unwrap()
        .expect("host element");
    let shadow = host.shadow_root().expect("open shadow root");
    assert!(shadow.query_selector("script").unwrap().is_none());
    assert_eq!(shadow.query_selector_all("style").unwrap().length(), 1);

    let button = shadow
        .query_selector("button")
        .unwrap()
        .expect("button")
        .dyn_into::<web_sys::HtmlElement>()
        .unwrap();
    assert_eq!(button.text_content().as_deref(), Some("<script>alert(1)</script>"));
    button.click();
    assert_eq!(events.borrow().as_slice(), &[TargetEvent::Action(UiAction::Close)]);

    target.unmount();
    assert!(document
        .query_selector("[data-signalboard-changelog-root]")
        .unwrap()
        .is_none());
}
