use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use async_trait::async_trait;
use changelog_api::decode_response;
use changelog_core::{
    ChangelogEntry, ChangelogSource, DisplayMode, MemoryWatermarkStore, WidgetConfig, WidgetError,
};
use changelog_ui::{run_load, Controller, LoadOutcome, MemoryTarget, UiAction};
use futures::executor::block_on;

type Widget = RefCell<Controller<MemoryTarget, Rc<MemoryWatermarkStore>>>;

/// Replays canned HTTP responses, one per fetch.
#[derive(Default)]
struct ScriptedSource {
    responses: RefCell<VecDeque<(u16, String)>>,
    limits: RefCell<Vec<Option<u32>>>,
}

impl ScriptedSource {
    fn push(&self, status: u16, body: &str) {
        self.responses.borrow_mut().push_back((status, body.to_string()));
    }
}

#[async_trait(?Send)]
impl ChangelogSource for ScriptedSource {
    async fn fetch_entries(&self, limit: Option<u32>) -> Result<Vec<ChangelogEntry>, WidgetError> {
        self.limits.borrow_mut().push(limit);
        let (status, body) = self
            .responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| WidgetError::FetchFailed("network down".into()))?;
        decode_response(status, &body)
    }
}

fn widget(mode: DisplayMode, store: &Rc<MemoryWatermarkStore>) -> Widget {
    let mut config = WidgetConfig::new("pk_test");
    config.mode = mode;
    config.max_entries = 5;
    RefCell::new(Controller::new(config, MemoryTarget::new(), Rc::clone(store)))
}

fn boot(widget: &Widget, source: &ScriptedSource) -> LoadOutcome {
    let ticket = widget.borrow_mut().init().expect("init ticket");
    block_on(run_load(widget, source, ticket))
}

#[test]
fn unread_badge_clears_after_open() {
    let store = Rc::new(MemoryWatermarkStore::with_watermark("pk_test", 0));
    let source = ScriptedSource::default();
    source.push(200, r#"[{"id":"1","title":"X","publishedAt":1000}]"#);
    let widget = widget(DisplayMode::Popup, &store);

    assert_eq!(boot(&widget, &source), LoadOutcome::Applied);
    assert_eq!(*source.limits.borrow(), vec![Some(5)]);
    {
        let ctrl = widget.borrow();
        assert_eq!(ctrl.unread_count(), 1);
        assert!(ctrl.target().html.contains(r#"<span class="sb-badge" aria-label="1 unread">1</span>"#));
    }

    widget.borrow_mut().open();
    let ctrl = widget.borrow();
    assert_eq!(ctrl.unread_count(), 0);
    assert_eq!(store.raw("pk_test").as_deref(), Some("1000"));
    assert!(!ctrl.target().html.contains("sb-badge"));
    assert!(!ctrl.target().html.contains("sb-new"));
    assert!(ctrl.target().html.contains("X"));
}

#[test]
fn rate_limited_load_recovers_through_retry_click() {
    let store = Rc::new(MemoryWatermarkStore::new());
    let source = ScriptedSource::default();
    source.push(429, r#"{"error":"rate limited"}"#);
    source.push(200, r#"[{"id":"1","title":"Recovered","publishedAt":1000}]"#);
    let widget = widget(DisplayMode::Popup, &store);

    boot(&widget, &source);
    widget.borrow_mut().open();
    {
        let ctrl = widget.borrow();
        assert_eq!(ctrl.state().error.as_deref(), Some("rate limited"));
        assert!(!ctrl.state().is_loading);
        assert!(ctrl.target().html.contains("rate limited"));
        assert!(ctrl.target().html.contains(r#"data-action="retry""#));
    }

    let ticket = widget
        .borrow_mut()
        .handle_action(UiAction::Retry)
        .expect("retry ticket");
    assert!(widget.borrow().target().html.contains("sb-spinner"));
    assert_eq!(block_on(run_load(&widget, &source, ticket)), LoadOutcome::Applied);

    let ctrl = widget.borrow();
    assert_eq!(ctrl.state().error, None);
    assert!(ctrl.target().html.contains("Recovered"));
    assert!(!ctrl.target().html.contains("rate limited"));
}

#[test]
fn hostile_titles_render_as_text() {
    let store = Rc::new(MemoryWatermarkStore::new());
    let source = ScriptedSource::default();
    source.push(
        200,
        r#"[{"id":"1","title":"<script>alert(1)</script>","publishedAt":1000}]"#,
    );
    let widget = widget(DisplayMode::Card, &store);

    boot(&widget, &source);
    let card_html = widget.borrow().target().html.clone();
    assert!(card_html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(!card_html.contains("<script>"));

    widget.borrow_mut().open();
    let panel_html = widget.borrow().target().html.clone();
    assert!(panel_html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(!panel_html.contains("<script>"));
}

#[test]
fn malformed_payload_is_shown_like_a_fetch_failure() {
    let store = Rc::new(MemoryWatermarkStore::new());
    let source = ScriptedSource::default();
    source.push(200, r#"[{"id":1}]"#);
    let widget = widget(DisplayMode::Popup, &store);

    boot(&widget, &source);
    widget.borrow_mut().open();
    let ctrl = widget.borrow();
    assert_eq!(ctrl.state().error.as_deref(), Some("Failed to load changelog"));
    assert!(ctrl.target().html.contains(r#"data-action="retry""#));
}

#[test]
fn calls_after_destroy_are_harmless() {
    let store = Rc::new(MemoryWatermarkStore::new());
    let source = ScriptedSource::default();
    source.push(200, r#"[{"id":"1","title":"X","publishedAt":1000}]"#);
    let widget = widget(DisplayMode::Popup, &store);
    boot(&widget, &source);

    let mut ctrl = widget.borrow_mut();
    ctrl.destroy();
    let renders = ctrl.target().render_count;

    ctrl.open();
    ctrl.close();
    ctrl.toggle();
    ctrl.mark_all_as_read();
    ctrl.entry_clicked("1");
    ctrl.destroy();
    assert!(ctrl.retry().is_none());
    assert!(ctrl.handle_action(UiAction::Retry).is_none());
    assert_eq!(ctrl.target().render_count, renders);
    assert!(!ctrl.target().mounted);
    assert_eq!(store.raw("pk_test"), None);
}

#[test]
fn response_arriving_after_destroy_is_dropped() {
    let store = Rc::new(MemoryWatermarkStore::new());
    let source = ScriptedSource::default();
    source.push(200, r#"[{"id":"1","title":"Late","publishedAt":1000}]"#);
    let widget = widget(DisplayMode::Popup, &store);

    let ticket = widget.borrow_mut().init().expect("ticket");
    widget.borrow_mut().destroy();

    assert_eq!(block_on(run_load(&widget, &source, ticket)), LoadOutcome::Detached);
    assert!(widget.borrow().state().entries.is_empty());
    assert_eq!(widget.borrow().target().html, "");
}

#[test]
fn overlapping_retries_never_mix_responses() {
    let store = Rc::new(MemoryWatermarkStore::new());
    let source = ScriptedSource::default();
    source.push(200, r#"[{"id":"a","title":"First response"}]"#);
    source.push(200, r#"[{"id":"b","title":"Second response"}]"#);
    let widget = widget(DisplayMode::Popup, &store);

    let first = widget.borrow_mut().init().expect("ticket");
    let second = widget.borrow_mut().retry().expect("ticket");

    assert_eq!(block_on(run_load(&widget, &source, first)), LoadOutcome::Stale);
    assert!(widget.borrow().state().is_loading);
    assert_eq!(block_on(run_load(&widget, &source, second)), LoadOutcome::Applied);

    let ctrl = widget.borrow();
    let ids: Vec<_> = ctrl.state().entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["b"]);
}

#[test]
fn reload_after_new_release_shows_only_fresh_entries_as_new() {
    let store = Rc::new(MemoryWatermarkStore::new());
    let source = ScriptedSource::default();
    source.push(200, r#"[{"id":"1","title":"Old","publishedAt":1000}]"#);
    source.push(
        200,
        r#"[{"id":"2","title":"Fresh","publishedAt":3000},{"id":"1","title":"Old","publishedAt":1000}]"#,
    );
    let widget = widget(DisplayMode::Popup, &store);

    boot(&widget, &source);
    widget.borrow_mut().open();
    widget.borrow_mut().close();

    let ticket = widget.borrow_mut().retry().expect("ticket");
    block_on(run_load(&widget, &source, ticket));
    assert_eq!(widget.borrow().unread_count(), 1);

    widget.borrow_mut().open();
    let html = widget.borrow().target().html.clone();
    assert_eq!(html.matches(r#"class="sb-new""#).count(), 0);
    assert_eq!(store.raw("pk_test").as_deref(), Some("3000"));
}
