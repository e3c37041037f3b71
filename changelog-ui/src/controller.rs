//! Widget controller: owns the state, drives the lifecycle and re-renders the
//! whole view after every mutation.
//!
//! Loading is split into [`Controller::begin_load`]-style entry points that hand
//! out a [`LoadTicket`] and [`Controller::complete_load`], which applies a
//! result only if its ticket is still the latest one. The platform adapter
//! performs the fetch in between (see [`run_load`]), so no borrow of the
//! controller is held across an await.

use std::cell::RefCell;

use changelog_core::{
    compute_unread_count, latest_published_at, Anchor, ChangelogCommand, ChangelogEntry,
    ChangelogSource, CommandReply, DisplayMode, ResolvedTheme, WatermarkStore, WidgetConfig,
    WidgetError, WidgetState,
};

use crate::styles::{generate_styles, StyleOptions};
use crate::target::{RenderTarget, UiAction};
use crate::views::{render_widget, ViewContext};

/// Optional host callbacks. They run synchronously inside controller methods.
#[derive(Default)]
pub struct WidgetHooks {
    pub on_open: Option<Box<dyn FnMut()>>,
    pub on_close: Option<Box<dyn FnMut()>>,
    pub on_entry_click: Option<Box<dyn FnMut(&ChangelogEntry)>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Mounted,
    Destroyed,
}

/// One logical load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    limit: Option<u32>,
}

impl LoadTicket {
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer load was started before this one finished.
    Stale,
    /// The widget was destroyed while the request was in flight.
    Detached,
}

pub struct Controller<T, S> {
    config: WidgetConfig,
    hooks: WidgetHooks,
    state: WidgetState,
    target: T,
    store: S,
    theme: Option<ResolvedTheme>,
    watermark: i64,
    generation: u64,
    lifecycle: Lifecycle,
}

impl<T: RenderTarget, S: WatermarkStore> Controller<T, S> {
    pub fn new(config: WidgetConfig, target: T, store: S) -> Self {
        Self {
            config,
            hooks: WidgetHooks::default(),
            state: WidgetState::default(),
            target,
            store,
            theme: None,
            watermark: 0,
            generation: 0,
            lifecycle: Lifecycle::Created,
        }
    }

    pub fn with_hooks(mut self, hooks: WidgetHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn state(&self) -> &WidgetState {
        &self.state
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Theme frozen at style injection; `None` before `init`.
    pub fn theme(&self) -> Option<ResolvedTheme> {
        self.theme
    }

    /// Watermark the views currently compare against.
    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    pub fn unread_count(&self) -> usize {
        self.state.unread_count
    }

    fn is_mounted(&self) -> bool {
        self.lifecycle == Lifecycle::Mounted
    }

    /// Mounts the render root, injects styles, binds triggers and starts the
    /// first load. Returns the ticket the caller must fetch for.
    pub fn init(&mut self) -> Option<LoadTicket> {
        if self.lifecycle != Lifecycle::Created {
            log::warn!("changelog widget {} is already initialized", self.config.public_key);
            return None;
        }

        if let Err(err) = self.target.mount() {
            log::error!("could not mount changelog widget: {err}");
            self.lifecycle = Lifecycle::Destroyed;
            return None;
        }
        self.lifecycle = Lifecycle::Mounted;

        let theme = self.config.theme.resolve(self.target.prefers_dark_scheme());
        self.theme = Some(theme);
        let css = generate_styles(&StyleOptions {
            color: &self.config.color,
            z_index: self.config.z_index,
            theme,
        });
        if let Err(err) = self.target.inject_style_once(&css) {
            log::error!("could not inject changelog styles: {err}");
        }

        if self.config.mode == DisplayMode::Trigger {
            match self.target.bind_triggers(&self.config.trigger_selector) {
                Ok(0) => log::warn!(
                    "no elements match trigger selector {:?}",
                    self.config.trigger_selector
                ),
                Ok(count) => log::debug!("bound {count} changelog trigger(s)"),
                Err(err) => log::error!("could not bind changelog triggers: {err}"),
            }
        }

        self.watermark = self.read_watermark();
        Some(self.begin_load())
    }

    /// Clears the error and starts a fresh load, superseding any in flight.
    pub fn retry(&mut self) -> Option<LoadTicket> {
        if !self.is_mounted() {
            return None;
        }
        Some(self.begin_load())
    }

    fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        self.state.is_loading = true;
        self.state.error = None;
        self.render();
        LoadTicket {
            generation: self.generation,
            limit: Some(self.config.max_entries),
        }
    }

    /// Applies a fetch result if `ticket` is still current.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<ChangelogEntry>, WidgetError>,
    ) -> LoadOutcome {
        if !self.is_mounted() {
            log::debug!("dropping changelog response for a detached widget");
            return LoadOutcome::Detached;
        }
        if ticket.generation != self.generation {
            log::debug!(
                "dropping superseded changelog response {} (current {})",
                ticket.generation,
                self.generation
            );
            return LoadOutcome::Stale;
        }

        self.state.is_loading = false;
        match result {
            Ok(entries) => {
                self.state.error = None;
                self.state.entries = entries;
                self.watermark = self.watermark.max(self.read_watermark());
                self.state.unread_count =
                    compute_unread_count(&self.state.entries, self.watermark);
                log::debug!(
                    "loaded {} changelog entries, {} unread",
                    self.state.entries.len(),
                    self.state.unread_count
                );

                if self.config.auto_open_for_new
                    && self.state.unread_count > 0
                    && self.config.mode != DisplayMode::Trigger
                {
                    self.apply_open(None);
                }
            }
            Err(err) => {
                if err.is_recoverable() {
                    log::warn!("changelog load failed: {err}");
                } else {
                    log::error!("changelog load failed and retrying will not help: {err}");
                }
                self.state.error = Some(err.user_message());
            }
        }

        self.target.sync_trigger_badges(self.state.unread_count);
        self.render();
        LoadOutcome::Applied
    }

    pub fn open(&mut self) {
        if !self.is_mounted() {
            return;
        }
        self.apply_open(None);
        self.render();
    }

    /// Opens the panel next to a trigger element.
    pub fn open_at(&mut self, anchor: Anchor) {
        if !self.is_mounted() {
            return;
        }
        self.apply_open(Some(anchor));
        self.render();
    }

    fn apply_open(&mut self, anchor: Option<Anchor>) {
        self.state.is_open = true;
        if anchor.is_some() {
            self.state.anchor = anchor;
        }
        self.acknowledge();
        if let Some(on_open) = self.hooks.on_open.as_mut() {
            on_open();
        }
    }

    pub fn close(&mut self) {
        if !self.is_mounted() {
            return;
        }
        self.state.is_open = false;
        self.state.anchor = None;
        if let Some(on_close) = self.hooks.on_close.as_mut() {
            on_close();
        }
        self.render();
    }

    pub fn toggle(&mut self) {
        if self.state.is_open {
            self.close();
        } else {
            self.open();
        }
    }

    pub fn toggle_at(&mut self, anchor: Anchor) {
        if self.state.is_open {
            self.close();
        } else {
            self.open_at(anchor);
        }
    }

    /// Advances the watermark to the newest loaded entry and clears the unread
    /// count. Leaves the watermark alone when nothing published is loaded.
    pub fn mark_all_as_read(&mut self) {
        if !self.is_mounted() {
            return;
        }
        self.acknowledge();
        self.render();
    }

    fn acknowledge(&mut self) {
        let Some(latest) = latest_published_at(&self.state.entries) else {
            return;
        };
        if latest > self.watermark {
            self.watermark = latest;
            if let Err(err) = self.store.store(&self.config.public_key, latest) {
                log::warn!("keeping changelog watermark in memory only: {err}");
            }
        }
        self.state.unread_count = 0;
        self.target.sync_trigger_badges(0);
    }

    pub fn entry_clicked(&mut self, entry_id: &str) {
        if !self.is_mounted() {
            return;
        }
        let entry = self.state.entries.iter().find(|entry| entry.id == entry_id);
        if let (Some(on_entry_click), Some(entry)) = (self.hooks.on_entry_click.as_mut(), entry) {
            on_entry_click(entry);
        }
    }

    /// Routes a delegated click. Returns a ticket when the action starts a load.
    pub fn handle_action(&mut self, action: UiAction) -> Option<LoadTicket> {
        match action {
            UiAction::Open => self.open(),
            UiAction::Close => self.close(),
            UiAction::Retry => return self.retry(),
            UiAction::OpenEntry(id) => self.entry_clicked(&id),
        }
        None
    }

    /// Executes a bridge command; `None` once the widget is gone.
    pub fn handle_command(&mut self, command: ChangelogCommand) -> Option<CommandReply> {
        if !self.is_mounted() {
            return None;
        }
        Some(match command {
            ChangelogCommand::Open => {
                self.open();
                CommandReply::Done
            }
            ChangelogCommand::Close => {
                self.close();
                CommandReply::Done
            }
            ChangelogCommand::GetUnreadCount => CommandReply::UnreadCount(self.unread_count()),
            ChangelogCommand::MarkRead => {
                self.mark_all_as_read();
                CommandReply::Done
            }
        })
    }

    /// Unbinds triggers and removes the render root. Every later call is a no-op
    /// and in-flight loads are discarded on arrival.
    pub fn destroy(&mut self) {
        if self.lifecycle == Lifecycle::Mounted {
            self.target.unbind_triggers();
            self.target.unmount();
        }
        self.lifecycle = Lifecycle::Destroyed;
        self.generation += 1;
    }

    fn read_watermark(&self) -> i64 {
        match self.store.load(&self.config.public_key) {
            Ok(stored) => stored.unwrap_or(0),
            Err(err) => {
                log::warn!("changelog watermark unavailable, using in-memory value: {err}");
                self.watermark
            }
        }
    }

    fn render(&mut self) {
        if !self.is_mounted() {
            return;
        }
        let ctx = ViewContext {
            mode: self.config.mode,
            position: self.config.position,
            watermark: self.watermark,
        };
        let view = render_widget(&self.state, &ctx);
        if let Err(err) = self.target.render(&view) {
            log::error!("changelog render failed: {err}");
        }
    }
}

/// Fetches for `ticket` and applies the result. The controller is only
/// borrowed after the fetch resolves.
pub async fn run_load<T, S, C>(
    controller: &RefCell<Controller<T, S>>,
    source: &C,
    ticket: LoadTicket,
) -> LoadOutcome
where
    T: RenderTarget,
    S: WatermarkStore,
    C: ChangelogSource + ?Sized,
{
    let result = source.fetch_entries(ticket.limit()).await;
    controller.borrow_mut().complete_load(ticket, result)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use changelog_core::{MemoryWatermarkStore, Theme};

    use super::*;
    use crate::target::MemoryTarget;

    type TestController = Controller<MemoryTarget, Rc<MemoryWatermarkStore>>;

    fn controller(config: WidgetConfig, store: &Rc<MemoryWatermarkStore>) -> TestController {
        Controller::new(config, MemoryTarget::new(), Rc::clone(store))
    }

    fn entries() -> Vec<ChangelogEntry> {
        vec![
            ChangelogEntry::new("2", "Two").published(2000),
            ChangelogEntry::new("1", "One").published(1000),
            ChangelogEntry::new("d", "Draft"),
        ]
    }

    #[test]
    fn init_mounts_styles_and_renders_loading() {
        let store = Rc::new(MemoryWatermarkStore::new());
        let mut config = WidgetConfig::new("pk");
        config.theme = Theme::Auto;
        let mut target = MemoryTarget::new();
        target.prefers_dark = true;
        let mut ctrl = Controller::new(config, target, Rc::clone(&store));

        let ticket = ctrl.init().expect("ticket");
        assert_eq!(ticket.limit(), Some(10));
        assert_eq!(ctrl.lifecycle(), Lifecycle::Mounted);
        assert_eq!(ctrl.theme(), Some(ResolvedTheme::Dark));
        assert_eq!(ctrl.target().styles.len(), 1);
        assert!(ctrl.target().styles[0].contains("color-scheme: dark;"));
        assert!(ctrl.state().is_loading);
        assert!(ctrl.init().is_none());
    }

    #[test]
    fn successful_load_computes_unread() {
        let store = Rc::new(MemoryWatermarkStore::with_watermark("pk", 1000));
        let mut ctrl = controller(WidgetConfig::new("pk"), &store);
        let ticket = ctrl.init().expect("ticket");

        assert_eq!(ctrl.complete_load(ticket, Ok(entries())), LoadOutcome::Applied);
        assert_eq!(ctrl.unread_count(), 1);
        assert!(!ctrl.state().is_loading);
        assert_eq!(ctrl.state().error, None);
        assert!(!ctrl.state().is_open);
    }

    #[test]
    fn failed_load_sets_error_and_clears_loading() {
        let store = Rc::new(MemoryWatermarkStore::new());
        let mut ctrl = controller(WidgetConfig::new("pk"), &store);
        let ticket = ctrl.init().expect("ticket");

        ctrl.complete_load(ticket, Err(WidgetError::FetchFailed("rate limited".into())));
        assert!(!ctrl.state().is_loading);
        assert_eq!(ctrl.state().error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn open_marks_everything_read() {
        let store = Rc::new(MemoryWatermarkStore::new());
        let mut ctrl = controller(WidgetConfig::new("pk"), &store);
        let ticket = ctrl.init().expect("ticket");
        ctrl.complete_load(ticket, Ok(entries()));
        assert_eq!(ctrl.unread_count(), 2);

        ctrl.open();
        assert!(ctrl.state().is_open);
        assert_eq!(ctrl.unread_count(), 0);
        assert_eq!(ctrl.watermark(), 2000);
        assert_eq!(store.raw("pk").as_deref(), Some("2000"));

        ctrl.close();
        assert!(!ctrl.state().is_open);
        assert_eq!(store.raw("pk").as_deref(), Some("2000"));
    }

    #[test]
    fn watermark_never_moves_backwards() {
        let store = Rc::new(MemoryWatermarkStore::with_watermark("pk", 5000));
        let mut ctrl = controller(WidgetConfig::new("pk"), &store);
        let ticket = ctrl.init().expect("ticket");
        ctrl.complete_load(ticket, Ok(entries()));

        ctrl.mark_all_as_read();
        assert_eq!(ctrl.watermark(), 5000);
        assert_eq!(store.raw("pk").as_deref(), Some("5000"));
    }

    #[test]
    fn mark_all_as_read_without_published_entries_is_a_noop() {
        let store = Rc::new(MemoryWatermarkStore::with_watermark("pk", 7));
        let mut ctrl = controller(WidgetConfig::new("pk"), &store);
        let ticket = ctrl.init().expect("ticket");
        ctrl.complete_load(ticket, Ok(vec![ChangelogEntry::new("d", "Draft")]));

        ctrl.mark_all_as_read();
        assert_eq!(ctrl.watermark(), 7);
        assert_eq!(store.raw("pk").as_deref(), Some("7"));

        let ticket = ctrl.retry().expect("ticket");
        ctrl.complete_load(ticket, Ok(Vec::new()));
        ctrl.mark_all_as_read();
        assert_eq!(store.raw("pk").as_deref(), Some("7"));
    }

    #[test]
    fn auto_open_only_outside_trigger_mode() {
        for (mode, expect_open) in [
            (DisplayMode::Popup, true),
            (DisplayMode::Card, true),
            (DisplayMode::Trigger, false),
        ] {
            let store = Rc::new(MemoryWatermarkStore::new());
            let mut config = WidgetConfig::new("pk");
            config.mode = mode;
            config.auto_open_for_new = true;
            let mut ctrl = controller(config, &store);
            let ticket = ctrl.init().expect("ticket");
            ctrl.complete_load(ticket, Ok(entries()));

            assert_eq!(ctrl.state().is_open, expect_open, "{mode:?}");
        }
    }

    #[test]
    fn auto_open_needs_unread_entries() {
        let store = Rc::new(MemoryWatermarkStore::with_watermark("pk", 2000));
        let mut config = WidgetConfig::new("pk");
        config.auto_open_for_new = true;
        let mut ctrl = controller(config, &store);
        let ticket = ctrl.init().expect("ticket");
        ctrl.complete_load(ticket, Ok(entries()));

        assert!(!ctrl.state().is_open);
    }

    #[test]
    fn superseded_load_is_discarded() {
        let store = Rc::new(MemoryWatermarkStore::new());
        let mut ctrl = controller(WidgetConfig::new("pk"), &store);
        let first = ctrl.init().expect("ticket");
        let second = ctrl.retry().expect("ticket");

        let late = vec![ChangelogEntry::new("old", "Old")];
        assert_eq!(ctrl.complete_load(second, Ok(entries())), LoadOutcome::Applied);
        assert_eq!(ctrl.complete_load(first, Ok(late)), LoadOutcome::Stale);
        assert_eq!(ctrl.state().entries, entries());
    }

    #[test]
    fn hooks_fire_on_open_close_and_entry_click() {
        let store = Rc::new(MemoryWatermarkStore::new());
        let events = Rc::new(RefCell::new(Vec::<String>::new()));
        let (opened, closed, clicked) = (Rc::clone(&events), Rc::clone(&events), Rc::clone(&events));
        let hooks = WidgetHooks {
            on_open: Some(Box::new(move || opened.borrow_mut().push("open".into()))),
            on_close: Some(Box::new(move || closed.borrow_mut().push("close".into()))),
            on_entry_click: Some(Box::new(move |entry: &ChangelogEntry| {
                clicked.borrow_mut().push(format!("entry:{}", entry.id))
            })),
        };
        let mut ctrl = controller(WidgetConfig::new("pk"), &store).with_hooks(hooks);
        let ticket = ctrl.init().expect("ticket");
        ctrl.complete_load(ticket, Ok(entries()));

        ctrl.toggle();
        ctrl.handle_action(UiAction::OpenEntry("1".into()));
        ctrl.handle_action(UiAction::OpenEntry("missing".into()));
        ctrl.toggle();

        assert_eq!(*events.borrow(), vec!["open", "entry:1", "close"]);
    }

    #[test]
    fn trigger_mode_binds_and_syncs_badges() {
        let store = Rc::new(MemoryWatermarkStore::new());
        let mut config = WidgetConfig::new("pk");
        config.mode = DisplayMode::Trigger;
        config.trigger_selector = "#whats-new".into();
        let mut ctrl = Controller::new(config, MemoryTarget::with_triggers(2), Rc::clone(&store));

        let ticket = ctrl.init().expect("ticket");
        assert_eq!(ctrl.target().bound_selector.as_deref(), Some("#whats-new"));
        ctrl.complete_load(ticket, Ok(entries()));
        assert_eq!(ctrl.target().trigger_badge, Some(2));

        ctrl.toggle_at(Anchor { top: 10.0, left: 20.0 });
        assert_eq!(ctrl.target().trigger_badge, Some(0));
        assert!(ctrl.target().html.contains("top:10px;left:20px;"));

        ctrl.destroy();
        assert_eq!(ctrl.target().bound_selector, None);
        assert!(!ctrl.target().mounted);
    }

    #[test]
    fn trigger_badges_refresh_after_failed_load() {
        let store = Rc::new(MemoryWatermarkStore::new());
        let mut config = WidgetConfig::new("pk");
        config.mode = DisplayMode::Trigger;
        let mut ctrl = Controller::new(config, MemoryTarget::with_triggers(1), Rc::clone(&store));

        let ticket = ctrl.init().expect("ticket");
        assert_eq!(ctrl.target().trigger_badge, None);
        let renders = ctrl.target().render_count;

        let outcome = ctrl.complete_load(ticket, Err(WidgetError::FetchFailed("rate limited".into())));
        assert_eq!(outcome, LoadOutcome::Applied);
        assert_eq!(ctrl.target().trigger_badge, Some(0));
        assert_eq!(ctrl.target().render_count, renders + 1);
        assert_eq!(ctrl.state().error.as_deref(), Some("rate limited"));
        assert!(!ctrl.state().is_loading);

        ctrl.toggle_at(Anchor { top: 4.0, left: 8.0 });
        assert!(ctrl.target().html.contains("rate limited"));
        assert!(ctrl.target().html.contains(r#"data-action="retry""#));
    }

    #[test]
    fn storage_failure_degrades_to_memory() {
        let store = Rc::new(MemoryWatermarkStore::unavailable());
        let mut ctrl = controller(WidgetConfig::new("pk"), &store);
        let ticket = ctrl.init().expect("ticket");
        ctrl.complete_load(ticket, Ok(entries()));
        assert_eq!(ctrl.unread_count(), 2);

        ctrl.open();
        assert_eq!(ctrl.unread_count(), 0);
        assert_eq!(ctrl.watermark(), 2000);

        let ticket = ctrl.retry().expect("ticket");
        ctrl.complete_load(ticket, Ok(entries()));
        assert_eq!(ctrl.unread_count(), 0);
    }

    #[test]
    fn commands_map_to_controller_operations() {
        let store = Rc::new(MemoryWatermarkStore::new());
        let mut ctrl = controller(WidgetConfig::new("pk"), &store);
        let ticket = ctrl.init().expect("ticket");
        ctrl.complete_load(ticket, Ok(entries()));

        assert_eq!(
            ctrl.handle_command(ChangelogCommand::GetUnreadCount),
            Some(CommandReply::UnreadCount(2))
        );
        assert_eq!(ctrl.handle_command(ChangelogCommand::MarkRead), Some(CommandReply::Done));
        assert_eq!(ctrl.unread_count(), 0);
        assert!(!ctrl.state().is_open);
        ctrl.handle_command(ChangelogCommand::Open);
        assert!(ctrl.state().is_open);
        ctrl.handle_command(ChangelogCommand::Close);
        assert!(!ctrl.state().is_open);
    }

    #[test]
    fn failed_mount_leaves_widget_inert() {
        let store = Rc::new(MemoryWatermarkStore::new());
        let target = MemoryTarget {
            fail_mount: true,
            ..MemoryTarget::default()
        };
        let mut ctrl = Controller::new(WidgetConfig::new("pk"), target, store);

        assert!(ctrl.init().is_none());
        assert_eq!(ctrl.lifecycle(), Lifecycle::Destroyed);
        ctrl.open();
        assert!(ctrl.retry().is_none());
        assert_eq!(ctrl.target().render_count, 0);
    }
}
