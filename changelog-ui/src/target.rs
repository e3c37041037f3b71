//! Render target capability and the delegated UI actions it reports back.

use changelog_core::WidgetError;

use crate::node::Node;

/// Attribute naming the action of a clickable node.
pub const ACTION_ATTR: &str = "data-action";
/// Attribute carrying the entry id on entry blocks.
pub const ENTRY_ID_ATTR: &str = "data-entry-id";
/// Marks unread badges inside host-page trigger elements.
pub const TRIGGER_BADGE_ATTR: &str = "data-signalboard-badge";

/// User interaction resolved from a delegated click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    Open,
    Close,
    Retry,
    OpenEntry(String),
}

impl UiAction {
    /// Maps the `data-action` / `data-entry-id` pair of the clicked node.
    pub fn from_attributes(action: &str, entry_id: Option<&str>) -> Option<Self> {
        match action {
            "open" => Some(Self::Open),
            "close" => Some(Self::Close),
            "retry" => Some(Self::Retry),
            "entry" => entry_id.map(|id| Self::OpenEntry(id.to_string())),
            _ => None,
        }
    }
}

/// Where the widget draws itself: a shadow root, an iframe, or a native view.
///
/// `render` always receives the complete view and replaces whatever was shown
/// before. Implementations dispatch clicks on nodes carrying [`ACTION_ATTR`]
/// back to the controller as [`UiAction`]s.
pub trait RenderTarget {
    fn mount(&mut self) -> Result<(), WidgetError>;

    /// Host color-scheme preference, consulted once to resolve `Theme::Auto`.
    fn prefers_dark_scheme(&self) -> bool;

    /// Installs the stylesheet. Calls after the first are ignored.
    fn inject_style_once(&mut self, css: &str) -> Result<(), WidgetError>;

    fn render(&mut self, view: &Node) -> Result<(), WidgetError>;

    /// Attaches click listeners to host elements matching `selector` and
    /// returns how many were bound.
    fn bind_triggers(&mut self, selector: &str) -> Result<usize, WidgetError>;

    fn sync_trigger_badges(&mut self, unread: usize);

    fn unbind_triggers(&mut self);

    fn unmount(&mut self);
}

/// Render target that keeps everything in memory. Used for previews and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryTarget {
    pub mounted: bool,
    pub prefers_dark: bool,
    pub styles: Vec<String>,
    pub html: String,
    pub last_view: Option<Node>,
    pub render_count: usize,
    pub bound_selector: Option<String>,
    pub trigger_count: usize,
    pub trigger_badge: Option<usize>,
    pub fail_mount: bool,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretends `count` host elements match the trigger selector.
    pub fn with_triggers(count: usize) -> Self {
        Self {
            trigger_count: count,
            ..Self::default()
        }
    }
}

impl RenderTarget for MemoryTarget {
    fn mount(&mut self) -> Result<(), WidgetError> {
        if self.fail_mount {
            return Err(WidgetError::Render("document body is unavailable".into()));
        }
        self.mounted = true;
        Ok(())
    }

    fn prefers_dark_scheme(&self) -> bool {
        self.prefers_dark
    }

    fn inject_style_once(&mut self, css: &str) -> Result<(), WidgetError> {
        if self.styles.is_empty() {
            self.styles.push(css.to_string());
        }
        Ok(())
    }

    fn render(&mut self, view: &Node) -> Result<(), WidgetError> {
        if !self.mounted {
            return Err(WidgetError::Render("render root is not mounted".into()));
        }
        self.html = view.to_html();
        self.last_view = Some(view.clone());
        self.render_count += 1;
        Ok(())
    }

    fn bind_triggers(&mut self, selector: &str) -> Result<usize, WidgetError> {
        self.bound_selector = Some(selector.to_string());
        Ok(self.trigger_count)
    }

    fn sync_trigger_badges(&mut self, unread: usize) {
        if self.bound_selector.is_some() {
            self.trigger_badge = Some(unread);
        }
    }

    fn unbind_triggers(&mut self) {
        self.bound_selector = None;
        self.trigger_badge = None;
    }

    fn unmount(&mut self) {
        self.mounted = false;
        self.html.clear();
        self.last_view = None;
    }
}
