use serde::{Deserialize, Serialize};

/// One published changelog entry as served by the remote API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Epoch milliseconds. Drafts have no publish time.
    #[serde(default)]
    pub published_at: Option<i64>,
    #[serde(default)]
    pub feedback: Vec<FeedbackRef>,
}

impl ChangelogEntry {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            version: None,
            published_at: None,
            feedback: Vec::new(),
        }
    }

    pub fn published(mut self, at_ms: i64) -> Self {
        self.published_at = Some(at_ms);
        self
    }

    /// Whether the entry was published after the given watermark.
    pub fn is_newer_than(&self, watermark: i64) -> bool {
        self.published_at.is_some_and(|at| at > watermark)
    }
}

/// Feedback item linked to a changelog entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedbackRef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Card,
    #[default]
    Popup,
    Trigger,
}

impl DisplayMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "card" => Some(Self::Card),
            "popup" => Some(Self::Popup),
            "trigger" => Some(Self::Trigger),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    BottomRight,
    BottomLeft,
}

impl Position {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bottom-right" => Some(Self::BottomRight),
            "bottom-left" => Some(Self::BottomLeft),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BottomRight => "bottom-right",
            Self::BottomLeft => "bottom-left",
        }
    }
}

/// Theme requested by the host page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Auto,
}

impl Theme {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    /// Resolves `Auto` against the host's color-scheme preference.
    pub fn resolve(self, prefers_dark: bool) -> ResolvedTheme {
        match self {
            Self::Light => ResolvedTheme::Light,
            Self::Dark => ResolvedTheme::Dark,
            Self::Auto if prefers_dark => ResolvedTheme::Dark,
            Self::Auto => ResolvedTheme::Light,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTheme {
    Light,
    Dark,
}

impl ResolvedTheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

pub const DEFAULT_API_BASE: &str = "https://app.signalboard.io";
pub const DEFAULT_COLOR: &str = "#6366f1";
pub const DEFAULT_MAX_ENTRIES: u32 = 10;
pub const DEFAULT_TRIGGER_SELECTOR: &str = "[data-signalboard-changelog]";
pub const DEFAULT_Z_INDEX: i32 = 2_147_483_000;

/// Widget configuration, fixed for the lifetime of a widget instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WidgetConfig {
    pub public_key: String,
    pub api_base: String,
    pub mode: DisplayMode,
    pub position: Position,
    pub theme: Theme,
    pub color: String,
    pub max_entries: u32,
    pub trigger_selector: String,
    pub auto_open_for_new: bool,
    pub z_index: i32,
    pub debug: bool,
}

impl WidgetConfig {
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            mode: DisplayMode::default(),
            position: Position::default(),
            theme: Theme::default(),
            color: DEFAULT_COLOR.to_string(),
            max_entries: DEFAULT_MAX_ENTRIES,
            trigger_selector: DEFAULT_TRIGGER_SELECTOR.to_string(),
            auto_open_for_new: false,
            z_index: DEFAULT_Z_INDEX,
            debug: false,
        }
    }
}

/// Viewport position of the trigger element that opened the panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub top: f64,
    pub left: f64,
}

/// Mutable widget state owned by the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetState {
    pub is_open: bool,
    pub is_loading: bool,
    pub entries: Vec<ChangelogEntry>,
    pub unread_count: usize,
    pub error: Option<String>,
    pub anchor: Option<Anchor>,
}

impl Default for WidgetState {
    fn default() -> Self {
        Self {
            is_open: false,
            is_loading: true,
            entries: Vec::new(),
            unread_count: 0,
            error: None,
            anchor: None,
        }
    }
}
