//! Configuration resolution: global config object first, script attributes second.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::model::{DisplayMode, Position, Theme, WidgetConfig};
use crate::WidgetError;

/// Shape of the host page's global config object. Every field is optional, and
/// a field of the wrong type is dropped with a warning instead of failing the
/// whole object.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverrides {
    #[serde(default, deserialize_with = "lenient::public_key")]
    pub public_key: Option<String>,
    #[serde(default, deserialize_with = "lenient::api_base")]
    pub api_base: Option<String>,
    #[serde(default, deserialize_with = "lenient::mode")]
    pub mode: Option<String>,
    #[serde(default, deserialize_with = "lenient::position")]
    pub position: Option<String>,
    #[serde(default, deserialize_with = "lenient::theme")]
    pub theme: Option<String>,
    #[serde(default, deserialize_with = "lenient::color")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "lenient::max_entries")]
    pub max_entries: Option<u32>,
    #[serde(default, deserialize_with = "lenient::trigger_selector")]
    pub trigger_selector: Option<String>,
    #[serde(default, deserialize_with = "lenient::auto_open_for_new")]
    pub auto_open_for_new: Option<bool>,
    #[serde(default, deserialize_with = "lenient::z_index")]
    pub z_index: Option<i32>,
    #[serde(default, deserialize_with = "lenient::debug")]
    pub debug: Option<bool>,
}

impl ConfigOverrides {
    fn has_public_key(&self) -> bool {
        non_empty(self.public_key.as_deref()).is_some()
    }
}

impl TryFrom<ConfigOverrides> for WidgetConfig {
    type Error = WidgetError;

    fn try_from(cfg: ConfigOverrides) -> Result<Self, Self::Error> {
        let public_key =
            non_empty(cfg.public_key.as_deref()).ok_or(WidgetError::MissingPublicKey)?;
        let mut base = WidgetConfig::new(public_key);

        if let Some(api_base) = non_empty(cfg.api_base.as_deref()) {
            base.api_base = api_base;
        }
        if let Some(raw) = cfg.mode.as_deref() {
            base.mode = parse_or_default(raw, "mode", DisplayMode::parse);
        }
        if let Some(raw) = cfg.position.as_deref() {
            base.position = parse_or_default(raw, "position", Position::parse);
        }
        if let Some(raw) = cfg.theme.as_deref() {
            base.theme = parse_or_default(raw, "theme", Theme::parse);
        }
        if let Some(color) = non_empty(cfg.color.as_deref()) {
            base.color = color;
        }
        if let Some(max) = cfg.max_entries.filter(|max| *max > 0) {
            base.max_entries = max;
        }
        if let Some(selector) = non_empty(cfg.trigger_selector.as_deref()) {
            base.trigger_selector = selector;
        }
        if let Some(auto_open) = cfg.auto_open_for_new {
            base.auto_open_for_new = auto_open;
        }
        if let Some(z_index) = cfg.z_index {
            base.z_index = z_index;
        }
        if let Some(debug) = cfg.debug {
            base.debug = debug;
        }
        Ok(base)
    }
}

/// `data-*` attributes read from the bootstrap `<script>` tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptAttributes {
    values: BTreeMap<String, String>,
}

impl ScriptAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an attribute; names are kept with their `data-` prefix.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn to_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            public_key: self.get("data-public-key").map(str::to_string),
            api_base: self.get("data-api-base").map(str::to_string),
            mode: self.get("data-mode").map(str::to_string),
            position: self.get("data-position").map(str::to_string),
            theme: self.get("data-theme").map(str::to_string),
            color: self.get("data-color").map(str::to_string),
            max_entries: self.get("data-max-entries").and_then(|raw| {
                let parsed = raw.trim().parse::<u32>().ok().filter(|max| *max > 0);
                if parsed.is_none() {
                    log::warn!("ignoring invalid data-max-entries value {raw:?}");
                }
                parsed
            }),
            trigger_selector: self.get("data-trigger-selector").map(str::to_string),
            auto_open_for_new: self.get("data-auto-open").map(|raw| raw == "true"),
            z_index: self
                .get("data-z-index")
                .and_then(|raw| raw.trim().parse::<i32>().ok()),
            debug: self.get("data-debug").map(|raw| raw == "true"),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ScriptAttributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Self::new();
        for (name, value) in iter {
            attrs.insert(name, value);
        }
        attrs
    }
}

/// Picks the configuration source. A global object carrying a public key always
/// wins; script attributes are only consulted when it is absent.
pub fn resolve_config(
    global: Option<ConfigOverrides>,
    script: Option<&ScriptAttributes>,
) -> Result<WidgetConfig, WidgetError> {
    if let Some(global) = global.filter(ConfigOverrides::has_public_key) {
        return WidgetConfig::try_from(global);
    }

    match script {
        Some(attrs) => WidgetConfig::try_from(attrs.to_overrides()),
        None => Err(WidgetError::MissingPublicKey),
    }
}

fn parse_or_default<T: Default>(raw: &str, field: &str, parse: fn(&str) -> Option<T>) -> T {
    parse(raw).unwrap_or_else(|| {
        log::warn!("unknown {field} {raw:?}, using default");
        T::default()
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Per-field decoders for [`ConfigOverrides`]. Host pages hand-write this
/// object, so `"5"` is accepted where a number is expected and anything
/// unusable becomes `None`.
mod lenient {
    use serde::de::IgnoredAny;
    use serde::{Deserialize, Deserializer};

    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Null,
        Bool(bool),
        Int(i64),
        Float(f64),
        Text(String),
        Other(IgnoredAny),
    }

    impl Loose {
        fn integer(&self) -> Option<i64> {
            match self {
                Self::Int(value) => Some(*value),
                Self::Float(value) if value.fract() == 0.0 => Some(*value as i64),
                Self::Text(raw) => raw.trim().parse().ok(),
                _ => None,
            }
        }
    }

    fn decode<'de, D, T>(
        deserializer: D,
        field: &str,
        convert: fn(&Loose) -> Option<T>,
    ) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Loose::deserialize(deserializer)?;
        if matches!(raw, Loose::Null) {
            return Ok(None);
        }
        let value = convert(&raw);
        if value.is_none() {
            log::warn!("ignoring invalid {field} value {raw:?}");
        }
        Ok(value)
    }

    fn text(raw: &Loose) -> Option<String> {
        match raw {
            Loose::Text(value) => Some(value.clone()),
            _ => None,
        }
    }

    fn unsigned(raw: &Loose) -> Option<u32> {
        raw.integer().and_then(|value| u32::try_from(value).ok())
    }

    fn signed(raw: &Loose) -> Option<i32> {
        raw.integer().and_then(|value| i32::try_from(value).ok())
    }

    fn flag(raw: &Loose) -> Option<bool> {
        match raw {
            Loose::Bool(value) => Some(*value),
            Loose::Text(value) => match value.trim() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    macro_rules! field {
        ($name:ident, $label:literal, $ty:ty, $convert:expr) => {
            pub fn $name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<$ty>, D::Error> {
                decode(deserializer, $label, $convert)
            }
        };
    }

    field!(public_key, "publicKey", String, text);
    field!(api_base, "apiBase", String, text);
    field!(mode, "mode", String, text);
    field!(position, "position", String, text);
    field!(theme, "theme", String, text);
    field!(color, "color", String, text);
    field!(max_entries, "maxEntries", u32, unsigned);
    field!(trigger_selector, "triggerSelector", String, text);
    field!(auto_open_for_new, "autoOpenForNew", bool, flag);
    field!(z_index, "zIndex", i32, signed);
    field!(debug, "debug", bool, flag);
}
