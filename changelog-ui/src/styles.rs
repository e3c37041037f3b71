//! Style generator: brand color, stacking order and theme in, CSS out.

use changelog_core::ResolvedTheme;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleOptions<'a> {
    pub color: &'a str,
    pub z_index: i32,
    pub theme: ResolvedTheme,
}

struct Palette {
    background: &'static str,
    surface: &'static str,
    text: &'static str,
    muted: &'static str,
    border: &'static str,
    shadow: &'static str,
}

const LIGHT: Palette = Palette {
    background: "#ffffff",
    surface: "#f8fafc",
    text: "#0f172a",
    muted: "#64748b",
    border: "rgba(15, 23, 42, 0.08)",
    shadow: "0 18px 48px rgba(15, 23, 42, 0.18)",
};

const DARK: Palette = Palette {
    background: "#0f172a",
    surface: "#1e293b",
    text: "#f1f5f9",
    muted: "#94a3b8",
    border: "rgba(255, 255, 255, 0.08)",
    shadow: "0 18px 48px rgba(0, 0, 0, 0.45)",
};

const FALLBACK_COLOR: &str = "#6366f1";

/// Full stylesheet for the isolated render root.
pub fn generate_styles(options: &StyleOptions<'_>) -> String {
    let palette = match options.theme {
        ResolvedTheme::Light => &LIGHT,
        ResolvedTheme::Dark => &DARK,
    };
    let brand = if parse_hex(options.color).is_some() {
        options.color.trim()
    } else {
        FALLBACK_COLOR
    };
    let brand_hover = adjust_color(brand, -20);
    let brand_soft = adjust_color(brand, 160);
    let on_brand = contrast_text(brand);

    format!(
        ":host {{\n  all: initial;\n  --sb-z-index: {z_index};\n  --sb-brand: {brand};\n  --sb-brand-hover: {brand_hover};\n  --sb-brand-soft: {brand_soft};\n  --sb-on-brand: {on_brand};\n  --sb-bg: {bg};\n  --sb-surface: {surface};\n  --sb-text: {text};\n  --sb-muted: {muted};\n  --sb-border: {border};\n  --sb-shadow: {shadow};\n  color-scheme: {scheme};\n}}\n{BASE_STYLES}",
        z_index = options.z_index,
        bg = palette.background,
        surface = palette.surface,
        text = palette.text,
        muted = palette.muted,
        border = palette.border,
        shadow = palette.shadow,
        scheme = options.theme.as_str(),
    )
}

/// Shifts every RGB channel by `amount`, clamped to `0..=255`. Accepts `#rgb`
/// and `#rrggbb`; anything else is returned unchanged.
pub fn adjust_color(color: &str, amount: i32) -> String {
    let Some((r, g, b)) = parse_hex(color) else {
        return color.to_string();
    };
    let shift = |channel: u8| (i32::from(channel) + amount).clamp(0, 255);
    format!("#{:02x}{:02x}{:02x}", shift(r), shift(g), shift(b))
}

/// Black or white, whichever reads better on `color` (YIQ brightness).
pub fn contrast_text(color: &str) -> &'static str {
    match parse_hex(color) {
        Some((r, g, b)) => {
            let yiq = (u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114) / 1000;
            if yiq >= 128 {
                "#000000"
            } else {
                "#ffffff"
            }
        }
        None => "#ffffff",
    }
}

pub fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.trim().strip_prefix('#')?;
    if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        3 => {
            let digit = |idx: usize| u8::from_str_radix(&hex[idx..=idx], 16).ok().map(|v| v * 17);
            Some((digit(0)?, digit(1)?, digit(2)?))
        }
        6 => {
            let pair = |idx: usize| u8::from_str_radix(&hex[idx..idx + 2], 16).ok();
            Some((pair(0)?, pair(2)?, pair(4)?))
        }
        _ => None,
    }
}

const BASE_STYLES: &str = r#"
*, *::before, *::after {
  box-sizing: border-box;
}

.sb-root {
  position: fixed;
  bottom: 20px;
  z-index: var(--sb-z-index);
  font-family: 'Inter', system-ui, -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
  font-size: 14px;
  line-height: 1.5;
  color: var(--sb-text);
}

.sb-root[data-position="bottom-right"] {
  right: 20px;
}

.sb-root[data-position="bottom-left"] {
  left: 20px;
}

.sb-root[data-mode="trigger"] {
  bottom: auto;
}

.sb-launcher {
  display: inline-flex;
  align-items: center;
  gap: 8px;
  border: none;
  border-radius: 999px;
  padding: 10px 16px;
  background: var(--sb-brand);
  color: var(--sb-on-brand);
  font: inherit;
  font-weight: 600;
  cursor: pointer;
  box-shadow: var(--sb-shadow);
}

.sb-launcher:hover {
  background: var(--sb-brand-hover);
}

.sb-badge {
  min-width: 20px;
  height: 20px;
  padding: 0 6px;
  border-radius: 999px;
  background: #ef4444;
  color: #ffffff;
  font-size: 12px;
  font-weight: 700;
  display: inline-flex;
  align-items: center;
  justify-content: center;
}

.sb-card {
  width: 320px;
  padding: 16px;
  border-radius: 14px;
  border: 1px solid var(--sb-border);
  background: var(--sb-bg);
  box-shadow: var(--sb-shadow);
  cursor: pointer;
}

.sb-card-header {
  display: flex;
  align-items: center;
  justify-content: space-between;
}

.sb-card-eyebrow {
  font-size: 12px;
  font-weight: 600;
  text-transform: uppercase;
  letter-spacing: 0.04em;
  color: var(--sb-brand);
}

.sb-card-title {
  margin: 8px 0 4px;
  font-weight: 600;
}

.sb-card-excerpt {
  margin: 0;
  color: var(--sb-muted);
}

.sb-panel {
  width: 380px;
  max-height: min(560px, calc(100vh - 40px));
  display: flex;
  flex-direction: column;
  border-radius: 16px;
  border: 1px solid var(--sb-border);
  background: var(--sb-bg);
  box-shadow: var(--sb-shadow);
  overflow: hidden;
}

.sb-panel-header {
  display: flex;
  align-items: center;
  justify-content: space-between;
  padding: 14px 18px;
  background: var(--sb-brand);
  color: var(--sb-on-brand);
}

.sb-panel-title {
  margin: 0;
  font-size: 16px;
}

.sb-close {
  border: none;
  background: transparent;
  color: inherit;
  font-size: 22px;
  line-height: 1;
  cursor: pointer;
}

.sb-panel-body {
  flex: 1;
  overflow-y: auto;
  padding: 12px 18px;
}

.sb-panel-footer {
  padding: 10px 18px;
  font-size: 12px;
  text-align: center;
  color: var(--sb-muted);
  border-top: 1px solid var(--sb-border);
  background: var(--sb-surface);
}

.sb-entry {
  padding: 14px 0;
  border-bottom: 1px solid var(--sb-border);
  cursor: pointer;
}

.sb-entry:last-child {
  border-bottom: none;
}

.sb-entry-meta {
  display: flex;
  flex-wrap: wrap;
  align-items: center;
  gap: 6px;
  font-size: 12px;
  color: var(--sb-muted);
}

.sb-new {
  padding: 1px 8px;
  border-radius: 999px;
  background: var(--sb-brand-soft);
  color: var(--sb-brand-hover);
  font-weight: 700;
}

.sb-version {
  padding: 1px 8px;
  border-radius: 999px;
  background: var(--sb-surface);
  font-variant-numeric: tabular-nums;
}

.sb-entry-title {
  margin: 6px 0 4px;
  font-size: 15px;
}

.sb-entry-description {
  margin: 0;
  color: var(--sb-muted);
  white-space: pre-line;
}

.sb-feedback {
  margin-top: 8px;
  font-size: 12px;
}

.sb-feedback-label {
  color: var(--sb-muted);
}

.sb-feedback ul {
  margin: 4px 0 0;
  padding-left: 18px;
}

.sb-empty {
  margin: 24px 0;
  text-align: center;
  color: var(--sb-muted);
}

.sb-error {
  margin: 24px 0;
  text-align: center;
}

.sb-error-message {
  margin: 0 0 12px;
  color: #dc2626;
}

.sb-retry {
  border: 1px solid var(--sb-border);
  border-radius: 8px;
  padding: 6px 14px;
  background: var(--sb-surface);
  color: var(--sb-text);
  font: inherit;
  cursor: pointer;
}

.sb-loading {
  display: flex;
  justify-content: center;
  padding: 32px 0;
}

.sb-spinner {
  width: 28px;
  height: 28px;
  border-radius: 50%;
  border: 3px solid var(--sb-border);
  border-top-color: var(--sb-brand);
  animation: sb-spin 0.8s linear infinite;
}

@keyframes sb-spin {
  to {
    transform: rotate(360deg);
  }
}

@media (max-width: 480px) {
  .sb-panel,
  .sb-card {
    width: calc(100vw - 24px);
  }

  .sb-root[data-position="bottom-right"] {
    right: 12px;
  }

  .sb-root[data-position="bottom-left"] {
    left: 12px;
  }
}
"#;
