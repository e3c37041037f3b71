//! Pure view functions: widget state in, view tree out.

use changelog_core::{Anchor, ChangelogEntry, DisplayMode, FeedbackRef, Position, WidgetState};
use chrono::DateTime;

use crate::node::{Element, Node};
use crate::target::{ACTION_ATTR, ENTRY_ID_ATTR};

const PANEL_TITLE: &str = "What's new";
const EMPTY_LABEL: &str = "No updates yet. Check back soon!";
const RETRY_LABEL: &str = "Try again";
const FOOTER_LABEL: &str = "Powered by Signalboard";
const EXCERPT_CHARS: usize = 120;

/// The slice of configuration the views need.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewContext {
    pub mode: DisplayMode,
    pub position: Position,
    /// Watermark at render time; entries published after it are tagged "New".
    pub watermark: i64,
}

/// Root view for the configured display mode.
pub fn render_widget(state: &WidgetState, ctx: &ViewContext) -> Node {
    let body = match ctx.mode {
        DisplayMode::Card => render_card(state, ctx),
        DisplayMode::Popup if state.is_open => render_panel(state, ctx),
        DisplayMode::Popup => render_launcher(state),
        DisplayMode::Trigger if state.is_open => render_panel(state, ctx),
        DisplayMode::Trigger => Node::empty(),
    };

    let mode = match ctx.mode {
        DisplayMode::Card => "card",
        DisplayMode::Popup => "popup",
        DisplayMode::Trigger => "trigger",
    };

    Element::new("div")
        .class("sb-root")
        .attr("data-mode", mode)
        .attr("data-position", ctx.position.as_str())
        .child(body)
        .into()
}

/// Card mode: a compact teaser for the newest entry, or the panel when open.
pub fn render_card(state: &WidgetState, ctx: &ViewContext) -> Node {
    if state.is_open {
        return render_panel(state, ctx);
    }
    if state.is_loading {
        return Node::empty();
    }
    let Some(latest) = state.entries.first() else {
        return Node::empty();
    };

    let header = Element::new("div")
        .class("sb-card-header")
        .child(Element::new("span").class("sb-card-eyebrow").text(PANEL_TITLE))
        .child(render_badge(state.unread_count));

    let mut card = Element::new("div")
        .class("sb-card")
        .attr("role", "button")
        .attr("tabindex", "0")
        .attr(ACTION_ATTR, "open")
        .child(header)
        .child(Element::new("p").class("sb-card-title").text(latest.title.as_str()));

    if let Some(description) = latest.description.as_deref() {
        card = card.child(
            Element::new("p")
                .class("sb-card-excerpt")
                .text(excerpt(description, EXCERPT_CHARS)),
        );
    }

    card.into()
}

/// Floating launcher button used by popup mode while the panel is closed.
pub fn render_launcher(state: &WidgetState) -> Node {
    Element::new("button")
        .class("sb-launcher")
        .attr("type", "button")
        .attr("aria-label", "Open changelog")
        .attr(ACTION_ATTR, "open")
        .child(Element::new("span").class("sb-launcher-label").text(PANEL_TITLE))
        .child(render_badge(state.unread_count))
        .into()
}

/// Panel shared by popup and trigger modes. The body shows exactly one of
/// error, loading or the entry list.
pub fn render_panel(state: &WidgetState, ctx: &ViewContext) -> Node {
    let header = Element::new("header")
        .class("sb-panel-header")
        .child(Element::new("h2").class("sb-panel-title").text(PANEL_TITLE))
        .child(
            Element::new("button")
                .class("sb-close")
                .attr("type", "button")
                .attr("aria-label", "Close changelog")
                .attr(ACTION_ATTR, "close")
                .text("\u{00d7}"),
        );

    let body = if let Some(error) = state.error.as_deref() {
        render_error(error)
    } else if state.is_loading {
        render_loading()
    } else {
        render_entries(&state.entries, ctx.watermark)
    };

    let footer = Element::new("footer")
        .class("sb-panel-footer")
        .text(FOOTER_LABEL);

    Element::new("div")
        .class("sb-panel")
        .attr("role", "dialog")
        .attr("aria-label", "Changelog")
        .attr_opt("style", state.anchor.map(anchor_style))
        .child(header)
        .child(Element::new("div").class("sb-panel-body").child(body))
        .child(footer)
        .into()
}

pub fn render_error(message: &str) -> Node {
    Element::new("div")
        .class("sb-error")
        .attr("role", "alert")
        .child(Element::new("p").class("sb-error-message").text(message))
        .child(
            Element::new("button")
                .class("sb-retry")
                .attr("type", "button")
                .attr(ACTION_ATTR, "retry")
                .text(RETRY_LABEL),
        )
        .into()
}

pub fn render_loading() -> Node {
    Element::new("div")
        .class("sb-loading")
        .attr("aria-busy", "true")
        .child(Element::new("div").class("sb-spinner"))
        .into()
}

/// Entry list in server order, tagging entries newer than `watermark`.
pub fn render_entries(entries: &[ChangelogEntry], watermark: i64) -> Node {
    if entries.is_empty() {
        return Element::new("p").class("sb-empty").text(EMPTY_LABEL).into();
    }

    Element::new("div")
        .class("sb-entries")
        .children(entries.iter().map(|entry| render_entry(entry, watermark)))
        .into()
}

fn render_entry(entry: &ChangelogEntry, watermark: i64) -> Node {
    let mut meta = Element::new("div").class("sb-entry-meta");
    if entry.is_newer_than(watermark) {
        meta = meta.child(Element::new("span").class("sb-new").text("New"));
    }
    if let Some(version) = entry.version.as_deref() {
        meta = meta.child(Element::new("span").class("sb-version").text(version));
    }
    if let Some(date) = entry.published_at.and_then(format_date) {
        meta = meta.child(Element::new("time").class("sb-date").text(date));
    }

    let mut article = Element::new("article")
        .class("sb-entry")
        .attr(ACTION_ATTR, "entry")
        .attr(ENTRY_ID_ATTR, entry.id.as_str())
        .child(meta)
        .child(Element::new("h3").class("sb-entry-title").text(entry.title.as_str()));

    if let Some(description) = entry.description.as_deref() {
        article = article.child(
            Element::new("p")
                .class("sb-entry-description")
                .text(description),
        );
    }

    if !entry.feedback.is_empty() {
        article = article.child(render_feedback(&entry.feedback));
    }

    article.into()
}

fn render_feedback(items: &[FeedbackRef]) -> Node {
    Element::new("div")
        .class("sb-feedback")
        .child(Element::new("span").class("sb-feedback-label").text("Requested in"))
        .child(
            Element::new("ul").children(items.iter().map(|item| {
                Element::new("li")
                    .attr("data-feedback-id", item.id.as_str())
                    .text(item.title.as_str())
                    .into()
            })),
        )
        .into()
}

fn render_badge(count: usize) -> Node {
    if count == 0 {
        return Node::empty();
    }
    Element::new("span")
        .class("sb-badge")
        .attr("aria-label", format!("{count} unread"))
        .text(count.to_string())
        .into()
}

fn anchor_style(anchor: Anchor) -> String {
    format!(
        "position:fixed;top:{:.0}px;left:{:.0}px;",
        anchor.top.max(0.0),
        anchor.left.max(0.0)
    )
}

/// `Mar 4, 2025` style label, in UTC.
pub fn format_date(published_at: i64) -> Option<String> {
    DateTime::from_timestamp_millis(published_at).map(|dt| dt.format("%b %-d, %Y").to_string())
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}\u{2026}", cut.trim_end())
}
