//! Core model and platform-independent logic for the embeddable changelog widget.

pub mod command;
pub mod config;
mod error;
mod model;
mod source;
pub mod unread;

pub use command::{ChangelogCommand, Command, CommandHandler, CommandRegistry, CommandReply, Dispatch, HandlerId};
pub use config::{resolve_config, ConfigOverrides, ScriptAttributes};
pub use error::{WidgetError, GENERIC_FETCH_ERROR};
pub use model::{
    Anchor, ChangelogEntry, DisplayMode, FeedbackRef, Position, ResolvedTheme, Theme, WidgetConfig,
    WidgetState,
};
pub use source::ChangelogSource;
pub use unread::{compute_unread_count, latest_published_at, MemoryWatermarkStore, WatermarkStore};
