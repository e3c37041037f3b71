//! Framework-free rendering and controller logic for the changelog widget.

pub mod controller;
pub mod node;
pub mod styles;
pub mod target;
pub mod views;

pub use controller::{run_load, Controller, Lifecycle, LoadOutcome, LoadTicket, WidgetHooks};
pub use node::{escape_html, Element, Node};
pub use styles::{adjust_color, generate_styles, StyleOptions};
pub use target::{MemoryTarget, RenderTarget, UiAction, ACTION_ATTR, ENTRY_ID_ATTR, TRIGGER_BADGE_ATTR};
pub use views::{render_widget, ViewContext};
