//! Browser adapter for the Signalboard changelog widget.
//!
//! Loading the module as a script runs [`boot`], which reads
//! `window.SignalboardChangelogConfig` or the `data-*` attributes of the
//! bootstrap `<script>` tag and mounts the widget into a shadow root.
//! Everything browser-specific is compiled for `wasm32` only.

#[cfg(target_arch = "wasm32")]
pub mod bridge;
#[cfg(target_arch = "wasm32")]
mod client;
#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod logger;
#[cfg(target_arch = "wasm32")]
pub mod storage;
#[cfg(target_arch = "wasm32")]
mod widget;

#[cfg(target_arch = "wasm32")]
pub use client::HttpChangelogClient;
#[cfg(target_arch = "wasm32")]
pub use dom::{ShadowTarget, TargetEvent};
#[cfg(target_arch = "wasm32")]
pub use widget::{boot, init_changelog_widget, ChangelogWidget, GLOBAL_CONFIG_NAME};

#[cfg(not(target_arch = "wasm32"))]
pub fn init_changelog_widget(_: wasm_bindgen::JsValue) -> Result<(), wasm_bindgen::JsValue> {
    Err(wasm_bindgen::JsValue::from_str(
        "changelog-wasm only supports the wasm32 target",
    ))
}
