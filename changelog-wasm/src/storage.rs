#![cfg(target_arch = "wasm32")]

use changelog_core::unread::{parse_watermark, storage_key};
use changelog_core::{WatermarkStore, WidgetError};
use web_sys::Storage;

/// Watermarks in `window.localStorage`, one key per public key.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorageStore;

impl LocalStorageStore {
    fn storage() -> Result<Storage, WidgetError> {
        let window = web_sys::window()
            .ok_or_else(|| WidgetError::StorageUnavailable("window is unavailable".into()))?;
        window
            .local_storage()
            .map_err(|err| WidgetError::StorageUnavailable(format!("{err:?}")))?
            .ok_or_else(|| WidgetError::StorageUnavailable("localStorage is disabled".into()))
    }
}

impl WatermarkStore for LocalStorageStore {
    fn load(&self, public_key: &str) -> Result<Option<i64>, WidgetError> {
        let raw = Self::storage()?
            .get_item(&storage_key(public_key))
            .map_err(|err| WidgetError::StorageUnavailable(format!("{err:?}")))?;
        Ok(raw.as_deref().and_then(parse_watermark))
    }

    fn store(&self, public_key: &str, watermark: i64) -> Result<(), WidgetError> {
        Self::storage()?
            .set_item(&storage_key(public_key), &watermark.to_string())
            .map_err(|err| WidgetError::StorageUnavailable(format!("{err:?}")))
    }
}
