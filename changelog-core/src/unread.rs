//! Unread tracking against the persisted "last seen" watermark.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::model::ChangelogEntry;
use crate::WidgetError;

pub const STORAGE_KEY_PREFIX: &str = "signalboard_changelog_last_seen_";

/// Storage key for a board's watermark.
pub fn storage_key(public_key: &str) -> String {
    format!("{STORAGE_KEY_PREFIX}{public_key}")
}

/// Number of entries published after the watermark.
pub fn compute_unread_count(entries: &[ChangelogEntry], watermark: i64) -> usize {
    entries
        .iter()
        .filter(|entry| entry.is_newer_than(watermark))
        .count()
}

/// Newest publish time among the entries, if any entry is published.
pub fn latest_published_at(entries: &[ChangelogEntry]) -> Option<i64> {
    entries.iter().filter_map(|entry| entry.published_at).max()
}

/// Parses the decimal epoch-ms string kept in storage.
pub fn parse_watermark(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|value| *value >= 0)
}

/// Namespaced key-value store for the visitor's watermark.
pub trait WatermarkStore {
    fn load(&self, public_key: &str) -> Result<Option<i64>, WidgetError>;
    fn store(&self, public_key: &str, watermark: i64) -> Result<(), WidgetError>;
}

impl<T: WatermarkStore + ?Sized> WatermarkStore for Rc<T> {
    fn load(&self, public_key: &str) -> Result<Option<i64>, WidgetError> {
        (**self).load(public_key)
    }

    fn store(&self, public_key: &str, watermark: i64) -> Result<(), WidgetError> {
        (**self).store(public_key, watermark)
    }
}

/// In-process store. Keeps the same key and value format as browser storage.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    values: RefCell<HashMap<String, String>>,
    unavailable: Cell<bool>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every read and write fails, as in private browsing.
    pub fn unavailable() -> Self {
        let store = Self::default();
        store.unavailable.set(true);
        store
    }

    pub fn with_watermark(public_key: &str, watermark: i64) -> Self {
        let store = Self::default();
        store
            .values
            .borrow_mut()
            .insert(storage_key(public_key), watermark.to_string());
        store
    }

    /// Raw stored string for a board.
    pub fn raw(&self, public_key: &str) -> Option<String> {
        self.values.borrow().get(&storage_key(public_key)).cloned()
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn load(&self, public_key: &str) -> Result<Option<i64>, WidgetError> {
        if self.unavailable.get() {
            return Err(WidgetError::StorageUnavailable("storage disabled".into()));
        }
        Ok(self
            .values
            .borrow()
            .get(&storage_key(public_key))
            .and_then(|raw| parse_watermark(raw)))
    }

    fn store(&self, public_key: &str, watermark: i64) -> Result<(), WidgetError> {
        if self.unavailable.get() {
            return Err(WidgetError::StorageUnavailable("storage disabled".into()));
        }
        self.values
            .borrow_mut()
            .insert(storage_key(public_key), watermark.to_string());
        Ok(())
    }
}
