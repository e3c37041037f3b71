use async_trait::async_trait;

use crate::model::ChangelogEntry;
use crate::WidgetError;

/// Transport that produces changelog entries. One call means one request;
/// implementations do not cache.
#[async_trait(?Send)]
pub trait ChangelogSource {
    async fn fetch_entries(&self, limit: Option<u32>) -> Result<Vec<ChangelogEntry>, WidgetError>;
}
