#![cfg(target_arch = "wasm32")]

use async_trait::async_trait;
use changelog_api::{bearer_header, changelog_url, decode_response};
use changelog_core::{ChangelogEntry, ChangelogSource, WidgetConfig, WidgetError, GENERIC_FETCH_ERROR};
use gloo_net::http::Request;

/// Fetches entries from the changelog endpoint with the board's public key.
pub struct HttpChangelogClient {
    api_base: String,
    public_key: String,
}

impl HttpChangelogClient {
    pub fn new(config: &WidgetConfig) -> Self {
        Self {
            api_base: config.api_base.clone(),
            public_key: config.public_key.clone(),
        }
    }
}

#[async_trait(?Send)]
impl ChangelogSource for HttpChangelogClient {
    async fn fetch_entries(&self, limit: Option<u32>) -> Result<Vec<ChangelogEntry>, WidgetError> {
        let url = changelog_url(&self.api_base, limit);
        let response = Request::get(&url)
            .header("Authorization", &bearer_header(&self.public_key))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|err| {
                log::warn!("changelog request to {url} failed: {err}");
                WidgetError::FetchFailed(GENERIC_FETCH_ERROR.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            log::warn!("could not read changelog response: {err}");
            WidgetError::FetchFailed(GENERIC_FETCH_ERROR.to_string())
        })?;

        decode_response(status, &body)
    }
}
