/// Errors produced while loading, persisting or rendering the widget.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WidgetError {
    #[error("{0}")]
    FetchFailed(String),
    #[error("Malformed changelog response: {0}")]
    MalformedResponse(String),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Render failed: {0}")]
    Render(String),
    #[error("Missing public key")]
    MissingPublicKey,
}

pub const GENERIC_FETCH_ERROR: &str = "Failed to load changelog";

impl WidgetError {
    /// Text shown to the visitor in the error block.
    pub fn user_message(&self) -> String {
        match self {
            Self::FetchFailed(message) if !message.trim().is_empty() => message.clone(),
            Self::FetchFailed(_) | Self::MalformedResponse(_) => GENERIC_FETCH_ERROR.to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::FetchFailed(_) | Self::MalformedResponse(_))
    }
}
