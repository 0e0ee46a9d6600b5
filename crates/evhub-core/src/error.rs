// Evhub Errors
// Error taxonomy shared by the hub and its queries

/// Result type for hub operations
pub type HubResult<T> = Result<T, HubError>;

/// Errors surfaced by the event hub
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("hub has not opened the platform input yet")]
    Uninitialized,

    #[error("no such device or mapping")]
    NotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("out of memory: {0}")]
    OutOfMemory(String),
}

impl HubError {
    /// Whether this error means the referenced id or mapping is unknown.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HubError::NotFound)
    }
}
