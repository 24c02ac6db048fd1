use thiserror::Error;

/// Errors surfaced to callers of the push pipeline.
///
/// Delivery failures (non-200 responses, transport errors) are not part of
/// this taxonomy at the public surface: `push()` reports them as `Ok(false)`.
#[derive(Error, Debug)]
pub enum PushError {
    #[error("AccessToken not initialized. Call initialize() first.")]
    NotInitialized,

    #[error("Failed to fetch access token: {0}")]
    TokenFetch(String),

    #[error("Invalid service account credentials: {0}")]
    Credentials(String),

    #[error("Token cache error: {0}")]
    Cache(String),

    #[error("FCM request failed: {0}")]
    Transport(String),

    #[error("Failed to persist notification: {0}")]
    Persistence(String),
}

pub type PushResult<T> = Result<T, PushError>;

impl From<diesel::result::Error> for PushError {
    fn from(err: diesel::result::Error) -> Self {
        PushError::Persistence(err.to_string())
    }
}

impl From<redis::RedisError> for PushError {
    fn from(err: redis::RedisError) -> Self {
        PushError::Cache(err.to_string())
    }
}
