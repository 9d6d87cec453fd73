use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("invalid capture identifier: {0}")]
    InvalidIdentifier(String),
    #[error("failed to acquire tab audio: {0}")]
    Acquisition(String),
    #[error("media context unavailable: {0}")]
    ContextUnavailable(String),
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: String, reply: String },
    #[error("window error: {0}")]
    Window(String),
    #[error("platform error: {0}")]
    Platform(String),
    #[error("failed to decode message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CaptureError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CaptureError::Timeout { .. })
    }
}

/// Runs `fut` under a deadline, mapping expiry to [`CaptureError::Timeout`].
pub async fn with_timeout<F, T>(
    operation: &'static str,
    after: Duration,
    fut: F,
) -> Result<T, CaptureError>
where
    F: Future<Output = Result<T, CaptureError>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => {
            log::error!("⏱️ {} TIMEOUT after {}ms", operation, after.as_millis());
            Err(CaptureError::Timeout { operation, after })
        }
    }
}
