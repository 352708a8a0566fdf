/// Errors surfaced by the session and its transport.
///
/// Decode failures on individual frames are logged and swallowed by the
/// dispatcher; only transport and shutdown conditions reach callers.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame too short: {0:?}")]
    ShortFrame(String),
    #[error("session closed")]
    SessionClosed,
    #[error("fatal failure from server: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, BotError>;
