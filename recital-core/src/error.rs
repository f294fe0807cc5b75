use thiserror::Error;

/// All errors produced by recital-core.
#[derive(Debug, Error)]
pub enum RecitalError {
    #[error("microphone access denied")]
    MicPermissionDenied,

    #[error("no capture device found")]
    NoCaptureDevice,

    #[error("recognizer error: {0}")]
    Recognizer(String),

    #[error("script acquisition failed: {0}")]
    ScriptFetch(String),

    #[error("score persistence failed: {0}")]
    ScorePersist(String),

    #[error("no script prepared — call prepare() first")]
    NoScript,

    #[error("a session is already running")]
    AlreadyRunning,

    #[error("no session is running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RecitalError>;
