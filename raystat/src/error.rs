use thiserror::Error;

/// Failures of one decode cycle. None of these are fatal: the poll loop logs
/// them and keeps the previous snapshot until the next tick.
#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Response is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    /// `success` was absent or false: the engine had no data this cycle.
    #[error("Engine reported no data")]
    EngineRefused,

    #[error("Response envelope has no data object")]
    MissingData,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stats error: {0}")]
    Stats(#[from] StatsError),
}
