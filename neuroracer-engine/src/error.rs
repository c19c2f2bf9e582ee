use thiserror::Error;

/// Errors raised inside the trial engine. None of them end a session; callers
/// log them and degrade (skip, default, or no-op).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device disconnected: {0}")]
    Disconnected(String),

    #[error("Button {index} out of range for {device} ({count} buttons)")]
    InvalidButton {
        device: String,
        index: usize,
        count: usize,
    },

    #[error("Cue endpoint unavailable: {0}")]
    Endpoint(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
