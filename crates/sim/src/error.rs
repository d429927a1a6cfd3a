use thiserror::Error;

/// Errors raised by the host-side simulation layer.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid viewport {width}x{height}: both dimensions must be non-zero")]
    InvalidViewport { width: u32, height: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("config io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config json: {0}")]
    Json(#[from] serde_json::Error),
}
