//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    #[error("Core error: {0}")]
    Core(#[from] extmm_core::CoreError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] extmm_ws::WsError),

    #[error("Registry error: {0}")]
    Registry(#[from] extmm_registry::RegistryError),

    #[error("Position error: {0}")]
    Position(#[from] extmm_position::PositionError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] extmm_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
