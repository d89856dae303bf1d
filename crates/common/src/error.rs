//! Common error types.

use thiserror::Error;

/// Top-level error type for the engine.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Tracking error: {0}")]
    Tracking(String),

    #[error("Scroll error: {0}")]
    Scroll(String),

    #[error("Trigger error: {0}")]
    Trigger(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Compositor error: {0}")]
    Compositor(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    pub fn tracking(msg: impl Into<String>) -> Self {
        Self::Tracking(msg.into())
    }

    pub fn scroll(msg: impl Into<String>) -> Self {
        Self::Scroll(msg.into())
    }

    pub fn trigger(msg: impl Into<String>) -> Self {
        Self::Trigger(msg.into())
    }

    pub fn gpu(msg: impl Into<String>) -> Self {
        Self::Gpu(msg.into())
    }

    pub fn compositor(msg: impl Into<String>) -> Self {
        Self::Compositor(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
