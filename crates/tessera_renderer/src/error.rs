//! Renderer construction and lifecycle errors.
//!
//! Tracing itself never fails: misses and absorbed paths are ordinary
//! `None` results. Only setting a renderer up can go wrong.

use std::collections::TryReserveError;

use thiserror::Error;

/// Errors that can occur while building or starting a renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid render configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to allocate render buffers: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    #[error("Rendering has already been started")]
    AlreadyStarted,
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;
