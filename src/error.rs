//! Error types for the engine and its collaborators.
//!
//! None of these are fatal: every failure path ends in an interactive state
//! (fallback prompt, default palette, or an "unavailable" message).

use std::time::Duration;

use thiserror::Error;

/// A repository query failed or took too long.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for FetchError {
    fn from(e: anyhow::Error) -> Self {
        Self::Backend(format!("{:#}", e))
    }
}

/// Device geolocation failed or is not available.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location information unavailable: {0}")]
    PositionUnavailable(String),

    #[error("location request timeout")]
    Timeout,

    #[error("geolocation not supported")]
    Unsupported,

    #[error("geolocation requires a secure context")]
    InsecureContext,
}

impl GeolocationError {
    /// Map a browser `GeolocationPositionError` code.
    pub fn from_code(code: u16, message: impl Into<String>) -> Self {
        match code {
            1 => Self::PermissionDenied,
            2 => Self::PositionUnavailable(message.into()),
            3 => Self::Timeout,
            _ => Self::Unsupported,
        }
    }
}

/// Rendering or decoding failed on a drawing collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("surface error: {0}")]
pub struct SurfaceError(pub String);

/// Why a gallery image could not be shown.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("gallery query failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("no eligible gallery drawings")]
    NoEligibleDrawings,

    #[error("drawing has no image data")]
    MissingImageData,

    #[error("image decode failed: {0}")]
    Decode(#[from] SurfaceError),
}

/// Errors returned by the engine's public operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("a prompt is already loading")]
    Busy,
}
