//! Collaborator interfaces consumed by the engine.
//!
//! Storage, geolocation and rendering all live outside the engine. Each is
//! reached through one of these narrow traits so hosts can plug in their own
//! backends; [`crate::db::Database`] and [`crate::surface::RecordingSurface`]
//! are the bundled implementations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{FetchError, GeolocationError, SurfaceError};
use crate::models::*;

// ============================================================
// Repositories
// ============================================================

#[async_trait]
pub trait LocationRepository: Send + Sync {
    /// The active location with this slug, if any.
    async fn find_by_slug(&self, slug: &str) -> Result<Option<LocationRecord>, FetchError>;

    /// All active locations, in repository order.
    async fn list_active(&self) -> Result<Vec<LocationRecord>, FetchError>;
}

#[async_trait]
pub trait PromptRepository: Send + Sync {
    async fn query(&self, filter: &PromptFilter, limit: usize)
        -> Result<Vec<PromptRecord>, FetchError>;
}

#[async_trait]
pub trait DrawingRepository: Send + Sync {
    async fn query(&self, filter: &DrawingFilter, limit: usize)
        -> Result<Vec<DrawingAsset>, FetchError>;
}

/// String key-value persistence (values are JSON-encoded by callers).
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

// ============================================================
// Geolocation
// ============================================================

/// A device position fix in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
}

/// Options forwarded to the device geolocation capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeolocationOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Accept a cached fix no older than this.
    pub maximum_age: Duration,
}

impl Default for GeolocationOptions {
    fn default() -> Self {
        Self {
            high_accuracy: false,
            timeout: Duration::from_secs(5),
            maximum_age: Duration::from_secs(600),
        }
    }
}

#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(
        &self,
        options: &GeolocationOptions,
    ) -> Result<GeoPosition, GeolocationError>;
}

// ============================================================
// Rendering
// ============================================================

/// Drawable area of the surface in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub is_mobile: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 768.0,
            is_mobile: false,
        }
    }
}

/// A bitmap decoded by the surface, ready to draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedImage {
    pub width: f64,
    pub height: f64,
    pub source: ImageSource,
}

/// Where and how to draw one frame of a gallery image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub opacity: f64,
    pub drift_x: f64,
    pub drift_y: f64,
}

#[async_trait]
pub trait DrawingSurface: Send + Sync {
    fn clear(&self);

    fn viewport(&self) -> Viewport;

    async fn decode(&self, source: &ImageSource) -> Result<DecodedImage, SurfaceError>;

    fn draw_image(&self, image: &DecodedImage, placement: &Placement);

    /// Replace the surface content with centered text lines.
    fn show_message(&self, lines: &[&str]);
}

pub trait ShapeGenerator: Send + Sync {
    /// Start a shape fade-in. Completion is reported back through
    /// [`crate::engine::Engine::shape_animation_complete`].
    fn generate_with_fade(&self) -> Result<(), SurfaceError>;

    /// Draw a plain organic circle at the surface center.
    fn draw_fallback_shape(&self, radius: f64) -> Result<(), SurfaceError>;
}

/// Every collaborator the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub locations: Arc<dyn LocationRepository>,
    pub prompts: Arc<dyn PromptRepository>,
    pub drawings: Arc<dyn DrawingRepository>,
    pub store: Arc<dyn KeyValueStore>,
    pub geolocator: Arc<dyn Geolocator>,
    pub surface: Arc<dyn DrawingSurface>,
    pub shapes: Arc<dyn ShapeGenerator>,
}
