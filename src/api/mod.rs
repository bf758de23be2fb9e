mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::EngineConfig;
use crate::db::Database;
use crate::engine::Engine;
use crate::location::ReportedPosition;
use crate::ports::{Collaborators, Viewport};
use crate::surface::RecordingSurface;

/// Shared state for the HTTP host.
///
/// The browser reports its position through `geolocator` and replays the
/// commands recorded on `surface`.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub geolocator: Arc<ReportedPosition>,
    pub surface: Arc<RecordingSurface>,
}

impl AppState {
    pub fn new(db: Database, config: EngineConfig, viewport: Viewport) -> Self {
        let db = Arc::new(db);
        let geolocator = Arc::new(ReportedPosition::new());
        let surface = Arc::new(RecordingSurface::new(viewport));

        let collaborators = Collaborators {
            locations: db.clone(),
            prompts: db.clone(),
            drawings: db.clone(),
            store: db,
            geolocator: geolocator.clone(),
            surface: surface.clone(),
            shapes: surface.clone(),
        };

        Self {
            engine: Arc::new(Engine::new(config, collaborators)),
            geolocator,
            surface,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Prompts
        .route("/prompts/next", post(handlers::next_prompt))
        .route("/prompts/current", get(handlers::current_prompt))
        // Session
        .route("/session", get(handlers::get_session))
        // Location
        .route("/location", get(handlers::get_location))
        .route("/location/override", post(handlers::override_location))
        .route("/location/position", post(handlers::report_position))
        // Assets
        .route("/shapes/complete", post(handlers::complete_shape))
        .route("/controls", get(handlers::get_controls))
        .route("/surface", get(handlers::get_surface))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
