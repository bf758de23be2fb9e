use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::assets::ControlState;
use crate::engine::LoadOutcome;
use crate::error::{EngineError, GeolocationError};
use crate::location::ResolutionState;
use crate::models::*;
use crate::palette::Theme;
use crate::ports::GeoPosition;
use crate::surface::SurfaceSnapshot;

// ============================================================
// Error Handling
// ============================================================

/// A second load while one is in flight is the client's problem, not ours.
fn engine_error(e: EngineError) -> (StatusCode, String) {
    match e {
        EngineError::Busy => {
            tracing::debug!("Rejected prompt request: {}", e);
            (StatusCode::CONFLICT, e.to_string())
        }
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Prompts
// ============================================================

pub async fn next_prompt(
    State(state): State<AppState>,
) -> Result<Json<LoadOutcome>, (StatusCode, String)> {
    state.engine.load_next().await.map(Json).map_err(engine_error)
}

pub async fn current_prompt(
    State(state): State<AppState>,
) -> Result<Json<ServedPrompt>, (StatusCode, String)> {
    state
        .engine
        .current_prompt()
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "No prompt loaded".to_string()))
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionState> {
    Json(state.engine.session())
}

// ============================================================
// Location
// ============================================================

#[derive(Debug, Serialize)]
pub struct LocationView {
    pub resolution: ResolutionState,
    pub theme: Theme,
    /// CSS custom properties; empty when no palette applies.
    pub css: BTreeMap<&'static str, String>,
}

fn location_view(state: &AppState) -> LocationView {
    let theme = state.engine.theme();
    LocationView {
        resolution: state.engine.location_state(),
        css: theme.css_variables().into_iter().collect(),
        theme,
    }
}

pub async fn get_location(State(state): State<AppState>) -> Json<LocationView> {
    Json(location_view(&state))
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub slug: String,
}

pub async fn override_location(
    State(state): State<AppState>,
    Json(input): Json<OverrideRequest>,
) -> Result<Json<LocationView>, (StatusCode, String)> {
    let slug = input.slug.trim();
    if slug.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "slug must not be empty".to_string()));
    }

    state.engine.override_location(slug).await;
    Ok(Json(location_view(&state)))
}

/// What the browser's geolocation call produced.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PositionReport {
    Fix {
        latitude: f64,
        longitude: f64,
    },
    Failure {
        /// `GeolocationPositionError.code`; anything else means unsupported.
        code: u16,
        #[serde(default)]
        message: String,
    },
}

pub async fn report_position(
    State(state): State<AppState>,
    Json(report): Json<PositionReport>,
) -> Json<LocationView> {
    let result = match report {
        PositionReport::Fix {
            latitude,
            longitude,
        } => Ok(GeoPosition {
            latitude,
            longitude,
        }),
        PositionReport::Failure { code, message } => {
            Err(GeolocationError::from_code(code, message))
        }
    };

    state.geolocator.report(result);
    state.engine.resolve_location().await;
    Json(location_view(&state))
}

// ============================================================
// Assets
// ============================================================

pub async fn complete_shape(State(state): State<AppState>) -> StatusCode {
    state.engine.shape_animation_complete();
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
pub struct ControlsView {
    #[serde(flatten)]
    pub state: ControlState,
    pub message: Option<&'static str>,
}

pub async fn get_controls(State(state): State<AppState>) -> Json<ControlsView> {
    let controls = state.engine.controls();
    Json(ControlsView {
        message: controls.loading_message(),
        state: controls,
    })
}

pub async fn get_surface(State(state): State<AppState>) -> Json<SurfaceSnapshot> {
    Json(state.surface.snapshot())
}
