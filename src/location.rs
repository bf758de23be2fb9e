//! Resolving where the user is.
//!
//! Resolution runs at most once per session: either from an explicit slug
//! override or from a device position fix. Once an override has been given,
//! geolocation is never attempted.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::GeolocationError;
use crate::geo::distance_meters;
use crate::models::{LocationContext, LocationRecord, VirtualLocation};
use crate::ports::{GeoPosition, GeolocationOptions, Geolocator, LocationRepository};

/// Progress of location resolution for the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "context", rename_all = "snake_case")]
pub enum ResolutionState {
    Unresolved,
    Resolving,
    Resolved(LocationContext),
}

/// The first location, in the given order, whose radius contains the point.
///
/// First match, not nearest: overlapping locations resolve to whichever the
/// repository lists first.
pub fn first_within_radius(
    latitude: f64,
    longitude: f64,
    locations: &[LocationRecord],
) -> Option<&LocationRecord> {
    locations.iter().find(|location| {
        let distance = distance_meters(latitude, longitude, location.latitude, location.longitude);
        tracing::debug!(
            location = %location.name,
            distance_m = distance.round(),
            radius_m = location.radius_meters,
            "checking location radius"
        );
        distance <= location.radius_meters
    })
}

#[derive(Debug)]
pub struct LocationResolver {
    state: ResolutionState,
    override_slug: Option<String>,
}

impl LocationResolver {
    pub fn new() -> Self {
        Self {
            state: ResolutionState::Unresolved,
            override_slug: None,
        }
    }

    pub fn state(&self) -> &ResolutionState {
        &self.state
    }

    /// The resolved context, or `None` while unresolved.
    pub fn context(&self) -> Option<&LocationContext> {
        match &self.state {
            ResolutionState::Resolved(context) => Some(context),
            _ => None,
        }
    }

    /// Resolve from an explicit slug.
    ///
    /// Repeating the current override returns the cached result; a different
    /// slug re-resolves. A missing slug or failed query resolves to `None`.
    pub async fn resolve_override(
        &mut self,
        slug: &str,
        locations: &dyn LocationRepository,
    ) -> LocationContext {
        if self.override_slug.as_deref() == Some(slug) {
            if let Some(context) = self.context() {
                return context.clone();
            }
        }

        self.override_slug = Some(slug.to_string());
        self.state = ResolutionState::Resolving;

        let context = match locations.find_by_slug(slug).await {
            Ok(Some(location)) => {
                tracing::info!(location = %location.name, slug, "location override resolved");
                LocationContext::Named(location)
            }
            Ok(None) => {
                tracing::info!(slug, "no active location for override slug");
                LocationContext::None
            }
            Err(e) => {
                tracing::warn!(slug, error = %e, "location override query failed");
                LocationContext::None
            }
        };

        self.state = ResolutionState::Resolved(context.clone());
        context
    }

    /// Resolve from the device position.
    ///
    /// Does nothing once resolved (including after an override). A position
    /// inside a named location's radius yields `Named` and any other fix
    /// yields `Virtual`. A geolocation failure or a failed location query
    /// yields `None`.
    pub async fn resolve_geolocation(
        &mut self,
        geolocator: &dyn Geolocator,
        locations: &dyn LocationRepository,
        options: &GeolocationOptions,
    ) -> LocationContext {
        if let Some(context) = self.context() {
            return context.clone();
        }

        self.state = ResolutionState::Resolving;

        let position = match tokio::time::timeout(
            options.timeout,
            geolocator.current_position(options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GeolocationError::Timeout),
        };

        let context = match position {
            Ok(position) => Self::match_position(position, locations).await,
            Err(e) => {
                tracing::info!(error = %e, "geolocation unavailable, using default palette");
                LocationContext::None
            }
        };

        self.state = ResolutionState::Resolved(context.clone());
        context
    }

    async fn match_position(
        position: GeoPosition,
        locations: &dyn LocationRepository,
    ) -> LocationContext {
        let GeoPosition {
            latitude,
            longitude,
        } = position;

        let candidates = match locations.list_active().await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load locations, using default palette");
                return LocationContext::None;
            }
        };

        match first_within_radius(latitude, longitude, &candidates) {
            Some(location) => {
                tracing::info!(location = %location.name, "nearby location found");
                LocationContext::Named(location.clone())
            }
            None => {
                tracing::info!(
                    checked = candidates.len(),
                    "no location within radius, using coordinate colors"
                );
                LocationContext::Virtual(VirtualLocation::at(latitude, longitude))
            }
        }
    }
}

impl Default for LocationResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`Geolocator`] fed by the host.
///
/// Hosts that obtain the position themselves (e.g. a browser calling the
/// HTTP surface) report it here before asking the engine to resolve.
#[derive(Debug, Default)]
pub struct ReportedPosition {
    report: Mutex<Option<Result<GeoPosition, GeolocationError>>>,
}

impl ReportedPosition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, result: Result<GeoPosition, GeolocationError>) {
        *self.report.lock().expect("position lock poisoned") = Some(result);
    }
}

#[async_trait]
impl Geolocator for ReportedPosition {
    async fn current_position(
        &self,
        _options: &GeolocationOptions,
    ) -> Result<GeoPosition, GeolocationError> {
        self.report
            .lock()
            .expect("position lock poisoned")
            .clone()
            .unwrap_or(Err(GeolocationError::Unsupported))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn location(name: &str, latitude: f64, longitude: f64, radius: f64) -> LocationRecord {
        LocationRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: name.to_lowercase(),
            latitude,
            longitude,
            radius_meters: radius,
            city: None,
            state: None,
            is_active: true,
        }
    }

    #[test]
    fn first_match_not_nearest() {
        // The user stands at the center of "inner", but "outer" is listed
        // first and its larger radius also contains the user.
        let locations = vec![
            location("outer", 38.640, -90.290, 5_000.0),
            location("inner", 38.6359, -90.2951, 500.0),
        ];

        let found = first_within_radius(38.6359, -90.2951, &locations).expect("match");
        assert_eq!(found.name, "outer");
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let center = location("c", 0.0, 0.0, 0.0);
        assert!(first_within_radius(0.0, 0.0, std::slice::from_ref(&center)).is_some());
    }

    #[test]
    fn no_match_outside_radius() {
        let locations = vec![location("far", 41.8781, -87.6298, 1_000.0)];
        assert!(first_within_radius(38.6270, -90.1994, &locations).is_none());
    }

    #[tokio::test]
    async fn reported_position_defaults_to_unsupported() {
        let geolocator = ReportedPosition::new();
        let result = geolocator
            .current_position(&GeolocationOptions::default())
            .await;
        assert_eq!(result, Err(GeolocationError::Unsupported));

        let fix = GeoPosition {
            latitude: 1.0,
            longitude: 2.0,
        };
        geolocator.report(Ok(fix));
        let result = geolocator
            .current_position(&GeolocationOptions::default())
            .await;
        assert_eq!(result, Ok(fix));
    }
}
