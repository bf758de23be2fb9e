use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display name given to a location synthesized from raw coordinates.
pub const VIRTUAL_LOCATION_NAME: &str = "Your Location";

/// A named place the engine can recognize.
///
/// A user is "at" a location when their great-circle distance to its center
/// is within `radius_meters`. The optional `city` and `state` fields feed the
/// city and state palette tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: Uuid,
    pub name: String,
    /// URL-safe identifier used for explicit overrides (e.g. `forest-park`).
    pub slug: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    pub city: Option<String>,
    /// Two-letter state code.
    pub state: Option<String>,
    pub is_active: bool,
}

/// A location synthesized when no named location contains the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub city: String,
}

impl VirtualLocation {
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            name: VIRTUAL_LOCATION_NAME.to_string(),
            latitude,
            longitude,
            city: "Unknown".to_string(),
        }
    }
}

/// Where the user is for the current session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocationContext {
    Named(LocationRecord),
    Virtual(VirtualLocation),
    None,
}

impl LocationContext {
    pub fn kind(&self) -> LocationKind {
        match self {
            Self::Named(_) => LocationKind::Named,
            Self::Virtual(_) => LocationKind::Virtual,
            Self::None => LocationKind::None,
        }
    }

    /// The named location, if one was resolved.
    pub fn named(&self) -> Option<&LocationRecord> {
        match self {
            Self::Named(location) => Some(location),
            _ => None,
        }
    }

    /// The slug to report in analytics-style logs.
    pub fn label(&self) -> &str {
        match self {
            Self::Named(location) => &location.slug,
            Self::Virtual(_) | Self::None => "generic",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Named,
    Virtual,
    None,
}

/// Input for creating a new location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLocationInput {
    pub name: String,
    pub slug: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// Defaults to `true` if not specified.
    #[serde(default)]
    pub is_active: Option<bool>,
}
