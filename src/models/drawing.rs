use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A gallery drawing that can be faded onto the surface.
///
/// The bitmap is carried either inline (`image_data`, a data URL) or by
/// reference (`image_url`). Inline data wins when both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingAsset {
    pub id: Uuid,
    pub image_data: Option<String>,
    pub image_url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_erase_eligible: bool,
    pub is_add_eligible: bool,
    pub is_public: bool,
}

impl DrawingAsset {
    pub fn image_source(&self) -> Option<ImageSource> {
        if let Some(data) = &self.image_data {
            return Some(ImageSource::Inline(data.clone()));
        }
        self.image_url.clone().map(ImageSource::Url)
    }
}

/// Where to load a drawing's bitmap from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ImageSource {
    Inline(String),
    Url(String),
}

/// Which gallery direction a prompt asks for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    Erase,
    Add,
}

impl Eligibility {
    /// Column flagging drawings usable in this direction.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Erase => "is_erase_eligible",
            Self::Add => "is_add_eligible",
        }
    }
}

/// Filter for drawing repository queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawingFilter {
    pub eligibility: Eligibility,
    pub public_only: bool,
}

/// Input for creating a new drawing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDrawingInput {
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_erase_eligible: bool,
    #[serde(default)]
    pub is_add_eligible: bool,
    #[serde(default)]
    pub is_public: bool,
}
