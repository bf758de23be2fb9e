use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A creative prompt served to the drawing surface.
///
/// Prompts with a `location_id` are only eligible while the user is at that
/// location; prompts without one are generic. `weight` scales how often a
/// prompt is drawn relative to its peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRecord {
    pub id: Uuid,
    pub content: String,
    pub category: PromptCategory,
    pub requires_shape: bool,
    pub requires_gallery_image: bool,
    pub location_id: Option<Uuid>,
    pub weight: i64,
    pub active: bool,
}

impl PromptRecord {
    /// Number of slots this prompt occupies in a weighted pool.
    pub fn pool_weight(&self) -> usize {
        self.weight.max(1) as usize
    }
}

/// The kind of creative task a prompt asks for.
///
/// - `Generative`: Open-ended drawing
/// - `Subject`: Draw a named subject
/// - `CompleteShape`: Finish a generated shape
/// - `Erase`: Erase and recreate a gallery drawing
/// - `AddToDrawing`: Add to a gallery drawing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PromptCategory {
    Generative,
    Subject,
    CompleteShape,
    Erase,
    AddToDrawing,
}

impl PromptCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generative => "generative",
            Self::Subject => "subject",
            Self::CompleteShape => "complete_shape",
            Self::Erase => "erase",
            Self::AddToDrawing => "add_to_drawing",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "generative" => Some(Self::Generative),
            "subject" => Some(Self::Subject),
            "complete_shape" => Some(Self::CompleteShape),
            "erase" => Some(Self::Erase),
            "add_to_drawing" => Some(Self::AddToDrawing),
            _ => None,
        }
    }
}

/// Which location scope a prompt query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationScope {
    /// Prompts tied to this location.
    At(Uuid),
    /// Prompts with no location.
    Generic,
}

/// Filter for prompt repository queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptFilter {
    pub location: LocationScope,
    pub exclude_ids: Vec<Uuid>,
    pub active_only: bool,
}

/// Input for creating a new prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePromptInput {
    pub content: String,
    pub category: PromptCategory,
    #[serde(default)]
    pub requires_shape: bool,
    #[serde(default)]
    pub requires_gallery_image: bool,
    #[serde(default)]
    pub location_id: Option<Uuid>,
    /// Defaults to 1 if not specified.
    #[serde(default)]
    pub weight: Option<i64>,
    /// Defaults to `true` if not specified.
    #[serde(default)]
    pub active: Option<bool>,
}

/// Where a served prompt came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PromptSource {
    /// Location-scoped query (or generic query when no place is resolved).
    Located,
    /// Generic prompts after a named location ran dry.
    Generic,
    /// Located query retried after forgetting the prompt history.
    HistoryReset,
    /// Built-in canned rotation.
    Fallback,
}

/// The prompt currently displayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServedPrompt {
    /// `None` for canned fallback prompts.
    pub id: Option<Uuid>,
    pub content: String,
    pub category: PromptCategory,
    pub source: PromptSource,
}

impl ServedPrompt {
    pub fn from_record(record: &PromptRecord, source: PromptSource) -> Self {
        Self {
            id: Some(record.id),
            content: record.content.clone(),
            category: record.category,
            source,
        }
    }

    pub fn fallback(content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            category: PromptCategory::Generative,
            source: PromptSource::Fallback,
        }
    }
}
