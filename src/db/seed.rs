//! Bulk loading of locations, prompts and drawings from a JSON document.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Database;
use crate::models::*;

/// A prompt in a seed file. Location-specific prompts name their location
/// by slug since ids are assigned on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedPrompt {
    #[serde(default)]
    pub location_slug: Option<String>,
    #[serde(flatten)]
    pub prompt: CreatePromptInput,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub locations: Vec<CreateLocationInput>,
    #[serde(default)]
    pub prompts: Vec<SeedPrompt>,
    #[serde(default)]
    pub drawings: Vec<CreateDrawingInput>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub locations: usize,
    pub prompts: usize,
    pub drawings: usize,
}

impl SeedData {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid seed document")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        Self::from_json(&json)
    }
}

impl Database {
    /// Insert every record in the seed document.
    ///
    /// Prompt `location_slug`s may refer to locations in the same document or
    /// to active locations already stored.
    pub fn seed(&self, data: SeedData) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();
        let mut slugs: HashMap<String, Uuid> = HashMap::new();

        for input in data.locations {
            let location = self
                .create_location(input)
                .context("Failed to insert seed location")?;
            slugs.insert(location.slug, location.id);
            summary.locations += 1;
        }

        for seed in data.prompts {
            let mut input = seed.prompt;
            if let Some(slug) = seed.location_slug {
                let location_id = match slugs.get(&slug) {
                    Some(id) => *id,
                    None => self
                        .get_active_location_by_slug(&slug)?
                        .map(|location| location.id)
                        .ok_or_else(|| anyhow::anyhow!("Unknown location slug: {}", slug))?,
                };
                input.location_id = Some(location_id);
            }
            self.create_prompt(input)
                .context("Failed to insert seed prompt")?;
            summary.prompts += 1;
        }

        for input in data.drawings {
            self.create_drawing(input)
                .context("Failed to insert seed drawing")?;
            summary.drawings += 1;
        }

        tracing::info!(
            locations = summary.locations,
            prompts = summary.prompts,
            drawings = summary.drawings,
            "seed data loaded"
        );
        Ok(summary)
    }
}
