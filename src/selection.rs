//! Weighted, anti-repetition prompt selection.
//!
//! Candidates are fetched in up to three stages, each relaxing the previous
//! one: location-scoped with history exclusions, generic with the same
//! exclusions (only when a named location is resolved), and location-scoped
//! with no exclusions (only when there is history to forget). Within a stage,
//! categories not served recently are preferred, then one prompt is drawn
//! from a weighted pool.

use std::collections::VecDeque;
use std::time::Duration;

use rand::Rng;
use uuid::Uuid;

use crate::error::FetchError;
use crate::models::*;
use crate::ports::PromptRepository;

/// Canned prompts used when the repository cannot supply one.
pub const FALLBACK_PROMPTS: [&str; 10] = [
    "draw with your eyes closed",
    "draw with only one line",
    "draw what's in front of you",
    "draw your last dream",
    "do scribbles",
    "try to fill up the page",
    "draw something with a shadow",
    "draw a cat",
    "draw a tree",
    "draw a face",
];

/// A chosen prompt and the stage that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub prompt: PromptRecord,
    pub source: PromptSource,
}

impl Selection {
    /// Whether the session's prompt history must be cleared to honor this pick.
    pub fn resets_history(&self) -> bool {
        self.source == PromptSource::HistoryReset
    }
}

pub struct PromptSelector<'a> {
    prompts: &'a dyn PromptRepository,
    timeout: Duration,
    limit: usize,
}

impl<'a> PromptSelector<'a> {
    pub fn new(prompts: &'a dyn PromptRepository, timeout: Duration, limit: usize) -> Self {
        Self {
            prompts,
            timeout,
            limit,
        }
    }

    /// Pick the next prompt for this context, or `None` when every stage is
    /// empty. Any failed or timed-out query aborts selection.
    pub async fn select_next<R: Rng + Send>(
        &self,
        context: &LocationContext,
        session: &SessionState,
        rng: &mut R,
    ) -> Result<Option<Selection>, FetchError> {
        let scope = match context.named() {
            Some(location) => LocationScope::At(location.id),
            None => LocationScope::Generic,
        };
        let excluded = session.excluded_ids();
        let recent = session.recent_categories();

        let candidates = self.query(scope, &excluded).await?;
        if let Some(prompt) = select_from(&candidates, &recent, rng) {
            return Ok(Some(Selection {
                prompt: prompt.clone(),
                source: PromptSource::Located,
            }));
        }

        if matches!(scope, LocationScope::At(_)) {
            tracing::debug!("no location-specific prompts left, trying generic prompts");
            let candidates = self.query(LocationScope::Generic, &excluded).await?;
            if let Some(prompt) = select_from(&candidates, &recent, rng) {
                return Ok(Some(Selection {
                    prompt: prompt.clone(),
                    source: PromptSource::Generic,
                }));
            }
        }

        if !session.prompt_history.is_empty() {
            tracing::debug!("no unseen prompts left, retrying without history");
            let candidates = self.query(scope, &[]).await?;
            if let Some(prompt) = select_from(&candidates, &recent, rng) {
                return Ok(Some(Selection {
                    prompt: prompt.clone(),
                    source: PromptSource::HistoryReset,
                }));
            }
        }

        Ok(None)
    }

    async fn query(
        &self,
        location: LocationScope,
        exclude_ids: &[Uuid],
    ) -> Result<Vec<PromptRecord>, FetchError> {
        let filter = PromptFilter {
            location,
            exclude_ids: exclude_ids.to_vec(),
            active_only: true,
        };

        match tokio::time::timeout(self.timeout, self.prompts.query(&filter, self.limit)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        }
    }
}

/// Apply the category bias, then draw from the weighted pool.
pub fn select_from<'a, R: Rng + ?Sized>(
    candidates: &'a [PromptRecord],
    recent_categories: &[PromptCategory],
    rng: &mut R,
) -> Option<&'a PromptRecord> {
    let eligible = prefer_fresh_categories(candidates, recent_categories);
    let picked = pick_weighted(&eligible, rng)?;

    tracing::debug!(
        candidates = candidates.len(),
        eligible = eligible.len(),
        weight = picked.weight,
        category = picked.category.as_str(),
        "weighted selection"
    );
    Some(picked)
}

/// Candidates whose category is not among the recent ones, unless that
/// leaves nothing, in which case every candidate stays eligible.
pub fn prefer_fresh_categories<'a>(
    candidates: &'a [PromptRecord],
    recent_categories: &[PromptCategory],
) -> Vec<&'a PromptRecord> {
    let fresh: Vec<&PromptRecord> = candidates
        .iter()
        .filter(|p| !recent_categories.contains(&p.category))
        .collect();

    if fresh.is_empty() {
        candidates.iter().collect()
    } else {
        fresh
    }
}

/// Uniform draw from a pool where each candidate occupies `max(weight, 1)`
/// slots.
pub fn pick_weighted<'a, R: Rng + ?Sized>(
    candidates: &[&'a PromptRecord],
    rng: &mut R,
) -> Option<&'a PromptRecord> {
    let total: usize = candidates.iter().map(|p| p.pool_weight()).sum();
    if total == 0 {
        return None;
    }

    let mut slot = rng.gen_range(0..total);
    for &prompt in candidates {
        let weight = prompt.pool_weight();
        if slot < weight {
            return Some(prompt);
        }
        slot -= weight;
    }
    None
}

/// A canned fallback pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackChoice {
    pub content: &'static str,
    /// Every canned prompt had been used; the fallback history starts over.
    pub resets_history: bool,
}

/// Choose a canned prompt not yet shown in the current fallback cycle.
pub fn choose_fallback<R: Rng + ?Sized>(history: &VecDeque<String>, rng: &mut R) -> FallbackChoice {
    let unused: Vec<&'static str> = FALLBACK_PROMPTS
        .iter()
        .copied()
        .filter(|p| !history.iter().any(|h| h == p))
        .collect();

    let (pool, resets_history) = if unused.is_empty() {
        (FALLBACK_PROMPTS.to_vec(), true)
    } else {
        (unused, false)
    };

    FallbackChoice {
        content: pool[rng.gen_range(0..pool.len())],
        resets_history,
    }
}
