use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::prompt::PromptCategory;

/// Most recent prompt ids remembered for anti-repetition.
pub const PROMPT_HISTORY_CAPACITY: usize = 10;
/// Most recent categories remembered for diversity.
pub const CATEGORY_HISTORY_CAPACITY: usize = 5;
/// Most recent canned fallback prompts remembered.
pub const FALLBACK_HISTORY_CAPACITY: usize = 10;
/// How many trailing categories count as "recent" when biasing selection.
pub const RECENT_CATEGORY_WINDOW: usize = 3;

/// Recent-memory state for one creative session.
///
/// All histories are FIFO: pushing past capacity evicts the oldest entry.
/// The session is **logically scoped** to one creative session but survives
/// reloads through the key-value store (prompt and fallback histories only;
/// category history and the last prompt id live in memory).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub prompt_history: VecDeque<Uuid>,
    pub category_history: VecDeque<PromptCategory>,
    pub last_prompt_id: Option<Uuid>,
    pub fallback_history: VecDeque<String>,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    /// Record a displayed prompt id. Returns `false` if it was already present.
    pub fn remember_prompt(&mut self, id: Uuid) -> bool {
        if self.prompt_history.contains(&id) {
            return false;
        }
        push_bounded(&mut self.prompt_history, id, PROMPT_HISTORY_CAPACITY);
        true
    }

    pub fn remember_category(&mut self, category: PromptCategory) {
        push_bounded(
            &mut self.category_history,
            category,
            CATEGORY_HISTORY_CAPACITY,
        );
    }

    pub fn remember_fallback(&mut self, content: impl Into<String>) {
        push_bounded(
            &mut self.fallback_history,
            content.into(),
            FALLBACK_HISTORY_CAPACITY,
        );
    }

    /// Ids excluded from the next prompt query: history plus the last served id.
    pub fn excluded_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.prompt_history.iter().copied().collect();
        if let Some(last) = self.last_prompt_id {
            if !ids.contains(&last) {
                ids.push(last);
            }
        }
        ids
    }

    /// The tail of the category history used for the diversity bias.
    pub fn recent_categories(&self) -> Vec<PromptCategory> {
        let skip = self
            .category_history
            .len()
            .saturating_sub(RECENT_CATEGORY_WINDOW);
        self.category_history.iter().skip(skip).copied().collect()
    }
}

fn push_bounded<T>(list: &mut VecDeque<T>, value: T, capacity: usize) {
    list.push_back(value);
    while list.len() > capacity {
        list.pop_front();
    }
}
