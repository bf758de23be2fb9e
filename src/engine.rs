//! The orchestrator: resolves location, serves prompts and drives assets.

use std::sync::Mutex;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio::sync::watch;

use crate::assets::{AssetPipeline, AssetRequest, AssetTasks, ControlState, Controls, LoadingKind};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::location::{LocationResolver, ResolutionState};
use crate::models::*;
use crate::palette::Theme;
use crate::ports::Collaborators;
use crate::selection::{choose_fallback, FallbackChoice, PromptSelector, Selection};
use crate::session::SessionStore;

/// Result of a successful [`Engine::load_next`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadOutcome {
    pub prompt: ServedPrompt,
    pub generation: u64,
    /// Whether an asset task was started for this prompt.
    pub asset_started: bool,
}

enum Pick {
    Repository(Selection),
    Canned(FallbackChoice),
}

struct LoadState {
    session: SessionStore,
    rng: ChaCha8Rng,
    tasks: AssetTasks,
}

/// Read-side view shared with accessors.
struct Published {
    prompt: Option<ServedPrompt>,
    session: SessionState,
    location: ResolutionState,
    theme: Theme,
}

pub struct Engine {
    config: EngineConfig,
    collaborators: Collaborators,
    controls: Controls,
    assets: AssetPipeline,
    load: tokio::sync::Mutex<LoadState>,
    resolver: tokio::sync::Mutex<LocationResolver>,
    published: Mutex<Published>,
}

impl Engine {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        Self::with_rng(config, collaborators, ChaCha8Rng::from_entropy())
    }

    /// Deterministic sampling for tests and reproducible runs.
    pub fn with_seed(config: EngineConfig, collaborators: Collaborators, seed: u64) -> Self {
        Self::with_rng(config, collaborators, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(config: EngineConfig, collaborators: Collaborators, rng: ChaCha8Rng) -> Self {
        let session = SessionStore::load(collaborators.store.clone());
        let controls = Controls::new();
        let assets = AssetPipeline::new(config.clone(), &collaborators, controls.clone());

        let published = Published {
            prompt: None,
            session: session.state().clone(),
            location: ResolutionState::Unresolved,
            theme: Theme::default(),
        };

        Self {
            config,
            collaborators,
            controls,
            assets,
            load: tokio::sync::Mutex::new(LoadState {
                session,
                rng,
                tasks: AssetTasks::default(),
            }),
            resolver: tokio::sync::Mutex::new(LocationResolver::new()),
            published: Mutex::new(published),
        }
    }

    // ============================================================
    // Location
    // ============================================================

    /// Resolve the location from the device position. Once resolved (by
    /// either path) this returns the cached context without asking again.
    pub async fn resolve_location(&self) -> LocationContext {
        let mut resolver = self.resolver.lock().await;
        if resolver.context().is_none() {
            self.publish_location(ResolutionState::Resolving);
        }

        let context = resolver
            .resolve_geolocation(
                self.collaborators.geolocator.as_ref(),
                self.collaborators.locations.as_ref(),
                &self.config.geolocation,
            )
            .await;

        self.publish_location(resolver.state().clone());
        context
    }

    /// Resolve the location from an explicit slug, bypassing geolocation.
    pub async fn override_location(&self, slug: &str) -> LocationContext {
        let mut resolver = self.resolver.lock().await;
        if resolver.context().is_none() {
            self.publish_location(ResolutionState::Resolving);
        }

        let context = resolver
            .resolve_override(slug, self.collaborators.locations.as_ref())
            .await;

        self.publish_location(resolver.state().clone());
        context
    }

    fn publish_location(&self, state: ResolutionState) {
        let mut published = self.published.lock().expect("engine state lock poisoned");
        if let ResolutionState::Resolved(context) = &state {
            published.theme = Theme::for_context(context);
            tracing::info!(
                location = context.label(),
                kind = ?context.kind(),
                "theme applied"
            );
        }
        published.location = state;
    }

    // ============================================================
    // Prompts
    // ============================================================

    /// Serve the next prompt and start its asset, if any.
    ///
    /// Fails with [`EngineError::Busy`] while another call is running or an
    /// asset still holds the controls. Never fails otherwise: fetch errors,
    /// timeouts and an exhausted pool all end in a canned prompt.
    pub async fn load_next(&self) -> Result<LoadOutcome, EngineError> {
        let mut guard = self.load.try_lock().map_err(|_| EngineError::Busy)?;
        if !self.controls.snapshot().enabled {
            return Err(EngineError::Busy);
        }
        let load = &mut *guard;

        let generation = self.controls.begin();
        load.tasks.abort();
        self.collaborators.surface.clear();
        let held = self.controls.hold_until_dropped(generation, LoadingKind::Prompt);

        let context = self.location_context();
        let selector = PromptSelector::new(
            self.collaborators.prompts.as_ref(),
            self.config.prompt_timeout,
            self.config.prompt_limit,
        );
        let selection = match selector
            .select_next(&context, load.session.state(), &mut load.rng)
            .await
        {
            Ok(selection) => selection,
            Err(e) => {
                tracing::warn!(error = %e, "prompt fetch failed, using fallback prompt");
                None
            }
        };

        let pick = match selection {
            Some(selection) => Pick::Repository(selection),
            None => Pick::Canned(choose_fallback(
                &load.session.state().fallback_history,
                &mut load.rng,
            )),
        };

        let served = match &pick {
            Pick::Repository(selection) => {
                ServedPrompt::from_record(&selection.prompt, selection.source)
            }
            Pick::Canned(choice) => ServedPrompt::fallback(choice.content),
        };
        tracing::info!(
            generation,
            source = ?served.source,
            category = served.category.as_str(),
            location = context.label(),
            "prompt served"
        );
        self.published
            .lock()
            .expect("engine state lock poisoned")
            .prompt = Some(served.clone());
        drop(held);

        let request = match &pick {
            Pick::Repository(selection) => AssetRequest::for_prompt(&selection.prompt),
            Pick::Canned(_) => None,
        };
        if let Some(request) = request {
            let seed = load.rng.gen();
            load.tasks = self.assets.start(request, generation, seed);
        }

        match pick {
            Pick::Repository(selection) => {
                if selection.resets_history() {
                    load.session.clear_prompt_history();
                }
                load.session.record_prompt(&selection.prompt);
            }
            Pick::Canned(choice) => load.session.record_fallback(choice),
        }
        self.published
            .lock()
            .expect("engine state lock poisoned")
            .session = load.session.state().clone();

        Ok(LoadOutcome {
            prompt: served,
            generation,
            asset_started: request.is_some(),
        })
    }

    /// The host's shape generator finished fading in.
    pub fn shape_animation_complete(&self) {
        self.assets
            .shape_complete(self.controls.snapshot().generation);
    }

    // ============================================================
    // Accessors
    // ============================================================

    pub fn current_prompt(&self) -> Option<ServedPrompt> {
        self.published
            .lock()
            .expect("engine state lock poisoned")
            .prompt
            .clone()
    }

    pub fn location_state(&self) -> ResolutionState {
        self.published
            .lock()
            .expect("engine state lock poisoned")
            .location
            .clone()
    }

    /// The resolved context, or `None` while unresolved.
    pub fn location_context(&self) -> LocationContext {
        match self.location_state() {
            ResolutionState::Resolved(context) => context,
            _ => LocationContext::None,
        }
    }

    pub fn theme(&self) -> Theme {
        self.published
            .lock()
            .expect("engine state lock poisoned")
            .theme
            .clone()
    }

    pub fn session_id(&self) -> String {
        self.session().session_id
    }

    pub fn session(&self) -> SessionState {
        self.published
            .lock()
            .expect("engine state lock poisoned")
            .session
            .clone()
    }

    pub fn controls(&self) -> ControlState {
        self.controls.snapshot()
    }

    pub fn subscribe_controls(&self) -> watch::Receiver<ControlState> {
        self.controls.subscribe()
    }
}
