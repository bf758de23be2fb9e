//! Visual assets that accompany a prompt.
//!
//! `complete_shape` prompts start a generated shape; `erase` and
//! `add_to_drawing` prompts fade a gallery drawing onto the surface. While an
//! asset loads, the controls are held so the user cannot request another
//! prompt. They are released on completion, on failure, or by a fallback
//! timer, whichever comes first.
//!
//! Every asynchronous effect carries the generation of the `load_next` call
//! that started it and is dropped once a newer call has begun.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::error::{AssetError, FetchError};
use crate::models::*;
use crate::ports::*;

pub const UNAVAILABLE_MESSAGE: [&str; 2] = ["Gallery image unavailable", "Please try again or refresh"];

/// Frames between drift retargets.
const DRIFT_RETARGET_FRAMES: u32 = 15;
/// Max drift offset in either axis, in pixels.
const DRIFT_RANGE: f64 = 8.0;
/// Share of the remaining distance to the drift target covered per frame.
const DRIFT_EASING: f64 = 0.1;

// ============================================================
// Control state
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingKind {
    Shape,
    Image,
    Prompt,
}

impl LoadingKind {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Shape => "A shape is drifting into view...",
            Self::Image => "A drawing is materializing...",
            Self::Prompt => "Loading new prompt...",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetPhase {
    Idle,
    ShapeFading,
    FetchingImage,
    ImageFading,
    Unavailable,
}

/// What the host should show on its controls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlState {
    pub enabled: bool,
    pub loading: Option<LoadingKind>,
    pub phase: AssetPhase,
    pub generation: u64,
}

impl ControlState {
    pub fn loading_message(&self) -> Option<&'static str> {
        self.loading.map(|kind| kind.message())
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            enabled: true,
            loading: None,
            phase: AssetPhase::Idle,
            generation: 0,
        }
    }
}

/// Generation counter plus the published control state.
///
/// All mutations after [`Controls::begin`] are gated on the generation, so a
/// superseded task cannot release or repaint controls it no longer owns.
#[derive(Clone)]
pub struct Controls {
    tx: Arc<watch::Sender<ControlState>>,
    generation: Arc<AtomicU64>,
}

impl Controls {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ControlState::default());
        Self {
            tx: Arc::new(tx),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ControlState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ControlState {
        self.tx.borrow().clone()
    }

    /// Start a new generation, invalidating every earlier one.
    pub fn begin(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.tx.send_modify(|state| state.generation = generation);
        generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    pub fn hold(&self, generation: u64, kind: LoadingKind) -> bool {
        self.update(generation, |state| {
            state.enabled = false;
            state.loading = Some(kind);
        })
    }

    /// Hold the controls until the returned guard drops.
    ///
    /// The guard releases on every exit, including a cancelled future.
    pub fn hold_until_dropped(&self, generation: u64, kind: LoadingKind) -> HeldControls {
        self.hold(generation, kind);
        HeldControls {
            controls: self.clone(),
            generation,
        }
    }

    pub fn set_phase(&self, generation: u64, phase: AssetPhase) -> bool {
        self.update(generation, |state| state.phase = phase)
    }

    /// Re-enable the controls. No-op for a stale generation.
    pub fn release(&self, generation: u64) -> bool {
        self.update(generation, |state| {
            state.enabled = true;
            state.loading = None;
        })
    }

    fn update(&self, generation: u64, apply: impl FnOnce(&mut ControlState)) -> bool {
        let generation_ref = &self.generation;
        self.tx.send_if_modified(|state| {
            if generation_ref.load(Ordering::SeqCst) != generation {
                return false;
            }
            apply(state);
            true
        })
    }
}

/// Releases its generation's hold on drop.
#[must_use = "dropping the guard releases the controls immediately"]
pub struct HeldControls {
    controls: Controls,
    generation: u64,
}

impl Drop for HeldControls {
    fn drop(&mut self) {
        self.controls.release(self.generation);
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================
// Placement and animation
// ============================================================

/// Scale and center an image inside the viewport.
///
/// The image never scales up past its natural size before the device factor
/// is applied. Mobile viewports get a larger share of the screen and a higher
/// minimum scale.
pub fn fit_image(viewport: &Viewport, image_width: f64, image_height: f64) -> Placement {
    let (share, boost, floor) = if viewport.is_mobile {
        (0.9, 1.2, 0.38)
    } else {
        (0.7, 1.0, 0.1)
    };

    let natural = if image_width > 0.0 && image_height > 0.0 {
        (viewport.width / image_width)
            .min(viewport.height / image_height)
            .min(1.0)
    } else {
        1.0
    };
    let scale = (natural * share * boost).max(floor);

    let width = image_width * scale;
    let height = image_height * scale;

    Placement {
        x: (viewport.width - width) / 2.0,
        y: (viewport.height - height) / 2.0,
        width,
        height,
        opacity: 0.0,
        drift_x: 0.0,
        drift_y: 0.0,
    }
}

/// Linear fade-in with an eased random drift.
#[derive(Debug, Clone)]
pub struct FadeIn {
    base: Placement,
    step: f64,
    frame: u32,
    opacity: f64,
    offset: (f64, f64),
    target: (f64, f64),
}

impl FadeIn {
    pub fn new(base: Placement, step: f64) -> Self {
        Self {
            base,
            step: step.clamp(f64::EPSILON, 1.0),
            frame: 0,
            opacity: 0.0,
            offset: (0.0, 0.0),
            target: (0.0, 0.0),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.opacity >= 1.0
    }

    /// Advance one frame and return where to draw it, or `None` once the
    /// image is fully opaque.
    pub fn next_frame<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Placement> {
        if self.is_complete() {
            return None;
        }

        if self.frame % DRIFT_RETARGET_FRAMES == 0 {
            self.target = (
                rng.gen_range(-DRIFT_RANGE..=DRIFT_RANGE),
                rng.gen_range(-DRIFT_RANGE..=DRIFT_RANGE),
            );
        }
        self.offset.0 += (self.target.0 - self.offset.0) * DRIFT_EASING;
        self.offset.1 += (self.target.1 - self.offset.1) * DRIFT_EASING;

        self.frame += 1;
        self.opacity = (self.opacity + self.step).min(1.0);

        Some(Placement {
            x: self.base.x + self.offset.0,
            y: self.base.y + self.offset.1,
            opacity: self.opacity,
            drift_x: self.offset.0,
            drift_y: self.offset.1,
            ..self.base
        })
    }
}

// ============================================================
// Acquisition
// ============================================================

/// The asset a prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRequest {
    Shape,
    Gallery(Eligibility),
}

impl AssetRequest {
    pub fn for_prompt(prompt: &PromptRecord) -> Option<Self> {
        match prompt.category {
            PromptCategory::CompleteShape if prompt.requires_shape => Some(Self::Shape),
            PromptCategory::Erase if prompt.requires_gallery_image => {
                Some(Self::Gallery(Eligibility::Erase))
            }
            PromptCategory::AddToDrawing if prompt.requires_gallery_image => {
                Some(Self::Gallery(Eligibility::Add))
            }
            _ => None,
        }
    }
}

/// Tasks spawned for one asset; aborted when a newer prompt starts.
#[derive(Default)]
pub struct AssetTasks(Vec<JoinHandle<()>>);

impl AssetTasks {
    pub fn abort(&mut self) {
        for task in self.0.drain(..) {
            task.abort();
        }
    }
}

impl Drop for AssetTasks {
    fn drop(&mut self) {
        self.abort();
    }
}

#[derive(Clone)]
pub struct AssetPipeline {
    config: EngineConfig,
    drawings: Arc<dyn DrawingRepository>,
    surface: Arc<dyn DrawingSurface>,
    shapes: Arc<dyn ShapeGenerator>,
    controls: Controls,
}

impl AssetPipeline {
    pub fn new(config: EngineConfig, collaborators: &Collaborators, controls: Controls) -> Self {
        Self {
            config,
            drawings: collaborators.drawings.clone(),
            surface: collaborators.surface.clone(),
            shapes: collaborators.shapes.clone(),
            controls,
        }
    }

    /// Hold the controls and start the asset for `generation`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, request: AssetRequest, generation: u64, seed: u64) -> AssetTasks {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut tasks = vec![self.arm_fallback_timer(generation)];

        match request {
            AssetRequest::Shape => self.start_shape(generation, &mut rng),
            AssetRequest::Gallery(eligibility) => {
                self.controls.hold(generation, LoadingKind::Image);
                self.controls.set_phase(generation, AssetPhase::FetchingImage);
                let pipeline = self.clone();
                tasks.push(tokio::spawn(async move {
                    pipeline.run_gallery(eligibility, generation, rng).await;
                }));
            }
        }

        AssetTasks(tasks)
    }

    fn arm_fallback_timer(&self, generation: u64) -> JoinHandle<()> {
        let controls = self.controls.clone();
        let delay = self.config.asset_fallback;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if controls.release(generation) {
                tracing::debug!(generation, "asset fallback timer released controls");
            }
        })
    }

    fn start_shape(&self, generation: u64, rng: &mut ChaCha8Rng) {
        self.controls.hold(generation, LoadingKind::Shape);
        self.controls.set_phase(generation, AssetPhase::ShapeFading);

        if let Err(e) = self.shapes.generate_with_fade() {
            tracing::warn!(error = %e, "shape generation failed, drawing fallback shape");
            let radius = rng.gen_range(50.0..150.0);
            if let Err(e) = self.shapes.draw_fallback_shape(radius) {
                tracing::warn!(error = %e, "fallback shape failed");
            }
            self.controls.set_phase(generation, AssetPhase::Idle);
            self.controls.release(generation);
        }
    }

    /// The shape generator finished its fade.
    pub fn shape_complete(&self, generation: u64) {
        self.controls.set_phase(generation, AssetPhase::Idle);
        if self.controls.release(generation) {
            tracing::debug!(generation, "shape animation complete");
        }
    }

    async fn run_gallery(&self, eligibility: Eligibility, generation: u64, mut rng: ChaCha8Rng) {
        let image = match self.acquire_image(eligibility, &mut rng).await {
            Ok(image) => image,
            Err(e) => {
                if !self.controls.is_current(generation) {
                    return;
                }
                tracing::warn!(error = %e, direction = ?eligibility, "gallery image unavailable");
                self.surface.show_message(&UNAVAILABLE_MESSAGE);
                self.controls.set_phase(generation, AssetPhase::Unavailable);
                self.controls.release(generation);
                return;
            }
        };

        if !self.controls.set_phase(generation, AssetPhase::ImageFading) {
            return;
        }

        let base = fit_image(&self.surface.viewport(), image.width, image.height);
        let mut fade = FadeIn::new(base, self.config.fade_step());
        let mut ticker = tokio::time::interval(self.config.frame_interval);

        loop {
            ticker.tick().await;
            if !self.controls.is_current(generation) {
                return;
            }
            match fade.next_frame(&mut rng) {
                Some(placement) => self.surface.draw_image(&image, &placement),
                None => break,
            }
        }

        tracing::debug!(generation, "gallery image faded in");
        self.controls.set_phase(generation, AssetPhase::Idle);
        self.controls.release(generation);
    }

    async fn acquire_image(
        &self,
        eligibility: Eligibility,
        rng: &mut ChaCha8Rng,
    ) -> Result<DecodedImage, AssetError> {
        let filter = DrawingFilter {
            eligibility,
            public_only: true,
        };
        let timeout = self.config.gallery_timeout;
        let drawings = match tokio::time::timeout(
            timeout,
            self.drawings.query(&filter, self.config.gallery_limit),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(FetchError::Timeout(timeout).into()),
        };

        if drawings.is_empty() {
            return Err(AssetError::NoEligibleDrawings);
        }

        let drawing = &drawings[rng.gen_range(0..drawings.len())];
        tracing::debug!(drawing = %drawing.id, candidates = drawings.len(), "gallery drawing chosen");

        let source = drawing.image_source().ok_or(AssetError::MissingImageData)?;
        Ok(self.surface.decode(&source).await?)
    }
}
