//! Engine timing and query configuration.

use std::time::Duration;

use crate::ports::GeolocationOptions;

/// Tunables for the engine.
///
/// Defaults match the behavior hosts expect; every field can be overridden
/// from `DRIFTPAD_*` environment variables via [`EngineConfig::from_env`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Bound on each prompt repository query (DRIFTPAD_PROMPT_TIMEOUT_MS).
    pub prompt_timeout: Duration,
    /// Bound on the gallery drawing query (DRIFTPAD_GALLERY_TIMEOUT_MS).
    /// Longer than prompts because rows carry inline images.
    pub gallery_timeout: Duration,
    /// Force-release controls if an asset never reports completion
    /// (DRIFTPAD_ASSET_FALLBACK_MS).
    pub asset_fallback: Duration,
    /// Gallery image fade-in duration (DRIFTPAD_FADE_MS).
    pub fade_duration: Duration,
    /// Animation frame interval (DRIFTPAD_FRAME_MS).
    pub frame_interval: Duration,
    /// Geolocation options (DRIFTPAD_GEO_TIMEOUT_MS sets the timeout).
    pub geolocation: GeolocationOptions,
    /// Max prompts fetched per query (DRIFTPAD_PROMPT_LIMIT).
    pub prompt_limit: usize,
    /// Max drawings fetched per gallery query (DRIFTPAD_GALLERY_LIMIT).
    pub gallery_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prompt_timeout: Duration::from_secs(5),
            gallery_timeout: Duration::from_secs(8),
            asset_fallback: Duration::from_secs(3),
            fade_duration: Duration::from_secs(2),
            frame_interval: Duration::from_millis(25),
            geolocation: GeolocationOptions::default(),
            prompt_limit: 50,
            gallery_limit: 10,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let geolocation = GeolocationOptions {
            timeout: env_millis("DRIFTPAD_GEO_TIMEOUT_MS")
                .unwrap_or(defaults.geolocation.timeout),
            ..defaults.geolocation
        };

        Self {
            prompt_timeout: env_millis("DRIFTPAD_PROMPT_TIMEOUT_MS")
                .unwrap_or(defaults.prompt_timeout),
            gallery_timeout: env_millis("DRIFTPAD_GALLERY_TIMEOUT_MS")
                .unwrap_or(defaults.gallery_timeout),
            asset_fallback: env_millis("DRIFTPAD_ASSET_FALLBACK_MS")
                .unwrap_or(defaults.asset_fallback),
            fade_duration: env_millis("DRIFTPAD_FADE_MS").unwrap_or(defaults.fade_duration),
            frame_interval: env_millis("DRIFTPAD_FRAME_MS")
                .filter(|d| !d.is_zero())
                .unwrap_or(defaults.frame_interval),
            geolocation,
            prompt_limit: env_usize("DRIFTPAD_PROMPT_LIMIT").unwrap_or(defaults.prompt_limit),
            gallery_limit: env_usize("DRIFTPAD_GALLERY_LIMIT").unwrap_or(defaults.gallery_limit),
        }
    }

    /// Opacity added per animation frame so the fade spans `fade_duration`.
    pub fn fade_step(&self) -> f64 {
        let frames = self.fade_duration.as_secs_f64() / self.frame_interval.as_secs_f64();
        if frames <= 1.0 {
            1.0
        } else {
            1.0 / frames
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
}
