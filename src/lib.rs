//! Driftpad: a location-aware creative prompt feed for a drawing surface.
//!
//! The [`engine::Engine`] resolves where the user is, derives a color theme
//! for that place, serves weighted prompts without repeating recent ones and
//! pairs some prompts with a generated shape or a gallery drawing.

pub mod api;
pub mod assets;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod geo;
pub mod location;
pub mod models;
pub mod palette;
pub mod ports;
pub mod selection;
pub mod session;
pub mod surface;
