//! Domain models for Driftpad.
//!
//! # Core Concepts
//!
//! ## Repository Entities
//!
//! These are owned by the backing store and are read-only from the engine's
//! point of view:
//!
//! - [`LocationRecord`]: A named place with a center and a radius.
//! - [`PromptRecord`]: A creative prompt, optionally tied to a location.
//! - [`DrawingAsset`]: A public gallery drawing that can be paired with a prompt.
//!
//! ## Session Entities
//!
//! - [`LocationContext`]: Where the user is for this session (named place,
//!   anonymous [`VirtualLocation`], or unknown).
//! - [`SessionState`]: Bounded recent-memory lists used to avoid repetition.
//! - [`ServedPrompt`]: The prompt currently shown, either from the repository
//!   or from the canned fallback rotation.

mod drawing;
mod location;
mod prompt;
mod session;

pub use drawing::*;
pub use location::*;
pub use prompt::*;
pub use session::*;
