//! # Shadows
//!
//! Bounded per-kind shadow slots rendered into depth texture arrays.

mod manager;
mod resolution;
mod slots;

pub use manager::ShadowsManager;
pub use resolution::ShadowResolution;
