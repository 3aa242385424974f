//! # Core
//!
//! Settings shared by the whole render core, loadable from TOML or RON
//! through the [`Config`] trait.

pub mod config;

pub use crate::config::{Config, ConfigError, ConfigFormat};
pub use config::{CameraSettings, DirectionalShadowSettings, RenderCoreConfig, ShadowSettings};
