//! # Rendering System
//!
//! Device-facing half of the engine: GPU handle management, shadow maps for
//! every light kind, and the deferred camera.
//!
//! ## Architecture
//!
//! - **Backend**: [`GraphicsBackend`] is the only place device calls happen;
//!   `GlBackend` implements it over OpenGL and `HeadlessBackend` in memory
//! - **Window**: `GlWindow` (feature `opengl`) owns the GLFW window and its
//!   context, and forwards events to the input state
//! - **Context**: [`RenderContext`] bundles the backend, the resource manager
//!   and the error log, and is passed explicitly to everything that touches
//!   the device
//! - **Shadows**: [`ShadowsManager`] packs every shadow map of a light kind
//!   into one depth texture array
//! - **Camera**: [`Camera`] owns the geometry-pass targets and composites them
//! - **Renderer**: [`RenderCore`] drives one frame through all of the above

pub mod backend;
pub mod camera;
mod context;
mod error_log;
pub mod lighting;
pub mod mesh;
pub mod renderer;
pub mod resources;
pub mod shader;
pub mod shadows;
#[cfg(feature = "opengl")]
pub mod window;

#[cfg(test)]
mod tests;

#[cfg(feature = "opengl")]
pub use backend::GlBackend;
#[cfg(any(test, feature = "headless"))]
pub use backend::HeadlessBackend;
pub use backend::{GraphicsBackend, RawHandle, INVALID_HANDLE};
pub use camera::{CamConfig, Camera, LightRenderType, RenderType, TextureDataType, INVALID_ENTITY};
pub use context::RenderContext;
pub use error_log::{ErrorEntry, ErrorLog};
pub use lighting::{DirectionalLight, LightDirection, LightType, PointLight, SpotLight, MAX_LIGHTS_PER_KIND};
pub use mesh::{CustomMesh, DrawConfig, DrawableMesh, MeshId, MeshLibrary, MeshProvider};
pub use renderer::{FramePass, FrameReport, GeometryPass, RenderCore, ShadowPass};
pub use resources::GpuResources;
pub use shader::Shader;
pub use shadows::{ShadowResolution, ShadowsManager};

use crate::config::ConfigError;

/// Errors raised by the rendering system
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// No graphics context is current on this thread
    #[error("Graphics context is not ready")]
    ContextNotReady,

    /// A per-frame camera call happened before `init`
    #[error("Camera used before init")]
    CameraNotInitialized,

    /// Configuration values cannot be used
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The device refused to create a resource
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// A framebuffer failed its completeness check
    #[error("Framebuffer {0} is incomplete")]
    IncompleteFramebuffer(u32),

    /// Loading or saving configuration failed
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
