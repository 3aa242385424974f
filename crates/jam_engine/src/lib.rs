//! # JAM Engine
//!
//! Rendering core of the JAM engine: a free-fly deferred camera, shadow maps
//! for point, spot and directional lights, and a resource manager that owns
//! every GPU name it hands out.
//!
//! ## Features
//!
//! - **Multi-light shadows**: up to 16 lights per kind, one depth texture
//!   array per kind, point lights rendered as six cube faces
//! - **Deferred camera**: colour, position, normal and picker attachments with
//!   an optional post-process pass and entity picking
//! - **Handle management**: batched creation, error log on driver failure,
//!   idempotent release
//! - **Devices**: an OpenGL 4.5 backend on a GLFW window (feature `opengl`)
//!   and an in-memory backend for tests and tooling (feature `headless`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jam_engine::prelude::*;
//!
//! fn run(device: Box<dyn GraphicsBackend>) -> Result<(), RenderError> {
//!     let mut meshes = MeshLibrary::new();
//!     let config = RenderCoreConfig::default();
//!     let mut core = RenderCore::new(device, &config, &mut meshes)?;
//!     core.add_point_light(0, PointLight::new(Vec3::new(0.0, 3.0, 0.0)));
//!
//!     let input = InputManager::new();
//!     let report = core.render_frame(0.016, &input, &meshes, |_ctx, _meshes, _pass| {})?;
//!     println!("picked {}", report.selected_entity);
//!     core.free();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod foundation;
pub mod input;
pub mod render;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, ConfigFormat},
        core::config::{CameraSettings, RenderCoreConfig, ShadowSettings},
        foundation::math::{Mat4, Mat4Ext, Vec2, Vec3},
        input::{InputManager, InputProvider, KeyCode, MouseButton},
        render::{
            CamConfig, Camera, CustomMesh, DirectionalLight, DrawConfig, DrawableMesh, FramePass, FrameReport,
            GeometryPass, GraphicsBackend, LightDirection, LightRenderType, LightType,
            MeshLibrary, MeshProvider, PointLight, RenderContext, RenderCore, RenderError, RenderType, Shader,
            ShadowPass, ShadowResolution, ShadowsManager, SpotLight, INVALID_ENTITY,
        },
    };

    #[cfg(any(test, feature = "headless"))]
    pub use crate::render::HeadlessBackend;

    #[cfg(feature = "opengl")]
    pub use crate::render::{
        window::{GlWindow, WindowError},
        GlBackend,
    };
}
