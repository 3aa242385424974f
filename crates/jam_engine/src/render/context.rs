//! Render context
//!
//! Bundles the graphics device with the two pieces of state every GPU-facing
//! operation needs: the resource manager and the driver error log. Owned by
//! [`RenderCore`](crate::render::RenderCore) and passed by `&mut` to the
//! camera and shadow manager.

use super::backend::{GraphicsBackend, RawHandle, ShaderStage};
use super::error_log::ErrorLog;
use super::resources::GpuResources;

/// Graphics device plus the state shared by all GPU-facing code
pub struct RenderContext {
    /// Device all calls go through
    pub backend: Box<dyn GraphicsBackend>,
    /// Owner of every created GPU name
    pub resources: GpuResources,
    /// Driver-level diagnostics
    pub errors: ErrorLog,
}

impl RenderContext {
    /// Wrap a device with empty resource pools and error log
    pub fn new(backend: Box<dyn GraphicsBackend>) -> Self {
        Self {
            backend,
            resources: GpuResources::new(),
            errors: ErrorLog::new(),
        }
    }

    /// Whether the device has a current context
    pub fn is_ready(&self) -> bool {
        self.backend.is_context_current()
    }

    /// Compile and link a program, see [`GpuResources::create_program`]
    pub fn create_program(&mut self, fragment: Option<&str>, vertex: Option<&str>) -> RawHandle {
        self.resources
            .create_program(self.backend.as_mut(), &mut self.errors, fragment, vertex)
    }

    /// Compile one stage, see [`GpuResources::compile_shader`]
    pub fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> RawHandle {
        self.resources
            .compile_shader(self.backend.as_mut(), &mut self.errors, stage, source)
    }

    /// Create vertex arrays, returning an owned copy of the new names
    pub fn create_vertex_arrays(&mut self, count: usize) -> Vec<RawHandle> {
        self.resources
            .create_vertex_arrays(self.backend.as_mut(), &mut self.errors, count)
            .to_vec()
    }

    /// Create buffers, returning an owned copy of the new names
    pub fn create_buffers(&mut self, count: usize) -> Vec<RawHandle> {
        self.resources
            .create_buffers(self.backend.as_mut(), &mut self.errors, count)
            .to_vec()
    }

    /// Create framebuffers, returning an owned copy of the new names
    pub fn create_frame_buffers(&mut self, count: usize) -> Vec<RawHandle> {
        self.resources
            .create_frame_buffers(self.backend.as_mut(), &mut self.errors, count)
            .to_vec()
    }

    /// Create renderbuffers, returning an owned copy of the new names
    pub fn create_render_buffers(&mut self, count: usize) -> Vec<RawHandle> {
        self.resources
            .create_render_buffers(self.backend.as_mut(), &mut self.errors, count)
            .to_vec()
    }

    /// Create textures, returning an owned copy of the new names
    pub fn create_textures(&mut self, count: usize) -> Vec<RawHandle> {
        self.resources
            .create_textures(self.backend.as_mut(), &mut self.errors, count)
            .to_vec()
    }

    /// Release every GPU name created through this context
    pub fn free(&mut self) {
        self.resources.free(self.backend.as_mut());
    }

    /// Borrow the device as a concrete type
    pub fn backend_as<B: GraphicsBackend + 'static>(&self) -> Option<&B> {
        self.backend.as_any().downcast_ref::<B>()
    }

    /// Mutably borrow the device as a concrete type
    pub fn backend_as_mut<B: GraphicsBackend + 'static>(&mut self) -> Option<&mut B> {
        self.backend.as_any_mut().downcast_mut::<B>()
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("ready", &self.is_ready())
            .field("resources", &self.resources)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}
