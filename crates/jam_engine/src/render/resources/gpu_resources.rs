//! GPU resource handle manager
//!
//! `GpuResources` creates every program, vertex array, buffer, framebuffer,
//! renderbuffer and texture used by the render core and remembers them so a
//! single [`GpuResources::free`] tears everything down. It owns no device:
//! the backend and error log are passed to each call by the render context.

use crate::render::backend::{GraphicsBackend, RawHandle, ResourceKind, ShaderStage, INVALID_HANDLE};
use crate::render::error_log::ErrorLog;

use super::handle_pool::HandlePool;

/// Registry of every GPU name created by the render core
#[derive(Debug)]
pub struct GpuResources {
    pools: [HandlePool; 6],
}

impl GpuResources {
    /// Create a manager with empty pools
    pub const fn new() -> Self {
        Self {
            pools: [
                HandlePool::new(ResourceKind::Program),
                HandlePool::new(ResourceKind::VertexArray),
                HandlePool::new(ResourceKind::Buffer),
                HandlePool::new(ResourceKind::FrameBuffer),
                HandlePool::new(ResourceKind::RenderBuffer),
                HandlePool::new(ResourceKind::Texture),
            ],
        }
    }

    /// Pool holding the names of a kind
    pub const fn pool(&self, kind: ResourceKind) -> &HandlePool {
        &self.pools[kind.index()]
    }

    /// Number of live names of a kind
    pub const fn len(&self, kind: ResourceKind) -> usize {
        self.pools[kind.index()].len()
    }

    /// Whether no names of any kind are held
    pub fn is_empty(&self) -> bool {
        self.pools.iter().all(HandlePool::is_empty)
    }

    /// Compile the present stages and link them into a program
    ///
    /// A stage passed as `None` is left out of the link. On any compile or
    /// link failure the driver message is pushed to `errors` and
    /// [`INVALID_HANDLE`] is returned.
    pub fn create_program(
        &mut self,
        device: &mut dyn GraphicsBackend,
        errors: &mut ErrorLog,
        fragment: Option<&str>,
        vertex: Option<&str>,
    ) -> RawHandle {
        let stages = [(ShaderStage::Vertex, vertex), (ShaderStage::Fragment, fragment)];
        let mut shaders = Vec::with_capacity(stages.len());

        for (stage, source) in stages {
            let Some(source) = source else { continue };
            let shader = self.compile_shader(device, errors, stage, source);
            if shader == INVALID_HANDLE {
                for compiled in shaders {
                    device.delete_shader(compiled);
                }
                return INVALID_HANDLE;
            }
            shaders.push(shader);
        }

        if shaders.is_empty() {
            errors.add_error("program has no shader stages", "GpuResources::create_program", line!());
            return INVALID_HANDLE;
        }

        let linked = device.link_program(&shaders);
        for shader in shaders {
            device.delete_shader(shader);
        }

        match linked {
            Ok(program) => {
                log::debug!("Linked program {program}");
                self.pools[ResourceKind::Program.index()].push_batch(vec![program]);
                program
            }
            Err(message) => {
                errors.add_error(message, "GpuResources::create_program", line!());
                INVALID_HANDLE
            }
        }
    }

    /// Compile a single shader stage
    ///
    /// Returns [`INVALID_HANDLE`] and records the compiler message on failure.
    pub fn compile_shader(
        &mut self,
        device: &mut dyn GraphicsBackend,
        errors: &mut ErrorLog,
        stage: ShaderStage,
        source: &str,
    ) -> RawHandle {
        match device.compile_shader(stage, source) {
            Ok(shader) => shader,
            Err(message) => {
                errors.add_error(
                    format!("{stage:?} shader: {message}"),
                    "GpuResources::compile_shader",
                    line!(),
                );
                INVALID_HANDLE
            }
        }
    }

    /// Create `count` vertex arrays
    pub fn create_vertex_arrays(
        &mut self,
        device: &mut dyn GraphicsBackend,
        errors: &mut ErrorLog,
        count: usize,
    ) -> &[RawHandle] {
        self.create_batch(device, errors, ResourceKind::VertexArray, count)
    }

    /// Create `count` buffers
    pub fn create_buffers(&mut self, device: &mut dyn GraphicsBackend, errors: &mut ErrorLog, count: usize) -> &[RawHandle] {
        self.create_batch(device, errors, ResourceKind::Buffer, count)
    }

    /// Create `count` framebuffers
    pub fn create_frame_buffers(
        &mut self,
        device: &mut dyn GraphicsBackend,
        errors: &mut ErrorLog,
        count: usize,
    ) -> &[RawHandle] {
        self.create_batch(device, errors, ResourceKind::FrameBuffer, count)
    }

    /// Create `count` renderbuffers
    pub fn create_render_buffers(
        &mut self,
        device: &mut dyn GraphicsBackend,
        errors: &mut ErrorLog,
        count: usize,
    ) -> &[RawHandle] {
        self.create_batch(device, errors, ResourceKind::RenderBuffer, count)
    }

    /// Create `count` textures
    pub fn create_textures(&mut self, device: &mut dyn GraphicsBackend, errors: &mut ErrorLog, count: usize) -> &[RawHandle] {
        self.create_batch(device, errors, ResourceKind::Texture, count)
    }

    /// Release specific textures
    pub fn release_textures(&mut self, device: &mut dyn GraphicsBackend, handles: &[RawHandle]) {
        self.release(device, ResourceKind::Texture, handles);
    }

    /// Release specific framebuffers
    pub fn release_frame_buffers(&mut self, device: &mut dyn GraphicsBackend, handles: &[RawHandle]) {
        self.release(device, ResourceKind::FrameBuffer, handles);
    }

    /// Release specific renderbuffers
    pub fn release_render_buffers(&mut self, device: &mut dyn GraphicsBackend, handles: &[RawHandle]) {
        self.release(device, ResourceKind::RenderBuffer, handles);
    }

    /// Release every name of every kind
    ///
    /// Safe to call repeatedly; the manager stays usable afterwards.
    pub fn free(&mut self, device: &mut dyn GraphicsBackend) {
        for pool in &mut self.pools {
            let handles = pool.take_all();
            if handles.is_empty() {
                continue;
            }
            log::debug!("Releasing {} {:?} handles", handles.len(), pool.kind());
            device.delete_handles(pool.kind(), &handles);
        }
    }

    fn create_batch(
        &mut self,
        device: &mut dyn GraphicsBackend,
        errors: &mut ErrorLog,
        kind: ResourceKind,
        count: usize,
    ) -> &[RawHandle] {
        if count == 0 {
            return &[];
        }
        let batch = device.gen_handles(kind, count);
        if batch.len() != count || batch.contains(&INVALID_HANDLE) {
            errors.add_error(
                format!("device returned {} of {count} {kind:?} handles", batch.len()),
                "GpuResources::create_batch",
                line!(),
            );
            let partial: Vec<RawHandle> = batch.into_iter().filter(|h| *h != INVALID_HANDLE).collect();
            device.delete_handles(kind, &partial);
            return &[];
        }
        log::debug!("Created {count} {kind:?} handles");
        self.pools[kind.index()].push_batch(batch)
    }

    fn release(&mut self, device: &mut dyn GraphicsBackend, kind: ResourceKind, handles: &[RawHandle]) {
        let removed = self.pools[kind.index()].remove(handles);
        if removed.len() != handles.len() {
            log::warn!(
                "Released {} of {} {kind:?} handles; the rest were not owned by the resource manager",
                removed.len(),
                handles.len()
            );
        }
        device.delete_handles(kind, &removed);
    }
}

impl Default for GpuResources {
    fn default() -> Self {
        Self::new()
    }
}
