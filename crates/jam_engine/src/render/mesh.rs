//! Mesh interfaces
//!
//! The render core does not load or own scene geometry. It talks to meshes
//! through two traits:
//!
//! - [`MeshProvider`] accepts CPU-side [`CustomMesh`] data and hands back a
//!   [`MeshId`]; it is passed to the camera by reference on every call that
//!   needs geometry.
//! - [`DrawableMesh`] separates the GPU upload ([`DrawableMesh::ensure_uploaded`])
//!   from drawing, so [`DrawableMesh::render`] never mutates.
//!
//! [`MeshLibrary`] and [`GpuMesh`] are the stock implementations.

use bytemuck::{Pod, Zeroable};

use super::backend::{FaceCulling, FrontFace, Primitive, RawHandle, VertexAttribute};
use super::context::RenderContext;
use super::RenderError;

/// Identifier of a mesh inside a provider
pub type MeshId = u32;

/// 3D vertex data structure for rendering
///
/// `#[repr(C)]` keeps the layout the vertex attributes below describe.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in 3D space
    pub position: [f32; 3],

    /// Normal vector
    pub normal: [f32; 3],

    /// Texture coordinates
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Create a new vertex
    pub const fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }

    /// Bytes per vertex
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;

    /// Attribute layout: position at 0, normal at 1, texture coordinates at 2
    pub const ATTRIBUTES: [VertexAttribute; 3] = [
        VertexAttribute { location: 0, components: 3, offset: 0 },
        VertexAttribute { location: 1, components: 3, offset: 12 },
        VertexAttribute { location: 2, components: 2, offset: 24 },
    ];
}

/// CPU-side geometry handed to a [`MeshProvider`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomMesh {
    /// Vertex data
    pub vertices: Vec<Vertex>,
    /// Triangle (or line/point) indices into `vertices`
    pub indices: Vec<u32>,
}

impl CustomMesh {
    /// Create a mesh from vertices and indices
    pub const fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Whether the mesh has anything to draw
    pub fn has_mesh(&self) -> bool {
        !self.vertices.is_empty() && !self.indices.is_empty()
    }

    /// Whether every index points at an existing vertex
    pub fn indices_in_range(&self) -> bool {
        let count = self.vertices.len();
        self.indices.iter().all(|&i| (i as usize) < count)
    }

    /// Two triangles covering clip space, used for full-screen passes
    pub fn screen_quad() -> Self {
        let normal = [0.0, 0.0, 1.0];
        Self::new(
            vec![
                Vertex::new([-1.0, -1.0, 0.0], normal, [0.0, 0.0]),
                Vertex::new([1.0, -1.0, 0.0], normal, [1.0, 0.0]),
                Vertex::new([1.0, 1.0, 0.0], normal, [1.0, 1.0]),
                Vertex::new([-1.0, 1.0, 0.0], normal, [0.0, 1.0]),
            ],
            vec![0, 1, 2, 2, 3, 0],
        )
    }

    /// Unit cube centred on the origin
    pub fn cube() -> Self {
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ];
        let corners = [(-1.0, -1.0, [0.0, 0.0]), (1.0, -1.0, [1.0, 0.0]), (1.0, 1.0, [1.0, 1.0]), (-1.0, 1.0, [0.0, 1.0])];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u, v) in faces {
            let base = u32::try_from(vertices.len()).unwrap_or(0);
            for (a, b, tex_coord) in corners {
                let position = [
                    0.5 * (normal[0] + a * u[0] + b * v[0]),
                    0.5 * (normal[1] + a * u[1] + b * v[1]),
                    0.5 * (normal[2] + a * u[2] + b * v[2]),
                ];
                vertices.push(Vertex::new(position, normal, tex_coord));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        Self::new(vertices, indices)
    }
}

/// Primitive assembly mode of a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    /// Draw points
    Points,
    /// Draw lines
    Lines,
    /// Draw triangles
    #[default]
    Triangles,
}

/// Faces discarded when culling is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    /// Cull front faces
    Front,
    /// Cull back faces
    #[default]
    Back,
    /// Cull both front and back faces
    FrontAndBack,
}

/// Winding order considered front-facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullFront {
    /// Clockwise faces are front faces
    #[default]
    Clockwise,
    /// Counter-clockwise faces are front faces
    CounterClockwise,
}

/// Per-draw rasterizer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawConfig {
    /// Primitive assembly mode
    pub mode: DrawMode,
    /// Whether culling is enabled
    pub active_culling: bool,
    /// Faces to cull
    pub cull_mode: CullMode,
    /// Front-face winding
    pub cull_face: CullFront,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            mode: DrawMode::Triangles,
            active_culling: true,
            cull_mode: CullMode::Back,
            cull_face: CullFront::Clockwise,
        }
    }
}

impl DrawConfig {
    /// Configuration for full-screen passes: triangles, no culling
    pub fn screen_pass() -> Self {
        Self {
            active_culling: false,
            ..Self::default()
        }
    }

    fn primitive(&self) -> Primitive {
        match self.mode {
            DrawMode::Points => Primitive::Points,
            DrawMode::Lines => Primitive::Lines,
            DrawMode::Triangles => Primitive::Triangles,
        }
    }

    fn culling(&self) -> (Option<FaceCulling>, FrontFace) {
        let culling = self.active_culling.then_some(match self.cull_mode {
            CullMode::Front => FaceCulling::Front,
            CullMode::Back => FaceCulling::Back,
            CullMode::FrontAndBack => FaceCulling::FrontAndBack,
        });
        let front = match self.cull_face {
            CullFront::Clockwise => FrontFace::Clockwise,
            CullFront::CounterClockwise => FrontFace::CounterClockwise,
        };
        (culling, front)
    }
}

/// Geometry that can be uploaded once and drawn many times
pub trait DrawableMesh {
    /// Create GPU buffers for the mesh if that has not happened yet
    fn ensure_uploaded(&mut self, ctx: &mut RenderContext) -> Result<(), RenderError>;

    /// Whether GPU buffers exist
    fn is_uploaded(&self) -> bool;

    /// Draw into the bound framebuffer with the current program
    fn render(&self, ctx: &mut RenderContext, config: &DrawConfig);
}

/// Store of meshes addressed by [`MeshId`]
pub trait MeshProvider {
    /// Take ownership of CPU geometry; `None` when the mesh is unusable
    fn upload_mesh(&mut self, mesh: CustomMesh) -> Option<MeshId>;

    /// Look up a mesh for drawing
    fn get_mesh(&self, id: MeshId) -> Option<&dyn DrawableMesh>;

    /// Look up a mesh for uploading
    fn get_mesh_mut(&mut self, id: MeshId) -> Option<&mut dyn DrawableMesh>;
}

/// GPU buffers created for a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MeshBuffers {
    vertex_array: RawHandle,
    vertex_buffer: RawHandle,
    index_buffer: RawHandle,
}

/// Mesh with lazily created GPU buffers
#[derive(Debug, Clone)]
pub struct GpuMesh {
    data: CustomMesh,
    buffers: Option<MeshBuffers>,
}

impl GpuMesh {
    /// Wrap CPU geometry; nothing is uploaded yet
    pub const fn new(data: CustomMesh) -> Self {
        Self { data, buffers: None }
    }

    /// CPU geometry
    pub const fn data(&self) -> &CustomMesh {
        &self.data
    }
}

impl DrawableMesh for GpuMesh {
    fn ensure_uploaded(&mut self, ctx: &mut RenderContext) -> Result<(), RenderError> {
        if self.buffers.is_some() {
            return Ok(());
        }
        let vertex_array = ctx
            .create_vertex_arrays(1)
            .first()
            .copied()
            .ok_or_else(|| RenderError::ResourceCreationFailed("mesh vertex array".to_owned()))?;
        let buffers = ctx.create_buffers(2);
        let [vertex_buffer, index_buffer] = buffers[..] else {
            return Err(RenderError::ResourceCreationFailed("mesh buffers".to_owned()));
        };

        ctx.backend
            .upload_buffer(vertex_buffer, bytemuck::cast_slice(&self.data.vertices));
        ctx.backend
            .upload_buffer(index_buffer, bytemuck::cast_slice(&self.data.indices));
        ctx.backend.configure_vertex_array(
            vertex_array,
            vertex_buffer,
            index_buffer,
            Vertex::STRIDE,
            &Vertex::ATTRIBUTES,
        );
        log::debug!(
            "Uploaded mesh: {} vertices, {} indices",
            self.data.vertices.len(),
            self.data.indices.len()
        );

        self.buffers = Some(MeshBuffers {
            vertex_array,
            vertex_buffer,
            index_buffer,
        });
        Ok(())
    }

    fn is_uploaded(&self) -> bool {
        self.buffers.is_some()
    }

    fn render(&self, ctx: &mut RenderContext, config: &DrawConfig) {
        let Some(buffers) = self.buffers else {
            log::warn!("Mesh rendered before upload; skipped");
            return;
        };
        let (culling, front_face) = config.culling();
        ctx.backend.set_culling(culling, front_face);
        let index_count = u32::try_from(self.data.indices.len()).unwrap_or(u32::MAX);
        ctx.backend
            .draw_indexed(buffers.vertex_array, config.primitive(), index_count);
    }
}

/// Vector-backed [`MeshProvider`]
#[derive(Debug, Default)]
pub struct MeshLibrary {
    meshes: Vec<GpuMesh>,
}

impl MeshLibrary {
    /// Create an empty library
    pub const fn new() -> Self {
        Self { meshes: Vec::new() }
    }

    /// Number of stored meshes
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Whether the library is empty
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Upload every stored mesh that is not on the GPU yet
    pub fn upload_all(&mut self, ctx: &mut RenderContext) -> Result<(), RenderError> {
        for mesh in &mut self.meshes {
            mesh.ensure_uploaded(ctx)?;
        }
        Ok(())
    }
}

impl MeshProvider for MeshLibrary {
    fn upload_mesh(&mut self, mesh: CustomMesh) -> Option<MeshId> {
        if !mesh.has_mesh() || !mesh.indices_in_range() {
            log::warn!("Rejected mesh with {} vertices and {} indices", mesh.vertices.len(), mesh.indices.len());
            return None;
        }
        let id = MeshId::try_from(self.meshes.len()).ok()?;
        self.meshes.push(GpuMesh::new(mesh));
        Some(id)
    }

    fn get_mesh(&self, id: MeshId) -> Option<&dyn DrawableMesh> {
        self.meshes.get(id as usize).map(|mesh| mesh as &dyn DrawableMesh)
    }

    fn get_mesh_mut(&mut self, id: MeshId) -> Option<&mut dyn DrawableMesh> {
        self.meshes.get_mut(id as usize).map(|mesh| mesh as &mut dyn DrawableMesh)
    }
}
