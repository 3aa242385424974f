//! Graphics API abstraction
//!
//! Every device call made by the render core goes through [`GraphicsBackend`].
//! The vocabulary is that of a handle-based immediate API: objects are plain
//! `u32` names, `0` is never a valid object, and binding `0` as a framebuffer
//! selects the default (window) framebuffer.
//!
//! [`GlBackend`] (feature `opengl`) is the real device. [`HeadlessBackend`]
//! is an in-memory double used by the test suite (feature `headless` exposes
//! it to other crates).

#[cfg(feature = "opengl")]
pub mod gl;
#[cfg(any(test, feature = "headless"))]
pub mod headless;

#[cfg(feature = "opengl")]
pub use gl::GlBackend;
#[cfg(any(test, feature = "headless"))]
pub use headless::HeadlessBackend;

use bitflags::bitflags;

use crate::foundation::math::{Mat4, Vec2, Vec3, Vec4};

/// Raw GPU object name
pub type RawHandle = u32;

/// Handle value that never names a live object
pub const INVALID_HANDLE: RawHandle = 0;

/// Shader pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage
    Vertex,
    /// Geometry stage
    Geometry,
    /// Fragment stage
    Fragment,
}

/// Category of GPU object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Linked shader program
    Program,
    /// Vertex array object
    VertexArray,
    /// Vertex, index or storage buffer
    Buffer,
    /// Framebuffer object
    FrameBuffer,
    /// Renderbuffer object
    RenderBuffer,
    /// Texture object
    Texture,
}

impl ResourceKind {
    /// Every kind, in teardown order
    pub const ALL: [Self; 6] = [
        Self::Program,
        Self::VertexArray,
        Self::Buffer,
        Self::FrameBuffer,
        Self::RenderBuffer,
        Self::Texture,
    ];

    /// Position of the kind in [`ResourceKind::ALL`]
    pub const fn index(self) -> usize {
        match self {
            Self::Program => 0,
            Self::VertexArray => 1,
            Self::Buffer => 2,
            Self::FrameBuffer => 3,
            Self::RenderBuffer => 4,
            Self::Texture => 5,
        }
    }
}

/// Texel storage format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit normalized RGBA
    Rgba8,
    /// 16-bit float RGBA
    Rgba16F,
    /// 32-bit float RGBA
    Rgba32F,
    /// Single 32-bit unsigned integer channel
    R32Ui,
    /// 32-bit float depth
    Depth32F,
    /// Packed 24-bit depth and 8-bit stencil
    Depth24Stencil8,
}

impl TextureFormat {
    /// Whether the format can back a depth attachment
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::Depth32F | Self::Depth24Stencil8)
    }
}

/// Texture binding target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    /// Single 2D image
    Texture2D,
    /// Layered 2D image array
    Texture2DArray,
}

/// Framebuffer attachment point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attachment {
    /// Colour attachment with its index
    Colour(u32),
    /// Depth attachment
    Depth,
    /// Combined depth/stencil attachment
    DepthStencil,
}

/// Primitive assembly mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// One point per index
    Points,
    /// One line per index pair
    Lines,
    /// One triangle per index triple
    Triangles,
}

/// Faces discarded by the rasterizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceCulling {
    /// Cull front faces
    Front,
    /// Cull back faces
    Back,
    /// Cull every polygon
    FrontAndBack,
}

/// Winding order considered front-facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    /// Clockwise winding
    Clockwise,
    /// Counter-clockwise winding
    CounterClockwise,
}

bitflags! {
    /// Buffers affected by a clear
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        /// Colour attachments
        const COLOUR = 1 << 0;
        /// Depth attachment
        const DEPTH = 1 << 1;
        /// Stencil attachment
        const STENCIL = 1 << 2;
    }
}

/// Value uploaded to a named program uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// Unsigned integer
    U32(u32),
    /// Signed integer, also used for sampler units
    I32(i32),
    /// Float
    F32(f32),
    /// 2-component vector
    Vec2(Vec2),
    /// 3-component vector
    Vec3(Vec3),
    /// 4-component vector
    Vec4(Vec4),
    /// 4x4 matrix
    Mat4(Mat4),
}

/// Layout of one vertex attribute inside an interleaved vertex buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader input location
    pub location: u32,
    /// Number of `f32` components
    pub components: u32,
    /// Byte offset inside one vertex
    pub offset: u32,
}

/// Handle-based graphics device
///
/// Implementations must tolerate calls with names they do not know (they are
/// ignored), mirroring how a driver reports errors out of band instead of
/// aborting.
pub trait GraphicsBackend {
    /// Whether a context exists and is current on this thread
    fn is_context_current(&self) -> bool;

    /// Compile one shader stage, returning the driver info log on failure
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<RawHandle, String>;

    /// Release a compiled shader stage
    fn delete_shader(&mut self, shader: RawHandle);

    /// Link compiled stages into a program, returning the info log on failure
    fn link_program(&mut self, shaders: &[RawHandle]) -> Result<RawHandle, String>;

    /// Generate `count` fresh names of the given kind (programs excluded)
    fn gen_handles(&mut self, kind: ResourceKind, count: usize) -> Vec<RawHandle>;

    /// Delete names of the given kind
    fn delete_handles(&mut self, kind: ResourceKind, handles: &[RawHandle]);

    /// Allocate immutable storage for a 2D texture
    fn allocate_texture_2d(&mut self, texture: RawHandle, width: u32, height: u32, format: TextureFormat);

    /// Allocate immutable storage for a 2D texture array
    fn allocate_texture_2d_array(
        &mut self,
        texture: RawHandle,
        width: u32,
        height: u32,
        layers: u32,
        format: TextureFormat,
    );

    /// Allocate storage for a renderbuffer
    fn allocate_render_buffer(&mut self, render_buffer: RawHandle, width: u32, height: u32, format: TextureFormat);

    /// Attach a texture (or one layer of an array) to a framebuffer
    ///
    /// Passing [`INVALID_HANDLE`] as the texture detaches the attachment point.
    fn attach_texture(&mut self, frame_buffer: RawHandle, attachment: Attachment, texture: RawHandle, layer: Option<u32>);

    /// Attach a renderbuffer to a framebuffer
    fn attach_render_buffer(&mut self, frame_buffer: RawHandle, attachment: Attachment, render_buffer: RawHandle);

    /// Select the colour attachments written by fragment outputs
    fn set_draw_buffers(&mut self, frame_buffer: RawHandle, colour_attachments: &[u32]);

    /// Whether a framebuffer is complete and can be rendered to
    fn framebuffer_complete(&self, frame_buffer: RawHandle) -> bool;

    /// Bind a framebuffer for drawing; `0` selects the default framebuffer
    fn bind_framebuffer(&mut self, frame_buffer: RawHandle);

    /// Set the viewport rectangle
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);

    /// Set the colour used by [`ClearFlags::COLOUR`]
    fn set_clear_colour(&mut self, colour: [f32; 4]);

    /// Clear buffers of the bound framebuffer
    fn clear(&mut self, flags: ClearFlags);

    /// Clear one integer colour attachment of the bound framebuffer
    fn clear_colour_attachment_u32(&mut self, colour_attachment: u32, value: u32);

    /// Enable or disable depth testing
    fn set_depth_test(&mut self, enabled: bool);

    /// Configure face culling; `None` disables it
    fn set_culling(&mut self, culling: Option<FaceCulling>, front_face: FrontFace);

    /// Make a program current
    fn use_program(&mut self, program: RawHandle);

    /// Upload a uniform value to a program
    fn set_uniform(&mut self, program: RawHandle, name: &str, value: UniformValue);

    /// Bind a texture to a texture unit
    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: RawHandle);

    /// Replace the contents of a buffer
    fn upload_buffer(&mut self, buffer: RawHandle, bytes: &[u8]);

    /// Bind a buffer to an indexed shader storage binding
    fn bind_storage_buffer(&mut self, binding: u32, buffer: RawHandle);

    /// Describe how a vertex array reads its vertex and index buffers
    fn configure_vertex_array(
        &mut self,
        vertex_array: RawHandle,
        vertex_buffer: RawHandle,
        index_buffer: RawHandle,
        stride: u32,
        attributes: &[VertexAttribute],
    );

    /// Draw indexed primitives from a vertex array into the bound framebuffer
    fn draw_indexed(&mut self, vertex_array: RawHandle, primitive: Primitive, index_count: u32);

    /// Read one texel of an integer colour attachment; blocks until the GPU is idle
    fn read_pixel_u32(&mut self, frame_buffer: RawHandle, colour_attachment: u32, x: u32, y: u32) -> Option<u32>;

    /// Downcast support for backend-specific inspection
    fn as_any(&self) -> &dyn std::any::Any;

    /// Mutable downcast support for backend-specific inspection
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
