//! OpenGL 4.5 device
//!
//! [`GlBackend`] drives a real driver through `glow`. Every object name the
//! render core sees is the driver's own name, so `RawHandle` values can be
//! cross-checked in a GL debugger.
//!
//! All calls assume the context the backend was loaded from is current on
//! the calling thread. [`GlWindow`](crate::render::window::GlWindow) keeps
//! that true for the lifetime of the window.

#![allow(unsafe_code)]

use std::any::Any;
use std::collections::HashMap;
use std::num::NonZeroU32;

use glow::HasContext;

use super::{
    Attachment, ClearFlags, FaceCulling, FrontFace, GraphicsBackend, Primitive, RawHandle, ResourceKind,
    ShaderStage, TextureFormat, TextureTarget, UniformValue, VertexAttribute, INVALID_HANDLE,
};

/// `glow` backed implementation of [`GraphicsBackend`]
pub struct GlBackend {
    gl: glow::Context,
    frame_buffer: RawHandle,
    program: RawHandle,
    texture_sizes: HashMap<RawHandle, (u32, u32)>,
    colour_attachments: HashMap<(RawHandle, u32), RawHandle>,
}

impl std::fmt::Debug for GlBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlBackend")
            .field("frame_buffer", &self.frame_buffer)
            .field("program", &self.program)
            .field("textures", &self.texture_sizes.len())
            .finish_non_exhaustive()
    }
}

impl GlBackend {
    /// Wrap a loaded context
    pub fn new(gl: glow::Context) -> Self {
        let version = gl.version();
        log::info!(
            "OpenGL {}.{} ({})",
            version.major,
            version.minor,
            version.vendor_info
        );
        Self {
            gl,
            frame_buffer: INVALID_HANDLE,
            program: INVALID_HANDLE,
            texture_sizes: HashMap::new(),
            colour_attachments: HashMap::new(),
        }
    }

    /// Load the GL entry points through a windowing library's proc lookup
    ///
    /// # Safety
    ///
    /// The context the loader resolves against must be current on this
    /// thread for as long as the backend is used.
    pub unsafe fn from_loader_function<F>(loader: F) -> Self
    where
        F: FnMut(&str) -> *const std::os::raw::c_void,
    {
        Self::new(glow::Context::from_loader_function(loader))
    }

    /// Underlying `glow` context
    pub const fn gl(&self) -> &glow::Context {
        &self.gl
    }

    fn with_draw_frame_buffer(&self, frame_buffer: RawHandle, f: impl FnOnce(&glow::Context)) {
        unsafe {
            self.gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, native(frame_buffer, glow::NativeFramebuffer));
            f(&self.gl);
            self.gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, native(self.frame_buffer, glow::NativeFramebuffer));
        }
    }

    fn upload_uniform(&self, location: Option<&glow::NativeUniformLocation>, value: UniformValue) {
        unsafe {
            match value {
                UniformValue::U32(v) => self.gl.uniform_1_u32(location, v),
                UniformValue::I32(v) => self.gl.uniform_1_i32(location, v),
                UniformValue::F32(v) => self.gl.uniform_1_f32(location, v),
                UniformValue::Vec2(v) => self.gl.uniform_2_f32(location, v.x, v.y),
                UniformValue::Vec3(v) => self.gl.uniform_3_f32(location, v.x, v.y, v.z),
                UniformValue::Vec4(v) => self.gl.uniform_4_f32(location, v.x, v.y, v.z, v.w),
                UniformValue::Mat4(m) => self.gl.uniform_matrix_4_f32_slice(location, false, m.as_slice()),
            }
        }
    }
}

impl GraphicsBackend for GlBackend {
    fn is_context_current(&self) -> bool {
        true
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<RawHandle, String> {
        unsafe {
            let shader = self.gl.create_shader(shader_type(stage))?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if !self.gl.get_shader_compile_status(shader) {
                let info = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                return Err(format!("{stage:?} shader: {info}"));
            }
            Ok(shader.0.get())
        }
    }

    fn delete_shader(&mut self, shader: RawHandle) {
        if let Some(shader) = native(shader, glow::NativeShader) {
            unsafe { self.gl.delete_shader(shader) };
        }
    }

    fn link_program(&mut self, shaders: &[RawHandle]) -> Result<RawHandle, String> {
        let stages: Vec<glow::NativeShader> = shaders.iter().filter_map(|&s| native(s, glow::NativeShader)).collect();
        if stages.is_empty() {
            return Err("program has no attached shaders".to_owned());
        }
        unsafe {
            let program = self.gl.create_program()?;
            for &shader in &stages {
                self.gl.attach_shader(program, shader);
            }
            self.gl.link_program(program);
            for &shader in &stages {
                self.gl.detach_shader(program, shader);
            }
            if !self.gl.get_program_link_status(program) {
                let info = self.gl.get_program_info_log(program);
                self.gl.delete_program(program);
                return Err(info);
            }
            Ok(program.0.get())
        }
    }

    fn gen_handles(&mut self, kind: ResourceKind, count: usize) -> Vec<RawHandle> {
        let mut handles = Vec::with_capacity(count);
        for _ in 0..count {
            let created = unsafe {
                match kind {
                    ResourceKind::Program => {
                        log::warn!("Programs are created by linking, not generated");
                        return handles;
                    }
                    ResourceKind::VertexArray => self.gl.create_vertex_array().map(|h| h.0),
                    ResourceKind::Buffer => self.gl.create_buffer().map(|h| h.0),
                    ResourceKind::FrameBuffer => self.gl.create_framebuffer().map(|h| h.0),
                    ResourceKind::RenderBuffer => self.gl.create_renderbuffer().map(|h| h.0),
                    ResourceKind::Texture => self.gl.create_texture().map(|h| h.0),
                }
            };
            match created {
                Ok(name) => handles.push(name.get()),
                Err(message) => {
                    log::error!("Creating {kind:?} failed: {message}");
                    break;
                }
            }
        }
        handles
    }

    fn delete_handles(&mut self, kind: ResourceKind, handles: &[RawHandle]) {
        for &handle in handles {
            let Some(name) = NonZeroU32::new(handle) else {
                continue;
            };
            unsafe {
                match kind {
                    ResourceKind::Program => {
                        if self.program == handle {
                            self.program = INVALID_HANDLE;
                        }
                        self.gl.delete_program(glow::NativeProgram(name));
                    }
                    ResourceKind::VertexArray => self.gl.delete_vertex_array(glow::NativeVertexArray(name)),
                    ResourceKind::Buffer => self.gl.delete_buffer(glow::NativeBuffer(name)),
                    ResourceKind::FrameBuffer => {
                        if self.frame_buffer == handle {
                            self.frame_buffer = INVALID_HANDLE;
                        }
                        self.colour_attachments.retain(|(fb, _), _| *fb != handle);
                        self.gl.delete_framebuffer(glow::NativeFramebuffer(name));
                    }
                    ResourceKind::RenderBuffer => self.gl.delete_renderbuffer(glow::NativeRenderbuffer(name)),
                    ResourceKind::Texture => {
                        self.texture_sizes.remove(&handle);
                        self.gl.delete_texture(glow::NativeTexture(name));
                    }
                }
            }
        }
    }

    fn allocate_texture_2d(&mut self, texture: RawHandle, width: u32, height: u32, format: TextureFormat) {
        let Some(name) = native(texture, glow::NativeTexture) else {
            return;
        };
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(name));
            self.gl.tex_storage_2d(glow::TEXTURE_2D, 1, internal_format(format), gl_int(width), gl_int(height));
            set_sampling(&self.gl, glow::TEXTURE_2D);
            self.gl.bind_texture(glow::TEXTURE_2D, None);
        }
        self.texture_sizes.insert(texture, (width, height));
    }

    fn allocate_texture_2d_array(
        &mut self,
        texture: RawHandle,
        width: u32,
        height: u32,
        layers: u32,
        format: TextureFormat,
    ) {
        let Some(name) = native(texture, glow::NativeTexture) else {
            return;
        };
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D_ARRAY, Some(name));
            self.gl.tex_storage_3d(
                glow::TEXTURE_2D_ARRAY,
                1,
                internal_format(format),
                gl_int(width),
                gl_int(height),
                gl_int(layers),
            );
            set_sampling(&self.gl, glow::TEXTURE_2D_ARRAY);
            self.gl.bind_texture(glow::TEXTURE_2D_ARRAY, None);
        }
        self.texture_sizes.insert(texture, (width, height));
    }

    fn allocate_render_buffer(&mut self, render_buffer: RawHandle, width: u32, height: u32, format: TextureFormat) {
        let Some(name) = native(render_buffer, glow::NativeRenderbuffer) else {
            return;
        };
        unsafe {
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, Some(name));
            self.gl
                .renderbuffer_storage(glow::RENDERBUFFER, internal_format(format), gl_int(width), gl_int(height));
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, None);
        }
    }

    fn attach_texture(&mut self, frame_buffer: RawHandle, attachment: Attachment, texture: RawHandle, layer: Option<u32>) {
        if frame_buffer == INVALID_HANDLE {
            return;
        }
        let name = native(texture, glow::NativeTexture);
        let point = attachment_point(attachment);
        self.with_draw_frame_buffer(frame_buffer, |gl| unsafe {
            match layer {
                Some(layer) => gl.framebuffer_texture_layer(glow::DRAW_FRAMEBUFFER, point, name, 0, gl_int(layer)),
                None => gl.framebuffer_texture_2d(glow::DRAW_FRAMEBUFFER, point, glow::TEXTURE_2D, name, 0),
            }
        });
        if let Attachment::Colour(index) = attachment {
            if texture == INVALID_HANDLE {
                self.colour_attachments.remove(&(frame_buffer, index));
            } else {
                self.colour_attachments.insert((frame_buffer, index), texture);
            }
        }
    }

    fn attach_render_buffer(&mut self, frame_buffer: RawHandle, attachment: Attachment, render_buffer: RawHandle) {
        if frame_buffer == INVALID_HANDLE {
            return;
        }
        let name = native(render_buffer, glow::NativeRenderbuffer);
        let point = attachment_point(attachment);
        self.with_draw_frame_buffer(frame_buffer, |gl| unsafe {
            gl.framebuffer_renderbuffer(glow::DRAW_FRAMEBUFFER, point, glow::RENDERBUFFER, name);
        });
    }

    fn set_draw_buffers(&mut self, frame_buffer: RawHandle, colour_attachments: &[u32]) {
        if frame_buffer == INVALID_HANDLE {
            return;
        }
        let buffers: Vec<u32> = colour_attachments.iter().map(|&i| glow::COLOR_ATTACHMENT0 + i).collect();
        self.with_draw_frame_buffer(frame_buffer, |gl| unsafe {
            if buffers.is_empty() {
                gl.draw_buffers(&[glow::NONE]);
                gl.read_buffer(glow::NONE);
            } else {
                gl.draw_buffers(&buffers);
            }
        });
    }

    fn framebuffer_complete(&self, frame_buffer: RawHandle) -> bool {
        if frame_buffer == INVALID_HANDLE {
            return false;
        }
        let mut status = 0;
        self.with_draw_frame_buffer(frame_buffer, |gl| unsafe {
            status = gl.check_framebuffer_status(glow::DRAW_FRAMEBUFFER);
        });
        if status != glow::FRAMEBUFFER_COMPLETE {
            log::warn!("Framebuffer {frame_buffer} incomplete: status {status:#x}");
        }
        status == glow::FRAMEBUFFER_COMPLETE
    }

    fn bind_framebuffer(&mut self, frame_buffer: RawHandle) {
        self.frame_buffer = frame_buffer;
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, native(frame_buffer, glow::NativeFramebuffer));
        }
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        unsafe { self.gl.viewport(x, y, gl_int(width), gl_int(height)) };
    }

    fn set_clear_colour(&mut self, colour: [f32; 4]) {
        let [r, g, b, a] = colour;
        unsafe { self.gl.clear_color(r, g, b, a) };
    }

    fn clear(&mut self, flags: ClearFlags) {
        unsafe { self.gl.clear(clear_mask(flags)) };
    }

    fn clear_colour_attachment_u32(&mut self, colour_attachment: u32, value: u32) {
        unsafe {
            self.gl
                .clear_buffer_u32_slice(glow::COLOR, colour_attachment, &[value, value, value, value]);
        }
    }

    fn set_depth_test(&mut self, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(glow::DEPTH_TEST);
            } else {
                self.gl.disable(glow::DEPTH_TEST);
            }
        }
    }

    fn set_culling(&mut self, culling: Option<FaceCulling>, front_face: FrontFace) {
        unsafe {
            self.gl.front_face(winding(front_face));
            match culling {
                Some(faces) => {
                    self.gl.enable(glow::CULL_FACE);
                    self.gl.cull_face(cull_mode(faces));
                }
                None => self.gl.disable(glow::CULL_FACE),
            }
        }
    }

    fn use_program(&mut self, program: RawHandle) {
        self.program = program;
        unsafe { self.gl.use_program(native(program, glow::NativeProgram)) };
    }

    fn set_uniform(&mut self, program: RawHandle, name: &str, value: UniformValue) {
        let Some(target) = native(program, glow::NativeProgram) else {
            return;
        };
        let location = unsafe { self.gl.get_uniform_location(target, name) };
        let Some(location) = location else {
            log::trace!("Uniform {name} not active in program {program}");
            return;
        };
        let current = self.program;
        if current != program {
            unsafe { self.gl.use_program(Some(target)) };
        }
        self.upload_uniform(Some(&location), value);
        if current != program {
            unsafe { self.gl.use_program(native(current, glow::NativeProgram)) };
        }
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: RawHandle) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(texture_target(target), native(texture, glow::NativeTexture));
        }
    }

    fn upload_buffer(&mut self, buffer: RawHandle, bytes: &[u8]) {
        let Some(name) = native(buffer, glow::NativeBuffer) else {
            return;
        };
        unsafe {
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(name));
            self.gl.buffer_data_u8_slice(glow::COPY_WRITE_BUFFER, bytes, glow::DYNAMIC_DRAW);
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
    }

    fn bind_storage_buffer(&mut self, binding: u32, buffer: RawHandle) {
        unsafe {
            self.gl
                .bind_buffer_base(glow::SHADER_STORAGE_BUFFER, binding, native(buffer, glow::NativeBuffer));
        }
    }

    fn configure_vertex_array(
        &mut self,
        vertex_array: RawHandle,
        vertex_buffer: RawHandle,
        index_buffer: RawHandle,
        stride: u32,
        attributes: &[VertexAttribute],
    ) {
        let Some(name) = native(vertex_array, glow::NativeVertexArray) else {
            return;
        };
        unsafe {
            self.gl.bind_vertex_array(Some(name));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, native(vertex_buffer, glow::NativeBuffer));
            for attribute in attributes {
                self.gl.enable_vertex_attrib_array(attribute.location);
                self.gl.vertex_attrib_pointer_f32(
                    attribute.location,
                    gl_int(attribute.components),
                    glow::FLOAT,
                    false,
                    gl_int(stride),
                    gl_int(attribute.offset),
                );
            }
            self.gl
                .bind_buffer(glow::ELEMENT_ARRAY_BUFFER, native(index_buffer, glow::NativeBuffer));
            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
    }

    fn draw_indexed(&mut self, vertex_array: RawHandle, primitive: Primitive, index_count: u32) {
        let Some(name) = native(vertex_array, glow::NativeVertexArray) else {
            return;
        };
        unsafe {
            self.gl.bind_vertex_array(Some(name));
            self.gl
                .draw_elements(primitive_mode(primitive), gl_int(index_count), glow::UNSIGNED_INT, 0);
            self.gl.bind_vertex_array(None);
        }
    }

    fn read_pixel_u32(&mut self, frame_buffer: RawHandle, colour_attachment: u32, x: u32, y: u32) -> Option<u32> {
        let texture = self.colour_attachments.get(&(frame_buffer, colour_attachment))?;
        let &(width, height) = self.texture_sizes.get(texture)?;
        if x >= width || y >= height {
            return None;
        }
        let mut texel = [0_u8; 4];
        unsafe {
            self.gl.bind_framebuffer(glow::READ_FRAMEBUFFER, native(frame_buffer, glow::NativeFramebuffer));
            self.gl.read_buffer(glow::COLOR_ATTACHMENT0 + colour_attachment);
            self.gl.read_pixels(
                gl_int(x),
                gl_int(y),
                1,
                1,
                glow::RED_INTEGER,
                glow::UNSIGNED_INT,
                glow::PixelPackData::Slice(&mut texel),
            );
            self.gl.bind_framebuffer(glow::READ_FRAMEBUFFER, native(self.frame_buffer, glow::NativeFramebuffer));
        }
        Some(u32::from_ne_bytes(texel))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn native<T>(handle: RawHandle, wrap: fn(NonZeroU32) -> T) -> Option<T> {
    NonZeroU32::new(handle).map(wrap)
}

fn gl_int(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

unsafe fn set_sampling(gl: &glow::Context, target: u32) {
    let nearest = gl_int(glow::NEAREST);
    let clamp = gl_int(glow::CLAMP_TO_EDGE);
    gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, nearest);
    gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, nearest);
    gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, clamp);
    gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, clamp);
}

const fn shader_type(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Geometry => glow::GEOMETRY_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    }
}

const fn internal_format(format: TextureFormat) -> u32 {
    match format {
        TextureFormat::Rgba8 => glow::RGBA8,
        TextureFormat::Rgba16F => glow::RGBA16F,
        TextureFormat::Rgba32F => glow::RGBA32F,
        TextureFormat::R32Ui => glow::R32UI,
        TextureFormat::Depth32F => glow::DEPTH_COMPONENT32F,
        TextureFormat::Depth24Stencil8 => glow::DEPTH24_STENCIL8,
    }
}

const fn texture_target(target: TextureTarget) -> u32 {
    match target {
        TextureTarget::Texture2D => glow::TEXTURE_2D,
        TextureTarget::Texture2DArray => glow::TEXTURE_2D_ARRAY,
    }
}

const fn attachment_point(attachment: Attachment) -> u32 {
    match attachment {
        Attachment::Colour(index) => glow::COLOR_ATTACHMENT0 + index,
        Attachment::Depth => glow::DEPTH_ATTACHMENT,
        Attachment::DepthStencil => glow::DEPTH_STENCIL_ATTACHMENT,
    }
}

const fn primitive_mode(primitive: Primitive) -> u32 {
    match primitive {
        Primitive::Points => glow::POINTS,
        Primitive::Lines => glow::LINES,
        Primitive::Triangles => glow::TRIANGLES,
    }
}

const fn cull_mode(culling: FaceCulling) -> u32 {
    match culling {
        FaceCulling::Front => glow::FRONT,
        FaceCulling::Back => glow::BACK,
        FaceCulling::FrontAndBack => glow::FRONT_AND_BACK,
    }
}

const fn winding(front_face: FrontFace) -> u32 {
    match front_face {
        FrontFace::Clockwise => glow::CW,
        FrontFace::CounterClockwise => glow::CCW,
    }
}

fn clear_mask(flags: ClearFlags) -> u32 {
    let mut mask = 0;
    if flags.contains(ClearFlags::COLOUR) {
        mask |= glow::COLOR_BUFFER_BIT;
    }
    if flags.contains(ClearFlags::DEPTH) {
        mask |= glow::DEPTH_BUFFER_BIT;
    }
    if flags.contains(ClearFlags::STENCIL) {
        mask |= glow::STENCIL_BUFFER_BIT;
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_mask_combines_bits() {
        assert_eq!(clear_mask(ClearFlags::empty()), 0);
        assert_eq!(
            clear_mask(ClearFlags::COLOUR | ClearFlags::DEPTH),
            glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT
        );
        assert_eq!(clear_mask(ClearFlags::all()), 0x4500);
    }

    #[test]
    fn test_attachment_points_follow_colour_index() {
        assert_eq!(attachment_point(Attachment::Colour(0)), glow::COLOR_ATTACHMENT0);
        assert_eq!(attachment_point(Attachment::Colour(3)), glow::COLOR_ATTACHMENT3);
        assert_eq!(attachment_point(Attachment::DepthStencil), glow::DEPTH_STENCIL_ATTACHMENT);
    }

    #[test]
    fn test_formats_match_sized_internal_formats() {
        assert_eq!(internal_format(TextureFormat::R32Ui), glow::R32UI);
        assert_eq!(internal_format(TextureFormat::Depth32F), glow::DEPTH_COMPONENT32F);
        assert_eq!(texture_target(TextureTarget::Texture2DArray), glow::TEXTURE_2D_ARRAY);
        assert_eq!(shader_type(ShaderStage::Geometry), glow::GEOMETRY_SHADER);
    }

    #[test]
    fn test_native_rejects_invalid_handle() {
        assert!(native(INVALID_HANDLE, glow::NativeTexture).is_none());
        assert_eq!(native(7, glow::NativeTexture).map(|t| t.0.get()), Some(7));
    }

    #[test]
    fn test_rasterizer_modes() {
        assert_eq!(primitive_mode(Primitive::Lines), glow::LINES);
        assert_eq!(cull_mode(FaceCulling::FrontAndBack), glow::FRONT_AND_BACK);
        assert_eq!(winding(FrontFace::Clockwise), glow::CW);
        assert_eq!(gl_int(u32::MAX), i32::MAX);
    }
}
