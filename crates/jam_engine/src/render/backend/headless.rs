//! In-memory graphics device for tests
//!
//! `HeadlessBackend` implements [`GraphicsBackend`] without a GPU and stands
//! in for the OpenGL device in the test suite. It keeps
//! the bookkeeping a driver would: which names are alive, how textures were
//! allocated, what is attached where, which framebuffer/program/textures are
//! bound and the last value of every uniform. Integer colour attachments keep
//! real texel values so picking can be exercised end to end; everything else
//! is recorded but not rasterized.

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::{
    Attachment, ClearFlags, FaceCulling, FrontFace, GraphicsBackend, Primitive, RawHandle, ResourceKind,
    ShaderStage, TextureFormat, TextureTarget, UniformValue, VertexAttribute, INVALID_HANDLE,
};

/// Storage description of a texture or renderbuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Array layers (1 for plain 2D images)
    pub layers: u32,
    /// Texel format
    pub format: TextureFormat,
    /// Binding target the storage was allocated for
    pub target: TextureTarget,
}

/// Image attached to a framebuffer attachment point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachedImage {
    /// Texture or renderbuffer name
    pub handle: RawHandle,
    /// Attached array layer, if a single layer was attached
    pub layer: Option<u32>,
    /// Whether `handle` names a renderbuffer
    pub render_buffer: bool,
}

/// Counters accumulated since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Indexed draw calls issued
    pub draw_calls: u32,
    /// Clears issued, of any kind
    pub clears: u32,
    /// Depth clears issued
    pub depth_clears: u32,
    /// Blocking pixel readbacks
    pub readbacks: u32,
}

#[derive(Debug, Default)]
struct FrameBufferState {
    attachments: BTreeMap<Attachment, AttachedImage>,
    draw_buffers: Vec<u32>,
}

#[derive(Debug, Default)]
struct TexelPlane {
    fill: u32,
    written: HashMap<(u32, u32), u32>,
}

#[derive(Debug, Clone, Copy)]
struct VertexArrayState {
    vertex_buffer: RawHandle,
    index_buffer: RawHandle,
    stride: u32,
}

/// Pipeline state the device currently holds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineState {
    /// Bound draw framebuffer, `0` for the default one
    pub frame_buffer: RawHandle,
    /// Viewport as `(x, y, width, height)`
    pub viewport: (i32, i32, u32, u32),
    /// Current program
    pub program: RawHandle,
    /// Depth test enabled
    pub depth_test: bool,
    /// Face culling mode
    pub culling: Option<FaceCulling>,
    /// Front face winding
    pub front_face: FrontFace,
    /// Colour used by colour clears
    pub clear_colour: [f32; 4],
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            frame_buffer: INVALID_HANDLE,
            viewport: (0, 0, 0, 0),
            program: INVALID_HANDLE,
            depth_test: false,
            culling: None,
            front_face: FrontFace::CounterClockwise,
            clear_colour: [0.0; 4],
        }
    }
}

/// Graphics device that keeps all state in memory
#[derive(Debug)]
pub struct HeadlessBackend {
    context_current: bool,
    next_name: [RawHandle; 6],
    live: [HashSet<RawHandle>; 6],
    next_shader: RawHandle,
    shaders: HashMap<RawHandle, ShaderStage>,
    images: HashMap<RawHandle, ImageInfo>,
    render_buffers: HashMap<RawHandle, ImageInfo>,
    frame_buffers: HashMap<RawHandle, FrameBufferState>,
    buffers: HashMap<RawHandle, Vec<u8>>,
    vertex_arrays: HashMap<RawHandle, VertexArrayState>,
    storage_bindings: HashMap<u32, RawHandle>,
    texture_units: HashMap<u32, (TextureTarget, RawHandle)>,
    uniforms: HashMap<(RawHandle, String), UniformValue>,
    planes: HashMap<(RawHandle, u32), TexelPlane>,
    state: PipelineState,
    stats: DeviceStats,
}

impl HeadlessBackend {
    /// Create a device with a current context
    pub fn new() -> Self {
        Self {
            context_current: true,
            next_name: [1; 6],
            live: Default::default(),
            next_shader: 1,
            shaders: HashMap::new(),
            images: HashMap::new(),
            render_buffers: HashMap::new(),
            frame_buffers: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            storage_bindings: HashMap::new(),
            texture_units: HashMap::new(),
            uniforms: HashMap::new(),
            planes: HashMap::new(),
            state: PipelineState::default(),
            stats: DeviceStats::default(),
        }
    }

    /// Create a device whose context has not been made current yet
    pub fn without_context() -> Self {
        Self {
            context_current: false,
            ..Self::new()
        }
    }

    /// Make the context current or lose it
    pub fn set_context_current(&mut self, current: bool) {
        self.context_current = current;
    }

    /// Number of live names of a kind
    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.live[kind.index()].len()
    }

    /// Whether a name of a kind is alive
    pub fn is_live(&self, kind: ResourceKind, handle: RawHandle) -> bool {
        self.live[kind.index()].contains(&handle)
    }

    /// Storage description of a texture
    pub fn texture_info(&self, texture: RawHandle) -> Option<ImageInfo> {
        self.images.get(&texture).copied()
    }

    /// Storage description of a renderbuffer
    pub fn render_buffer_info(&self, render_buffer: RawHandle) -> Option<ImageInfo> {
        self.render_buffers.get(&render_buffer).copied()
    }

    /// Image attached to a framebuffer attachment point
    pub fn attachment(&self, frame_buffer: RawHandle, attachment: Attachment) -> Option<AttachedImage> {
        self.frame_buffers.get(&frame_buffer)?.attachments.get(&attachment).copied()
    }

    /// Colour attachments selected as draw buffers
    pub fn draw_buffers(&self, frame_buffer: RawHandle) -> Option<&[u32]> {
        self.frame_buffers.get(&frame_buffer).map(|fb| fb.draw_buffers.as_slice())
    }

    /// Size shared by the attachments of a framebuffer
    pub fn framebuffer_size(&self, frame_buffer: RawHandle) -> Option<(u32, u32)> {
        let state = self.frame_buffers.get(&frame_buffer)?;
        let first = state.attachments.values().next()?;
        self.image_of(first).map(|info| (info.width, info.height))
    }

    /// Current pipeline state
    pub const fn pipeline_state(&self) -> &PipelineState {
        &self.state
    }

    /// Last value uploaded to a program uniform
    pub fn uniform(&self, program: RawHandle, name: &str) -> Option<UniformValue> {
        self.uniforms.get(&(program, name.to_owned())).copied()
    }

    /// Texture bound to a unit
    pub fn bound_texture(&self, unit: u32) -> Option<(TextureTarget, RawHandle)> {
        self.texture_units.get(&unit).copied()
    }

    /// Contents of the buffer bound to a storage binding
    pub fn storage_binding(&self, binding: u32) -> Option<&[u8]> {
        let buffer = self.storage_bindings.get(&binding)?;
        self.buffers.get(buffer).map(Vec::as_slice)
    }

    /// Counters accumulated since creation
    pub const fn stats(&self) -> DeviceStats {
        self.stats
    }

    /// Write one texel of an integer colour attachment
    ///
    /// Stands in for a fragment shader writing an entity id. Returns `false`
    /// when the attachment does not exist or the texel is out of bounds.
    pub fn write_pixel_u32(&mut self, frame_buffer: RawHandle, colour_attachment: u32, x: u32, y: u32, value: u32) -> bool {
        let Some((key, info)) = self.integer_plane(frame_buffer, colour_attachment) else {
            return false;
        };
        if x >= info.width || y >= info.height {
            return false;
        }
        self.planes.entry(key).or_default().written.insert((x, y), value);
        true
    }

    fn image_of(&self, attached: &AttachedImage) -> Option<&ImageInfo> {
        if attached.render_buffer {
            self.render_buffers.get(&attached.handle)
        } else {
            self.images.get(&attached.handle)
        }
    }

    fn integer_plane(&self, frame_buffer: RawHandle, colour_attachment: u32) -> Option<((RawHandle, u32), ImageInfo)> {
        let attached = self.attachment(frame_buffer, Attachment::Colour(colour_attachment))?;
        if attached.render_buffer {
            return None;
        }
        let info = *self.images.get(&attached.handle)?;
        if info.format != TextureFormat::R32Ui {
            return None;
        }
        Some(((attached.handle, attached.layer.unwrap_or(0)), info))
    }

    fn forget_image(&mut self, handle: RawHandle, render_buffer: bool) {
        for state in self.frame_buffers.values_mut() {
            state
                .attachments
                .retain(|_, attached| !(attached.handle == handle && attached.render_buffer == render_buffer));
        }
        if !render_buffer {
            self.planes.retain(|(texture, _), _| *texture != handle);
            self.texture_units.retain(|_, (_, texture)| *texture != handle);
        }
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn is_context_current(&self) -> bool {
        self.context_current
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<RawHandle, String> {
        if !self.context_current {
            return Err("no current context".to_owned());
        }
        if source.trim().is_empty() {
            return Err(format!("{stage:?} shader source is empty"));
        }
        if !source.contains("void main") {
            return Err(format!("{stage:?} shader has no entry point `void main`"));
        }
        let shader = self.next_shader;
        self.next_shader += 1;
        self.shaders.insert(shader, stage);
        Ok(shader)
    }

    fn delete_shader(&mut self, shader: RawHandle) {
        self.shaders.remove(&shader);
    }

    fn link_program(&mut self, shaders: &[RawHandle]) -> Result<RawHandle, String> {
        if !self.context_current {
            return Err("no current context".to_owned());
        }
        if shaders.is_empty() {
            return Err("program has no attached shaders".to_owned());
        }
        if let Some(unknown) = shaders.iter().find(|shader| !self.shaders.contains_key(shader)) {
            return Err(format!("shader {unknown} is not a compiled shader"));
        }
        let kind = ResourceKind::Program.index();
        let program = self.next_name[kind];
        self.next_name[kind] += 1;
        self.live[kind].insert(program);
        Ok(program)
    }

    fn gen_handles(&mut self, kind: ResourceKind, count: usize) -> Vec<RawHandle> {
        if !self.context_current {
            return Vec::new();
        }
        let slot = kind.index();
        let mut handles = Vec::with_capacity(count);
        for _ in 0..count {
            let handle = self.next_name[slot];
            self.next_name[slot] += 1;
            self.live[slot].insert(handle);
            match kind {
                ResourceKind::FrameBuffer => {
                    self.frame_buffers.insert(handle, FrameBufferState::default());
                }
                ResourceKind::Buffer => {
                    self.buffers.insert(handle, Vec::new());
                }
                _ => {}
            }
            handles.push(handle);
        }
        handles
    }

    fn delete_handles(&mut self, kind: ResourceKind, handles: &[RawHandle]) {
        for &handle in handles {
            if !self.live[kind.index()].remove(&handle) {
                continue;
            }
            match kind {
                ResourceKind::Program => {
                    self.uniforms.retain(|(program, _), _| *program != handle);
                    if self.state.program == handle {
                        self.state.program = INVALID_HANDLE;
                    }
                }
                ResourceKind::VertexArray => {
                    self.vertex_arrays.remove(&handle);
                }
                ResourceKind::Buffer => {
                    self.buffers.remove(&handle);
                    self.storage_bindings.retain(|_, buffer| *buffer != handle);
                }
                ResourceKind::FrameBuffer => {
                    self.frame_buffers.remove(&handle);
                    if self.state.frame_buffer == handle {
                        self.state.frame_buffer = INVALID_HANDLE;
                    }
                }
                ResourceKind::RenderBuffer => {
                    self.render_buffers.remove(&handle);
                    self.forget_image(handle, true);
                }
                ResourceKind::Texture => {
                    self.images.remove(&handle);
                    self.forget_image(handle, false);
                }
            }
        }
    }

    fn allocate_texture_2d(&mut self, texture: RawHandle, width: u32, height: u32, format: TextureFormat) {
        if self.is_live(ResourceKind::Texture, texture) {
            self.images.insert(
                texture,
                ImageInfo { width, height, layers: 1, format, target: TextureTarget::Texture2D },
            );
            self.planes.retain(|(handle, _), _| *handle != texture);
        }
    }

    fn allocate_texture_2d_array(
        &mut self,
        texture: RawHandle,
        width: u32,
        height: u32,
        layers: u32,
        format: TextureFormat,
    ) {
        if self.is_live(ResourceKind::Texture, texture) {
            self.images.insert(
                texture,
                ImageInfo { width, height, layers, format, target: TextureTarget::Texture2DArray },
            );
            self.planes.retain(|(handle, _), _| *handle != texture);
        }
    }

    fn allocate_render_buffer(&mut self, render_buffer: RawHandle, width: u32, height: u32, format: TextureFormat) {
        if self.is_live(ResourceKind::RenderBuffer, render_buffer) {
            self.render_buffers.insert(
                render_buffer,
                ImageInfo { width, height, layers: 1, format, target: TextureTarget::Texture2D },
            );
        }
    }

    fn attach_texture(&mut self, frame_buffer: RawHandle, attachment: Attachment, texture: RawHandle, layer: Option<u32>) {
        let Some(state) = self.frame_buffers.get_mut(&frame_buffer) else {
            return;
        };
        if texture == INVALID_HANDLE {
            state.attachments.remove(&attachment);
            return;
        }
        let valid_layer = match (self.images.get(&texture), layer) {
            (Some(info), Some(layer)) => layer < info.layers,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if valid_layer {
            state
                .attachments
                .insert(attachment, AttachedImage { handle: texture, layer, render_buffer: false });
        }
    }

    fn attach_render_buffer(&mut self, frame_buffer: RawHandle, attachment: Attachment, render_buffer: RawHandle) {
        if !self.render_buffers.contains_key(&render_buffer) {
            return;
        }
        if let Some(state) = self.frame_buffers.get_mut(&frame_buffer) {
            state
                .attachments
                .insert(attachment, AttachedImage { handle: render_buffer, layer: None, render_buffer: true });
        }
    }

    fn set_draw_buffers(&mut self, frame_buffer: RawHandle, colour_attachments: &[u32]) {
        if let Some(state) = self.frame_buffers.get_mut(&frame_buffer) {
            state.draw_buffers = colour_attachments.to_vec();
        }
    }

    fn framebuffer_complete(&self, frame_buffer: RawHandle) -> bool {
        let Some(state) = self.frame_buffers.get(&frame_buffer) else {
            return false;
        };
        let mut size = None;
        for attached in state.attachments.values() {
            let Some(info) = self.image_of(attached) else {
                return false;
            };
            match size {
                None => size = Some((info.width, info.height)),
                Some(expected) if expected != (info.width, info.height) => return false,
                Some(_) => {}
            }
        }
        size.is_some()
            && state
                .draw_buffers
                .iter()
                .all(|index| state.attachments.contains_key(&Attachment::Colour(*index)))
    }

    fn bind_framebuffer(&mut self, frame_buffer: RawHandle) {
        if frame_buffer == INVALID_HANDLE || self.frame_buffers.contains_key(&frame_buffer) {
            self.state.frame_buffer = frame_buffer;
        }
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.state.viewport = (x, y, width, height);
    }

    fn set_clear_colour(&mut self, colour: [f32; 4]) {
        self.state.clear_colour = colour;
    }

    fn clear(&mut self, flags: ClearFlags) {
        self.stats.clears += 1;
        if flags.contains(ClearFlags::DEPTH) {
            self.stats.depth_clears += 1;
        }
        if !flags.contains(ClearFlags::COLOUR) {
            return;
        }
        let targets: Vec<(RawHandle, u32)> = self
            .frame_buffers
            .get(&self.state.frame_buffer)
            .map(|state| {
                state
                    .attachments
                    .iter()
                    .filter(|(attachment, attached)| matches!(attachment, Attachment::Colour(_)) && !attached.render_buffer)
                    .map(|(_, attached)| (attached.handle, attached.layer.unwrap_or(0)))
                    .collect()
            })
            .unwrap_or_default();
        for key in targets {
            self.planes.insert(key, TexelPlane::default());
        }
    }

    fn clear_colour_attachment_u32(&mut self, colour_attachment: u32, value: u32) {
        self.stats.clears += 1;
        if let Some((key, _)) = self.integer_plane(self.state.frame_buffer, colour_attachment) {
            self.planes.insert(key, TexelPlane { fill: value, written: HashMap::new() });
        }
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.state.depth_test = enabled;
    }

    fn set_culling(&mut self, culling: Option<FaceCulling>, front_face: FrontFace) {
        self.state.culling = culling;
        self.state.front_face = front_face;
    }

    fn use_program(&mut self, program: RawHandle) {
        if program == INVALID_HANDLE || self.is_live(ResourceKind::Program, program) {
            self.state.program = program;
        }
    }

    fn set_uniform(&mut self, program: RawHandle, name: &str, value: UniformValue) {
        if self.is_live(ResourceKind::Program, program) {
            self.uniforms.insert((program, name.to_owned()), value);
        }
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: RawHandle) {
        if texture == INVALID_HANDLE {
            self.texture_units.remove(&unit);
        } else if self.images.get(&texture).is_some_and(|info| info.target == target) {
            self.texture_units.insert(unit, (target, texture));
        }
    }

    fn upload_buffer(&mut self, buffer: RawHandle, bytes: &[u8]) {
        if let Some(contents) = self.buffers.get_mut(&buffer) {
            contents.clear();
            contents.extend_from_slice(bytes);
        }
    }

    fn bind_storage_buffer(&mut self, binding: u32, buffer: RawHandle) {
        if self.buffers.contains_key(&buffer) {
            self.storage_bindings.insert(binding, buffer);
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
        if !self.is_live(ResourceKind::VertexArray, vertex_array) {
            return;
        }
        log::trace!(
            "Vertex array {vertex_array}: stride {stride}, {} attributes",
            attributes.len()
        );
        self.vertex_arrays
            .insert(vertex_array, VertexArrayState { vertex_buffer, index_buffer, stride });
    }

    fn draw_indexed(&mut self, vertex_array: RawHandle, primitive: Primitive, index_count: u32) {
        let Some(state) = self.vertex_arrays.get(&vertex_array) else {
            return;
        };
        let Some(indices) = self.buffers.get(&state.index_buffer) else {
            return;
        };
        let available = u32::try_from(indices.len() / std::mem::size_of::<u32>()).unwrap_or(u32::MAX);
        if index_count > available || !self.buffers.contains_key(&state.vertex_buffer) || state.stride == 0 {
            return;
        }
        log::trace!("Draw {index_count} indices as {primitive:?} from vertex array {vertex_array}");
        self.stats.draw_calls += 1;
    }

    fn read_pixel_u32(&mut self, frame_buffer: RawHandle, colour_attachment: u32, x: u32, y: u32) -> Option<u32> {
        self.stats.readbacks += 1;
        let (key, info) = self.integer_plane(frame_buffer, colour_attachment)?;
        if x >= info.width || y >= info.height {
            return None;
        }
        Some(
            self.planes
                .get(&key)
                .map_or(0, |plane| plane.written.get(&(x, y)).copied().unwrap_or(plane.fill)),
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
