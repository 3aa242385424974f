//! # Camera
//!
//! Free-fly camera that owns the geometry-pass render targets and composites
//! them to the screen.
//!
//! A frame through the camera is:
//! 1. [`Camera::control`] polls the input provider and moves the eye
//! 2. [`Camera::begin_render`] binds the attachment set and clears it
//! 3. the caller draws scene geometry with its own materials
//! 4. [`Camera::render`] runs the lighting material over a full-screen quad,
//!    optionally through the post-process target
//! 5. [`Camera::selected_entity_id`] reads the picker attachment under the cursor
//!
//! Nothing is created on the device until [`Camera::init`] succeeds; the
//! per-frame calls fail with [`RenderError::CameraNotInitialized`] before that.

mod attachments;
mod config;
pub mod controls;

pub use attachments::{AttachmentSet, PostProcessTarget, TextureDataType, INVALID_ENTITY, POST_PROCESS_TEXTURE_UNIT};
pub use config::{CamConfig, LightRenderType, RenderType};
pub use controls::CameraKeys;

use super::backend::{ClearFlags, RawHandle};
use super::context::RenderContext;
use super::mesh::{CustomMesh, DrawConfig, MeshId, MeshProvider};
use super::shader::{sources, Shader};
use super::RenderError;
use crate::foundation::math::{Mat4, Mat4Ext, Vec2, Vec3};
use crate::input::{InputProvider, KeyCode, MouseButton};

/// Fraction the orthographic extents shrink by per wheel step
const ORTHO_ZOOM_STEP: f32 = 0.1;

/// Smallest factor one zoom may scale the orthographic extents by
const MIN_ORTHO_ZOOM: f32 = 0.1;

/// Device objects created by `init`
#[derive(Debug, Clone)]
struct CameraTargets {
    attachments: AttachmentSet,
    post_process: PostProcessTarget,
    light_material: Shader,
    quad: MeshId,
}

/// Free-fly camera with deferred or forward compositing
#[derive(Debug, Clone)]
pub struct Camera {
    render_type: RenderType,
    light_render_type: LightRenderType,
    position: Vec3,
    view_dir: Vec3,
    side_dir: Vec3,
    up_dir: Vec3,
    prev_mouse: Vec2,
    speed: f32,
    sensitivity: f32,
    near: f32,
    far: f32,
    left: f32,
    right: f32,
    top: f32,
    bottom: f32,
    fov: f32,
    aspect: f32,
    win_pos: Vec2,
    win_size: Vec2,
    clear_colour: [f32; 4],
    targets: Option<CameraTargets>,
    post_process_material: Option<Shader>,

    /// Movement bindings read by [`Camera::control`]
    pub keys: CameraKeys,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    /// Camera with default parameters; call [`Camera::init`] before rendering
    pub fn new() -> Self {
        let mut camera = Self {
            render_type: RenderType::Invalid,
            light_render_type: LightRenderType::Invalid,
            position: Vec3::zeros(),
            view_dir: -Vec3::z(),
            side_dir: Vec3::x(),
            up_dir: Vec3::y(),
            prev_mouse: Vec2::zeros(),
            speed: 0.0,
            sensitivity: 0.0,
            near: 0.0,
            far: 0.0,
            left: 0.0,
            right: 0.0,
            top: 0.0,
            bottom: 0.0,
            fov: 0.0,
            aspect: 1.0,
            win_pos: Vec2::zeros(),
            win_size: Vec2::zeros(),
            clear_colour: [0.0, 0.0, 0.0, 1.0],
            targets: None,
            post_process_material: None,
            keys: CameraKeys::default(),
        };
        camera.apply_config(&CamConfig::default());
        camera.render_type = RenderType::Invalid;
        camera.light_render_type = LightRenderType::Invalid;
        camera
    }

    /// Configure the camera and create its render targets
    ///
    /// Fails without touching the device when no context is current or the
    /// configuration is unusable.
    pub fn init(
        &mut self,
        ctx: &mut RenderContext,
        config: &CamConfig,
        meshes: &mut dyn MeshProvider,
    ) -> Result<(), RenderError> {
        if !ctx.is_ready() {
            return Err(RenderError::ContextNotReady);
        }
        config.validate().map_err(RenderError::InvalidConfiguration)?;
        if self.targets.is_some() {
            log::warn!("Camera initialised twice; previous targets stay owned by the resource manager");
        }

        let fragment = match config.light_render_type {
            LightRenderType::Forward => sources::PASSTHROUGH_FRAGMENT,
            _ => sources::LIGHTING_FRAGMENT,
        };
        let light_material = Shader::new(ctx, Some(fragment), Some(sources::SCREEN_VERTEX))?;
        let attachments = AttachmentSet::create(ctx, config.win_size.x, config.win_size.y)?;
        let post_process = PostProcessTarget::create(ctx, config.win_size.x, config.win_size.y)?;

        let quad = meshes
            .upload_mesh(CustomMesh::screen_quad())
            .ok_or_else(|| RenderError::ResourceCreationFailed("screen quad".to_owned()))?;
        meshes
            .get_mesh_mut(quad)
            .ok_or_else(|| RenderError::ResourceCreationFailed("screen quad".to_owned()))?
            .ensure_uploaded(ctx)?;

        self.apply_config(config);
        self.targets = Some(CameraTargets {
            attachments,
            post_process,
            light_material,
            quad,
        });
        log::info!(
            "Camera initialised: {:?}/{:?} at {}x{}",
            self.render_type,
            self.light_render_type,
            self.win_size.x,
            self.win_size.y
        );
        Ok(())
    }

    fn apply_config(&mut self, config: &CamConfig) {
        self.render_type = config.render_type;
        self.light_render_type = config.light_render_type;
        self.win_pos = config.win_pos;
        self.win_size = config.win_size;
        self.aspect = aspect_of(config.win_size);
        self.position = config.position;
        self.near = config.near;
        self.far = config.far;
        self.left = config.left;
        self.right = config.right;
        self.top = config.top;
        self.bottom = config.bottom;
        self.fov = config.fovy;
        self.speed = config.speed;
        self.sensitivity = config.sensitivity;
        self.set_target(config.target);
    }

    /// Apply one frame of keyboard, mouse and wheel input
    pub fn control(&mut self, dt: f32, input: &dyn InputProvider) -> Result<(), RenderError> {
        if self.targets.is_none() {
            return Err(RenderError::CameraNotInitialized);
        }
        self.move_camera(dt, input);

        let step = self.sensitivity * dt;
        let mut yaw = axis(input, KeyCode::Right, KeyCode::Left) * step;
        let mut pitch = axis(input, KeyCode::Up, KeyCode::Down) * step;

        let mouse = input.mouse_position();
        if input.mouse_pressed(MouseButton::Right) {
            let delta = mouse - self.prev_mouse;
            yaw += delta.x * step;
            pitch -= delta.y * step;
        }
        self.prev_mouse = mouse;

        if yaw != 0.0 || pitch != 0.0 {
            self.view_dir = controls::rotate(&self.view_dir, yaw, pitch);
            self.update_basis();
        }

        let wheel = input.wheel_scroll().y;
        if wheel != 0.0 {
            self.zoom(wheel, dt);
        }
        Ok(())
    }

    fn move_camera(&mut self, dt: f32, input: &dyn InputProvider) {
        let forward = axis(input, self.keys.front, self.keys.back);
        let strafe = axis(input, self.keys.right, self.keys.left);
        let lift = axis(input, self.keys.up, self.keys.down);
        let offset = self.view_dir * forward + self.side_dir * strafe + Vec3::y() * lift;
        if offset != Vec3::zeros() {
            self.position += offset * (self.speed * dt);
            log::trace!("Camera moved to {:?}", self.position);
        }
    }

    fn zoom(&mut self, wheel: f32, dt: f32) {
        match self.render_type {
            RenderType::Orthographic => {
                let factor = (1.0 - ORTHO_ZOOM_STEP * wheel).max(MIN_ORTHO_ZOOM);
                self.left *= factor;
                self.right *= factor;
                self.top *= factor;
                self.bottom *= factor;
            }
            _ => self.position += self.view_dir * (wheel * self.speed * dt),
        }
    }

    fn update_basis(&mut self) {
        let (side, up) = controls::basis(&self.view_dir);
        self.side_dir = side;
        self.up_dir = up;
    }

    /// Perspective projection from the current field of view and aspect
    pub fn perspective_matrix(&self) -> Mat4 {
        Mat4::perspective(self.fov, self.aspect, self.near, self.far)
    }

    /// Orthographic projection from the current extents
    pub fn orto_matrix(&self) -> Mat4 {
        Mat4::orthographic(self.left, self.right, self.bottom, self.top, self.near, self.far)
    }

    /// World-to-view transform
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.position, self.position + self.view_dir, self.up_dir)
    }

    /// Projection matching the render type
    pub fn projection_matrix(&self) -> Mat4 {
        match self.render_type {
            RenderType::Orthographic => self.orto_matrix(),
            _ => self.perspective_matrix(),
        }
    }

    /// Bind and clear the attachment set for the geometry pass
    ///
    /// The picker attachment is cleared to [`INVALID_ENTITY`].
    pub fn begin_render(&self, ctx: &mut RenderContext) -> Result<(), RenderError> {
        let targets = self.targets.as_ref().ok_or(RenderError::CameraNotInitialized)?;
        let (width, height) = targets.attachments.size;
        let device = ctx.backend.as_mut();

        device.bind_framebuffer(targets.attachments.frame_buffer);
        device.viewport(0, 0, width, height);
        device.set_depth_test(true);
        device.set_clear_colour(self.clear_colour);
        device.clear(ClearFlags::COLOUR | ClearFlags::DEPTH);
        device.clear_colour_attachment_u32(TextureDataType::Picker.index(), INVALID_ENTITY);
        Ok(())
    }

    /// Composite the attachments to the default framebuffer
    ///
    /// With a post-process material the composite goes to the post-process
    /// target first and that material draws it to the screen.
    pub fn render(&self, ctx: &mut RenderContext, meshes: &dyn MeshProvider) -> Result<(), RenderError> {
        let targets = self.targets.as_ref().ok_or(RenderError::CameraNotInitialized)?;
        let quad = meshes
            .get_mesh(targets.quad)
            .ok_or_else(|| RenderError::ResourceCreationFailed("screen quad is missing from the mesh provider".to_owned()))?;
        let screen = DrawConfig::screen_pass();

        let composite_target = if self.post_process_material.is_some() {
            Some(targets.post_process.frame_buffer)
        } else {
            None
        };
        self.bind_output(ctx, composite_target, targets.attachments.size);
        self.bind_light_material(ctx, targets);
        quad.render(ctx, &screen);

        if let Some(material) = &self.post_process_material {
            self.bind_output(ctx, None, targets.post_process.size);
            let device = ctx.backend.as_mut();
            material.use_program(device);
            material.set_texture_2d(device, "u_screen", targets.post_process.active_texture, targets.post_process.texture);
            quad.render(ctx, &screen);
        }
        ctx.backend.set_depth_test(true);
        Ok(())
    }

    fn bind_output(&self, ctx: &mut RenderContext, frame_buffer: Option<RawHandle>, size: (u32, u32)) {
        let device = ctx.backend.as_mut();
        match frame_buffer {
            Some(frame_buffer) => {
                device.bind_framebuffer(frame_buffer);
                device.viewport(0, 0, size.0, size.1);
            }
            None => {
                device.bind_framebuffer(0);
                device.viewport(self.win_pos.x as i32, self.win_pos.y as i32, size.0, size.1);
            }
        }
        device.set_depth_test(false);
        device.set_clear_colour(self.clear_colour);
        device.clear(ClearFlags::COLOUR);
    }

    fn bind_light_material(&self, ctx: &mut RenderContext, targets: &CameraTargets) {
        let device = ctx.backend.as_mut();
        let material = &targets.light_material;
        material.use_program(device);
        match self.light_render_type {
            LightRenderType::Forward => {
                let colour = targets.attachments.textures[TextureDataType::Colour.index() as usize];
                material.set_texture_2d(device, "u_screen", TextureDataType::Colour.index(), colour);
            }
            _ => {
                for kind in [TextureDataType::Colour, TextureDataType::Location, TextureDataType::Normals] {
                    let index = kind.index() as usize;
                    material.set_texture_2d(
                        device,
                        kind.sampler_name(),
                        targets.attachments.active_textures[index],
                        targets.attachments.textures[index],
                    );
                }
                material.set_vec3(device, "u_camera_position", self.position);
            }
        }
    }

    /// Entity id under the cursor position seen by the last [`Camera::control`]
    ///
    /// Blocks on a device readback. Returns [`INVALID_ENTITY`] outside the
    /// camera window or where nothing was drawn.
    pub fn selected_entity_id(&self, ctx: &mut RenderContext) -> Result<u32, RenderError> {
        let targets = self.targets.as_ref().ok_or(RenderError::CameraNotInitialized)?;
        let local = self.prev_mouse - self.win_pos;
        let (width, height) = targets.attachments.size;
        if local.x < 0.0 || local.y < 0.0 || local.x >= width as f32 || local.y >= height as f32 {
            return Ok(INVALID_ENTITY);
        }
        // Window rows grow downwards, texture rows upwards
        let x = local.x as u32;
        let y = height - 1 - local.y as u32;
        Ok(ctx
            .backend
            .read_pixel_u32(targets.attachments.frame_buffer, TextureDataType::Picker.index(), x, y)
            .unwrap_or(INVALID_ENTITY))
    }

    /// Resize the viewport, reallocating the render targets when initialised
    pub fn set_win_size(&mut self, ctx: &mut RenderContext, size: Vec2) -> Result<(), RenderError> {
        if size.x < 1.0 || size.y < 1.0 {
            return Err(RenderError::InvalidConfiguration(format!(
                "window size must be at least 1x1, got {}x{}",
                size.x, size.y
            )));
        }
        if let Some(targets) = &mut self.targets {
            let textures = AttachmentSet::stage(ctx, size.x, size.y)?;
            let texture = match PostProcessTarget::stage(ctx, size.x, size.y) {
                Ok(texture) => texture,
                Err(err) => {
                    ctx.resources.release_textures(ctx.backend.as_mut(), &textures);
                    return Err(err);
                }
            };
            if let Err(err) = targets.attachments.commit(ctx, textures, size.x, size.y) {
                ctx.resources.release_textures(ctx.backend.as_mut(), &[texture]);
                return Err(err);
            }
            targets.post_process.commit(ctx, texture, size.x, size.y)?;
        }
        self.win_size = size;
        let aspect = aspect_of(size);
        if (self.aspect - aspect).abs() > 0.01 {
            log::info!("Camera aspect ratio changed: {:.3} -> {:.3}", self.aspect, aspect);
        }
        self.aspect = aspect;
        Ok(())
    }

    /// Move the viewport origin inside the window
    pub fn set_win_pos(&mut self, win_pos: Vec2) {
        self.win_pos = win_pos;
    }

    /// Projection type
    pub const fn render_type(&self) -> RenderType {
        self.render_type
    }

    /// Lighting path
    pub const fn light_render_type(&self) -> LightRenderType {
        self.light_render_type
    }

    /// Viewport origin in window pixels
    pub const fn win_pos(&self) -> Vec2 {
        self.win_pos
    }

    /// Viewport size in pixels
    pub const fn win_size(&self) -> Vec2 {
        self.win_size
    }

    /// Width over height of the viewport
    pub const fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Eye position
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Move the eye without changing the view direction
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        log::trace!("Camera position updated to: {:?}", position);
    }

    /// Unit view direction
    pub const fn view_dir(&self) -> Vec3 {
        self.view_dir
    }

    /// Point the camera at a world position
    ///
    /// A target equal to the eye position keeps the current direction.
    pub fn set_target(&mut self, target: Vec3) {
        if let Some(dir) = (target - self.position).try_normalize(1.0e-6) {
            self.view_dir = dir;
            self.update_basis();
        }
        log::trace!("Camera target updated to: {:?}", target);
    }

    /// Colour the attachment set and screen are cleared to
    pub fn set_clear_colour(&mut self, colour: [f32; 4]) {
        self.clear_colour = colour;
    }

    /// Whether `init` has succeeded
    pub const fn is_initialized(&self) -> bool {
        self.targets.is_some()
    }

    /// Lighting material used by the composite, once initialised
    pub fn material(&self) -> Option<&Shader> {
        self.targets.as_ref().map(|targets| &targets.light_material)
    }

    /// Material of the post-process pass; `None` composites straight to the screen
    pub fn set_post_process_material(&mut self, material: Option<Shader>) {
        self.post_process_material = material;
    }

    /// Material of the post-process pass
    pub const fn post_process_material(&self) -> Option<&Shader> {
        self.post_process_material.as_ref()
    }

    /// Geometry-pass targets, once initialised
    pub fn attachments(&self) -> Option<&AttachmentSet> {
        self.targets.as_ref().map(|targets| &targets.attachments)
    }

    /// Post-process target, once initialised
    pub fn post_process_target(&self) -> Option<&PostProcessTarget> {
        self.targets.as_ref().map(|targets| &targets.post_process)
    }
}

fn axis(input: &dyn InputProvider, positive: KeyCode, negative: KeyCode) -> f32 {
    f32::from(u8::from(input.key_pressed(positive))) - f32::from(u8::from(input.key_pressed(negative)))
}

fn aspect_of(size: Vec2) -> f32 {
    if size.y > 0.0 {
        size.x / size.y
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputManager;
    use crate::render::backend::{HeadlessBackend, ResourceKind};
    use crate::render::mesh::MeshLibrary;
    use approx::assert_relative_eq;

    fn context() -> RenderContext {
        RenderContext::new(Box::new(HeadlessBackend::new()))
    }

    fn initialised(config: &CamConfig) -> (RenderContext, MeshLibrary, Camera) {
        let mut ctx = context();
        let mut meshes = MeshLibrary::new();
        let mut camera = Camera::new();
        camera.init(&mut ctx, config, &mut meshes).expect("camera init");
        (ctx, meshes, camera)
    }

    #[test]
    fn test_init_without_context_creates_nothing() {
        let mut ctx = RenderContext::new(Box::new(HeadlessBackend::without_context()));
        let mut meshes = MeshLibrary::new();
        let mut camera = Camera::new();

        let result = camera.init(&mut ctx, &CamConfig::with_window(800.0, 600.0), &mut meshes);

        assert!(matches!(result, Err(RenderError::ContextNotReady)));
        assert!(ctx.resources.is_empty());
        assert!(meshes.is_empty());
        assert!(!camera.is_initialized());
    }

    #[test]
    fn test_init_rejects_zero_window() {
        let mut ctx = context();
        let mut meshes = MeshLibrary::new();
        let mut camera = Camera::new();

        let result = camera.init(&mut ctx, &CamConfig::default(), &mut meshes);

        assert!(matches!(result, Err(RenderError::InvalidConfiguration(_))));
        assert!(ctx.resources.is_empty());
    }

    #[test]
    fn test_init_allocates_targets() {
        let (ctx, meshes, camera) = initialised(&CamConfig::with_window(320.0, 240.0));

        assert!(camera.is_initialized());
        assert_eq!(meshes.len(), 1);
        assert_eq!(ctx.resources.len(ResourceKind::FrameBuffer), 2);
        assert_eq!(ctx.resources.len(ResourceKind::Texture), 5);
        assert_eq!(camera.attachments().map(|a| a.size), Some((320, 240)));
        assert_eq!(camera.post_process_target().map(|p| p.size), Some((320, 240)));
    }

    #[test]
    fn test_perspective_focal_length() {
        let (_, _, camera) = initialised(&CamConfig::with_window(800.0, 600.0));
        let projection = camera.perspective_matrix();
        let focal = 1.0 / (std::f32::consts::PI / 6.0).tan();

        assert_relative_eq!(projection[(1, 1)], focal, epsilon = 1e-5);
        assert_relative_eq!(projection[(0, 0)], focal / (800.0 / 600.0), epsilon = 1e-5);
    }

    #[test]
    fn test_uninitialised_camera_errors() {
        let mut ctx = context();
        let meshes = MeshLibrary::new();
        let mut camera = Camera::new();
        let input = InputManager::new();

        assert!(matches!(camera.control(0.016, &input), Err(RenderError::CameraNotInitialized)));
        assert!(matches!(camera.begin_render(&mut ctx), Err(RenderError::CameraNotInitialized)));
        assert!(matches!(camera.render(&mut ctx, &meshes), Err(RenderError::CameraNotInitialized)));
        assert!(matches!(camera.selected_entity_id(&mut ctx), Err(RenderError::CameraNotInitialized)));
    }

    #[test]
    fn test_control_moves_forward() {
        let (_, _, mut camera) = initialised(&CamConfig::with_window(100.0, 100.0));
        let mut input = InputManager::new();
        input.handle_key_input(KeyCode::W, true);

        camera.control(0.5, &input).expect("control");

        // Default eye at (0, 0, 5) looking at the origin, speed 10
        assert_relative_eq!(camera.position(), Vec3::zeros(), epsilon = 1e-5);
    }

    #[test]
    fn test_keyboard_and_mouse_rotation_add_up() {
        let (_, _, mut keyboard_only) = initialised(&CamConfig::with_window(100.0, 100.0));
        let mut both = keyboard_only.clone();

        let mut keys = InputManager::new();
        keys.handle_key_input(KeyCode::Right, true);
        keyboard_only.control(0.1, &keys).expect("control");

        let mut mouse = InputManager::new();
        mouse.handle_key_input(KeyCode::Right, true);
        mouse.handle_mouse_button(MouseButton::Right, true);
        mouse.handle_mouse_move(1.0, 0.0);
        both.control(0.1, &mouse).expect("control");

        let (keyboard_yaw, _) = controls::yaw_pitch(&keyboard_only.view_dir());
        let (combined_yaw, _) = controls::yaw_pitch(&both.view_dir());
        assert_relative_eq!(keyboard_yaw, 0.1, epsilon = 1e-5);
        assert_relative_eq!(combined_yaw, 0.2, epsilon = 1e-5);
    }

    #[test]
    fn test_wheel_zooms_orthographic_extents() {
        let config = CamConfig {
            render_type: RenderType::Orthographic,
            ..CamConfig::with_window(100.0, 100.0)
        };
        let (_, _, mut camera) = initialised(&config);
        let mut input = InputManager::new();
        input.handle_scroll(0.0, 1.0);

        camera.control(0.016, &input).expect("control");

        let projection = camera.projection_matrix();
        assert_relative_eq!(projection[(0, 0)], 2.0 / 18.0, epsilon = 1e-5);
        assert_relative_eq!(camera.position(), Vec3::new(0.0, 0.0, 5.0), epsilon = 1e-6);
    }

    #[test]
    fn test_resize_updates_aspect_and_targets() {
        let (mut ctx, _, mut camera) = initialised(&CamConfig::with_window(800.0, 600.0));
        let old = camera.attachments().map(|a| a.textures).expect("attachments");

        camera.set_win_size(&mut ctx, Vec2::new(1024.0, 512.0)).expect("resize");

        assert_relative_eq!(camera.aspect(), 2.0);
        let projection = camera.perspective_matrix();
        assert_relative_eq!(projection[(0, 0)], projection[(1, 1)] / 2.0, epsilon = 1e-5);
        let device = ctx.backend_as::<HeadlessBackend>().expect("headless device");
        assert!(old.iter().all(|t| !device.is_live(ResourceKind::Texture, *t)));
        let frame_buffer = camera.attachments().map(|a| a.frame_buffer).expect("attachments");
        assert_eq!(device.framebuffer_size(frame_buffer), Some((1024, 512)));
    }

    #[test]
    fn test_failed_resize_keeps_targets_and_aspect() {
        let (mut ctx, _, mut camera) = initialised(&CamConfig::with_window(800.0, 600.0));
        let attachments = camera.attachments().cloned().expect("attachments");
        let post_process = camera.post_process_target().cloned().expect("post-process target");
        let aspect = camera.aspect();
        ctx.backend_as_mut::<HeadlessBackend>().expect("headless device").set_context_current(false);

        assert!(camera.set_win_size(&mut ctx, Vec2::new(1024.0, 512.0)).is_err());

        assert_eq!(camera.attachments(), Some(&attachments));
        assert_eq!(camera.post_process_target(), Some(&post_process));
        assert_eq!(camera.win_size(), Vec2::new(800.0, 600.0));
        assert_relative_eq!(camera.aspect(), aspect);
        let device = ctx.backend_as::<HeadlessBackend>().expect("headless device");
        assert!(attachments.textures.iter().all(|t| device.is_live(ResourceKind::Texture, *t)));
        assert!(device.is_live(ResourceKind::Texture, post_process.texture));
        assert_eq!(ctx.resources.len(ResourceKind::Texture), 5);
    }

    #[test]
    fn test_begin_render_clears_picker() {
        let (mut ctx, _, mut camera) = initialised(&CamConfig::with_window(64.0, 64.0));
        let mut input = InputManager::new();
        input.handle_mouse_move(10.0, 20.0);
        camera.control(0.016, &input).expect("control");

        camera.begin_render(&mut ctx).expect("begin render");

        assert_eq!(camera.selected_entity_id(&mut ctx).expect("pick"), INVALID_ENTITY);
    }

    #[test]
    fn test_picking_flips_rows() {
        let (mut ctx, _, mut camera) = initialised(&CamConfig::with_window(64.0, 64.0));
        let frame_buffer = camera.attachments().map(|a| a.frame_buffer).expect("attachments");
        let mut input = InputManager::new();
        input.handle_mouse_move(10.0, 20.0);
        camera.control(0.016, &input).expect("control");
        camera.begin_render(&mut ctx).expect("begin render");

        let device = ctx.backend_as_mut::<HeadlessBackend>().expect("headless device");
        assert!(device.write_pixel_u32(frame_buffer, TextureDataType::Picker.index(), 10, 43, 7));

        assert_eq!(camera.selected_entity_id(&mut ctx).expect("pick"), 7);
    }

    #[test]
    fn test_picking_outside_window() {
        let config = CamConfig {
            win_pos: Vec2::new(100.0, 100.0),
            ..CamConfig::with_window(64.0, 64.0)
        };
        let (mut ctx, _, mut camera) = initialised(&config);
        let mut input = InputManager::new();
        input.handle_mouse_move(50.0, 120.0);
        camera.control(0.016, &input).expect("control");

        assert_eq!(camera.selected_entity_id(&mut ctx).expect("pick"), INVALID_ENTITY);
    }

    #[test]
    fn test_render_through_post_process() {
        let (mut ctx, meshes, mut camera) = initialised(&CamConfig::with_window(64.0, 64.0));
        let post = Shader::new(&mut ctx, Some(sources::PASSTHROUGH_FRAGMENT), Some(sources::SCREEN_VERTEX))
            .expect("post-process material");
        camera.set_post_process_material(Some(post));

        camera.begin_render(&mut ctx).expect("begin render");
        camera.render(&mut ctx, &meshes).expect("render");

        let device = ctx.backend_as::<HeadlessBackend>().expect("headless device");
        assert_eq!(device.stats().draw_calls, 2);
        assert_eq!(device.pipeline_state().frame_buffer, 0);
        assert_eq!(device.pipeline_state().program, post.program());
    }

    #[test]
    fn test_render_binds_attachments() {
        let (mut ctx, meshes, camera) = initialised(&CamConfig::with_window(64.0, 64.0));

        camera.render(&mut ctx, &meshes).expect("render");

        let device = ctx.backend_as::<HeadlessBackend>().expect("headless device");
        let attachments = camera.attachments().expect("attachments");
        assert_eq!(device.stats().draw_calls, 1);
        assert_eq!(device.bound_texture(1).map(|(_, texture)| texture), Some(attachments.textures[1]));
    }
}
