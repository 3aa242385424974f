//! # Render Core
//!
//! Owns the render context, the camera, the shadow manager and the light
//! registries, and drives one frame through them in a fixed order:
//!
//! 1. camera input
//! 2. light storage buffers
//! 3. one shadow pass per active light face
//! 4. geometry pass into the camera attachments
//! 5. shadow maps bound on the lighting material, composite
//! 6. picker readback
//!
//! Scene geometry stays with the caller; it is drawn through a callback that
//! is told which [`FramePass`] is being rendered.

use crate::core::config::{DirectionalShadowSettings, RenderCoreConfig};
use crate::foundation::math::{Mat4, Vec2, Vec3};
use crate::input::InputProvider;

use super::backend::{GraphicsBackend, RawHandle};
use super::camera::{Camera, LightRenderType, INVALID_ENTITY, POST_PROCESS_TEXTURE_UNIT};
use super::context::RenderContext;
use super::lighting::{
    DirectionalLight, DirectionalLightGpu, LightDirection, LightRegistry, LightType, PointLight, PointLightGpu,
    ShadowCaster, SpotLight, SpotLightGpu, DIRECTIONAL_LIGHT_BIND, MAX_LIGHTS_PER_KIND, POINT_LIGHT_BIND,
    SPOT_LIGHT_BIND,
};
use super::mesh::MeshProvider;
use super::shader::Shader;
use super::shadows::ShadowsManager;
use super::RenderError;

/// First texture unit used for the shadow map arrays, after the camera's own
const SHADOW_TEXTURE_UNIT: u32 = POST_PROCESS_TEXTURE_UNIT + 1;

/// One face of one light being rendered into its shadow map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowPass {
    /// Light kind
    pub kind: LightType,
    /// Light id within its kind
    pub light_id: usize,
    /// Face being rendered; always `Front` for spot and directional lights
    pub face: LightDirection,
    /// `projection * view` of the face
    pub light_space: Mat4,
    /// Depth program; set `u_model` on it per caster
    pub program: Shader,
}

/// Camera geometry pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryPass {
    /// Camera view matrix
    pub view: Mat4,
    /// Camera projection matrix
    pub projection: Mat4,
    /// Eye position
    pub camera_position: Vec3,
}

/// Pass the draw callback is asked to render
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FramePass {
    /// Shadow casters into a depth layer
    Shadow(ShadowPass),
    /// Scene geometry into the camera attachments
    Geometry(GeometryPass),
}

/// Outcome of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Entity under the cursor, [`INVALID_ENTITY`] when none
    pub selected_entity: u32,
    /// Shadow faces rendered
    pub shadow_passes: usize,
}

impl Default for FrameReport {
    fn default() -> Self {
        Self {
            selected_entity: INVALID_ENTITY,
            shadow_passes: 0,
        }
    }
}

/// Frame driver owning every rendering subsystem
pub struct RenderCore {
    ctx: RenderContext,
    camera: Camera,
    shadows: ShadowsManager,
    point_lights: LightRegistry<PointLight>,
    spot_lights: LightRegistry<SpotLight>,
    directional_lights: LightRegistry<DirectionalLight>,
    light_buffers: [RawHandle; 3],
    directional_shadow: DirectionalShadowSettings,
}

impl RenderCore {
    /// Set up shadows, camera and light buffers on a device
    pub fn new(
        backend: Box<dyn GraphicsBackend>,
        config: &RenderCoreConfig,
        meshes: &mut dyn MeshProvider,
    ) -> Result<Self, RenderError> {
        let mut ctx = RenderContext::new(backend);
        if !ctx.is_ready() {
            return Err(RenderError::ContextNotReady);
        }

        let shadows = ShadowsManager::new(
            &mut ctx,
            config.shadows.point,
            config.shadows.spot,
            config.shadows.directional,
        )?;

        let mut camera = Camera::new();
        camera.keys = config.camera.keys;
        camera.set_clear_colour(config.clear_colour);
        camera.init(&mut ctx, &config.camera.to_cam_config(), meshes)?;

        let light_buffers: [RawHandle; 3] = ctx
            .create_buffers(3)
            .try_into()
            .map_err(|_| RenderError::ResourceCreationFailed("light storage buffers".to_owned()))?;

        log::info!("Render core ready");
        Ok(Self {
            ctx,
            camera,
            shadows,
            point_lights: LightRegistry::new(),
            spot_lights: LightRegistry::new(),
            directional_lights: LightRegistry::new(),
            light_buffers,
            directional_shadow: config.directional_shadow,
        })
    }

    /// Register a point light; `false` when `id` is beyond capacity
    pub fn add_point_light(&mut self, id: usize, light: PointLight) -> bool {
        self.point_lights.insert(id, light)
    }

    /// Register a spot light; `false` when `id` is beyond capacity
    pub fn add_spot_light(&mut self, id: usize, light: SpotLight) -> bool {
        self.spot_lights.insert(id, light)
    }

    /// Register a directional light with the configured shadow volume
    pub fn add_directional_light(&mut self, id: usize, mut light: DirectionalLight) -> bool {
        light.set_shadow_extent(self.directional_shadow.half_extent, self.directional_shadow.far);
        self.directional_lights.insert(id, light)
    }

    /// Deactivate a light and clear its shadow slot
    pub fn remove_light(&mut self, id: usize, kind: LightType) {
        let removed = match kind {
            LightType::PointLight => self.point_lights.deactivate(id),
            LightType::SpotLight => self.spot_lights.deactivate(id),
            LightType::DirectionalLight => self.directional_lights.deactivate(id),
        };
        if removed && self.shadows.is_active(id, kind) {
            self.shadows.clear(&mut self.ctx, id, kind);
        }
    }

    /// Render one frame
    ///
    /// `draw` is called once per shadow face and once for the geometry pass.
    pub fn render_frame<F>(
        &mut self,
        dt: f32,
        input: &dyn InputProvider,
        meshes: &dyn MeshProvider,
        mut draw: F,
    ) -> Result<FrameReport, RenderError>
    where
        F: FnMut(&mut RenderContext, &dyn MeshProvider, &FramePass),
    {
        self.camera.control(dt, input)?;
        self.upload_lights();

        let mut report = FrameReport::default();
        report.shadow_passes += Self::shadow_passes(&mut self.ctx, &mut self.shadows, &self.point_lights, meshes, &mut draw);
        report.shadow_passes += Self::shadow_passes(&mut self.ctx, &mut self.shadows, &self.spot_lights, meshes, &mut draw);
        report.shadow_passes +=
            Self::shadow_passes(&mut self.ctx, &mut self.shadows, &self.directional_lights, meshes, &mut draw);

        self.camera.begin_render(&mut self.ctx)?;
        let geometry = GeometryPass {
            view: self.camera.view_matrix(),
            projection: self.camera.projection_matrix(),
            camera_position: self.camera.position(),
        };
        draw(&mut self.ctx, meshes, &FramePass::Geometry(geometry));

        self.bind_shadow_maps();
        self.camera.render(&mut self.ctx, meshes)?;

        report.selected_entity = self.camera.selected_entity_id(&mut self.ctx)?;
        log::trace!(
            "Frame rendered: {} shadow passes, entity {}",
            report.shadow_passes,
            report.selected_entity
        );
        Ok(report)
    }

    fn upload_lights(&mut self) {
        let point = self.point_lights.gpu_records(PointLightGpu::new);
        let spot = self.spot_lights.gpu_records(SpotLightGpu::new);
        let directional = self.directional_lights.gpu_records(DirectionalLightGpu::new);
        let [point_buffer, spot_buffer, directional_buffer] = self.light_buffers;

        let device = self.ctx.backend.as_mut();
        device.upload_buffer(point_buffer, bytemuck::cast_slice(&point));
        device.bind_storage_buffer(POINT_LIGHT_BIND, point_buffer);
        device.upload_buffer(spot_buffer, bytemuck::cast_slice(&spot));
        device.bind_storage_buffer(SPOT_LIGHT_BIND, spot_buffer);
        device.upload_buffer(directional_buffer, bytemuck::cast_slice(&directional));
        device.bind_storage_buffer(DIRECTIONAL_LIGHT_BIND, directional_buffer);
    }

    fn shadow_passes<L, F>(
        ctx: &mut RenderContext,
        shadows: &mut ShadowsManager,
        lights: &LightRegistry<L>,
        meshes: &dyn MeshProvider,
        draw: &mut F,
    ) -> usize
    where
        L: ShadowCaster,
        F: FnMut(&mut RenderContext, &dyn MeshProvider, &FramePass),
    {
        let mut passes = 0;
        for id in 0..MAX_LIGHTS_PER_KIND {
            let casting = lights.get(id).filter(|light| lights.is_active(id) && light.is_on());
            let Some(light) = casting else {
                if shadows.is_active(id, L::KIND) {
                    shadows.clear(ctx, id, L::KIND);
                }
                continue;
            };

            shadows.add_shadow(ctx, id, L::KIND);
            for &face in light.shadow_faces() {
                if !shadows.use_shadow(ctx, id, L::KIND, face) {
                    continue;
                }
                let pass = ShadowPass {
                    kind: L::KIND,
                    light_id: id,
                    face,
                    light_space: light.light_space_matrix(face),
                    program: *shadows.program(),
                };
                draw(ctx, meshes, &FramePass::Shadow(pass));
                passes += 1;
            }
        }
        passes
    }

    fn bind_shadow_maps(&mut self) {
        if self.camera.light_render_type() != LightRenderType::Deferred {
            return;
        }
        let Some(material) = self.camera.material().copied() else {
            return;
        };
        let device = self.ctx.backend.as_mut();
        material.use_program(device);
        let maps = [
            ("u_point_shadows", "u_point_shadow_mask", LightType::PointLight),
            ("u_spot_shadows", "u_spot_shadow_mask", LightType::SpotLight),
            ("u_directional_shadows", "u_directional_shadow_mask", LightType::DirectionalLight),
        ];
        for (unit, (name, mask, kind)) in (SHADOW_TEXTURE_UNIT..).zip(maps) {
            material.set_texture_2d_array(device, name, unit, self.shadows.map_id(kind));
            material.set_u32(device, mask, self.shadows.active_mask(kind));
        }
    }

    /// Resize the camera viewport
    pub fn resize(&mut self, size: Vec2) -> Result<(), RenderError> {
        self.camera.set_win_size(&mut self.ctx, size)
    }

    /// Release every GPU object
    ///
    /// The core must not render afterwards; a new one can be built on the
    /// same device.
    pub fn free(&mut self) {
        self.shadows.free(&mut self.ctx);
        self.ctx.free();
        log::info!("Render core freed");
    }

    /// Render context
    pub const fn context(&self) -> &RenderContext {
        &self.ctx
    }

    /// Mutable render context
    pub fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.ctx
    }

    /// Camera
    pub const fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Mutable camera
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Shadow manager
    pub const fn shadows(&self) -> &ShadowsManager {
        &self.shadows
    }

    /// Registered point lights
    pub const fn point_lights(&self) -> &LightRegistry<PointLight> {
        &self.point_lights
    }

    /// Mutable point lights
    pub fn point_lights_mut(&mut self) -> &mut LightRegistry<PointLight> {
        &mut self.point_lights
    }

    /// Registered spot lights
    pub const fn spot_lights(&self) -> &LightRegistry<SpotLight> {
        &self.spot_lights
    }

    /// Mutable spot lights
    pub fn spot_lights_mut(&mut self) -> &mut LightRegistry<SpotLight> {
        &mut self.spot_lights
    }

    /// Registered directional lights
    pub const fn directional_lights(&self) -> &LightRegistry<DirectionalLight> {
        &self.directional_lights
    }

    /// Mutable directional lights
    pub fn directional_lights_mut(&mut self) -> &mut LightRegistry<DirectionalLight> {
        &mut self.directional_lights
    }
}

impl std::fmt::Debug for RenderCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCore")
            .field("ctx", &self.ctx)
            .field("camera", &self.camera)
            .field("point_lights", &self.point_lights.active_count())
            .field("spot_lights", &self.spot_lights.active_count())
            .field("directional_lights", &self.directional_lights.active_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputManager;
    use crate::render::backend::HeadlessBackend;
    use crate::render::mesh::MeshLibrary;

    fn core() -> (RenderCore, MeshLibrary) {
        let mut meshes = MeshLibrary::new();
        let core = RenderCore::new(Box::new(HeadlessBackend::new()), &RenderCoreConfig::default(), &mut meshes)
            .expect("render core");
        (core, meshes)
    }

    fn device(core: &RenderCore) -> &HeadlessBackend {
        core.context().backend_as::<HeadlessBackend>().expect("headless device")
    }

    #[test]
    fn test_new_requires_context() {
        let mut meshes = MeshLibrary::new();
        let result = RenderCore::new(
            Box::new(HeadlessBackend::without_context()),
            &RenderCoreConfig::default(),
            &mut meshes,
        );

        assert!(matches!(result, Err(RenderError::ContextNotReady)));
    }

    #[test]
    fn test_shadow_pass_per_face() {
        let (mut core, meshes) = core();
        core.add_point_light(0, PointLight::new(Vec3::new(0.0, 3.0, 0.0)));
        core.add_spot_light(2, SpotLight::new(Vec3::new(0.0, 5.0, 0.0), -Vec3::y()));
        core.add_directional_light(1, DirectionalLight::default());

        let mut seen = Vec::new();
        let report = core
            .render_frame(0.016, &InputManager::new(), &meshes, |_, _, pass| seen.push(*pass))
            .expect("frame");

        assert_eq!(report.shadow_passes, 8);
        assert_eq!(seen.len(), 9);
        assert!(matches!(seen.last(), Some(FramePass::Geometry(_))));
        assert!(core.shadows().is_active(2, LightType::SpotLight));
        assert!(core.shadows().is_active(1, LightType::DirectionalLight));
    }

    #[test]
    fn test_lights_uploaded_to_storage_bindings() {
        let (mut core, meshes) = core();
        core.add_point_light(3, PointLight::new(Vec3::zeros()));

        core.render_frame(0.016, &InputManager::new(), &meshes, |_, _, _| {})
            .expect("frame");

        let records = device(&core).storage_binding(POINT_LIGHT_BIND).expect("point lights bound");
        assert_eq!(records.len(), MAX_LIGHTS_PER_KIND * std::mem::size_of::<PointLightGpu>());
        assert!(device(&core).storage_binding(SPOT_LIGHT_BIND).is_some());
        assert!(device(&core).storage_binding(DIRECTIONAL_LIGHT_BIND).is_some());
    }

    #[test]
    fn test_switched_off_light_clears_shadow() {
        let (mut core, meshes) = core();
        core.add_point_light(5, PointLight::new(Vec3::zeros()));
        core.render_frame(0.016, &InputManager::new(), &meshes, |_, _, _| {})
            .expect("frame");
        assert!(core.shadows().is_active(5, LightType::PointLight));

        if let Some(light) = core.point_lights_mut().get_mut(5) {
            light.active = false;
        }
        let report = core
            .render_frame(0.016, &InputManager::new(), &meshes, |_, _, _| {})
            .expect("frame");

        assert_eq!(report.shadow_passes, 0);
        assert!(!core.shadows().is_active(5, LightType::PointLight));
    }

    #[test]
    fn test_remove_light_clears_shadow() {
        let (mut core, meshes) = core();
        core.add_spot_light(0, SpotLight::new(Vec3::zeros(), -Vec3::z()));
        core.render_frame(0.016, &InputManager::new(), &meshes, |_, _, _| {})
            .expect("frame");

        core.remove_light(0, LightType::SpotLight);

        assert!(!core.spot_lights().is_active(0));
        assert!(!core.shadows().is_active(0, LightType::SpotLight));
    }

    #[test]
    fn test_shadow_maps_bound_on_lighting_material() {
        let (mut core, meshes) = core();

        core.render_frame(0.016, &InputManager::new(), &meshes, |_, _, _| {})
            .expect("frame");

        let material = core.camera().material().copied().expect("lighting material");
        let point_map = core.shadows().map_id(LightType::PointLight);
        assert_eq!(
            device(&core).uniform(material.program(), "u_point_shadows"),
            Some(crate::render::backend::UniformValue::I32(5))
        );
        assert_eq!(device(&core).bound_texture(SHADOW_TEXTURE_UNIT).map(|(_, t)| t), Some(point_map));
    }

    #[test]
    fn test_shadow_masks_follow_active_slots() {
        let (mut core, meshes) = core();
        core.add_spot_light(2, SpotLight::new(Vec3::new(0.0, 5.0, 0.0), -Vec3::y()));
        core.add_spot_light(4, SpotLight::new(Vec3::new(1.0, 5.0, 0.0), -Vec3::y()));

        core.render_frame(0.016, &InputManager::new(), &meshes, |_, _, _| {})
            .expect("frame");

        let material = core.camera().material().copied().expect("lighting material");
        let mask = |name| device(&core).uniform(material.program(), name);
        assert_eq!(mask("u_spot_shadow_mask"), Some(crate::render::backend::UniformValue::U32(0b1_0100)));
        assert_eq!(mask("u_point_shadow_mask"), Some(crate::render::backend::UniformValue::U32(0)));
    }

    #[test]
    fn test_free_then_rebuild() {
        let (mut core, mut meshes) = core();
        core.free();
        assert!(core.context().resources.is_empty());

        let rebuilt = RenderCore::new(Box::new(HeadlessBackend::new()), &RenderCoreConfig::default(), &mut meshes);
        assert!(rebuilt.is_ok());
    }
}
