//! Shadow map manager
//!
//! One depth texture array per light kind holds every shadow map of that
//! kind. Rendering a shadow follows a fixed contract:
//!
//! ```text
//! add_shadow(id)            slot Unused -> Active, framebuffer created once
//! use_shadow(id, face)      attach layer, bind, viewport, clear depth, depth program
//!   ...draw casters with set_mat4("u_model", ..)...
//! clear(id)                 clear layers, detach, slot Active -> Unused
//! ```

use crate::foundation::math::Mat4;
use crate::render::backend::{Attachment, ClearFlags, TextureFormat, INVALID_HANDLE};
use crate::render::context::RenderContext;
use crate::render::lighting::{LightDirection, LightType, MAX_LIGHTS_PER_KIND};
use crate::render::shader::{sources, Shader};
use crate::render::RenderError;

use super::resolution::ShadowResolution;
use super::slots::ShadowSlots;

/// Owner of every shadow map
#[derive(Debug)]
pub struct ShadowsManager {
    program: Shader,
    point: ShadowSlots,
    spot: ShadowSlots,
    directional: ShadowSlots,
}

impl ShadowsManager {
    /// Create the depth program and one depth texture array per light kind
    ///
    /// Resolutions are fixed for the lifetime of the manager.
    pub fn new(
        ctx: &mut RenderContext,
        point_res: ShadowResolution,
        spot_res: ShadowResolution,
        directional_res: ShadowResolution,
    ) -> Result<Self, RenderError> {
        if !ctx.is_ready() {
            return Err(RenderError::ContextNotReady);
        }
        let program = Shader::new(ctx, Some(sources::DEPTH_FRAGMENT), Some(sources::DEPTH_VERTEX))?;

        let point = Self::create_slots(ctx, LightType::PointLight, point_res)?;
        let spot = Self::create_slots(ctx, LightType::SpotLight, spot_res)?;
        let directional = Self::create_slots(ctx, LightType::DirectionalLight, directional_res)?;

        log::info!(
            "Shadows ready: point {}px, spot {}px, directional {}px",
            point.resolution,
            spot.resolution,
            directional.resolution
        );

        Ok(Self {
            program,
            point,
            spot,
            directional,
        })
    }

    /// Create a manager with Low/Low/Medium resolutions
    pub fn with_defaults(ctx: &mut RenderContext) -> Result<Self, RenderError> {
        Self::new(ctx, ShadowResolution::Low, ShadowResolution::Low, ShadowResolution::Medium)
    }

    fn create_slots(
        ctx: &mut RenderContext,
        kind: LightType,
        resolution: ShadowResolution,
    ) -> Result<ShadowSlots, RenderError> {
        let map_id = ctx
            .create_textures(1)
            .first()
            .copied()
            .ok_or_else(|| RenderError::ResourceCreationFailed(format!("{kind:?} shadow map")))?;
        let slots = ShadowSlots::new(kind, resolution.texels(), map_id);
        ctx.backend.allocate_texture_2d_array(
            map_id,
            slots.resolution,
            slots.resolution,
            slots.total_layers(),
            TextureFormat::Depth32F,
        );
        Ok(slots)
    }

    fn slots(&self, kind: LightType) -> &ShadowSlots {
        match kind {
            LightType::PointLight => &self.point,
            LightType::SpotLight => &self.spot,
            LightType::DirectionalLight => &self.directional,
        }
    }

    fn slots_mut(&mut self, kind: LightType) -> &mut ShadowSlots {
        match kind {
            LightType::PointLight => &mut self.point,
            LightType::SpotLight => &mut self.spot,
            LightType::DirectionalLight => &mut self.directional,
        }
    }

    /// Activate the shadow slot of a light
    ///
    /// The slot framebuffer is created on first use. Ids at or beyond
    /// [`MAX_LIGHTS_PER_KIND`] are ignored.
    pub fn add_shadow(&mut self, ctx: &mut RenderContext, light_id: usize, kind: LightType) {
        if light_id >= MAX_LIGHTS_PER_KIND {
            log::warn!("{kind:?} shadow {light_id} ignored: only {MAX_LIGHTS_PER_KIND} shadows per kind");
            return;
        }
        let slots = self.slots_mut(kind);
        if slots.frame_buffers.activate(light_id) {
            log::trace!("{kind:?} shadow {light_id} reactivated");
            return;
        }
        let Some(&frame_buffer) = ctx.create_frame_buffers(1).first() else {
            return;
        };
        ctx.backend.set_draw_buffers(frame_buffer, &[]);
        if slots.frame_buffers.insert(light_id, frame_buffer).is_ok() {
            log::debug!("{kind:?} shadow {light_id} uses framebuffer {frame_buffer}");
        }
    }

    /// Prepare the device to render one shadow map
    ///
    /// Binds the slot framebuffer with the light's depth layer attached (the
    /// `dir` face for point lights), sets the viewport to the shadow
    /// resolution, clears depth and activates the depth program with
    /// `u_light_type`, `u_light_id` and `u_face` uploaded. Returns `false`
    /// when the slot is not active.
    pub fn use_shadow(&mut self, ctx: &mut RenderContext, light_id: usize, kind: LightType, dir: LightDirection) -> bool {
        let slots = self.slots(kind);
        let Some(&frame_buffer) = slots.frame_buffers.get_active(light_id) else {
            return false;
        };
        let layer = slots.layer(light_id, dir);
        let device = ctx.backend.as_mut();

        device.attach_texture(frame_buffer, Attachment::Depth, slots.map_id, Some(layer));
        if !device.framebuffer_complete(frame_buffer) {
            ctx.errors.add_error(
                format!("{kind:?} shadow {light_id} framebuffer incomplete"),
                "ShadowsManager::use_shadow",
                line!(),
            );
            return false;
        }
        device.bind_framebuffer(frame_buffer);
        device.viewport(0, 0, slots.resolution, slots.resolution);
        device.set_depth_test(true);
        device.clear(ClearFlags::DEPTH);

        self.program.use_program(device);
        self.program.set_u32(device, "u_light_type", kind.shader_index());
        self.program.set_u32(device, "u_light_id", u32::try_from(light_id).unwrap_or(u32::MAX));
        self.program.set_u32(device, "u_face", dir.index() as u32);
        log::trace!("{kind:?} shadow {light_id} rendering layer {layer}");
        true
    }

    /// Clear a light's depth layers and release its slot
    ///
    /// The framebuffer is kept for the next `add_shadow` of the same id.
    pub fn clear(&mut self, ctx: &mut RenderContext, light_id: usize, kind: LightType) {
        let slots = self.slots_mut(kind);
        let Some(&frame_buffer) = slots.frame_buffers.get(light_id) else {
            return;
        };
        let device = ctx.backend.as_mut();
        for layer in slots.light_layers(light_id) {
            device.attach_texture(frame_buffer, Attachment::Depth, slots.map_id, Some(layer));
            device.bind_framebuffer(frame_buffer);
            device.clear(ClearFlags::DEPTH);
        }
        device.attach_texture(frame_buffer, Attachment::Depth, INVALID_HANDLE, None);
        device.bind_framebuffer(INVALID_HANDLE);
        slots.frame_buffers.deactivate(light_id);
        log::trace!("{kind:?} shadow {light_id} cleared");
    }

    /// Depth texture array sampled for a light kind
    pub fn map_id(&self, kind: LightType) -> u32 {
        self.slots(kind).map_id
    }

    /// Upload a matrix to the depth program
    pub fn set_mat4(&self, ctx: &mut RenderContext, uniform_name: &str, matrix: &Mat4) {
        self.program.set_mat4(ctx.backend.as_mut(), uniform_name, matrix);
    }

    /// Shadow map edge length of a light kind
    pub fn resolution(&self, kind: LightType) -> u32 {
        self.slots(kind).resolution
    }

    /// Whether a light's shadow slot is active
    pub fn is_active(&self, light_id: usize, kind: LightType) -> bool {
        self.slots(kind).frame_buffers.is_active(light_id)
    }

    /// Bit `i` is set when light `i` of a kind has an active shadow
    pub fn active_mask(&self, kind: LightType) -> u32 {
        (0..MAX_LIGHTS_PER_KIND)
            .filter(|&id| self.is_active(id, kind))
            .fold(0, |mask, id| mask | (1 << id))
    }

    /// Depth program shared by every shadow pass
    pub const fn program(&self) -> &Shader {
        &self.program
    }

    /// Release every slot framebuffer and deactivate every slot
    ///
    /// The depth texture arrays and program stay owned by the resource
    /// manager and go away with its `free`.
    pub fn free(&mut self, ctx: &mut RenderContext) {
        for kind in LightType::ALL {
            let slots = self.slots_mut(kind);
            let frame_buffers: Vec<u32> = (0..MAX_LIGHTS_PER_KIND)
                .filter_map(|id| slots.frame_buffers.get(id).copied())
                .collect();
            slots.frame_buffers.clear();
            ctx.resources.release_frame_buffers(ctx.backend.as_mut(), &frame_buffers);
        }
        log::debug!("Shadow slots released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::{HeadlessBackend, ResourceKind, UniformValue};

    fn context() -> RenderContext {
        RenderContext::new(Box::new(HeadlessBackend::new()))
    }

    fn device(ctx: &RenderContext) -> &HeadlessBackend {
        ctx.backend_as::<HeadlessBackend>().expect("headless device")
    }

    #[test]
    fn test_default_resolutions_and_maps() {
        let mut ctx = context();
        let shadows = ShadowsManager::with_defaults(&mut ctx).expect("shadows");

        assert_eq!(shadows.resolution(LightType::PointLight), 512);
        assert_eq!(shadows.resolution(LightType::SpotLight), 512);
        assert_eq!(shadows.resolution(LightType::DirectionalLight), 1024);

        let point_map = device(&ctx)
            .texture_info(shadows.map_id(LightType::PointLight))
            .expect("point map allocated");
        assert_eq!(point_map.layers, 96);
        assert_eq!(point_map.format, TextureFormat::Depth32F);
        let spot_map = device(&ctx)
            .texture_info(shadows.map_id(LightType::SpotLight))
            .expect("spot map allocated");
        assert_eq!(spot_map.layers, 16);
    }

    #[test]
    fn test_context_required() {
        let mut ctx = RenderContext::new(Box::new(HeadlessBackend::without_context()));

        assert!(matches!(
            ShadowsManager::with_defaults(&mut ctx),
            Err(RenderError::ContextNotReady)
        ));
        assert!(ctx.resources.is_empty());
    }

    #[test]
    fn test_add_use_clear_cycle_for_every_slot() {
        let mut ctx = context();
        let mut shadows = ShadowsManager::with_defaults(&mut ctx).expect("shadows");

        for kind in LightType::ALL {
            for id in 0..MAX_LIGHTS_PER_KIND {
                assert!(!shadows.use_shadow(&mut ctx, id, kind, LightDirection::Front));
                shadows.add_shadow(&mut ctx, id, kind);
                assert!(shadows.use_shadow(&mut ctx, id, kind, LightDirection::Front));
                shadows.clear(&mut ctx, id, kind);
                assert!(!shadows.use_shadow(&mut ctx, id, kind, LightDirection::Front));
            }
        }
        assert_eq!(ctx.resources.len(ResourceKind::FrameBuffer), 3 * MAX_LIGHTS_PER_KIND);
    }

    #[test]
    fn test_out_of_range_ids_never_allocate() {
        let mut ctx = context();
        let mut shadows = ShadowsManager::with_defaults(&mut ctx).expect("shadows");

        for id in [MAX_LIGHTS_PER_KIND, MAX_LIGHTS_PER_KIND + 1, 1000] {
            shadows.add_shadow(&mut ctx, id, LightType::SpotLight);
            assert!(!shadows.use_shadow(&mut ctx, id, LightType::SpotLight, LightDirection::Front));
        }
        assert_eq!(ctx.resources.len(ResourceKind::FrameBuffer), 0);
        assert!(ctx.errors.is_empty());
    }

    #[test]
    fn test_readd_reuses_framebuffer() {
        let mut ctx = context();
        let mut shadows = ShadowsManager::with_defaults(&mut ctx).expect("shadows");

        shadows.add_shadow(&mut ctx, 2, LightType::DirectionalLight);
        shadows.clear(&mut ctx, 2, LightType::DirectionalLight);
        shadows.add_shadow(&mut ctx, 2, LightType::DirectionalLight);

        assert!(shadows.is_active(2, LightType::DirectionalLight));
        assert_eq!(ctx.resources.len(ResourceKind::FrameBuffer), 1);
    }

    #[test]
    fn test_active_mask_tracks_slots() {
        let mut ctx = context();
        let mut shadows = ShadowsManager::with_defaults(&mut ctx).expect("shadows");
        shadows.add_shadow(&mut ctx, 0, LightType::PointLight);
        shadows.add_shadow(&mut ctx, 15, LightType::PointLight);
        shadows.add_shadow(&mut ctx, 3, LightType::PointLight);
        shadows.clear(&mut ctx, 3, LightType::PointLight);

        assert_eq!(shadows.active_mask(LightType::PointLight), 0x8001);
        assert_eq!(shadows.active_mask(LightType::SpotLight), 0);
    }

    #[test]
    fn test_use_uploads_light_uniforms_and_face_layer() {
        let mut ctx = context();
        let mut shadows = ShadowsManager::with_defaults(&mut ctx).expect("shadows");
        shadows.add_shadow(&mut ctx, 4, LightType::PointLight);

        assert!(shadows.use_shadow(&mut ctx, 4, LightType::PointLight, LightDirection::Down));

        let program = shadows.program().program();
        let device = device(&ctx);
        let state = device.pipeline_state();
        assert_eq!(state.program, program);
        assert_eq!(state.viewport, (0, 0, 512, 512));
        assert_eq!(device.uniform(program, "u_light_id"), Some(UniformValue::U32(4)));
        assert_eq!(device.uniform(program, "u_face"), Some(UniformValue::U32(3)));
        assert_eq!(device.uniform(program, "u_light_type"), Some(UniformValue::U32(1)));

        let attached = device
            .attachment(state.frame_buffer, Attachment::Depth)
            .expect("depth layer attached");
        assert_eq!(attached.handle, shadows.map_id(LightType::PointLight));
        assert_eq!(attached.layer, Some(4 * 6 + 3));
    }

    #[test]
    fn test_clear_detaches_and_unbinds() {
        let mut ctx = context();
        let mut shadows = ShadowsManager::with_defaults(&mut ctx).expect("shadows");
        shadows.add_shadow(&mut ctx, 0, LightType::PointLight);
        assert!(shadows.use_shadow(&mut ctx, 0, LightType::PointLight, LightDirection::Up));
        let frame_buffer = device(&ctx).pipeline_state().frame_buffer;
        let depth_clears = device(&ctx).stats().depth_clears;

        shadows.clear(&mut ctx, 0, LightType::PointLight);

        let device = device(&ctx);
        assert_eq!(device.stats().depth_clears, depth_clears + 6);
        assert!(device.attachment(frame_buffer, Attachment::Depth).is_none());
        assert_eq!(device.pipeline_state().frame_buffer, INVALID_HANDLE);
    }

    #[test]
    fn test_set_mat4_targets_depth_program() {
        let mut ctx = context();
        let shadows = ShadowsManager::with_defaults(&mut ctx).expect("shadows");
        let model = Mat4::new_scaling(2.0);

        shadows.set_mat4(&mut ctx, "u_model", &model);

        assert_eq!(
            device(&ctx).uniform(shadows.program().program(), "u_model"),
            Some(UniformValue::Mat4(model))
        );
    }

    #[test]
    fn test_free_releases_slot_framebuffers() {
        let mut ctx = context();
        let mut shadows = ShadowsManager::with_defaults(&mut ctx).expect("shadows");
        shadows.add_shadow(&mut ctx, 1, LightType::SpotLight);
        shadows.add_shadow(&mut ctx, 3, LightType::PointLight);

        shadows.free(&mut ctx);

        assert!(!shadows.is_active(1, LightType::SpotLight));
        assert_eq!(ctx.resources.len(ResourceKind::FrameBuffer), 0);
        assert_eq!(device(&ctx).live_count(ResourceKind::FrameBuffer), 0);
    }
}
