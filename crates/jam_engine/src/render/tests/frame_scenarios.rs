//! Whole-frame scenarios through `RenderCore`
//!
//! Shadows, picking and resizing driven the way an application would.

use crate::core::config::RenderCoreConfig;
use crate::foundation::logging;
use crate::foundation::math::{Vec2, Vec3};
use crate::input::InputManager;
use crate::render::backend::{Attachment, HeadlessBackend, ResourceKind};
use crate::render::camera::{TextureDataType, INVALID_ENTITY};
use crate::render::lighting::{LightDirection, LightType, PointLight, SpotLight};
use crate::render::mesh::MeshLibrary;
use crate::render::renderer::{FramePass, RenderCore};

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn core_with(config: &RenderCoreConfig) -> (RenderCore, MeshLibrary) {
        logging::init_for_tests();
        let mut meshes = MeshLibrary::new();
        let core = RenderCore::new(Box::new(HeadlessBackend::new()), config, &mut meshes).expect("render core");
        (core, meshes)
    }

    fn device(core: &RenderCore) -> &HeadlessBackend {
        core.context().backend_as::<HeadlessBackend>().expect("headless device")
    }

    #[test]
    fn test_point_light_shadow_on_low_low_medium() {
        let (mut core, meshes) = core_with(&RenderCoreConfig::default());
        core.add_point_light(3, PointLight::new(Vec3::new(0.0, 4.0, 0.0)));

        let mut up_face = None;
        core.render_frame(0.016, &InputManager::new(), &meshes, |ctx, _, pass| {
            if let FramePass::Shadow(shadow) = pass {
                if shadow.face == LightDirection::Up {
                    let device = ctx.backend_as::<HeadlessBackend>().expect("headless device");
                    let frame_buffer = device.pipeline_state().frame_buffer;
                    up_face = Some((
                        frame_buffer,
                        device.framebuffer_size(frame_buffer),
                        device.attachment(frame_buffer, Attachment::Depth).and_then(|a| a.layer),
                        device.pipeline_state().viewport,
                    ));
                }
            }
        })
        .expect("frame");

        let (_, size, layer, viewport) = up_face.expect("up face rendered");
        assert_eq!(size, Some((512, 512)));
        assert_eq!(layer, Some(3 * 6 + LightDirection::Up.index() as u32));
        assert_eq!(viewport, (0, 0, 512, 512));
        assert_eq!(core.shadows().resolution(LightType::DirectionalLight), 1024);

        core.remove_light(3, LightType::PointLight);
        let report = core
            .render_frame(0.016, &InputManager::new(), &meshes, |_, _, _| {})
            .expect("frame");
        assert_eq!(report.shadow_passes, 0);
        assert!(!core.shadows().is_active(3, LightType::PointLight));
    }

    #[test]
    fn test_lights_beyond_capacity_never_allocate() {
        let (mut core, meshes) = core_with(&RenderCoreConfig::default());
        let frame_buffers = core.context().resources.len(ResourceKind::FrameBuffer);

        assert!(!core.add_spot_light(16, SpotLight::new(Vec3::zeros(), -Vec3::y())));
        assert!(!core.add_point_light(40, PointLight::new(Vec3::zeros())));
        let report = core
            .render_frame(0.016, &InputManager::new(), &meshes, |_, _, _| {})
            .expect("frame");

        assert_eq!(report.shadow_passes, 0);
        assert_eq!(core.context().resources.len(ResourceKind::FrameBuffer), frame_buffers);
    }

    #[test]
    fn test_spot_light_moves_between_frames() {
        let (mut core, meshes) = core_with(&RenderCoreConfig::default());
        core.add_spot_light(0, SpotLight::new(Vec3::new(0.0, 5.0, 0.0), -Vec3::y()));

        let mut matrices = Vec::new();
        let mut record = |pass: &FramePass| {
            if let FramePass::Shadow(shadow) = pass {
                matrices.push(shadow.light_space);
            }
        };
        core.render_frame(0.016, &InputManager::new(), &meshes, |_, _, pass| record(pass))
            .expect("frame");
        if let Some(light) = core.spot_lights_mut().get_mut(0) {
            light.set_pos_and_dir(Vec3::new(2.0, 5.0, 0.0), Vec3::new(0.0, -1.0, 1.0));
        }
        core.render_frame(0.016, &InputManager::new(), &meshes, |_, _, pass| record(pass))
            .expect("frame");

        assert_eq!(matrices.len(), 2);
        assert_ne!(matrices[0], matrices[1]);
        let expected = core.spot_lights().get(0).map(|light| light.perspective_matrix() * light.view_matrix());
        assert_eq!(Some(matrices[1]), expected);
    }

    #[test]
    fn test_pick_entity_under_cursor() {
        let (mut core, meshes) = core_with(&RenderCoreConfig::default());
        let frame_buffer = core.camera().attachments().map(|a| a.frame_buffer).expect("attachments");
        let mut input = InputManager::new();
        input.handle_mouse_move(600.0, 300.0);

        let report = core
            .render_frame(0.016, &input, &meshes, |ctx, _, pass| {
                if matches!(pass, FramePass::Geometry(_)) {
                    let device = ctx.backend_as_mut::<HeadlessBackend>().expect("headless device");
                    device.write_pixel_u32(frame_buffer, TextureDataType::Picker.index(), 600, 674 - 300, 42);
                }
            })
            .expect("frame");
        assert_eq!(report.selected_entity, 42);

        input.handle_mouse_move(10.0, 10.0);
        let report = core
            .render_frame(0.016, &input, &meshes, |_, _, _| {})
            .expect("frame");
        assert_eq!(report.selected_entity, INVALID_ENTITY);
    }

    #[test]
    fn test_perspective_at_800_by_600() {
        let mut config = RenderCoreConfig::default();
        config.camera.win_size = [800.0, 600.0];
        let (core, _) = core_with(&config);

        let projection = core.camera().perspective_matrix();
        assert_relative_eq!(projection[(1, 1)], 1.0 / 30.0_f32.to_radians().tan(), epsilon = 1e-5);
    }

    #[test]
    fn test_resize_reflects_in_projection() {
        let mut config = RenderCoreConfig::default();
        config.camera.win_size = [800.0, 600.0];
        let (mut core, _) = core_with(&config);
        let before = core.camera().perspective_matrix()[(0, 0)];

        core.resize(Vec2::new(400.0, 600.0)).expect("resize");

        let after = core.camera().perspective_matrix()[(0, 0)];
        assert_relative_eq!(after, before * 2.0, epsilon = 1e-5);
        let frame_buffer = core.camera().attachments().map(|a| a.frame_buffer).expect("attachments");
        assert_eq!(device(&core).framebuffer_size(frame_buffer), Some((400, 600)));
    }

    #[test]
    fn test_free_then_create_again() {
        let (mut core, _) = core_with(&RenderCoreConfig::default());
        assert!(!core.context().resources.is_empty());

        core.free();
        assert!(core.context().resources.is_empty());
        assert_eq!(device(&core).live_count(ResourceKind::Texture), 0);

        let textures = core.context_mut().create_textures(1);
        assert_eq!(textures.len(), 1);
        assert_eq!(core.context().resources.len(ResourceKind::Texture), 1);
    }
}
