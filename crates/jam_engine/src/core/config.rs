//! # Render Core Configuration
//!
//! Everything [`RenderCore`](crate::render::RenderCore) needs before the first
//! frame: shadow map resolutions, the camera and the directional shadow
//! volume. Angles are stored in degrees so hand-written files stay readable;
//! [`CameraSettings::to_cam_config`] converts them.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{utils, Vec2, Vec3};
use crate::render::camera::{CamConfig, CameraKeys, LightRenderType, RenderType};
use crate::render::lighting::DirectionalLight;
use crate::render::shadows::ShadowResolution;

pub use crate::config::{Config, ConfigError};

/// Shadow map resolution per light kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    /// Point light cube faces
    pub point: ShadowResolution,
    /// Spot light maps
    pub spot: ShadowResolution,
    /// Directional light maps
    pub directional: ShadowResolution,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            point: ShadowResolution::Low,
            spot: ShadowResolution::Low,
            directional: ShadowResolution::Medium,
        }
    }
}

/// Orthographic volume every directional light renders its shadow into
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalShadowSettings {
    /// Half the width and height of the volume
    pub half_extent: f32,
    /// Depth of the volume
    pub far: f32,
}

impl Default for DirectionalShadowSettings {
    fn default() -> Self {
        Self {
            half_extent: DirectionalLight::DEFAULT_HALF_EXTENT,
            far: 80.0,
        }
    }
}

/// Camera settings in file-friendly units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Projection type
    pub render_type: RenderType,
    /// Lighting path
    pub light_render_type: LightRenderType,
    /// Viewport origin in window pixels
    pub win_pos: [f32; 2],
    /// Viewport size in pixels
    pub win_size: [f32; 2],
    /// Eye position
    pub position: [f32; 3],
    /// Point looked at
    pub target: [f32; 3],
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
    /// Orthographic left extent
    pub left: f32,
    /// Orthographic right extent
    pub right: f32,
    /// Orthographic bottom extent
    pub bottom: f32,
    /// Orthographic top extent
    pub top: f32,
    /// Vertical field of view in degrees
    pub fovy_degrees: f32,
    /// Movement speed in units per second
    pub speed: f32,
    /// Rotation speed
    pub sensitivity: f32,
    /// Movement bindings
    pub keys: CameraKeys,
}

impl Default for CameraSettings {
    fn default() -> Self {
        let cam = CamConfig::default();
        Self {
            render_type: cam.render_type,
            light_render_type: cam.light_render_type,
            win_pos: [0.0, 0.0],
            win_size: [1200.0, 675.0],
            position: cam.position.into(),
            target: cam.target.into(),
            near: cam.near,
            far: cam.far,
            left: cam.left,
            right: cam.right,
            bottom: cam.bottom,
            top: cam.top,
            fovy_degrees: utils::rad_to_deg(cam.fovy),
            speed: cam.speed,
            sensitivity: cam.sensitivity,
            keys: CameraKeys::default(),
        }
    }
}

impl CameraSettings {
    /// Camera parameters with angles in radians
    pub fn to_cam_config(&self) -> CamConfig {
        CamConfig {
            render_type: self.render_type,
            light_render_type: self.light_render_type,
            win_pos: Vec2::from(self.win_pos),
            win_size: Vec2::from(self.win_size),
            position: Vec3::from(self.position),
            target: Vec3::from(self.target),
            near: self.near,
            far: self.far,
            right: self.right,
            left: self.left,
            top: self.top,
            bottom: self.bottom,
            fovy: utils::deg_to_rad(self.fovy_degrees),
            speed: self.speed,
            sensitivity: self.sensitivity,
        }
    }
}

/// Top-level render core configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderCoreConfig {
    /// Colour the camera targets are cleared to
    pub clear_colour: [f32; 4],
    /// Shadow map resolutions
    pub shadows: ShadowSettings,
    /// Directional shadow volume
    pub directional_shadow: DirectionalShadowSettings,
    /// Camera setup
    pub camera: CameraSettings,
}

impl Default for RenderCoreConfig {
    fn default() -> Self {
        Self {
            clear_colour: [0.0, 0.0, 0.0, 1.0],
            shadows: ShadowSettings::default(),
            directional_shadow: DirectionalShadowSettings::default(),
            camera: CameraSettings::default(),
        }
    }
}

impl Config for RenderCoreConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;
    use crate::input::KeyCode;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_shadow_resolutions() {
        let config = RenderCoreConfig::default();

        assert_eq!(config.shadows.point, ShadowResolution::Low);
        assert_eq!(config.shadows.spot, ShadowResolution::Low);
        assert_eq!(config.shadows.directional, ShadowResolution::Medium);
    }

    #[test]
    fn test_camera_settings_convert_degrees() {
        let settings = CameraSettings {
            fovy_degrees: 90.0,
            ..CameraSettings::default()
        };

        let cam = settings.to_cam_config();
        assert_relative_eq!(cam.fovy, std::f32::consts::FRAC_PI_2, epsilon = 1e-6);
        assert_eq!(cam.win_size, Vec2::new(1200.0, 675.0));
        assert!(cam.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let text = r#"
[shadows]
point = "High"

[camera]
win_size = [640.0, 480.0]
keys = { front = "Up", back = "Down", right = "Right", left = "Left", up = "E", down = "Q" }
"#;
        let config = RenderCoreConfig::from_str_as(text, ConfigFormat::Toml).expect("parse");

        assert_eq!(config.shadows.point, ShadowResolution::High);
        assert_eq!(config.shadows.directional, ShadowResolution::Medium);
        assert_eq!(config.camera.win_size, [640.0, 480.0]);
        assert_eq!(config.camera.keys.front, KeyCode::Up);
        assert_relative_eq!(config.camera.fovy_degrees, 60.0, epsilon = 1e-4);
    }

    #[test]
    fn test_ron_round_trip() {
        let mut config = RenderCoreConfig::default();
        config.directional_shadow.half_extent = 35.0;
        config.camera.render_type = RenderType::Orthographic;

        let text = config.to_string_as(ConfigFormat::Ron).expect("serialize");
        let parsed = RenderCoreConfig::from_str_as(&text, ConfigFormat::Ron).expect("parse");

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let result = RenderCoreConfig::load_from_file("render.yaml");

        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
