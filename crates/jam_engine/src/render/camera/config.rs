//! Camera configuration types

use serde::{Deserialize, Serialize};

use crate::foundation::math::{utils, Vec2, Vec3};

/// Projection used by the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderType {
    /// Not configured; rejected by `init`
    Invalid,
    /// Box-shaped view volume
    Orthographic,
    /// Frustum-shaped view volume
    #[default]
    Perspective,
}

/// Lighting path used when compositing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LightRenderType {
    /// Not configured; rejected by `init`
    Invalid,
    /// Geometry pass fills the attachment set, lighting runs on the composite
    #[default]
    Deferred,
    /// Geometry pass writes lit colour, the composite copies it
    Forward,
}

/// Parameters accepted by [`Camera::init`](super::Camera::init)
///
/// Angles are in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CamConfig {
    /// Projection type
    pub render_type: RenderType,
    /// Lighting path
    pub light_render_type: LightRenderType,
    /// Top-left corner of the camera viewport in window pixels
    pub win_pos: Vec2,
    /// Viewport size in pixels; both components must be at least 1
    pub win_size: Vec2,
    /// Eye position
    pub position: Vec3,
    /// Point looked at
    pub target: Vec3,
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
    /// Orthographic right extent
    pub right: f32,
    /// Orthographic left extent
    pub left: f32,
    /// Orthographic top extent
    pub top: f32,
    /// Orthographic bottom extent
    pub bottom: f32,
    /// Vertical field of view for perspective projection
    pub fovy: f32,
    /// Movement speed in units per second
    pub speed: f32,
    /// Rotation speed in radians per second (per pixel per second for the mouse)
    pub sensitivity: f32,
}

impl Default for CamConfig {
    fn default() -> Self {
        Self {
            render_type: RenderType::Perspective,
            light_render_type: LightRenderType::Deferred,
            win_pos: Vec2::zeros(),
            win_size: Vec2::zeros(),
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::zeros(),
            near: 1.0,
            far: 1000.0,
            right: 10.0,
            left: -10.0,
            top: 10.0,
            bottom: -10.0,
            fovy: utils::deg_to_rad(60.0),
            speed: 10.0,
            sensitivity: 1.0,
        }
    }
}

impl CamConfig {
    /// Default configuration for a viewport of the given size
    pub fn with_window(width: f32, height: f32) -> Self {
        Self {
            win_size: Vec2::new(width, height),
            ..Self::default()
        }
    }

    /// Describe why the configuration cannot be used, if it cannot
    pub fn validate(&self) -> Result<(), String> {
        if self.win_size.x < 1.0 || self.win_size.y < 1.0 {
            return Err(format!(
                "window size must be at least 1x1, got {}x{}",
                self.win_size.x, self.win_size.y
            ));
        }
        if self.render_type == RenderType::Invalid {
            return Err("render type is Invalid".to_owned());
        }
        if self.light_render_type == LightRenderType::Invalid {
            return Err("light render type is Invalid".to_owned());
        }
        if self.near <= 0.0 || self.far <= self.near {
            return Err(format!("clip planes must satisfy 0 < near < far, got {} and {}", self.near, self.far));
        }
        if self.render_type == RenderType::Perspective && !(self.fovy > 0.0 && self.fovy < std::f32::consts::PI) {
            return Err(format!("field of view must be in (0, pi), got {}", self.fovy));
        }
        if self.render_type == RenderType::Orthographic && (self.right == self.left || self.top == self.bottom) {
            return Err("orthographic extents are empty".to_owned());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CamConfig::default();

        assert_eq!(config.render_type, RenderType::Perspective);
        assert_eq!(config.light_render_type, LightRenderType::Deferred);
        assert_eq!(config.near, 1.0);
        assert_eq!(config.far, 1000.0);
        assert_eq!((config.left, config.right, config.bottom, config.top), (-10.0, 10.0, -10.0, 10.0));
        assert!((config.fovy - std::f32::consts::PI / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_validation() {
        assert!(CamConfig::default().validate().is_err());
        assert!(CamConfig::with_window(800.0, 600.0).validate().is_ok());
        assert!(CamConfig::with_window(800.0, 0.0).validate().is_err());

        let invalid_type = CamConfig {
            render_type: RenderType::Invalid,
            ..CamConfig::with_window(10.0, 10.0)
        };
        assert!(invalid_type.validate().is_err());

        let inverted = CamConfig {
            near: 10.0,
            far: 1.0,
            ..CamConfig::with_window(10.0, 10.0)
        };
        assert!(inverted.validate().is_err());
    }
}
