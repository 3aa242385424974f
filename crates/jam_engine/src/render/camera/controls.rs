//! Free-fly camera controls
//!
//! Key bindings plus the pure orientation helpers `Camera::control` is built
//! from. Orientation is kept as a unit view direction; the side and up axes
//! are derived from it against world +Y.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{utils, Vec3};
use crate::input::KeyCode;

/// Largest pitch the camera may reach, just short of straight up or down
pub const MAX_PITCH: f32 = 89.0 * std::f32::consts::PI / 180.0;

/// Keys that move the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraKeys {
    /// Move along the view direction
    pub front: KeyCode,
    /// Move against the view direction
    pub back: KeyCode,
    /// Strafe right
    pub right: KeyCode,
    /// Strafe left
    pub left: KeyCode,
    /// Move along world up
    pub up: KeyCode,
    /// Move against world up
    pub down: KeyCode,
}

impl Default for CameraKeys {
    fn default() -> Self {
        Self {
            front: KeyCode::W,
            back: KeyCode::S,
            right: KeyCode::D,
            left: KeyCode::A,
            up: KeyCode::Space,
            down: KeyCode::LeftShift,
        }
    }
}

/// Right-handed side and up axes for a view direction
///
/// Falls back to world +X as the side axis when looking straight up or down.
pub fn basis(view_dir: &Vec3) -> (Vec3, Vec3) {
    let world_up = Vec3::y();
    let side = view_dir
        .cross(&world_up)
        .try_normalize(1.0e-6)
        .unwrap_or_else(Vec3::x);
    let up = side.cross(view_dir).normalize();
    (side, up)
}

/// Yaw (about world up) and pitch (above the horizon) of a direction
pub fn yaw_pitch(view_dir: &Vec3) -> (f32, f32) {
    let dir = view_dir.try_normalize(1.0e-6).unwrap_or_else(|| -Vec3::z());
    let pitch = utils::clamp(dir.y, -1.0, 1.0).asin();
    let yaw = dir.x.atan2(-dir.z);
    (yaw, pitch)
}

/// Unit direction for a yaw and pitch; yaw 0 and pitch 0 look down -Z
pub fn direction_from(yaw: f32, pitch: f32) -> Vec3 {
    let (sin_yaw, cos_yaw) = yaw.sin_cos();
    let (sin_pitch, cos_pitch) = pitch.sin_cos();
    Vec3::new(sin_yaw * cos_pitch, sin_pitch, -cos_yaw * cos_pitch)
}

/// Turn a direction right by `yaw` and up by `pitch`, keeping the pitch clamped
pub fn rotate(view_dir: &Vec3, yaw: f32, pitch: f32) -> Vec3 {
    let (current_yaw, current_pitch) = yaw_pitch(view_dir);
    let pitch = utils::clamp(current_pitch + pitch, -MAX_PITCH, MAX_PITCH);
    direction_from(current_yaw + yaw, pitch)
}
