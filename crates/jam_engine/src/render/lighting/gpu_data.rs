//! Light data as laid out in shader storage buffers
//!
//! Each record mirrors a `std430` struct in the lighting shaders: matrices
//! first, then `vec3` + scalar pairs so every row is 16 bytes. Cone angles
//! are stored as cosines, ready for a dot-product comparison.

use bytemuck::{Pod, Zeroable};

use super::light::{DirectionalLight, LightDirection, PointLight, SpotLight};
use crate::foundation::math::{Mat4, Vec3};

/// Storage binding of the point-light array
pub const POINT_LIGHT_BIND: u32 = 0;

/// Storage binding of the spot-light array
pub const SPOT_LIGHT_BIND: u32 = 1;

/// Storage binding of the directional-light array
pub const DIRECTIONAL_LIGHT_BIND: u32 = 2;

fn columns(m: &Mat4) -> [[f32; 4]; 4] {
    (*m).into()
}

fn xyz(v: &Vec3) -> [f32; 3] {
    [v.x, v.y, v.z]
}

/// Point light record
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointLightGpu {
    /// Cube-face view matrices in [`LightDirection::ALL`] order
    pub views: [[[f32; 4]; 4]; 6],
    /// Shared face projection
    pub projection: [[f32; 4]; 4],
    /// World position
    pub position: [f32; 3],
    /// Intensity multiplier
    pub brightness: f32,
    /// Diffuse colour
    pub diffuse_colour: [f32; 3],
    /// Specular strength
    pub specular_strength: f32,
    /// Quadratic attenuation
    pub quadratic: f32,
    /// Constant attenuation
    pub constant: f32,
    /// Linear attenuation
    pub linear: f32,
    /// Non-zero when volumetric
    pub volumetric: u32,
    /// Alignment padding
    pub padding: [f32; 2],
    /// Non-zero when lit
    pub active: u32,
    /// Specular exponent
    pub specular_brightness: f32,
}

impl PointLightGpu {
    /// Build the record; `enabled` is combined with the light's own switch
    pub fn new(light: &PointLight, enabled: bool) -> Self {
        let attenuation = light.attenuation();
        let mut views = [[[0.0; 4]; 4]; 6];
        for face in LightDirection::ALL {
            views[face.index()] = columns(&light.view_matrix(face));
        }
        Self {
            views,
            projection: columns(&light.perspective_matrix()),
            position: xyz(&light.position()),
            brightness: light.brightness,
            diffuse_colour: xyz(&light.diffuse_colour),
            specular_strength: light.specular_strength,
            quadratic: attenuation.quadratic,
            constant: attenuation.constant,
            linear: attenuation.linear,
            volumetric: u32::from(light.volumetric),
            padding: [0.0; 2],
            active: u32::from(enabled && light.active),
            specular_brightness: light.specular_brightness,
        }
    }
}

/// Spot light record
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpotLightGpu {
    /// View matrix
    pub view: [[f32; 4]; 4],
    /// Projection matrix
    pub projection: [[f32; 4]; 4],
    /// World position
    pub position: [f32; 3],
    /// Intensity multiplier
    pub brightness: f32,
    /// Normalized direction
    pub direction: [f32; 3],
    /// Cosine of the inner cone angle
    pub cut_off: f32,
    /// Diffuse colour
    pub diffuse_colour: [f32; 3],
    /// Specular strength
    pub specular_strength: f32,
    /// Linear attenuation
    pub linear: f32,
    /// Constant attenuation
    pub constant: f32,
    /// Quadratic attenuation
    pub quadratic: f32,
    /// Cosine of the outer cone angle
    pub outer_cut_off: f32,
    /// Non-zero when volumetric
    pub volumetric: u32,
    /// Alignment padding
    pub padding: f32,
    /// Specular exponent
    pub specular_brightness: f32,
    /// Non-zero when lit
    pub active: u32,
}

impl SpotLightGpu {
    /// Build the record; `enabled` is combined with the light's own switch
    pub fn new(light: &SpotLight, enabled: bool) -> Self {
        let attenuation = light.attenuation();
        Self {
            view: columns(&light.view_matrix()),
            projection: columns(&light.perspective_matrix()),
            position: xyz(&light.position()),
            brightness: light.brightness,
            direction: xyz(&light.direction()),
            cut_off: light.cut_off().cos(),
            diffuse_colour: xyz(&light.diffuse_colour),
            specular_strength: light.specular_strength,
            linear: attenuation.linear,
            constant: attenuation.constant,
            quadratic: attenuation.quadratic,
            outer_cut_off: light.outer_cut_off().cos(),
            volumetric: u32::from(light.volumetric),
            padding: 0.0,
            specular_brightness: light.specular_brightness,
            active: u32::from(enabled && light.active),
        }
    }
}

/// Directional light record
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DirectionalLightGpu {
    /// View matrix
    pub view: [[f32; 4]; 4],
    /// Projection matrix
    pub projection: [[f32; 4]; 4],
    /// Shadow-volume origin
    pub position: [f32; 3],
    /// Intensity multiplier
    pub brightness: f32,
    /// Normalized direction
    pub direction: [f32; 3],
    /// Specular exponent
    pub specular_brightness: f32,
    /// Diffuse colour
    pub diffuse_colour: [f32; 3],
    /// Specular strength
    pub specular_strength: f32,
    /// Non-zero when volumetric
    pub volumetric: u32,
    /// Alignment padding
    pub padding: [f32; 2],
    /// Non-zero when lit
    pub active: u32,
}

impl DirectionalLightGpu {
    /// Build the record; `enabled` is combined with the light's own switch
    pub fn new(light: &DirectionalLight, enabled: bool) -> Self {
        Self {
            view: columns(&light.view_matrix()),
            projection: columns(&light.perspective_matrix()),
            position: xyz(&light.position()),
            brightness: light.brightness,
            direction: xyz(&light.direction()),
            specular_brightness: light.specular_brightness,
            diffuse_colour: xyz(&light.diffuse_colour),
            specular_strength: light.specular_strength,
            volumetric: u32::from(light.volumetric),
            padding: [0.0; 2],
            active: u32::from(enabled && light.active),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std430_sizes() {
        assert_eq!(std::mem::size_of::<PointLightGpu>(), 7 * 64 + 64);
        assert_eq!(std::mem::size_of::<SpotLightGpu>(), 2 * 64 + 80);
        assert_eq!(std::mem::size_of::<DirectionalLightGpu>(), 2 * 64 + 64);
    }

    #[test]
    fn test_disabled_record_is_inactive() {
        let mut light = PointLight::new(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(PointLightGpu::new(&light, true).active, 1);
        assert_eq!(PointLightGpu::new(&light, false).active, 0);

        light.active = false;
        let record = PointLightGpu::new(&light, true);
        assert_eq!(record.active, 0);
        assert_eq!(record.position, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_matrices_are_column_major() {
        let light = SpotLight::new(Vec3::new(4.0, 0.0, 0.0), Vec3::new(0.0, 0.0, -1.0));
        let record = SpotLightGpu::new(&light, true);
        let view = light.view_matrix();

        assert_eq!(record.view[3][0], view[(0, 3)]);
        assert_eq!(record.view[0][3], view[(3, 0)]);
    }

    #[test]
    fn test_directional_record_carries_shadow_projection() {
        let mut light = DirectionalLight::default();
        light.set_shadow_extent(8.0, 40.0);
        let record = DirectionalLightGpu::new(&light, true);

        assert_eq!(record.projection, columns(&light.perspective_matrix()));
        approx::assert_relative_eq!(record.projection[0][0], 2.0 / 16.0, epsilon = 1e-6);
    }
}
