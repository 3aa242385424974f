//! Light models
//!
//! Lights are plain data plus the matrices needed to render their shadow
//! maps. Position, direction, attenuation and cone angles are private because
//! the matrices derive from them; their setters rebuild the cached matrices so
//! a getter never returns stale data. Shading parameters that do not feed a
//! matrix are public fields.

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};

/// Near plane used by perspective shadow projections
pub const SHADOW_NEAR_PLANE: f32 = 0.1;

/// Far plane used when attenuation never falls below the cutoff
pub const UNBOUNDED_LIGHT_RANGE: f32 = 100.0;

/// Attenuation level treated as "no longer lit"
const ATTENUATION_CUTOFF: f32 = 5.0 / 256.0;

/// Kind of light source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightType {
    /// Cone-shaped light with position and direction
    SpotLight,
    /// Omnidirectional light with position
    PointLight,
    /// Light with a direction and no falloff
    DirectionalLight,
}

impl LightType {
    /// Every light type
    pub const ALL: [Self; 3] = [Self::SpotLight, Self::PointLight, Self::DirectionalLight];

    /// Value of `u_light_type` in the depth shader
    pub const fn shader_index(self) -> u32 {
        match self {
            Self::SpotLight => 0,
            Self::PointLight => 1,
            Self::DirectionalLight => 2,
        }
    }
}

/// Cube-map face directions, also used to address point-light shadow faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightDirection {
    /// (0, 0, 1)
    Front,
    /// (0, 0, -1)
    Back,
    /// (0, 1, 0)
    Up,
    /// (0, -1, 0)
    Down,
    /// (1, 0, 0)
    Right,
    /// (-1, 0, 0)
    Left,
}

impl LightDirection {
    /// All six faces in index order
    pub const ALL: [Self; 6] = [Self::Front, Self::Back, Self::Up, Self::Down, Self::Right, Self::Left];

    /// Face index in `0..6`
    pub const fn index(self) -> usize {
        match self {
            Self::Front => 0,
            Self::Back => 1,
            Self::Up => 2,
            Self::Down => 3,
            Self::Right => 4,
            Self::Left => 5,
        }
    }

    /// Unit vector of the face
    pub fn vector(self) -> Vec3 {
        match self {
            Self::Front => Vec3::new(0.0, 0.0, 1.0),
            Self::Back => Vec3::new(0.0, 0.0, -1.0),
            Self::Up => Vec3::new(0.0, 1.0, 0.0),
            Self::Down => Vec3::new(0.0, -1.0, 0.0),
            Self::Right => Vec3::new(1.0, 0.0, 0.0),
            Self::Left => Vec3::new(-1.0, 0.0, 0.0),
        }
    }

    /// Up vector used when looking along the face
    ///
    /// Follows the cube-map convention: the four horizontal faces use -Y, the
    /// vertical faces use ±Z.
    pub fn up(self) -> Vec3 {
        match self {
            Self::Up => Vec3::new(0.0, 0.0, 1.0),
            Self::Down => Vec3::new(0.0, 0.0, -1.0),
            _ => Vec3::new(0.0, -1.0, 0.0),
        }
    }
}

/// Distance falloff `1 / (constant + linear * d + quadratic * d²)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    /// Constant term
    pub constant: f32,
    /// Linear term
    pub linear: f32,
    /// Quadratic term
    pub quadratic: f32,
}

impl Attenuation {
    /// Create attenuation terms
    pub const fn new(constant: f32, linear: f32, quadratic: f32) -> Self {
        Self { constant, linear, quadratic }
    }

    /// Distance at which the falloff drops below the lit threshold
    pub fn effective_range(&self) -> f32 {
        let target = 1.0 / ATTENUATION_CUTOFF - self.constant;
        if target <= 0.0 {
            return SHADOW_NEAR_PLANE * 2.0;
        }
        let range = if self.quadratic > f32::EPSILON {
            let discriminant = self.linear.mul_add(self.linear, 4.0 * self.quadratic * target);
            (-self.linear + discriminant.sqrt()) / (2.0 * self.quadratic)
        } else if self.linear > f32::EPSILON {
            target / self.linear
        } else {
            UNBOUNDED_LIGHT_RANGE
        };
        range.max(SHADOW_NEAR_PLANE * 2.0)
    }
}

impl Default for Attenuation {
    fn default() -> Self {
        Self::new(1.0, 0.09, 0.032)
    }
}

/// Picks an up vector that is not parallel to `dir`
fn stable_up(dir: &Vec3) -> Vec3 {
    if dir.dot(&Vec3::y()).abs() > 0.99 {
        Vec3::z()
    } else {
        Vec3::y()
    }
}

/// Normalizes `dir`, falling back to -Y for degenerate input
fn normalized_or_down(dir: Vec3) -> Vec3 {
    dir.try_normalize(f32::EPSILON).unwrap_or_else(|| -Vec3::y())
}

/// Omnidirectional light rendering six shadow faces
#[derive(Debug, Clone, PartialEq)]
pub struct PointLight {
    position: Vec3,
    attenuation: Attenuation,
    views: [Mat4; 6],
    projection: Mat4,

    /// Intensity multiplier
    pub brightness: f32,
    /// Diffuse colour
    pub diffuse_colour: Vec3,
    /// Specular strength
    pub specular_strength: f32,
    /// Specular exponent
    pub specular_brightness: f32,
    /// Contributes to volumetric scattering
    pub volumetric: bool,
    /// Light switch
    pub active: bool,
}

impl PointLight {
    /// Create a light at a position with default shading parameters
    pub fn new(position: Vec3) -> Self {
        let mut light = Self {
            position,
            attenuation: Attenuation::default(),
            views: [Mat4::identity(); 6],
            projection: Mat4::identity(),
            brightness: 1.0,
            diffuse_colour: Vec3::new(1.0, 1.0, 1.0),
            specular_strength: 0.5,
            specular_brightness: 32.0,
            volumetric: false,
            active: true,
        };
        light.rebuild_views();
        light.rebuild_projection();
        light
    }

    /// Light position
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Move the light, rebuilding all six face views
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.rebuild_views();
    }

    /// Attenuation terms
    pub const fn attenuation(&self) -> Attenuation {
        self.attenuation
    }

    /// Change attenuation, rebuilding the projection far plane
    pub fn set_attenuation(&mut self, attenuation: Attenuation) {
        self.attenuation = attenuation;
        self.rebuild_projection();
    }

    /// View matrix of one cube face
    pub fn view_matrix(&self, direction: LightDirection) -> Mat4 {
        self.views[direction.index()]
    }

    /// 90° square projection shared by all faces
    pub const fn perspective_matrix(&self) -> Mat4 {
        self.projection
    }

    /// Distance covered by the shadow map
    pub fn range(&self) -> f32 {
        self.attenuation.effective_range()
    }

    fn rebuild_views(&mut self) {
        for direction in LightDirection::ALL {
            self.views[direction.index()] =
                Mat4::look_at(self.position, self.position + direction.vector(), direction.up());
        }
    }

    fn rebuild_projection(&mut self) {
        self.projection = Mat4::perspective(utils::deg_to_rad(90.0), 1.0, SHADOW_NEAR_PLANE, self.range());
    }
}

impl Default for PointLight {
    fn default() -> Self {
        Self::new(Vec3::zeros())
    }
}

/// Cone light
#[derive(Debug, Clone, PartialEq)]
pub struct SpotLight {
    position: Vec3,
    direction: Vec3,
    cut_off: f32,
    outer_cut_off: f32,
    attenuation: Attenuation,
    view: Mat4,
    projection: Mat4,

    /// Intensity multiplier
    pub brightness: f32,
    /// Diffuse colour
    pub diffuse_colour: Vec3,
    /// Specular strength
    pub specular_strength: f32,
    /// Specular exponent
    pub specular_brightness: f32,
    /// Contributes to volumetric scattering
    pub volumetric: bool,
    /// Light switch
    pub active: bool,
}

impl SpotLight {
    /// Create a light at `position` pointing along `direction`
    pub fn new(position: Vec3, direction: Vec3) -> Self {
        let mut light = Self {
            position,
            direction: normalized_or_down(direction),
            cut_off: utils::deg_to_rad(12.5),
            outer_cut_off: utils::deg_to_rad(17.5),
            attenuation: Attenuation::default(),
            view: Mat4::identity(),
            projection: Mat4::identity(),
            brightness: 1.0,
            diffuse_colour: Vec3::new(1.0, 1.0, 1.0),
            specular_strength: 0.5,
            specular_brightness: 32.0,
            volumetric: false,
            active: true,
        };
        light.rebuild_view();
        light.rebuild_projection();
        light
    }

    /// Move and aim the light
    ///
    /// `dir` is normalized; a zero vector aims the light straight down.
    pub fn set_pos_and_dir(&mut self, pos: Vec3, dir: Vec3) {
        self.position = pos;
        self.direction = normalized_or_down(dir);
        self.rebuild_view();
    }

    /// Light position
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Normalized light direction
    pub const fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Inner cone half-angle in radians
    pub const fn cut_off(&self) -> f32 {
        self.cut_off
    }

    /// Outer cone half-angle in radians
    pub const fn outer_cut_off(&self) -> f32 {
        self.outer_cut_off
    }

    /// Set the cone half-angles in radians, rebuilding the projection
    ///
    /// The outer angle is raised to the inner one if smaller.
    pub fn set_cut_off(&mut self, cut_off: f32, outer_cut_off: f32) {
        self.cut_off = cut_off;
        self.outer_cut_off = outer_cut_off.max(cut_off);
        self.rebuild_projection();
    }

    /// Attenuation terms
    pub const fn attenuation(&self) -> Attenuation {
        self.attenuation
    }

    /// Change attenuation, rebuilding the projection far plane
    pub fn set_attenuation(&mut self, attenuation: Attenuation) {
        self.attenuation = attenuation;
        self.rebuild_projection();
    }

    /// View matrix looking along the cone axis
    pub const fn view_matrix(&self) -> Mat4 {
        self.view
    }

    /// Perspective covering the outer cone
    pub const fn perspective_matrix(&self) -> Mat4 {
        self.projection
    }

    /// Distance covered by the shadow map
    pub fn range(&self) -> f32 {
        self.attenuation.effective_range()
    }

    fn rebuild_view(&mut self) {
        self.view = Mat4::look_at(self.position, self.position + self.direction, stable_up(&self.direction));
    }

    fn rebuild_projection(&mut self) {
        let fov = utils::clamp(2.0 * self.outer_cut_off, utils::deg_to_rad(1.0), utils::deg_to_rad(179.0));
        self.projection = Mat4::perspective(fov, 1.0, SHADOW_NEAR_PLANE, self.range());
    }
}

impl Default for SpotLight {
    fn default() -> Self {
        Self::new(Vec3::zeros(), -Vec3::y())
    }
}

/// Sun-like light with parallel rays
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    position: Vec3,
    direction: Vec3,
    half_extent: f32,
    far: f32,
    view: Mat4,
    projection: Mat4,

    /// Intensity multiplier
    pub brightness: f32,
    /// Diffuse colour
    pub diffuse_colour: Vec3,
    /// Specular strength
    pub specular_strength: f32,
    /// Specular exponent
    pub specular_brightness: f32,
    /// Contributes to volumetric scattering
    pub volumetric: bool,
    /// Light switch
    pub active: bool,
}

impl DirectionalLight {
    /// Default half-width of the orthographic shadow volume
    pub const DEFAULT_HALF_EXTENT: f32 = 20.0;

    /// Create a light whose shadow volume starts at `position`
    pub fn new(position: Vec3, direction: Vec3) -> Self {
        let mut light = Self {
            position,
            direction: normalized_or_down(direction),
            half_extent: Self::DEFAULT_HALF_EXTENT,
            far: Self::DEFAULT_HALF_EXTENT * 4.0,
            view: Mat4::identity(),
            projection: Mat4::identity(),
            brightness: 1.0,
            diffuse_colour: Vec3::new(1.0, 1.0, 1.0),
            specular_strength: 0.5,
            specular_brightness: 32.0,
            volumetric: false,
            active: true,
        };
        light.rebuild_view();
        light.rebuild_projection();
        light
    }

    /// Set the shadow-volume origin and the light direction
    pub fn set_direction(&mut self, pos: Vec3, dir: Vec3) {
        self.position = pos;
        self.direction = normalized_or_down(dir);
        self.rebuild_view();
    }

    /// Resize the orthographic shadow volume
    ///
    /// The volume spans `[-half_extent, half_extent]` across and `far` deep.
    pub fn set_shadow_extent(&mut self, half_extent: f32, far: f32) {
        self.half_extent = half_extent.abs().max(f32::EPSILON);
        self.far = far.max(SHADOW_NEAR_PLANE * 2.0);
        self.rebuild_projection();
    }

    /// Shadow-volume origin
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Normalized light direction
    pub const fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Half-width of the shadow volume
    pub const fn half_extent(&self) -> f32 {
        self.half_extent
    }

    /// View matrix looking along the light direction
    pub const fn view_matrix(&self) -> Mat4 {
        self.view
    }

    /// Orthographic projection of the shadow volume
    pub const fn perspective_matrix(&self) -> Mat4 {
        self.projection
    }

    fn rebuild_view(&mut self) {
        self.view = Mat4::look_at(self.position, self.position + self.direction, stable_up(&self.direction));
    }

    fn rebuild_projection(&mut self) {
        let e = self.half_extent;
        self.projection = Mat4::orthographic(-e, e, -e, e, SHADOW_NEAR_PLANE, self.far);
    }
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 20.0, 0.0), -Vec3::y())
    }
}

/// Light that renders one or more shadow-map faces
pub trait ShadowCaster {
    /// Kind used to address the shadow manager
    const KIND: LightType;

    /// Faces rendered per frame
    fn shadow_faces(&self) -> &'static [LightDirection];

    /// `projection * view` for one face
    fn light_space_matrix(&self, face: LightDirection) -> Mat4;

    /// Whether the light is switched on
    fn is_on(&self) -> bool;
}

impl ShadowCaster for PointLight {
    const KIND: LightType = LightType::PointLight;

    fn shadow_faces(&self) -> &'static [LightDirection] {
        &LightDirection::ALL
    }

    fn light_space_matrix(&self, face: LightDirection) -> Mat4 {
        self.projection * self.view_matrix(face)
    }

    fn is_on(&self) -> bool {
        self.active
    }
}

impl ShadowCaster for SpotLight {
    const KIND: LightType = LightType::SpotLight;

    fn shadow_faces(&self) -> &'static [LightDirection] {
        &[LightDirection::Front]
    }

    fn light_space_matrix(&self, _face: LightDirection) -> Mat4 {
        self.projection * self.view
    }

    fn is_on(&self) -> bool {
        self.active
    }
}

impl ShadowCaster for DirectionalLight {
    const KIND: LightType = LightType::DirectionalLight;

    fn shadow_faces(&self) -> &'static [LightDirection] {
        &[LightDirection::Front]
    }

    fn light_space_matrix(&self, _face: LightDirection) -> Mat4 {
        self.projection * self.view
    }

    fn is_on(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-4;

    fn assert_vec3_approx_eq(a: Vec3, b: Vec3) {
        assert_relative_eq!(a, b, epsilon = EPSILON);
    }

    #[test]
    fn test_cube_faces_share_position_and_follow_table() {
        let position = Vec3::new(1.0, 2.0, 3.0);
        let light = PointLight::new(position);

        for face in LightDirection::ALL {
            let view = light.view_matrix(face);
            assert_vec3_approx_eq(view.view_eye().expect("invertible view"), position);
            assert_vec3_approx_eq(view.view_forward(), face.vector());
        }
    }

    #[test]
    fn test_point_set_position_rebuilds_views() {
        let mut light = PointLight::default();
        light.set_position(Vec3::new(-4.0, 0.5, 9.0));

        let eye = light.view_matrix(LightDirection::Left).view_eye().expect("invertible view");
        assert_vec3_approx_eq(eye, Vec3::new(-4.0, 0.5, 9.0));
    }

    #[test]
    fn test_point_projection_is_square_90_degrees() {
        let light = PointLight::default();
        let p = light.perspective_matrix();

        assert_relative_eq!(p[(0, 0)], 1.0, epsilon = EPSILON);
        assert_relative_eq!(p[(1, 1)], 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_attenuation_changes_far_plane() {
        let mut light = PointLight::default();
        let before = light.perspective_matrix();
        light.set_attenuation(Attenuation::new(1.0, 0.7, 1.8));

        assert!(light.range() < Attenuation::default().effective_range());
        assert_ne!(before[(2, 2)], light.perspective_matrix()[(2, 2)]);
    }

    #[test]
    fn test_effective_range_solves_falloff() {
        let attenuation = Attenuation::new(1.0, 0.09, 0.032);
        let d = attenuation.effective_range();
        let falloff = 1.0 / (attenuation.quadratic * d * d + attenuation.linear * d + attenuation.constant);

        assert_relative_eq!(falloff, 5.0 / 256.0, epsilon = 1e-5);
        assert_relative_eq!(Attenuation::new(1.0, 0.0, 0.0).effective_range(), UNBOUNDED_LIGHT_RANGE);
    }

    #[test]
    fn test_spot_requery_reflects_latest_values() {
        let mut light = SpotLight::default();
        light.set_pos_and_dir(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, 0.0, -3.0));
        light.set_pos_and_dir(Vec3::new(2.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0));

        assert_vec3_approx_eq(light.direction(), Vec3::new(1.0, 0.0, 0.0));
        let view = light.view_matrix();
        assert_vec3_approx_eq(view.view_eye().expect("invertible view"), Vec3::new(2.0, 1.0, 0.0));
        assert_vec3_approx_eq(view.view_forward(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_spot_fov_is_twice_outer_cut_off() {
        let mut light = SpotLight::default();
        light.set_cut_off(utils::deg_to_rad(20.0), utils::deg_to_rad(30.0));

        let expected = 1.0 / (utils::deg_to_rad(30.0)).tan();
        assert_relative_eq!(light.perspective_matrix()[(1, 1)], expected, epsilon = EPSILON);
    }

    #[test]
    fn test_spot_looking_straight_down_is_well_formed() {
        let light = SpotLight::new(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, -1.0, 0.0));

        assert!(light.view_matrix().iter().all(|v| v.is_finite()));
        assert_vec3_approx_eq(light.view_matrix().view_forward(), Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_directional_ortho_covers_extent() {
        let mut light = DirectionalLight::default();
        light.set_shadow_extent(5.0, 50.0);
        light.set_direction(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.3, -1.0, 0.0));

        let p = light.perspective_matrix();
        assert_relative_eq!(p[(0, 0)], 2.0 / 10.0, epsilon = EPSILON);
        assert_relative_eq!(p[(3, 3)], 1.0);
        assert_vec3_approx_eq(light.view_matrix().view_forward(), Vec3::new(0.3, -1.0, 0.0).normalize());
    }

    #[test]
    fn test_zero_direction_falls_back_to_down() {
        let mut light = DirectionalLight::default();
        light.set_direction(Vec3::zeros(), Vec3::zeros());

        assert_vec3_approx_eq(light.direction(), -Vec3::y());
    }
}
