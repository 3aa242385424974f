//! Shader programs and the built-in GLSL sources

use super::backend::{GraphicsBackend, RawHandle, TextureTarget, UniformValue, INVALID_HANDLE};
use super::context::RenderContext;
use super::RenderError;
use crate::foundation::math::{Mat4, Vec3};

/// Linked program with typed uniform setters
///
/// The program name is owned by the resource manager; dropping a `Shader`
/// releases nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shader {
    program: RawHandle,
}

impl Shader {
    /// Compile and link a program through the context's resource manager
    pub fn new(ctx: &mut RenderContext, fragment: Option<&str>, vertex: Option<&str>) -> Result<Self, RenderError> {
        let program = ctx.create_program(fragment, vertex);
        if program == INVALID_HANDLE {
            let detail = ctx
                .errors
                .peek()
                .map_or_else(|| "program creation failed".to_owned(), |entry| entry.message.clone());
            return Err(RenderError::ResourceCreationFailed(detail));
        }
        Ok(Self { program })
    }

    /// Raw program name
    pub const fn program(&self) -> RawHandle {
        self.program
    }

    /// Make the program current
    pub fn use_program(&self, device: &mut dyn GraphicsBackend) {
        device.use_program(self.program);
    }

    /// Upload an unsigned integer uniform
    pub fn set_u32(&self, device: &mut dyn GraphicsBackend, name: &str, value: u32) {
        device.set_uniform(self.program, name, UniformValue::U32(value));
    }

    /// Upload a float uniform
    pub fn set_f32(&self, device: &mut dyn GraphicsBackend, name: &str, value: f32) {
        device.set_uniform(self.program, name, UniformValue::F32(value));
    }

    /// Upload a vector uniform
    pub fn set_vec3(&self, device: &mut dyn GraphicsBackend, name: &str, value: Vec3) {
        device.set_uniform(self.program, name, UniformValue::Vec3(value));
    }

    /// Upload a matrix uniform
    pub fn set_mat4(&self, device: &mut dyn GraphicsBackend, name: &str, value: &Mat4) {
        device.set_uniform(self.program, name, UniformValue::Mat4(*value));
    }

    /// Bind a 2D texture to `unit` and point the sampler at it
    pub fn set_texture_2d(&self, device: &mut dyn GraphicsBackend, name: &str, unit: u32, texture: RawHandle) {
        device.bind_texture(unit, TextureTarget::Texture2D, texture);
        device.set_uniform(self.program, name, UniformValue::I32(sampler_unit(unit)));
    }

    /// Bind a 2D texture array to `unit` and point the sampler at it
    pub fn set_texture_2d_array(&self, device: &mut dyn GraphicsBackend, name: &str, unit: u32, texture: RawHandle) {
        device.bind_texture(unit, TextureTarget::Texture2DArray, texture);
        device.set_uniform(self.program, name, UniformValue::I32(sampler_unit(unit)));
    }
}

fn sampler_unit(unit: u32) -> i32 {
    i32::try_from(unit).unwrap_or(i32::MAX)
}

/// Built-in GLSL sources
pub mod sources {
    /// Depth-only vertex stage; picks the light matrix by type, id and face
    pub const DEPTH_VERTEX: &str = r"#version 450 core
layout(location = 0) in vec3 a_position;

struct PointLight { mat4 views[6]; mat4 projection; vec4 pos_bright; vec4 colour_spec; vec4 att_vol; vec4 pad_active_spec; };
struct SpotLight { mat4 view; mat4 projection; vec4 pos_bright; vec4 dir_cut; vec4 colour_spec; vec4 att_outer; vec4 vol_pad_spec_active; };
struct DirectionalLight { mat4 view; mat4 projection; vec4 pos_bright; vec4 dir_spec; vec4 colour_spec; vec4 vol_pad_active; };

layout(std430, binding = 0) readonly buffer PointLights { PointLight point_lights[]; };
layout(std430, binding = 1) readonly buffer SpotLights { SpotLight spot_lights[]; };
layout(std430, binding = 2) readonly buffer DirectionalLights { DirectionalLight directional_lights[]; };

uniform uint u_light_type;
uniform uint u_light_id;
uniform uint u_face;
uniform mat4 u_model;

void main() {
    mat4 light_space;
    if (u_light_type == 1u) {
        light_space = point_lights[u_light_id].projection * point_lights[u_light_id].views[u_face];
    } else if (u_light_type == 0u) {
        light_space = spot_lights[u_light_id].projection * spot_lights[u_light_id].view;
    } else {
        light_space = directional_lights[u_light_id].projection * directional_lights[u_light_id].view;
    }
    gl_Position = light_space * u_model * vec4(a_position, 1.0);
}
";

    /// Depth-only fragment stage
    pub const DEPTH_FRAGMENT: &str = r"#version 450 core
void main() {}
";

    /// Full-screen quad vertex stage
    pub const SCREEN_VERTEX: &str = r"#version 450 core
layout(location = 0) in vec3 a_position;
layout(location = 2) in vec2 a_uv;
out vec2 v_uv;
void main() {
    v_uv = a_uv;
    gl_Position = vec4(a_position.xy, 0.0, 1.0);
}
";

    /// Deferred lighting composite of the camera attachments
    ///
    /// Reads the light records from the same storage bindings as the depth
    /// pass and tests every lit fragment against its light's shadow layer.
    pub const LIGHTING_FRAGMENT: &str = r"#version 450 core
in vec2 v_uv;
out vec4 frag_colour;

struct PointLight { mat4 views[6]; mat4 projection; vec4 pos_bright; vec4 colour_spec; vec4 att_vol; vec4 pad_active_spec; };
struct SpotLight { mat4 view; mat4 projection; vec4 pos_bright; vec4 dir_cut; vec4 colour_spec; vec4 att_outer; vec4 vol_pad_spec_active; };
struct DirectionalLight { mat4 view; mat4 projection; vec4 pos_bright; vec4 dir_spec; vec4 colour_spec; vec4 vol_pad_active; };

layout(std430, binding = 0) readonly buffer PointLights { PointLight point_lights[]; };
layout(std430, binding = 1) readonly buffer SpotLights { SpotLight spot_lights[]; };
layout(std430, binding = 2) readonly buffer DirectionalLights { DirectionalLight directional_lights[]; };

uniform sampler2D u_colour;
uniform sampler2D u_location;
uniform sampler2D u_normals;
uniform sampler2DArray u_point_shadows;
uniform sampler2DArray u_spot_shadows;
uniform sampler2DArray u_directional_shadows;
uniform uint u_point_shadow_mask;
uniform uint u_spot_shadow_mask;
uniform uint u_directional_shadow_mask;
uniform vec3 u_camera_position;

const float AMBIENT = 0.1;
const float SHADOW_BIAS = 0.002;

float lit_fraction(sampler2DArray maps, uint mask, int id, float layer, mat4 light_space, vec3 location) {
    if ((mask & (1u << uint(id))) == 0u) {
        return 1.0;
    }
    vec4 clip = light_space * vec4(location, 1.0);
    vec3 ndc = clip.xyz / clip.w;
    vec3 coords = ndc * 0.5 + 0.5;
    if (coords.z > 1.0 || any(lessThan(coords.xy, vec2(0.0))) || any(greaterThan(coords.xy, vec2(1.0)))) {
        return 1.0;
    }
    float closest = texture(maps, vec3(coords.xy, layer)).r;
    return coords.z - SHADOW_BIAS > closest ? 0.0 : 1.0;
}

uint cube_face(vec3 from_light) {
    vec3 a = abs(from_light);
    if (a.z >= a.x && a.z >= a.y) {
        return from_light.z >= 0.0 ? 0u : 1u;
    }
    if (a.y >= a.x) {
        return from_light.y >= 0.0 ? 2u : 3u;
    }
    return from_light.x >= 0.0 ? 4u : 5u;
}

vec3 shade(vec3 to_light, vec3 normal, vec3 to_camera, vec3 colour, float strength, float exponent) {
    float diffuse = max(dot(normal, to_light), 0.0);
    vec3 halfway = normalize(to_light + to_camera);
    float specular = diffuse > 0.0 ? pow(max(dot(normal, halfway), 0.0), max(exponent, 1.0)) * strength : 0.0;
    return colour * (diffuse + specular);
}

void main() {
    vec3 albedo = texture(u_colour, v_uv).rgb;
    vec3 location = texture(u_location, v_uv).xyz;
    vec3 normal = normalize(texture(u_normals, v_uv).xyz);
    vec3 to_camera = normalize(u_camera_position - location);
    vec3 light = vec3(0.0);

    for (int id = 0; id < point_lights.length(); ++id) {
        PointLight pl = point_lights[id];
        if (floatBitsToUint(pl.pad_active_spec.z) == 0u) {
            continue;
        }
        vec3 from_light = location - pl.pos_bright.xyz;
        float dist = length(from_light);
        float attenuation = 1.0 / max(pl.att_vol.y + pl.att_vol.z * dist + pl.att_vol.x * dist * dist, 1e-4);
        uint face = cube_face(from_light);
        float layer = float(uint(id) * 6u + face);
        float visible = lit_fraction(u_point_shadows, u_point_shadow_mask, id, layer, pl.projection * pl.views[face], location);
        vec3 contribution = shade(-from_light / max(dist, 1e-4), normal, to_camera, pl.colour_spec.rgb, pl.colour_spec.w, pl.pad_active_spec.w);
        light += contribution * pl.pos_bright.w * attenuation * visible;
    }

    for (int id = 0; id < spot_lights.length(); ++id) {
        SpotLight sl = spot_lights[id];
        if (floatBitsToUint(sl.vol_pad_spec_active.w) == 0u) {
            continue;
        }
        vec3 from_light = location - sl.pos_bright.xyz;
        float dist = length(from_light);
        vec3 to_light = -from_light / max(dist, 1e-4);
        float theta = dot(-to_light, normalize(sl.dir_cut.xyz));
        float cone = clamp((theta - sl.att_outer.w) / max(sl.dir_cut.w - sl.att_outer.w, 1e-4), 0.0, 1.0);
        if (cone <= 0.0) {
            continue;
        }
        float attenuation = 1.0 / max(sl.att_outer.y + sl.att_outer.x * dist + sl.att_outer.z * dist * dist, 1e-4);
        float visible = lit_fraction(u_spot_shadows, u_spot_shadow_mask, id, float(id), sl.projection * sl.view, location);
        vec3 contribution = shade(to_light, normal, to_camera, sl.colour_spec.rgb, sl.colour_spec.w, sl.vol_pad_spec_active.z);
        light += contribution * sl.pos_bright.w * attenuation * cone * visible;
    }

    for (int id = 0; id < directional_lights.length(); ++id) {
        DirectionalLight dl = directional_lights[id];
        if (floatBitsToUint(dl.vol_pad_active.w) == 0u) {
            continue;
        }
        vec3 to_light = -normalize(dl.dir_spec.xyz);
        float visible = lit_fraction(u_directional_shadows, u_directional_shadow_mask, id, float(id), dl.projection * dl.view, location);
        vec3 contribution = shade(to_light, normal, to_camera, dl.colour_spec.rgb, dl.colour_spec.w, dl.dir_spec.w);
        light += contribution * dl.pos_bright.w * visible;
    }

    frag_colour = vec4(albedo * (AMBIENT + light), 1.0);
}
";

    /// Copies a texture to the bound framebuffer
    pub const PASSTHROUGH_FRAGMENT: &str = r"#version 450 core
in vec2 v_uv;
out vec4 frag_colour;
uniform sampler2D u_screen;
void main() {
    frag_colour = texture(u_screen, v_uv);
}
";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::HeadlessBackend;

    #[test]
    fn test_new_reports_compile_failure() {
        let mut ctx = RenderContext::new(Box::new(HeadlessBackend::new()));

        let result = Shader::new(&mut ctx, Some("broken"), Some(sources::SCREEN_VERTEX));
        let Err(RenderError::ResourceCreationFailed(detail)) = result else {
            panic!("broken fragment source must not link");
        };
        let logged = ctx.errors.peek().expect("failure stays in the error log");
        assert_eq!(logged.message, detail);
        assert_eq!(ctx.errors.len(), 1);

        let shader = Shader::new(&mut ctx, Some(sources::DEPTH_FRAGMENT), Some(sources::DEPTH_VERTEX))
            .expect("built-in depth program links");
        assert_ne!(shader.program(), INVALID_HANDLE);
    }

    #[test]
    fn test_uniform_setters_reach_device() {
        let mut ctx = RenderContext::new(Box::new(HeadlessBackend::new()));
        let shader = Shader::new(&mut ctx, Some(sources::LIGHTING_FRAGMENT), Some(sources::SCREEN_VERTEX))
            .expect("built-in lighting program links");
        let texture = ctx.create_textures(1)[0];
        ctx.backend.allocate_texture_2d_array(texture, 4, 4, 2, crate::render::backend::TextureFormat::Depth32F);

        shader.set_u32(ctx.backend.as_mut(), "u_light_id", 3);
        shader.set_texture_2d_array(ctx.backend.as_mut(), "u_point_shadows", 5, texture);

        let device = ctx.backend_as::<HeadlessBackend>().expect("headless device");
        assert_eq!(device.uniform(shader.program(), "u_light_id"), Some(UniformValue::U32(3)));
        assert_eq!(device.uniform(shader.program(), "u_point_shadows"), Some(UniformValue::I32(5)));
        assert_eq!(device.bound_texture(5), Some((TextureTarget::Texture2DArray, texture)));
    }

    #[test]
    fn test_depth_shader_matches_storage_bindings() {
        use crate::render::lighting::{DIRECTIONAL_LIGHT_BIND, POINT_LIGHT_BIND, SPOT_LIGHT_BIND};

        for (binding, block) in [
            (POINT_LIGHT_BIND, "PointLights"),
            (SPOT_LIGHT_BIND, "SpotLights"),
            (DIRECTIONAL_LIGHT_BIND, "DirectionalLights"),
        ] {
            let declaration = format!("binding = {binding}) readonly buffer {block}");
            assert!(sources::DEPTH_VERTEX.contains(&declaration), "missing {declaration}");
        }
    }

    #[test]
    fn test_lighting_composite_reads_lights_and_shadows() {
        use crate::render::lighting::{DIRECTIONAL_LIGHT_BIND, POINT_LIGHT_BIND, SPOT_LIGHT_BIND};

        let source = sources::LIGHTING_FRAGMENT;
        for (binding, block, array) in [
            (POINT_LIGHT_BIND, "PointLights", "point_lights[id]"),
            (SPOT_LIGHT_BIND, "SpotLights", "spot_lights[id]"),
            (DIRECTIONAL_LIGHT_BIND, "DirectionalLights", "directional_lights[id]"),
        ] {
            let declaration = format!("binding = {binding}) readonly buffer {block}");
            assert!(source.contains(&declaration), "missing {declaration}");
            assert!(source.contains(array), "{array} is never read");
        }
        for (sampler, layer) in [
            ("u_point_shadows", "layer"),
            ("u_spot_shadows", "float(id)"),
            ("u_directional_shadows", "float(id)"),
        ] {
            let mask = sampler.replace("shadows", "shadow_mask");
            let lookup = format!("lit_fraction({sampler}, {mask}, id, {layer},");
            assert!(source.contains(&lookup), "{sampler} is never sampled");
        }
        assert!(source.contains("uint(id) * 6u + face"));

        let record_layout = |shader: &str| -> Vec<String> {
            shader.lines().filter(|line| line.starts_with("struct ")).map(str::to_owned).collect()
        };
        assert_eq!(record_layout(source), record_layout(sources::DEPTH_VERTEX));
        assert_eq!(record_layout(source).len(), 3);
    }
}
