//! Shadow demo application
//!
//! Opens a GLFW window, builds a render core on the OpenGL device and lights
//! a cube on a floor with one light of each kind. WASD/QE fly, right mouse
//! drag looks around, the wheel zooms and Escape quits. The entity under the
//! cursor is logged whenever it changes.
//!
//! Pass a `.toml` or `.ron` file as the first argument to override the
//! render core configuration.

use jam_engine::foundation::logging;
use jam_engine::prelude::*;
use jam_engine::render::shader::sources;
use jam_engine::render::window::{forward_event, Key, WindowEvent};
use jam_engine::render::MeshId;

/// Entity id the cube writes into the picker attachment
const CUBE_ENTITY: u32 = 7;

/// Entity id of the floor
const FLOOR_ENTITY: u32 = 1;

const GEOMETRY_VERTEX: &str = r"#version 450 core
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec3 a_normal;
uniform mat4 u_model;
uniform mat4 u_view;
uniform mat4 u_projection;
out vec3 v_world;
out vec3 v_normal;
void main() {
    vec4 world = u_model * vec4(a_position, 1.0);
    v_world = world.xyz;
    v_normal = mat3(u_model) * a_normal;
    gl_Position = u_projection * u_view * world;
}
";

const GEOMETRY_FRAGMENT: &str = r"#version 450 core
in vec3 v_world;
in vec3 v_normal;
uniform uint u_entity;
layout(location = 0) out vec4 o_colour;
layout(location = 1) out vec4 o_location;
layout(location = 2) out vec4 o_normal;
layout(location = 3) out uint o_picker;
void main() {
    o_colour = vec4(0.8, 0.7, 0.5, 1.0);
    o_location = vec4(v_world, 1.0);
    o_normal = vec4(normalize(v_normal), 0.0);
    o_picker = u_entity;
}
";

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Window(#[from] WindowError),
}

struct Scene {
    cube: MeshId,
    material: Shader,
}

impl Scene {
    fn objects() -> [(u32, Mat4); 2] {
        let floor = Mat4::new_translation(&Vec3::new(0.0, -1.5, 0.0))
            * Mat4::new_nonuniform_scaling(&Vec3::new(20.0, 0.2, 20.0));
        [(CUBE_ENTITY, Mat4::identity()), (FLOOR_ENTITY, floor)]
    }

    fn draw(&self, ctx: &mut RenderContext, meshes: &dyn MeshProvider, pass: &FramePass) {
        let Some(cube) = meshes.get_mesh(self.cube) else {
            log::warn!("Cube mesh missing");
            return;
        };
        for (entity, model) in Self::objects() {
            match pass {
                FramePass::Shadow(shadow) => {
                    shadow.program.set_mat4(ctx.backend.as_mut(), "u_model", &model);
                }
                FramePass::Geometry(geometry) => {
                    let device = ctx.backend.as_mut();
                    self.material.use_program(device);
                    self.material.set_mat4(device, "u_model", &model);
                    self.material.set_mat4(device, "u_view", &geometry.view);
                    self.material.set_mat4(device, "u_projection", &geometry.projection);
                    self.material.set_u32(device, "u_entity", entity);
                }
            }
            cube.render(ctx, &DrawConfig::default());
        }
    }
}

fn run() -> Result<(), DemoError> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading render configuration from {path}");
            RenderCoreConfig::load_from_file(path)?
        }
        None => RenderCoreConfig::default(),
    };

    let [width, height] = config.camera.win_size;
    let mut window = GlWindow::new("JAM shadow demo", width as u32, height as u32)?;
    let (fb_width, fb_height) = window.framebuffer_size();
    config.camera.win_size = [fb_width.max(1) as f32, fb_height.max(1) as f32];

    let mut meshes = MeshLibrary::new();
    let mut core = RenderCore::new(Box::new(window.create_backend()), &config, &mut meshes)?;

    let cube = meshes
        .upload_mesh(CustomMesh::cube())
        .ok_or_else(|| RenderError::ResourceCreationFailed("cube mesh".to_owned()))?;
    meshes.upload_all(core.context_mut())?;
    let material = Shader::new(core.context_mut(), Some(GEOMETRY_FRAGMENT), Some(GEOMETRY_VERTEX))?;
    let passthrough = Shader::new(core.context_mut(), Some(sources::PASSTHROUGH_FRAGMENT), Some(sources::SCREEN_VERTEX))?;
    core.camera_mut().set_post_process_material(Some(passthrough));

    core.add_point_light(0, PointLight::new(Vec3::new(0.0, 3.0, 2.0)));
    core.add_spot_light(0, SpotLight::new(Vec3::new(3.0, 4.0, 3.0), Vec3::new(-1.0, -1.0, -1.0)));
    core.add_directional_light(0, DirectionalLight::new(Vec3::new(0.0, 20.0, 0.0), Vec3::new(0.2, -1.0, 0.1)));

    let scene = Scene { cube, material };
    let mut input = InputManager::new();
    let mut last_time = window.time();
    let mut picked = INVALID_ENTITY;

    while !window.should_close() {
        input.update();
        for event in window.poll_events() {
            match event {
                WindowEvent::Key(Key::Escape, _, _, _) => window.set_should_close(true),
                WindowEvent::FramebufferSize(w, h) if w > 0 && h > 0 => {
                    core.resize(Vec2::new(w as f32, h as f32))?;
                }
                _ => {}
            }
            forward_event(&mut input, &event);
        }

        let now = window.time();
        let dt = (now - last_time) as f32;
        last_time = now;

        let report = core.render_frame(dt, &input, &meshes, |ctx, meshes, pass| scene.draw(ctx, meshes, pass))?;
        if report.selected_entity != picked {
            picked = report.selected_entity;
            if picked == INVALID_ENTITY {
                log::info!("Nothing under the cursor");
            } else {
                log::info!("Picked entity {picked} ({} shadow passes)", report.shadow_passes);
            }
        }
        window.swap_buffers();
    }

    core.free();
    Ok(())
}

fn main() {
    logging::init(log::LevelFilter::Info);

    log::info!("Starting JAM shadow demo");
    if let Err(err) = run() {
        log::error!("Shadow demo failed: {err}");
        std::process::exit(1);
    }
    log::info!("Shadow demo finished");
}
