//! # Lighting
//!
//! Point, spot and directional light models with their shadow matrices,
//! fixed-capacity registries and the `std430` records uploaded to the
//! lighting shaders.

mod gpu_data;
mod light;
mod registry;

pub use gpu_data::{
    DirectionalLightGpu, PointLightGpu, SpotLightGpu, DIRECTIONAL_LIGHT_BIND, POINT_LIGHT_BIND, SPOT_LIGHT_BIND,
};
pub use light::{
    Attenuation, DirectionalLight, LightDirection, LightType, PointLight, ShadowCaster, SpotLight, SHADOW_NEAR_PLANE,
    UNBOUNDED_LIGHT_RANGE,
};
pub use registry::{LightRegistry, MAX_LIGHTS_PER_KIND};
