//! Per-kind shadow slot bookkeeping

use crate::foundation::collections::FixedArena;
use crate::render::backend::RawHandle;
use crate::render::lighting::{LightDirection, LightType, MAX_LIGHTS_PER_KIND};

/// Shadow state of one light kind
///
/// Slot `i` belongs to the light registered under id `i`. A slot keeps its
/// framebuffer after being cleared so the next `add_shadow` reuses it.
#[derive(Debug)]
pub(crate) struct ShadowSlots {
    pub(crate) kind: LightType,
    pub(crate) resolution: u32,
    pub(crate) map_id: RawHandle,
    pub(crate) frame_buffers: FixedArena<RawHandle, MAX_LIGHTS_PER_KIND>,
}

impl ShadowSlots {
    pub(crate) fn new(kind: LightType, resolution: u32, map_id: RawHandle) -> Self {
        Self {
            kind,
            resolution,
            map_id,
            frame_buffers: FixedArena::new(),
        }
    }

    /// Depth layers owned by one light
    pub(crate) const fn layers_per_light(&self) -> u32 {
        match self.kind {
            LightType::PointLight => 6,
            LightType::SpotLight | LightType::DirectionalLight => 1,
        }
    }

    /// Depth layers of the whole texture array
    pub(crate) const fn total_layers(&self) -> u32 {
        self.layers_per_light() * MAX_LIGHTS_PER_KIND as u32
    }

    /// Layer rendered for a light and face; faces only matter for point lights
    pub(crate) fn layer(&self, light_id: usize, face: LightDirection) -> u32 {
        let base = u32::try_from(light_id).unwrap_or(u32::MAX) * self.layers_per_light();
        match self.kind {
            LightType::PointLight => base + face.index() as u32,
            LightType::SpotLight | LightType::DirectionalLight => base,
        }
    }

    /// Every layer owned by a light
    pub(crate) fn light_layers(&self, light_id: usize) -> impl Iterator<Item = u32> {
        let first = self.layer(light_id, LightDirection::Front);
        first..first + self.layers_per_light()
    }
}
