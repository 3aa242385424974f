//! Fixed-capacity light storage
//!
//! Lights are registered by value under a small integer id that doubles as
//! their shadow slot and storage-buffer index.

use bytemuck::Zeroable;

use crate::foundation::collections::FixedArena;

/// Lights of one kind that can be registered at the same time
pub const MAX_LIGHTS_PER_KIND: usize = 16;

/// Registry of one light kind
#[derive(Debug, Clone)]
pub struct LightRegistry<L> {
    lights: FixedArena<L, MAX_LIGHTS_PER_KIND>,
}

impl<L> LightRegistry<L> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { lights: FixedArena::new() }
    }

    /// Register or overwrite the light at `id`
    ///
    /// Returns `false` when `id` is beyond capacity; the light is dropped.
    pub fn insert(&mut self, id: usize, light: L) -> bool {
        match self.lights.insert(id, light) {
            Ok(previous) => {
                if previous.is_some() {
                    log::debug!("Light {id} overwritten");
                }
                true
            }
            Err(_) => {
                log::warn!("Light id {id} exceeds the {MAX_LIGHTS_PER_KIND} light capacity; ignored");
                false
            }
        }
    }

    /// Registered light at `id`, active or not
    pub fn get(&self, id: usize) -> Option<&L> {
        self.lights.get(id)
    }

    /// Mutable access to the light at `id`
    pub fn get_mut(&mut self, id: usize) -> Option<&mut L> {
        self.lights.get_mut(id)
    }

    /// Whether the light at `id` is registered and active
    pub const fn is_active(&self, id: usize) -> bool {
        self.lights.is_active(id)
    }

    /// Deactivate the light at `id`; it stays stored until overwritten
    pub fn deactivate(&mut self, id: usize) -> bool {
        self.lights.deactivate(id)
    }

    /// Reactivate a stored light
    pub fn activate(&mut self, id: usize) -> bool {
        self.lights.activate(id)
    }

    /// Ids of the active lights in ascending order
    pub fn active_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.lights.active_indices()
    }

    /// Active lights with their ids
    pub fn iter_active(&self) -> impl Iterator<Item = (usize, &L)> + '_ {
        self.lights.iter_active()
    }

    /// Number of active lights
    pub const fn active_count(&self) -> usize {
        self.lights.active_count()
    }

    /// One GPU record per slot, zeroed where no light is stored
    ///
    /// `make` receives the light and whether its slot is active.
    pub fn gpu_records<G: Zeroable>(&self, make: impl Fn(&L, bool) -> G) -> Vec<G> {
        (0..MAX_LIGHTS_PER_KIND)
            .map(|id| {
                self.lights
                    .get(id)
                    .map_or_else(G::zeroed, |light| make(light, self.lights.is_active(id)))
            })
            .collect()
    }
}

impl<L> Default for LightRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::lighting::{PointLight, PointLightGpu};

    #[test]
    fn test_register_and_deactivate() {
        let mut registry = LightRegistry::new();
        assert!(registry.insert(2, PointLight::new(Vec3::x())));
        assert!(registry.insert(7, PointLight::new(Vec3::y())));
        assert!(!registry.insert(MAX_LIGHTS_PER_KIND, PointLight::default()));

        assert_eq!(registry.active_ids().collect::<Vec<_>>(), vec![2, 7]);
        assert!(registry.deactivate(2));
        assert_eq!(registry.active_count(), 1);
        assert!(registry.get(2).is_some());
        assert!(registry.activate(2));
        assert!(registry.is_active(2));
    }

    #[test]
    fn test_gpu_records_cover_every_slot() {
        let mut registry = LightRegistry::new();
        registry.insert(1, PointLight::new(Vec3::new(5.0, 0.0, 0.0)));
        registry.insert(4, PointLight::default());
        registry.deactivate(4);

        let records = registry.gpu_records(PointLightGpu::new);
        assert_eq!(records.len(), MAX_LIGHTS_PER_KIND);
        assert_eq!(records[0].active, 0);
        assert_eq!(records[1].active, 1);
        assert_eq!(records[1].position, [5.0, 0.0, 0.0]);
        assert_eq!(records[4].active, 0);
        assert_ne!(records[4].brightness, 0.0);
    }
}
