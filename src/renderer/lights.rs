//! Light Registration
//!
//! The light model is fixed: exactly one directional light (the sun) and a
//! fixed-capacity array of point lights. Registration hands out
//! [`PointLightID`]s; the per-frame uniform packing reads the arrays
//! directly.

use glam::{Vec3, Vec4};

use crate::ids::PointLightID;
use crate::settings::MAX_POINT_LIGHT_COUNT;

/// The one directional light.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels, normalized on registration.
    pub direction: Vec3,
    /// Linear RGB color.
    pub color: Vec3,
    pub brightness: f32,
    pub enabled: bool,
    pub cast_shadows: bool,
    /// Multiplier applied to shadowed fragments in the shading pass.
    pub shadow_darkness: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(0.0, -1.0, 0.3).normalize(),
            color: Vec3::ONE,
            brightness: 1.0,
            enabled: true,
            cast_shadows: true,
            shadow_darkness: 1.0,
        }
    }
}

/// One registered point light.
#[derive(Debug, Clone, PartialEq)]
pub struct PointLightData {
    pub position: Vec3,
    pub color: Vec3,
    pub brightness: f32,
    pub enabled: bool,
    /// Editor display name.
    pub name: String,
}

impl Default for PointLightData {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Vec3::ONE,
            brightness: 500.0,
            enabled: true,
            name: String::new(),
        }
    }
}

/// Owns the directional light and the point light array.
#[derive(Debug, Default)]
pub struct LightRegistry {
    directional: Option<DirectionalLight>,
    point_lights: [Option<PointLightData>; MAX_POINT_LIGHT_COUNT],
}

impl LightRegistry {
    /// Registers the directional light; returns `false` (logged) when one
    /// is already registered.
    pub fn register_directional_light(&mut self, mut light: DirectionalLight) -> bool {
        if self.directional.is_some() {
            log::warn!("A directional light is already registered; ignoring the new one");
            return false;
        }
        light.direction = light.direction.normalize_or_zero();
        self.directional = Some(light);
        true
    }

    /// Removes the directional light.
    pub fn remove_directional_light(&mut self) {
        self.directional = None;
    }

    /// The registered directional light, if any.
    #[must_use]
    pub fn directional_light(&self) -> Option<&DirectionalLight> {
        self.directional.as_ref()
    }

    /// Mutable access for editor tweaks.
    pub fn directional_light_mut(&mut self) -> Option<&mut DirectionalLight> {
        self.directional.as_mut()
    }

    /// Registers a point light into the lowest free slot; returns
    /// `PointLightID::INVALID` (logged) when the array is full.
    pub fn register_point_light(&mut self, light: PointLightData) -> PointLightID {
        for (i, slot) in self.point_lights.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(light);
                return PointLightID::new(i as u32);
            }
        }
        log::warn!("Point light capacity ({MAX_POINT_LIGHT_COUNT}) exhausted");
        PointLightID::INVALID
    }

    /// Overwrites a registered point light; a logged no-op for invalid IDs.
    pub fn update_point_light(&mut self, id: PointLightID, data: PointLightData) {
        match self
            .point_lights
            .get_mut(id.index() as usize)
            .and_then(Option::as_mut)
        {
            Some(slot) => *slot = data,
            None => log::warn!("update_point_light called with invalid ID {id}"),
        }
    }

    /// Removes a point light, freeing its slot.
    pub fn remove_point_light(&mut self, id: PointLightID) {
        if let Some(slot) = self.point_lights.get_mut(id.index() as usize) {
            *slot = None;
        } else {
            log::warn!("remove_point_light called with invalid ID {id}");
        }
    }

    /// Removes every point light.
    pub fn remove_all_point_lights(&mut self) {
        self.point_lights = Default::default();
    }

    /// A registered point light.
    #[must_use]
    pub fn point_light(&self, id: PointLightID) -> Option<&PointLightData> {
        self.point_lights.get(id.index() as usize)?.as_ref()
    }

    /// Number of registered point lights.
    #[must_use]
    pub fn point_light_count(&self) -> usize {
        self.point_lights.iter().filter(|l| l.is_some()).count()
    }

    /// Iterates registered point lights with their IDs.
    pub fn point_lights(&self) -> impl Iterator<Item = (PointLightID, &PointLightData)> {
        self.point_lights
            .iter()
            .enumerate()
            .filter_map(|(i, l)| l.as_ref().map(|l| (PointLightID::new(i as u32), l)))
    }

    /// Packs the directional light for the uniform buffer: direction.xyz,
    /// brightness, color.rgb, enabled, then shadow parameters.
    #[must_use]
    pub fn pack_dir_light(&self) -> [f32; 12] {
        let mut out = [0.0f32; 12];
        if let Some(light) = &self.directional {
            out[0..3].copy_from_slice(&light.direction.to_array());
            out[3] = light.brightness;
            out[4..7].copy_from_slice(&light.color.to_array());
            out[7] = if light.enabled { 1.0 } else { 0.0 };
            out[8] = if light.cast_shadows { 1.0 } else { 0.0 };
            out[9] = light.shadow_darkness;
        }
        out
    }

    /// Packs the point light array: position.xyz, brightness, color.rgb,
    /// enabled, one 48-byte slot per light, disabled slots zeroed.
    #[must_use]
    pub fn pack_point_lights(&self) -> Vec<f32> {
        let mut out = vec![0.0f32; 12 * MAX_POINT_LIGHT_COUNT];
        for (i, slot) in self.point_lights.iter().enumerate() {
            if let Some(light) = slot {
                let base = i * 12;
                out[base..base + 3].copy_from_slice(&light.position.to_array());
                out[base + 3] = light.brightness;
                out[base + 4..base + 7].copy_from_slice(&light.color.to_array());
                out[base + 7] = if light.enabled { 1.0 } else { 0.0 };
            }
        }
        out
    }

    /// Sprite tint for the editor light icons.
    #[must_use]
    pub fn point_light_icon_color(light: &PointLightData) -> Vec4 {
        Vec4::new(light.color.x, light.color.y, light.color.z, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_directional_light_is_rejected() {
        let mut lights = LightRegistry::default();
        assert!(lights.register_directional_light(DirectionalLight::default()));
        assert!(!lights.register_directional_light(DirectionalLight::default()));
    }

    #[test]
    fn point_light_ids_recycle_lowest_slot() {
        let mut lights = LightRegistry::default();
        let a = lights.register_point_light(PointLightData::default());
        let b = lights.register_point_light(PointLightData::default());
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);

        lights.remove_point_light(a);
        let c = lights.register_point_light(PointLightData::default());
        assert_eq!(c.index(), 0);
    }

    #[test]
    fn registry_caps_at_fixed_capacity() {
        let mut lights = LightRegistry::default();
        for _ in 0..MAX_POINT_LIGHT_COUNT {
            assert!(lights.register_point_light(PointLightData::default()).is_valid());
        }
        assert!(!lights.register_point_light(PointLightData::default()).is_valid());
    }
}
