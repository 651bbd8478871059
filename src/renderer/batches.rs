//! Render Object Batching
//!
//! When the render object set changes (create/destroy, visibility or
//! material edits), objects are rebatched into four buckets: deferred and
//! forward batches — one batch per material — for scene objects, and
//! depth-aware / depth-unaware lists for editor objects. Batch order is
//! material registration order, so draw order is stable between frames.
//!
//! Rebatching also assigns every object its offset into its material's
//! dynamic uniform buffer.

use crate::ids::{MaterialID, RenderID};
use crate::resources::ResourceManager;

use super::object::ObjectTable;
use super::uniforms::align_dynamic;

/// All visible objects sharing one material.
#[derive(Debug, Clone, Default)]
pub struct MaterialBatch {
    pub material: MaterialID,
    pub objects: Vec<RenderID>,
}

/// The four draw buckets.
#[derive(Debug, Default)]
pub struct Batches {
    /// Scene objects whose shader is deferred, one batch per material.
    pub deferred: Vec<MaterialBatch>,
    /// Remaining scene objects, one batch per material.
    pub forward: Vec<MaterialBatch>,
    /// Editor objects that depth-test against the scene.
    pub depth_aware_editor: Vec<RenderID>,
    /// Editor objects drawn over a cleared depth buffer.
    pub depth_unaware_editor: Vec<RenderID>,
    /// Batched object count per material; the frame builder sizes each
    /// material's batched dynamic-buffer region from this.
    dynamic_counts: Vec<(MaterialID, u32)>,
    dirty: bool,
}

impl Batches {
    /// Marks the cache dirty; the next [`rebatch_if_dirty`](Self::rebatch_if_dirty)
    /// rebuilds it.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether a rebuild is pending.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of batched objects using `material`, as of the last rebatch.
    #[must_use]
    pub fn batched_object_count(&self, material: MaterialID) -> u32 {
        self.dynamic_counts
            .iter()
            .find(|(m, _)| *m == material)
            .map_or(0, |(_, count)| *count)
    }

    /// Rebuilds the buckets when dirty. Returns `true` when a rebuild
    /// happened.
    pub fn rebatch_if_dirty(
        &mut self,
        objects: &mut ObjectTable,
        resources: &ResourceManager,
    ) -> bool {
        if !self.dirty {
            return false;
        }
        self.rebatch(objects, resources);
        true
    }

    fn rebatch(&mut self, objects: &mut ObjectTable, resources: &ResourceManager) {
        self.deferred.clear();
        self.forward.clear();
        self.depth_aware_editor.clear();
        self.depth_unaware_editor.clear();
        self.dynamic_counts.clear();

        // Per-object dynamic buffer offsets restart each rebatch.
        let mut per_material_counts: Vec<(MaterialID, u32)> = Vec::new();

        for (id, object) in objects.iter_mut() {
            if !object.visible {
                continue;
            }

            let Some(material) = resources.material(object.material_id) else {
                log::warn!("Render object {id} references invalid material; skipping");
                continue;
            };
            let Some(shader) = resources.shader(material.shader_id) else {
                log::warn!(
                    "Material {} references invalid shader; skipping object {id}",
                    material.name()
                );
                continue;
            };

            // Dynamic offset: index within this material times its stride.
            let stride = align_dynamic(shader.dynamic_buffer_uniforms.calculate_size());
            let slot = match per_material_counts
                .iter()
                .position(|(m, _)| *m == object.material_id)
            {
                Some(i) => i,
                None => {
                    per_material_counts.push((object.material_id, 0));
                    per_material_counts.len() - 1
                }
            };
            object.dynamic_offset = per_material_counts[slot].1 * stride;
            per_material_counts[slot].1 += 1;

            if object.editor_object {
                if object.depth_write_enable {
                    self.depth_aware_editor.push(id);
                } else {
                    self.depth_unaware_editor.push(id);
                }
                continue;
            }

            let bucket = if shader.deferred {
                &mut self.deferred
            } else {
                &mut self.forward
            };
            match bucket.iter().position(|b| b.material == object.material_id) {
                Some(i) => bucket[i].objects.push(id),
                None => bucket.push(MaterialBatch {
                    material: object.material_id,
                    objects: vec![id],
                }),
            }
        }

        self.dynamic_counts = per_material_counts;
        self.dirty = false;
        log::debug!(
            "Rebatched render objects: {} deferred batches, {} forward batches, {}+{} editor objects",
            self.deferred.len(),
            self.forward.len(),
            self.depth_aware_editor.len(),
            self.depth_unaware_editor.len()
        );
    }
}
