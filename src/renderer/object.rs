//! Render Objects
//!
//! A render object is one drawable instance: a material, a vertex stream,
//! an optional index list and per-object draw state. The owning game
//! object is referenced by an opaque handle only — the scene side holds the
//! `RenderID`, never a pointer, and the renderer holds the handle, breaking
//! the cycle.

use glam::Mat4;

use crate::backend::cmd::{CullFace, DepthTestFunc, TopologyMode};
use crate::ids::{MaterialID, RenderID};
use crate::vertex::VertexBufferData;

/// Everything needed to create a render object.
#[derive(Debug, Clone, Default)]
pub struct RenderObjectCreateInfo {
    pub material_id: MaterialID,
    pub vertex_buffer_data: VertexBufferData,
    /// Triangle indices; `None` draws non-indexed.
    pub indices: Option<Vec<u32>>,
    /// Opaque handle of the owning game object.
    pub owner: u64,
    pub visible: bool,
    pub visible_in_scene_explorer: bool,
    pub cull_face: CullFace,
    pub depth_test_func: DepthTestFunc,
    pub depth_write_enable: bool,
    pub editor_object: bool,
    pub topology: TopologyMode,
    /// Initial world transform.
    pub transform: Mat4,
}

impl RenderObjectCreateInfo {
    /// Create info with the common defaults: visible, back-face culled,
    /// reverse-Z tested, depth-writing triangles.
    #[must_use]
    pub fn new(material_id: MaterialID, vertex_buffer_data: VertexBufferData) -> Self {
        Self {
            material_id,
            vertex_buffer_data,
            indices: None,
            owner: 0,
            visible: true,
            visible_in_scene_explorer: true,
            cull_face: CullFace::Back,
            depth_test_func: DepthTestFunc::GEqual,
            depth_write_enable: true,
            editor_object: false,
            topology: TopologyMode::TriangleList,
            transform: Mat4::IDENTITY,
        }
    }
}

/// One registered render object.
#[derive(Debug, Clone)]
pub struct RenderObject {
    pub material_id: MaterialID,
    pub vertex_buffer_data: VertexBufferData,
    pub indices: Option<Vec<u32>>,
    pub owner: u64,
    pub visible: bool,
    pub visible_in_scene_explorer: bool,
    pub cull_face: CullFace,
    pub depth_test_func: DepthTestFunc,
    pub depth_write_enable: bool,
    pub editor_object: bool,
    pub topology: TopologyMode,
    pub transform: Mat4,
    /// Byte offset into the material's dynamic uniform buffer, assigned at
    /// batch time.
    pub dynamic_offset: u32,
}

impl From<RenderObjectCreateInfo> for RenderObject {
    fn from(info: RenderObjectCreateInfo) -> Self {
        Self {
            material_id: info.material_id,
            vertex_buffer_data: info.vertex_buffer_data,
            indices: info.indices,
            owner: info.owner,
            visible: info.visible,
            visible_in_scene_explorer: info.visible_in_scene_explorer,
            cull_face: info.cull_face,
            depth_test_func: info.depth_test_func,
            depth_write_enable: info.depth_write_enable,
            editor_object: info.editor_object,
            topology: info.topology,
            transform: info.transform,
            dynamic_offset: 0,
        }
    }
}

/// Sparse render object table with lowest-free-ID allocation.
#[derive(Debug, Default)]
pub struct ObjectTable {
    objects: Vec<Option<RenderObject>>,
}

impl ObjectTable {
    /// Lowest render ID not currently in use.
    #[must_use]
    pub fn next_available_render_id(&self) -> RenderID {
        for (i, slot) in self.objects.iter().enumerate() {
            if slot.is_none() {
                return RenderID::new(i as u32);
            }
        }
        RenderID::new(self.objects.len() as u32)
    }

    /// Inserts an object at `id`, growing the table as needed.
    pub fn insert(&mut self, id: RenderID, object: RenderObject) {
        let index = id.index() as usize;
        if index >= self.objects.len() {
            self.objects.resize_with(index + 1, || None);
        }
        self.objects[index] = Some(object);
    }

    /// Removes an object, freeing its slot for reuse.
    pub fn remove(&mut self, id: RenderID) -> Option<RenderObject> {
        self.objects.get_mut(id.index() as usize)?.take()
    }

    /// Object by ID.
    #[must_use]
    pub fn get(&self, id: RenderID) -> Option<&RenderObject> {
        if !id.is_valid() {
            return None;
        }
        self.objects.get(id.index() as usize)?.as_ref()
    }

    /// Mutable object by ID.
    pub fn get_mut(&mut self, id: RenderID) -> Option<&mut RenderObject> {
        if !id.is_valid() {
            return None;
        }
        self.objects.get_mut(id.index() as usize)?.as_mut()
    }

    /// Number of live objects.
    #[must_use]
    pub fn count(&self) -> usize {
        self.objects.iter().filter(|o| o.is_some()).count()
    }

    /// Table capacity (live + free slots).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.objects.len()
    }

    /// Iterates live objects with their IDs.
    pub fn iter(&self) -> impl Iterator<Item = (RenderID, &RenderObject)> {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.as_ref().map(|o| (RenderID::new(i as u32), o)))
    }

    /// Mutable iteration over live objects.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (RenderID, &mut RenderObject)> {
        self.objects
            .iter_mut()
            .enumerate()
            .filter_map(|(i, o)| o.as_mut().map(|o| (RenderID::new(i as u32), o)))
    }

    /// Drops every object (scene teardown).
    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object() -> RenderObject {
        RenderObjectCreateInfo::new(MaterialID::new(0), VertexBufferData::default()).into()
    }

    #[test]
    fn destroyed_slot_is_reused() {
        let mut table = ObjectTable::default();
        let a = table.next_available_render_id();
        table.insert(a, object());
        let b = table.next_available_render_id();
        table.insert(b, object());
        assert_eq!((a.index(), b.index()), (0, 1));

        table.remove(a);
        assert_eq!(table.next_available_render_id(), a);
        assert_eq!(table.count(), 1);
        assert_eq!(table.capacity(), 2);
    }
}
