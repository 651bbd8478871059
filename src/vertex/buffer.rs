//! Interleaved vertex buffer storage.

use glam::{Vec2, Vec3, Vec4};

use super::attributes::{
    ATTRIBUTE_ORDER, VertexAttributes, attribute_default, attribute_words,
};

/// Per-attribute source arrays used to build an interleaved buffer.
///
/// Only the arrays matching `attributes` are consumed; the vertex count is
/// taken from the longest provided array. Shorter arrays are padded with the
/// attribute's default value.
#[derive(Debug, Clone, Default)]
pub struct VertexBufferDataCreateInfo {
    /// Attributes to interleave, in declaration order.
    pub attributes: VertexAttributes,
    /// `POSITION`
    pub positions_3: Vec<Vec3>,
    /// `POSITION2`
    pub positions_2: Vec<Vec2>,
    /// `POSITION4`
    pub positions_4: Vec<Vec4>,
    /// `VELOCITY`
    pub velocities: Vec<Vec3>,
    /// `UV`
    pub tex_coords: Vec<Vec2>,
    /// `COLOR32` (packed `R8G8B8A8_UNORM`)
    pub colors_packed: Vec<u32>,
    /// `COLOR128`
    pub colors: Vec<Vec4>,
    /// `TANGENT`
    pub tangents: Vec<Vec3>,
    /// `NORMAL`
    pub normals: Vec<Vec3>,
    /// `EXTRA_VEC4`
    pub extra_vec4s: Vec<Vec4>,
    /// `EXTRA_INT`
    pub extra_ints: Vec<i32>,
}

impl VertexBufferDataCreateInfo {
    fn vertex_count(&self) -> usize {
        [
            self.positions_3.len(),
            self.positions_2.len(),
            self.positions_4.len(),
            self.velocities.len(),
            self.tex_coords.len(),
            self.colors_packed.len(),
            self.colors.len(),
            self.tangents.len(),
            self.normals.len(),
            self.extra_vec4s.len(),
            self.extra_ints.len(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Words for `attribute` of vertex `i`, falling back to the attribute
    /// default when the source array is absent or short.
    fn attribute_value(&self, attribute: VertexAttributes, i: usize) -> [f32; 4] {
        fn vec3_at(v: &[Vec3], i: usize, attr: VertexAttributes) -> [f32; 4] {
            v.get(i).map_or(attribute_default(attr), |p| [p.x, p.y, p.z, 0.0])
        }
        fn vec2_at(v: &[Vec2], i: usize, attr: VertexAttributes) -> [f32; 4] {
            v.get(i).map_or(attribute_default(attr), |p| [p.x, p.y, 0.0, 0.0])
        }
        fn vec4_at(v: &[Vec4], i: usize, attr: VertexAttributes) -> [f32; 4] {
            v.get(i).map_or(attribute_default(attr), |p| [p.x, p.y, p.z, p.w])
        }

        if attribute == VertexAttributes::POSITION {
            vec3_at(&self.positions_3, i, attribute)
        } else if attribute == VertexAttributes::POSITION2 {
            vec2_at(&self.positions_2, i, attribute)
        } else if attribute == VertexAttributes::POSITION4 {
            vec4_at(&self.positions_4, i, attribute)
        } else if attribute == VertexAttributes::VELOCITY {
            vec3_at(&self.velocities, i, attribute)
        } else if attribute == VertexAttributes::UV {
            vec2_at(&self.tex_coords, i, attribute)
        } else if attribute == VertexAttributes::COLOR32 {
            self.colors_packed
                .get(i)
                .map_or(attribute_default(attribute), |c| {
                    [f32::from_bits(*c), 0.0, 0.0, 0.0]
                })
        } else if attribute == VertexAttributes::COLOR128 {
            vec4_at(&self.colors, i, attribute)
        } else if attribute == VertexAttributes::TANGENT {
            vec3_at(&self.tangents, i, attribute)
        } else if attribute == VertexAttributes::NORMAL {
            vec3_at(&self.normals, i, attribute)
        } else if attribute == VertexAttributes::EXTRA_VEC4 {
            vec4_at(&self.extra_vec4s, i, attribute)
        } else if attribute == VertexAttributes::EXTRA_INT {
            self.extra_ints
                .get(i)
                .map_or(attribute_default(attribute), |x| {
                    [f32::from_bits(*x as u32), 0.0, 0.0, 0.0]
                })
        } else {
            [0.0; 4]
        }
    }
}

/// An interleaved, typed-erased vertex stream.
///
/// The backing store is a `Vec<f32>`; packed attributes (`COLOR32`,
/// `EXTRA_INT`) occupy one word each and are reinterpreted by the backend's
/// vertex layout, not by this type.
#[derive(Debug, Clone, Default)]
pub struct VertexBufferData {
    attributes: VertexAttributes,
    vertex_count: usize,
    buffer: Vec<f32>,
    dynamic: bool,
}

impl VertexBufferData {
    /// Builds a static interleaved buffer from per-attribute arrays.
    #[must_use]
    pub fn initialize(create_info: &VertexBufferDataCreateInfo) -> Self {
        let vertex_count = create_info.vertex_count();
        let stride_words = create_info.attributes.stride_words();
        let mut buffer = Vec::with_capacity(vertex_count * stride_words);

        for i in 0..vertex_count {
            for attribute in ATTRIBUTE_ORDER {
                if !create_info.attributes.contains(attribute) {
                    continue;
                }
                let value = create_info.attribute_value(attribute, i);
                buffer.extend_from_slice(&value[..attribute_words(attribute)]);
            }
        }

        Self {
            attributes: create_info.attributes,
            vertex_count,
            buffer,
            dynamic: false,
        }
    }

    /// Pre-allocates a dynamic buffer for up to `max_vertex_count` vertices.
    ///
    /// The logical vertex count starts at zero; [`update_data`](Self::update_data)
    /// rewrites the contents each frame.
    #[must_use]
    pub fn initialize_dynamic(attributes: VertexAttributes, max_vertex_count: usize) -> Self {
        let stride_words = attributes.stride_words();
        Self {
            attributes,
            vertex_count: 0,
            buffer: Vec::with_capacity(max_vertex_count * stride_words),
            dynamic: true,
        }
    }

    /// Rewrites the buffer contents in place.
    ///
    /// `data` must be interleaved with this buffer's attribute layout; the
    /// backing allocation grows when `data` exceeds the reserved maximum and
    /// is never shrunk.
    pub fn update_data(&mut self, data: &[f32]) {
        let stride_words = self.attributes.stride_words().max(1);
        debug_assert_eq!(data.len() % stride_words, 0);
        self.buffer.clear();
        self.buffer.extend_from_slice(data);
        self.vertex_count = data.len() / stride_words;
    }

    /// Copies this stream into `dst` using the layout of `using_attributes`.
    ///
    /// Attributes present in both layouts are copied through; attributes the
    /// destination requires but the source lacks are filled with their
    /// defaults (position → 0, UV → 0, color → white, normal → +Y,
    /// tangent → +X). Writes exactly `vertex_count * using_attributes.stride()`
    /// bytes and leaves the source untouched.
    ///
    /// Returns the number of bytes written.
    pub fn copy_into(&self, dst: &mut Vec<f32>, using_attributes: VertexAttributes) -> usize {
        let dst_stride = using_attributes.stride_words();
        let src_stride = self.attributes.stride_words();
        dst.clear();
        dst.reserve(self.vertex_count * dst_stride);

        for i in 0..self.vertex_count {
            let src_vertex = &self.buffer[i * src_stride..(i + 1) * src_stride];
            for attribute in ATTRIBUTE_ORDER {
                if !using_attributes.contains(attribute) {
                    continue;
                }
                let words = attribute_words(attribute);
                if let Some(offset) = self.attributes.offset_words(attribute) {
                    dst.extend_from_slice(&src_vertex[offset..offset + words]);
                } else {
                    dst.extend_from_slice(&attribute_default(attribute)[..words]);
                }
            }
        }

        self.vertex_count * dst_stride * 4
    }

    /// The attribute layout of this stream.
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> VertexAttributes {
        self.attributes
    }

    /// Current logical vertex count.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Stride of one vertex in bytes.
    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.attributes.stride()
    }

    /// Size of the used portion of the buffer in bytes.
    #[inline]
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer.len() * 4
    }

    /// Whether this stream is rewritten per frame.
    #[inline]
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// The interleaved contents.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.buffer
    }

    /// The interleaved contents as raw bytes, for backend upload.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_create_info() -> VertexBufferDataCreateInfo {
        VertexBufferDataCreateInfo {
            attributes: VertexAttributes::POSITION | VertexAttributes::UV,
            positions_3: vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ],
            tex_coords: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn initialize_interleaves_in_declaration_order() {
        let data = VertexBufferData::initialize(&quad_create_info());
        assert_eq!(data.vertex_count(), 4);
        assert_eq!(data.stride(), 5 * 4);
        // Second vertex: position (1,-1,0) then uv (1,0)
        assert_eq!(&data.data()[5..10], &[1.0, -1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn copy_into_fills_missing_attributes_with_defaults() {
        let src = VertexBufferData::initialize(&quad_create_info());
        let mut dst = Vec::new();
        let wanted = VertexAttributes::POSITION
            | VertexAttributes::COLOR128
            | VertexAttributes::NORMAL;
        let written = src.copy_into(&mut dst, wanted);

        assert_eq!(written, 4 * wanted.stride());
        assert_eq!(dst.len() * 4, written);
        // First vertex: position copied, color defaults to white, normal to +Y
        assert_eq!(&dst[0..3], &[-1.0, -1.0, 0.0]);
        assert_eq!(&dst[3..7], &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(&dst[7..10], &[0.0, 1.0, 0.0]);
        // Source untouched
        assert_eq!(src.vertex_count(), 4);
        assert_eq!(&src.data()[0..3], &[-1.0, -1.0, 0.0]);
    }

    #[test]
    fn update_data_grows_and_tracks_count() {
        let mut data = VertexBufferData::initialize_dynamic(
            VertexAttributes::POSITION | VertexAttributes::COLOR128,
            2,
        );
        assert_eq!(data.vertex_count(), 0);

        let three_vertices = vec![0.0f32; 3 * 7];
        data.update_data(&three_vertices);
        assert_eq!(data.vertex_count(), 3);
        assert!(data.is_dynamic());
    }
}
