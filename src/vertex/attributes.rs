//! Vertex attribute bitmask and layout math.

use bitflags::bitflags;

bitflags! {
    /// Set of attributes present in an interleaved vertex stream.
    ///
    /// Attribute order in the interleaved buffer is the declaration order
    /// below; the stride of a stream is the sum of the sizes of its set
    /// attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VertexAttributes: u32 {
        /// `vec3` object-space position.
        const POSITION   = 1 << 0;
        /// `vec2` position, used by screen-space geometry.
        const POSITION2  = 1 << 1;
        /// `vec4` position, used by shaders that carry w explicitly.
        const POSITION4  = 1 << 2;
        /// `vec3` per-vertex velocity (TAA reprojection of dynamic meshes).
        const VELOCITY   = 1 << 3;
        /// `vec2` texture coordinate.
        const UV         = 1 << 4;
        /// Packed `R8G8B8A8_UNORM` color, one 32-bit word.
        const COLOR32    = 1 << 5;
        /// `vec4` float color.
        const COLOR128   = 1 << 6;
        /// `vec3` tangent.
        const TANGENT    = 1 << 7;
        /// `vec3` normal.
        const NORMAL     = 1 << 8;
        /// `vec4` of auxiliary shader data (glyph metrics, billboard data).
        const EXTRA_VEC4 = 1 << 9;
        /// One word of auxiliary integer data (glyph channel index).
        const EXTRA_INT  = 1 << 10;
    }
}

/// All attributes, in interleave order.
pub(crate) const ATTRIBUTE_ORDER: [VertexAttributes; 11] = [
    VertexAttributes::POSITION,
    VertexAttributes::POSITION2,
    VertexAttributes::POSITION4,
    VertexAttributes::VELOCITY,
    VertexAttributes::UV,
    VertexAttributes::COLOR32,
    VertexAttributes::COLOR128,
    VertexAttributes::TANGENT,
    VertexAttributes::NORMAL,
    VertexAttributes::EXTRA_VEC4,
    VertexAttributes::EXTRA_INT,
];

/// Word counts parallel to [`ATTRIBUTE_ORDER`].
const ATTRIBUTE_WORDS: [usize; 11] = [3, 2, 4, 3, 2, 1, 4, 3, 3, 4, 1];

/// GLSL attribute names parallel to [`ATTRIBUTE_ORDER`], matching the
/// sources in `resources/shaders/`.
const ATTRIBUTE_NAMES: [&str; 11] = [
    "in_position",
    "in_position_2d",
    "in_position_4",
    "in_velocity",
    "in_tex_coord",
    "in_color_32",
    "in_color",
    "in_tangent",
    "in_normal",
    "in_extra_vec4",
    "in_extra_int",
];

fn attribute_index(attribute: VertexAttributes) -> Option<usize> {
    ATTRIBUTE_ORDER.iter().position(|a| *a == attribute)
}

/// Size of one attribute in 32-bit words.
#[must_use]
pub fn attribute_words(attribute: VertexAttributes) -> usize {
    attribute_index(attribute).map_or(0, |i| ATTRIBUTE_WORDS[i])
}

/// Shader attribute name for GLSL attribute binding.
#[must_use]
pub fn attribute_name(attribute: VertexAttributes) -> &'static str {
    attribute_index(attribute).map_or("", |i| ATTRIBUTE_NAMES[i])
}

/// Default value written for an attribute a source stream does not carry,
/// padded with zeros up to the attribute's width.
#[must_use]
pub fn attribute_default(attribute: VertexAttributes) -> [f32; 4] {
    if attribute == VertexAttributes::COLOR32 {
        // Packed white
        [f32::from_bits(0xFFFF_FFFF), 0.0, 0.0, 0.0]
    } else if attribute == VertexAttributes::COLOR128 {
        [1.0, 1.0, 1.0, 1.0]
    } else if attribute == VertexAttributes::NORMAL {
        // +Y up
        [0.0, 1.0, 0.0, 0.0]
    } else if attribute == VertexAttributes::TANGENT {
        // +X right
        [1.0, 0.0, 0.0, 0.0]
    } else {
        [0.0; 4]
    }
}

impl VertexAttributes {
    /// Stride of an interleaved vertex in bytes.
    #[must_use]
    pub fn stride(self) -> usize {
        self.stride_words() * 4
    }

    /// Stride of an interleaved vertex in 32-bit words.
    #[must_use]
    pub fn stride_words(self) -> usize {
        ATTRIBUTE_ORDER
            .iter()
            .filter(|a| self.contains(**a))
            .map(|a| attribute_words(*a))
            .sum()
    }

    /// Word offset of `attribute` within an interleaved vertex, or `None`
    /// if this set does not contain it.
    #[must_use]
    pub fn offset_words(self, attribute: VertexAttributes) -> Option<usize> {
        if !self.contains(attribute) {
            return None;
        }
        let mut offset = 0;
        for a in ATTRIBUTE_ORDER {
            if a == attribute {
                return Some(offset);
            }
            if self.contains(a) {
                offset += attribute_words(a);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_sums_set_attributes() {
        let attrs = VertexAttributes::POSITION | VertexAttributes::UV | VertexAttributes::NORMAL;
        assert_eq!(attrs.stride_words(), 3 + 2 + 3);
        assert_eq!(attrs.stride(), (3 + 2 + 3) * 4);
    }

    #[test]
    fn offsets_follow_declaration_order() {
        let attrs = VertexAttributes::POSITION
            | VertexAttributes::UV
            | VertexAttributes::TANGENT
            | VertexAttributes::NORMAL;
        assert_eq!(attrs.offset_words(VertexAttributes::POSITION), Some(0));
        assert_eq!(attrs.offset_words(VertexAttributes::UV), Some(3));
        assert_eq!(attrs.offset_words(VertexAttributes::TANGENT), Some(5));
        assert_eq!(attrs.offset_words(VertexAttributes::NORMAL), Some(8));
        assert_eq!(attrs.offset_words(VertexAttributes::COLOR128), None);
    }

    #[test]
    fn packed_color_is_one_word() {
        assert_eq!(attribute_words(VertexAttributes::COLOR32), 1);
        assert_eq!(VertexAttributes::COLOR32.stride(), 4);
    }
}
