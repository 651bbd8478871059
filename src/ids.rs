//! Opaque Resource Identifiers
//!
//! All renderer-owned resources are addressed through dense 32-bit indices
//! with a reserved invalid sentinel. IDs are stable for the lifetime of the
//! resource and may be recycled after destruction: the allocator always
//! hands out the lowest free index. Other systems hold IDs, never
//! references; the renderer's tables own the authoritative objects.

use std::fmt;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[derive(serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Reserved sentinel for "no resource".
            pub const INVALID: Self = Self(u32::MAX);

            /// Wraps a raw index.
            #[inline]
            #[must_use]
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw index.
            #[inline]
            #[must_use]
            pub const fn index(self) -> u32 {
                self.0
            }

            /// Returns `true` unless this is the invalid sentinel.
            #[inline]
            #[must_use]
            pub const fn is_valid(self) -> bool {
                self.0 != u32::MAX
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({})", stringify!($name), self.0)
                } else {
                    write!(f, "{}(invalid)", stringify!($name))
                }
            }
        }
    };
}

define_id!(
    /// Identifies a [`Material`](crate::resources::material::Material) in the renderer's material table.
    MaterialID
);
define_id!(
    /// Identifies a [`Shader`](crate::resources::shader::Shader) in the shader registry.
    ShaderID
);
define_id!(
    /// Identifies a loaded texture. Textures are deduplicated by path.
    TextureID
);
define_id!(
    /// Identifies one drawable render object.
    RenderID
);
define_id!(
    /// Identifies a registered point light.
    PointLightID
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sentinel_is_not_valid() {
        assert!(!MaterialID::INVALID.is_valid());
        assert!(RenderID::new(0).is_valid());
    }

    #[test]
    fn default_is_invalid() {
        assert_eq!(ShaderID::default(), ShaderID::INVALID);
    }

    #[test]
    fn display_shows_index_or_invalid() {
        assert_eq!(TextureID::new(3).to_string(), "TextureID(3)");
        assert_eq!(TextureID::INVALID.to_string(), "TextureID(invalid)");
    }
}
