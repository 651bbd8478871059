//! Procedural prefab shapes.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3, Vec4};

use crate::vertex::{VertexAttributes, VertexBufferDataCreateInfo};

/// Procedurally generated mesh shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrefabShape {
    /// Unit cube centered on the origin, outward normals.
    Cube,
    /// 1×1 plane in XZ, +Y normal.
    Plane,
    /// UV sphere of radius 1.
    UvSphere {
        /// Longitudinal segment count (min 3).
        width_segments: u32,
        /// Latitudinal segment count (min 2).
        height_segments: u32,
    },
    /// Inward-facing cube for sky rendering; positions only.
    Skybox,
    /// Line grid in XZ used by the editor, `half_extent` cells per side.
    Grid {
        /// Cells from the center to one edge.
        half_extent: u32,
    },
    /// The colored X/Z axis pair drawn through the world origin.
    WorldAxisGround {
        /// Half-length of each axis line.
        half_length: f32,
    },
    /// Densely tessellated plane displaced by the wave generator at runtime.
    GerstnerPlane {
        /// Vertices per side.
        vertex_count: u32,
        /// World size per side.
        size: f32,
    },
}

/// Per-attribute arrays plus indices for one generated mesh.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// Attribute arrays in interleave layout.
    pub vertices: VertexBufferDataCreateInfo,
    /// Triangle (or line) indices; empty for non-indexed shapes.
    pub indices: Vec<u32>,
}

impl PrefabShape {
    /// Generates the shape's vertex arrays.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn generate(self) -> MeshData {
        match self {
            PrefabShape::Cube => cube(),
            PrefabShape::Plane => plane(),
            PrefabShape::UvSphere {
                width_segments,
                height_segments,
            } => uv_sphere(width_segments.max(3), height_segments.max(2)),
            PrefabShape::Skybox => skybox(),
            PrefabShape::Grid { half_extent } => grid(half_extent.max(1)),
            PrefabShape::WorldAxisGround { half_length } => world_axis_ground(half_length),
            PrefabShape::GerstnerPlane { vertex_count, size } => {
                gerstner_plane(vertex_count.max(2), size)
            }
        }
    }
}

fn cube() -> MeshData {
    // 6 faces, 4 vertices each, CCW front faces.
    let face_data: [(Vec3, Vec3, Vec3); 6] = [
        // normal, right, up
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    ];

    let mut vertices = VertexBufferDataCreateInfo {
        attributes: VertexAttributes::POSITION
            | VertexAttributes::UV
            | VertexAttributes::TANGENT
            | VertexAttributes::NORMAL,
        ..Default::default()
    };
    let mut indices = Vec::with_capacity(36);

    for (face, (normal, right, up)) in face_data.into_iter().enumerate() {
        let base = (face * 4) as u32;
        let center = normal * 0.5;
        for (corner_x, corner_y) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            vertices
                .positions_3
                .push(center + right * corner_x + up * corner_y);
            vertices
                .tex_coords
                .push(Vec2::new(corner_x + 0.5, 0.5 - corner_y));
            vertices.tangents.push(right);
            vertices.normals.push(normal);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    MeshData { vertices, indices }
}

fn plane() -> MeshData {
    let mut vertices = VertexBufferDataCreateInfo {
        attributes: VertexAttributes::POSITION
            | VertexAttributes::UV
            | VertexAttributes::TANGENT
            | VertexAttributes::NORMAL,
        ..Default::default()
    };
    for (x, z) in [(-0.5, 0.5), (0.5, 0.5), (0.5, -0.5), (-0.5, -0.5)] {
        vertices.positions_3.push(Vec3::new(x, 0.0, z));
        vertices.tex_coords.push(Vec2::new(x + 0.5, z + 0.5));
        vertices.tangents.push(Vec3::X);
        vertices.normals.push(Vec3::Y);
    }
    MeshData {
        vertices,
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

fn uv_sphere(width_segments: u32, height_segments: u32) -> MeshData {
    let mut vertices = VertexBufferDataCreateInfo {
        attributes: VertexAttributes::POSITION
            | VertexAttributes::UV
            | VertexAttributes::TANGENT
            | VertexAttributes::NORMAL,
        ..Default::default()
    };
    let mut indices = Vec::new();

    for y in 0..=height_segments {
        let v = y as f32 / height_segments as f32;
        let theta = v * PI;
        let ring_y = -theta.cos();
        let ring_radius = theta.sin();

        for x in 0..=width_segments {
            let u = x as f32 / width_segments as f32;
            let phi = u * TAU;

            let normal = Vec3::new(-ring_radius * phi.cos(), ring_y, ring_radius * phi.sin());
            vertices.positions_3.push(normal);
            vertices.normals.push(normal);
            vertices
                .tangents
                .push(Vec3::new(phi.sin(), 0.0, phi.cos()));
            vertices.tex_coords.push(Vec2::new(u, 1.0 - v));
        }
    }

    let stride = width_segments + 1;
    for y in 0..height_segments {
        for x in 0..width_segments {
            let v0 = y * stride + x;
            let v2 = (y + 1) * stride + x;
            indices.extend_from_slice(&[v0, v0 + 1, v2, v0 + 1, v2 + 1, v2]);
        }
    }

    MeshData { vertices, indices }
}

fn skybox() -> MeshData {
    // Inward-facing cube; position doubles as the sample direction.
    let corners = [
        Vec3::new(-1.0, -1.0, -1.0),
        Vec3::new(1.0, -1.0, -1.0),
        Vec3::new(1.0, 1.0, -1.0),
        Vec3::new(-1.0, 1.0, -1.0),
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(1.0, -1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(-1.0, 1.0, 1.0),
    ];
    let faces: [[u32; 4]; 6] = [
        [0, 3, 2, 1], // -Z
        [4, 5, 6, 7], // +Z
        [1, 2, 6, 5], // +X
        [0, 4, 7, 3], // -X
        [3, 7, 6, 2], // +Y
        [0, 1, 5, 4], // -Y
    ];

    let vertices = VertexBufferDataCreateInfo {
        attributes: VertexAttributes::POSITION,
        positions_3: corners.to_vec(),
        ..Default::default()
    };

    let mut indices = Vec::with_capacity(36);
    for face in faces {
        indices.extend_from_slice(&[face[0], face[1], face[2], face[0], face[2], face[3]]);
    }

    MeshData { vertices, indices }
}

fn grid(half_extent: u32) -> MeshData {
    // Line-list geometry; the center lines are left to WorldAxisGround.
    let mut vertices = VertexBufferDataCreateInfo {
        attributes: VertexAttributes::POSITION | VertexAttributes::COLOR128,
        ..Default::default()
    };

    let line_color = Vec4::new(0.5, 0.5, 0.5, 1.0);
    let extent = half_extent as f32;

    for i in -(half_extent as i32)..=(half_extent as i32) {
        if i == 0 {
            continue;
        }
        let offset = i as f32;
        // Lines along Z
        vertices.positions_3.push(Vec3::new(offset, 0.0, -extent));
        vertices.positions_3.push(Vec3::new(offset, 0.0, extent));
        // Lines along X
        vertices.positions_3.push(Vec3::new(-extent, 0.0, offset));
        vertices.positions_3.push(Vec3::new(extent, 0.0, offset));
        for _ in 0..4 {
            vertices.colors.push(line_color);
        }
    }

    MeshData {
        vertices,
        indices: Vec::new(),
    }
}

fn world_axis_ground(half_length: f32) -> MeshData {
    let mut vertices = VertexBufferDataCreateInfo {
        attributes: VertexAttributes::POSITION | VertexAttributes::COLOR128,
        ..Default::default()
    };

    let x_color = Vec4::new(0.9, 0.1, 0.1, 1.0);
    let z_color = Vec4::new(0.1, 0.1, 0.9, 1.0);

    vertices.positions_3.push(Vec3::new(-half_length, 0.0, 0.0));
    vertices.positions_3.push(Vec3::new(half_length, 0.0, 0.0));
    vertices.colors.push(x_color);
    vertices.colors.push(x_color);

    vertices.positions_3.push(Vec3::new(0.0, 0.0, -half_length));
    vertices.positions_3.push(Vec3::new(0.0, 0.0, half_length));
    vertices.colors.push(z_color);
    vertices.colors.push(z_color);

    MeshData {
        vertices,
        indices: Vec::new(),
    }
}

fn gerstner_plane(vertex_count: u32, size: f32) -> MeshData {
    let mut vertices = VertexBufferDataCreateInfo {
        attributes: VertexAttributes::POSITION
            | VertexAttributes::UV
            | VertexAttributes::VELOCITY
            | VertexAttributes::NORMAL,
        ..Default::default()
    };
    let mut indices = Vec::new();

    for z in 0..vertex_count {
        for x in 0..vertex_count {
            let u = x as f32 / (vertex_count - 1) as f32;
            let v = z as f32 / (vertex_count - 1) as f32;
            vertices
                .positions_3
                .push(Vec3::new((u - 0.5) * size, 0.0, (v - 0.5) * size));
            vertices.tex_coords.push(Vec2::new(u, v));
            vertices.velocities.push(Vec3::ZERO);
            vertices.normals.push(Vec3::Y);
        }
    }

    for z in 0..vertex_count - 1 {
        for x in 0..vertex_count - 1 {
            let v0 = z * vertex_count + x;
            let v2 = (z + 1) * vertex_count + x;
            indices.extend_from_slice(&[v0, v2, v0 + 1, v0 + 1, v2, v2 + 1]);
        }
    }

    MeshData { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_24_vertices_36_indices() {
        let mesh = PrefabShape::Cube.generate();
        assert_eq!(mesh.vertices.positions_3.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert_eq!(mesh.vertices.normals.len(), 24);
    }

    #[test]
    fn sphere_normals_are_unit_length() {
        let mesh = PrefabShape::UvSphere {
            width_segments: 8,
            height_segments: 4,
        }
        .generate();
        for n in &mesh.vertices.normals {
            assert!((n.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn grid_emits_line_pairs() {
        let mesh = PrefabShape::Grid { half_extent: 2 }.generate();
        // 4 offsets (±1, ±2) × 2 directions × 2 endpoints
        assert_eq!(mesh.vertices.positions_3.len(), 16);
        assert!(mesh.indices.is_empty());
        assert_eq!(
            mesh.vertices.positions_3.len(),
            mesh.vertices.colors.len()
        );
    }
}
