//! Unrolled, material-partitioned triangle lists for level surfaces and
//! model faces.

use super::convert::{position_to_target, uv_to_target, TextureSize, UvConvention};
use super::errors::{ErrorKind, Result};
use super::level::Surface;
use super::model::Face;
use failchain::bail;
use log::{debug, trace};
use math::{vec2, Vec2f, Vec3f};
use std::collections::BTreeMap;

/// Texture size used to normalize UVs when a material has no decoded texture.
pub const DEFAULT_TEXTURE_SIZE: u32 = 64;

/// Order of the two non-anchor corners in every fan triangle. `(1, 0)` emits
/// `(0, i + 1, i)`, which faces converted polygons the way the target frame
/// expects.
pub const FAN_WINDING: (usize, usize) = (1, 0);

/// A polygon given as corners indexing shared vertex and texture vertex pools.
pub trait PolygonRing {
    fn material_index(&self) -> i32;
    fn vertex_indices(&self) -> &[i32];
    fn uv_indices(&self) -> &[i32];
}

impl PolygonRing for Surface {
    fn material_index(&self) -> i32 {
        self.material_index
    }

    fn vertex_indices(&self) -> &[i32] {
        &self.vertex_indices
    }

    fn uv_indices(&self) -> &[i32] {
        &self.texture_vertex_indices
    }
}

impl PolygonRing for Face {
    fn material_index(&self) -> i32 {
        self.material_index
    }

    fn vertex_indices(&self) -> &[i32] {
        &self.vertex_indices
    }

    fn uv_indices(&self) -> &[i32] {
        &self.uv_indices
    }
}

/// Triangles sharing one material. `None` collects rings whose material
/// index is negative or out of range.
#[derive(Clone, Debug, PartialEq)]
pub struct Submesh {
    pub material: Option<usize>,
    pub indices: Vec<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct MeshBuffers {
    pub positions: Vec<Vec3f>,
    pub uvs: Vec<Vec2f>,
    pub submeshes: Vec<Submesh>,
}

impl MeshBuffers {
    pub fn triangle_count(&self) -> usize {
        self.submeshes
            .iter()
            .map(|submesh| submesh.indices.len() / 3)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

pub struct GeometryBuilder<'a> {
    context: &'a str,
    vertices: &'a [Vec3f],
    uvs: &'a [Vec2f],
    materials: &'a [Option<TextureSize>],
    default_size: TextureSize,
    convention: UvConvention,
}

impl<'a> GeometryBuilder<'a> {
    /// `context` names the asset in errors. Vertices are in engine space and
    /// texture vertices in pixels.
    pub fn new(context: &'a str, vertices: &'a [Vec3f], uvs: &'a [Vec2f]) -> Self {
        GeometryBuilder {
            context,
            vertices,
            uvs,
            materials: &[],
            default_size: TextureSize::square(DEFAULT_TEXTURE_SIZE),
            convention: UvConvention::default(),
        }
    }

    /// One entry per material; its length bounds the valid material indices.
    /// `None` entries normalize UVs with the default texture size.
    pub fn materials(mut self, sizes: &'a [Option<TextureSize>]) -> Self {
        self.materials = sizes;
        self
    }

    pub fn default_texture_size(mut self, size: u32) -> Self {
        self.default_size = TextureSize::square(size);
        self
    }

    pub fn uv_convention(mut self, convention: UvConvention) -> Self {
        self.convention = convention;
        self
    }

    pub fn build<R: PolygonRing>(&self, rings: &[R]) -> Result<MeshBuffers> {
        let mut positions = Vec::new();
        let mut uvs = Vec::new();
        let mut buckets: BTreeMap<Option<usize>, Vec<u32>> = BTreeMap::new();
        let mut degenerate = 0;

        for ring in rings {
            let corners = ring.vertex_indices();
            if corners.len() < 3 {
                degenerate += 1;
                continue;
            }

            let material = self.material_slot(ring.material_index());
            let size = material
                .and_then(|material| self.materials[material])
                .unwrap_or(self.default_size);
            let base = positions.len() as u32;
            for (corner, &vertex) in corners.iter().enumerate() {
                let uv_index = ring.uv_indices().get(corner).cloned().unwrap_or(0);
                positions.push(position_to_target(self.vertex(vertex)?));
                uvs.push(uv_to_target(self.uv(uv_index), size, self.convention));
            }

            let indices = buckets.entry(material).or_insert_with(Vec::new);
            for i in 1..corners.len() as u32 - 1 {
                let edge = [base + i, base + i + 1];
                indices.extend_from_slice(&[base, edge[FAN_WINDING.0], edge[FAN_WINDING.1]]);
            }
        }

        if degenerate > 0 {
            debug!(
                "{}: skipped {} rings with fewer than 3 corners",
                self.context, degenerate
            );
        }

        Ok(MeshBuffers {
            positions,
            uvs,
            submeshes: buckets
                .into_iter()
                .map(|(material, indices)| Submesh { material, indices })
                .collect(),
        })
    }

    fn material_slot(&self, index: i32) -> Option<usize> {
        if index >= 0 && (index as usize) < self.materials.len() {
            Some(index as usize)
        } else {
            None
        }
    }

    fn vertex(&self, index: i32) -> Result<Vec3f> {
        if index < 0 || index as usize >= self.vertices.len() {
            bail!(ErrorKind::vertex_out_of_range(
                self.context,
                index,
                self.vertices.len()
            ));
        }
        Ok(self.vertices[index as usize])
    }

    fn uv(&self, index: i32) -> Vec2f {
        if index >= 0 && (index as usize) < self.uvs.len() {
            self.uvs[index as usize]
        } else {
            trace!(
                "{}: texture vertex {} outside pool of {}",
                self.context,
                index,
                self.uvs.len()
            );
            vec2(0.0, 0.0)
        }
    }
}

#[cfg(test)]
mod test {
    use super::{GeometryBuilder, Submesh};
    use crate::convert::{TextureSize, UvConvention};
    use crate::level::Surface;
    use crate::model::Face;
    use math::prelude::*;
    use math::{vec2, vec3, Vec2f, Vec3f};

    fn surface(material_index: i32, corners: &[i32]) -> Surface {
        Surface {
            material_index,
            vertex_indices: corners.to_vec(),
            texture_vertex_indices: corners.to_vec(),
            ..Surface::default()
        }
    }

    fn pentagon() -> Vec<Vec3f> {
        vec![
            vec3(0.0, 0.0, 0.0),
            vec3(2.0, 0.0, 0.0),
            vec3(3.0, 1.0, 0.0),
            vec3(1.0, 2.0, 0.0),
            vec3(-1.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn test_ring_sizes() {
        let vertices = pentagon();
        let uvs: Vec<Vec2f> = Vec::new();
        let sizes = [Some(TextureSize::square(32))];
        let builder = GeometryBuilder::new("test", &vertices, &uvs).materials(&sizes);

        for corners in 3..6 {
            let ring: Vec<i32> = (0..corners).collect();
            let buffers = builder
                .build(&[surface(0, &ring)])
                .expect("test: build failed");
            assert_eq!(buffers.positions.len(), corners as usize);
            assert_eq!(buffers.uvs.len(), corners as usize);
            assert_eq!(buffers.triangle_count(), corners as usize - 2);
        }

        let buffers = builder
            .build(&[surface(0, &[0, 1]), surface(0, &[]), surface(0, &[4])])
            .expect("test: build failed");
        assert!(buffers.is_empty());
        assert_eq!(buffers.triangle_count(), 0);
        assert!(buffers.submeshes.is_empty());
    }

    #[test]
    fn test_fallback_bucket_comes_first() {
        let vertices = pentagon();
        let uvs: Vec<Vec2f> = Vec::new();
        let sizes = [None, None];
        let buffers = GeometryBuilder::new("test", &vertices, &uvs)
            .materials(&sizes)
            .build(&[
                surface(1, &[0, 1, 2]),
                surface(999, &[0, 1, 2]),
                surface(0, &[0, 1, 2, 3]),
                surface(-1, &[2, 3, 4]),
            ])
            .expect("test: build failed");

        let materials: Vec<_> = buffers
            .submeshes
            .iter()
            .map(|submesh| submesh.material)
            .collect();
        assert_eq!(materials, vec![None, Some(0), Some(1)]);
        assert_eq!(buffers.submeshes[0].indices, vec![3, 5, 4, 10, 12, 11]);
        assert_eq!(
            buffers.submeshes[1],
            Submesh {
                material: Some(0),
                indices: vec![6, 8, 7, 6, 9, 8],
            }
        );
        assert_eq!(buffers.triangle_count(), 5);
    }

    #[test]
    fn test_up_facing_polygon_stays_up_facing() {
        // Counter-clockwise seen from engine +Z.
        let vertices = vec![
            vec3(0.0, 0.0, 0.0),
            vec3(1.0, 0.0, 0.0),
            vec3(1.0, 1.0, 0.0),
            vec3(0.0, 1.0, 0.0),
        ];
        let uvs: Vec<Vec2f> = Vec::new();
        let buffers = GeometryBuilder::new("test", &vertices, &uvs)
            .build(&[surface(0, &[0, 1, 2, 3])])
            .expect("test: build failed");

        let indices = &buffers.submeshes[0].indices;
        for triangle in indices.chunks(3) {
            let a = buffers.positions[triangle[0] as usize];
            let b = buffers.positions[triangle[1] as usize];
            let c = buffers.positions[triangle[2] as usize];
            let normal = (b - a).cross(c - a).normalize();
            assert!((normal - vec3(0.0, 1.0, 0.0)).magnitude() < 1e-5);
        }
    }

    #[test]
    fn test_uvs() {
        let vertices = pentagon();
        let uvs = vec![vec2(32.0, 16.0), vec2(64.0, 64.0), vec2(16.0, 32.0)];
        let sizes = [None, Some(TextureSize::square(128))];
        let face = |material_index| Face {
            material_index,
            vertex_indices: vec![0, 1, 2],
            uv_indices: vec![0, 1, 7],
            ..Face::default()
        };

        let buffers = GeometryBuilder::new("test", &vertices, &uvs)
            .materials(&sizes)
            .build(&[face(0), face(1)])
            .expect("test: build failed");
        assert_eq!(buffers.uvs[0], vec2(0.5, 0.75));
        assert_eq!(buffers.uvs[1], vec2(1.0, 0.0));
        // Out of range texture vertices read as the origin.
        assert_eq!(buffers.uvs[2], vec2(0.0, 1.0));
        assert_eq!(buffers.uvs[3], vec2(0.25, 0.875));

        let buffers = GeometryBuilder::new("test", &vertices, &uvs)
            .default_texture_size(16)
            .uv_convention(UvConvention { flip_v: false })
            .build(&[face(5)])
            .expect("test: build failed");
        assert_eq!(buffers.uvs[0], vec2(2.0, 1.0));
        assert_eq!(buffers.submeshes[0].material, None);
    }

    #[test]
    fn test_bad_vertex_index() {
        let vertices = pentagon();
        let uvs: Vec<Vec2f> = Vec::new();
        let builder = GeometryBuilder::new("test", &vertices, &uvs);
        assert!(builder.build(&[surface(0, &[0, 1, 5])]).is_err());
        assert!(builder.build(&[surface(0, &[-1, 1, 2])]).is_err());
    }
}
