use nalgebra::{Vector2, Vector3};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::f32::consts::{PI, TAU};

/// 球体默认的经线/纬线细分数。
pub const SPHERE_SEGMENTS: usize = 48;
pub const SPHERE_RINGS: usize = 24;
/// 圆环主环与管道的细分数。
pub const TORUS_RING_SEGMENTS: usize = 96;
pub const TORUS_PIPE_SEGMENTS: usize = 12;

/// 几何形状（三角形网格）。
///
/// `Shape` 用“顶点数组 + 三角面索引”描述几何：
/// - `vertices`：局部空间顶点
/// - `normals` / `uvs`：与顶点一一对应
/// - `faces`：每个三角面是 `[usize; 3]` 索引
///
/// 渲染与拾取时会结合节点的世界矩阵把顶点变换到世界空间。
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    vertices: Vec<Vector3<f32>>,
    normals: Vec<Vector3<f32>>,
    uvs: Vec<Vector2<f32>>,
    faces: Vec<[usize; 3]>,
}

impl Shape {
    /// 使用顶点、法线、UV 及索引构造形状。
    pub fn new(
        vertices: Vec<Vector3<f32>>,
        normals: Vec<Vector3<f32>>,
        uvs: Vec<Vector2<f32>>,
        faces: Vec<[usize; 3]>,
    ) -> Self {
        debug_assert_eq!(vertices.len(), normals.len());
        debug_assert_eq!(vertices.len(), uvs.len());
        debug_assert!(faces.iter().all(|[a, b, c]| {
            *a < vertices.len() && *b < vertices.len() && *c < vertices.len()
        }));
        Self {
            vertices,
            normals,
            uvs,
            faces,
        }
    }

    /// 以原点为中心的 UV 球体。
    ///
    /// 纹理按经纬展开：`u` 沿经度方向，`v = 0` 为北极（+Y）。
    pub fn sphere(radius: f32) -> Self {
        Self::sphere_with_segments(radius, SPHERE_SEGMENTS, SPHERE_RINGS)
    }

    pub fn sphere_with_segments(radius: f32, segments: usize, rings: usize) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);

        let mut vertices = Vec::with_capacity((segments + 1) * (rings + 1));
        let mut normals = Vec::with_capacity(vertices.capacity());
        let mut uvs = Vec::with_capacity(vertices.capacity());

        for iy in 0..=rings {
            let v = iy as f32 / rings as f32;
            let theta = v * PI;
            for ix in 0..=segments {
                let u = ix as f32 / segments as f32;
                let phi = u * TAU;
                let normal = Vector3::new(
                    -phi.cos() * theta.sin(),
                    theta.cos(),
                    phi.sin() * theta.sin(),
                );
                vertices.push(normal * radius);
                normals.push(normal);
                uvs.push(Vector2::new(u, v));
            }
        }

        let row = segments + 1;
        let mut faces = Vec::with_capacity(segments * rings * 2);
        for iy in 0..rings {
            for ix in 0..segments {
                let a = iy * row + ix + 1;
                let b = iy * row + ix;
                let c = (iy + 1) * row + ix;
                let d = (iy + 1) * row + ix + 1;
                if iy != 0 {
                    faces.push([a, b, d]);
                }
                if iy != rings - 1 {
                    faces.push([b, c, d]);
                }
            }
        }

        Self::new(vertices, normals, uvs, faces)
    }

    /// 位于 XZ 平面、绕 Y 轴的圆环。
    pub fn torus(ring_radius: f32, pipe_radius: f32) -> Self {
        Self::torus_with_segments(
            ring_radius,
            pipe_radius,
            TORUS_RING_SEGMENTS,
            TORUS_PIPE_SEGMENTS,
        )
    }

    pub fn torus_with_segments(
        ring_radius: f32,
        pipe_radius: f32,
        ring_segments: usize,
        pipe_segments: usize,
    ) -> Self {
        let ring_segments = ring_segments.max(3);
        let pipe_segments = pipe_segments.max(3);

        let mut vertices = Vec::with_capacity((ring_segments + 1) * (pipe_segments + 1));
        let mut normals = Vec::with_capacity(vertices.capacity());
        let mut uvs = Vec::with_capacity(vertices.capacity());

        for i in 0..=ring_segments {
            let u = i as f32 / ring_segments as f32;
            let around = u * TAU;
            for j in 0..=pipe_segments {
                let v = j as f32 / pipe_segments as f32;
                let tube = v * TAU;
                let normal = Vector3::new(
                    tube.cos() * around.cos(),
                    tube.sin(),
                    tube.cos() * around.sin(),
                );
                let center = Vector3::new(ring_radius * around.cos(), 0.0, ring_radius * around.sin());
                vertices.push(center + normal * pipe_radius);
                normals.push(normal);
                uvs.push(Vector2::new(u, v));
            }
        }

        let row = pipe_segments + 1;
        let mut faces = Vec::with_capacity(ring_segments * pipe_segments * 2);
        for i in 0..ring_segments {
            for j in 0..pipe_segments {
                let a = i * row + j;
                let b = (i + 1) * row + j;
                let c = (i + 1) * row + j + 1;
                let d = i * row + j + 1;
                faces.push([a, d, b]);
                faces.push([b, d, c]);
            }
        }

        Self::new(vertices, normals, uvs, faces)
    }

    /// 球壳内随机分布的星点，每颗星是一个小八面体。
    ///
    /// 星点大小与距离成正比，使其在屏幕上保持相近的像素尺寸。相同 `seed` 生成相同结果。
    pub fn star_field(count: usize, inner_radius: f32, outer_radius: f32, seed: u64) -> Self {
        const OCTAHEDRON: [[f32; 3]; 6] = [
            [1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, -1.0],
        ];
        const OCTAHEDRON_FACES: [[usize; 3]; 8] = [
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ];

        let mut rng = StdRng::seed_from_u64(seed);
        let outer_radius = outer_radius.max(inner_radius + f32::EPSILON);

        let mut vertices = Vec::with_capacity(count * OCTAHEDRON.len());
        let mut normals = Vec::with_capacity(vertices.capacity());
        let mut uvs = Vec::with_capacity(vertices.capacity());
        let mut faces = Vec::with_capacity(count * OCTAHEDRON_FACES.len());

        for _ in 0..count {
            let z: f32 = rng.gen_range(-1.0..1.0);
            let angle: f32 = rng.gen_range(0.0..TAU);
            let planar = (1.0 - z * z).sqrt();
            let direction = Vector3::new(planar * angle.cos(), z, planar * angle.sin());
            let distance = rng.gen_range(inner_radius..outer_radius);
            let size = distance * rng.gen_range(0.002..0.005);
            let center = direction * distance;

            let base = vertices.len();
            for corner in OCTAHEDRON {
                let normal = Vector3::from(corner);
                vertices.push(center + normal * size);
                normals.push(normal);
                uvs.push(Vector2::new(0.5, 0.5));
            }
            faces.extend(
                OCTAHEDRON_FACES
                    .iter()
                    .map(|[a, b, c]| [base + a, base + b, base + c]),
            );
        }

        Self::new(vertices, normals, uvs, faces)
    }

    /// 返回顶点数组的只读视图。
    pub fn vertices(&self) -> &[Vector3<f32>] {
        &self.vertices
    }

    pub fn normals(&self) -> &[Vector3<f32>] {
        &self.normals
    }

    pub fn uvs(&self) -> &[Vector2<f32>] {
        &self.uvs
    }

    /// 返回三角面索引列表。
    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    /// 返回形状包含的三角面数量。
    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    /// 以局部原点为中心的包围球半径。
    pub fn bounding_radius(&self) -> f32 {
        self.vertices
            .iter()
            .map(|v| v.norm())
            .fold(0.0, f32::max)
    }

    /// 按顶点数组顺序迭代三角面。
    pub fn triangles(&self) -> Triangles<'_> {
        Triangles {
            vertices: &self.vertices,
            faces: &self.faces,
            index: 0,
        }
    }
}

/// `Shape::triangles()` 的迭代器。
///
/// 每次迭代返回一个三元组：`(&v0, &v1, &v2)`。
pub struct Triangles<'a> {
    vertices: &'a [Vector3<f32>],
    faces: &'a [[usize; 3]],
    index: usize,
}

impl<'a> Iterator for Triangles<'a> {
    type Item = (&'a Vector3<f32>, &'a Vector3<f32>, &'a Vector3<f32>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.faces.len() {
            return None;
        }
        let [a, b, c] = self.faces[self.index];
        let tri = (&self.vertices[a], &self.vertices[b], &self.vertices[c]);
        self.index += 1;
        Some(tri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangles_iterates_triplets() {
        let shape = Shape::new(
            vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
                Vector3::new(0.0, 0.0, 1.0),
            ],
            vec![Vector3::z(); 4],
            vec![Vector2::zeros(); 4],
            vec![[0, 1, 2], [1, 2, 3]],
        );

        assert_eq!(shape.triangle_count(), 2);

        let tris: Vec<_> = shape.triangles().collect();
        assert_eq!(tris.len(), 2);
        assert_eq!(*tris[0].0, Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(*tris[0].1, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(*tris[0].2, Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(*tris[1].0, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(*tris[1].2, Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let sphere = Shape::sphere_with_segments(2.0, 16, 8);
        assert_eq!(sphere.vertices().len(), 17 * 9);
        // 两极各少一排三角形
        assert_eq!(sphere.triangle_count(), 16 * 8 * 2 - 2 * 16);
        for (vertex, normal) in sphere.vertices().iter().zip(sphere.normals()) {
            assert!((vertex.norm() - 2.0).abs() < 1e-5);
            assert!((normal.norm() - 1.0).abs() < 1e-5);
        }
        assert!((sphere.bounding_radius() - 2.0).abs() < 1e-5);
        assert!(
            sphere
                .uvs()
                .iter()
                .all(|uv| (0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y))
        );
    }

    #[test]
    fn torus_lies_around_y_axis() {
        let torus = Shape::torus(3.0, 0.03);
        for vertex in torus.vertices() {
            let planar = (vertex.x * vertex.x + vertex.z * vertex.z).sqrt();
            assert!((planar - 3.0).abs() <= 0.03 + 1e-4);
            assert!(vertex.y.abs() <= 0.03 + 1e-5);
        }
        assert_eq!(
            torus.triangle_count(),
            TORUS_RING_SEGMENTS * TORUS_PIPE_SEGMENTS * 2
        );
    }

    #[test]
    fn star_field_is_deterministic_and_bounded() {
        let a = Shape::star_field(50, 80.0, 120.0, 7);
        let b = Shape::star_field(50, 80.0, 120.0, 7);
        assert_eq!(a, b);
        assert_eq!(a.triangle_count(), 50 * 8);
        assert!(a.bounding_radius() <= 120.0 * 1.01);

        let nearest = a.vertices().iter().map(|v| v.norm()).fold(f32::MAX, f32::min);
        assert!(nearest >= 80.0 * 0.99);
    }
}
