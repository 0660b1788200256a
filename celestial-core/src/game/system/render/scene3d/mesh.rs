use std::{collections::HashMap, sync::Arc};

use wgpu::{self, util::DeviceExt};

use crate::game::component::shape::Shape;

use super::super::util;
use super::pipeline::SCENE3D_VERTEX_FLOATS;

/// 已上传到 GPU 的网格。持有 `Shape` 的引用，保证缓存键（指针）在条目存活期间不被复用。
pub(in crate::game::system::render) struct GpuMesh {
    _shape: Arc<Shape>,
    pub(in crate::game::system::render) vertex_buffer: wgpu::Buffer,
    pub(in crate::game::system::render) index_buffer: wgpu::Buffer,
    pub(in crate::game::system::render) index_count: u32,
    used: bool,
}

/// 按 `Arc<Shape>` 身份缓存的网格；一帧内未被使用的条目在帧末淘汰。
#[derive(Default)]
pub(in crate::game::system::render) struct MeshCache {
    meshes: HashMap<usize, GpuMesh>,
}

impl MeshCache {
    fn key(shape: &Arc<Shape>) -> usize {
        Arc::as_ptr(shape) as usize
    }

    pub(in crate::game::system::render) fn begin_frame(&mut self) {
        for mesh in self.meshes.values_mut() {
            mesh.used = false;
        }
    }

    pub(in crate::game::system::render) fn end_frame(&mut self) {
        self.meshes.retain(|_, mesh| mesh.used);
    }

    /// 上传（或复用）网格。空网格返回 `false`，不参与绘制。
    pub(in crate::game::system::render) fn prepare(
        &mut self,
        device: &wgpu::Device,
        shape: &Arc<Shape>,
    ) -> bool {
        let key = Self::key(shape);
        if let Some(mesh) = self.meshes.get_mut(&key) {
            mesh.used = true;
            return true;
        }

        let (vertex_data, index_data) = mesh_data(shape);
        if index_data.is_empty() {
            return false;
        }

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene3D Vertex Buffer"),
            contents: util::cast_slice_f32(&vertex_data),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_bytes: Vec<u8> = index_data.iter().flat_map(|i| i.to_ne_bytes()).collect();
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene3D Index Buffer"),
            contents: &index_bytes,
            usage: wgpu::BufferUsages::INDEX,
        });

        self.meshes.insert(
            key,
            GpuMesh {
                _shape: Arc::clone(shape),
                vertex_buffer,
                index_buffer,
                index_count: index_data.len() as u32,
                used: true,
            },
        );
        true
    }

    pub(in crate::game::system::render) fn get(&self, shape: &Arc<Shape>) -> Option<&GpuMesh> {
        self.meshes.get(&Self::key(shape))
    }
}

/// 交错顶点数据（位置、法线、UV）与三角形索引。
pub(in crate::game::system::render) fn mesh_data(shape: &Shape) -> (Vec<f32>, Vec<u32>) {
    let vertices = shape.vertices();
    let normals = shape.normals();
    let uvs = shape.uvs();

    let mut vertex_data = Vec::with_capacity(vertices.len() * SCENE3D_VERTEX_FLOATS);
    for (index, vertex) in vertices.iter().enumerate() {
        let normal = normals.get(index).copied().unwrap_or_else(nalgebra::Vector3::y);
        let uv = uvs.get(index).copied().unwrap_or_else(nalgebra::Vector2::zeros);
        vertex_data.extend_from_slice(&[
            vertex.x, vertex.y, vertex.z, normal.x, normal.y, normal.z, uv.x, uv.y,
        ]);
    }

    let index_data = shape
        .faces()
        .iter()
        .flat_map(|face| face.iter().map(|&index| index as u32))
        .collect();

    (vertex_data, index_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_data_interleaves_attributes() {
        let shape = Shape::sphere_with_segments(2.0, 8, 4);
        let (vertices, indices) = mesh_data(&shape);

        assert_eq!(vertices.len(), shape.vertices().len() * SCENE3D_VERTEX_FLOATS);
        assert_eq!(indices.len(), shape.triangle_count() * 3);
        let max_index = indices.iter().copied().max().expect("应有索引") as usize;
        assert!(max_index < shape.vertices().len());

        // 球面上的点：位置长度等于半径，法线为单位向量
        let position = nalgebra::Vector3::new(vertices[0], vertices[1], vertices[2]);
        let normal = nalgebra::Vector3::new(vertices[3], vertices[4], vertices[5]);
        assert!((position.norm() - 2.0).abs() < 1e-4);
        assert!((normal.norm() - 1.0).abs() < 1e-4);
    }
}
