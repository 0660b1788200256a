mod depth;
mod material;
mod mesh;
mod pipeline;

pub(in crate::game::system::render) use depth::Scene3DDepthCache;
pub(in crate::game::system::render) use material::Scene3DMaterialCache;
pub(in crate::game::system::render) use mesh::MeshCache;
pub(in crate::game::system::render) use pipeline::Scene3DPipelineCache;

use nalgebra::Matrix3;
use tracing::{debug, warn};
use wgpu::{self, util::DeviceExt};

use crate::color::Color;

use super::{
    RenderSystem,
    cache::RenderContext,
    snapshot::{MAX_OMNI_LIGHTS, MeshDraw, Scene3DSnapshot},
    util,
};

const SCENE3D_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// 每次绘制的 uniform：model 16 + normal_matrix 16 + color 4 + params 4。
const DRAW_UNIFORM_FLOATS: usize = 40;
/// 动态偏移的步长（字节），满足 `min_uniform_buffer_offset_alignment` 的默认上限。
const DRAW_UNIFORM_STRIDE: usize = 256;
const DRAW_UNIFORM_STRIDE_FLOATS: usize = DRAW_UNIFORM_STRIDE / std::mem::size_of::<f32>();

impl RenderSystem {
    /// 绘制 3D 场景：先不透明物体（写深度），再按从远到近绘制半透明物体。
    pub(in crate::game::system::render) fn render_scene3d(
        scene: &Scene3DSnapshot,
        context: &mut RenderContext<'_, '_>,
    ) {
        if let Err(error) = Self::try_render_scene3d(scene, context) {
            warn!(
                target: "celestial-core",
                error = %error,
                "skip 3D scene rendering"
            );
        }
    }

    fn try_render_scene3d(
        scene: &Scene3DSnapshot,
        context: &mut RenderContext<'_, '_>,
    ) -> anyhow::Result<()> {
        let device = context.device;
        let caches = &mut *context.caches;
        let pipelines = caches
            .scene3d
            .ensure(device, context.surface_format, context.bundle)?;

        let mut meshes_ready = |draw: &&MeshDraw| caches.meshes.prepare(device, &draw.shape);
        let mut draws: Vec<&MeshDraw> = scene.opaque.iter().filter(&mut meshes_ready).collect();
        let opaque_count = draws.len();
        draws.extend(scene.transparent.iter().filter(&mut meshes_ready));

        caches.materials.prepare(
            device,
            context.queue,
            &pipelines.material_layout,
            context.bundle,
            draws.iter().filter_map(|draw| draw.texture.as_ref()),
        )?;

        if draws.is_empty() {
            debug!(target: "celestial-core", "3D scene has no visible geometry");
            return Ok(());
        }

        let scene_data = scene_uniform_data(scene, context.surface_format);
        let scene_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene3D Uniform Buffer"),
            contents: util::cast_slice_f32(&scene_data),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene3D Uniform Bind Group"),
            layout: &pipelines.scene_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_buffer.as_entire_binding(),
            }],
        });

        let mut draw_data = Vec::with_capacity(draws.len() * DRAW_UNIFORM_STRIDE_FLOATS);
        for draw in &draws {
            draw_data.extend_from_slice(&draw_uniform_data(draw, context.surface_format));
        }
        let draw_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene3D Draw Buffer"),
            contents: util::cast_slice_f32(&draw_data),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let draw_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene3D Draw Bind Group"),
            layout: &pipelines.draw_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &draw_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(
                        (DRAW_UNIFORM_FLOATS * std::mem::size_of::<f32>()) as u64,
                    ),
                }),
            }],
        });

        let depth_view = caches.depth.ensure(device, context.framebuffer_size)?;
        let mut pass = context
            .encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene3D"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: context.target_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

        pass.set_bind_group(0, &scene_bind_group, &[]);
        pass.set_pipeline(&pipelines.opaque);
        for (index, draw) in draws.iter().enumerate() {
            if index == opaque_count {
                pass.set_pipeline(&pipelines.transparent);
            }
            let Some(mesh) = caches.meshes.get(&draw.shape) else {
                continue;
            };
            let offset = (index * DRAW_UNIFORM_STRIDE) as wgpu::DynamicOffset;
            pass.set_bind_group(1, caches.materials.bind_group(draw.texture.as_ref())?, &[]);
            pass.set_bind_group(2, &draw_bind_group, &[offset]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
        drop(pass);

        debug!(
            target: "celestial-core",
            draw_calls = draws.len(),
            transparent = draws.len() - opaque_count,
            lights = scene.omni_lights.len(),
            "3D scene rendered"
        );
        Ok(())
    }
}

fn linear_rgb(rgb: [f32; 3], format: wgpu::TextureFormat) -> [f32; 3] {
    let [r, g, b, _] = util::target_color(Color::rgb(rgb[0], rgb[1], rgb[2]), format);
    [r, g, b]
}

/// 场景 uniform：view_proj 16 + ambient 4 + counts 4 + 每个点光源 8。
fn scene_uniform_data(scene: &Scene3DSnapshot, format: wgpu::TextureFormat) -> Vec<f32> {
    let mut data = Vec::with_capacity(16 + 4 + 4 + MAX_OMNI_LIGHTS * 8);
    data.extend_from_slice(scene.view_projection.as_slice());

    let [r, g, b] = linear_rgb(scene.ambient, format);
    data.extend_from_slice(&[r, g, b, 1.0]);

    let count = scene.omni_lights.len().min(MAX_OMNI_LIGHTS);
    data.extend_from_slice(&[count as f32, 0.0, 0.0, 0.0]);

    for index in 0..MAX_OMNI_LIGHTS {
        match scene.omni_lights.get(index) {
            Some((position, color)) => {
                let [r, g, b] = linear_rgb(*color, format);
                data.extend_from_slice(&[position[0], position[1], position[2], 1.0, r, g, b, 1.0]);
            }
            None => data.extend_from_slice(&[0.0; 8]),
        }
    }
    data
}

/// 单次绘制的 uniform，补齐到动态偏移步长。
fn draw_uniform_data(
    draw: &MeshDraw,
    format: wgpu::TextureFormat,
) -> [f32; DRAW_UNIFORM_STRIDE_FLOATS] {
    let linear: Matrix3<f32> = draw.model.fixed_view::<3, 3>(0, 0).into_owned();
    let normal_matrix = linear
        .try_inverse()
        .map(|inverse| inverse.transpose())
        .unwrap_or(linear)
        .to_homogeneous();

    let mut data = [0.0; DRAW_UNIFORM_STRIDE_FLOATS];
    data[..16].copy_from_slice(draw.model.as_slice());
    data[16..32].copy_from_slice(normal_matrix.as_slice());
    data[32..36].copy_from_slice(&util::target_color(draw.color, format));
    data[36] = if draw.lit { 1.0 } else { 0.0 };
    data
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nalgebra::{Matrix4, Vector3};

    use super::*;
    use crate::game::component::shape::Shape;

    fn draw(model: Matrix4<f32>, lit: bool) -> MeshDraw {
        MeshDraw {
            shape: Arc::new(Shape::sphere_with_segments(1.0, 4, 2)),
            model,
            color: Color::rgba(1.0, 1.0, 1.0, 0.4),
            texture: None,
            lit,
            depth: 0.0,
        }
    }

    #[test]
    fn draw_uniform_fits_stride() {
        assert!(DRAW_UNIFORM_FLOATS <= DRAW_UNIFORM_STRIDE_FLOATS);
        let data = draw_uniform_data(
            &draw(Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0)), false),
            wgpu::TextureFormat::Bgra8Unorm,
        );
        assert_eq!(&data[12..15], &[1.0, 2.0, 3.0]);
        assert_eq!(&data[32..36], &[1.0, 1.0, 1.0, 0.4]);
        assert_eq!(data[36], 0.0);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let model = Matrix4::new_nonuniform_scaling(&Vector3::new(2.0, 1.0, 1.0));
        let data = draw_uniform_data(&draw(model, true), wgpu::TextureFormat::Bgra8Unorm);
        assert!((data[16] - 0.5).abs() < 1e-6);
        assert!((data[21] - 1.0).abs() < 1e-6);
        assert_eq!(data[36], 1.0);
    }

    #[test]
    fn scene_uniform_packs_lights() {
        let scene = Scene3DSnapshot {
            view_projection: Matrix4::identity(),
            ambient: [0.2, 0.2, 0.2],
            omni_lights: vec![([0.0, 10.0, 10.0], [1.0, 1.0, 1.0])],
            opaque: Vec::new(),
            transparent: Vec::new(),
        };
        let data = scene_uniform_data(&scene, wgpu::TextureFormat::Bgra8Unorm);
        assert_eq!(data.len(), 16 + 4 + 4 + MAX_OMNI_LIGHTS * 8);
        assert_eq!(&data[16..20], &[0.2, 0.2, 0.2, 1.0]);
        assert_eq!(data[20], 1.0);
        assert_eq!(&data[24..32], &[0.0, 10.0, 10.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        assert!(data[32..].iter().all(|v| *v == 0.0));
    }
}
