use crate::resource::AssetBundle;

use super::overlay::{OverlayPipelineCache, OverlayTextureCache};
use super::scene3d::{MeshCache, Scene3DDepthCache, Scene3DMaterialCache, Scene3DPipelineCache};

/// 跨帧复用的 GPU 资源。
#[derive(Default)]
pub(in crate::game::system::render) struct RenderCache {
    pub(in crate::game::system::render) scene3d: Scene3DPipelineCache,
    pub(in crate::game::system::render) materials: Scene3DMaterialCache,
    pub(in crate::game::system::render) meshes: MeshCache,
    pub(in crate::game::system::render) depth: Scene3DDepthCache,
    pub(in crate::game::system::render) overlay: OverlayPipelineCache,
    pub(in crate::game::system::render) overlay_textures: OverlayTextureCache,
}

pub(in crate::game::system::render) struct RenderContext<'a, 'cache> {
    pub(in crate::game::system::render) device: &'a wgpu::Device,
    pub(in crate::game::system::render) queue: &'a wgpu::Queue,
    pub(in crate::game::system::render) encoder: &'a mut wgpu::CommandEncoder,
    pub(in crate::game::system::render) target_view: &'a wgpu::TextureView,
    pub(in crate::game::system::render) surface_format: wgpu::TextureFormat,
    pub(in crate::game::system::render) framebuffer_size: (u32, u32),
    pub(in crate::game::system::render) bundle: &'a AssetBundle,
    pub(in crate::game::system::render) caches: &'cache mut RenderCache,
}
