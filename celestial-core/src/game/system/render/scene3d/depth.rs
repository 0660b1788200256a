use anyhow::anyhow;
use wgpu;

use super::SCENE3D_DEPTH_FORMAT;

struct DepthAttachment {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: (u32, u32),
}

/// 与帧缓冲同尺寸的深度纹理，尺寸变化时重建。
#[derive(Default)]
pub(in crate::game::system::render) struct Scene3DDepthCache {
    attachment: Option<DepthAttachment>,
}

impl Scene3DDepthCache {
    pub(in crate::game::system::render) fn ensure(
        &mut self,
        device: &wgpu::Device,
        size: (u32, u32),
    ) -> anyhow::Result<&wgpu::TextureView> {
        let size = (size.0.max(1), size.1.max(1));
        let needs_rebuild = self
            .attachment
            .as_ref()
            .map(|attachment| attachment.size != size)
            .unwrap_or(true);

        if needs_rebuild {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Scene3D Depth Texture"),
                size: wgpu::Extent3d {
                    width: size.0,
                    height: size.1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: SCENE3D_DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            self.attachment = Some(DepthAttachment {
                _texture: texture,
                view,
                size,
            });
        }

        self.attachment
            .as_ref()
            .map(|attachment| &attachment.view)
            .ok_or_else(|| anyhow!("Scene3D depth attachment missing after initialization"))
    }
}
