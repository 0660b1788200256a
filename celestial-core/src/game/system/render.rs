mod cache;
mod overlay;
mod resource_io;
mod scene3d;
mod snapshot;
mod texture;
mod util;

pub(crate) use snapshot::FrameSnapshot;

use tracing::trace;
use wgpu;

use crate::resource::AssetBundle;

use cache::{RenderCache, RenderContext};

pub struct RenderFrameParams<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub target_view: &'a wgpu::TextureView,
    pub surface_format: wgpu::TextureFormat,
    pub framebuffer_size: (u32, u32),
    pub bundle: &'a AssetBundle,
}

/// 渲染系统。
///
/// `RenderSystem` 把一帧的快照绘制到给定的渲染目标上，依次是：
/// 1. 用画面背景色清屏
/// 2. 3D 场景（带深度；不透明物体在前，半透明物体按从远到近在后）
/// 3. 界面层（按绘制列表顺序叠加）
///
/// 管线、网格与纹理缓存在帧间复用；本帧未用到的网格与文字纹理在 [`RenderSystem::end_frame`] 时释放。
#[derive(Default)]
pub struct RenderSystem {
    caches: RenderCache,
}

impl RenderSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// 标记一帧渲染开始。
    pub fn begin_frame(&mut self) {
        self.caches.meshes.begin_frame();
        self.caches.overlay_textures.begin_frame();
    }

    /// 标记一帧渲染结束，淘汰本帧未使用的缓存条目。
    pub fn end_frame(&mut self) {
        self.caches.meshes.end_frame();
        self.caches.overlay_textures.end_frame();
    }

    pub(crate) fn render_frame(&mut self, frame: &FrameSnapshot, params: RenderFrameParams<'_>) {
        let RenderFrameParams {
            device,
            queue,
            encoder,
            target_view,
            surface_format,
            framebuffer_size,
            bundle,
        } = params;

        let mut context = RenderContext {
            device,
            queue,
            encoder,
            target_view,
            surface_format,
            framebuffer_size,
            bundle,
            caches: &mut self.caches,
        };

        Self::clear(frame, &mut context);
        if let Some(scene) = &frame.scene {
            Self::render_scene3d(scene, &mut context);
        }
        Self::render_overlay(&frame.overlay, frame.canvas, &mut context);

        trace!(
            target: "celestial-core",
            has_scene = frame.scene.is_some(),
            overlay_items = frame.overlay.len(),
            "frame encoded"
        );
    }

    fn clear(frame: &FrameSnapshot, context: &mut RenderContext<'_, '_>) {
        let [r, g, b, a] = util::target_color(frame.background, context.surface_format);
        let _pass = context
            .encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Background Clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: context.target_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
    }
}
