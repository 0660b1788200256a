use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tracing::{debug, trace};
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    config::WindowConfig,
    game::system::render::{FrameSnapshot, RenderFrameParams, RenderSystem},
    resource::AssetBundle,
};

/// 窗口与渲染上下文：winit 窗口、wgpu 表面/设备/队列以及渲染系统。
///
/// 由 [`crate::Game`] 在 `resumed` 时创建并持有。
pub struct GameWindow {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surf_config: wgpu::SurfaceConfiguration,
    size_changed: bool,
    renderer: RenderSystem,
}

impl GameWindow {
    pub async fn new(window: Arc<Window>, window_config: &WindowConfig) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        // 表面持有窗口的 Arc，窗口句柄在表面存活期间始终有效
        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("failed to create window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no graphics adapter compatible with the window")?;
        let info = adapter.get_info();
        debug!(target: "celestial-core", adapter = %info.name, backend = ?info.backend, "adapter selected");

        // 只画网格、纹理和界面四边形，downlevel 限制足够
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("celestial device"),
                required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                ..Default::default()
            })
            .await
            .context("failed to open graphics device")?;

        let size = clamp_size(window.inner_size());
        let surf_config = surface_config(&surface.get_capabilities(&adapter), size, window_config.vsync)?;
        surface.configure(&device, &surf_config);
        debug!(
            target: "celestial-core",
            format = ?surf_config.format,
            present_mode = ?surf_config.present_mode,
            width = size.width,
            height = size.height,
            "surface configured"
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            surf_config,
            size_changed: false,
            renderer: RenderSystem::new(),
        })
    }

    pub(crate) fn framebuffer_size(&self) -> (u32, u32) {
        (self.surf_config.width, self.surf_config.height)
    }

    pub(crate) fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// 记录新的窗口尺寸，表面在下一帧开始前重配。
    pub fn set_window_resized(&mut self, new_size: PhysicalSize<u32>) {
        let new_size = clamp_size(new_size);
        if (new_size.width, new_size.height) == self.framebuffer_size() {
            return;
        }
        self.surf_config.width = new_size.width;
        self.surf_config.height = new_size.height;
        self.size_changed = true;
    }

    /// 表面丢失或过期后，下一帧强制重配。
    pub(crate) fn mark_surface_outdated(&mut self) {
        self.size_changed = true;
    }

    pub fn resize_surface_if_needed(&mut self) {
        if self.size_changed {
            self.surface.configure(&self.device, &self.surf_config);
            self.size_changed = false;
        }
    }

    /// 渲染一帧快照并提交呈现。
    pub(crate) fn render_frame(
        &mut self,
        frame: &FrameSnapshot,
        bundle: &AssetBundle,
        delta: Duration,
    ) -> Result<(), wgpu::SurfaceError> {
        trace!(
            target: "celestial-core",
            frame_time_ms = delta.as_secs_f64() * 1000.0,
            "begin frame"
        );

        let output = self.surface.get_current_texture()?;
        let target_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("celestial frame"),
            });

        self.renderer.begin_frame();
        self.renderer.render_frame(
            frame,
            RenderFrameParams {
                device: &self.device,
                queue: &self.queue,
                encoder: &mut encoder,
                target_view: &target_view,
                surface_format: self.surf_config.format,
                framebuffer_size: self.framebuffer_size(),
                bundle,
            },
        );
        self.queue.submit(Some(encoder.finish()));
        output.present();
        self.renderer.end_frame();

        Ok(())
    }
}

fn clamp_size(size: PhysicalSize<u32>) -> PhysicalSize<u32> {
    PhysicalSize::new(size.width.max(1), size.height.max(1))
}

/// 由表面能力选出配置：优先 sRGB 格式与不透明合成，垂直同步交给 wgpu 的自动模式。
fn surface_config(
    caps: &wgpu::SurfaceCapabilities,
    size: PhysicalSize<u32>,
    vsync: bool,
) -> anyhow::Result<wgpu::SurfaceConfiguration> {
    let format = caps
        .formats
        .iter()
        .copied()
        .find(wgpu::TextureFormat::is_srgb)
        .or_else(|| caps.formats.first().copied())
        .context("surface reports no supported formats")?;
    let alpha_mode = if caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::Opaque) {
        wgpu::CompositeAlphaMode::Opaque
    } else {
        wgpu::CompositeAlphaMode::Auto
    };
    let present_mode = if vsync {
        wgpu::PresentMode::AutoVsync
    } else {
        wgpu::PresentMode::AutoNoVsync
    };

    Ok(wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width,
        height: size.height,
        present_mode,
        alpha_mode,
        view_formats: Vec::new(),
        desired_maximum_frame_latency: 2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(formats: Vec<wgpu::TextureFormat>, alpha_modes: Vec<wgpu::CompositeAlphaMode>) -> wgpu::SurfaceCapabilities {
        wgpu::SurfaceCapabilities {
            formats,
            alpha_modes,
            ..Default::default()
        }
    }

    #[test]
    fn srgb_format_and_opaque_alpha_are_preferred() {
        let caps = caps(
            vec![wgpu::TextureFormat::Bgra8Unorm, wgpu::TextureFormat::Bgra8UnormSrgb],
            vec![wgpu::CompositeAlphaMode::PreMultiplied, wgpu::CompositeAlphaMode::Opaque],
        );
        let config = surface_config(&caps, PhysicalSize::new(1000, 800), true).expect("应能选出表面配置");
        assert_eq!(config.format, wgpu::TextureFormat::Bgra8UnormSrgb);
        assert_eq!(config.alpha_mode, wgpu::CompositeAlphaMode::Opaque);
        assert_eq!(config.present_mode, wgpu::PresentMode::AutoVsync);
        assert_eq!((config.width, config.height), (1000, 800));
    }

    #[test]
    fn linear_only_surface_falls_back_to_first_format() {
        let caps = caps(
            vec![wgpu::TextureFormat::Rgba8Unorm],
            vec![wgpu::CompositeAlphaMode::PreMultiplied],
        );
        let config = surface_config(&caps, PhysicalSize::new(1, 1), false).expect("应能选出表面配置");
        assert_eq!(config.format, wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(config.alpha_mode, wgpu::CompositeAlphaMode::Auto);
        assert_eq!(config.present_mode, wgpu::PresentMode::AutoNoVsync);
    }

    #[test]
    fn surface_without_formats_is_rejected() {
        let caps = caps(Vec::new(), Vec::new());
        assert!(surface_config(&caps, PhysicalSize::new(10, 10), true).is_err());
    }

    #[test]
    fn zero_sized_window_is_clamped() {
        assert_eq!(clamp_size(PhysicalSize::new(0, 600)), PhysicalSize::new(1, 600));
    }
}
