use std::{sync::Arc, time::Instant};

use nalgebra::Vector2;
use tracing::{error, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, DeviceId, KeyEvent, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowAttributes, WindowId},
};

use super::{Game, WindowConfig, WindowMode};
use crate::window::GameWindow;

impl Game {
    /// 触发退出：通知控制器，并退出 winit 事件循环。
    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.dispatch_close();
        event_loop.exit();
    }

    /// 处理窗口尺寸变化：通知 GameWindow 重配表面，并更新各画面的视口。
    fn handle_window_resized(&mut self, physical_size: PhysicalSize<u32>) {
        if physical_size.width == 0 || physical_size.height == 0 {
            // 忽略最小化
            return;
        }

        let Some(window) = self.window.as_mut() else {
            return;
        };
        window.set_window_resized(physical_size);
        self.stack.set_viewport(Vector2::new(
            physical_size.width as f32,
            physical_size.height as f32,
        ));
    }

    /// 确保窗口与渲染后端已初始化，随后呈现根控制器。
    ///
    /// 窗口在 `resumed` 时懒创建；创建失败会记录错误并退出事件循环。
    pub(super) fn ensure_window_created(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = Self::window_attributes(&self.config.window);
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => window,
            Err(err) => {
                error!(target: "celestial-core", error = %err, "创建窗口失败");
                self.stopped = true;
                event_loop.exit();
                return;
            }
        };

        let window = Arc::new(window);

        let game_window = match self
            .runtime
            .block_on(GameWindow::new(Arc::clone(&window), &self.config.window))
        {
            Ok(window) => window,
            Err(err) => {
                error!(target: "celestial-core", error = %err, "初始化 GameWindow 失败");
                self.stopped = true;
                event_loop.exit();
                return;
            }
        };

        let (width, height) = game_window.framebuffer_size();
        self.window = Some(game_window);
        self.stack
            .set_viewport(Vector2::new(width as f32, height as f32));

        self.present_root();
        self.last_redraw = Instant::now();
    }

    /// 处理 `RedrawRequested`：推进一帧并渲染栈顶画面。
    pub(super) fn handle_redraw_requested(&mut self) {
        if self.stopped {
            return;
        }
        let elapsed = self.last_redraw.elapsed();
        self.last_redraw = Instant::now();

        self.advance(elapsed);
        let frame = self.capture_frame();

        let Some(gwin) = self.window.as_mut() else {
            return;
        };
        gwin.resize_surface_if_needed();

        match gwin.render_frame(&frame, &self.context.bundle, elapsed) {
            Ok(_) => {}
            // 展示平面的上下文丢失，下一帧重配
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!(target: "celestial-core", "Surface is lost");
                gwin.mark_surface_outdated();
            }
            Err(e) => warn!(target: "celestial-core", "{:?}", e),
        }
    }

    fn window_attributes(window_config: &WindowConfig) -> WindowAttributes {
        let width = window_config.width.max(1);
        let height = window_config.height.max(1);

        let mut attributes = Window::default_attributes()
            .with_title(window_config.title.clone())
            .with_inner_size(PhysicalSize::new(width, height));

        if matches!(window_config.mode, WindowMode::Fullscreen) {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        attributes
    }
}

impl ApplicationHandler for Game {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        self.ensure_window_created(event_loop);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        // 持续请求重绘，动作与动画按帧推进
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(mapped) = self.event_mapper.map_window_event(&event) {
            self.dispatch_event(mapped);
        }

        match event {
            WindowEvent::CloseRequested => {
                self.request_exit(event_loop);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        ..
                    },
                ..
            } if self.config.escape_closes => {
                self.request_exit(event_loop);
            }
            WindowEvent::Resized(physical_size) => {
                self.handle_window_resized(physical_size);
            }
            WindowEvent::RedrawRequested => {
                self.handle_redraw_requested();
            }
            _ => (),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let Some(mapped) = self.event_mapper.map_device_event(&event) {
            self.dispatch_event(mapped);
        }
    }
}
