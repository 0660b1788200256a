use std::time::Duration;

use tracing::{error, trace, warn};

use super::helpers::{canvas_scale, clamp_frame_delta, gesture_to_canvas};
use super::{Game, GameEvent};
use crate::game::system::render::FrameSnapshot;

impl Game {
    /// 加载并呈现根控制器（只执行一次）。
    pub(super) fn present_root(&mut self) {
        let Some(root) = self.root.take() else {
            return;
        };
        if let Err(err) = self.runtime.block_on(self.stack.present(root, &self.context)) {
            error!(target: "celestial-core", error = format!("{err:#}"), "failed to present root view controller");
        }
    }

    /// 推进一帧：动作、动画与栈顶控制器的 `update`。
    pub(super) fn advance(&mut self, elapsed: Duration) {
        let delta = clamp_frame_delta(elapsed, self.config.max_frame_delta_ms);
        if let Err(err) = self.runtime.block_on(self.stack.update(delta, &self.context)) {
            warn!(target: "celestial-core", error = format!("{err:#}"), "view controller update failed");
        }
    }

    /// 把映射后的事件交给控制器栈。手势先从物理像素换算到画布坐标。
    pub(super) fn dispatch_event(&mut self, event: GameEvent) {
        trace!(target: "celestial-core", "dispatch event: {:?}", event);
        let result = match event {
            GameEvent::Gesture(gesture) => {
                let scale = canvas_scale(self.stack.canvas(), self.framebuffer_size());
                let gesture = gesture_to_canvas(gesture, scale);
                self.runtime
                    .block_on(self.stack.handle_gesture(gesture, &self.context))
            }
            event => self.runtime.block_on(self.stack.dispatch(&event, &self.context)),
        };
        if let Err(err) = result {
            warn!(target: "celestial-core", error = format!("{err:#}"), "view controller on_event failed");
        }
    }

    /// 采集栈顶画面的渲染快照。
    pub(super) fn capture_frame(&self) -> FrameSnapshot {
        let framebuffer_size = self.framebuffer_size();
        match self.stack.top() {
            Some(view) => FrameSnapshot::capture(view, framebuffer_size),
            None => FrameSnapshot::empty(self.stack.canvas()),
        }
    }

    pub(super) fn framebuffer_size(&self) -> (u32, u32) {
        match &self.window {
            Some(window) => window.framebuffer_size(),
            None => {
                let canvas = self.stack.canvas();
                (canvas.x as u32, canvas.y as u32)
            }
        }
    }
}
