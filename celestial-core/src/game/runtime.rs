use std::time::Instant;

use nalgebra::Vector2;
use tokio::runtime::Runtime;
use tracing::info;
use winit::event_loop::EventLoop;

use super::system::logic::{AppContext, ViewController, ViewStack};
use crate::{
    audio::AudioOutput,
    config::{GameConfig, WindowConfig, WindowMode},
    event::{Event as GameEvent, EventMapper, GestureRecognizer},
    resource::AssetBundle,
    window::GameWindow,
};

mod dispatch;
mod helpers;
mod windowing;

#[cfg(test)]
mod tests;

/// 应用运行时：持有窗口、控制器栈与共享服务，驱动 winit 事件循环。
///
/// 所有控制器回调都在 winit 线程上通过内部 tokio runtime 同步执行，
/// 因此一帧内的 `update`、事件处理与快照采集严格串行。
pub struct Game {
    config: GameConfig,
    window: Option<GameWindow>,

    stack: ViewStack,
    context: AppContext,
    root: Option<Box<dyn ViewController>>,
    _audio: AudioOutput,

    event_mapper: Box<dyn EventMapper>,

    last_redraw: Instant,
    stopped: bool,

    runtime: Runtime,
}

impl Game {
    /// 创建运行时。`root` 在窗口创建后被加载并呈现为最底层画面。
    pub fn new<C>(config: GameConfig, root: C) -> anyhow::Result<Self>
    where
        C: ViewController + 'static,
    {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        info!(target: "celestial-core", "Celestial v{}", env!("CARGO_PKG_VERSION"));

        let audio = AudioOutput::open();
        let context = AppContext::new(AssetBundle::new(config.assets_dir.clone()), audio.player());
        let stack = ViewStack::new(Self::canvas_size(&config.window));

        Ok(Self {
            config,
            window: None,
            stack,
            context,
            root: Some(Box::new(root)),
            _audio: audio,
            event_mapper: Box::new(GestureRecognizer::new()),
            last_redraw: Instant::now(),
            stopped: false,
            runtime,
        })
    }

    fn canvas_size(window: &WindowConfig) -> Vector2<f32> {
        Vector2::new(window.width.max(1) as f32, window.height.max(1) as f32)
    }

    /// 控制器共享的资源包与音频句柄。
    pub fn context(&self) -> &AppContext {
        &self.context
    }

    #[cfg(test)]
    pub(crate) fn stack(&self) -> &ViewStack {
        &self.stack
    }

    pub fn run(mut self) -> anyhow::Result<()> {
        let event_loop = EventLoop::new()?;
        Ok(event_loop.run_app(&mut self)?)
    }

    fn dispatch_close(&mut self) {
        self.dispatch_event(GameEvent::CloseRequested);
        self.stopped = true;
    }
}
