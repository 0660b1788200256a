use std::path::PathBuf;

/// 窗口模式。
pub enum WindowMode {
    Windowed,
    Fullscreen,
}

/// 窗口配置。
///
/// 用于控制窗口标题、初始尺寸、是否开启垂直同步等。
/// `width`/`height` 同时也是界面层（overlay）的画布尺寸，单位为点；窗口缩放时画布整体拉伸。
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub mode: WindowMode,
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: String::from("Celestial"),
            width: 1000,
            height: 800,
            mode: WindowMode::Windowed,
            vsync: true,
        }
    }
}

/// 引擎运行配置。
///
/// - `window`：窗口相关配置
/// - `escape_closes`：是否允许按下 `Esc` 关闭窗口
/// - `assets_dir`：资源根目录（图片、音频、字体）
/// - `max_frame_delta_ms`：单帧推进动画的最大时长，避免窗口拖动/挂起后动画一次跳过太多
pub struct GameConfig {
    pub window: WindowConfig,
    pub escape_closes: bool,
    pub assets_dir: PathBuf,
    pub max_frame_delta_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            escape_closes: true,
            assets_dir: PathBuf::from("assets"),
            max_frame_delta_ms: 250,
        }
    }
}
