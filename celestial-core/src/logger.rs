use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::time, layer::SubscriberExt, util::SubscriberInitExt};

/// 初始化日志/追踪（tracing）订阅者。
///
/// - 默认会读取环境变量（由 `tracing_subscriber::EnvFilter` 支持），用于覆盖/追加过滤规则。
/// - Debug 构建下日志更详细；Release 构建下只保留信息级别以上。
///
/// 注意：该函数应在应用启动早期调用一次；重复初始化会返回错误。
pub fn init() -> anyhow::Result<()> {
    let (level, quiet, noisy) = if cfg!(debug_assertions) {
        ("debug", "info", "warn")
    } else {
        ("info", "error", "error")
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?
        .add_directive(format!("celestial-core={level}").parse()?)
        .add_directive(format!("celestial={level}").parse()?)
        .add_directive(format!("calloop={quiet}").parse()?)
        .add_directive(format!("winit={noisy}").parse()?)
        .add_directive(format!("naga={noisy}").parse()?)
        .add_directive(format!("sctk={noisy}").parse()?)
        .add_directive(format!("symphonia={noisy}").parse()?)
        .add_directive("wgpu_hal=error".parse()?)
        .add_directive("wgpu_core=error".parse()?);

    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_timer(time::uptime()),
        )
        .with(filter)
        .try_init()?;
    Ok(())
}
