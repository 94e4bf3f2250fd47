//! 日志系统初始化
//!
//! 基于 `tracing-subscriber` 实现分阶段日志控制。

use azote_config::{LogConfig, LogLevel, Phase};
use std::io;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
    EnvFilter, Layer,
};

/// API 层日志目标
pub const TARGET: &str = "azote::api";

/// 日志输出格式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 彩色格式化（开发使用）
    Pretty,
    /// 紧凑格式
    #[default]
    Compact,
    /// JSON 格式（工具集成）
    Json,
}

/// 配置中的日志级别映射到 tracing 的过滤级别
pub fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Trace => LevelFilter::TRACE,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
    }
}

/// 按阶段构建过滤目标
pub fn targets(log_config: &LogConfig) -> Targets {
    let global = level_filter(log_config.global);
    [Phase::Compiler, Phase::Vm]
        .into_iter()
        .fold(Targets::new().with_default(global), |targets, phase| {
            targets.with_target(phase.target(), level_filter(log_config.level_for(phase)))
        })
        .with_target(TARGET, global)
}

/// 使用指定格式和日志配置初始化日志系统
///
/// 全局 subscriber 只能安装一次，重复调用返回错误。
pub fn init_with_format(log_config: &LogConfig, format: LogFormat) -> Result<(), TryInitError> {
    let layer = create_format_layer(format, io::stderr).with_filter(targets(log_config));
    tracing_subscriber::registry().with(layer).try_init()
}

/// 测试用日志：输出交给测试框架捕获，级别来自 `RUST_LOG`
pub fn init_test_logger() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Create formatter layer based on format
fn create_format_layer<W, F>(
    format: LogFormat,
    make_writer: F,
) -> Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>
where
    W: io::Write + Send + Sync + 'static,
    F: Fn() -> W + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
    }
}
