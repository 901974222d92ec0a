//! 日志初始化模块.
//!
//! 双输出:
//! - console: stderr, 彩色, 默认 warn, `--quiet` 时只输出 error
//! - file: 无色, 默认取配置级别, 可通过 -v/-vv 或 FLVSCOPE_LOG 环境变量调整
//!
//! 日志文件输出到 {directory}/{prefix}.{date}.log, 按天滚动.
//! 库中通过 `log` 宏输出的记录经由 tracing-log 桥接进入同一订阅者.

use anyhow::{Context, Result};
use chrono::{Datelike, Local, Timelike};
use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::config::LoggingConfig;

/// 文件日志级别环境变量
pub const LOG_ENV: &str = "FLVSCOPE_LOG";

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// 初始化日志系统
///
/// - `verbosity`: 0=配置级别, 1=debug, 2+=trace (由 -v/-vv 控制)
pub fn init(config: &LoggingConfig, verbosity: u8, quiet: bool) -> Result<()> {
    std::fs::create_dir_all(&config.directory)
        .with_context(|| format!("创建日志目录失败: {}", config.directory))?;

    let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .build(&config.directory)
        .context("创建日志文件失败")?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    LOG_GUARD.set(guard).ok();

    let console_filter = EnvFilter::new(if quiet { "error" } else { "warn" });
    let console_layer = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .event_format(ConsoleFormatter)
        .with_filter(console_filter);

    let file_filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(file_level(&config.level, verbosity)));
    let file_layer = fmt::Layer::default()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("初始化日志订阅者失败")?;
    Ok(())
}

/// 根据 -v 次数确定文件日志级别
fn file_level(configured: &str, verbosity: u8) -> &str {
    match verbosity {
        0 => configured,
        1 => "debug",
        _ => "trace",
    }
}

/// 时间戳前缀: [月-日 时:分:秒.毫秒]
fn write_timestamp(writer: &mut Writer<'_>) -> std::fmt::Result {
    let now = Local::now();
    write!(
        writer,
        "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}] ",
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.timestamp_subsec_millis(),
    )
}

/// Console 格式: 彩色级别 + 消息
struct ConsoleFormatter;

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let level = *event.metadata().level();
        let color = match level {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        };
        write_timestamp(&mut writer)?;
        write!(writer, "{}{:5}\x1b[0m > ", color, level)?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// File 格式: 无色, 时间戳 + 级别 + target + 消息
struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        write_timestamp(&mut writer)?;
        write!(writer, "{:5} {} > ", meta.level(), meta.target())?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
