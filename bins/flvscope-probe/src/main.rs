//! flvscope-probe - FLV 流信息探测工具
//!
//! 逐块读取 FLV 文件, 按 Tag 输出容器头部、音视频描述、AVC 参数集与脚本数据.

mod config;
mod logging;
mod output;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use flvscope_format::{FileSource, FlvDemuxer, drive};

use config::ProbeConfig;
use output::{EventFilter, EventRecord, Summary};

/// FLV 流信息探测工具
#[derive(Parser, Debug)]
#[command(name = "flvscope-probe", version, about = "纯 Rust FLV 流信息探测工具")]
struct Cli {
    /// 输入文件路径
    input: PathBuf,

    /// JSON 配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// 输出 JSON (每个事件一行)
    #[arg(long)]
    json: bool,

    /// 只输出指定类型的 Tag
    #[arg(long, value_enum, default_value_t = EventFilter::All)]
    filter: EventFilter,

    /// 读取块大小 (字节), 覆盖配置文件
    #[arg(long)]
    chunk_size: Option<usize>,

    /// 不校验 "FLV" 签名
    #[arg(long)]
    no_verify_signature: bool,

    /// 提高文件日志级别 (-v=debug, -vv=trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// 静默模式 (不输出汇总, 控制台只输出 error 日志)
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================
// 主逻辑
// ============================================================

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init(&config.logging, cli.verbose, cli.quiet)?;
    tracing::info!(
        "flvscope-probe {} 开始探测: {}",
        env!("CARGO_PKG_VERSION"),
        cli.input.display()
    );

    run(&cli, &config)
}

/// 加载配置文件并应用命令行覆盖
fn resolve_config(cli: &Cli) -> Result<ProbeConfig> {
    let mut config = match &cli.config {
        Some(path) => ProbeConfig::load(path)?,
        None => ProbeConfig::default(),
    };

    if let Some(chunk_size) = cli.chunk_size {
        config.source.chunk_size = chunk_size;
    }
    if cli.no_verify_signature {
        config.demuxer.verify_signature = false;
    }
    config.validate().context("命令行参数无效")?;
    Ok(config)
}

fn run(cli: &Cli, config: &ProbeConfig) -> Result<()> {
    let mut source = FileSource::open(&cli.input, config.source.chunk_size)
        .with_context(|| format!("打开输入文件失败: {}", cli.input.display()))?;
    let mut demuxer = FlvDemuxer::new(config.demuxer.clone());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut summary = Summary::default();
    let mut write_error = None;

    let leftover = drive(&mut source, &mut demuxer, |result| {
        if write_error.is_some() {
            return;
        }
        let record = match result {
            Ok(event) => {
                summary.record(&event);
                if !cli.filter.accepts(&event) {
                    return;
                }
                EventRecord::from_event(&event)
            }
            Err(e) => {
                summary.errors += 1;
                tracing::warn!("Tag 解析失败: {}", e);
                EventRecord::from_error(&e)
            }
        };
        if let Err(e) = emit(&mut out, &record, cli.json) {
            write_error = Some(e);
        }
    })
    .with_context(|| format!("解析失败: {}", cli.input.display()))?;

    if let Some(e) = write_error {
        return Err(e);
    }

    tracing::info!(
        "探测完成: video={}, audio={}, metadata={}, errors={}, leftover={}",
        summary.video,
        summary.audio,
        summary.metadata,
        summary.errors,
        leftover
    );

    if !cli.quiet {
        emit(&mut out, &summary.to_record(leftover), cli.json)?;
    }
    out.flush()?;
    Ok(())
}

fn emit(out: &mut impl Write, record: &EventRecord, json: bool) -> Result<()> {
    if json {
        writeln!(out, "{}", record.to_json()?)?;
    } else {
        writeln!(out, "{}", record.to_text())?;
    }
    Ok(())
}
