//! 探测工具配置.
//!
//! 配置文件为 JSON, 所有字段均可省略:
//! ```json
//! {
//!   "demuxer": { "verify_signature": true, "max_tag_size": 16777216 },
//!   "source": { "chunk_size": 1024 },
//!   "logging": { "level": "info", "directory": "logs", "file_prefix": "flvscope-probe" }
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use flvscope_format::{DemuxerConfig, SourceConfig};
use serde::Deserialize;

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// 文件日志级别 (EnvFilter 语法)
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_directory")]
    pub directory: String,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

fn default_level() -> String {
    "info".into()
}

fn default_directory() -> String {
    "logs".into()
}

fn default_file_prefix() -> String {
    "flvscope-probe".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: default_directory(),
            file_prefix: default_file_prefix(),
        }
    }
}

/// 完整配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub demuxer: DemuxerConfig,
    pub source: SourceConfig,
    pub logging: LoggingConfig,
}

impl ProbeConfig {
    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.demuxer.validate()?;
        self.source.validate()?;
        Ok(())
    }
}
