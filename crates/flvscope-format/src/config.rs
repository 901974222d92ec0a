//! 解封装器与数据源配置.

use flvscope_core::{FlvError, FlvResult};
use serde::Deserialize;

/// 默认单个 Tag 数据上限 (16 MiB)
pub const DEFAULT_MAX_TAG_SIZE: u32 = 16 * 1024 * 1024;

/// 默认读取块大小 (字节)
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// 解封装器配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DemuxerConfig {
    /// 是否校验 "FLV" 签名
    pub verify_signature: bool,
    /// 单个 Tag 数据长度上限, 超出时该 Tag 报错并跳过
    pub max_tag_size: u32,
}

impl Default for DemuxerConfig {
    fn default() -> Self {
        Self {
            verify_signature: true,
            max_tag_size: DEFAULT_MAX_TAG_SIZE,
        }
    }
}

impl DemuxerConfig {
    /// 校验配置
    pub fn validate(&self) -> FlvResult<()> {
        if self.max_tag_size == 0 {
            return Err(FlvError::InvalidArgument("max_tag_size 不能为 0".into()));
        }
        Ok(())
    }
}

/// 数据源配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// 每次读取的块大小
    pub chunk_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl SourceConfig {
    /// 校验配置
    pub fn validate(&self) -> FlvResult<()> {
        if self.chunk_size == 0 {
            return Err(FlvError::InvalidArgument("chunk_size 不能为 0".into()));
        }
        Ok(())
    }
}
