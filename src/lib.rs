//! # flvscope
//!
//! 纯 Rust 实现的 FLV 流式解析与 H.264 参数集分析库.
//!
//! - **容器解封装**: 输入可按任意大小分块到达, 在块边界处挂起并继续
//! - **H.264 参数集**: AVC sequence header、SPS/PPS 字段级解析
//! - **脚本数据**: AMF0 onMetaData 解码
//!
//! # 快速开始
//!
//! ```rust
//! use flvscope::format::{FlvDemuxer, FlvEvent};
//!
//! let mut demuxer = FlvDemuxer::default();
//! let events = demuxer.decode(b"FLV\x01\x05\x00\x00\x00\x09");
//! assert!(matches!(events[0], Ok(FlvEvent::Header(_))));
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `flvscope-core` | 错误类型、比特流读取、Exp-Golomb |
//! | `flvscope-codec` | H.264 NAL / SPS / PPS / AVCC 解析 |
//! | `flvscope-format` | FLV 解封装状态机、Tag 解析、数据源 |

/// 核心类型与工具
pub use flvscope_core as core;

/// H.264 码流解析
pub use flvscope_codec as codec;

/// FLV 容器解封装
pub use flvscope_format as format;

/// 获取 flvscope 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
