//! # flvscope-format
//!
//! FLV 容器流式解封装库.
//!
//! 输入可以按任意大小分块到达, 解封装器在块边界处挂起并在下次输入后继续,
//! 输出容器头部、视频/音频 Tag 描述以及脚本 (onMetaData) 数据.

pub mod audio;
pub mod config;
pub mod demuxer;
pub mod io;
pub mod script;
pub mod tag;
pub mod video;

// 重导出常用类型
pub use audio::AudioTag;
pub use config::{DemuxerConfig, SourceConfig};
pub use demuxer::{FlvDemuxer, FlvEvent, FlvState};
pub use io::{ByteSource, FileSource, MemorySource, drive};
pub use script::{Amf0Decoder, ScriptValue, ValueDecoder};
pub use tag::{FlvFlags, FlvHeader, TagHeader, TagKind};
pub use video::{AvcPacket, VideoTag};
