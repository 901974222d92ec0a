//! FLV 容器头部与 Tag 头部.
//!
//! # 布局
//! ```text
//! FLV Header (9 bytes):
//!   "FLV" (3 bytes) | Version (1) | Flags (1): bit0=video, bit2=audio | HeaderLength (4, BE)
//!
//! Tag 头部 (15 bytes, 含前导的 PreviousTagSize):
//!   PreviousTagSize (4, BE)
//!   TagType (1): 8=Audio, 9=Video, 18=Script
//!   DataSize (3, BE)
//!   Timestamp (3, BE) + TimestampExtended (1, 高 8 位)
//!   StreamID (3, BE)
//! ```

use bitflags::bitflags;
use byteorder::{BigEndian, ByteOrder};
use flvscope_core::{FlvError, FlvResult};

/// "FLV" 签名
pub const FLV_SIGNATURE: [u8; 3] = *b"FLV";

bitflags! {
    /// 容器头部中的流存在标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FlvFlags: u8 {
        /// 含视频
        const VIDEO = 0x01;
        /// 含音频
        const AUDIO = 0x04;
    }
}

/// FLV 容器头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlvHeader {
    pub signature: [u8; 3],
    pub version: u8,
    pub flags: FlvFlags,
    /// 头部总长度 (DataOffset), 通常为 9
    pub header_length: u32,
}

impl FlvHeader {
    /// 头部固定长度
    pub const SIZE: usize = 9;

    /// 从至少 9 字节的缓冲区解析, 不校验签名
    pub fn parse(buf: &[u8]) -> FlvResult<Self> {
        if buf.len() < Self::SIZE {
            return Err(FlvError::Truncated {
                field: "flv_header",
                offset: buf.len(),
            });
        }

        Ok(Self {
            signature: [buf[0], buf[1], buf[2]],
            version: buf[3],
            // 保留位原样保存
            flags: FlvFlags::from_bits_retain(buf[4]),
            header_length: BigEndian::read_u32(&buf[5..9]),
        })
    }

    /// 签名是否为 "FLV"
    pub fn has_valid_signature(&self) -> bool {
        self.signature == FLV_SIGNATURE
    }

    pub fn has_video(&self) -> bool {
        self.flags.contains(FlvFlags::VIDEO)
    }

    pub fn has_audio(&self) -> bool {
        self.flags.contains(FlvFlags::AUDIO)
    }
}

/// FLV Tag 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Audio,
    Video,
    Script,
    Unknown(u8),
}

impl TagKind {
    pub fn from_u8(value: u8) -> Self {
        match value {
            8 => Self::Audio,
            9 => Self::Video,
            18 => Self::Script,
            other => Self::Unknown(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Audio => 8,
            Self::Video => 9,
            Self::Script => 18,
            Self::Unknown(v) => v,
        }
    }
}

impl std::fmt::Display for TagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
            Self::Script => write!(f, "script"),
            Self::Unknown(v) => write!(f, "unknown({v})"),
        }
    }
}

/// Tag 头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHeader {
    /// 前一个 Tag 的总长度
    pub previous_tag_size: u32,
    pub kind: TagKind,
    /// Tag 数据长度
    pub data_size: u32,
    /// 时间戳 (毫秒), 扩展字节作为高 8 位
    pub timestamp: u32,
    pub stream_id: u32,
}

impl TagHeader {
    /// 头部固定长度 (含前导 PreviousTagSize)
    pub const SIZE: usize = 15;

    /// 从至少 15 字节的缓冲区解析
    pub fn parse(buf: &[u8]) -> FlvResult<Self> {
        if buf.len() < Self::SIZE {
            return Err(FlvError::Truncated {
                field: "tag_header",
                offset: buf.len(),
            });
        }

        let timestamp = BigEndian::read_u24(&buf[8..11]) | (u32::from(buf[11]) << 24);
        Ok(Self {
            previous_tag_size: BigEndian::read_u32(&buf[0..4]),
            kind: TagKind::from_u8(buf[4]),
            data_size: BigEndian::read_u24(&buf[5..8]),
            timestamp,
            stream_id: BigEndian::read_u24(&buf[12..15]),
        })
    }
}
