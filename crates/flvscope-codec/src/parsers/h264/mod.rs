//! H.264/AVC 码流解析器.
//!
//! 提供对 FLV/MP4 中 AVCC (长度前缀) 格式码流的解析能力:
//! - NAL 单元分割与类型识别
//! - 防竞争字节 (emulation prevention) 移除
//! - SPS (Sequence Parameter Set) 解析
//! - PPS (Picture Parameter Set) 解析
//! - AVCDecoderConfigurationRecord (sequence header) 解析

pub mod avcc;
pub mod nal;
pub mod pps;
pub mod sps;

pub use avcc::SequenceHeader;
pub use nal::{
    NalPriority, NalUnit, NalUnitType, remove_emulation_prevention, split_length_prefixed,
};
pub use pps::{Pps, parse_pps};
pub use sps::{Sps, parse_sps};

/// NAL 单元中解析出的参数集
#[derive(Debug, Clone, serde::Serialize)]
pub enum ParameterSet {
    /// 序列参数集
    Sps(Sps),
    /// 图像参数集
    Pps(Pps),
}

impl ParameterSet {
    /// 若 NAL 单元为 SPS/PPS, 解析其 RBSP; 其他类型返回 `None`
    pub fn from_nal(nalu: &NalUnit) -> flvscope_core::FlvResult<Option<Self>> {
        match nalu.nal_type {
            NalUnitType::Sps => Ok(Some(Self::Sps(parse_sps(&nalu.rbsp())?))),
            NalUnitType::Pps => Ok(Some(Self::Pps(parse_pps(&nalu.rbsp())?))),
            _ => Ok(None),
        }
    }
}
