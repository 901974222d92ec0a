//! # flvscope-codec
//!
//! flvscope 码流解析库.
//!
//! 目前提供 H.264/AVC 的 NAL 单元分割、防竞争字节移除, 以及 SPS/PPS 与
//! AVCDecoderConfigurationRecord 的字段级解析. 不做像素重建.

pub mod parsers;

// 重导出常用类型
pub use parsers::h264::{NalUnit, NalUnitType, ParameterSet, Pps, SequenceHeader, Sps};
