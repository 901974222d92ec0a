//! H.264 NAL (Network Abstraction Layer) 单元解析.
//!
//! # NAL 头部 (1 字节)
//! ```text
//! ┌─────────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5) │
//! └─────────────────────────────────────┘
//! ```
//!
//! # AVCC 格式
//!
//! FLV 的 AVC NALU 包使用长度前缀分隔 NAL 单元, 前缀宽度 (1-4 字节)
//! 来自 sequence header 的 lengthSizeMinusOne + 1:
//! ```text
//! [length: N bytes BE] [NAL data: length bytes] [length] [NAL data] ...
//! ```

use bytes::Bytes;
use flvscope_core::{FlvError, FlvResult};

/// NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    /// 非 IDR 图像切片 (P/B slice)
    Slice,
    /// 数据分区 A (DPA)
    SliceDpa,
    /// 数据分区 B (DPB)
    SliceDpb,
    /// 数据分区 C (DPC)
    SliceDpc,
    /// IDR 图像切片 (关键帧)
    SliceIdr,
    /// 增补增强信息 (SEI)
    Sei,
    /// 序列参数集 (SPS)
    Sps,
    /// 图像参数集 (PPS)
    Pps,
    /// 访问单元分隔符 (AUD)
    Aud,
    /// 序列结束
    EndOfSequence,
    /// 流结束
    EndOfStream,
    /// 填充数据
    FillerData,
    /// SPS 扩展
    SpsExtension,
    /// 辅助图像切片
    AuxiliarySlice,
    /// 保留或未指定类型
    Unknown(u8),
}

impl NalUnitType {
    /// 从 NAL 类型编号创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id {
            1 => Self::Slice,
            2 => Self::SliceDpa,
            3 => Self::SliceDpb,
            4 => Self::SliceDpc,
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            13 => Self::SpsExtension,
            19 => Self::AuxiliarySlice,
            _ => Self::Unknown(type_id),
        }
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Slice => 1,
            Self::SliceDpa => 2,
            Self::SliceDpb => 3,
            Self::SliceDpc => 4,
            Self::SliceIdr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::Aud => 9,
            Self::EndOfSequence => 10,
            Self::EndOfStream => 11,
            Self::FillerData => 12,
            Self::SpsExtension => 13,
            Self::AuxiliarySlice => 19,
            Self::Unknown(id) => *id,
        }
    }

    /// 是否为 VCL (Video Coding Layer) NAL
    pub fn is_vcl(&self) -> bool {
        matches!(
            self,
            Self::Slice | Self::SliceDpa | Self::SliceDpb | Self::SliceDpc | Self::SliceIdr
        )
    }

    /// 是否为参数集 (SPS/PPS)
    pub fn is_parameter_set(&self) -> bool {
        matches!(self, Self::Sps | Self::Pps)
    }
}

impl std::fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slice => write!(f, "slice"),
            Self::SliceDpa => write!(f, "dpa"),
            Self::SliceDpb => write!(f, "dpb"),
            Self::SliceDpc => write!(f, "dpc"),
            Self::SliceIdr => write!(f, "idr_slice"),
            Self::Sei => write!(f, "sei"),
            Self::Sps => write!(f, "sps"),
            Self::Pps => write!(f, "pps"),
            Self::Aud => write!(f, "aud"),
            Self::EndOfSequence => write!(f, "end_sequence"),
            Self::EndOfStream => write!(f, "end_stream"),
            Self::FillerData => write!(f, "filler_data"),
            Self::SpsExtension => write!(f, "sps_ext"),
            Self::AuxiliarySlice => write!(f, "auxiliary_slice"),
            Self::Unknown(id) => write!(f, "unknown({id})"),
        }
    }
}

/// nal_ref_idc 表示的参考重要性
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NalPriority {
    /// 0: 可丢弃
    Disposable,
    /// 1
    Low,
    /// 2
    High,
    /// 3
    Highest,
}

impl NalPriority {
    /// 从 2 位 nal_ref_idc 创建, 仅使用低 2 位
    pub fn from_ref_idc(ref_idc: u8) -> Self {
        match ref_idc & 0x03 {
            0 => Self::Disposable,
            1 => Self::Low,
            2 => Self::High,
            _ => Self::Highest,
        }
    }

    /// 获取 nal_ref_idc 数值
    pub fn ref_idc(&self) -> u8 {
        match self {
            Self::Disposable => 0,
            Self::Low => 1,
            Self::High => 2,
            Self::Highest => 3,
        }
    }
}

impl std::fmt::Display for NalPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disposable => write!(f, "disposable"),
            Self::Low => write!(f, "low"),
            Self::High => write!(f, "high"),
            Self::Highest => write!(f, "highest"),
        }
    }
}

/// 解析后的 NAL 单元
#[derive(Debug, Clone)]
pub struct NalUnit {
    /// forbidden_zero_bit, 合法码流中应为 0
    pub forbidden_bit: bool,
    /// 参考重要性 (nal_ref_idc)
    pub priority: NalPriority,
    /// NAL 单元类型
    pub nal_type: NalUnitType,
    /// NAL 单元原始数据 (不含长度前缀, 含 NAL 头部字节)
    pub data: Bytes,
}

impl NalUnit {
    /// 从 NAL 数据 (含头部字节) 解析
    ///
    /// forbidden_zero_bit 置位时只记录, 不拒绝.
    pub fn parse(data: Bytes) -> FlvResult<Self> {
        let Some(&header) = data.first() else {
            return Err(FlvError::InvalidData("H.264: NAL 单元数据为空".into()));
        };

        Ok(Self {
            forbidden_bit: (header >> 7) & 1 == 1,
            priority: NalPriority::from_ref_idc((header >> 5) & 0x03),
            nal_type: NalUnitType::from_type_id(header & 0x1F),
            data,
        })
    }

    /// NAL 单元长度 (含头部字节)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空 (解析成功的 NAL 单元至少含头部字节)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 获取 RBSP (Raw Byte Sequence Payload) 数据
    ///
    /// 移除 NAL 头部字节和 emulation prevention 字节.
    pub fn rbsp(&self) -> Vec<u8> {
        remove_emulation_prevention(&self.data[1..])
    }
}

/// 从长度前缀数据中提取全部 NAL 单元
///
/// `length_size` 来自 sequence header, 必须在 1-4 之间.
/// 长度字段截断或声明长度越界都视为整个包损坏.
pub fn split_length_prefixed(data: &Bytes, length_size: usize) -> FlvResult<Vec<NalUnit>> {
    if !(1..=4).contains(&length_size) {
        return Err(FlvError::InvalidArgument(format!(
            "H.264: NAL 长度前缀宽度非法, length_size={}",
            length_size
        )));
    }

    let mut nalus = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        if pos + length_size > data.len() {
            return Err(FlvError::Truncated {
                field: "nal_length",
                offset: pos,
            });
        }

        let nal_len = data[pos..pos + length_size]
            .iter()
            .fold(0usize, |acc, &b| (acc << 8) | b as usize);
        pos += length_size;

        if nal_len == 0 {
            return Err(FlvError::InvalidData(format!(
                "H.264: NAL 长度为 0, offset={}",
                pos - length_size
            )));
        }
        if pos + nal_len > data.len() {
            return Err(FlvError::Truncated {
                field: "nal_unit",
                offset: pos,
            });
        }

        nalus.push(NalUnit::parse(data.slice(pos..pos + nal_len))?);
        pos += nal_len;
    }

    Ok(nalus)
}

/// 移除 emulation prevention 字节 (0x00 0x00 0x03 → 0x00 0x00)
///
/// 正向扫描, 连续两个 0x00 之后的 0x03 被丢弃, 零计数随之清零.
/// 若 0x03 已是最后一个字节, 保留该字节并结束扫描.
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());
    let mut zeros = 0usize;

    for (i, &byte) in data.iter().enumerate() {
        if zeros >= 2 && byte == 0x03 {
            if i + 1 == data.len() {
                rbsp.push(byte);
                break;
            }
            zeros = 0;
            continue;
        }

        zeros = if byte == 0x00 { zeros + 1 } else { 0 };
        rbsp.push(byte);
    }

    rbsp
}
