//! AVCDecoderConfigurationRecord (FLV AVC sequence header) 解析.
//!
//! # 结构
//! ```text
//! configurationVersion(8) AVCProfileIndication(8) profile_compatibility(8)
//! AVCLevelIndication(8) reserved(6) lengthSizeMinusOne(2)
//! reserved(3) numOfSPS(5) { spsLength(16) spsNALUnit }...
//! numOfPPS(8) { ppsLength(16) ppsNALUnit }...
//! ```

use bytes::{Buf, Bytes};
use flvscope_core::{FlvError, FlvResult};
use log::{debug, warn};
use serde::Serialize;

use super::nal::{NalUnit, NalUnitType};
use super::pps::{Pps, parse_pps};
use super::sps::{Sps, parse_sps};

/// AVC sequence header 解析结果
///
/// 每个流保存一份, NALU 包按其中的 `length_size` 切分.
/// SPS 字段解码失败不影响 `length_size`, 此时 `sps` 为 `None`, 错误信息记录在 `sps_error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceHeader {
    pub configuration_version: u8,
    pub profile_indication: u8,
    pub profile_compatibility: u8,
    pub level_indication: u8,
    /// NAL 长度前缀宽度 (1-4 字节)
    pub length_size: usize,
    /// 第一个 SPS
    pub sps: Option<Sps>,
    /// 第一个 SPS 的解码错误
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sps_error: Option<String>,
    /// 成功解码的 PPS (可为空)
    pub pps: Vec<Pps>,
}

impl SequenceHeader {
    /// 解析 AVCDecoderConfigurationRecord
    ///
    /// 至少需要一个 SPS; SPS 槽位中出现其他类型的 NAL 单元视为无效数据.
    /// 记录本身截断时返回错误; SPS/PPS 内部字段解码失败只记录, 不使整条记录失败.
    pub fn parse(record: &Bytes) -> FlvResult<Self> {
        let mut buf = record.clone();
        let total = record.len();

        let configuration_version = read_u8(&mut buf, total, "configuration_version")?;
        let profile_indication = read_u8(&mut buf, total, "profile_indication")?;
        let profile_compatibility = read_u8(&mut buf, total, "profile_compatibility")?;
        let level_indication = read_u8(&mut buf, total, "level_indication")?;
        let length_size = usize::from(read_u8(&mut buf, total, "length_size_minus_one")? & 0x03) + 1;

        let num_sps = read_u8(&mut buf, total, "num_of_sps")? & 0x1F;
        if num_sps == 0 {
            return Err(FlvError::InvalidData(
                "AVC sequence header 中没有 SPS".into(),
            ));
        }

        let (sps, sps_error) = match parse_sps(&read_sps_nal(&mut buf, total)?.rbsp()) {
            Ok(sps) => (Some(sps), None),
            Err(e) => {
                warn!("AVCC: SPS 字段解码失败, 保留长度前缀宽度 {}: {}", length_size, e);
                (None, Some(e.to_string()))
            }
        };
        for index in 1..num_sps {
            let nalu = read_sps_nal(&mut buf, total)?;
            match parse_sps(&nalu.rbsp()) {
                Ok(extra) => debug!(
                    "AVCC: 额外的 SPS #{}, sps_id={}, profile={}",
                    index, extra.sps_id, extra.profile_idc,
                ),
                Err(e) => debug!("AVCC: 额外的 SPS #{} 解码失败: {}", index, e),
            }
        }

        let num_pps = read_u8(&mut buf, total, "num_of_pps")?;
        let mut pps = Vec::with_capacity(usize::from(num_pps));
        for _ in 0..num_pps {
            let nalu = read_nal(&mut buf, total, "pps_length", "pps_nal_unit")?;
            if nalu.nal_type != NalUnitType::Pps {
                debug!("AVCC: PPS 槽位中出现 {} 类型的 NAL 单元, 跳过", nalu.nal_type);
                continue;
            }
            match parse_pps(&nalu.rbsp()) {
                Ok(set) => pps.push(set),
                Err(e) => warn!("AVCC: PPS 字段解码失败, 跳过: {}", e),
            }
        }

        if buf.has_remaining() {
            debug!("AVCC: 记录末尾剩余 {} 字节未解析", buf.remaining());
        }

        debug!(
            "AVCC: version={}, profile={}, level={}, length_size={}, pps={}",
            configuration_version,
            profile_indication,
            level_indication,
            length_size,
            pps.len(),
        );

        Ok(Self {
            configuration_version,
            profile_indication,
            profile_compatibility,
            level_indication,
            length_size,
            sps,
            sps_error,
            pps,
        })
    }
}

/// 读取 SPS 槽位中的 NAL 单元, 类型必须为 SPS
fn read_sps_nal(buf: &mut Bytes, total: usize) -> FlvResult<NalUnit> {
    let nalu = read_nal(buf, total, "sps_length", "sps_nal_unit")?;
    if nalu.nal_type != NalUnitType::Sps {
        return Err(FlvError::InvalidData(format!(
            "SPS 槽位中出现非 SPS 的 NAL 单元: {}",
            nalu.nal_type,
        )));
    }
    Ok(nalu)
}

fn read_u8(buf: &mut Bytes, total: usize, field: &'static str) -> FlvResult<u8> {
    if buf.remaining() < 1 {
        return Err(FlvError::Truncated {
            field,
            offset: total - buf.remaining(),
        });
    }
    Ok(buf.get_u8())
}

/// 读取 u16 BE 长度前缀及其后的 NAL 单元
fn read_nal(
    buf: &mut Bytes,
    total: usize,
    length_field: &'static str,
    unit_field: &'static str,
) -> FlvResult<NalUnit> {
    if buf.remaining() < 2 {
        return Err(FlvError::Truncated {
            field: length_field,
            offset: total - buf.remaining(),
        });
    }
    let len = usize::from(buf.get_u16());
    if buf.remaining() < len {
        return Err(FlvError::Truncated {
            field: unit_field,
            offset: total - buf.remaining(),
        });
    }
    NalUnit::parse(buf.split_to(len))
}
