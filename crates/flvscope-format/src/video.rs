//! FLV 视频 Tag 解析.
//!
//! # 视频 Tag 数据
//! ```text
//! FrameType (4 bits) | CodecID (4 bits)
//! [AVC: AVCPacketType (1 byte): 0=SeqHeader, 1=NALU, 2=EndOfSeq]
//! [AVC: CompositionTimeOffset (3 bytes, BE, signed)]
//! ```

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use flvscope_codec::parsers::h264::{ParameterSet, split_length_prefixed};
use flvscope_codec::{NalUnit, SequenceHeader};
use flvscope_core::{FlvError, FlvResult};
use log::{debug, warn};

/// 帧类型 (FrameType)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Key,
    Inter,
    DisposableInter,
    GeneratedKey,
    VideoInfoCommand,
    Unknown(u8),
}

impl FrameType {
    pub fn from_id(id: u8) -> Self {
        match id {
            1 => Self::Key,
            2 => Self::Inter,
            3 => Self::DisposableInter,
            4 => Self::GeneratedKey,
            5 => Self::VideoInfoCommand,
            other => Self::Unknown(other),
        }
    }

    pub fn is_keyframe(self) -> bool {
        matches!(self, Self::Key | Self::GeneratedKey)
    }
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key => write!(f, "key"),
            Self::Inter => write!(f, "inter"),
            Self::DisposableInter => write!(f, "disposable_inter"),
            Self::GeneratedKey => write!(f, "generated_key"),
            Self::VideoInfoCommand => write!(f, "info"),
            Self::Unknown(id) => write!(f, "unknown({id})"),
        }
    }
}

/// 视频编码 (CodecID)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H263,
    Screen,
    Vp6,
    Vp6Alpha,
    Screen2,
    Avc,
    RealH263,
    Mpeg4,
    Hevc,
    Unknown(u8),
}

impl VideoCodec {
    pub fn from_id(id: u8) -> Self {
        match id {
            2 => Self::H263,
            3 => Self::Screen,
            4 => Self::Vp6,
            5 => Self::Vp6Alpha,
            6 => Self::Screen2,
            7 => Self::Avc,
            8 => Self::RealH263,
            9 => Self::Mpeg4,
            12 => Self::Hevc,
            other => Self::Unknown(other),
        }
    }
}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::H263 => "h263",
            Self::Screen => "screen",
            Self::Vp6 => "vp6",
            Self::Vp6Alpha => "vp6_alpha",
            Self::Screen2 => "screen2",
            Self::Avc => "avc",
            Self::RealH263 => "real_h263",
            Self::Mpeg4 => "mpeg4",
            Self::Hevc => "hevc",
            Self::Unknown(id) => return write!(f, "unknown({id})"),
        };
        f.write_str(name)
    }
}

/// AVC 包类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvcPacketType {
    SequenceHeader,
    Nalu,
    EndOfSequence,
    Unknown(u8),
}

impl AvcPacketType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::SequenceHeader,
            1 => Self::Nalu,
            2 => Self::EndOfSequence,
            other => Self::Unknown(other),
        }
    }
}

impl std::fmt::Display for AvcPacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SequenceHeader => write!(f, "sequence_header"),
            Self::Nalu => write!(f, "nalu"),
            Self::EndOfSequence => write!(f, "end_of_sequence"),
            Self::Unknown(v) => write!(f, "unknown({v})"),
        }
    }
}

/// AVC 视频包
#[derive(Debug, Clone)]
pub struct AvcPacket {
    pub packet_type: AvcPacketType,
    /// 合成时间偏移 (毫秒, 24 位有符号)
    pub composition_time: i32,
    /// NALU 包中的全部 NAL 单元
    pub units: Vec<NalUnit>,
    /// 带内 SPS/PPS
    pub parameter_sets: Vec<ParameterSet>,
}

/// 视频 Tag 描述
#[derive(Debug, Clone)]
pub struct VideoTag {
    pub frame_type: FrameType,
    pub codec: VideoCodec,
    /// 仅 AVC 携带
    pub avc: Option<AvcPacket>,
}

/// 视频 Tag 解析结果
#[derive(Debug, Clone)]
pub struct ParsedVideo {
    pub tag: VideoTag,
    /// AVC sequence header 包解析出的配置
    pub sequence_header: Option<SequenceHeader>,
}

/// 解析视频 Tag 数据
///
/// NALU 包按 `sequence_header` 中的长度前缀宽度切分, 未收到 sequence header
/// 时返回 `FlvError::MissingSequenceHeader`.
pub fn parse_video_tag(
    payload: &Bytes,
    sequence_header: Option<&SequenceHeader>,
) -> FlvResult<ParsedVideo> {
    let Some(&selector) = payload.first() else {
        return Err(FlvError::Truncated {
            field: "video_header",
            offset: 0,
        });
    };

    let frame_type = FrameType::from_id(selector >> 4);
    let codec = VideoCodec::from_id(selector & 0x0F);

    if codec != VideoCodec::Avc {
        return Ok(ParsedVideo {
            tag: VideoTag {
                frame_type,
                codec,
                avc: None,
            },
            sequence_header: None,
        });
    }

    if payload.len() < 5 {
        return Err(FlvError::Truncated {
            field: "avc_packet_header",
            offset: 1,
        });
    }

    let packet_type = AvcPacketType::from_u8(payload[1]);
    let composition_time = composition_time_offset(&payload[2..5]);
    let body = payload.slice(5..);

    let mut avc = AvcPacket {
        packet_type,
        composition_time,
        units: Vec::new(),
        parameter_sets: Vec::new(),
    };
    let mut parsed_header = None;

    match packet_type {
        AvcPacketType::SequenceHeader => {
            parsed_header = Some(SequenceHeader::parse(&body)?);
        }
        AvcPacketType::Nalu => {
            let header = sequence_header.ok_or(FlvError::MissingSequenceHeader)?;
            avc.units = split_length_prefixed(&body, header.length_size)?;
            for unit in &avc.units {
                match ParameterSet::from_nal(unit) {
                    Ok(Some(set)) => {
                        debug!("FLV: NALU 包中出现带内参数集 {}", unit.nal_type);
                        avc.parameter_sets.push(set);
                    }
                    Ok(None) => {}
                    Err(e) => warn!("FLV: 带内参数集 {} 解码失败, 跳过: {}", unit.nal_type, e),
                }
            }
        }
        AvcPacketType::EndOfSequence => {}
        AvcPacketType::Unknown(v) => {
            debug!("FLV: 未知 AVC 包类型 {}, 不解析数据", v);
        }
    }

    Ok(ParsedVideo {
        tag: VideoTag {
            frame_type,
            codec,
            avc: Some(avc),
        },
        sequence_header: parsed_header,
    })
}

/// 24 位大端有符号整数
fn composition_time_offset(buf: &[u8]) -> i32 {
    let raw = BigEndian::read_u24(buf);
    ((raw << 8) as i32) >> 8
}

#[cfg(test)]
mod tests {
    use super::*;
    use flvscope_codec::NalUnitType;
    use flvscope_core::bitwriter::BitWriter;

    /// 构造 profile 66 的 sequence header, length_size = 4
    fn build_sequence_header_body() -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_bits(66, 8);
        bw.write_bits(0, 8);
        bw.write_bits(30, 8);
        bw.write_ue(0);
        bw.write_ue(0);
        bw.write_ue(2);
        bw.write_ue(1);
        bw.write_flag(false);
        bw.write_ue(19);
        bw.write_ue(14);
        bw.write_flag(true);
        bw.write_flag(true);
        bw.write_flag(false);
        bw.write_flag(false);
        let mut sps = vec![0x67];
        sps.extend(bw.finish_reversed());

        let mut rec = vec![0x01, 66, 0x00, 30, 0xFF, 0xE1];
        rec.extend_from_slice(&(sps.len() as u16).to_be_bytes());
        rec.extend_from_slice(&sps);
        rec.push(0);
        rec
    }

    fn avc_payload(frame_type: u8, packet_type: u8, cts: [u8; 3], body: &[u8]) -> Bytes {
        let mut data = vec![(frame_type << 4) | 7, packet_type];
        data.extend_from_slice(&cts);
        data.extend_from_slice(body);
        Bytes::from(data)
    }

    #[test]
    fn test_non_avc_descriptor_only() {
        let parsed = parse_video_tag(&Bytes::from_static(&[0x22, 0x00, 0x01]), None).unwrap();
        assert_eq!(parsed.tag.frame_type, FrameType::Inter);
        assert_eq!(parsed.tag.codec, VideoCodec::H263);
        assert!(parsed.tag.avc.is_none());
        assert!(parsed.sequence_header.is_none());
    }

    #[test]
    fn test_sequence_header_packet() {
        let payload = avc_payload(1, 0, [0, 0, 0], &build_sequence_header_body());
        let parsed = parse_video_tag(&payload, None).unwrap();
        assert!(parsed.tag.frame_type.is_keyframe());
        let header = parsed.sequence_header.expect("应解析出 sequence header");
        assert_eq!(header.length_size, 4);
        assert_eq!(header.sps.map(|s| s.profile_idc), Some(66));
    }

    #[test]
    fn test_nalu_requires_sequence_header() {
        let payload = avc_payload(1, 1, [0, 0, 0], &[0, 0, 0, 1, 0x65]);
        assert!(matches!(
            parse_video_tag(&payload, None),
            Err(FlvError::MissingSequenceHeader)
        ));
    }

    #[test]
    fn test_nalu_units_split() {
        let header_payload = avc_payload(1, 0, [0, 0, 0], &build_sequence_header_body());
        let header = parse_video_tag(&header_payload, None)
            .unwrap()
            .sequence_header
            .unwrap();

        let body = [0, 0, 0, 2, 0x65, 0x88, 0, 0, 0, 1, 0x06];
        let payload = avc_payload(1, 1, [0, 0, 0x21], &body);
        let parsed = parse_video_tag(&payload, Some(&header)).unwrap();
        let avc = parsed.tag.avc.unwrap();
        assert_eq!(avc.packet_type, AvcPacketType::Nalu);
        assert_eq!(avc.composition_time, 33);
        assert_eq!(avc.units.len(), 2);
        assert_eq!(avc.units[0].nal_type, NalUnitType::SliceIdr);
        assert_eq!(avc.units[1].nal_type, NalUnitType::Sei);
        assert!(avc.parameter_sets.is_empty());
    }

    #[test]
    fn test_undecodable_inband_sps_keeps_units() {
        let header_payload = avc_payload(1, 0, [0, 0, 0], &build_sequence_header_body());
        let header = parse_video_tag(&header_payload, None)
            .unwrap()
            .sequence_header
            .unwrap();

        let sps = [0x67, 0x42, 0xC0, 0x1E, 0xD9, 0x00, 0xA0, 0x47, 0xFE, 0xC8];
        let mut body = (sps.len() as u32).to_be_bytes().to_vec();
        body.extend_from_slice(&sps);
        body.extend_from_slice(&[0, 0, 0, 3, 0x65, 0x88, 0x84]);
        let payload = avc_payload(1, 1, [0, 0, 0], &body);

        let avc = parse_video_tag(&payload, Some(&header))
            .unwrap()
            .tag
            .avc
            .unwrap();
        let kinds: Vec<NalUnitType> = avc.units.iter().map(|u| u.nal_type).collect();
        assert_eq!(kinds, [NalUnitType::Sps, NalUnitType::SliceIdr]);
        assert!(avc.parameter_sets.is_empty());
    }

    #[test]
    fn test_negative_composition_time() {
        assert_eq!(composition_time_offset(&[0xFF, 0xFF, 0xFE]), -2);
        assert_eq!(composition_time_offset(&[0x7F, 0xFF, 0xFF]), 0x7F_FFFF);
    }

    #[test]
    fn test_short_avc_header() {
        let payload = Bytes::from_static(&[0x17, 0x01, 0x00]);
        assert!(matches!(
            parse_video_tag(&payload, None),
            Err(FlvError::Truncated {
                field: "avc_packet_header",
                ..
            })
        ));
    }

    #[test]
    fn test_end_of_sequence() {
        let payload = avc_payload(1, 2, [0, 0, 0], &[]);
        let parsed = parse_video_tag(&payload, None).unwrap();
        let avc = parsed.tag.avc.unwrap();
        assert_eq!(avc.packet_type, AvcPacketType::EndOfSequence);
        assert!(avc.units.is_empty());
    }
}
