//! 探测结果输出: 文本与 JSON 两种形式共用同一组记录结构.

use clap::ValueEnum;
use flvscope_codec::parsers::h264::ParameterSet;
use flvscope_codec::{Pps, Sps};
use flvscope_core::FlvError;
use flvscope_format::video::AvcPacket;
use flvscope_format::{FlvEvent, ScriptValue, TagHeader};
use serde::Serialize;

/// 事件过滤
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventFilter {
    All,
    Video,
    Audio,
    Meta,
}

impl EventFilter {
    /// 容器头部总是输出
    pub fn accepts(self, event: &FlvEvent) -> bool {
        match (self, event) {
            (_, FlvEvent::Header(_)) | (Self::All, _) => true,
            (Self::Video, FlvEvent::Video(..) | FlvEvent::SequenceHeader(..)) => true,
            (Self::Audio, FlvEvent::Audio(..)) => true,
            (Self::Meta, FlvEvent::Metadata(..)) => true,
            _ => false,
        }
    }
}

// ============================================================
// 输出结构体
// ============================================================

/// Tag 公共信息
#[derive(Debug, Serialize)]
pub struct TagInfo {
    pub timestamp: u32,
    pub data_size: u32,
    pub stream_id: u32,
    pub previous_tag_size: u32,
}

impl From<&TagHeader> for TagInfo {
    fn from(tag: &TagHeader) -> Self {
        Self {
            timestamp: tag.timestamp,
            data_size: tag.data_size,
            stream_id: tag.stream_id,
            previous_tag_size: tag.previous_tag_size,
        }
    }
}

/// NAL 单元信息
#[derive(Debug, Serialize)]
pub struct UnitInfo {
    pub nal_type: String,
    pub priority: String,
    pub forbidden: bool,
    pub len: usize,
}

/// AVC 包信息
#[derive(Debug, Serialize)]
pub struct AvcInfo {
    pub packet_type: String,
    pub composition_time: i32,
    pub units: Vec<UnitInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameter_sets: Vec<ParameterSet>,
}

impl From<&AvcPacket> for AvcInfo {
    fn from(avc: &AvcPacket) -> Self {
        Self {
            packet_type: avc.packet_type.to_string(),
            composition_time: avc.composition_time,
            units: avc
                .units
                .iter()
                .map(|u| UnitInfo {
                    nal_type: u.nal_type.to_string(),
                    priority: u.priority.to_string(),
                    forbidden: u.forbidden_bit,
                    len: u.len(),
                })
                .collect(),
            parameter_sets: avc.parameter_sets.clone(),
        }
    }
}

/// 单条输出记录
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventRecord {
    Header {
        version: u8,
        has_audio: bool,
        has_video: bool,
        header_length: u32,
    },
    Video {
        tag: TagInfo,
        frame_type: String,
        codec: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        avc: Option<AvcInfo>,
    },
    SequenceHeader {
        tag: TagInfo,
        frame_type: String,
        configuration_version: u8,
        profile_indication: u8,
        level_indication: u8,
        length_size: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        height: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        sps: Option<Sps>,
        #[serde(skip_serializing_if = "Option::is_none")]
        sps_error: Option<String>,
        pps: Vec<Pps>,
    },
    Audio {
        tag: TagInfo,
        format: String,
        sample_rate: u32,
        sample_size: u8,
        channels: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        aac_packet_type: Option<String>,
        data_len: usize,
    },
    Metadata {
        tag: TagInfo,
        values: Vec<ScriptValue>,
    },
    Error {
        message: String,
    },
    Summary {
        video: u64,
        audio: u64,
        metadata: u64,
        errors: u64,
        leftover_bytes: usize,
    },
}

impl EventRecord {
    pub fn from_event(event: &FlvEvent) -> Self {
        match event {
            FlvEvent::Header(h) => Self::Header {
                version: h.version,
                has_audio: h.has_audio(),
                has_video: h.has_video(),
                header_length: h.header_length,
            },
            FlvEvent::Video(tag, video) => Self::Video {
                tag: tag.into(),
                frame_type: video.frame_type.to_string(),
                codec: video.codec.to_string(),
                avc: video.avc.as_ref().map(AvcInfo::from),
            },
            FlvEvent::SequenceHeader(tag, video, header) => {
                let dimensions = header.sps.as_ref().and_then(Sps::dimensions);
                Self::SequenceHeader {
                    tag: tag.into(),
                    frame_type: video.frame_type.to_string(),
                    configuration_version: header.configuration_version,
                    profile_indication: header.profile_indication,
                    level_indication: header.level_indication,
                    length_size: header.length_size,
                    width: dimensions.map(|(w, _)| w),
                    height: dimensions.map(|(_, h)| h),
                    sps: header.sps.clone(),
                    sps_error: header.sps_error.clone(),
                    pps: header.pps.clone(),
                }
            }
            FlvEvent::Audio(tag, audio) => Self::Audio {
                tag: tag.into(),
                format: audio.format.to_string(),
                sample_rate: audio.rate.hz(),
                sample_size: audio.size.bits(),
                channels: audio.sound_type.to_string(),
                aac_packet_type: audio.aac_packet_type.map(|t| t.to_string()),
                data_len: audio.data_len,
            },
            FlvEvent::Metadata(tag, values) => Self::Metadata {
                tag: tag.into(),
                values: values.clone(),
            },
        }
    }

    pub fn from_error(err: &FlvError) -> Self {
        Self::Error {
            message: err.to_string(),
        }
    }

    /// JSON 单行
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// 文本单行
    pub fn to_text(&self) -> String {
        match self {
            Self::Header {
                version,
                has_audio,
                has_video,
                header_length,
            } => format!(
                "[header] version={version} audio={has_audio} video={has_video} header_length={header_length}"
            ),
            Self::Video {
                tag,
                frame_type,
                codec,
                avc,
            } => {
                let mut line = format!(
                    "[video] ts={} size={} frame={} codec={}",
                    tag.timestamp, tag.data_size, frame_type, codec
                );
                if let Some(avc) = avc {
                    let units: Vec<String> = avc
                        .units
                        .iter()
                        .map(|u| format!("{}({})", u.nal_type, u.len))
                        .collect();
                    line.push_str(&format!(
                        " packet={} cts={} units=[{}]",
                        avc.packet_type,
                        avc.composition_time,
                        units.join(",")
                    ));
                    if !avc.parameter_sets.is_empty() {
                        line.push_str(&format!(" parameter_sets={}", avc.parameter_sets.len()));
                    }
                }
                line
            }
            Self::SequenceHeader {
                tag,
                profile_indication,
                level_indication,
                length_size,
                width,
                height,
                sps,
                sps_error,
                pps,
                ..
            } => {
                let size = match (width, height) {
                    (Some(w), Some(h)) => format!("{w}x{h}"),
                    _ => "unknown".into(),
                };
                let sps = match (sps, sps_error) {
                    (Some(sps), _) => {
                        format!("sps_id={} ref_frames={}", sps.sps_id, sps.num_ref_frames)
                    }
                    (None, Some(err)) => format!("sps_error=\"{err}\""),
                    (None, None) => "sps=none".into(),
                };
                format!(
                    "[sequence_header] ts={} profile={} level={} length_size={} size={} {} pps={}",
                    tag.timestamp,
                    profile_indication,
                    level_indication,
                    length_size,
                    size,
                    sps,
                    pps.len()
                )
            }
            Self::Audio {
                tag,
                format,
                sample_rate,
                sample_size,
                channels,
                aac_packet_type,
                data_len,
            } => {
                let mut line = format!(
                    "[audio] ts={} size={} format={} rate={} bits={} channels={}",
                    tag.timestamp, tag.data_size, format, sample_rate, sample_size, channels
                );
                if let Some(packet_type) = aac_packet_type {
                    line.push_str(&format!(" aac={packet_type}"));
                }
                line.push_str(&format!(" data_len={data_len}"));
                line
            }
            Self::Metadata { tag, values } => {
                let body = serde_json::to_string(values).unwrap_or_else(|_| "[]".into());
                format!("[metadata] ts={} values={}", tag.timestamp, body)
            }
            Self::Error { message } => format!("[error] {message}"),
            Self::Summary {
                video,
                audio,
                metadata,
                errors,
                leftover_bytes,
            } => format!(
                "[summary] video={video} audio={audio} metadata={metadata} errors={errors} leftover_bytes={leftover_bytes}"
            ),
        }
    }
}

/// 事件计数
#[derive(Debug, Default)]
pub struct Summary {
    pub video: u64,
    pub audio: u64,
    pub metadata: u64,
    pub errors: u64,
}

impl Summary {
    pub fn record(&mut self, event: &FlvEvent) {
        match event {
            FlvEvent::Video(..) | FlvEvent::SequenceHeader(..) => self.video += 1,
            FlvEvent::Audio(..) => self.audio += 1,
            FlvEvent::Metadata(..) => self.metadata += 1,
            FlvEvent::Header(_) => {}
        }
    }

    pub fn to_record(&self, leftover_bytes: usize) -> EventRecord {
        EventRecord::Summary {
            video: self.video,
            audio: self.audio,
            metadata: self.metadata,
            errors: self.errors,
            leftover_bytes,
        }
    }
}
