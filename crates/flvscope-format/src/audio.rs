//! FLV 音频 Tag 解析.
//!
//! # 音频 Tag 数据
//! ```text
//! SoundFormat (4 bits) | SoundRate (2 bits) | SoundSize (1 bit) | SoundType (1 bit)
//! [AAC: AACPacketType (1 byte): 0=Sequence Header, 1=Raw]
//! ```

use flvscope_core::{FlvError, FlvResult};

/// 音频编码格式 (SoundFormat)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundFormat {
    /// 线性 PCM, 平台字节序
    Pcm,
    Adpcm,
    Mp3,
    /// 线性 PCM, 小端
    PcmLe,
    Nellymoser16k,
    Nellymoser8k,
    Nellymoser,
    /// G.711 A-law
    Alaw,
    /// G.711 mu-law
    Mulaw,
    Aac,
    Speex,
    Mp3_8k,
    DeviceSpecific,
    Unknown(u8),
}

impl SoundFormat {
    pub fn from_id(id: u8) -> Self {
        match id {
            0 => Self::Pcm,
            1 => Self::Adpcm,
            2 => Self::Mp3,
            3 => Self::PcmLe,
            4 => Self::Nellymoser16k,
            5 => Self::Nellymoser8k,
            6 => Self::Nellymoser,
            7 => Self::Alaw,
            8 => Self::Mulaw,
            10 => Self::Aac,
            11 => Self::Speex,
            14 => Self::Mp3_8k,
            15 => Self::DeviceSpecific,
            other => Self::Unknown(other),
        }
    }
}

impl std::fmt::Display for SoundFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pcm => "pcm",
            Self::Adpcm => "adpcm",
            Self::Mp3 => "mp3",
            Self::PcmLe => "pcm_le",
            Self::Nellymoser16k => "nellymoser_16k",
            Self::Nellymoser8k => "nellymoser_8k",
            Self::Nellymoser => "nellymoser",
            Self::Alaw => "alaw",
            Self::Mulaw => "mulaw",
            Self::Aac => "aac",
            Self::Speex => "speex",
            Self::Mp3_8k => "mp3_8k",
            Self::DeviceSpecific => "device_specific",
            Self::Unknown(id) => return write!(f, "unknown({id})"),
        };
        f.write_str(name)
    }
}

/// 采样率 (SoundRate)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundRate {
    Khz5_5,
    Khz11,
    Khz22,
    Khz44,
}

impl SoundRate {
    /// 从 2 位字段创建
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Khz5_5,
            1 => Self::Khz11,
            2 => Self::Khz22,
            _ => Self::Khz44,
        }
    }

    /// 名义采样率 (Hz)
    pub fn hz(self) -> u32 {
        match self {
            Self::Khz5_5 => 5512,
            Self::Khz11 => 11025,
            Self::Khz22 => 22050,
            Self::Khz44 => 44100,
        }
    }
}

/// 采样位深 (SoundSize)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundSize {
    Bits8,
    Bits16,
}

impl SoundSize {
    pub fn bits(self) -> u8 {
        match self {
            Self::Bits8 => 8,
            Self::Bits16 => 16,
        }
    }
}

/// 声道类型 (SoundType)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundType {
    Mono,
    Stereo,
}

impl std::fmt::Display for SoundType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mono => write!(f, "mono"),
            Self::Stereo => write!(f, "stereo"),
        }
    }
}

/// AAC 包类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacPacketType {
    /// AudioSpecificConfig
    SequenceHeader,
    Raw,
    Unknown(u8),
}

impl AacPacketType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::SequenceHeader,
            1 => Self::Raw,
            other => Self::Unknown(other),
        }
    }
}

impl std::fmt::Display for AacPacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SequenceHeader => write!(f, "sequence_header"),
            Self::Raw => write!(f, "raw"),
            Self::Unknown(v) => write!(f, "unknown({v})"),
        }
    }
}

/// 音频 Tag 描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTag {
    pub format: SoundFormat,
    pub rate: SoundRate,
    pub size: SoundSize,
    pub sound_type: SoundType,
    /// 仅 AAC 携带
    pub aac_packet_type: Option<AacPacketType>,
    /// 去掉音频头部后的数据长度
    pub data_len: usize,
}

impl AudioTag {
    /// 解析音频 Tag 数据 (调用方保证非空)
    pub fn parse(payload: &[u8]) -> FlvResult<Self> {
        let Some(&selector) = payload.first() else {
            return Err(FlvError::Truncated {
                field: "audio_header",
                offset: 0,
            });
        };

        let format = SoundFormat::from_id(selector >> 4);
        let rate = SoundRate::from_bits(selector >> 2);
        let size = if selector & 0x02 != 0 {
            SoundSize::Bits16
        } else {
            SoundSize::Bits8
        };
        let sound_type = if selector & 0x01 != 0 {
            SoundType::Stereo
        } else {
            SoundType::Mono
        };

        let (aac_packet_type, header_len) = if format == SoundFormat::Aac {
            let Some(&packet_type) = payload.get(1) else {
                return Err(FlvError::Truncated {
                    field: "aac_packet_type",
                    offset: 1,
                });
            };
            (Some(AacPacketType::from_u8(packet_type)), 2)
        } else {
            (None, 1)
        };

        Ok(Self {
            format,
            rate,
            size,
            sound_type,
            aac_packet_type,
            data_len: payload.len() - header_len,
        })
    }
}
