//! FLV 流式解封装状态机.
//!
//! 输入按任意大小的块推入, 解封装器在数据不足时返回 `Ok(None)` 并保留全部状态,
//! 下次推入后从同一位置继续.
//!
//! # 状态转移
//! ```text
//! AwaitingContainerHeader --9 字节--> AwaitingRecordHeader
//! AwaitingRecordHeader --15 字节--> AwaitingRecordPayload(TagHeader)
//! AwaitingRecordPayload --data_size 字节--> AwaitingRecordHeader
//! ```
//!
//! 单个 Tag 解析失败时以 `Err` 返回, 此时状态已回到 `AwaitingRecordHeader`,
//! 下一次调用继续处理后续 Tag.

use bytes::{Buf, Bytes, BytesMut};
use flvscope_codec::SequenceHeader;
use flvscope_core::{FlvError, FlvResult};
use log::{debug, warn};

use crate::audio::AudioTag;
use crate::config::DemuxerConfig;
use crate::script::{Amf0Decoder, ScriptValue, ValueDecoder};
use crate::tag::{FlvHeader, TagHeader, TagKind};
use crate::video::{VideoTag, parse_video_tag};

/// 解封装状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlvState {
    /// 等待 9 字节容器头部
    AwaitingContainerHeader,
    /// 等待 15 字节 Tag 头部
    AwaitingRecordHeader,
    /// 已解析 Tag 头部, 等待 Tag 数据
    AwaitingRecordPayload(TagHeader),
}

/// 解封装输出
#[derive(Debug, Clone)]
pub enum FlvEvent {
    /// 容器头部
    Header(FlvHeader),
    /// 视频 Tag
    Video(TagHeader, VideoTag),
    /// AVC sequence header (已保存为后续 NALU 包的切分依据)
    SequenceHeader(TagHeader, VideoTag, SequenceHeader),
    /// 音频 Tag
    Audio(TagHeader, AudioTag),
    /// 脚本 Tag 中的全部值
    Metadata(TagHeader, Vec<ScriptValue>),
}

/// FLV 流式解封装器
pub struct FlvDemuxer {
    config: DemuxerConfig,
    state: FlvState,
    /// 已推入但尚未消耗的数据
    buffer: BytesMut,
    /// 待丢弃的字节数 (头部填充或超限 Tag)
    pending_skip: usize,
    header: Option<FlvHeader>,
    sequence_header: Option<SequenceHeader>,
    value_decoder: Box<dyn ValueDecoder>,
    /// 容器签名校验失败后不再前进
    header_rejected: bool,
}

impl Default for FlvDemuxer {
    fn default() -> Self {
        Self::new(DemuxerConfig::default())
    }
}

impl FlvDemuxer {
    /// 使用默认 AMF0 解码器创建
    pub fn new(config: DemuxerConfig) -> Self {
        Self::with_value_decoder(config, Box::new(Amf0Decoder::new()))
    }

    /// 使用自定义脚本值解码器创建
    pub fn with_value_decoder(config: DemuxerConfig, value_decoder: Box<dyn ValueDecoder>) -> Self {
        Self {
            config,
            state: FlvState::AwaitingContainerHeader,
            buffer: BytesMut::new(),
            pending_skip: 0,
            header: None,
            sequence_header: None,
            value_decoder,
            header_rejected: false,
        }
    }

    pub fn state(&self) -> FlvState {
        self.state
    }

    pub fn header(&self) -> Option<&FlvHeader> {
        self.header.as_ref()
    }

    /// 当前生效的 AVC sequence header
    pub fn sequence_header(&self) -> Option<&SequenceHeader> {
        self.sequence_header.as_ref()
    }

    /// 缓冲区中尚未消耗的字节数
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// 容器头部是否因签名错误被拒绝 (此后不再产生事件)
    pub fn is_rejected(&self) -> bool {
        self.header_rejected
    }

    /// 推入一块数据
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// 推入一块数据并取出当前可解析的全部事件
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<FlvResult<FlvEvent>> {
        self.push(chunk);
        self.drain()
    }

    /// 取出当前可解析的全部事件
    pub fn drain(&mut self) -> Vec<FlvResult<FlvEvent>> {
        let mut events = Vec::new();
        loop {
            match self.next_event() {
                Ok(Some(event)) => events.push(Ok(event)),
                Ok(None) => break,
                Err(e) => {
                    events.push(Err(e));
                    if self.header_rejected {
                        break;
                    }
                }
            }
        }
        events
    }

    /// 尝试解析下一个事件
    ///
    /// `Ok(None)` 表示需要更多数据.
    pub fn next_event(&mut self) -> FlvResult<Option<FlvEvent>> {
        loop {
            if !self.skip_pending() {
                return Ok(None);
            }

            match self.state {
                FlvState::AwaitingContainerHeader => {
                    if self.buffer.len() < FlvHeader::SIZE {
                        return Ok(None);
                    }
                    return self.read_container_header().map(Some);
                }
                FlvState::AwaitingRecordHeader => {
                    if self.buffer.len() < TagHeader::SIZE {
                        return Ok(None);
                    }
                    self.read_record_header()?;
                }
                FlvState::AwaitingRecordPayload(tag) => {
                    let size = tag.data_size as usize;
                    if self.buffer.len() < size {
                        return Ok(None);
                    }
                    let payload = self.buffer.split_to(size).freeze();
                    self.state = FlvState::AwaitingRecordHeader;
                    if let Some(event) = self.dispatch(tag, payload)? {
                        return Ok(Some(event));
                    }
                }
            }
        }
    }

    /// 输入结束, 返回未消耗的字节数
    pub fn finish(&mut self) -> usize {
        let leftover = self.buffer.len();
        match self.state {
            FlvState::AwaitingContainerHeader => {
                debug!("FLV: 输入结束时未收到完整容器头部, 剩余 {} 字节", leftover);
            }
            FlvState::AwaitingRecordPayload(tag) => {
                debug!(
                    "FLV: 输入结束于 Tag 数据中途, kind={}, 需要 {} 字节, 已有 {} 字节",
                    tag.kind, tag.data_size, leftover,
                );
            }
            // 末尾的 PreviousTagSize 正常残留 4 字节
            FlvState::AwaitingRecordHeader if leftover > 4 || self.pending_skip > 0 => {
                debug!(
                    "FLV: 输入结束于 Tag 头部中途, 剩余 {} 字节, 待跳过 {} 字节",
                    leftover, self.pending_skip,
                );
            }
            FlvState::AwaitingRecordHeader => {}
        }
        leftover
    }

    /// 丢弃待跳过的字节, 全部跳过后返回 true
    fn skip_pending(&mut self) -> bool {
        if self.pending_skip == 0 {
            return true;
        }
        let n = self.pending_skip.min(self.buffer.len());
        self.buffer.advance(n);
        self.pending_skip -= n;
        self.pending_skip == 0
    }

    fn read_container_header(&mut self) -> FlvResult<FlvEvent> {
        let header = FlvHeader::parse(&self.buffer[..FlvHeader::SIZE])?;
        if !header.has_valid_signature() {
            if self.config.verify_signature {
                self.header_rejected = true;
                return Err(FlvError::InvalidData(format!(
                    "不是 FLV 数据: 签名为 {:02X?}",
                    header.signature
                )));
            }
            warn!("FLV: 签名不匹配 {:02X?}, 已关闭校验, 继续解析", header.signature);
        }

        self.buffer.advance(FlvHeader::SIZE);
        let header_length = header.header_length as usize;
        if header_length > FlvHeader::SIZE {
            self.pending_skip = header_length - FlvHeader::SIZE;
            debug!("FLV: 头部长度 {}, 跳过 {} 字节扩展数据", header_length, self.pending_skip);
        } else if header_length < FlvHeader::SIZE {
            debug!("FLV: 头部长度 {} 小于 9, 按 9 处理", header_length);
        }

        debug!(
            "FLV: version={}, audio={}, video={}",
            header.version,
            header.has_audio(),
            header.has_video(),
        );

        self.header = Some(header);
        self.state = FlvState::AwaitingRecordHeader;
        Ok(FlvEvent::Header(header))
    }

    fn read_record_header(&mut self) -> FlvResult<()> {
        let tag = TagHeader::parse(&self.buffer[..TagHeader::SIZE])?;
        self.buffer.advance(TagHeader::SIZE);

        if tag.data_size > self.config.max_tag_size {
            // 数据仍需跳过以保持同步
            self.pending_skip = tag.data_size as usize;
            return Err(FlvError::InvalidData(format!(
                "FLV: Tag 数据长度 {} 超过上限 {}, ts={}",
                tag.data_size, self.config.max_tag_size, tag.timestamp,
            )));
        }

        self.state = FlvState::AwaitingRecordPayload(tag);
        Ok(())
    }

    /// 按 Tag 类型分发, 返回 None 表示该 Tag 被跳过
    fn dispatch(&mut self, tag: TagHeader, payload: Bytes) -> FlvResult<Option<FlvEvent>> {
        match tag.kind {
            TagKind::Video if payload.is_empty() => {
                debug!("FLV: 跳过空视频 Tag, ts={}", tag.timestamp);
                Ok(None)
            }
            TagKind::Audio if payload.is_empty() => {
                debug!("FLV: 跳过空音频 Tag, ts={}", tag.timestamp);
                Ok(None)
            }
            TagKind::Video => self.handle_video(tag, &payload).map(Some),
            TagKind::Audio => {
                let audio = AudioTag::parse(&payload)?;
                Ok(Some(FlvEvent::Audio(tag, audio)))
            }
            TagKind::Script => {
                let values = self.value_decoder.decode_all(&payload)?;
                debug!("FLV: 脚本 Tag, {} 个值", values.len());
                Ok(Some(FlvEvent::Metadata(tag, values)))
            }
            TagKind::Unknown(kind) => {
                debug!("FLV: 跳过未知 Tag 类型 {}, size={}", kind, tag.data_size);
                Ok(None)
            }
        }
    }

    fn handle_video(&mut self, tag: TagHeader, payload: &Bytes) -> FlvResult<FlvEvent> {
        let parsed = parse_video_tag(payload, self.sequence_header.as_ref())?;

        let Some(header) = parsed.sequence_header else {
            return Ok(FlvEvent::Video(tag, parsed.tag));
        };

        if self.sequence_header.is_some() {
            debug!("FLV: 收到新的 AVC sequence header, 替换旧配置, ts={}", tag.timestamp);
        } else {
            debug!(
                "FLV: AVC sequence header, profile={}, level={}, length_size={}",
                header.profile_indication, header.level_indication, header.length_size,
            );
        }
        self.sequence_header = Some(header.clone());
        Ok(FlvEvent::SequenceHeader(tag, parsed.tag, header))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SoundFormat;
    use crate::video::FrameType;
    use flvscope_core::bitwriter::BitWriter;

    /// 构造 FLV 文件头部 (不含 PreviousTagSize0)
    fn build_flv_header(has_audio: bool, has_video: bool) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"FLV");
        data.push(1);
        let flags = if has_audio { 0x04 } else { 0 } | if has_video { 0x01 } else { 0 };
        data.push(flags);
        data.extend_from_slice(&9u32.to_be_bytes());
        data
    }

    /// 构造一个 Tag (前导 PreviousTagSize + 头部 + 数据)
    fn build_tag(previous: u32, kind: u8, timestamp: u32, payload: &[u8]) -> Vec<u8> {
        let mut tag = previous.to_be_bytes().to_vec();
        let size = payload.len() as u32;
        tag.push(kind);
        tag.extend_from_slice(&size.to_be_bytes()[1..]);
        tag.extend_from_slice(&timestamp.to_be_bytes()[1..]);
        tag.push((timestamp >> 24) as u8);
        tag.extend_from_slice(&[0, 0, 0]);
        tag.extend_from_slice(payload);
        tag
    }

    /// 构造 profile 66 的 AVC sequence header 视频数据
    fn build_avc_sequence_header() -> Vec<u8> {
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

        let mut data = vec![0x17, 0x00, 0, 0, 0, 0x01, 66, 0x00, 30, 0xFF, 0xE1];
        data.extend_from_slice(&(sps.len() as u16).to_be_bytes());
        data.extend_from_slice(&sps);
        data.push(0);
        data
    }

    fn events_ok(events: Vec<FlvResult<FlvEvent>>) -> Vec<FlvEvent> {
        events
            .into_iter()
            .map(|e| e.expect("不应出现错误"))
            .collect()
    }

    #[test]
    fn test_header_then_tags() {
        let mut data = build_flv_header(true, true);
        data.extend(build_tag(0, 8, 0, &[0xAF, 0x01, 0xBE, 0xEF]));
        data.extend(build_tag(15, 9, 40, &[0x22, 0x00]));
        data.extend_from_slice(&13u32.to_be_bytes());

        let mut demuxer = FlvDemuxer::default();
        let events = events_ok(demuxer.decode(&data));
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], FlvEvent::Header(h) if h.has_audio() && h.has_video()));
        match &events[1] {
            FlvEvent::Audio(tag, audio) => {
                assert_eq!(tag.timestamp, 0);
                assert_eq!(audio.format, SoundFormat::Aac);
            }
            other => panic!("应为音频事件, actual={other:?}"),
        }
        match &events[2] {
            FlvEvent::Video(tag, video) => {
                assert_eq!(tag.timestamp, 40);
                assert_eq!(tag.previous_tag_size, 15);
                assert_eq!(video.frame_type, FrameType::Inter);
            }
            other => panic!("应为视频事件, actual={other:?}"),
        }
        assert_eq!(demuxer.finish(), 4);
    }

    #[test]
    fn test_starvation_keeps_state() {
        let mut data = build_flv_header(false, true);
        data.extend(build_tag(0, 9, 0, &[0x22, 0x00, 0x01, 0x02]));

        let mut demuxer = FlvDemuxer::default();
        demuxer.push(&data[..5]);
        assert!(demuxer.next_event().unwrap().is_none());
        assert_eq!(demuxer.state(), FlvState::AwaitingContainerHeader);

        demuxer.push(&data[5..24]);
        assert!(matches!(demuxer.next_event().unwrap(), Some(FlvEvent::Header(_))));
        assert!(demuxer.next_event().unwrap().is_none());
        assert!(matches!(demuxer.state(), FlvState::AwaitingRecordPayload(t) if t.data_size == 4));

        demuxer.push(&data[24..]);
        assert!(matches!(demuxer.next_event().unwrap(), Some(FlvEvent::Video(..))));
        assert_eq!(demuxer.state(), FlvState::AwaitingRecordHeader);
        assert_eq!(demuxer.finish(), 0);
    }

    #[test]
    fn test_bad_signature_is_sticky() {
        let mut data = b"FLX".to_vec();
        data.extend_from_slice(&[1, 5, 0, 0, 0, 9]);

        let mut demuxer = FlvDemuxer::default();
        let events = demuxer.decode(&data);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(FlvError::InvalidData(_))));
        assert!(demuxer.is_rejected());
        assert!(demuxer.next_event().is_err());
        assert_eq!(demuxer.buffered(), 9);
    }

    #[test]
    fn test_signature_check_disabled() {
        let mut data = b"XYZ".to_vec();
        data.extend_from_slice(&[1, 1, 0, 0, 0, 9]);
        let config = DemuxerConfig {
            verify_signature: false,
            ..DemuxerConfig::default()
        };
        let mut demuxer = FlvDemuxer::new(config);
        let events = events_ok(demuxer.decode(&data));
        assert!(matches!(events[0], FlvEvent::Header(h) if !h.has_valid_signature()));
    }

    #[test]
    fn test_extended_header_length_skipped() {
        let mut data = b"FLV".to_vec();
        data.extend_from_slice(&[1, 1, 0, 0, 0, 13]);
        data.extend_from_slice(&[0xAA; 4]);
        data.extend(build_tag(0, 9, 7, &[0x22]));

        let mut demuxer = FlvDemuxer::default();
        let mut events = Vec::new();
        for byte in &data {
            events.extend(events_ok(demuxer.decode(&[*byte])));
        }
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], FlvEvent::Video(t, _) if t.timestamp == 7));
    }

    #[test]
    fn test_oversize_tag_skipped() {
        let mut data = build_flv_header(false, true);
        data.extend(build_tag(0, 9, 0, &[0x22; 32]));
        data.extend(build_tag(43, 9, 33, &[0x22]));

        let config = DemuxerConfig {
            max_tag_size: 16,
            ..DemuxerConfig::default()
        };
        let mut demuxer = FlvDemuxer::new(config);
        let events = demuxer.decode(&data);
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1], Err(FlvError::InvalidData(_))));
        assert!(matches!(&events[2], Ok(FlvEvent::Video(t, _)) if t.timestamp == 33));
    }

    #[test]
    fn test_unknown_and_empty_tags_skipped() {
        let mut data = build_flv_header(true, true);
        data.extend(build_tag(0, 15, 0, &[1, 2, 3]));
        data.extend(build_tag(14, 9, 0, &[]));
        data.extend(build_tag(11, 8, 0, &[]));
        data.extend(build_tag(11, 8, 5, &[0x2E]));

        let mut demuxer = FlvDemuxer::default();
        let events = events_ok(demuxer.decode(&data));
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], FlvEvent::Audio(t, a) if t.timestamp == 5 && a.format == SoundFormat::Mp3));
    }

    #[test]
    fn test_tag_error_does_not_stop_framing() {
        let mut data = build_flv_header(false, true);
        // AVC NALU 包早于 sequence header
        data.extend(build_tag(0, 9, 0, &[0x17, 0x01, 0, 0, 0, 0, 0, 0, 1, 0x65]));
        data.extend(build_tag(21, 9, 0, &build_avc_sequence_header()));
        data.extend(build_tag(0, 9, 40, &[0x17, 0x01, 0, 0, 0, 0, 0, 0, 1, 0x65]));

        let mut demuxer = FlvDemuxer::default();
        let events = demuxer.decode(&data);
        assert_eq!(events.len(), 4);
        assert!(matches!(events[1], Err(FlvError::MissingSequenceHeader)));
        assert!(matches!(&events[2], Ok(FlvEvent::SequenceHeader(_, _, h)) if h.length_size == 4));
        match &events[3] {
            Ok(FlvEvent::Video(_, video)) => {
                let avc = video.avc.as_ref().expect("应为 AVC 包");
                assert_eq!(avc.units.len(), 1);
            }
            other => panic!("应为视频事件, actual={other:?}"),
        }
        assert!(demuxer.sequence_header().is_some());
    }

    #[test]
    fn test_sequence_header_replaced() {
        let mut data = build_flv_header(false, true);
        data.extend(build_tag(0, 9, 0, &build_avc_sequence_header()));
        data.extend(build_tag(0, 9, 100, &build_avc_sequence_header()));

        let mut demuxer = FlvDemuxer::default();
        let events = events_ok(demuxer.decode(&data));
        assert_eq!(events.len(), 3);
        assert!(matches!(events[2], FlvEvent::SequenceHeader(t, ..) if t.timestamp == 100));
    }

    #[test]
    fn test_script_tag_metadata() {
        let mut payload = vec![0x02, 0x00, 0x0A];
        payload.extend_from_slice(b"onMetaData");
        payload.extend_from_slice(&[0x08, 0, 0, 0, 1, 0x00, 0x08]);
        payload.extend_from_slice(b"duration");
        payload.push(0x00);
        payload.extend_from_slice(&3.5f64.to_be_bytes());
        payload.extend_from_slice(&[0, 0, 0x09]);

        let mut data = build_flv_header(true, true);
        data.extend(build_tag(0, 18, 0, &payload));

        let mut demuxer = FlvDemuxer::default();
        let events = events_ok(demuxer.decode(&data));
        match &events[1] {
            FlvEvent::Metadata(_, values) => {
                assert_eq!(values[0].as_str(), Some("onMetaData"));
                assert_eq!(values[1].get("duration"), Some(&ScriptValue::Number(3.5)));
            }
            other => panic!("应为脚本事件, actual={other:?}"),
        }
    }

    #[test]
    fn test_finish_mid_payload() {
        let mut data = build_flv_header(false, true);
        data.extend(build_tag(0, 9, 0, &[0x22; 10]));
        data.truncate(data.len() - 3);

        let mut demuxer = FlvDemuxer::default();
        let events = events_ok(demuxer.decode(&data));
        assert_eq!(events.len(), 1);
        assert_eq!(demuxer.finish(), 7);
    }
}
