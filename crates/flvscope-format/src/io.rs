//! 字节数据源.
//!
//! 解封装器本身不做 I/O, 由 [`ByteSource`] 按块提供数据, [`drive`] 负责把两者连接起来.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use bytes::Bytes;
use flvscope_core::{FlvError, FlvResult};
use log::debug;

use crate::demuxer::{FlvDemuxer, FlvEvent};

/// 字节数据源
pub trait ByteSource {
    /// 读取下一块数据, `None` 表示输入结束
    fn next_chunk(&mut self) -> FlvResult<Option<Bytes>>;
}

/// 文件数据源, 按固定块大小读取
pub struct FileSource {
    file: File,
    chunk_size: usize,
}

impl FileSource {
    /// 打开文件
    pub fn open<P: AsRef<Path>>(path: P, chunk_size: usize) -> FlvResult<Self> {
        let file = File::open(path)?;
        Self::from_file(file, chunk_size)
    }

    pub fn from_file(file: File, chunk_size: usize) -> FlvResult<Self> {
        check_chunk_size(chunk_size)?;
        Ok(Self { file, chunk_size })
    }
}

impl ByteSource for FileSource {
    fn next_chunk(&mut self) -> FlvResult<Option<Bytes>> {
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            match self.file.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(Some(Bytes::from(buf)));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// 内存数据源, 按固定块大小切分
pub struct MemorySource {
    data: Bytes,
    chunk_size: usize,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>, chunk_size: usize) -> FlvResult<Self> {
        check_chunk_size(chunk_size)?;
        Ok(Self {
            data: data.into(),
            chunk_size,
        })
    }
}

impl ByteSource for MemorySource {
    fn next_chunk(&mut self) -> FlvResult<Option<Bytes>> {
        if self.data.is_empty() {
            return Ok(None);
        }
        let n = self.chunk_size.min(self.data.len());
        Ok(Some(self.data.split_to(n)))
    }
}

fn check_chunk_size(chunk_size: usize) -> FlvResult<()> {
    if chunk_size == 0 {
        return Err(FlvError::InvalidArgument("块大小不能为 0".into()));
    }
    Ok(())
}

/// 从数据源读取全部数据并交给解封装器
///
/// 每个事件以及单个 Tag 的错误都交给回调; 数据源 I/O 错误和容器头部被拒绝时
/// 直接返回错误. 正常结束时返回未消耗的字节数.
pub fn drive<S, F>(source: &mut S, demuxer: &mut FlvDemuxer, mut on_event: F) -> FlvResult<usize>
where
    S: ByteSource + ?Sized,
    F: FnMut(FlvResult<FlvEvent>),
{
    let mut chunks = 0usize;
    while let Some(chunk) = source.next_chunk()? {
        chunks += 1;
        demuxer.push(&chunk);
        loop {
            match demuxer.next_event() {
                Ok(Some(event)) => on_event(Ok(event)),
                Ok(None) => break,
                Err(e) if demuxer.is_rejected() => return Err(e),
                Err(e) => on_event(Err(e)),
            }
        }
    }

    let leftover = demuxer.finish();
    debug!("FLV: 输入结束, 共 {} 块, 剩余 {} 字节", chunks, leftover);
    Ok(leftover)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_memory_source_chunks() {
        let mut source = MemorySource::new(vec![1u8, 2, 3, 4, 5], 2).unwrap();
        assert_eq!(source.next_chunk().unwrap().unwrap().as_ref(), &[1, 2]);
        assert_eq!(source.next_chunk().unwrap().unwrap().as_ref(), &[3, 4]);
        assert_eq!(source.next_chunk().unwrap().unwrap().as_ref(), &[5]);
        assert!(source.next_chunk().unwrap().is_none());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(matches!(
            MemorySource::new(Vec::<u8>::new(), 0),
            Err(FlvError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_file_source_reads_all() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let content: Vec<u8> = (0..=255u8).cycle().take(2500).collect();
        file.write_all(&content).unwrap();
        file.flush().unwrap();

        let mut source = FileSource::open(file.path(), 1024).unwrap();
        let mut read = Vec::new();
        while let Some(chunk) = source.next_chunk().unwrap() {
            assert!(chunk.len() <= 1024);
            read.extend_from_slice(&chunk);
        }
        assert_eq!(read, content);
    }

    #[test]
    fn test_file_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileSource::open(dir.path().join("missing.flv"), 1024);
        assert!(matches!(result, Err(FlvError::Io(_))));
    }

    #[test]
    fn test_drive_collects_events() {
        let mut data = b"FLV".to_vec();
        data.extend_from_slice(&[1, 4, 0, 0, 0, 9]);
        data.extend_from_slice(&[0, 0, 0, 0, 8, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0x2E]);
        data.extend_from_slice(&12u32.to_be_bytes());

        let mut source = MemorySource::new(data, 3).unwrap();
        let mut demuxer = FlvDemuxer::default();
        let mut events = Vec::new();
        let leftover = drive(&mut source, &mut demuxer, |e| events.push(e)).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.is_ok()));
        assert_eq!(leftover, 4);
    }

    #[test]
    fn test_drive_stops_on_rejected_header() {
        let data = b"NOTFLV\x00\x00\x00\x09".to_vec();
        let mut source = MemorySource::new(data, 4).unwrap();
        let mut demuxer = FlvDemuxer::default();
        let mut count = 0;
        let result = drive(&mut source, &mut demuxer, |_| count += 1);
        assert!(matches!(result, Err(FlvError::InvalidData(_))));
        assert_eq!(count, 0);
    }
}
