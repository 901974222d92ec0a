//! 比特流读取器.
//!
//! 为 SPS/PPS 等参数集解析提供按位读取能力.
//!
//! # 遍历顺序
//!
//! 读取从缓冲区的**最后一个字节**开始, 逐字节向第一个字节推进;
//! 每个字节内部按高位到低位 (MSB first) 读取.
//!
//! ```text
//! data = [0xF1, 0xF2]
//! 读取顺序: 0xF2 的 bit7..bit0, 然后 0xF1 的 bit7..bit0
//! ```
//!
//! 上层的 Exp-Golomb 解码对该顺序敏感, 不可改为正向遍历.

use crate::{FlvError, FlvResult};

/// 比特流读取器
///
/// # 示例
/// ```
/// use flvscope_core::bitreader::BitReader;
///
/// let data = [0xF1, 0xF2];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_byte().unwrap(), 0xF2);
/// assert_eq!(br.read_byte().unwrap(), 0xF1);
/// assert!(br.read_bit().is_err());
/// ```
pub struct BitReader<'a> {
    /// 源数据
    data: &'a [u8],
    /// 尚未读完的字节数, 当前字节为 `data[remaining - 1]`
    remaining: usize,
    /// 当前字节中的位位置 (7 表示最高位, 向 0 递减)
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            remaining: data.len(),
            bit_pos: 7,
        }
    }

    /// 读取 1 个位
    ///
    /// 越过缓冲区边界时返回 `FlvError::EndOfData`.
    pub fn read_bit(&mut self) -> FlvResult<u32> {
        if self.remaining == 0 {
            return Err(FlvError::EndOfData);
        }

        let bit = (self.data[self.remaining - 1] >> self.bit_pos) & 1;
        if self.bit_pos == 0 {
            self.bit_pos = 7;
            self.remaining -= 1;
        } else {
            self.bit_pos -= 1;
        }

        Ok(u32::from(bit))
    }

    /// 读取 1 个字节 (8 次连续位读取, 先读到的位为最高位)
    pub fn read_byte(&mut self) -> FlvResult<u8> {
        let mut value = 0u8;
        for _ in 0..8 {
            value = (value << 1) | self.read_bit()? as u8;
        }
        Ok(value)
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: u32) -> FlvResult<()> {
        if (n as usize) > self.bits_left() {
            return Err(FlvError::EndOfData);
        }
        for _ in 0..n {
            self.read_bit()?;
        }
        Ok(())
    }

    /// 获取剩余可读位数
    pub fn bits_left(&self) -> usize {
        if self.remaining == 0 {
            return 0;
        }
        (self.remaining - 1) * 8 + self.bit_pos as usize + 1
    }

    /// 是否已到达末尾
    pub fn is_eof(&self) -> bool {
        self.remaining == 0
    }

    /// 按读取方向计, 已完整消耗的字节数
    pub fn byte_position(&self) -> usize {
        self.data.len() - self.remaining
    }
}
