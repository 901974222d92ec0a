//! 比特流写入器.
//!
//! 按写入顺序 (MSB first) 组装位序列, 用于构造参数集测试码流.
//!
//! 由于 [`BitReader`](crate::bitreader::BitReader) 从最后一个字节开始向前读取,
//! [`BitWriter::finish_reversed`] 会把字节顺序翻转, 使读取顺序与写入顺序一致.

/// 比特流写入器
///
/// # 示例
/// ```
/// use flvscope_core::bitreader::BitReader;
/// use flvscope_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(0x42, 8);
/// bw.write_ue(5);
/// let data = bw.finish_reversed();
///
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_byte().unwrap(), 0x42);
/// assert_eq!(flvscope_core::read_ue(&mut br).unwrap(), 5);
/// ```
#[derive(Default)]
pub struct BitWriter {
    /// 输出缓冲区
    data: Vec<u8>,
    /// 当前字节 (正在填充)
    current_byte: u8,
    /// 当前字节中已填充的位数 (0-7)
    bit_count: u8,
}

impl BitWriter {
    /// 创建新的比特流写入器
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.bit_count as usize
    }

    /// 写入 1 个位
    pub fn write_bit(&mut self, bit: u32) {
        self.current_byte = (self.current_byte << 1) | (bit & 1) as u8;
        self.bit_count += 1;
        if self.bit_count >= 8 {
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// 写入布尔标志位
    pub fn write_flag(&mut self, flag: bool) {
        self.write_bit(u32::from(flag));
    }

    /// 写入 N 个位 (最多 32 位), 值的低 N 位高位在前写入
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "write_bits: n={} 超过 32 位", n);
        for i in (0..n).rev() {
            self.write_bit((value >> i) & 1);
        }
    }

    /// 写入无符号 Exp-Golomb 编码值 ue(v)
    pub fn write_ue(&mut self, value: u32) {
        let code = u64::from(value) + 1;
        let bits = 64 - code.leading_zeros();
        for _ in 0..bits - 1 {
            self.write_bit(0);
        }
        for i in (0..bits).rev() {
            self.write_bit(((code >> i) & 1) as u32);
        }
    }

    /// 完成写入, 末尾不足一字节时低位补 0, 返回正向字节序列
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.current_byte <<= 8 - self.bit_count;
            self.data.push(self.current_byte);
        }
        self.data
    }

    /// 完成写入并翻转字节顺序, 供逆序遍历的 `BitReader` 按写入顺序读取
    pub fn finish_reversed(self) -> Vec<u8> {
        let mut data = self.finish();
        data.reverse();
        data
    }
}
