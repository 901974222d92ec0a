//! 无符号 Exp-Golomb 编码 ue(v) 读取.
//!
//! 码字结构: `k` 个 0, 一个 1, 随后 `k` 位后缀 (高位在前).
//! 解码值为 `(1 << k) - 1 + suffix`.
//!
//! ```text
//! 1       → 0
//! 010     → 1
//! 011     → 2
//! 00100   → 3
//! 0001000 → 7
//! ```

use crate::bitreader::BitReader;
use crate::{FlvError, FlvResult};

/// 前导零上限, 达到即视为损坏码流
const MAX_LEADING_ZEROS: u32 = 31;

/// 读取无符号 Exp-Golomb 编码值 ue(v)
pub fn read_ue(br: &mut BitReader) -> FlvResult<u32> {
    let mut leading_zeros = 0u32;
    while br.read_bit()? == 0 {
        leading_zeros += 1;
        if leading_zeros >= MAX_LEADING_ZEROS {
            return Err(FlvError::ExpGolombOverflow {
                offset: br.byte_position(),
            });
        }
    }

    if leading_zeros == 0 {
        return Ok(0);
    }

    let mut suffix = 0u32;
    for _ in 0..leading_zeros {
        suffix = (suffix << 1) | br.read_bit()?;
    }
    Ok((1 << leading_zeros) - 1 + suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitwriter::BitWriter;

    /// 按写入顺序构造逆序读取器可直接消费的缓冲区
    fn encode(values: &[u32]) -> Vec<u8> {
        let mut bw = BitWriter::new();
        for &v in values {
            bw.write_ue(v);
        }
        bw.finish_reversed()
    }

    #[test]
    fn test_read_ue_known_codes() {
        // 1 | 010 | 011 | 00100 → 0, 1, 2, 3
        let data = [0b1010_0110, 0b0100_0000];
        let reversed = [data[1], data[0]];
        let mut br = BitReader::new(&reversed);
        assert_eq!(read_ue(&mut br).unwrap(), 0);
        assert_eq!(read_ue(&mut br).unwrap(), 1);
        assert_eq!(read_ue(&mut br).unwrap(), 2);
        assert_eq!(read_ue(&mut br).unwrap(), 3);
    }

    #[test]
    fn test_read_ue_zero_consumes_one_bit() {
        let data = [0b1000_0000];
        let mut br = BitReader::new(&data);
        assert_eq!(read_ue(&mut br).unwrap(), 0);
        assert_eq!(br.bits_left(), 7);
    }

    #[test]
    fn test_read_ue_suffix_msb_first() {
        // 0001 + 后缀 110 → 7 + 6 = 13
        let data = [0b0001_1100];
        let mut br = BitReader::new(&data);
        assert_eq!(read_ue(&mut br).unwrap(), 13);
    }

    #[test]
    fn test_read_ue_roundtrip_law() {
        let mut values: Vec<u32> = (0..300).collect();
        values.extend((0..30).map(|k| (1u32 << k) - 1));
        values.extend((1..30).map(|k| 1u32 << k));
        values.push((1 << 30) - 1);

        let data = encode(&values);
        let mut br = BitReader::new(&data);
        for &v in &values {
            assert_eq!(read_ue(&mut br).unwrap(), v, "value={v}");
        }
    }

    #[test]
    fn test_read_ue_too_many_leading_zeros() {
        // 32 个 0 之后才出现 1
        let data = [0x00, 0x00, 0x00, 0x00, 0x80];
        let reversed: Vec<u8> = data.iter().rev().copied().collect();
        let mut br = BitReader::new(&reversed);
        assert!(matches!(
            read_ue(&mut br),
            Err(FlvError::ExpGolombOverflow { .. })
        ));
    }

    #[test]
    fn test_read_ue_thirty_zeros_is_valid() {
        let v = (1u32 << 30) - 1;
        let data = encode(&[v]);
        let mut br = BitReader::new(&data);
        assert_eq!(read_ue(&mut br).unwrap(), v);
    }

    #[test]
    fn test_read_ue_truncated_suffix() {
        // 00001 后缀需要 4 位, 但只剩 3 位
        let data = [0b0000_1101];
        let mut br = BitReader::new(&data);
        assert!(matches!(read_ue(&mut br), Err(FlvError::EndOfData)));
    }
}
