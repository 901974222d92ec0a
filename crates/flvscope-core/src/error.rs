//! 统一错误类型定义.
//!
//! 所有 flvscope crate 共用的错误类型, 支持跨模块传播.
//!
//! "数据不足" 不属于错误: 解封装器以 `Ok(None)` 表示需要更多输入.

use thiserror::Error;

/// flvscope 统一错误类型
#[derive(Debug, Error)]
pub enum FlvError {
    /// 无效参数 (配置或调用方输入)
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 读取某个字段时越过了数据边界
    #[error("数据截断: 读取字段 {field} 时越界, offset={offset}")]
    Truncated {
        /// 正在读取的字段名
        field: &'static str,
        /// 出错时的字节偏移
        offset: usize,
    },

    /// 位级读取已到达缓冲区末尾
    #[error("已到达数据末尾")]
    EndOfData,

    /// Exp-Golomb 前导零过多 (>= 31)
    #[error("Exp-Golomb 前导零过多, offset={offset}")]
    ExpGolombOverflow {
        /// 出错时的字节偏移
        offset: usize,
    },

    /// 在收到 AVC sequence header 之前出现了 NALU 数据
    #[error("协议顺序错误: 收到 NALU 时尚未收到 sequence header")]
    MissingSequenceHeader,

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl FlvError {
    /// 将位级 `EndOfData` 转换为带字段名与偏移的 `Truncated`, 其他错误原样返回
    pub fn at_field(self, field: &'static str, offset: usize) -> Self {
        match self {
            Self::EndOfData => Self::Truncated { field, offset },
            other => other,
        }
    }
}

/// flvscope 统一 Result 类型
pub type FlvResult<T> = Result<T, FlvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_field_maps_end_of_data() {
        let err = FlvError::EndOfData.at_field("level_idc", 2);
        assert!(matches!(
            err,
            FlvError::Truncated {
                field: "level_idc",
                offset: 2
            }
        ));
    }

    #[test]
    fn test_at_field_keeps_other_errors() {
        let err = FlvError::ExpGolombOverflow { offset: 4 }.at_field("sps_id", 1);
        assert!(matches!(err, FlvError::ExpGolombOverflow { offset: 4 }));
    }

    #[test]
    fn test_truncated_message() {
        let msg = FlvError::Truncated {
            field: "pic_order_cnt_type",
            offset: 7,
        }
        .to_string();
        assert!(msg.contains("pic_order_cnt_type"), "actual={msg}");
        assert!(msg.contains("offset=7"), "actual={msg}");
    }
}
