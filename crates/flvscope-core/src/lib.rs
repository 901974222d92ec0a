//! # flvscope-core
//!
//! flvscope 核心库, 提供统一错误类型与位级读取工具.
//!
//! 容器解封装 (`flvscope-format`) 与码流解析 (`flvscope-codec`) 都建立在本 crate 之上.

pub mod bitreader;
pub mod bitwriter;
pub mod error;
pub mod golomb;

// 重导出常用类型
pub use bitreader::BitReader;
pub use error::{FlvError, FlvResult};
pub use golomb::read_ue;
