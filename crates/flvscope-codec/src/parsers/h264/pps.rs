//! H.264 PPS (Picture Parameter Set) 解析器.
//!
//! 仅解析 PPS 开头的标识与熵编码相关字段, 其余字段不展开.

use flvscope_core::bitreader::BitReader;
use flvscope_core::{FlvResult, read_ue};
use serde::Serialize;

/// PPS 解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pps {
    /// pic_parameter_set_id
    pub pps_id: u32,
    /// 引用的 seq_parameter_set_id
    pub sps_id: u32,
    /// 0=CAVLC, 1=CABAC
    pub entropy_coding_mode_flag: bool,
    pub bottom_field_pic_order_in_frame_present_flag: bool,
    pub num_slice_groups_minus1: u32,
}

/// 从 RBSP 数据 (不含 NAL 头部) 解析 PPS
pub fn parse_pps(rbsp: &[u8]) -> FlvResult<Pps> {
    let mut br = BitReader::new(rbsp);

    let pps_id = ue(&mut br, "pic_parameter_set_id")?;
    let sps_id = ue(&mut br, "seq_parameter_set_id")?;
    let entropy_coding_mode_flag = flag(&mut br, "entropy_coding_mode_flag")?;
    let bottom_field_pic_order_in_frame_present_flag =
        flag(&mut br, "bottom_field_pic_order_in_frame_present_flag")?;
    let num_slice_groups_minus1 = ue(&mut br, "num_slice_groups_minus1")?;

    Ok(Pps {
        pps_id,
        sps_id,
        entropy_coding_mode_flag,
        bottom_field_pic_order_in_frame_present_flag,
        num_slice_groups_minus1,
    })
}

fn ue(br: &mut BitReader, field: &'static str) -> FlvResult<u32> {
    let offset = br.byte_position();
    read_ue(br).map_err(|e| e.at_field(field, offset))
}

fn flag(br: &mut BitReader, field: &'static str) -> FlvResult<bool> {
    let offset = br.byte_position();
    br.read_bit()
        .map(|bit| bit == 1)
        .map_err(|e| e.at_field(field, offset))
}
