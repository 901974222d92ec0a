//! H.264 SPS (Sequence Parameter Set) 解析器.
//!
//! SPS 包含编码视频序列的全局参数, 包括:
//! - Profile / Level (编码规格)
//! - 色度格式与位深 (仅扩展 profile)
//! - 图像顺序计数 (POC) 参数
//! - 参考帧数量与图像尺寸 (以宏块为单位)
//! - 裁剪偏移与 VUI 存在标志
//!
//! 字段按码流顺序逐个读取, 每个条件分支对应一个独立的字段序列:
//!
//! | 分支 | 判定依据 | 字段序列 |
//! |------|----------|----------|
//! | [`ProfileBlock`] | profile_idc | [`parse_extended_profile`] |
//! | [`PicOrderCnt`] | pic_order_cnt_type | [`parse_poc_type0`] / [`parse_poc_type1`] |
//!
//! 缩放矩阵不展开, 只跳过列表存在标志. VUI 内容不解析.

use flvscope_core::bitreader::BitReader;
use flvscope_core::{FlvResult, read_ue};
use serde::Serialize;

/// SPS 解析结果
///
/// 未进入的条件分支中的字段保持 0 / false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sps {
    /// profile_idc (编码规格, 如 66=Baseline, 77=Main, 100=High)
    pub profile_idc: u8,
    pub constraint_set0_flag: bool,
    pub constraint_set1_flag: bool,
    pub constraint_set2_flag: bool,
    pub constraint_set3_flag: bool,
    pub constraint_set4_flag: bool,
    pub constraint_set5_flag: bool,
    /// level_idc (编码级别, 如 30=3.0, 41=4.1)
    pub level_idc: u8,
    /// seq_parameter_set_id
    pub sps_id: u32,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4), 仅扩展 profile 携带
    pub chroma_format_idc: u32,
    pub residual_colour_transform_flag: bool,
    pub bit_depth_luma_minus8: u32,
    pub bit_depth_chroma_minus8: u32,
    pub qpprime_y_zero_transform_bypass_flag: bool,
    pub seq_scaling_matrix_present_flag: bool,
    /// 4x4 缩放矩阵 (不从码流展开, 恒为 0)
    #[serde(skip)]
    pub scaling_matrix_4x4: [[u32; 16]; 6],
    /// 8x8 缩放矩阵 (不从码流展开, 恒为 0)
    #[serde(skip)]
    pub scaling_matrix_8x8: [[u32; 64]; 6],
    pub log2_max_frame_num_minus4: u32,
    /// 图像顺序计数类型 (0, 1, 2)
    pub pic_order_cnt_type: u32,
    /// 仅 pic_order_cnt_type == 0
    pub log2_max_pic_order_cnt_lsb_minus4: u32,
    /// 以下至 offset_for_ref_frame 仅 pic_order_cnt_type == 1
    pub delta_pic_order_always_zero_flag: bool,
    pub offset_for_non_ref_pic: u32,
    pub offset_for_top_to_bottom_field: u32,
    pub num_ref_frames_in_pic_order_cnt_cycle: u32,
    pub offset_for_ref_frame: Vec<u32>,
    /// 最大参考帧数
    pub num_ref_frames: u32,
    pub gaps_in_frame_num_value_allowed_flag: bool,
    pub pic_width_in_mbs_minus1: u32,
    pub pic_height_in_map_units_minus1: u32,
    /// 是否为帧编码 (非场编码)
    pub frame_mbs_only_flag: bool,
    pub mb_adaptive_frame_field_flag: bool,
    pub direct_8x8_inference_flag: bool,
    pub frame_cropping_flag: bool,
    pub frame_crop_left_offset: u32,
    pub frame_crop_right_offset: u32,
    pub frame_crop_top_offset: u32,
    pub frame_crop_bottom_offset: u32,
    pub vui_parameters_present_flag: bool,
}

impl Default for Sps {
    fn default() -> Self {
        Self {
            profile_idc: 0,
            constraint_set0_flag: false,
            constraint_set1_flag: false,
            constraint_set2_flag: false,
            constraint_set3_flag: false,
            constraint_set4_flag: false,
            constraint_set5_flag: false,
            level_idc: 0,
            sps_id: 0,
            chroma_format_idc: 0,
            residual_colour_transform_flag: false,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            qpprime_y_zero_transform_bypass_flag: false,
            seq_scaling_matrix_present_flag: false,
            scaling_matrix_4x4: [[0; 16]; 6],
            scaling_matrix_8x8: [[0; 64]; 6],
            log2_max_frame_num_minus4: 0,
            pic_order_cnt_type: 0,
            log2_max_pic_order_cnt_lsb_minus4: 0,
            delta_pic_order_always_zero_flag: false,
            offset_for_non_ref_pic: 0,
            offset_for_top_to_bottom_field: 0,
            num_ref_frames_in_pic_order_cnt_cycle: 0,
            offset_for_ref_frame: Vec::new(),
            num_ref_frames: 0,
            gaps_in_frame_num_value_allowed_flag: false,
            pic_width_in_mbs_minus1: 0,
            pic_height_in_map_units_minus1: 0,
            frame_mbs_only_flag: false,
            mb_adaptive_frame_field_flag: false,
            direct_8x8_inference_flag: false,
            frame_cropping_flag: false,
            frame_crop_left_offset: 0,
            frame_crop_right_offset: 0,
            frame_crop_top_offset: 0,
            frame_crop_bottom_offset: 0,
            vui_parameters_present_flag: false,
        }
    }
}

impl Sps {
    /// 计算裁剪后的像素尺寸 (宽, 高)
    ///
    /// 扩展 profile 之外 chroma_format_idc 为 0, 此时按 4:2:0 计算裁剪单位.
    /// 尺寸溢出或裁剪超出图像时返回 `None`.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let chroma = if ProfileBlock::for_profile(self.profile_idc) == ProfileBlock::Extended {
            self.chroma_format_idc
        } else {
            1
        };
        let (sub_width, sub_height) = match chroma {
            0 | 3 => (1, 1),
            2 => (2, 1),
            _ => (2, 2),
        };
        let field_mult = if self.frame_mbs_only_flag { 1 } else { 2 };

        let raw_width = self.pic_width_in_mbs_minus1.checked_add(1)?.checked_mul(16)?;
        let raw_height = self
            .pic_height_in_map_units_minus1
            .checked_add(1)?
            .checked_mul(16 * field_mult)?;
        let crop_x = self
            .frame_crop_left_offset
            .checked_add(self.frame_crop_right_offset)?
            .checked_mul(sub_width)?;
        let crop_y = self
            .frame_crop_top_offset
            .checked_add(self.frame_crop_bottom_offset)?
            .checked_mul(sub_height * field_mult)?;

        Some((
            raw_width.checked_sub(crop_x).filter(|w| *w > 0)?,
            raw_height.checked_sub(crop_y).filter(|h| *h > 0)?,
        ))
    }
}

/// profile_idc 决定是否携带扩展字段块
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileBlock {
    /// High 系列及其他扩展 profile: 携带色度格式/位深/缩放矩阵字段
    Extended,
    /// 其他 profile: 跳过扩展字段块
    Baseline,
}

impl ProfileBlock {
    /// 根据 profile_idc 判定分支
    pub fn for_profile(profile_idc: u8) -> Self {
        match profile_idc {
            100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 => Self::Extended,
            _ => Self::Baseline,
        }
    }
}

/// pic_order_cnt_type 决定后续 POC 字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PicOrderCnt {
    /// 0: 携带 log2_max_pic_order_cnt_lsb_minus4
    Type0,
    /// 1: 携带 delta/offset 字段与参考帧偏移列表
    Type1,
    /// 其他: 无额外字段
    Other,
}

impl PicOrderCnt {
    /// 根据 pic_order_cnt_type 判定分支
    pub fn for_type(poc_type: u32) -> Self {
        match poc_type {
            0 => Self::Type0,
            1 => Self::Type1,
            _ => Self::Other,
        }
    }
}

/// 带字段名的读取器, 越界时报告字段名与字节偏移
struct FieldReader<'a> {
    br: BitReader<'a>,
}

impl<'a> FieldReader<'a> {
    fn new(rbsp: &'a [u8]) -> Self {
        Self {
            br: BitReader::new(rbsp),
        }
    }

    fn byte(&mut self, field: &'static str) -> FlvResult<u8> {
        let offset = self.br.byte_position();
        self.br.read_byte().map_err(|e| e.at_field(field, offset))
    }

    fn flag(&mut self, field: &'static str) -> FlvResult<bool> {
        let offset = self.br.byte_position();
        self.br
            .read_bit()
            .map(|bit| bit == 1)
            .map_err(|e| e.at_field(field, offset))
    }

    fn ue(&mut self, field: &'static str) -> FlvResult<u32> {
        let offset = self.br.byte_position();
        read_ue(&mut self.br).map_err(|e| e.at_field(field, offset))
    }

    fn skip(&mut self, n: u32, field: &'static str) -> FlvResult<()> {
        let offset = self.br.byte_position();
        self.br.skip_bits(n).map_err(|e| e.at_field(field, offset))
    }
}

/// 从 RBSP 数据 (不含 NAL 头部) 解析 SPS
pub fn parse_sps(rbsp: &[u8]) -> FlvResult<Sps> {
    let mut fr = FieldReader::new(rbsp);
    let mut sps = Sps::default();

    parse_profile_header(&mut fr, &mut sps)?;
    sps.sps_id = fr.ue("seq_parameter_set_id")?;

    match ProfileBlock::for_profile(sps.profile_idc) {
        ProfileBlock::Extended => parse_extended_profile(&mut fr, &mut sps)?,
        ProfileBlock::Baseline => {}
    }

    sps.log2_max_frame_num_minus4 = fr.ue("log2_max_frame_num_minus4")?;
    sps.pic_order_cnt_type = fr.ue("pic_order_cnt_type")?;
    match PicOrderCnt::for_type(sps.pic_order_cnt_type) {
        PicOrderCnt::Type0 => parse_poc_type0(&mut fr, &mut sps)?,
        PicOrderCnt::Type1 => parse_poc_type1(&mut fr, &mut sps)?,
        PicOrderCnt::Other => {}
    }

    sps.num_ref_frames = fr.ue("num_ref_frames")?;
    sps.gaps_in_frame_num_value_allowed_flag = fr.flag("gaps_in_frame_num_value_allowed_flag")?;
    sps.pic_width_in_mbs_minus1 = fr.ue("pic_width_in_mbs_minus1")?;
    sps.pic_height_in_map_units_minus1 = fr.ue("pic_height_in_map_units_minus1")?;

    sps.frame_mbs_only_flag = fr.flag("frame_mbs_only_flag")?;
    if !sps.frame_mbs_only_flag {
        sps.mb_adaptive_frame_field_flag = fr.flag("mb_adaptive_frame_field_flag")?;
    }

    sps.direct_8x8_inference_flag = fr.flag("direct_8x8_inference_flag")?;
    sps.frame_cropping_flag = fr.flag("frame_cropping_flag")?;
    if sps.frame_cropping_flag {
        parse_cropping(&mut fr, &mut sps)?;
    }

    sps.vui_parameters_present_flag = fr.flag("vui_parameters_present_flag")?;

    Ok(sps)
}

/// profile_idc, constraint_set0..5 (次字节高 6 位), level_idc
fn parse_profile_header(fr: &mut FieldReader, sps: &mut Sps) -> FlvResult<()> {
    sps.profile_idc = fr.byte("profile_idc")?;

    let flags = fr.byte("constraint_set_flags")?;
    sps.constraint_set0_flag = (flags >> 7) & 1 == 1;
    sps.constraint_set1_flag = (flags >> 6) & 1 == 1;
    sps.constraint_set2_flag = (flags >> 5) & 1 == 1;
    sps.constraint_set3_flag = (flags >> 4) & 1 == 1;
    sps.constraint_set4_flag = (flags >> 3) & 1 == 1;
    sps.constraint_set5_flag = (flags >> 2) & 1 == 1;

    sps.level_idc = fr.byte("level_idc")?;
    Ok(())
}

/// 扩展 profile 字段块
fn parse_extended_profile(fr: &mut FieldReader, sps: &mut Sps) -> FlvResult<()> {
    sps.chroma_format_idc = fr.ue("chroma_format_idc")?;
    if sps.chroma_format_idc == 3 {
        sps.residual_colour_transform_flag = fr.flag("residual_colour_transform_flag")?;
    }

    sps.bit_depth_luma_minus8 = fr.ue("bit_depth_luma_minus8")?;
    sps.bit_depth_chroma_minus8 = fr.ue("bit_depth_chroma_minus8")?;
    sps.qpprime_y_zero_transform_bypass_flag = fr.flag("qpprime_y_zero_transform_bypass_flag")?;
    sps.seq_scaling_matrix_present_flag = fr.flag("seq_scaling_matrix_present_flag")?;

    if sps.seq_scaling_matrix_present_flag {
        skip_scaling_list_flags(fr, sps.chroma_format_idc)?;
    }
    Ok(())
}

/// 跳过 seq_scaling_list_present_flag[i], 列表内容不展开
fn skip_scaling_list_flags(fr: &mut FieldReader, chroma_format_idc: u32) -> FlvResult<()> {
    let list_count = if chroma_format_idc == 3 { 12 } else { 8 };
    fr.skip(list_count, "seq_scaling_list_present_flag")
}

fn parse_poc_type0(fr: &mut FieldReader, sps: &mut Sps) -> FlvResult<()> {
    sps.log2_max_pic_order_cnt_lsb_minus4 = fr.ue("log2_max_pic_order_cnt_lsb_minus4")?;
    Ok(())
}

fn parse_poc_type1(fr: &mut FieldReader, sps: &mut Sps) -> FlvResult<()> {
    sps.delta_pic_order_always_zero_flag = fr.flag("delta_pic_order_always_zero_flag")?;
    sps.offset_for_non_ref_pic = fr.ue("offset_for_non_ref_pic")?;
    sps.offset_for_top_to_bottom_field = fr.ue("offset_for_top_to_bottom_field")?;
    sps.num_ref_frames_in_pic_order_cnt_cycle = fr.ue("num_ref_frames_in_pic_order_cnt_cycle")?;

    // 每个 ue(v) 至少 1 位, 列表长度受剩余位数约束
    for _ in 0..sps.num_ref_frames_in_pic_order_cnt_cycle {
        let offset = fr.ue("offset_for_ref_frame")?;
        sps.offset_for_ref_frame.push(offset);
    }
    Ok(())
}

fn parse_cropping(fr: &mut FieldReader, sps: &mut Sps) -> FlvResult<()> {
    sps.frame_crop_left_offset = fr.ue("frame_crop_left_offset")?;
    sps.frame_crop_right_offset = fr.ue("frame_crop_right_offset")?;
    sps.frame_crop_top_offset = fr.ue("frame_crop_top_offset")?;
    sps.frame_crop_bottom_offset = fr.ue("frame_crop_bottom_offset")?;
    Ok(())
}
