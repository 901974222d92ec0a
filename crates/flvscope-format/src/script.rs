//! FLV 脚本 Tag (onMetaData 等) 的 AMF0 值解码.
//!
//! # AMF0 类型标记
//! ```text
//! 0x00 Number (f64 BE)     0x01 Boolean       0x02 String (u16 长度)
//! 0x03 Object              0x05 Null          0x06 Undefined
//! 0x07 Reference (u16)     0x08 ECMA Array    0x0A Strict Array (u32 个数)
//! 0x0B Date (f64 + i16)    0x0C Long String (u32 长度)
//! ```
//!
//! Object / ECMA Array 由键值对组成, 以 `00 00 09` 结束.

use byteorder::{BigEndian, ByteOrder};
use flvscope_core::{FlvError, FlvResult};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// 默认最大嵌套深度
pub const DEFAULT_MAX_DEPTH: usize = 64;

const MARKER_NUMBER: u8 = 0x00;
const MARKER_BOOLEAN: u8 = 0x01;
const MARKER_STRING: u8 = 0x02;
const MARKER_OBJECT: u8 = 0x03;
const MARKER_NULL: u8 = 0x05;
const MARKER_UNDEFINED: u8 = 0x06;
const MARKER_REFERENCE: u8 = 0x07;
const MARKER_ECMA_ARRAY: u8 = 0x08;
const MARKER_OBJECT_END: u8 = 0x09;
const MARKER_STRICT_ARRAY: u8 = 0x0A;
const MARKER_DATE: u8 = 0x0B;
const MARKER_LONG_STRING: u8 = 0x0C;

/// 脚本数据值
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Number(f64),
    Boolean(bool),
    String(String),
    /// 键值对, 保持码流中的顺序
    Object(Vec<(String, ScriptValue)>),
    Null,
    Undefined,
    /// 对象引用索引
    Reference(u16),
    EcmaArray(Vec<(String, ScriptValue)>),
    StrictArray(Vec<ScriptValue>),
    /// 毫秒时间戳与时区偏移 (分钟)
    Date { millis: f64, timezone: i16 },
    LongString(String),
}

impl ScriptValue {
    /// 按键查找 Object / ECMA Array 中的值
    pub fn get(&self, key: &str) -> Option<&ScriptValue> {
        match self {
            Self::Object(pairs) | Self::EcmaArray(pairs) => {
                pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::LongString(s) => Some(s),
            _ => None,
        }
    }
}

impl Serialize for ScriptValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(v) => serializer.serialize_f64(*v),
            Self::Boolean(v) => serializer.serialize_bool(*v),
            Self::String(s) | Self::LongString(s) => serializer.serialize_str(s),
            Self::Object(pairs) | Self::EcmaArray(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (key, value) in pairs {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Self::Null | Self::Undefined => serializer.serialize_unit(),
            Self::Reference(idx) => serializer.serialize_u16(*idx),
            Self::StrictArray(items) => items.serialize(serializer),
            Self::Date { millis, timezone } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("millis", millis)?;
                map.serialize_entry("timezone", timezone)?;
                map.end()
            }
        }
    }
}

/// 脚本值解码器
///
/// 每次解码一个值, 返回值及消耗的字节数.
pub trait ValueDecoder {
    fn decode_one(&self, data: &[u8]) -> FlvResult<(ScriptValue, usize)>;

    /// 连续解码直到数据耗尽
    fn decode_all(&self, data: &[u8]) -> FlvResult<Vec<ScriptValue>> {
        let mut values = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            let (value, used) = self.decode_one(&data[pos..])?;
            if used == 0 {
                break;
            }
            values.push(value);
            pos += used;
        }
        Ok(values)
    }
}

/// AMF0 解码器
#[derive(Debug, Clone)]
pub struct Amf0Decoder {
    max_depth: usize,
}

impl Default for Amf0Decoder {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Amf0Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置最大嵌套深度
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }
}

impl ValueDecoder for Amf0Decoder {
    fn decode_one(&self, data: &[u8]) -> FlvResult<(ScriptValue, usize)> {
        let mut cursor = Cursor {
            data,
            pos: 0,
            max_depth: self.max_depth,
        };
        let value = cursor.value(0)?;
        Ok((value, cursor.pos))
    }
}

/// AMF0 读取游标
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    max_depth: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize, field: &'static str) -> FlvResult<&'a [u8]> {
        if self.data.len() - self.pos < n {
            return Err(FlvError::Truncated {
                field,
                offset: self.pos,
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn u8(&mut self, field: &'static str) -> FlvResult<u8> {
        Ok(self.take(1, field)?[0])
    }

    fn u16(&mut self, field: &'static str) -> FlvResult<u16> {
        Ok(BigEndian::read_u16(self.take(2, field)?))
    }

    fn u32(&mut self, field: &'static str) -> FlvResult<u32> {
        Ok(BigEndian::read_u32(self.take(4, field)?))
    }

    fn f64(&mut self, field: &'static str) -> FlvResult<f64> {
        Ok(BigEndian::read_f64(self.take(8, field)?))
    }

    fn string(&mut self, len: usize, field: &'static str) -> FlvResult<String> {
        Ok(String::from_utf8_lossy(self.take(len, field)?).into_owned())
    }

    fn value(&mut self, depth: usize) -> FlvResult<ScriptValue> {
        if depth > self.max_depth {
            return Err(FlvError::InvalidData(format!(
                "AMF0: 嵌套深度超过上限 {}",
                self.max_depth
            )));
        }

        let marker_pos = self.pos;
        let marker = self.u8("amf0_marker")?;
        let value = match marker {
            MARKER_NUMBER => ScriptValue::Number(self.f64("amf0_number")?),
            MARKER_BOOLEAN => ScriptValue::Boolean(self.u8("amf0_boolean")? != 0),
            MARKER_STRING => {
                let len = usize::from(self.u16("amf0_string_length")?);
                ScriptValue::String(self.string(len, "amf0_string")?)
            }
            MARKER_OBJECT => ScriptValue::Object(self.pairs(depth)?),
            MARKER_NULL => ScriptValue::Null,
            MARKER_UNDEFINED => ScriptValue::Undefined,
            MARKER_REFERENCE => ScriptValue::Reference(self.u16("amf0_reference")?),
            MARKER_ECMA_ARRAY => {
                // 个数仅作提示, 以结束标记为准
                let _count = self.u32("amf0_ecma_count")?;
                ScriptValue::EcmaArray(self.pairs(depth)?)
            }
            MARKER_STRICT_ARRAY => {
                let count = self.u32("amf0_array_count")?;
                // 每个元素至少 1 字节
                let mut items = Vec::with_capacity((count as usize).min(self.data.len() - self.pos));
                for _ in 0..count {
                    items.push(self.value(depth + 1)?);
                }
                ScriptValue::StrictArray(items)
            }
            MARKER_DATE => {
                let millis = self.f64("amf0_date")?;
                let timezone = self.u16("amf0_date_timezone")? as i16;
                ScriptValue::Date { millis, timezone }
            }
            MARKER_LONG_STRING => {
                let len = self.u32("amf0_long_string_length")? as usize;
                ScriptValue::LongString(self.string(len, "amf0_long_string")?)
            }
            other => {
                return Err(FlvError::InvalidData(format!(
                    "AMF0: 不支持的类型标记 0x{:02X}, offset={}",
                    other, marker_pos
                )));
            }
        };
        Ok(value)
    }

    /// 读取键值对直到 `00 00 09`
    fn pairs(&mut self, depth: usize) -> FlvResult<Vec<(String, ScriptValue)>> {
        let mut pairs = Vec::new();
        loop {
            let key_len = usize::from(self.u16("amf0_key_length")?);
            if key_len == 0 {
                let end_pos = self.pos;
                let end = self.u8("amf0_object_end")?;
                if end != MARKER_OBJECT_END {
                    return Err(FlvError::InvalidData(format!(
                        "AMF0: 空键之后缺少对象结束标记, offset={}",
                        end_pos
                    )));
                }
                return Ok(pairs);
            }
            let key = self.string(key_len, "amf0_key")?;
            let value = self.value(depth + 1)?;
            pairs.push((key, value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amf_string(s: &str) -> Vec<u8> {
        let mut out = vec![MARKER_STRING];
        out.extend_from_slice(&(s.len() as u16).to_be_bytes());
        out.extend_from_slice(s.as_bytes());
        out
    }

    fn amf_number(v: f64) -> Vec<u8> {
        let mut out = vec![MARKER_NUMBER];
        out.extend_from_slice(&v.to_be_bytes());
        out
    }

    fn key(name: &str) -> Vec<u8> {
        let mut out = (name.len() as u16).to_be_bytes().to_vec();
        out.extend_from_slice(name.as_bytes());
        out
    }

    /// 构造 onMetaData 脚本 Tag 数据
    fn build_on_metadata() -> Vec<u8> {
        let mut data = amf_string("onMetaData");
        data.push(MARKER_ECMA_ARRAY);
        data.extend_from_slice(&3u32.to_be_bytes());
        data.extend(key("duration"));
        data.extend(amf_number(12.5));
        data.extend(key("width"));
        data.extend(amf_number(1280.0));
        data.extend(key("stereo"));
        data.extend_from_slice(&[MARKER_BOOLEAN, 1]);
        data.extend_from_slice(&[0, 0, MARKER_OBJECT_END]);
        data
    }

    #[test]
    fn test_decode_on_metadata() {
        let values = Amf0Decoder::new().decode_all(&build_on_metadata()).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].as_str(), Some("onMetaData"));
        assert_eq!(values[1].get("duration").and_then(ScriptValue::as_number), Some(12.5));
        assert_eq!(values[1].get("width").and_then(ScriptValue::as_number), Some(1280.0));
        assert_eq!(values[1].get("stereo"), Some(&ScriptValue::Boolean(true)));
        assert!(values[1].get("height").is_none());
    }

    #[test]
    fn test_decode_one_reports_consumed() {
        let mut data = amf_number(1.0);
        data.extend(amf_string("x"));
        let (value, used) = Amf0Decoder::new().decode_one(&data).unwrap();
        assert_eq!(value, ScriptValue::Number(1.0));
        assert_eq!(used, 9);
    }

    #[test]
    fn test_strict_array_and_scalars() {
        let mut data = vec![MARKER_STRICT_ARRAY, 0, 0, 0, 4, MARKER_NULL, MARKER_UNDEFINED];
        data.extend_from_slice(&[MARKER_REFERENCE, 0, 2]);
        data.push(MARKER_DATE);
        data.extend_from_slice(&1000.0f64.to_be_bytes());
        data.extend_from_slice(&(-60i16).to_be_bytes());
        let (value, used) = Amf0Decoder::new().decode_one(&data).unwrap();
        assert_eq!(used, data.len());
        assert_eq!(
            value,
            ScriptValue::StrictArray(vec![
                ScriptValue::Null,
                ScriptValue::Undefined,
                ScriptValue::Reference(2),
                ScriptValue::Date {
                    millis: 1000.0,
                    timezone: -60
                },
            ])
        );
    }

    #[test]
    fn test_long_string() {
        let mut data = vec![MARKER_LONG_STRING, 0, 0, 0, 3];
        data.extend_from_slice(b"abc");
        let (value, _) = Amf0Decoder::new().decode_one(&data).unwrap();
        assert_eq!(value.as_str(), Some("abc"));
    }

    #[test]
    fn test_unknown_marker() {
        assert!(matches!(
            Amf0Decoder::new().decode_one(&[0x11]),
            Err(FlvError::InvalidData(_))
        ));
    }

    #[test]
    fn test_truncated_string() {
        let err = Amf0Decoder::new()
            .decode_one(&[MARKER_STRING, 0, 10, b'a'])
            .unwrap_err();
        assert!(matches!(
            err,
            FlvError::Truncated {
                field: "amf0_string",
                offset: 3
            }
        ));
    }

    #[test]
    fn test_depth_limit() {
        // 每层: Object 标记 + 键 "a"
        let mut data = Vec::new();
        for _ in 0..4 {
            data.push(MARKER_OBJECT);
            data.extend(key("a"));
        }
        data.push(MARKER_NULL);
        for _ in 0..4 {
            data.extend_from_slice(&[0, 0, MARKER_OBJECT_END]);
        }
        assert!(Amf0Decoder::with_max_depth(4).decode_one(&data).is_ok());
        assert!(matches!(
            Amf0Decoder::with_max_depth(3).decode_one(&data),
            Err(FlvError::InvalidData(_))
        ));
    }

    #[test]
    fn test_serialize_as_json_shape() {
        let value = ScriptValue::EcmaArray(vec![
            ("duration".into(), ScriptValue::Number(2.0)),
            ("encoder".into(), ScriptValue::String("lavf".into())),
            ("extra".into(), ScriptValue::Null),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"duration":2.0,"encoder":"lavf","extra":null}"#);
    }
}
