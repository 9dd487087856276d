//! 検索・読み書きの対象となる型と値

use crate::parse::parse_integer;
use crate::string::CharWidth;
use crate::{Result, ScanError};
use std::fmt;
use std::str::FromStr;

/// 値の型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// 指定幅のコードユニットからなるNUL終端文字列
    String(CharWidth),
}

impl ValueType {
    /// 型名
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Byte => "byte",
            ValueType::Short => "short",
            ValueType::Int => "int",
            ValueType::Long => "long",
            ValueType::Float => "float",
            ValueType::Double => "double",
            ValueType::String(_) => "string",
        }
    }

    /// 文字列をこの型の値として解釈する
    ///
    /// 整数は同じ幅の符号なし範囲も受け付けます（例: byteの255は-1）。
    pub fn parse_value(&self, s: &str) -> Result<TypedValue> {
        let invalid = || ScanError::InvalidValue {
            ty: self.name(),
            value: s.to_string(),
        };

        let value = match self {
            ValueType::Byte => {
                let v = parse_integer(s).ok_or_else(invalid)?;
                i8::try_from(v)
                    .ok()
                    .or_else(|| u8::try_from(v).ok().map(|u| u as i8))
                    .map(TypedValue::Byte)
            }
            ValueType::Short => {
                let v = parse_integer(s).ok_or_else(invalid)?;
                i16::try_from(v)
                    .ok()
                    .or_else(|| u16::try_from(v).ok().map(|u| u as i16))
                    .map(TypedValue::Short)
            }
            ValueType::Int => {
                let v = parse_integer(s).ok_or_else(invalid)?;
                i32::try_from(v)
                    .ok()
                    .or_else(|| u32::try_from(v).ok().map(|u| u as i32))
                    .map(TypedValue::Int)
            }
            ValueType::Long => {
                let v = parse_integer(s).ok_or_else(invalid)?;
                i64::try_from(v)
                    .ok()
                    .or_else(|| u64::try_from(v).ok().map(|u| u as i64))
                    .map(TypedValue::Long)
            }
            ValueType::Float => s.trim().parse::<f32>().ok().map(TypedValue::Float),
            ValueType::Double => s.trim().parse::<f64>().ok().map(TypedValue::Double),
            ValueType::String(width) => Some(TypedValue::Text(s.to_string(), *width)),
        };

        value.ok_or_else(invalid)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String(width) => write!(f, "string:{}", width),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for ValueType {
    type Err = ScanError;

    /// "int", "string", "string:1" のような型指定を解釈する
    fn from_str(s: &str) -> Result<Self> {
        let (name, width) = match s.split_once(':') {
            Some((name, width)) => (name, Some(width)),
            None => (s, None),
        };

        let ty = match name {
            "byte" | "b" => ValueType::Byte,
            "short" | "s" => ValueType::Short,
            "int" | "i" => ValueType::Int,
            "long" | "l" => ValueType::Long,
            "float" | "f" => ValueType::Float,
            "double" | "d" => ValueType::Double,
            "string" | "str" => {
                let width = match width {
                    Some(w) => w.parse()?,
                    None => CharWidth::default(),
                };
                return Ok(ValueType::String(width));
            }
            _ => return Err(ScanError::InvalidArgument(format!("unknown type '{}'", s))),
        };

        if width.is_some() {
            return Err(ScanError::InvalidArgument(format!(
                "type '{}' does not take a character width",
                name
            )));
        }

        Ok(ty)
    }
}

/// 型付きの値
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Text(String, CharWidth),
}

impl TypedValue {
    /// この値の型
    pub fn value_type(&self) -> ValueType {
        match self {
            TypedValue::Byte(_) => ValueType::Byte,
            TypedValue::Short(_) => ValueType::Short,
            TypedValue::Int(_) => ValueType::Int,
            TypedValue::Long(_) => ValueType::Long,
            TypedValue::Float(_) => ValueType::Float,
            TypedValue::Double(_) => ValueType::Double,
            TypedValue::Text(_, width) => ValueType::String(*width),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Byte(v) => write!(f, "{}", v),
            TypedValue::Short(v) => write!(f, "{}", v),
            TypedValue::Int(v) => write!(f, "{}", v),
            TypedValue::Long(v) => write!(f, "{}", v),
            TypedValue::Float(v) => write!(f, "{}", v),
            TypedValue::Double(v) => write!(f, "{}", v),
            TypedValue::Text(v, _) => write!(f, "{}", v),
        }
    }
}
