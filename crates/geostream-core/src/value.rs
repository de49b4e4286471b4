//! Property Values
//!
//! `Value` is the closed set of attribute values a feature can carry. Encoding
//! and decoding switch over the variant; there is no runtime type inspection.
//!
//! `Null` exists so callers can express "present but empty". The encoder skips
//! it exactly like an absent property and the decoder never produces it.

use indexmap::IndexMap;
use serde::Serialize;

use crate::schema::ColumnType;

/// Ordered property table of one feature: column name -> value
pub type Properties = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    UByte(u8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Float(f32),
    Double(f64),
    String(String),
    Null,
}

impl Value {
    /// Column type this value maps to, `None` for `Null`
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Bool(_) => Some(ColumnType::Bool),
            Value::Byte(_) => Some(ColumnType::Byte),
            Value::UByte(_) => Some(ColumnType::UByte),
            Value::Short(_) => Some(ColumnType::Short),
            Value::UShort(_) => Some(ColumnType::UShort),
            Value::Int(_) => Some(ColumnType::Int),
            Value::UInt(_) => Some(ColumnType::UInt),
            Value::Long(_) => Some(ColumnType::Long),
            Value::ULong(_) => Some(ColumnType::ULong),
            Value::Float(_) => Some(ColumnType::Float),
            Value::Double(_) => Some(ColumnType::Double),
            Value::String(_) => Some(ColumnType::String),
            Value::Null => None,
        }
    }

    /// Variant name, used in type mismatch errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Bool",
            Value::Byte(_) => "Byte",
            Value::UByte(_) => "UByte",
            Value::Short(_) => "Short",
            Value::UShort(_) => "UShort",
            Value::Int(_) => "Int",
            Value::UInt(_) => "UInt",
            Value::Long(_) => "Long",
            Value::ULong(_) => "ULong",
            Value::Float(_) => "Float",
            Value::Double(_) => "Double",
            Value::String(_) => "String",
            Value::Null => "Null",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from_value! {
    bool => Bool,
    i8 => Byte,
    u8 => UByte,
    i16 => Short,
    u16 => UShort,
    i32 => Int,
    u32 => UInt,
    i64 => Long,
    u64 => ULong,
    f32 => Float,
    f64 => Double,
    String => String,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
