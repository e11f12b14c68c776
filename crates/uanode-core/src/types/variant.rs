// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Dynamically typed values.
//!
//! The Value attribute has no fixed type, so a value always travels with its
//! [`VariantType`]. Method arguments and writes may carry an explicit type
//! that the value is cast to before it reaches the backend.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{LocalizedText, NodeId, QualifiedName};
use crate::error::{ConfigurationError, UaError, UaResult};
use crate::status::StatusCode;

// =============================================================================
// VariantType
// =============================================================================

/// OPC UA built-in data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantType {
    /// Boolean.
    Boolean,
    /// Signed 8-bit integer.
    SByte,
    /// Unsigned 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// UTF-8 string.
    String,
    /// Date and time.
    DateTime,
    /// GUID.
    Guid,
    /// Byte string.
    ByteString,
    /// Node id.
    NodeId,
    /// Status code.
    StatusCode,
    /// Qualified name.
    QualifiedName,
    /// Localized text.
    LocalizedText,
}

impl VariantType {
    /// Returns the OPC UA built-in type id, which is also the numeric id of
    /// the data type node in namespace 0.
    pub const fn type_id(self) -> u32 {
        match self {
            Self::Boolean => 1,
            Self::SByte => 2,
            Self::Byte => 3,
            Self::Int16 => 4,
            Self::UInt16 => 5,
            Self::Int32 => 6,
            Self::UInt32 => 7,
            Self::Int64 => 8,
            Self::UInt64 => 9,
            Self::Float => 10,
            Self::Double => 11,
            Self::String => 12,
            Self::DateTime => 13,
            Self::Guid => 14,
            Self::ByteString => 15,
            Self::NodeId => 17,
            Self::StatusCode => 19,
            Self::QualifiedName => 20,
            Self::LocalizedText => 21,
        }
    }

    /// Creates from a built-in type id.
    pub fn from_type_id(id: u32) -> Option<Self> {
        Some(match id {
            1 => Self::Boolean,
            2 => Self::SByte,
            3 => Self::Byte,
            4 => Self::Int16,
            5 => Self::UInt16,
            6 => Self::Int32,
            7 => Self::UInt32,
            8 => Self::Int64,
            9 => Self::UInt64,
            10 => Self::Float,
            11 => Self::Double,
            12 => Self::String,
            13 => Self::DateTime,
            14 => Self::Guid,
            15 => Self::ByteString,
            17 => Self::NodeId,
            19 => Self::StatusCode,
            20 => Self::QualifiedName,
            21 => Self::LocalizedText,
            _ => return None,
        })
    }

    /// Returns the data type node in namespace 0.
    pub fn data_type_node(self) -> NodeId {
        NodeId::numeric(0, self.type_id())
    }

    /// Returns `true` for integer and floating point types.
    #[inline]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::SByte
                | Self::Byte
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
                | Self::Float
                | Self::Double
        )
    }

    /// Returns the type name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::DateTime => "DateTime",
            Self::Guid => "Guid",
            Self::ByteString => "ByteString",
            Self::NodeId => "NodeId",
            Self::StatusCode => "StatusCode",
            Self::QualifiedName => "QualifiedName",
            Self::LocalizedText => "LocalizedText",
        }
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VariantType {
    type Err = UaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bool" | "boolean" => Ok(Self::Boolean),
            "sbyte" | "int8" | "i8" => Ok(Self::SByte),
            "byte" | "uint8" | "u8" => Ok(Self::Byte),
            "int16" | "i16" => Ok(Self::Int16),
            "uint16" | "u16" => Ok(Self::UInt16),
            "int32" | "i32" | "int" => Ok(Self::Int32),
            "uint32" | "u32" | "uint" => Ok(Self::UInt32),
            "int64" | "i64" | "long" => Ok(Self::Int64),
            "uint64" | "u64" => Ok(Self::UInt64),
            "float" | "f32" => Ok(Self::Float),
            "double" | "f64" => Ok(Self::Double),
            "string" | "str" => Ok(Self::String),
            "datetime" => Ok(Self::DateTime),
            "guid" | "uuid" => Ok(Self::Guid),
            "bytestring" | "bytes" => Ok(Self::ByteString),
            "nodeid" => Ok(Self::NodeId),
            "statuscode" => Ok(Self::StatusCode),
            "qualifiedname" => Ok(Self::QualifiedName),
            "localizedtext" => Ok(Self::LocalizedText),
            _ => Err(ConfigurationError::invalid_value("data type", s).into()),
        }
    }
}

// =============================================================================
// Variant
// =============================================================================

/// A dynamically typed OPC UA value.
///
/// # Examples
///
/// ```
/// use uanode_core::types::{Variant, VariantType};
///
/// let value = Variant::Double(21.5);
/// assert_eq!(value.variant_type(), Some(VariantType::Double));
///
/// let narrowed = Variant::Int64(42).cast(VariantType::Byte).unwrap();
/// assert_eq!(narrowed, Variant::Byte(42));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Variant {
    /// No value.
    #[default]
    Empty,
    /// Boolean.
    Boolean(bool),
    /// Signed 8-bit integer.
    SByte(i8),
    /// Unsigned 8-bit integer.
    Byte(u8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Date and time.
    DateTime(DateTime<Utc>),
    /// GUID.
    Guid(Uuid),
    /// Byte string.
    ByteString(Vec<u8>),
    /// Node id.
    NodeId(NodeId),
    /// Status code.
    StatusCode(StatusCode),
    /// Qualified name.
    QualifiedName(QualifiedName),
    /// Localized text.
    LocalizedText(LocalizedText),
    /// One-dimensional array.
    Array(Vec<Variant>),
}

impl Variant {
    /// Returns the value's type; `None` for [`Variant::Empty`].
    ///
    /// Arrays report the type of their first element.
    pub fn variant_type(&self) -> Option<VariantType> {
        Some(match self {
            Self::Empty => return None,
            Self::Boolean(_) => VariantType::Boolean,
            Self::SByte(_) => VariantType::SByte,
            Self::Byte(_) => VariantType::Byte,
            Self::Int16(_) => VariantType::Int16,
            Self::UInt16(_) => VariantType::UInt16,
            Self::Int32(_) => VariantType::Int32,
            Self::UInt32(_) => VariantType::UInt32,
            Self::Int64(_) => VariantType::Int64,
            Self::UInt64(_) => VariantType::UInt64,
            Self::Float(_) => VariantType::Float,
            Self::Double(_) => VariantType::Double,
            Self::String(_) => VariantType::String,
            Self::DateTime(_) => VariantType::DateTime,
            Self::Guid(_) => VariantType::Guid,
            Self::ByteString(_) => VariantType::ByteString,
            Self::NodeId(_) => VariantType::NodeId,
            Self::StatusCode(_) => VariantType::StatusCode,
            Self::QualifiedName(_) => VariantType::QualifiedName,
            Self::LocalizedText(_) => VariantType::LocalizedText,
            Self::Array(items) => return items.first().and_then(Variant::variant_type),
        })
    }

    /// Returns `true` for [`Variant::Empty`].
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns `true` if this is a numeric scalar.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        self.variant_type().is_some_and(VariantType::is_numeric) && !self.is_array()
    }

    /// Returns `true` if this is an array.
    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Returns the boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Converts an integer scalar to i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::SByte(v) => Some(*v as i64),
            Self::Byte(v) => Some(*v as i64),
            Self::Int16(v) => Some(*v as i64),
            Self::UInt16(v) => Some(*v as i64),
            Self::Int32(v) => Some(*v as i64),
            Self::UInt32(v) => Some(*v as i64),
            Self::Int64(v) => Some(*v),
            Self::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Converts an unsigned-compatible integer scalar to u64.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Byte(v) => Some(*v as u64),
            Self::UInt16(v) => Some(*v as u64),
            Self::UInt32(v) => Some(*v as u64),
            Self::UInt64(v) => Some(*v),
            other => other.as_i64().and_then(|v| u64::try_from(v).ok()),
        }
    }

    /// Converts a numeric scalar to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            Self::UInt64(v) => Some(*v as f64),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Returns the string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the node id value.
    pub fn as_node_id(&self) -> Option<&NodeId> {
        match self {
            Self::NodeId(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the array elements.
    pub fn as_array(&self) -> Option<&[Variant]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Converts the value to `target`, returning `None` if the conversion
    /// loses information or is not defined.
    ///
    /// Arrays are cast element-wise.
    pub fn cast(&self, target: VariantType) -> Option<Variant> {
        if let Self::Array(items) = self {
            return items
                .iter()
                .map(|item| item.cast(target))
                .collect::<Option<Vec<_>>>()
                .map(Self::Array);
        }
        if self.variant_type() == Some(target) {
            return Some(self.clone());
        }
        if let Some(text) = self.as_str() {
            return Self::parse_as(text, target).ok();
        }

        match target {
            VariantType::Boolean => match self.as_i64()? {
                0 => Some(Self::Boolean(false)),
                1 => Some(Self::Boolean(true)),
                _ => None,
            },
            VariantType::SByte => self.int_from().map(Self::SByte),
            VariantType::Byte => self.int_from().map(Self::Byte),
            VariantType::Int16 => self.int_from().map(Self::Int16),
            VariantType::UInt16 => self.int_from().map(Self::UInt16),
            VariantType::Int32 => self.int_from().map(Self::Int32),
            VariantType::UInt32 => self.int_from().map(Self::UInt32),
            VariantType::Int64 => self.int_from().map(Self::Int64),
            VariantType::UInt64 => self.as_u64().map(Self::UInt64),
            VariantType::Float => self.as_f64().map(|v| Self::Float(v as f32)),
            VariantType::Double => self.as_f64().map(Self::Double),
            VariantType::String => match self {
                Self::Empty | Self::ByteString(_) => None,
                other => Some(Self::String(other.to_string())),
            },
            VariantType::StatusCode => self.as_u64().and_then(|v| u32::try_from(v).ok()).map(|v| Self::StatusCode(StatusCode(v))),
            VariantType::LocalizedText => match self {
                Self::QualifiedName(name) => Some(Self::LocalizedText(LocalizedText::new("", name.name.clone()))),
                _ => None,
            },
            _ => None,
        }
    }

    fn int_from<T: TryFrom<i64>>(&self) -> Option<T> {
        let value = match self {
            Self::Boolean(v) => *v as i64,
            Self::Float(_) | Self::Double(_) => {
                let f = self.as_f64()?;
                if f.fract() != 0.0 || !f.is_finite() {
                    return None;
                }
                f as i64
            }
            other => other.as_i64()?,
        };
        T::try_from(value).ok()
    }

    /// Parses text into a value of the given type.
    ///
    /// Used for command-line writes and method arguments, where the value
    /// arrives as text and the server dictates the type.
    pub fn parse_as(text: &str, target: VariantType) -> UaResult<Variant> {
        let text = text.trim();
        let invalid = || UaError::from(ConfigurationError::invalid_value(target.name(), text));

        Ok(match target {
            VariantType::Boolean => match text.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" => Self::Boolean(true),
                "false" | "0" | "off" => Self::Boolean(false),
                _ => return Err(invalid()),
            },
            VariantType::SByte => Self::SByte(text.parse().map_err(|_| invalid())?),
            VariantType::Byte => Self::Byte(text.parse().map_err(|_| invalid())?),
            VariantType::Int16 => Self::Int16(text.parse().map_err(|_| invalid())?),
            VariantType::UInt16 => Self::UInt16(text.parse().map_err(|_| invalid())?),
            VariantType::Int32 => Self::Int32(text.parse().map_err(|_| invalid())?),
            VariantType::UInt32 => Self::UInt32(text.parse().map_err(|_| invalid())?),
            VariantType::Int64 => Self::Int64(text.parse().map_err(|_| invalid())?),
            VariantType::UInt64 => Self::UInt64(text.parse().map_err(|_| invalid())?),
            VariantType::Float => Self::Float(text.parse().map_err(|_| invalid())?),
            VariantType::Double => Self::Double(text.parse().map_err(|_| invalid())?),
            VariantType::String => Self::String(text.to_string()),
            VariantType::DateTime => Self::DateTime(
                DateTime::parse_from_rfc3339(text)
                    .map_err(|_| invalid())?
                    .with_timezone(&Utc),
            ),
            VariantType::Guid => Self::Guid(Uuid::parse_str(text).map_err(|_| invalid())?),
            VariantType::ByteString => Self::ByteString(text.as_bytes().to_vec()),
            VariantType::NodeId => Self::NodeId(text.parse()?),
            VariantType::StatusCode => {
                let raw = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"));
                let code = match raw {
                    Some(hex) => u32::from_str_radix(hex, 16),
                    None => text.parse(),
                };
                Self::StatusCode(StatusCode(code.map_err(|_| invalid())?))
            }
            VariantType::QualifiedName => Self::QualifiedName(text.parse()?),
            VariantType::LocalizedText => Self::LocalizedText(LocalizedText::from(text)),
        })
    }

    /// Converts the value to JSON for display and export.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Self::Empty => serde_json::Value::Null,
            Self::Boolean(v) => json!(v),
            Self::SByte(v) => json!(v),
            Self::Byte(v) => json!(v),
            Self::Int16(v) => json!(v),
            Self::UInt16(v) => json!(v),
            Self::Int32(v) => json!(v),
            Self::UInt32(v) => json!(v),
            Self::Int64(v) => json!(v),
            Self::UInt64(v) => json!(v),
            Self::Float(v) => json!(v),
            Self::Double(v) => json!(v),
            Self::String(v) => json!(v),
            Self::DateTime(v) => json!(v.to_rfc3339()),
            Self::Guid(v) => json!(v.to_string()),
            Self::ByteString(v) => json!(v),
            Self::NodeId(v) => json!(v.to_string()),
            Self::StatusCode(v) => json!(v.name()),
            Self::QualifiedName(v) => json!(v.to_string()),
            Self::LocalizedText(v) => json!(v.text),
            Self::Array(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "null"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::SByte(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Guid(v) => write!(f, "{v}"),
            Self::ByteString(v) => write!(f, "<{} bytes>", v.len()),
            Self::NodeId(v) => write!(f, "{v}"),
            Self::StatusCode(v) => write!(f, "{v}"),
            Self::QualifiedName(v) => write!(f, "{v}"),
            Self::LocalizedText(v) => write!(f, "{v}"),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! impl_from_for_variant {
    ($variant:ident, $type:ty) => {
        impl From<$type> for Variant {
            fn from(v: $type) -> Self {
                Variant::$variant(v)
            }
        }
    };
}

impl_from_for_variant!(Boolean, bool);
impl_from_for_variant!(SByte, i8);
impl_from_for_variant!(Byte, u8);
impl_from_for_variant!(Int16, i16);
impl_from_for_variant!(UInt16, u16);
impl_from_for_variant!(Int32, i32);
impl_from_for_variant!(UInt32, u32);
impl_from_for_variant!(Int64, i64);
impl_from_for_variant!(UInt64, u64);
impl_from_for_variant!(Float, f32);
impl_from_for_variant!(Double, f64);
impl_from_for_variant!(String, String);
impl_from_for_variant!(DateTime, DateTime<Utc>);
impl_from_for_variant!(NodeId, NodeId);
impl_from_for_variant!(StatusCode, StatusCode);
impl_from_for_variant!(QualifiedName, QualifiedName);
impl_from_for_variant!(LocalizedText, LocalizedText);

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_string())
    }
}

impl<T: Into<Variant>> From<Vec<T>> for Variant {
    fn from(items: Vec<T>) -> Self {
        Variant::Array(items.into_iter().map(Into::into).collect())
    }
}

// =============================================================================
// DataValue
// =============================================================================

/// A value with its status and timestamps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataValue {
    /// The value.
    pub value: Variant,

    /// Status of the value.
    pub status: StatusCode,

    /// When the source produced the value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_timestamp: Option<DateTime<Utc>>,

    /// When the server processed the value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    /// Creates a Good value stamped with the current time.
    pub fn new(value: impl Into<Variant>) -> Self {
        let now = Utc::now();
        Self {
            value: value.into(),
            status: StatusCode::GOOD,
            source_timestamp: Some(now),
            server_timestamp: Some(now),
        }
    }

    /// Creates a value-less result carrying only a status.
    pub fn from_status(status: StatusCode) -> Self {
        Self {
            value: Variant::Empty,
            status,
            source_timestamp: None,
            server_timestamp: Some(Utc::now()),
        }
    }

    /// Sets the source timestamp.
    pub fn with_source_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.source_timestamp = Some(timestamp);
        self
    }

    /// Returns `true` if the status is Good.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.value, self.status.name())?;
        if let Some(ts) = self.source_timestamp {
            write!(f, " @ {}", ts.format("%Y-%m-%d %H:%M:%S%.3f"))?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ids() {
        assert_eq!(VariantType::Boolean.type_id(), 1);
        assert_eq!(VariantType::LocalizedText.type_id(), 21);
        assert_eq!(VariantType::from_type_id(11), Some(VariantType::Double));
        assert_eq!(VariantType::from_type_id(16), None);
        assert_eq!(VariantType::Double.data_type_node(), NodeId::numeric(0, 11));
    }

    #[test]
    fn test_cast_numeric() {
        assert_eq!(Variant::Int64(200).cast(VariantType::Byte), Some(Variant::Byte(200)));
        assert_eq!(Variant::Int64(300).cast(VariantType::Byte), None);
        assert_eq!(Variant::Double(3.0).cast(VariantType::Int32), Some(Variant::Int32(3)));
        assert_eq!(Variant::Double(3.5).cast(VariantType::Int32), None);
        assert_eq!(Variant::Int32(1).cast(VariantType::Boolean), Some(Variant::Boolean(true)));
        assert_eq!(Variant::UInt16(7).cast(VariantType::Double), Some(Variant::Double(7.0)));
    }

    #[test]
    fn test_cast_from_string() {
        assert_eq!(Variant::from("42").cast(VariantType::UInt32), Some(Variant::UInt32(42)));
        assert_eq!(Variant::from("x").cast(VariantType::UInt32), None);
        assert_eq!(
            Variant::from(vec![1i32, 2]).cast(VariantType::Double),
            Some(Variant::Array(vec![Variant::Double(1.0), Variant::Double(2.0)]))
        );
    }

    #[test]
    fn test_parse_as() {
        assert_eq!(
            Variant::parse_as("on", VariantType::Boolean).unwrap(),
            Variant::Boolean(true)
        );
        assert_eq!(
            Variant::parse_as("0x80340000", VariantType::StatusCode).unwrap(),
            Variant::StatusCode(StatusCode::BAD_NODE_ID_UNKNOWN)
        );
        assert_eq!(
            Variant::parse_as("ns=2;i=5", VariantType::NodeId).unwrap(),
            Variant::NodeId(NodeId::numeric(2, 5))
        );
        assert!(Variant::parse_as("abc", VariantType::Int16).is_err());
    }

    #[test]
    fn test_display_and_json() {
        assert_eq!(Variant::from(vec![1u8, 2]).to_string(), "[1, 2]");
        assert_eq!(Variant::Empty.to_json(), serde_json::Value::Null);
        assert_eq!(Variant::Double(1.5).to_json(), serde_json::json!(1.5));
    }

    #[test]
    fn test_data_value() {
        let value = DataValue::new(12.5);
        assert!(value.is_good());
        assert!(value.source_timestamp.is_some());

        let failed = DataValue::from_status(StatusCode::BAD_NOT_READABLE);
        assert!(!failed.is_good());
        assert!(failed.value.is_empty());
    }
}
