// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core OPC UA value types shared by the engine and every backend.
//!
//! - [`NodeId`] / [`NodeIdentifier`]: canonical node references
//! - [`Attribute`] / [`AttributeMask`]: attribute slots and bitmasks
//! - [`Variant`] / [`VariantType`] / [`DataValue`]: dynamically typed values
//! - [`EndpointDescription`] / [`ApplicationDescription`]: discovery results

mod attribute;
mod endpoint;
mod node_id;
mod variant;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, UaError};

pub use attribute::{Attribute, AttributeMask};
pub use endpoint::{
    ApplicationDescription, ApplicationType, EndpointDescription, MessageSecurityMode,
    UserTokenType, SECURITY_POLICY_NONE,
};
pub use node_id::{NodeId, NodeIdentifier};
pub use variant::{DataValue, Variant, VariantType};

// =============================================================================
// QualifiedName
// =============================================================================

/// A name qualified by a namespace index, e.g. a browse name.
///
/// Text form is `<index>:<name>`, with the index omitted for namespace 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Namespace index.
    pub namespace_index: u16,
    /// Name.
    pub name: String,
}

impl QualifiedName {
    /// Creates a qualified name.
    pub fn new(namespace_index: u16, name: impl Into<String>) -> Self {
        Self {
            namespace_index,
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index == 0 {
            f.write_str(&self.name)
        } else {
            write!(f, "{}:{}", self.namespace_index, self.name)
        }
    }
}

impl FromStr for QualifiedName {
    type Err = UaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ConfigurationError::invalid_value("qualified name", s).into());
        }
        match s.split_once(':') {
            Some((ns, name)) if !ns.is_empty() && ns.bytes().all(|b| b.is_ascii_digit()) => {
                let index = ns
                    .parse()
                    .map_err(|_| ConfigurationError::invalid_value("qualified name", s))?;
                Ok(Self::new(index, name))
            }
            _ => Ok(Self::new(0, s)),
        }
    }
}

// =============================================================================
// LocalizedText
// =============================================================================

/// Human-readable text with an optional locale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LocalizedText {
    /// Locale id such as `en-US`; empty when unspecified.
    pub locale: String,
    /// Text.
    pub text: String,
}

impl LocalizedText {
    /// Creates a localized text.
    pub fn new(locale: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            text: text.into(),
        }
    }
}

impl From<&str> for LocalizedText {
    fn from(text: &str) -> Self {
        Self::new("", text)
    }
}

impl fmt::Display for LocalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// =============================================================================
// NodeClass
// =============================================================================

/// OPC UA node class. Values are the wire bit values, usable in class masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// No class.
    #[default]
    Unspecified,
    /// Object.
    Object,
    /// Variable.
    Variable,
    /// Method.
    Method,
    /// ObjectType.
    ObjectType,
    /// VariableType.
    VariableType,
    /// ReferenceType.
    ReferenceType,
    /// DataType.
    DataType,
    /// View.
    View,
}

impl NodeClass {
    /// Returns the wire value.
    pub const fn value(self) -> i32 {
        match self {
            Self::Unspecified => 0,
            Self::Object => 1,
            Self::Variable => 2,
            Self::Method => 4,
            Self::ObjectType => 8,
            Self::VariableType => 16,
            Self::ReferenceType => 32,
            Self::DataType => 64,
            Self::View => 128,
        }
    }

    /// Creates from the wire value.
    pub fn from_value(value: i32) -> Option<Self> {
        Some(match value {
            0 => Self::Unspecified,
            1 => Self::Object,
            2 => Self::Variable,
            4 => Self::Method,
            8 => Self::ObjectType,
            16 => Self::VariableType,
            32 => Self::ReferenceType,
            64 => Self::DataType,
            128 => Self::View,
            _ => return None,
        })
    }

    /// Returns `true` if a browse node class mask admits this class.
    ///
    /// A zero mask admits every class.
    pub const fn matches_mask(self, mask: u32) -> bool {
        mask == 0 || mask & self.value() as u32 != 0
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for NodeClass {
    type Err = UaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "object" => Ok(Self::Object),
            "variable" => Ok(Self::Variable),
            "method" => Ok(Self::Method),
            "objecttype" => Ok(Self::ObjectType),
            "variabletype" => Ok(Self::VariableType),
            "referencetype" => Ok(Self::ReferenceType),
            "datatype" => Ok(Self::DataType),
            "view" => Ok(Self::View),
            _ => Err(ConfigurationError::invalid_value("node class", s).into()),
        }
    }
}

// =============================================================================
// BrowseDirection
// =============================================================================

/// Direction of references followed by a browse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowseDirection {
    /// Source to target.
    #[default]
    Forward,
    /// Target to source.
    Inverse,
    /// Both directions.
    Both,
}

impl BrowseDirection {
    /// Returns `true` if a reference with the given direction is included.
    pub const fn includes(self, is_forward: bool) -> bool {
        match self {
            Self::Forward => is_forward,
            Self::Inverse => !is_forward,
            Self::Both => true,
        }
    }
}

impl FromStr for BrowseDirection {
    type Err = UaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "forward" => Ok(Self::Forward),
            "inverse" => Ok(Self::Inverse),
            "both" => Ok(Self::Both),
            _ => Err(ConfigurationError::invalid_value("browse direction", s).into()),
        }
    }
}

// =============================================================================
// MonitoringMode
// =============================================================================

/// Server-side monitoring mode of a monitored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringMode {
    /// Neither sampled nor reported.
    Disabled,
    /// Sampled but not reported.
    Sampling,
    /// Sampled and reported.
    #[default]
    Reporting,
}

impl MonitoringMode {
    /// Returns `true` if notifications are delivered in this mode.
    pub const fn is_reporting(self) -> bool {
        matches!(self, Self::Reporting)
    }
}

impl FromStr for MonitoringMode {
    type Err = UaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" => Ok(Self::Disabled),
            "sampling" => Ok(Self::Sampling),
            "reporting" => Ok(Self::Reporting),
            _ => Err(ConfigurationError::invalid_value("monitoring mode", s).into()),
        }
    }
}

// =============================================================================
// ConnectionState
// =============================================================================

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection.
    #[default]
    Disconnected,
    /// Connect in progress.
    Connecting,
    /// Connected; requests may be dispatched.
    Connected,
    /// Disconnect in progress.
    Closing,
}

impl ConnectionState {
    /// Returns `true` if requests may be dispatched.
    #[inline]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    pub(crate) const fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::Closing => 3,
        }
    }

    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Closing,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name_text_form() {
        let name: QualifiedName = "2:Pump".parse().unwrap();
        assert_eq!(name, QualifiedName::new(2, "Pump"));
        assert_eq!(name.to_string(), "2:Pump");

        let plain: QualifiedName = "Objects".parse().unwrap();
        assert_eq!(plain.namespace_index, 0);
        assert_eq!(plain.to_string(), "Objects");

        let odd: QualifiedName = "a:b".parse().unwrap();
        assert_eq!(odd.name, "a:b");
    }

    #[test]
    fn test_node_class_mask() {
        assert!(NodeClass::Variable.matches_mask(0));
        assert!(NodeClass::Variable.matches_mask(NodeClass::Variable.value() as u32));
        assert!(!NodeClass::Object.matches_mask(NodeClass::Variable.value() as u32));
        assert_eq!(NodeClass::from_value(4), Some(NodeClass::Method));
        assert_eq!(NodeClass::from_value(3), None);
    }

    #[test]
    fn test_browse_direction() {
        assert!(BrowseDirection::Forward.includes(true));
        assert!(!BrowseDirection::Forward.includes(false));
        assert!(BrowseDirection::Both.includes(false));
        assert_eq!("inverse".parse::<BrowseDirection>().unwrap(), BrowseDirection::Inverse);
    }

    #[test]
    fn test_connection_state_round_trip() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Closing,
        ] {
            assert_eq!(ConnectionState::from_u8(state.as_u8()), state);
        }
    }
}
