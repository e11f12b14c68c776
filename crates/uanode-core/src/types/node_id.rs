// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Node identifiers.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigurationError, UaError};

// =============================================================================
// NodeId
// =============================================================================

/// OPC UA Node Identifier with a resolved namespace index.
///
/// The canonical text form is `ns=<index>;<kind>=<identifier>` where kind
/// is one of `i`, `s`, `g` or `b`. [`Display`](fmt::Display) always writes
/// the namespace, including `ns=0`, so the output can be fed back to
/// servers and lookup tables keyed by the canonical string.
///
/// # Examples
///
/// ```
/// use uanode_core::types::NodeId;
///
/// let node: NodeId = "ns=3;s=ACControl.SetPoint".parse().unwrap();
/// assert_eq!(node.namespace_index, 3);
/// assert_eq!(node.to_string(), "ns=3;s=ACControl.SetPoint");
///
/// // Namespace 0 may be omitted on input
/// let objects: NodeId = "i=85".parse().unwrap();
/// assert_eq!(objects, NodeId::OBJECTS_FOLDER);
/// assert_eq!(objects.to_string(), "ns=0;i=85");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    /// Creates a numeric node ID.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Creates a GUID node ID.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(value),
        }
    }

    /// Creates an opaque (byte string) node ID.
    #[inline]
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(value),
        }
    }

    /// Parses an identifier part such as `i=85` or `s=Pump.Speed` and
    /// combines it with a namespace index.
    pub fn from_parts(namespace_index: u16, identifier: &str) -> Result<Self, UaError> {
        Ok(Self {
            namespace_index,
            identifier: identifier.parse()?,
        })
    }

    // =========================================================================
    // Standard Node IDs
    // =========================================================================

    /// Null node (ns=0, i=0).
    pub const NULL: NodeId = NodeId::ns0(0);

    /// Root folder node (ns=0, i=84).
    pub const ROOT_FOLDER: NodeId = NodeId::ns0(84);

    /// Objects folder node (ns=0, i=85).
    pub const OBJECTS_FOLDER: NodeId = NodeId::ns0(85);

    /// Types folder node (ns=0, i=86).
    pub const TYPES_FOLDER: NodeId = NodeId::ns0(86);

    /// Server object (ns=0, i=2253).
    pub const SERVER: NodeId = NodeId::ns0(2253);

    /// Server namespace array variable (ns=0, i=2255).
    pub const NAMESPACE_ARRAY: NodeId = NodeId::ns0(2255);

    /// BaseEventType (ns=0, i=2041).
    pub const BASE_EVENT_TYPE: NodeId = NodeId::ns0(2041);

    /// BaseDataVariableType (ns=0, i=63).
    pub const BASE_DATA_VARIABLE_TYPE: NodeId = NodeId::ns0(63);

    /// FolderType (ns=0, i=61).
    pub const FOLDER_TYPE: NodeId = NodeId::ns0(61);

    /// BaseObjectType (ns=0, i=58).
    pub const BASE_OBJECT_TYPE: NodeId = NodeId::ns0(58);

    /// BaseDataType (ns=0, i=24).
    pub const BASE_DATA_TYPE: NodeId = NodeId::ns0(24);

    // Reference types

    /// References (ns=0, i=31), root of the reference type hierarchy.
    pub const REFERENCES: NodeId = NodeId::ns0(31);

    /// NonHierarchicalReferences (ns=0, i=32).
    pub const NON_HIERARCHICAL_REFERENCES: NodeId = NodeId::ns0(32);

    /// HierarchicalReferences (ns=0, i=33).
    pub const HIERARCHICAL_REFERENCES: NodeId = NodeId::ns0(33);

    /// HasChild (ns=0, i=34).
    pub const HAS_CHILD: NodeId = NodeId::ns0(34);

    /// Organizes (ns=0, i=35).
    pub const ORGANIZES: NodeId = NodeId::ns0(35);

    /// HasEventSource (ns=0, i=36).
    pub const HAS_EVENT_SOURCE: NodeId = NodeId::ns0(36);

    /// HasTypeDefinition (ns=0, i=40).
    pub const HAS_TYPE_DEFINITION: NodeId = NodeId::ns0(40);

    /// Aggregates (ns=0, i=44).
    pub const AGGREGATES: NodeId = NodeId::ns0(44);

    /// HasSubtype (ns=0, i=45).
    pub const HAS_SUBTYPE: NodeId = NodeId::ns0(45);

    /// HasProperty (ns=0, i=46).
    pub const HAS_PROPERTY: NodeId = NodeId::ns0(46);

    /// HasComponent (ns=0, i=47).
    pub const HAS_COMPONENT: NodeId = NodeId::ns0(47);

    /// HasNotifier (ns=0, i=48).
    pub const HAS_NOTIFIER: NodeId = NodeId::ns0(48);

    const fn ns0(value: u32) -> Self {
        Self {
            namespace_index: 0,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Returns `true` if this is the null node ID.
    #[inline]
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// Returns the numeric value if this is a numeric identifier.
    #[inline]
    pub fn as_numeric(&self) -> Option<u32> {
        match &self.identifier {
            NodeIdentifier::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string value if this is a string identifier.
    #[inline]
    pub fn as_string(&self) -> Option<&str> {
        match &self.identifier {
            NodeIdentifier::String(v) => Some(v),
            _ => None,
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns={};{}", self.namespace_index, self.identifier)
    }
}

impl FromStr for NodeId {
    type Err = UaError;

    /// Parses `ns=<index>;<kind>=<id>` or a bare `<kind>=<id>` (namespace 0).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (namespace_index, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns_str, id) = rest.split_once(';').ok_or_else(|| {
                    ConfigurationError::invalid_node_id(s, "Missing identifier after namespace")
                })?;
                let ns: u16 = ns_str
                    .parse()
                    .map_err(|_| ConfigurationError::invalid_node_id(s, "Invalid namespace index"))?;
                (ns, id)
            }
            None => (0, s),
        };

        let identifier = identifier_part
            .parse::<NodeIdentifier>()
            .map_err(|_| ConfigurationError::invalid_node_id(s, "Expected i=, s=, g= or b= identifier"))?;

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

// =============================================================================
// NodeIdentifier
// =============================================================================

/// The four OPC UA identifier kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NodeIdentifier {
    /// Numeric identifier.
    Numeric(u32),

    /// String identifier.
    String(String),

    /// GUID identifier.
    Guid(Uuid),

    /// Opaque identifier, base64 in text form.
    Opaque(Vec<u8>),
}

impl NodeIdentifier {
    /// Returns the kind prefix used in the canonical string.
    pub const fn type_prefix(&self) -> char {
        match self {
            Self::Numeric(_) => 'i',
            Self::String(_) => 's',
            Self::Guid(_) => 'g',
            Self::Opaque(_) => 'b',
        }
    }
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={v}"),
            Self::String(v) => write!(f, "s={v}"),
            Self::Guid(v) => write!(f, "g={v}"),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

impl FromStr for NodeIdentifier {
    type Err = UaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = s
            .split_once('=')
            .ok_or_else(|| ConfigurationError::invalid_node_id(s, "Missing '=' in identifier"))?;

        match kind {
            "i" => value
                .parse()
                .map(Self::Numeric)
                .map_err(|_| ConfigurationError::invalid_node_id(s, "Invalid numeric identifier").into()),
            "s" => Ok(Self::String(value.to_string())),
            "g" => Uuid::parse_str(value)
                .map(Self::Guid)
                .map_err(|e| ConfigurationError::invalid_node_id(s, format!("Invalid GUID: {e}")).into()),
            "b" => BASE64
                .decode(value)
                .map(Self::Opaque)
                .map_err(|e| ConfigurationError::invalid_node_id(s, format!("Invalid base64: {e}")).into()),
            _ => Err(ConfigurationError::invalid_node_id(s, "Unknown identifier kind").into()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_kinds() {
        let numeric: NodeId = "ns=2;i=1001".parse().unwrap();
        assert_eq!(numeric, NodeId::numeric(2, 1001));

        let string: NodeId = "ns=3;s=ACControl.SetPoint".parse().unwrap();
        assert_eq!(string.as_string(), Some("ACControl.SetPoint"));

        let guid: NodeId = "ns=1;g=550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
        assert!(matches!(guid.identifier, NodeIdentifier::Guid(_)));

        let opaque: NodeId = "ns=4;b=SGVsbG8=".parse().unwrap();
        assert_eq!(opaque.identifier, NodeIdentifier::Opaque(b"Hello".to_vec()));
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!(NodeId::numeric(0, 85).to_string(), "ns=0;i=85");
        assert_eq!(NodeId::opaque(4, b"Hello".to_vec()).to_string(), "ns=4;b=SGVsbG8=");
        for text in ["ns=2;i=1001", "ns=3;s=A;B", "ns=4;b=SGVsbG8="] {
            let parsed: NodeId = text.parse().unwrap();
            assert_eq!(parsed.to_string(), text);
        }
    }

    #[test]
    fn test_string_identifier_keeps_semicolons() {
        let node: NodeId = "ns=3;s=ns=1;i=5".parse().unwrap();
        assert_eq!(node.as_string(), Some("ns=1;i=5"));
    }

    #[test]
    fn test_parse_errors() {
        assert!("ns=x;i=1".parse::<NodeId>().is_err());
        assert!("ns=2".parse::<NodeId>().is_err());
        assert!("ns=2;q=1".parse::<NodeId>().is_err());
        assert!("ns=2;i=abc".parse::<NodeId>().is_err());
        assert!("ns=2;g=not-a-guid".parse::<NodeId>().is_err());
        assert!("plain".parse::<NodeId>().is_err());
    }
}
