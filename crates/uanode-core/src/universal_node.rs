// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Namespace-independent node references.
//!
//! A [`UniversalNode`] names a node either by namespace index or by
//! namespace URI. Servers only understand indices, and the mapping from URI
//! to index is the server's namespace array, which can change between
//! sessions. Resolution therefore happens against a [`NamespaceSource`]
//! snapshot, usually a connected [`Connection`](crate::Connection).
//!
//! # Examples
//!
//! ```
//! use uanode_core::universal_node::{NamespaceArray, UniversalNode};
//!
//! let namespaces = NamespaceArray::new(vec![
//!     "http://opcfoundation.org/UA/".into(),
//!     "urn:plant:line1".into(),
//! ]);
//!
//! let mut node = UniversalNode::with_namespace_name("urn:plant:line1", "s=Pump.Speed");
//! assert!(node.full_node_id().is_err());
//!
//! assert!(node.resolve_namespace_name_to_index(Some(&namespaces)));
//! assert_eq!(node.full_node_id().unwrap(), "ns=1;s=Pump.Speed");
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, UaResult};
use crate::types::NodeId;

// =============================================================================
// NamespaceArray
// =============================================================================

/// The server's ordered list of namespace URIs.
///
/// Index 0 is always the OPC UA standard namespace. The array is replaced
/// wholesale on every (re)connect and never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceArray {
    uris: Vec<String>,
}

impl NamespaceArray {
    /// URI of the OPC UA standard namespace.
    pub const OPC_UA_NAMESPACE: &'static str = "http://opcfoundation.org/UA/";

    /// Creates an array from URIs in server order.
    pub fn new(uris: Vec<String>) -> Self {
        Self { uris }
    }

    /// Returns the index of `uri`.
    pub fn index_of(&self, uri: &str) -> Option<u16> {
        self.uris
            .iter()
            .position(|u| u == uri)
            .and_then(|i| u16::try_from(i).ok())
    }

    /// Returns the URI at `index`.
    pub fn uri(&self, index: u16) -> Option<&str> {
        self.uris.get(index as usize).map(String::as_str)
    }

    /// Returns the number of namespaces.
    pub fn len(&self) -> usize {
        self.uris.len()
    }

    /// Returns `true` if the array is empty.
    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }

    /// Returns the URIs in index order.
    pub fn uris(&self) -> &[String] {
        &self.uris
    }
}

impl Default for NamespaceArray {
    fn default() -> Self {
        Self::new(vec![Self::OPC_UA_NAMESPACE.to_string()])
    }
}

// =============================================================================
// NamespaceSource
// =============================================================================

/// Something that can hand out a namespace array snapshot.
pub trait NamespaceSource {
    /// Returns the current snapshot.
    fn namespace_array(&self) -> Arc<NamespaceArray>;
}

impl NamespaceSource for Arc<NamespaceArray> {
    fn namespace_array(&self) -> Arc<NamespaceArray> {
        Arc::clone(self)
    }
}

impl NamespaceSource for NamespaceArray {
    fn namespace_array(&self) -> Arc<NamespaceArray> {
        Arc::new(self.clone())
    }
}

// =============================================================================
// UniversalNode
// =============================================================================

/// A node reference whose namespace is given by index or by URI.
///
/// Exactly one of the two is authoritative at a time. Setting the index
/// discards the name and vice versa; the other is filled in by the
/// `resolve_*` methods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniversalNode {
    namespace_name: Option<String>,
    namespace_index: Option<u16>,
    node_identifier: String,
}

impl UniversalNode {
    /// Creates an empty node reference.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reference with a namespace index.
    pub fn with_namespace_index(index: u16, identifier: &str) -> Self {
        let mut node = Self::new();
        node.set_namespace_index(index);
        node.set_node_identifier(identifier);
        node
    }

    /// Creates a reference with a namespace name.
    pub fn with_namespace_name(name: &str, identifier: &str) -> Self {
        let mut node = Self::new();
        node.set_node_identifier(identifier);
        node.set_namespace_name(name);
        node
    }

    /// Creates a reference from a resolved node id.
    pub fn from_node_id(node_id: &NodeId) -> Self {
        Self {
            namespace_name: None,
            namespace_index: Some(node_id.namespace_index),
            node_identifier: node_id.identifier.to_string(),
        }
    }

    /// Sets the namespace index and invalidates the name.
    pub fn set_namespace_index(&mut self, index: u16) {
        self.namespace_index = Some(index);
        self.namespace_name = None;
    }

    /// Sets the namespace name and invalidates the index.
    ///
    /// A purely numeric name is taken as an index. Any other text,
    /// including something shaped like `ns=2;...`, is stored verbatim.
    pub fn set_namespace_name(&mut self, name: &str) {
        if let Ok(index) = name.parse::<u16>() {
            self.set_namespace_index(index);
            return;
        }
        self.namespace_name = Some(name.to_string());
        self.namespace_index = None;
    }

    /// Sets the identifier.
    ///
    /// A canonical `ns=<index>;<id>` string also sets the namespace index.
    pub fn set_node_identifier(&mut self, identifier: &str) {
        match Self::split_node_id_and_namespace(identifier) {
            Some((index, id)) => {
                self.set_namespace_index(index);
                self.node_identifier = id;
            }
            None => self.node_identifier = identifier.to_string(),
        }
    }

    /// Returns the namespace name, if known.
    pub fn namespace_name(&self) -> Option<&str> {
        self.namespace_name.as_deref()
    }

    /// Returns the namespace index, if resolved.
    pub fn namespace_index(&self) -> Option<u16> {
        self.namespace_index
    }

    /// Returns the identifier part, e.g. `s=Pump.Speed`.
    pub fn node_identifier(&self) -> &str {
        &self.node_identifier
    }

    /// Resolves the namespace name to an index by scanning the array.
    ///
    /// Returns `false` and leaves the index unresolved when no source is
    /// given, no name is set, or the name is not in the array.
    pub fn resolve_namespace_name_to_index(&mut self, source: Option<&dyn NamespaceSource>) -> bool {
        let (Some(source), Some(name)) = (source, self.namespace_name.as_deref()) else {
            return false;
        };
        match source.namespace_array().index_of(name) {
            Some(index) => {
                self.namespace_index = Some(index);
                true
            }
            None => {
                tracing::debug!(namespace = name, "Namespace not found in namespace array");
                self.namespace_index = None;
                false
            }
        }
    }

    /// Resolves the namespace index to a name by array position.
    pub fn resolve_namespace_index_to_name(&mut self, source: Option<&dyn NamespaceSource>) -> bool {
        let (Some(source), Some(index)) = (source, self.namespace_index) else {
            return false;
        };
        match source.namespace_array().uri(index) {
            Some(uri) => {
                self.namespace_name = Some(uri.to_string());
                true
            }
            None => false,
        }
    }

    /// Resolves whichever half of the namespace is missing.
    pub fn resolve_namespace(&mut self, source: Option<&dyn NamespaceSource>) -> bool {
        match (self.namespace_index, &self.namespace_name) {
            (Some(_), Some(_)) => true,
            (Some(_), None) => self.resolve_namespace_index_to_name(source),
            (None, Some(_)) => self.resolve_namespace_name_to_index(source),
            (None, None) => false,
        }
    }

    /// Returns the canonical `ns=<index>;<identifier>` string.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::UnresolvedNamespace`] if the index has not been
    /// resolved. No namespace is ever assumed.
    pub fn full_node_id(&self) -> UaResult<String> {
        match self.namespace_index {
            Some(index) => Ok(Self::create_node_string(index, &self.node_identifier)),
            None => Err(ConfigurationError::unresolved_namespace(
                self.namespace_name.clone().unwrap_or_default(),
            )
            .into()),
        }
    }

    /// Converts to a typed [`NodeId`].
    pub fn to_node_id(&self) -> UaResult<NodeId> {
        let index = self.namespace_index.ok_or_else(|| {
            ConfigurationError::unresolved_namespace(self.namespace_name.clone().unwrap_or_default())
        })?;
        NodeId::from_parts(index, &self.node_identifier)
    }

    /// Splits `ns=<index>;<identifier>` into its parts.
    ///
    /// Returns `None` on a missing `ns=` prefix, a non-numeric index, or a
    /// missing `;`.
    pub fn split_node_id_and_namespace(input: &str) -> Option<(u16, String)> {
        let rest = input.strip_prefix("ns=")?;
        let (index, identifier) = rest.split_once(';')?;
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some((index.parse().ok()?, identifier.to_string()))
    }

    /// Builds `ns=<index>;<identifier>`.
    pub fn create_node_string(index: u16, identifier: &str) -> String {
        format!("ns={index};{identifier}")
    }
}

impl From<&NodeId> for UniversalNode {
    fn from(node_id: &NodeId) -> Self {
        Self::from_node_id(node_id)
    }
}

impl fmt::Display for UniversalNode {
    /// Writes the canonical form when resolved, `nsu=<uri>;<id>` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.namespace_index, &self.namespace_name) {
            (Some(index), _) => write!(f, "ns={index};{}", self.node_identifier),
            (None, Some(name)) => write!(f, "nsu={name};{}", self.node_identifier),
            (None, None) => f.write_str(&self.node_identifier),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn namespaces() -> NamespaceArray {
        NamespaceArray::new(vec![
            NamespaceArray::OPC_UA_NAMESPACE.to_string(),
            "urn:server".to_string(),
            "urn:plant".to_string(),
        ])
    }

    #[test]
    fn test_split_and_create_round_trip() {
        for text in [
            "ns=3;s=ACControl.SetPoint",
            "ns=0;i=85",
            "ns=2;g=550e8400-e29b-41d4-a716-446655440000",
            "ns=4;b=SGVsbG8=",
            "ns=1;s=a;b",
        ] {
            let (index, identifier) = UniversalNode::split_node_id_and_namespace(text).unwrap();
            assert_eq!(UniversalNode::create_node_string(index, &identifier), text);
        }
        assert_eq!(
            UniversalNode::split_node_id_and_namespace("ns=3;s=ACControl.SetPoint"),
            Some((3, "s=ACControl.SetPoint".to_string()))
        );
    }

    #[test]
    fn test_split_rejects_malformed() {
        assert_eq!(UniversalNode::split_node_id_and_namespace("i=85"), None);
        assert_eq!(UniversalNode::split_node_id_and_namespace("ns=x;i=85"), None);
        assert_eq!(UniversalNode::split_node_id_and_namespace("ns=;i=85"), None);
        assert_eq!(UniversalNode::split_node_id_and_namespace("ns=2"), None);
        assert_eq!(UniversalNode::split_node_id_and_namespace("ns=70000;i=1"), None);
    }

    #[test]
    fn test_index_and_name_are_exclusive() {
        let mut node = UniversalNode::with_namespace_index(2, "s=Tank");
        assert_eq!(node.namespace_index(), Some(2));

        node.set_namespace_name("urn:plant");
        assert_eq!(node.namespace_index(), None);
        assert_eq!(node.namespace_name(), Some("urn:plant"));

        node.set_namespace_index(1);
        assert_eq!(node.namespace_name(), None);
    }

    #[test]
    fn test_numeric_name_is_index() {
        let mut node = UniversalNode::new();
        node.set_namespace_name("7");
        assert_eq!(node.namespace_index(), Some(7));
        assert_eq!(node.namespace_name(), None);
    }

    #[test]
    fn test_ns_shaped_name_kept_verbatim() {
        let mut node = UniversalNode::new();
        node.set_namespace_name("ns=2;s=Odd");
        assert_eq!(node.namespace_name(), Some("ns=2;s=Odd"));
        assert_eq!(node.namespace_index(), None);
    }

    #[test]
    fn test_identifier_with_prefix_sets_index() {
        let mut node = UniversalNode::new();
        node.set_node_identifier("ns=5;i=1001");
        assert_eq!(node.namespace_index(), Some(5));
        assert_eq!(node.node_identifier(), "i=1001");

        node.set_node_identifier("s=Plain");
        assert_eq!(node.namespace_index(), Some(5));
        assert_eq!(node.node_identifier(), "s=Plain");
    }

    #[test]
    fn test_resolve_name_to_index() {
        let ns = namespaces();
        let mut node = UniversalNode::with_namespace_name("urn:plant", "s=Pump");
        assert!(node.resolve_namespace_name_to_index(Some(&ns)));
        assert_eq!(node.namespace_index(), Some(2));
        assert_eq!(node.full_node_id().unwrap(), "ns=2;s=Pump");
        assert_eq!(node.to_node_id().unwrap(), NodeId::string(2, "Pump"));
    }

    #[test]
    fn test_unknown_namespace_fails_loudly() {
        let ns = namespaces();
        let mut node = UniversalNode::with_namespace_name("UnknownNamespace", "s=Pump");
        assert!(!node.resolve_namespace_name_to_index(Some(&ns)));
        assert_eq!(node.namespace_index(), None);

        let error = node.full_node_id().unwrap_err();
        assert!(error.to_string().contains("UnknownNamespace"));
        assert!(node.to_node_id().is_err());
    }

    #[test]
    fn test_resolve_without_source_fails() {
        let mut node = UniversalNode::with_namespace_name("urn:plant", "s=Pump");
        assert!(!node.resolve_namespace_name_to_index(None));
        assert!(node.full_node_id().is_err());
    }

    #[test]
    fn test_resolve_index_to_name() {
        let ns = namespaces();
        let mut node = UniversalNode::with_namespace_index(1, "i=5");
        assert!(node.resolve_namespace_index_to_name(Some(&ns)));
        assert_eq!(node.namespace_name(), Some("urn:server"));

        let mut out_of_range = UniversalNode::with_namespace_index(9, "i=5");
        assert!(!out_of_range.resolve_namespace_index_to_name(Some(&ns)));
        assert!(!out_of_range.resolve_namespace(Some(&ns)));
    }

    #[test]
    fn test_display() {
        assert_eq!(UniversalNode::with_namespace_index(2, "i=1").to_string(), "ns=2;i=1");
        assert_eq!(
            UniversalNode::with_namespace_name("urn:x", "i=1").to_string(),
            "nsu=urn:x;i=1"
        );
        assert_eq!(UniversalNode::from(&NodeId::OBJECTS_FOLDER).to_string(), "ns=0;i=85");
    }
}
