// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Request and result types for the attribute, view, method, history and
//! node management services.
//!
//! Every result list answers a request list position by position. A failed
//! item keeps its slot and carries a Bad status with an empty value.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, UaResult};
use crate::status::StatusCode;
use crate::types::{
    Attribute, BrowseDirection, DataValue, LocalizedText, NodeClass, NodeId, QualifiedName,
    Variant, VariantType,
};

// =============================================================================
// Read
// =============================================================================

/// One attribute of one node to read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadItem {
    /// Node to read.
    pub node_id: NodeId,
    /// Attribute to read.
    pub attribute: Attribute,
    /// Optional numeric range for array values, e.g. `1:3`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_range: Option<String>,
}

impl ReadItem {
    /// Creates a read item for `attribute` of `node_id`.
    pub fn new(node_id: NodeId, attribute: Attribute) -> Self {
        Self {
            node_id,
            attribute,
            index_range: None,
        }
    }

    /// Reads the Value attribute.
    pub fn value(node_id: NodeId) -> Self {
        Self::new(node_id, Attribute::Value)
    }

    /// Restricts the read to an index range.
    pub fn with_index_range(mut self, range: impl Into<String>) -> Self {
        self.index_range = Some(range.into());
        self
    }
}

/// Outcome of reading one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResult {
    /// Node that was read.
    pub node_id: NodeId,
    /// Attribute that was read.
    pub attribute: Attribute,
    /// Index range echoed from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_range: Option<String>,
    /// Per-item status.
    pub status: StatusCode,
    /// Server timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_timestamp: Option<DateTime<Utc>>,
    /// Source timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Value; [`Variant::Empty`] on failure.
    pub value: Variant,
    /// URI of the node's namespace, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_name: Option<String>,
}

impl ReadResult {
    /// Builds a result for `item` from a data value.
    pub fn from_data_value(item: &ReadItem, value: DataValue) -> Self {
        Self {
            node_id: item.node_id.clone(),
            attribute: item.attribute,
            index_range: item.index_range.clone(),
            status: value.status,
            server_timestamp: value.server_timestamp,
            source_timestamp: value.source_timestamp,
            value: value.value,
            namespace_name: None,
        }
    }

    /// Builds a failed result for `item`.
    pub fn failed(item: &ReadItem, status: StatusCode) -> Self {
        Self::from_data_value(item, DataValue::from_status(status))
    }

    /// Returns `true` if the status is Good.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }

    /// Returns the value with its status and timestamps.
    pub fn data_value(&self) -> DataValue {
        DataValue {
            value: self.value.clone(),
            status: self.status,
            source_timestamp: self.source_timestamp,
            server_timestamp: self.server_timestamp,
        }
    }
}

// =============================================================================
// Write
// =============================================================================

/// One attribute of one node to write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteItem {
    /// Node to write.
    pub node_id: NodeId,
    /// Attribute to write.
    pub attribute: Attribute,
    /// Optional index range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_range: Option<String>,
    /// Value to write.
    pub value: Variant,
    /// Wire type; the value is cast to it before dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<VariantType>,
    /// Source timestamp to write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Server timestamp to write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_timestamp: Option<DateTime<Utc>>,
    /// Status to write along with the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusCode>,
}

impl WriteItem {
    /// Creates a write item.
    pub fn new(node_id: NodeId, attribute: Attribute, value: impl Into<Variant>) -> Self {
        Self {
            node_id,
            attribute,
            index_range: None,
            value: value.into(),
            value_type: None,
            source_timestamp: None,
            server_timestamp: None,
            status: None,
        }
    }

    /// Writes the Value attribute.
    pub fn value(node_id: NodeId, value: impl Into<Variant>) -> Self {
        Self::new(node_id, Attribute::Value, value)
    }

    /// Sets the wire type.
    pub fn with_type(mut self, value_type: VariantType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    /// Sets the index range.
    pub fn with_index_range(mut self, range: impl Into<String>) -> Self {
        self.index_range = Some(range.into());
        self
    }

    /// Sets the source timestamp.
    pub fn with_source_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.source_timestamp = Some(timestamp);
        self
    }

    /// Returns the value converted to its wire type.
    ///
    /// # Errors
    ///
    /// Fails if the value cannot be represented in the requested type.
    pub fn typed_value(&self) -> UaResult<Variant> {
        match self.value_type {
            None => Ok(self.value.clone()),
            Some(target) => self.value.cast(target).ok_or_else(|| {
                ConfigurationError::invalid_value(target.name(), self.value.to_string()).into()
            }),
        }
    }
}

/// Outcome of writing one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    /// Node that was written.
    pub node_id: NodeId,
    /// Attribute that was written.
    pub attribute: Attribute,
    /// Index range echoed from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_range: Option<String>,
    /// Per-item status.
    pub status: StatusCode,
}

impl WriteResult {
    /// Builds a result for `item`.
    pub fn new(item: &WriteItem, status: StatusCode) -> Self {
        Self {
            node_id: item.node_id.clone(),
            attribute: item.attribute,
            index_range: item.index_range.clone(),
            status,
        }
    }

    /// Returns `true` if the status is Good.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }
}

// =============================================================================
// Browse
// =============================================================================

/// Parameters of a browse call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseRequest {
    /// Which references to follow.
    pub direction: BrowseDirection,
    /// Reference type filter.
    pub reference_type: NodeId,
    /// Whether subtypes of `reference_type` match.
    pub include_subtypes: bool,
    /// Node class mask; 0 returns all classes.
    pub node_class_mask: u32,
}

impl Default for BrowseRequest {
    fn default() -> Self {
        Self {
            direction: BrowseDirection::Forward,
            reference_type: NodeId::HIERARCHICAL_REFERENCES,
            include_subtypes: true,
            node_class_mask: 0,
        }
    }
}

impl BrowseRequest {
    /// Forward hierarchical children limited to `mask`.
    pub fn children(reference_type: NodeId, node_class_mask: u32) -> Self {
        Self {
            reference_type,
            node_class_mask,
            ..Self::default()
        }
    }

    /// Sets the direction.
    pub fn with_direction(mut self, direction: BrowseDirection) -> Self {
        self.direction = direction;
        self
    }
}

/// One reference returned by browse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDescription {
    /// Reference type.
    pub reference_type: NodeId,
    /// `true` if the browsed node is the source.
    pub is_forward: bool,
    /// Other end of the reference.
    pub target_node_id: NodeId,
    /// Target browse name.
    pub browse_name: QualifiedName,
    /// Target display name.
    pub display_name: LocalizedText,
    /// Target node class.
    pub node_class: NodeClass,
    /// Target type definition; null for non-instances.
    pub type_definition: NodeId,
}

impl fmt::Display for ReferenceDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.target_node_id, self.browse_name, self.node_class
        )
    }
}

// =============================================================================
// Browse paths
// =============================================================================

/// One hop of a relative browse path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelativePathElement {
    /// Reference type to follow.
    pub reference_type: NodeId,
    /// Whether subtypes of `reference_type` match.
    pub include_subtypes: bool,
    /// Follow the reference backwards.
    pub is_inverse: bool,
    /// Browse name the hop must reach.
    pub target_name: QualifiedName,
}

impl RelativePathElement {
    /// Forward hierarchical hop to `target_name`.
    pub fn new(target_name: QualifiedName) -> Self {
        Self {
            reference_type: NodeId::HIERARCHICAL_REFERENCES,
            include_subtypes: true,
            is_inverse: false,
            target_name,
        }
    }

    /// Sets the reference type.
    pub fn with_reference_type(mut self, reference_type: NodeId, include_subtypes: bool) -> Self {
        self.reference_type = reference_type;
        self.include_subtypes = include_subtypes;
        self
    }

    /// Follows the reference backwards.
    pub fn inverse(mut self) -> Self {
        self.is_inverse = true;
        self
    }
}

/// A node reached by a browse path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowsePathTarget {
    /// The node reached.
    pub target_id: NodeId,
    /// Index of the first unprocessed element, [`u32::MAX`] for a full match.
    pub remaining_path_index: u32,
}

impl BrowsePathTarget {
    /// Creates a full-match target.
    pub fn full_match(target_id: NodeId) -> Self {
        Self {
            target_id,
            remaining_path_index: u32::MAX,
        }
    }

    /// Returns `true` if the whole path was matched.
    #[inline]
    pub fn is_fully_resolved(&self) -> bool {
        self.remaining_path_index == u32::MAX
    }
}

// =============================================================================
// Method call
// =============================================================================

/// A method argument with its declared wire type.
///
/// Method signatures are typed on the server, so a value alone is not
/// enough to encode an argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedArgument {
    /// Argument value.
    pub value: Variant,
    /// Declared type.
    pub value_type: VariantType,
}

impl TypedArgument {
    /// Creates a typed argument.
    pub fn new(value: impl Into<Variant>, value_type: VariantType) -> Self {
        Self {
            value: value.into(),
            value_type,
        }
    }

    /// Returns the value cast to its declared type.
    pub fn typed_value(&self) -> UaResult<Variant> {
        self.value.cast(self.value_type).ok_or_else(|| {
            ConfigurationError::invalid_value(self.value_type.name(), self.value.to_string()).into()
        })
    }
}

// =============================================================================
// History
// =============================================================================

/// Server-issued token for continuing a history read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContinuationPoint(pub Vec<u8>);

impl fmt::Display for ContinuationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&BASE64.encode(&self.0))
    }
}

/// A raw history read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryReadRawRequest {
    /// Start of the interval.
    pub start: DateTime<Utc>,
    /// End of the interval.
    pub end: DateTime<Utc>,
    /// Maximum values per call; 0 means no limit.
    pub num_values_per_node: u32,
    /// Include bounding values.
    pub return_bounds: bool,
    /// Token of the page to continue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_point: Option<ContinuationPoint>,
}

/// One page of raw history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryReadResponse {
    /// Values in this page.
    pub data: Vec<DataValue>,
    /// Status of the read.
    pub status: StatusCode,
    /// Present when more data remains.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_point: Option<ContinuationPoint>,
    /// Request that produced the page.
    pub request: HistoryReadRawRequest,
}

impl HistoryReadResponse {
    /// Returns `true` if another page can be requested.
    pub fn has_more_data(&self) -> bool {
        self.continuation_point.is_some()
    }

    /// Builds the request for the next page.
    pub fn next_request(&self) -> Option<HistoryReadRawRequest> {
        let point = self.continuation_point.clone()?;
        Some(HistoryReadRawRequest {
            continuation_point: Some(point),
            ..self.request.clone()
        })
    }
}

// =============================================================================
// Node management
// =============================================================================

/// A node to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddNodeItem {
    /// Parent node.
    pub parent_node_id: NodeId,
    /// Reference from parent to the new node.
    pub reference_type: NodeId,
    /// Requested node id; null lets the server choose.
    pub requested_new_node_id: NodeId,
    /// Browse name.
    pub browse_name: QualifiedName,
    /// Node class.
    pub node_class: NodeClass,
    /// Display name; defaults to the browse name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<LocalizedText>,
    /// Initial value for variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Variant>,
    /// Type definition.
    pub type_definition: NodeId,
}

impl AddNodeItem {
    /// A variable organized under `parent`.
    pub fn variable(
        parent: NodeId,
        requested: NodeId,
        browse_name: QualifiedName,
        value: impl Into<Variant>,
    ) -> Self {
        Self {
            parent_node_id: parent,
            reference_type: NodeId::HAS_COMPONENT,
            requested_new_node_id: requested,
            browse_name,
            node_class: NodeClass::Variable,
            display_name: None,
            value: Some(value.into()),
            type_definition: NodeId::BASE_DATA_VARIABLE_TYPE,
        }
    }

    /// A folder organized under `parent`.
    pub fn folder(parent: NodeId, requested: NodeId, browse_name: QualifiedName) -> Self {
        Self {
            parent_node_id: parent,
            reference_type: NodeId::ORGANIZES,
            requested_new_node_id: requested,
            browse_name,
            node_class: NodeClass::Object,
            display_name: None,
            value: None,
            type_definition: NodeId::FOLDER_TYPE,
        }
    }
}

/// Outcome of adding a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddNodeResult {
    /// Id of the new node; the requested id when the add failed.
    pub node_id: NodeId,
    /// Status.
    pub status: StatusCode,
}

impl AddNodeResult {
    /// Returns `true` if the node was added.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }
}

/// A reference to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddReferenceItem {
    /// Source node.
    pub source_node_id: NodeId,
    /// Reference type.
    pub reference_type: NodeId,
    /// Target node.
    pub target_node_id: NodeId,
    /// Target node class.
    pub target_node_class: NodeClass,
    /// Direction seen from the source.
    pub is_forward: bool,
}

/// A reference to delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReferenceItem {
    /// Source node.
    pub source_node_id: NodeId,
    /// Reference type.
    pub reference_type: NodeId,
    /// Target node.
    pub target_node_id: NodeId,
    /// Direction seen from the source.
    pub is_forward: bool,
    /// Also delete the opposite reference.
    pub delete_bidirectional: bool,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_read_keeps_slot() {
        let item = ReadItem::value(NodeId::numeric(2, 99)).with_index_range("0:1");
        let result = ReadResult::failed(&item, StatusCode::BAD_NODE_ID_UNKNOWN);
        assert_eq!(result.node_id, item.node_id);
        assert_eq!(result.index_range.as_deref(), Some("0:1"));
        assert!(result.value.is_empty());
        assert!(!result.is_good());
    }

    #[test]
    fn test_write_item_typed_value() {
        let item = WriteItem::value(NodeId::numeric(2, 1), 3i64).with_type(VariantType::UInt16);
        assert_eq!(item.typed_value().unwrap(), Variant::UInt16(3));

        let bad = WriteItem::value(NodeId::numeric(2, 1), -3i64).with_type(VariantType::UInt16);
        assert!(bad.typed_value().is_err());
    }

    #[test]
    fn test_typed_argument() {
        let arg = TypedArgument::new(2.0, VariantType::Int32);
        assert_eq!(arg.typed_value().unwrap(), Variant::Int32(2));
    }

    #[test]
    fn test_history_next_request() {
        let request = HistoryReadRawRequest {
            start: Utc::now(),
            end: Utc::now(),
            num_values_per_node: 10,
            return_bounds: false,
            continuation_point: None,
        };
        let page = HistoryReadResponse {
            data: Vec::new(),
            status: StatusCode::GOOD,
            continuation_point: Some(ContinuationPoint(vec![1, 2, 3])),
            request: request.clone(),
        };
        assert!(page.has_more_data());
        let next = page.next_request().unwrap();
        assert_eq!(next.num_values_per_node, 10);
        assert_eq!(next.continuation_point, Some(ContinuationPoint(vec![1, 2, 3])));
        assert_eq!(ContinuationPoint(vec![1, 2, 3]).to_string(), "AQID");
    }

    #[test]
    fn test_browse_path_target() {
        assert!(BrowsePathTarget::full_match(NodeId::numeric(1, 1)).is_fully_resolved());
        let partial = BrowsePathTarget {
            target_id: NodeId::numeric(1, 1),
            remaining_path_index: 1,
        };
        assert!(!partial.is_fully_resolved());
    }
}
