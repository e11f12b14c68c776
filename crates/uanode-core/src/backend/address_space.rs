// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory address space served by the simulated backend.
//!
//! Holds nodes, forward references, callable methods and value history.
//! All service logic returns OPC UA status codes; nothing here knows about
//! requests, handles or the event bus.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::services::{
    AddNodeItem, AddReferenceItem, BrowsePathTarget, BrowseRequest, ContinuationPoint, DeleteReferenceItem,
    HistoryReadRawRequest, HistoryReadResponse, ReferenceDescription, RelativePathElement, WriteItem,
};
use crate::status::StatusCode;
use crate::types::{Attribute, DataValue, LocalizedText, NodeClass, NodeId, QualifiedName, Variant, VariantType};
use crate::universal_node::NamespaceArray;

/// Namespace of simulation-owned nodes (index 1).
pub const SIMULATION_NAMESPACE: &str = "urn:uanode:simulation";

/// Namespace of the demo nodes (index 2).
pub const DEMO_NAMESPACE: &str = "urn:uanode:demo";

/// `SystemEventType`.
pub const SYSTEM_EVENT_TYPE: u32 = 2130;

const MAX_TYPE_DEPTH: usize = 32;
const ACCESS_READ: u8 = 0x01;
const ACCESS_WRITE: u8 = 0x02;
const ACCESS_HISTORY_READ: u8 = 0x04;

// =============================================================================
// Index ranges
// =============================================================================

/// Parses `"i"` or `"lo:hi"` into an inclusive range.
pub fn parse_index_range(range: &str) -> Option<(usize, usize)> {
    let range = range.trim();
    match range.split_once(':') {
        Some((lo, hi)) => {
            let lo: usize = lo.parse().ok()?;
            let hi: usize = hi.parse().ok()?;
            (lo < hi).then_some((lo, hi))
        }
        None => range.parse().ok().map(|index| (index, index)),
    }
}

fn slice(value: &Variant, range: &str) -> Result<Variant, StatusCode> {
    let (lo, hi) = parse_index_range(range).ok_or(StatusCode::BAD_INDEX_RANGE_INVALID)?;
    match value {
        Variant::Array(items) if lo < items.len() => Ok(Variant::Array(items[lo..=hi.min(items.len() - 1)].to_vec())),
        Variant::String(text) => {
            let chars: Vec<char> = text.chars().collect();
            if lo >= chars.len() {
                return Err(StatusCode::BAD_INDEX_RANGE_NO_DATA);
            }
            Ok(Variant::String(chars[lo..=hi.min(chars.len() - 1)].iter().collect()))
        }
        _ => Err(StatusCode::BAD_INDEX_RANGE_NO_DATA),
    }
}

fn splice(current: &Variant, range: &str, value: &Variant) -> Result<Variant, StatusCode> {
    let (lo, hi) = parse_index_range(range).ok_or(StatusCode::BAD_INDEX_RANGE_INVALID)?;
    let (Variant::Array(items), Variant::Array(replacement)) = (current, value) else {
        return Err(StatusCode::BAD_INDEX_RANGE_INVALID);
    };
    if hi >= items.len() {
        return Err(StatusCode::BAD_INDEX_RANGE_NO_DATA);
    }
    if replacement.len() != hi - lo + 1 {
        return Err(StatusCode::BAD_INDEX_RANGE_INVALID);
    }
    let mut items = items.clone();
    items.splice(lo..=hi, replacement.iter().cloned());
    Ok(Variant::Array(items))
}

fn encode_continuation(offset: usize) -> ContinuationPoint {
    ContinuationPoint((offset as u64).to_le_bytes().to_vec())
}

fn decode_continuation(point: &ContinuationPoint) -> Option<usize> {
    let bytes: [u8; 8] = point.0.as_slice().try_into().ok()?;
    usize::try_from(u64::from_le_bytes(bytes)).ok()
}

// =============================================================================
// Nodes & references
// =============================================================================

/// One node of the address space.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressNode {
    /// Node id.
    pub node_id: NodeId,
    /// Node class.
    pub node_class: NodeClass,
    /// Browse name.
    pub browse_name: QualifiedName,
    /// Display name.
    pub display_name: LocalizedText,
    /// Description.
    pub description: LocalizedText,
    /// Type definition reported by browse.
    pub type_definition: NodeId,
    /// Current value; empty for non-variables.
    pub value: DataValue,
    /// Class-specific attributes.
    pub attributes: BTreeMap<Attribute, Variant>,
    /// Engineering unit range used by percent deadbands.
    pub eu_range: Option<(f64, f64)>,
    /// Stored history, oldest first.
    pub history: Vec<DataValue>,
}

impl AddressNode {
    fn new(node_id: NodeId, node_class: NodeClass, browse_name: QualifiedName, type_definition: NodeId) -> Self {
        Self {
            display_name: LocalizedText::new("", browse_name.name.clone()),
            description: LocalizedText::default(),
            node_id,
            node_class,
            browse_name,
            type_definition,
            value: DataValue::from_status(StatusCode::GOOD),
            attributes: BTreeMap::new(),
            eu_range: None,
            history: Vec::new(),
        }
    }

    /// A readable and writable variable.
    pub fn variable(node_id: NodeId, browse_name: QualifiedName, value: impl Into<Variant>) -> Self {
        let value = value.into();
        let mut node = Self::new(node_id, NodeClass::Variable, browse_name, NodeId::BASE_DATA_VARIABLE_TYPE);
        let data_type = value
            .variant_type()
            .map_or(NodeId::BASE_DATA_TYPE, |value_type| value_type.data_type_node());
        let value_rank = if matches!(value, Variant::Array(_)) { 1 } else { -1 };
        node.attributes.insert(Attribute::DataType, Variant::NodeId(data_type));
        node.attributes.insert(Attribute::ValueRank, Variant::Int32(value_rank));
        node.attributes
            .insert(Attribute::AccessLevel, Variant::Byte(ACCESS_READ | ACCESS_WRITE));
        node.attributes
            .insert(Attribute::UserAccessLevel, Variant::Byte(ACCESS_READ | ACCESS_WRITE));
        node.attributes
            .insert(Attribute::MinimumSamplingInterval, Variant::Double(0.0));
        node.attributes.insert(Attribute::Historizing, Variant::Boolean(false));
        if let Variant::Array(items) = &value {
            node.attributes.insert(
                Attribute::ArrayDimensions,
                Variant::Array(vec![Variant::UInt32(items.len() as u32)]),
            );
        }
        node.value = DataValue::new(value);
        node
    }

    /// An object.
    pub fn object(node_id: NodeId, browse_name: QualifiedName) -> Self {
        let mut node = Self::new(node_id, NodeClass::Object, browse_name, NodeId::BASE_OBJECT_TYPE);
        node.attributes.insert(Attribute::EventNotifier, Variant::Byte(0));
        node
    }

    /// A folder object.
    pub fn folder(node_id: NodeId, browse_name: QualifiedName) -> Self {
        let mut node = Self::object(node_id, browse_name);
        node.type_definition = NodeId::FOLDER_TYPE;
        node
    }

    /// A method.
    pub fn method(node_id: NodeId, browse_name: QualifiedName) -> Self {
        let mut node = Self::new(node_id, NodeClass::Method, browse_name, NodeId::NULL);
        node.attributes.insert(Attribute::Executable, Variant::Boolean(true));
        node.attributes.insert(Attribute::UserExecutable, Variant::Boolean(true));
        node
    }

    /// A reference type.
    pub fn reference_type(node_id: NodeId, name: &str, symmetric: bool, inverse_name: Option<&str>) -> Self {
        let mut node = Self::new(node_id, NodeClass::ReferenceType, QualifiedName::new(0, name), NodeId::NULL);
        node.attributes.insert(Attribute::IsAbstract, Variant::Boolean(false));
        node.attributes.insert(Attribute::Symmetric, Variant::Boolean(symmetric));
        if let Some(inverse) = inverse_name {
            node.attributes
                .insert(Attribute::InverseName, Variant::LocalizedText(LocalizedText::new("", inverse)));
        }
        node
    }

    /// An object type.
    pub fn object_type(node_id: NodeId, name: &str, is_abstract: bool) -> Self {
        let mut node = Self::new(node_id, NodeClass::ObjectType, QualifiedName::new(0, name), NodeId::NULL);
        node.attributes.insert(Attribute::IsAbstract, Variant::Boolean(is_abstract));
        node
    }

    /// Removes write access.
    pub fn read_only(mut self) -> Self {
        self.attributes.insert(Attribute::AccessLevel, Variant::Byte(ACCESS_READ));
        self.attributes.insert(Attribute::UserAccessLevel, Variant::Byte(ACCESS_READ));
        self
    }

    /// Records history of every value change.
    pub fn historizing(mut self) -> Self {
        let level = self.access_level() | ACCESS_HISTORY_READ;
        self.attributes.insert(Attribute::AccessLevel, Variant::Byte(level));
        self.attributes.insert(Attribute::UserAccessLevel, Variant::Byte(level));
        self.attributes.insert(Attribute::Historizing, Variant::Boolean(true));
        self
    }

    /// Sets the engineering unit range.
    pub fn with_eu_range(mut self, low: f64, high: f64) -> Self {
        self.eu_range = Some((low, high));
        self
    }

    /// Marks the object as an event source.
    pub fn with_event_notifier(mut self) -> Self {
        self.attributes.insert(Attribute::EventNotifier, Variant::Byte(1));
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, text: &str) -> Self {
        self.description = LocalizedText::new("", text);
        self
    }

    fn access_level(&self) -> u8 {
        match self.attributes.get(&Attribute::AccessLevel) {
            Some(Variant::Byte(level)) => *level,
            _ => 0,
        }
    }

    /// Returns `true` if clients may write the value.
    pub fn is_writable(&self) -> bool {
        self.access_level() & ACCESS_WRITE != 0
    }

    /// Returns `true` if value changes are recorded.
    pub fn is_historizing(&self) -> bool {
        matches!(self.attributes.get(&Attribute::Historizing), Some(Variant::Boolean(true)))
    }

    /// Reads one attribute.
    pub fn read(&self, attribute: Attribute, index_range: Option<&str>) -> DataValue {
        let value = match attribute {
            Attribute::NodeId => Variant::NodeId(self.node_id.clone()),
            Attribute::NodeClass => Variant::Int32(self.node_class.value()),
            Attribute::BrowseName => Variant::QualifiedName(self.browse_name.clone()),
            Attribute::DisplayName => Variant::LocalizedText(self.display_name.clone()),
            Attribute::Description => Variant::LocalizedText(self.description.clone()),
            Attribute::WriteMask | Attribute::UserWriteMask => Variant::UInt32(0),
            Attribute::Value if self.node_class == NodeClass::Variable => {
                let mut value = self.value.clone();
                value.server_timestamp = Some(Utc::now());
                if let Some(range) = index_range {
                    match slice(&value.value, range) {
                        Ok(part) => value.value = part,
                        Err(status) => return DataValue::from_status(status),
                    }
                }
                return value;
            }
            _ => match self.attributes.get(&attribute) {
                Some(value) => value.clone(),
                None => return DataValue::from_status(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
            },
        };
        let value = match index_range {
            Some(range) => match slice(&value, range) {
                Ok(part) => part,
                Err(status) => return DataValue::from_status(status),
            },
            None => value,
        };
        DataValue {
            value,
            status: StatusCode::GOOD,
            source_timestamp: None,
            server_timestamp: Some(Utc::now()),
        }
    }

    fn record(&mut self, value: DataValue) {
        if self.is_historizing() {
            self.history.push(value.clone());
        }
        self.value = value;
    }
}

/// A forward reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Source node.
    pub source: NodeId,
    /// Reference type.
    pub reference_type: NodeId,
    /// Target node.
    pub target: NodeId,
}

/// Implementation of a callable method.
pub type MethodHandler = Arc<dyn Fn(&[Variant]) -> Result<Vec<Variant>, StatusCode> + Send + Sync>;

#[derive(Clone)]
struct MethodDefinition {
    input_types: Vec<VariantType>,
    handler: MethodHandler,
}

/// Result of calling a method.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    /// Call status.
    pub status: StatusCode,
    /// Output arguments.
    pub outputs: Vec<Variant>,
    /// Per-input-argument status.
    pub input_results: Vec<StatusCode>,
}

impl CallOutcome {
    fn failed(status: StatusCode) -> Self {
        Self {
            status,
            outputs: Vec::new(),
            input_results: Vec::new(),
        }
    }
}

// =============================================================================
// AddressSpace
// =============================================================================

/// Nodes, references, methods and history of the simulated server.
#[derive(Clone)]
pub struct AddressSpace {
    namespaces: Vec<String>,
    nodes: HashMap<NodeId, AddressNode>,
    references: Vec<Reference>,
    methods: HashMap<NodeId, MethodDefinition>,
    next_id: u32,
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSpace {
    /// The standard namespace-0 skeleton: root folders, server object,
    /// namespace array and the reference and object type hierarchies.
    pub fn new() -> Self {
        let mut space = Self {
            namespaces: vec![NamespaceArray::OPC_UA_NAMESPACE.to_string(), SIMULATION_NAMESPACE.to_string()],
            nodes: HashMap::new(),
            references: Vec::new(),
            methods: HashMap::new(),
            next_id: 1000,
        };
        space.build_standard_nodes();
        space
    }

    /// The standard skeleton plus the demo nodes in [`DEMO_NAMESPACE`].
    pub fn demo() -> Self {
        let mut space = Self::new();
        space.build_demo_nodes();
        space
    }

    fn put(&mut self, parent: Option<(&NodeId, NodeId)>, node: AddressNode) {
        if let Some((parent, reference_type)) = parent {
            self.references.push(Reference {
                source: parent.clone(),
                reference_type,
                target: node.node_id.clone(),
            });
        }
        self.nodes.insert(node.node_id.clone(), node);
    }

    fn build_standard_nodes(&mut self) {
        let ns0 = |id: u32| NodeId::numeric(0, id);

        // Reference type hierarchy.
        self.put(None, AddressNode::reference_type(NodeId::REFERENCES, "References", true, None));
        let hierarchy: [(NodeId, NodeId, &str, Option<&str>); 11] = [
            (NodeId::REFERENCES, NodeId::HIERARCHICAL_REFERENCES, "HierarchicalReferences", None),
            (NodeId::REFERENCES, NodeId::NON_HIERARCHICAL_REFERENCES, "NonHierarchicalReferences", None),
            (NodeId::HIERARCHICAL_REFERENCES, NodeId::HAS_CHILD, "HasChild", None),
            (NodeId::HIERARCHICAL_REFERENCES, NodeId::ORGANIZES, "Organizes", Some("OrganizedBy")),
            (NodeId::HIERARCHICAL_REFERENCES, NodeId::HAS_EVENT_SOURCE, "HasEventSource", Some("EventSourceOf")),
            (NodeId::HAS_EVENT_SOURCE, NodeId::HAS_NOTIFIER, "HasNotifier", Some("NotifierOf")),
            (NodeId::HAS_CHILD, NodeId::AGGREGATES, "Aggregates", Some("AggregatedBy")),
            (NodeId::HAS_CHILD, NodeId::HAS_SUBTYPE, "HasSubtype", Some("SubtypeOf")),
            (NodeId::AGGREGATES, NodeId::HAS_PROPERTY, "HasProperty", Some("PropertyOf")),
            (NodeId::AGGREGATES, NodeId::HAS_COMPONENT, "HasComponent", Some("ComponentOf")),
            (
                NodeId::NON_HIERARCHICAL_REFERENCES,
                NodeId::HAS_TYPE_DEFINITION,
                "HasTypeDefinition",
                Some("TypeDefinitionOf"),
            ),
        ];
        for (parent, id, name, inverse) in hierarchy {
            self.put(
                Some((&parent, NodeId::HAS_SUBTYPE)),
                AddressNode::reference_type(id, name, false, inverse),
            );
        }

        // Object, variable and data types.
        self.put(None, AddressNode::object_type(NodeId::BASE_OBJECT_TYPE, "BaseObjectType", false));
        self.put(
            Some((&NodeId::BASE_OBJECT_TYPE, NodeId::HAS_SUBTYPE)),
            AddressNode::object_type(NodeId::FOLDER_TYPE, "FolderType", false),
        );
        self.put(
            Some((&NodeId::BASE_OBJECT_TYPE, NodeId::HAS_SUBTYPE)),
            AddressNode::object_type(NodeId::BASE_EVENT_TYPE, "BaseEventType", true),
        );
        self.put(
            Some((&NodeId::BASE_EVENT_TYPE, NodeId::HAS_SUBTYPE)),
            AddressNode::object_type(ns0(SYSTEM_EVENT_TYPE), "SystemEventType", false),
        );
        let mut variable_type = AddressNode::object_type(NodeId::BASE_DATA_VARIABLE_TYPE, "BaseDataVariableType", false);
        variable_type.node_class = NodeClass::VariableType;
        self.put(None, variable_type);
        let mut data_type = AddressNode::object_type(NodeId::BASE_DATA_TYPE, "BaseDataType", true);
        data_type.node_class = NodeClass::DataType;
        self.put(None, data_type);

        // Folders.
        self.put(None, AddressNode::folder(NodeId::ROOT_FOLDER, QualifiedName::new(0, "Root")));
        self.put(
            Some((&NodeId::ROOT_FOLDER, NodeId::ORGANIZES)),
            AddressNode::folder(NodeId::OBJECTS_FOLDER, QualifiedName::new(0, "Objects")),
        );
        self.put(
            Some((&NodeId::ROOT_FOLDER, NodeId::ORGANIZES)),
            AddressNode::folder(NodeId::TYPES_FOLDER, QualifiedName::new(0, "Types")),
        );
        for type_root in [
            NodeId::REFERENCES,
            NodeId::BASE_OBJECT_TYPE,
            NodeId::BASE_DATA_VARIABLE_TYPE,
            NodeId::BASE_DATA_TYPE,
        ] {
            self.references.push(Reference {
                source: NodeId::TYPES_FOLDER,
                reference_type: NodeId::ORGANIZES,
                target: type_root,
            });
        }

        // Server object and namespace array.
        self.put(
            Some((&NodeId::OBJECTS_FOLDER, NodeId::ORGANIZES)),
            AddressNode::object(NodeId::SERVER, QualifiedName::new(0, "Server")).with_event_notifier(),
        );
        self.put(
            Some((&NodeId::SERVER, NodeId::HAS_PROPERTY)),
            AddressNode::variable(
                NodeId::NAMESPACE_ARRAY,
                QualifiedName::new(0, "NamespaceArray"),
                self.namespace_variant(),
            )
            .read_only(),
        );
    }

    fn build_demo_nodes(&mut self) {
        let ns = self.register_namespace(DEMO_NAMESPACE);
        let id = |name: &str| NodeId::string(ns, name);
        let name = |name: &str| QualifiedName::new(ns, name);
        let demo = id("Demo");

        self.put(
            Some((&NodeId::OBJECTS_FOLDER, NodeId::ORGANIZES)),
            AddressNode::folder(demo.clone(), name("Demo")).with_event_notifier(),
        );
        self.references.push(Reference {
            source: NodeId::SERVER,
            reference_type: NodeId::HAS_NOTIFIER,
            target: demo.clone(),
        });

        let now = Utc::now();
        let mut temperature = AddressNode::variable(id("Demo.Temperature"), name("Temperature"), 21.5)
            .historizing()
            .with_eu_range(-40.0, 120.0)
            .with_description("Simulated temperature in degrees Celsius");
        temperature.history = (0..20i64)
            .map(|i| {
                DataValue::new(20.0 + (i % 5) as f64 * 0.5).with_source_timestamp(now - Duration::minutes(20 - i))
            })
            .collect();

        let variables = [
            temperature,
            AddressNode::variable(id("Demo.Pressure"), name("Pressure"), 1.013).read_only(),
            AddressNode::variable(id("Demo.Counter"), name("Counter"), 0i32),
            AddressNode::variable(id("Demo.Switch"), name("Switch"), false),
            AddressNode::variable(id("Demo.Message"), name("Message"), "hello"),
            AddressNode::variable(
                id("Demo.Array"),
                name("Array"),
                Variant::Array((1..=5).map(Variant::Int32).collect()),
            ),
        ];
        for variable in variables {
            self.put(Some((&demo, NodeId::HAS_COMPONENT)), variable);
        }

        let machine = id("Demo.Machine");
        self.put(
            Some((&demo, NodeId::HAS_COMPONENT)),
            AddressNode::object(machine.clone(), name("Machine")),
        );
        self.put(
            Some((&machine, NodeId::HAS_COMPONENT)),
            AddressNode::variable(id("Demo.Machine.Speed"), name("Speed"), 0.0).with_eu_range(0.0, 3000.0),
        );
        self.put(
            Some((&machine, NodeId::HAS_PROPERTY)),
            AddressNode::variable(id("Demo.Machine.SerialNumber"), name("SerialNumber"), "SN-0001").read_only(),
        );

        self.insert_method(
            &demo,
            id("Demo.Add"),
            name("Add"),
            vec![VariantType::Double, VariantType::Double],
            |args| {
                let sum = args.iter().filter_map(Variant::as_f64).sum::<f64>();
                Ok(vec![Variant::Double(sum)])
            },
        );
        self.insert_method(
            &demo,
            id("Demo.Echo"),
            name("Echo"),
            vec![VariantType::String],
            |args| Ok(args.to_vec()),
        );
        self.insert_method(&demo, id("Demo.Fail"), name("Fail"), Vec::new(), |_| {
            Err(StatusCode::BAD_INTERNAL_ERROR)
        });
    }

    fn namespace_variant(&self) -> Variant {
        Variant::Array(self.namespaces.iter().cloned().map(Variant::String).collect())
    }

    // =========================================================================
    // Building
    // =========================================================================

    /// Adds a namespace URI and returns its index.
    pub fn register_namespace(&mut self, uri: &str) -> u16 {
        if let Some(index) = self.namespaces.iter().position(|existing| existing == uri) {
            return index as u16;
        }
        self.namespaces.push(uri.to_string());
        let array = self.namespace_variant();
        if let Some(node) = self.nodes.get_mut(&NodeId::NAMESPACE_ARRAY) {
            node.value = DataValue::new(array);
        }
        (self.namespaces.len() - 1) as u16
    }

    /// Returns the namespace URIs in index order.
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// Adds `node` below `parent`.
    pub fn insert(&mut self, parent: &NodeId, reference_type: NodeId, node: AddressNode) -> Result<(), StatusCode> {
        if !self.nodes.contains_key(parent) {
            return Err(StatusCode::BAD_PARENT_NODE_ID_INVALID);
        }
        if self.nodes.contains_key(&node.node_id) {
            return Err(StatusCode::BAD_NODE_ID_EXISTS);
        }
        self.put(Some((parent, reference_type)), node);
        Ok(())
    }

    /// Adds a method component to `parent`.
    pub fn insert_method<F>(
        &mut self,
        parent: &NodeId,
        node_id: NodeId,
        browse_name: QualifiedName,
        input_types: Vec<VariantType>,
        handler: F,
    ) where
        F: Fn(&[Variant]) -> Result<Vec<Variant>, StatusCode> + Send + Sync + 'static,
    {
        self.methods.insert(
            node_id.clone(),
            MethodDefinition {
                input_types,
                handler: Arc::new(handler),
            },
        );
        self.put(
            Some((parent, NodeId::HAS_COMPONENT)),
            AddressNode::method(node_id, browse_name),
        );
    }

    /// Returns a node.
    pub fn node(&self, node_id: &NodeId) -> Option<&AddressNode> {
        self.nodes.get(node_id)
    }

    /// Returns `true` if the node exists.
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Returns the number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the space has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the engineering unit range of a variable.
    pub fn eu_range(&self, node_id: &NodeId) -> Option<(f64, f64)> {
        self.nodes.get(node_id).and_then(|node| node.eu_range)
    }

    // =========================================================================
    // Type hierarchy
    // =========================================================================

    /// Returns `true` if `candidate` is `base` or one of its subtypes.
    pub fn is_subtype(&self, candidate: &NodeId, base: &NodeId) -> bool {
        let mut current = candidate.clone();
        for _ in 0..MAX_TYPE_DEPTH {
            if &current == base {
                return true;
            }
            match self.supertype(&current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    fn supertype(&self, type_id: &NodeId) -> Option<NodeId> {
        self.references
            .iter()
            .find(|r| r.reference_type == NodeId::HAS_SUBTYPE && &r.target == type_id)
            .map(|r| r.source.clone())
    }

    /// Returns `type_id` followed by its supertypes.
    pub fn type_chain(&self, type_id: &NodeId) -> Vec<NodeId> {
        let mut chain = vec![type_id.clone()];
        while chain.len() < MAX_TYPE_DEPTH {
            match chain.last().and_then(|last| self.supertype(last)) {
                Some(parent) => chain.push(parent),
                None => break,
            }
        }
        chain
    }

    fn is_reference_type(&self, node_id: &NodeId) -> bool {
        self.nodes
            .get(node_id)
            .is_some_and(|node| node.node_class == NodeClass::ReferenceType)
    }

    fn reference_matches(&self, actual: &NodeId, requested: &NodeId, include_subtypes: bool) -> bool {
        requested.is_null() || actual == requested || (include_subtypes && self.is_subtype(actual, requested))
    }

    // =========================================================================
    // Attribute services
    // =========================================================================

    /// Reads one attribute of a node.
    pub fn read(&self, node_id: &NodeId, attribute: Attribute, index_range: Option<&str>) -> DataValue {
        match self.nodes.get(node_id) {
            Some(node) => node.read(attribute, index_range),
            None => DataValue::from_status(StatusCode::BAD_NODE_ID_UNKNOWN),
        }
    }

    /// Writes one attribute as a client would.
    pub fn write(&mut self, item: &WriteItem) -> StatusCode {
        let Some(node) = self.nodes.get_mut(&item.node_id) else {
            return StatusCode::BAD_NODE_ID_UNKNOWN;
        };
        let value = match item.typed_value() {
            Ok(value) => value,
            Err(_) => return StatusCode::BAD_TYPE_MISMATCH,
        };

        match item.attribute {
            Attribute::Value if node.node_class == NodeClass::Variable => {
                if !node.is_writable() {
                    return StatusCode::BAD_NOT_WRITABLE;
                }
                let value = match &item.index_range {
                    Some(range) => match splice(&node.value.value, range, &value) {
                        Ok(spliced) => spliced,
                        Err(status) => return status,
                    },
                    None => value,
                };
                let value = match coerce(&node.value.value, value) {
                    Some(value) => value,
                    None => return StatusCode::BAD_TYPE_MISMATCH,
                };
                let now = Utc::now();
                node.record(DataValue {
                    value,
                    status: item.status.unwrap_or(StatusCode::GOOD),
                    source_timestamp: Some(item.source_timestamp.unwrap_or(now)),
                    server_timestamp: Some(item.server_timestamp.unwrap_or(now)),
                });
                StatusCode::GOOD
            }
            Attribute::Value => StatusCode::BAD_ATTRIBUTE_ID_INVALID,
            Attribute::DisplayName | Attribute::Description => match value {
                Variant::LocalizedText(text) => {
                    if item.attribute == Attribute::DisplayName {
                        node.display_name = text;
                    } else {
                        node.description = text;
                    }
                    StatusCode::GOOD
                }
                _ => StatusCode::BAD_TYPE_MISMATCH,
            },
            attribute if node.read(attribute, None).is_good() => StatusCode::BAD_NOT_WRITABLE,
            _ => StatusCode::BAD_ATTRIBUTE_ID_INVALID,
        }
    }

    /// Replaces a variable's value regardless of access level.
    pub fn set_value(&mut self, node_id: &NodeId, value: DataValue) -> Result<(), StatusCode> {
        let node = self.nodes.get_mut(node_id).ok_or(StatusCode::BAD_NODE_ID_UNKNOWN)?;
        if node.node_class != NodeClass::Variable {
            return Err(StatusCode::BAD_ATTRIBUTE_ID_INVALID);
        }
        node.record(value);
        Ok(())
    }

    // =========================================================================
    // View services
    // =========================================================================

    /// Lists references of a node.
    pub fn browse(&self, node_id: &NodeId, request: &BrowseRequest) -> Result<Vec<ReferenceDescription>, StatusCode> {
        if !self.nodes.contains_key(node_id) {
            return Err(StatusCode::BAD_NODE_ID_UNKNOWN);
        }
        if !request.reference_type.is_null() && !self.is_reference_type(&request.reference_type) {
            return Err(StatusCode::BAD_REFERENCE_TYPE_ID_INVALID);
        }

        let mut found = Vec::new();
        for reference in &self.references {
            let (is_forward, other) = if &reference.source == node_id {
                (true, &reference.target)
            } else if &reference.target == node_id {
                (false, &reference.source)
            } else {
                continue;
            };
            if !request.direction.includes(is_forward)
                || !self.reference_matches(&reference.reference_type, &request.reference_type, request.include_subtypes)
            {
                continue;
            }
            let Some(target) = self.nodes.get(other) else {
                continue;
            };
            if !target.node_class.matches_mask(request.node_class_mask) {
                continue;
            }
            found.push(ReferenceDescription {
                reference_type: reference.reference_type.clone(),
                is_forward,
                target_node_id: other.clone(),
                browse_name: target.browse_name.clone(),
                display_name: target.display_name.clone(),
                node_class: target.node_class,
                type_definition: target.type_definition.clone(),
            });
        }
        Ok(found)
    }

    /// Follows a relative path from `start`.
    ///
    /// Returns full matches, or the nodes reached before the first hop
    /// that matched nothing with `remaining_path_index` set to that hop.
    pub fn translate(&self, start: &NodeId, path: &[RelativePathElement]) -> Result<Vec<BrowsePathTarget>, StatusCode> {
        if !self.nodes.contains_key(start) {
            return Err(StatusCode::BAD_NODE_ID_UNKNOWN);
        }
        if path.is_empty() {
            return Err(StatusCode::BAD_NOTHING_TO_DO);
        }

        let mut current = vec![start.clone()];
        for (index, element) in path.iter().enumerate() {
            if element.target_name.name.is_empty() {
                return Err(StatusCode::BAD_BROWSE_NAME_INVALID);
            }
            let mut next: Vec<NodeId> = Vec::new();
            for node_id in &current {
                for reference in &self.references {
                    let other = if element.is_inverse {
                        (&reference.target == node_id).then_some(&reference.source)
                    } else {
                        (&reference.source == node_id).then_some(&reference.target)
                    };
                    let Some(other) = other else {
                        continue;
                    };
                    if !self.reference_matches(&reference.reference_type, &element.reference_type, element.include_subtypes) {
                        continue;
                    }
                    let name_matches = self
                        .nodes
                        .get(other)
                        .is_some_and(|node| node.browse_name == element.target_name);
                    if name_matches && !next.contains(other) {
                        next.push(other.clone());
                    }
                }
            }
            if next.is_empty() {
                if index == 0 {
                    return Ok(Vec::new());
                }
                return Ok(current
                    .into_iter()
                    .map(|target_id| BrowsePathTarget {
                        target_id,
                        remaining_path_index: index as u32,
                    })
                    .collect());
            }
            current = next;
        }
        Ok(current.into_iter().map(BrowsePathTarget::full_match).collect())
    }

    // =========================================================================
    // Method service
    // =========================================================================

    /// Calls a method component of `object_id`.
    pub fn call(&self, object_id: &NodeId, method_id: &NodeId, arguments: &[Variant]) -> CallOutcome {
        if !self.nodes.contains_key(object_id) {
            return CallOutcome::failed(StatusCode::BAD_NODE_ID_UNKNOWN);
        }
        let Some(method) = self.methods.get(method_id) else {
            return CallOutcome::failed(StatusCode::BAD_METHOD_INVALID);
        };
        let is_component = self.references.iter().any(|r| {
            &r.source == object_id
                && &r.target == method_id
                && self.reference_matches(&r.reference_type, &NodeId::HAS_COMPONENT, true)
        });
        if !is_component {
            return CallOutcome::failed(StatusCode::BAD_METHOD_INVALID);
        }
        if arguments.len() < method.input_types.len() {
            return CallOutcome::failed(StatusCode::BAD_ARGUMENTS_MISSING);
        }
        if arguments.len() > method.input_types.len() {
            return CallOutcome::failed(StatusCode::BAD_TOO_MANY_ARGUMENTS);
        }

        let input_results: Vec<StatusCode> = arguments
            .iter()
            .zip(&method.input_types)
            .map(|(argument, expected)| {
                if argument.variant_type() == Some(*expected) {
                    StatusCode::GOOD
                } else {
                    StatusCode::BAD_TYPE_MISMATCH
                }
            })
            .collect();
        if input_results.iter().any(|status| !status.is_good()) {
            return CallOutcome {
                status: StatusCode::BAD_INVALID_ARGUMENT,
                outputs: Vec::new(),
                input_results,
            };
        }

        match (method.handler)(arguments) {
            Ok(outputs) => CallOutcome {
                status: StatusCode::GOOD,
                outputs,
                input_results,
            },
            Err(status) => CallOutcome {
                status,
                outputs: Vec::new(),
                input_results,
            },
        }
    }

    // =========================================================================
    // History service
    // =========================================================================

    /// Reads one page of raw history.
    pub fn history_read(&self, node_id: &NodeId, request: &HistoryReadRawRequest) -> HistoryReadResponse {
        let respond = |data, status, continuation_point| HistoryReadResponse {
            data,
            status,
            continuation_point,
            request: request.clone(),
        };
        let Some(node) = self.nodes.get(node_id) else {
            return respond(Vec::new(), StatusCode::BAD_NODE_ID_UNKNOWN, None);
        };
        if !node.is_historizing() {
            return respond(Vec::new(), StatusCode::BAD_HISTORY_OPERATION_UNSUPPORTED, None);
        }
        let offset = match &request.continuation_point {
            None => 0,
            Some(point) => match decode_continuation(point) {
                Some(offset) => offset,
                None => return respond(Vec::new(), StatusCode::BAD_CONTINUATION_POINT_INVALID, None),
            },
        };

        let timestamp = |value: &DataValue| value.source_timestamp.or(value.server_timestamp);
        let mut values: Vec<DataValue> = Vec::new();
        if request.return_bounds {
            if let Some(before) = node
                .history
                .iter()
                .rev()
                .find(|value| timestamp(value).is_some_and(|t| t < request.start))
            {
                values.push(before.clone());
            }
        }
        values.extend(
            node.history
                .iter()
                .filter(|value| timestamp(value).is_some_and(|t| t >= request.start && t <= request.end))
                .cloned(),
        );
        if request.return_bounds {
            if let Some(after) = node
                .history
                .iter()
                .find(|value| timestamp(value).is_some_and(|t| t > request.end))
            {
                values.push(after.clone());
            }
        }

        if offset > values.len() {
            return respond(Vec::new(), StatusCode::BAD_CONTINUATION_POINT_INVALID, None);
        }
        let limit = match request.num_values_per_node {
            0 => usize::MAX,
            n => n as usize,
        };
        let page: Vec<DataValue> = values[offset..].iter().take(limit).cloned().collect();
        let next = offset + page.len();
        let continuation = (next < values.len()).then(|| encode_continuation(next));
        respond(page, StatusCode::GOOD, continuation)
    }

    // =========================================================================
    // Node management
    // =========================================================================

    fn allocate_id(&mut self) -> NodeId {
        loop {
            let candidate = NodeId::numeric(1, self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if !self.nodes.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Creates a variable or object.
    pub fn add_node(&mut self, item: &AddNodeItem) -> Result<NodeId, StatusCode> {
        if !self.nodes.contains_key(&item.parent_node_id) {
            return Err(StatusCode::BAD_PARENT_NODE_ID_INVALID);
        }
        if !self.is_reference_type(&item.reference_type) {
            return Err(StatusCode::BAD_REFERENCE_TYPE_ID_INVALID);
        }
        if item.browse_name.name.is_empty() {
            return Err(StatusCode::BAD_BROWSE_NAME_INVALID);
        }
        let node_id = if item.requested_new_node_id.is_null() {
            self.allocate_id()
        } else {
            item.requested_new_node_id.clone()
        };
        if self.nodes.contains_key(&node_id) {
            return Err(StatusCode::BAD_NODE_ID_EXISTS);
        }

        let mut node = match item.node_class {
            NodeClass::Variable => AddressNode::variable(
                node_id.clone(),
                item.browse_name.clone(),
                item.value.clone().unwrap_or_default(),
            ),
            NodeClass::Object => AddressNode::object(node_id.clone(), item.browse_name.clone()),
            _ => return Err(StatusCode::BAD_NODE_CLASS_INVALID),
        };
        if let Some(display_name) = &item.display_name {
            node.display_name = display_name.clone();
        }
        if !item.type_definition.is_null() {
            node.type_definition = item.type_definition.clone();
        }
        self.insert(&item.parent_node_id, item.reference_type.clone(), node)?;
        Ok(node_id)
    }

    /// Deletes a node and the references it is the source of.
    pub fn delete_node(&mut self, node_id: &NodeId, delete_target_references: bool) -> StatusCode {
        if self.nodes.remove(node_id).is_none() {
            return StatusCode::BAD_NODE_ID_UNKNOWN;
        }
        self.methods.remove(node_id);
        self.references
            .retain(|r| &r.source != node_id && (!delete_target_references || &r.target != node_id));
        StatusCode::GOOD
    }

    /// Adds a reference.
    pub fn add_reference(&mut self, item: &AddReferenceItem) -> StatusCode {
        if !self.nodes.contains_key(&item.source_node_id) {
            return StatusCode::BAD_SOURCE_NODE_ID_INVALID;
        }
        if !self.nodes.contains_key(&item.target_node_id) {
            return StatusCode::BAD_TARGET_NODE_ID_INVALID;
        }
        if !self.is_reference_type(&item.reference_type) {
            return StatusCode::BAD_REFERENCE_TYPE_ID_INVALID;
        }
        let reference = oriented(
            &item.source_node_id,
            &item.reference_type,
            &item.target_node_id,
            item.is_forward,
        );
        if self.references.contains(&reference) {
            return StatusCode::BAD_DUPLICATE_REFERENCE_NOT_ALLOWED;
        }
        self.references.push(reference);
        StatusCode::GOOD
    }

    /// Deletes a reference.
    pub fn delete_reference(&mut self, item: &DeleteReferenceItem) -> StatusCode {
        let reference = oriented(
            &item.source_node_id,
            &item.reference_type,
            &item.target_node_id,
            item.is_forward,
        );
        let reverse = oriented(
            &item.source_node_id,
            &item.reference_type,
            &item.target_node_id,
            !item.is_forward,
        );
        let before = self.references.len();
        self.references
            .retain(|r| r != &reference && !(item.delete_bidirectional && r == &reverse));
        if self.references.len() == before {
            StatusCode::BAD_NOT_FOUND
        } else {
            StatusCode::GOOD
        }
    }
}

fn oriented(source: &NodeId, reference_type: &NodeId, target: &NodeId, is_forward: bool) -> Reference {
    let (source, target) = if is_forward { (source, target) } else { (target, source) };
    Reference {
        source: source.clone(),
        reference_type: reference_type.clone(),
        target: target.clone(),
    }
}

/// Converts a written value to the type of the stored one.
fn coerce(current: &Variant, value: Variant) -> Option<Variant> {
    match current.variant_type() {
        None => Some(value),
        Some(expected) if value.variant_type() == Some(expected) => Some(value),
        Some(expected) => value.cast(expected),
    }
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("namespaces", &self.namespaces)
            .field("nodes", &self.nodes.len())
            .field("references", &self.references.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BrowseDirection;

    fn demo(name: &str) -> NodeId {
        NodeId::string(2, name)
    }

    #[test]
    fn test_index_range_parsing() {
        assert_eq!(parse_index_range("3"), Some((3, 3)));
        assert_eq!(parse_index_range("1:4"), Some((1, 4)));
        assert_eq!(parse_index_range("4:1"), None);
        assert_eq!(parse_index_range("x"), None);
    }

    #[test]
    fn test_read_attributes() {
        let space = AddressSpace::demo();
        let value = space.read(&demo("Demo.Temperature"), Attribute::Value, None);
        assert_eq!(value.value, Variant::Double(21.5));

        let class = space.read(&demo("Demo.Temperature"), Attribute::NodeClass, None);
        assert_eq!(class.value, Variant::Int32(NodeClass::Variable.value()));

        let missing = space.read(&demo("Demo"), Attribute::Value, None);
        assert_eq!(missing.status, StatusCode::BAD_ATTRIBUTE_ID_INVALID);

        let unknown = space.read(&demo("Nope"), Attribute::Value, None);
        assert_eq!(unknown.status, StatusCode::BAD_NODE_ID_UNKNOWN);

        let part = space.read(&demo("Demo.Array"), Attribute::Value, Some("1:2"));
        assert_eq!(part.value, Variant::Array(vec![Variant::Int32(2), Variant::Int32(3)]));
        let out = space.read(&demo("Demo.Array"), Attribute::Value, Some("9"));
        assert_eq!(out.status, StatusCode::BAD_INDEX_RANGE_NO_DATA);
    }

    #[test]
    fn test_write_rules() {
        let mut space = AddressSpace::demo();
        let write = |node: &str, value: Variant| WriteItem::new(demo(node), Attribute::Value, value);

        assert_eq!(space.write(&write("Demo.Counter", Variant::Int32(5))), StatusCode::GOOD);
        assert_eq!(space.read(&demo("Demo.Counter"), Attribute::Value, None).value, Variant::Int32(5));

        // Integer literal widened to the stored type.
        assert_eq!(space.write(&write("Demo.Counter", Variant::Int64(6))), StatusCode::GOOD);
        assert_eq!(space.write(&write("Demo.Pressure", Variant::Double(2.0))), StatusCode::BAD_NOT_WRITABLE);
        assert_eq!(space.write(&write("Demo.Switch", Variant::from("maybe"))), StatusCode::BAD_TYPE_MISMATCH);

        let node_class = WriteItem::new(demo("Demo.Counter"), Attribute::NodeClass, Variant::Int32(1));
        assert_eq!(space.write(&node_class), StatusCode::BAD_NOT_WRITABLE);

        let range = WriteItem::new(
            demo("Demo.Array"),
            Attribute::Value,
            Variant::Array(vec![Variant::Int32(9), Variant::Int32(9)]),
        )
        .with_index_range("0:1");
        assert_eq!(space.write(&range), StatusCode::GOOD);
        let array = space.read(&demo("Demo.Array"), Attribute::Value, Some("0:2")).value;
        assert_eq!(
            array,
            Variant::Array(vec![Variant::Int32(9), Variant::Int32(9), Variant::Int32(3)])
        );
    }

    #[test]
    fn test_browse_with_subtypes() {
        let space = AddressSpace::demo();
        let children = space
            .browse(&demo("Demo"), &BrowseRequest::children(NodeId::HIERARCHICAL_REFERENCES, 0))
            .unwrap();
        assert!(children
            .iter()
            .any(|r| r.browse_name == QualifiedName::new(2, "Temperature")));

        let variables_only = space
            .browse(
                &demo("Demo"),
                &BrowseRequest::children(NodeId::HAS_COMPONENT, NodeClass::Variable.value() as u32),
            )
            .unwrap();
        assert!(variables_only.iter().all(|r| r.node_class == NodeClass::Variable));

        let parents = space
            .browse(
                &demo("Demo"),
                &BrowseRequest::children(NodeId::ORGANIZES, 0).with_direction(BrowseDirection::Inverse),
            )
            .unwrap();
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].target_node_id, NodeId::OBJECTS_FOLDER);

        let bad = space.browse(&demo("Demo"), &BrowseRequest::children(demo("Demo.Counter"), 0));
        assert_eq!(bad.unwrap_err(), StatusCode::BAD_REFERENCE_TYPE_ID_INVALID);
    }

    #[test]
    fn test_translate_paths() {
        let space = AddressSpace::demo();
        let path = [
            RelativePathElement::new(QualifiedName::new(2, "Demo")),
            RelativePathElement::new(QualifiedName::new(2, "Machine")),
            RelativePathElement::new(QualifiedName::new(2, "Speed")),
        ];
        let targets = space.translate(&NodeId::OBJECTS_FOLDER, &path).unwrap();
        assert_eq!(targets, vec![BrowsePathTarget::full_match(demo("Demo.Machine.Speed"))]);

        let partial = [
            RelativePathElement::new(QualifiedName::new(2, "Demo")),
            RelativePathElement::new(QualifiedName::new(2, "Missing")),
        ];
        let targets = space.translate(&NodeId::OBJECTS_FOLDER, &partial).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].remaining_path_index, 1);
        assert!(!targets[0].is_fully_resolved());
    }

    #[test]
    fn test_method_calls() {
        let space = AddressSpace::demo();
        let add = space.call(
            &demo("Demo"),
            &demo("Demo.Add"),
            &[Variant::Double(1.5), Variant::Double(2.0)],
        );
        assert_eq!(add.status, StatusCode::GOOD);
        assert_eq!(add.outputs, vec![Variant::Double(3.5)]);

        let missing = space.call(&demo("Demo"), &demo("Demo.Add"), &[Variant::Double(1.0)]);
        assert_eq!(missing.status, StatusCode::BAD_ARGUMENTS_MISSING);

        let mismatch = space.call(&demo("Demo"), &demo("Demo.Add"), &[Variant::Double(1.0), Variant::from("x")]);
        assert_eq!(mismatch.status, StatusCode::BAD_INVALID_ARGUMENT);
        assert_eq!(mismatch.input_results[1], StatusCode::BAD_TYPE_MISMATCH);

        let wrong_object = space.call(&demo("Demo.Machine"), &demo("Demo.Add"), &[]);
        assert_eq!(wrong_object.status, StatusCode::BAD_METHOD_INVALID);
    }

    #[test]
    fn test_history_paging() {
        let space = AddressSpace::demo();
        let now = Utc::now();
        let request = HistoryReadRawRequest {
            start: now - Duration::hours(1),
            end: now,
            num_values_per_node: 8,
            return_bounds: false,
            continuation_point: None,
        };
        let first = space.history_read(&demo("Demo.Temperature"), &request);
        assert_eq!(first.data.len(), 8);
        assert!(first.has_more_data());

        let mut total = first.data.len();
        let mut page = first;
        while let Some(next) = page.next_request() {
            page = space.history_read(&demo("Demo.Temperature"), &next);
            total += page.data.len();
        }
        assert_eq!(total, 20);

        let unsupported = space.history_read(&demo("Demo.Counter"), &request);
        assert_eq!(unsupported.status, StatusCode::BAD_HISTORY_OPERATION_UNSUPPORTED);
    }

    #[test]
    fn test_node_management() {
        let mut space = AddressSpace::demo();
        let item = AddNodeItem::variable(demo("Demo"), NodeId::NULL, QualifiedName::new(1, "Added"), 1.0);
        let id = space.add_node(&item).unwrap();
        assert_eq!(id.namespace_index, 1);
        assert!(space.contains(&id));

        let duplicate = AddNodeItem::variable(demo("Demo"), id.clone(), QualifiedName::new(1, "Again"), 1.0);
        assert_eq!(space.add_node(&duplicate).unwrap_err(), StatusCode::BAD_NODE_ID_EXISTS);

        let reference = AddReferenceItem {
            source_node_id: demo("Demo.Machine"),
            reference_type: NodeId::ORGANIZES,
            target_node_id: id.clone(),
            target_node_class: NodeClass::Variable,
            is_forward: true,
        };
        assert_eq!(space.add_reference(&reference), StatusCode::GOOD);
        assert_eq!(space.add_reference(&reference), StatusCode::BAD_DUPLICATE_REFERENCE_NOT_ALLOWED);

        let delete = DeleteReferenceItem {
            source_node_id: demo("Demo.Machine"),
            reference_type: NodeId::ORGANIZES,
            target_node_id: id.clone(),
            is_forward: true,
            delete_bidirectional: false,
        };
        assert_eq!(space.delete_reference(&delete), StatusCode::GOOD);
        assert_eq!(space.delete_reference(&delete), StatusCode::BAD_NOT_FOUND);

        assert_eq!(space.delete_node(&id, true), StatusCode::GOOD);
        assert_eq!(space.delete_node(&id, true), StatusCode::BAD_NODE_ID_UNKNOWN);
    }

    #[test]
    fn test_namespace_array_node() {
        let space = AddressSpace::demo();
        let value = space.read(&NodeId::NAMESPACE_ARRAY, Attribute::Value, None).value;
        let uris: Vec<_> = value.as_array().unwrap().iter().filter_map(Variant::as_str).collect();
        assert_eq!(uris, vec![NamespaceArray::OPC_UA_NAMESPACE, SIMULATION_NAMESPACE, DEMO_NAMESPACE]);
        assert!(space.is_subtype(&NodeId::HAS_COMPONENT, &NodeId::HIERARCHICAL_REFERENCES));
        assert!(!space.is_subtype(&NodeId::HAS_TYPE_DEFINITION, &NodeId::HIERARCHICAL_REFERENCES));
    }
}
