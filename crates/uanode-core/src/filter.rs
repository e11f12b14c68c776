// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Monitoring filters.
//!
//! A monitored item carries at most one filter: a [`DataChangeFilter`] for
//! value items or an [`EventFilter`] for event items. Event filters hold a
//! select clause (which event fields to report) and a where clause, a
//! [`ContentFilter`] whose elements form a boolean expression.
//!
//! # Element ordering
//!
//! Elements are evaluated in list order. An [`FilterOperand::Element`]
//! operand refers to the result of an *earlier* element, so the last element
//! is the root of the expression:
//!
//! ```
//! use uanode_core::filter::{ContentFilter, FilterElement, FilterOperand, FilterOperator};
//! use uanode_core::types::Variant;
//!
//! let mut filter = ContentFilter::new();
//! filter.push(FilterElement::new(FilterOperator::GreaterThan, FilterOperand::field("Severity"), FilterOperand::literal(500u16)).to_filter_element());
//! filter.push(FilterElement::new(FilterOperator::Equals, FilterOperand::field("SourceName"), FilterOperand::literal("Boiler")).to_filter_element());
//! filter.push(FilterElement::new(FilterOperator::And, FilterOperand::Element(0), FilterOperand::Element(1)).to_filter_element());
//! assert!(filter.validate().is_ok());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, UaError, UaResult};
use crate::services::RelativePathElement;
use crate::types::{Attribute, DataValue, NodeId, QualifiedName, Variant, VariantType};

// =============================================================================
// Data change filter
// =============================================================================

/// Which changes of a value trigger a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataChangeTrigger {
    /// Status changes only.
    Status,
    /// Status or value changes.
    #[default]
    StatusOrValue,
    /// Status, value or source timestamp changes.
    StatusOrValueOrTimestamp,
}

/// Deadband applied to numeric value changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadbandType {
    /// Every change counts.
    #[default]
    None,
    /// Change must exceed an absolute amount.
    Absolute,
    /// Change must exceed a percentage of the engineering range.
    Percent,
}

/// Filter for data change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DataChangeFilter {
    /// Trigger.
    pub trigger: DataChangeTrigger,
    /// Deadband type.
    pub deadband_type: DeadbandType,
    /// Deadband value; an amount for Absolute, 0..=100 for Percent.
    pub deadband_value: f64,
}

impl DataChangeFilter {
    /// Creates a filter.
    pub fn new(trigger: DataChangeTrigger, deadband_type: DeadbandType, deadband_value: f64) -> Self {
        Self {
            trigger,
            deadband_type,
            deadband_value,
        }
    }

    /// Absolute deadband on value changes.
    pub fn absolute(value: f64) -> Self {
        Self::new(DataChangeTrigger::StatusOrValue, DeadbandType::Absolute, value)
    }

    /// Percent deadband on value changes.
    pub fn percent(value: f64) -> Self {
        Self::new(DataChangeTrigger::StatusOrValue, DeadbandType::Percent, value)
    }

    /// Checks the deadband value against its type.
    pub fn validate(&self) -> UaResult<()> {
        let value = self.deadband_value;
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigurationError::invalid_filter("deadband value must be a non-negative number").into());
        }
        if self.deadband_type == DeadbandType::Percent && value > 100.0 {
            return Err(ConfigurationError::invalid_filter("percent deadband must be within 0..=100").into());
        }
        Ok(())
    }

    /// Returns `true` if `current` should be reported given the last
    /// reported value.
    ///
    /// `eu_range` is the `(low, high)` engineering range used by percent
    /// deadbands; without it a percent deadband does not suppress anything.
    pub fn passes(&self, previous: Option<&DataValue>, current: &DataValue, eu_range: Option<(f64, f64)>) -> bool {
        let Some(previous) = previous else {
            return true;
        };
        if previous.status != current.status {
            return true;
        }
        if self.trigger == DataChangeTrigger::Status {
            return false;
        }
        if self.trigger == DataChangeTrigger::StatusOrValueOrTimestamp
            && previous.source_timestamp != current.source_timestamp
        {
            return true;
        }

        match (self.deadband_type, previous.value.as_f64(), current.value.as_f64()) {
            (DeadbandType::Absolute, Some(old), Some(new)) => (new - old).abs() > self.deadband_value,
            (DeadbandType::Percent, Some(old), Some(new)) => match eu_range {
                Some((low, high)) => (new - old).abs() > self.deadband_value / 100.0 * (high - low).abs(),
                None => previous.value != current.value,
            },
            _ => previous.value != current.value,
        }
    }
}

// =============================================================================
// Operators and operands
// =============================================================================

/// Content filter operators with their OPC UA wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// a == b
    Equals = 0,
    /// a is null
    IsNull = 1,
    /// a > b
    GreaterThan = 2,
    /// a < b
    LessThan = 3,
    /// a >= b
    GreaterThanOrEqual = 4,
    /// a <= b
    LessThanOrEqual = 5,
    /// a matches pattern b (`%` any run, `_` any char)
    Like = 6,
    /// !a
    Not = 7,
    /// b <= a <= c
    Between = 8,
    /// a equals one of b..
    InList = 9,
    /// a && b
    And = 10,
    /// a || b
    Or = 11,
    /// a converted to the data type b
    Cast = 12,
    /// event is in view a
    InView = 13,
    /// event type is a or a subtype
    OfType = 14,
    /// relation query
    RelatedTo = 15,
    /// a & b
    BitwiseAnd = 16,
    /// a | b
    BitwiseOr = 17,
}

impl FilterOperator {
    /// Returns the wire value.
    pub const fn value(self) -> u32 {
        self as u32
    }

    /// Creates from the wire value.
    pub fn from_value(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Equals,
            1 => Self::IsNull,
            2 => Self::GreaterThan,
            3 => Self::LessThan,
            4 => Self::GreaterThanOrEqual,
            5 => Self::LessThanOrEqual,
            6 => Self::Like,
            7 => Self::Not,
            8 => Self::Between,
            9 => Self::InList,
            10 => Self::And,
            11 => Self::Or,
            12 => Self::Cast,
            13 => Self::InView,
            14 => Self::OfType,
            15 => Self::RelatedTo,
            16 => Self::BitwiseAnd,
            17 => Self::BitwiseOr,
            _ => return None,
        })
    }

    /// Returns the accepted operand count as `(min, max)`.
    pub const fn operand_count(self) -> (usize, usize) {
        match self {
            Self::IsNull | Self::Not | Self::InView | Self::OfType => (1, 1),
            Self::Between => (3, 3),
            Self::InList => (2, usize::MAX),
            Self::RelatedTo => (6, 6),
            _ => (2, 2),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for FilterOperator {
    type Err = UaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        (0..=17)
            .filter_map(Self::from_value)
            .find(|op| op.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigurationError::invalid_value("filter operator", s).into())
    }
}

/// Selects an event field by type and browse path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimpleAttributeOperand {
    /// Event type the path starts at.
    pub type_definition_id: NodeId,
    /// Browse names from the type to the field.
    pub browse_path: Vec<QualifiedName>,
    /// Attribute of the field node.
    pub attribute: Attribute,
    /// Optional index range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_range: Option<String>,
}

impl SimpleAttributeOperand {
    /// Value of the BaseEventType field reached by `path`.
    pub fn new(path: impl IntoIterator<Item = QualifiedName>) -> Self {
        Self {
            type_definition_id: NodeId::BASE_EVENT_TYPE,
            browse_path: path.into_iter().collect(),
            attribute: Attribute::Value,
            index_range: None,
        }
    }

    /// Value of the top-level BaseEventType field `name`.
    pub fn field(name: &str) -> Self {
        Self::new([QualifiedName::new(0, name)])
    }

    /// Returns the browse path as `A/B/C`.
    pub fn path_string(&self) -> String {
        self.browse_path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Selects an attribute of a node reached by a relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeOperand {
    /// Starting node.
    pub node_id: NodeId,
    /// Alias usable in other operands.
    #[serde(default)]
    pub alias: String,
    /// Path from `node_id`.
    pub browse_path: Vec<RelativePathElement>,
    /// Attribute to read.
    pub attribute: Attribute,
    /// Optional index range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_range: Option<String>,
}

/// An operand of a content filter element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "operand", rename_all = "snake_case")]
pub enum FilterOperand {
    /// A constant.
    Literal(Variant),
    /// A field of the event.
    SimpleAttribute(SimpleAttributeOperand),
    /// An attribute of a node reached by a browse path.
    Attribute(AttributeOperand),
    /// The result of an earlier element of the same filter.
    Element(u32),
}

impl FilterOperand {
    /// Literal operand.
    pub fn literal(value: impl Into<Variant>) -> Self {
        Self::Literal(value.into())
    }

    /// Top-level event field operand.
    pub fn field(name: &str) -> Self {
        Self::SimpleAttribute(SimpleAttributeOperand::field(name))
    }
}

// =============================================================================
// Filter elements
// =============================================================================

/// One element of a content filter as sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentFilterElement {
    /// Operator.
    pub operator: FilterOperator,
    /// Operands in order.
    pub operands: Vec<FilterOperand>,
}

impl ContentFilterElement {
    /// Creates an element.
    pub fn new(operator: FilterOperator, operands: Vec<FilterOperand>) -> Self {
        Self { operator, operands }
    }

    /// Returns the indices of element operands.
    pub fn element_references(&self) -> impl Iterator<Item = u32> + '_ {
        self.operands.iter().filter_map(|operand| match operand {
            FilterOperand::Element(index) => Some(*index),
            _ => None,
        })
    }
}

/// A binary filter element in the declarative `(operator, first, second)`
/// form used by configuration files and the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterElement {
    /// Operator.
    pub operator: FilterOperator,
    /// First operand.
    pub first_operand: FilterOperand,
    /// Second operand, absent for unary operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_operand: Option<FilterOperand>,
}

impl FilterElement {
    /// Binary element.
    pub fn new(operator: FilterOperator, first: FilterOperand, second: FilterOperand) -> Self {
        Self {
            operator,
            first_operand: first,
            second_operand: Some(second),
        }
    }

    /// Unary element.
    pub fn unary(operator: FilterOperator, operand: FilterOperand) -> Self {
        Self {
            operator,
            first_operand: operand,
            second_operand: None,
        }
    }

    /// Converts to the wire element, keeping operator and operands
    /// (including element indices) unchanged.
    pub fn to_filter_element(&self) -> ContentFilterElement {
        let mut operands = vec![self.first_operand.clone()];
        operands.extend(self.second_operand.clone());
        ContentFilterElement::new(self.operator, operands)
    }
}

impl From<FilterElement> for ContentFilterElement {
    fn from(element: FilterElement) -> Self {
        element.to_filter_element()
    }
}

// =============================================================================
// ContentFilter
// =============================================================================

/// Access to the fields of one event, used when evaluating a filter.
pub trait EventFields {
    /// Returns the field selected by `operand`.
    fn field(&self, operand: &SimpleAttributeOperand) -> Option<Variant>;

    /// Returns `true` if the event's type is `type_id` or a subtype of it.
    fn is_of_type(&self, type_id: &NodeId) -> bool;

    /// Returns the attribute selected by `operand`.
    fn attribute(&self, _operand: &AttributeOperand) -> Option<Variant> {
        None
    }
}

/// An ordered list of filter elements.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentFilter {
    /// Elements in evaluation order.
    pub elements: Vec<ContentFilterElement>,
}

impl ContentFilter {
    /// Creates an empty filter, which matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an element and returns its index.
    pub fn push(&mut self, element: impl Into<ContentFilterElement>) -> u32 {
        self.elements.push(element.into());
        (self.elements.len() - 1) as u32
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Checks operand counts and that element operands refer backwards.
    pub fn validate(&self) -> UaResult<()> {
        for (position, element) in self.elements.iter().enumerate() {
            let (min, max) = element.operator.operand_count();
            let count = element.operands.len();
            if count < min || count > max {
                return Err(ConfigurationError::invalid_filter(format!(
                    "element {position}: {} takes {min} operand(s), got {count}",
                    element.operator
                ))
                .into());
            }
            if let Some(index) = element.element_references().find(|&i| i as usize >= position) {
                return Err(ConfigurationError::invalid_filter(format!(
                    "element {position} references element {index}, which is not an earlier element"
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Evaluates the filter against an event.
    ///
    /// The last element is the result. An empty filter matches. Operators
    /// that need server-side view or relation data evaluate to false.
    pub fn evaluate(&self, event: &dyn EventFields) -> bool {
        let mut results: Vec<Variant> = Vec::with_capacity(self.elements.len());
        for element in &self.elements {
            let value = evaluate_element(element, &results, event);
            results.push(value);
        }
        results.last().map_or(true, |v| v.as_bool() == Some(true))
    }
}

fn operand_value(operand: &FilterOperand, results: &[Variant], event: &dyn EventFields) -> Variant {
    match operand {
        FilterOperand::Literal(value) => value.clone(),
        FilterOperand::SimpleAttribute(select) => event.field(select).unwrap_or_default(),
        FilterOperand::Attribute(attribute) => event.attribute(attribute).unwrap_or_default(),
        FilterOperand::Element(index) => results.get(*index as usize).cloned().unwrap_or_default(),
    }
}

fn evaluate_element(element: &ContentFilterElement, results: &[Variant], event: &dyn EventFields) -> Variant {
    let values: Vec<Variant> = element
        .operands
        .iter()
        .map(|operand| operand_value(operand, results, event))
        .collect();
    let arg = |i: usize| values.get(i).cloned().unwrap_or_default();
    let truthy = |i: usize| values.get(i).and_then(Variant::as_bool).unwrap_or(false);

    let result = match element.operator {
        FilterOperator::Equals => compare(&arg(0), &arg(1)) == Some(std::cmp::Ordering::Equal),
        FilterOperator::IsNull => arg(0).is_empty(),
        FilterOperator::GreaterThan => compare(&arg(0), &arg(1)) == Some(std::cmp::Ordering::Greater),
        FilterOperator::LessThan => compare(&arg(0), &arg(1)) == Some(std::cmp::Ordering::Less),
        FilterOperator::GreaterThanOrEqual => {
            matches!(compare(&arg(0), &arg(1)), Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal))
        }
        FilterOperator::LessThanOrEqual => {
            matches!(compare(&arg(0), &arg(1)), Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal))
        }
        FilterOperator::Like => match (arg(0).as_str(), arg(1).as_str()) {
            (Some(text), Some(pattern)) => like(text, pattern),
            _ => false,
        },
        FilterOperator::Not => !truthy(0),
        FilterOperator::Between => {
            let value = arg(0);
            matches!(compare(&value, &arg(1)), Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal))
                && matches!(compare(&value, &arg(2)), Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal))
        }
        FilterOperator::InList => {
            let value = arg(0);
            values[1..]
                .iter()
                .any(|candidate| compare(&value, candidate) == Some(std::cmp::Ordering::Equal))
        }
        FilterOperator::And => truthy(0) && truthy(1),
        FilterOperator::Or => truthy(0) || truthy(1),
        FilterOperator::Cast => {
            let target = arg(1)
                .as_node_id()
                .and_then(|node| node.as_numeric())
                .and_then(VariantType::from_type_id);
            return target.and_then(|t| arg(0).cast(t)).unwrap_or_default();
        }
        FilterOperator::OfType => match arg(0).as_node_id() {
            Some(type_id) => event.is_of_type(type_id),
            None => false,
        },
        FilterOperator::InView | FilterOperator::RelatedTo => false,
        FilterOperator::BitwiseAnd | FilterOperator::BitwiseOr => {
            return match (arg(0).as_u64(), arg(1).as_u64()) {
                (Some(a), Some(b)) if element.operator == FilterOperator::BitwiseAnd => Variant::UInt64(a & b),
                (Some(a), Some(b)) => Variant::UInt64(a | b),
                _ => Variant::Empty,
            };
        }
    };
    Variant::Boolean(result)
}

fn compare(a: &Variant, b: &Variant) -> Option<std::cmp::Ordering> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Variant::String(x), Variant::String(y)) => Some(x.cmp(y)),
        (Variant::LocalizedText(x), Variant::String(y)) => Some(x.text.as_str().cmp(y)),
        (Variant::DateTime(x), Variant::DateTime(y)) => Some(x.cmp(y)),
        (Variant::Boolean(x), Variant::Boolean(y)) => Some(x.cmp(y)),
        _ if a == b => Some(std::cmp::Ordering::Equal),
        _ => None,
    }
}

fn like(text: &str, pattern: &str) -> bool {
    fn matches(text: &[char], pattern: &[char]) -> bool {
        match pattern.split_first() {
            None => text.is_empty(),
            Some(('%', rest)) => (0..=text.len()).any(|skip| matches(&text[skip..], rest)),
            Some(('_', rest)) => !text.is_empty() && matches(&text[1..], rest),
            Some((c, rest)) => text.first() == Some(c) && matches(&text[1..], rest),
        }
    }
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    matches(&text, &pattern)
}

// =============================================================================
// EventFilter
// =============================================================================

/// Filter for event notifications.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Fields reported for each event, in order.
    pub select_clauses: Vec<SimpleAttributeOperand>,
    /// Which events are reported.
    #[serde(default)]
    pub where_clause: ContentFilter,
}

impl EventFilter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a select clause.
    pub fn select(mut self, operand: SimpleAttributeOperand) -> Self {
        self.select_clauses.push(operand);
        self
    }

    /// Adds a where clause element.
    pub fn where_element(mut self, element: impl Into<ContentFilterElement>) -> Self {
        self.where_clause.push(element);
        self
    }

    /// Validates the where clause; at least one select clause is required.
    pub fn validate(&self) -> UaResult<()> {
        if self.select_clauses.is_empty() {
            return Err(ConfigurationError::invalid_filter("event filter has no select clauses").into());
        }
        self.where_clause.validate()
    }

    /// Returns the selected fields of `event` if it passes the where clause.
    pub fn apply(&self, event: &dyn EventFields) -> Option<Vec<Variant>> {
        if !self.where_clause.evaluate(event) {
            return None;
        }
        Some(
            self.select_clauses
                .iter()
                .map(|select| event.field(select).unwrap_or_default())
                .collect(),
        )
    }
}

// =============================================================================
// MonitoringFilter
// =============================================================================

/// The filter attached to a monitored item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitoringFilter {
    /// No filter.
    #[default]
    None,
    /// Data change filter for value items.
    DataChange(DataChangeFilter),
    /// Event filter for event items.
    Event(EventFilter),
}

impl MonitoringFilter {
    /// Returns the event filter, if any.
    pub fn as_event(&self) -> Option<&EventFilter> {
        match self {
            Self::Event(filter) => Some(filter),
            _ => None,
        }
    }

    /// Returns the data change filter, if any.
    pub fn as_data_change(&self) -> Option<&DataChangeFilter> {
        match self {
            Self::DataChange(filter) => Some(filter),
            _ => None,
        }
    }

    /// Validates the contained filter.
    pub fn validate(&self) -> UaResult<()> {
        match self {
            Self::None => Ok(()),
            Self::DataChange(filter) => filter.validate(),
            Self::Event(filter) => filter.validate(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct Event(HashMap<String, Variant>);

    impl EventFields for Event {
        fn field(&self, operand: &SimpleAttributeOperand) -> Option<Variant> {
            self.0.get(&operand.path_string()).cloned()
        }

        fn is_of_type(&self, type_id: &NodeId) -> bool {
            *type_id == NodeId::BASE_EVENT_TYPE
        }
    }

    fn event(severity: u16, source: &str) -> Event {
        let mut fields = HashMap::new();
        fields.insert("Severity".to_string(), Variant::UInt16(severity));
        fields.insert("SourceName".to_string(), Variant::from(source));
        fields.insert("Message".to_string(), Variant::from("Overpressure in boiler 3"));
        Event(fields)
    }

    fn severity_and_source() -> ContentFilter {
        let mut filter = ContentFilter::new();
        filter.push(FilterElement::new(
            FilterOperator::GreaterThanOrEqual,
            FilterOperand::field("Severity"),
            FilterOperand::literal(500u16),
        ));
        filter.push(FilterElement::new(
            FilterOperator::Equals,
            FilterOperand::field("SourceName"),
            FilterOperand::literal("Boiler"),
        ));
        filter.push(FilterElement::new(
            FilterOperator::And,
            FilterOperand::Element(0),
            FilterOperand::Element(1),
        ));
        filter
    }

    #[test]
    fn test_to_filter_element_keeps_element_indices() {
        let element = FilterElement::new(FilterOperator::And, FilterOperand::Element(0), FilterOperand::Element(1));
        let wire = element.to_filter_element();
        assert_eq!(wire.operator, FilterOperator::And);
        assert_eq!(wire.operator.value(), 10);
        assert_eq!(wire.element_references().collect::<Vec<_>>(), vec![0, 1]);

        let filter = severity_and_source();
        assert_eq!(filter.elements[2], wire);
        assert!(filter.validate().is_ok());
    }

    #[test]
    fn test_forward_reference_rejected() {
        let mut filter = ContentFilter::new();
        filter.push(FilterElement::new(FilterOperator::And, FilterOperand::Element(1), FilterOperand::Element(2)));
        assert!(filter.validate().is_err());

        let mut self_ref = ContentFilter::new();
        self_ref.push(FilterElement::unary(FilterOperator::Not, FilterOperand::Element(0)));
        assert!(self_ref.validate().is_err());
    }

    #[test]
    fn test_operand_count_checked() {
        let mut filter = ContentFilter::new();
        filter.push(ContentFilterElement::new(FilterOperator::Between, vec![FilterOperand::literal(1)]));
        assert!(filter.validate().is_err());
    }

    #[test]
    fn test_evaluate_and() {
        let filter = severity_and_source();
        assert!(filter.evaluate(&event(800, "Boiler")));
        assert!(!filter.evaluate(&event(100, "Boiler")));
        assert!(!filter.evaluate(&event(800, "Pump")));
        assert!(ContentFilter::new().evaluate(&event(1, "x")));
    }

    #[test]
    fn test_evaluate_like_between_inlist() {
        let mut like_filter = ContentFilter::new();
        like_filter.push(FilterElement::new(
            FilterOperator::Like,
            FilterOperand::field("Message"),
            FilterOperand::literal("%boiler _"),
        ));
        assert!(like_filter.evaluate(&event(1, "x")));

        let mut between = ContentFilter::new();
        between.push(ContentFilterElement::new(
            FilterOperator::Between,
            vec![FilterOperand::field("Severity"), FilterOperand::literal(100), FilterOperand::literal(600)],
        ));
        assert!(between.evaluate(&event(600, "x")));
        assert!(!between.evaluate(&event(601, "x")));

        let mut in_list = ContentFilter::new();
        in_list.push(ContentFilterElement::new(
            FilterOperator::InList,
            vec![FilterOperand::field("SourceName"), FilterOperand::literal("Pump"), FilterOperand::literal("Valve")],
        ));
        assert!(in_list.evaluate(&event(1, "Valve")));
        assert!(!in_list.evaluate(&event(1, "Boiler")));
    }

    #[test]
    fn test_evaluate_of_type_and_cast() {
        let mut filter = ContentFilter::new();
        filter.push(FilterElement::unary(FilterOperator::OfType, FilterOperand::literal(NodeId::BASE_EVENT_TYPE)));
        assert!(filter.evaluate(&event(1, "x")));

        let mut cast = ContentFilter::new();
        cast.push(FilterElement::new(
            FilterOperator::Cast,
            FilterOperand::literal("700"),
            FilterOperand::literal(VariantType::UInt16.data_type_node()),
        ));
        cast.push(FilterElement::new(
            FilterOperator::Equals,
            FilterOperand::field("Severity"),
            FilterOperand::Element(0),
        ));
        assert!(cast.evaluate(&event(700, "x")));
    }

    #[test]
    fn test_event_filter_apply() {
        let filter = EventFilter::new()
            .select(SimpleAttributeOperand::field("Severity"))
            .select(SimpleAttributeOperand::field("Missing"));
        let fields = filter.apply(&event(5, "x")).unwrap();
        assert_eq!(fields, vec![Variant::UInt16(5), Variant::Empty]);
        assert!(EventFilter::new().validate().is_err());
    }

    #[test]
    fn test_deadband() {
        let filter = DataChangeFilter::absolute(1.0);
        let old = DataValue::new(10.0);
        let mut small = old.clone();
        small.value = Variant::Double(10.5);
        let mut large = old.clone();
        large.value = Variant::Double(12.0);
        assert!(!filter.passes(Some(&old), &small, None));
        assert!(filter.passes(Some(&old), &large, None));
        assert!(filter.passes(None, &small, None));

        let percent = DataChangeFilter::percent(10.0);
        assert!(!percent.passes(Some(&old), &large, Some((0.0, 100.0))));
        assert!(percent.validate().is_ok());
        assert!(DataChangeFilter::percent(150.0).validate().is_err());
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!("and".parse::<FilterOperator>().unwrap(), FilterOperator::And);
        assert_eq!(FilterOperator::from_value(17), Some(FilterOperator::BitwiseOr));
        assert!("nand".parse::<FilterOperator>().is_err());
    }
}
