// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Node attributes and attribute bitmasks.
//!
//! The ordinal of each [`Attribute`] is its bit position in an
//! [`AttributeMask`]. Callers outside the engine must use this exact
//! layout when requesting multi-attribute operations. The OPC UA wire
//! attribute id is the ordinal plus one.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, UaError};

// =============================================================================
// Attribute
// =============================================================================

/// One of the fixed attribute slots every node carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Attribute {
    /// NodeId (bit 0).
    NodeId = 0,
    /// NodeClass (bit 1).
    NodeClass = 1,
    /// BrowseName (bit 2).
    BrowseName = 2,
    /// DisplayName (bit 3).
    DisplayName = 3,
    /// Description (bit 4).
    Description = 4,
    /// WriteMask (bit 5).
    WriteMask = 5,
    /// UserWriteMask (bit 6).
    UserWriteMask = 6,
    /// IsAbstract (bit 7).
    IsAbstract = 7,
    /// Symmetric (bit 8).
    Symmetric = 8,
    /// InverseName (bit 9).
    InverseName = 9,
    /// ContainsNoLoops (bit 10).
    ContainsNoLoops = 10,
    /// EventNotifier (bit 11).
    EventNotifier = 11,
    /// Value (bit 12).
    Value = 12,
    /// DataType (bit 13).
    DataType = 13,
    /// ValueRank (bit 14).
    ValueRank = 14,
    /// ArrayDimensions (bit 15).
    ArrayDimensions = 15,
    /// AccessLevel (bit 16).
    AccessLevel = 16,
    /// UserAccessLevel (bit 17).
    UserAccessLevel = 17,
    /// MinimumSamplingInterval (bit 18).
    MinimumSamplingInterval = 18,
    /// Historizing (bit 19).
    Historizing = 19,
    /// Executable (bit 20).
    Executable = 20,
    /// UserExecutable (bit 21).
    UserExecutable = 21,
}

impl Attribute {
    /// All attributes in ordinal order.
    pub const ALL: [Attribute; 22] = [
        Self::NodeId,
        Self::NodeClass,
        Self::BrowseName,
        Self::DisplayName,
        Self::Description,
        Self::WriteMask,
        Self::UserWriteMask,
        Self::IsAbstract,
        Self::Symmetric,
        Self::InverseName,
        Self::ContainsNoLoops,
        Self::EventNotifier,
        Self::Value,
        Self::DataType,
        Self::ValueRank,
        Self::ArrayDimensions,
        Self::AccessLevel,
        Self::UserAccessLevel,
        Self::MinimumSamplingInterval,
        Self::Historizing,
        Self::Executable,
        Self::UserExecutable,
    ];

    /// Returns the ordinal, which is also the bit position in a mask.
    #[inline]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Returns the OPC UA wire attribute id (ordinal + 1).
    #[inline]
    pub const fn wire_id(self) -> u32 {
        self as u32 + 1
    }

    /// Returns the attribute for an ordinal.
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(ordinal as usize).copied()
    }

    /// Returns the attribute for an OPC UA wire attribute id.
    pub fn from_wire_id(id: u32) -> Option<Self> {
        id.checked_sub(1).and_then(|o| u8::try_from(o).ok()).and_then(Self::from_ordinal)
    }

    /// Returns the single-bit mask for this attribute.
    #[inline]
    pub const fn mask(self) -> AttributeMask {
        AttributeMask(1 << self as u32)
    }

    /// Returns the attribute name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::NodeId => "NodeId",
            Self::NodeClass => "NodeClass",
            Self::BrowseName => "BrowseName",
            Self::DisplayName => "DisplayName",
            Self::Description => "Description",
            Self::WriteMask => "WriteMask",
            Self::UserWriteMask => "UserWriteMask",
            Self::IsAbstract => "IsAbstract",
            Self::Symmetric => "Symmetric",
            Self::InverseName => "InverseName",
            Self::ContainsNoLoops => "ContainsNoLoops",
            Self::EventNotifier => "EventNotifier",
            Self::Value => "Value",
            Self::DataType => "DataType",
            Self::ValueRank => "ValueRank",
            Self::ArrayDimensions => "ArrayDimensions",
            Self::AccessLevel => "AccessLevel",
            Self::UserAccessLevel => "UserAccessLevel",
            Self::MinimumSamplingInterval => "MinimumSamplingInterval",
            Self::Historizing => "Historizing",
            Self::Executable => "Executable",
            Self::UserExecutable => "UserExecutable",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Attribute {
    type Err = UaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigurationError::invalid_value("attribute", s).into())
    }
}

// =============================================================================
// AttributeMask
// =============================================================================

/// A set of attributes as a bitmask (bit = [`Attribute::ordinal`]).
///
/// Iteration yields attributes in ordinal order, which is the order used
/// for positional results of multi-attribute reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeMask(pub u32);

impl AttributeMask {
    /// The empty mask.
    pub const NONE: AttributeMask = AttributeMask(0);

    /// Attributes every node has.
    pub const BASE: AttributeMask = AttributeMask(
        1 << Attribute::NodeId as u32
            | 1 << Attribute::NodeClass as u32
            | 1 << Attribute::BrowseName as u32
            | 1 << Attribute::DisplayName as u32
            | 1 << Attribute::Description as u32,
    );

    /// Returns the raw bits.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if no attribute is set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if `attribute` is in the mask.
    #[inline]
    pub const fn contains(self, attribute: Attribute) -> bool {
        self.0 & (1 << attribute as u32) != 0
    }

    /// Adds an attribute.
    #[inline]
    pub fn insert(&mut self, attribute: Attribute) {
        self.0 |= 1 << attribute as u32;
    }

    /// Removes an attribute.
    #[inline]
    pub fn remove(&mut self, attribute: Attribute) {
        self.0 &= !(1 << attribute as u32);
    }

    /// Returns the number of attributes in the mask.
    #[inline]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates the attributes in ordinal order.
    pub fn iter(self) -> impl Iterator<Item = Attribute> {
        Attribute::ALL.into_iter().filter(move |a| self.contains(*a))
    }
}

impl From<Attribute> for AttributeMask {
    fn from(attribute: Attribute) -> Self {
        attribute.mask()
    }
}

impl BitOr for AttributeMask {
    type Output = AttributeMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        AttributeMask(self.0 | rhs.0)
    }
}

impl BitOr<Attribute> for AttributeMask {
    type Output = AttributeMask;

    fn bitor(self, rhs: Attribute) -> Self::Output {
        AttributeMask(self.0 | rhs.mask().0)
    }
}

impl BitOr for Attribute {
    type Output = AttributeMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.mask() | rhs
    }
}

impl BitOrAssign<Attribute> for AttributeMask {
    fn bitor_assign(&mut self, rhs: Attribute) {
        self.insert(rhs);
    }
}

impl FromIterator<Attribute> for AttributeMask {
    fn from_iter<I: IntoIterator<Item = Attribute>>(iter: I) -> Self {
        let mut mask = AttributeMask::NONE;
        for attribute in iter {
            mask.insert(attribute);
        }
        mask
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_and_wire_ids() {
        assert_eq!(Attribute::NodeId.ordinal(), 0);
        assert_eq!(Attribute::NodeClass.ordinal(), 1);
        assert_eq!(Attribute::BrowseName.ordinal(), 2);
        assert_eq!(Attribute::Value.wire_id(), 13);
        assert_eq!(Attribute::from_wire_id(13), Some(Attribute::Value));
        assert_eq!(Attribute::from_wire_id(0), None);
        for (i, attribute) in Attribute::ALL.iter().enumerate() {
            assert_eq!(attribute.ordinal() as usize, i);
        }
    }

    #[test]
    fn test_mask_iteration_order() {
        let mask = Attribute::Value | Attribute::NodeId | Attribute::DisplayName;
        assert_eq!(mask.len(), 3);
        assert_eq!(
            mask.iter().collect::<Vec<_>>(),
            vec![Attribute::NodeId, Attribute::DisplayName, Attribute::Value]
        );
        assert_eq!(mask.bits(), 0b1_0000_0000_1001);
    }

    #[test]
    fn test_mask_insert_remove() {
        let mut mask = AttributeMask::NONE;
        assert!(mask.is_empty());
        mask |= Attribute::EventNotifier;
        assert!(mask.contains(Attribute::EventNotifier));
        mask.remove(Attribute::EventNotifier);
        assert!(mask.is_empty());
    }

    #[test]
    fn test_parse_attribute_name() {
        assert_eq!("value".parse::<Attribute>().unwrap(), Attribute::Value);
        assert_eq!("BrowseName".parse::<Attribute>().unwrap(), Attribute::BrowseName);
        assert!("Nope".parse::<Attribute>().is_err());
    }
}
