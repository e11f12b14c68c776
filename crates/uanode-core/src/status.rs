// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA status codes.
//!
//! Every completion carries a [`StatusCode`]. The top two bits give the
//! severity: `00` Good, `01` Uncertain, `10` Bad.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 32-bit OPC UA status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

macro_rules! status_codes {
    ($($(#[$doc:meta])* $name:ident = $value:literal, $text:literal;)*) => {
        impl StatusCode {
            $(
                $(#[$doc])*
                pub const $name: StatusCode = StatusCode($value);
            )*

            /// Returns the symbolic name of the code, ignoring info bits.
            pub fn name(&self) -> &'static str {
                match self.0 & 0xFFFF_0000 {
                    $($value => $text,)*
                    _ if self.is_good() => "Good",
                    _ if self.is_uncertain() => "Uncertain",
                    _ => "Bad",
                }
            }
        }
    };
}

status_codes! {
    /// Success.
    GOOD = 0x0000_0000, "Good";
    /// Generic uncertain result.
    UNCERTAIN = 0x4000_0000, "Uncertain";
    /// Unexpected error.
    BAD_UNEXPECTED_ERROR = 0x8001_0000, "BadUnexpectedError";
    /// Internal error.
    BAD_INTERNAL_ERROR = 0x8002_0000, "BadInternalError";
    /// Communication error.
    BAD_COMMUNICATION_ERROR = 0x8005_0000, "BadCommunicationError";
    /// Operation timed out.
    BAD_TIMEOUT = 0x800A_0000, "BadTimeout";
    /// Service not supported.
    BAD_SERVICE_UNSUPPORTED = 0x800B_0000, "BadServiceUnsupported";
    /// Server is not connected.
    BAD_SERVER_NOT_CONNECTED = 0x800D_0000, "BadServerNotConnected";
    /// Nothing to do.
    BAD_NOTHING_TO_DO = 0x800F_0000, "BadNothingToDo";
    /// Too many operations in one request.
    BAD_TOO_MANY_OPERATIONS = 0x8010_0000, "BadTooManyOperations";
    /// User access denied.
    BAD_USER_ACCESS_DENIED = 0x801F_0000, "BadUserAccessDenied";
    /// Subscription id not valid.
    BAD_SUBSCRIPTION_ID_INVALID = 0x8028_0000, "BadSubscriptionIdInvalid";
    /// Syntactically invalid node id.
    BAD_NODE_ID_INVALID = 0x8033_0000, "BadNodeIdInvalid";
    /// Node id does not exist.
    BAD_NODE_ID_UNKNOWN = 0x8034_0000, "BadNodeIdUnknown";
    /// Attribute not supported by the node.
    BAD_ATTRIBUTE_ID_INVALID = 0x8035_0000, "BadAttributeIdInvalid";
    /// Index range syntax invalid.
    BAD_INDEX_RANGE_INVALID = 0x8036_0000, "BadIndexRangeInvalid";
    /// Index range outside the value.
    BAD_INDEX_RANGE_NO_DATA = 0x8037_0000, "BadIndexRangeNoData";
    /// Attribute is not readable.
    BAD_NOT_READABLE = 0x803A_0000, "BadNotReadable";
    /// Attribute is not writable.
    BAD_NOT_WRITABLE = 0x803B_0000, "BadNotWritable";
    /// Value out of range.
    BAD_OUT_OF_RANGE = 0x803C_0000, "BadOutOfRange";
    /// Operation not supported.
    BAD_NOT_SUPPORTED = 0x803D_0000, "BadNotSupported";
    /// Requested item not found.
    BAD_NOT_FOUND = 0x803E_0000, "BadNotFound";
    /// Monitored item id not valid.
    BAD_MONITORED_ITEM_ID_INVALID = 0x8042_0000, "BadMonitoredItemIdInvalid";
    /// Monitoring filter invalid.
    BAD_MONITORED_ITEM_FILTER_INVALID = 0x8043_0000, "BadMonitoredItemFilterInvalid";
    /// Filter not allowed for this item.
    BAD_FILTER_NOT_ALLOWED = 0x8045_0000, "BadFilterNotAllowed";
    /// Filter operand invalid.
    BAD_FILTER_OPERAND_INVALID = 0x8049_0000, "BadFilterOperandInvalid";
    /// Continuation point invalid.
    BAD_CONTINUATION_POINT_INVALID = 0x804A_0000, "BadContinuationPointInvalid";
    /// Reference type id invalid.
    BAD_REFERENCE_TYPE_ID_INVALID = 0x804C_0000, "BadReferenceTypeIdInvalid";
    /// Browse direction invalid.
    BAD_BROWSE_DIRECTION_INVALID = 0x804D_0000, "BadBrowseDirectionInvalid";
    /// Security mode rejected.
    BAD_SECURITY_MODE_REJECTED = 0x8054_0000, "BadSecurityModeRejected";
    /// Security policy rejected.
    BAD_SECURITY_POLICY_REJECTED = 0x8055_0000, "BadSecurityPolicyRejected";
    /// Parent node id invalid.
    BAD_PARENT_NODE_ID_INVALID = 0x805B_0000, "BadParentNodeIdInvalid";
    /// Reference not allowed.
    BAD_REFERENCE_NOT_ALLOWED = 0x805C_0000, "BadReferenceNotAllowed";
    /// Requested node id already exists.
    BAD_NODE_ID_EXISTS = 0x805E_0000, "BadNodeIdExists";
    /// Node class invalid.
    BAD_NODE_CLASS_INVALID = 0x805F_0000, "BadNodeClassInvalid";
    /// Browse name invalid.
    BAD_BROWSE_NAME_INVALID = 0x8060_0000, "BadBrowseNameInvalid";
    /// Source node id invalid.
    BAD_SOURCE_NODE_ID_INVALID = 0x8064_0000, "BadSourceNodeIdInvalid";
    /// Target node id invalid.
    BAD_TARGET_NODE_ID_INVALID = 0x8065_0000, "BadTargetNodeIdInvalid";
    /// Duplicate reference not allowed.
    BAD_DUPLICATE_REFERENCE_NOT_ALLOWED = 0x8066_0000, "BadDuplicateReferenceNotAllowed";
    /// Browse path matched more than one target.
    BAD_TOO_MANY_MATCHES = 0x806D_0000, "BadTooManyMatches";
    /// Browse path matched nothing.
    BAD_NO_MATCH = 0x806F_0000, "BadNoMatch";
    /// History operation unsupported.
    BAD_HISTORY_OPERATION_UNSUPPORTED = 0x8072_0000, "BadHistoryOperationUnsupported";
    /// Write not supported.
    BAD_WRITE_NOT_SUPPORTED = 0x8073_0000, "BadWriteNotSupported";
    /// Value type mismatch.
    BAD_TYPE_MISMATCH = 0x8074_0000, "BadTypeMismatch";
    /// Method id invalid.
    BAD_METHOD_INVALID = 0x8075_0000, "BadMethodInvalid";
    /// Method arguments missing.
    BAD_ARGUMENTS_MISSING = 0x8076_0000, "BadArgumentsMissing";
    /// Too many method arguments.
    BAD_TOO_MANY_ARGUMENTS = 0x80E5_0000, "BadTooManyArguments";
    /// Not connected.
    BAD_NOT_CONNECTED = 0x808A_0000, "BadNotConnected";
    /// Deadband filter invalid.
    BAD_DEADBAND_FILTER_INVALID = 0x808E_0000, "BadDeadbandFilterInvalid";
    /// Invalid argument.
    BAD_INVALID_ARGUMENT = 0x80AB_0000, "BadInvalidArgument";
    /// Connection closed.
    BAD_CONNECTION_CLOSED = 0x80AE_0000, "BadConnectionClosed";
    /// Filter operator invalid.
    BAD_FILTER_OPERATOR_INVALID = 0x80C1_0000, "BadFilterOperatorInvalid";
    /// Filter element invalid.
    BAD_FILTER_ELEMENT_INVALID = 0x80C4_0000, "BadFilterElementInvalid";
    /// Too many monitored items.
    BAD_TOO_MANY_MONITORED_ITEMS = 0x80DB_0000, "BadTooManyMonitoredItems";
}

impl StatusCode {
    /// Creates a status code from its raw value.
    pub const fn new(code: u32) -> Self {
        Self(code)
    }

    /// Returns the raw value.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns `true` if the severity is Good.
    pub const fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Returns `true` if the severity is Uncertain.
    pub const fn is_uncertain(&self) -> bool {
        self.0 & 0xC000_0000 == 0x4000_0000
    }

    /// Returns `true` if the severity is Bad.
    pub const fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Returns `true` for transient failures worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            *self,
            Self::BAD_TIMEOUT
                | Self::BAD_COMMUNICATION_ERROR
                | Self::BAD_SERVER_NOT_CONNECTED
                | Self::BAD_NOT_CONNECTED
                | Self::BAD_CONNECTION_CLOSED
                | Self::BAD_TOO_MANY_OPERATIONS
        )
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.name(), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_bits() {
        assert!(StatusCode::GOOD.is_good());
        assert!(StatusCode::UNCERTAIN.is_uncertain());
        assert!(!StatusCode::UNCERTAIN.is_bad());
        assert!(StatusCode::BAD_NO_MATCH.is_bad());
        assert!(!StatusCode::BAD_NO_MATCH.is_good());
    }

    #[test]
    fn test_names() {
        assert_eq!(StatusCode::BAD_NOT_READABLE.name(), "BadNotReadable");
        assert_eq!(StatusCode::new(0x8034_0400).name(), "BadNodeIdUnknown");
        assert_eq!(StatusCode::new(0x8FFF_0000).name(), "Bad");
        assert_eq!(
            StatusCode::BAD_TOO_MANY_MATCHES.to_string(),
            "BadTooManyMatches (0x806D0000)"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(StatusCode::BAD_TIMEOUT.is_retryable());
        assert!(!StatusCode::BAD_TYPE_MISMATCH.is_retryable());
    }
}
