// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Endpoint and application descriptions returned by discovery.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::LocalizedText;
use crate::error::{ConfigurationError, UaError};

/// Security policy URI for unsecured connections.
pub const SECURITY_POLICY_NONE: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";

// =============================================================================
// MessageSecurityMode
// =============================================================================

/// OPC UA message security mode.
///
/// `Invalid` is the wire value 0 and is never accepted for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSecurityMode {
    /// Not a valid mode.
    Invalid,

    /// Messages are neither signed nor encrypted.
    #[default]
    None,

    /// Messages are signed.
    Sign,

    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl MessageSecurityMode {
    /// Returns the wire value.
    pub const fn value(self) -> u32 {
        match self {
            Self::Invalid => 0,
            Self::None => 1,
            Self::Sign => 2,
            Self::SignAndEncrypt => 3,
        }
    }

    /// Creates from the wire value. Unknown values map to `Invalid`.
    pub fn from_value(value: u32) -> Self {
        match value {
            1 => Self::None,
            2 => Self::Sign,
            3 => Self::SignAndEncrypt,
            _ => Self::Invalid,
        }
    }

    /// Returns `true` for None, Sign and SignAndEncrypt.
    #[inline]
    pub const fn is_valid(self) -> bool {
        !matches!(self, Self::Invalid)
    }

    /// Returns the display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::None => "None",
            Self::Sign => "Sign",
            Self::SignAndEncrypt => "SignAndEncrypt",
        }
    }
}

impl fmt::Display for MessageSecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MessageSecurityMode {
    type Err = UaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "none" | "nosecurity" => Ok(Self::None),
            "sign" | "signed" => Ok(Self::Sign),
            "signandencrypt" | "signencrypt" | "encrypted" => Ok(Self::SignAndEncrypt),
            _ => Err(ConfigurationError::invalid_value("security mode", s).into()),
        }
    }
}

// =============================================================================
// UserTokenType
// =============================================================================

/// User identity token kinds an endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserTokenType {
    /// Anonymous.
    #[default]
    Anonymous,
    /// User name and password.
    UserName,
    /// X.509 certificate.
    Certificate,
    /// Externally issued token.
    IssuedToken,
}

// =============================================================================
// EndpointDescription
// =============================================================================

/// A server endpoint the client can connect to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EndpointDescription {
    /// Endpoint URL, e.g. `opc.tcp://localhost:4840`.
    pub endpoint_url: String,

    /// Security policy URI.
    pub security_policy_uri: String,

    /// Security mode.
    pub security_mode: MessageSecurityMode,

    /// Relative security level advertised by the server.
    #[serde(default)]
    pub security_level: u8,

    /// Accepted user identity tokens.
    #[serde(default)]
    pub user_identity_tokens: Vec<UserTokenType>,

    /// Server certificate (DER).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub server_certificate: Vec<u8>,

    /// The server offering the endpoint.
    #[serde(default)]
    pub server: ApplicationDescription,
}

impl EndpointDescription {
    /// Creates an unsecured anonymous endpoint description for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            endpoint_url: url.into(),
            security_policy_uri: SECURITY_POLICY_NONE.to_string(),
            security_mode: MessageSecurityMode::None,
            security_level: 0,
            user_identity_tokens: vec![UserTokenType::Anonymous],
            server_certificate: Vec::new(),
            server: ApplicationDescription::default(),
        }
    }

    /// Sets the security policy URI.
    pub fn with_security_policy(mut self, uri: impl Into<String>) -> Self {
        self.security_policy_uri = uri.into();
        self
    }

    /// Sets the security mode.
    pub fn with_security_mode(mut self, mode: MessageSecurityMode) -> Self {
        self.security_mode = mode;
        self
    }

    /// Returns the short policy name, the part after `#`.
    pub fn security_policy_name(&self) -> &str {
        self.security_policy_uri
            .rsplit_once('#')
            .map_or(self.security_policy_uri.as_str(), |(_, name)| name)
    }
}

impl fmt::Display for EndpointDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}, {}]",
            self.endpoint_url,
            self.security_policy_name(),
            self.security_mode
        )
    }
}

// =============================================================================
// ApplicationDescription
// =============================================================================

/// Kind of OPC UA application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationType {
    /// Server.
    #[default]
    Server,
    /// Client.
    Client,
    /// Client and server.
    ClientAndServer,
    /// Discovery server.
    DiscoveryServer,
}

/// An application found by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApplicationDescription {
    /// Application URI.
    pub application_uri: String,
    /// Product URI.
    #[serde(default)]
    pub product_uri: String,
    /// Display name.
    #[serde(default)]
    pub application_name: LocalizedText,
    /// Application type.
    #[serde(default)]
    pub application_type: ApplicationType,
    /// URLs of its discovery endpoints.
    #[serde(default)]
    pub discovery_urls: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_mode_values() {
        assert_eq!(MessageSecurityMode::from_value(0), MessageSecurityMode::Invalid);
        assert_eq!(MessageSecurityMode::from_value(3), MessageSecurityMode::SignAndEncrypt);
        assert!(!MessageSecurityMode::Invalid.is_valid());
        assert_eq!(
            "sign-and-encrypt".parse::<MessageSecurityMode>().unwrap(),
            MessageSecurityMode::SignAndEncrypt
        );
        assert!("invalid".parse::<MessageSecurityMode>().is_err());
    }

    #[test]
    fn test_endpoint_display() {
        let endpoint = EndpointDescription::new("opc.tcp://localhost:4840");
        assert_eq!(endpoint.security_policy_name(), "None");
        assert_eq!(endpoint.to_string(), "opc.tcp://localhost:4840 [None, None]");
    }
}
