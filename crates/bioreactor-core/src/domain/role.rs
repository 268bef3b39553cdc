//! Connection roles and session identity.
//!
//! Every WebSocket peer of the gateway plays exactly one [`Role`].  The
//! embedded controller connects as [`Role::Device`]; everything else (the
//! operator web UI, scripts, test clients) is a [`Role::Frontend`].
//!
//! # Role selection
//!
//! A peer announces its role with the [`ROLE_HEADER`] handshake header.  Only
//! the value `device` (case-insensitive) selects the device role; a missing or
//! unrecognised value falls back to the frontend role, so a browser that knows
//! nothing about the header still lands in the right slot.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the WebSocket handshake header carrying the peer's role.
pub const ROLE_HEADER: &str = "X-Client-Type";

/// The two logical roles a connection can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The embedded bioreactor controller.
    Device,
    /// An operator-facing client.
    Frontend,
}

impl Role {
    /// Both roles, in slot order.
    pub const ALL: [Role; 2] = [Role::Device, Role::Frontend];

    /// Resolves the role announced in a handshake header value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bioreactor_core::Role;
    ///
    /// assert_eq!(Role::from_header(Some("Device")), Role::Device);
    /// assert_eq!(Role::from_header(Some("browser")), Role::Frontend);
    /// assert_eq!(Role::from_header(None), Role::Frontend);
    /// ```
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("device") => Role::Device,
            Some(v) => {
                tracing::debug!("unrecognised client type {v:?}; treating peer as frontend");
                Role::Frontend
            }
            None => Role::Frontend,
        }
    }

    /// Returns the role on the other end of the relay.
    pub fn peer(self) -> Self {
        match self {
            Role::Device => Role::Frontend,
            Role::Frontend => Role::Device,
        }
    }

    /// Lowercase name used in logs and JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Device => "device",
            Role::Frontend => "frontend",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identity of one accepted transport session.
///
/// Two connections of the same role never share an id, which is what lets the
/// registry tell a superseded connection apart from its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
