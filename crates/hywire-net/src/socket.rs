//! Sockets
//!
//! Connection state and the JSON envelope sent for declarative socket
//! messages: the node's parameters flattened at the top level plus a
//! `HEADERS` correlation object.

use serde::{Deserialize, Serialize};

/// Socket ready states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
}

/// Outbound socket message envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SocketEnvelope {
    #[serde(flatten)]
    pub values: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "HEADERS")]
    pub headers: serde_json::Map<String, serde_json::Value>,
}

impl SocketEnvelope {
    pub fn new() -> Self {
        Self {
            values: serde_json::Map::new(),
            headers: serde_json::Map::new(),
        }
    }

    /// Serialize for the wire
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for SocketEnvelope {
    fn default() -> Self {
        Self::new()
    }
}
