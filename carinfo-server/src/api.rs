//! API response types

use serde::{Deserialize, Serialize};

/// Body of every non-success response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human-readable explanation
    pub msg: String,
}

impl MessageResponse {
    /// Wrap a message
    pub fn new(msg: impl Into<String>) -> Self {
        MessageResponse { msg: msg.into() }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status
    pub status: HealthStatus,

    /// Service version
    pub version: String,

    /// Uptime in seconds
    pub uptime_seconds: u64,

    /// How authorization decisions are made (open, http, allow-all, deny-all)
    pub policy_mode: String,
}

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Service is healthy
    Healthy,
}
