//! Bridge configuration.

use serde::{Deserialize, Serialize};

use crate::execution::context::ApplicationInfo;
use crate::transport::queue::DEFAULT_QUEUE_CAPACITY;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub application: ApplicationInfo,
    /// Include validator/handler details in error payloads sent to the
    /// agent. Off by default; internals stay local unless opted in.
    pub detailed_errors: bool,
    /// Bound on the per-transport disconnect queue.
    pub queue_capacity: usize,
    pub heartbeat: HeartbeatConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            application: ApplicationInfo::default(),
            detailed_errors: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn new(application: ApplicationInfo) -> Self {
        Self {
            application,
            ..Default::default()
        }
    }
}

/// Advisory liveness signal; a missed heartbeat never forces a reconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 15_000,
        }
    }
}
