//! Adapter configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Permissions granted to the embedded player frame through its `allow` attribute
pub const DEFAULT_FRAME_PERMISSIONS: [&str; 6] = [
    "accelerometer",
    "clipboard-write",
    "encrypted-media",
    "gyroscope",
    "picture-in-picture",
    "web-share",
];

/// Remote player adapter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Quiet period after the last position change before buffered ranges are polled (ms)
    pub buffered_poll_debounce_ms: u64,
    /// Give up on unanswered commands after this long (ms, None = wait forever)
    pub command_timeout_ms: Option<u64>,
    /// Frame permissions joined into the `allow` attribute
    pub frame_permissions: Vec<String>,
    /// Hide the peer's own controls and playlist once it is initialized
    pub hide_peer_ui: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            buffered_poll_debounce_ms: 1000,
            command_timeout_ms: None,
            frame_permissions: DEFAULT_FRAME_PERMISSIONS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            hide_peer_ui: true,
        }
    }
}

impl AdapterConfig {
    /// Config that fails unanswered commands after five seconds
    pub fn strict() -> Self {
        Self {
            command_timeout_ms: Some(5000),
            ..Default::default()
        }
    }

    /// Buffered polling debounce as a duration
    pub fn buffered_poll_debounce(&self) -> Duration {
        Duration::from_millis(self.buffered_poll_debounce_ms)
    }

    /// Command timeout as a duration
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_ms.map(Duration::from_millis)
    }

    /// Value of the frame `allow` attribute
    pub fn allow_attribute(&self) -> String {
        self.frame_permissions.join("; ")
    }
}
