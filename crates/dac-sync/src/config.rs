use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::PktLineCodec;
use crate::error::{SyncError, SyncResult};

/// Tunables for one side of a sync exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on every phase read, in milliseconds. `None` waits for
    /// the peer indefinitely.
    pub phase_timeout_ms: Option<u64>,
    /// Capacity of each directional line queue.
    pub queue_capacity: usize,
    /// Namespace prepended to reference names on the wire.
    pub ref_prefix: String,
    /// Largest framed line body the codec accepts.
    pub max_line_len: usize,
    /// Let validation read objects missing from the transfer out of the
    /// local store.
    pub local_fallback: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            phase_timeout_ms: None,
            queue_capacity: 64,
            ref_prefix: "refs/heads/".into(),
            max_line_len: 65516,
            local_fallback: false,
        }
    }
}

impl SyncConfig {
    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(s: &str) -> SyncResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| SyncError::Config(e.to_string()))?;
        if config.queue_capacity == 0 {
            return Err(SyncError::Config("queue_capacity must be positive".into()));
        }
        Ok(config)
    }

    /// Builder-style phase timeout.
    pub fn with_phase_timeout(mut self, timeout: Duration) -> Self {
        self.phase_timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    /// The phase timeout as a `Duration`.
    pub fn phase_timeout(&self) -> Option<Duration> {
        self.phase_timeout_ms.map(Duration::from_millis)
    }

    /// Line codec honouring `max_line_len`.
    pub fn codec(&self) -> PktLineCodec {
        PktLineCodec::new(self.max_line_len)
    }

    /// Strip the configured namespace from a wire reference name, if present.
    pub fn short_name<'a>(&self, wire_name: &'a str) -> &'a str {
        wire_name
            .strip_prefix(self.ref_prefix.as_str())
            .unwrap_or(wire_name)
    }
}
