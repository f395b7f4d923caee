//! In-memory retention window for the journal

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable holding the window size
pub const RETENTION_VAR: &str = "DP_JOURNAL_RETENTION";

/// How many journal events stay in memory.
///
/// Persisted blocks are never pruned; only the in-memory window is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Maximum events kept in memory (`0` = unbounded)
    pub max_events: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { max_events: 1024 }
    }
}

impl RetentionPolicy {
    pub fn new(max_events: usize) -> Self {
        Self { max_events }
    }

    /// Keep every event
    pub fn unbounded() -> Self {
        Self { max_events: 0 }
    }

    /// Small window for tests
    pub fn minimal() -> Self {
        Self { max_events: 4 }
    }

    /// Parse from `DP_JOURNAL_RETENTION`
    pub fn from_env() -> Self {
        match std::env::var(RETENTION_VAR) {
            Ok(raw) => match raw.trim().parse::<usize>() {
                Ok(max_events) => Self { max_events },
                Err(_) => {
                    warn!("Invalid {} '{}', using default", RETENTION_VAR, raw);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_events == 0
    }

    /// Number of events to drop from a window of `len` events
    pub fn overflow(&self, len: usize) -> usize {
        if self.is_unbounded() {
            0
        } else {
            len.saturating_sub(self.max_events)
        }
    }
}
