use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollingMode {
    Probing,
    /// Terminal for the session: the probe endpoint is treated as absent.
    Degraded,
}

impl fmt::Display for PollingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Probing => "probing",
            Self::Degraded => "degraded",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Probe,
    DirectFetch,
    Wait,
}

#[derive(Debug)]
pub struct DegradationController {
    mode: PollingMode,
    failure_threshold: u32,
    direct_fetch_interval: Duration,
    /// Session start until the first direct fetch, then the latest one.
    cadence_anchor: Instant,
}

impl DegradationController {
    pub fn new(failure_threshold: u32, direct_fetch_interval: Duration, session_started_at: Instant) -> Self {
        Self {
            mode: PollingMode::Probing,
            failure_threshold,
            direct_fetch_interval,
            cadence_anchor: session_started_at,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> PollingMode {
        self.mode
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.mode == PollingMode::Degraded
    }

    /// Returns `true` only on the call that performs the transition.
    pub fn observe_failures(&mut self, consecutive_failures: u32) -> bool {
        if self.mode == PollingMode::Probing && consecutive_failures >= self.failure_threshold {
            self.mode = PollingMode::Degraded;
            return true;
        }
        false
    }

    #[must_use]
    pub fn next_action(&self, now: Instant) -> TickAction {
        match self.mode {
            PollingMode::Probing => TickAction::Probe,
            PollingMode::Degraded
                if now.saturating_duration_since(self.cadence_anchor)
                    >= self.direct_fetch_interval =>
            {
                TickAction::DirectFetch
            }
            PollingMode::Degraded => TickAction::Wait,
        }
    }

    pub fn record_direct_fetch(&mut self, started_at: Instant) {
        self.cadence_anchor = started_at;
    }
}
