use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::capabilities::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyInFlight,
    Throttled,
    /// No polling session is active, or the session that asked has ended.
    Inactive,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AlreadyInFlight => "already_in_flight",
            Self::Throttled => "throttled",
            Self::Inactive => "inactive",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Completed { count: usize },
    Skipped(SkipReason),
    Failed(ApiError),
    /// The fetch finished after its session ended; nothing was published.
    Discarded,
}

impl FetchOutcome {
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    #[must_use]
    pub const fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Skipped(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Admission state for the full list fetch: one in flight at most, and no
/// unforced start within `min_interval` of the previous start.
#[derive(Debug, Default)]
pub struct FetchGate {
    in_flight: bool,
    last_started_at: Option<Instant>,
}

impl FetchGate {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    #[must_use]
    pub const fn last_started_at(&self) -> Option<Instant> {
        self.last_started_at
    }

    /// Checks in-flight first, then the throttle, without changing state.
    pub fn check(&self, force: bool, now: Instant, min_interval: Duration) -> Result<(), SkipReason> {
        if self.in_flight {
            return Err(SkipReason::AlreadyInFlight);
        }
        if !force {
            if let Some(last) = self.last_started_at {
                if now.saturating_duration_since(last) < min_interval {
                    return Err(SkipReason::Throttled);
                }
            }
        }
        Ok(())
    }

    /// Same verdict as [`FetchGate::check`]. On admission the gate is closed
    /// until [`FetchGate::release`].
    pub fn try_acquire(
        &mut self,
        force: bool,
        now: Instant,
        min_interval: Duration,
    ) -> Result<(), SkipReason> {
        self.check(force, now, min_interval)?;
        self.in_flight = true;
        self.last_started_at = Some(now);
        Ok(())
    }

    pub fn release(&mut self) {
        self.in_flight = false;
    }
}
