use crate::capabilities::{ApiResult, UpdateCheck};
use crate::model::ChangeTimestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    NoChange,
    Changed(ChangeTimestamp),
    ProbeFailed,
}

/// Per-session change tracking. Reset by creating a new value; never shared
/// across sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeState {
    last_known_change: ChangeTimestamp,
    consecutive_probe_failures: u32,
}

impl ChangeState {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn last_known_change(&self) -> ChangeTimestamp {
        self.last_known_change
    }

    #[must_use]
    pub const fn consecutive_probe_failures(&self) -> u32 {
        self.consecutive_probe_failures
    }

    /// Folds one probe response into the state.
    ///
    /// Any successful response clears the failure streak. The timestamp
    /// advances here, at detection time, and only when the response reports
    /// updates with a strictly newer timestamp and the gate would admit a
    /// fetch right now. `fetch_blocked` covers both a fetch in flight and an
    /// active throttle; a held-back change is found again by a later probe.
    pub fn apply_probe(
        &mut self,
        response: ApiResult<UpdateCheck>,
        fetch_blocked: bool,
    ) -> ProbeOutcome {
        let check = match response.and_then(UpdateCheck::validate) {
            Ok(check) => check,
            Err(_) => {
                self.consecutive_probe_failures = self.consecutive_probe_failures.saturating_add(1);
                return ProbeOutcome::ProbeFailed;
            }
        };

        self.consecutive_probe_failures = 0;

        if check.has_updates
            && check.timestamp.is_newer_than(self.last_known_change)
            && !fetch_blocked
        {
            self.last_known_change = check.timestamp;
            return ProbeOutcome::Changed(check.timestamp);
        }

        ProbeOutcome::NoChange
    }
}
