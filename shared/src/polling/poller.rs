use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::degradation::{DegradationController, PollingMode, TickAction};
use super::detector::{ChangeState, ProbeOutcome};
use super::gate::{FetchGate, FetchOutcome, SkipReason};
use super::metrics::{MetricsSnapshot, PollerMetrics};
use super::scheduler::SessionTimer;
use crate::capabilities::ConversationApi;
use crate::config::{ConfigError, PollingConfig};
use crate::event::{PushMessage, Trigger};
use crate::model::{ChangeTimestamp, ConversationListSnapshot, SessionId};

/// What a single dispatch (timer tick, notification, or manual check) did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Inactive,
    Unchanged,
    ProbeFailed {
        consecutive_failures: u32,
        degraded: bool,
    },
    /// Degraded and the direct-fetch cadence is not due yet.
    Waiting,
    Fetch(FetchOutcome),
    /// The probe resolved after its session ended.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerStatus {
    pub active: bool,
    pub session: Option<SessionId>,
    pub mode: Option<PollingMode>,
    pub consecutive_probe_failures: u32,
    pub last_known_change: ChangeTimestamp,
    pub fetch_in_flight: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOrigin {
    Entry,
    Manual,
    Changed,
    Direct,
}

struct PollingSession {
    id: SessionId,
    change: ChangeState,
    gate: FetchGate,
    degradation: DegradationController,
    // Dropping the session drops the timer, which cancels it.
    _timer: SessionTimer,
}

struct Inner<A> {
    api: A,
    config: PollingConfig,
    session: RefCell<Option<PollingSession>>,
    conversations: watch::Sender<ConversationListSnapshot>,
    metrics: PollerMetrics,
}

impl<A> Inner<A> {
    fn is_current(&self, id: SessionId) -> bool {
        self.session.borrow().as_ref().is_some_and(|s| s.id == id)
    }
}

/// Clears the fetch gate when the fetch future completes or is dropped, as
/// long as the issuing session is still the current one.
struct InFlightGuard<'a, A> {
    inner: &'a Inner<A>,
    session: SessionId,
}

impl<A> Drop for InFlightGuard<'_, A> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.inner.session.try_borrow_mut() {
            if let Some(session) = slot.as_mut().filter(|s| s.id == self.session) {
                session.gate.release();
            }
        }
    }
}

/// Keeps a conversation list fresh while its screen is visible.
///
/// Single-threaded: every method must run on the thread that owns the
/// `LocalSet` driving the poller. Lifecycle hooks spawn local tasks.
pub struct ConversationPoller<A> {
    inner: Rc<Inner<A>>,
}

impl<A> Clone for ConversationPoller<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

pub struct WeakConversationPoller<A> {
    inner: Weak<Inner<A>>,
}

impl<A> WeakConversationPoller<A> {
    pub fn upgrade(&self) -> Option<ConversationPoller<A>> {
        self.inner.upgrade().map(|inner| ConversationPoller { inner })
    }
}

impl<A> Clone for WeakConversationPoller<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<A> ConversationPoller<A> {
    /// Screen lost focus. Cancels the timer synchronously and ends the
    /// session; probes and fetches already running finish but publish nothing.
    pub fn on_deactivate(&self) -> bool {
        let ended = self.inner.session.borrow_mut().take();
        match ended {
            Some(session) => {
                info!(session = %session.id, "conversation polling stopped");
                drop(session);
                true
            }
            None => false,
        }
    }
}

impl<A: ConversationApi + 'static> ConversationPoller<A> {
    pub fn new(api: A, config: PollingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(api, config))
    }

    pub fn with_defaults(api: A) -> Self {
        Self::build(api, PollingConfig::default())
    }

    fn build(api: A, config: PollingConfig) -> Self {
        let (conversations, _) = watch::channel(ConversationListSnapshot::default());
        Self {
            inner: Rc::new(Inner {
                api,
                config,
                session: RefCell::new(None),
                conversations,
                metrics: PollerMetrics::new(),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakConversationPoller<A> {
        WeakConversationPoller {
            inner: Rc::downgrade(&self.inner),
        }
    }

    #[must_use]
    pub fn config(&self) -> &PollingConfig {
        &self.inner.config
    }

    // ========================================================================
    // Consumer surface
    // ========================================================================

    #[must_use]
    pub fn conversations(&self) -> ConversationListSnapshot {
        self.inner.conversations.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ConversationListSnapshot> {
        self.inner.conversations.subscribe()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.session.borrow().is_some()
    }

    #[must_use]
    pub fn current_session(&self) -> Option<SessionId> {
        self.inner.session.borrow().as_ref().map(|s| s.id)
    }

    #[must_use]
    pub fn status(&self) -> PollerStatus {
        match self.inner.session.borrow().as_ref() {
            Some(session) => PollerStatus {
                active: true,
                session: Some(session.id),
                mode: Some(session.degradation.mode()),
                consecutive_probe_failures: session.change.consecutive_probe_failures(),
                last_known_change: session.change.last_known_change(),
                fetch_in_flight: session.gate.is_in_flight(),
            },
            None => PollerStatus {
                active: false,
                session: None,
                mode: None,
                consecutive_probe_failures: 0,
                last_known_change: ChangeTimestamp::ZERO,
                fetch_in_flight: false,
            },
        }
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Screen gained focus. Starts a fresh session: one immediate fetch, then
    /// a tick every `probe_interval_ms`. Calling it again while active returns
    /// the running session and starts nothing.
    ///
    /// Must be called from within a `LocalSet`.
    pub fn on_activate(&self) -> SessionId {
        if let Some(id) = self.current_session() {
            debug!(session = %id, "activate ignored, session already running");
            return id;
        }

        let id = SessionId::generate();
        let now = Instant::now();
        let config = &self.inner.config;

        let weak = self.downgrade();
        let timer = SessionTimer::start(config.probe_interval(), move || {
            let poller = weak.upgrade()?;
            Some(async move {
                PollerMetrics::incr(&poller.inner.metrics.timer_ticks);
                poller.dispatch_in(Some(id), Trigger::Timer).await;
            })
        });

        *self.inner.session.borrow_mut() = Some(PollingSession {
            id,
            change: ChangeState::new(),
            gate: FetchGate::new(),
            degradation: DegradationController::new(
                config.degrade_after_failures,
                config.degraded_fetch_interval(),
                now,
            ),
            _timer: timer,
        });
        info!(session = %id, interval_ms = config.probe_interval_ms, "conversation polling started");

        let poller = self.clone();
        tokio::task::spawn_local(async move {
            poller.fetch_in(Some(id), false, FetchOrigin::Entry).await;
        });

        id
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// User-initiated refresh. `force` bypasses the throttle but never the
    /// in-flight guard.
    #[instrument(skip(self))]
    pub async fn refresh(&self, force: bool) -> FetchOutcome {
        self.fetch_in(None, force, FetchOrigin::Manual).await
    }

    /// Runs the tick logic for the current session: probe-then-fetch while
    /// probing, timed direct fetch once degraded.
    #[instrument(skip(self))]
    pub async fn dispatch(&self, trigger: Trigger) -> DispatchOutcome {
        self.dispatch_in(None, trigger).await
    }

    /// Push message arrived. Goes through the same admission path as a tick.
    #[instrument(skip(self, message), fields(kind = ?message.kind))]
    pub async fn on_notification(&self, message: PushMessage) -> DispatchOutcome {
        PollerMetrics::incr(&self.inner.metrics.notifications_received);
        if let Some(conversation) = &message.conversation_id {
            debug!(conversation = %conversation, "push hint received");
        }
        self.dispatch_in(None, Trigger::Notification).await
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    async fn dispatch_in(&self, expected: Option<SessionId>, trigger: Trigger) -> DispatchOutcome {
        let now = Instant::now();
        let (session_id, action, since, fetch_in_flight) = {
            let slot = self.inner.session.borrow();
            let Some(session) = slot.as_ref().filter(|s| expected.is_none() || expected == Some(s.id))
            else {
                debug!(%trigger, "dispatch skipped, no active session");
                return DispatchOutcome::Inactive;
            };
            (
                session.id,
                session.degradation.next_action(now),
                session.change.last_known_change(),
                session.gate.is_in_flight(),
            )
        };

        match action {
            TickAction::Wait => {
                debug!(session = %session_id, %trigger, "degraded, direct fetch not due");
                DispatchOutcome::Waiting
            }
            TickAction::DirectFetch => {
                DispatchOutcome::Fetch(self.fetch_in(Some(session_id), false, FetchOrigin::Direct).await)
            }
            TickAction::Probe if fetch_in_flight => {
                self.inner.metrics.record_skip(SkipReason::AlreadyInFlight);
                debug!(session = %session_id, %trigger, "fetch in flight, probe skipped");
                DispatchOutcome::Fetch(FetchOutcome::Skipped(SkipReason::AlreadyInFlight))
            }
            TickAction::Probe => self.probe_in(session_id, since, trigger).await,
        }
    }

    async fn probe_in(
        &self,
        session_id: SessionId,
        since: ChangeTimestamp,
        trigger: Trigger,
    ) -> DispatchOutcome {
        PollerMetrics::incr(&self.inner.metrics.probes_issued);
        let response = self.inner.api.check_for_updates(since).await;

        if let Err(e) = &response {
            debug!(session = %session_id, error = %e, transient = e.is_transient(), "update probe failed");
        }

        let (outcome, consecutive_failures, degraded, degraded_now) = {
            let mut slot = self.inner.session.borrow_mut();
            let Some(session) = slot.as_mut().filter(|s| s.id == session_id) else {
                PollerMetrics::incr(&self.inner.metrics.results_discarded);
                debug!(session = %session_id, "probe result discarded, session ended");
                return DispatchOutcome::Discarded;
            };
            // A change the gate would refuse now stays undetected until a
            // later probe, so it is never dropped behind the throttle.
            let blocked = session
                .gate
                .check(false, Instant::now(), self.inner.config.min_fetch_interval())
                .is_err();
            let outcome = session.change.apply_probe(response, blocked);
            let failures = session.change.consecutive_probe_failures();
            let degraded_now =
                outcome == ProbeOutcome::ProbeFailed && session.degradation.observe_failures(failures);
            (outcome, failures, session.degradation.is_degraded(), degraded_now)
        };

        match outcome {
            ProbeOutcome::NoChange => DispatchOutcome::Unchanged,
            ProbeOutcome::ProbeFailed => {
                PollerMetrics::incr(&self.inner.metrics.probe_failures);
                if degraded_now {
                    PollerMetrics::incr(&self.inner.metrics.degradations);
                    warn!(
                        session = %session_id,
                        consecutive_failures,
                        interval_ms = self.inner.config.degraded_fetch_interval_ms,
                        "update probe unavailable, switching to direct fetch"
                    );
                }
                DispatchOutcome::ProbeFailed {
                    consecutive_failures,
                    degraded,
                }
            }
            ProbeOutcome::Changed(timestamp) => {
                PollerMetrics::incr(&self.inner.metrics.changes_detected);
                debug!(session = %session_id, %timestamp, %trigger, "change detected");
                DispatchOutcome::Fetch(self.fetch_in(Some(session_id), false, FetchOrigin::Changed).await)
            }
        }
    }

    // ========================================================================
    // Fetch
    // ========================================================================

    async fn fetch_in(
        &self,
        expected: Option<SessionId>,
        force: bool,
        origin: FetchOrigin,
    ) -> FetchOutcome {
        let session_id = {
            let mut slot = self.inner.session.borrow_mut();
            let Some(session) = slot
                .as_mut()
                .filter(|s| expected.is_none() || expected == Some(s.id))
            else {
                self.inner.metrics.record_skip(SkipReason::Inactive);
                debug!(?origin, "fetch skipped, no active session");
                return FetchOutcome::Skipped(SkipReason::Inactive);
            };

            let now = Instant::now();
            if let Err(reason) =
                session
                    .gate
                    .try_acquire(force, now, self.inner.config.min_fetch_interval())
            {
                self.inner.metrics.record_skip(reason);
                debug!(session = %session.id, ?origin, %reason, "fetch skipped");
                return FetchOutcome::Skipped(reason);
            }
            if origin == FetchOrigin::Direct {
                session.degradation.record_direct_fetch(now);
            }
            session.id
        };

        PollerMetrics::incr(&self.inner.metrics.fetches_started);
        let guard = InFlightGuard {
            inner: &self.inner,
            session: session_id,
        };
        let result = self.inner.api.list_conversations().await;
        drop(guard);

        if !self.inner.is_current(session_id) {
            PollerMetrics::incr(&self.inner.metrics.results_discarded);
            debug!(session = %session_id, ?origin, "fetch result discarded, session ended");
            return FetchOutcome::Discarded;
        }

        match result {
            Ok(items) => {
                let count = items.len();
                let next = self
                    .inner
                    .conversations
                    .borrow()
                    .replaced_by(items, session_id);
                self.inner.conversations.send_replace(next);
                PollerMetrics::incr(&self.inner.metrics.fetches_completed);
                debug!(session = %session_id, ?origin, count, "conversation list refreshed");
                FetchOutcome::Completed { count }
            }
            Err(error) => {
                PollerMetrics::incr(&self.inner.metrics.fetches_failed);
                warn!(session = %session_id, ?origin, error = %error, "conversation fetch failed");
                FetchOutcome::Failed(error)
            }
        }
    }
}
