use tokio::sync::watch;
use tracing::warn;

use super::bridge::NotificationBridge;
use super::gate::FetchOutcome;
use super::poller::{ConversationPoller, PollerStatus};
use crate::capabilities::{ConversationApi, NotificationChannel};
use crate::config::{ConfigError, PollingConfig};
use crate::model::{ConversationListSnapshot, SessionId};

/// Screen-level facade: one poller plus the push bridge for its mounted
/// lifetime. Hosts map focus/blur/unmount onto these calls.
pub struct ConversationFeed<A> {
    poller: ConversationPoller<A>,
    bridge: Option<NotificationBridge>,
}

impl<A: ConversationApi + 'static> ConversationFeed<A> {
    /// Must be called from within a `LocalSet`.
    pub fn mount<C>(api: A, channel: &C, config: PollingConfig) -> Result<Self, ConfigError>
    where
        C: NotificationChannel + ?Sized,
    {
        let poller = ConversationPoller::new(api, config)?;
        let bridge = NotificationBridge::attach(&poller, channel);
        Ok(Self {
            poller,
            bridge: Some(bridge),
        })
    }

    pub fn on_focus(&self) -> SessionId {
        self.poller.on_activate()
    }

    pub fn on_blur(&self) -> bool {
        self.poller.on_deactivate()
    }

    pub async fn refresh(&self, force: bool) -> FetchOutcome {
        self.poller.refresh(force).await
    }

    #[must_use]
    pub fn conversations(&self) -> ConversationListSnapshot {
        self.poller.conversations()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationListSnapshot> {
        self.poller.subscribe()
    }

    #[must_use]
    pub fn status(&self) -> PollerStatus {
        self.poller.status()
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.bridge.as_ref().is_some_and(NotificationBridge::is_subscribed)
    }

    #[must_use]
    pub fn poller(&self) -> &ConversationPoller<A> {
        &self.poller
    }

    /// Stops polling and releases the push subscription.
    pub fn unmount(mut self) {
        self.poller.on_deactivate();
        if let Some(bridge) = self.bridge.take() {
            if let Err(e) = bridge.detach() {
                warn!(error = %e, "push unsubscribe failed on unmount");
            }
        }
    }
}

impl<A> Drop for ConversationFeed<A> {
    fn drop(&mut self) {
        // Covers hosts that never call `unmount`.
        self.poller.on_deactivate();
    }
}
