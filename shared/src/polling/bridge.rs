use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::poller::ConversationPoller;
use crate::capabilities::{ConversationApi, NotificationChannel, NotificationResult, Subscription};
use crate::event::PushMessage;

/// Routes push messages into the poller for as long as a screen is mounted.
///
/// The subscription is independent of focus: messages that arrive while the
/// poller has no active session resolve to `DispatchOutcome::Inactive`.
#[derive(Debug)]
pub struct NotificationBridge {
    subscription: Option<Subscription>,
    pump: Option<JoinHandle<()>>,
}

impl NotificationBridge {
    /// Subscribes to `channel`. A subscription error is logged and leaves the
    /// bridge detached; polling is unaffected.
    ///
    /// Must be called from within a `LocalSet`.
    pub fn attach<A, C>(poller: &ConversationPoller<A>, channel: &C) -> Self
    where
        A: ConversationApi + 'static,
        C: NotificationChannel + ?Sized,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<PushMessage>();
        let handler = Box::new(move |message: PushMessage| {
            if tx.send(message).is_err() {
                debug!("push message dropped, bridge detached");
            }
        });

        let subscription = match channel.on_message(handler) {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "push subscription failed, polling continues without it");
                return Self {
                    subscription: None,
                    pump: None,
                };
            }
        };

        let weak = poller.downgrade();
        let pump = tokio::task::spawn_local(async move {
            while let Some(message) = rx.recv().await {
                let Some(poller) = weak.upgrade() else {
                    break;
                };
                // Each message dispatches on its own so a slow fetch never
                // delays the next admission check.
                tokio::task::spawn_local(async move {
                    let outcome = poller.on_notification(message).await;
                    debug!(?outcome, "notification dispatch finished");
                });
            }
        });

        info!("push subscription attached");
        Self {
            subscription: Some(subscription),
            pump: Some(pump),
        }
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Unsubscribes and stops forwarding. Dispatches already started run to
    /// completion.
    pub fn detach(mut self) -> NotificationResult<()> {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        match self.subscription.take() {
            Some(subscription) => subscription.cancel(),
            None => Ok(()),
        }
    }
}

impl Drop for NotificationBridge {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
