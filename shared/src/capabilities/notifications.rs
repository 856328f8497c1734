use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use thiserror::Error;
use tracing::{debug, warn};

use crate::event::PushMessage;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotificationError {
    #[error("push notifications not available on this platform")]
    NotAvailable,

    #[error("permission denied by user")]
    PermissionDenied,

    #[error("subscription failed: {reason}")]
    SubscribeFailed {
        reason: String,
        #[serde(default)]
        is_retryable: bool,
    },

    #[error("unsubscribe failed: {reason}")]
    UnsubscribeFailed { reason: String },

    #[error("notification channel closed")]
    Closed,
}

impl NotificationError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::SubscribeFailed { is_retryable, .. } => *is_retryable,
            Self::Closed => true,
            Self::NotAvailable | Self::PermissionDenied | Self::UnsubscribeFailed { .. } => false,
        }
    }

    #[must_use]
    pub fn subscribe_failed(reason: impl Into<String>) -> Self {
        Self::SubscribeFailed {
            reason: reason.into(),
            is_retryable: false,
        }
    }
}

pub type NotificationResult<T> = Result<T, NotificationError>;

pub type MessageHandler = Box<dyn Fn(PushMessage)>;

type UnsubscribeFn = Box<dyn FnOnce() -> NotificationResult<()>>;

/// Handle returned by [`NotificationChannel::on_message`]. Unsubscribes when
/// cancelled or dropped.
pub struct Subscription {
    unsubscribe: Option<UnsubscribeFn>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() -> NotificationResult<()> + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn cancel(mut self) -> NotificationResult<()> {
        match self.unsubscribe.take() {
            Some(unsubscribe) => unsubscribe(),
            None => Ok(()),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            if let Err(e) = unsubscribe() {
                warn!(error = %e, "failed to unsubscribe from notification channel");
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// Source of push messages. The shell owns delivery; the core only
/// subscribes for the lifetime of a mounted screen.
pub trait NotificationChannel {
    fn on_message(&self, handler: MessageHandler) -> NotificationResult<Subscription>;
}

impl<T: NotificationChannel + ?Sized> NotificationChannel for Rc<T> {
    fn on_message(&self, handler: MessageHandler) -> NotificationResult<Subscription> {
        (**self).on_message(handler)
    }
}

type HandlerList = RefCell<Vec<(u64, Rc<dyn Fn(PushMessage)>)>>;

/// In-process fan-out channel. The shell forwards each delivered push
/// payload to [`PushRelay::deliver`].
#[derive(Default)]
pub struct PushRelay {
    handlers: Rc<HandlerList>,
    next_id: Cell<u64>,
    unavailable: Cell<bool>,
}

impl PushRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks push delivery as unavailable; later subscriptions fail with
    /// [`NotificationError::NotAvailable`].
    pub fn set_available(&self, available: bool) {
        self.unavailable.set(!available);
    }

    /// Delivers `message` to every current subscriber. Returns how many
    /// handlers were invoked.
    pub fn deliver(&self, message: PushMessage) -> usize {
        // Clone out so a handler may unsubscribe while we iterate.
        let handlers: Vec<_> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, h)| Rc::clone(h))
            .collect();
        for handler in &handlers {
            handler(message.clone());
        }
        debug!(subscribers = handlers.len(), "push message delivered");
        handlers.len()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.handlers.borrow().len()
    }
}

impl NotificationChannel for PushRelay {
    fn on_message(&self, handler: MessageHandler) -> NotificationResult<Subscription> {
        if self.unavailable.get() {
            return Err(NotificationError::NotAvailable);
        }

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.handlers.borrow_mut().push((id, Rc::from(handler)));

        let handlers: Weak<HandlerList> = Rc::downgrade(&self.handlers);
        Ok(Subscription::new(move || {
            let handlers = handlers.upgrade().ok_or(NotificationError::Closed)?;
            handlers.borrow_mut().retain(|(h_id, _)| *h_id != id);
            Ok(())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PushKind;

    #[test]
    fn test_notification_error_is_retryable() {
        assert!(NotificationError::Closed.is_retryable());
        assert!(NotificationError::SubscribeFailed {
            reason: "fcm".into(),
            is_retryable: true,
        }
        .is_retryable());
        assert!(!NotificationError::subscribe_failed("fcm").is_retryable());
        assert!(!NotificationError::PermissionDenied.is_retryable());
        assert!(!NotificationError::NotAvailable.is_retryable());
    }

    #[test]
    fn test_notification_error_serialization() {
        let error = NotificationError::SubscribeFailed {
            reason: "token missing".into(),
            is_retryable: true,
        };
        let json = serde_json::to_string(&error).unwrap();
        let deserialized: NotificationError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, deserialized);
    }

    #[test]
    fn test_relay_delivers_to_subscribers() {
        let relay = PushRelay::new();
        let received = Rc::new(Cell::new(0));

        let counter = Rc::clone(&received);
        let subscription = relay
            .on_message(Box::new(move |_| counter.set(counter.get() + 1)))
            .unwrap();

        assert_eq!(relay.deliver(PushMessage::new(PushKind::NewMessage)), 1);
        assert_eq!(received.get(), 1);

        subscription.cancel().unwrap();
        assert_eq!(relay.subscriber_count(), 0);
        assert_eq!(relay.deliver(PushMessage::new(PushKind::NewMessage)), 0);
        assert_eq!(received.get(), 1);
    }

    #[test]
    fn test_subscription_unsubscribes_on_drop() {
        let relay = PushRelay::new();
        {
            let _subscription = relay.on_message(Box::new(|_| {})).unwrap();
            assert_eq!(relay.subscriber_count(), 1);
        }
        assert_eq!(relay.subscriber_count(), 0);
    }

    #[test]
    fn test_unavailable_relay_rejects_subscriptions() {
        let relay = PushRelay::new();
        relay.set_available(false);
        assert_eq!(
            relay.on_message(Box::new(|_| {})).unwrap_err(),
            NotificationError::NotAvailable
        );
    }

    #[test]
    fn test_cancel_after_relay_dropped_reports_closed() {
        let relay = PushRelay::new();
        let subscription = relay.on_message(Box::new(|_| {})).unwrap();
        drop(relay);
        assert_eq!(subscription.cancel(), Err(NotificationError::Closed));
    }
}
