//! Visibility-scoped change-detection polling for the conversation list.

mod bridge;
mod degradation;
mod detector;
mod feed;
mod gate;
mod metrics;
mod poller;
mod scheduler;

pub use self::bridge::NotificationBridge;
pub use self::degradation::{DegradationController, PollingMode, TickAction};
pub use self::detector::{ChangeState, ProbeOutcome};
pub use self::feed::ConversationFeed;
pub use self::gate::{FetchGate, FetchOutcome, SkipReason};
pub use self::metrics::{MetricsSnapshot, PollerMetrics};
pub use self::poller::{ConversationPoller, DispatchOutcome, PollerStatus, WeakConversationPoller};
