//! Adaptive change-detection polling for a conversation list.
//!
//! The core keeps a [`ConversationListSnapshot`] fresh while a screen is
//! visible: a cheap update probe gates the expensive list fetch, repeated
//! probe failures fall back to a slower direct-fetch cadence, and push
//! messages trigger the same admission path out of band. Everything runs on
//! a single-threaded `LocalSet`; the host supplies the transport through
//! [`ConversationApi`] and [`NotificationChannel`].

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod capabilities;
pub mod config;
pub mod event;
pub mod model;
pub mod polling;

pub use capabilities::{
    ApiEnvelope, ApiError, ApiResult, ConversationApi, ErrorSeverity, NotificationChannel,
    NotificationError, PushRelay, Subscription, UpdateCheck,
};
pub use config::{ConfigError, PollingConfig};
pub use event::{PushKind, PushMessage, Trigger};
pub use model::{
    ChangeTimestamp, ConversationId, ConversationListSnapshot, ConversationSummary, LastMessage,
    MessageId, SessionId, UnixTimeMs, UserId,
};
pub use polling::{
    ConversationFeed, ConversationPoller, DispatchOutcome, FetchOutcome, MetricsSnapshot,
    NotificationBridge, PollerStatus, PollingMode, SkipReason,
};

pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_MIN_FETCH_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_DEGRADED_FETCH_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_DEGRADE_AFTER_FAILURES: u32 = 3;
