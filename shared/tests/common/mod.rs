#![allow(dead_code)]

use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use inbox_sync::{
    ApiError, ApiResult, ChangeTimestamp, ConversationApi, ConversationId, ConversationSummary,
    UnixTimeMs, UpdateCheck,
};

pub fn summary(id: &str, unread: u32) -> ConversationSummary {
    ConversationSummary {
        id: ConversationId::new(id).unwrap(),
        title: Some(format!("Conversation {id}")),
        participants: vec![],
        last_message: None,
        unread_count: unread,
        updated_at: UnixTimeMs(1_700_000_000_000),
    }
}

pub fn updates(ts: i64) -> ApiResult<UpdateCheck> {
    Ok(UpdateCheck {
        has_updates: true,
        timestamp: ChangeTimestamp(ts),
    })
}

pub fn unchanged() -> ApiResult<UpdateCheck> {
    Ok(UpdateCheck {
        has_updates: false,
        timestamp: ChangeTimestamp::ZERO,
    })
}

pub fn network_down() -> ApiResult<UpdateCheck> {
    Err(ApiError::network("connection refused"))
}

/// Scripted backend. Queued responses are consumed in order; once a queue is
/// empty the default answer is used (no updates / a two-item list).
#[derive(Default)]
pub struct ScriptedApi {
    probes: RefCell<VecDeque<ApiResult<UpdateCheck>>>,
    lists: RefCell<VecDeque<ApiResult<Vec<ConversationSummary>>>>,
    probe_always_fails: Cell<bool>,
    list_delay: Cell<Duration>,
    probe_delay: Cell<Duration>,

    pub probe_calls: Cell<u32>,
    pub list_calls: Cell<u32>,
    pub probe_since: RefCell<Vec<ChangeTimestamp>>,
    lists_in_flight: Cell<u32>,
    pub max_lists_in_flight: Cell<u32>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_probe(&self, response: ApiResult<UpdateCheck>) -> &Self {
        self.probes.borrow_mut().push_back(response);
        self
    }

    pub fn push_list(&self, response: ApiResult<Vec<ConversationSummary>>) -> &Self {
        self.lists.borrow_mut().push_back(response);
        self
    }

    pub fn fail_every_probe(&self) {
        self.probe_always_fails.set(true);
    }

    pub fn set_list_delay(&self, delay: Duration) {
        self.list_delay.set(delay);
    }

    pub fn set_probe_delay(&self, delay: Duration) {
        self.probe_delay.set(delay);
    }
}

#[async_trait(?Send)]
impl ConversationApi for ScriptedApi {
    async fn list_conversations(&self) -> ApiResult<Vec<ConversationSummary>> {
        self.list_calls.set(self.list_calls.get() + 1);
        self.lists_in_flight.set(self.lists_in_flight.get() + 1);
        self.max_lists_in_flight
            .set(self.max_lists_in_flight.get().max(self.lists_in_flight.get()));

        let delay = self.list_delay.get();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.lists_in_flight.set(self.lists_in_flight.get() - 1);
        self.lists
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(vec![summary("general", 2), summary("random", 0)]))
    }

    async fn check_for_updates(&self, since: ChangeTimestamp) -> ApiResult<UpdateCheck> {
        self.probe_calls.set(self.probe_calls.get() + 1);
        self.probe_since.borrow_mut().push(since);
        let delay = self.probe_delay.get();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.probe_always_fails.get() {
            return network_down();
        }
        self.probes.borrow_mut().pop_front().unwrap_or_else(unchanged)
    }
}

/// Advances paused time in small steps so spawned local tasks get polled.
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
