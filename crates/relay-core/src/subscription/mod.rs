//! WebSocket subscription manager and single-timer poller (§4.7, §3 Subscription).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ethereum_types::H256;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::errors::RpcErr;
use crate::types::{RpcBlock, RpcLog};

pub type SubscriptionCallback = Arc<dyn Fn(Value) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionEvent {
    Logs { address: Option<String>, topics: Vec<H256> },
    NewHeads,
}

impl SubscriptionEvent {
    /// `tag = canonical(event, filters)` (§3 Subscription).
    pub fn tag(&self) -> String {
        match self {
            SubscriptionEvent::Logs { address, topics } => format!(
                "logs:{}:{}",
                address.clone().unwrap_or_default(),
                topics.iter().map(|t| format!("{t:#x}")).collect::<Vec<_>>().join(",")
            ),
            SubscriptionEvent::NewHeads => "newHeads".to_string(),
        }
    }
}

struct Subscription {
    sub_id: u64,
    connection_id: String,
    callback: SubscriptionCallback,
}

struct TagState {
    event: SubscriptionEvent,
    subscribers: Vec<Subscription>,
    last_polled_block: Option<u64>,
}

/// What the poller needs from the rest of the relay each tick — a trait so
/// tests can drive it with canned responses (§4.7).
#[async_trait]
pub trait SubscriptionChainReader: Send + Sync {
    async fn current_head(&self) -> Result<u64, RpcErr>;
    async fn get_logs_since(&self, event: &SubscriptionEvent, since_block: u64, head: u64) -> Result<Vec<RpcLog>, RpcErr>;
    async fn get_latest_block(&self) -> Result<RpcBlock, RpcErr>;
}

pub struct SubscriptionManager {
    reader: Arc<dyn SubscriptionChainReader>,
    tags: Mutex<HashMap<String, TagState>>,
    next_sub_id: AtomicU64,
    max_per_connection: usize,
    poll_interval: Duration,
    poller_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriptionManager {
    pub fn new(reader: Arc<dyn SubscriptionChainReader>, max_per_connection: usize, poll_interval: Duration) -> Self {
        Self {
            reader,
            tags: Mutex::new(HashMap::new()),
            next_sub_id: AtomicU64::new(1),
            max_per_connection,
            poll_interval,
            poller_handle: Mutex::new(None),
        }
    }

    fn connection_subscription_count(&self, connection_id: &str) -> usize {
        let tags = self.tags.lock().expect("subscription mutex poisoned");
        tags.values()
            .flat_map(|state| &state.subscribers)
            .filter(|sub| sub.connection_id == connection_id)
            .count()
    }

    /// Registers a callback under `event`'s tag, enforcing the per-connection cap.
    pub fn subscribe(
        self: &Arc<Self>,
        connection_id: &str,
        event: SubscriptionEvent,
        callback: SubscriptionCallback,
    ) -> Result<u64, RpcErr> {
        if self.connection_subscription_count(connection_id) >= self.max_per_connection {
            return Err(RpcErr::MaxSubscriptions);
        }

        let sub_id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        let tag = event.tag();
        let mut tags = self.tags.lock().expect("subscription mutex poisoned");
        let was_empty = tags.is_empty();
        let state = tags.entry(tag).or_insert_with(|| TagState {
            event: event.clone(),
            subscribers: Vec::new(),
            last_polled_block: None,
        });
        state.subscribers.push(Subscription {
            sub_id,
            connection_id: connection_id.to_string(),
            callback,
        });
        drop(tags);

        if was_empty {
            self.start_poller();
        }

        Ok(sub_id)
    }

    /// Returns `true` iff at least one subscription matched `sub_id` (§4.7).
    pub fn unsubscribe(&self, sub_id: u64) -> bool {
        let mut tags = self.tags.lock().expect("subscription mutex poisoned");
        let mut removed = false;
        tags.retain(|_, state| {
            let before = state.subscribers.len();
            state.subscribers.retain(|sub| sub.sub_id != sub_id);
            removed |= state.subscribers.len() != before;
            !state.subscribers.is_empty()
        });
        let now_empty = tags.is_empty();
        drop(tags);

        if removed && now_empty {
            self.stop_poller();
        }
        removed
    }

    fn start_poller(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(manager.poll_interval);
            loop {
                interval.tick().await;
                if manager.tags.lock().expect("subscription mutex poisoned").is_empty() {
                    break;
                }
                manager.tick().await;
            }
        });
        *self.poller_handle.lock().expect("poller handle mutex poisoned") = Some(handle);
    }

    fn stop_poller(&self) {
        if let Some(handle) = self.poller_handle.lock().expect("poller handle mutex poisoned").take() {
            handle.abort();
        }
    }

    /// One poller tick: fetch head once, then one upstream read per tag,
    /// fanning out array results per-element and scalar results once (§4.7).
    async fn tick(&self) {
        let head = match self.reader.current_head().await {
            Ok(head) => head,
            Err(err) => {
                trace!(%err, "poller failed to fetch chain head");
                return;
            }
        };

        let tags: Vec<String> = {
            let tags = self.tags.lock().expect("subscription mutex poisoned");
            tags.keys().cloned().collect()
        };

        for tag in tags {
            self.tick_tag(&tag, head).await;
        }
    }

    async fn tick_tag(&self, tag: &str, head: u64) {
        let (event, last_polled) = {
            let tags = self.tags.lock().expect("subscription mutex poisoned");
            let Some(state) = tags.get(tag) else { return };
            (state.event.clone(), state.last_polled_block.unwrap_or(head))
        };

        match event {
            SubscriptionEvent::NewHeads => {
                if let Ok(block) = self.reader.get_latest_block().await {
                    self.fan_out(tag, serde_json::to_value(&block).unwrap_or(Value::Null));
                }
            }
            SubscriptionEvent::Logs { .. } => {
                if let Ok(logs) = self.reader.get_logs_since(&event, last_polled, head).await {
                    for log in &logs {
                        self.fan_out(tag, serde_json::to_value(log).unwrap_or(Value::Null));
                    }
                }
            }
        }

        let mut tags = self.tags.lock().expect("subscription mutex poisoned");
        if let Some(state) = tags.get_mut(tag) {
            state.last_polled_block = Some(head);
        }
    }

    fn fan_out(&self, tag: &str, value: Value) {
        let tags = self.tags.lock().expect("subscription mutex poisoned");
        let Some(state) = tags.get(tag) else { return };
        debug!(tag, subscribers = state.subscribers.len(), "fanning out subscription update");
        for subscriber in &state.subscribers {
            (subscriber.callback)(value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_types::U256;
    use std::sync::atomic::AtomicUsize;

    struct FixedReader {
        head: u64,
    }

    #[async_trait]
    impl SubscriptionChainReader for FixedReader {
        async fn current_head(&self) -> Result<u64, RpcErr> {
            Ok(self.head)
        }

        async fn get_logs_since(&self, _event: &SubscriptionEvent, _since_block: u64, _head: u64) -> Result<Vec<RpcLog>, RpcErr> {
            Ok(vec![])
        }

        async fn get_latest_block(&self) -> Result<RpcBlock, RpcErr> {
            Ok(RpcBlock {
                number: U256::from(self.head),
                hash: H256::zero(),
                parent_hash: H256::zero(),
                timestamp: U256::zero(),
                gas_used: U256::zero(),
                gas_limit: U256::zero(),
                base_fee_per_gas: None,
                logs_bloom: Default::default(),
                transactions: vec![],
            })
        }
    }

    #[test]
    fn exceeding_per_connection_cap_is_refused() {
        let manager = Arc::new(SubscriptionManager::new(
            Arc::new(FixedReader { head: 1 }),
            1,
            Duration::from_secs(60),
        ));
        manager
            .subscribe("conn-1", SubscriptionEvent::NewHeads, Arc::new(|_| {}))
            .unwrap();
        let err = manager
            .subscribe(
                "conn-1",
                SubscriptionEvent::Logs { address: None, topics: vec![] },
                Arc::new(|_| {}),
            )
            .unwrap_err();
        assert!(matches!(err, RpcErr::MaxSubscriptions));
    }

    #[test]
    fn unsubscribe_reports_whether_anything_matched() {
        let manager = Arc::new(SubscriptionManager::new(
            Arc::new(FixedReader { head: 1 }),
            5,
            Duration::from_secs(60),
        ));
        let sub_id = manager
            .subscribe("conn-1", SubscriptionEvent::NewHeads, Arc::new(|_| {}))
            .unwrap();
        assert!(manager.unsubscribe(sub_id));
        assert!(!manager.unsubscribe(sub_id));
    }

    struct CapturingReader {
        head: u64,
        seen: Mutex<Vec<SubscriptionEvent>>,
    }

    #[async_trait]
    impl SubscriptionChainReader for CapturingReader {
        async fn current_head(&self) -> Result<u64, RpcErr> {
            Ok(self.head)
        }

        async fn get_logs_since(&self, event: &SubscriptionEvent, _since_block: u64, _head: u64) -> Result<Vec<RpcLog>, RpcErr> {
            self.seen.lock().expect("seen mutex poisoned").push(event.clone());
            Ok(vec![])
        }

        async fn get_latest_block(&self) -> Result<RpcBlock, RpcErr> {
            unreachable!("not exercised by this test")
        }
    }

    #[tokio::test]
    async fn log_subscription_passes_its_registered_filter_to_the_reader() {
        let reader = Arc::new(CapturingReader { head: 5, seen: Mutex::new(Vec::new()) });
        let manager = Arc::new(SubscriptionManager::new(reader.clone(), 5, Duration::from_secs(60)));
        let topic = H256::repeat_byte(0x11);
        let event = SubscriptionEvent::Logs {
            address: Some("0x00000000000000000000000000000000000001".to_string()),
            topics: vec![topic],
        };
        manager.subscribe("conn-1", event.clone(), Arc::new(|_| {})).unwrap();
        manager.tick().await;

        let seen = reader.seen.lock().expect("seen mutex poisoned");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], event);
    }

    #[tokio::test]
    async fn fan_out_invokes_every_subscriber_on_the_same_tag() {
        let manager = Arc::new(SubscriptionManager::new(
            Arc::new(FixedReader { head: 1 }),
            5,
            Duration::from_secs(60),
        ));
        let counter = Arc::new(AtomicUsize::new(0));
        let a = Arc::clone(&counter);
        let b = Arc::clone(&counter);
        manager
            .subscribe("conn-1", SubscriptionEvent::NewHeads, Arc::new(move |_| {
                a.fetch_add(1, Ordering::Relaxed);
            }))
            .unwrap();
        manager
            .subscribe("conn-2", SubscriptionEvent::NewHeads, Arc::new(move |_| {
                b.fetch_add(1, Ordering::Relaxed);
            }))
            .unwrap();
        manager.tick().await;
        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }
}
