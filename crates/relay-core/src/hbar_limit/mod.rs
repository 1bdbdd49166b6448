//! HBAR spending-plan budgeting (§4.4, §3 SpendingPlan).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ethereum_types::Address;
use serde::{Deserialize, Serialize};

use crate::cache::SharedCounterStore;
use crate::context::RequestContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberType {
    Basic,
    Extended,
    Privileged,
    Operator,
}

impl SubscriberType {
    /// Every plan's ceiling, in tinybars, per rolling window.
    pub fn default_limit_tinybars(self) -> u64 {
        match self {
            SubscriberType::Basic => 10_000_000_000,
            SubscriberType::Extended => 100_000_000_000,
            SubscriberType::Privileged => 1_000_000_000_000,
            SubscriberType::Operator => u64::MAX,
        }
    }
}

/// `{plan_id, subscriber_type, limit_tinybars, window_ms, spent_tinybars, window_start}` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingPlan {
    pub plan_id: String,
    pub subscriber_type: SubscriberType,
    pub limit_tinybars: u64,
    pub window_ms: u64,
    pub spent_tinybars: u64,
    pub window_start_ms: u64,
}

impl SpendingPlan {
    pub fn new(plan_id: String, subscriber_type: SubscriberType, window_ms: u64) -> Self {
        Self {
            plan_id,
            limit_tinybars: subscriber_type.default_limit_tinybars(),
            subscriber_type,
            window_ms,
            spent_tinybars: 0,
            window_start_ms: now_ms(),
        }
    }

    /// Rolls the window forward if it has lapsed, resetting `spent_tinybars`.
    fn roll_window(&mut self) {
        let now = now_ms();
        if now.saturating_sub(self.window_start_ms) >= self.window_ms {
            self.spent_tinybars = 0;
            self.window_start_ms = now;
        }
    }

    fn would_exceed(&self, estimated_fee: u64) -> bool {
        self.spent_tinybars.saturating_add(estimated_fee) > self.limit_tinybars
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn plan_key(caller_address: Address) -> String {
    format!("hbarplan:{caller_address:#x}")
}

const DEFAULT_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

/// Resolves and mutates per-caller [`SpendingPlan`]s through the same
/// [`SharedCounterStore`] the cache and rate-limit services use, so plans
/// replicate the same way across process instances (§4.4).
pub struct HbarLimitService {
    store: Arc<dyn SharedCounterStore>,
}

impl HbarLimitService {
    pub fn new(store: Arc<dyn SharedCounterStore>) -> Self {
        Self { store }
    }

    async fn load_plan(&self, caller_address: Address, subscriber_type: SubscriberType) -> SpendingPlan {
        let key = plan_key(caller_address);
        let stored = self
            .store
            .get_value(&key)
            .await
            .and_then(|(bytes, _ttl)| serde_json::from_slice::<SpendingPlan>(&bytes).ok());

        let mut plan = stored.unwrap_or_else(|| {
            SpendingPlan::new(key.clone(), subscriber_type, DEFAULT_WINDOW_MS)
        });
        plan.roll_window();
        plan
    }

    async fn persist_plan(&self, plan: &SpendingPlan) {
        if let Ok(bytes) = serde_json::to_vec(plan) {
            self.store.set_value(&plan.plan_id, bytes, None).await;
        }
    }

    /// Pre-emptive check: refuses the call when the caller has already
    /// spent, or would spend, more than their plan allows. `mode` and
    /// `tx_constructor_name` identify the kind of call for logging; the
    /// limit itself is keyed purely by `caller_address`'s resolved plan.
    pub async fn should_limit(
        &self,
        mode: &str,
        tx_constructor_name: &str,
        caller_address: Address,
        context: &RequestContext,
        subscriber_type: SubscriberType,
        estimated_fee_tinybars: Option<u64>,
    ) -> bool {
        let plan = self.load_plan(caller_address, subscriber_type).await;
        let exceeded = match estimated_fee_tinybars {
            Some(estimate) => plan.would_exceed(estimate),
            None => plan.spent_tinybars >= plan.limit_tinybars,
        };
        if exceeded {
            tracing::warn!(
                request_id = %context.request_id,
                %mode,
                %tx_constructor_name,
                caller = %format!("{caller_address:#x}"),
                "hbar spending plan would be exceeded"
            );
        }
        self.persist_plan(&plan).await;
        exceeded
    }

    /// Post-hoc accounting after a transaction receipt is known (§4.4).
    pub async fn add_expense(
        &self,
        cost_tinybars: u64,
        caller_address: Address,
        subscriber_type: SubscriberType,
    ) {
        let mut plan = self.load_plan(caller_address, subscriber_type).await;
        plan.spent_tinybars = plan.spent_tinybars.saturating_add(cost_tinybars);
        self.persist_plan(&plan).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemorySharedStore;

    fn caller() -> Address {
        "0x1111111111111111111111111111111111111111"
            .parse()
            .unwrap()
    }

    #[tokio::test]
    async fn expense_accumulates_across_calls() {
        let service = HbarLimitService::new(Arc::new(InMemorySharedStore::new()));
        service.add_expense(1_000, caller(), SubscriberType::Basic).await;
        service.add_expense(2_000, caller(), SubscriberType::Basic).await;
        let plan = service.load_plan(caller(), SubscriberType::Basic).await;
        assert_eq!(plan.spent_tinybars, 3_000);
    }

    #[tokio::test]
    async fn preemptive_check_refuses_when_estimate_exceeds_remaining_budget() {
        let service = HbarLimitService::new(Arc::new(InMemorySharedStore::new()));
        let limit = SubscriberType::Basic.default_limit_tinybars();
        service.add_expense(limit - 10, caller(), SubscriberType::Basic).await;
        let context = RequestContext::new("203.0.113.1".parse().unwrap(), "eth_sendRawTransaction");
        let refused = service
            .should_limit(
                "eth_sendRawTransaction",
                "EthereumTransaction",
                caller(),
                &context,
                SubscriberType::Basic,
                Some(20),
            )
            .await;
        assert!(refused);
    }
}
