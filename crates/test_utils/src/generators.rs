//! Property-Based Test Generators
//!
//! proptest strategies for canonical events and retry settings. The contract
//! suite samples `event_batch_strategy` so both stores see generated payloads.

use std::time::Duration;

use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use serde_json::{Map, Value};

use core_kernel::{ChannelId, TenantId};
use domain_commerce::{CanonicalEvent, CanonicalEventType, EventMetadata};
use domain_outbox::RetryPolicy;

/// Well-known event type names plus arbitrary custom ones
pub fn event_type_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => Just(CanonicalEventType::ProductUpdated.as_str().to_string()),
        3 => Just(CanonicalEventType::OrderCreated.as_str().to_string()),
        3 => Just(CanonicalEventType::CustomerSynced.as_str().to_string()),
        1 => "[A-Z][a-zA-Z]{2,24}",
    ]
}

/// Scalar JSON values, including unicode strings
pub fn json_scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "\\PC{0,32}".prop_map(Value::from),
    ]
}

/// Payload objects one level deep
pub fn payload_strategy() -> impl Strategy<Value = Map<String, Value>> {
    btree_map("[a-z_]{1,12}", json_scalar_strategy(), 0..8)
        .prop_map(|fields| fields.into_iter().collect())
}

pub fn canonical_event_strategy() -> impl Strategy<Value = CanonicalEvent> {
    (event_type_strategy(), payload_strategy()).prop_map(|(event_type, data)| {
        CanonicalEvent::new(
            event_type,
            data,
            EventMetadata::new(TenantId::new(), ChannelId::new()),
        )
    })
}

/// Batches of events sized for a single store round trip
pub fn event_batch_strategy(max: usize) -> impl Strategy<Value = Vec<CanonicalEvent>> {
    vec(canonical_event_strategy(), 1..=max.max(1))
}

pub fn retry_policy_strategy() -> impl Strategy<Value = RetryPolicy> {
    (1u32..10, 1u64..5_000, 1u64..600_000).prop_map(|(max_attempts, base_ms, max_ms)| {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(base_ms),
            Duration::from_millis(max_ms.max(base_ms)),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_retry_policies_have_ordered_delays(policy in retry_policy_strategy()) {
            prop_assert!(policy.base_delay <= policy.max_delay);
            prop_assert!(policy.max_attempts >= 1);
        }
    }
}
