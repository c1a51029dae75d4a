// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, IntCounter, IntCounterVec, IntGauge, Registry,
};

#[derive(Clone, Debug)]
pub struct WalletMetrics {
    /// Height of the last block the synchronizer committed.
    pub synced_block_height: IntGauge,
    /// Flows matched against a tenant registry, by tx_type.
    pub classified_transactions: IntCounterVec,
    /// Tenant batches persisted by the flow processor.
    pub batches_processed: IntCounter,
    /// Broadcast submissions, by worker kind and result.
    pub broadcast_submissions: IntCounterVec,
    /// Webhook deliveries, by result.
    pub webhook_notifications: IntCounterVec,
}

impl WalletMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            synced_block_height: register_int_gauge_with_registry!(
                "walletsync_synced_block_height",
                "Height of the last block committed by the synchronizer",
                registry,
            )
            .unwrap(),
            classified_transactions: register_int_counter_vec_with_registry!(
                "walletsync_classified_transactions",
                "Total transfers classified against tenant registries",
                &["tx_type"],
                registry,
            )
            .unwrap(),
            batches_processed: register_int_counter_with_registry!(
                "walletsync_batches_processed",
                "Total tenant batches persisted by the flow processor",
                registry,
            )
            .unwrap(),
            broadcast_submissions: register_int_counter_vec_with_registry!(
                "walletsync_broadcast_submissions",
                "Total raw transaction submissions",
                &["kind", "result"],
                registry,
            )
            .unwrap(),
            webhook_notifications: register_int_counter_vec_with_registry!(
                "walletsync_webhook_notifications",
                "Total webhook delivery attempts",
                &["result"],
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_testing() -> Self {
        Self::new(&Registry::new())
    }
}
