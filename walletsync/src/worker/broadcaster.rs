// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use bigdecimal::BigDecimal;
use diesel_async::scoped_futures::ScopedFutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chain::ChainAdapter;
use crate::metrics::WalletMetrics;
use crate::retry::{retry_with_backoff, RetryStrategy};
use crate::store::{balances, internals, withdraws, LockEntry, Store};
use crate::types::TransactionType;

/// Which flow table a broadcaster instance scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastKind {
    Withdraw,
    Internal,
}

impl BroadcastKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BroadcastKind::Withdraw => "withdraw",
            BroadcastKind::Internal => "internal",
        }
    }
}

/// A signed row awaiting submission, independent of its source table.
#[derive(Debug, Clone)]
struct PendingBroadcast {
    guid: Uuid,
    tx_type: TransactionType,
    from_address: String,
    token_address: String,
    amount: BigDecimal,
    tx_sign_hex: String,
}

/// Periodically scans signed-but-unsent flows, submits them through the
/// chain-account RPC, reserves the debited amount as locked balance and
/// advances the row status, all lock/status writes in one transaction.
pub struct Broadcaster {
    kind: BroadcastKind,
    store: Store,
    client: Arc<dyn ChainAdapter>,
    interval: Duration,
    retry: RetryStrategy,
    metrics: Arc<WalletMetrics>,
}

impl Broadcaster {
    pub fn new(
        kind: BroadcastKind,
        store: Store,
        client: Arc<dyn ChainAdapter>,
        interval: Duration,
        metrics: Arc<WalletMetrics>,
    ) -> Self {
        Self {
            kind,
            store,
            client,
            interval,
            retry: RetryStrategy::default(),
            metrics,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(kind = self.kind.as_str(), "broadcaster started");
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!(kind = self.kind.as_str(), "broadcaster cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        self.tick(&cancel).await;
                    }
                }
            }
        })
    }

    async fn tick(&self, cancel: &CancellationToken) {
        let businesses = match self.store.business_list().await {
            Ok(list) => list,
            Err(err) => {
                error!(error = %err, "query business list failed");
                return;
            }
        };

        for business in businesses {
            let uid = business.business_uid.clone();
            let pending = match self.unsent_rows(&uid).await {
                Ok(rows) => rows,
                Err(err) => {
                    error!(business = %uid, error = %err, "query unsent list failed");
                    continue;
                }
            };

            if pending.is_empty() {
                debug!(business = %uid, kind = self.kind.as_str(), "no unsent transactions");
                continue;
            }

            let mut locks: Vec<LockEntry> = Vec::new();
            let mut results: Vec<(Uuid, String)> = Vec::new();

            for row in &pending {
                if row.tx_sign_hex.is_empty() {
                    warn!(business = %uid, guid = %row.guid, "skipping row without signed blob");
                    continue;
                }
                // The lock is taken against the flow's debit side; a row
                // whose type has no debit side should never reach here.
                let debit_type = match balances::debit_address_type(row.tx_type) {
                    Ok(address_type) => address_type,
                    Err(err) => {
                        warn!(business = %uid, guid = %row.guid, error = %err, "skipping unbroadcastable row");
                        continue;
                    }
                };
                // A failed submission leaves the row untouched; it is
                // retried on the next tick.
                match self.client.send_tx(&row.tx_sign_hex).await {
                    Ok(tx_hash) => {
                        info!(
                            business = %uid,
                            guid = %row.guid,
                            tx_hash = %tx_hash,
                            kind = self.kind.as_str(),
                            "transaction broadcasted"
                        );
                        self.metrics
                            .broadcast_submissions
                            .with_label_values(&[self.kind.as_str(), "ok"])
                            .inc();
                        locks.push(LockEntry {
                            address: row.from_address.clone(),
                            address_type: debit_type,
                            token_address: row.token_address.clone(),
                            amount: row.amount.clone(),
                        });
                        results.push((row.guid, tx_hash));
                    }
                    Err(err) => {
                        warn!(business = %uid, guid = %row.guid, error = %err, "send transaction failed");
                        self.metrics
                            .broadcast_submissions
                            .with_label_values(&[self.kind.as_str(), "error"])
                            .inc();
                    }
                }
            }

            if results.is_empty() {
                continue;
            }

            let kind = self.kind;
            let store = self.store.clone();
            let persisted = retry_with_backoff(&self.retry, cancel, || {
                let store = store.clone();
                let uid = uid.clone();
                let locks = locks.clone();
                let results = results.clone();
                async move {
                    store
                        .transaction(move |conn| {
                            async move {
                                balances::add_locks(conn, &uid, &locks).await?;
                                match kind {
                                    BroadcastKind::Withdraw => {
                                        withdraws::mark_broadcasted(conn, &uid, &results).await
                                    }
                                    BroadcastKind::Internal => {
                                        internals::mark_broadcasted(conn, &uid, &results).await
                                    }
                                }
                            }
                            .scope_boxed()
                        })
                        .await
                }
            })
            .await;

            if let Err(err) = persisted {
                // The batch re-submits next tick; duplicate tx_hash responses
                // from the RPC must be tolerated.
                error!(business = %uid, error = %err, "unable to persist broadcast batch, aborting tick");
                return;
            }
        }
    }

    async fn unsent_rows(&self, business_uid: &str) -> crate::error::WalletResult<Vec<PendingBroadcast>> {
        match self.kind {
            BroadcastKind::Withdraw => {
                let rows = self.store.unsent_withdraws(business_uid).await?;
                Ok(rows
                    .into_iter()
                    .map(|row| PendingBroadcast {
                        guid: row.guid,
                        tx_type: row.tx_type,
                        from_address: row.from_address,
                        token_address: row.token_address,
                        amount: row.amount,
                        tx_sign_hex: row.tx_sign_hex,
                    })
                    .collect())
            }
            BroadcastKind::Internal => {
                let rows = self.store.unsent_internals(business_uid).await?;
                Ok(rows
                    .into_iter()
                    .map(|row| PendingBroadcast {
                        guid: row.guid,
                        tx_type: row.tx_type,
                        from_address: row.from_address,
                        token_address: row.token_address,
                        amount: row.amount,
                        tx_sign_hex: row.tx_sign_hex,
                    })
                    .collect())
            }
        }
    }
}
