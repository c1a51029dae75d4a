// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

//! Webhook notifier: collects confirmed flows per tenant, delivers one
//! payload to the tenant's callback URL and advances row status in two
//! phases so a crash mid-delivery never loses a notification.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use diesel_async::scoped_futures::ScopedFutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::WalletResult;
use crate::metrics::WalletMetrics;
use crate::retry::{retry_with_backoff, RetryStrategy};
use crate::store::{deposits, internals, withdraws, Business, Deposit, Internal, Store, Withdraw};
use crate::types::TxStatus;

pub mod client;

pub use client::{NotifyClient, NotifyRequest, NotifyResponse, NotifyTransaction};

pub const NOTIFY_INTERVAL: Duration = Duration::from_secs(5);

pub struct Notifier {
    store: Store,
    clients: HashMap<String, NotifyClient>,
    retry: RetryStrategy,
    metrics: Arc<WalletMetrics>,
}

impl Notifier {
    pub fn new(store: Store, metrics: Arc<WalletMetrics>) -> Self {
        Self {
            store,
            clients: HashMap::new(),
            retry: RetryStrategy::default(),
            metrics,
        }
    }

    pub fn spawn(mut self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("notifier started");
            let mut interval = tokio::time::interval(NOTIFY_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("notifier cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        self.tick(&cancel).await;
                    }
                }
            }
        })
    }

    async fn tick(&mut self, cancel: &CancellationToken) {
        let businesses = match self.store.business_list().await {
            Ok(list) => list,
            Err(err) => {
                error!(error = %err, "query business list failed");
                return;
            }
        };

        for business in businesses {
            // One tenant failing does not block the others.
            if let Err(err) = self.notify_business(cancel, &business).await {
                error!(business = %business.business_uid, error = %err, "notify cycle failed");
            }
        }
    }

    async fn notify_business(
        &mut self,
        cancel: &CancellationToken,
        business: &Business,
    ) -> WalletResult<()> {
        let uid = business.business_uid.clone();

        let need_deposits = self.store.notify_deposits(&uid).await?;
        let need_withdraws = self.store.notify_withdraws(&uid).await?;
        let need_internals = self.store.notify_internals(&uid).await?;

        if need_deposits.is_empty() && need_withdraws.is_empty() && need_internals.is_empty() {
            debug!(business = %uid, "nothing to notify");
            return Ok(());
        }

        let request = build_notify_request(&need_deposits, &need_withdraws, &need_internals);
        let deposit_hashes = tx_hashes(need_deposits.iter().map(|d| d.tx_hash.as_str()));
        let withdraw_hashes = tx_hashes(need_withdraws.iter().map(|w| w.tx_hash.as_str()));
        let internal_hashes = tx_hashes(need_internals.iter().map(|i| i.tx_hash.as_str()));

        // Before-phase: flip everything we are about to send to `notified` so
        // a concurrent tick cannot re-send it mid-HTTP.
        self.update_status(
            cancel,
            &uid,
            TxStatus::Notified,
            &deposit_hashes,
            &withdraw_hashes,
            &internal_hashes,
        )
        .await?;

        let success = {
            let client = self.client_for(&uid, &business.notify_url)?;
            match client.business_notify(&request).await {
                Ok(acknowledged) => acknowledged,
                Err(err) => {
                    warn!(business = %uid, error = %err, "notify business platform failed");
                    false
                }
            }
        };

        self.metrics
            .webhook_notifications
            .with_label_values(&[if success { "ok" } else { "error" }])
            .inc();

        // After-phase: acknowledge or roll back to `wallet_done` so the next
        // tick re-attempts delivery.
        let after_status = if success {
            TxStatus::Success
        } else {
            TxStatus::WalletDone
        };
        self.update_status(
            cancel,
            &uid,
            after_status,
            &deposit_hashes,
            &withdraw_hashes,
            &internal_hashes,
        )
        .await?;

        info!(
            business = %uid,
            txn = request.txn.len(),
            success,
            "notification cycle complete"
        );
        Ok(())
    }

    fn client_for(&mut self, uid: &str, notify_url: &str) -> WalletResult<&NotifyClient> {
        if !self.clients.contains_key(uid) {
            let client = NotifyClient::new(notify_url)?;
            self.clients.insert(uid.to_string(), client);
        }
        Ok(self.clients.get(uid).expect("client just inserted"))
    }

    async fn update_status(
        &self,
        cancel: &CancellationToken,
        business_uid: &str,
        status: TxStatus,
        deposit_hashes: &[String],
        withdraw_hashes: &[String],
        internal_hashes: &[String],
    ) -> WalletResult<()> {
        let store = self.store.clone();
        retry_with_backoff(&self.retry, cancel, || {
            let store = store.clone();
            let business_uid = business_uid.to_string();
            let deposit_hashes = deposit_hashes.to_vec();
            let withdraw_hashes = withdraw_hashes.to_vec();
            let internal_hashes = internal_hashes.to_vec();
            async move {
                store
                    .transaction(move |conn| {
                        async move {
                            deposits::update_status_by_tx_hash(
                                conn,
                                &business_uid,
                                status,
                                &deposit_hashes,
                            )
                            .await?;
                            withdraws::update_status_by_tx_hash(
                                conn,
                                &business_uid,
                                status,
                                &withdraw_hashes,
                            )
                            .await?;
                            internals::update_status_by_tx_hash(
                                conn,
                                &business_uid,
                                status,
                                &internal_hashes,
                            )
                            .await
                        }
                        .scope_boxed()
                    })
                    .await
            }
        })
        .await
    }
}

fn tx_hashes<'a>(iter: impl Iterator<Item = &'a str>) -> Vec<String> {
    iter.filter(|hash| !hash.is_empty())
        .map(str::to_string)
        .collect()
}

/// Assemble the webhook payload for one tenant. Deposits report their
/// confirmation count; outbound flows always report zero.
pub fn build_notify_request(
    deposits: &[Deposit],
    withdraws: &[Withdraw],
    internals: &[Internal],
) -> NotifyRequest {
    let mut txn = Vec::with_capacity(deposits.len() + withdraws.len() + internals.len());

    for deposit in deposits {
        txn.push(NotifyTransaction {
            block_hash: deposit.block_hash.clone(),
            block_number: deposit.block_number.to_string(),
            hash: deposit.tx_hash.clone(),
            from_address: deposit.from_address.clone(),
            to_address: deposit.to_address.clone(),
            value: deposit.amount.to_string(),
            fee: deposit.max_fee_per_gas.clone(),
            tx_type: deposit.tx_type,
            confirms: deposit.confirms as u8,
            token_address: deposit.token_address.clone(),
            token_id: deposit.token_id.clone(),
            token_meta: deposit.token_meta.clone(),
        });
    }

    for withdraw in withdraws {
        txn.push(NotifyTransaction {
            block_hash: withdraw.block_hash.clone(),
            block_number: withdraw.block_number.to_string(),
            hash: withdraw.tx_hash.clone(),
            from_address: withdraw.from_address.clone(),
            to_address: withdraw.to_address.clone(),
            value: withdraw.amount.to_string(),
            fee: withdraw.max_fee_per_gas.clone(),
            tx_type: withdraw.tx_type,
            confirms: 0,
            token_address: withdraw.token_address.clone(),
            token_id: withdraw.token_id.clone(),
            token_meta: withdraw.token_meta.clone(),
        });
    }

    for internal in internals {
        txn.push(NotifyTransaction {
            block_hash: internal.block_hash.clone(),
            block_number: internal.block_number.to_string(),
            hash: internal.tx_hash.clone(),
            from_address: internal.from_address.clone(),
            to_address: internal.to_address.clone(),
            value: internal.amount.to_string(),
            fee: internal.max_fee_per_gas.clone(),
            tx_type: internal.tx_type,
            confirms: 0,
            token_address: internal.token_address.clone(),
            token_id: internal.token_id.clone(),
            token_meta: internal.token_meta.clone(),
        });
    }

    NotifyRequest { txn }
}
