// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{classify, BatchCursor, ClassifiedTx, TenantBatch, TenantBatchMap};
use crate::chain::{BlockHeader, ChainAdapter};
use crate::error::{WalletError, WalletResult};
use crate::metrics::WalletMetrics;
use crate::store::{BlockRow, Store};
use crate::types::normalize_hex;

#[derive(Debug, Clone)]
pub struct SynchronizerConfig {
    pub interval: Duration,
    pub blocks_step: u64,
}

/// Pulls header windows from the cursor, classifies every transfer against
/// every tenant's address registry, persists the headers and emits one
/// tenant-keyed batch per cycle.
///
/// The batch channel holds a single slot, so a cycle blocks until the flow
/// processor has consumed the previous batch; the synchronizer naturally
/// paces to its slowest consumer.
pub struct Synchronizer {
    config: SynchronizerConfig,
    client: Arc<dyn ChainAdapter>,
    store: Store,
    cursor: BatchCursor,
    pending: Vec<BlockHeader>,
    batch_tx: mpsc::Sender<TenantBatchMap>,
    metrics: Arc<WalletMetrics>,
}

impl Synchronizer {
    pub fn new(
        config: SynchronizerConfig,
        client: Arc<dyn ChainAdapter>,
        store: Store,
        from: BlockHeader,
        batch_tx: mpsc::Sender<TenantBatchMap>,
        metrics: Arc<WalletMetrics>,
    ) -> Self {
        let cursor = BatchCursor::new(client.clone(), from, config.blocks_step);
        Self {
            config,
            client,
            store,
            cursor,
            pending: Vec::new(),
            batch_tx,
            metrics,
        }
    }

    /// Resolve the first cursor header: highest stored block, else the
    /// configured starting height, else the chain head.
    pub async fn resolve_start_header(
        store: &Store,
        client: &Arc<dyn ChainAdapter>,
        starting_height: Option<u64>,
    ) -> WalletResult<BlockHeader> {
        if let Some(row) = store.latest_block().await? {
            info!(number = row.number, hash = %row.hash, "resuming sync from stored block");
            return Ok(BlockHeader {
                hash: row.hash,
                parent_hash: row.parent_hash,
                number: row.number as u64,
                timestamp: row.timestamp as u64,
            });
        }

        if let Some(height) = starting_height {
            info!(height, "starting sync from configured height");
            return client.block_header(Some(height)).await;
        }

        info!("starting sync from chain head");
        client.block_header(None).await
    }

    pub fn spawn(mut self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("synchronizer cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        self.tick(&cancel).await;
                    }
                }
            }

            // Dropping the sender closes the batch channel, which drains the
            // flow processor.
            info!("shutting down batch producer");
        })
    }

    async fn tick(&mut self, cancel: &CancellationToken) {
        if self.pending.is_empty() {
            match self.cursor.next_headers().await {
                Ok(headers) if headers.is_empty() => {
                    debug!(cursor = self.cursor.position(), "no new headers, syncer at head");
                    return;
                }
                Ok(headers) => self.pending = headers,
                Err(err) => {
                    error!(error = %err, "error querying for headers");
                    return;
                }
            }
        } else {
            info!(blocks = self.pending.len(), "retrying previous batch");
        }

        match self.process_batch(cancel).await {
            Ok(()) => {
                if let Some(last) = self.pending.last().cloned() {
                    self.metrics.synced_block_height.set(last.number as i64);
                    self.cursor.advance(last);
                }
                self.pending.clear();
            }
            Err(err) => {
                error!(error = %err, "failed to process batch, will retry from unchanged cursor");
            }
        }
    }

    async fn process_batch(&mut self, cancel: &CancellationToken) -> WalletResult<()> {
        let headers = self.pending.clone();
        if headers.is_empty() {
            return Ok(());
        }

        let businesses = self.store.business_list().await?;
        let mut registries = HashMap::new();
        for business in &businesses {
            let registry = self.store.address_map(&business.business_uid).await?;
            registries.insert(business.business_uid.clone(), registry);
        }

        let mut batch: TenantBatchMap = HashMap::new();
        let mut block_rows = Vec::with_capacity(headers.len());

        for header in &headers {
            info!(height = header.number, "sync block data");
            block_rows.push(BlockRow {
                hash: header.hash.clone(),
                parent_hash: header.parent_hash.clone(),
                number: header.number as i64,
                timestamp: header.timestamp as i64,
            });

            let tx_list = self.client.block_transactions(header.number).await?;

            for business in &businesses {
                let registry = &registries[&business.business_uid];
                for tx in &tx_list {
                    let from_address = normalize_hex(&tx.from);
                    let to_address = normalize_hex(&tx.to);
                    let from_type = registry.get(&from_address).copied();
                    let to_type = registry.get(&to_address).copied();

                    let Some(tx_type) = classify(from_type, to_type) else {
                        continue;
                    };

                    info!(
                        tx_hash = %tx.hash,
                        business = %business.business_uid,
                        tx_type = %tx_type,
                        "found transaction"
                    );
                    self.metrics
                        .classified_transactions
                        .with_label_values(&[tx_type.as_str()])
                        .inc();

                    let entry = batch
                        .entry(business.business_uid.clone())
                        .or_insert_with(TenantBatch::default);
                    entry.block_height = header.number;
                    entry.transactions.push(ClassifiedTx {
                        business_uid: business.business_uid.clone(),
                        block_number: header.number,
                        block_hash: header.hash.clone(),
                        from_address,
                        to_address,
                        hash: normalize_hex(&tx.hash),
                        token_address: normalize_hex(&tx.token_address),
                        contract_wallet: tx.contract_wallet.clone(),
                        tx_type,
                    });
                }
            }
        }

        self.store.store_blocks(&block_rows).await?;
        debug!(total = block_rows.len(), "stored block headers");

        if !batch.is_empty() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(WalletError::Transient("cancelled while emitting batch".into()));
                }
                sent = self.batch_tx.send(batch) => {
                    sent.map_err(|_| {
                        WalletError::Transient("tenant batch channel closed".into())
                    })?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChainAdapter;
    use crate::chain::BlockTx;

    // Classification against a registry map, exercised the way the
    // synchronizer drives it per tenant.
    #[test]
    fn test_registry_disambiguation() {
        use crate::types::{AddressType, TransactionType};

        let mut registry = HashMap::new();
        registry.insert("0xhot".to_string(), AddressType::Hot);
        registry.insert("0xcold".to_string(), AddressType::Cold);
        registry.insert("0xeoa".to_string(), AddressType::Eoa);

        let lookup = |from: &str, to: &str| {
            classify(
                registry.get(from).copied(),
                registry.get(to).copied(),
            )
        };

        assert_eq!(lookup("0xhot", "0xcold"), Some(TransactionType::Hot2Cold));
        assert_eq!(lookup("0xcold", "0xhot"), Some(TransactionType::Cold2Hot));
        assert_eq!(lookup("0xeoa", "0xhot"), Some(TransactionType::Collection));
        assert_eq!(lookup("0xhot", "0xunknown"), Some(TransactionType::Withdraw));
        assert_eq!(lookup("0xunknown", "0xeoa"), Some(TransactionType::Deposit));
        assert_eq!(lookup("0xunknown", "0xother"), None);
    }

    #[tokio::test]
    async fn test_mock_chain_reports_transfers_in_order() {
        let chain = Arc::new(MockChainAdapter::new());
        chain.extend_chain(3);
        chain.add_transfer(
            2,
            BlockTx {
                hash: "0xh1".into(),
                from: "0xbbbb".into(),
                to: "0xaaaa".into(),
                value: "1000".into(),
                token_address: "0x00".into(),
                contract_wallet: String::new(),
            },
        );

        let txs = chain.block_transactions(2).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].hash, "0xh1");
        assert!(chain.block_transactions(1).await.unwrap().is_empty());
    }
}
