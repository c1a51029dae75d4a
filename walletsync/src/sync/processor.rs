// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use bigdecimal::BigDecimal;
use diesel_async::scoped_futures::ScopedFutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{ClassifiedTx, TenantBatchMap};
use crate::chain::{ChainAdapter, TxMessage};
use crate::error::WalletResult;
use crate::metrics::WalletMetrics;
use crate::retry::{retry_with_backoff, RetryStrategy};
use crate::store::{
    balances, deposits, internals, transactions, withdraws, BalanceDelta, Deposit, Store,
    TransactionRow,
};
use crate::types::{now_ts, TokenType, TransactionType, TxStatus};

/// Rows accumulated for one tenant batch before the transactional write.
#[derive(Debug, Default)]
struct BatchRows {
    deposits: Vec<Deposit>,
    withdraw_hashes: Vec<String>,
    internal_hashes: Vec<String>,
    balances: Vec<BalanceDelta>,
    transactions: Vec<TransactionRow>,
}

/// Consumes tenant batches from the synchronizer channel and persists typed
/// flow rows, confirmation updates, balance deltas and the canonical
/// transaction log, one database transaction per tenant batch.
pub struct FlowProcessor {
    store: Store,
    client: Arc<dyn ChainAdapter>,
    confirmations: u64,
    retry: RetryStrategy,
    batch_rx: mpsc::Receiver<TenantBatchMap>,
    metrics: Arc<WalletMetrics>,
}

impl FlowProcessor {
    pub fn new(
        store: Store,
        client: Arc<dyn ChainAdapter>,
        confirmations: u64,
        batch_rx: mpsc::Receiver<TenantBatchMap>,
        metrics: Arc<WalletMetrics>,
    ) -> Self {
        Self {
            store,
            client,
            confirmations,
            retry: RetryStrategy::default(),
            batch_rx,
            metrics,
        }
    }

    pub fn spawn(mut self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("flow processor started");
            // The loop ends when the synchronizer closes the channel on
            // shutdown, so in-flight batches drain before exit.
            while let Some(batch) = self.batch_rx.recv().await {
                debug!(tenants = batch.len(), "received tenant batch");
                if let Err(err) = self.handle_batch(&cancel, batch).await {
                    error!(error = %err, "failed to handle batch, stopping flow processor");
                    cancel.cancel();
                    break;
                }
            }
            info!("flow processor drained");
        })
    }

    async fn handle_batch(
        &self,
        cancel: &CancellationToken,
        batch: TenantBatchMap,
    ) -> WalletResult<()> {
        for (business_uid, tenant_batch) in batch {
            info!(
                business = %business_uid,
                chain_latest_block = tenant_batch.block_height,
                txn = tenant_batch.transactions.len(),
                "handle business flow"
            );

            let head = tenant_batch.block_height;
            let txs = Arc::new(tenant_batch.transactions);
            let store = self.store.clone();
            let client = self.client.clone();
            let confirmations = self.confirmations;

            retry_with_backoff(&self.retry, cancel, || {
                let store = store.clone();
                let client = client.clone();
                let txs = txs.clone();
                let business_uid = business_uid.clone();
                async move {
                    // Canonical details come from the chain-account service;
                    // a failed lookup fails the whole batch so the retry
                    // wrapper re-runs it from scratch.
                    let mut rows = BatchRows::default();
                    for tx in txs.iter() {
                        let msg = client.transaction_by_hash(&tx.hash).await?;
                        append_rows(&mut rows, &business_uid, tx, &msg);
                    }

                    store
                        .transaction(move |conn| {
                            async move {
                                deposits::store_deposits(conn, &rows.deposits).await?;
                                deposits::update_confirms(
                                    conn,
                                    &business_uid,
                                    head,
                                    confirmations,
                                )
                                .await?;
                                balances::apply_deltas(conn, &business_uid, &rows.balances)
                                    .await?;
                                withdraws::update_status_by_tx_hash(
                                    conn,
                                    &business_uid,
                                    TxStatus::WalletDone,
                                    &rows.withdraw_hashes,
                                )
                                .await?;
                                internals::update_status_by_tx_hash(
                                    conn,
                                    &business_uid,
                                    TxStatus::WalletDone,
                                    &rows.internal_hashes,
                                )
                                .await?;
                                transactions::store_transactions(conn, &rows.transactions).await?;
                                Ok(())
                            }
                            .scope_boxed()
                        })
                        .await
                }
            })
            .await?;

            self.metrics.batches_processed.inc();
        }
        Ok(())
    }
}

fn parse_amount(value: &str) -> BigDecimal {
    match value.parse::<BigDecimal>() {
        Ok(amount) => amount,
        Err(_) => {
            warn!(value, "unparseable amount, treating as zero");
            BigDecimal::from(0)
        }
    }
}

fn token_type_for(token_address: &str) -> TokenType {
    if token_address.is_empty() || token_address == "0x00" {
        TokenType::Eth
    } else {
        TokenType::Erc20
    }
}

/// Expand one classified transfer into its persistent rows.
///
/// Deposits are inserted on first sighting; withdraws and internals were
/// created by the business services, so observing them on-chain only advances
/// their status by tx hash. Every accepted flow lands in the canonical
/// transaction log and contributes a balance delta.
fn append_rows(rows: &mut BatchRows, business_uid: &str, tx: &ClassifiedTx, msg: &TxMessage) {
    let amount = parse_amount(msg.primary_value());
    let fee = parse_amount(&msg.fee);

    rows.balances.push(BalanceDelta {
        from_address: tx.from_address.clone(),
        to_address: tx.to_address.clone(),
        token_address: tx.token_address.clone(),
        amount: amount.clone(),
        tx_type: tx.tx_type,
    });

    rows.transactions.push(TransactionRow {
        guid: Uuid::new_v4(),
        business_uid: business_uid.to_string(),
        block_hash: tx.block_hash.clone(),
        block_number: tx.block_number as i64,
        hash: tx.hash.clone(),
        from_address: tx.from_address.clone(),
        to_address: tx.to_address.clone(),
        token_address: tx.token_address.clone(),
        token_id: "0x00".to_string(),
        token_meta: "0x00".to_string(),
        fee,
        amount: amount.clone(),
        status: msg.status.clone(),
        tx_type: tx.tx_type,
        timestamp: now_ts(),
    });

    match tx.tx_type {
        TransactionType::Deposit => rows.deposits.push(Deposit {
            guid: Uuid::new_v4(),
            business_uid: business_uid.to_string(),
            timestamp: now_ts(),
            status: TxStatus::Broadcasted,
            confirms: 0,
            block_hash: tx.block_hash.clone(),
            block_number: tx.block_number as i64,
            tx_hash: tx.hash.clone(),
            tx_type: tx.tx_type,
            from_address: tx.from_address.clone(),
            to_address: tx.to_address.clone(),
            amount,
            gas_limit: 0,
            max_fee_per_gas: msg.fee.clone(),
            max_priority_fee_per_gas: String::new(),
            token_type: token_type_for(&tx.token_address),
            token_address: tx.token_address.clone(),
            token_id: "0x00".to_string(),
            token_meta: "0x00".to_string(),
            tx_sign_hex: String::new(),
        }),
        TransactionType::Withdraw => rows.withdraw_hashes.push(tx.hash.clone()),
        TransactionType::Collection | TransactionType::Hot2Cold | TransactionType::Cold2Hot => {
            rows.internal_hashes.push(tx.hash.clone())
        }
        TransactionType::Unknown => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::TxValue;

    fn classified(tx_type: TransactionType) -> ClassifiedTx {
        ClassifiedTx {
            business_uid: "b1".into(),
            block_number: 100,
            block_hash: "0xblock0100".into(),
            from_address: "0xbbbb".into(),
            to_address: "0xaaaa".into(),
            hash: "0xh1".into(),
            token_address: "0x00".into(),
            contract_wallet: String::new(),
            tx_type,
        }
    }

    fn message(value: &str) -> TxMessage {
        TxMessage {
            hash: "0xh1".into(),
            from_address: "0xbbbb".into(),
            to_address: "0xaaaa".into(),
            values: vec![TxValue {
                address: "0xaaaa".into(),
                value: value.into(),
            }],
            fee: "21000".into(),
            status: "Success".into(),
            block_number: Some(100),
        }
    }

    #[test]
    fn test_deposit_produces_flow_row_and_delta() {
        let mut rows = BatchRows::default();
        append_rows(&mut rows, "b1", &classified(TransactionType::Deposit), &message("1000"));

        assert_eq!(rows.deposits.len(), 1);
        let deposit = &rows.deposits[0];
        assert_eq!(deposit.status, TxStatus::Broadcasted);
        assert_eq!(deposit.confirms, 0);
        assert_eq!(deposit.amount, BigDecimal::from(1000u64));
        assert_eq!(deposit.block_number, 100);
        assert_eq!(deposit.token_type, TokenType::Eth);

        assert_eq!(rows.balances.len(), 1);
        assert_eq!(rows.transactions.len(), 1);
        assert!(rows.withdraw_hashes.is_empty());
        assert!(rows.internal_hashes.is_empty());
    }

    #[test]
    fn test_withdraw_only_updates_by_hash() {
        let mut rows = BatchRows::default();
        append_rows(
            &mut rows,
            "b1",
            &classified(TransactionType::Withdraw),
            &message("500"),
        );

        assert!(rows.deposits.is_empty());
        assert_eq!(rows.withdraw_hashes, vec!["0xh1".to_string()]);
        assert_eq!(rows.balances.len(), 1);
        assert_eq!(rows.transactions.len(), 1);
    }

    #[test]
    fn test_internal_kinds_collect_by_hash() {
        for tx_type in [
            TransactionType::Collection,
            TransactionType::Hot2Cold,
            TransactionType::Cold2Hot,
        ] {
            let mut rows = BatchRows::default();
            append_rows(&mut rows, "b1", &classified(tx_type), &message("7"));
            assert_eq!(rows.internal_hashes, vec!["0xh1".to_string()]);
            assert!(rows.deposits.is_empty());
            assert!(rows.withdraw_hashes.is_empty());
        }
    }

    #[test]
    fn test_unparseable_amount_defaults_to_zero() {
        let mut rows = BatchRows::default();
        append_rows(
            &mut rows,
            "b1",
            &classified(TransactionType::Deposit),
            &message("not-a-number"),
        );
        assert_eq!(rows.deposits[0].amount, BigDecimal::from(0));
    }

    #[test]
    fn test_token_transfer_is_tagged_erc20() {
        let mut tx = classified(TransactionType::Deposit);
        tx.token_address = "0x1111111111111111111111111111111111111111".into();
        let mut rows = BatchRows::default();
        append_rows(&mut rows, "b1", &tx, &message("9"));
        assert_eq!(rows.deposits[0].token_type, TokenType::Erc20);
    }
}
