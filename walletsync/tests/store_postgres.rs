// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

//! Store-level flow tests against a real Postgres instance.
//!
//! Run with: TEST_DATABASE_URL=postgres://... cargo test -- --ignored

use bigdecimal::BigDecimal;
use url::Url;
use uuid::Uuid;

use walletsync::notifier::build_notify_request;
use walletsync::store::{
    addresses, balances, blocks, business, deposits, withdraws, Address, BalanceDelta, BlockRow,
    Business, Deposit, LockEntry, Store, Withdraw,
};
use walletsync::types::{now_ts, AddressType, TokenType, TransactionType, TxStatus};
use walletsync_pg_db::{Db, DbArgs};

async fn test_store() -> Store {
    let database_url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL environment variable must be set");
    let url: Url = database_url.parse().expect("invalid database URL");
    let db = Db::new(url, DbArgs::default()).await.expect("connect");
    db.run_migrations().await.expect("migrate");
    Store::new(db)
}

fn unique_uid(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

fn deposit_row(business_uid: &str, tx_hash: &str, block_number: i64, amount: u64) -> Deposit {
    Deposit {
        guid: Uuid::new_v4(),
        business_uid: business_uid.to_string(),
        timestamp: now_ts(),
        status: TxStatus::Broadcasted,
        confirms: 0,
        block_hash: "0xblockhash".into(),
        block_number,
        tx_hash: tx_hash.to_string(),
        tx_type: TransactionType::Deposit,
        from_address: "0xbbbb".into(),
        to_address: "0xaaaa".into(),
        amount: BigDecimal::from(amount),
        gas_limit: 0,
        max_fee_per_gas: "21000".into(),
        max_priority_fee_per_gas: String::new(),
        token_type: TokenType::Eth,
        token_address: "0x00".into(),
        token_id: "0x00".into(),
        token_meta: "0x00".into(),
        tx_sign_hex: String::new(),
    }
}

#[tokio::test]
#[ignore] // Requires TEST_DATABASE_URL
async fn test_deposit_happy_path() {
    let store = test_store().await;
    let uid = unique_uid("b1");
    let mut conn = store.conn().await.unwrap();

    business::store_business(
        &mut conn,
        &Business {
            guid: Uuid::new_v4(),
            business_uid: uid.clone(),
            notify_url: "http://x/cb".into(),
            timestamp: now_ts(),
        },
    )
    .await
    .unwrap();

    addresses::store_addresses(
        &mut conn,
        &[Address {
            guid: Uuid::new_v4(),
            business_uid: uid.clone(),
            address: "0xaaaa".into(),
            address_type: AddressType::Eoa,
            public_key: "0x04deadbeef".into(),
            timestamp: now_ts(),
        }],
    )
    .await
    .unwrap();

    blocks::store_blocks(
        &mut conn,
        &[BlockRow {
            hash: format!("0xblock_{uid}"),
            parent_hash: "0xparent".into(),
            number: 100,
            timestamp: now_ts(),
        }],
    )
    .await
    .unwrap();

    // First sighting at height 100.
    deposits::store_deposits(&mut conn, &[deposit_row(&uid, "0xh1", 100, 1000)])
        .await
        .unwrap();

    // Head at 101: one confirmation, still broadcasted.
    deposits::update_confirms(&mut conn, &uid, 101, 3).await.unwrap();
    let rows = deposits::notify_list(&mut conn, &uid).await.unwrap();
    assert!(rows.is_empty(), "not confirmed yet");

    // Head reaches 103: threshold met.
    deposits::update_confirms(&mut conn, &uid, 103, 3).await.unwrap();
    let rows = deposits::notify_list(&mut conn, &uid).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, TxStatus::WalletDone);
    assert_eq!(rows[0].confirms, 3);

    // Balance credit on the EOA.
    balances::apply_deltas(
        &mut conn,
        &uid,
        &[BalanceDelta {
            from_address: "0xbbbb".into(),
            to_address: "0xaaaa".into(),
            token_address: "0x00".into(),
            amount: BigDecimal::from(1000u64),
            tx_type: TransactionType::Deposit,
        }],
    )
    .await
    .unwrap();
    let balance = balances::balance_of(&mut conn, &uid, "0xaaaa", "0x00")
        .await
        .unwrap()
        .expect("balance row created");
    assert_eq!(balance.balance, BigDecimal::from(1000u64));

    // Re-ingesting the same tx hash must not double-credit the flow row.
    deposits::store_deposits(&mut conn, &[deposit_row(&uid, "0xh1", 100, 1000)])
        .await
        .unwrap();
    let rows = deposits::notify_list(&mut conn, &uid).await.unwrap();
    assert_eq!(rows.len(), 1, "idempotent on (tenant, tx_hash)");

    // Webhook payload carries the confirmed deposit.
    let request = build_notify_request(&rows, &[], &[]);
    assert_eq!(request.txn.len(), 1);
    assert_eq!(request.txn[0].hash, "0xh1");
    assert_eq!(request.txn[0].value, "1000");
    assert_eq!(request.txn[0].confirms, 3);

    // Before-phase, then acknowledged delivery.
    let hashes = vec!["0xh1".to_string()];
    deposits::update_status_by_tx_hash(&mut conn, &uid, TxStatus::Notified, &hashes)
        .await
        .unwrap();
    deposits::update_status_by_tx_hash(&mut conn, &uid, TxStatus::Success, &hashes)
        .await
        .unwrap();
    let rows = deposits::notify_list(&mut conn, &uid).await.unwrap();
    assert!(rows.is_empty(), "successful rows leave the notify set");

    // Re-processing the same block after acknowledgement must not drag the
    // row back to wallet_done.
    deposits::update_status_by_tx_hash(&mut conn, &uid, TxStatus::WalletDone, &hashes)
        .await
        .unwrap();
    let rows = deposits::notify_list(&mut conn, &uid).await.unwrap();
    assert!(rows.is_empty(), "acknowledged rows never regress");
}

#[tokio::test]
#[ignore] // Requires TEST_DATABASE_URL
async fn test_withdraw_broadcast_locks_balance() {
    let store = test_store().await;
    let uid = unique_uid("b2");
    let mut conn = store.conn().await.unwrap();

    let withdraw = Withdraw {
        guid: Uuid::new_v4(),
        business_uid: uid.clone(),
        timestamp: now_ts(),
        status: TxStatus::CreateUnsigned,
        confirms: 0,
        block_hash: String::new(),
        block_number: 0,
        tx_hash: String::new(),
        tx_type: TransactionType::Withdraw,
        from_address: "0xhot".into(),
        to_address: "0xdest".into(),
        amount: BigDecimal::from(500u64),
        gas_limit: 60_000,
        max_fee_per_gas: "13000000000".into(),
        max_priority_fee_per_gas: "6000000000".into(),
        token_type: TokenType::Eth,
        token_address: "0x00".into(),
        token_id: "0x00".into(),
        token_meta: "0x00".into(),
        tx_sign_hex: "0xdead".into(),
    };
    withdraws::store_withdraw(&mut conn, &withdraw).await.unwrap();

    // The broadcaster scans it while unsent.
    let unsent = withdraws::unsent_list(&mut conn, &uid).await.unwrap();
    assert_eq!(unsent.len(), 1);
    assert_eq!(unsent[0].tx_sign_hex, "0xdead");

    // Submission succeeded: persist lock and status in one transaction's
    // worth of updates.
    balances::add_locks(
        &mut conn,
        &uid,
        &[LockEntry {
            address: "0xhot".into(),
            address_type: AddressType::Hot,
            token_address: "0x00".into(),
            amount: BigDecimal::from(500u64),
        }],
    )
    .await
    .unwrap();
    withdraws::mark_broadcasted(&mut conn, &uid, &[(withdraw.guid, "0xh2".to_string())])
        .await
        .unwrap();

    let row = withdraws::withdraw_by_id(&mut conn, &uid, withdraw.guid)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, TxStatus::Broadcasted);
    assert_eq!(row.tx_hash, "0xh2");
    let unsent = withdraws::unsent_list(&mut conn, &uid).await.unwrap();
    assert!(unsent.is_empty(), "broadcasted rows leave the unsent set");

    let lock = balances::balance_of(&mut conn, &uid, "0xhot", "0x00")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lock.lock_balance, BigDecimal::from(500u64));

    // Later observed on-chain: the withdraw delta debits and settles the lock.
    balances::apply_deltas(
        &mut conn,
        &uid,
        &[BalanceDelta {
            from_address: "0xhot".into(),
            to_address: "0xdest".into(),
            token_address: "0x00".into(),
            amount: BigDecimal::from(500u64),
            tx_type: TransactionType::Withdraw,
        }],
    )
    .await
    .unwrap();
    let settled = balances::balance_of(&mut conn, &uid, "0xhot", "0x00")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(settled.lock_balance, BigDecimal::from(0));
}

#[tokio::test]
#[ignore] // Requires TEST_DATABASE_URL
async fn test_notifier_failure_rolls_back_to_wallet_done() {
    let store = test_store().await;
    let uid = unique_uid("b3");
    let mut conn = store.conn().await.unwrap();

    deposits::store_deposits(
        &mut conn,
        &[
            deposit_row(&uid, "0xn1", 100, 10),
            deposit_row(&uid, "0xn2", 100, 20),
        ],
    )
    .await
    .unwrap();
    deposits::update_confirms(&mut conn, &uid, 110, 3).await.unwrap();

    let rows = deposits::notify_list(&mut conn, &uid).await.unwrap();
    assert_eq!(rows.len(), 2);
    let hashes: Vec<String> = rows.iter().map(|r| r.tx_hash.clone()).collect();

    // Before-phase flips to notified; the webhook then fails with HTTP 500,
    // so the after-phase reverts.
    deposits::update_status_by_tx_hash(&mut conn, &uid, TxStatus::Notified, &hashes)
        .await
        .unwrap();
    deposits::update_status_by_tx_hash(&mut conn, &uid, TxStatus::WalletDone, &hashes)
        .await
        .unwrap();

    let rows = deposits::notify_list(&mut conn, &uid).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.status == TxStatus::WalletDone));
}

#[tokio::test]
#[ignore] // Requires TEST_DATABASE_URL
async fn test_internal_lock_creates_correctly_typed_balance_row() {
    let store = test_store().await;
    let uid = unique_uid("b4");
    let mut conn = store.conn().await.unwrap();

    // First lock ever against this (address, token) pair: the created row
    // must carry the debit side's wallet type, not a blanket default.
    let cold_lock = LockEntry {
        address: "0xcold".into(),
        address_type: balances::debit_address_type(TransactionType::Cold2Hot).unwrap(),
        token_address: "0x00".into(),
        amount: BigDecimal::from(700u64),
    };
    balances::add_locks(&mut conn, &uid, std::slice::from_ref(&cold_lock))
        .await
        .unwrap();

    let row = balances::balance_of(&mut conn, &uid, "0xcold", "0x00")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.address_type, AddressType::Cold);
    assert_eq!(row.lock_balance, BigDecimal::from(700u64));

    let eoa_lock = LockEntry {
        address: "0xeoa".into(),
        address_type: balances::debit_address_type(TransactionType::Collection).unwrap(),
        token_address: "0x00".into(),
        amount: BigDecimal::from(30u64),
    };
    balances::add_locks(&mut conn, &uid, std::slice::from_ref(&eoa_lock))
        .await
        .unwrap();

    let row = balances::balance_of(&mut conn, &uid, "0xeoa", "0x00")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.address_type, AddressType::Eoa);
    assert_eq!(row.lock_balance, BigDecimal::from(30u64));
}
