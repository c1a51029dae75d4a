// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use walletsync_schema::schema::transactions::dsl;

use super::models::TransactionRow;
use crate::error::{WalletError, WalletResult};

pub async fn store_transactions(
    conn: &mut AsyncPgConnection,
    rows: &[TransactionRow],
) -> WalletResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    diesel::insert_into(dsl::transactions)
        .values(rows)
        .on_conflict((dsl::business_uid, dsl::hash))
        .do_nothing()
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn transaction_by_hash(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
    hash: &str,
) -> WalletResult<Option<TransactionRow>> {
    match dsl::transactions
        .filter(dsl::business_uid.eq(business_uid))
        .filter(dsl::hash.eq(hash))
        .first::<TransactionRow>(conn)
        .await
    {
        Ok(row) => Ok(Some(row)),
        Err(diesel::result::Error::NotFound) => Ok(None),
        Err(err) => Err(WalletError::from(err)),
    }
}
