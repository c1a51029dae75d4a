// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use walletsync_schema::schema::blocks::dsl;

use super::models::BlockRow;
use crate::error::{WalletError, WalletResult};

pub async fn store_blocks(conn: &mut AsyncPgConnection, rows: &[BlockRow]) -> WalletResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    diesel::insert_into(dsl::blocks)
        .values(rows)
        .on_conflict(dsl::hash)
        .do_nothing()
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn latest_block(conn: &mut AsyncPgConnection) -> WalletResult<Option<BlockRow>> {
    match dsl::blocks
        .order(dsl::number.desc())
        .first::<BlockRow>(conn)
        .await
    {
        Ok(row) => Ok(Some(row)),
        Err(diesel::result::Error::NotFound) => Ok(None),
        Err(err) => Err(WalletError::from(err)),
    }
}
