// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use walletsync_schema::schema::addresses::dsl;

use super::models::Address;
use crate::error::{WalletError, WalletResult};
use crate::types::AddressType;

pub async fn store_addresses(conn: &mut AsyncPgConnection, rows: &[Address]) -> WalletResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    diesel::insert_into(dsl::addresses)
        .values(rows)
        .on_conflict((dsl::business_uid, dsl::address))
        .do_nothing()
        .execute(conn)
        .await?;
    Ok(())
}

/// Full address registry of a tenant, keyed by canonical address.
pub async fn address_map(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
) -> WalletResult<HashMap<String, AddressType>> {
    let rows: Vec<Address> = dsl::addresses
        .filter(dsl::business_uid.eq(business_uid))
        .load(conn)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.address, row.address_type))
        .collect())
}

pub async fn address_entry(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
    address: &str,
) -> WalletResult<Option<Address>> {
    match dsl::addresses
        .filter(dsl::business_uid.eq(business_uid))
        .filter(dsl::address.eq(address))
        .first::<Address>(conn)
        .await
    {
        Ok(row) => Ok(Some(row)),
        Err(diesel::result::Error::NotFound) => Ok(None),
        Err(err) => Err(WalletError::from(err)),
    }
}

pub async fn wallet_of_type(
    conn: &mut AsyncPgConnection,
    business_uid: &str,
    address_type: AddressType,
) -> WalletResult<Option<Address>> {
    match dsl::addresses
        .filter(dsl::business_uid.eq(business_uid))
        .filter(dsl::address_type.eq(address_type))
        .first::<Address>(conn)
        .await
    {
        Ok(row) => Ok(Some(row)),
        Err(diesel::result::Error::NotFound) => Ok(None),
        Err(err) => Err(WalletError::from(err)),
    }
}
