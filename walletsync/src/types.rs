// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::io::Write;

use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;

use crate::error::WalletError;

/// Seconds since the unix epoch, the timestamp unit used across all tables.
pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Canonical form for addresses and hashes: lowercased hex with 0x prefix.
pub fn normalize_hex(value: &str) -> String {
    let lower = value.trim().to_ascii_lowercase();
    if lower.starts_with("0x") {
        lower
    } else {
        format!("0x{lower}")
    }
}

/// Status shared by the deposit, withdraw and internal lifecycles.
/// Transitions are monotonic; no state ever regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
pub enum TxStatus {
    CreateUnsigned,
    Signed,
    Broadcasted,
    WalletDone,
    Notified,
    Success,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::CreateUnsigned => "create_unsigned",
            TxStatus::Signed => "signed",
            TxStatus::Broadcasted => "broadcasted",
            TxStatus::WalletDone => "wallet_done",
            TxStatus::Notified => "notified",
            TxStatus::Success => "success",
        }
    }

    pub fn parse(s: &str) -> Result<Self, WalletError> {
        match s {
            "create_unsigned" => Ok(TxStatus::CreateUnsigned),
            "signed" => Ok(TxStatus::Signed),
            "broadcasted" => Ok(TxStatus::Broadcasted),
            "wallet_done" => Ok(TxStatus::WalletDone),
            "notified" => Ok(TxStatus::Notified),
            "success" => Ok(TxStatus::Success),
            other => Err(WalletError::Validation(format!("invalid tx status: {other}"))),
        }
    }

    /// Position along the lifecycle DAG.
    pub fn rank(&self) -> u8 {
        match self {
            TxStatus::CreateUnsigned => 0,
            TxStatus::Signed => 1,
            TxStatus::Broadcasted => 2,
            TxStatus::WalletDone => 3,
            TxStatus::Notified => 4,
            TxStatus::Success => 5,
        }
    }

    pub fn all() -> [TxStatus; 6] {
        [
            TxStatus::CreateUnsigned,
            TxStatus::Signed,
            TxStatus::Broadcasted,
            TxStatus::WalletDone,
            TxStatus::Notified,
            TxStatus::Success,
        ]
    }

    /// Statuses a row may hold immediately before moving to `self`.
    ///
    /// Transitions only move forward along the rank order; the one sanctioned
    /// regression is `notified -> wallet_done`, the notifier's rollback after
    /// a failed delivery. Status updates filter on this set so a re-ingested
    /// or already-acknowledged row is never pulled backwards.
    pub fn prior_statuses(&self) -> Vec<TxStatus> {
        let mut prior: Vec<TxStatus> = TxStatus::all()
            .into_iter()
            .filter(|status| status.rank() < self.rank())
            .collect();
        if *self == TxStatus::WalletDone {
            prior.push(TxStatus::Notified);
        }
        prior
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
pub enum AddressType {
    Eoa,
    Hot,
    Cold,
}

impl AddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::Eoa => "eoa",
            AddressType::Hot => "hot",
            AddressType::Cold => "cold",
        }
    }

    pub fn parse(s: &str) -> Result<Self, WalletError> {
        match s.to_ascii_lowercase().as_str() {
            "eoa" => Ok(AddressType::Eoa),
            "hot" => Ok(AddressType::Hot),
            "cold" => Ok(AddressType::Cold),
            other => Err(WalletError::Validation(format!(
                "invalid address type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
pub enum TransactionType {
    Unknown,
    Deposit,
    Withdraw,
    Collection,
    Hot2Cold,
    Cold2Hot,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Unknown => "unknown",
            TransactionType::Deposit => "deposit",
            TransactionType::Withdraw => "withdraw",
            TransactionType::Collection => "collection",
            TransactionType::Hot2Cold => "hot2cold",
            TransactionType::Cold2Hot => "cold2hot",
        }
    }

    pub fn parse(s: &str) -> Result<Self, WalletError> {
        match s.to_ascii_lowercase().as_str() {
            "deposit" => Ok(TransactionType::Deposit),
            "withdraw" => Ok(TransactionType::Withdraw),
            "collection" => Ok(TransactionType::Collection),
            "hot2cold" => Ok(TransactionType::Hot2Cold),
            "cold2hot" => Ok(TransactionType::Cold2Hot),
            other => Err(WalletError::Validation(format!(
                "unknown transaction type: {other}"
            ))),
        }
    }

    /// Collection and treasury moves are persisted in the internals table.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            TransactionType::Collection | TransactionType::Hot2Cold | TransactionType::Cold2Hot
        )
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for TransactionType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for TransactionType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TransactionType::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
pub enum TokenType {
    Btc,
    Eth,
    Erc20,
    Erc721,
    Erc1155,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Btc => "BTC",
            TokenType::Eth => "ETH",
            TokenType::Erc20 => "ERC20",
            TokenType::Erc721 => "ERC721",
            TokenType::Erc1155 => "ERC1155",
        }
    }

    pub fn parse(s: &str) -> Result<Self, WalletError> {
        match s {
            "BTC" => Ok(TokenType::Btc),
            "ETH" => Ok(TokenType::Eth),
            "ERC20" => Ok(TokenType::Erc20),
            "ERC721" => Ok(TokenType::Erc721),
            "ERC1155" => Ok(TokenType::Erc1155),
            other => Err(WalletError::Validation(format!(
                "invalid token type: {other}"
            ))),
        }
    }
}

macro_rules! impl_text_sql {
    ($ty:ty) => {
        impl ToSql<Text, Pg> for $ty {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $ty {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let s = std::str::from_utf8(bytes.as_bytes())?;
                Ok(<$ty>::parse(s)?)
            }
        }
    };
}

impl_text_sql!(TxStatus);
impl_text_sql!(AddressType);
impl_text_sql!(TransactionType);
impl_text_sql!(TokenType);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            TxStatus::CreateUnsigned,
            TxStatus::Signed,
            TxStatus::Broadcasted,
            TxStatus::WalletDone,
            TxStatus::Notified,
            TxStatus::Success,
        ] {
            assert_eq!(TxStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(TxStatus::parse("pending").is_err());
    }

    #[test]
    fn test_status_rank_is_monotonic() {
        let order = TxStatus::all();
        for pair in order.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn test_prior_statuses_only_move_forward() {
        for status in TxStatus::all() {
            for prior in status.prior_statuses() {
                let forward = prior.rank() < status.rank();
                let rollback = status == TxStatus::WalletDone && prior == TxStatus::Notified;
                assert!(
                    forward || rollback,
                    "{} -> {} must not be reachable",
                    prior.as_str(),
                    status.as_str()
                );
            }
        }
    }

    #[test]
    fn test_prior_statuses_allow_notifier_rollback_only() {
        // Delivery failure rolls notified rows back to wallet_done.
        assert!(TxStatus::WalletDone
            .prior_statuses()
            .contains(&TxStatus::Notified));
        // An acknowledged row can never regress.
        assert!(!TxStatus::WalletDone
            .prior_statuses()
            .contains(&TxStatus::Success));
        assert!(!TxStatus::Notified
            .prior_statuses()
            .contains(&TxStatus::Success));
        // Forward edges of the happy path are present.
        assert!(TxStatus::Notified
            .prior_statuses()
            .contains(&TxStatus::WalletDone));
        assert!(TxStatus::Success
            .prior_statuses()
            .contains(&TxStatus::Notified));
    }

    #[test]
    fn test_parse_transaction_type_is_case_insensitive() {
        assert_eq!(
            TransactionType::parse("Hot2Cold").unwrap(),
            TransactionType::Hot2Cold
        );
        assert_eq!(
            TransactionType::parse("DEPOSIT").unwrap(),
            TransactionType::Deposit
        );
        assert!(TransactionType::parse("unknown").is_err());
    }

    #[test]
    fn test_internal_kinds() {
        assert!(TransactionType::Collection.is_internal());
        assert!(TransactionType::Hot2Cold.is_internal());
        assert!(TransactionType::Cold2Hot.is_internal());
        assert!(!TransactionType::Deposit.is_internal());
        assert!(!TransactionType::Withdraw.is_internal());
    }

    #[test]
    fn test_normalize_hex() {
        assert_eq!(normalize_hex("0xAbCd"), "0xabcd");
        assert_eq!(normalize_hex("ABCD"), "0xabcd");
        assert_eq!(normalize_hex(" 0xff "), "0xff");
    }

    #[test]
    fn test_transaction_type_serde() {
        let json = serde_json::to_string(&TransactionType::Hot2Cold).unwrap();
        assert_eq!(json, "\"hot2cold\"");
        let parsed: TransactionType = serde_json::from_str("\"collection\"").unwrap();
        assert_eq!(parsed, TransactionType::Collection);
    }
}
