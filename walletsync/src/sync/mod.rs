// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

//! Block synchronizer: paced catch-up from a cursor, per-tenant
//! classification, and the tenant-batch channel consumed by the flow
//! processor.

use std::collections::HashMap;

use crate::types::{AddressType, TransactionType};

pub mod cursor;
pub mod processor;
pub mod synchronizer;

pub use cursor::BatchCursor;
pub use processor::FlowProcessor;
pub use synchronizer::{Synchronizer, SynchronizerConfig};

/// A transfer matched against one tenant's address registry.
#[derive(Debug, Clone)]
pub struct ClassifiedTx {
    pub business_uid: String,
    pub block_number: u64,
    pub block_hash: String,
    pub from_address: String,
    pub to_address: String,
    pub hash: String,
    pub token_address: String,
    pub contract_wallet: String,
    pub tx_type: TransactionType,
}

#[derive(Debug, Clone, Default)]
pub struct TenantBatch {
    pub block_height: u64,
    pub transactions: Vec<ClassifiedTx>,
}

/// One synchronizer cycle's output, keyed by business uid.
pub type TenantBatchMap = HashMap<String, TenantBatch>;

/// Classify a transfer for one tenant given which sides of it are known to
/// the tenant's address registry.
///
/// | from      | to        | class    |
/// |-----------|-----------|----------|
/// | unknown   | eoa       | deposit  |
/// | hot       | unknown   | withdraw |
/// | eoa       | hot       | collection |
/// | hot       | cold      | hot→cold |
/// | cold      | hot       | cold→hot |
///
/// Everything else is skipped for that tenant.
pub fn classify(
    from_type: Option<AddressType>,
    to_type: Option<AddressType>,
) -> Option<TransactionType> {
    match (from_type, to_type) {
        (None, Some(AddressType::Eoa)) => Some(TransactionType::Deposit),
        (Some(AddressType::Hot), None) => Some(TransactionType::Withdraw),
        (Some(AddressType::Eoa), Some(AddressType::Hot)) => Some(TransactionType::Collection),
        (Some(AddressType::Hot), Some(AddressType::Cold)) => Some(TransactionType::Hot2Cold),
        (Some(AddressType::Cold), Some(AddressType::Hot)) => Some(TransactionType::Cold2Hot),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        use AddressType::*;
        use TransactionType::*;

        assert_eq!(classify(None, Some(Eoa)), Some(Deposit));
        assert_eq!(classify(Some(Hot), None), Some(Withdraw));
        assert_eq!(classify(Some(Eoa), Some(Hot)), Some(Collection));
        assert_eq!(classify(Some(Hot), Some(Cold)), Some(Hot2Cold));
        assert_eq!(classify(Some(Cold), Some(Hot)), Some(Cold2Hot));
    }

    #[test]
    fn test_unmatched_combinations_are_skipped() {
        use AddressType::*;

        // Neither side known to the tenant.
        assert_eq!(classify(None, None), None);
        // Inbound to a wallet that is not an EOA.
        assert_eq!(classify(None, Some(Hot)), None);
        assert_eq!(classify(None, Some(Cold)), None);
        // Outbound from a non-hot wallet to an unknown address.
        assert_eq!(classify(Some(Eoa), None), None);
        assert_eq!(classify(Some(Cold), None), None);
        // Transfers between same-type wallets.
        assert_eq!(classify(Some(Eoa), Some(Eoa)), None);
        assert_eq!(classify(Some(Hot), Some(Hot)), None);
        assert_eq!(classify(Some(Cold), Some(Cold)), None);
        // Other internal combinations the policy does not track.
        assert_eq!(classify(Some(Eoa), Some(Cold)), None);
        assert_eq!(classify(Some(Cold), Some(Eoa)), None);
        assert_eq!(classify(Some(Hot), Some(Eoa)), None);
    }
}
