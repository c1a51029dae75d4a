// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Error kinds surfaced by the wallet scanner.
///
/// `Transient` marks failures that are worth retrying with the exponential
/// strategy; `Critical` ends the owning worker and signals shutdown.
#[derive(Debug, Clone, Error)]
pub enum WalletError {
    #[error("config error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("chain-account rpc error: {0}")]
    Rpc(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("transient error: {0}")]
    Transient(String),
    #[error("critical error: {0}")]
    Critical(String),
}

impl WalletError {
    /// Short stable label for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            WalletError::Config(_) => "config",
            WalletError::Database(_) => "database",
            WalletError::Rpc(_) => "rpc",
            WalletError::NotFound(_) => "not_found",
            WalletError::Validation(_) => "validation",
            WalletError::Transient(_) => "transient",
            WalletError::Critical(_) => "critical",
        }
    }

    /// Whether the exponential retry wrapper should re-attempt this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WalletError::Transient(_) | WalletError::Database(_) | WalletError::Rpc(_)
        )
    }
}

impl From<diesel::result::Error> for WalletError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => WalletError::NotFound("record not found".into()),
            other => WalletError::Database(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for WalletError {
    fn from(err: anyhow::Error) -> Self {
        WalletError::Database(err.to_string())
    }
}

pub type WalletResult<T> = Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_labels_are_metric_safe() {
        let errors = vec![
            WalletError::Config("x".into()),
            WalletError::Database("x".into()),
            WalletError::Rpc("x".into()),
            WalletError::NotFound("x".into()),
            WalletError::Validation("x".into()),
            WalletError::Transient("x".into()),
            WalletError::Critical("x".into()),
        ];
        for err in errors {
            let label = err.error_type();
            assert!(!label.is_empty());
            for c in label.chars() {
                assert!(
                    c.is_ascii_lowercase() || c == '_',
                    "label '{}' contains invalid character '{}'",
                    label,
                    c
                );
            }
        }
    }

    #[test]
    fn test_not_found_maps_from_diesel() {
        let err: WalletError = diesel::result::Error::NotFound.into();
        assert!(matches!(err, WalletError::NotFound(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(WalletError::Transient("t".into()).is_retryable());
        assert!(WalletError::Database("d".into()).is_retryable());
        assert!(WalletError::Rpc("r".into()).is_retryable());
        assert!(!WalletError::Validation("v".into()).is_retryable());
        assert!(!WalletError::Critical("c".into()).is_retryable());
    }
}
