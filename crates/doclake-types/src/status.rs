use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a transaction.
///
/// Transitions: `Open → Committing → Closed` on success, or
/// `Open → Canceling → Closed` on rollback. There is no way back to `Open`
/// once a terminal transition starts, except a failed commit which returns
/// the transaction to `Open` for retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Open,
    Committing,
    Canceling,
    Closed,
}

impl TransactionStatus {
    /// Returns `true` when no further mutations may be staged.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Committing => "committing",
            Self::Canceling => "canceling",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Initialization state of the data lake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InitStatus {
    /// Root manifest loaded and merged.
    Success,
    /// Still loading.
    Unknown,
    /// No root manifest URI was configured.
    UndefRootManifest,
    /// The root manifest failed to load or decode.
    ErrorRootManifest,
    /// The root manifest URI resolved to nothing.
    MissingRootManifest,
    /// Any other failure.
    Other,
}

impl InitStatus {
    /// Returns `true` once the lake is queryable.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_closed_is_terminal() {
        assert!(TransactionStatus::Closed.is_terminal());
        assert!(!TransactionStatus::Open.is_terminal());
        assert!(!TransactionStatus::Committing.is_terminal());
        assert!(!TransactionStatus::Canceling.is_terminal());
    }

    #[test]
    fn init_status_serializes_camel_case() {
        assert_eq!(
            serde_json::to_string(&InitStatus::UndefRootManifest).unwrap(),
            "\"undefRootManifest\""
        );
        assert_eq!(serde_json::to_string(&InitStatus::Success).unwrap(), "\"success\"");
    }
}
