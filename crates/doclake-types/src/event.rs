use serde::{Deserialize, Serialize};

use crate::status::TransactionStatus;

/// Events emitted by the data lake around reloads and transactions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LakeEvent {
    /// A reload pass started.
    ReloadingStart,
    /// A reload pass finished.
    ReloadingFinish,
    /// Manifest content changed; carries the URIs that changed.
    Changed { uris: Vec<String> },
    /// The current transaction moved to a new status.
    Transaction { status: TransactionStatus },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_kind() {
        let event = LakeEvent::Changed {
            uris: vec!["memory://root.json".to_string()],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "changed");
        assert_eq!(json["uris"][0], "memory://root.json");
    }
}
