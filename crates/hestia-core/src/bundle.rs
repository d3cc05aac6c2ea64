use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StorageError;
use crate::model::{InventoryItem, Recipe, Task};

pub const SCHEMA_VERSION: u32 = 1;

/// Everything one account owns. Stored whole under `data_<accountId>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Absent in documents written before versioning; those read as 0.
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
    #[serde(default)]
    pub recipes: Vec<Recipe>,
}

impl Default for Bundle {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            tasks: Vec::new(),
            inventory: Vec::new(),
            recipes: Vec::new(),
        }
    }
}

impl Bundle {
    /// Brings an older document up to the current schema.
    pub fn upgrade(mut self) -> Result<Self, StorageError> {
        if self.schema_version > SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchema {
                found: self.schema_version,
                supported: SCHEMA_VERSION,
            });
        }
        if self.schema_version < SCHEMA_VERSION {
            info!(
                from = self.schema_version,
                to = SCHEMA_VERSION,
                "upgrading bundle schema"
            );
            // Version 0 has the same shape; only the tag is new.
            self.schema_version = SCHEMA_VERSION;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unversioned_bundle_upgrades_in_place() {
        let raw = r#"{"tasks":[],"inventory":[],"recipes":[]}"#;
        let bundle: Bundle = serde_json::from_str(raw).unwrap();
        assert_eq!(bundle.schema_version, 0);
        assert_eq!(bundle.upgrade().unwrap().schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn newer_schema_is_refused() {
        let raw = r#"{"schemaVersion":99}"#;
        let bundle: Bundle = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            bundle.upgrade(),
            Err(StorageError::UnsupportedSchema { found: 99, .. })
        ));
    }

    #[test]
    fn partial_bundle_defaults_missing_collections() {
        let bundle: Bundle = serde_json::from_str(r#"{"schemaVersion":1,"tasks":[]}"#).unwrap();
        assert!(bundle.inventory.is_empty());
        assert!(bundle.recipes.is_empty());
    }
}
