use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{ClaimError, Result};

/// Keys shared between synthesis stages.
pub mod case_keys {
    pub const CLAIM: &str = "claim";
    pub const ASSESSMENT: &str = "assessment";
    pub const REPAIR_TIME: &str = "repair_time";
    pub const LINE_ITEMS: &str = "line_items";
    pub const COMPARABLES: &str = "comparables";
    pub const SIGNALS: &str = "signals";
    pub const CASE_FILE: &str = "case_file";
}

/// Shared scratch space for one case-file run.
#[derive(Clone, Debug)]
pub struct CaseContext {
    data: Arc<DashMap<String, Value>>,
}

impl CaseContext {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.data.insert(key.into(), value);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Like [`get`](Self::get) but a missing key is an error naming the key.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get(key)
            .ok_or_else(|| ClaimError::ContextError(format!("{key} not found")))
    }
}

impl Default for CaseContext {
    fn default() -> Self {
        Self::new()
    }
}
