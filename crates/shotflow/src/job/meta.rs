//! The opaque metadata bag stored alongside each job.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known metadata keys.
pub mod keys {
    pub const MODEL: &str = "model";
    pub const ASPECT_RATIO: &str = "aspectRatio";
    pub const PROMPT: &str = "prompt";
    pub const DURATION_SECONDS: &str = "durationSeconds";
    pub const SIZE: &str = "size";
    pub const REFERENCE_IMAGE: &str = "referenceImage";
    pub const PROVIDER_TASK_ID: &str = "providerTaskId";
    pub const RESULT_URLS: &str = "resultUrls";
    pub const TARGET_TYPE: &str = "targetType";
    pub const TARGET_ID: &str = "targetId";
    pub const TARGET_IDS: &str = "targetIds";
    pub const MODE: &str = "mode";
    pub const COUNT_PER_ITEM: &str = "countPerItem";
    pub const SUCCESS_COUNT: &str = "successCount";
    pub const FAILURE_COUNT: &str = "failureCount";
    pub const SKIPPED_COUNT: &str = "skippedCount";
    pub const TOTAL_COST: &str = "totalCost";
    pub const BALANCE_AFTER: &str = "balanceAfter";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobMeta(Map<String, Value>);

impl JobMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a stored `meta_json` column. An empty column is an empty bag.
    pub fn from_json(raw: Option<&str>) -> Result<Self, serde_json::Error> {
        match raw {
            None => Ok(Self::default()),
            Some(s) if s.trim().is_empty() => Ok(Self::default()),
            Some(s) => serde_json::from_str(s),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets `key` only when a value is present.
    pub fn set_opt<V: Into<Value>>(&mut self, key: &str, value: Option<V>) {
        if let Some(value) = value {
            self.set(key, value);
        }
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// Reads an unsigned number, accepting numeric strings as well.
    pub fn u64(&self, key: &str) -> Option<u64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn provider_task_id(&self) -> Option<&str> {
        self.str(keys::PROVIDER_TASK_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_column_is_empty_meta() {
        assert_eq!(JobMeta::from_json(None).unwrap(), JobMeta::default());
        assert_eq!(JobMeta::from_json(Some("  ")).unwrap(), JobMeta::default());
    }

    #[test]
    fn test_malformed_column_is_error() {
        assert!(JobMeta::from_json(Some("{not json")).is_err());
    }

    #[test]
    fn test_accessors() {
        let meta = JobMeta::new()
            .with(keys::PROVIDER_TASK_ID, "task-1")
            .with(keys::DURATION_SECONDS, "8")
            .with(keys::MODEL, "");

        assert_eq!(meta.provider_task_id(), Some("task-1"));
        assert_eq!(meta.u64(keys::DURATION_SECONDS), Some(8));
        assert_eq!(meta.str(keys::MODEL), None);

        let raw = meta.to_json().unwrap();
        assert!(raw.contains("\"providerTaskId\":\"task-1\""));
    }
}
