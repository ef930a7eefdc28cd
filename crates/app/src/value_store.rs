//! Current-value store — the most recent value observed per key.
//!
//! Written by the receive pipeline only; read concurrently by any consumer.

use std::collections::HashMap;

use dashmap::DashMap;
use datapool_domain::value::Value;

/// Concurrent map of key to last known value.
#[derive(Debug, Default)]
pub struct CurrentValueStore {
    values: DashMap<String, Value>,
}

impl CurrentValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking read of the current value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    /// Store `value` under `key` and report whether it differs from what was
    /// there before.
    ///
    /// A key seen for the first time always counts as changed.
    pub fn swap(&self, key: &str, value: Value) -> bool {
        match self.values.insert(key.to_string(), value.clone()) {
            Some(previous) => previous != value,
            None => true,
        }
    }

    /// Copy of every key/value pair currently stored.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.values
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_none_for_unknown_key() {
        let store = CurrentValueStore::new();
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn should_report_change_on_first_write() {
        let store = CurrentValueStore::new();
        assert!(store.swap("K", Value::Int(1)));
        assert_eq!(store.get("K"), Some(Value::Int(1)));
    }

    #[test]
    fn should_report_no_change_when_value_is_equal() {
        let store = CurrentValueStore::new();
        store.swap("K", Value::from("on"));
        assert!(!store.swap("K", Value::from("on")));
    }

    #[test]
    fn should_report_change_when_value_differs() {
        let store = CurrentValueStore::new();
        store.swap("K", Value::Int(1));
        assert!(store.swap("K", Value::Int(2)));
        assert_eq!(store.get("K"), Some(Value::Int(2)));
    }

    #[test]
    fn should_snapshot_and_clear() {
        let store = CurrentValueStore::new();
        store.swap("a", Value::Bool(true));
        store.swap("b", Value::Float(0.5));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["a"], Value::Bool(true));

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }
}
