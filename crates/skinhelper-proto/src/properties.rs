//! The key/value namespace the skin reads.
//!
//! One store lives for the whole process and is handed to every component
//! that publishes.  Every mutation bumps `rev` and is broadcast as a
//! [`PropertyChange`] so socket clients can mirror the store.
//!
//! [`SessionProperties`] sits on top of the store and remembers which keys it
//! wrote, so a later `reset()` clears exactly those keys and nothing else.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change")]
pub enum PropertyChange {
    Set { key: String, value: String },
    Cleared { key: String },
}

pub struct PropertyStore {
    props: RwLock<HashMap<String, String>>,
    rev: AtomicU64,
    changes: broadcast::Sender<PropertyChange>,
}

impl PropertyStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            props: RwLock::new(HashMap::new()),
            rev: AtomicU64::new(0),
            changes,
        }
    }

    /// Set `key`.  An empty value clears the key instead.
    pub async fn set(&self, key: &str, value: &str) {
        if value.is_empty() {
            self.clear(key).await;
            return;
        }
        {
            let mut props = self.props.write().await;
            if props.get(key).map(String::as_str) == Some(value) {
                return;
            }
            props.insert(key.to_string(), value.to_string());
            self.rev.fetch_add(1, Ordering::Relaxed);
        }
        let _ = self.changes.send(PropertyChange::Set {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    pub async fn clear(&self, key: &str) {
        let removed = self.props.write().await.remove(key).is_some();
        if removed {
            self.rev.fetch_add(1, Ordering::Relaxed);
            let _ = self.changes.send(PropertyChange::Cleared {
                key: key.to_string(),
            });
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.props.read().await.get(key).cloned()
    }

    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.props
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Monotonic revision, incremented on every effective change.
    pub fn rev(&self) -> u64 {
        self.rev.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PropertyChange> {
        self.changes.subscribe()
    }
}

impl Default for PropertyStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks the keys written during one refresh cycle.
pub struct SessionProperties {
    store: Arc<PropertyStore>,
    keys: Mutex<Vec<String>>,
}

impl SessionProperties {
    pub fn new(store: Arc<PropertyStore>) -> Self {
        Self {
            store,
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<PropertyStore> {
        &self.store
    }

    /// Write `key` unless the value is empty or the key was already written
    /// this cycle.  Returns whether the store was touched.
    pub async fn set(&self, key: &str, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        let mut keys = self.keys.lock().await;
        if keys.iter().any(|k| k == key) {
            return false;
        }
        keys.push(key.to_string());
        self.store.set(key, value).await;
        true
    }

    pub async fn set_all(&self, props: &[(String, String)]) {
        for (key, value) in props {
            self.set(key, value).await;
        }
    }

    /// Clear every key written since the last reset.
    pub async fn reset(&self) {
        let keys = std::mem::take(&mut *self.keys.lock().await);
        for key in &keys {
            self.store.clear(key).await;
        }
    }

    pub async fn keys(&self) -> Vec<String> {
        self.keys.lock().await.clone()
    }
}

/// Flatten an enrichment result into `(key, value)` pairs under `prefix`.
///
/// Nested objects become dotted keys, arrays are joined with `" / "`, and
/// null or empty values are dropped.
pub fn flatten(details: &Map<String, Value>, prefix: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    flatten_into(details, prefix, &mut out);
    out
}

fn flatten_into(details: &Map<String, Value>, prefix: &str, out: &mut Vec<(String, String)>) {
    for (key, value) in details {
        let full = format!("{}{}", prefix, key);
        match value {
            Value::Object(inner) => flatten_into(inner, &format!("{}.", full), out),
            other => {
                if let Some(s) = scalar_string(other) {
                    if !s.is_empty() {
                        out.push((full, s));
                    }
                }
            }
        }
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(scalar_string)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" / "),
        ),
        Value::Object(_) => None,
    }
}
