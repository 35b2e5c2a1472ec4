// ── Cached spa state ──
//
// A nested string-keyed tree of the latest values observed from the API,
// addressed by dot-separated paths (`pumps.1.state`). Readers take a
// lock-free snapshot via `ArcSwap`; writers are serialized and bump a
// `watch` version counter so subscribers can react to changes.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::error;

use crate::error::CoreError;

/// Thread-safe cache of the most recently observed spa state.
pub struct StateStore {
    tree: ArcSwap<Value>,
    write_lock: Mutex<()>,
    version: watch::Sender<u64>,
}

impl StateStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            tree: ArcSwap::from_pointee(Value::Object(Map::new())),
            write_lock: Mutex::new(()),
            version,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// The whole tree as of now.
    pub fn snapshot(&self) -> Arc<Value> {
        self.tree.load_full()
    }

    /// Value at `path`, or `None` if any segment is missing.
    pub fn try_get(&self, path: &str) -> Option<Value> {
        lookup(&self.tree.load(), path).cloned()
    }

    /// Value at `path`.
    ///
    /// A missing path is an error, logged together with the full state so
    /// the gap can be diagnosed.
    pub fn get(&self, path: &str) -> Result<Value, CoreError> {
        let tree = self.tree.load();
        if let Some(value) = lookup(&tree, path) {
            return Ok(value.clone());
        }
        error!(path, state = %**tree, "state key not found");
        Err(CoreError::StateKey {
            path: path.to_owned(),
        })
    }

    /// Value at `path`, or `default` if it has not been populated.
    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.try_get(path).unwrap_or(default)
    }

    /// Integer value at `path` divided by `divisor`.
    ///
    /// Absent and null values yield `None`. Numeric strings are accepted;
    /// anything else is an `InvalidStateValue` error.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn get_numeric(&self, path: &str, divisor: f64) -> Result<Option<f64>, CoreError> {
        let raw = match self.try_get(path) {
            None | Some(Value::Null) => return Ok(None),
            Some(v) => v,
        };
        let invalid = |reason: &str| CoreError::InvalidStateValue {
            path: path.to_owned(),
            reason: reason.to_owned(),
        };
        let n = match raw {
            Value::Number(ref n) => n
                .as_i64()
                .map(|i| i as f64)
                .or_else(|| n.as_f64().map(f64::trunc))
                .ok_or_else(|| invalid("not a number"))?,
            Value::String(ref s) => s
                .trim()
                .parse::<i64>()
                .map(|i| i as f64)
                .map_err(|e| invalid(&e.to_string()))?,
            Value::Bool(b) => f64::from(u8::from(b)),
            _ => return Err(invalid("not a number")),
        };
        Ok(Some(n / divisor))
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Replace the value at `path`, creating intermediate maps.
    pub fn set(&self, path: &str, value: impl Into<Value>) {
        let value = value.into();
        self.update(|root| *entry_mut(root, path) = value);
    }

    /// Overlay `fields` onto the map at `path`. Keys not named keep their
    /// current values; nested maps are merged recursively.
    pub fn merge(&self, path: &str, fields: Map<String, Value>) {
        self.update(|root| deep_merge(entry_mut(root, path), Value::Object(fields)));
    }

    /// Apply an arbitrary mutation as one atomic write.
    pub fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let _guard = self.write_lock.lock().expect("state write lock poisoned");
        let mut next = Value::clone(&self.tree.load());
        let out = f(&mut next);
        self.tree.store(Arc::new(next));
        self.version.send_modify(|v| *v += 1);
        out
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Receiver notified after every write.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

// ── Path helpers ─────────────────────────────────────────────────────

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|seg| !seg.is_empty())
        .try_fold(root, |node, seg| node.as_object()?.get(seg))
}

/// Mutable slot at `path`. Missing segments, and non-map values in the way,
/// become empty maps.
fn entry_mut<'a>(root: &'a mut Value, path: &str) -> &'a mut Value {
    path.split('.')
        .filter(|seg| !seg.is_empty())
        .fold(root, |node, seg| {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            match node {
                Value::Object(map) => map.entry(seg).or_insert(Value::Null),
                _ => unreachable!("node was just made an object"),
            }
        })
}

fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, value) in src {
                match dst.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value);
                    }
                    _ => {
                        dst.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn missing_path_is_an_error() {
        let store = StateStore::new();
        let err = store.get("pumps.1.state").unwrap_err();
        assert!(matches!(err, CoreError::StateKey { ref path } if path == "pumps.1.state"));
    }

    #[test]
    fn set_creates_intermediate_maps() {
        let store = StateStore::new();
        store.set("pumps.2.state", "auto");
        assert_eq!(store.get("pumps.2.state").unwrap(), json!("auto"));
        assert_eq!(store.get("pumps").unwrap(), json!({ "2": { "state": "auto" } }));
    }

    #[test]
    fn get_or_falls_back_to_default() {
        let store = StateStore::new();
        assert_eq!(store.get_or("heatPump", json!("Off")), json!("Off"));
        store.set("heatPump", "Auto");
        assert_eq!(store.get_or("heatPump", json!("Off")), json!("Auto"));
    }

    #[test]
    fn numeric_reads_scale_and_tolerate_strings() {
        let store = StateStore::new();
        store.set("setTemperature", 385);
        store.set("currentTemperature", "372");
        assert_eq!(store.get_numeric("setTemperature", 10.0).unwrap(), Some(38.5));
        assert_eq!(store.get_numeric("currentTemperature", 10.0).unwrap(), Some(37.2));
    }

    #[test]
    fn numeric_read_of_null_or_missing_is_none() {
        let store = StateStore::new();
        store.set("operationMode", Value::Null);
        assert_eq!(store.get_numeric("operationMode", 1.0).unwrap(), None);
        assert_eq!(store.get_numeric("nothing.here", 1.0).unwrap(), None);
    }

    #[test]
    fn numeric_read_of_text_is_invalid() {
        let store = StateStore::new();
        store.set("heat", "warm");
        let err = store.get_numeric("heat", 1.0).unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateValue { .. }));
    }

    #[test]
    fn merge_keeps_untouched_fields() {
        let store = StateStore::new();
        store.set("pumps.1", json!({ "apiId": 10, "state": "on", "label": "jets" }));
        store.merge("pumps.1", obj(json!({ "state": "off", "speeds": 1 })));
        assert_eq!(
            store.get("pumps.1").unwrap(),
            json!({ "apiId": 10, "state": "off", "label": "jets", "speeds": 1 })
        );
    }

    #[test]
    fn writes_bump_version() {
        let store = StateStore::new();
        let rx = store.subscribe();
        store.set("heat", 1);
        store.set("sleep", 0);
        assert_eq!(store.version(), 2);
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let store = StateStore::new();
        store.set("heat", 0);
        let before = store.snapshot();
        store.set("heat", 1);
        assert_eq!(before["heat"], json!(0));
        assert_eq!(store.snapshot()["heat"], json!(1));
    }
}
