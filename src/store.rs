/*
 *  store.rs
 *
 *  inkboard - slow glass for fast data
 *  (c) 2023-26 inkboard contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */
//! Shared measurement store: the single point of contact between the source
//! producers and the view projector.
//!
//! Every producer writes its own disjoint set of keys; the projector reads
//! through `get_fresh`, which is the one place the staleness policy is
//! applied. A write replaces the whole `(timestamp, value)` pair under the
//! map lock, so readers never observe a torn entry.

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// A measurement payload: plain scalar readings from the telemetry bus and
/// the AQI endpoint, whole JSON documents from the weather endpoints.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Doc(JsonValue),
}

impl Value {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Doc(_) => None,
        }
    }

    pub fn as_doc(&self) -> Option<&JsonValue> {
        match self {
            Value::Doc(doc) => Some(doc),
            Value::Scalar(_) => None,
        }
    }
}

/// One store entry: when the reading was taken, and what it was.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub timestamp: SystemTime,
    pub value: Value,
}

/// Concurrency-safe map from metric key to its latest measurement.
///
/// Cloning the store clones the handle, not the data; all clones share the
/// same map. One coarse mutex is plenty at seconds-to-minutes write rates,
/// and the critical sections never span an `.await`.
#[derive(Debug, Clone, Default)]
pub struct MeasurementStore {
    inner: Arc<Mutex<HashMap<String, Measurement>>>,
}

impl MeasurementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `key`, stamped with the current wall clock.
    pub fn put(&self, key: &str, value: Value) {
        self.put_at(key, value, SystemTime::now());
    }

    /// Replace the entry for `key` with an explicit reading instant.
    pub fn put_at(&self, key: &str, value: Value, at: SystemTime) {
        let mut map = self.inner.lock().unwrap();
        map.insert(key.to_string(), Measurement { timestamp: at, value });
    }

    /// The current entry for `key`, regardless of age.
    pub fn get(&self, key: &str) -> Option<Measurement> {
        let map = self.inner.lock().unwrap();
        map.get(key).cloned()
    }

    /// The value for `key` if it is no older than `max_age`, else absent.
    /// This is the only read surface the projector uses; age checks live
    /// here and nowhere else.
    #[allow(dead_code)]
    pub fn get_fresh(&self, key: &str, max_age: Duration) -> Option<Value> {
        self.get_fresh_at(key, max_age, SystemTime::now())
    }

    /// `get_fresh` against an explicit `now`, so projection of a snapshot is
    /// a pure function of the store and the instant.
    pub fn get_fresh_at(&self, key: &str, max_age: Duration, now: SystemTime) -> Option<Value> {
        let entry = self.get(key)?;
        // A timestamp ahead of `now` (clock step) counts as age zero.
        let age = now
            .duration_since(entry.timestamp)
            .unwrap_or(Duration::ZERO);
        if age <= max_age {
            Some(entry.value)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(v: f64) -> Value {
        Value::Scalar(v)
    }

    #[test]
    fn get_returns_latest_write() {
        let store = MeasurementStore::new();
        store.put("k", scalar(1.0));
        store.put("k", scalar(2.0));
        assert_eq!(store.get("k").unwrap().value, scalar(2.0));
    }

    #[test]
    fn get_absent_key() {
        let store = MeasurementStore::new();
        assert!(store.get("nope").is_none());
        assert!(store.get_fresh("nope", Duration::from_secs(600)).is_none());
    }

    #[test]
    fn staleness_is_monotonic_in_age() {
        let store = MeasurementStore::new();
        let now = SystemTime::now();
        let max_age = Duration::from_secs(600);
        store.put_at("k", scalar(42.0), now);

        // Fresh at every age up to the window, absent beyond it.
        for age_secs in [0u64, 1, 60, 599, 600] {
            let later = now + Duration::from_secs(age_secs);
            assert!(
                store.get_fresh_at("k", max_age, later).is_some(),
                "expected fresh at age {age_secs}s"
            );
        }
        for age_secs in [601u64, 900, 86_400] {
            let later = now + Duration::from_secs(age_secs);
            assert!(
                store.get_fresh_at("k", max_age, later).is_none(),
                "expected stale at age {age_secs}s"
            );
        }
    }

    #[test]
    fn future_timestamp_counts_as_fresh() {
        let store = MeasurementStore::new();
        let now = SystemTime::now();
        store.put_at("k", scalar(7.0), now + Duration::from_secs(30));
        assert!(store.get_fresh_at("k", Duration::from_secs(1), now).is_some());
    }

    #[test]
    fn writes_replace_whole_entry() {
        let store = MeasurementStore::new();
        let t1 = SystemTime::now();
        let t2 = t1 + Duration::from_secs(5);
        store.put_at("k", scalar(1.0), t1);
        store.put_at("k", scalar(2.0), t2);
        let m = store.get("k").unwrap();
        assert_eq!(m.timestamp, t2);
        assert_eq!(m.value, scalar(2.0));
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let store = MeasurementStore::new();
        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..1000 {
                    store.put("hot", scalar(i as f64));
                }
            })
        };
        let reader = {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    if let Some(m) = store.get("hot") {
                        // Entry is always a complete pair.
                        assert!(m.value.as_scalar().is_some());
                    }
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
    }

    #[test]
    fn doc_round_trip() {
        let store = MeasurementStore::new();
        let doc = serde_json::json!({"data": {"values": {"temperature": 58.5}}});
        store.put("weather_current", Value::Doc(doc.clone()));
        let got = store.get("weather_current").unwrap();
        assert_eq!(got.value.as_doc(), Some(&doc));
        assert!(got.value.as_scalar().is_none());
    }
}
