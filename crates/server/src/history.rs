//! In-memory ring of recent request/response pairs, for `start --history` / `GET /usage`-style
//! introspection. Never persisted; cleared on restart.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// A single recorded request/response pair.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    /// Unique id for this record.
    pub id: Uuid,
    /// Route the request was made against, e.g. `/v1/chat/completions`.
    pub endpoint: String,
    /// Model the request targeted.
    pub model: String,
    /// Request body, redacted of any content the caller chose not to retain.
    pub request: Value,
    /// Response body, or an error summary if the call failed.
    pub response: Value,
    /// Wall-clock time spent handling the request, in milliseconds.
    pub duration_ms: u64,
}

/// A capacity-bounded, mutex-guarded ring of the most recent [`HistoryRecord`]s.
///
/// A capacity of `0` means unlimited.
pub struct HistoryRing {
    capacity: usize,
    records: Mutex<VecDeque<HistoryRecord>>,
}

impl HistoryRing {
    /// Creates an empty ring with the given capacity (`0` = unlimited).
    pub fn new(capacity: usize) -> Self {
        Self { capacity, records: Mutex::new(VecDeque::new()) }
    }

    /// Appends a record, evicting the oldest entry if the ring is at capacity.
    pub fn record(&self, endpoint: impl Into<String>, model: impl Into<String>, request: Value, response: Value, duration: Duration) {
        let record = HistoryRecord {
            id: Uuid::new_v4(),
            endpoint: endpoint.into(),
            model: model.into(),
            request,
            response,
            duration_ms: duration.as_millis() as u64,
        };

        let mut records = self.records.lock().expect("history lock poisoned");
        if self.capacity != 0 && records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Returns every retained record, oldest first.
    pub fn snapshot(&self) -> Vec<HistoryRecord> {
        self.records.lock().expect("history lock poisoned").iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_once_capacity_is_reached() {
        let ring = HistoryRing::new(2);
        ring.record("/v1/chat/completions", "gpt-4o", Value::Null, Value::Null, Duration::ZERO);
        ring.record("/v1/chat/completions", "gpt-4o", Value::Null, Value::Null, Duration::ZERO);
        ring.record("/v1/chat/completions", "gpt-4o", Value::Null, Value::Null, Duration::ZERO);

        let snapshot = ring.snapshot();
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn zero_capacity_means_unlimited() {
        let ring = HistoryRing::new(0);
        for _ in 0..10 {
            ring.record("/v1/messages", "claude-3-opus", Value::Null, Value::Null, Duration::ZERO);
        }
        assert_eq!(ring.snapshot().len(), 10);
    }
}
