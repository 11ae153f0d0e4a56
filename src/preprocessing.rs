//! The preprocessing sink collaborator (§6 "Preprocessing sink interface"):
//! `submit(itemid, hostid, value_type, flags, value, timestamp, item_state,
//! extra)` and `flush()`. This is the actual destination of §4.6's per-step
//! and per-test metrics — distinct from, and additional to, the Prometheus
//! surface in [`crate::metrics`] (§10.4).

use std::sync::Mutex;

use tracing::debug;

use crate::item_cache::ValueType;

/// The item's reported state, mirroring Zabbix's `ITEM_STATE_*` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Active,
    NotSupported,
}

/// A typed value ready to submit, shaped by the item's [`ValueType`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubmittedValue {
    Float(f64),
    Unsigned(u64),
    Text(String),
}

/// One call recorded by [`InMemoryPreprocessingSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub itemid: u64,
    pub hostid: u64,
    pub value_type: ValueType,
    pub value: SubmittedValue,
    pub timestamp: i64,
    pub item_state: ItemState,
}

pub trait PreprocessingSink: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn submit(
        &self,
        itemid: u64,
        hostid: u64,
        value_type: ValueType,
        value: SubmittedValue,
        timestamp: i64,
        item_state: ItemState,
    );

    fn flush(&self);
}

/// A fixture sink that records submissions for inspection in tests and the
/// demonstration binary; `flush` just logs the batch size.
#[derive(Default)]
pub struct InMemoryPreprocessingSink {
    submissions: Mutex<Vec<Submission>>,
}

impl InMemoryPreprocessingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Submission> {
        std::mem::take(&mut self.submissions.lock().unwrap())
    }
}

impl PreprocessingSink for InMemoryPreprocessingSink {
    fn submit(
        &self,
        itemid: u64,
        hostid: u64,
        value_type: ValueType,
        value: SubmittedValue,
        timestamp: i64,
        item_state: ItemState,
    ) {
        self.submissions.lock().unwrap().push(Submission {
            itemid,
            hostid,
            value_type,
            value,
            timestamp,
            item_state,
        });
    }

    fn flush(&self) {
        let pending = self.submissions.lock().unwrap().len();
        debug!(pending, "flushing preprocessing sink");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_then_drain_returns_in_order() {
        let sink = InMemoryPreprocessingSink::new();
        sink.submit(
            1,
            10,
            ValueType::Unsigned,
            SubmittedValue::Unsigned(200),
            1000,
            ItemState::Active,
        );
        sink.submit(
            2,
            10,
            ValueType::Float,
            SubmittedValue::Float(0.5),
            1000,
            ItemState::Active,
        );
        let submissions = sink.drain();
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].itemid, 1);
        assert_eq!(submissions[1].value, SubmittedValue::Float(0.5));
    }

    #[test]
    fn drain_empties_the_sink() {
        let sink = InMemoryPreprocessingSink::new();
        sink.submit(
            1,
            10,
            ValueType::Text,
            SubmittedValue::Text("err".into()),
            1000,
            ItemState::Active,
        );
        assert_eq!(sink.drain().len(), 1);
        assert_eq!(sink.drain().len(), 0);
    }
}
