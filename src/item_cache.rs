//! The item cache collaborator (§5 "Item cache", §4.6): resolves an
//! `itemid` to the metadata the Metric Emitter needs to decide whether a
//! value is even worth forwarding — item state, host monitoring status, and
//! maintenance mode.

use std::collections::HashMap;
use std::sync::Mutex;

/// The value type a preprocessing submission carries, mirroring Zabbix's
/// `ITEM_VALUE_TYPE_*` family closely enough for this engine's three metric
/// shapes (numeric float, numeric unsigned, text).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Float,
    Unsigned,
    Text,
}

/// A resolved item: enough metadata to decide whether to emit, and what
/// shape the value must take.
#[derive(Debug, Clone)]
pub struct ItemHandle {
    pub itemid: u64,
    pub hostid: u64,
    pub value_type: ValueType,
    pub active: bool,
    pub host_monitored: bool,
    pub in_no_data_maintenance: bool,
}

impl ItemHandle {
    /// The combined eligibility check from §4.6: "skip if inactive, host not
    /// monitored, or host in no-data maintenance."
    pub fn eligible(&self) -> bool {
        self.active && self.host_monitored && !self.in_no_data_maintenance
    }
}

pub trait ItemCache: Send + Sync {
    fn resolve(&self, itemid: u64) -> Option<ItemHandle>;
}

/// A fixture-style in-memory cache, seeded with item metadata up front.
#[derive(Default)]
pub struct InMemoryItemCache {
    items: Mutex<HashMap<u64, ItemHandle>>,
}

impl InMemoryItemCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: ItemHandle) {
        self.items.lock().unwrap().insert(handle.itemid, handle);
    }
}

impl ItemCache for InMemoryItemCache {
    fn resolve(&self, itemid: u64) -> Option<ItemHandle> {
        self.items.lock().unwrap().get(&itemid).cloned()
    }
}
