//! The configuration-store collaborator (§6 "Configuration store (SQL
//! contract)"): read-only access to test/step/field rows and the due-test
//! queue the Scheduler Loop drives. [`InMemoryConfigStore`] is a fixture
//! implementation good enough to run the whole pipeline without a real RDBMS,
//! in the spirit of the teacher's `config_source.rs` fetch-and-cache layer.

use std::sync::Mutex;

use indexmap::IndexMap;

use crate::errors::ConfigStoreError;
use crate::model::HttpTest;

/// Read-only access to test definitions, keyed by `httptestid`.
pub trait ConfigStore: Send + Sync {
    fn load_test(&self, testid: u64) -> Result<HttpTest, ConfigStoreError>;
}

/// The due-test queue: `NextDue`/`Requeue` from §4.8.
pub trait TestQueue: Send + Sync {
    /// Returns the soonest-due `(testid, nextcheck)` pair, if any test is due
    /// at or before `now`.
    fn next_due(&self, now: i64) -> Option<(u64, i64)>;

    /// Schedules `testid`'s next check at `now + delay_seconds`.
    fn requeue(&self, now: i64, testid: u64, delay_seconds: u64);
}

struct ScheduleEntry {
    nextcheck: i64,
}

/// An in-memory fixture satisfying both [`ConfigStore`] and [`TestQueue`].
/// Tests are seeded via [`InMemoryConfigStore::insert`] with an initial
/// `nextcheck`, then the store behaves like a tiny due-test priority queue.
pub struct InMemoryConfigStore {
    tests: Mutex<IndexMap<u64, HttpTest>>,
    schedule: Mutex<IndexMap<u64, ScheduleEntry>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self {
            tests: Mutex::new(IndexMap::new()),
            schedule: Mutex::new(IndexMap::new()),
        }
    }

    /// Seeds a test, due immediately at `nextcheck`.
    pub fn insert(&self, test: HttpTest, nextcheck: i64) {
        let testid = test.id;
        self.tests.lock().unwrap().insert(testid, test);
        self.schedule
            .lock()
            .unwrap()
            .insert(testid, ScheduleEntry { nextcheck });
    }
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_test(&self, testid: u64) -> Result<HttpTest, ConfigStoreError> {
        self.tests
            .lock()
            .unwrap()
            .get(&testid)
            .cloned()
            .ok_or(ConfigStoreError::TestNotFound(testid))
    }
}

impl TestQueue for InMemoryConfigStore {
    fn next_due(&self, now: i64) -> Option<(u64, i64)> {
        let schedule = self.schedule.lock().unwrap();
        schedule
            .iter()
            .filter(|(_, entry)| entry.nextcheck <= now)
            .min_by_key(|(_, entry)| entry.nextcheck)
            .map(|(&testid, entry)| (testid, entry.nextcheck))
    }

    fn requeue(&self, now: i64, testid: u64, delay_seconds: u64) {
        let mut schedule = self.schedule.lock().unwrap();
        if let Some(entry) = schedule.get_mut(&testid) {
            entry.nextcheck = now + delay_seconds as i64;
        }
    }
}
