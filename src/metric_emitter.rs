//! §4.6 Metric Emitter: turns step/test outcomes into preprocessing
//! submissions, filtered through the item cache's eligibility rule and
//! capped at three items per kind with a `warn!` on overflow (§9 open
//! question, carried per §10.6).

use std::collections::HashMap;
use std::hash::Hash;

use tracing::warn;

use crate::item_cache::ItemCache;
use crate::model::{ItemBinding, StepItemKind, StepStats, TestItemKind};
use crate::preprocessing::{ItemState, PreprocessingSink, SubmittedValue};

/// The outcome of one completed test execution, as produced by the Scenario
/// Runner, ready to be emitted.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub speed: f64,
    pub laststep: u32,
    pub lasterror: Option<String>,
}

/// Groups bindings by kind and truncates each group at 3, logging a warning
/// for every binding beyond that — the `THIS_SHOULD_NEVER_HAPPEN` branch.
fn group_and_truncate<K: Copy + Eq + Hash + std::fmt::Debug>(
    bindings: &[ItemBinding<K>],
) -> HashMap<K, Vec<u64>> {
    let mut groups: HashMap<K, Vec<u64>> = HashMap::new();
    for binding in bindings {
        let group = groups.entry(binding.kind).or_default();
        if group.len() >= 3 {
            warn!(
                kind = ?binding.kind,
                itemid = binding.itemid,
                "more than three items bound to one metric kind, truncating"
            );
            continue;
        }
        group.push(binding.itemid);
    }
    groups
}

fn emit_one(
    item_cache: &dyn ItemCache,
    sink: &dyn PreprocessingSink,
    itemid: u64,
    timestamp: i64,
    value: SubmittedValue,
) {
    let Some(handle) = item_cache.resolve(itemid) else {
        return;
    };
    if !handle.eligible() {
        return;
    }
    sink.submit(
        handle.itemid,
        handle.hostid,
        handle.value_type,
        value,
        timestamp,
        ItemState::Active,
    );
}

fn value_for_step_kind(kind: StepItemKind, stats: &StepStats) -> SubmittedValue {
    match kind {
        StepItemKind::RspCode => SubmittedValue::Unsigned(stats.response_code.max(0) as u64),
        StepItemKind::Time => SubmittedValue::Float(stats.total_time),
        StepItemKind::Speed => SubmittedValue::Float(stats.speed_download),
    }
}

/// Per-step emission: at most three items per kind ∈ {rspcode, time, speed}.
pub fn emit_step_metrics(
    item_cache: &dyn ItemCache,
    sink: &dyn PreprocessingSink,
    timestamp: i64,
    bindings: &[ItemBinding<StepItemKind>],
    stats: &StepStats,
) {
    let groups = group_and_truncate(bindings);
    for (kind, itemids) in groups {
        for itemid in itemids {
            emit_one(item_cache, sink, itemid, timestamp, value_for_step_kind(kind, stats));
        }
    }
}

/// Per-test emission: at most three items per kind ∈ {speed, laststep,
/// lasterror}. `lasterror` is skipped entirely when no error occurred.
pub fn emit_test_metrics(
    item_cache: &dyn ItemCache,
    sink: &dyn PreprocessingSink,
    timestamp: i64,
    bindings: &[ItemBinding<TestItemKind>],
    outcome: &TestOutcome,
) {
    let groups = group_and_truncate(bindings);
    for (kind, itemids) in groups {
        if kind == TestItemKind::LastError && outcome.lasterror.is_none() {
            continue;
        }
        for itemid in itemids {
            let value = match kind {
                TestItemKind::Speed => SubmittedValue::Float(outcome.speed),
                TestItemKind::LastStep => SubmittedValue::Unsigned(outcome.laststep as u64),
                TestItemKind::LastError => {
                    SubmittedValue::Text(outcome.lasterror.clone().unwrap_or_default())
                }
            };
            emit_one(item_cache, sink, itemid, timestamp, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item_cache::{InMemoryItemCache, ItemHandle, ValueType};
    use crate::preprocessing::InMemoryPreprocessingSink;

    fn seeded_cache(itemids: &[u64]) -> InMemoryItemCache {
        let cache = InMemoryItemCache::new();
        for &itemid in itemids {
            cache.insert(ItemHandle {
                itemid,
                hostid: 1,
                value_type: ValueType::Float,
                active: true,
                host_monitored: true,
                in_no_data_maintenance: false,
            });
        }
        cache
    }

    #[test]
    fn step_metrics_emit_one_per_bound_item() {
        let cache = seeded_cache(&[1, 2, 3]);
        let sink = InMemoryPreprocessingSink::new();
        let bindings = vec![
            ItemBinding {
                kind: StepItemKind::RspCode,
                itemid: 1,
            },
            ItemBinding {
                kind: StepItemKind::Time,
                itemid: 2,
            },
            ItemBinding {
                kind: StepItemKind::Speed,
                itemid: 3,
            },
        ];
        let stats = StepStats {
            response_code: 200,
            total_time: 0.1,
            speed_download: 1024.0,
        };
        emit_step_metrics(&cache, &sink, 1000, &bindings, &stats);
        let submissions = sink.drain();
        assert_eq!(submissions.len(), 3);
    }

    #[test]
    fn ineligible_item_is_skipped() {
        let cache = InMemoryItemCache::new();
        cache.insert(ItemHandle {
            itemid: 1,
            hostid: 1,
            value_type: ValueType::Unsigned,
            active: false,
            host_monitored: true,
            in_no_data_maintenance: false,
        });
        let sink = InMemoryPreprocessingSink::new();
        let bindings = vec![ItemBinding {
            kind: StepItemKind::RspCode,
            itemid: 1,
        }];
        emit_step_metrics(&cache, &sink, 1000, &bindings, &StepStats::default());
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn fourth_item_of_a_kind_is_truncated() {
        let cache = seeded_cache(&[1, 2, 3, 4]);
        let sink = InMemoryPreprocessingSink::new();
        let bindings: Vec<_> = [1, 2, 3, 4]
            .into_iter()
            .map(|itemid| ItemBinding {
                kind: StepItemKind::RspCode,
                itemid,
            })
            .collect();
        emit_step_metrics(&cache, &sink, 1000, &bindings, &StepStats::default());
        assert_eq!(sink.drain().len(), 3);
    }

    #[test]
    fn lasterror_skipped_when_no_error_occurred() {
        let cache = seeded_cache(&[1, 2, 3]);
        let sink = InMemoryPreprocessingSink::new();
        let bindings = vec![
            ItemBinding {
                kind: TestItemKind::Speed,
                itemid: 1,
            },
            ItemBinding {
                kind: TestItemKind::LastStep,
                itemid: 2,
            },
            ItemBinding {
                kind: TestItemKind::LastError,
                itemid: 3,
            },
        ];
        let outcome = TestOutcome {
            speed: 10.0,
            laststep: 0,
            lasterror: None,
        };
        emit_test_metrics(&cache, &sink, 1000, &bindings, &outcome);
        let submissions = sink.drain();
        assert_eq!(submissions.len(), 2);
        assert!(submissions.iter().all(|s| s.itemid != 3));
    }

    #[test]
    fn lasterror_emitted_when_error_present() {
        let cache = seeded_cache(&[3]);
        let sink = InMemoryPreprocessingSink::new();
        let bindings = vec![ItemBinding {
            kind: TestItemKind::LastError,
            itemid: 3,
        }];
        let outcome = TestOutcome {
            speed: 0.0,
            laststep: 1,
            lasterror: Some("boom".into()),
        };
        emit_test_metrics(&cache, &sink, 1000, &bindings, &outcome);
        let submissions = sink.drain();
        assert_eq!(submissions.len(), 1);
        assert_eq!(
            submissions[0].value,
            SubmittedValue::Text("boom".to_string())
        );
    }
}
