use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::core::feed::types::Entry;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Tally {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub passed: Vec<Entry>,
    pub blocked: Vec<Entry>,
    pub passed_categories: Vec<Tally>,
    pub blocked_categories: Vec<Tally>,
    pub passed_creators: Vec<Tally>,
    pub blocked_creators: Vec<Tally>,
}

#[derive(Debug, Default)]
struct LedgerState {
    passed: BTreeMap<String, Entry>,
    blocked: BTreeMap<String, Entry>,
}

impl LedgerState {
    fn bucket(&self, passed: bool) -> &BTreeMap<String, Entry> {
        if passed {
            &self.passed
        } else {
            &self.blocked
        }
    }
}

/// Latest pass/block classification per entry title.
///
/// A title lives in at most one of the two buckets: recording it under one
/// classification drops it from the other. Shared by every request for the
/// life of the process.
#[derive(Debug, Default)]
pub struct StatisticsLedger {
    state: RwLock<LedgerState>,
}

impl StatisticsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: &Entry, passed: bool) {
        let mut state = self.write_state();
        let LedgerState {
            passed: passed_bucket,
            blocked: blocked_bucket,
        } = &mut *state;
        let (target, other) = if passed {
            (passed_bucket, blocked_bucket)
        } else {
            (blocked_bucket, passed_bucket)
        };

        other.remove(&entry.title);
        target.insert(entry.title.clone(), entry.clone());
    }

    pub fn classification(&self, title: &str) -> Option<bool> {
        let state = self.read_state();
        if state.passed.contains_key(title) {
            Some(true)
        } else if state.blocked.contains_key(title) {
            Some(false)
        } else {
            None
        }
    }

    pub fn len_passed(&self) -> usize {
        self.read_state().passed.len()
    }

    pub fn len_blocked(&self) -> usize {
        self.read_state().blocked.len()
    }

    pub fn passed_entries(&self) -> Vec<Entry> {
        self.read_state().passed.values().cloned().collect()
    }

    pub fn blocked_entries(&self) -> Vec<Entry> {
        self.read_state().blocked.values().cloned().collect()
    }

    pub fn passed_categories(&self) -> Vec<Tally> {
        count_categories(self.read_state().bucket(true))
    }

    pub fn blocked_categories(&self) -> Vec<Tally> {
        count_categories(self.read_state().bucket(false))
    }

    pub fn passed_creators(&self) -> Vec<Tally> {
        count_creators(self.read_state().bucket(true))
    }

    pub fn blocked_creators(&self) -> Vec<Tally> {
        count_creators(self.read_state().bucket(false))
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.read_state();
        LedgerSnapshot {
            passed: state.passed.values().cloned().collect(),
            blocked: state.blocked.values().cloned().collect(),
            passed_categories: count_categories(&state.passed),
            blocked_categories: count_categories(&state.blocked),
            passed_creators: count_creators(&state.passed),
            blocked_creators: count_creators(&state.blocked),
        }
    }

    // Every critical section leaves both maps consistent, so a poisoned lock
    // still guards valid data.
    fn read_state(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn count_categories(bucket: &BTreeMap<String, Entry>) -> Vec<Tally> {
    tally(
        bucket
            .values()
            .flat_map(|entry| entry.categories.iter().map(String::as_str)),
    )
}

fn count_creators(bucket: &BTreeMap<String, Entry>) -> Vec<Tally> {
    tally(bucket.values().map(|entry| entry.creator.as_str()))
}

/// Counts labels, highest count first; ties go to the greater label.
fn tally<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<Tally> {
    let mut counts = HashMap::<&str, usize>::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }

    let mut rows: Vec<Tally> = counts
        .into_iter()
        .map(|(label, count)| Tally {
            label: label.to_string(),
            count,
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| b.label.cmp(&a.label)));
    rows
}
