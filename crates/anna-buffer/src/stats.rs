//! Buffer statistics snapshot

use anna_core::{Priority, ThoughtSource};
use std::collections::BTreeMap;

/// Point-in-time counts. Counters are cumulative since startup.
#[derive(Clone, Debug, Default)]
pub struct BufferStats {
    pub unconsumed: usize,
    pub consumed_retained: usize,
    pub by_priority: BTreeMap<Priority, usize>,
    pub by_source: BTreeMap<ThoughtSource, usize>,
    pub highest_priority: Option<Priority>,
    pub dropped_duplicates: u64,
    pub dropped_quota: u64,
    pub dropped_overflow: u64,
    pub evictions: u64,
    pub critical_backlog: u64,
    pub fill_ratio: f64,
}

impl BufferStats {
    pub fn count_at_least(&self, floor: Priority) -> usize {
        self.by_priority
            .iter()
            .filter(|(p, _)| **p >= floor)
            .map(|(_, n)| n)
            .sum()
    }
}
