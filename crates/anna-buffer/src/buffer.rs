//! Buffer internals: classification, dedup, quotas, decay eviction

use crate::sink::ThoughtSink;
use crate::stats::BufferStats;
use anna_core::{BufferConfig, Error, Metadata, Priority, Result, Thought, ThoughtId, ThoughtSource};
use std::cmp::Reverse;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, warn};

pub struct ThoughtBuffer {
    inner: Mutex<Inner>,
    wake: Notify,
    config: BufferConfig,
}

struct Inner {
    unconsumed: Vec<Thought>,
    /// Recently consumed thoughts kept for replay, oldest first.
    consumed: VecDeque<(Thought, Instant)>,
    next_seq: u64,
    counters: Counters,
}

#[derive(Clone, Copy, Default)]
struct Counters {
    dropped_duplicates: u64,
    dropped_quota: u64,
    dropped_overflow: u64,
    evictions: u64,
    critical_backlog: u64,
}

impl ThoughtBuffer {
    pub fn new(config: BufferConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                unconsumed: Vec::new(),
                consumed: VecDeque::new(),
                next_seq: 0,
                counters: Counters::default(),
            }),
            wake: Notify::new(),
            config,
        }
    }

    /// Producer handle. The only mutation it exposes is `add`.
    pub fn sink(self: &Arc<Self>) -> ThoughtSink {
        ThoughtSink::new(self.clone())
    }

    /// Enqueue a thought. Never blocks; fails only on empty content.
    /// Duplicates merge, quota excess is dropped, overflow evicts — all
    /// resolved here and visible through [`ThoughtBuffer::stats`].
    pub fn add(
        &self,
        content: &str,
        source: ThoughtSource,
        origin_tag: Option<&str>,
        metadata: Option<Metadata>,
        priority_override: Option<Priority>,
    ) -> Result<ThoughtId> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(Error::EmptyThought);
        }

        let priority = source.classify(metadata.as_ref(), priority_override);
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("thought buffer lock poisoned");
        inner.prune_consumed(now, self.config.replay_window_secs);

        // Duplicate collapse: same source + origin within the dedup window.
        let normalized = Thought::normalized_content(trimmed);
        let window = Duration::from_secs_f64(self.config.dedup_window_secs);
        if let Some(existing) = inner.unconsumed.iter_mut().rev().find(|t| {
            t.source == source
                && t.origin_tag.as_deref() == origin_tag
                && now.saturating_duration_since(t.inserted_at) <= window
                && Thought::normalized_content(&t.content) == normalized
        }) {
            if let Some(meta) = metadata {
                existing.metadata.extend(meta);
            }
            existing.priority = existing.priority.max(priority);
            let id = existing.id;
            let merged_priority = existing.priority;
            inner.counters.dropped_duplicates += 1;
            drop(inner);
            debug!(%id, source = %source, "collapsed duplicate thought");
            if merged_priority >= Priority::Medium {
                self.wake.notify_one();
            }
            return Ok(id);
        }

        // Per-producer quota: one (source, origin_tag) pair may not crowd
        // out the rest of the inbox.
        let quota = ((self.config.quota_fraction * self.config.ceiling as f64) as usize).max(1);
        let occupancy = inner
            .unconsumed
            .iter()
            .filter(|t| t.source == source && t.origin_tag.as_deref() == origin_tag)
            .count();
        if occupancy >= quota {
            inner.counters.dropped_quota += 1;
            drop(inner);
            debug!(
                source = %source,
                origin = origin_tag.unwrap_or("-"),
                "quota reached, dropping thought"
            );
            return Ok(ThoughtId::new());
        }

        let id = ThoughtId::new();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.unconsumed.push(Thought {
            id,
            content: trimmed.to_string(),
            source,
            priority,
            inserted_at: now,
            seq,
            origin_tag: origin_tag.map(String::from),
            metadata: metadata.unwrap_or_default(),
            consumed: false,
        });

        while inner.unconsumed.len() > self.config.ceiling {
            match inner.evict_one(now, self.config.decay_alpha) {
                Some(evicted) if evicted == id => {
                    // The newcomer itself scored lowest. Against an
                    // all-CRITICAL backlog that is a capacity signal, not a
                    // routine eviction.
                    inner.counters.dropped_overflow += 1;
                    if inner
                        .unconsumed
                        .iter()
                        .all(|t| t.priority == Priority::Critical)
                    {
                        inner.counters.critical_backlog += 1;
                        warn!("thought buffer full of critical thoughts, dropped newcomer");
                    }
                    break;
                }
                Some(_) => inner.counters.evictions += 1,
                None => {
                    // Everything unconsumed is CRITICAL, newcomer included:
                    // nothing is evictable, so the newcomer is the one that
                    // goes.
                    inner.counters.critical_backlog += 1;
                    inner.counters.dropped_overflow += 1;
                    let pos = inner.unconsumed.iter().position(|t| t.id == id);
                    if let Some(pos) = pos {
                        inner.unconsumed.remove(pos);
                    }
                    warn!("thought buffer full of critical thoughts, dropping critical newcomer");
                    break;
                }
            }
        }

        drop(inner);
        if priority >= Priority::Medium {
            self.wake.notify_one();
        }
        Ok(id)
    }

    /// Drain up to `max_items` unconsumed thoughts at or above
    /// `min_priority`, strict (priority desc, insertion asc) order.
    /// The scheduler is the sole caller; re-entrant drains are not
    /// supported.
    pub fn drain(&self, max_items: usize, min_priority: Option<Priority>) -> Vec<Thought> {
        let floor = min_priority.unwrap_or(Priority::Background);
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("thought buffer lock poisoned");
        inner.prune_consumed(now, self.config.replay_window_secs);

        let mut eligible: Vec<usize> = inner
            .unconsumed
            .iter()
            .enumerate()
            .filter(|(_, t)| t.priority >= floor)
            .map(|(i, _)| i)
            .collect();
        eligible.sort_by_key(|&i| {
            let t = &inner.unconsumed[i];
            (Reverse(t.priority), t.seq)
        });
        eligible.truncate(max_items);

        // Remove from the back so earlier indices stay valid.
        let mut picked: Vec<usize> = eligible;
        picked.sort_unstable_by(|a, b| b.cmp(a));
        let mut drained: Vec<Thought> = Vec::with_capacity(picked.len());
        for i in picked {
            let mut t = inner.unconsumed.remove(i);
            t.consumed = true;
            inner.consumed.push_back((t.clone(), now));
            drained.push(t);
        }
        drained.sort_by_key(|t| (Reverse(t.priority), t.seq));
        drained
    }

    /// Non-mutating view of the top `k` thoughts in drain order.
    pub fn peek(&self, k: usize) -> Vec<Thought> {
        let inner = self.inner.lock().expect("thought buffer lock poisoned");
        let mut view: Vec<Thought> = inner.unconsumed.to_vec();
        view.sort_by_key(|t| (Reverse(t.priority), t.seq));
        view.truncate(k);
        view
    }

    /// Consumed thoughts within the replay window, insertion order.
    pub fn recent_consumed(&self, window: Duration) -> Vec<Thought> {
        let now = Instant::now();
        let inner = self.inner.lock().expect("thought buffer lock poisoned");
        let mut out: Vec<Thought> = inner
            .consumed
            .iter()
            .filter(|(_, at)| now.saturating_duration_since(*at) <= window)
            .map(|(t, _)| t.clone())
            .collect();
        out.sort_by_key(|t| t.seq);
        out
    }

    pub fn stats(&self) -> BufferStats {
        let inner = self.inner.lock().expect("thought buffer lock poisoned");
        let mut stats = BufferStats {
            unconsumed: inner.unconsumed.len(),
            consumed_retained: inner.consumed.len(),
            dropped_duplicates: inner.counters.dropped_duplicates,
            dropped_quota: inner.counters.dropped_quota,
            dropped_overflow: inner.counters.dropped_overflow,
            evictions: inner.counters.evictions,
            critical_backlog: inner.counters.critical_backlog,
            fill_ratio: inner.unconsumed.len() as f64 / self.config.ceiling.max(1) as f64,
            ..BufferStats::default()
        };
        for t in &inner.unconsumed {
            *stats.by_priority.entry(t.priority).or_insert(0) += 1;
            *stats.by_source.entry(t.source).or_insert(0) += 1;
            stats.highest_priority = Some(match stats.highest_priority {
                Some(p) => p.max(t.priority),
                None => t.priority,
            });
        }
        stats
    }

    /// Wait until a wake-worthy thought arrives (priority ≥ MEDIUM) or
    /// someone kicks the buffer.
    pub async fn notified(&self) {
        self.wake.notified().await;
    }

    /// External kick: wake the consumer regardless of buffer contents.
    pub fn kick(&self) {
        self.wake.notify_one();
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }
}

impl Inner {
    /// Evict the unconsumed thought with the lowest age score. CRITICAL
    /// thoughts are never candidates. Returns the evicted id, or `None`
    /// if nothing was evictable.
    fn evict_one(&mut self, now: Instant, alpha: f64) -> Option<ThoughtId> {
        let victim = self
            .unconsumed
            .iter()
            .enumerate()
            .filter(|(_, t)| t.priority != Priority::Critical)
            .min_by(|(_, a), (_, b)| {
                let sa = age_score(a, now, alpha);
                let sb = age_score(b, now, alpha);
                sa.partial_cmp(&sb)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.seq.cmp(&b.seq))
            })
            .map(|(i, _)| i);
        victim.map(|i| {
            let t = self.unconsumed.remove(i);
            debug!(id = %t.id, priority = %t.priority, "evicted thought");
            t.id
        })
    }

    fn prune_consumed(&mut self, now: Instant, replay_window_secs: f64) {
        let window = Duration::from_secs_f64(replay_window_secs);
        while let Some((_, at)) = self.consumed.front() {
            if now.saturating_duration_since(*at) > window {
                self.consumed.pop_front();
            } else {
                break;
            }
        }
    }
}

fn age_score(t: &Thought, now: Instant, alpha: f64) -> f64 {
    t.priority.rank() as f64 - alpha * t.age_secs(now)
}
