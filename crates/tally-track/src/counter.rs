//! Line-crossing counter.
//!
//! Attributes every identified profile past the count line to the running
//! aggregates exactly once, and issues ids to profiles that are still before
//! the line. Ids already counted are remembered in a [`CountedMemory`] that is
//! cleared wholesale after a TTL so it cannot grow without bound.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use log::debug;
use tally_core::{Profile, ProfileId};

/// Time-bounded set of ids already attributed to the aggregates.
///
/// Clearing is wholesale: an id that is still tracked when the memory is
/// cleared could be counted a second time. With a TTL well above the time an
/// object needs to leave the frame after crossing, this does not happen in
/// practice.
#[derive(Clone, Debug)]
pub struct CountedMemory {
    ids: HashSet<u64>,
    ttl: Duration,
    last_cleared: Instant,
}

impl CountedMemory {
    pub fn new(ttl: Duration, now: Instant) -> Self {
        Self {
            ids: HashSet::new(),
            ttl,
            last_cleared: now,
        }
    }

    #[inline]
    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    /// Remember `id`. Returns `false` if it was already present.
    #[inline]
    pub fn insert(&mut self, id: u64) -> bool {
        self.ids.insert(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[inline]
    pub fn last_cleared(&self) -> Instant {
        self.last_cleared
    }

    pub fn clear(&mut self, now: Instant) {
        self.ids.clear();
        self.last_cleared = now;
    }

    /// Clear the memory if more than the TTL has elapsed since the last clear.
    pub fn expire(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_cleared) > self.ttl {
            debug!("counted memory expired ({} ids dropped)", self.ids.len());
            self.clear(now);
            true
        } else {
            false
        }
    }
}

/// What a counting step did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CountStep {
    /// Ids attributed to the aggregates in this step, in profile order.
    pub counted: Vec<u64>,
    /// Ids issued in this step.
    pub issued: Vec<u64>,
    /// Whether the counted memory was cleared at the end of the step.
    pub memory_cleared: bool,
}

/// Running aggregates plus id issuance.
#[derive(Clone, Debug)]
pub struct LineCounter {
    count_line: f32,
    next_id: u64,
    count: u64,
    total_weight: f64,
    memory: CountedMemory,
}

impl LineCounter {
    pub fn new(count_line: f32, ttl: Duration, now: Instant) -> Self {
        Self {
            count_line,
            next_id: 0,
            count: 0,
            total_weight: 0.0,
            memory: CountedMemory::new(ttl, now),
        }
    }

    #[inline]
    pub fn count_line(&self) -> f32 {
        self.count_line
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Id the next un-identified profile before the line will receive.
    #[inline]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    #[inline]
    pub fn memory(&self) -> &CountedMemory {
        &self.memory
    }

    /// Count crossings and issue ids on the matched compare set.
    ///
    /// After this call every profile has `matched == false` and the slice is
    /// ready to serve as the next base set.
    pub fn process(&mut self, profiles: &mut [Profile], now: Instant) -> CountStep {
        let mut step = CountStep::default();

        for i in 0..profiles.len() {
            let p = &profiles[i];
            let ProfileId::Identified(id) = p.id else {
                continue;
            };
            if !p.is_past(self.count_line) || !self.memory.insert(id) {
                continue;
            }

            let weight = p.estimated_weight;
            self.count += 1;
            self.total_weight += f64::from(weight);
            step.counted.push(id);
            debug!("counted id {id} ({weight:.1} g), total {}", self.count);

            for (j, other) in profiles.iter_mut().enumerate() {
                if j != i && other.id == ProfileId::Identified(id) {
                    other.id = ProfileId::Unidentified;
                }
            }
        }

        step.issued = self.issue_ids(profiles);
        step.memory_cleared = self.memory.expire(now);
        step
    }

    /// Issue ids to un-identified profiles before the line, without counting.
    ///
    /// Also clears every `matched` flag.
    pub fn issue_ids(&mut self, profiles: &mut [Profile]) -> Vec<u64> {
        let mut issued = Vec::new();
        for p in profiles.iter_mut() {
            // un-identified profiles already past the line are never issued an id
            if p.id == ProfileId::Unidentified && p.is_before(self.count_line) {
                p.id = ProfileId::Identified(self.next_id);
                issued.push(self.next_id);
                self.next_id += 1;
            }
            p.matched = false;
        }
        issued
    }

    /// Run only the TTL policy on the counted memory.
    pub fn expire_memory(&mut self, now: Instant) -> bool {
        self.memory.expire(now)
    }

    /// Zero the aggregates, restart id issuance and clear the memory.
    pub fn reset(&mut self, now: Instant) {
        self.next_id = 0;
        self.count = 0;
        self.total_weight = 0.0;
        self.memory.clear(now);
    }
}
