use crate::network::{ModeSet, TransitNetwork, TripPattern};
use bitvec::prelude::*;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Instant,
};
use tracing::{debug, warn};

/// Filtered-pattern derivations kept per network. Two covers the usual
/// access/egress pair of a request without letting scenario churn pin
/// memory.
pub const FILTERED_PATTERN_CACHE_CAPACITY: usize = 2;

/// One pattern's trips active for a query, split by trip kind.
/// Schedule indices are positions within the pattern's schedule list.
#[derive(Debug)]
pub struct FilteredPattern {
    pub running_scheduled_trips: Vec<u32>,
    pub running_frequency_trips: Vec<u32>,
    /// No running scheduled trip passes another at any stop. Lets the
    /// departure scan binary-search instead of scanning every trip.
    /// Heuristic: pairwise over consecutive departure-sorted trips.
    pub no_scheduled_overtaking: bool,
}

/// The subset of a network's patterns active for one `(mode set, service
/// bitset)` query key.
///
/// `patterns` is index-parallel with the network's pattern list so
/// pattern indices stay valid; filtered-out patterns are `None`.
#[derive(Debug)]
pub struct FilteredPatterns {
    pub patterns: Vec<Option<FilteredPattern>>,
    pub running_scheduled_patterns: BitVec<usize, Lsb0>,
    pub running_frequency_patterns: BitVec<usize, Lsb0>,
}

impl FilteredPatterns {
    fn build(
        network: &TransitNetwork,
        modes: ModeSet,
        services: &BitVec<usize, Lsb0>,
    ) -> FilteredPatterns {
        let now = Instant::now();
        let pattern_count = network.pattern_count();
        let mut patterns = Vec::with_capacity(pattern_count);
        let mut running_scheduled = bitvec!(usize, Lsb0; 0; pattern_count);
        let mut running_frequency = bitvec!(usize, Lsb0; 0; pattern_count);

        for (index, pattern) in network.trip_patterns.iter().enumerate() {
            let mode = network.routes[pattern.route_index as usize].mode;
            let any_service_active = pattern
                .services_active
                .iter_ones()
                .any(|service| services.get(service).is_some_and(|bit| *bit));
            if !modes.contains(mode) || !any_service_active {
                patterns.push(None);
                continue;
            }

            let mut scheduled = Vec::new();
            let mut frequency = Vec::new();
            for (slot, schedule) in pattern.schedules.iter().enumerate() {
                let active = services
                    .get(schedule.service_index as usize)
                    .is_some_and(|bit| *bit);
                if !active {
                    continue;
                }
                if schedule.is_frequency_based() {
                    frequency.push(slot as u32);
                } else {
                    scheduled.push(slot as u32);
                }
            }

            running_scheduled.set(index, !scheduled.is_empty());
            running_frequency.set(index, !frequency.is_empty());
            let no_scheduled_overtaking = check_no_overtaking(index, pattern, &scheduled);
            patterns.push(Some(FilteredPattern {
                running_scheduled_trips: scheduled,
                running_frequency_trips: frequency,
                no_scheduled_overtaking,
            }));
        }

        debug!(
            "Filtering {} patterns took {:?}",
            pattern_count,
            now.elapsed()
        );
        FilteredPatterns {
            patterns,
            running_scheduled_patterns: running_scheduled,
            running_frequency_patterns: running_frequency,
        }
    }
}

/// True when no scheduled trip departs a stop later than its successor
/// does, for every consecutive pair of departure-sorted trips at every
/// stop offset. Catches most overtaking, not all: non-adjacent trips are
/// never compared.
fn check_no_overtaking(pattern_index: usize, pattern: &TripPattern, scheduled: &[u32]) -> bool {
    for pair in scheduled.windows(2) {
        let earlier = &pattern.schedules[pair[0] as usize];
        let later = &pattern.schedules[pair[1] as usize];
        for offset in 0..pattern.stop_count() {
            if earlier.departures[offset] > later.departures[offset] {
                warn!(
                    pattern = pattern_index,
                    stop_offset = offset,
                    "Scheduled trips overtake within pattern"
                );
                return false;
            }
        }
    }
    true
}

type CacheKey = (ModeSet, BitVec<usize, Lsb0>);

/// Small bounded FIFO of filtered-pattern derivations, shared across
/// concurrent readers of one network.
#[derive(Debug, Default)]
pub struct PatternCache {
    entries: Mutex<VecDeque<(CacheKey, Arc<FilteredPatterns>)>>,
}

impl PatternCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn get_or_build(
        &self,
        key: CacheKey,
        build: impl FnOnce() -> FilteredPatterns,
    ) -> Arc<FilteredPatterns> {
        let mut entries = self.entries.lock().expect("filtered pattern cache poisoned");
        if let Some((_, cached)) = entries.iter().find(|(cached_key, _)| *cached_key == key) {
            return Arc::clone(cached);
        }
        let built = Arc::new(build());
        entries.push_front((key, Arc::clone(&built)));
        entries.truncate(FILTERED_PATTERN_CACHE_CAPACITY);
        built
    }
}

impl TransitNetwork {
    /// The patterns relevant for a query: those whose route mode is in
    /// `modes` and whose services intersect `services`. Derived on
    /// demand and cached (capacity [`FILTERED_PATTERN_CACHE_CAPACITY`])
    /// per network.
    pub fn filtered_patterns(
        &self,
        modes: ModeSet,
        services: &BitVec<usize, Lsb0>,
    ) -> Arc<FilteredPatterns> {
        self.filter_cache
            .get_or_build((modes, services.clone()), || {
                FilteredPatterns::build(self, modes, services)
            })
    }
}
