mod builder;
mod entities;
pub mod index;
pub mod loader;
pub mod mode;
mod scenario;

pub use builder::STOP_LINK_RADIUS_METERS;
pub use entities::*;
pub use loader::{LoadError, LoadLevel, LoadSummary};
pub use mode::{Mode, ModeError, ModeSet};

use crate::{
    filter::PatternCache,
    shared::geo::Coordinate,
    street::UNLINKED,
};
use bitvec::prelude::*;
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::{collections::HashMap, sync::Arc};

/// Resolved position of an externally addressable frequency entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyEntryRef {
    pub pattern: u32,
    pub schedule: u32,
    pub entry: u32,
}

/// The query-ready transit network: every relationship is a dense integer
/// index into one of the parallel arrays below.
///
/// Built once by loading feeds, rebuilding indexes, then precomputing
/// distance tables and transfers; immutable to queries afterwards. The
/// only sanctioned mutation path after the build is [`scenario_copy`],
/// which shares untouched structure with the base.
///
/// [`scenario_copy`]: TransitNetwork::scenario_copy
#[derive(Debug)]
pub struct TransitNetwork {
    /// Ids of the feeds loaded into this network, in load order.
    pub feed_ids: Vec<Arc<str>>,

    // --- Per-stop parallel arrays, indexed by stop index ---
    pub stop_id_for_index: Vec<Arc<str>>,
    /// Display names; absent under [`LoadLevel::Basic`].
    pub stop_names: Vec<Option<Arc<str>>>,
    pub fare_zone_for_stop: Vec<Option<Arc<str>>>,
    pub parent_station_for_stop: Vec<Option<Arc<str>>>,
    pub stop_coordinates: Vec<Coordinate>,
    /// Street vertex each stop is linked to, or [`UNLINKED`].
    pub street_vertex_for_stop: Vec<i32>,
    pub wheelchair_boarding_for_stop: BitVec<usize, Lsb0>,
    /// Packed `(target stop, distance mm)` pairs of walk transfers
    /// leaving each stop.
    pub transfers_for_stop: Vec<Arc<[u32]>>,
    /// Packed `(street vertex, distance mm)` pairs reachable from each
    /// stop; `None` for unlinked stops or before the table build.
    pub stop_to_vertex_distances: Vec<Option<Arc<[u32]>>>,

    // --- Entities ---
    pub routes: Vec<Arc<Route>>,
    pub services: Vec<Arc<Service>>,
    pub trip_patterns: Vec<Arc<TripPattern>>,

    // --- Metadata ---
    pub center: Coordinate,
    /// From the first agency with a parseable zone; `None` until a feed
    /// provides one (treated as UTC).
    pub time_zone: Option<Tz>,
    /// Bumped on each modifiable scenario copy; part of query cache keys.
    pub scenario_generation: u32,

    // --- Transient indexes, rebuilt from the arrays above ---
    pub patterns_for_stop: Vec<Box<[u32]>>,
    pub stop_index_for_id: HashMap<Arc<str>, u32>,
    pub stop_for_street_vertex: HashMap<u32, u32>,
    pub frequency_entry_for_id: HashMap<Arc<str>, FrequencyEntryRef>,

    /// Canonical interned empty transfer list shared by every stop
    /// without transfers.
    pub(crate) empty_transfers: Arc<[u32]>,
    pub(crate) filter_cache: PatternCache,
}

impl Default for TransitNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitNetwork {
    pub fn new() -> Self {
        Self {
            feed_ids: Vec::new(),
            stop_id_for_index: Vec::new(),
            stop_names: Vec::new(),
            fare_zone_for_stop: Vec::new(),
            parent_station_for_stop: Vec::new(),
            stop_coordinates: Vec::new(),
            street_vertex_for_stop: Vec::new(),
            wheelchair_boarding_for_stop: BitVec::new(),
            transfers_for_stop: Vec::new(),
            stop_to_vertex_distances: Vec::new(),
            routes: Vec::new(),
            services: Vec::new(),
            trip_patterns: Vec::new(),
            center: Coordinate::default(),
            time_zone: None,
            scenario_generation: 0,
            patterns_for_stop: Vec::new(),
            stop_index_for_id: HashMap::new(),
            stop_for_street_vertex: HashMap::new(),
            frequency_entry_for_id: HashMap::new(),
            empty_transfers: Vec::new().into(),
            filter_cache: PatternCache::new(),
        }
    }

    pub fn stop_count(&self) -> usize {
        self.stop_id_for_index.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.trip_patterns.len()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Indices of the patterns touching a stop. Requires rebuilt indexes.
    pub fn patterns_for_stop(&self, stop: u32) -> &[u32] {
        &self.patterns_for_stop[stop as usize]
    }

    /// Packed `(target, distance mm)` transfer pairs leaving a stop.
    pub fn transfers_for_stop(&self, stop: u32) -> &[u32] {
        &self.transfers_for_stop[stop as usize]
    }

    /// Distance table of a stop, packed `(vertex, distance mm)` pairs.
    pub fn stop_to_vertex_distances(&self, stop: u32) -> Option<&Arc<[u32]>> {
        self.stop_to_vertex_distances[stop as usize].as_ref()
    }

    pub fn stop_index(&self, id: &str) -> Option<u32> {
        self.stop_index_for_id.get(id).copied()
    }

    pub fn is_stop_linked(&self, stop: u32) -> bool {
        self.street_vertex_for_stop[stop as usize] != UNLINKED
    }

    /// Time zone of the network, defaulting to UTC until a feed provides
    /// one.
    pub fn time_zone(&self) -> Tz {
        self.time_zone.unwrap_or(Tz::UTC)
    }

    pub fn mode_for_pattern(&self, pattern: u32) -> Mode {
        let route = self.trip_patterns[pattern as usize].route_index;
        self.routes[route as usize].mode
    }

    /// Dense bitset of the services running on `date`, the canonical
    /// representation of a query's service day.
    pub fn active_services_for_date(&self, date: NaiveDate) -> BitVec<usize, Lsb0> {
        let mut active = bitvec!(usize, Lsb0; 0; self.services.len());
        for service in &self.services {
            if service.active_on(date) {
                active.set(service.index as usize, true);
            }
        }
        active
    }

    pub(crate) fn empty_transfer_list(&self) -> Arc<[u32]> {
        Arc::clone(&self.empty_transfers)
    }
}

impl Clone for TransitNetwork {
    /// Semi-shallow: array spines are duplicated, `Arc`-backed entities
    /// (patterns, schedules, routes, services) are shared. The filter
    /// cache is never carried into a copy.
    fn clone(&self) -> Self {
        Self {
            feed_ids: self.feed_ids.clone(),
            stop_id_for_index: self.stop_id_for_index.clone(),
            stop_names: self.stop_names.clone(),
            fare_zone_for_stop: self.fare_zone_for_stop.clone(),
            parent_station_for_stop: self.parent_station_for_stop.clone(),
            stop_coordinates: self.stop_coordinates.clone(),
            street_vertex_for_stop: self.street_vertex_for_stop.clone(),
            wheelchair_boarding_for_stop: self.wheelchair_boarding_for_stop.clone(),
            transfers_for_stop: self.transfers_for_stop.clone(),
            stop_to_vertex_distances: self.stop_to_vertex_distances.clone(),
            routes: self.routes.clone(),
            services: self.services.clone(),
            trip_patterns: self.trip_patterns.clone(),
            center: self.center,
            time_zone: self.time_zone,
            scenario_generation: self.scenario_generation,
            patterns_for_stop: self.patterns_for_stop.clone(),
            stop_index_for_id: self.stop_index_for_id.clone(),
            stop_for_street_vertex: self.stop_for_street_vertex.clone(),
            frequency_entry_for_id: self.frequency_entry_for_id.clone(),
            empty_transfers: Arc::clone(&self.empty_transfers),
            filter_cache: PatternCache::new(),
        }
    }
}
