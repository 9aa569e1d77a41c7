use crate::{
    network::TransitNetwork,
    shared::geo::Distance,
    street::{StreetLayer, StreetState, UNLINKED},
};
use rayon::prelude::*;
use std::{collections::HashMap, sync::Arc, time::Instant};
use tracing::{debug, info, warn};

/// Radius for stop-to-stop walk transfers, in meters.
pub const TRANSFER_RADIUS_METERS: u32 = 1000;
/// Radius for park-and-ride to stop connections, in meters.
pub const PARK_RIDE_RADIUS_METERS: u32 = 500;

/// A park-and-ride lot and its precomputed connections into the transit
/// network.
#[derive(Debug, Clone)]
pub struct ParkRide {
    pub id: Arc<str>,
    pub street_vertex: i32,
    /// Street search state to the closest stop on each pattern, keyed by
    /// stop index. Holding the full back-pointer chain lets the street
    /// path be rebuilt on demand.
    pub closest_stops: HashMap<u32, StreetState>,
}

impl ParkRide {
    pub fn new(id: impl Into<Arc<str>>, street_vertex: i32) -> Self {
        Self {
            id: id.into(),
            street_vertex,
            closest_stops: HashMap::new(),
        }
    }
}

/// Precomputes walk transfers through the street network.
pub struct TransferFinder<'a> {
    street: &'a dyn StreetLayer,
}

impl<'a> TransferFinder<'a> {
    pub fn new(street: &'a dyn StreetLayer) -> Self {
        Self { street }
    }

    /// Fills `transfers_for_stop` with packed `(target, distance mm)`
    /// pairs for every stop that does not have a list yet.
    ///
    /// On a fresh network that is every stop. On a scenario copy the
    /// existing list is shorter than the stop count and only the new
    /// stops are searched; each transfer from a new stop to a
    /// pre-existing one is then mirrored onto the pre-existing stop's
    /// list. Walking is close enough to symmetric for the mirrored
    /// distance to reuse the forward one.
    pub fn find_transfers(&self, network: &mut TransitNetwork) {
        let now = Instant::now();
        let stop_count = network.stop_count();
        let first = network.transfers_for_stop.len();
        if first >= stop_count {
            debug!("Transfer lists already cover all {stop_count} stops");
            return;
        }
        let unlinked = (first..stop_count)
            .filter(|&stop| network.street_vertex_for_stop[stop] == UNLINKED)
            .count();
        if unlinked > 0 {
            warn!(unlinked, "Stops without street linkage get no transfers");
        }

        // Source-stop phase: one independent street search per stop.
        let lists: Vec<Arc<[u32]>> = (first..stop_count)
            .into_par_iter()
            .map(|stop| self.transfers_from_stop(network, stop as u32))
            .collect();
        network.transfers_for_stop.extend(lists);

        // Reverse phase, sequential: mirror new transfers onto
        // pre-existing stops, copying their lists before extending so
        // the base network's lists are untouched.
        if first > 0 {
            for new_stop in first..stop_count {
                let list = Arc::clone(&network.transfers_for_stop[new_stop]);
                for pair in list.chunks_exact(2) {
                    let (target, distance) = (pair[0], pair[1]);
                    if (target as usize) >= first {
                        continue;
                    }
                    let existing = &network.transfers_for_stop[target as usize];
                    let mut extended = Vec::with_capacity(existing.len() + 2);
                    extended.extend_from_slice(existing);
                    extended.push(new_stop as u32);
                    extended.push(distance);
                    network.transfers_for_stop[target as usize] = extended.into();
                }
            }
        }

        debug!(
            "Finding transfers for {} stops took {:?}",
            stop_count - first,
            now.elapsed()
        );
        info!(stops = stop_count - first, "Transfers ready");
    }

    fn transfers_from_stop(&self, network: &TransitNetwork, stop: u32) -> Arc<[u32]> {
        let vertex = network.street_vertex_for_stop[stop as usize];
        if vertex == UNLINKED {
            return network.empty_transfer_list();
        }
        let mut search = self.street.searcher();
        search.set_origin(vertex as u32);
        search.set_distance_limit_meters(TRANSFER_RADIUS_METERS);
        search.route();

        let reached = search.reached_stops();
        let retained = retain_closest_stops_on_patterns(network, Some(stop), &reached);

        let mut pairs: Vec<(u32, Distance)> = retained
            .into_iter()
            .filter(|&(target, _)| target != stop)
            .collect();
        if pairs.is_empty() {
            return network.empty_transfer_list();
        }
        pairs.sort_unstable_by_key(|&(target, _)| target);
        let mut packed = Vec::with_capacity(pairs.len() * 2);
        for (target, distance) in pairs {
            packed.push(target);
            packed.push(distance.as_millimeters());
        }
        packed.into()
    }

    /// Connects every park-and-ride lot to the closest stop on each
    /// pattern within [`PARK_RIDE_RADIUS_METERS`], keeping the street
    /// back-pointer state per target. Returns the number of lots left
    /// unconnected.
    pub fn find_park_ride_transfers(
        &self,
        network: &TransitNetwork,
        lots: &mut [ParkRide],
    ) -> usize {
        let now = Instant::now();
        let mut unconnected = 0usize;
        for lot in lots.iter_mut() {
            if lot.street_vertex == UNLINKED {
                unconnected += 1;
                continue;
            }
            let mut search = self.street.searcher();
            search.set_origin(lot.street_vertex as u32);
            search.set_distance_limit_meters(PARK_RIDE_RADIUS_METERS);
            search.route();

            let reached = search.reached_stops();
            let retained = retain_closest_stops_on_patterns(network, None, &reached);

            let mut closest = HashMap::with_capacity(retained.len());
            for (stop, _) in retained {
                let stop_vertex = network.street_vertex_for_stop[stop as usize];
                if stop_vertex == UNLINKED {
                    continue;
                }
                if let Some(state) = search.state_at_vertex(stop_vertex as u32) {
                    closest.insert(stop, state);
                }
            }
            if closest.is_empty() {
                unconnected += 1;
            }
            lot.closest_stops = closest;
        }
        if unconnected > 0 {
            warn!(unconnected, "Park-and-ride lots without transit access");
        }
        debug!(
            "Connecting {} park-and-ride lots took {:?}",
            lots.len(),
            now.elapsed()
        );
        unconnected
    }
}

/// Keeps, for each pattern, only the nearest reached stop on that
/// pattern. The source stop is excluded from the per-pattern minima and
/// re-added unconditionally afterwards, which covers boarding a pattern
/// at a different platform of the source station.
///
/// On pathological geometries (a U-shaped pattern whose far arm is
/// closer than its near arm at some third stop) this can hide a valid
/// transfer; in practice the reduction in list size is worth it.
pub fn retain_closest_stops_on_patterns(
    network: &TransitNetwork,
    source: Option<u32>,
    reached: &HashMap<u32, Distance>,
) -> HashMap<u32, Distance> {
    // Stop order fixed up front so equidistant ties resolve the same way
    // on every run.
    let mut stops: Vec<(u32, Distance)> = reached
        .iter()
        .map(|(&stop, &distance)| (stop, distance))
        .collect();
    stops.sort_unstable_by_key(|&(stop, _)| stop);

    let mut best: HashMap<u32, (u32, Distance)> = HashMap::new();
    for &(stop, distance) in &stops {
        if Some(stop) == source {
            continue;
        }
        for &pattern in network.patterns_for_stop(stop) {
            match best.get(&pattern) {
                Some(&(_, best_distance)) if best_distance <= distance => {}
                _ => {
                    best.insert(pattern, (stop, distance));
                }
            }
        }
    }

    let mut retained: HashMap<u32, Distance> = HashMap::new();
    for (stop, distance) in best.into_values() {
        retained
            .entry(stop)
            .and_modify(|existing| *existing = (*existing).min(distance))
            .or_insert(distance);
    }
    if let Some(source) = source
        && let Some(&distance) = reached.get(&source)
    {
        retained.insert(source, distance);
    }
    retained
}
