use crate::{
    network::TransitNetwork,
    shared::geo::Bounds,
    street::{StreetLayer, UNLINKED},
};
use rayon::prelude::*;
use std::{sync::Arc, time::Instant};
use tracing::{debug, info, warn};

/// Hard radius for the per-stop walk tree, in meters.
pub const STOP_DISTANCE_TABLE_RADIUS_METERS: u32 = 2000;

/// Precomputes, for every linked stop, the distance in millimetres to
/// each street vertex reachable within the radius, stored as packed
/// `(vertex, distance)` pairs sorted by vertex.
///
/// With a `rebuild_zone`, only stops inside the zone are searched;
/// tables of stops outside it are preserved. Searches are independent
/// and fan out across the thread pool, one routing state each.
pub fn build_stop_distance_tables(
    network: &mut TransitNetwork,
    street: &dyn StreetLayer,
    rebuild_zone: Option<&Bounds>,
) {
    let now = Instant::now();
    let stop_count = network.stop_count();
    // scenario copies leave added stops without a slot
    network.stop_to_vertex_distances.resize(stop_count, None);
    let unlinked = network
        .street_vertex_for_stop
        .iter()
        .filter(|&&vertex| vertex == UNLINKED)
        .count();
    if unlinked > 0 {
        warn!(unlinked, "Stops without street linkage get no distance table");
    }

    let tables: Vec<Option<Arc<[u32]>>> = (0..stop_count)
        .into_par_iter()
        .map(|stop| {
            let coordinate = &network.stop_coordinates[stop];
            if let Some(zone) = rebuild_zone
                && !zone.contains(coordinate)
            {
                return network.stop_to_vertex_distances[stop].clone();
            }
            let vertex = network.street_vertex_for_stop[stop];
            if vertex == UNLINKED {
                return None;
            }
            let mut search = street.searcher();
            search.set_origin(vertex as u32);
            search.set_distance_limit_meters(STOP_DISTANCE_TABLE_RADIUS_METERS);
            search.route();

            let mut reached: Vec<(u32, u32)> = search
                .reached_vertices()
                .into_iter()
                .map(|(vertex, distance)| (vertex, distance.as_millimeters()))
                .collect();
            if reached.is_empty() {
                return None;
            }
            reached.sort_unstable_by_key(|&(vertex, _)| vertex);
            let mut packed = Vec::with_capacity(reached.len() * 2);
            for (vertex, distance) in reached {
                packed.push(vertex);
                packed.push(distance);
            }
            Some(packed.into())
        })
        .collect();

    network.stop_to_vertex_distances = tables;
    let built = network
        .stop_to_vertex_distances
        .iter()
        .filter(|table| table.is_some())
        .count();
    debug!(
        "Building distance tables for {built}/{stop_count} stops took {:?}",
        now.elapsed()
    );
    info!(built, stops = stop_count, "Stop distance tables ready");
}
