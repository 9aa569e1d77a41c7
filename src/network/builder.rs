use crate::{
    distance::build_stop_distance_tables,
    feed::Feed,
    network::{LoadError, LoadLevel, LoadSummary, TransitNetwork},
    street::{StreetLayer, UNLINKED},
    transfers::TransferFinder,
};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How far from a stop to look for a street vertex to link it to.
pub const STOP_LINK_RADIUS_METERS: u32 = 300;

impl TransitNetwork {
    /// Runs the whole build pipeline: loads every feed, rebuilds the
    /// transient indexes, links stops to the street network, then
    /// precomputes distance tables and transfers.
    ///
    /// Only after all of these complete is the network safe to hand to
    /// concurrent queries; handing out a partially built network is a
    /// caller bug. A fatal load error aborts the build and yields no
    /// network.
    pub fn build(
        feeds: &[Feed],
        level: LoadLevel,
        street: &dyn StreetLayer,
    ) -> Result<(TransitNetwork, Vec<LoadSummary>), LoadError> {
        let now = Instant::now();
        let mut network = TransitNetwork::new();
        let mut summaries = Vec::with_capacity(feeds.len());
        for feed in feeds {
            summaries.push(network.load(feed, level)?);
        }
        network.link_stops(street, STOP_LINK_RADIUS_METERS);
        network.rebuild_indexes();
        build_stop_distance_tables(&mut network, street, None);
        TransferFinder::new(street).find_transfers(&mut network);
        info!(
            stops = network.stop_count(),
            patterns = network.pattern_count(),
            "Built transit network in {:?}",
            now.elapsed()
        );
        Ok((network, summaries))
    }

    /// Links every unlinked stop to the nearest street vertex within
    /// `radius_meters`. Stops with no vertex in range stay unlinked and
    /// quietly drop out of transfer and distance-table building.
    pub fn link_stops(&mut self, street: &dyn StreetLayer, radius_meters: u32) {
        let now = Instant::now();
        let vertices: Vec<i32> = self
            .street_vertex_for_stop
            .par_iter()
            .zip(self.stop_coordinates.par_iter())
            .map(|(&vertex, coordinate)| {
                if vertex != UNLINKED {
                    return vertex;
                }
                street
                    .nearest_vertex(*coordinate, radius_meters)
                    .map(|vertex| vertex as i32)
                    .unwrap_or(UNLINKED)
            })
            .collect();
        self.street_vertex_for_stop = vertices;

        let unlinked = self
            .street_vertex_for_stop
            .iter()
            .filter(|&&vertex| vertex == UNLINKED)
            .count();
        if unlinked > 0 {
            warn!(
                unlinked,
                stops = self.stop_count(),
                "Stops not linked to the street network"
            );
        }
        debug!(
            "Linking {} stops took {:?}",
            self.stop_count(),
            now.elapsed()
        );
    }
}
