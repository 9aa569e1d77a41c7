use crate::{network::TransitNetwork, shared::geo::Coordinate, street::{StreetLayer, UNLINKED}};
use std::sync::Arc;
use tracing::{debug, info};

impl TransitNetwork {
    /// Derives a network that may be mutated without disturbing this one.
    ///
    /// The copy is semi-shallow: the per-stop array spines and the route
    /// list are duplicated so they can be extended, while every pattern,
    /// schedule and service is shared by reference. A modification that
    /// needs to edit a shared pattern must clone that pattern first.
    ///
    /// `will_be_modified` stamps the copy with a fresh scenario
    /// generation so query caches never serve base-network results for
    /// the modified copy.
    pub fn scenario_copy(&self, will_be_modified: bool) -> TransitNetwork {
        let mut copy = self.clone();
        if will_be_modified {
            copy.scenario_generation = self.scenario_generation + 1;
            info!(
                generation = copy.scenario_generation,
                "Created modifiable scenario copy"
            );
        }
        copy
    }

    /// Appends a stop to a scenario copy, linking it to the street
    /// network within `radius_meters` when possible. Returns the new
    /// stop's index. Transfer lists and distance tables are left short
    /// on purpose: the transfer finder treats the missing tail as the
    /// set of stops still to process.
    pub fn add_stop(
        &mut self,
        street: &dyn StreetLayer,
        id: impl Into<Arc<str>>,
        latitude: f32,
        longitude: f32,
        radius_meters: u32,
    ) -> u32 {
        let index = self.stop_count() as u32;
        let id = id.into();
        let coordinate = Coordinate::new(latitude, longitude);
        let vertex = street
            .nearest_vertex(coordinate, radius_meters)
            .map(|vertex| vertex as i32)
            .unwrap_or(UNLINKED);
        debug!(stop = %id, index, vertex, "Adding scenario stop");

        self.stop_index_for_id.insert(id.clone(), index);
        self.stop_id_for_index.push(id);
        self.stop_names.push(None);
        self.fare_zone_for_stop.push(None);
        self.parent_station_for_stop.push(None);
        self.stop_coordinates.push(coordinate);
        self.street_vertex_for_stop.push(vertex);
        self.wheelchair_boarding_for_stop.push(false);
        if vertex != UNLINKED {
            self.stop_for_street_vertex.insert(vertex as u32, index);
        }
        self.patterns_for_stop.push(Box::new([]));
        index
    }
}
