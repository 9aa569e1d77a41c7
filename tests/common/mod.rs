#![allow(dead_code)]

use headway::{
    feed::{
        Feed,
        models::{FeedRoute, FeedService, FeedStop, FeedStopTime, FeedTrip},
    },
    network::{LoadLevel, TransitNetwork},
    shared::{Coordinate, Distance, Time},
    street::{StreetLayer, StreetSearch, StreetState},
};
use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Street layer backed by explicit per-origin reach tables. Distances
/// are millimetres.
#[derive(Default)]
pub struct MockStreet {
    /// origin vertex -> [(stop index, distance mm)]
    pub stops_from: HashMap<u32, Vec<(u32, u32)>>,
    /// origin vertex -> [(vertex, distance mm)]
    pub vertices_from: HashMap<u32, Vec<(u32, u32)>>,
    /// linkable points for nearest_vertex: (coordinate, vertex)
    pub linkable: Vec<(Coordinate, u32)>,
    pub searches_started: AtomicUsize,
}

impl MockStreet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stops_from(mut self, origin: u32, reached: &[(u32, u32)]) -> Self {
        self.stops_from.insert(origin, reached.to_vec());
        self
    }

    pub fn with_vertices_from(mut self, origin: u32, reached: &[(u32, u32)]) -> Self {
        self.vertices_from.insert(origin, reached.to_vec());
        self
    }

    pub fn with_linkable(mut self, latitude: f32, longitude: f32, vertex: u32) -> Self {
        self.linkable
            .push((Coordinate::new(latitude, longitude), vertex));
        self
    }

    pub fn search_count(&self) -> usize {
        self.searches_started.load(Ordering::SeqCst)
    }
}

pub struct MockSearch<'a> {
    street: &'a MockStreet,
    origin: u32,
    limit_millimeters: u32,
}

impl StreetLayer for MockStreet {
    fn searcher(&self) -> Box<dyn StreetSearch + '_> {
        self.searches_started.fetch_add(1, Ordering::SeqCst);
        Box::new(MockSearch {
            street: self,
            origin: u32::MAX,
            limit_millimeters: u32::MAX,
        })
    }

    fn nearest_vertex(&self, coordinate: Coordinate, radius_meters: u32) -> Option<u32> {
        self.linkable
            .iter()
            .filter(|(candidate, _)| {
                candidate.distance_to(&coordinate).as_meters() <= radius_meters
            })
            .min_by_key(|(candidate, _)| candidate.distance_to(&coordinate))
            .map(|&(_, vertex)| vertex)
    }
}

impl StreetSearch for MockSearch<'_> {
    fn set_origin(&mut self, vertex: u32) {
        self.origin = vertex;
    }

    fn set_distance_limit_meters(&mut self, meters: u32) {
        self.limit_millimeters = meters * 1000;
    }

    fn route(&mut self) {}

    fn reached_stops(&self) -> HashMap<u32, Distance> {
        self.street
            .stops_from
            .get(&self.origin)
            .into_iter()
            .flatten()
            .filter(|&&(_, mm)| mm <= self.limit_millimeters)
            .map(|&(stop, mm)| (stop, Distance::from_millimeters(mm)))
            .collect()
    }

    fn reached_vertices(&self) -> HashMap<u32, Distance> {
        self.street
            .vertices_from
            .get(&self.origin)
            .into_iter()
            .flatten()
            .filter(|&&(_, mm)| mm <= self.limit_millimeters)
            .map(|&(vertex, mm)| (vertex, Distance::from_millimeters(mm)))
            .collect()
    }

    fn state_at_vertex(&self, vertex: u32) -> Option<StreetState> {
        self.street
            .vertices_from
            .get(&self.origin)
            .into_iter()
            .flatten()
            .find(|&&(reached, mm)| reached == vertex && mm <= self.limit_millimeters)
            .map(|&(reached, mm)| StreetState {
                vertex: reached,
                distance: Distance::from_millimeters(mm),
                back: Some(Box::new(StreetState {
                    vertex: self.origin,
                    distance: Distance::from_millimeters(0),
                    back: None,
                })),
            })
    }
}

// --- Feed record builders ---

pub fn stop(id: &str, latitude: f32, longitude: f32) -> FeedStop {
    FeedStop {
        id: id.into(),
        name: Some(format!("Stop {id}")),
        latitude,
        longitude,
        zone_id: None,
        parent_station: None,
        wheelchair_boarding: false,
    }
}

pub fn bus_route(id: &str) -> FeedRoute {
    route(id, 3)
}

pub fn route(id: &str, route_type: i32) -> FeedRoute {
    FeedRoute {
        id: id.into(),
        agency_id: None,
        short_name: Some(id.to_uppercase()),
        long_name: None,
        route_type,
        color: None,
    }
}

/// Monday through Friday, all of 2024.
pub fn weekday_service(id: &str) -> FeedService {
    FeedService {
        id: id.into(),
        weekdays: 0b0001_1111,
        start_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1),
        end_date: chrono::NaiveDate::from_ymd_opt(2024, 12, 31),
        added_dates: vec![],
        removed_dates: vec![],
    }
}

/// Saturday and Sunday, all of 2024.
pub fn weekend_service(id: &str) -> FeedService {
    FeedService {
        weekdays: 0b0110_0000,
        ..weekday_service(id)
    }
}

pub fn trip(id: &str, route_id: &str, service_id: &str) -> FeedTrip {
    FeedTrip {
        id: id.into(),
        route_id: route_id.into(),
        service_id: service_id.into(),
        direction_id: Some(0),
        block_id: None,
        shape_id: None,
        wheelchair_accessible: false,
        bicycles_allowed: false,
    }
}

pub fn call(trip_id: &str, stop_id: &str, sequence: u32, arrival: u32, departure: u32) -> FeedStopTime {
    FeedStopTime {
        trip_id: trip_id.into(),
        stop_id: stop_id.into(),
        stop_sequence: sequence,
        arrival_time: Some(Time::from_seconds(arrival)),
        departure_time: Some(Time::from_seconds(departure)),
        pickup_type: 0,
        drop_off_type: 0,
    }
}

pub fn timed_call(
    trip_id: &str,
    stop_id: &str,
    sequence: u32,
    arrival: u32,
    departure: u32,
) -> FeedStopTime {
    let mut stop_time = call(trip_id, stop_id, sequence, arrival, arrival);
    stop_time.departure_time = Some(Time::from_seconds(departure));
    stop_time
}

pub fn untimed_call(trip_id: &str, stop_id: &str, sequence: u32) -> FeedStopTime {
    FeedStopTime {
        trip_id: trip_id.into(),
        stop_id: stop_id.into(),
        stop_sequence: sequence,
        arrival_time: None,
        departure_time: None,
        pickup_type: 0,
        drop_off_type: 0,
    }
}

/// Loads the feed at full detail and rebuilds indexes.
pub fn build_network(feed: &Feed) -> TransitNetwork {
    let mut network = TransitNetwork::new();
    network
        .load(feed, LoadLevel::Full)
        .expect("feed should load");
    network.rebuild_indexes();
    network
}
