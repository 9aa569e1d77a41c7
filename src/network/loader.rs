use crate::{
    feed::{
        Feed,
        models::{FeedFrequency, FeedRoute, FeedStopTime, FeedTrip},
    },
    network::{
        TransitNetwork,
        entities::{
            BlockLink, Frequencies, PickDrop, Route, Service, TRIP_FLAG_BICYCLE,
            TRIP_FLAG_WHEELCHAIR, TripPattern, TripSchedule,
        },
        mode::{Mode, ModeError},
    },
    shared::time::Time,
    street::UNLINKED,
};
use bitvec::prelude::*;
use chrono_tz::Tz;
use dashmap::DashMap;
use rayon::prelude::*;
use std::{collections::HashMap, sync::Arc, time::Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Feed {0} has already been loaded into this network")]
    DuplicateFeed(Arc<str>),
    #[error(transparent)]
    Mode(#[from] ModeError),
}

/// How much rider-facing detail to keep resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadLevel {
    /// Skip stop names and route display details.
    Basic,
    Full,
}

/// Counters and collected warnings from one feed load. A load that
/// returns `Ok` with warnings still produced a valid network.
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub stops_added: usize,
    pub routes_added: usize,
    pub services_added: usize,
    pub patterns_added: usize,
    pub trips_added: usize,
    pub trips_rejected: usize,
    pub zero_duration_hops: usize,
    pub warnings: Vec<String>,
}

impl TransitNetwork {
    /// Appends one feed's records to this network. Fatal configuration
    /// errors (duplicate feed, taxi or unknown route types) abort the
    /// load; per-trip data errors are logged, counted, and skipped.
    ///
    /// Call [`rebuild_indexes`] after the last feed.
    ///
    /// [`rebuild_indexes`]: TransitNetwork::rebuild_indexes
    pub fn load(&mut self, feed: &Feed, level: LoadLevel) -> Result<LoadSummary, LoadError> {
        if self.feed_ids.contains(&feed.feed_id) {
            return Err(LoadError::DuplicateFeed(feed.feed_id.clone()));
        }
        let loader = Loader {
            base_pattern: self.pattern_count() as u32,
            network: self,
            feed,
            level,
            summary: LoadSummary::default(),
            stop_index: HashMap::new(),
            service_index: HashMap::new(),
            route_index: HashMap::new(),
            pattern_for_key: HashMap::new(),
            patterns: Vec::new(),
            block_memberships: Vec::new(),
        };
        loader.run()
    }
}

/// Grouping key of a journey pattern: all trips of one route sharing an
/// ordered stop sequence and per-stop pickup/drop-off policies.
#[derive(PartialEq, Eq, Hash)]
struct PatternKey {
    route: u32,
    stops: Vec<u32>,
    pickups: Vec<PickDrop>,
    dropoffs: Vec<PickDrop>,
}

struct Loader<'a> {
    network: &'a mut TransitNetwork,
    feed: &'a Feed,
    level: LoadLevel,
    summary: LoadSummary,
    base_pattern: u32,
    stop_index: HashMap<&'a str, u32>,
    service_index: HashMap<&'a str, u32>,
    route_index: HashMap<&'a str, u32>,
    pattern_for_key: HashMap<PatternKey, usize>,
    /// Patterns created by this load, appended to the network at the end.
    patterns: Vec<TripPattern>,
    block_memberships: Vec<(&'a str, Arc<str>)>,
}

impl<'a> Loader<'a> {
    fn run(mut self) -> Result<LoadSummary, LoadError> {
        info!(feed = %self.feed.feed_id, "Loading feed");
        self.load_stops();
        self.load_services();
        let stop_times = self.group_stop_times();
        let frequencies = self.group_frequencies();
        self.load_trips(&stop_times, &frequencies)?;
        self.sort_schedules();
        self.chain_blocks();
        self.finish_patterns();
        self.network.center = self.network.stop_coordinates.iter().copied().sum();
        self.resolve_time_zone();
        self.network.feed_ids.push(self.feed.feed_id.clone());
        info!(
            feed = %self.feed.feed_id,
            stops = self.summary.stops_added,
            patterns = self.summary.patterns_added,
            trips = self.summary.trips_added,
            rejected = self.summary.trips_rejected,
            "Loaded feed"
        );
        Ok(self.summary)
    }

    fn scoped(&self, id: &str) -> Arc<str> {
        format!("{}:{}", self.feed.feed_id, id).into()
    }

    fn load_stops(&mut self) {
        let now = Instant::now();
        let network = &mut *self.network;
        for stop in &self.feed.stops {
            let index = network.stop_id_for_index.len() as u32;
            let id: Arc<str> = format!("{}:{}", self.feed.feed_id, stop.id).into();
            self.stop_index.insert(stop.id.as_str(), index);
            network.stop_id_for_index.push(id);
            network.stop_names.push(match self.level {
                LoadLevel::Full => stop.name.as_deref().map(Arc::from),
                LoadLevel::Basic => None,
            });
            network
                .fare_zone_for_stop
                .push(stop.zone_id.as_deref().map(Arc::from));
            network
                .parent_station_for_stop
                .push(stop.parent_station.as_deref().map(Arc::from));
            network
                .stop_coordinates
                .push((stop.latitude, stop.longitude).into());
            network.street_vertex_for_stop.push(UNLINKED);
            network
                .wheelchair_boarding_for_stop
                .push(stop.wheelchair_boarding);
            self.summary.stops_added += 1;
        }
        debug!(
            "Loading {} stops took {:?}",
            self.summary.stops_added,
            now.elapsed()
        );
    }

    fn load_services(&mut self) {
        let now = Instant::now();
        for service in &self.feed.services {
            let index = self.network.services.len() as u32;
            self.service_index.insert(service.id.as_str(), index);
            self.network.services.push(Arc::new(Service {
                index,
                id: self.scoped(&service.id),
                weekdays: service.weekdays,
                start_date: service.start_date,
                end_date: service.end_date,
                added_dates: service.added_dates.clone().into(),
                removed_dates: service.removed_dates.clone().into(),
            }));
            self.summary.services_added += 1;
        }
        debug!(
            "Loading {} services took {:?}",
            self.summary.services_added,
            now.elapsed()
        );
    }

    /// Groups stop times by trip in parallel, then orders each trip's
    /// calls by stop sequence.
    fn group_stop_times(&self) -> HashMap<&'a str, Vec<&'a FeedStopTime>> {
        let now = Instant::now();
        let grouped: DashMap<&str, Vec<&FeedStopTime>> = DashMap::new();
        self.feed.stop_times.par_iter().for_each(|stop_time| {
            grouped
                .entry(stop_time.trip_id.as_str())
                .or_default()
                .push(stop_time);
        });
        let mut by_trip = HashMap::with_capacity(grouped.len());
        for (trip_id, mut times) in grouped {
            times.sort_by_key(|stop_time| stop_time.stop_sequence);
            by_trip.insert(trip_id, times);
        }
        debug!(
            "Grouping stop times for {} trips took {:?}",
            by_trip.len(),
            now.elapsed()
        );
        by_trip
    }

    fn group_frequencies(&self) -> HashMap<&'a str, Vec<&'a FeedFrequency>> {
        let mut by_trip: HashMap<&str, Vec<&FeedFrequency>> = HashMap::new();
        for frequency in &self.feed.frequencies {
            by_trip
                .entry(frequency.trip_id.as_str())
                .or_default()
                .push(frequency);
        }
        by_trip
    }

    fn load_trips(
        &mut self,
        stop_times: &HashMap<&'a str, Vec<&'a FeedStopTime>>,
        frequencies: &HashMap<&'a str, Vec<&'a FeedFrequency>>,
    ) -> Result<(), LoadError> {
        let now = Instant::now();
        let routes_by_id: HashMap<&'a str, &'a FeedRoute> = self
            .feed
            .routes
            .iter()
            .map(|route| (route.id.as_str(), route))
            .collect();

        for trip in &self.feed.trips {
            let Some(calls) = stop_times.get(trip.id.as_str()).filter(|c| !c.is_empty()) else {
                self.reject_trip(&trip.id, "no stops");
                continue;
            };

            let Some(stops) = self.resolve_stops(trip, calls) else {
                continue;
            };
            let Some((mut arrivals, mut departures)) = self.resolve_times(trip, calls) else {
                continue;
            };

            let Some(service_index) = self.service_index.get(trip.service_id.as_str()).copied()
            else {
                self.reject_trip(&trip.id, "unknown service id");
                continue;
            };

            let Some(&feed_route) = routes_by_id.get(trip.route_id.as_str()) else {
                self.reject_trip(&trip.id, "unknown route id");
                continue;
            };
            let route = self.route_for(feed_route)?;

            let frequencies = match self.build_frequencies(trip, frequencies) {
                Ok(frequencies) => frequencies,
                Err(()) => continue,
            };
            if frequencies.is_some() {
                // Frequency trips run relative to each window start.
                let origin = arrivals[0];
                for time in arrivals.iter_mut().chain(departures.iter_mut()) {
                    *time = Time::from_seconds(time.as_seconds() - origin.as_seconds());
                }
            }

            let pickups: Vec<PickDrop> = calls
                .iter()
                .map(|call| PickDrop::from_gtfs_code(call.pickup_type))
                .collect();
            let dropoffs: Vec<PickDrop> = calls
                .iter()
                .map(|call| PickDrop::from_gtfs_code(call.drop_off_type))
                .collect();

            let pattern = self.pattern_for(trip, route, stops, pickups, dropoffs);

            let mut flags = 0u8;
            if trip.bicycles_allowed {
                flags |= TRIP_FLAG_BICYCLE;
            }
            if trip.wheelchair_accessible {
                flags |= TRIP_FLAG_WHEELCHAIR;
            }

            let is_frequency = frequencies.is_some();
            let schedule = TripSchedule {
                trip_id: self.scoped(&trip.id),
                arrivals: arrivals.into(),
                departures: departures.into(),
                service_index,
                flags,
                frequencies,
                next_in_block: None,
            };
            let pattern = &mut self.patterns[pattern];
            pattern.schedules.push(schedule);
            if is_frequency {
                pattern.has_frequencies = true;
            } else {
                pattern.has_schedules = true;
            }

            if let Some(block) = trip.block_id.as_deref() {
                self.block_memberships.push((block, self.scoped(&trip.id)));
            }
            self.summary.trips_added += 1;
        }
        debug!(
            "Loading {} trips took {:?}",
            self.summary.trips_added,
            now.elapsed()
        );
        Ok(())
    }

    fn resolve_stops(&mut self, trip: &FeedTrip, calls: &[&FeedStopTime]) -> Option<Vec<u32>> {
        let mut stops = Vec::with_capacity(calls.len());
        for call in calls {
            match self.stop_index.get(call.stop_id.as_str()) {
                Some(&stop) => stops.push(stop),
                None => {
                    self.reject_trip(&trip.id, "references a stop missing from the feed");
                    return None;
                }
            }
        }
        Some(stops)
    }

    /// Pulls arrival/departure arrays out of the ordered calls,
    /// interpolating untimed intermediate calls hop-proportionally.
    /// Rejects the trip when the endpoints are untimed or times run
    /// backwards; zero-duration hops are permitted and counted.
    fn resolve_times(
        &mut self,
        trip: &FeedTrip,
        calls: &[&FeedStopTime],
    ) -> Option<(Vec<Time>, Vec<Time>)> {
        let mut arrivals: Vec<Option<Time>> = Vec::with_capacity(calls.len());
        let mut departures: Vec<Option<Time>> = Vec::with_capacity(calls.len());
        for call in calls {
            let arrival = call.arrival_time.or(call.departure_time);
            let departure = call.departure_time.or(call.arrival_time);
            arrivals.push(arrival);
            departures.push(departure);
        }

        if arrivals[0].is_none() || arrivals[calls.len() - 1].is_none() {
            self.reject_trip(&trip.id, "first or last stop has no time");
            return None;
        }

        // Interpolate each untimed gap between two timed calls.
        let mut prev_timed = 0usize;
        for i in 1..calls.len() {
            if arrivals[i].is_none() {
                continue;
            }
            if i > prev_timed + 1 {
                let from = departures[prev_timed].unwrap().as_seconds();
                let to = arrivals[i].unwrap().as_seconds();
                if to < from {
                    self.reject_trip(&trip.id, "negative travel time across untimed stops");
                    return None;
                }
                let hops = (i - prev_timed) as u32;
                for k in prev_timed + 1..i {
                    let offset = (to - from) * (k - prev_timed) as u32 / hops;
                    let time = Time::from_seconds(from + offset);
                    arrivals[k] = Some(time);
                    departures[k] = Some(time);
                }
            }
            prev_timed = i;
        }

        let arrivals: Vec<Time> = arrivals.into_iter().map(|t| t.unwrap()).collect();
        let departures: Vec<Time> = departures.into_iter().map(|t| t.unwrap()).collect();

        for i in 0..arrivals.len() {
            if departures[i] < arrivals[i] {
                self.reject_trip(&trip.id, "departs before it arrives");
                return None;
            }
            if i > 0 {
                if arrivals[i] < departures[i - 1] {
                    self.reject_trip(&trip.id, "negative travel time between stops");
                    return None;
                }
                if arrivals[i] == departures[i - 1] {
                    // Usually a rounding artifact in the source data.
                    self.summary.zero_duration_hops += 1;
                }
            }
        }
        Some((arrivals, departures))
    }

    fn route_for(&mut self, feed_route: &'a FeedRoute) -> Result<u32, LoadError> {
        if let Some(&index) = self.route_index.get(feed_route.id.as_str()) {
            return Ok(index);
        }
        let mode = Mode::from_route_type(feed_route.route_type)?;
        let index = self.network.routes.len() as u32;
        let (short_name, long_name, color) = match self.level {
            LoadLevel::Full => (
                feed_route.short_name.as_deref().map(Arc::from),
                feed_route.long_name.as_deref().map(Arc::from),
                feed_route.color.as_deref().map(Arc::from),
            ),
            LoadLevel::Basic => (None, None, None),
        };
        self.network.routes.push(Arc::new(Route {
            index,
            id: self.scoped(&feed_route.id),
            short_name,
            long_name,
            route_type: feed_route.route_type,
            mode,
            color,
            agency_id: feed_route.agency_id.as_deref().map(Arc::from),
        }));
        self.route_index.insert(feed_route.id.as_str(), index);
        self.summary.routes_added += 1;
        Ok(index)
    }

    fn pattern_for(
        &mut self,
        trip: &FeedTrip,
        route: u32,
        stops: Vec<u32>,
        pickups: Vec<PickDrop>,
        dropoffs: Vec<PickDrop>,
    ) -> usize {
        let key = PatternKey {
            route,
            stops,
            pickups,
            dropoffs,
        };
        if let Some(&index) = self.pattern_for_key.get(&key) {
            return index;
        }
        let wheelchair_accessible: BitVec<usize, Lsb0> = key
            .stops
            .iter()
            .map(|&stop| self.network.wheelchair_boarding_for_stop[stop as usize])
            .collect();
        let pattern = TripPattern {
            original_id: self.base_pattern + self.patterns.len() as u32,
            route_index: route,
            direction_id: trip.direction_id,
            stops: key.stops.clone().into(),
            pickups: key.pickups.clone().into(),
            dropoffs: key.dropoffs.clone().into(),
            wheelchair_accessible,
            schedules: Vec::new(),
            has_schedules: false,
            has_frequencies: false,
            services_active: BitVec::new(),
        };
        let index = self.patterns.len();
        self.patterns.push(pattern);
        self.pattern_for_key.insert(key, index);
        self.summary.patterns_added += 1;
        index
    }

    /// `Err(())` means the trip was rejected; `Ok(None)` a purely
    /// scheduled trip.
    fn build_frequencies(
        &mut self,
        trip: &FeedTrip,
        frequencies: &HashMap<&'a str, Vec<&'a FeedFrequency>>,
    ) -> Result<Option<Frequencies>, ()> {
        let Some(entries) = frequencies.get(trip.id.as_str()) else {
            return Ok(None);
        };
        let valid: Vec<&&FeedFrequency> = entries
            .iter()
            .filter(|entry| entry.end_time >= entry.start_time)
            .collect();
        if valid.is_empty() {
            self.reject_trip(&trip.id, "every frequency entry ends before it starts");
            return Err(());
        }
        if valid.len() < entries.len() {
            let dropped = entries.len() - valid.len();
            warn!(trip = %trip.id, dropped, "Dropping frequency entries that end before they start");
        }
        let entry_ids: Vec<Arc<str>> = (0..valid.len())
            .map(|i| format!("{}:{}#{}", self.feed.feed_id, trip.id, i).into())
            .collect();
        Ok(Some(Frequencies {
            entry_ids: entry_ids.into(),
            headway_seconds: valid.iter().map(|entry| entry.headway_seconds).collect(),
            start_times: valid.iter().map(|entry| entry.start_time).collect(),
            end_times: valid.iter().map(|entry| entry.end_time).collect(),
        }))
    }

    fn sort_schedules(&mut self) {
        for pattern in &mut self.patterns {
            pattern
                .schedules
                .sort_by_key(|schedule| schedule.first_departure());
        }
    }

    /// Chains trips sharing a block into a forward linked list in
    /// ascending first-departure order. A link is only set when the
    /// earlier trip is done before the later one leaves.
    fn chain_blocks(&mut self) {
        if self.block_memberships.is_empty() {
            return;
        }
        let mut position: HashMap<Arc<str>, (usize, usize)> = HashMap::new();
        for (p, pattern) in self.patterns.iter().enumerate() {
            for (s, schedule) in pattern.schedules.iter().enumerate() {
                position.insert(schedule.trip_id.clone(), (p, s));
            }
        }
        let mut blocks: HashMap<&'a str, Vec<(usize, usize)>> = HashMap::new();
        for &(block, ref trip_id) in &self.block_memberships {
            if let Some(&slot) = position.get(trip_id) {
                blocks.entry(block).or_default().push(slot);
            }
        }
        for (_, mut members) in blocks {
            if members.len() < 2 {
                continue;
            }
            members.sort_by_key(|&(p, s)| self.patterns[p].schedules[s].first_departure());
            for i in 0..members.len() - 1 {
                let (ap, a_slot) = members[i];
                let (bp, b_slot) = members[i + 1];
                let a_last = self.patterns[ap].schedules[a_slot].last_arrival();
                let b_first = self.patterns[bp].schedules[b_slot].first_departure();
                if a_last <= b_first {
                    self.patterns[ap].schedules[a_slot].next_in_block = Some(BlockLink {
                        pattern: self.base_pattern + bp as u32,
                        schedule: b_slot as u32,
                    });
                }
            }
        }
    }

    fn finish_patterns(&mut self) {
        let service_count = self.network.services.len();
        for mut pattern in self.patterns.drain(..) {
            let mut services_active = bitvec!(usize, Lsb0; 0; service_count);
            for schedule in &pattern.schedules {
                services_active.set(schedule.service_index as usize, true);
            }
            pattern.services_active = services_active;
            self.network.trip_patterns.push(Arc::new(pattern));
        }
    }

    fn resolve_time_zone(&mut self) {
        let mut any_valid = false;
        for agency in &self.feed.agencies {
            match agency.time_zone.parse::<Tz>() {
                Ok(zone) => {
                    any_valid = true;
                    match self.network.time_zone {
                        None => self.network.time_zone = Some(zone),
                        Some(existing) if existing != zone => {
                            let message = format!(
                                "Agency {} uses time zone {zone} but the network uses {existing}; keeping {existing}",
                                agency.name
                            );
                            warn!("{message}");
                            self.summary.warnings.push(message);
                        }
                        Some(_) => {}
                    }
                }
                Err(_) => {
                    warn!(agency = %agency.name, zone = %agency.time_zone, "Skipping agency with unparseable time zone");
                }
            }
        }
        if !any_valid && self.network.time_zone.is_none() && !self.feed.agencies.is_empty() {
            let message = format!(
                "Feed {} has no agency with a parseable time zone; defaulting to UTC",
                self.feed.feed_id
            );
            warn!("{message}");
            self.summary.warnings.push(message);
        }
    }

    fn reject_trip(&mut self, trip_id: &str, reason: &str) {
        debug!(feed = %self.feed.feed_id, trip = %trip_id, reason, "Rejecting trip");
        self.summary.trips_rejected += 1;
    }
}
