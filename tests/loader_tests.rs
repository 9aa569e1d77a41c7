mod common;

use common::*;
use headway::{
    feed::{Feed, models::FeedFrequency},
    network::{LoadError, LoadLevel, ModeError, TransitNetwork},
    shared::Time,
};

fn two_trip_feed() -> Feed {
    let mut feed = Feed::new("f1");
    feed.stops = vec![
        stop("a", 59.30, 18.00),
        stop("b", 59.31, 18.01),
        stop("c", 59.32, 18.02),
    ];
    feed.routes = vec![bus_route("r1")];
    feed.services = vec![weekday_service("wk")];
    feed.trips = vec![trip("t1", "r1", "wk"), trip("t2", "r1", "wk")];
    feed.stop_times = vec![
        call("t1", "a", 1, 28800, 28800),
        call("t1", "b", 2, 29100, 29100),
        call("t1", "c", 3, 29400, 29400),
        call("t2", "a", 1, 30600, 30600),
        call("t2", "b", 2, 30900, 30900),
        call("t2", "c", 3, 31200, 31200),
    ];
    feed
}

#[test]
fn trips_sharing_a_stop_sequence_share_a_pattern() {
    let network = build_network(&two_trip_feed());
    assert_eq!(network.pattern_count(), 1);
    let pattern = &network.trip_patterns[0];
    assert_eq!(pattern.schedules.len(), 2);
    assert_eq!(pattern.stops.as_ref(), &[0, 1, 2]);
    assert!(pattern.has_schedules);
    assert!(!pattern.has_frequencies);
}

#[test]
fn different_stop_sequences_split_patterns() {
    let mut feed = two_trip_feed();
    // t3 skips stop b
    feed.trips.push(trip("t3", "r1", "wk"));
    feed.stop_times.push(call("t3", "a", 1, 32400, 32400));
    feed.stop_times.push(call("t3", "c", 2, 33000, 33000));
    let network = build_network(&feed);
    assert_eq!(network.pattern_count(), 2);
    assert_eq!(network.trip_patterns[0].original_id, 0);
    assert_eq!(network.trip_patterns[1].original_id, 1);
}

#[test]
fn schedules_sorted_by_first_departure() {
    let mut feed = two_trip_feed();
    // swap declaration order; t2 departs later and must sort second
    feed.trips.swap(0, 1);
    let network = build_network(&feed);
    let pattern = &network.trip_patterns[0];
    assert!(pattern.schedules[0].first_departure() <= pattern.schedules[1].first_departure());
    assert_eq!(&*pattern.schedules[0].trip_id, "f1:t1");
}

#[test]
fn duplicate_feed_rejected() {
    let feed = two_trip_feed();
    let mut network = TransitNetwork::new();
    network.load(&feed, LoadLevel::Full).unwrap();
    let result = network.load(&feed, LoadLevel::Full);
    assert!(matches!(result, Err(LoadError::DuplicateFeed(id)) if &*id == "f1"));
}

#[test]
fn taxi_route_is_fatal() {
    let mut feed = two_trip_feed();
    feed.routes.push(route("cab", 1500));
    feed.trips.push(trip("t9", "cab", "wk"));
    feed.stop_times.push(call("t9", "a", 1, 28800, 28800));
    feed.stop_times.push(call("t9", "b", 2, 29000, 29000));
    let mut network = TransitNetwork::new();
    let result = network.load(&feed, LoadLevel::Full);
    assert!(matches!(
        result,
        Err(LoadError::Mode(ModeError::TaxiServiceUnsupported(1500)))
    ));
}

#[test]
fn negative_travel_time_rejects_trip() {
    let mut feed = two_trip_feed();
    feed.trips.push(trip("bad", "r1", "wk"));
    feed.stop_times.push(call("bad", "a", 1, 30000, 30000));
    feed.stop_times.push(call("bad", "b", 2, 29000, 29000));
    let mut network = TransitNetwork::new();
    let summary = network.load(&feed, LoadLevel::Full).unwrap();
    assert_eq!(summary.trips_rejected, 1);
    assert_eq!(summary.trips_added, 2);
    // the rejected trip left no schedule behind
    assert_eq!(network.trip_patterns[0].schedules.len(), 2);
}

#[test]
fn departure_before_arrival_rejects_trip() {
    let mut feed = two_trip_feed();
    feed.trips.push(trip("bad", "r1", "wk"));
    feed.stop_times.push(timed_call("bad", "a", 1, 30000, 29900));
    feed.stop_times.push(call("bad", "b", 2, 30500, 30500));
    let mut network = TransitNetwork::new();
    let summary = network.load(&feed, LoadLevel::Full).unwrap();
    assert_eq!(summary.trips_rejected, 1);
}

#[test]
fn zero_duration_hop_is_loaded_and_counted() {
    let mut feed = two_trip_feed();
    feed.trips.push(trip("t0", "r1", "wk"));
    // arrival at the second stop equals departure from the first
    feed.stop_times.push(call("t0", "a", 1, 28800, 28800));
    feed.stop_times.push(call("t0", "b", 2, 28800, 28800));
    let mut network = TransitNetwork::new();
    let summary = network.load(&feed, LoadLevel::Full).unwrap();
    assert_eq!(summary.zero_duration_hops, 1);
    assert_eq!(summary.trips_rejected, 0);
    assert_eq!(summary.trips_added, 3);
}

#[test]
fn intermediate_times_interpolated() {
    let mut feed = two_trip_feed();
    feed.trips.push(trip("t4", "r1", "wk"));
    feed.stop_times.push(call("t4", "a", 1, 36000, 36000));
    feed.stop_times.push(untimed_call("t4", "b", 2));
    feed.stop_times.push(call("t4", "c", 3, 36600, 36600));
    let network = build_network(&feed);
    let pattern = network
        .trip_patterns
        .iter()
        .find(|pattern| {
            pattern
                .schedules
                .iter()
                .any(|schedule| &*schedule.trip_id == "f1:t4")
        })
        .unwrap();
    let schedule = pattern
        .schedules
        .iter()
        .find(|schedule| &*schedule.trip_id == "f1:t4")
        .unwrap();
    assert_eq!(schedule.arrivals[1], Time::from_seconds(36300));
    assert_eq!(schedule.departures[1], Time::from_seconds(36300));
}

#[test]
fn missing_endpoint_time_rejects_trip() {
    let mut feed = two_trip_feed();
    feed.trips.push(trip("t5", "r1", "wk"));
    feed.stop_times.push(untimed_call("t5", "a", 1));
    feed.stop_times.push(call("t5", "b", 2, 36600, 36600));
    let mut network = TransitNetwork::new();
    let summary = network.load(&feed, LoadLevel::Full).unwrap();
    assert_eq!(summary.trips_rejected, 1);
}

#[test]
fn trip_with_no_stop_times_is_skipped() {
    let mut feed = two_trip_feed();
    feed.trips.push(trip("ghost", "r1", "wk"));
    let mut network = TransitNetwork::new();
    let summary = network.load(&feed, LoadLevel::Full).unwrap();
    assert_eq!(summary.trips_rejected, 1);
    assert_eq!(summary.trips_added, 2);
}

#[test]
fn frequency_times_normalized_to_zero() {
    let mut feed = two_trip_feed();
    feed.frequencies = vec![FeedFrequency {
        trip_id: "t1".into(),
        start_time: Time::from_seconds(21600),
        end_time: Time::from_seconds(32400),
        headway_seconds: 600,
        exact_times: false,
    }];
    let network = build_network(&feed);
    let pattern = &network.trip_patterns[0];
    let schedule = pattern
        .schedules
        .iter()
        .find(|schedule| &*schedule.trip_id == "f1:t1")
        .unwrap();
    assert!(schedule.is_frequency_based());
    assert_eq!(schedule.arrivals[0], Time::from_seconds(0));
    assert_eq!(schedule.arrivals[1], Time::from_seconds(300));
    assert!(pattern.has_frequencies);
    let frequencies = schedule.frequencies.as_ref().unwrap();
    assert_eq!(frequencies.headway_seconds.as_ref(), &[600]);
    assert_eq!(&*frequencies.entry_ids[0], "f1:t1#0");
}

#[test]
fn trip_rejected_when_every_frequency_entry_inverted() {
    let mut feed = two_trip_feed();
    feed.frequencies = vec![FeedFrequency {
        trip_id: "t1".into(),
        start_time: Time::from_seconds(32400),
        end_time: Time::from_seconds(21600),
        headway_seconds: 600,
        exact_times: false,
    }];
    let mut network = TransitNetwork::new();
    let summary = network.load(&feed, LoadLevel::Full).unwrap();
    assert_eq!(summary.trips_rejected, 1);
    assert_eq!(summary.trips_added, 1);
}

#[test]
fn block_trips_chained_in_departure_order() {
    let mut feed = two_trip_feed();
    feed.trips[0].block_id = Some("veh1".into());
    feed.trips[1].block_id = Some("veh1".into());
    let network = build_network(&feed);
    let pattern = &network.trip_patterns[0];
    // t1 (ends 29400) precedes t2 (starts 30600): link set forward only
    let first = &pattern.schedules[0];
    let second = &pattern.schedules[1];
    let link = first.next_in_block.expect("forward link");
    assert_eq!(link.pattern, 0);
    assert_eq!(link.schedule, 1);
    assert!(second.next_in_block.is_none());
}

#[test]
fn overlapping_block_trips_not_chained() {
    let mut feed = two_trip_feed();
    // make t2 start before t1 ends
    feed.stop_times[3] = call("t2", "a", 1, 29000, 29000);
    feed.stop_times[4] = call("t2", "b", 2, 29200, 29200);
    feed.stop_times[5] = call("t2", "c", 3, 29300, 29300);
    feed.trips[0].block_id = Some("veh1".into());
    feed.trips[1].block_id = Some("veh1".into());
    let network = build_network(&feed);
    let pattern = &network.trip_patterns[0];
    assert!(pattern.schedules.iter().all(|s| s.next_in_block.is_none()));
}

#[test]
fn basic_load_level_omits_names() {
    let feed = two_trip_feed();
    let mut network = TransitNetwork::new();
    network.load(&feed, LoadLevel::Basic).unwrap();
    assert!(network.stop_names.iter().all(|name| name.is_none()));
    assert!(network.routes[0].short_name.is_none());
}

#[test]
fn full_load_level_keeps_names() {
    let network = build_network(&two_trip_feed());
    assert_eq!(network.stop_names[0].as_deref(), Some("Stop a"));
    assert_eq!(network.routes[0].short_name.as_deref(), Some("R1"));
}

#[test]
fn services_active_is_union_of_schedule_services() {
    let mut feed = two_trip_feed();
    feed.services.push(weekend_service("we"));
    feed.trips.push(trip("t6", "r1", "we"));
    feed.stop_times.push(call("t6", "a", 1, 40000, 40000));
    feed.stop_times.push(call("t6", "b", 2, 40300, 40300));
    feed.stop_times.push(call("t6", "c", 3, 40600, 40600));
    let network = build_network(&feed);
    let pattern = &network.trip_patterns[0];
    assert!(pattern.services_active[0]);
    assert!(pattern.services_active[1]);
}

#[test]
fn center_of_map_is_stop_mean() {
    let network = build_network(&two_trip_feed());
    assert!((network.center.latitude - 59.31).abs() < 1e-3);
    assert!((network.center.longitude - 18.01).abs() < 1e-3);
}

#[test]
fn time_zone_from_first_parseable_agency() {
    use headway::feed::models::FeedAgency;
    let mut feed = two_trip_feed();
    feed.agencies = vec![
        FeedAgency {
            id: None,
            name: "Broken".into(),
            time_zone: "Not/AZone".into(),
            url: None,
        },
        FeedAgency {
            id: None,
            name: "SL".into(),
            time_zone: "Europe/Stockholm".into(),
            url: None,
        },
        FeedAgency {
            id: None,
            name: "Other".into(),
            time_zone: "Europe/Berlin".into(),
            url: None,
        },
    ];
    let mut network = TransitNetwork::new();
    let summary = network.load(&feed, LoadLevel::Full).unwrap();
    assert_eq!(network.time_zone(), chrono_tz::Tz::Europe__Stockholm);
    // the disagreeing agency produced a warning, not a failure
    assert_eq!(summary.warnings.len(), 1);
}

#[test]
fn network_without_agencies_defaults_to_utc() {
    let network = build_network(&two_trip_feed());
    assert_eq!(network.time_zone(), chrono_tz::Tz::UTC);
}

#[test]
fn pickup_policy_splits_patterns() {
    use headway::network::PickDrop;
    let mut feed = two_trip_feed();
    // t2 becomes drop-off only at the last stop
    feed.stop_times[5].pickup_type = 1;
    let network = build_network(&feed);
    assert_eq!(network.pattern_count(), 2);
    let restricted = &network.trip_patterns[1];
    assert_eq!(restricted.pickups[2], PickDrop::NoneAvailable);
    assert_eq!(restricted.dropoffs[2], PickDrop::Scheduled);
}

#[test]
fn trip_flags_packed_from_record() {
    let mut feed = two_trip_feed();
    feed.trips[0].bicycles_allowed = true;
    feed.trips[1].wheelchair_accessible = true;
    let network = build_network(&feed);
    let pattern = &network.trip_patterns[0];
    let first = &pattern.schedules[0];
    let second = &pattern.schedules[1];
    assert!(first.bicycles_allowed());
    assert!(!first.wheelchair_accessible());
    assert!(second.wheelchair_accessible());
    assert!(!second.bicycles_allowed());
}

#[test]
fn pattern_accessibility_mirrors_stop_flags() {
    let mut feed = two_trip_feed();
    feed.stops[1].wheelchair_boarding = true;
    let network = build_network(&feed);
    let pattern = &network.trip_patterns[0];
    assert!(!pattern.wheelchair_accessible[0]);
    assert!(pattern.wheelchair_accessible[1]);
    assert!(!pattern.wheelchair_accessible[2]);
}

#[test]
fn second_feed_appends_with_offset_indices() {
    let mut network = TransitNetwork::new();
    network.load(&two_trip_feed(), LoadLevel::Full).unwrap();

    let mut other = two_trip_feed();
    other.feed_id = "f2".into();
    network.load(&other, LoadLevel::Full).unwrap();
    network.rebuild_indexes();

    assert_eq!(network.stop_count(), 6);
    assert_eq!(network.pattern_count(), 2);
    assert_eq!(network.trip_patterns[1].stops.as_ref(), &[3, 4, 5]);
    assert_eq!(network.stop_index("f1:a"), Some(0));
    assert_eq!(network.stop_index("f2:a"), Some(3));
}
