mod common;

use common::*;
use headway::{
    distance::build_stop_distance_tables,
    feed::Feed,
    shared::Bounds,
};

fn small_feed() -> Feed {
    let mut feed = Feed::new("f1");
    feed.stops = vec![stop("a", 59.30, 18.00), stop("b", 61.00, 19.00)];
    feed.routes = vec![bus_route("r1")];
    feed.services = vec![weekday_service("wk")];
    feed.trips = vec![trip("t1", "r1", "wk")];
    feed.stop_times = vec![
        call("t1", "a", 1, 28800, 28800),
        call("t1", "b", 2, 29400, 29400),
    ];
    feed
}

#[test]
fn tables_packed_and_sorted_by_vertex() {
    let mut network = build_network(&small_feed());
    network.street_vertex_for_stop[0] = 5;
    network.rebuild_indexes();
    let street = MockStreet::new().with_vertices_from(5, &[(9, 120_000), (6, 50_000), (7, 80_000)]);

    build_stop_distance_tables(&mut network, &street, None);

    let table = network.stop_to_vertex_distances(0).expect("table built");
    assert_eq!(table.as_ref(), &[6, 50_000, 7, 80_000, 9, 120_000]);
}

#[test]
fn unlinked_stop_has_no_table() {
    let mut network = build_network(&small_feed());
    network.street_vertex_for_stop[0] = 5;
    network.rebuild_indexes();
    let street = MockStreet::new().with_vertices_from(5, &[(6, 50_000)]);

    build_stop_distance_tables(&mut network, &street, None);

    assert!(network.stop_to_vertex_distances(0).is_some());
    assert!(network.stop_to_vertex_distances(1).is_none());
}

#[test]
fn radius_bounds_the_walk_tree() {
    let mut network = build_network(&small_feed());
    network.street_vertex_for_stop[0] = 5;
    network.rebuild_indexes();
    // 2.4 km is past the 2 km table radius
    let street = MockStreet::new().with_vertices_from(5, &[(6, 50_000), (8, 2_400_000)]);

    build_stop_distance_tables(&mut network, &street, None);

    let table = network.stop_to_vertex_distances(0).unwrap();
    assert_eq!(table.as_ref(), &[6, 50_000]);
}

#[test]
fn rebuild_zone_preserves_outside_tables() {
    let mut network = build_network(&small_feed());
    network.street_vertex_for_stop[0] = 5;
    network.street_vertex_for_stop[1] = 15;
    network.rebuild_indexes();
    let street = MockStreet::new()
        .with_vertices_from(5, &[(6, 50_000)])
        .with_vertices_from(15, &[(16, 70_000)]);
    build_stop_distance_tables(&mut network, &street, None);
    let stale = network.stop_to_vertex_distances(1).unwrap().clone();

    // rebuild only around stop a with changed street data
    let changed = MockStreet::new()
        .with_vertices_from(5, &[(6, 40_000)])
        .with_vertices_from(15, &[(16, 10_000)]);
    let zone = Bounds {
        min_latitude: 59.0,
        max_latitude: 59.5,
        min_longitude: 17.5,
        max_longitude: 18.5,
    };
    build_stop_distance_tables(&mut network, &changed, Some(&zone));

    assert_eq!(
        network.stop_to_vertex_distances(0).unwrap().as_ref(),
        &[6, 40_000]
    );
    // stop b sits outside the zone: its table is untouched
    assert_eq!(network.stop_to_vertex_distances(1).unwrap().as_ref(), stale.as_ref());
}
