use crate::{network::TransitNetwork, street::StreetTimeAndMode};
use std::collections::HashMap;
use thiserror::Error;
use tracing::trace;

/// Best-time value for a stop a round never reached.
pub const UNREACHED: u32 = u32::MAX;
/// "No previous pattern / stop / transfer" marker in round state.
pub const NONE: i32 = -1;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Destination stop {0} was never reached by transit")]
    Unreached(u32),
    #[error("Back-pointer chain broken at stop {stop} in round {round}")]
    BrokenChain { stop: u32, round: usize },
}

/// Per-round output of an external multi-round search, indexed
/// `[round][stop]`. Rounds chain backwards in time: round `r` state at a
/// stop describes the transit leg that reached it with `r` rides.
#[derive(Debug)]
pub struct RaptorState {
    /// Best arrival time at each stop per round, excluding same-round
    /// transfer arrivals; [`UNREACHED`] where a round never arrived.
    pub best_non_transfer_times: Vec<Box<[u32]>>,
    pub previous_patterns: Vec<Box<[i32]>>,
    pub previous_stop: Vec<Box<[i32]>>,
    pub previous_wait_time: Vec<Box<[u32]>>,
    pub previous_in_vehicle_time: Vec<Box<[u32]>>,
    /// Stop walked from when a stop's round state was produced by a
    /// same-round transfer, else [`NONE`].
    pub transfer_stop: Vec<Box<[i32]>>,
}

impl RaptorState {
    pub fn round_count(&self) -> usize {
        self.best_non_transfer_times.len()
    }
}

/// A door-to-door itinerary read back from search state: one entry per
/// transit leg, origin-to-destination order, index-parallel arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub patterns: Vec<u32>,
    pub board_stops: Vec<u32>,
    pub alight_stops: Vec<u32>,
    pub wait_times_seconds: Vec<u32>,
    pub in_vehicle_times_seconds: Vec<u32>,
}

impl Path {
    /// Walks back from `destination` starting at `round`, emitting one
    /// leg per boarding. A round whose best non-transfer time matches
    /// the previous round's carries no new boarding and is skipped.
    pub fn reconstruct(
        state: &RaptorState,
        destination: u32,
        round: usize,
    ) -> Result<Path, Error> {
        let mut patterns = Vec::new();
        let mut board_stops = Vec::new();
        let mut alight_stops = Vec::new();
        let mut wait_times = Vec::new();
        let mut in_vehicle_times = Vec::new();

        let mut stop = destination;
        let mut round = round;
        if state.best_non_transfer_times[round][stop as usize] == UNREACHED {
            return Err(Error::Unreached(destination));
        }

        loop {
            // Step down to the round where this stop's boarding happened.
            while round > 1
                && state.best_non_transfer_times[round - 1][stop as usize]
                    == state.best_non_transfer_times[round][stop as usize]
            {
                round -= 1;
            }
            trace!(stop, round, "Emitting transit leg");

            let pattern = state.previous_patterns[round][stop as usize];
            let board = state.previous_stop[round][stop as usize];
            if pattern == NONE || board == NONE {
                return Err(Error::BrokenChain {
                    stop,
                    round,
                });
            }
            patterns.push(pattern as u32);
            board_stops.push(board as u32);
            alight_stops.push(stop);
            wait_times.push(state.previous_wait_time[round][stop as usize]);
            in_vehicle_times.push(state.previous_in_vehicle_time[round][stop as usize]);

            stop = board as u32;
            round -= 1;
            if round == 0 {
                break;
            }
            // The board stop may itself have been reached by walking
            // from the previous leg's alight stop in the same round.
            let transfer = state.transfer_stop[round][stop as usize];
            if transfer != NONE {
                stop = transfer as u32;
            }
        }

        patterns.reverse();
        board_stops.reverse();
        alight_stops.reverse();
        wait_times.reverse();
        in_vehicle_times.reverse();
        Ok(Path {
            patterns,
            board_stops,
            alight_stops,
            wait_times_seconds: wait_times,
            in_vehicle_times_seconds: in_vehicle_times,
        })
    }

    pub fn leg_count(&self) -> usize {
        self.patterns.len()
    }

    /// Time spent neither riding, waiting, nor on access/egress streets.
    /// Negative transfer time means the inputs disagree, which is a
    /// programming error upstream.
    pub fn transfer_time_seconds(
        &self,
        total_time_seconds: u32,
        access: Option<&StreetTimeAndMode>,
        egress: Option<&StreetTimeAndMode>,
    ) -> u32 {
        let access_seconds = access.map_or(0, |leg| leg.time_seconds) as i64;
        let egress_seconds = egress.map_or(0, |leg| leg.time_seconds) as i64;
        let waits: i64 = self.wait_times_seconds.iter().map(|&w| w as i64).sum();
        let rides: i64 = self.in_vehicle_times_seconds.iter().map(|&r| r as i64).sum();
        let transfer = total_time_seconds as i64 - access_seconds - egress_seconds - waits - rides;
        assert!(
            transfer >= 0,
            "negative transfer time {transfer}s from total {total_time_seconds}s"
        );
        transfer as u32
    }
}

/// Board/alight stops and ride times of an itinerary, with its street
/// access and egress. The structural part shared by pattern- and
/// route-keyed sequences.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StopSequence {
    pub board_stops: Vec<u32>,
    pub alight_stops: Vec<u32>,
    pub ride_times_seconds: Vec<u32>,
    pub access: Option<StreetTimeAndMode>,
    pub egress: Option<StreetTimeAndMode>,
}

/// An itinerary keyed by the exact patterns ridden.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternSequence {
    pub patterns: Vec<u32>,
    pub stops: StopSequence,
}

impl PatternSequence {
    /// Access is pinned to the best street leg at the first boarding
    /// stop; egress is whatever the caller measured at the destination.
    pub fn new(
        path: &Path,
        access_times: &HashMap<u32, StreetTimeAndMode>,
        egress: Option<StreetTimeAndMode>,
    ) -> Self {
        let access = path
            .board_stops
            .first()
            .and_then(|stop| access_times.get(stop))
            .copied();
        Self {
            patterns: path.patterns.clone(),
            stops: StopSequence {
                board_stops: path.board_stops.clone(),
                alight_stops: path.alight_stops.clone(),
                ride_times_seconds: path.in_vehicle_times_seconds.clone(),
                access,
                egress,
            },
        }
    }
}

/// An itinerary keyed by the routes ridden instead of the patterns.
/// Distinct patterns of one route collapse into the same value, which
/// is what deduplication wants: riders see routes, not patterns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteSequence {
    pub routes: Vec<u32>,
    pub stops: StopSequence,
}

impl RouteSequence {
    pub fn new(sequence: &PatternSequence, network: &TransitNetwork) -> Self {
        let routes = sequence
            .patterns
            .iter()
            .map(|&pattern| network.trip_patterns[pattern as usize].route_index)
            .collect();
        Self {
            routes,
            stops: sequence.stops.clone(),
        }
    }
}
