use crate::{network::mode::Mode, shared::time::Time};
use bitvec::prelude::*;
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;

/// Bicycles may ride along on this trip.
pub const TRIP_FLAG_BICYCLE: u8 = 1 << 0;
/// The trip's vehicle is wheelchair accessible.
pub const TRIP_FLAG_WHEELCHAIR: u8 = 1 << 1;

/// A rider-facing service line. Mode is derived from `route_type` once at
/// load and never recomputed.
#[derive(Debug, Clone)]
pub struct Route {
    pub index: u32,
    pub id: Arc<str>,
    pub short_name: Option<Arc<str>>,
    pub long_name: Option<Arc<str>>,
    pub route_type: i32,
    pub mode: Mode,
    pub color: Option<Arc<str>>,
    pub agency_id: Option<Arc<str>>,
}

/// The calendar of dates on which a group of trips runs.
#[derive(Debug, Clone)]
pub struct Service {
    pub index: u32,
    pub id: Arc<str>,
    /// Bit 0 = Monday .. bit 6 = Sunday.
    pub weekdays: u8,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub added_dates: Box<[NaiveDate]>,
    pub removed_dates: Box<[NaiveDate]>,
}

impl Service {
    pub fn active_on(&self, date: NaiveDate) -> bool {
        if self.removed_dates.contains(&date) {
            return false;
        }
        if self.added_dates.contains(&date) {
            return true;
        }
        let in_range = match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => date >= start && date <= end,
            _ => false,
        };
        let weekday_bit = 1u8 << date.weekday().num_days_from_monday();
        in_range && (self.weekdays & weekday_bit) != 0
    }
}

/// Per-stop boarding/alighting policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PickDrop {
    #[default]
    Scheduled,
    NoneAvailable,
    PhoneAgency,
    CoordinateWithDriver,
}

impl PickDrop {
    pub fn from_gtfs_code(code: u8) -> Self {
        match code {
            1 => PickDrop::NoneAvailable,
            2 => PickDrop::PhoneAgency,
            3 => PickDrop::CoordinateWithDriver,
            _ => PickDrop::Scheduled,
        }
    }
}

/// Forward link to the next trip operated by the same vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLink {
    pub pattern: u32,
    pub schedule: u32,
}

/// Headway-based service windows of one trip, parallel arrays over entry
/// index. Arrival/departure arrays of the owning schedule are normalized
/// so the trip starts at zero and entries shift it along the window.
#[derive(Debug, Clone)]
pub struct Frequencies {
    pub entry_ids: Arc<[Arc<str>]>,
    pub headway_seconds: Arc<[u32]>,
    pub start_times: Arc<[Time]>,
    pub end_times: Arc<[Time]>,
}

impl Frequencies {
    pub fn len(&self) -> usize {
        self.headway_seconds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headway_seconds.is_empty()
    }
}

/// One trip's packed times. Arrays are index-parallel with the owning
/// pattern's stop list.
#[derive(Debug, Clone)]
pub struct TripSchedule {
    pub trip_id: Arc<str>,
    pub arrivals: Arc<[Time]>,
    pub departures: Arc<[Time]>,
    pub service_index: u32,
    pub flags: u8,
    pub frequencies: Option<Frequencies>,
    pub next_in_block: Option<BlockLink>,
}

impl TripSchedule {
    pub fn first_departure(&self) -> Time {
        self.departures[0]
    }

    pub fn last_arrival(&self) -> Time {
        self.arrivals[self.arrivals.len() - 1]
    }

    pub fn is_frequency_based(&self) -> bool {
        self.frequencies.is_some()
    }

    pub fn bicycles_allowed(&self) -> bool {
        self.flags & TRIP_FLAG_BICYCLE != 0
    }

    pub fn wheelchair_accessible(&self) -> bool {
        self.flags & TRIP_FLAG_WHEELCHAIR != 0
    }
}

/// All trips of one route sharing an ordered stop sequence and per-stop
/// pickup/drop-off policies. The unit the search scans.
#[derive(Debug, Clone)]
pub struct TripPattern {
    /// Build-time id, stable across scenario copies.
    pub original_id: u32,
    pub route_index: u32,
    pub direction_id: Option<u8>,
    pub stops: Arc<[u32]>,
    pub pickups: Arc<[PickDrop]>,
    pub dropoffs: Arc<[PickDrop]>,
    /// Per pattern-stop position: boarding here is wheelchair accessible.
    pub wheelchair_accessible: BitVec<usize, Lsb0>,
    pub schedules: Vec<TripSchedule>,
    pub has_schedules: bool,
    pub has_frequencies: bool,
    /// Union of the service codes of all schedules.
    pub services_active: BitVec<usize, Lsb0>,
}

impl TripPattern {
    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }
}
