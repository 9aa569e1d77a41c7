use crate::shared::time::Time;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A boarding location record, scoped to its feed.
#[derive(Debug, Clone)]
pub struct FeedStop {
    pub id: String,
    pub name: Option<String>,
    pub latitude: f32,
    pub longitude: f32,
    pub zone_id: Option<String>,
    pub parent_station: Option<String>,
    pub wheelchair_boarding: bool,
}

#[derive(Debug, Clone)]
pub struct FeedRoute {
    pub id: String,
    pub agency_id: Option<String>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub route_type: i32,
    pub color: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FeedAgency {
    pub id: Option<String>,
    pub name: String,
    pub time_zone: String,
    pub url: Option<String>,
}

/// A service calendar: the set of dates on which its trips run.
///
/// Built by merging the weekly calendar with calendar-date exceptions;
/// a service may also exist purely through exceptions.
#[derive(Debug, Clone, Default)]
pub struct FeedService {
    pub id: String,
    /// Bit 0 = Monday .. bit 6 = Sunday.
    pub weekdays: u8,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub added_dates: Vec<NaiveDate>,
    pub removed_dates: Vec<NaiveDate>,
}

impl FeedService {
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

#[derive(Debug, Clone)]
pub struct FeedTrip {
    pub id: String,
    pub route_id: String,
    pub service_id: String,
    pub direction_id: Option<u8>,
    pub block_id: Option<String>,
    pub shape_id: Option<String>,
    pub wheelchair_accessible: bool,
    pub bicycles_allowed: bool,
}

/// One call of a trip at a stop. Times may be absent on intermediate
/// stops; the loader interpolates them.
#[derive(Debug, Clone)]
pub struct FeedStopTime {
    pub trip_id: String,
    pub stop_id: String,
    pub stop_sequence: u32,
    pub arrival_time: Option<Time>,
    pub departure_time: Option<Time>,
    pub pickup_type: u8,
    pub drop_off_type: u8,
}

/// A headway-defined service window for one trip.
#[derive(Debug, Clone)]
pub struct FeedFrequency {
    pub trip_id: String,
    pub start_time: Time,
    pub end_time: Time,
    pub headway_seconds: u32,
    pub exact_times: bool,
}

// Raw CSV rows. Kept separate from the typed records above so that time
// and date parsing failures surface per row instead of poisoning serde.

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct StopRow {
    pub stop_id: String,
    #[serde(default)]
    pub stop_name: Option<String>,
    pub stop_lat: f32,
    pub stop_lon: f32,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub parent_station: Option<String>,
    #[serde(default)]
    pub wheelchair_boarding: Option<u8>,
}

impl From<StopRow> for FeedStop {
    fn from(value: StopRow) -> Self {
        Self {
            id: value.stop_id,
            name: value.stop_name.filter(|name| !name.is_empty()),
            latitude: value.stop_lat,
            longitude: value.stop_lon,
            zone_id: value.zone_id.filter(|zone| !zone.is_empty()),
            parent_station: value.parent_station.filter(|parent| !parent.is_empty()),
            wheelchair_boarding: value.wheelchair_boarding == Some(1),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct RouteRow {
    pub route_id: String,
    #[serde(default)]
    pub agency_id: Option<String>,
    #[serde(default)]
    pub route_short_name: Option<String>,
    #[serde(default)]
    pub route_long_name: Option<String>,
    pub route_type: i32,
    #[serde(default)]
    pub route_color: Option<String>,
}

impl From<RouteRow> for FeedRoute {
    fn from(value: RouteRow) -> Self {
        Self {
            id: value.route_id,
            agency_id: value.agency_id.filter(|agency| !agency.is_empty()),
            short_name: value.route_short_name.filter(|name| !name.is_empty()),
            long_name: value.route_long_name.filter(|name| !name.is_empty()),
            route_type: value.route_type,
            color: value.route_color.filter(|color| !color.is_empty()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct AgencyRow {
    #[serde(default)]
    pub agency_id: Option<String>,
    pub agency_name: String,
    #[serde(default)]
    pub agency_url: Option<String>,
    pub agency_timezone: String,
}

impl From<AgencyRow> for FeedAgency {
    fn from(value: AgencyRow) -> Self {
        Self {
            id: value.agency_id.filter(|id| !id.is_empty()),
            name: value.agency_name,
            time_zone: value.agency_timezone,
            url: value.agency_url.filter(|url| !url.is_empty()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct CalendarRow {
    pub service_id: String,
    pub monday: u8,
    pub tuesday: u8,
    pub wednesday: u8,
    pub thursday: u8,
    pub friday: u8,
    pub saturday: u8,
    pub sunday: u8,
    pub start_date: String,
    pub end_date: String,
}

impl CalendarRow {
    pub(crate) fn weekday_mask(&self) -> u8 {
        let days = [
            self.monday,
            self.tuesday,
            self.wednesday,
            self.thursday,
            self.friday,
            self.saturday,
            self.sunday,
        ];
        days.iter()
            .enumerate()
            .filter(|&(_, &day)| day == 1)
            .fold(0u8, |mask, (i, _)| mask | (1 << i))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct CalendarDateRow {
    pub service_id: String,
    pub date: String,
    /// 1 = service added on this date, 2 = removed.
    pub exception_type: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct TripRow {
    pub trip_id: String,
    pub route_id: String,
    pub service_id: String,
    #[serde(default)]
    pub direction_id: Option<u8>,
    #[serde(default)]
    pub block_id: Option<String>,
    #[serde(default)]
    pub shape_id: Option<String>,
    #[serde(default)]
    pub wheelchair_accessible: Option<u8>,
    #[serde(default)]
    pub bikes_allowed: Option<u8>,
}

impl From<TripRow> for FeedTrip {
    fn from(value: TripRow) -> Self {
        Self {
            id: value.trip_id,
            route_id: value.route_id,
            service_id: value.service_id,
            direction_id: value.direction_id,
            block_id: value.block_id.filter(|block| !block.is_empty()),
            shape_id: value.shape_id.filter(|shape| !shape.is_empty()),
            wheelchair_accessible: value.wheelchair_accessible == Some(1),
            bicycles_allowed: value.bikes_allowed == Some(1),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct StopTimeRow {
    pub trip_id: String,
    pub stop_id: String,
    pub stop_sequence: u32,
    #[serde(default)]
    pub arrival_time: Option<String>,
    #[serde(default)]
    pub departure_time: Option<String>,
    #[serde(default)]
    pub pickup_type: Option<u8>,
    #[serde(default)]
    pub drop_off_type: Option<u8>,
}

impl From<StopTimeRow> for FeedStopTime {
    fn from(value: StopTimeRow) -> Self {
        Self {
            trip_id: value.trip_id,
            stop_id: value.stop_id,
            stop_sequence: value.stop_sequence,
            arrival_time: value.arrival_time.as_deref().and_then(Time::from_hms),
            departure_time: value.departure_time.as_deref().and_then(Time::from_hms),
            pickup_type: value.pickup_type.unwrap_or(0),
            drop_off_type: value.drop_off_type.unwrap_or(0),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct FrequencyRow {
    pub trip_id: String,
    pub start_time: String,
    pub end_time: String,
    pub headway_secs: u32,
    #[serde(default)]
    pub exact_times: Option<u8>,
}

pub(crate) fn parse_gtfs_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%Y%m%d").ok()
}
