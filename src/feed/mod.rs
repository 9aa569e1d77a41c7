pub mod models;

use crate::shared::time::Time;
use models::*;
use serde::de::DeserializeOwned;
use std::{
    collections::HashMap,
    fs::{self, File},
    io::{self},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tracing::{debug, warn};
use zip::{ZipArchive, read::ZipFile};

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Could not find file with name: {0}")]
    FileNotFound(String),
    #[error("Feed has no service calendar (neither {0} nor {1} present)")]
    MissingCalendar(String, String),
}

/// Per-table file names inside a feed archive or directory.
pub struct Config {
    pub stops_path: String,
    pub routes_path: String,
    pub agency_path: String,
    pub calendar_path: String,
    pub calendar_dates_path: String,
    pub trips_path: String,
    pub stop_times_path: String,
    pub frequencies_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stops_path: "stops.txt".into(),
            routes_path: "routes.txt".into(),
            agency_path: "agency.txt".into(),
            calendar_path: "calendar.txt".into(),
            calendar_dates_path: "calendar_dates.txt".into(),
            trips_path: "trips.txt".into(),
            stop_times_path: "stop_times.txt".into(),
            frequencies_path: "frequencies.txt".into(),
        }
    }
}

enum Source {
    Zip(Box<ZipArchive<File>>),
    Directory(PathBuf),
}

/// One schedule feed's records, fully read into memory and ready for the
/// network loader. Tests and scenario tooling may also build a `Feed`
/// directly from records.
pub struct Feed {
    pub feed_id: Arc<str>,
    pub stops: Vec<FeedStop>,
    pub routes: Vec<FeedRoute>,
    pub agencies: Vec<FeedAgency>,
    pub services: Vec<FeedService>,
    pub trips: Vec<FeedTrip>,
    pub stop_times: Vec<FeedStopTime>,
    pub frequencies: Vec<FeedFrequency>,
}

impl Feed {
    /// An empty feed with the given id, to be filled record by record.
    pub fn new(feed_id: impl Into<Arc<str>>) -> Self {
        Self {
            feed_id: feed_id.into(),
            stops: Vec::new(),
            routes: Vec::new(),
            agencies: Vec::new(),
            services: Vec::new(),
            trips: Vec::new(),
            stop_times: Vec::new(),
            frequencies: Vec::new(),
        }
    }

    pub fn from_zip<P: AsRef<Path>>(
        feed_id: impl Into<Arc<str>>,
        path: P,
        config: &Config,
    ) -> Result<Self, Error> {
        let archive = ZipArchive::new(File::open(path)?)?;
        Self::read(feed_id.into(), Source::Zip(Box::new(archive)), config)
    }

    pub fn from_directory<P: AsRef<Path>>(
        feed_id: impl Into<Arc<str>>,
        path: P,
        config: &Config,
    ) -> Result<Self, Error> {
        Self::read(
            feed_id.into(),
            Source::Directory(path.as_ref().to_path_buf()),
            config,
        )
    }

    fn read(feed_id: Arc<str>, mut source: Source, config: &Config) -> Result<Self, Error> {
        let mut feed = Feed::new(feed_id);

        stream(&mut source, &config.stops_path, |row: StopRow| {
            feed.stops.push(row.into());
        })?;
        stream(&mut source, &config.routes_path, |row: RouteRow| {
            feed.routes.push(row.into());
        })?;
        stream_optional(&mut source, &config.agency_path, |row: AgencyRow| {
            feed.agencies.push(row.into());
        })?;
        feed.services = read_services(&mut source, config)?;
        stream(&mut source, &config.trips_path, |row: TripRow| {
            feed.trips.push(row.into());
        })?;
        stream(&mut source, &config.stop_times_path, |row: StopTimeRow| {
            feed.stop_times.push(row.into());
        })?;
        stream_optional(&mut source, &config.frequencies_path, |row: FrequencyRow| {
            let (Some(start_time), Some(end_time)) =
                (Time::from_hms(&row.start_time), Time::from_hms(&row.end_time))
            else {
                warn!(trip = %row.trip_id, "Skipping frequency entry with unparseable times");
                return;
            };
            feed.frequencies.push(FeedFrequency {
                trip_id: row.trip_id,
                start_time,
                end_time,
                headway_seconds: row.headway_secs,
                exact_times: row.exact_times == Some(1),
            });
        })?;

        debug!(
            feed = %feed.feed_id,
            stops = feed.stops.len(),
            routes = feed.routes.len(),
            trips = feed.trips.len(),
            stop_times = feed.stop_times.len(),
            "Read feed"
        );
        Ok(feed)
    }
}

/// Merges the weekly calendar with calendar-date exceptions. A service
/// that only appears in the exception table still becomes a record.
fn read_services(source: &mut Source, config: &Config) -> Result<Vec<FeedService>, Error> {
    let mut services: Vec<FeedService> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();

    let had_calendar = stream_optional(source, &config.calendar_path, |row: CalendarRow| {
        let service = FeedService {
            id: row.service_id.clone(),
            weekdays: row.weekday_mask(),
            start_date: parse_gtfs_date(&row.start_date),
            end_date: parse_gtfs_date(&row.end_date),
            added_dates: Vec::new(),
            removed_dates: Vec::new(),
        };
        by_id.insert(row.service_id, services.len());
        services.push(service);
    })?;

    let had_dates = stream_optional(source, &config.calendar_dates_path, |row: CalendarDateRow| {
        let Some(date) = parse_gtfs_date(&row.date) else {
            warn!(service = %row.service_id, date = %row.date, "Skipping unparseable calendar date");
            return;
        };
        let index = *by_id.entry(row.service_id.clone()).or_insert_with(|| {
            services.push(FeedService {
                id: row.service_id.clone(),
                ..Default::default()
            });
            services.len() - 1
        });
        match row.exception_type {
            1 => services[index].added_dates.push(date),
            2 => services[index].removed_dates.push(date),
            other => {
                warn!(service = %row.service_id, exception = other, "Unknown calendar exception type")
            }
        }
    })?;

    if !had_calendar && !had_dates {
        return Err(Error::MissingCalendar(
            config.calendar_path.clone(),
            config.calendar_dates_path.clone(),
        ));
    }
    Ok(services)
}

fn stream<T, F>(source: &mut Source, file_name: &str, f: F) -> Result<(), Error>
where
    T: DeserializeOwned,
    F: FnMut(T),
{
    match source {
        Source::Zip(archive) => stream_from_zip(archive, file_name, f),
        Source::Directory(path) => stream_from_dir(path, file_name, f),
    }
}

/// Like [`stream`] but a missing table is not an error. Returns whether
/// the table was present.
fn stream_optional<T, F>(source: &mut Source, file_name: &str, f: F) -> Result<bool, Error>
where
    T: DeserializeOwned,
    F: FnMut(T),
{
    match stream(source, file_name, f) {
        Ok(()) => Ok(true),
        Err(Error::FileNotFound(_)) => Ok(false),
        Err(Error::Io(err)) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

fn stream_from_zip<T, F>(
    archive: &mut ZipArchive<File>,
    file_name: &str,
    mut f: F,
) -> Result<(), Error>
where
    T: DeserializeOwned,
    F: FnMut(T),
{
    let file = get_file_from_zip(archive, file_name)?;
    let mut reader = csv::Reader::from_reader(file);
    for result in reader.deserialize() {
        let record: T = result?;
        f(record);
    }
    Ok(())
}

fn stream_from_dir<T, F>(dir_path: &Path, file_name: &str, mut f: F) -> Result<(), Error>
where
    T: DeserializeOwned,
    F: FnMut(T),
{
    let file = fs::File::open(dir_path.join(file_name))?;

    // BufReader is critical here for speed
    let reader = io::BufReader::with_capacity(128 * 1024, file);
    let mut csv_reader = csv::Reader::from_reader(reader);

    for result in csv_reader.deserialize() {
        let record: T = result?;
        f(record);
    }
    Ok(())
}

fn get_file_from_zip<'a>(
    archive: &'a mut ZipArchive<File>,
    name: &'a str,
) -> Result<ZipFile<'a, File>, Error> {
    let index = archive
        .index_for_name(name)
        .ok_or(Error::FileNotFound(name.to_string()))?;
    let file = archive.by_index(index)?;
    Ok(file)
}
