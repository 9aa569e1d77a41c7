use serde::{Deserialize, Serialize};
use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Sub},
};

/// A distance in whole millimetres.
///
/// Millimetres keep every street-search comparison in integer arithmetic;
/// metres only appear at the API edge (search radii, display).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Distance(u32);

impl Add for Distance {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Distance {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl From<u32> for Distance {
    fn from(value: u32) -> Self {
        Distance(value)
    }
}

impl Distance {
    pub const fn from_millimeters(mm: u32) -> Self {
        Self(mm)
    }

    pub const fn from_meters(meters: u32) -> Self {
        Self(meters * 1000)
    }

    pub const fn as_millimeters(&self) -> u32 {
        self.0
    }

    pub const fn as_meters(&self) -> u32 {
        self.0 / 1000
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f32,
    pub longitude: f32,
}

impl Coordinate {
    pub const fn new(latitude: f32, longitude: f32) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance, rounded to whole millimetres.
    pub fn distance_to(&self, coord: &Self) -> Distance {
        const R_METERS: f32 = 6_371_000.0;
        let dist_lat = f32::to_radians(coord.latitude - self.latitude);
        let dist_lon = f32::to_radians(coord.longitude - self.longitude);
        let a = f32::powi(f32::sin(dist_lat / 2.0), 2)
            + f32::cos(f32::to_radians(self.latitude))
                * f32::cos(f32::to_radians(coord.latitude))
                * f32::sin(dist_lon / 2.0)
                * f32::sin(dist_lon / 2.0);
        let c = 2.0 * f32::atan2(f32::sqrt(a), f32::sqrt(1.0 - a));
        Distance::from_millimeters((R_METERS * c * 1000.0) as u32)
    }
}

impl Sum for Coordinate {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        let mut count: usize = 0;
        let mut lat: f32 = 0.0;
        let mut lon: f32 = 0.0;
        iter.for_each(|coordinate| {
            count += 1;
            lat += coordinate.latitude;
            lon += coordinate.longitude;
        });
        if count == 0 {
            return Self::default();
        }
        let count = count as f32;
        Self {
            latitude: lat / count,
            longitude: lon / count,
        }
    }
}

impl From<(f32, f32)> for Coordinate {
    fn from(value: (f32, f32)) -> Self {
        Self {
            latitude: value.0,
            longitude: value.1,
        }
    }
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}, {}", self.latitude, self.longitude))
    }
}

/// An axis-aligned lat/lon rectangle, used to scope partial rebuilds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_latitude: f32,
    pub max_latitude: f32,
    pub min_longitude: f32,
    pub max_longitude: f32,
}

impl Bounds {
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        coordinate.latitude >= self.min_latitude
            && coordinate.latitude <= self.max_latitude
            && coordinate.longitude >= self.min_longitude
            && coordinate.longitude <= self.max_longitude
    }
}

#[test]
fn distance_unit_test() {
    let d = Distance::from_meters(250);
    assert_eq!(d.as_millimeters(), 250_000);
    assert_eq!(d.as_meters(), 250);
}

#[test]
fn distance_test() {
    let paris = Coordinate::new(48.858_01, 2.351_435);
    let london = Coordinate::new(51.505_238, -0.124_954_075);
    let d = paris.distance_to(&london);
    let km = d.as_meters() / 1000;
    assert!((300..400).contains(&km), "got {km} km");
}

#[test]
fn center_of_map_test() {
    let center: Coordinate = [
        Coordinate::new(59.0, 18.0),
        Coordinate::new(60.0, 17.0),
        Coordinate::new(61.0, 19.0),
    ]
    .into_iter()
    .sum();
    assert!((center.latitude - 60.0).abs() < 1e-4);
    assert!((center.longitude - 18.0).abs() < 1e-4);
}

#[test]
fn bounds_test() {
    let bounds = Bounds {
        min_latitude: 59.0,
        max_latitude: 60.0,
        min_longitude: 17.0,
        max_longitude: 18.0,
    };
    assert!(bounds.contains(&Coordinate::new(59.5, 17.5)));
    assert!(!bounds.contains(&Coordinate::new(58.9, 17.5)));
}
