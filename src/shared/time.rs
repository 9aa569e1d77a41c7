use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Earliest representable time of day.
pub const MIN: Time = Time(0);
/// Sentinel for "later than any schedule"; GTFS times past 24:00:00 stay
/// far below this.
pub const MAX: Time = Time(u32::MAX);

/// A time of day in seconds since local midnight on the service day.
///
/// Values above 24:00:00 are legal and mark trips that run past midnight
/// while still belonging to the previous service day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(u32);

impl From<u32> for Time {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Sub<Time> for Time {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        Duration(self.0 - rhs.0)
    }
}

impl Add<Duration> for Time {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign<Duration> for Time {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.0
    }
}

impl Sub<Duration> for Time {
    type Output = Self;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Time {
    pub const fn from_seconds(secs: u32) -> Self {
        Self(secs)
    }

    pub const fn as_seconds(&self) -> u32 {
        self.0
    }

    pub fn checked_sub(self, rhs: Time) -> Option<Duration> {
        self.0.checked_sub(rhs.0).map(Duration)
    }

    pub fn to_hms_string(&self) -> String {
        let h = self.0 / 3600;
        let m = (self.0 % 3600) / 60;
        let s = self.0 % 60;
        format!("{:02}:{:02}:{:02}", h, m, s)
    }

    /// Parses a GTFS `HH:MM:SS` value. Hours may exceed 23.
    pub fn from_hms(time: &str) -> Option<Self> {
        const HOUR_TO_SEC: u32 = 60 * 60;
        const MINUTE_TO_SEC: u32 = 60;
        let mut split = time.trim().split(':');
        let hours: u32 = split.next()?.parse().ok()?;
        let minutes: u32 = split.next()?.parse().ok()?;
        let seconds: u32 = split.next()?.parse().ok()?;
        if split.next().is_some() {
            return None;
        }
        Some(Self(hours * HOUR_TO_SEC + minutes * MINUTE_TO_SEC + seconds))
    }
}

/// A span of time in whole seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(u32);

impl From<u32> for Duration {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Duration {
    pub const fn from_seconds(secs: u32) -> Self {
        Self(secs)
    }

    pub const fn from_minutes(minutes: u32) -> Self {
        Self(minutes * 60)
    }

    pub const fn as_seconds(&self) -> u32 {
        self.0
    }
}

impl Sub for Duration {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0
    }
}

impl Add for Duration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0
    }
}

#[test]
fn parse_unparse() {
    for time in ["00:00:00", "00:00:30", "00:30:00", "12:00:00", "12:30:30"] {
        let parsed = Time::from_hms(time).unwrap();
        assert_eq!(time, parsed.to_hms_string());
    }
}

#[test]
fn valid_time_test() {
    assert_eq!(Time::from_hms("00:00:00").unwrap().as_seconds(), 0);
    assert_eq!(Time::from_hms("00:01:30").unwrap().as_seconds(), 90);
    assert_eq!(Time::from_hms("01:01:30").unwrap().as_seconds(), 3690);
}

#[test]
fn overnight_time_test() {
    // Past-midnight values belong to the previous service day.
    assert_eq!(Time::from_hms("25:10:00").unwrap().as_seconds(), 90_600);
}

#[test]
fn invalid_time_test() {
    assert!(Time::from_hms("00:00:0a").is_none());
    assert!(Time::from_hms("00:00").is_none());
    assert!(Time::from_hms("00:00:00:00").is_none());
}

#[test]
fn checked_sub_test() {
    let a = Time::from_seconds(100);
    let b = Time::from_seconds(160);
    assert_eq!(b.checked_sub(a), Some(Duration::from_seconds(60)));
    assert!(a.checked_sub(b).is_none());
}
