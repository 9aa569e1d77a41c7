use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModeError {
    #[error("Route type {0} is a taxi service, which is not supported")]
    TaxiServiceUnsupported(i32),
    #[error("Unknown route type {0}")]
    UnknownRouteType(i32),
}

/// Transit mode of a route, derived from its GTFS `route_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Mode {
    Rail,
    Bus,
    Subway,
    Tram,
    Ferry,
    CableCar,
    Gondola,
    Funicular,
    Air,
}

impl Mode {
    /// Total mapping from GTFS `route_type` codes, classic and extended.
    /// Extended codes resolve by hundred-band; taxi bands are rejected
    /// outright rather than mapped.
    pub fn from_route_type(route_type: i32) -> Result<Self, ModeError> {
        if (100..1600).contains(&route_type) {
            return match route_type / 100 {
                1 | 3 => Ok(Mode::Rail),        // railway, suburban railway
                2 | 7 | 8 => Ok(Mode::Bus),     // coach, bus, trolleybus
                4 | 5 | 6 => Ok(Mode::Subway),  // urban railway, metro, underground
                9 => Ok(Mode::Tram),
                10 | 12 => Ok(Mode::Ferry),     // water, ferry
                11 => Ok(Mode::Air),
                13 => Ok(Mode::Gondola),        // telecabin
                14 => Ok(Mode::Funicular),
                15 => Err(ModeError::TaxiServiceUnsupported(route_type)),
                _ => Err(ModeError::UnknownRouteType(route_type)),
            };
        }
        match route_type {
            0 => Ok(Mode::Tram),
            1 => Ok(Mode::Subway),
            2 => Ok(Mode::Rail),
            3 => Ok(Mode::Bus),
            4 => Ok(Mode::Ferry),
            5 => Ok(Mode::CableCar),
            6 => Ok(Mode::Gondola),
            7 => Ok(Mode::Funicular),
            other => Err(ModeError::UnknownRouteType(other)),
        }
    }
}

/// A set of [`Mode`]s packed into a single word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModeSet(u16);

impl ModeSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        let mut set = Self::empty();
        for mode in [
            Mode::Rail,
            Mode::Bus,
            Mode::Subway,
            Mode::Tram,
            Mode::Ferry,
            Mode::CableCar,
            Mode::Gondola,
            Mode::Funicular,
            Mode::Air,
        ] {
            set.insert(mode);
        }
        set
    }

    pub fn insert(&mut self, mode: Mode) {
        self.0 |= 1 << mode as u16;
    }

    pub fn contains(&self, mode: Mode) -> bool {
        self.0 & (1 << mode as u16) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<Mode> for ModeSet {
    fn from_iter<T: IntoIterator<Item = Mode>>(iter: T) -> Self {
        let mut set = Self::empty();
        iter.into_iter().for_each(|mode| set.insert(mode));
        set
    }
}

impl From<Mode> for ModeSet {
    fn from(value: Mode) -> Self {
        let mut set = Self::empty();
        set.insert(value);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_route_types() {
        assert_eq!(Mode::from_route_type(0), Ok(Mode::Tram));
        assert_eq!(Mode::from_route_type(1), Ok(Mode::Subway));
        assert_eq!(Mode::from_route_type(2), Ok(Mode::Rail));
        assert_eq!(Mode::from_route_type(3), Ok(Mode::Bus));
        assert_eq!(Mode::from_route_type(4), Ok(Mode::Ferry));
        assert_eq!(Mode::from_route_type(5), Ok(Mode::CableCar));
        assert_eq!(Mode::from_route_type(6), Ok(Mode::Gondola));
        assert_eq!(Mode::from_route_type(7), Ok(Mode::Funicular));
    }

    #[test]
    fn extended_route_types_by_band() {
        assert_eq!(Mode::from_route_type(109), Ok(Mode::Rail));
        assert_eq!(Mode::from_route_type(200), Ok(Mode::Bus));
        assert_eq!(Mode::from_route_type(401), Ok(Mode::Subway));
        assert_eq!(Mode::from_route_type(704), Ok(Mode::Bus));
        assert_eq!(Mode::from_route_type(800), Ok(Mode::Bus));
        assert_eq!(Mode::from_route_type(900), Ok(Mode::Tram));
        assert_eq!(Mode::from_route_type(1000), Ok(Mode::Ferry));
        assert_eq!(Mode::from_route_type(1100), Ok(Mode::Air));
        assert_eq!(Mode::from_route_type(1300), Ok(Mode::Gondola));
        assert_eq!(Mode::from_route_type(1400), Ok(Mode::Funicular));
    }

    #[test]
    fn taxi_rejected() {
        assert_eq!(
            Mode::from_route_type(1500),
            Err(ModeError::TaxiServiceUnsupported(1500))
        );
        assert_eq!(
            Mode::from_route_type(1501),
            Err(ModeError::TaxiServiceUnsupported(1501))
        );
    }

    #[test]
    fn unknown_rejected() {
        assert!(Mode::from_route_type(8).is_err());
        assert!(Mode::from_route_type(-1).is_err());
        assert!(Mode::from_route_type(1700).is_err());
    }

    #[test]
    fn every_documented_code_maps() {
        // Classic ids plus every extended hundred-band must resolve to a
        // mode or a typed rejection, never fall through unmapped.
        for code in 0..8 {
            assert!(Mode::from_route_type(code).is_ok());
        }
        for band in 1..16 {
            let result = Mode::from_route_type(band * 100);
            assert!(result.is_ok() || matches!(result, Err(ModeError::TaxiServiceUnsupported(_))));
        }
    }

    #[test]
    fn mode_set_ops() {
        let set: ModeSet = [Mode::Bus, Mode::Rail].into_iter().collect();
        assert!(set.contains(Mode::Bus));
        assert!(set.contains(Mode::Rail));
        assert!(!set.contains(Mode::Tram));
        assert!(ModeSet::empty().is_empty());
        assert!(ModeSet::all().contains(Mode::Air));
    }
}
