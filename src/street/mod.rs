use crate::shared::geo::{Coordinate, Distance};
use std::collections::HashMap;

/// Street-vertex value for a stop with no street linkage.
pub const UNLINKED: i32 = -1;

/// How a street leg is covered. Mode matters for access/egress legs;
/// transfers are always on foot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreetMode {
    Walk,
    Bicycle,
    Car,
}

/// A street leg's duration and mode, as attached to journey access and
/// egress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreetTimeAndMode {
    pub time_seconds: u32,
    pub mode: StreetMode,
}

/// One link in a street search's back-pointer chain. Cloning the chain
/// out of the router lets a path be rebuilt long after the search state
/// is gone.
#[derive(Debug, Clone)]
pub struct StreetState {
    pub vertex: u32,
    pub distance: Distance,
    pub back: Option<Box<StreetState>>,
}

impl StreetState {
    /// Vertices from origin to this state, in travel order.
    pub fn vertices(&self) -> Vec<u32> {
        let mut chain = Vec::new();
        let mut state = Some(self);
        while let Some(current) = state {
            chain.push(current.vertex);
            state = current.back.as_deref();
        }
        chain.reverse();
        chain
    }
}

/// The street network, as seen by the transit build. Implementations are
/// read-only here; every search gets its own state via [`searcher`].
///
/// [`searcher`]: StreetLayer::searcher
pub trait StreetLayer: Sync {
    /// A fresh single-origin search over this layer.
    fn searcher(&self) -> Box<dyn StreetSearch + '_>;

    /// The street vertex closest to `coordinate` within `radius_meters`,
    /// if any. Used to link newly added stops.
    fn nearest_vertex(&self, coordinate: Coordinate, radius_meters: u32) -> Option<u32>;
}

/// A single-origin street search minimizing distance in millimetres.
/// Results are only meaningful after [`route`] has run.
///
/// [`route`]: StreetSearch::route
pub trait StreetSearch {
    fn set_origin(&mut self, vertex: u32);
    fn set_distance_limit_meters(&mut self, meters: u32);
    fn route(&mut self);

    /// Transit stops reached, by stop index.
    fn reached_stops(&self) -> HashMap<u32, Distance>;

    /// Street vertices reached, by vertex index.
    fn reached_vertices(&self) -> HashMap<u32, Distance>;

    /// Back-pointer chain for a reached vertex, origin-rooted.
    fn state_at_vertex(&self, vertex: u32) -> Option<StreetState>;
}
