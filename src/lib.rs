pub mod distance;
pub mod feed;
pub mod filter;
pub mod network;
pub mod path;
pub mod shared;
pub mod street;
pub mod transfers;

pub mod prelude {
    pub use crate::distance::build_stop_distance_tables;
    pub use crate::feed::{Config, Feed};
    pub use crate::filter::FilteredPatterns;
    pub use crate::network::{LoadLevel, Mode, ModeSet, TransitNetwork};
    pub use crate::path::{Path, PatternSequence, RaptorState, RouteSequence};
    pub use crate::shared::{Coordinate, Distance, Time};
    pub use crate::street::{StreetLayer, StreetSearch};
    pub use crate::transfers::TransferFinder;
}
