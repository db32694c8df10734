//! Room-graph locations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix marking instanced regions (dungeons created per party).
pub const INSTANCE_PREFIX: &str = "instance_";

/// A room inside a region of the world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    /// Region identifier
    pub region: String,
    /// Room identifier within the region
    pub room: String,
}

impl Location {
    /// Creates a new location.
    #[must_use]
    pub fn new(region: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            room: room.into(),
        }
    }

    /// Resolves an exit destination relative to this location.
    ///
    /// Destinations are encoded either as `"region:room"` or as a bare room id,
    /// in which case the current region is implied.
    #[must_use]
    pub fn resolve_exit(&self, destination: &str) -> Self {
        match destination.split_once(':') {
            Some((region, room)) if !region.is_empty() => Self::new(region, room),
            Some((_, room)) => Self::new(self.region.clone(), room),
            None => Self::new(self.region.clone(), destination),
        }
    }

    /// Checks if this location lies inside an instanced region.
    #[must_use]
    pub fn is_instance(&self) -> bool {
        self.region.starts_with(INSTANCE_PREFIX)
    }

    /// Checks if both locations share a region.
    #[must_use]
    pub fn same_region(&self, other: &Self) -> bool {
        self.region == other.region
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.region, self.room)
    }
}
