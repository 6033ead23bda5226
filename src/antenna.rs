//! The resolved physical properties of one antenna.

use chrono::{DateTime, Utc};

use crate::coord::RdPoint;
use crate::identity::CellIdentity;

/// One antenna record: where a cell transmitted from during a stretch of its
/// lifetime. Immutable once built; backends construct these when decoding a
/// stored row or when populating a synthetic index.
///
/// Multiple records may carry the same identity when an antenna was
/// reconfigured over time; their validity intervals are then disjoint.
/// Overlapping intervals are duplicate network records, handled by the
/// configured [`DuplicatePolicy`](crate::policy::DuplicatePolicy).
#[derive(Debug, Clone, PartialEq)]
pub struct Antenna {
    pub cell: CellIdentity,
    pub position: RdPoint,
    /// Main beam direction in degrees clockwise from grid north, when known.
    pub azimuth: Option<u16>,
    /// Start of validity, inclusive. `None` is open-ended.
    pub valid_from: Option<DateTime<Utc>>,
    /// End of validity, exclusive. `None` is open-ended.
    pub valid_to: Option<DateTime<Utc>>,
}

impl Antenna {
    /// Whether the record was valid at `t`: the interval is half-open,
    /// `[valid_from, valid_to)`, and an unset bound never excludes.
    pub fn is_active_at(&self, t: DateTime<Utc>) -> bool {
        self.valid_from.map_or(true, |start| t >= start)
            && self.valid_to.map_or(true, |end| t < end)
    }
}
