//! The backend-independent resolver contract.

use chrono::{DateTime, Utc};

use crate::antenna::Antenna;
use crate::coord::RdPoint;
use crate::error::Result;
use crate::identity::{CellIdentity, Radio};

/// Safety bound on result length when the caller does not set one.
pub const DEFAULT_COUNT_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending distance from the search centre.
    #[default]
    Distance,
    /// Storage-layer randomness; not seedable.
    Random,
}

/// The constraints of one proximity search.
///
/// A centre without an upper distance bound is rejected by every backend
/// rather than silently scanning everything. Distance bounds are exclusive
/// on both ends, so a lower bound turns the search into a donut.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub center: Option<RdPoint>,
    pub distance_limit_m: Option<f64>,
    pub distance_lower_limit_m: Option<f64>,
    /// When set, restricts to records valid at this instant. When unset, all
    /// records match, including expired antennas.
    pub date: Option<DateTime<Utc>>,
    pub radios: Option<Vec<Radio>>,
    pub mcc: Option<u16>,
    pub mnc: Option<u16>,
    pub count_limit: Option<usize>,
    /// Identity patterns removed from the results, e.g. the serving cell
    /// when counting closer cells.
    pub exclude: Vec<CellIdentity>,
    pub order: SortOrder,
}

impl SearchQuery {
    pub fn new() -> SearchQuery {
        SearchQuery::default()
    }

    /// Search around a point, keeping everything strictly closer than
    /// `distance_limit_m`.
    pub fn near(center: RdPoint, distance_limit_m: f64) -> SearchQuery {
        SearchQuery {
            center: Some(center),
            distance_limit_m: Some(distance_limit_m),
            ..SearchQuery::default()
        }
    }

    /// Exclude everything at or within `distance_lower_limit_m` of the
    /// centre (donut search).
    pub fn above(mut self, distance_lower_limit_m: f64) -> SearchQuery {
        self.distance_lower_limit_m = Some(distance_lower_limit_m);
        self
    }

    pub fn at(mut self, date: DateTime<Utc>) -> SearchQuery {
        self.date = Some(date);
        self
    }

    pub fn with_radios(mut self, radios: impl IntoIterator<Item = Radio>) -> SearchQuery {
        self.radios = Some(radios.into_iter().collect());
        self
    }

    pub fn with_mcc(mut self, mcc: u16) -> SearchQuery {
        self.mcc = Some(mcc);
        self
    }

    pub fn with_mnc(mut self, mnc: u16) -> SearchQuery {
        self.mnc = Some(mnc);
        self
    }

    pub fn with_count_limit(mut self, count_limit: usize) -> SearchQuery {
        self.count_limit = Some(count_limit);
        self
    }

    pub fn without(mut self, ci: CellIdentity) -> SearchQuery {
        self.exclude.push(ci);
        self
    }

    pub fn random_order(mut self) -> SearchQuery {
        self.order = SortOrder::Random;
        self
    }

    pub(crate) fn effective_count_limit(&self) -> usize {
        self.count_limit.unwrap_or(DEFAULT_COUNT_LIMIT)
    }

    /// Evaluate the non-spatial constraints against one record.
    ///
    /// This is the in-memory twin of the SQL the store builds; the grid
    /// backend and the test oracles use it so both backends answer with the
    /// same semantics.
    pub fn matches(&self, antenna: &Antenna) -> bool {
        if let Some(date) = self.date {
            if !antenna.is_active_at(date) {
                return false;
            }
        }
        if let Some(radios) = &self.radios {
            match antenna.cell.radio() {
                Some(radio) if radios.contains(&radio) => {}
                _ => return false,
            }
        }
        if self.mcc.is_some() && antenna.cell.mcc() != self.mcc {
            return false;
        }
        if self.mnc.is_some() && antenna.cell.mnc() != self.mnc {
            return false;
        }
        !self.exclude.iter().any(|pattern| pattern.subsumes(&antenna.cell))
    }
}

/// The contract all backends answer identically.
pub trait CellResolver {
    /// Resolve one identity at an instant. Zero matches is `None`; several
    /// matches are decided by the backend's duplicate policy.
    fn get(&self, date: DateTime<Utc>, ci: &CellIdentity) -> Result<Option<Antenna>>;

    /// Antennas satisfying `query`, ordered by ascending distance from its
    /// centre (unless random order was requested), truncated to the count
    /// limit.
    fn search(&self, query: &SearchQuery) -> Result<Vec<Antenna>>;

    /// Number of records matching the accumulated constraints, ignoring the
    /// count limit.
    fn count(&self) -> Result<usize>;
}
