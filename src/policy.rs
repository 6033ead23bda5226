//! Strategies for resolving multiple records matching one lookup.

use clap::ValueEnum;
use serde::Deserialize;
use tracing::warn;

use crate::antenna::Antenna;
use crate::error::{Error, Result};
use crate::identity::CellIdentity;

/// What a resolver does when a `get` matches more than one record.
///
/// The candidate order is whatever the backend returned; it is not
/// guaranteed stable across backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Fail the lookup.
    Fail,
    /// Log a warning and return the first candidate.
    #[default]
    Warn,
    /// Return the first candidate silently.
    TakeFirst,
    /// Discard all candidates and return nothing.
    Drop,
}

impl DuplicatePolicy {
    pub fn resolve(
        self,
        ci: &CellIdentity,
        mut candidates: Vec<Antenna>,
    ) -> Result<Option<Antenna>> {
        match self {
            DuplicatePolicy::Fail => Err(Error::DuplicateIdentity(ci.to_string())),
            DuplicatePolicy::Warn => {
                warn!("duplicate cell id {ci}");
                Ok(Some(candidates.swap_remove(0)))
            }
            DuplicatePolicy::TakeFirst => Ok(Some(candidates.swap_remove(0))),
            DuplicatePolicy::Drop => Ok(None),
        }
    }
}
