//! Resolution and proximity search for cellular network antennas.
//!
//! The crate answers two questions for batch analysis jobs: which antenna
//! does a cell identity refer to at a point in time, and which antennas
//! stand near a point on the map. Both run through the [`CellResolver`]
//! contract, answered by a persistent SQLite store with an R*Tree position
//! index and by an in-memory grid index used as a storage-free reference.

pub mod angle;
pub mod antenna;
pub mod bulk;
pub mod config;
pub mod coord;
pub mod error;
pub mod grid;
pub mod identity;
pub mod policy;
pub mod resolver;
pub mod store;

pub use antenna::Antenna;
pub use coord::RdPoint;
pub use error::{Error, Result};
pub use identity::{CellIdentity, Radio};
pub use policy::DuplicatePolicy;
pub use resolver::{CellResolver, SearchQuery, SortOrder};
