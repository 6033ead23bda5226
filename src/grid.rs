//! In-memory reference backend: synthetic antennas on a regular grid.
//!
//! The index answers `search` with the same semantics and ordering as the
//! SQLite store but without any storage dependency, which is what makes it
//! useful as a test oracle and a lightweight stand-in. Lookup by identity is
//! deliberately unsupported.
//!
//! The arena is one flat `Vec`; a position `(column, row)` holds
//! `antennas_per_position` consecutive entries starting at
//! `(column * rows + row) * antennas_per_position`. The search walks columns
//! outward from the query point, alternating sides, and stops a side as soon
//! as the nearest possible antenna of its next column is already out of
//! range; rows within a column are walked the same way.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::antenna::Antenna;
use crate::coord::RdPoint;
use crate::error::{Error, Result};
use crate::identity::CellIdentity;
use crate::resolver::{CellResolver, SearchQuery};

#[derive(Debug, Clone)]
pub struct GridConfig {
    pub columns: usize,
    pub rows: usize,
    pub antennas_per_position: usize,
    pub origin: RdPoint,
    pub spacing_m: f64,
    /// Operator written into every synthetic identity.
    pub mcc: u16,
    pub mnc: u16,
    /// Seed for the per-position azimuth offsets.
    pub seed: u64,
}

impl Default for GridConfig {
    fn default() -> GridConfig {
        GridConfig {
            columns: 16,
            rows: 16,
            antennas_per_position: 1,
            origin: RdPoint::new(100_000.0, 100_000.0),
            spacing_m: 500.0,
            mcc: 204,
            mnc: 16,
            seed: 0,
        }
    }
}

pub struct GridIndex {
    antennas: Vec<Antenna>,
    columns: usize,
    rows: usize,
    per_position: usize,
    origin: RdPoint,
    spacing_m: f64,
}

impl GridIndex {
    /// Populate the grid with LTE antennas carrying sequential ecis. The
    /// antennas of one position share coordinates and fan out their azimuths
    /// in 120 degree steps from a random offset.
    pub fn build(config: &GridConfig) -> GridIndex {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut antennas =
            Vec::with_capacity(config.columns * config.rows * config.antennas_per_position);
        let mut eci = 0u64;

        for column in 0..config.columns {
            let x = config.origin.x + column as f64 * config.spacing_m;
            for row in 0..config.rows {
                let y = config.origin.y + row as f64 * config.spacing_m;
                let azimuth_offset: u16 = rng.gen_range(0..360);
                for i in 0..config.antennas_per_position {
                    antennas.push(Antenna {
                        cell: CellIdentity::lte(Some(config.mcc), Some(config.mnc), Some(eci)),
                        position: RdPoint::new(x, y),
                        azimuth: Some((azimuth_offset + i as u16 * 120) % 360),
                        valid_from: None,
                        valid_to: None,
                    });
                    eci += 1;
                }
            }
        }

        GridIndex {
            antennas,
            columns: config.columns,
            rows: config.rows,
            per_position: config.antennas_per_position,
            origin: config.origin,
            spacing_m: config.spacing_m,
        }
    }

    /// Every antenna in arena order.
    pub fn antennas(&self) -> &[Antenna] {
        &self.antennas
    }

    /// Index of the grid line nearest to `value`, clamped to the arena.
    fn nearest_index(&self, value: f64, origin: f64, len: usize) -> usize {
        let raw = ((value - origin) / self.spacing_m).round();
        (raw.max(0.0) as usize).min(len - 1)
    }

    fn column_x(&self, column: usize) -> f64 {
        self.origin.x + column as f64 * self.spacing_m
    }

    fn row_y(&self, row: usize) -> f64 {
        self.origin.y + row as f64 * self.spacing_m
    }

    fn scan_column(
        &self,
        column: usize,
        row0: usize,
        center: RdPoint,
        upper_m: f64,
        lower_m: Option<f64>,
        query: &SearchQuery,
        hits: &mut Vec<(f64, usize)>,
    ) {
        let x = self.column_x(column);
        let mut side_open = [true, true];
        let mut offset = 0i64;
        while side_open[0] || side_open[1] {
            for (side, direction) in [(0usize, 1i64), (1usize, -1i64)] {
                if !side_open[side] || (offset == 0 && side == 1) {
                    continue;
                }
                let row = row0 as i64 + direction * offset;
                if row < 0 || row >= self.rows as i64 {
                    side_open[side] = false;
                    continue;
                }
                let position = RdPoint::new(x, self.row_y(row as usize));
                let distance = center.distance(&position);
                if distance >= upper_m {
                    // rows further out on this side only get farther away
                    side_open[side] = false;
                    continue;
                }
                if lower_m.is_some_and(|lower| distance <= lower) {
                    continue;
                }
                let base = (column * self.rows + row as usize) * self.per_position;
                for i in 0..self.per_position {
                    if query.matches(&self.antennas[base + i]) {
                        hits.push((distance, base + i));
                    }
                }
            }
            offset += 1;
        }
    }
}

impl CellResolver for GridIndex {
    /// Lookup by identity is out of scope for the synthetic index.
    fn get(&self, _date: DateTime<Utc>, _ci: &CellIdentity) -> Result<Option<Antenna>> {
        Err(Error::Unsupported(
            "the grid index does not support lookup by cell identity",
        ))
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<Antenna>> {
        let limit = query.effective_count_limit();

        let Some(center) = query.center else {
            let mut out: Vec<Antenna> = self
                .antennas
                .iter()
                .filter(|a| query.matches(a))
                .cloned()
                .collect();
            out.truncate(limit);
            return Ok(out);
        };
        let upper_m = query.distance_limit_m.ok_or(Error::MissingDistanceLimit)?;

        let col0 = self.nearest_index(center.x, self.origin.x, self.columns);
        let row0 = self.nearest_index(center.y, self.origin.y, self.rows);
        let nearest_y = self.row_y(row0);

        let mut hits: Vec<(f64, usize)> = Vec::new();
        let mut side_open = [true, true];
        let mut offset = 0i64;
        while side_open[0] || side_open[1] {
            for (side, direction) in [(0usize, 1i64), (1usize, -1i64)] {
                if !side_open[side] || (offset == 0 && side == 1) {
                    continue;
                }
                let column = col0 as i64 + direction * offset;
                if column < 0 || column >= self.columns as i64 {
                    side_open[side] = false;
                    continue;
                }
                // the closest any antenna of this column can be
                let nearest = RdPoint::new(self.column_x(column as usize), nearest_y);
                if center.distance(&nearest) >= upper_m {
                    side_open[side] = false;
                    continue;
                }
                self.scan_column(
                    column as usize,
                    row0,
                    center,
                    upper_m,
                    query.distance_lower_limit_m,
                    query,
                    &mut hits,
                );
            }
            offset += 1;
        }

        // ascending distance, arena order as the deterministic tie-break
        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        hits.truncate(limit);
        Ok(hits.into_iter().map(|(_, i)| self.antennas[i].clone()).collect())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.antennas.len())
    }
}
