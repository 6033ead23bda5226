//! Bulk CSV import and export of the antenna table.
//!
//! The import is forgiving per batch and strict per row: a row that fails
//! validation is reported with its line number and skipped, and the rest of
//! the batch continues. Positions are imported with the exact coordinate
//! transform; the export recomputes longitude/latitude with the cheap
//! polynomial approximation, so exported positions are approximate.

use std::io::{Read, Write};

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use geo::Point;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::coord::RdPoint;
use crate::error::{Error, Result};
use crate::identity::Radio;
use crate::store::{AntennaRow, SqliteStore};

/// One line of the interchange format. Empty fields are unset.
#[derive(Debug, Deserialize, Serialize)]
struct Record {
    date_start: Option<String>,
    date_end: Option<String>,
    radio: Option<String>,
    mcc: Option<u16>,
    mnc: Option<u16>,
    lac: Option<u32>,
    ci: Option<u64>,
    eci: Option<u64>,
    longitude: f64,
    latitude: f64,
    azimuth: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub imported: usize,
    pub skipped: usize,
}

/// Read the interchange CSV and insert every valid row.
pub fn import<R: Read>(store: &mut SqliteStore, reader: R) -> Result<ImportStats> {
    let mut csv = csv::Reader::from_reader(reader);
    let mut stats = ImportStats::default();

    for (i, result) in csv.deserialize().enumerate() {
        let line = i + 2; // the header is line 1
        match import_row(store, result) {
            Ok(()) => stats.imported += 1,
            Err(e) => {
                warn!("import error at line {line}: {e}");
                stats.skipped += 1;
            }
        }
        if (i % 10_000) == 0 && i != 0 {
            eprintln!("{i}");
        }
    }

    Ok(stats)
}

fn import_row(
    store: &mut SqliteStore,
    result: std::result::Result<Record, csv::Error>,
) -> Result<()> {
    let record: Record = result?;

    if !record.longitude.is_finite() {
        return Err(Error::InvalidRecord(format!(
            "invalid number for longitude: {}",
            record.longitude
        )));
    }
    if !record.latitude.is_finite() {
        return Err(Error::InvalidRecord(format!(
            "invalid number for latitude: {}",
            record.latitude
        )));
    }
    if record.ci.is_none() && record.eci.is_none() {
        return Err(Error::InvalidRecord("neither ci nor eci present".to_string()));
    }

    let mcc = record
        .mcc
        .ok_or_else(|| Error::InvalidRecord("missing mcc".to_string()))?;
    let mnc = record
        .mnc
        .ok_or_else(|| Error::InvalidRecord("missing mnc".to_string()))?;
    let radio = record.radio.as_deref().map(Radio::parse).transpose()?;
    let azimuth = match record.azimuth {
        None => None,
        Some(a) if (0..360).contains(&a) => Some(a as u16),
        Some(a) => {
            return Err(Error::InvalidRecord(format!("azimuth out of range: {a}")));
        }
    };

    let position = RdPoint::from_wgs84(Point::new(record.longitude, record.latitude));
    store.insert(&AntennaRow {
        date_start: record.date_start.as_deref().map(parse_date).transpose()?,
        date_end: record.date_end.as_deref().map(parse_date).transpose()?,
        radio,
        mcc,
        mnc,
        lac: record.lac,
        ci: record.ci,
        eci: record.eci,
        x: position.x,
        y: position.y,
        azimuth,
    })?;
    Ok(())
}

/// Write the whole table back out in the interchange format.
pub fn export<W: Write>(store: &SqliteStore, writer: W) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    let mut exported = 0;

    store.for_each_row(|row| {
        let geodetic = RdPoint::new(row.x, row.y).wgs84_approx();
        csv.serialize(Record {
            date_start: row.date_start.map(fmt_date),
            date_end: row.date_end.map(fmt_date),
            radio: row.radio.map(|r| r.to_string()),
            mcc: Some(row.mcc),
            mnc: Some(row.mnc),
            lac: row.lac,
            ci: row.ci,
            eci: row.eci,
            longitude: geodetic.x(),
            latitude: geodetic.y(),
            azimuth: row.azimuth.map(i64::from),
        })?;
        exported += 1;
        Ok(())
    })?;

    csv.flush()?;
    Ok(exported)
}

/// Parse a timestamp, accepting RFC3339 or a plain date (midnight UTC).
pub fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }
    Err(Error::InvalidRecord(format!("unparseable date: {s:?}")))
}

fn fmt_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}
