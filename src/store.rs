//! SQLite-backed antenna store with an R*Tree position index.
//!
//! [`StoreQuery`] is an immutable accumulated query: every refinement
//! returns a new view and nothing touches the database until the view is
//! fetched, counted or asked for a single record. The connection is a plain
//! single-session handle; views can be shared freely, concurrent callers
//! need their own store.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use tracing::debug;

use crate::antenna::Antenna;
use crate::coord::RdPoint;
use crate::error::{Error, Result};
use crate::identity::{CellIdentity, Radio};
use crate::policy::DuplicatePolicy;
use crate::resolver::{CellResolver, SearchQuery, SortOrder};

/// Raw column image of one antenna row, as imported and as stored.
///
/// Unlike [`Antenna`] this keeps every column, e.g. the lac of an LTE row,
/// which the decoded identity does not carry.
#[derive(Debug, Clone, PartialEq)]
pub struct AntennaRow {
    pub date_start: Option<DateTime<Utc>>,
    pub date_end: Option<DateTime<Utc>>,
    pub radio: Option<Radio>,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: Option<u32>,
    pub ci: Option<u64>,
    pub eci: Option<u64>,
    pub x: f64,
    pub y: f64,
    pub azimuth: Option<u16>,
}

impl AntennaRow {
    /// Column image of a constructed record; requires a known operator
    /// because the schema does.
    pub fn from_antenna(antenna: &Antenna) -> Result<AntennaRow> {
        let f = antenna.cell.fields();
        let mcc = f
            .mcc
            .ok_or_else(|| Error::InvalidIdentity("a stored antenna needs an mcc".to_string()))?;
        let mnc = f
            .mnc
            .ok_or_else(|| Error::InvalidIdentity("a stored antenna needs an mnc".to_string()))?;
        Ok(AntennaRow {
            date_start: antenna.valid_from,
            date_end: antenna.valid_to,
            radio: f.radio,
            mcc,
            mnc,
            lac: f.lac,
            ci: f.ci,
            eci: f.eci,
            x: antenna.position.x,
            y: antenna.position.y,
            azimuth: antenna.azimuth,
        })
    }

    /// Decode the row into a record, dispatching the identity on the radio
    /// column the way lookups expect: GSM/UMTS rows are addressed by lac/ci,
    /// LTE rows by eci, rows without a radio keep both interpretations.
    pub fn into_antenna(self) -> Result<Antenna> {
        let cell = match self.radio {
            Some(Radio::Gsm) | Some(Radio::Umts) => CellIdentity::new(
                self.radio,
                Some(self.mcc),
                Some(self.mnc),
                self.lac,
                self.ci,
                None,
            )?,
            Some(Radio::Lte) => CellIdentity::new(
                Some(Radio::Lte),
                Some(self.mcc),
                Some(self.mnc),
                None,
                None,
                self.eci,
            )?,
            None => CellIdentity::new(
                None,
                Some(self.mcc),
                Some(self.mnc),
                self.lac,
                self.ci,
                self.eci,
            )?,
        };
        Ok(Antenna {
            cell,
            position: RdPoint::new(self.x, self.y),
            azimuth: self.azimuth,
            valid_from: self.date_start,
            valid_to: self.date_end,
        })
    }
}

pub struct SqliteStore {
    conn: Connection,
    policy: DuplicatePolicy,
}

impl SqliteStore {
    pub fn open(path: &Path, policy: DuplicatePolicy) -> Result<SqliteStore> {
        let conn = Connection::open(path)?;
        conn.execute_batch(include_str!("../db.sql"))?;
        Ok(SqliteStore { conn, policy })
    }

    pub fn open_in_memory(policy: DuplicatePolicy) -> Result<SqliteStore> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(include_str!("../db.sql"))?;
        Ok(SqliteStore { conn, policy })
    }

    /// Insert one row and index its position. Each insert commits on its
    /// own, so one bad row in a batch never takes the rest down with it.
    pub fn insert(&mut self, row: &AntennaRow) -> Result<i64> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "insert into antenna (date_start, date_end, radio, mcc, mnc, lac, ci, eci, x, y, azimuth)
             values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                row.date_start.map(fmt_date),
                row.date_end.map(fmt_date),
                row.radio.map(|r| r.to_string()),
                row.mcc,
                row.mnc,
                row.lac,
                row.ci.map(|v| v as i64),
                row.eci.map(|v| v as i64),
                row.x,
                row.y,
                row.azimuth,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "insert into antenna_rtree (id, min_x, max_x, min_y, max_y) values (?1, ?2, ?2, ?3, ?3)",
            params![id, row.x, row.y],
        )?;
        tx.commit()?;
        Ok(id)
    }

    /// An unconstrained view over the whole table.
    pub fn query(&self) -> StoreQuery<'_> {
        StoreQuery {
            store: self,
            wheres: Vec::new(),
            params: Vec::new(),
            area: None,
            order: SortOrder::Distance,
            count_limit: None,
        }
    }

    /// Visit every row in storage order; used by the bulk exporter.
    pub fn for_each_row(&self, mut f: impl FnMut(AntennaRow) -> Result<()>) -> Result<()> {
        let mut stmt = self.conn.prepare(&format!("select {COLUMNS} from antenna a"))?;
        let rows = stmt.query_map([], read_row)?;
        for row in rows {
            f(row?.decode()?)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct AreaFilter {
    center: RdPoint,
    upper_m: f64,
    lower_m: Option<f64>,
}

/// An immutable accumulated query over a [`SqliteStore`].
#[derive(Clone)]
pub struct StoreQuery<'a> {
    store: &'a SqliteStore,
    wheres: Vec<String>,
    params: Vec<Value>,
    area: Option<AreaFilter>,
    order: SortOrder,
    count_limit: Option<usize>,
}

const COLUMNS: &str = "a.date_start, a.date_end, a.radio, a.mcc, a.mnc, a.lac, a.ci, a.eci, a.x, a.y, a.azimuth";
const DISTANCE2: &str = "((a.x - ?) * (a.x - ?) + (a.y - ?) * (a.y - ?))";

impl<'a> StoreQuery<'a> {
    /// Intersect the view with further constraints, returning a new view.
    ///
    /// All constraints accumulate, except the distance filter, the sort
    /// order and the count limit: a fresh value for those replaces the
    /// previous one.
    pub fn refine(&self, query: &SearchQuery) -> Result<StoreQuery<'a>> {
        let mut next = self.clone();

        if let Some(center) = query.center {
            let upper_m = query.distance_limit_m.ok_or(Error::MissingDistanceLimit)?;
            next.area = Some(AreaFilter {
                center,
                upper_m,
                lower_m: query.distance_lower_limit_m,
            });
        }

        if let Some(date) = query.date {
            next.wheres
                .push("(date_start is null or ? >= date_start)".to_string());
            next.params.push(fmt_date(date).into());
            next.wheres
                .push("(date_end is null or ? < date_end)".to_string());
            next.params.push(fmt_date(date).into());
        }

        if let Some(radios) = &query.radios {
            if radios.is_empty() {
                next.wheres.push("1 = 0".to_string());
            } else {
                let marks = vec!["?"; radios.len()].join(", ");
                next.wheres.push(format!("radio in ({marks})"));
                next.params
                    .extend(radios.iter().map(|r| Value::from(r.to_string())));
            }
        }

        if let Some(mcc) = query.mcc {
            next.wheres.push("mcc = ?".to_string());
            next.params.push((mcc as i64).into());
        }
        if let Some(mnc) = query.mnc {
            next.wheres.push("mnc = ?".to_string());
            next.params.push((mnc as i64).into());
        }

        for excluded in &query.exclude {
            let (clause, clause_params) = identity_clauses(excluded);
            if clause.is_empty() {
                // a wildcard pattern excludes every record
                next.wheres.push("1 = 0".to_string());
            } else {
                next.wheres.push(format!("not ({clause})"));
                next.params.extend(clause_params);
            }
        }

        if query.count_limit.is_some() {
            next.count_limit = query.count_limit;
        }
        next.order = query.order;

        Ok(next)
    }

    /// Execute the view and return the records, distance-ordered unless
    /// random order was requested.
    pub fn fetch(&self) -> Result<Vec<Antenna>> {
        let (sql, params) = self.assemble(COLUMNS, true);
        debug!(%sql, "fetch");
        let mut stmt = self.store.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), read_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.decode()?.into_antenna()?);
        }
        Ok(out)
    }

    /// Number of matching records; the count limit does not apply.
    pub fn count(&self) -> Result<usize> {
        let (sql, params) = self.assemble("count(*)", false);
        debug!(%sql, "count");
        let n: i64 = self
            .store
            .conn
            .prepare(&sql)?
            .query_row(params_from_iter(params), |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Resolve one identity at an instant within this view's constraints.
    pub fn get(&self, date: DateTime<Utc>, ci: &CellIdentity) -> Result<Option<Antenna>> {
        let mut refined = self.clone();
        refined
            .wheres
            .push("(date_start is null or ? >= date_start) and (date_end is null or ? < date_end)".to_string());
        refined.params.push(fmt_date(date).into());
        refined.params.push(fmt_date(date).into());

        let (clause, clause_params) = identity_clauses(ci);
        if !clause.is_empty() {
            refined.wheres.push(clause);
            refined.params.extend(clause_params);
        }

        let (sql, params) = refined.assemble(COLUMNS, false);
        debug!(%sql, "get");
        let mut stmt = self.store.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), read_row)?;
        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(row?.decode()?.into_antenna()?);
        }

        match candidates.len() {
            0 => Ok(None),
            1 => Ok(candidates.pop()),
            _ => self.store.policy.resolve(ci, candidates),
        }
    }

    fn assemble(&self, select: &str, with_order_limit: bool) -> (String, Vec<Value>) {
        let mut wheres = self.wheres.clone();
        let mut params = self.params.clone();
        let mut join = "";

        if let Some(area) = self.area {
            join = " join antenna_rtree r on r.id = a.id";
            wheres.push(
                "r.min_x <= ? and r.max_x >= ? and r.min_y <= ? and r.max_y >= ?".to_string(),
            );
            params.extend([
                Value::from(area.center.x + area.upper_m),
                Value::from(area.center.x - area.upper_m),
                Value::from(area.center.y + area.upper_m),
                Value::from(area.center.y - area.upper_m),
            ]);
            wheres.push(format!("{DISTANCE2} < ?"));
            push_center(&mut params, area.center);
            params.push((area.upper_m * area.upper_m).into());
            if let Some(lower_m) = area.lower_m {
                wheres.push(format!("{DISTANCE2} > ?"));
                push_center(&mut params, area.center);
                params.push((lower_m * lower_m).into());
            }
        }

        let mut sql = format!("select {select} from antenna a{join}");
        if !wheres.is_empty() {
            sql.push_str(" where ");
            sql.push_str(&wheres.join(" and "));
        }

        if with_order_limit {
            match self.order {
                SortOrder::Distance => {
                    if let Some(area) = self.area {
                        sql.push_str(&format!(" order by {DISTANCE2}"));
                        push_center(&mut params, area.center);
                    }
                }
                SortOrder::Random => sql.push_str(" order by random()"),
            }
            sql.push_str(&format!(
                " limit {}",
                self.count_limit.unwrap_or(crate::resolver::DEFAULT_COUNT_LIMIT)
            ));
        }

        (sql, params)
    }
}

fn push_center(params: &mut Vec<Value>, center: RdPoint) {
    params.extend([
        Value::from(center.x),
        Value::from(center.x),
        Value::from(center.y),
        Value::from(center.y),
    ]);
}

/// WHERE fragment and parameters selecting the rows an identity pattern
/// addresses. The shape mirrors [`CellIdentity::subsumes`]: set fields
/// constrain, unset fields do not, and an identity with both a legacy cell
/// id and an eci matches either interpretation.
fn identity_clauses(ci: &CellIdentity) -> (String, Vec<Value>) {
    let f = ci.fields();
    let mut parts: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    if let Some(radio) = f.radio {
        parts.push("radio = ?".to_string());
        params.push(radio.to_string().into());
    }
    if let Some(mcc) = f.mcc {
        parts.push("mcc = ?".to_string());
        params.push((mcc as i64).into());
    }
    if let Some(mnc) = f.mnc {
        parts.push("mnc = ?".to_string());
        params.push((mnc as i64).into());
    }

    let mut legacy: Vec<&str> = Vec::new();
    let mut legacy_params: Vec<Value> = Vec::new();
    if let Some(lac) = f.lac {
        legacy.push("lac = ?");
        legacy_params.push((lac as i64).into());
    }
    if let Some(ci) = f.ci {
        legacy.push("ci = ?");
        legacy_params.push((ci as i64).into());
    }

    match (legacy.is_empty(), f.eci) {
        (false, Some(eci)) => {
            parts.push(format!("(({}) or eci = ?)", legacy.join(" and ")));
            params.extend(legacy_params);
            params.push((eci as i64).into());
        }
        (false, None) => {
            parts.extend(legacy.iter().map(|s| s.to_string()));
            params.extend(legacy_params);
        }
        (true, Some(eci)) => {
            parts.push("eci = ?".to_string());
            params.push((eci as i64).into());
        }
        (true, None) => {}
    }

    (parts.join(" and "), params)
}

impl CellResolver for SqliteStore {
    fn get(&self, date: DateTime<Utc>, ci: &CellIdentity) -> Result<Option<Antenna>> {
        self.query().get(date, ci)
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<Antenna>> {
        self.query().refine(query)?.fetch()
    }

    fn count(&self) -> Result<usize> {
        self.query().count()
    }
}

impl CellResolver for StoreQuery<'_> {
    fn get(&self, date: DateTime<Utc>, ci: &CellIdentity) -> Result<Option<Antenna>> {
        StoreQuery::get(self, date, ci)
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<Antenna>> {
        self.refine(query)?.fetch()
    }

    fn count(&self) -> Result<usize> {
        StoreQuery::count(self)
    }
}

// Timestamps are stored as RFC3339 UTC text with a constant format, so the
// lexicographic comparisons in SQL are chronological.
fn fmt_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_stored_date(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| Error::InvalidRecord(format!("bad timestamp in store: {s:?} ({e})")))
}

/// Column values as sqlite hands them out, before domain conversion.
struct RowImage {
    date_start: Option<String>,
    date_end: Option<String>,
    radio: Option<String>,
    mcc: i64,
    mnc: i64,
    lac: Option<i64>,
    ci: Option<i64>,
    eci: Option<i64>,
    x: f64,
    y: f64,
    azimuth: Option<i64>,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RowImage> {
    Ok(RowImage {
        date_start: row.get(0)?,
        date_end: row.get(1)?,
        radio: row.get(2)?,
        mcc: row.get(3)?,
        mnc: row.get(4)?,
        lac: row.get(5)?,
        ci: row.get(6)?,
        eci: row.get(7)?,
        x: row.get(8)?,
        y: row.get(9)?,
        azimuth: row.get(10)?,
    })
}

impl RowImage {
    fn decode(self) -> Result<AntennaRow> {
        fn int<T: TryFrom<i64>>(v: i64, what: &str) -> Result<T> {
            T::try_from(v).map_err(|_| Error::InvalidRecord(format!("{what} out of range: {v}")))
        }

        Ok(AntennaRow {
            date_start: self.date_start.as_deref().map(parse_stored_date).transpose()?,
            date_end: self.date_end.as_deref().map(parse_stored_date).transpose()?,
            radio: self.radio.as_deref().map(Radio::parse).transpose()?,
            mcc: int(self.mcc, "mcc")?,
            mnc: int(self.mnc, "mnc")?,
            lac: self.lac.map(|v| int(v, "lac")).transpose()?,
            ci: self.ci.map(|v| int(v, "ci")).transpose()?,
            eci: self.eci.map(|v| int(v, "eci")).transpose()?,
            x: self.x,
            y: self.y,
            azimuth: self.azimuth.map(|v| int(v, "azimuth")).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(year: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
    }

    fn gsm_row(lac: u32, ci: u64, x: f64, y: f64) -> AntennaRow {
        AntennaRow {
            date_start: None,
            date_end: None,
            radio: Some(Radio::Gsm),
            mcc: 204,
            mnc: 4,
            lac: Some(lac),
            ci: Some(ci),
            eci: None,
            x,
            y,
            azimuth: Some(120),
        }
    }

    fn lte_row(eci: u64, x: f64, y: f64) -> AntennaRow {
        AntennaRow {
            date_start: None,
            date_end: None,
            radio: Some(Radio::Lte),
            mcc: 204,
            mnc: 4,
            lac: None,
            ci: None,
            eci: Some(eci),
            x,
            y,
            azimuth: None,
        }
    }

    fn store_with(policy: DuplicatePolicy, rows: &[AntennaRow]) -> SqliteStore {
        let mut store = SqliteStore::open_in_memory(policy).unwrap();
        for row in rows {
            store.insert(row).unwrap();
        }
        store
    }

    fn lookup(mcc: u16, mnc: u16, lac: Option<u32>, ci: Option<u64>, eci: Option<u64>) -> CellIdentity {
        CellIdentity::new(None, Some(mcc), Some(mnc), lac, ci, eci).unwrap()
    }

    #[test]
    fn get_resolves_by_legacy_id_and_by_eci() {
        let store = store_with(
            DuplicatePolicy::Fail,
            &[gsm_row(664, 1, 100_000.0, 400_000.0), lte_row(26_436_619, 101_000.0, 400_000.0)],
        );

        let hit = store.get(at(2020), &lookup(204, 4, Some(664), Some(1), None)).unwrap();
        assert_eq!(hit.unwrap().position, RdPoint::new(100_000.0, 400_000.0));

        let hit = store.get(at(2020), &lookup(204, 4, None, None, Some(26_436_619))).unwrap();
        assert_eq!(hit.unwrap().position, RdPoint::new(101_000.0, 400_000.0));

        // misses: unknown ids, wrong operator
        assert!(store.get(at(2020), &lookup(204, 4, None, None, Some(9_999_999))).unwrap().is_none());
        assert!(store.get(at(2020), &lookup(204, 4, Some(664), Some(99_999_999), None)).unwrap().is_none());
        assert!(store.get(at(2020), &lookup(204, 99, Some(664), Some(1), None)).unwrap().is_none());
    }

    #[test]
    fn get_with_unknown_radio_tries_both_interpretations() {
        let store = store_with(
            DuplicatePolicy::Fail,
            &[lte_row(758_049, 100_000.0, 400_000.0)],
        );
        // ci and eci both present; only the eci interpretation matches
        let ci = lookup(204, 4, Some(664), Some(1), Some(758_049));
        assert!(store.get(at(2020), &ci).unwrap().is_some());
    }

    #[test]
    fn get_respects_validity_interval() {
        let mut row = gsm_row(664, 1, 100_000.0, 400_000.0);
        row.date_start = Some(at(2019));
        row.date_end = Some(at(2021));
        let store = store_with(DuplicatePolicy::Fail, &[row]);
        let ci = lookup(204, 4, Some(664), Some(1), None);

        assert!(store.get(at(1900), &ci).unwrap().is_none());
        assert!(store.get(at(2019), &ci).unwrap().is_some()); // start inclusive
        assert!(store.get(at(2020), &ci).unwrap().is_some());
        assert!(store.get(at(2021), &ci).unwrap().is_none()); // end exclusive
    }

    #[test]
    fn disjoint_validity_intervals_never_trigger_the_policy() {
        let mut old = gsm_row(664, 1, 100_000.0, 400_000.0);
        old.date_end = Some(at(2019));
        let mut new = gsm_row(664, 1, 105_000.0, 400_000.0);
        new.date_start = Some(at(2019));
        // fail policy would error if both ever matched
        let store = store_with(DuplicatePolicy::Fail, &[old, new]);
        let ci = lookup(204, 4, Some(664), Some(1), None);

        assert_eq!(store.get(at(2018), &ci).unwrap().unwrap().position.x, 100_000.0);
        assert_eq!(store.get(at(2019), &ci).unwrap().unwrap().position.x, 105_000.0);
    }

    #[test]
    fn duplicate_policies_decide_overlapping_records() {
        let rows = [gsm_row(664, 1, 100_000.0, 400_000.0), gsm_row(664, 1, 105_000.0, 400_000.0)];
        let ci = lookup(204, 4, Some(664), Some(1), None);

        let err = store_with(DuplicatePolicy::Fail, &rows).get(at(2020), &ci);
        assert!(matches!(err, Err(Error::DuplicateIdentity(_))));

        assert!(store_with(DuplicatePolicy::Warn, &rows).get(at(2020), &ci).unwrap().is_some());
        assert!(store_with(DuplicatePolicy::TakeFirst, &rows).get(at(2020), &ci).unwrap().is_some());
        assert!(store_with(DuplicatePolicy::Drop, &rows).get(at(2020), &ci).unwrap().is_none());
    }

    #[test]
    fn search_orders_by_distance_with_exclusive_bounds() {
        let store = store_with(
            DuplicatePolicy::Warn,
            &[
                lte_row(1, 100_000.0, 400_000.0),
                lte_row(2, 100_300.0, 400_000.0),
                lte_row(3, 100_000.0, 400_500.0),
                lte_row(4, 101_000.0, 400_000.0), // exactly at the limit
                lte_row(5, 103_000.0, 400_000.0), // far outside
            ],
        );
        let center = RdPoint::new(100_000.0, 400_000.0);
        let hits = store.search(&SearchQuery::near(center, 1000.0)).unwrap();
        let ecis: Vec<_> = hits.iter().map(|a| a.cell.to_string()).collect();
        assert_eq!(ecis, ["204-4--1", "204-4--2", "204-4--3"]);

        let distances: Vec<f64> = hits.iter().map(|a| center.distance(&a.position)).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn search_donut_excludes_the_inner_ring() {
        let store = store_with(
            DuplicatePolicy::Warn,
            &[
                lte_row(1, 100_000.0, 400_000.0),
                lte_row(2, 100_300.0, 400_000.0),
                lte_row(3, 100_700.0, 400_000.0),
            ],
        );
        let center = RdPoint::new(100_000.0, 400_000.0);
        let hits = store
            .search(&SearchQuery::near(center, 1000.0).above(300.0))
            .unwrap();
        // 0 m excluded by the hole, 300 m is on the (exclusive) lower bound
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].position.x, 100_700.0);
    }

    #[test]
    fn search_filters_by_radio_operator_and_exclusion() {
        let mut umts = gsm_row(664, 7, 100_100.0, 400_000.0);
        umts.radio = Some(Radio::Umts);
        let mut other_op = lte_row(3, 100_200.0, 400_000.0);
        other_op.mnc = 16;
        let store = store_with(
            DuplicatePolicy::Warn,
            &[lte_row(1, 100_000.0, 400_000.0), umts, other_op],
        );
        let center = RdPoint::new(100_000.0, 400_000.0);

        let lte_only = store
            .search(&SearchQuery::near(center, 5000.0).with_radios([Radio::Lte]))
            .unwrap();
        assert_eq!(lte_only.len(), 2);

        let one_op = store
            .search(&SearchQuery::near(center, 5000.0).with_mcc(204).with_mnc(4))
            .unwrap();
        assert_eq!(one_op.len(), 2);

        let serving = CellIdentity::lte(Some(204), Some(4), Some(1));
        let without_serving = store
            .search(&SearchQuery::near(center, 5000.0).without(serving))
            .unwrap();
        assert_eq!(without_serving.len(), 2);
        assert!(without_serving.iter().all(|a| a.cell != serving));
    }

    #[test]
    fn search_without_date_includes_expired_antennas() {
        let mut expired = lte_row(1, 100_000.0, 400_000.0);
        expired.date_end = Some(at(2015));
        let store = store_with(DuplicatePolicy::Warn, &[expired]);
        let center = RdPoint::new(100_000.0, 400_000.0);

        assert_eq!(store.search(&SearchQuery::near(center, 1000.0)).unwrap().len(), 1);
        assert!(store
            .search(&SearchQuery::near(center, 1000.0).at(at(2020)))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn search_with_center_requires_a_distance_limit() {
        let store = store_with(DuplicatePolicy::Warn, &[]);
        let query = SearchQuery {
            center: Some(RdPoint::new(100_000.0, 400_000.0)),
            ..SearchQuery::default()
        };
        assert!(matches!(store.search(&query), Err(Error::MissingDistanceLimit)));
    }

    #[test]
    fn refinement_intersects_and_count_ignores_the_limit() {
        let rows: Vec<AntennaRow> = (0..20)
            .map(|i| lte_row(i, 100_000.0 + i as f64 * 100.0, 400_000.0))
            .collect();
        let store = store_with(DuplicatePolicy::Warn, &rows);
        let center = RdPoint::new(100_000.0, 400_000.0);

        let view = store.query().refine(&SearchQuery::near(center, 1500.0)).unwrap();
        let all = view.fetch().unwrap();
        assert_eq!(all.len(), 15);
        assert_eq!(view.count().unwrap(), 15);

        // a refinement returns a subset, never a superset
        let narrowed = view
            .refine(&SearchQuery::new().with_mnc(4).with_count_limit(4))
            .unwrap();
        let subset = narrowed.fetch().unwrap();
        assert_eq!(subset.len(), 4);
        assert!(subset.iter().all(|a| all.contains(a)));
        // the limit does not change the match count
        assert_eq!(narrowed.count().unwrap(), 15);

        // a fresh distance filter replaces the previous one
        let widened = narrowed.refine(&SearchQuery::near(center, 400.0)).unwrap();
        assert_eq!(widened.count().unwrap(), 4);
    }

    #[test]
    fn random_order_returns_the_same_set() {
        let rows: Vec<AntennaRow> = (0..10)
            .map(|i| lte_row(i, 100_000.0 + i as f64 * 100.0, 400_000.0))
            .collect();
        let store = store_with(DuplicatePolicy::Warn, &rows);
        let center = RdPoint::new(100_000.0, 400_000.0);

        let ordered = store.search(&SearchQuery::near(center, 5000.0)).unwrap();
        let random = store
            .search(&SearchQuery::near(center, 5000.0).random_order())
            .unwrap();
        assert_eq!(ordered.len(), random.len());
        for antenna in &random {
            assert!(ordered.contains(antenna));
        }
    }

    #[test]
    fn count_over_the_whole_store() {
        let store = store_with(
            DuplicatePolicy::Warn,
            &[lte_row(1, 100_000.0, 400_000.0), lte_row(2, 101_000.0, 400_000.0)],
        );
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn row_round_trips_through_storage() {
        let mut row = lte_row(9, 121_687.0, 487_484.0);
        row.date_start = Some(at(2019));
        row.lac = Some(1510); // the lac column survives even for LTE rows
        let mut store = store_with(DuplicatePolicy::Warn, &[]);
        store.insert(&row).unwrap();

        let mut seen = Vec::new();
        store.for_each_row(|r| {
            seen.push(r);
            Ok(())
        }).unwrap();
        assert_eq!(seen, vec![row]);
    }
}
