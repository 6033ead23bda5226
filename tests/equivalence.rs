//! Cross-backend properties: the spiral search of the grid index must agree
//! with an exhaustive linear scan, and the SQLite store must answer the same
//! queries with the same records in the same order.

use antennadb::antenna::Antenna;
use antennadb::coord::RdPoint;
use antennadb::grid::{GridConfig, GridIndex};
use antennadb::policy::DuplicatePolicy;
use antennadb::resolver::{CellResolver, SearchQuery, DEFAULT_COUNT_LIMIT};
use antennadb::store::{AntennaRow, SqliteStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The oracle: an O(n) scan with the same ordering rules.
fn linear_scan(index: &GridIndex, query: &SearchQuery) -> Vec<Antenna> {
    let center = query.center.expect("oracle queries carry a centre");
    let upper = query.distance_limit_m.expect("oracle queries carry a limit");

    let mut hits: Vec<(f64, usize)> = index
        .antennas()
        .iter()
        .enumerate()
        .filter(|(_, a)| query.matches(a))
        .map(|(i, a)| (center.distance(&a.position), i))
        .filter(|(d, _)| *d < upper)
        .filter(|(d, _)| query.distance_lower_limit_m.map_or(true, |lower| *d > lower))
        .collect();
    hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    hits.truncate(query.count_limit.unwrap_or(DEFAULT_COUNT_LIMIT));
    hits.into_iter()
        .map(|(_, i)| index.antennas()[i].clone())
        .collect()
}

fn random_query(rng: &mut StdRng, index: &GridIndex) -> SearchQuery {
    // centres inside and well outside the arena
    let center = RdPoint::new(
        rng.gen_range(96_000.0..112_000.0),
        rng.gen_range(96_000.0..110_000.0),
    );
    let limit = rng.gen_range(50.0..6_000.0);
    let mut query = SearchQuery::near(center, limit);
    if rng.gen_bool(0.3) {
        query = query.above(rng.gen_range(0.0..limit));
    }
    if rng.gen_bool(0.3) {
        query = query.with_count_limit(rng.gen_range(1..40));
    }
    for _ in 0..rng.gen_range(0..3) {
        let pick = rng.gen_range(0..index.antennas().len());
        query = query.without(index.antennas()[pick].cell);
    }
    query
}

#[test]
fn spiral_search_equals_linear_scan() {
    let index = GridIndex::build(&GridConfig {
        columns: 12,
        rows: 9,
        antennas_per_position: 2,
        ..GridConfig::default()
    });
    let mut rng = StdRng::seed_from_u64(42);

    for round in 0..300 {
        let query = random_query(&mut rng, &index);
        let spiral = index.search(&query).unwrap();
        let scanned = linear_scan(&index, &query);
        assert_eq!(
            spiral, scanned,
            "round {round}: spiral and linear scan disagree for {query:?}"
        );
    }
}

fn store_from(index: &GridIndex) -> SqliteStore {
    let mut store = SqliteStore::open_in_memory(DuplicatePolicy::Warn).unwrap();
    for antenna in index.antennas() {
        store.insert(&AntennaRow::from_antenna(antenna).unwrap()).unwrap();
    }
    store
}

#[test]
fn store_and_grid_index_agree() {
    let index = GridIndex::build(&GridConfig {
        columns: 8,
        rows: 8,
        ..GridConfig::default()
    });
    let store = store_from(&index);
    let mut rng = StdRng::seed_from_u64(7);

    for round in 0..60 {
        let query = random_query(&mut rng, &index);
        let from_grid = index.search(&query).unwrap();
        let from_store = store.search(&query).unwrap();

        let grid_cells: Vec<String> = from_grid.iter().map(|a| a.cell.to_string()).collect();
        let store_cells: Vec<String> = from_store.iter().map(|a| a.cell.to_string()).collect();
        assert_eq!(
            grid_cells, store_cells,
            "round {round}: backends disagree for {query:?}"
        );

        for (a, b) in from_grid.iter().zip(&from_store) {
            assert!(a.position.distance(&b.position) < 1e-6);
        }
    }
}

#[test]
fn backends_agree_on_filters() {
    let index = GridIndex::build(&GridConfig {
        columns: 6,
        rows: 6,
        ..GridConfig::default()
    });
    let store = store_from(&index);
    let center = RdPoint::new(101_200.0, 101_700.0);

    // the synthetic operator matches ...
    let query = SearchQuery::near(center, 2_000.0).with_mcc(204).with_mnc(16);
    assert_eq!(
        index.search(&query).unwrap().len(),
        store.search(&query).unwrap().len()
    );

    // ... a different one matches nothing on either backend
    let none = SearchQuery::near(center, 2_000.0).with_mnc(4);
    assert!(index.search(&none).unwrap().is_empty());
    assert!(store.search(&none).unwrap().is_empty());

    // excluding the serving cell drops it from both backends
    let serving = index.search(&query).unwrap()[0].cell;
    let without = index.search(&query.clone().without(serving)).unwrap();
    let without_store = store.search(&query.without(serving)).unwrap();
    assert!(without.iter().all(|a| a.cell != serving));
    assert_eq!(without.len(), without_store.len());
}

#[test]
fn both_backends_reject_unbounded_coordinate_searches() {
    let index = GridIndex::build(&GridConfig::default());
    let store = store_from(&index);
    let query = SearchQuery {
        center: Some(RdPoint::new(100_000.0, 100_000.0)),
        ..SearchQuery::default()
    };
    assert!(index.search(&query).is_err());
    assert!(store.search(&query).is_err());
}

#[test]
fn searches_without_a_date_include_expired_records() {
    let index = GridIndex::build(&GridConfig {
        columns: 2,
        rows: 2,
        ..GridConfig::default()
    });
    let mut store = SqliteStore::open_in_memory(DuplicatePolicy::Warn).unwrap();
    for antenna in index.antennas() {
        let mut row = AntennaRow::from_antenna(antenna).unwrap();
        // every record expired years ago
        row.date_end = Some(bulk_date("2012-01-01"));
        store.insert(&row).unwrap();
    }

    let center = RdPoint::new(100_000.0, 100_000.0);
    let undated = store.search(&SearchQuery::near(center, 10_000.0)).unwrap();
    assert_eq!(undated.len(), index.antennas().len());

    let dated = store
        .search(&SearchQuery::near(center, 10_000.0).at(bulk_date("2020-06-01")))
        .unwrap();
    assert!(dated.is_empty());
}

fn bulk_date(s: &str) -> chrono::DateTime<chrono::Utc> {
    antennadb::bulk::parse_date(s).unwrap()
}
