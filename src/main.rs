use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use antennadb::angle;
use antennadb::bulk;
use antennadb::config;
use antennadb::coord::RdPoint;
use antennadb::identity::{CellIdentity, Radio};
use antennadb::policy::DuplicatePolicy;
use antennadb::resolver::{CellResolver, SearchQuery};
use antennadb::store::SqliteStore;

#[derive(Debug, Parser)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database file, overrides the config file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// What to do when a lookup matches several records
    #[arg(long)]
    on_duplicate: Option<DuplicatePolicy>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load antennas from a CSV file (or stdin) into the database
    Import { path: Option<PathBuf> },
    /// Write the antenna table as CSV to a file (or stdout)
    Export { path: Option<PathBuf> },
    /// Resolve one cell identity at an instant
    Get {
        /// Timestamp, RFC3339 or a plain date
        date: String,
        /// Identity as mcc-mnc-lac-ci, or mcc-mnc--eci for LTE
        cell: String,
    },
    /// List antennas near a grid point
    Search {
        x: f64,
        y: f64,
        /// Keep antennas strictly closer than this many metres
        #[arg(long)]
        distance: f64,
        /// Drop antennas at or within this many metres
        #[arg(long)]
        min_distance: Option<f64>,
        #[arg(long)]
        date: Option<String>,
        /// Radio technologies to keep, e.g. LTE
        #[arg(long)]
        radio: Vec<String>,
        #[arg(long)]
        mcc: Option<u16>,
        #[arg(long)]
        mnc: Option<u16>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Count records in the database
    Count,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();

    let path = match cli.config.as_deref() {
        Some(x) => x,
        None => Path::new("config.toml"),
    };
    let mut config = config::load(path)?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    if let Some(policy) = cli.on_duplicate {
        config.duplicate_policy = policy;
    }

    let mut store = SqliteStore::open(&config.database, config.duplicate_policy)?;

    match cli.command {
        Command::Import { path } => {
            let stats = match path {
                Some(path) => {
                    let file =
                        File::open(&path).with_context(|| format!("opening {}", path.display()))?;
                    bulk::import(&mut store, file)?
                }
                None => bulk::import(&mut store, io::stdin())?,
            };
            eprintln!("imported {} antennas, skipped {}", stats.imported, stats.skipped);
        }

        Command::Export { path } => {
            let exported = match path {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("creating {}", path.display()))?;
                    bulk::export(&store, file)?
                }
                None => bulk::export(&store, io::stdout())?,
            };
            eprintln!("exported {exported} antennas");
        }

        Command::Get { date, cell } => {
            let date = bulk::parse_date(&date)?;
            let cell: CellIdentity = cell.parse()?;
            match store.get(date, &cell)? {
                Some(antenna) => print_antenna(&antenna, None),
                None => eprintln!("no antenna matches"),
            }
        }

        Command::Search {
            x,
            y,
            distance,
            min_distance,
            date,
            radio,
            mcc,
            mnc,
            limit,
        } => {
            let center = RdPoint::new(x, y);
            let mut query = SearchQuery::near(center, distance);
            if let Some(lower) = min_distance {
                query = query.above(lower);
            }
            if let Some(date) = date {
                query = query.at(bulk::parse_date(&date)?);
            }
            if !radio.is_empty() {
                let radios = radio
                    .iter()
                    .map(|r| Radio::parse(r))
                    .collect::<antennadb::Result<Vec<_>>>()?;
                query = query.with_radios(radios);
            }
            if let Some(mcc) = mcc {
                query = query.with_mcc(mcc);
            }
            if let Some(mnc) = mnc {
                query = query.with_mnc(mnc);
            }
            if let Some(limit) = limit {
                query = query.with_count_limit(limit);
            }

            for antenna in store.search(&query)? {
                print_antenna(&antenna, Some(center));
            }
        }

        Command::Count => {
            println!("{}", store.count()?);
        }
    }

    Ok(())
}

fn print_antenna(antenna: &antennadb::Antenna, from: Option<RdPoint>) {
    let mut line = format!(
        "{} at ({:.1}, {:.1})",
        antenna.cell, antenna.position.x, antenna.position.y
    );
    if let Some(azimuth) = antenna.azimuth {
        line.push_str(&format!(" azimuth {azimuth}"));
    }
    if let Some(from) = from {
        line.push_str(&format!(" distance {:.1}m", from.distance(&antenna.position)));
        let bearing = angle::azimuth(&from, &antenna.position);
        if !bearing.is_undefined() {
            line.push_str(&format!(" bearing {:.0}", bearing.degrees()));
        }
    }
    println!("{line}");
}
