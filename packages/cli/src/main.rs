#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `lowe`: fetch American Community Survey tables for named places.
//!
//! ```text
//! lowe fetch --vars S1701,S2801 --years 2015-2019 --location "city=palm springs, ca"
//! lowe resolve --location "state=06;city=55254"
//! lowe search "palm" --level city
//! lowe dict download --years 2015-2019 --kinds subject,detail
//! lowe geo generate --cbsa list1.csv --places places.txt --out data/
//! ```
//!
//! Every command that resolves locations needs lookup tables from
//! `lowe geo generate`, given with `--tables` or `LOWE_GEO_DIR`.
//!
//! Logging goes through [`lowe_cli_utils::init_logger`]; set `RUST_LOG`
//! for more detail.

mod args;
mod output;

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use lowe_acs::dictionary::{DictionaryKey, RemoteDictionaries};
use lowe_acs::{AcsClient, AcsConfig, FetchOutput, FetchRequest, HttpTransport, RateLimiter};
use lowe_acs_models::{Estimate, TableKind, VariableGroup};
use lowe_cli_utils::{DownloadProgress, FetchProgress, MultiProgress};
use lowe_geography::generate::GeneratedTables;
use lowe_geography::{Resolver, SEARCH_DISPLAY_LIMIT, SearchField};
use lowe_geography_models::{GeoLevel, LocationDescriptor};

#[derive(Parser)]
#[command(name = "lowe", about = "American Community Survey table fetcher")]
struct Cli {
    /// TOML config file (defaults to environment variables only)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory of generated lookup tables (defaults to `LOWE_GEO_DIR`)
    #[arg(long, global = true)]
    tables: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one or more variable groups for a year range and set of locations
    Fetch {
        /// Comma-separated variable groups, optionally with a kind
        /// (e.g. "S1701,B01001,DP05:dprofile")
        #[arg(long, value_delimiter = ',', value_parser = args::parse_variable, required = true)]
        vars: Vec<VariableGroup>,
        /// Year or inclusive year range (e.g. "2019" or "2015-2019")
        #[arg(long, value_parser = args::parse_years)]
        years: RangeInclusive<u16>,
        /// Location as `level=value` pairs separated by `;`
        /// (e.g. "city=palm springs, ca" or "state=06;city=55254"). Repeatable.
        #[arg(long = "location", value_parser = args::parse_location, required = true)]
        locations: Vec<LocationDescriptor>,
        /// Estimate window: 1, 3 or 5
        #[arg(long, default_value = "5")]
        estimate: Estimate,
        /// Write one table per variable instead of joining them
        #[arg(long)]
        no_join: bool,
        /// Output CSV path (stdout when omitted and joined)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Translate a location between names and codes
    Resolve {
        /// Location as `level=value` pairs separated by `;`
        #[arg(long = "location", value_parser = args::parse_location)]
        location: LocationDescriptor,
    },
    /// Search a lookup table by name or code substring
    Search {
        /// Text to look for
        query: String,
        /// Table to search: state, msa, county or city
        #[arg(long, default_value = "city")]
        level: GeoLevel,
        /// Match against names or codes
        #[arg(long, default_value = "name")]
        field: SearchField,
        /// Show every match instead of the first 25
        #[arg(long)]
        all: bool,
    },
    /// Variable dictionary management
    Dict {
        #[command(subcommand)]
        command: DictCommands,
    },
    /// Lookup table management
    Geo {
        #[command(subcommand)]
        command: GeoCommands,
    },
}

#[derive(Subcommand)]
enum DictCommands {
    /// Download variable dictionaries into the dictionary directory
    Download {
        /// Year or inclusive year range
        #[arg(long, value_parser = args::parse_years)]
        years: RangeInclusive<u16>,
        /// Comma-separated kinds (detail, subject, dprofile, cprofile)
        #[arg(long, value_delimiter = ',', default_value = "detail,subject,dprofile")]
        kinds: Vec<TableKind>,
        /// Estimate window: 1, 3 or 5
        #[arg(long, default_value = "5")]
        estimate: Estimate,
        /// Target directory (defaults to the configured dictionary directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum GeoCommands {
    /// Generate lookup tables from the CBSA delineation file and the place
    /// gazetteer
    Generate {
        /// CBSA delineation CSV (with its title rows removed)
        #[arg(long)]
        cbsa: PathBuf,
        /// Place gazetteer (`.txt` is read as tab-separated)
        #[arg(long)]
        places: PathBuf,
        /// Output directory for `states.json`, `msas.json`, `counties.json`
        /// and `cities.json`
        #[arg(long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = lowe_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            vars,
            years,
            locations,
            estimate,
            no_join,
            output,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(dir) = cli.tables {
                config.geography_dir = Some(dir);
            }
            let client = AcsClient::new(config)?;

            let request = FetchRequest::new(vars, years, locations)
                .estimate(estimate)
                .join(!no_join);
            fetch(&client, &request, output.as_deref(), &multi).await?;
        }
        Commands::Resolve { location } => {
            let resolver = load_resolver(cli.tables.as_deref())?;
            let codes = resolver.normalize_codes(&location)?;
            let names = resolver.resolve_to_names(&codes.to_descriptor())?;
            println!("codes: {codes}");
            println!("names: {names}");
        }
        Commands::Search {
            query,
            level,
            field,
            all,
        } => {
            let resolver = load_resolver(cli.tables.as_deref())?;
            let matches = resolver.search(&query, level, field);
            let shown = if all {
                matches.len()
            } else {
                matches.len().min(SEARCH_DISPLAY_LIMIT)
            };
            println!("{:<12} NAME", "CODE");
            println!("{}", "-".repeat(50));
            for (name, code) in &matches[..shown] {
                println!("{code:<12} {name}");
            }
            if shown < matches.len() {
                println!("... and {} more (use --all to show them)", matches.len() - shown);
            }
        }
        Commands::Dict {
            command:
                DictCommands::Download {
                    years,
                    kinds,
                    estimate,
                    dir,
                },
        } => {
            let config = load_config(cli.config.as_deref())?;
            let dir = dir.unwrap_or_else(|| config.dictionary_dir.clone());
            download_dictionaries(&config, years, &kinds, estimate, &dir, &multi).await?;
        }
        Commands::Geo {
            command: GeoCommands::Generate { cbsa, places, out },
        } => {
            log::info!(
                "Generating lookup tables from {} and {}...",
                cbsa.display(),
                places.display()
            );
            let tables = GeneratedTables::from_files(&cbsa, &places)?;
            tables.write(&out)?;
            log::info!(
                "Wrote {} states, {} MSAs, {} counties and {} cities to {}",
                tables.states.len(),
                tables.msas.len(),
                tables.counties.len(),
                tables.cities.len(),
                out.display()
            );
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AcsConfig, lowe_acs::AcsError> {
    path.map_or_else(AcsConfig::from_env, AcsConfig::from_toml_file)
}

fn load_resolver(tables: Option<&Path>) -> Result<Resolver, lowe_geography::GeographyError> {
    tables.map_or_else(Resolver::from_env, Resolver::from_dir)
}

/// Runs the fetch and writes the result as CSV.
async fn fetch(
    client: &AcsClient,
    request: &FetchRequest,
    output: Option<&Path>,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let progress = FetchProgress::attach(multi);
    let result = client.fetch_table_with_progress(request, &progress).await?;

    match result {
        FetchOutput::Joined(table) => {
            log::info!("Fetched {} rows x {} columns", table.len(), table.columns().len());
            match output {
                Some(path) => {
                    output::write_csv(&table, std::fs::File::create(path)?)?;
                    log::info!("Wrote {}", path.display());
                }
                None => output::write_csv(&table, std::io::stdout().lock())?,
            }
        }
        FetchOutput::PerVariable(tables) => {
            let base = output.map_or_else(|| PathBuf::from("acs.csv"), Path::to_path_buf);
            for (group, table) in request.vars.iter().zip(&tables) {
                let path = output::per_variable_path(&base, &group.id);
                output::write_csv(table, std::fs::File::create(&path)?)?;
                log::info!("Wrote {} ({} rows)", path.display(), table.len());
            }
        }
    }

    Ok(())
}

/// Downloads every (year, kind) dictionary into `dir`.
async fn download_dictionaries(
    config: &AcsConfig,
    years: RangeInclusive<u16>,
    kinds: &[TableKind],
    estimate: Estimate,
    dir: &Path,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let remote = RemoteDictionaries::new(
        Arc::new(HttpTransport::new(config)?),
        config.base_url.clone(),
        config.retry,
        RateLimiter::process_wide(&config.rate_limit),
    );

    let keys: Vec<DictionaryKey> = years
        .flat_map(|year| {
            kinds.iter().map(move |&kind| DictionaryKey {
                year,
                kind,
                estimate,
            })
        })
        .collect();

    let progress = DownloadProgress::attach(multi, keys.len() as u64);
    let mut failed = 0usize;
    for key in keys {
        progress.set_message(key.to_string());
        if let Err(e) = remote.download_to(key, dir).await {
            log::error!("Failed to download {key} dictionary: {e}");
            failed += 1;
        }
        progress.inc(1);
    }
    progress.finish(format!("Dictionaries saved to {}", dir.display()));

    if failed > 0 {
        return Err(format!("{failed} dictionaries failed to download").into());
    }
    Ok(())
}
