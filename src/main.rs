use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use data_cube::collection::{aggregate_field, count, AggregateOp, RecordTable, Records};
use data_cube::config::Config;
use data_cube::cube::{Cube, DimensionSpec};
use data_cube::present::{render_measure_list, render_table};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

/// Pivot tables and nested breakdowns of a CSV file
#[derive(Parser)]
#[command(name = "data-cube")]
#[command(version)]
#[command(about = "Multi-dimensional measures over CSV records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Sum this numeric field instead of counting records
    #[arg(long, global = true)]
    sum: Option<String>,
}

/// Dimensions are given as `name` or `name=field__path`, e.g. `month=date__absmonth`
#[derive(Subcommand)]
enum Commands {
    /// Print a pivot table of two dimensions
    Table {
        csv: PathBuf,

        /// Dimension laid out as columns
        #[arg(long)]
        cols: String,

        /// Dimension laid out as rows
        #[arg(long)]
        rows: String,
    },

    /// Print nested measure lists, first dimension outermost
    List {
        csv: PathBuf,

        #[arg(required = true)]
        dims: Vec<String>,
    },

    /// Print the nested measure dictionary as JSON
    Json {
        csv: PathBuf,

        #[arg(required = true)]
        dims: Vec<String>,

        /// Only report measures where every dimension is fixed
        #[arg(long)]
        leaves_only: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let path = path.to_string_lossy();
            Config::from_file(&path).map_err(anyhow::Error::msg)?
        }
        None => Config::default(),
    };
    config.apply_env_overrides();
    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

/// Splits `name=field__path` into the dimension name and its spec
fn dimension_arg(arg: &str) -> Result<(String, DimensionSpec<Records>)> {
    match arg.split_once('=') {
        Some((name, field)) if !name.is_empty() && !field.is_empty() => {
            Ok((name.to_string(), DimensionSpec::field(field)))
        }
        Some(_) => bail!("invalid dimension argument '{}'", arg),
        None => Ok((arg.to_string(), DimensionSpec::new())),
    }
}

fn build_cube(
    csv: &Path,
    dims: &[&str],
    sum: Option<&str>,
    config: &Config,
) -> Result<(Cube<Records>, Vec<String>)> {
    let model = csv
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "record".to_string());
    let mut table = RecordTable::new(&model);
    let summary = table
        .load_csv(csv, &config.csv)
        .with_context(|| format!("failed to load {}", csv.display()))?;
    info!(
        rows = summary.rows_processed,
        errors = summary.errors.len(),
        "loaded {}",
        csv.display()
    );

    let records = Arc::new(table).records();
    let mut cube = match sum {
        Some(field) => Cube::new(records, aggregate_field(field, AggregateOp::Sum)),
        None => Cube::new(records, count),
    }
    .with_measure_on_empty(config.cube.measure_on_empty);

    let mut names = Vec::with_capacity(dims.len());
    for arg in dims {
        let (name, spec) = dimension_arg(arg)?;
        cube = cube.with_dimension(&name, spec);
        names.push(name);
    }
    debug!(cube = %cube, "cube ready");
    Ok((cube, names))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let sum = cli.sum.as_deref();
    match &cli.command {
        Commands::Table { csv, cols, rows } => {
            let (cube, names) = build_cube(csv, &[cols.as_str(), rows.as_str()], sum, &config)?;
            let table = cube.table(&names[0], &names[1])?;
            print!("{}", render_table(&table));
        }
        Commands::List { csv, dims } => {
            let dims: Vec<&str> = dims.iter().map(String::as_str).collect();
            let (cube, names) = build_cube(csv, &dims, sum, &config)?;
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            print!("{}", render_measure_list(&cube.measure_list(&names)?));
        }
        Commands::Json {
            csv,
            dims,
            leaves_only,
        } => {
            let dims: Vec<&str> = dims.iter().map(String::as_str).collect();
            let (cube, names) = build_cube(csv, &dims, sum, &config)?;
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            let dict = cube.measure_dict(&names, !leaves_only)?;
            println!("{}", serde_json::to_string_pretty(&dict)?);
        }
    }

    Ok(())
}
