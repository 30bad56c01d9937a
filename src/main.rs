//! Timecube CLI
//!
//! Command-line front end over the analysis engine:
//! - Bin records into a date histogram
//! - Show the data range and partition counts of a record file
//! - Print the default configuration

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use timecube::config::{generate_default_config, Config, LoggingConfig};
use timecube::histo::{DateBinMethod, DateBinType, MAGIC};
use timecube::import::{load_records, IntervalRecord, RecordFormat};
use timecube::index::{Count, FilterValue, IndexManager, Key, SharedTimeIndex, TimeIndex};
use timecube::time::Interval;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "timecube")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Filter, intersect and bin time-interval records in memory")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the usual locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count records per time bin
    Bins {
        /// CSV or JSON-lines record file
        path: PathBuf,
        /// Input format (csv, json); detected from the extension by default
        #[arg(short, long)]
        format: Option<String>,
        /// Bin granularity (e.g. day, hour-of-day, month-of-year)
        #[arg(short, long)]
        bin_type: Option<String>,
        /// Only count records overlapping [start, end] (epoch ms or date)
        #[arg(long, requires = "end")]
        start: Option<String>,
        #[arg(long, requires = "start")]
        end: Option<String>,
        /// Count records without a time in their own bin
        #[arg(long)]
        include_timeless: bool,
        /// Only count records of this category
        #[arg(long)]
        category: Option<String>,
        /// Maximum number of bins to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show the data range and partition counts
    Range {
        /// CSV or JSON-lines record file
        path: PathBuf,
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Print the default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Bins {
            path,
            format,
            bin_type,
            start,
            end,
            include_timeless,
            category,
            limit,
        } => {
            let mut histogram = config.histogram.bin_config();
            if let Some(name) = bin_type {
                histogram.bin_type = name.parse::<DateBinType>()?;
            }
            let include_timeless = include_timeless || config.histogram.include_timeless;
            let range = match (start, end) {
                (Some(s), Some(e)) => Some(parse_range(&s, &e)?),
                _ => None,
            };

            let mut manager = IndexManager::with_config(config.index.clone());
            let index = load_index(&mut manager, &path, format.as_deref())?;
            let mut index = index.borrow_mut();

            let method = DateBinMethod::from_config(histogram, IntervalRecord::interval);
            index.add_dimension_with("bin", method.accessor());

            if let Some(category) = category {
                index.add_dimension("category", |r: &IntervalRecord| {
                    Key::from(r.category.clone())
                });
                index.filter_dimension("category", Some(FilterValue::exact(category)));
            }
            if let Some(range) = range {
                let visible = index.intersection(range, include_timeless, false).len();
                tracing::info!(%range, visible, "Applied time range");
            }

            let groups = index.group_data("bin", |k| k.clone(), &Count);
            let limit = limit.or(config.index.default_limit).unwrap_or(usize::MAX);

            for group in groups
                .iter()
                .filter(|g| include_timeless || g.key != Key::Int(MAGIC))
                .take(limit)
            {
                println!(
                    "{:<24} {}",
                    method.get_label_for_key(&group.key, false),
                    group.value
                );
            }
        }

        Commands::Range { path, format } => {
            let mut manager = IndexManager::with_config(config.index.clone());
            let index = load_index(&mut manager, &path, format.as_deref())?;
            let index = index.borrow();

            match index.get_range() {
                Some(range) => println!("Range:    {} ({} ms)", range, range.duration_millis()),
                None => println!("Range:    (no timed records)"),
            }
            let stats = index.stats();
            println!("Records:  {}", stats.records);
            println!("Timed:    {}", stats.main);
            println!("Timeless: {}", stats.timeless);
        }

        Commands::Config { output } => {
            let config = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

/// Load a record file into a managed time index, in configured batches
fn load_index(
    manager: &mut IndexManager<IntervalRecord>,
    path: &Path,
    format: Option<&str>,
) -> anyhow::Result<SharedTimeIndex<IntervalRecord>> {
    let format = format.map(str::parse::<RecordFormat>).transpose()?;
    let result = load_records(path, format)
        .with_context(|| format!("Failed to load records from {:?}", path))?;

    if result.rows_failed > 0 {
        tracing::warn!(failed = result.rows_failed, "Some rows could not be parsed");
        for error in result.errors.iter().take(10) {
            tracing::warn!("{}", error);
        }
    }

    let batch_size = manager.config().batch_size.max(1);
    let index = manager.acquire("records", || TimeIndex::new(IntervalRecord::interval));
    {
        let mut index = index.borrow_mut();
        let mut records = result.records.into_iter().peekable();
        while records.peek().is_some() {
            index.add(records.by_ref().take(batch_size).collect::<Vec<_>>());
        }
    }
    Ok(index)
}

fn parse_range(start: &str, end: &str) -> anyhow::Result<Interval> {
    let start = timecube::import::parse_timestamp(start).map_err(anyhow::Error::msg)?;
    let end = timecube::import::parse_timestamp(end).map_err(anyhow::Error::msg)?;
    Interval::try_new(start, end)
        .with_context(|| format!("Range start {} is after end {}", start, end))
}

fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("timecube={}", config.level)));

    let writer = match &config.file {
        Some(file) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .with_context(|| format!("Failed to open log file {}", file))?;
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
        None => tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stderr),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .init();
    }
    Ok(())
}
