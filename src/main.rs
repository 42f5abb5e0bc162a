use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};
use std::time::Duration;

use yearfill::dataset::{default_output_path, Dataset};
use yearfill::driver::{self, BatchConfig};
use yearfill::musicbrainz::{ClientConfig, MusicBrainzClient, DEFAULT_SEARCH_LIMIT};
use yearfill::normalize::NormalizationMode;
use yearfill::progress::{format_duration, set_log_only};
use yearfill::safety::validate_output_path;

#[derive(Parser)]
#[command(name = "yearfill")]
#[command(about = "Fill missing release years in a music CSV from MusicBrainz")]
struct Args {
    /// Input dataset (delimited text with a header row)
    input: PathBuf,

    /// Output path (default: input with `_with_years` before the extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seconds between catalog calls; the service asks for at least 1
    #[arg(long, default_value_t = 1.0)]
    sleep: f64,

    /// Cap on rows sent to the resolution engine
    #[arg(long)]
    limit: Option<usize>,

    /// Overwrite the input file (staged through a temporary sibling)
    #[arg(long)]
    inplace: bool,

    /// Strip diacritics, parentheticals and feat-markers before querying
    #[arg(long)]
    strict: bool,

    /// Log every scored candidate
    #[arg(short, long)]
    verbose: bool,

    /// Hide progress bars for tail-friendly output
    #[arg(long)]
    log_only: bool,

    /// Write the run summary to a JSON file
    #[arg(long)]
    stats: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
    set_log_only(args.log_only);

    ensure!(
        args.sleep.is_finite() && args.sleep >= 0.0,
        "--sleep must be a non-negative number of seconds"
    );

    // --inplace stages every checkpoint into a temporary sibling and only
    // replaces the input once the run finishes.
    let (output, inplace_staging) = if args.inplace {
        let dir = match args.input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staging = tempfile::Builder::new()
            .prefix(".yearfill-")
            .suffix(".csv")
            .tempfile_in(dir)
            .context("failed to create staging file next to the input")?
            .into_temp_path();
        (staging.to_path_buf(), Some(staging))
    } else {
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(&args.input));
        (output, None)
    };
    validate_output_path(&output, &args.input, args.inplace)?;

    let mut dataset = Dataset::read(&args.input)?;
    info!(
        "loaded {} rows, {} columns from {}",
        dataset.rows.len(),
        dataset.headers.len(),
        args.input.display()
    );

    let roles = dataset.resolve_columns()?;
    info!(
        "using columns: title='{}', artist='{}', year='{}'",
        dataset.headers[roles.title], dataset.headers[roles.artist], dataset.headers[roles.year]
    );

    let client = MusicBrainzClient::new(&ClientConfig::default());
    let config = BatchConfig {
        sleep: Duration::from_secs_f64(args.sleep),
        limit: args.limit,
        mode: if args.strict {
            NormalizationMode::Strict
        } else {
            NormalizationMode::Permissive
        },
        search_limit: DEFAULT_SEARCH_LIMIT,
    };

    let stats = driver::run(&mut dataset, roles, &client, &config, &output)?;

    if let Some(staging) = inplace_staging {
        staging
            .persist(&args.input)
            .context("failed to replace the input dataset")?;
    }

    println!("\n{:=<60}", "");
    println!("Run complete!");
    println!("  Rows:           {}", stats.rows_total);
    println!("  Searched:       {}", stats.rows_processed);
    println!("  Years found:    {}", stats.years_found);
    println!("  Success rate:   {:.1}%", stats.success_rate());
    println!("  Catalog calls:  {}", stats.catalog_calls);
    println!(
        "  Elapsed:        {}",
        format_duration(Duration::from_secs_f64(stats.elapsed_seconds))
    );
    println!("{:=<60}", "");

    if let Some(path) = args.stats {
        stats.write_to_file(&path)?;
        info!("wrote run stats to {}", path.display());
    }

    Ok(())
}
