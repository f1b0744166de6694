use std::num::{NonZeroU32, NonZeroUsize};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::Parser;

use causomatic_core::emit::Writer;
use causomatic_core::score::{Engine, ScoreConfig};

#[derive(Parser)]
#[command(
    name = "causomatic-score",
    about = "Compute top-K asymmetric set-overlap recommendations from a prepared layout"
)]
struct Cli {
    /// Set-id directory input.
    #[arg(long = "set-id-filename", value_name = "PATH")]
    set_id_filename: PathBuf,

    /// Offset index input.
    #[arg(long = "set-index-filename", value_name = "PATH")]
    set_index_filename: PathBuf,

    /// Concatenated members input (memory-mapped).
    #[arg(long = "set-members-filename", value_name = "PATH")]
    set_members_filename: PathBuf,

    /// Output file (append mode).
    #[arg(long = "suggestions-filename", value_name = "PATH")]
    suggestions_filename: PathBuf,

    /// Skip the first N entries of the set-id directory.
    #[arg(long = "begin-at", default_value = "0")]
    begin_at: u32,

    /// Number of recommendations to keep per source set.
    #[arg(long = "top-k", default_value = "25")]
    top_k: NonZeroU32,

    /// Worker thread count. Defaults to available parallelism.
    #[arg(long = "workers")]
    workers: Option<NonZeroUsize>,

    /// Drop scores at or below this threshold (the spec's own ">0" rule
    /// is the default; raise this to reproduce a stricter cutoff).
    #[arg(long = "min-score", default_value = "0.0")]
    min_score: f64,

    /// Log progress every N completed sources.
    #[arg(long = "progress-every", default_value = "1000")]
    progress_every: NonZeroU32,

    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(&cli) {
        eprintln!("causomatic-score: {err:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let workers = cli.workers.unwrap_or_else(|| {
        std::thread::available_parallelism().unwrap_or(NonZeroUsize::new(1).unwrap())
    });

    let config = ScoreConfig {
        top_k: cli.top_k,
        begin_at: cli.begin_at,
        min_score: cli.min_score,
        workers,
        progress_every: cli.progress_every,
    };

    let engine = Engine::open(
        &cli.set_members_filename,
        &cli.set_index_filename,
        &cli.set_id_filename,
        config,
    )?;

    let writer = Writer::open(&cli.suggestions_filename)?;
    let emitted = AtomicUsize::new(0);
    engine.run(|result| {
        emitted.fetch_add(result.suggestions.len(), Ordering::Relaxed);
        if let Err(err) = writer.send(&result) {
            log::error!("score: failed to enqueue result for source {}: {err}", result.source_id);
        }
    })?;
    writer.join()?;

    println!(
        "causomatic-score: {} suggestions written to {}",
        emitted.load(Ordering::Relaxed),
        cli.suggestions_filename.display()
    );
    Ok(())
}
