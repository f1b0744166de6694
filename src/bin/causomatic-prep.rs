use std::num::NonZeroU32;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use causomatic_core::{index, ingest, partition};

#[derive(Parser)]
#[command(
    name = "causomatic-prep",
    about = "Transform a (member_id, set_id) CSV into the on-disk layout the scoring engine reads"
)]
struct Cli {
    /// Path to the input CSV. Omit to skip ingest and partition an
    /// already-produced pair stream.
    #[arg(long = "membership-csv", value_name = "PATH")]
    membership_csv: Option<PathBuf>,

    /// Binary (member_id, set_id) pair-stream path — ingest's output if
    /// `--membership-csv` is given, otherwise the partitioner's input.
    #[arg(long = "membership-filename", value_name = "PATH")]
    membership_filename: PathBuf,

    /// Output concatenated members file. Must not already exist.
    #[arg(long = "set-membership-arrays-filename", value_name = "PATH")]
    set_membership_arrays_filename: PathBuf,

    /// Output offset index file.
    #[arg(long = "set-members-index-filename", value_name = "PATH")]
    set_members_index_filename: PathBuf,

    /// Set-id directory file — loaded if present, written if absent.
    #[arg(long = "set-id-filename", value_name = "PATH")]
    set_id_filename: PathBuf,

    /// Drop sets whose membership count is at or below this threshold.
    #[arg(long = "small-group-threshold", default_value = "1")]
    small_group_threshold: u32,

    /// Number of set ids materialized per partitioning segment.
    #[arg(long = "segment-size", default_value = "10000")]
    segment_size: NonZeroU32,

    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(&cli) {
        eprintln!("causomatic-prep: {err:#}");
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
    if let Some(csv_path) = &cli.membership_csv {
        log::info!("prep: ingesting {}", csv_path.display());
        let stats = ingest::run(
            csv_path,
            &cli.membership_filename,
            cli.small_group_threshold,
        )?;
        log::info!(
            "prep: ingest done — {} lines read, {} malformed, {} pairs kept, {} sets blacklisted",
            stats.lines_read,
            stats.malformed_lines,
            stats.pairs_kept,
            stats.sets_blacklisted
        );
    }

    let set_ids =
        partition::enumerate_or_load_set_ids(&cli.membership_filename, &cli.set_id_filename)?;
    log::info!("prep: {} candidate set ids", set_ids.len());

    let (offsets, stats) = partition::materialize(
        &cli.membership_filename,
        &cli.set_membership_arrays_filename,
        &set_ids,
        cli.segment_size,
    )?;
    log::info!(
        "prep: partitioned {} segments — {} sets survived, {} dropped as post-dedup singletons",
        stats.segments,
        stats.surviving_sets,
        stats.dropped_singleton_sets
    );

    index::build_and_persist(
        &cli.set_membership_arrays_filename,
        &cli.set_members_index_filename,
        &offsets,
    )?;
    log::info!(
        "prep: offset index written to {}",
        cli.set_members_index_filename.display()
    );

    println!(
        "causomatic-prep: {} sets ready for scoring ({} dropped)",
        stats.surviving_sets, stats.dropped_singleton_sets
    );
    Ok(())
}
