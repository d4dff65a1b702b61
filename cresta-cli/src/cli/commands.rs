//! Command implementations and argument parsing for the cresta CLI.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::{info, instrument};

use cresta_core::{
    finalize_tree, parents_records, prominence_records, reduce_trees, run_region,
    write_parents_table, write_prominence_table, DivideTree, DvtError, IslandTree, PipelineError,
    RegionOptions, TileCache,
};

use crate::flt::FltTileSource;

const DEFAULT_REGION_MIN_PROMINENCE: f32 = 100.0;
const DEFAULT_MERGE_MIN_PROMINENCE: f32 = 300.0;
const DEFAULT_SAMPLES_PER_DEGREE: i32 = 1200;
const TILE_CACHE_ENTRIES: usize = 2;

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(
    name = "cresta",
    about = "Compute topographic prominence from elevation rasters."
)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Compute prominence for every tile in a bounding box.
    Region(RegionCommand),
    /// Merge divide-tree files and emit the combined prominence table.
    Merge(MergeCommand),
    /// Compute prominence parents and line parents from a finalized tree.
    Parents(ParentsCommand),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Region(_) => "region",
            Command::Merge(_) => "merge",
            Command::Parents(_) => "parents",
        }
    }
}

/// Options accepted by the `region` command.
#[derive(Debug, Args, Clone)]
#[command(allow_negative_numbers = true)]
pub struct RegionCommand {
    /// Southern edge of the region, integer degrees.
    pub min_lat: f32,
    /// Northern edge of the region, integer degrees.
    pub max_lat: f32,
    /// Western edge of the region, integer degrees.
    pub min_lng: f32,
    /// Eastern edge of the region, integer degrees (beyond 180 to span the
    /// antimeridian).
    pub max_lng: f32,

    /// Directory holding raw `f32` grid tiles.
    #[arg(long = "input-dir", default_value = ".")]
    pub input_dir: PathBuf,

    /// Output prefix; writes `<prefix>.txt` and `<prefix>.dvt`.
    #[arg(long = "output", default_value = "prominence")]
    pub output: PathBuf,

    /// Minimum prominence threshold, in the units of the terrain data.
    #[arg(long = "min-prominence", default_value_t = DEFAULT_REGION_MIN_PROMINENCE)]
    pub min_prominence: f32,

    /// Samples per degree in the input grids.
    #[arg(long = "samples-per-degree", default_value_t = DEFAULT_SAMPLES_PER_DEGREE)]
    pub samples_per_degree: i32,

    /// Number of worker threads.
    #[arg(long = "threads", default_value_t = 1)]
    pub threads: usize,

    /// Compute anti-prominence of depressions instead of prominence.
    #[arg(long = "anti-prominence")]
    pub anti_prominence: bool,

    /// Measure the deepest root from the lowest saddle (bathymetry).
    #[arg(long = "bathymetry")]
    pub bathymetry: bool,
}

/// Options accepted by the `merge` command.
#[derive(Debug, Args, Clone)]
pub struct MergeCommand {
    /// Output prefix; writes `<prefix>.dvt` and `<prefix>.txt`.
    pub output: PathBuf,

    /// Divide-tree files to merge.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Minimum prominence threshold for the output.
    #[arg(long = "min-prominence", default_value_t = DEFAULT_MERGE_MIN_PROMINENCE)]
    pub min_prominence: f32,

    /// Delete all runoffs and re-prune: the tree will never be merged
    /// again.
    #[arg(long = "finalize")]
    pub finalize: bool,

    /// Number of worker threads.
    #[arg(long = "threads", default_value_t = 1)]
    pub threads: usize,
}

/// Options accepted by the `parents` command.
#[derive(Debug, Args, Clone)]
pub struct ParentsCommand {
    /// A finalized divide-tree file.
    pub input: PathBuf,

    /// Output file for the parents table.
    pub output: PathBuf,

    /// Minimum prominence threshold for peaks in the output.
    #[arg(long = "min-prominence", default_value_t = DEFAULT_REGION_MIN_PROMINENCE)]
    pub min_prominence: f32,
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// File I/O failed.
    #[error("failed to access `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// A divide-tree file failed to load or parse.
    #[error("failed to load divide tree `{path}`: {source}")]
    Dvt {
        /// Path of the offending file.
        path: PathBuf,
        /// Underlying format error.
        #[source]
        source: DvtError,
    },
    /// Core orchestration failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// The worker pool could not be built.
    #[error("failed to build worker pool: {source}")]
    ThreadPool {
        /// Error raised by rayon.
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
}

/// Summarises the outcome of executing a CLI command.
#[derive(Debug, Clone)]
pub enum ExecutionSummary {
    /// Outcome of a `region` run.
    Region {
        /// Tiles that produced a divide tree.
        tiles_processed: usize,
        /// Tiles skipped for lack of data.
        tiles_skipped: usize,
        /// Surviving peaks written to the table.
        peaks: usize,
    },
    /// Outcome of a `merge` run.
    Merge {
        /// Input trees merged.
        trees_merged: usize,
        /// Surviving peaks written to the table.
        peaks: usize,
    },
    /// Outcome of a `parents` run.
    Parents {
        /// Peaks with parents written to the table.
        peaks: usize,
    },
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when loading inputs, computing, or writing outputs
/// fails.
#[instrument(name = "cli.run", err, skip(cli), fields(command = %cli.command.name()))]
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    match cli.command {
        Command::Region(region) => run_region_command(region),
        Command::Merge(merge) => run_merge_command(merge),
        Command::Parents(parents) => run_parents_command(parents),
    }
}

fn worker_pool(threads: usize) -> Result<rayon::ThreadPool, CliError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .map_err(|source| CliError::ThreadPool { source })
}

#[instrument(
    name = "cli.region",
    err,
    skip(command),
    fields(
        min_lat = f64::from(command.min_lat),
        max_lat = f64::from(command.max_lat),
        min_lng = f64::from(command.min_lng),
        max_lng = f64::from(command.max_lng),
        min_prominence = f64::from(command.min_prominence),
        threads = command.threads,
    )
)]
fn run_region_command(command: RegionCommand) -> Result<ExecutionSummary, CliError> {
    let source = FltTileSource::new(&command.input_dir, command.samples_per_degree);
    let cache = TileCache::new(source, TILE_CACHE_ENTRIES);
    let options = RegionOptions {
        min_latitude: command.min_lat,
        max_latitude: command.max_lat,
        min_longitude: command.min_lng,
        max_longitude: command.max_lng,
        min_prominence: command.min_prominence,
        anti_prominence: command.anti_prominence,
        bathymetry: command.bathymetry,
    };

    let pool = worker_pool(command.threads)?;
    let summary = pool.install(|| run_region(&cache, &options))?;

    write_table(&command.output.with_extension("txt"), |writer| {
        write_prominence_table(&summary.records, writer)
    })?;
    let dvt_path = command.output.with_extension("dvt");
    summary
        .tree
        .write_to_file(&dvt_path)
        .map_err(|source| CliError::Io {
            path: dvt_path,
            source,
        })?;

    info!(
        tiles_processed = summary.tiles_processed,
        peaks = summary.records.len(),
        "region command completed"
    );
    Ok(ExecutionSummary::Region {
        tiles_processed: summary.tiles_processed,
        tiles_skipped: summary.tiles_skipped,
        peaks: summary.records.len(),
    })
}

#[instrument(
    name = "cli.merge",
    err,
    skip(command),
    fields(
        inputs = command.inputs.len(),
        min_prominence = f64::from(command.min_prominence),
        finalize = command.finalize,
    )
)]
fn run_merge_command(command: MergeCommand) -> Result<ExecutionSummary, CliError> {
    let mut trees = Vec::with_capacity(command.inputs.len());
    for path in &command.inputs {
        let tree = DivideTree::read_from_file(path).map_err(|source| CliError::Dvt {
            path: path.clone(),
            source,
        })?;
        trees.push(tree);
    }
    let trees_merged = trees.len();

    let pool = worker_pool(command.threads)?;
    let merged = pool.install(|| reduce_trees(trees))?;
    let Some(mut tree) = merged else {
        return Err(CliError::Pipeline(PipelineError::EmptyRegion));
    };

    if command.finalize {
        finalize_tree(&mut tree, command.min_prominence, false);
    } else {
        let island_tree = IslandTree::build(&tree, false);
        tree.prune(command.min_prominence, &island_tree);
    }

    let dvt_path = command.output.with_extension("dvt");
    tree.write_to_file(&dvt_path).map_err(|source| CliError::Io {
        path: dvt_path,
        source,
    })?;

    // Final prominence values come from a fresh island tree over the
    // pruned result.
    let island_tree = IslandTree::build(&tree, false);
    let records = prominence_records(&tree, &island_tree, command.min_prominence, false);
    write_table(&command.output.with_extension("txt"), |writer| {
        write_prominence_table(&records, writer)
    })?;

    info!(
        trees_merged,
        peaks = records.len(),
        "merge command completed"
    );
    Ok(ExecutionSummary::Merge {
        trees_merged,
        peaks: records.len(),
    })
}

#[instrument(
    name = "cli.parents",
    err,
    skip(command),
    fields(min_prominence = f64::from(command.min_prominence))
)]
fn run_parents_command(command: ParentsCommand) -> Result<ExecutionSummary, CliError> {
    let tree = DivideTree::read_from_file(&command.input).map_err(|source| CliError::Dvt {
        path: command.input.clone(),
        source,
    })?;

    let records = parents_records(&tree, command.min_prominence)?;
    write_table(&command.output, |writer| {
        write_parents_table(&records, writer)
    })?;

    info!(peaks = records.len(), "parents command completed");
    Ok(ExecutionSummary::Parents {
        peaks: records.len(),
    })
}

fn write_table(
    path: &std::path::Path,
    write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
) -> Result<(), CliError> {
    let result = File::create(path).and_then(|file| {
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer.flush()
    });
    result.map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Renders `summary` to `writer` in a human-readable text format.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
pub fn render_summary(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    match summary {
        ExecutionSummary::Region {
            tiles_processed,
            tiles_skipped,
            peaks,
        } => {
            writeln!(writer, "tiles processed: {tiles_processed}")?;
            writeln!(writer, "tiles skipped: {tiles_skipped}")?;
            writeln!(writer, "peaks: {peaks}")
        }
        ExecutionSummary::Merge {
            trees_merged,
            peaks,
        } => {
            writeln!(writer, "trees merged: {trees_merged}")?;
            writeln!(writer, "peaks: {peaks}")
        }
        ExecutionSummary::Parents { peaks } => writeln!(writer, "peaks: {peaks}"),
    }
}
