//! iispt CLI - dataset indexing, tile inspection and the stdio inference server

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use iispt::serve::ServeMode;

mod commands;
mod logging;

/// Radiance tile tooling for learned indirect illumination.
#[derive(Parser)]
#[command(name = "iispt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index one or more dataset roots and split them into train/validation
    Index {
        /// Dataset root directories
        #[arg(required = true)]
        roots: Vec<PathBuf>,

        /// Probability of assigning a tile to validation
        #[arg(short = 'p', long, default_value_t = 0.0)]
        validation_probability: f64,

        /// Seed for the validation split
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Metadata file name inside each set directory
        #[arg(long, default_value = iispt::dataset::METADATA_FILE)]
        metadata_file: String,

        /// Tile file extension
        #[arg(long, default_value = iispt::dataset::TILE_EXTENSION)]
        extension: String,

        /// Output manifest file (JSON); printed to stdout when absent
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the request/response inference server on stdin/stdout
    Serve {
        /// Tile side in pixels, shared with the renderer
        #[arg(long, env = "IISPT_TILE_RESOLUTION", default_value_t = iispt::serve::DEFAULT_RESOLUTION)]
        resolution: usize,

        /// Prediction mode: inference or blur
        #[arg(long, env = "IISPT_SERVE_MODE", default_value = "inference")]
        mode: ServeMode,

        /// Blur standard deviation in blur mode
        #[arg(long, env = "IISPT_BLUR_SIGMA", default_value_t = iispt::serve::DEFAULT_BLUR_SIGMA)]
        blur_sigma: f32,
    },

    /// Convert a PFM file to an 8-bit PNG
    Tonemap {
        /// Input PFM file
        input: PathBuf,

        /// Output PNG file
        output: PathBuf,

        /// Exposure in stops; computed automatically when absent
        #[arg(short, long, allow_hyphen_values = true)]
        exposure: Option<f32>,

        /// Display gamma
        #[arg(short, long, default_value_t = iispt::metrics::exposure::DEFAULT_GAMMA)]
        gamma: f32,

        /// Keep the stored row order instead of flipping vertically
        #[arg(long)]
        no_flip: bool,
    },

    /// Compare two PFM files (L1, SSIM, cross-correlation)
    Compare {
        /// Test file
        test: PathBuf,

        /// Reference file
        reference: PathBuf,

        /// Divide both rasters by their mean first
        #[arg(long)]
        divide_mean: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Score low-quality, blurred and predicted tiles against ground truth
    Evaluate {
        /// Dataset root directory, or a manifest written by `iispt index`
        input: PathBuf,

        /// Report directory
        #[arg(short, long, default_value = "reports")]
        report_dir: PathBuf,

        /// Report name (output file stem)
        #[arg(short, long, default_value = "evaluation")]
        name: String,

        /// Blur standard deviation for the baseline
        #[arg(long, env = "IISPT_BLUR_SIGMA", default_value_t = iispt::serve::DEFAULT_BLUR_SIGMA)]
        blur_sigma: f32,

        /// Also score predictions from the built-in passthrough backend
        #[arg(long)]
        passthrough: bool,

        /// Only evaluate validation entries of a manifest
        #[arg(long)]
        validation_only: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Index {
            roots,
            validation_probability,
            seed,
            metadata_file,
            extension,
            output,
        } => commands::index::run(
            &roots,
            validation_probability,
            seed,
            metadata_file,
            extension,
            output.as_deref(),
        ),
        Commands::Serve {
            resolution,
            mode,
            blur_sigma,
        } => commands::serve::run(resolution, mode, blur_sigma),
        Commands::Tonemap {
            input,
            output,
            exposure,
            gamma,
            no_flip,
        } => commands::tonemap::run(&input, &output, exposure, gamma, !no_flip),
        Commands::Compare {
            test,
            reference,
            divide_mean,
            json,
        } => commands::compare::run(&test, &reference, divide_mean, json),
        Commands::Evaluate {
            input,
            report_dir,
            name,
            blur_sigma,
            passthrough,
            validation_only,
        } => commands::evaluate::run(
            &input,
            &report_dir,
            &name,
            blur_sigma,
            passthrough,
            validation_only,
        ),
    }
}
