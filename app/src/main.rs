// ==============================================================================
// main.rs - Methylation Processor Entry Point
// ==============================================================================
// Description: Command-line entry point for manifest normalization and
//              gene-level methylation aggregation
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Exit status:
//   0  success
//   1  error (invalid request, malformed input, I/O failure)
//   3  empty result: filtered annotation and matrix share no probes
// ==============================================================================

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use methylation_processor::aggregation::AggregationStrategy;
use methylation_processor::config::PlatformRegistry;
use methylation_processor::filter::FeatureFilter;
use methylation_processor::processor::{
    AggregationRequest, AnnotationSource, MethylationProcessor, RunStatus,
};

const EXIT_EMPTY_RESULT: u8 = 3;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Flatten a vendor probe manifest into a probe/gene/feature table
    Normalize {
        /// Vendor manifest (CSV, optionally gzipped)
        #[arg(short, long = "input")]
        input_file: PathBuf,

        /// Destination for the normalized annotation table (TSV)
        #[arg(short, long = "output")]
        output_file: PathBuf,
    },

    /// Aggregate a probe-level methylation matrix to gene level
    Aggregate {
        /// The full input methylation matrix at the probe level
        #[arg(short, long = "input")]
        input_file: PathBuf,

        /// Name of the chip platform
        #[arg(short, long, required_unless_present = "annotation")]
        platform: Option<String>,

        /// Normalized annotation table (overrides --platform)
        #[arg(long, conflicts_with = "platform")]
        annotation: Option<PathBuf>,

        /// Which features to use? (comma-separated, e.g. "TSS200,1stExon")
        #[arg(short, long)]
        features: String,

        /// Require the probe to be annotated in an enhancer region
        #[arg(short, long)]
        enhancer: bool,

        /// Aggregation strategy for multiple probes per gene
        /// (Sum, Mean, Median, Geometric mean)
        #[arg(short, long = "agg")]
        agg_strategy: AggregationStrategy,

        /// Output directory (defaults to the input matrix's directory)
        #[arg(short, long = "output-dir")]
        output_dir: Option<PathBuf>,

        /// JSON file mapping platform names to annotation tables
        #[arg(long, env = "METHYLATION_PLATFORMS_CONFIG")]
        platforms_config: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    // Initialize tracing (stderr; stdout is left to callers)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "methylation_processor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match args.command {
        Command::Normalize {
            input_file,
            output_file,
        } => {
            let processor = MethylationProcessor::new(PlatformRegistry::empty());
            processor.normalize_manifest(&input_file, &output_file)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Aggregate {
            input_file,
            platform,
            annotation,
            features,
            enhancer,
            agg_strategy,
            output_dir,
            platforms_config,
        } => {
            let registry = PlatformRegistry::load(platforms_config.as_deref())?;

            let annotation = match (annotation, platform) {
                (Some(path), _) => AnnotationSource::File(path),
                (None, Some(name)) => AnnotationSource::Platform(name),
                (None, None) => anyhow::bail!("Either --platform or --annotation is required"),
            };

            let request = AggregationRequest {
                matrix_path: input_file,
                annotation,
                filter: FeatureFilter::parse(&features, enhancer)?,
                strategy: agg_strategy,
                output_dir,
            };

            match MethylationProcessor::new(registry).aggregate(&request)? {
                RunStatus::Written(record) => {
                    info!(
                        "Processing completed successfully: {}",
                        record.filtered_matrix.display()
                    );
                    Ok(ExitCode::SUCCESS)
                }
                RunStatus::Empty(report) => {
                    warn!("No output written: {}", report);
                    eprintln!("{}", report);
                    Ok(ExitCode::from(EXIT_EMPTY_RESULT))
                }
            }
        }
    }
}
