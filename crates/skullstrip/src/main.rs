use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use skullstrip::{run, FileCodec, PipelineConfig, ProgressBarCallback};
use skullstrip_atlas::{
    AtlasStripper, ConsoleProgressCallback, MetricKind, ProgressTracker, RefinementConfig, StripConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const PROGRAM: &str = env!("CARGO_BIN_NAME");

#[derive(Parser)]
#[command(name = "swiss-skull-stripper")]
#[command(version, about = "Atlas-based brain extraction for MRI volumes")]
struct Cli {
    /// Patient volume to strip
    #[arg(value_name = "patientVolume")]
    patient_volume: PathBuf,

    /// Atlas MRI volume (short)
    #[arg(value_name = "atlasMRIVolume")]
    atlas_mri_volume: PathBuf,

    /// Atlas brain mask (unsigned char)
    #[arg(value_name = "atlasMaskVolume")]
    atlas_mask_volume: PathBuf,

    /// Output brain mask on the patient grid
    #[arg(value_name = "patientMaskLabel")]
    patient_mask_label: PathBuf,

    /// Output patient volume with non-brain voxels zeroed
    #[arg(value_name = "patientOutputVolume")]
    patient_output_volume: PathBuf,

    /// Pyramid shrink factors, coarse to fine
    #[arg(long, value_delimiter = ',')]
    shrink_factors: Option<Vec<usize>>,

    /// Optimizer iterations per level; the last value repeats
    #[arg(long, value_delimiter = ',')]
    iterations: Option<Vec<usize>>,

    /// Sample every n-th voxel along each axis
    #[arg(long)]
    sampling_stride: Option<usize>,

    /// Registration metric
    #[arg(long, value_enum)]
    metric: Option<MetricArg>,

    /// Brain probability threshold for the propagated label
    #[arg(long)]
    threshold: Option<f32>,

    /// Keep the propagated label without refinement
    #[arg(long)]
    no_refine: bool,

    /// Log progress instead of drawing a progress bar
    #[arg(long)]
    no_progress: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricArg {
    MeanSquares,
    Correlation,
}

impl From<MetricArg> for MetricKind {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::MeanSquares => MetricKind::MeanSquares,
            MetricArg::Correlation => MetricKind::Correlation,
        }
    }
}

impl Cli {
    fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    fn into_config(self) -> PipelineConfig {
        let mut strip = StripConfig::default();
        let registration = &mut strip.registration;
        if let Some(factors) = self.shrink_factors {
            registration.shrink_factors = factors;
        }
        if let Some(iterations) = self.iterations {
            registration.iterations = iterations;
        }
        if let Some(stride) = self.sampling_stride {
            registration.sampling_stride = stride;
        }
        if let Some(metric) = self.metric {
            registration.metric = metric.into();
        }
        if let Some(threshold) = self.threshold {
            strip.probability_threshold = threshold;
        }
        if self.no_refine {
            strip.refinement = RefinementConfig::disabled();
        }

        PipelineConfig::new(
            self.patient_volume,
            self.atlas_mri_volume,
            self.atlas_mask_volume,
            self.patient_mask_label,
            self.patient_output_volume,
        )
        .with_strip(strip)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let show_bar = !cli.no_progress && !cli.quiet;
    let print_config = cli.print_config;
    let config = cli.into_config();

    if print_config {
        return match serde_json::to_string_pretty(&config) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("{}: cannot serialize configuration: {}", PROGRAM, err);
                ExitCode::FAILURE
            }
        };
    }

    let tracker = if show_bar {
        ProgressTracker::new().with_callback(Arc::new(ProgressBarCallback::new()))
    } else {
        ProgressTracker::new().with_callback(Arc::new(ConsoleProgressCallback::default()))
    };

    let stripper = AtlasStripper::new(config.strip.clone());
    match run(&config, &FileCodec, &stripper, &tracker) {
        Ok(summary) => {
            info!(
                "Done: {} brain voxels, masked volume written to {}",
                summary.brain_voxels,
                config.patient_output.display()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}: {} failed: {}", PROGRAM, err.stage(), err.chain());
            ExitCode::FAILURE
        }
    }
}
