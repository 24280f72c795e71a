use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;

use regionmatch::{
    config::MatcherKind,
    keypoints::DistanceMetric,
    logging::setup_logging,
    model::Image,
    render::{build_surfaces, save_surfaces},
    timing::{millis, time_one},
    viewer::show_all,
    Pipeline, PipelineConfig,
};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Matcher {
    BruteForce,
    VpTree,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Metric {
    Hamming,
    L2,
}

/// Match two images region by region and estimate one homography per grid cell.
#[derive(Parser, Debug)]
#[command(name = "regionmatch", version)]
struct Cli {
    /// First (query) image
    image_1: PathBuf,

    /// Second (train) image
    image_2: PathBuf,

    /// Grid rows
    #[arg(long)]
    rows: Option<usize>,

    /// Grid columns
    #[arg(long)]
    cols: Option<usize>,

    /// Keypoints kept per region
    #[arg(long)]
    max_features: Option<usize>,

    #[arg(long, value_enum)]
    matcher: Option<Matcher>,

    #[arg(long, value_enum)]
    metric: Option<Metric>,

    /// Keep matches closer than this many times the best distance
    #[arg(long)]
    filter_factor: Option<f32>,

    /// Fix RANSAC sampling
    #[arg(long)]
    seed: Option<u64>,

    /// JSON pipeline configuration; other flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write every surface as a PNG into this directory
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Skip the interactive viewer
    #[arg(long)]
    no_display: bool,

    /// Process region pairs one after another
    #[arg(long)]
    sequential: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(rows) = self.rows {
            config.grid.rows = rows;
        }
        if let Some(cols) = self.cols {
            config.grid.cols = cols;
        }
        if let Some(k) = self.max_features {
            config.orb.max_features = k;
        }
        if let Some(m) = self.matcher {
            config.matcher.kind = match m {
                Matcher::BruteForce => MatcherKind::BruteForce,
                Matcher::VpTree => MatcherKind::VpTree,
            };
        }
        if let Some(m) = self.metric {
            config.matcher.metric = match m {
                Metric::Hamming => DistanceMetric::Hamming,
                Metric::L2 => DistanceMetric::L2,
            };
        }
        if let Some(f) = self.filter_factor {
            config.filter.distance_factor = f;
        }
        if self.seed.is_some() {
            config.ransac.seed = self.seed;
        }
        if self.sequential {
            config.parallel = false;
        }

        return Ok(config);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level)?;

    let config = cli.pipeline_config()?;
    let pipeline = Pipeline::from_config(&config).context("invalid pipeline configuration")?;

    let first = Image::read(&cli.image_1).context("reading first image")?;
    let second = Image::read(&cli.image_2).context("reading second image")?;
    info!(
        first = %format!("{}x{}", first.width, first.height),
        second = %format!("{}x{}", second.width, second.height),
        "images loaded"
    );

    let (output, elapsed) = time_one(|| pipeline.run(&first, &second));
    let output = output.context("matching failed")?;
    info!(elapsed_ms = millis(elapsed), "pipeline done");

    for report in &output.reports {
        print!("{report}");
    }

    if cli.save_dir.is_none() && cli.no_display {
        return Ok(());
    }

    let surfaces = build_surfaces(&first, &second, &output);

    if let Some(dir) = &cli.save_dir {
        save_surfaces(&surfaces, dir).with_context(|| format!("saving surfaces to {}", dir.display()))?;
    }

    if !cli.no_display {
        show_all(&surfaces).context("showing surfaces")?;
    }

    return Ok(());
}
