//! subregion-bench: CLI tool for detection parameter experimentation and
//! diagnostics.
//!
//! Runs region detection on a given image file with configurable
//! parameters, printing detailed per-stage diagnostics. Useful for:
//!
//! - Tuning morphology iterations and the area ratio window
//! - Checking which background and feature colors a sample resolves to
//! - Measuring per-stage durations to identify bottlenecks
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin subregion-bench -- --rect 10,10,40,40 [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{ArgGroup, Parser, ValueEnum};
use subregion_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use subregion_pipeline::{ColorName, DetectConfig, Rect, RegionSummary, StagedResult};

/// Region detection experimentation and diagnostics for subregion.
///
/// Runs detection on a given image with configurable parameters and
/// prints detailed per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "subregion-bench", version)]
#[command(group(ArgGroup::new("sample").required(true).args(["rect", "corners"])))]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Sample rectangle as `x,y,width,height`.
    #[arg(long, value_parser = parse_rect, allow_hyphen_values = true)]
    rect: Option<Rect>,

    /// Sample rectangle as drag corners `x1,y1,x2,y2`.
    #[arg(long, value_parser = parse_corners, allow_hyphen_values = true)]
    corners: Option<Rect>,

    /// Background colors to exclude (comma separated). Inferred from the
    /// image when omitted.
    #[arg(long, value_enum, value_delimiter = ',')]
    background: Vec<Color>,

    /// Erosion passes before dilation.
    #[arg(long, default_value_t = DetectConfig::DEFAULT_PRE_ERODE_ITERS)]
    pre_erode: u32,

    /// Dilation passes.
    #[arg(long, default_value_t = DetectConfig::DEFAULT_DILATE_ITERS)]
    dilate: u32,

    /// Smallest kept blob area as a fraction of the sample's feature area.
    #[arg(long, default_value_t = DetectConfig::DEFAULT_MIN_AREA_RATIO)]
    min_area_ratio: f64,

    /// Largest kept blob area as a fraction of the sample's feature area.
    #[arg(long, default_value_t = DetectConfig::DEFAULT_MAX_AREA_RATIO)]
    max_area_ratio: f64,

    /// Share of non-background sample pixels a color must exceed to count
    /// as a feature color.
    #[arg(long, default_value_t = DetectConfig::DEFAULT_PREVALENCE)]
    prevalence: f64,

    /// Reduce the sample mask to its largest blob before measuring.
    #[arg(long)]
    largest_sample_blob: bool,

    /// Write the final mask to a PNG file.
    #[arg(long)]
    mask_out: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full detection config as a JSON string.
    ///
    /// When provided, all other detection parameter flags are ignored.
    /// The JSON must be a valid `DetectConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Classification color selection.
#[derive(Clone, Copy, ValueEnum)]
enum Color {
    Red,
    Yellow,
    Green,
    Cyan,
    Blue,
    Violet,
    Black,
    Gray,
    White,
}

impl From<Color> for ColorName {
    fn from(c: Color) -> Self {
        match c {
            Color::Red => Self::Red,
            Color::Yellow => Self::Yellow,
            Color::Green => Self::Green,
            Color::Cyan => Self::Cyan,
            Color::Blue => Self::Blue,
            Color::Violet => Self::Violet,
            Color::Black => Self::Black,
            Color::Gray => Self::Gray,
            Color::White => Self::White,
        }
    }
}

/// Parse four comma-separated integers.
fn parse_quad(s: &str) -> Result<[i32; 4], String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<i32>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    <[i32; 4]>::try_from(parts).map_err(|p| format!("expected 4 values, got {}", p.len()))
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let [x, y, width, height] = parse_quad(s)?;
    Ok(Rect::new(x, y, width, height))
}

fn parse_corners(s: &str) -> Result<Rect, String> {
    let [x1, y1, x2, y2] = parse_quad(s)?;
    Ok(Rect::from_corners(x1, y1, x2, y2))
}

/// Build a [`DetectConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<DetectConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(DetectConfig {
        background_colors: cli.background.iter().copied().map(ColorName::from).collect(),
        pre_erode_iters: cli.pre_erode,
        dilate_iters: cli.dilate,
        min_area_ratio: cli.min_area_ratio,
        max_area_ratio: cli.max_area_ratio,
        prevalence: cli.prevalence,
        largest_sample_blob: cli.largest_sample_blob,
    })
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    // The argument group guarantees one of the two is present.
    let Some(rect) = cli.rect.or(cli.corners) else {
        eprintln!("Either --rect or --corners is required");
        return ExitCode::FAILURE;
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let source = match subregion_pipeline::decode_hsv(&image_bytes) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error decoding {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes, {}x{})",
        cli.image_path.display(),
        image_bytes.len(),
        source.width(),
        source.height(),
    );
    eprintln!("Sample: {rect:?}");
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        log::debug!("starting run {}", run + 1);
        match subregion_pipeline::detect_with_diagnostics(&source, rect, &config, &StdClock) {
            Ok((staged, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                    if run == 0 {
                        print_regions(&staged);
                    }
                }

                // Write the mask on the first run only.
                if run == 0
                    && let Some(ref mask_path) = cli.mask_out
                {
                    match staged
                        .mask
                        .save_with_format(mask_path, image::ImageFormat::Png)
                    {
                        Ok(()) => eprintln!("Mask written to {}", mask_path.display()),
                        Err(e) => {
                            eprintln!("Error writing mask to {}: {e}", mask_path.display());
                        }
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Print the sample's color composition and the kept regions.
fn print_regions(staged: &StagedResult) {
    println!();
    println!("Sample colors");
    println!("{}", "-".repeat(40));
    for (color, pct) in staged.sample_profile.percentages() {
        if pct > 0.0 {
            println!("{:<10} {pct:>6.2}%", color.as_str());
        }
    }

    let summary = RegionSummary::from_blobs(&staged.blobs);
    println!();
    println!(
        "Regions: {}  |  area min={:.1} max={:.1} mean={:.1}",
        summary.count, summary.min_area, summary.max_area, summary.mean_area,
    );
    for (i, blob) in staged.blobs.iter().enumerate() {
        let r = blob.bounding_rect;
        println!(
            "  #{i:<3} {}x{} at ({}, {})  area={:.1}",
            r.width, r.height, r.x, r.y, blob.area,
        );
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let Some(first) = all_diagnostics.first() else {
        println!("Warning: no diagnostics to summarize");
        return;
    };

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    for (i, (name, _)) in first.stages().iter().enumerate() {
        let total: f64 = all_diagnostics
            .iter()
            .map(|d| d.stages()[i].1.duration.as_secs_f64() * 1000.0)
            .sum();
        let stage_mean = total / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
