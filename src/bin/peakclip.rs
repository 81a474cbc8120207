use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use peakclip::{
    BatchReport, ClipExtractor, CombineOutcome, Combiner, FfmpegClipExtractor, FfmpegCombiner,
    FfmpegLogLevel, FfmpegSource, FrameOutputOptions, PartitionOverlap, PeakScanner, Pipeline,
    PixelFormat, ProgressCallback, ProgressInfo, ScanOptions, ScanResult, action_clip_path,
};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  peakclip scan trailer.mp4 --window 10 --json\n  peakclip extract trailer.mp4 --progress\n  peakclip batch a.mp4 b.mp4 --combine highlights.mp4\n  peakclip completions zsh > _peakclip";

#[derive(Debug, Parser)]
#[command(
    name = "peakclip",
    version,
    about = "Find and cut the most visually dynamic window of a video",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

/// Scan settings shared by every command that scans.
#[derive(Debug, Parser, Clone)]
struct ScanArgs {
    /// Window length (seconds, MM:SS or HH:MM:SS).
    #[arg(long, default_value = "10")]
    window: String,

    /// Worker count. Defaults to the number of CPU cores.
    #[arg(long)]
    threads: Option<usize>,

    /// Let windows cross partition boundaries (exact, slightly slower).
    #[arg(long)]
    overlap: bool,

    /// Pixel format used for the variation metric (rgb8, gray8).
    #[arg(long, default_value = "rgb8")]
    pixel_format: String,

    /// Downscale frames to this width before scanning.
    #[arg(long)]
    scan_width: Option<u32>,

    /// Per-worker time limit in seconds.
    #[arg(long)]
    worker_timeout: Option<f64>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Report the most dynamic window of a video.
    #[command(
        after_help = "Examples:\n  peakclip scan input.mp4\n  peakclip scan input.mp4 --window 00:30 --threads 8 --json"
    )]
    Scan {
        /// Input media path.
        input: PathBuf,

        #[command(flatten)]
        scan: ScanArgs,

        /// Output the result as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Scan a video and cut its most dynamic window to a file.
    #[command(
        after_help = "Examples:\n  peakclip extract input.mp4\n  peakclip extract input.mp4 --out best.mp4 --window 5"
    )]
    Extract {
        /// Input media path.
        input: PathBuf,

        #[command(flatten)]
        scan: ScanArgs,

        /// Output clip path. Defaults to `<stem>_action.<ext>` next to the input.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Join clips, in order, without re-encoding.
    Combine {
        /// Clips to join.
        clips: Vec<PathBuf>,

        /// Output file path.
        #[arg(long)]
        out: PathBuf,
    },

    /// Scan and cut every input, then optionally join the clips.
    #[command(
        after_help = "Examples:\n  peakclip batch videos/*.mp4 --clip-dir clips --combine trailer_reel.mp4"
    )]
    Batch {
        /// Input media paths.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        scan: ScanArgs,

        /// Directory for the clips. Defaults to each input's directory.
        #[arg(long)]
        clip_dir: Option<PathBuf>,

        /// Join all clips into this file.
        #[arg(long)]
        combine: Option<PathBuf>,

        /// Output the report as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn parse_timecode(value: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let trimmed = value.trim();
    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Ok(Duration::try_from_secs_f64(seconds.max(0.0))?);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [minutes, seconds] => (0_u64, minutes.parse::<u64>()?, *seconds),
        [hours, minutes, seconds] => (hours.parse::<u64>()?, minutes.parse::<u64>()?, *seconds),
        _ => return Err(format!("invalid time format: {trimmed}").into()),
    };

    let total = hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds.parse::<f64>()?;
    Ok(Duration::try_from_secs_f64(total.max(0.0))?)
}

fn parse_pixel_format(value: &str) -> Option<PixelFormat> {
    match value.to_ascii_lowercase().as_str() {
        "rgb8" | "rgb" => Some(PixelFormat::Rgb8),
        "gray8" | "gray" | "greyscale" | "grayscale" => Some(PixelFormat::Gray8),
        _ => None,
    }
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(FfmpegLogLevel::Quiet),
        "fatal" => Some(FfmpegLogLevel::Fatal),
        "error" => Some(FfmpegLogLevel::Error),
        "warning" | "warn" => Some(FfmpegLogLevel::Warning),
        "info" => Some(FfmpegLogLevel::Info),
        "debug" => Some(FfmpegLogLevel::Debug),
        _ => None,
    }
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if !overwrite {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!("overwriting {}", path.display()).yellow()
        );
    }
    Ok(())
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let level = if global.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        peakclip::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

/// Drives an indicatif bar from progress snapshots.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new(unit: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(&format!(
                "{{spinner:.cyan}} {{msg:>12}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit} ({{eta}})"
            ))?
            .progress_chars("=> "),
        );
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        self.bar.set_message(info.phase.to_string());
        if info.phase.is_terminal() || info.total.is_some_and(|total| info.current >= total) {
            self.bar.finish_and_clear();
        }
    }
}

fn scan_options(
    args: &ScanArgs,
    global: &GlobalOptions,
) -> Result<(ScanOptions, FrameOutputOptions), Box<dyn std::error::Error>> {
    let mut options = ScanOptions::new().with_window(parse_timecode(&args.window)?);
    if let Some(threads) = args.threads {
        options = options.with_threads(threads);
    }
    if args.overlap {
        options = options.with_overlap(PartitionOverlap::Window);
    }
    if let Some(limit) = args.worker_timeout {
        let limit = Duration::try_from_secs_f64(limit.max(0.0))
            .map_err(|error| format!("invalid --worker-timeout {limit}: {error}"))?;
        options = options.with_worker_timeout(limit);
    }
    if global.progress {
        options = options.with_progress(Arc::new(TerminalProgress::new("frames")?));
    }

    let pixel_format = parse_pixel_format(&args.pixel_format)
        .ok_or(format!("unsupported --pixel-format: {}", args.pixel_format))?;
    let output = FrameOutputOptions::default()
        .with_pixel_format(pixel_format)
        .with_resolution(args.scan_width, None);

    Ok((options, output))
}

fn scan_json(input: &Path, result: &ScanResult) -> serde_json::Value {
    json!({
        "input": input.display().to_string(),
        "window_start_frame": result.window_start,
        "window_frames": result.window_frames,
        "start_seconds": result.start_time().as_secs_f64(),
        "duration_seconds": result.window_duration().as_secs_f64(),
        "total_frames": result.total_frames,
        "fps": result.frames_per_second,
        "max_variation": result.max_variation,
        "partition": result.partition_id,
        "failed_partitions": result.failed_partitions,
    })
}

fn print_scan(input: &Path, result: &ScanResult) {
    println!(
        "{} {} frames {}..{} ({:.3}s + {:.3}s), variation {}",
        "peak".green().bold(),
        input.display(),
        result.window_start,
        result.window_start + result.window_frames,
        result.start_time().as_secs_f64(),
        result.window_duration().as_secs_f64(),
        result.max_variation,
    );
    if result.is_degraded() {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!("{} partition(s) failed; result is partial", result.failed_partitions).yellow()
        );
    }
}

fn print_batch(report: &BatchReport, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        let payload = json!({
            "clips": report.clips.iter().map(|record| {
                let mut entry = scan_json(&record.source, &record.scan);
                entry["clip"] = json!(record.clip.display().to_string());
                entry
            }).collect::<Vec<_>>(),
            "skipped": report.skipped.iter().map(|skipped| json!({
                "input": skipped.source.display().to_string(),
                "reason": skipped.reason,
            })).collect::<Vec<_>>(),
            "combined": match &report.combined {
                Some(CombineOutcome::Combined(path)) => json!(path.display().to_string()),
                _ => serde_json::Value::Null,
            },
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    for record in &report.clips {
        println!("{} {}", "saved".green().bold(), record.clip.display());
    }
    for skipped in &report.skipped {
        eprintln!(
            "{} {}: {}",
            "skipped".yellow().bold(),
            skipped.source.display(),
            skipped.reason
        );
    }
    match &report.combined {
        Some(CombineOutcome::Combined(path)) => {
            println!("{} {}", "combined".green().bold(), path.display())
        }
        Some(CombineOutcome::NothingToCombine) => {
            eprintln!("{} no clips to combine", "warning:".yellow().bold())
        }
        None => {}
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Scan { input, scan, json } => {
            let (options, output) = scan_options(&scan, &cli.global)?;
            let source = FfmpegSource::new(&input).with_output(output);
            let result = PeakScanner::new(options).scan(&source)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&scan_json(&input, &result))?);
            } else {
                print_scan(&input, &result);
            }
        }
        Commands::Extract { input, scan, out } => {
            let out = out.unwrap_or_else(|| action_clip_path(&input, None));
            ensure_writable_path(&out, cli.global.overwrite)?;

            let (options, output) = scan_options(&scan, &cli.global)?;
            let source = FfmpegSource::new(&input).with_output(output);
            let result = PeakScanner::new(options).scan(&source)?;
            print_scan(&input, &result);

            FfmpegClipExtractor.extract(
                &input,
                result.start_time(),
                result.window_duration(),
                &out,
            )?;
            println!("{} {}", "saved".green().bold(), out.display());
        }
        Commands::Combine { clips, out } => {
            ensure_writable_path(&out, cli.global.overwrite)?;
            let mut combiner = FfmpegCombiner::new();
            if cli.global.progress {
                combiner = combiner.with_progress(Arc::new(TerminalProgress::new("clips")?));
            }
            match combiner.combine(&clips, &out)? {
                CombineOutcome::Combined(path) => {
                    println!("{} {}", "saved".green().bold(), path.display())
                }
                CombineOutcome::NothingToCombine => {
                    eprintln!("{} no clips to combine", "warning:".yellow().bold())
                }
            }
        }
        Commands::Batch {
            inputs,
            scan,
            clip_dir,
            combine,
            json,
        } => {
            if let Some(combined) = &combine {
                ensure_writable_path(combined, cli.global.overwrite)?;
            }
            let (options, output) = scan_options(&scan, &cli.global)?;
            let mut pipeline = Pipeline::new(PeakScanner::new(options))
                .with_frame_output(output)
                .with_overwrite(cli.global.overwrite);
            if let Some(directory) = clip_dir {
                std::fs::create_dir_all(&directory)?;
                pipeline = pipeline.with_clip_directory(directory);
            }
            let report = pipeline.run(&inputs, combine.as_deref())?;
            print_batch(&report, json)?;
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "peakclip", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
