//! Clip extraction, concatenation and the batch pipeline.
//!
//! Cutting and joining are stream copies: no frame is re-encoded, so a clip
//! keeps the quality of its source and costs little more than the bytes it
//! copies. The price is keyframe granularity. A clip starts at the keyframe
//! at or before the requested start, so it may begin up to one group of
//! pictures early.
//!
//! # Example
//!
//! ```no_run
//! use peakclip::{PeakScanner, Pipeline, ScanOptions};
//!
//! let pipeline = Pipeline::new(PeakScanner::new(ScanOptions::new()));
//! let report = pipeline.run(&["a.mp4", "b.mp4"], Some("highlights.mp4".as_ref()))?;
//! for skipped in &report.skipped {
//!     eprintln!("{}: {}", skipped.source.display(), skipped.reason);
//! }
//! # Ok::<(), peakclip::PeakclipError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ffmpeg_next::{
    Packet, Rational,
    codec::Id,
    format::context::{Input, Output},
    media::Type,
};

use crate::config::FrameOutputOptions;
use crate::conversion::{duration_to_timestamp, seconds_to_seek_timestamp, timestamp_to_seconds};
use crate::coordinator::{PeakScanner, ScanResult};
use crate::error::PeakclipError;
use crate::ffmpeg::ensure_initialized;
use crate::ffmpeg_source::FfmpegSource;
use crate::progress::{OperationType, ProgressCallback, ProgressTracker};

/// Cuts a time range out of a media file.
pub trait ClipExtractor {
    /// Write `duration` of `source`, starting at `start`, to `output`.
    ///
    /// # Errors
    ///
    /// Returns [`PeakclipError::ClipExtraction`] if the clip cannot be cut.
    fn extract(
        &self,
        source: &Path,
        start: Duration,
        duration: Duration,
        output: &Path,
    ) -> Result<(), PeakclipError>;
}

/// Joins clips, in order, into one file.
pub trait Combiner {
    /// Concatenate `clips` into `output`.
    ///
    /// An empty list writes nothing and returns
    /// [`CombineOutcome::NothingToCombine`].
    fn combine(&self, clips: &[PathBuf], output: &Path) -> Result<CombineOutcome, PeakclipError>;
}

/// What a [`Combiner`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombineOutcome {
    /// The clips were written to this file.
    Combined(PathBuf),
    /// There were no clips; no file was written.
    NothingToCombine,
}

/// Stream-copy clip extractor backed by FFmpeg.
///
/// Every audio and video stream is copied. Timestamps are rebased so the
/// clip starts at zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegClipExtractor;

impl ClipExtractor for FfmpegClipExtractor {
    fn extract(
        &self,
        source: &Path,
        start: Duration,
        duration: Duration,
        output: &Path,
    ) -> Result<(), PeakclipError> {
        ensure_initialized(source)?;
        log::info!(
            "Extracting {:?} from {} at {:?} into {}",
            duration,
            source.display(),
            start,
            output.display(),
        );

        copy_range(source, start, duration, output).map_err(|error| match error {
            PeakclipError::ClipExtraction { .. } => error,
            other => PeakclipError::ClipExtraction {
                path: source.to_path_buf(),
                reason: other.to_string(),
            },
        })
    }
}

/// Stream layout entry used to check that clips can be joined.
type StreamLayout = Vec<(Type, Id)>;

/// Map every audio and video stream of `input` to a new stream of `output`.
///
/// Returns, per input stream, the output index it maps to.
fn map_streams(
    input: &Input,
    output: &mut Output,
) -> Result<(Vec<Option<usize>>, StreamLayout), PeakclipError> {
    let mut stream_map = Vec::new();
    let mut layout = Vec::new();

    for stream in input.streams() {
        let medium = stream.parameters().medium();
        if !matches!(medium, Type::Video | Type::Audio) {
            stream_map.push(None);
            continue;
        }
        let codec = stream.parameters().id();

        let mut out_stream = output.add_stream(ffmpeg_next::encoder::find(Id::None))?;
        out_stream.set_parameters(stream.parameters());
        // Let the muxer pick a tag valid for its container.
        unsafe {
            (*out_stream.parameters().as_mut_ptr()).codec_tag = 0;
        }
        stream_map.push(Some(layout.len()));
        layout.push((medium, codec));
    }

    Ok((stream_map, layout))
}

fn layout_of(input: &Input) -> StreamLayout {
    input
        .streams()
        .map(|stream| stream.parameters())
        .filter(|parameters| matches!(parameters.medium(), Type::Video | Type::Audio))
        .map(|parameters| (parameters.medium(), parameters.id()))
        .collect()
}

/// Earliest stream start of `input`, in seconds.
fn earliest_start_seconds(input: &Input) -> f64 {
    let earliest = input
        .streams()
        .filter(|stream| stream.start_time() != i64::MIN)
        .map(|stream| timestamp_to_seconds(stream.start_time(), stream.time_base()))
        .fold(f64::INFINITY, f64::min);
    if earliest.is_finite() { earliest } else { 0.0 }
}

fn shift_packet(packet: &mut Packet, delta: i64) {
    packet.set_pts(packet.pts().map(|pts| pts + delta));
    packet.set_dts(packet.dts().map(|dts| dts + delta));
}

fn copy_range(
    source: &Path,
    start: Duration,
    duration: Duration,
    output_path: &Path,
) -> Result<(), PeakclipError> {
    let mut input =
        ffmpeg_next::format::input(&source).map_err(|error| PeakclipError::ClipExtraction {
            path: source.to_path_buf(),
            reason: error.to_string(),
        })?;
    let mut output = ffmpeg_next::format::output(&output_path).map_err(|error| {
        PeakclipError::ClipExtraction {
            path: source.to_path_buf(),
            reason: format!("Failed to create {}: {error}", output_path.display()),
        }
    })?;

    let video_index = input.streams().best(Type::Video).map(|stream| stream.index());
    let (stream_map, _) = map_streams(&input, &mut output)?;
    let input_time_bases: Vec<Rational> = input.streams().map(|stream| stream.time_base()).collect();

    // `start` is relative to the first frame; packet timestamps are not.
    let start_seconds = earliest_start_seconds(&input) + start.as_secs_f64();
    let end_seconds = start_seconds + duration.as_secs_f64();
    if start_seconds > 0.0 {
        let target = seconds_to_seek_timestamp(start_seconds);
        input.seek(target, ..target)?;
    }

    output.write_header()?;
    let output_time_bases: Vec<Rational> =
        output.streams().map(|stream| stream.time_base()).collect();

    // Clip origin, in seconds: the first video keyframe copied.
    let mut origin: Option<f64> = None;
    let mut past_end = vec![false; output_time_bases.len()];
    let mut copied = 0_usize;

    for (stream, mut packet) in input.packets() {
        let input_index = stream.index();
        let Some(output_index) = stream_map.get(input_index).copied().flatten() else {
            continue;
        };
        let time_base = input_time_bases[input_index];
        let Some(timestamp) = packet.pts().or(packet.dts()) else {
            continue;
        };
        let seconds = timestamp_to_seconds(timestamp, time_base);

        if seconds >= end_seconds {
            past_end[output_index] = true;
            if past_end.iter().all(|&done| done) {
                break;
            }
            continue;
        }

        let origin_seconds = match origin {
            Some(origin) => origin,
            None if Some(input_index) == video_index || video_index.is_none() => {
                if video_index.is_some() && !packet.is_key() {
                    continue;
                }
                origin = Some(seconds);
                seconds
            }
            None => continue,
        };
        if seconds < origin_seconds {
            continue;
        }

        let offset = duration_to_timestamp(Duration::from_secs_f64(origin_seconds), time_base);
        shift_packet(&mut packet, -offset);
        packet.set_stream(output_index);
        packet.rescale_ts(time_base, output_time_bases[output_index]);
        packet.set_position(-1);
        packet.write_interleaved(&mut output)?;
        copied += 1;
    }

    output.write_trailer()?;

    if copied == 0 {
        return Err(PeakclipError::ClipExtraction {
            path: source.to_path_buf(),
            reason: format!("no packets between {start_seconds:.3}s and {end_seconds:.3}s"),
        });
    }
    log::debug!("Copied {copied} packets into {}", output_path.display());
    Ok(())
}

/// Stream-copy concatenation backed by FFmpeg.
///
/// The first clip defines the stream layout; every later clip must have the
/// same audio/video streams with the same codecs, in the same order.
#[derive(Clone, Default)]
pub struct FfmpegCombiner {
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl Debug for FfmpegCombiner {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FfmpegCombiner")
            .field("has_progress", &self.progress.is_some())
            .finish()
    }
}

impl FfmpegCombiner {
    /// Create a combiner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report one step per joined clip.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    fn open_clip(path: &Path) -> Result<Input, PeakclipError> {
        ffmpeg_next::format::input(&path).map_err(|error| {
            PeakclipError::Combine(format!("Failed to open {}: {error}", path.display()))
        })
    }
}

impl Combiner for FfmpegCombiner {
    fn combine(&self, clips: &[PathBuf], output_path: &Path) -> Result<CombineOutcome, PeakclipError> {
        let Some(first) = clips.first() else {
            log::info!("No clips to combine");
            return Ok(CombineOutcome::NothingToCombine);
        };
        ensure_initialized(first)?;
        log::info!("Combining {} clips into {}", clips.len(), output_path.display());

        let mut output = ffmpeg_next::format::output(&output_path).map_err(|error| {
            PeakclipError::Combine(format!("Failed to create {}: {error}", output_path.display()))
        })?;
        let (_, layout) = map_streams(&Self::open_clip(first)?, &mut output)?;
        output.write_header()?;
        let output_time_bases: Vec<Rational> =
            output.streams().map(|stream| stream.time_base()).collect();

        let mut tracker = ProgressTracker::new(
            self.progress.clone(),
            OperationType::Combining,
            Some(clips.len() as u64),
        );
        let mut offset_seconds = 0.0_f64;

        for clip in clips {
            let mut input = Self::open_clip(clip)?;
            if layout_of(&input) != layout {
                return Err(PeakclipError::Combine(format!(
                    "{} has a different stream layout than {}",
                    clip.display(),
                    first.display(),
                )));
            }

            let mut stream_map = Vec::new();
            let mut next = 0;
            for stream in input.streams() {
                if matches!(stream.parameters().medium(), Type::Video | Type::Audio) {
                    stream_map.push(Some(next));
                    next += 1;
                } else {
                    stream_map.push(None);
                }
            }

            let clip_start = earliest_start_seconds(&input);
            let shift = offset_seconds - clip_start;
            let mut clip_end = offset_seconds;

            for (stream, mut packet) in input.packets() {
                let Some(output_index) = stream_map.get(stream.index()).copied().flatten() else {
                    continue;
                };
                let time_base = output_time_bases[output_index];
                packet.set_stream(output_index);
                packet.rescale_ts(stream.time_base(), time_base);

                let delta = duration_to_timestamp(Duration::from_secs_f64(shift.abs()), time_base);
                shift_packet(&mut packet, if shift < 0.0 { -delta } else { delta });

                if let Some(timestamp) = packet.pts().or(packet.dts()) {
                    let end = timestamp_to_seconds(timestamp + packet.duration(), time_base);
                    clip_end = clip_end.max(end);
                }
                packet.set_position(-1);
                packet.write_interleaved(&mut output)?;
            }

            log::debug!("Appended {} ending at {clip_end:.3}s", clip.display());
            offset_seconds = clip_end;
            tracker.advance();
        }

        output.write_trailer()?;
        tracker.finish();
        Ok(CombineOutcome::Combined(output_path.to_path_buf()))
    }
}

/// Where the pipeline writes the clip cut from `source`:
/// `<stem>_action.<ext>`, next to the source unless `directory` is given.
pub fn action_clip_path(source: &Path, directory: Option<&Path>) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip".to_string());
    let extension = source
        .extension()
        .map(|extension| extension.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mp4".to_string());
    let file_name = format!("{stem}_action.{extension}");

    match directory {
        Some(directory) => directory.join(file_name),
        None => source.with_file_name(file_name),
    }
}

/// One clip produced by the pipeline.
#[derive(Debug, Clone)]
pub struct ClipRecord {
    /// Input the clip was cut from.
    pub source: PathBuf,
    /// Path of the written clip.
    pub clip: PathBuf,
    /// Scan that located the clip.
    pub scan: ScanResult,
}

/// An input the pipeline gave up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedInput {
    /// The input path.
    pub source: PathBuf,
    /// Why it was skipped.
    pub reason: String,
}

/// Summary of a [`Pipeline::run`].
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Clips written, in input order.
    pub clips: Vec<ClipRecord>,
    /// Inputs whose scan or extraction failed.
    pub skipped: Vec<SkippedInput>,
    /// Result of combining, if a combined output was requested.
    pub combined: Option<CombineOutcome>,
}

/// Scan, cut and optionally join a batch of videos.
///
/// Each input is scanned for its most dynamic window and that window is cut
/// to `<stem>_action.<ext>`. An input that fails to scan or cut is logged
/// and skipped; only cancellation stops the batch.
pub struct Pipeline<E = FfmpegClipExtractor, C = FfmpegCombiner> {
    scanner: PeakScanner,
    output: FrameOutputOptions,
    extractor: E,
    combiner: C,
    clip_directory: Option<PathBuf>,
    overwrite: bool,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl<E: Debug, C: Debug> Debug for Pipeline<E, C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Pipeline")
            .field("scanner", &self.scanner)
            .field("output", &self.output)
            .field("extractor", &self.extractor)
            .field("combiner", &self.combiner)
            .field("clip_directory", &self.clip_directory)
            .field("overwrite", &self.overwrite)
            .field("has_progress", &self.progress.is_some())
            .finish()
    }
}

impl Pipeline {
    /// A pipeline using FFmpeg stream copy for cutting and joining.
    pub fn new(scanner: PeakScanner) -> Self {
        Self {
            scanner,
            output: FrameOutputOptions::default(),
            extractor: FfmpegClipExtractor,
            combiner: FfmpegCombiner::new(),
            clip_directory: None,
            overwrite: false,
            progress: None,
        }
    }
}

impl<E: ClipExtractor, C: Combiner> Pipeline<E, C> {
    /// Use a different clip extractor.
    #[must_use]
    pub fn with_extractor<E2: ClipExtractor>(self, extractor: E2) -> Pipeline<E2, C> {
        Pipeline {
            scanner: self.scanner,
            output: self.output,
            extractor,
            combiner: self.combiner,
            clip_directory: self.clip_directory,
            overwrite: self.overwrite,
            progress: self.progress,
        }
    }

    /// Use a different combiner.
    #[must_use]
    pub fn with_combiner<C2: Combiner>(self, combiner: C2) -> Pipeline<E, C2> {
        Pipeline {
            scanner: self.scanner,
            output: self.output,
            extractor: self.extractor,
            combiner,
            clip_directory: self.clip_directory,
            overwrite: self.overwrite,
            progress: self.progress,
        }
    }

    /// Frame conversion used while scanning.
    #[must_use]
    pub fn with_frame_output(mut self, output: FrameOutputOptions) -> Self {
        self.output = output;
        self
    }

    /// Write clips into `directory` instead of next to their sources.
    #[must_use]
    pub fn with_clip_directory<P: AsRef<Path>>(mut self, directory: P) -> Self {
        self.clip_directory = Some(directory.as_ref().to_path_buf());
        self
    }

    /// Replace clips left by an earlier run. Off by default: an input
    /// whose clip already exists is skipped with
    /// [`PeakclipError::OutputExists`].
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Report one step per processed input.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Process `inputs` in order, then join the clips into `combined` if
    /// given.
    ///
    /// # Errors
    ///
    /// Returns [`PeakclipError::Cancelled`] if the scanner's token fired, or
    /// the combiner's error. Per-input failures are reported in
    /// [`BatchReport::skipped`] instead.
    pub fn run<P: AsRef<Path>>(
        &self,
        inputs: &[P],
        combined: Option<&Path>,
    ) -> Result<BatchReport, PeakclipError> {
        let mut tracker = ProgressTracker::new(
            self.progress.clone(),
            OperationType::ClipExtraction,
            Some(inputs.len() as u64),
        );
        let mut report = BatchReport {
            clips: Vec::new(),
            skipped: Vec::new(),
            combined: None,
        };

        for input in inputs {
            let input = input.as_ref();
            match self.process(input) {
                Ok(record) => report.clips.push(record),
                Err(PeakclipError::Cancelled) => return Err(PeakclipError::Cancelled),
                Err(error) => {
                    log::warn!("Skipping {}: {error}", input.display());
                    report.skipped.push(SkippedInput {
                        source: input.to_path_buf(),
                        reason: error.to_string(),
                    });
                }
            }
            tracker.advance();
        }
        tracker.finish();

        if let Some(combined) = combined {
            let clips: Vec<PathBuf> = report.clips.iter().map(|record| record.clip.clone()).collect();
            report.combined = Some(self.combiner.combine(&clips, combined)?);
        }

        log::info!(
            "Batch finished: {} clips, {} skipped",
            report.clips.len(),
            report.skipped.len(),
        );
        Ok(report)
    }

    fn process(&self, input: &Path) -> Result<ClipRecord, PeakclipError> {
        let clip = action_clip_path(input, self.clip_directory.as_deref());
        if !self.overwrite && clip.exists() {
            return Err(PeakclipError::OutputExists { path: clip });
        }

        let source = FfmpegSource::new(input).with_output(self.output.clone());
        let scan = self.scanner.scan(&source)?;
        self.extractor
            .extract(input, scan.start_time(), scan.window_duration(), &clip)?;
        Ok(ClipRecord {
            source: input.to_path_buf(),
            clip,
            scan,
        })
    }
}
