//! FFmpeg-backed frame source.
//!
//! [`FfmpegSource`] is only a path plus conversion settings; every call to
//! [`open`](MediaSource::open) creates a fresh demuxer, decoder and scaler,
//! so parallel workers never share FFmpeg state.
//!
//! # Seeking
//!
//! [`FfmpegReader::decode_from`] seeks to the keyframe at or before the
//! requested frame and then decodes forward, discarding every frame whose
//! timestamp maps to an earlier index. For streams that carry per-frame
//! timestamps the first frame returned is therefore exactly the requested
//! one ([`SEEK_TOLERANCE_FRAMES`]). If the container refuses to seek,
//! decoding continues from the current position with the same discard rule,
//! which is exact but slower. Frames without any timestamp are numbered
//! after the last labelled frame; on such streams labels after a seek can be
//! off by up to one group of pictures.

use std::path::{Path, PathBuf};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    error::EAGAIN,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::context::Input,
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};

use crate::config::FrameOutputOptions;
use crate::conversion::{
    frame_index_to_seek_timestamp, frame_to_buffer, timestamp_to_frame_index,
    timestamp_to_seconds,
};
use crate::error::PeakclipError;
use crate::ffmpeg::ensure_initialized;
use crate::frame::Frame;
use crate::metadata::VideoMetadata;
use crate::source::{FrameReader, MediaSource};

/// Maximum distance, in frames, between the index requested from
/// [`FfmpegReader::decode_from`] and the first index it returns, for streams
/// with per-frame timestamps.
pub const SEEK_TOLERANCE_FRAMES: u64 = 0;

/// A video file decoded with FFmpeg.
///
/// # Example
///
/// ```no_run
/// use peakclip::{FfmpegSource, FrameOutputOptions, PixelFormat};
///
/// let source = FfmpegSource::new("match.mkv").with_output(
///     FrameOutputOptions::default()
///         .with_pixel_format(PixelFormat::Gray8)
///         .with_resolution(Some(320), None),
/// );
/// let metadata = source.metadata()?;
/// println!("{} frames @ {:.2} fps", metadata.frame_count, metadata.frames_per_second);
/// # Ok::<(), peakclip::PeakclipError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FfmpegSource {
    path: PathBuf,
    output: FrameOutputOptions,
}

impl FfmpegSource {
    /// Describe the file at `path`. Nothing is opened until a reader is.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            output: FrameOutputOptions::default(),
        }
    }

    /// Set how decoded frames are converted.
    #[must_use]
    pub fn with_output(mut self, output: FrameOutputOptions) -> Self {
        self.output = output;
        self
    }

    /// Path of the media file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the file just long enough to read its video metadata.
    pub fn metadata(&self) -> Result<VideoMetadata, PeakclipError> {
        Ok(self.open()?.metadata().clone())
    }
}

impl MediaSource for FfmpegSource {
    type Reader = FfmpegReader;

    fn open(&self) -> Result<FfmpegReader, PeakclipError> {
        FfmpegReader::open(&self.path, &self.output)
    }
}

/// An open decoder over the best video stream of a file.
///
/// Closing happens on drop.
pub struct FfmpegReader {
    input: Input,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    stream_index: usize,
    time_base: Rational,
    start_timestamp: i64,
    metadata: VideoMetadata,
    output_width: u32,
    output_height: u32,
    channels: u8,
    target: u64,
    next_unlabelled: u64,
    decoded_frame: VideoFrame,
    scaled_frame: VideoFrame,
    eof_sent: bool,
    finished: bool,
}

impl FfmpegReader {
    fn open(path: &Path, output: &FrameOutputOptions) -> Result<Self, PeakclipError> {
        ensure_initialized(path)?;

        let file_open_error = |reason: String| PeakclipError::FileOpen {
            path: path.to_path_buf(),
            reason,
        };

        let input =
            ffmpeg_next::format::input(&path).map_err(|error| file_open_error(error.to_string()))?;

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or(PeakclipError::NoVideoStream)?;
        let stream_index = stream.index();
        let time_base = stream.time_base();

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| file_open_error(format!("Failed to create video decoder: {error}")))?;

        let frames_per_second = [stream.avg_frame_rate(), stream.rate()]
            .into_iter()
            .filter(|rate| rate.numerator() > 0 && rate.denominator() > 0)
            .map(|rate| rate.numerator() as f64 / rate.denominator() as f64)
            .next()
            .ok_or_else(|| file_open_error("video stream reports no frame rate".to_string()))?;

        let start_timestamp = match stream.start_time() {
            i64::MIN => 0,
            start => start,
        };

        let frame_count = match stream.frames() {
            count if count > 0 => count as u64,
            _ => {
                let seconds = if stream.duration() > 0 {
                    timestamp_to_seconds(stream.duration(), time_base)
                } else {
                    input.duration().max(0) as f64 / 1_000_000.0
                };
                (seconds * frames_per_second).round() as u64
            }
        };

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            frame_count,
            codec: decoder
                .codec()
                .map(|codec| codec.name().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        };

        let (output_width, output_height) =
            output.resolve_dimensions(metadata.width, metadata.height);
        if output_width == 0 || output_height == 0 {
            return Err(PeakclipError::InvalidConfiguration(format!(
                "output resolution {output_width}x{output_height} is empty"
            )));
        }

        let scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            output.pixel_format.to_ffmpeg_pixel(),
            output_width,
            output_height,
            ScalingFlags::BILINEAR,
        )?;

        log::debug!(
            "Opened {} ({}x{} {}, {:.3} fps, {} frames)",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.codec,
            metadata.frames_per_second,
            metadata.frame_count,
        );

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            time_base,
            start_timestamp,
            metadata,
            output_width,
            output_height,
            channels: output.pixel_format.channels(),
            target: 0,
            next_unlabelled: 0,
            decoded_frame: VideoFrame::empty(),
            scaled_frame: VideoFrame::empty(),
            eof_sent: false,
            finished: false,
        })
    }

    fn frame_index(&self, timestamp: Option<i64>) -> u64 {
        match timestamp {
            Some(timestamp) => timestamp_to_frame_index(
                timestamp,
                self.start_timestamp,
                self.time_base,
                self.metadata.frames_per_second,
            ),
            None => self.next_unlabelled,
        }
    }

    fn convert_current_frame(&mut self) -> Result<Frame, PeakclipError> {
        self.scaler.run(&self.decoded_frame, &mut self.scaled_frame)?;
        let data = frame_to_buffer(
            &self.scaled_frame,
            self.output_width,
            self.output_height,
            self.channels as usize,
        );
        Frame::new(self.output_width, self.output_height, self.channels, data)
    }
}

/// What one `receive_frame` call means for the decode loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Received {
    Frame,
    NeedsInput,
    Drained,
}

/// Only "send more packets" and end of stream are expected; any other
/// decoder error fails the reader.
fn receive_outcome(result: Result<(), FfmpegError>) -> Result<Received, PeakclipError> {
    match result {
        Ok(()) => Ok(Received::Frame),
        Err(FfmpegError::Other { errno }) if errno == EAGAIN => Ok(Received::NeedsInput),
        Err(FfmpegError::Eof) => Ok(Received::Drained),
        Err(error) => Err(PeakclipError::VideoDecode(error.to_string())),
    }
}

impl FrameReader for FfmpegReader {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn decode_from(&mut self, frame_index: u64) -> Result<(), PeakclipError> {
        self.target = frame_index;
        if frame_index == 0 {
            return Ok(());
        }

        let start_microseconds =
            (timestamp_to_seconds(self.start_timestamp, self.time_base) * 1_000_000.0) as i64;
        let seek_timestamp = frame_index_to_seek_timestamp(
            frame_index,
            self.metadata.frames_per_second,
            start_microseconds,
        );

        match self.input.seek(seek_timestamp, ..seek_timestamp) {
            Ok(()) => {
                self.decoder.flush();
                self.eof_sent = false;
                self.finished = false;
                self.next_unlabelled = frame_index;
            }
            Err(error) => log::debug!(
                "Seek to frame {frame_index} failed ({error}), decoding forward instead"
            ),
        }
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<(u64, Frame)>, PeakclipError> {
        loop {
            if self.finished {
                return Ok(None);
            }

            match receive_outcome(self.decoder.receive_frame(&mut self.decoded_frame))? {
                Received::Frame => {
                    let timestamp = self
                        .decoded_frame
                        .timestamp()
                        .or_else(|| self.decoded_frame.pts());
                    let index = self.frame_index(timestamp);
                    self.next_unlabelled = index + 1;

                    if index < self.target {
                        continue;
                    }
                    return self.convert_current_frame().map(|frame| Some((index, frame)));
                }
                Received::Drained => {
                    self.finished = true;
                    return Ok(None);
                }
                Received::NeedsInput if self.eof_sent => {
                    self.finished = true;
                    return Ok(None);
                }
                Received::NeedsInput => {}
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        self.decoder
                            .send_packet(&packet)
                            .map_err(|error| PeakclipError::VideoDecode(error.to_string()))?;
                    }
                }
                Err(FfmpegError::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(error) => return Err(PeakclipError::VideoDecode(error.to_string())),
            }
        }
    }
}
