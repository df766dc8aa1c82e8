//! Video file source decoded through ffmpeg (libavformat + libavcodec)

use std::path::Path;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;
use tracing::debug;

use crate::source::{FrameSource, FILE_FRAME_INTERVAL_NS};
use crate::{CameraError, VideoFrame};

/// Decodes the best video stream of a file into RGB frames, one per read.
///
/// The first frame is decoded in [`FfmpegVideoSource::open`], so a file
/// ffmpeg cannot read fails there rather than inside the frame loop.
pub struct FfmpegVideoSource {
    input: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    frame_interval_ns: u64,
    sequence: u32,
    primed: Option<VideoFrame>,
    flushing: bool,
}

// Safety: the source is owned by one frame loop at a time and the ffmpeg
// contexts it holds are never shared between threads.
unsafe impl Send for FfmpegVideoSource {}

impl FfmpegVideoSource {
    pub fn open(path: &Path) -> Result<Self, CameraError> {
        let open_err = |e: ffmpeg_next::Error| CameraError::Open(format!("{}: {}", path.display(), e));

        ffmpeg_next::init().map_err(open_err)?;
        let input = ffmpeg_next::format::input(&path).map_err(open_err)?;

        let (stream_index, parameters, rate) = {
            let stream = input
                .streams()
                .best(ffmpeg_next::media::Type::Video)
                .ok_or_else(|| {
                    CameraError::Open(format!("{}: no video stream", path.display()))
                })?;
            (stream.index(), stream.parameters(), stream.rate())
        };

        let decoder = ffmpeg_next::codec::context::Context::from_parameters(parameters)
            .and_then(|ctx| ctx.decoder().video())
            .map_err(open_err)?;
        let (width, height) = (decoder.width(), decoder.height());

        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .map_err(open_err)?;

        let frame_interval_ns = if rate.numerator() > 0 && rate.denominator() > 0 {
            1_000_000_000u64 * rate.denominator() as u64 / rate.numerator() as u64
        } else {
            FILE_FRAME_INTERVAL_NS
        };

        let mut source = Self {
            input,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            frame_interval_ns,
            sequence: 0,
            primed: None,
            flushing: false,
        };

        let first = source
            .decode_next()
            .map_err(|e| CameraError::Open(format!("{}: {}", path.display(), e)))?
            .ok_or_else(|| {
                CameraError::Open(format!("{} contains no decodable frames", path.display()))
            })?;
        source.primed = Some(first);

        debug!(
            "Opened {} ({}x{}, {}ns per frame)",
            path.display(),
            width,
            height,
            frame_interval_ns
        );
        Ok(source)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Next decoded frame, or `None` once the decoder is drained
    fn decode_next(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        loop {
            if let Some(frame) = self.receive()? {
                return Ok(Some(frame));
            }
            if self.flushing {
                return Ok(None);
            }

            let next = self
                .input
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));

            match next {
                Some((index, packet)) => {
                    if index != self.stream_index {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        debug!("Skipping undecodable packet: {}", e);
                    }
                }
                None => {
                    // Drain frames still buffered in the decoder
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                }
            }
        }
    }

    fn receive(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        let mut decoded = Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let mut rgb = Video::empty();
        self.scaler
            .run(&decoded, &mut rgb)
            .map_err(|e| CameraError::Format(e.to_string()))?;

        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(Some(VideoFrame::new(
            packed_rgb(&rgb, self.width, self.height),
            self.width,
            self.height,
            sequence as u64 * self.frame_interval_ns,
            sequence,
        )))
    }
}

impl FrameSource for FfmpegVideoSource {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if let Some(frame) = self.primed.take() {
            return Ok(frame);
        }
        self.decode_next()?.ok_or(CameraError::EndOfStream)
    }

    fn is_live(&self) -> bool {
        false
    }
}

/// Copy an RGB24 plane into a tight buffer, dropping row padding
fn packed_rgb(frame: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        if let Some(line) = data.get(start..start + row_bytes) {
            pixels.extend_from_slice(line);
        }
    }
    pixels
}
