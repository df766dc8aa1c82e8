//! Frame sources: file-backed image sequences and thread-fed live streams

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, RgbImage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::video::FfmpegVideoSource;
use crate::{CameraError, VideoFrame};

/// Extensions read from a frame directory
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// Nominal frame spacing for file sources (~30fps)
pub const FILE_FRAME_INTERVAL_NS: u64 = 33_333_333;

/// Pause before a live grabber is retried after an error
pub const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// Camera device index (e.g. 0 for /dev/video0)
    Device(u32),
    /// Video file, image, animated GIF, or directory of frames
    File(PathBuf),
}

impl VideoSource {
    /// Live sources block for frames instead of running out
    pub fn is_live(&self) -> bool {
        matches!(self, VideoSource::Device(_))
    }
}

impl FromStr for VideoSource {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CameraError::Open("empty video source".into()));
        }
        // Anything that parses as an index is a webcam
        match s.parse::<u32>() {
            Ok(index) => Ok(VideoSource::Device(index)),
            Err(_) => Ok(VideoSource::File(PathBuf::from(s))),
        }
    }
}

impl std::fmt::Display for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoSource::Device(index) => write!(f, "device {}", index),
            VideoSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A source of frames, read one at a time by the frame loop
pub trait FrameSource {
    /// Read the next frame.
    ///
    /// File sources return `CameraError::EndOfStream` once exhausted;
    /// live sources block until a frame is available.
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError>;

    /// Whether this source is a live capture
    fn is_live(&self) -> bool;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        (**self).read_frame()
    }

    fn is_live(&self) -> bool {
        (**self).is_live()
    }
}

/// Open a source for the frame loop.
///
/// Directories and image files are read as image sequences, anything else
/// goes through ffmpeg. Either way the first frame is decoded here, so an
/// unreadable file fails before the loop starts.
///
/// Device capture needs a platform driver that this crate does not ship;
/// embedders feed their driver through [`LiveStream::spawn`].
pub fn open_source(source: &VideoSource) -> Result<Box<dyn FrameSource + Send>, CameraError> {
    match source {
        VideoSource::File(path) if path.is_dir() || is_image_file(path) => {
            info!("Using image frames from {}", path.display());
            Ok(Box::new(ImageSequenceSource::open(path)?))
        }
        VideoSource::File(path) => {
            info!("Using video file {}", path.display());
            Ok(Box::new(FfmpegVideoSource::open(path)?))
        }
        VideoSource::Device(index) => Err(CameraError::Open(format!(
            "no capture driver available for device {}",
            index
        ))),
    }
}

enum Pending {
    /// Decoded lazily, one file per frame
    Paths(VecDeque<PathBuf>),
    /// Already decoded (animated GIF)
    Decoded(VecDeque<RgbImage>),
}

impl Pending {
    fn len(&self) -> usize {
        match self {
            Pending::Paths(p) => p.len(),
            Pending::Decoded(d) => d.len(),
        }
    }
}

/// File-backed frame source
pub struct ImageSequenceSource {
    /// First frame, decoded at open
    primed: Option<RgbImage>,
    pending: Pending,
    sequence: u32,
    frame_interval_ns: u64,
}

impl ImageSequenceSource {
    /// Open a still image, an animated GIF, or a directory of frames
    pub fn open(path: &Path) -> Result<Self, CameraError> {
        if !path.exists() {
            return Err(CameraError::Open(format!("{} does not exist", path.display())));
        }

        let pending = if path.is_dir() {
            Pending::Paths(list_frames(path)?)
        } else if has_extension(path, "gif") {
            Pending::Decoded(decode_gif(path)?)
        } else {
            Pending::Paths(VecDeque::from(vec![path.to_path_buf()]))
        };

        if pending.len() == 0 {
            return Err(CameraError::Open(format!("{} contains no frames", path.display())));
        }

        debug!("Opened {} with {} frames", path.display(), pending.len());

        let mut source = Self {
            primed: None,
            pending,
            sequence: 0,
            frame_interval_ns: FILE_FRAME_INTERVAL_NS,
        };
        source.primed = source
            .next_image()
            .map_err(|e| CameraError::Open(e.to_string()))?;

        Ok(source)
    }

    /// Frames not yet read
    pub fn remaining(&self) -> usize {
        self.pending.len() + usize::from(self.primed.is_some())
    }

    fn next_image(&mut self) -> Result<Option<RgbImage>, CameraError> {
        if let Some(img) = self.primed.take() {
            return Ok(Some(img));
        }

        match &mut self.pending {
            Pending::Decoded(frames) => Ok(frames.pop_front()),
            Pending::Paths(paths) => match paths.pop_front() {
                Some(path) => {
                    let img = image::open(&path).map_err(|e| {
                        CameraError::Format(format!("{}: {}", path.display(), e))
                    })?;
                    Ok(Some(img.to_rgb8()))
                }
                None => Ok(None),
            },
        }
    }
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        let img = self.next_image()?.ok_or(CameraError::EndOfStream)?;
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(VideoFrame::from_rgb_image(
            img,
            sequence as u64 * self.frame_interval_ns,
            sequence,
        ))
    }

    fn is_live(&self) -> bool {
        false
    }
}

fn is_image_file(path: &Path) -> bool {
    IMAGE_EXTENSIONS.iter().any(|ext| has_extension(path, ext))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

fn list_frames(dir: &Path) -> Result<VecDeque<PathBuf>, CameraError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| is_image_file(p))
        .collect();
    paths.sort();

    Ok(paths.into())
}

fn decode_gif(path: &Path) -> Result<VecDeque<RgbImage>, CameraError> {
    let file = File::open(path)
        .map_err(|e| CameraError::Open(format!("{}: {}", path.display(), e)))?;
    let decoder = GifDecoder::new(BufReader::new(file))?;
    let frames = decoder.into_frames().collect_frames()?;

    Ok(frames
        .into_iter()
        .map(|f| DynamicImage::ImageRgba8(f.into_buffer()).to_rgb8())
        .collect())
}

/// Live frame source fed by a capture thread.
///
/// The grabber runs on its own thread and pushes frames through a bounded
/// channel; `read_frame` blocks until the next one arrives. The grabber
/// returns `Ok(None)` when the device closes. A grabber error is passed to
/// the reader once, then the grabber is retried after
/// [`CAPTURE_RETRY_DELAY`].
pub struct LiveStream {
    receiver: mpsc::Receiver<Result<VideoFrame, CameraError>>,
    shutdown: Arc<AtomicBool>,
}

impl LiveStream {
    /// Spawn the capture thread
    pub fn spawn<G>(mut grabber: G, buffer: usize) -> Result<Self, CameraError>
    where
        G: FnMut() -> Result<Option<VideoFrame>, CameraError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        std::thread::Builder::new()
            .name("frame-capture".into())
            .spawn(move || {
                while !shutdown_clone.load(Ordering::SeqCst) {
                    let item = match grabber() {
                        Ok(Some(frame)) => Ok(frame),
                        Ok(None) => {
                            debug!("Capture driver closed");
                            break;
                        }
                        Err(e) => {
                            warn!("Capture error, retrying: {}", e);
                            Err(e)
                        }
                    };
                    let failed = item.is_err();
                    if tx.blocking_send(item).is_err() {
                        debug!("Frame receiver dropped");
                        break;
                    }
                    if failed {
                        std::thread::sleep(CAPTURE_RETRY_DELAY);
                    }
                }
            })
            .map_err(|e| CameraError::Open(format!("failed to start capture thread: {}", e)))?;

        Ok(Self {
            receiver: rx,
            shutdown,
        })
    }
}

impl FrameSource for LiveStream {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        match self.receiver.blocking_recv() {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(e)) => Err(e),
            None => Err(CameraError::EndOfStream),
        }
    }

    fn is_live(&self) -> bool {
        true
    }
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Delay, Frame, Rgba, RgbaImage};
    use image::codecs::gif::GifEncoder;

    #[test]
    fn test_parse_video_source() {
        assert_eq!("0".parse::<VideoSource>().unwrap(), VideoSource::Device(0));
        assert_eq!(" 2 ".parse::<VideoSource>().unwrap(), VideoSource::Device(2));
        assert_eq!(
            "clips/drive.gif".parse::<VideoSource>().unwrap(),
            VideoSource::File(PathBuf::from("clips/drive.gif"))
        );
        assert!("".parse::<VideoSource>().is_err());
        assert!(VideoSource::Device(1).is_live());
    }

    #[test]
    fn test_directory_source_reads_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for (name, shade) in [("frame_002.png", 20u8), ("frame_001.png", 10u8)] {
            RgbImage::from_pixel(8, 6, image::Rgb([shade, shade, shade]))
                .save(dir.path().join(name))
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let mut source = ImageSequenceSource::open(dir.path()).unwrap();
        assert_eq!(source.remaining(), 2);
        assert!(!source.is_live());

        let first = source.read_frame().unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!(first.get_pixel(0, 0), Some([10, 10, 10]));

        let second = source.read_frame().unwrap();
        assert_eq!(second.sequence, 1);
        assert_eq!(second.get_pixel(0, 0), Some([20, 20, 20]));
        assert!(second.timestamp_ns > first.timestamp_ns);

        assert!(matches!(source.read_frame(), Err(CameraError::EndOfStream)));
    }

    #[test]
    fn test_gif_source_yields_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.gif");
        {
            let file = File::create(&path).unwrap();
            let mut encoder = GifEncoder::new(file);
            let frames = (0..3).map(|i| {
                Frame::from_parts(
                    RgbaImage::from_pixel(4, 4, Rgba([i * 80, 0, 0, 255])),
                    0,
                    0,
                    Delay::from_numer_denom_ms(33, 1),
                )
            });
            encoder.encode_frames(frames).unwrap();
        }

        let mut source = ImageSequenceSource::open(&path).unwrap();
        let mut count = 0;
        while source.read_frame().is_ok() {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn test_missing_source_fails_at_open() {
        let result = ImageSequenceSource::open(Path::new("/definitely/not/here.png"));
        assert!(matches!(result, Err(CameraError::Open(_))));

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::open(empty.path()),
            Err(CameraError::Open(_))
        ));

        assert!(matches!(
            open_source(&VideoSource::Device(0)),
            Err(CameraError::Open(_))
        ));
    }

    #[test]
    fn test_live_stream_delivers_then_ends() {
        let mut produced = 0u32;
        let mut stream = LiveStream::spawn(
            move || {
                produced += 1;
                if produced > 3 {
                    return Ok(None);
                }
                Ok(Some(VideoFrame::filled(2, 2, [0, 0, 0], produced)))
            },
            2,
        )
        .unwrap();

        assert!(stream.is_live());
        for expected in 1..=3 {
            assert_eq!(stream.read_frame().unwrap().sequence, expected);
        }
        assert!(matches!(stream.read_frame(), Err(CameraError::EndOfStream)));
    }

    #[test]
    fn test_live_stream_recovers_after_driver_error() {
        let mut calls = 0u32;
        let mut stream = LiveStream::spawn(
            move || {
                calls += 1;
                match calls {
                    2 => Err(CameraError::Stream("transient".into())),
                    1 | 3 | 4 => Ok(Some(VideoFrame::filled(2, 2, [0, 0, 0], calls))),
                    _ => Ok(None),
                }
            },
            1,
        )
        .unwrap();

        assert_eq!(stream.read_frame().unwrap().sequence, 1);
        match stream.read_frame() {
            Err(e @ CameraError::Stream(_)) => assert_eq!(e.to_string(), "Streaming error: transient"),
            other => panic!("expected a stream error, got {:?}", other),
        }
        assert_eq!(stream.read_frame().unwrap().sequence, 3);
        assert_eq!(stream.read_frame().unwrap().sequence, 4);
        assert!(matches!(stream.read_frame(), Err(CameraError::EndOfStream)));
    }

    #[test]
    fn test_undecodable_file_fails_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let fake_video = dir.path().join("drive.mp4");
        std::fs::write(&fake_video, b"not really a video").unwrap();
        let fake_image = dir.path().join("frame.png");
        std::fs::write(&fake_image, b"not really a png").unwrap();

        assert!(matches!(
            ImageSequenceSource::open(&fake_video),
            Err(CameraError::Open(_))
        ));
        assert!(matches!(
            ImageSequenceSource::open(&fake_image),
            Err(CameraError::Open(_))
        ));
        assert!(matches!(
            open_source(&VideoSource::File(fake_video)),
            Err(CameraError::Open(_))
        ));
        assert!(matches!(
            open_source(&VideoSource::File(fake_image)),
            Err(CameraError::Open(_))
        ));
    }
}
