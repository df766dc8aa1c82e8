//! Video frame types and processing

use image::{imageops::FilterType, RgbImage};

use crate::CameraError;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Create a uniformly colored frame
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], sequence: u32) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Self::new(data, width, height, 0, sequence)
    }

    /// Wrap a decoded image
    pub fn from_rgb_image(img: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height, timestamp_ns, sequence)
    }

    /// View the frame as an `image` buffer
    pub fn to_rgb_image(&self) -> Result<RgbImage, CameraError> {
        RgbImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            CameraError::Format(format!(
                "buffer of {} bytes does not match {}x{} RGB",
                self.data.len(),
                self.width,
                self.height
            ))
        })
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.data
            .get(idx..idx + 3)
            .map(|p| [p[0], p[1], p[2]])
    }

    /// Convert to grayscale
    pub fn to_grayscale(&self) -> Vec<u8> {
        let mut gray = Vec::with_capacity((self.width * self.height) as usize);
        for pixel in self.data.chunks_exact(3) {
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let y = (pixel[0] as f32 * 0.299
                   + pixel[1] as f32 * 0.587
                   + pixel[2] as f32 * 0.114) as u8;
            gray.push(y);
        }
        gray
    }

    /// Crop a region of the frame
    pub fn crop(&self, x: u32, y: u32, w: u32, h: u32) -> Option<VideoFrame> {
        if w == 0 || h == 0 || x + w > self.width || y + h > self.height {
            return None;
        }

        let mut cropped = Vec::with_capacity((w * h * 3) as usize);
        for row in y..(y + h) {
            let start = ((row * self.width + x) * 3) as usize;
            let end = start + (w * 3) as usize;
            cropped.extend_from_slice(self.data.get(start..end)?);
        }

        Some(VideoFrame {
            data: cropped,
            width: w,
            height: h,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        })
    }

    /// Resize frame using triangle (bilinear) filtering
    pub fn resize(&self, new_width: u32, new_height: u32) -> Result<VideoFrame, CameraError> {
        if new_width == 0 || new_height == 0 {
            return Err(CameraError::Format(format!(
                "cannot resize to {}x{}",
                new_width, new_height
            )));
        }
        if new_width == self.width && new_height == self.height {
            return Ok(self.clone());
        }

        let img = self.to_rgb_image()?;
        let resized = image::imageops::resize(&img, new_width, new_height, FilterType::Triangle);

        Ok(VideoFrame {
            data: resized.into_raw(),
            width: new_width,
            height: new_height,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        })
    }

    /// Resize to a target width, keeping the aspect ratio
    pub fn resize_to_width(&self, new_width: u32) -> Result<VideoFrame, CameraError> {
        if self.width == 0 {
            return Err(CameraError::Format("frame has zero width".into()));
        }
        let new_height = ((self.height as u64 * new_width as u64) / self.width as u64).max(1) as u32;
        self.resize(new_width, new_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gradient(width: u32, height: u32) -> VideoFrame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 0]);
            }
        }
        VideoFrame::new(data, width, height, 42, 7)
    }

    #[test]
    fn test_get_pixel_bounds() {
        let frame = gradient(4, 3);
        assert_eq!(frame.get_pixel(2, 1), Some([2, 1, 0]));
        assert_eq!(frame.get_pixel(4, 0), None);
        assert_eq!(frame.get_pixel(0, 3), None);
    }

    #[test]
    fn test_grayscale_length() {
        let frame = VideoFrame::filled(5, 4, [255, 255, 255], 0);
        let gray = frame.to_grayscale();
        assert_eq!(gray.len(), 20);
        assert!(gray.iter().all(|&v| v >= 254));
    }

    #[test]
    fn test_crop() {
        let frame = gradient(6, 6);
        let cropped = frame.crop(2, 3, 2, 2).unwrap();
        assert_eq!(cropped.width, 2);
        assert_eq!(cropped.get_pixel(0, 0), Some([2, 3, 0]));
        assert_eq!(cropped.sequence, 7);

        assert!(frame.crop(5, 5, 2, 2).is_none());
        assert!(frame.crop(0, 0, 0, 2).is_none());
    }

    #[test]
    fn test_resize_to_width_keeps_aspect() {
        let frame = VideoFrame::filled(900, 600, [10, 20, 30], 3);
        let resized = frame.resize_to_width(450).unwrap();
        assert_eq!((resized.width, resized.height), (450, 300));
        assert_eq!(resized.data.len(), 450 * 300 * 3);
        assert_eq!(resized.sequence, 3);
        assert_eq!(resized.get_pixel(100, 100), Some([10, 20, 30]));
    }

    #[test]
    fn test_mismatched_buffer_rejected() {
        let frame = VideoFrame::new(vec![0; 10], 4, 4, 0, 0);
        assert!(matches!(frame.to_rgb_image(), Err(CameraError::Format(_))));
    }

    proptest! {
        #[test]
        fn crop_matches_source_pixels(
            x in 0u32..12, y in 0u32..12, w in 0u32..12, h in 0u32..12
        ) {
            let frame = gradient(12, 12);
            match frame.crop(x, y, w, h) {
                Some(cropped) => {
                    prop_assert_eq!(cropped.data.len(), (w * h * 3) as usize);
                    prop_assert_eq!(cropped.get_pixel(0, 0), frame.get_pixel(x, y));
                    prop_assert_eq!(
                        cropped.get_pixel(w - 1, h - 1),
                        frame.get_pixel(x + w - 1, y + h - 1)
                    );
                }
                None => prop_assert!(w == 0 || h == 0 || x + w > 12 || y + h > 12),
            }
        }
    }
}
