//! Still-image encoding for sampled frames.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use tracing::info;

use reelchat_core::FrameImage;

use crate::encoder::SampledFrame;

/// Wire format frames are compressed to before they leave the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Jpeg { quality: u8 },
    Png,
}

impl FrameFormat {
    pub const DEFAULT_JPEG_QUALITY: u8 = 85;

    pub fn mime_type(&self) -> &'static str {
        match self {
            FrameFormat::Jpeg { .. } => "image/jpeg",
            FrameFormat::Png => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FrameFormat::Jpeg { .. } => "jpg",
            FrameFormat::Png => "png",
        }
    }

    /// Same format with a different JPEG quality; PNG is unchanged.
    pub fn with_quality(self, quality: u8) -> Self {
        match self {
            FrameFormat::Jpeg { .. } => FrameFormat::Jpeg {
                quality: quality.clamp(1, 100),
            },
            FrameFormat::Png => FrameFormat::Png,
        }
    }
}

impl Default for FrameFormat {
    fn default() -> Self {
        FrameFormat::Jpeg {
            quality: Self::DEFAULT_JPEG_QUALITY,
        }
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameFormat::Jpeg { quality } => write!(f, "jpeg (q{quality})"),
            FrameFormat::Png => write!(f, "png"),
        }
    }
}

impl FromStr for FrameFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(FrameFormat::default()),
            "png" => Ok(FrameFormat::Png),
            other => Err(format!("unsupported frame format '{other}' (expected jpeg or png)")),
        }
    }
}

/// Compress one frame for transport.
pub fn encode_frame(image: &RgbImage, format: FrameFormat) -> Result<FrameImage> {
    let mut buf = Vec::new();
    match format {
        FrameFormat::Jpeg { quality } => {
            JpegEncoder::new_with_quality(&mut buf, quality)
                .encode_image(image)
                .context("Failed to encode frame as JPEG")?;
        }
        FrameFormat::Png => {
            image
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .context("Failed to encode frame as PNG")?;
        }
    }
    Ok(FrameImage {
        mime_type: format.mime_type(),
        data: Bytes::from(buf),
    })
}

/// Compress every frame, preserving order.
pub fn encode_frames(frames: &[SampledFrame], format: FrameFormat) -> Result<Vec<FrameImage>> {
    frames
        .iter()
        .map(|frame| {
            encode_frame(&frame.image, format)
                .with_context(|| format!("Frame {} could not be encoded", frame.index))
        })
        .collect()
}

/// Write frames to `dir` as `frame_<position>_<index>.<ext>`.
pub fn save_frames(frames: &[SampledFrame], dir: &Path, format: FrameFormat) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let mut written = Vec::with_capacity(frames.len());
    for (position, frame) in frames.iter().enumerate() {
        let path = dir.join(format!(
            "frame_{position:04}_{:06}.{}",
            frame.index,
            format.extension()
        ));
        let encoded = encode_frame(&frame.image, format)?;
        std::fs::write(&path, &encoded.data)
            .with_context(|| format!("Failed to write frame: {}", path.display()))?;
        written.push(path);
    }
    info!(count = written.len(), dir = %dir.display(), "Saved frames");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn frame(index: usize) -> SampledFrame {
        SampledFrame {
            index,
            timestamp: index as f64 / 30.0,
            image: RgbImage::from_pixel(8, 8, Rgb([10, 20, 30])),
        }
    }

    #[test]
    fn jpeg_has_soi_marker() {
        let out = encode_frame(&frame(0).image, FrameFormat::default()).unwrap();
        assert_eq!(out.mime_type, "image/jpeg");
        assert_eq!(&out.data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn png_has_signature() {
        let out = encode_frame(&frame(0).image, FrameFormat::Png).unwrap();
        assert_eq!(out.mime_type, "image/png");
        assert_eq!(&out.data[1..4], b"PNG");
    }

    #[test]
    fn parses_format_names() {
        assert_eq!("JPG".parse::<FrameFormat>().unwrap(), FrameFormat::default());
        assert_eq!("png".parse::<FrameFormat>().unwrap(), FrameFormat::Png);
        assert!("gif".parse::<FrameFormat>().is_err());
        assert_eq!(
            FrameFormat::default().with_quality(0),
            FrameFormat::Jpeg { quality: 1 }
        );
    }

    #[test]
    fn saves_frames_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![frame(5), frame(15)];
        let paths = save_frames(&frames, dir.path(), FrameFormat::Png).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("frame_0000_000005.png"));
        assert!(paths[1].exists());
    }
}
