use image::{imageops, GrayImage};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::config::CaptureRegion;
use crate::error::{CaptureError, ConfigError};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Something that can hand over a fresh grayscale image of a screen region.
///
/// Implementations must fail loudly rather than return a previous frame.
pub trait FrameSource: Send + Sync {
    fn capture(&self, region: CaptureRegion) -> Result<GrayImage, CaptureError>;
}

fn check_bounds(region: CaptureRegion, width: u32, height: u32) -> Result<(), CaptureError> {
    let right = region.left.checked_add(region.width);
    let bottom = region.top.checked_add(region.height);
    match (right, bottom) {
        (Some(right), Some(bottom)) if right <= width && bottom <= height => Ok(()),
        _ => Err(CaptureError::OutOfBounds {
            top: region.top,
            left: region.left,
            width: region.width,
            height: region.height,
            surface_width: width,
            surface_height: height,
        }),
    }
}

/// Cuts the capture region out of a full-surface grayscale image.
pub fn crop_region(image: &GrayImage, region: CaptureRegion) -> Result<GrayImage, CaptureError> {
    check_bounds(region, image.width(), image.height())?;
    Ok(imageops::crop_imm(image, region.left, region.top, region.width, region.height).to_image())
}

/// Loads a saved screenshot and crops it to the region.
pub fn load_frame(path: &Path, region: CaptureRegion) -> Result<GrayImage, CaptureError> {
    let image = image::open(path)
        .map_err(|source| CaptureError::Decode {
            path: path.to_path_buf(),
            source,
        })?
        .to_luma8();
    crop_region(&image, region)
}

/// Replays a directory of screenshots in file-name order, one per capture.
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    cursor: AtomicUsize,
    looping: bool,
}

impl ImageSequenceSource {
    pub fn from_dir(dir: &Path, looping: bool) -> Result<Self, ConfigError> {
        let read_dir = fs::read_dir(dir).map_err(|source| ConfigError::FrameDirectory {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut frames = Vec::new();
        for entry in read_dir {
            let path = entry
                .map_err(|source| ConfigError::FrameDirectory {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_image {
                frames.push(path);
            }
        }

        if frames.is_empty() {
            return Err(ConfigError::NoFrames(dir.to_path_buf()));
        }
        frames.sort();
        log::info!("Replaying {} frames from {}", frames.len(), dir.display());

        Ok(Self {
            frames,
            cursor: AtomicUsize::new(0),
            looping,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn capture(&self, region: CaptureRegion) -> Result<GrayImage, CaptureError> {
        let position = self.cursor.fetch_add(1, Ordering::Relaxed);
        let index = if self.looping {
            position % self.frames.len()
        } else if position < self.frames.len() {
            position
        } else {
            return Err(CaptureError::Exhausted);
        };
        load_frame(&self.frames[index], region)
    }
}

/// Live capture of the primary monitor.
#[cfg(feature = "screen")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ScreenSource;

#[cfg(feature = "screen")]
impl FrameSource for ScreenSource {
    fn capture(&self, region: CaptureRegion) -> Result<GrayImage, CaptureError> {
        let monitors =
            xcap::Monitor::all().map_err(|err| CaptureError::Backend(err.to_string()))?;
        let monitor = monitors
            .into_iter()
            .find(|monitor| monitor.is_primary().unwrap_or(false))
            .ok_or(CaptureError::NoDisplay)?;
        let screen = monitor
            .capture_image()
            .map_err(|err| CaptureError::Backend(err.to_string()))?;

        check_bounds(region, screen.width(), screen.height())?;
        let cropped =
            imageops::crop_imm(&screen, region.left, region.top, region.width, region.height)
                .to_image();
        Ok(image::DynamicImage::ImageRgba8(cropped).to_luma8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn region(left: u32, top: u32, width: u32, height: u32) -> CaptureRegion {
        CaptureRegion {
            top,
            left,
            width,
            height,
        }
    }

    #[test]
    fn crops_the_configured_rectangle() {
        let image = GrayImage::from_fn(20, 10, |x, y| Luma([(x + y * 20) as u8]));
        let cropped = crop_region(&image, region(5, 2, 4, 3)).unwrap();
        assert_eq!(cropped.dimensions(), (4, 3));
        assert_eq!(cropped.get_pixel(0, 0)[0], (5 + 2 * 20) as u8);
    }

    #[test]
    fn region_past_the_edge_is_a_capture_error() {
        let image = GrayImage::new(20, 10);
        assert!(matches!(
            crop_region(&image, region(18, 0, 4, 3)),
            Err(CaptureError::OutOfBounds { .. })
        ));
        assert!(matches!(
            crop_region(&image, region(u32::MAX, 0, 4, 3)),
            Err(CaptureError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn sequence_replays_in_name_order_then_exhausts() {
        let dir = tempfile::tempdir().unwrap();
        GrayImage::from_pixel(8, 8, Luma([200])).save(dir.path().join("b.png")).unwrap();
        GrayImage::from_pixel(8, 8, Luma([100])).save(dir.path().join("a.png")).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let source = ImageSequenceSource::from_dir(dir.path(), false).unwrap();
        assert_eq!(source.len(), 2);

        let r = region(0, 0, 4, 4);
        assert_eq!(source.capture(r).unwrap().get_pixel(0, 0)[0], 100);
        assert_eq!(source.capture(r).unwrap().get_pixel(0, 0)[0], 200);
        assert!(matches!(source.capture(r), Err(CaptureError::Exhausted)));
    }

    #[test]
    fn looping_sequence_wraps_around() {
        let dir = tempfile::tempdir().unwrap();
        GrayImage::from_pixel(8, 8, Luma([42])).save(dir.path().join("only.png")).unwrap();

        let source = ImageSequenceSource::from_dir(dir.path(), true).unwrap();
        let r = region(0, 0, 8, 8);
        for _ in 0..3 {
            assert_eq!(source.capture(r).unwrap().get_pixel(7, 7)[0], 42);
        }
    }

    #[test]
    fn empty_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::from_dir(dir.path(), false),
            Err(ConfigError::NoFrames(_))
        ));
    }
}
