//! Template correlation.
//!
//! Scores are zero-mean normalized cross-correlation (the `TM_CCOEFF_NORMED`
//! flavour): 1.0 is a perfect match, 0.0 no linear relation, -1.0 an inverted
//! image. Each template is slid over every placement in the frame and the best
//! placement wins, so the icon may appear anywhere in the captured region.

use image::GrayImage;
use rayon::prelude::*;

use crate::error::MatchError;

use super::library::{TemplateEntry, TemplateLibrary};

/// Below this window variance a placement is treated as flat and scores 0.
const FLAT_EPSILON: f64 = 1e-6;

/// Template pixels with the mean removed, computed once at load.
#[derive(Debug, Clone)]
pub struct PreparedTemplate {
    width: usize,
    height: usize,
    zero_mean: Vec<f32>,
    norm: f64,
}

impl PreparedTemplate {
    /// Returns `None` for a template with no contrast, which can never correlate.
    pub fn new(image: &GrayImage) -> Option<Self> {
        let pixels = image.as_raw();
        if pixels.is_empty() {
            return None;
        }
        let mean = pixels.iter().map(|&p| p as f64).sum::<f64>() / pixels.len() as f64;
        let zero_mean: Vec<f32> = pixels.iter().map(|&p| (p as f64 - mean) as f32).collect();
        let norm = zero_mean
            .iter()
            .map(|&v| (v as f64) * (v as f64))
            .sum::<f64>()
            .sqrt();
        if norm < FLAT_EPSILON {
            return None;
        }
        Some(Self {
            width: image.width() as usize,
            height: image.height() as usize,
            zero_mean,
            norm,
        })
    }
}

/// Summed-area tables over pixel values and their squares.
struct Integrals {
    stride: usize,
    sum: Vec<f64>,
    sq_sum: Vec<f64>,
}

impl Integrals {
    fn new(frame: &GrayImage) -> Self {
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        let stride = width + 1;
        let mut sum = vec![0.0; stride * (height + 1)];
        let mut sq_sum = vec![0.0; stride * (height + 1)];
        let pixels = frame.as_raw();

        for y in 0..height {
            let mut row = 0.0;
            let mut row_sq = 0.0;
            for x in 0..width {
                let v = pixels[y * width + x] as f64;
                row += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row;
                sq_sum[idx] = sq_sum[idx - stride] + row_sq;
            }
        }

        Self { stride, sum, sq_sum }
    }

    fn window(&self, table: &[f64], x: usize, y: usize, w: usize, h: usize) -> f64 {
        let s = self.stride;
        table[(y + h) * s + x + w] - table[y * s + x + w] - table[(y + h) * s + x] + table[y * s + x]
    }
}

/// Best correlation of `template` over all placements inside `frame`.
fn best_placement(frame: &GrayImage, integrals: &Integrals, template: &PreparedTemplate) -> f32 {
    let frame_width = frame.width() as usize;
    let pixels = frame.as_raw();
    let (tw, th) = (template.width, template.height);
    let n = (tw * th) as f64;
    let max_x = frame_width - tw;
    let max_y = frame.height() as usize - th;

    (0..=max_y)
        .into_par_iter()
        .map(|y| {
            let mut best = f64::NEG_INFINITY;
            for x in 0..=max_x {
                let sum = integrals.window(&integrals.sum, x, y, tw, th);
                let sq_sum = integrals.window(&integrals.sq_sum, x, y, tw, th);
                let variance = sq_sum - sum * sum / n;
                let score = if variance <= FLAT_EPSILON * n {
                    0.0
                } else {
                    let mut numerator = 0.0f32;
                    for j in 0..th {
                        let row = &pixels[(y + j) * frame_width + x..][..tw];
                        let t_row = &template.zero_mean[j * tw..][..tw];
                        numerator += row
                            .iter()
                            .zip(t_row)
                            .map(|(&p, &t)| p as f32 * t)
                            .sum::<f32>();
                    }
                    numerator as f64 / (template.norm * variance.sqrt())
                };
                best = best.max(score);
            }
            best
        })
        .reduce(|| f64::NEG_INFINITY, f64::max)
        .clamp(-1.0, 1.0) as f32
}

/// Scores how well a template appears somewhere in a frame.
pub trait Matcher: Send + Sync {
    fn score(&self, frame: &GrayImage, entry: &TemplateEntry) -> Result<f32, MatchError>;
}

/// Zero-mean normalized cross-correlation over the full frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct NccMatcher;

impl Matcher for NccMatcher {
    fn score(&self, frame: &GrayImage, entry: &TemplateEntry) -> Result<f32, MatchError> {
        ensure_fits(frame, entry)?;
        let integrals = Integrals::new(frame);
        Ok(best_placement(frame, &integrals, entry.prepared()))
    }
}

fn ensure_fits(frame: &GrayImage, entry: &TemplateEntry) -> Result<(), MatchError> {
    if entry.width() > frame.width() || entry.height() > frame.height() {
        return Err(MatchError::TemplateExceedsFrame {
            key: entry.key.clone(),
            template_width: entry.width(),
            template_height: entry.height(),
            frame_width: frame.width(),
            frame_height: frame.height(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchScore {
    pub key: String,
    pub score: f32,
}

/// Scores every included entry against one frame, in library order.
pub fn match_all<M: Matcher + ?Sized>(
    matcher: &M,
    frame: &GrayImage,
    library: &TemplateLibrary,
    mut include: impl FnMut(&TemplateEntry) -> bool,
) -> Result<Vec<MatchScore>, MatchError> {
    let mut scores = Vec::with_capacity(library.len());
    for entry in library.iter() {
        if !include(entry) {
            continue;
        }
        scores.push(MatchScore {
            key: entry.key.clone(),
            score: matcher.score(frame, entry)?,
        });
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptureRegion;
    use image::{imageops, Luma};

    fn noise(width: u32, height: u32, seed: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let v = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729) ^ seed.wrapping_mul(31))
                .wrapping_mul(2_654_435_761);
            Luma([(v >> 24) as u8])
        })
    }

    fn icon() -> GrayImage {
        GrayImage::from_fn(12, 10, |x, y| {
            Luma([if (x as i32 - 6).pow(2) + (y as i32 - 5).pow(2) < 12 { 250 } else { 15 }])
        })
    }

    fn entry(image: GrayImage) -> TemplateEntry {
        TemplateEntry::new("icon", "Icon", 9.0, image).unwrap()
    }

    #[test]
    fn finds_template_anywhere_in_frame() {
        let template = icon();
        let mut frame = noise(80, 30, 1);
        imageops::replace(&mut frame, &template, 57, 13);

        let score = NccMatcher.score(&frame, &entry(template)).unwrap();
        assert!(score > 0.99, "expected near-perfect match, got {score}");
    }

    #[test]
    fn unrelated_frame_scores_low() {
        let frame = noise(80, 30, 2);
        let score = NccMatcher.score(&frame, &entry(icon())).unwrap();
        assert!(score < 0.65, "noise should not clear the threshold, got {score}");
    }

    #[test]
    fn flat_frame_scores_zero() {
        let frame = GrayImage::from_pixel(40, 20, Luma([90]));
        let score = NccMatcher.score(&frame, &entry(icon())).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn template_equal_to_frame_is_a_single_placement() {
        let template = icon();
        let score = NccMatcher.score(&template.clone(), &entry(template)).unwrap();
        assert!(score > 0.99);
    }

    #[test]
    fn oversized_template_is_an_error() {
        let frame = noise(8, 8, 3);
        assert!(matches!(
            NccMatcher.score(&frame, &entry(icon())),
            Err(MatchError::TemplateExceedsFrame { .. })
        ));
    }

    #[test]
    fn match_all_skips_excluded_entries() {
        let region = CaptureRegion {
            top: 0,
            left: 0,
            width: 80,
            height: 30,
        };
        let library = TemplateLibrary::from_entries(
            vec![
                TemplateEntry::new("a", "A", 9.0, icon()).unwrap(),
                TemplateEntry::new("b", "B", 7.0, noise(10, 10, 4)).unwrap(),
            ],
            region,
        )
        .unwrap();
        let frame = noise(80, 30, 5);

        let scores = match_all(&NccMatcher, &frame, &library, |e| e.key != "a").unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].key, "b");
    }
}
