use crate::bbox::BBox;
use crate::image::Image;
use nalgebra as na;

const RAW_PATCH_SIZE: usize = 16;
const HIST_BINS: usize = 16;
const HAAR_GRID: usize = 4;

/// Feature extraction over an image region.
///
/// Every variant produces a fixed-length vector so the learner can treat
/// features as opaque points in one space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureExtractor {
    /// The region resampled to a 16x16 intensity patch.
    Raw,
    /// 16-bin intensity histograms over a two-level spatial pyramid.
    Histogram,
    /// Box-filter responses (6 types, 4x4 grid, 2 scales).
    Haar,
}

impl FeatureExtractor {
    pub fn dim(&self) -> usize {
        match self {
            FeatureExtractor::Raw => RAW_PATCH_SIZE * RAW_PATCH_SIZE,
            FeatureExtractor::Histogram => HIST_BINS * 5,
            FeatureExtractor::Haar => 6 * HAAR_GRID * HAAR_GRID * 2,
        }
    }

    pub fn extract(&self, image: &Image, rect: &BBox) -> na::DVector<f64> {
        match self {
            FeatureExtractor::Raw => raw_features(image, rect),
            FeatureExtractor::Histogram => histogram_features(image, rect),
            FeatureExtractor::Haar => haar_features(image, rect),
        }
    }
}

fn raw_features(image: &Image, rect: &BBox) -> na::DVector<f64> {
    let n = RAW_PATCH_SIZE;
    let mut out = na::DVector::zeros(n * n);
    for row in 0..n {
        for col in 0..n {
            let x = rect.x_min + (col as f32 + 0.5) * rect.width / n as f32;
            let y = rect.y_min + (row as f32 + 0.5) * rect.height / n as f32;
            out[row * n + col] = image.sample(x as isize, y as isize) as f64;
        }
    }
    out
}

fn histogram_features(image: &Image, rect: &BBox) -> na::DVector<f64> {
    // level 0: whole region; level 1: 2x2 cells
    let cells = [
        (0.0, 0.0, 1.0, 1.0),
        (0.0, 0.0, 0.5, 0.5),
        (0.5, 0.0, 0.5, 0.5),
        (0.0, 0.5, 0.5, 0.5),
        (0.5, 0.5, 0.5, 0.5),
    ];

    let mut out = na::DVector::zeros(HIST_BINS * cells.len());
    for (c, &(fx, fy, fw, fh)) in cells.iter().enumerate() {
        let cell = BBox::new(
            rect.x_min + fx * rect.width,
            rect.y_min + fy * rect.height,
            fw * rect.width,
            fh * rect.height,
        );
        cell_histogram(image, &cell, &mut out.as_mut_slice()[c * HIST_BINS..(c + 1) * HIST_BINS]);
    }
    out
}

fn cell_histogram(image: &Image, cell: &BBox, bins: &mut [f64]) {
    let x0 = cell.x_min.floor() as isize;
    let y0 = cell.y_min.floor() as isize;
    let x1 = (cell.x_max().ceil() as isize).max(x0 + 1);
    let y1 = (cell.y_max().ceil() as isize).max(y0 + 1);

    let mut count = 0.0;
    for y in y0..y1 {
        for x in x0..x1 {
            let v = image.sample(x, y).clamp(0.0, 1.0);
            let bin = ((v * HIST_BINS as f32) as usize).min(HIST_BINS - 1);
            bins[bin] += 1.0;
            count += 1.0;
        }
    }
    for b in bins.iter_mut() {
        *b /= count;
    }
}

/// Weighted box sums of the six classic filter layouts, placed on a 4x4
/// grid of the unit square at two scales and mapped onto `rect`.
fn haar_features(image: &Image, rect: &BBox) -> na::DVector<f64> {
    let grid = HAAR_GRID as f32;
    let mut out = Vec::with_capacity(6 * HAAR_GRID * HAAR_GRID * 2);

    for &scale in &[0.25f32, 0.5f32] {
        for gy in 0..HAAR_GRID {
            for gx in 0..HAAR_GRID {
                let x = gx as f32 / (grid - 1.0) * (1.0 - scale);
                let y = gy as f32 / (grid - 1.0) * (1.0 - scale);
                for ty in 0..6 {
                    out.push(haar_response(image, rect, x, y, scale, ty));
                }
            }
        }
    }
    na::DVector::from_vec(out)
}

fn haar_response(image: &Image, rect: &BBox, x: f32, y: f32, s: f32, ty: usize) -> f64 {
    let sub = |fx: f32, fy: f32, fw: f32, fh: f32| -> f32 {
        let r = BBox::new(
            rect.x_min + (x + fx * s) * rect.width,
            rect.y_min + (y + fy * s) * rect.height,
            fw * s * rect.width,
            fh * s * rect.height,
        );
        image.region_mean(&r)
    };

    let v = match ty {
        // left/right halves
        0 => sub(0.0, 0.0, 0.5, 1.0) - sub(0.5, 0.0, 0.5, 1.0),
        // top/bottom halves
        1 => sub(0.0, 0.0, 1.0, 0.5) - sub(0.0, 0.5, 1.0, 0.5),
        // horizontal thirds
        2 => {
            sub(0.0, 0.0, 1.0 / 3.0, 1.0) - 2.0 * sub(1.0 / 3.0, 0.0, 1.0 / 3.0, 1.0)
                + sub(2.0 / 3.0, 0.0, 1.0 / 3.0, 1.0)
        }
        // vertical thirds
        3 => {
            sub(0.0, 0.0, 1.0, 1.0 / 3.0) - 2.0 * sub(0.0, 1.0 / 3.0, 1.0, 1.0 / 3.0)
                + sub(0.0, 2.0 / 3.0, 1.0, 1.0 / 3.0)
        }
        // checkerboard quadrants
        4 => {
            sub(0.0, 0.0, 0.5, 0.5) - sub(0.5, 0.0, 0.5, 0.5) - sub(0.0, 0.5, 0.5, 0.5)
                + sub(0.5, 0.5, 0.5, 0.5)
        }
        // center surround
        _ => sub(0.0, 0.0, 1.0, 1.0) - sub(0.25, 0.25, 0.5, 0.5),
    };
    v as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image() -> Image {
        let samples: Vec<u8> = (0..32 * 32).map(|i| ((i % 32) * 8) as u8).collect();
        Image::from_luma8(32, 32, &samples)
    }

    #[test]
    fn dimensions_match_extracted_length() {
        let img = gradient_image();
        let rect = BBox::new(4.0, 4.0, 16.0, 16.0);
        for f in [
            FeatureExtractor::Raw,
            FeatureExtractor::Histogram,
            FeatureExtractor::Haar,
        ] {
            assert_eq!(f.extract(&img, &rect).len(), f.dim());
        }
    }

    #[test]
    fn raw_features_stay_in_unit_range() {
        let img = gradient_image();
        let v = FeatureExtractor::Raw.extract(&img, &BBox::new(0.0, 0.0, 32.0, 32.0));
        assert!(v.iter().all(|&x| (0.0..=1.0).contains(&x)));
    }

    #[test]
    fn histograms_are_normalized_per_cell() {
        let img = gradient_image();
        let v = FeatureExtractor::Histogram.extract(&img, &BBox::new(2.0, 2.0, 20.0, 20.0));
        for cell in 0..5 {
            let sum: f64 = v.as_slice()[cell * HIST_BINS..(cell + 1) * HIST_BINS]
                .iter()
                .sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn haar_responses_vanish_on_flat_regions() {
        let img = Image::from_luma8(16, 16, &[128u8; 256]);
        let v = FeatureExtractor::Haar.extract(&img, &BBox::new(2.0, 2.0, 12.0, 12.0));
        assert!(v.iter().all(|&x| x.abs() < 1e-6));
    }

    #[test]
    fn identical_regions_give_identical_features() {
        let img = gradient_image();
        let a = FeatureExtractor::Raw.extract(&img, &BBox::new(4.0, 8.0, 8.0, 8.0));
        let b = FeatureExtractor::Raw.extract(&img, &BBox::new(4.0, 8.0, 8.0, 8.0));
        assert_eq!(a, b);
    }
}
