use crate::bbox::BBox;
use ndarray::Array2;

/// A grayscale frame with intensities in `[0, 1]`, stored `(row, col)`.
pub struct Image {
    data: Array2<f32>,
}

impl Image {
    pub fn new(data: Array2<f32>) -> Self {
        Self { data }
    }

    /// Build from 8-bit luma samples in row-major order.
    pub fn from_luma8(width: usize, height: usize, samples: &[u8]) -> Self {
        let data = Array2::from_shape_fn((height, width), |(r, c)| {
            samples[r * width + c] as f32 / 255.0
        });
        Self { data }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Length of the frame diagonal, the largest translation the frame
    /// can express.
    #[inline]
    pub fn diagonal(&self) -> f32 {
        let w = self.width() as f32;
        let h = self.height() as f32;
        (w * w + h * h).sqrt()
    }

    /// The frame extent as a box at the origin.
    #[inline]
    pub fn rect(&self) -> BBox {
        BBox::new(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    /// Pixel intensity with the coordinates clamped to the frame.
    #[inline]
    pub fn sample(&self, x: isize, y: isize) -> f32 {
        let x = x.clamp(0, self.width() as isize - 1) as usize;
        let y = y.clamp(0, self.height() as isize - 1) as usize;
        self.data[(y, x)]
    }

    /// Nearest-neighbour resample to the given size.
    pub fn resized(&self, width: usize, height: usize) -> Image {
        let sx = self.width() as f32 / width as f32;
        let sy = self.height() as f32 / height as f32;
        let data = Array2::from_shape_fn((height, width), |(r, c)| {
            self.sample((c as f32 * sx) as isize, (r as f32 * sy) as isize)
        });
        Image::new(data)
    }

    /// Mean intensity over the axis-aligned box, sampled per pixel.
    pub fn region_mean(&self, rect: &BBox) -> f32 {
        let x0 = rect.x_min.floor() as isize;
        let y0 = rect.y_min.floor() as isize;
        let x1 = (rect.x_max().ceil() as isize).max(x0 + 1);
        let y1 = (rect.y_max().ceil() as isize).max(y0 + 1);

        let mut sum = 0.0;
        for y in y0..y1 {
            for x in x0..x1 {
                sum += self.sample(x, y);
            }
        }
        sum / ((x1 - x0) * (y1 - y0)) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_luma8_normalizes() {
        let img = Image::from_luma8(2, 2, &[0, 255, 51, 102]);
        assert_eq!(img.sample(0, 0), 0.0);
        assert_eq!(img.sample(1, 0), 1.0);
        assert_eq!(img.sample(0, 1), 0.2);
    }

    #[test]
    fn sampling_clamps_at_borders() {
        let img = Image::from_luma8(2, 1, &[0, 255]);
        assert_eq!(img.sample(-5, 0), 0.0);
        assert_eq!(img.sample(10, 3), 1.0);
    }

    #[test]
    fn diagonal_of_3_4_frame() {
        let img = Image::from_luma8(3, 4, &[0u8; 12]);
        assert_eq!(img.diagonal(), 5.0);
    }

    #[test]
    fn region_mean_of_uniform_patch() {
        let img = Image::from_luma8(4, 4, &[255u8; 16]);
        let m = img.region_mean(&BBox::new(1.0, 1.0, 2.0, 2.0));
        assert!((m - 1.0).abs() < 1e-6);
    }
}
