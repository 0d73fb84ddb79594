use serde_derive::{Deserialize, Serialize};

/// Left-top-width-height bounding box in floating point image coordinates.
///
/// Candidate labels handed to the learner are expressed in the same type,
/// but relative to an anchor box: `x_min`/`y_min` then hold the translation
/// offsets and the ground label of a pattern is `(0, 0, w, h)`.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct BBox {
    pub x_min: f32,
    pub y_min: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    #[inline]
    pub fn new(x_min: f32, y_min: f32, width: f32, height: f32) -> Self {
        Self {
            x_min,
            y_min,
            width,
            height,
        }
    }

    #[inline(always)]
    pub fn x_max(&self) -> f32 {
        self.x_min + self.width
    }

    #[inline(always)]
    pub fn y_max(&self) -> f32 {
        self.y_min + self.height
    }

    #[inline(always)]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (
            self.x_min + self.width / 2.0,
            self.y_min + self.height / 2.0,
        )
    }

    /// Euclidean length of the offset stored in `x_min`/`y_min`.
    ///
    /// Meaningful for labels relative to an anchor, where it is the
    /// magnitude of the translation.
    #[inline]
    pub fn translation_len(&self) -> f32 {
        (self.x_min * self.x_min + self.y_min * self.y_min).sqrt()
    }

    #[inline]
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x_min + dx, self.y_min + dy, self.width, self.height)
    }

    /// This box re-expressed relative to `anchor`.
    #[inline]
    pub fn relative_to(&self, anchor: &BBox) -> Self {
        Self::new(
            self.x_min - anchor.x_min,
            self.y_min - anchor.y_min,
            self.width,
            self.height,
        )
    }

    pub fn is_inside(&self, outer: &BBox) -> bool {
        self.x_min >= outer.x_min
            && self.y_min >= outer.y_min
            && self.x_max() <= outer.x_max()
            && self.y_max() <= outer.y_max()
    }

    /// Intersection over union. Boxes that do not intersect, or whose
    /// union has zero area, score 0.
    pub fn overlap(&self, other: &BBox) -> f32 {
        let i_xmin = self.x_min.max(other.x_min);
        let i_xmax = self.x_max().min(other.x_max());
        let i_ymin = self.y_min.max(other.y_min);
        let i_ymax = self.y_max().min(other.y_max());

        let i_area = (i_xmax - i_xmin).max(0.0) * (i_ymax - i_ymin).max(0.0);
        let union = self.area() + other.area() - i_area;

        if union <= 0.0 {
            0.0
        } else {
            i_area / union
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_with_self_is_one() {
        let b = BBox::new(3.0, 4.0, 10.0, 20.0);
        assert_eq!(b.overlap(&b), 1.0);
    }

    #[test]
    fn overlap_is_symmetric() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.overlap(&b), b.overlap(&a));
        // 5x5 intersection over 200 - 25 union
        assert!((a.overlap(&b) - 25.0 / 175.0).abs() < 1e-6);
    }

    #[test]
    fn disjoint_boxes_do_not_overlap() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(100.0, 100.0, 10.0, 10.0);
        assert_eq!(a.overlap(&b), 0.0);
    }

    #[test]
    fn zero_area_union_scores_zero() {
        let a = BBox::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(a.overlap(&a), 0.0);
    }

    #[test]
    fn relative_to_round_trips() {
        let anchor = BBox::new(10.0, 20.0, 5.0, 5.0);
        let b = BBox::new(12.0, 18.0, 5.0, 5.0);
        let rel = b.relative_to(&anchor);
        assert_eq!(rel, BBox::new(2.0, -2.0, 5.0, 5.0));
        assert_eq!(rel.translated(anchor.x_min, anchor.y_min), b);
    }

    #[test]
    fn translation_len_of_relative_label() {
        let rel = BBox::new(3.0, 4.0, 7.0, 7.0);
        assert_eq!(rel.translation_len(), 5.0);
    }
}
