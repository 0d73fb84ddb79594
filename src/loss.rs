use crate::bbox::BBox;
use crate::error::Error;

/// Structured loss between the ground label of a pattern and a candidate.
///
/// Returns a value in `[0, 1]`; zero at the ground label itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Loss {
    /// `1 - overlap(ground, candidate)`.
    Iou,
    /// Center displacement as a fraction of `max_distance`.
    Distance { max_distance: f32 },
}

impl Loss {
    pub fn distance(max_distance: f32) -> Result<Self, Error> {
        if max_distance <= 1e-5 {
            return Err(Error::InvalidGeometry(
                "distance loss requires a positive maximum distance",
            ));
        }
        Ok(Loss::Distance { max_distance })
    }

    pub fn eval(&self, ground: &BBox, candidate: &BBox) -> f32 {
        match *self {
            Loss::Iou => 1.0 - candidate.overlap(ground),
            Loss::Distance { max_distance } => {
                let (cx, cy) = candidate.center();
                let (gx, gy) = ground.center();
                let dx = cx - gx;
                let dy = cy - gy;
                (dx * dx + dy * dy).sqrt() / max_distance
            }
        }
    }
}

/// Monotone reshaping of a loss value, `[0, 1] -> [0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Manipulator {
    Identity,
    /// `(3 - 2t) * t^2`, flat near both ends.
    SmoothStep,
}

impl Manipulator {
    #[inline]
    pub fn eval(&self, t: f32) -> f32 {
        match self {
            Manipulator::Identity => t,
            Manipulator::SmoothStep => (3.0 - 2.0 * t) * t * t,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn iou_loss_is_zero_at_ground() {
        let g = BBox::new(0.0, 0.0, 8.0, 8.0);
        assert_eq!(Loss::Iou.eval(&g, &g), 0.0);
    }

    #[test]
    fn iou_loss_is_one_for_disjoint() {
        let g = BBox::new(0.0, 0.0, 8.0, 8.0);
        let c = BBox::new(50.0, 50.0, 8.0, 8.0);
        assert_eq!(Loss::Iou.eval(&g, &c), 1.0);
    }

    #[test]
    fn distance_loss_is_zero_for_same_center() {
        let loss = Loss::distance(100.0).unwrap();
        let g = BBox::new(0.0, 0.0, 8.0, 8.0);
        let c = BBox::new(2.0, 2.0, 4.0, 4.0); // same center (4, 4)
        assert_eq!(loss.eval(&g, &c), 0.0);
    }

    #[test]
    fn distance_loss_scales_by_max_distance() {
        let loss = Loss::distance(10.0).unwrap();
        let g = BBox::new(0.0, 0.0, 8.0, 8.0);
        let c = g.translated(3.0, 4.0);
        assert_relative_eq!(loss.eval(&g, &c), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn distance_loss_rejects_degenerate_max() {
        assert!(Loss::distance(0.0).is_err());
        assert!(Loss::distance(-3.0).is_err());
    }

    #[test]
    fn smooth_step_endpoints_and_shape() {
        let m = Manipulator::SmoothStep;
        assert_eq!(m.eval(0.0), 0.0);
        assert_eq!(m.eval(1.0), 1.0);
        assert_relative_eq!(m.eval(0.5), 0.5, epsilon = 1e-6);
        assert_relative_eq!(m.eval(0.25), 0.15625, epsilon = 1e-6);
    }

    #[test]
    fn manipulators_are_monotone() {
        for m in [Manipulator::Identity, Manipulator::SmoothStep] {
            let mut prev = 0.0f32;
            for i in 0..=100 {
                let t = i as f32 / 100.0;
                let v = m.eval(t);
                assert!(v >= prev - 1e-6);
                prev = v;
            }
        }
        assert_eq!(Manipulator::Identity.eval(0.37), 0.37);
    }
}
