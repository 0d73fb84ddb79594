use crate::error::Error;
use nalgebra as na;

/// Kernel function over feature vectors.
///
/// Every variant is symmetric with `K(x, x) >= 0`; the learner relies on
/// both properties when it caches kernel values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Kernel {
    Linear,
    Gaussian { sigma: f64 },
    Intersection,
    Chi2,
}

impl Kernel {
    pub fn gaussian(sigma: f64) -> Result<Self, Error> {
        if sigma <= 0.0 {
            return Err(Error::InvalidGeometry("gaussian kernel requires sigma > 0"));
        }
        Ok(Kernel::Gaussian { sigma })
    }

    pub fn eval(&self, a: &na::DVector<f64>, b: &na::DVector<f64>) -> f64 {
        match *self {
            Kernel::Linear => a.dot(b),
            Kernel::Gaussian { sigma } => {
                let d2 = (a - b).norm_squared();
                (-d2 / (2.0 * sigma * sigma)).exp()
            }
            Kernel::Intersection => a.iter().zip(b.iter()).map(|(x, y)| x.min(*y)).sum(),
            Kernel::Chi2 => a
                .iter()
                .zip(b.iter())
                .filter(|(x, y)| **x + **y > 0.0)
                .map(|(x, y)| 2.0 * x * y / (x + y))
                .sum(),
        }
    }

    /// `K(x, x)` without materializing a second argument.
    pub fn eval_self(&self, a: &na::DVector<f64>) -> f64 {
        match *self {
            Kernel::Linear => a.norm_squared(),
            Kernel::Gaussian { .. } => 1.0,
            Kernel::Intersection | Kernel::Chi2 => a.iter().sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    fn v(s: &[f64]) -> DVector<f64> {
        DVector::from_row_slice(s)
    }

    #[test]
    fn kernels_are_symmetric() {
        let a = v(&[0.2, 0.5, 0.1]);
        let b = v(&[0.4, 0.0, 0.3]);
        for k in [
            Kernel::Linear,
            Kernel::Gaussian { sigma: 0.7 },
            Kernel::Intersection,
            Kernel::Chi2,
        ] {
            assert_relative_eq!(k.eval(&a, &b), k.eval(&b, &a), epsilon = 1e-12);
        }
    }

    #[test]
    fn eval_self_matches_eval() {
        let a = v(&[0.2, 0.5, 0.1]);
        for k in [
            Kernel::Linear,
            Kernel::Gaussian { sigma: 0.7 },
            Kernel::Intersection,
            Kernel::Chi2,
        ] {
            assert_relative_eq!(k.eval_self(&a), k.eval(&a, &a), epsilon = 1e-12);
        }
    }

    #[test]
    fn gaussian_rejects_bad_sigma() {
        assert!(Kernel::gaussian(0.0).is_err());
        assert!(Kernel::gaussian(-1.0).is_err());
        assert!(Kernel::gaussian(1.0).is_ok());
    }

    #[test]
    fn gaussian_peaks_at_identity() {
        let k = Kernel::Gaussian { sigma: 1.0 };
        let a = v(&[1.0, 2.0]);
        let b = v(&[1.5, 2.0]);
        assert_relative_eq!(k.eval(&a, &a), 1.0, epsilon = 1e-12);
        assert_relative_eq!(k.eval(&a, &b), (-0.125f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn chi2_skips_empty_bins() {
        let k = Kernel::Chi2;
        let a = v(&[0.0, 0.5]);
        let b = v(&[0.0, 0.5]);
        assert_relative_eq!(k.eval(&a, &b), 0.5, epsilon = 1e-12);
    }
}
