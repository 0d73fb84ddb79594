use log::info;
use nalgebra as na;

use crate::bbox::BBox;
use crate::config::{Config, FeatureKind, KernelKind, LossKind, ManipulatorKind};
use crate::error::Error;
use crate::features::FeatureExtractor;
use crate::image::Image;
use crate::kernel::Kernel;
use crate::learner::Learner;
use crate::loss::{Loss, Manipulator};
use crate::sampler;

const UPDATE_RINGS: usize = 5;
const UPDATE_SEGMENTS: usize = 16;

/// Per-frame control loop: score candidates around the previous box,
/// commit the best one, then teach the learner the new neighbourhood.
pub struct Tracker {
    config: Config,
    features: FeatureExtractor,
    learner: Learner,
    bb: BBox,
    initialised: bool,
}

impl Tracker {
    pub fn new(config: Config) -> Result<Self, Error> {
        let kernel = match config.kernel {
            KernelKind::Linear => Kernel::Linear,
            KernelKind::Gaussian => Kernel::gaussian(config.sigma)?,
            KernelKind::Intersection => Kernel::Intersection,
            KernelKind::Chi2 => Kernel::Chi2,
        };
        let loss = match config.loss {
            LossKind::Iou => Loss::Iou,
            LossKind::Distance => Loss::distance(config.frame_diagonal())?,
        };
        let manipulator = match config.manipulator {
            ManipulatorKind::Identity => Manipulator::Identity,
            ManipulatorKind::SmoothStep => Manipulator::SmoothStep,
        };

        let features = match config.feature {
            FeatureKind::Raw => FeatureExtractor::Raw,
            FeatureKind::Histogram => FeatureExtractor::Histogram,
            FeatureKind::Haar => FeatureExtractor::Haar,
        };

        let learner = Learner::new(&config, kernel, loss, manipulator)?;

        Ok(Self {
            config,
            features,
            learner,
            bb: BBox::new(0.0, 0.0, 0.0, 0.0),
            initialised: false,
        })
    }

    #[inline]
    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    #[inline]
    pub fn bb(&self) -> &BBox {
        &self.bb
    }

    #[inline]
    pub fn learner(&self) -> &Learner {
        &self.learner
    }

    /// Seed the learner from the user-designated box on the first frame.
    pub fn init(&mut self, frame: &Image, bb: BBox) -> Result<(), Error> {
        self.bb = bb;
        self.update_learner(frame)?;
        self.initialised = true;
        info!(
            "tracker initialised at ({}, {}) {}x{}",
            bb.x_min, bb.y_min, bb.width, bb.height
        );
        Ok(())
    }

    /// Estimate the target box in `frame` and adapt the model to it.
    pub fn track(&mut self, frame: &Image) -> Result<BBox, Error> {
        debug_assert!(self.initialised);

        let frame_rect = frame.rect();
        let candidates: Vec<BBox> = sampler::pixel_samples(&self.bb, self.config.search_radius)
            .into_iter()
            .filter(|r| r.is_inside(&frame_rect))
            .collect();

        let batch: Vec<(na::DVector<f64>, BBox)> = candidates
            .iter()
            .map(|r| (self.features.extract(frame, r), r.relative_to(&self.bb)))
            .collect();
        let scores = self.learner.eval(&batch);

        let mut best = None;
        for (i, &score) in scores.iter().enumerate() {
            match best {
                Some((_, s)) if s >= score => {}
                _ => best = Some((i, score)),
            }
        }

        if let Some((index, _)) = best {
            self.bb = candidates[index];
            self.update_learner(frame)?;
        }

        Ok(self.bb)
    }

    /// Teach the learner the neighbourhood of the committed box. The
    /// centre sample comes first, so the ground index is always 0.
    fn update_learner(&mut self, frame: &Image) -> Result<(), Error> {
        let frame_rect = frame.rect();
        let rects: Vec<BBox> = sampler::radial_samples(
            &self.bb,
            2.0 * self.config.search_radius,
            UPDATE_RINGS,
            UPDATE_SEGMENTS,
        )
        .into_iter()
        .enumerate()
        .filter(|&(i, ref r)| i == 0 || r.is_inside(&frame_rect))
        .map(|(_, r)| r)
        .collect();

        let features: Vec<na::DVector<f64>> = rects
            .iter()
            .map(|r| self.features.extract(frame, r))
            .collect();
        let labels: Vec<BBox> = rects.iter().map(|r| r.relative_to(&self.bb)).collect();

        self.learner.update(features, labels, 0)
    }
}
