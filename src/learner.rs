use log::debug;
use nalgebra as na;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::bbox::BBox;
use crate::config::{Config, SvmVariant};
use crate::error::Error;
use crate::kernel::Kernel;
use crate::loss::{Loss, Manipulator};
use crate::store::{SupportPattern, SupportStore};

/// Number of optimize passes following each process-old step.
///
/// LaRank as published calls for a single pass; a handful of extra
/// passes tightens the dual between frames at negligible cost.
const OPTIMIZE_ITERATIONS: usize = 10;

/// Floor for the SMO denominator when a vector pair is ill-conditioned.
const CURVATURE_EPS: f64 = 1e-12;

/// Gradient gap under which an SMO step cannot make progress.
const GRADIENT_GAP_TOL: f64 = 1e-5;

/// Dual coefficients at non-ground labels within this tolerance of zero
/// retire their support vector.
const BETA_RETIRE_TOL: f64 = 1e-10;

/// Online structured-output SVM over bounding-box translations.
///
/// Candidates are scored by the kernel discriminant; each `update` folds
/// one new support pattern into the model and re-optimizes a bounded
/// number of coefficient pairs, so the model tracks appearance drift
/// without revisiting old frames.
pub struct Learner {
    store: SupportStore,
    c: f64,
    budget: usize,
    process_old_enabled: bool,
    optimize_all: bool,
    loss: Loss,
    manipulator: Manipulator,
    /// Farthest representable translation when the fuzzy variant is
    /// active.
    fuzzy_max_distance: Option<f64>,
    rng: StdRng,
}

/// Point-in-time view of the learner internals, for diagnostics and tests.
pub struct Snapshot {
    pub dual: f64,
    pub vectors: Vec<VectorInfo>,
    pub patterns: Vec<PatternInfo>,
}

pub struct VectorInfo {
    pub pattern: usize,
    pub y: usize,
    pub at_ground: bool,
    pub beta: f64,
    pub g: f64,
    pub fuzziness: f64,
}

pub struct PatternInfo {
    pub id: usize,
    pub candidates: usize,
    pub ref_count: usize,
}

impl Learner {
    pub fn new(
        config: &Config,
        kernel: Kernel,
        loss: Loss,
        manipulator: Manipulator,
    ) -> Result<Self, Error> {
        let fuzzy_max_distance = match config.svm_variant {
            SvmVariant::Standard => None,
            SvmVariant::Fuzzy => {
                // the farthest translation between pixel centres; zero for
                // frames with no room to translate in
                let w = config.frame_width.saturating_sub(1) as f64;
                let h = config.frame_height.saturating_sub(1) as f64;
                let diagonal = (w * w + h * h).sqrt();
                if diagonal <= 0.0 {
                    return Err(Error::InvalidGeometry(
                        "fuzzy scoring requires a frame with room to translate in",
                    ));
                }
                Some(diagonal)
            }
        };

        Ok(Self {
            store: SupportStore::new(kernel, config.svm_budget_size),
            c: config.svm_c,
            budget: config.svm_budget_size,
            process_old_enabled: config.process_old,
            optimize_all: config.optimize_all,
            loss,
            manipulator,
            fuzzy_max_distance,
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    /// Score a batch of (feature vector, label) pairs. Labels are
    /// translations relative to the anchor of the batch.
    pub fn eval(&self, batch: &[(na::DVector<f64>, BBox)]) -> Vec<f64> {
        batch
            .iter()
            .map(|(x, label)| self.discriminant(x) * self.fuzz_scale(label))
            .collect()
    }

    /// Fold one new support pattern into the model: `labels[y_star]` is
    /// the translation the tracker committed to.
    ///
    /// Validation happens before any mutation, so a failed call leaves
    /// the learner untouched.
    pub fn update(
        &mut self,
        features: Vec<na::DVector<f64>>,
        labels: Vec<BBox>,
        y_star: usize,
    ) -> Result<(), Error> {
        if features.is_empty() || features.len() != labels.len() {
            return Err(Error::InconsistentBatch {
                features: features.len(),
                labels: labels.len(),
            });
        }
        if y_star >= labels.len() {
            return Err(Error::InvalidIndex {
                index: y_star,
                len: labels.len(),
            });
        }

        let pattern_id = self.store.add_pattern(features, labels, y_star);
        self.process_new(pattern_id);

        if self.process_old_enabled {
            self.process_old();
            for _ in 0..OPTIMIZE_ITERATIONS {
                self.optimize();
            }
        }

        self.budget_maintenance()
    }

    #[inline]
    pub fn support_vector_count(&self) -> usize {
        self.store.vector_count()
    }

    #[inline]
    pub fn support_pattern_count(&self) -> usize {
        self.store.pattern_count()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            dual: self.compute_dual(),
            vectors: self
                .store
                .vectors()
                .iter()
                .map(|v| VectorInfo {
                    pattern: v.pattern,
                    y: v.y,
                    at_ground: v.y == self.store.pattern(v.pattern).y_star,
                    beta: v.beta,
                    g: v.g,
                    fuzziness: v.fuzziness,
                })
                .collect(),
            patterns: self
                .store
                .pattern_ids()
                .into_iter()
                .map(|id| {
                    let p = self.store.pattern(id);
                    PatternInfo {
                        id,
                        candidates: p.labels.len(),
                        ref_count: p.ref_count,
                    }
                })
                .collect(),
        }
    }

    /// The SVM dual objective,
    /// `D = -sum loss_v beta_v - 1/2 sum_vw beta_v beta_w K[v,w]`.
    pub fn compute_dual(&self) -> f64 {
        let vectors = self.store.vectors();
        let mut dual = 0.0;
        for (i, v) in vectors.iter().enumerate() {
            let pattern = self.store.pattern(v.pattern);
            dual -= self.loss_value(pattern, v.y) * v.beta;
            for (j, w) in vectors.iter().enumerate() {
                dual -= 0.5 * v.beta * w.beta * self.store.k(i, j);
            }
        }
        dual
    }

    //---------------------------------------------------------------- scoring

    /// `F(x) = sum_v beta_v K(x, x_v)`.
    ///
    /// The fuzzy attenuation is applied on top of this in `eval` only;
    /// the gradients the optimizer works with are plain SVM gradients.
    fn discriminant(&self, x: &na::DVector<f64>) -> f64 {
        let mut f = 0.0;
        for v in self.store.vectors() {
            let feat = &self.store.pattern(v.pattern).features[v.y];
            f += v.beta * self.store.kernel().eval(x, feat);
        }
        f
    }

    /// `1 - d(y) / d_max` in the fuzzy variant, 1 otherwise.
    fn fuzz_scale(&self, label: &BBox) -> f64 {
        match self.fuzzy_max_distance {
            Some(max) => 1.0 - label.translation_len() as f64 / max,
            None => 1.0,
        }
    }

    fn loss_value(&self, pattern: &SupportPattern, y: usize) -> f64 {
        let raw = self
            .loss
            .eval(&pattern.labels[pattern.y_star], &pattern.labels[y]);
        self.manipulator.eval(raw) as f64
    }

    /// Gradient a vector at `(pattern_id, y)` would carry right now:
    /// `g(y) = -loss(y_star, y) - F(x_y, y)`.
    fn candidate_gradient(&self, pattern_id: usize, y: usize) -> f64 {
        let pattern = self.store.pattern(pattern_id);
        -self.loss_value(pattern, y) - self.discriminant(&pattern.features[y])
    }

    //------------------------------------------------------------- optimizer

    /// Minimum predicted gradient over every candidate label of the
    /// pattern, existing vector or not. Lowest index wins ties.
    fn min_gradient(&self, pattern_id: usize) -> (usize, f64) {
        let candidates = self.store.pattern(pattern_id).labels.len();
        let mut best = (0, f64::INFINITY);
        for y in 0..candidates {
            let g = self.candidate_gradient(pattern_id, y);
            if g < best.1 {
                best = (y, g);
            }
        }
        best
    }

    fn find_vector(&self, pattern_id: usize, y: usize) -> Option<usize> {
        self.store
            .vectors()
            .iter()
            .position(|v| v.pattern == pattern_id && v.y == y)
    }

    fn add_support_vector(&mut self, pattern_id: usize, y: usize, g: f64) -> usize {
        let fuzziness = self.fuzz_scale(&self.store.pattern(pattern_id).labels[y]);
        self.store.add_vector(pattern_id, y, g, fuzziness)
    }

    /// Seed the freshly added pattern with its ground vector and the
    /// worst-violating candidate, then run one SMO step on the pair.
    fn process_new(&mut self, pattern_id: usize) {
        let y_star = self.store.pattern(pattern_id).y_star;
        let g_pos = self.candidate_gradient(pattern_id, y_star);
        let ip = self.add_support_vector(pattern_id, y_star, g_pos);

        let (y_min, g_min) = self.min_gradient(pattern_id);
        let ineg = self.add_support_vector(pattern_id, y_min, g_min);

        self.smo_step(ip, ineg);
    }

    /// Revisit one random pattern, allowing a new vector at the
    /// worst-violating label.
    fn process_old(&mut self) {
        let ids = self.store.pattern_ids();
        if ids.is_empty() {
            return;
        }
        let pattern_id = ids[self.rng.gen_range(0..ids.len())];
        self.reprocess(pattern_id, true);
    }

    /// Rebalance coefficients among existing vectors only.
    fn optimize(&mut self) {
        let ids = self.store.pattern_ids();
        if ids.is_empty() {
            return;
        }
        if self.optimize_all {
            for pattern_id in ids {
                self.reprocess(pattern_id, false);
            }
        } else {
            let pattern_id = ids[self.rng.gen_range(0..ids.len())];
            self.reprocess(pattern_id, false);
        }
    }

    fn reprocess(&mut self, pattern_id: usize, allow_new_vector: bool) {
        let y_star = self.store.pattern(pattern_id).y_star;

        // y+: highest gradient among vectors whose beta can still rise
        let mut ip = None;
        let mut max_g = f64::NEG_INFINITY;
        for (i, v) in self.store.vectors().iter().enumerate() {
            if v.pattern != pattern_id {
                continue;
            }
            let bound = if v.y == y_star { self.c } else { 0.0 };
            if v.beta < bound && v.g > max_g {
                ip = Some(i);
                max_g = v.g;
            }
        }
        let Some(ip) = ip else { return };

        let ineg = if allow_new_vector {
            let (y_min, g_min) = self.min_gradient(pattern_id);
            match self.find_vector(pattern_id, y_min) {
                Some(i) => i,
                None => self.add_support_vector(pattern_id, y_min, g_min),
            }
        } else {
            let mut ineg = None;
            let mut min_g = f64::INFINITY;
            for (i, v) in self.store.vectors().iter().enumerate() {
                if v.pattern == pattern_id && v.g < min_g {
                    ineg = Some(i);
                    min_g = v.g;
                }
            }
            match ineg {
                Some(i) => i,
                None => return,
            }
        };

        self.smo_step(ip, ineg);
    }

    /// One pairwise coordinate-ascent step on two vectors of the same
    /// pattern, followed by retirement of non-ground vectors whose
    /// coefficient reached zero.
    fn smo_step(&mut self, ip: usize, ineg: usize) {
        if ip == ineg {
            return;
        }
        debug_assert_eq!(
            self.store.vector(ip).pattern,
            self.store.vector(ineg).pattern
        );

        let g_pos = self.store.vector(ip).g;
        let g_neg = self.store.vector(ineg).g;

        if g_pos - g_neg >= GRADIENT_GAP_TOL {
            let mut kappa =
                self.store.k(ip, ip) + self.store.k(ineg, ineg) - 2.0 * self.store.k(ip, ineg);
            if kappa <= 0.0 {
                debug!("ill-conditioned vector pair (kappa = {kappa:.3e}), clamping");
                kappa = CURVATURE_EPS;
            }

            let pattern_id = self.store.vector(ip).pattern;
            let y_star = self.store.pattern(pattern_id).y_star;
            let vp = self.store.vector(ip);
            let head_room = if vp.y == y_star { self.c } else { 0.0 } - vp.beta;
            let lambda = ((g_pos - g_neg) / kappa).min(head_room);

            self.store.vector_mut(ip).beta += lambda;
            self.store.vector_mut(ineg).beta -= lambda;

            // the discriminant is global, so every vector sees the shift
            for i in 0..self.store.vector_count() {
                let delta = lambda * (self.store.k(i, ip) - self.store.k(i, ineg));
                self.store.vector_mut(i).g -= delta;
            }
        }

        // retire drained non-ground vectors, highest index first so the
        // swap-with-last removal cannot disturb the other candidate
        for i in [ip.max(ineg), ip.min(ineg)] {
            let v = self.store.vector(i);
            let y_star = self.store.pattern(v.pattern).y_star;
            if v.y != y_star && v.beta.abs() < BETA_RETIRE_TOL {
                self.store.remove_vector(i);
            }
        }
    }

    //---------------------------------------------------------------- budget

    fn budget_maintenance(&mut self) -> Result<(), Error> {
        if self.budget == 0 {
            return Ok(());
        }
        while self.store.vector_count() > self.budget {
            self.budget_remove()?;
        }
        Ok(())
    }

    /// Evict the support vector whose removal perturbs the discriminant
    /// least, folding its coefficient into the pattern's ground vector.
    fn budget_remove(&mut self) -> Result<(), Error> {
        let count = self.store.vector_count();
        if count == 0 {
            return Err(Error::InvalidIndex { index: 0, len: 0 });
        }

        // candidates are strictly negative vectors; the change to the
        // discriminant when merging v into its pattern's ground vector p
        // is beta^2 (K[v,v] + K[p,p] - 2 K[v,p])
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..count {
            let vi = self.store.vector(i);
            if vi.beta >= 0.0 {
                continue;
            }
            let pattern_id = vi.pattern;
            let pos = (0..count).find(|&j| {
                let vj = self.store.vector(j);
                vj.pattern == pattern_id && vj.beta > 0.0
            });
            let Some(j) = pos else { continue };

            let delta = vi.beta * vi.beta
                * (self.store.k(i, i) + self.store.k(j, j) - 2.0 * self.store.k(i, j));
            if best.map_or(true, |(_, _, d)| delta < d) {
                best = Some((i, j, delta));
            }
        }

        match best {
            Some((neg, pos, delta)) => {
                debug!("budget eviction: vector {neg}, discriminant shift {delta:.3e}");
                let removed_beta = self.store.vector(neg).beta;
                for i in 0..count {
                    let repair = removed_beta * (self.store.k(i, neg) - self.store.k(i, pos));
                    self.store.vector_mut(i).g += repair;
                }
                self.store.vector_mut(pos).beta += removed_beta;
                self.store.remove_vector(neg);
            }
            None => {
                // every coefficient is zero: evict the earliest-added vector
                let oldest = (0..count)
                    .min_by_key(|&i| self.store.vector(i).stamp)
                    .expect("non-empty store");
                debug!("budget eviction: no weighted candidate, dropping vector {oldest}");
                self.store.remove_vector(oldest);
            }
        }
        Ok(())
    }
}
