use crate::bbox::BBox;
use crate::kernel::Kernel;
use nalgebra as na;

/// One observed frame neighbourhood: candidate labels, their feature
/// vectors, and the index of the label the tracker committed to.
pub struct SupportPattern {
    pub features: Vec<na::DVector<f64>>,
    pub labels: Vec<BBox>,
    pub y_star: usize,
    pub ref_count: usize,
}

/// A dual coefficient attached to one (pattern, label) pair.
pub struct SupportVector {
    pub pattern: usize,
    pub y: usize,
    pub beta: f64,
    pub g: f64,
    /// 1.0 outside the fuzzy variant.
    pub fuzziness: f64,
    /// Creation order; survives the swap-with-last removals that
    /// reshuffle indices.
    pub stamp: u64,
}

/// Owns patterns and vectors, and keeps the kernel values between every
/// pair of support vectors cached in a symmetric matrix.
///
/// Patterns live in a slab so their ids stay stable while vectors are
/// swapped and removed. A pattern is destroyed as soon as its last
/// referring vector goes away.
pub struct SupportStore {
    patterns: Vec<Option<SupportPattern>>,
    free_slots: Vec<usize>,
    vectors: Vec<SupportVector>,
    kernel: Kernel,
    cache: na::DMatrix<f64>,
    next_stamp: u64,
}

impl SupportStore {
    pub fn new(kernel: Kernel, budget: usize) -> Self {
        // A budgeted run holds at most budget + 2 vectors between
        // maintenance passes.
        let capacity = if budget > 0 { budget + 2 } else { 0 };
        Self {
            patterns: Vec::new(),
            free_slots: Vec::new(),
            vectors: Vec::new(),
            kernel,
            cache: na::DMatrix::zeros(capacity, capacity),
            next_stamp: 0,
        }
    }

    #[inline]
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    #[inline]
    pub fn vectors(&self) -> &[SupportVector] {
        &self.vectors
    }

    #[inline]
    pub fn vector(&self, index: usize) -> &SupportVector {
        &self.vectors[index]
    }

    #[inline]
    pub fn vector_mut(&mut self, index: usize) -> &mut SupportVector {
        &mut self.vectors[index]
    }

    #[inline]
    pub fn vector_count(&self) -> usize {
        self.vectors.len()
    }

    #[inline]
    pub fn pattern(&self, id: usize) -> &SupportPattern {
        self.patterns[id].as_ref().expect("stale pattern id")
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len() - self.free_slots.len()
    }

    /// Occupied pattern slots in ascending order.
    pub fn pattern_ids(&self) -> Vec<usize> {
        self.patterns
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|_| id))
            .collect()
    }

    /// Cached kernel value between support vectors `i` and `j`.
    #[inline]
    pub fn k(&self, i: usize, j: usize) -> f64 {
        self.cache[(i, j)]
    }

    pub fn add_pattern(
        &mut self,
        features: Vec<na::DVector<f64>>,
        labels: Vec<BBox>,
        y_star: usize,
    ) -> usize {
        let pattern = SupportPattern {
            features,
            labels,
            y_star,
            ref_count: 0,
        };
        match self.free_slots.pop() {
            Some(slot) => {
                self.patterns[slot] = Some(pattern);
                slot
            }
            None => {
                self.patterns.push(Some(pattern));
                self.patterns.len() - 1
            }
        }
    }

    /// Create a vector with `beta = 0` and the supplied gradient, growing
    /// the kernel cache by one row and column.
    pub fn add_vector(&mut self, pattern_id: usize, y: usize, g: f64, fuzziness: f64) -> usize {
        let index = self.vectors.len();
        if index >= self.cache.nrows() {
            let grown = (index + 1).next_power_of_two().max(8);
            let cache = std::mem::replace(&mut self.cache, na::DMatrix::zeros(0, 0));
            self.cache = cache.resize(grown, grown, 0.0);
        }

        // kernel column against every existing vector, then the diagonal
        let mut column = Vec::with_capacity(index + 1);
        {
            let new_feat = &self.patterns[pattern_id]
                .as_ref()
                .expect("stale pattern id")
                .features[y];
            for v in &self.vectors {
                let feat = &self.patterns[v.pattern]
                    .as_ref()
                    .expect("stale pattern id")
                    .features[v.y];
                column.push(self.kernel.eval(feat, new_feat));
            }
            column.push(self.kernel.eval_self(new_feat));
        }
        for (i, value) in column.into_iter().enumerate() {
            self.cache[(i, index)] = value;
            self.cache[(index, i)] = value;
        }

        self.vectors.push(SupportVector {
            pattern: pattern_id,
            y,
            beta: 0.0,
            g,
            fuzziness,
            stamp: self.next_stamp,
        });
        self.next_stamp += 1;
        self.patterns[pattern_id]
            .as_mut()
            .expect("stale pattern id")
            .ref_count += 1;

        index
    }

    /// Remove the vector at `index` by swapping it with the last one.
    /// When its pattern's reference count hits zero the pattern slot is
    /// vacated as well.
    pub fn remove_vector(&mut self, index: usize) {
        let last = self.vectors.len() - 1;
        if index != last {
            self.swap_vectors(index, last);
        }

        let removed = self.vectors.pop().expect("remove from empty store");
        let pattern = self.patterns[removed.pattern]
            .as_mut()
            .expect("stale pattern id");
        pattern.ref_count -= 1;
        if pattern.ref_count == 0 {
            self.patterns[removed.pattern] = None;
            self.free_slots.push(removed.pattern);
        }
    }

    pub fn swap_vectors(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.vectors.swap(a, b);
        self.cache.swap_rows(a, b);
        self.cache.swap_columns(a, b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    fn feature(v: f64) -> DVector<f64> {
        DVector::from_row_slice(&[v, 2.0 * v])
    }

    fn label() -> BBox {
        BBox::new(0.0, 0.0, 4.0, 4.0)
    }

    fn store_with_pattern() -> (SupportStore, usize) {
        let mut store = SupportStore::new(Kernel::Linear, 0);
        let id = store.add_pattern(vec![feature(0.2), feature(0.8)], vec![label(), label()], 0);
        (store, id)
    }

    #[test]
    fn add_vector_tracks_ref_count() {
        let (mut store, id) = store_with_pattern();
        store.add_vector(id, 0, 0.0, 1.0);
        store.add_vector(id, 1, -1.0, 1.0);
        assert_eq!(store.pattern(id).ref_count, 2);
        assert_eq!(store.vector_count(), 2);
    }

    #[test]
    fn cache_is_symmetric_and_consistent() {
        let (mut store, id) = store_with_pattern();
        let a = store.add_vector(id, 0, 0.0, 1.0);
        let b = store.add_vector(id, 1, -1.0, 1.0);
        assert_eq!(store.k(a, b), store.k(b, a));
        let expect = Kernel::Linear.eval(&feature(0.2), &feature(0.8));
        assert_eq!(store.k(a, b), expect);
        assert_eq!(store.k(a, a), Kernel::Linear.eval_self(&feature(0.2)));
    }

    #[test]
    fn removing_last_reference_drops_pattern() {
        let (mut store, id) = store_with_pattern();
        store.add_vector(id, 0, 0.0, 1.0);
        store.add_vector(id, 1, -1.0, 1.0);
        store.remove_vector(1);
        assert_eq!(store.pattern_count(), 1);
        store.remove_vector(0);
        assert_eq!(store.pattern_count(), 0);
        assert_eq!(store.vector_count(), 0);
    }

    #[test]
    fn pattern_slots_are_reused() {
        let (mut store, id) = store_with_pattern();
        store.add_vector(id, 0, 0.0, 1.0);
        store.remove_vector(0);
        let id2 = store.add_pattern(vec![feature(0.5)], vec![label()], 0);
        assert_eq!(id, id2);
    }

    #[test]
    fn swap_keeps_cache_aligned_with_vectors() {
        let (mut store, id) = store_with_pattern();
        let a = store.add_vector(id, 0, 0.0, 1.0);
        let b = store.add_vector(id, 1, -1.0, 1.0);
        let kaa = store.k(a, a);
        let kbb = store.k(b, b);
        store.swap_vectors(a, b);
        assert_eq!(store.k(a, a), kbb);
        assert_eq!(store.k(b, b), kaa);
        assert_eq!(store.vector(a).y, 1);
    }
}
