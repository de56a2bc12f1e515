//! Per-node shifted solves and weighted accumulation of the projected subspace.
//!
//! For every node `(z, w)` of a chunk the accumulator solves
//! `(zB − A) X = B·Y` and stores `w·X`. Terms stay keyed by node index so
//! the reduction can sum them in ascending node order, independent of how
//! nodes were split across workers.

use std::sync::OnceLock;

use num_complex::Complex64;

use crate::contour::Contour;
use crate::distribute::ContourChunk;
use crate::error::{FeastError, Result};
use crate::pencil::{CMatrix, Pencil};

/// Shifted factorizations kept between refinement loops, one slot per shift.
///
/// Interval contours on complex Hermitian pencils factorize both `z` and `z̄`,
/// so the cache holds two slots per node.
#[derive(Debug)]
pub struct FactorCache<F> {
    slots: Vec<OnceLock<F>>,
}

impl<F> FactorCache<F> {
    pub fn new(node_count: usize) -> Self {
        Self {
            slots: (0..2 * node_count).map(|_| OnceLock::new()).collect(),
        }
    }

    fn get(&self, slot: usize) -> Option<&F> {
        self.slots.get(slot).and_then(OnceLock::get)
    }

    fn store(&self, slot: usize, factor: F) {
        if let Some(cell) = self.slots.get(slot) {
            // Each slot is only ever written by the chunk owning its node.
            let _ = cell.set(factor);
        }
    }

    /// Number of shifts currently factorized.
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|cell| cell.get().is_some()).count()
    }
}

/// Weighted solution blocks produced by one chunk, awaiting reduction.
#[derive(Clone, Debug)]
pub struct PartialMoment {
    chunk: usize,
    terms: Vec<(usize, CMatrix)>,
}

impl PartialMoment {
    pub fn new(chunk: usize) -> Self {
        Self {
            chunk,
            terms: Vec::new(),
        }
    }

    pub fn chunk_index(&self) -> usize {
        self.chunk
    }

    /// Node indices contributed by this chunk, in insertion order.
    pub fn node_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.terms.iter().map(|(node, _)| *node)
    }

    pub(crate) fn push(&mut self, node: usize, term: CMatrix) {
        self.terms.push((node, term));
    }

    pub(crate) fn into_terms(self) -> Vec<(usize, CMatrix)> {
        self.terms
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// Every contour node is stored explicitly.
    Full,
    /// Half contour on a real pencil: the conjugate node contributes the complex conjugate.
    RealHalf,
    /// Half contour on a complex Hermitian pencil: the conjugate node needs its own solve.
    ConjugateHalf,
}

/// Per-chunk kernel computing the weighted shifted solves for the trial subspace.
pub struct MomentAccumulator<'a, P: Pencil> {
    pencil: &'a P,
    contour: &'a Contour,
    rhs: &'a CMatrix,
    cache: Option<&'a FactorCache<P::Factor>>,
    mode: Mode,
}

impl<'a, P: Pencil> MomentAccumulator<'a, P> {
    /// `rhs` is `B·Y` for the current trial subspace `Y`. Half contours on
    /// real pencils only fold conjugate nodes when `rhs` is real as well.
    pub fn new(
        pencil: &'a P,
        contour: &'a Contour,
        rhs: &'a CMatrix,
        cache: Option<&'a FactorCache<P::Factor>>,
    ) -> Self {
        let real_rhs = rhs.iter().all(|v| v.im == 0.0);
        let mode = match (contour.is_half(), pencil.is_real() && real_rhs) {
            (false, _) => Mode::Full,
            (true, true) => Mode::RealHalf,
            (true, false) => Mode::ConjugateHalf,
        };
        Self {
            pencil,
            contour,
            rhs,
            cache,
            mode,
        }
    }

    /// Accumulates the weighted solves for every node of `chunk`, in ascending node order.
    pub fn accumulate(&self, chunk: &ContourChunk) -> Result<PartialMoment> {
        let mut partial = PartialMoment::new(chunk.index());
        for &node in chunk.nodes() {
            if node >= self.contour.len() {
                return Err(FeastError::dimension_mismatch(
                    "contour node index",
                    self.contour.len(),
                    node,
                ));
            }
            partial.push(node, self.node_term(node)?);
        }
        Ok(partial)
    }

    fn node_term(&self, node: usize) -> Result<CMatrix> {
        let weight = self.contour.weights()[node];
        let upper = self.solve_node(node, false)? * weight;
        match self.mode {
            Mode::Full => Ok(upper),
            Mode::RealHalf => Ok(upper.map(|v| Complex64::new(2.0 * v.re, 0.0))),
            Mode::ConjugateHalf => Ok(upper + self.solve_node(node, true)? * weight.conj()),
        }
    }

    fn solve_node(&self, node: usize, conjugate: bool) -> Result<CMatrix> {
        let slot = 2 * node + usize::from(conjugate);
        if let Some(factor) = self.cache.and_then(|cache| cache.get(slot)) {
            if let Ok(solution) = self.pencil.solve(factor, self.rhs) {
                return Ok(solution);
            }
        }

        let orient = |z: Complex64| if conjugate { z.conj() } else { z };
        let shift = orient(self.contour.nodes()[node]);
        let (factor, solution) = match self.attempt(shift) {
            Ok(found) => found,
            Err(err) => {
                let perturbed = orient(self.contour.perturbed_node(node));
                log::warn!("contour node {node} at {shift}: {err}; retrying at {perturbed}");
                self.attempt(perturbed)
                    .map_err(|_| FeastError::LinearSolveFailed {
                        node,
                        re: shift.re,
                        im: shift.im,
                    })?
            }
        };
        if let Some(cache) = self.cache {
            cache.store(slot, factor);
        }
        Ok(solution)
    }

    fn attempt(&self, shift: Complex64) -> Result<(P::Factor, CMatrix)> {
        let factor = self.pencil.factorize(shift)?;
        let solution = self.pencil.solve(&factor, self.rhs)?;
        Ok((factor, solution))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    use super::*;
    use crate::contour::{build_general_contour, build_real_contour};
    use crate::distribute::distribute;
    use crate::pencil::DensePencil;

    pub(crate) fn laplacian(n: usize) -> DMatrix<f64> {
        DMatrix::from_fn(n, n, |i, j| match i.abs_diff(j) {
            0 => 2.0,
            1 => -1.0,
            _ => 0.0,
        })
    }

    /// Dense pencil whose factorization fails for selected shifts.
    pub(crate) struct FlakyPencil {
        pub inner: DensePencil,
        /// Remaining number of failures to inject.
        pub failures: Mutex<usize>,
    }

    impl Pencil for FlakyPencil {
        type Factor = <DensePencil as Pencil>::Factor;

        fn dim(&self) -> usize {
            self.inner.dim()
        }
        fn symmetry(&self) -> crate::pencil::Symmetry {
            self.inner.symmetry()
        }
        fn is_real(&self) -> bool {
            self.inner.is_real()
        }
        fn apply_a(&self, x: &CMatrix) -> CMatrix {
            self.inner.apply_a(x)
        }
        fn apply_b(&self, x: &CMatrix) -> CMatrix {
            self.inner.apply_b(x)
        }
        fn factorize(&self, shift: Complex64) -> Result<Self::Factor> {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(FeastError::singular("injected failure"));
            }
            self.inner.factorize(shift)
        }
        fn solve(&self, factor: &Self::Factor, rhs: &CMatrix) -> Result<CMatrix> {
            self.inner.solve(factor, rhs)
        }
    }

    fn identity_rhs(n: usize) -> CMatrix {
        CMatrix::identity(n, n)
    }

    #[test]
    fn full_sum_reproduces_the_spectral_projector() {
        // Eigenvalues 1, 2, 3, 4; the disk around 2.5 of radius 1 holds 2 and 3.
        let a = DMatrix::from_diagonal(&nalgebra::DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]));
        let pencil = DensePencil::from_real(&a).unwrap();
        let contour = build_general_contour(Complex64::new(2.5, 0.0), 1.0, 32).unwrap();
        let rhs = identity_rhs(4);
        let accumulator = MomentAccumulator::new(&pencil, &contour, &rhs, None);

        let chunk = &distribute(contour.len(), 1).unwrap()[0];
        let partial = accumulator.accumulate(chunk).unwrap();
        assert_eq!(partial.node_indices().count(), 32);
        let projector = partial
            .into_terms()
            .into_iter()
            .fold(CMatrix::zeros(4, 4), |acc, (_, term)| acc + term);

        let expected = [0.0, 1.0, 1.0, 0.0];
        for (i, value) in expected.iter().enumerate() {
            assert_relative_eq!(projector[(i, i)].re, *value, epsilon = 1e-5);
        }
    }

    #[test]
    fn real_half_contour_gives_real_moments() {
        let pencil = DensePencil::from_real(&laplacian(4)).unwrap();
        let contour = build_real_contour(0.5, 3.0, 8).unwrap();
        let rhs = identity_rhs(4);
        let accumulator = MomentAccumulator::new(&pencil, &contour, &rhs, None);
        let partial = accumulator
            .accumulate(&distribute(8, 1).unwrap()[0])
            .unwrap();
        for (_, term) in partial.into_terms() {
            assert!(term.iter().all(|v| v.im == 0.0));
        }
    }

    #[test]
    fn cache_is_filled_once_and_reused() {
        let pencil = DensePencil::from_real(&laplacian(5)).unwrap();
        let contour = build_real_contour(0.5, 2.5, 6).unwrap();
        let rhs = identity_rhs(5);
        let cache = FactorCache::new(contour.len());
        let accumulator = MomentAccumulator::new(&pencil, &contour, &rhs, Some(&cache));
        let chunks = distribute(6, 2).unwrap();

        let first = accumulator.accumulate(&chunks[0]).unwrap();
        assert_eq!(cache.filled(), 3);
        let second = accumulator.accumulate(&chunks[0]).unwrap();
        assert_eq!(cache.filled(), 3);
        for ((_, a), (_, b)) in first.into_terms().iter().zip(second.into_terms().iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn singular_node_is_retried_once_then_fails() {
        let contour = build_real_contour(0.5, 2.5, 4).unwrap();
        let rhs = identity_rhs(4);
        let chunk = &distribute(4, 1).unwrap()[0];

        let recovering = FlakyPencil {
            inner: DensePencil::from_real(&laplacian(4)).unwrap(),
            failures: Mutex::new(1),
        };
        let accumulator = MomentAccumulator::new(&recovering, &contour, &rhs, None);
        assert!(accumulator.accumulate(chunk).is_ok());

        let broken = FlakyPencil {
            inner: DensePencil::from_real(&laplacian(4)).unwrap(),
            failures: Mutex::new(2),
        };
        let accumulator = MomentAccumulator::new(&broken, &contour, &rhs, None);
        assert!(matches!(
            accumulator.accumulate(chunk),
            Err(FeastError::LinearSolveFailed { node: 0, .. })
        ));
    }
}
