//! Rayleigh–Ritz projection of the pencil onto the filtered subspace.

use nalgebra::linalg::{Schur, SymmetricEigen, QR};
use nalgebra::{ComplexField, DMatrix};
use num_complex::Complex64;

use crate::contour::Region;
use crate::error::{FeastError, Result};
use crate::pencil::{definite_cholesky, to_complex, CMatrix, Pencil, Symmetry};

/// Iteration cap for the reduced Schur decomposition.
const SCHUR_MAX_ITERATIONS: usize = 10_000;

/// Approximate eigenpairs of the reduced problem, back-transformed to full length.
#[derive(Clone, Debug)]
pub struct RitzPairs {
    /// All M0 Ritz values, ascending by real part then imaginary part.
    pub values: Vec<Complex64>,
    /// Ritz vectors (N×M0), column `j` paired with `values[j]`.
    pub vectors: CMatrix,
    /// Whether each Ritz value lies inside the search region.
    pub inside: Vec<bool>,
}

impl RitzPairs {
    /// Number of Ritz values inside the region.
    pub fn count_inside(&self) -> usize {
        self.inside.iter().filter(|flag| **flag).count()
    }

    /// Ritz pairs inside the region; spurious pairs outside are dropped.
    pub fn retained(&self) -> (Vec<Complex64>, CMatrix) {
        let keep: Vec<usize> = (0..self.values.len()).filter(|&j| self.inside[j]).collect();
        let values = keep.iter().map(|&j| self.values[j]).collect();
        (values, self.vectors.select_columns(keep.iter()))
    }

    /// Trial block for the next loop: every Ritz vector, those inside the region first.
    ///
    /// The orthonormalization of the next moment block is unpivoted, so the
    /// strongly filtered directions must lead.
    pub fn next_subspace(&self) -> CMatrix {
        let order: Vec<usize> = (0..self.values.len())
            .filter(|&j| self.inside[j])
            .chain((0..self.values.len()).filter(|&j| !self.inside[j]))
            .collect();
        self.vectors.select_columns(order.iter())
    }
}

/// Reduces the accumulated moments to a small dense eigenproblem and filters its solutions.
pub struct SubspaceProjector<'a, P: Pencil> {
    pencil: &'a P,
    region: Region,
}

impl<'a, P: Pencil> SubspaceProjector<'a, P> {
    pub fn new(pencil: &'a P, region: Region) -> Self {
        Self { pencil, region }
    }

    /// Projects `A` and `B` onto the span of `moments` and solves the reduced problem.
    pub fn project(&self, moments: &CMatrix) -> Result<RitzPairs> {
        if moments.nrows() != self.pencil.dim() {
            return Err(FeastError::dimension_mismatch(
                "moment rows",
                self.pencil.dim(),
                moments.nrows(),
            ));
        }
        let real_moments = moments.iter().all(|v| v.im == 0.0);
        let (values, vectors) = match self.pencil.symmetry() {
            Symmetry::Hermitian if self.pencil.is_real() && real_moments => {
                self.project_real(moments)?
            }
            Symmetry::Hermitian => self.project_hermitian(moments)?,
            Symmetry::General => self.project_general(moments)?,
        };

        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&i, &j| {
            values[i]
                .re
                .total_cmp(&values[j].re)
                .then(values[i].im.total_cmp(&values[j].im))
        });
        let values: Vec<Complex64> = order.iter().map(|&j| values[j]).collect();
        let vectors = vectors.select_columns(order.iter());
        let inside = values.iter().map(|v| self.region.contains(*v)).collect();

        Ok(RitzPairs {
            values,
            vectors,
            inside,
        })
    }

    /// Real symmetric pencil with real moments: the whole reduction stays in `f64`,
    /// so the next trial subspace is real as well.
    fn project_real(&self, moments: &CMatrix) -> Result<(Vec<Complex64>, CMatrix)> {
        let q = orthonormalize(moments.map(|v| v.re));
        let qc = to_complex(&q);
        let aq = (qc.adjoint() * self.pencil.apply_a(&qc)).map(|v| v.re);
        let bq = (qc.adjoint() * self.pencil.apply_b(&qc)).map(|v| v.re);
        let (values, reduced) = hermitian_reduced(aq, bq)?;
        Ok((
            values.into_iter().map(|v| Complex64::new(v, 0.0)).collect(),
            to_complex(&(q * reduced)),
        ))
    }

    fn project_hermitian(&self, moments: &CMatrix) -> Result<(Vec<Complex64>, CMatrix)> {
        let q = orthonormalize(moments.clone());
        let aq = q.adjoint() * self.pencil.apply_a(&q);
        let bq = q.adjoint() * self.pencil.apply_b(&q);
        let (values, reduced) = hermitian_reduced(aq, bq)?;
        Ok((
            values.into_iter().map(|v| Complex64::new(v, 0.0)).collect(),
            q * reduced,
        ))
    }

    fn project_general(&self, moments: &CMatrix) -> Result<(Vec<Complex64>, CMatrix)> {
        let q = orthonormalize(moments.clone());
        let aq = q.adjoint() * self.pencil.apply_a(&q);
        let bq = q.adjoint() * self.pencil.apply_b(&q);
        let reduced = bq.lu().solve(&aq).ok_or(FeastError::ReducedSolveFailed {
            context: "reduced B solve",
        })?;
        let schur = Schur::try_new(reduced, f64::EPSILON, SCHUR_MAX_ITERATIONS).ok_or(
            FeastError::ReducedSolveFailed {
                context: "reduced Schur decomposition",
            },
        )?;
        let (basis, triangle) = schur.unpack();
        let (values, local) = triangular_eigenvectors(&triangle);
        let mut vectors = q * (basis * local);
        for mut column in vectors.column_iter_mut() {
            column.normalize_mut();
        }
        Ok((values, vectors))
    }
}

/// Orthonormal basis of the column span (thin QR).
fn orthonormalize<T: ComplexField>(block: DMatrix<T>) -> DMatrix<T> {
    QR::new(block).q()
}

/// Solves the Hermitian-definite reduced problem `Aq v = λ Bq v`.
///
/// Returns eigenvalues and `Bq`-orthonormal eigenvectors.
fn hermitian_reduced<T>(aq: DMatrix<T>, bq: DMatrix<T>) -> Result<(Vec<f64>, DMatrix<T>)>
where
    T: ComplexField<RealField = f64>,
{
    let half = T::from_real(0.5);
    let aq = (&aq + aq.adjoint()) * half.clone();
    let bq = (&bq + bq.adjoint()) * half.clone();

    let l = definite_cholesky(bq).ok_or(FeastError::NotPositiveDefinite {
        context: "reduced B",
    })?;
    let failed = |context: &'static str| FeastError::ReducedSolveFailed { context };

    // L⁻¹ Aq L⁻ᴴ, computed as (L⁻¹ (L⁻¹ Aq)ᴴ)ᴴ.
    let left = l
        .solve_lower_triangular(&aq)
        .ok_or_else(|| failed("reduced triangular solve"))?;
    let standard = l
        .solve_lower_triangular(&left.adjoint())
        .ok_or_else(|| failed("reduced triangular solve"))?
        .adjoint();
    let standard = (&standard + standard.adjoint()) * half;

    let eigen = SymmetricEigen::try_new(standard, f64::EPSILON, 0)
        .ok_or_else(|| failed("reduced symmetric eigensolve"))?;
    let vectors = l
        .adjoint()
        .solve_upper_triangular(&eigen.eigenvectors)
        .ok_or_else(|| failed("reduced back-transformation"))?;
    Ok((eigen.eigenvalues.iter().copied().collect(), vectors))
}

/// Eigenvalues and eigenvectors of an upper triangular matrix by back-substitution.
fn triangular_eigenvectors(t: &CMatrix) -> (Vec<Complex64>, CMatrix) {
    let m = t.nrows();
    let values: Vec<Complex64> = (0..m).map(|k| t[(k, k)]).collect();
    let scale = t.iter().map(|v| v.norm()).fold(f64::MIN_POSITIVE, f64::max);
    // Keeps repeated eigenvalues from dividing by zero.
    let floor = f64::EPSILON * scale;

    let mut vectors = CMatrix::zeros(m, m);
    for k in 0..m {
        vectors[(k, k)] = Complex64::new(1.0, 0.0);
        for i in (0..k).rev() {
            let sum: Complex64 = (i + 1..=k).map(|j| t[(i, j)] * vectors[(j, k)]).sum();
            let mut denominator = t[(i, i)] - values[k];
            if denominator.norm() < floor {
                denominator = Complex64::new(floor, 0.0);
            }
            vectors[(i, k)] = -sum / denominator;
        }
    }
    (values, vectors)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    use super::*;
    use crate::moments::tests::laplacian;
    use crate::pencil::{DensePencil, DensePencilBuilder};

    fn identity(n: usize) -> CMatrix {
        CMatrix::identity(n, n)
    }

    #[test]
    fn full_subspace_recovers_exact_spectrum() {
        let pencil = DensePencil::from_real(&laplacian(4)).unwrap();
        let projector = SubspaceProjector::new(&pencil, Region::interval(0.5, 3.0));
        let ritz = projector.project(&identity(4)).unwrap();

        let expected: Vec<f64> = (1..=4)
            .map(|k| 2.0 - 2.0 * (k as f64 * std::f64::consts::PI / 5.0).cos())
            .collect();
        for (value, exact) in ritz.values.iter().zip(&expected) {
            assert_relative_eq!(value.re, *exact, epsilon = 1e-12);
        }
        assert_eq!(ritz.inside, vec![false, true, true, false]);
        assert_eq!(ritz.count_inside(), 2);

        let (values, vectors) = ritz.retained();
        assert_eq!(values.len(), 2);
        assert_eq!(vectors.shape(), (4, 2));
        assert!(vectors.iter().all(|v| v.im == 0.0));
    }

    #[test]
    fn next_subspace_leads_with_retained_vectors() {
        let pencil = DensePencil::from_real(&laplacian(4)).unwrap();
        let projector = SubspaceProjector::new(&pencil, Region::interval(0.5, 2.5));
        let ritz = projector.project(&identity(4)).unwrap();
        assert_eq!(ritz.inside, vec![false, true, false, false]);

        let next = ritz.next_subspace();
        assert_eq!(next.column(0), ritz.vectors.column(1));
        assert_eq!(next.column(1), ritz.vectors.column(0));
        assert_eq!(next.column(2), ritz.vectors.column(2));
        assert_eq!(next.column(3), ritz.vectors.column(3));
    }

    #[test]
    fn indefinite_reduced_b_is_rejected() {
        let aq = CMatrix::identity(2, 2);
        let bq = CMatrix::from_diagonal_element(2, 2, Complex64::new(-1.0, 0.0));
        assert!(matches!(
            hermitian_reduced(aq, bq),
            Err(FeastError::NotPositiveDefinite { context: "reduced B" })
        ));
    }

    #[test]
    fn generalized_problem_scales_eigenvalues() {
        let a = laplacian(3);
        let b = nalgebra::DMatrix::from_diagonal_element(3, 3, 2.0);
        let pencil = DensePencil::from_real_pair(&a, &b).unwrap();
        let projector = SubspaceProjector::new(&pencil, Region::interval(0.0, 2.0));
        let ritz = projector.project(&identity(3)).unwrap();
        let sqrt2 = 2f64.sqrt();
        let expected = [(2.0 - sqrt2) / 2.0, 1.0, (2.0 + sqrt2) / 2.0];
        for (value, exact) in ritz.values.iter().zip(expected) {
            assert_relative_eq!(value.re, exact, epsilon = 1e-12);
        }
        // Eigenvectors come back B-orthonormal.
        let x = &ritz.vectors;
        let gram = x.adjoint() * pencil.apply_b(x);
        assert_relative_eq!(gram[(0, 0)].re, 1.0, epsilon = 1e-12);
        assert!(gram[(0, 1)].norm() < 1e-12);
    }

    #[test]
    fn complex_hermitian_pencil_has_real_ritz_values() {
        let i = Complex64::new(0.0, 1.0);
        let two = Complex64::new(2.0, 0.0);
        let a = CMatrix::from_row_slice(2, 2, &[two, i, -i, two]);
        let pencil = DensePencilBuilder::new(a).build().unwrap();
        let projector = SubspaceProjector::new(&pencil, Region::interval(0.0, 2.0));
        let ritz = projector.project(&identity(2)).unwrap();
        assert_relative_eq!(ritz.values[0].re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(ritz.values[1].re, 3.0, epsilon = 1e-12);
        assert_eq!(ritz.inside, vec![true, false]);
    }

    #[test]
    fn general_pencil_uses_schur_form() {
        let mut a = nalgebra::DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]));
        for k in 0..3 {
            a[(k, k + 1)] = 0.5;
        }
        let pencil = DensePencil::from_real(&a).unwrap();
        assert_eq!(pencil.symmetry(), Symmetry::General);
        let projector = SubspaceProjector::new(&pencil, Region::disk(Complex64::new(2.5, 0.0), 1.0));
        let ritz = projector.project(&identity(4)).unwrap();

        for (value, exact) in ritz.values.iter().zip([1.0, 2.0, 3.0, 4.0]) {
            assert_relative_eq!(value.re, exact, epsilon = 1e-10);
            assert!(value.im.abs() < 1e-10);
        }
        assert_eq!(ritz.count_inside(), 2);

        let x = &ritz.vectors;
        let lambda = CMatrix::from_diagonal(&DVector::from_vec(ritz.values.clone()));
        let residual = pencil.apply_a(x) - x * lambda;
        assert!(residual.norm() < 1e-9);
    }

    #[test]
    fn triangular_back_substitution_gives_eigenvectors() {
        let c = |re: f64, im: f64| Complex64::new(re, im);
        let t = CMatrix::from_row_slice(
            3,
            3,
            &[
                c(1.0, 1.0),
                c(2.0, 0.0),
                c(0.5, -1.0),
                c(0.0, 0.0),
                c(3.0, 0.0),
                c(1.0, 1.0),
                c(0.0, 0.0),
                c(0.0, 0.0),
                c(-1.0, 2.0),
            ],
        );
        let (values, vectors) = triangular_eigenvectors(&t);
        for k in 0..3 {
            let v = vectors.column(k);
            let residual = &t * v - v * values[k];
            assert!(residual.norm() < 1e-12);
        }
    }
}
