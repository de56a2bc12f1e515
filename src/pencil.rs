//! Matrix pencils `(A, B)` and the shifted-solve capability the solver consumes.

use nalgebra::linalg::{Cholesky, LU};
use nalgebra::{ComplexField, DMatrix, Dyn};
use num_complex::Complex64;

use crate::error::{FeastError, Result};

/// Dense complex matrix used for subspaces and moment blocks.
pub type CMatrix = DMatrix<Complex64>;

/// Relative tolerance used when detecting Hermitian structure.
const HERMITIAN_TOLERANCE: f64 = 1e-12;

/// Structure of the pencil, which selects the reduced eigensolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Symmetry {
    /// `A` Hermitian and `B` Hermitian positive definite; eigenvalues are real.
    Hermitian,
    /// No structure assumed; eigenvalues are complex.
    General,
}

/// Generalized eigenproblem `A x = λ B x` seen through the operations the solver needs.
///
/// Implementations must be shareable across contour workers: `factorize` and
/// `solve` are called concurrently for different shifts.
pub trait Pencil: Sync {
    /// Factorization of `zB − A` for one shift `z`.
    type Factor: Send + Sync;

    fn dim(&self) -> usize;

    fn symmetry(&self) -> Symmetry;

    /// Whether both `A` and `B` have only real entries.
    fn is_real(&self) -> bool;

    /// Computes `A·X`.
    fn apply_a(&self, x: &CMatrix) -> CMatrix;

    /// Computes `B·X`; the identity when the problem is standard.
    fn apply_b(&self, x: &CMatrix) -> CMatrix;

    /// Factorizes `shift·B − A`, failing with [`FeastError::SingularSystem`] for singular shifts.
    fn factorize(&self, shift: Complex64) -> Result<Self::Factor>;

    /// Solves `(shift·B − A) X = rhs` with a factorization from [`factorize`](Self::factorize).
    fn solve(&self, factor: &Self::Factor, rhs: &CMatrix) -> Result<CMatrix>;
}

/// Pencil backed by dense `nalgebra` matrices and LU factorizations.
#[derive(Clone, Debug)]
pub struct DensePencil {
    a: CMatrix,
    b: Option<CMatrix>,
    symmetry: Symmetry,
    real: bool,
}

impl DensePencil {
    /// Standard real problem `A x = λ x` with symmetry detected from `A`.
    pub fn from_real(a: &DMatrix<f64>) -> Result<Self> {
        DensePencilBuilder::from_real(a).build()
    }

    /// Generalized real problem `A x = λ B x`.
    pub fn from_real_pair(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<Self> {
        DensePencilBuilder::from_real(a).real_b(b).build()
    }

    pub fn a(&self) -> &CMatrix {
        &self.a
    }

    /// `B`, or `None` for a standard eigenproblem.
    pub fn b(&self) -> Option<&CMatrix> {
        self.b.as_ref()
    }
}

impl Pencil for DensePencil {
    type Factor = LU<Complex64, Dyn, Dyn>;

    fn dim(&self) -> usize {
        self.a.nrows()
    }

    fn symmetry(&self) -> Symmetry {
        self.symmetry
    }

    fn is_real(&self) -> bool {
        self.real
    }

    fn apply_a(&self, x: &CMatrix) -> CMatrix {
        &self.a * x
    }

    fn apply_b(&self, x: &CMatrix) -> CMatrix {
        match &self.b {
            Some(b) => b * x,
            None => x.clone(),
        }
    }

    fn factorize(&self, shift: Complex64) -> Result<Self::Factor> {
        let n = self.dim();
        let shifted = match &self.b {
            Some(b) => b * shift - &self.a,
            None => CMatrix::from_diagonal_element(n, n, shift) - &self.a,
        };
        let lu = shifted.lu();

        let pivots = lu.u().diagonal();
        let largest = pivots.iter().map(|p| p.norm()).fold(0.0, f64::max);
        let smallest = pivots.iter().map(|p| p.norm()).fold(f64::INFINITY, f64::min);
        if !(largest > 0.0) || smallest <= f64::EPSILON * n as f64 * largest {
            return Err(FeastError::singular("shifted factorization"));
        }
        Ok(lu)
    }

    fn solve(&self, factor: &Self::Factor, rhs: &CMatrix) -> Result<CMatrix> {
        if rhs.nrows() != self.dim() {
            return Err(FeastError::dimension_mismatch(
                "shifted solve rows",
                self.dim(),
                rhs.nrows(),
            ));
        }
        let solution = factor
            .solve(rhs)
            .ok_or_else(|| FeastError::singular("shifted solve"))?;
        if !solution.iter().all(|v| v.re.is_finite() && v.im.is_finite()) {
            return Err(FeastError::NumericalError {
                context: "shifted solve",
            });
        }
        Ok(solution)
    }
}

/// Builder that validates shapes and structure before constructing a [`DensePencil`].
#[derive(Debug)]
pub struct DensePencilBuilder {
    a: CMatrix,
    b: Option<CMatrix>,
    symmetry: Option<Symmetry>,
}

impl DensePencilBuilder {
    /// Start from a complex matrix `A`.
    pub fn new(a: CMatrix) -> Self {
        Self {
            a,
            b: None,
            symmetry: None,
        }
    }

    /// Start from a real matrix `A`.
    pub fn from_real(a: &DMatrix<f64>) -> Self {
        Self::new(to_complex(a))
    }

    /// Sets the right-hand matrix `B`; the identity is used when omitted.
    pub fn b(mut self, b: CMatrix) -> Self {
        self.b = Some(b);
        self
    }

    pub fn real_b(self, b: &DMatrix<f64>) -> Self {
        self.b(to_complex(b))
    }

    /// Forces the pencil structure instead of detecting it.
    pub fn symmetry(mut self, symmetry: Symmetry) -> Self {
        self.symmetry = Some(symmetry);
        self
    }

    /// Finalizes construction after validating shapes and, for Hermitian pencils, definiteness of `B`.
    pub fn build(self) -> Result<DensePencil> {
        let n = self.a.nrows();
        if n == 0 {
            return Err(FeastError::InvalidDimension { n });
        }
        if self.a.ncols() != n {
            return Err(FeastError::dimension_mismatch("A columns", n, self.a.ncols()));
        }
        if let Some(b) = &self.b {
            if b.nrows() != n {
                return Err(FeastError::dimension_mismatch("B rows", n, b.nrows()));
            }
            if b.ncols() != n {
                return Err(FeastError::dimension_mismatch("B columns", n, b.ncols()));
            }
        }
        let finite = |m: &CMatrix| m.iter().all(|v| v.re.is_finite() && v.im.is_finite());
        if !finite(&self.a) || !self.b.as_ref().map_or(true, finite) {
            return Err(FeastError::NumericalError {
                context: "pencil validation",
            });
        }

        let hermitian = is_hermitian(&self.a) && self.b.as_ref().map_or(true, is_hermitian);
        let symmetry = match self.symmetry {
            Some(Symmetry::Hermitian) if !hermitian => {
                return Err(FeastError::invalid_argument(
                    "Hermitian pencil requires Hermitian A and B",
                ));
            }
            Some(symmetry) => symmetry,
            None if hermitian => Symmetry::Hermitian,
            None => Symmetry::General,
        };
        if symmetry == Symmetry::Hermitian {
            if let Some(b) = &self.b {
                if definite_cholesky(b.clone()).is_none() {
                    return Err(FeastError::NotPositiveDefinite { context: "B" });
                }
            }
        }

        let is_real = |m: &CMatrix| m.iter().all(|v| v.im == 0.0);
        let real = is_real(&self.a) && self.b.as_ref().map_or(true, is_real);

        Ok(DensePencil {
            a: self.a,
            b: self.b,
            symmetry,
            real,
        })
    }
}

pub(crate) fn to_complex(m: &DMatrix<f64>) -> CMatrix {
    m.map(|v| Complex64::new(v, 0.0))
}

/// Cholesky factor `L` of a Hermitian positive definite matrix, or `None`.
///
/// Complex square roots never fail, so the factorization alone accepts
/// indefinite matrices; every pivot must also be real and positive.
pub(crate) fn definite_cholesky<T>(m: DMatrix<T>) -> Option<DMatrix<T>>
where
    T: ComplexField<RealField = f64>,
{
    let l = Cholesky::new(m)?.unpack();
    let definite = l.diagonal().iter().all(|pivot| {
        let re = pivot.clone().real();
        re > 0.0 && pivot.clone().imaginary().abs() <= f64::EPSILON.sqrt() * re
    });
    definite.then_some(l)
}

fn is_hermitian(m: &CMatrix) -> bool {
    let scale = m.iter().map(|v| v.norm()).fold(1.0, f64::max);
    let n = m.nrows();
    (0..n).all(|i| {
        (0..=i).all(|j| (m[(i, j)] - m[(j, i)].conj()).norm() <= HERMITIAN_TOLERANCE * scale)
    })
}
