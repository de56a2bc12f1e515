//! Status codes and the immutable outcome of a FEAST solve.

use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Closed set of status codes reported by a solve.
///
/// Codes 1 to 4 describe rejected input, 5 to 7 are non-fatal outcomes
/// carried by a [`FeastResult`], and 8 to 10 are numerical failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeastInfo {
    Success,
    InvalidDimension,
    InvalidSubspace,
    InvalidRegion,
    InvalidParameters,
    /// The search region contains no eigenvalue.
    NoEigenvaluesFound,
    /// The loop cap was reached before the tolerance was met.
    MaxIterationsReached,
    /// Every Ritz value landed inside the region; M0 may be too small to hold them all.
    SubspaceTooSmall,
    LinearSolveFailed,
    ReducedSolveFailed,
    SubspaceOverflow,
}

impl FeastInfo {
    /// Integer code of this status.
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::InvalidDimension => 1,
            Self::InvalidSubspace => 2,
            Self::InvalidRegion => 3,
            Self::InvalidParameters => 4,
            Self::NoEigenvaluesFound => 5,
            Self::MaxIterationsReached => 6,
            Self::SubspaceTooSmall => 7,
            Self::LinearSolveFailed => 8,
            Self::ReducedSolveFailed => 9,
            Self::SubspaceOverflow => 10,
        }
    }

    /// Whether the code signals a failure rather than a (possibly partial) result.
    pub fn is_error(self) -> bool {
        !matches!(
            self,
            Self::Success
                | Self::NoEigenvaluesFound
                | Self::MaxIterationsReached
                | Self::SubspaceTooSmall
        )
    }
}

/// Eigenpairs found inside the search region together with solve diagnostics.
#[derive(Clone, Debug, Serialize)]
pub struct FeastResult {
    /// Eigenvalues inside the region in ascending order (real part, then imaginary part).
    pub eigenvalues: Vec<Complex64>,
    /// Eigenvectors stored column-wise (N×M).
    pub eigenvectors: DMatrix<Complex64>,
    /// Number of eigenpairs found.
    pub m: usize,
    /// Normalized residual of each eigenpair.
    pub residuals: Vec<f64>,
    /// Status of the solve.
    pub info: FeastInfo,
    /// Achieved value of the convergence measure in the last loop.
    pub tolerance: f64,
    /// Number of refinement loops performed.
    pub iterations: usize,
}

impl FeastResult {
    pub(crate) fn empty(n: usize, iterations: usize) -> Self {
        Self {
            eigenvalues: Vec::new(),
            eigenvectors: DMatrix::zeros(n, 0),
            m: 0,
            residuals: Vec::new(),
            info: FeastInfo::NoEigenvaluesFound,
            tolerance: 0.0,
            iterations,
        }
    }

    /// Real parts of the eigenvalues, the natural view for Hermitian problems.
    pub fn real_eigenvalues(&self) -> Vec<f64> {
        self.eigenvalues.iter().map(|value| value.re).collect()
    }

    /// Largest residual among the returned eigenpairs (zero when M = 0).
    pub fn max_residual(&self) -> f64 {
        self.residuals.iter().copied().fold(0.0, f64::max)
    }

    /// Whether the solve met its tolerance.
    pub fn converged(&self) -> bool {
        matches!(self.info, FeastInfo::Success | FeastInfo::SubspaceTooSmall)
    }
}
