use thiserror::Error;

use crate::result::FeastInfo;

/// Unified error type for `feast` operations.
#[derive(Debug, Error)]
pub enum FeastError {
    /// Raised when the problem dimension is zero.
    #[error("problem dimension must be positive, found {n}")]
    InvalidDimension { n: usize },

    /// Raised when the subspace size is zero or exceeds the problem dimension.
    #[error("subspace size M0 must satisfy 0 < M0 <= N (M0 = {m0}, N = {n})")]
    InvalidSubspace { m0: usize, n: usize },

    /// Raised when the search interval is empty, reversed, or not finite.
    #[error("search interval requires finite Emin < Emax, found [{emin}, {emax}]")]
    InvalidInterval { emin: f64, emax: f64 },

    /// Raised when a search disk has a non-positive radius or a non-finite center.
    #[error("search disk requires a finite center and positive radius, found radius {radius}")]
    InvalidDisk { radius: f64 },

    /// Raised when the parameter array does not hold exactly 64 slots.
    #[error("parameter array must hold 64 slots, found {found}")]
    ParameterLength { found: usize },

    /// Raised when a parameter slot holds a value outside its documented range.
    #[error("parameter slot {slot} holds invalid value {value}")]
    InvalidParameter { slot: usize, value: i32 },

    /// Raised for malformed arguments that have no dedicated variant.
    #[error("invalid argument: {context}")]
    InvalidArgument { context: &'static str },

    /// Raised when provided matrices have incompatible dimensions.
    #[error("dimension mismatch in {context}: expected {expected} but found {found}")]
    DimensionMismatch {
        /// Human-readable context describing the operation.
        context: &'static str,
        /// The required dimension.
        expected: usize,
        /// The dimension that was actually supplied.
        found: usize,
    },

    /// Raised by a pencil when a shifted system cannot be factorized or solved.
    #[error("shifted system in {context} is singular")]
    SingularSystem { context: &'static str },

    /// Raised when the shifted solve at a contour node fails even after perturbing the node.
    #[error("linear solve failed at contour node {node} (shift {re} + {im}i) after perturbation")]
    LinearSolveFailed { node: usize, re: f64, im: f64 },

    /// Raised when a matrix that must be Hermitian positive definite is not.
    #[error("matrix in {context} is not positive definite")]
    NotPositiveDefinite { context: &'static str },

    /// Raised when the reduced dense eigenproblem cannot be solved.
    #[error("reduced eigenproblem failed during {context}")]
    ReducedSolveFailed { context: &'static str },

    /// Raised when more eigenvalues are found inside the region than the subspace can hold.
    #[error("found {m} eigenvalues inside the region but the subspace only holds {m0}")]
    SubspaceOverflow { m: usize, m0: usize },

    /// Raised when numerical routines produce NaN or infinity.
    #[error("encountered a non-finite value during {context}")]
    NumericalError { context: &'static str },
}

impl FeastError {
    /// Helper to format a [`DimensionMismatch`](FeastError::DimensionMismatch) error.
    pub fn dimension_mismatch(context: &'static str, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            found,
        }
    }

    /// Helper for pencils reporting a singular shifted system.
    pub fn singular(context: &'static str) -> Self {
        Self::SingularSystem { context }
    }

    /// Helper for malformed arguments.
    pub fn invalid_argument(context: &'static str) -> Self {
        Self::InvalidArgument { context }
    }

    /// Status code reported for this error.
    pub fn info(&self) -> FeastInfo {
        match self {
            Self::InvalidDimension { .. } | Self::DimensionMismatch { .. } => {
                FeastInfo::InvalidDimension
            }
            Self::InvalidSubspace { .. } => FeastInfo::InvalidSubspace,
            Self::InvalidInterval { .. } | Self::InvalidDisk { .. } => FeastInfo::InvalidRegion,
            Self::ParameterLength { .. }
            | Self::InvalidParameter { .. }
            | Self::InvalidArgument { .. } => FeastInfo::InvalidParameters,
            Self::SingularSystem { .. } | Self::LinearSolveFailed { .. } => {
                FeastInfo::LinearSolveFailed
            }
            Self::NotPositiveDefinite { .. }
            | Self::ReducedSolveFailed { .. }
            | Self::NumericalError { .. } => FeastInfo::ReducedSolveFailed,
            Self::SubspaceOverflow { .. } => FeastInfo::SubspaceOverflow,
        }
    }

    /// Whether the error was detected before any numerical work started.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self.info(),
            FeastInfo::InvalidDimension
                | FeastInfo::InvalidSubspace
                | FeastInfo::InvalidRegion
                | FeastInfo::InvalidParameters
        )
    }
}

/// Type alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, FeastError>;
