//! Problem definition and the top-level `feast` entry point.

use num_complex::Complex64;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

use crate::contour::Region;
use crate::error::{FeastError, Result};
use crate::options::FeastOptions;
use crate::params::{validate_disk, validate_input};
use crate::parallel::{ContourExecutor, SerialExecutor, ThreadPoolExecutor};
use crate::pencil::{CMatrix, Pencil, Symmetry};
use crate::result::FeastResult;
use crate::solving::ConvergenceController;

/// Eigenvalue search for a pencil inside one region of the complex plane.
pub struct FeastProblem<'a, P: Pencil> {
    pencil: &'a P,
    region: Region,
    m0: usize,
    options: FeastOptions,
    initial: Option<CMatrix>,
}

impl<'a, P: Pencil> FeastProblem<'a, P> {
    /// Validates the region and subspace size against the pencil.
    ///
    /// Interval searches need real eigenvalues, so they are only accepted for
    /// Hermitian pencils; use a disk for general pencils.
    pub fn new(pencil: &'a P, region: Region, m0: usize) -> Result<Self> {
        let n = pencil.dim();
        if n == 0 {
            return Err(FeastError::InvalidDimension { n });
        }
        if m0 == 0 || m0 > n {
            return Err(FeastError::InvalidSubspace { m0, n });
        }
        region.validate()?;
        if matches!(region, Region::Interval { .. }) && pencil.symmetry() == Symmetry::General {
            return Err(FeastError::invalid_argument(
                "interval search requires a Hermitian pencil",
            ));
        }
        Ok(Self {
            pencil,
            region,
            m0,
            options: FeastOptions::default(),
            initial: None,
        })
    }

    pub fn with_options(mut self, options: FeastOptions) -> Self {
        self.options = options;
        self
    }

    /// Reads options from a 64-slot parameter array, rejecting invalid slots.
    pub fn with_params(self, params: &[i32]) -> Result<Self> {
        let options = FeastOptions::from_params(params)?;
        Ok(self.with_options(options))
    }

    /// Starts the refinement from `subspace` (N×M0) instead of a random block.
    pub fn with_initial_subspace(mut self, subspace: CMatrix) -> Result<Self> {
        if subspace.nrows() != self.pencil.dim() {
            return Err(FeastError::dimension_mismatch(
                "initial subspace rows",
                self.pencil.dim(),
                subspace.nrows(),
            ));
        }
        if subspace.ncols() != self.m0 {
            return Err(FeastError::dimension_mismatch(
                "initial subspace columns",
                self.m0,
                subspace.ncols(),
            ));
        }
        self.options.use_initial_subspace = true;
        self.initial = Some(subspace);
        Ok(self)
    }

    pub fn options(&self) -> &FeastOptions {
        &self.options
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn subspace_size(&self) -> usize {
        self.m0
    }

    /// Solves with the executor implied by `worker_count`: serial for zero or
    /// one worker, a dedicated thread pool otherwise.
    pub fn solve(&self) -> Result<FeastResult> {
        match self.options.worker_count {
            0 | 1 => self.solve_with(&SerialExecutor),
            workers => self.solve_with(&ThreadPoolExecutor::new(workers)?),
        }
    }

    /// Solves with a caller-provided executor.
    pub fn solve_with<E: ContourExecutor>(&self, executor: &E) -> Result<FeastResult> {
        let initial = self.initial_subspace()?;
        ConvergenceController::new(self.pencil, self.region, self.m0, &self.options, executor)
            .run(initial)
    }

    fn initial_subspace(&self) -> Result<CMatrix> {
        match (&self.initial, self.options.use_initial_subspace) {
            (Some(subspace), _) => Ok(subspace.clone()),
            (None, true) => Err(FeastError::invalid_argument(
                "initial subspace requested but not provided",
            )),
            (None, false) => Ok(random_subspace(
                self.pencil.dim(),
                self.m0,
                self.options.seed,
            )),
        }
    }
}

/// Real Gaussian trial block of shape `n × m0`, reproducible from `seed`.
pub fn random_subspace(n: usize, m0: usize, seed: u64) -> CMatrix {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut values = Vec::with_capacity(n * m0);
    for _ in 0..(n * m0) {
        let value: f64 = StandardNormal.sample(&mut rng);
        values.push(Complex64::new(value, 0.0));
    }
    CMatrix::from_vec(n, m0, values)
}

/// Computes the eigenpairs of `pencil` inside `region`.
///
/// `params` is the 64-slot parameter array (see [`crate::params`]). Inputs are
/// validated before any numerical work; `m0` must bound the number of
/// eigenvalues in the region.
pub fn feast<P: Pencil>(
    pencil: &P,
    region: Region,
    m0: usize,
    params: &[i32],
) -> Result<FeastResult> {
    let n = pencil.dim();
    match region {
        Region::Interval { emin, emax } => validate_input(n, m0, emin, emax, params)?,
        Region::Disk { center, radius } => validate_disk(n, m0, center, radius, params)?,
    };
    FeastProblem::new(pencil, region, m0)?
        .with_params(params)?
        .solve()
}

#[cfg(test)]
mod tests {
    use nalgebra::DMatrix;

    use super::*;
    use crate::moments::tests::laplacian;
    use crate::params::{FeastParams, INITIAL_SUBSPACE, WORKER_COUNT};
    use crate::pencil::DensePencil;
    use crate::result::FeastInfo;

    #[test]
    fn random_subspace_is_reproducible() {
        let first = random_subspace(6, 3, 42);
        assert_eq!(first, random_subspace(6, 3, 42));
        assert_ne!(first, random_subspace(6, 3, 43));
        assert!(first.iter().all(|v| v.im == 0.0));
    }

    #[test]
    fn problem_rejects_bad_inputs() {
        let pencil = DensePencil::from_real(&laplacian(4)).unwrap();
        assert!(matches!(
            FeastProblem::new(&pencil, Region::interval(0.5, 3.0), 5),
            Err(FeastError::InvalidSubspace { m0: 5, n: 4 })
        ));
        assert!(matches!(
            FeastProblem::new(&pencil, Region::interval(3.0, 0.5), 2),
            Err(FeastError::InvalidInterval { .. })
        ));

        let skewed = DMatrix::from_row_slice(2, 2, &[1.0, 3.0, 0.0, 2.0]);
        let general = DensePencil::from_real(&skewed).unwrap();
        assert!(FeastProblem::new(&general, Region::interval(0.0, 3.0), 2).is_err());
        assert!(FeastProblem::new(&general, Region::disk(Complex64::new(1.5, 0.0), 1.0), 2).is_ok());
    }

    #[test]
    fn initial_subspace_flag_needs_a_block() {
        let pencil = DensePencil::from_real(&laplacian(4)).unwrap();
        let mut params = FeastParams::init();
        params.set(INITIAL_SUBSPACE, 1);
        let err = feast(&pencil, Region::interval(0.5, 3.0), 3, params.as_slice()).unwrap_err();
        assert!(matches!(err, FeastError::InvalidArgument { .. }));

        let problem = FeastProblem::new(&pencil, Region::interval(0.5, 3.0), 3).unwrap();
        assert!(problem
            .with_initial_subspace(CMatrix::zeros(4, 2))
            .is_err());
    }

    #[test]
    fn feast_finds_interior_pair() {
        let pencil = DensePencil::from_real(&laplacian(4)).unwrap();
        let mut params = FeastParams::init();
        params.set(WORKER_COUNT, 2);
        let result = feast(&pencil, Region::interval(0.5, 3.0), 3, params.as_slice()).unwrap();
        assert_eq!(result.info, FeastInfo::Success);
        assert_eq!(result.m, 2);
    }
}
