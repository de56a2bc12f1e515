//! Named solver configuration built once per solve from the 64-slot parameter array.

use serde::{Deserialize, Serialize};

use crate::error::{FeastError, Result};
use crate::params::{self, FeastParams, PARAM_COUNT};

/// Quadrature rule used to place nodes along the contour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuadratureRule {
    /// Gauss–Legendre nodes and weights on the contour parameter.
    GaussLegendre,
    /// Equally spaced midpoints with equal weights.
    Trapezoidal,
}

impl QuadratureRule {
    fn from_slot(value: i32) -> Self {
        if value == 0 {
            Self::GaussLegendre
        } else {
            Self::Trapezoidal
        }
    }

    fn to_slot(self) -> i32 {
        match self {
            Self::GaussLegendre => 0,
            Self::Trapezoidal => 1,
        }
    }
}

/// Quantity compared against the tolerance at the end of every loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceCriterion {
    /// Relative change of the sum of the eigenvalues inside the region.
    Trace,
    /// Largest normalized eigenpair residual.
    Residual,
}

/// Immutable configuration for one solve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeastOptions {
    /// Log loop progress at `info` rather than `debug`.
    pub verbose: bool,
    /// Nodes on the upper half contour for interval searches.
    pub node_count: usize,
    /// Nodes on the full contour for disk searches.
    pub general_node_count: usize,
    /// Stopping tolerance for interval searches.
    pub tolerance: f64,
    /// Stopping tolerance for disk searches.
    pub general_tolerance: f64,
    /// Maximum number of refinement loops (at least one loop always runs).
    pub max_loops: usize,
    /// Start from the caller's subspace instead of a random one.
    pub use_initial_subspace: bool,
    /// Quantity compared against the tolerance after each loop.
    pub criterion: ConvergenceCriterion,
    /// Number of contour workers; 0 and 1 run serially.
    pub worker_count: usize,
    /// Keep shifted factorizations between loops.
    pub reuse_factorizations: bool,
    /// Quadrature rule for interval searches.
    pub rule: QuadratureRule,
    /// Quadrature rule for disk searches.
    pub general_rule: QuadratureRule,
    /// Minor/major axis ratio of the interval ellipse.
    pub ellipse_ratio: f64,
    /// Seed of the random initial subspace.
    pub seed: u64,
}

impl Default for FeastOptions {
    fn default() -> Self {
        Self::from_feast_params(&FeastParams::init())
    }
}

impl FeastOptions {
    /// Builds options from a parameter array, rejecting any out-of-range slot.
    pub fn from_params(values: &[i32]) -> Result<Self> {
        if values.len() != PARAM_COUNT {
            return Err(FeastError::ParameterLength {
                found: values.len(),
            });
        }
        for (slot, &value) in values.iter().enumerate() {
            if !params::slot_is_valid(slot, value) {
                return Err(FeastError::InvalidParameter { slot, value });
            }
        }
        let params = FeastParams::from_slice(values)?;
        Ok(Self::from_feast_params(&params))
    }

    fn from_feast_params(params: &FeastParams) -> Self {
        let exponent = |slot| 10f64.powi(-params.get(slot));
        Self {
            verbose: params.get(params::PRINT_LEVEL) == 1,
            node_count: params.get(params::NODE_COUNT).max(1) as usize,
            general_node_count: params.get(params::GENERAL_NODE_COUNT).max(1) as usize,
            tolerance: exponent(params::TOLERANCE_EXPONENT),
            general_tolerance: exponent(params::GENERAL_TOLERANCE_EXPONENT),
            max_loops: params.get(params::MAX_LOOPS).max(0) as usize,
            use_initial_subspace: params.get(params::INITIAL_SUBSPACE) == 1,
            criterion: if params.get(params::CONVERGENCE_CRITERION) == 0 {
                ConvergenceCriterion::Trace
            } else {
                ConvergenceCriterion::Residual
            },
            worker_count: params.get(params::WORKER_COUNT).max(0) as usize,
            reuse_factorizations: params.get(params::SOLVER_VARIANT) == 1,
            rule: QuadratureRule::from_slot(params.get(params::QUADRATURE_RULE)),
            general_rule: QuadratureRule::from_slot(params.get(params::GENERAL_QUADRATURE_RULE)),
            ellipse_ratio: f64::from(params.get(params::ELLIPSE_RATIO)) / 100.0,
            seed: 1234,
        }
    }

    /// Writes the options back into the 64-slot form.
    ///
    /// Tolerances are rounded to the nearest power of ten and the seed is not represented.
    pub fn to_params(&self) -> FeastParams {
        let exponent = |tolerance: f64| (-tolerance.log10()).round().clamp(1.0, 16.0) as i32;
        let mut params = FeastParams::init();
        params
            .set(params::PRINT_LEVEL, i32::from(self.verbose))
            .set(params::NODE_COUNT, self.node_count as i32)
            .set(params::GENERAL_NODE_COUNT, self.general_node_count as i32)
            .set(params::TOLERANCE_EXPONENT, exponent(self.tolerance))
            .set(
                params::GENERAL_TOLERANCE_EXPONENT,
                exponent(self.general_tolerance),
            )
            .set(params::MAX_LOOPS, self.max_loops as i32)
            .set(params::INITIAL_SUBSPACE, i32::from(self.use_initial_subspace))
            .set(
                params::CONVERGENCE_CRITERION,
                match self.criterion {
                    ConvergenceCriterion::Trace => 0,
                    ConvergenceCriterion::Residual => 1,
                },
            )
            .set(params::WORKER_COUNT, self.worker_count as i32)
            .set(params::SOLVER_VARIANT, i32::from(self.reuse_factorizations))
            .set(params::QUADRATURE_RULE, self.rule.to_slot())
            .set(params::GENERAL_QUADRATURE_RULE, self.general_rule.to_slot())
            .set(
                params::ELLIPSE_RATIO,
                (self.ellipse_ratio * 100.0).round().clamp(1.0, 100.0) as i32,
            );
        params
    }

    /// Override the interval-search node count.
    pub fn with_node_count(mut self, node_count: usize) -> Self {
        self.node_count = node_count.max(1);
        self
    }

    /// Override the disk-search node count.
    pub fn with_general_node_count(mut self, node_count: usize) -> Self {
        self.general_node_count = node_count.max(1);
        self
    }

    /// Set the stopping tolerance for both interval and disk searches.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self.general_tolerance = tolerance;
        self
    }

    /// Cap the number of refinement loops; zero still runs one loop.
    pub fn with_max_loops(mut self, max_loops: usize) -> Self {
        self.max_loops = max_loops;
        self
    }

    /// Choose between the residual and trace convergence measures.
    pub fn with_criterion(mut self, criterion: ConvergenceCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Run contour nodes on a pool of `worker_count` threads.
    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Keep shifted factorizations between loops instead of refactoring every loop.
    pub fn with_factorization_reuse(mut self, reuse: bool) -> Self {
        self.reuse_factorizations = reuse;
        self
    }

    /// Set the quadrature rule for both interval and disk searches.
    pub fn with_rule(mut self, rule: QuadratureRule) -> Self {
        self.rule = rule;
        self.general_rule = rule;
        self
    }

    /// Set the minor/major axis ratio of the interval ellipse.
    pub fn with_ellipse_ratio(mut self, ratio: f64) -> Self {
        self.ellipse_ratio = ratio;
        self
    }

    /// Seed the random initial subspace.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Log loop progress at `info` instead of `debug`.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
