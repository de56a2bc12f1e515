//! Refinement loop: contour filtering, projection, and convergence control.

use log::{log, Level};
use num_complex::Complex64;

use crate::contour::{Contour, ContourBuilder, Region};
use crate::distribute::{distribute, ContourChunk};
use crate::error::{FeastError, Result};
use crate::moments::{FactorCache, MomentAccumulator};
use crate::options::{ConvergenceCriterion, FeastOptions};
use crate::parallel::{ContourExecutor, ParallelExecutionState};
use crate::pencil::{CMatrix, Pencil};
use crate::projection::SubspaceProjector;
use crate::result::{FeastInfo, FeastResult};

/// Lifecycle of one solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveState {
    Init,
    Iterating { iteration: usize },
    Converged,
    MaxIterReached,
    Failed,
}

/// Drives subspace iteration until the tolerance is met, the loop cap is hit, or a step fails.
pub struct ConvergenceController<'a, P: Pencil, E: ContourExecutor> {
    pencil: &'a P,
    region: Region,
    m0: usize,
    options: &'a FeastOptions,
    executor: &'a E,
    state: SolveState,
}

impl<'a, P: Pencil, E: ContourExecutor> ConvergenceController<'a, P, E> {
    pub fn new(
        pencil: &'a P,
        region: Region,
        m0: usize,
        options: &'a FeastOptions,
        executor: &'a E,
    ) -> Self {
        Self {
            pencil,
            region,
            m0,
            options,
            executor,
            state: SolveState::Init,
        }
    }

    pub fn state(&self) -> SolveState {
        self.state
    }

    /// Runs the refinement loop from the trial subspace `initial` (N×M0).
    pub fn run(&mut self, initial: CMatrix) -> Result<FeastResult> {
        let outcome = self.iterate(initial);
        if outcome.is_err() {
            self.state = SolveState::Failed;
        }
        outcome
    }

    fn iterate(&mut self, mut subspace: CMatrix) -> Result<FeastResult> {
        let n = self.pencil.dim();
        if subspace.shape() != (n, self.m0) {
            return Err(FeastError::dimension_mismatch(
                "initial subspace columns",
                self.m0,
                subspace.ncols(),
            ));
        }

        let options = self.options;
        let (node_count, tolerance, rule) = match self.region {
            Region::Interval { .. } => (options.node_count, options.tolerance, options.rule),
            Region::Disk { .. } => (
                options.general_node_count,
                options.general_tolerance,
                options.general_rule,
            ),
        };
        let contour =
            ContourBuilder::new(rule, options.ellipse_ratio).for_region(&self.region, node_count)?;
        let chunks = distribute(contour.len(), self.executor.worker_count())?;
        let cache = options
            .reuse_factorizations
            .then(|| FactorCache::new(contour.len()));
        let projector = SubspaceProjector::new(self.pencil, self.region);

        let level = if options.verbose {
            Level::Info
        } else {
            Level::Debug
        };
        let max_loops = options.max_loops.max(1);
        let scale = self.region.scale();
        log!(
            level,
            "FEAST search in {:?}: N = {n}, M0 = {}, {} contour nodes on {} chunk(s)",
            self.region,
            self.m0,
            contour.len(),
            chunks.len()
        );

        let mut previous_m = None;
        let mut previous_trace: Option<Complex64> = None;
        let mut iteration = 0;
        loop {
            iteration += 1;
            self.state = SolveState::Iterating { iteration };

            let rhs = self.pencil.apply_b(&subspace);
            let moments = self.accumulate(&contour, &chunks, &rhs, cache.as_ref())?;
            let ritz = projector.project(&moments)?;

            let m = ritz.count_inside();
            if m > self.m0 {
                return Err(FeastError::SubspaceOverflow { m, m0: self.m0 });
            }
            if m == 0 && iteration == 1 {
                log!(level, "no eigenvalue inside the search region");
                self.state = SolveState::Converged;
                return Ok(FeastResult::empty(n, iteration));
            }

            let (values, vectors) = ritz.retained();
            let residuals = self.residuals(&values, &vectors, scale);
            let trace: Complex64 = values.iter().sum();
            let epsilon = match options.criterion {
                ConvergenceCriterion::Residual if m > 0 => {
                    residuals.iter().copied().fold(0.0, f64::max)
                }
                ConvergenceCriterion::Residual => 1.0,
                ConvergenceCriterion::Trace => {
                    previous_trace.map_or(1.0, |previous| (trace - previous).norm() / scale)
                }
            };
            log!(level, "loop {iteration}: M = {m}, eps = {epsilon:.3e}");

            let converged = m > 0 && epsilon < tolerance && previous_m == Some(m);
            if converged || iteration >= max_loops {
                let info = if !converged {
                    FeastInfo::MaxIterationsReached
                } else if m == self.m0 && self.m0 < n {
                    FeastInfo::SubspaceTooSmall
                } else {
                    FeastInfo::Success
                };
                self.state = if converged {
                    SolveState::Converged
                } else {
                    SolveState::MaxIterReached
                };
                log!(level, "finished after {iteration} loop(s) with {info:?}");
                return Ok(FeastResult {
                    eigenvalues: values,
                    eigenvectors: vectors,
                    m,
                    residuals,
                    info,
                    tolerance: epsilon,
                    iterations: iteration,
                });
            }

            previous_m = Some(m);
            previous_trace = Some(trace);
            subspace = ritz.next_subspace();
        }
    }

    /// Distributed accumulation followed by the ordered reduction.
    fn accumulate(
        &self,
        contour: &Contour,
        chunks: &[ContourChunk],
        rhs: &CMatrix,
        cache: Option<&FactorCache<P::Factor>>,
    ) -> Result<CMatrix> {
        let accumulator = MomentAccumulator::new(self.pencil, contour, rhs, cache);
        let mut state = ParallelExecutionState::new(contour.len(), self.m0, self.executor);
        for partial in self
            .executor
            .execute(chunks, |chunk| accumulator.accumulate(chunk))
        {
            state.absorb(partial?);
        }
        state.reduce(self.pencil.dim())
    }

    /// `‖A x − λ B x‖ / (scale · ‖B x‖)` for each retained pair.
    fn residuals(&self, values: &[Complex64], vectors: &CMatrix, scale: f64) -> Vec<f64> {
        let ax = self.pencil.apply_a(vectors);
        let bx = self.pencil.apply_b(vectors);
        values
            .iter()
            .enumerate()
            .map(|(j, &lambda)| {
                let residual = (&ax.column(j) - &(bx.column(j) * lambda)).norm();
                let denominator = scale * bx.column(j).norm();
                if denominator > 0.0 {
                    residual / denominator
                } else {
                    residual
                }
            })
            .collect()
    }
}
