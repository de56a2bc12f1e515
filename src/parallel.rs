//! Executors running contour chunks and the state that reduces their partial moments.
//!
//! Chunks never communicate with each other; the executor returns their
//! results in chunk order and [`ParallelExecutionState::reduce`] sums every
//! node term in ascending node index. Serial runs and thread-pool runs with
//! any worker count therefore produce bit-identical moment blocks.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::distribute::ContourChunk;
use crate::error::{FeastError, Result};
use crate::moments::PartialMoment;
use crate::pencil::CMatrix;

/// Runs one task per chunk and returns the results in chunk order.
pub trait ContourExecutor: Sync {
    /// Number of chunks the executor wants per loop.
    fn worker_count(&self) -> usize;

    /// Whether tasks run on separate threads.
    fn uses_threads(&self) -> bool;

    fn execute<T, F>(&self, chunks: &[ContourChunk], task: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&ContourChunk) -> T + Sync + Send;
}

/// Runs every chunk on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialExecutor;

impl ContourExecutor for SerialExecutor {
    fn worker_count(&self) -> usize {
        1
    }

    fn uses_threads(&self) -> bool {
        false
    }

    fn execute<T, F>(&self, chunks: &[ContourChunk], task: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&ContourChunk) -> T + Sync + Send,
    {
        chunks.iter().map(task).collect()
    }
}

/// Runs chunks on a dedicated rayon pool.
#[derive(Debug)]
pub struct ThreadPoolExecutor {
    pool: ThreadPool,
}

impl ThreadPoolExecutor {
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(FeastError::invalid_argument("worker count must be positive"));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("feast-contour-{index}"))
            .build()
            .map_err(|_| FeastError::invalid_argument("failed to build contour thread pool"))?;
        Ok(Self { pool })
    }
}

impl ContourExecutor for ThreadPoolExecutor {
    fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn uses_threads(&self) -> bool {
        true
    }

    fn execute<T, F>(&self, chunks: &[ContourChunk], task: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&ContourChunk) -> T + Sync + Send,
    {
        self.pool
            .install(|| chunks.par_iter().map(|chunk| task(chunk)).collect())
    }
}

/// Partial moments of one loop, from the distributed phase up to the reduction barrier.
#[derive(Debug)]
pub struct ParallelExecutionState {
    total_nodes: usize,
    m0: usize,
    use_parallel: bool,
    use_threads: bool,
    partials: Vec<PartialMoment>,
}

impl ParallelExecutionState {
    pub fn new<E: ContourExecutor>(total_nodes: usize, m0: usize, executor: &E) -> Self {
        Self {
            total_nodes,
            m0,
            use_parallel: executor.worker_count() > 1,
            use_threads: executor.uses_threads(),
            partials: Vec::new(),
        }
    }

    pub fn total_nodes(&self) -> usize {
        self.total_nodes
    }

    pub fn use_parallel(&self) -> bool {
        self.use_parallel
    }

    pub fn use_threads(&self) -> bool {
        self.use_threads
    }

    /// Hands a finished chunk over for reduction.
    pub fn absorb(&mut self, partial: PartialMoment) {
        self.partials.push(partial);
    }

    /// Sums every node term in ascending node index into an `n × m0` block.
    ///
    /// Fails when a node is missing or was accumulated by more than one chunk.
    pub fn reduce(self, n: usize) -> Result<CMatrix> {
        let mut terms: Vec<(usize, CMatrix)> = self
            .partials
            .into_iter()
            .flat_map(PartialMoment::into_terms)
            .collect();
        terms.sort_by_key(|(node, _)| *node);

        if terms.len() != self.total_nodes
            || terms.iter().enumerate().any(|(expected, (node, _))| *node != expected)
        {
            return Err(FeastError::dimension_mismatch(
                "reduced contour nodes",
                self.total_nodes,
                terms.len(),
            ));
        }

        let mut moments = CMatrix::zeros(n, self.m0);
        for (_, term) in &terms {
            if term.shape() != (n, self.m0) {
                return Err(FeastError::dimension_mismatch(
                    "partial moment columns",
                    self.m0,
                    term.ncols(),
                ));
            }
            moments += term;
        }
        Ok(moments)
    }
}
