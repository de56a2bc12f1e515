//! Partitioning of contour nodes into balanced chunks for parallel execution.

use crate::error::{FeastError, Result};

/// How node indices are dealt out to chunks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChunkPolicy {
    /// Consecutive index ranges, larger chunks first.
    #[default]
    Contiguous,
    /// Node `j` goes to chunk `j mod chunk_count`.
    RoundRobin,
}

/// Subset of contour node indices owned by one execution unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContourChunk {
    index: usize,
    nodes: Vec<usize>,
}

impl ContourChunk {
    /// Position of the chunk within its distribution.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Ascending node indices assigned to this chunk.
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Contiguous balanced partition of `0..node_count` across at most `worker_count` chunks.
///
/// When there are fewer nodes than workers every chunk holds exactly one node,
/// so no empty chunk is ever produced.
pub fn distribute(node_count: usize, worker_count: usize) -> Result<Vec<ContourChunk>> {
    distribute_with(node_count, worker_count, ChunkPolicy::Contiguous)
}

/// Balanced partition of `0..node_count` following `policy`.
pub fn distribute_with(
    node_count: usize,
    worker_count: usize,
    policy: ChunkPolicy,
) -> Result<Vec<ContourChunk>> {
    if worker_count == 0 {
        return Err(FeastError::invalid_argument("worker count must be positive"));
    }
    if node_count == 0 {
        return Err(FeastError::invalid_argument(
            "contour node count must be positive",
        ));
    }

    let chunk_count = worker_count.min(node_count);
    let base = node_count / chunk_count;
    let extra = node_count % chunk_count;

    let chunks = match policy {
        ChunkPolicy::Contiguous => {
            let mut start = 0;
            (0..chunk_count)
                .map(|index| {
                    let size = base + usize::from(index < extra);
                    let nodes = (start..start + size).collect();
                    start += size;
                    ContourChunk { index, nodes }
                })
                .collect()
        }
        ChunkPolicy::RoundRobin => (0..chunk_count)
            .map(|index| ContourChunk {
                index,
                nodes: (index..node_count).step_by(chunk_count).collect(),
            })
            .collect(),
    };
    Ok(chunks)
}
