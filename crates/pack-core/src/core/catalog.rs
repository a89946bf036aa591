//! Candidate-state catalogs.
//!
//! A catalog enumerates, for each position, its candidate states and assigns
//! every (position, local state) pair a stable global id. Local states are
//! numbered `1..=K` within a position; local state 0 is the "unassigned"
//! sentinel and never has a global id. Global ids are dense and zero-based,
//! so they double as indices into per-state statistics arrays.

/// Read-only enumeration of candidate states over all positions.
///
/// Implementations must keep the numbering stable for the lifetime of an
/// optimization problem: the engine caches global ids across the whole run.
pub trait StateCatalog {
    /// Number of assignable positions.
    fn position_count(&self) -> usize;

    /// Number of candidate states at `position`. May be zero for a position
    /// that has nothing to offer; such positions can never be assigned and
    /// are reported as a fatal configuration error at the end of a run.
    fn state_count(&self, position: usize) -> usize;

    /// Total number of candidate states across all positions.
    fn total_state_count(&self) -> usize;

    /// Global id for local state `state` (1-based) at `position`.
    fn global_id(&self, position: usize, state: usize) -> usize;

    /// Position owning `global_id`.
    fn position_for_global(&self, global_id: usize) -> usize;

    /// Local state (1-based) within its position for `global_id`.
    fn local_state_for_global(&self, global_id: usize) -> usize;
}

/// Offset-table catalog over densely numbered positions.
///
/// Global ids are laid out position-major: position 0's states come first,
/// then position 1's, and so on.
#[derive(Debug, Clone)]
pub struct DenseStateCatalog {
    counts: Vec<usize>,
    offsets: Vec<usize>,
    total: usize,
}

impl DenseStateCatalog {
    pub fn new(state_counts: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(state_counts.len());
        let mut total = 0;
        for &count in state_counts {
            offsets.push(total);
            total += count;
        }
        Self {
            counts: state_counts.to_vec(),
            offsets,
            total,
        }
    }
}

impl StateCatalog for DenseStateCatalog {
    fn position_count(&self) -> usize {
        self.counts.len()
    }

    fn state_count(&self, position: usize) -> usize {
        self.counts[position]
    }

    fn total_state_count(&self) -> usize {
        self.total
    }

    fn global_id(&self, position: usize, state: usize) -> usize {
        debug_assert!(state >= 1 && state <= self.counts[position]);
        self.offsets[position] + (state - 1)
    }

    fn position_for_global(&self, global_id: usize) -> usize {
        debug_assert!(global_id < self.total);
        // First position whose offset lies beyond the id, minus one.
        self.offsets.partition_point(|&off| off <= global_id) - 1
    }

    fn local_state_for_global(&self, global_id: usize) -> usize {
        let position = self.position_for_global(global_id);
        global_id - self.offsets[position] + 1
    }
}
