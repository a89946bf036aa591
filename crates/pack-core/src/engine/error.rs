use super::graph::GraphError;
use crate::core::problem::ProblemError;
use thiserror::Error;

/// A position that finished a run without an assigned state, with the
/// number of candidate states it had to choose from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnassignedPosition {
    pub position: usize,
    pub candidate_states: usize,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Problem(#[from] ProblemError),

    #[error("catalog reports {catalog} positions but the graph has {graph}")]
    CatalogMismatch { catalog: usize, graph: usize },

    #[error("proposal policy produced an invalid candidate: position {position}, state {state}")]
    InvalidProposal { position: usize, state: usize },

    #[error(
        "starting assignment has {got} entries but the problem has {expected} positions"
    )]
    StartingAssignmentLength { got: usize, expected: usize },

    #[error(
        "{} position(s) finished annealing unassigned; the assignment and its energy are meaningless",
        .positions.len()
    )]
    IncompleteAssignment { positions: Vec<UnassignedPosition> },

    #[error("failed to write trajectory record: {source}")]
    Trajectory {
        #[from]
        source: std::io::Error,
    },
}
