//! The annealable energy graph contract.
//!
//! An annealable graph is an energy function over positions (nodes) and
//! interacting position pairs (edges) that supports incremental state
//! substitution: the scheduler proposes one substitution at a time through
//! [`AnnealableGraph::consider_substitution`] and either promotes it with
//! [`AnnealableGraph::commit_considered_substitution`] or abandons it by
//! simply considering something else. Exactly one substitution can be under
//! consideration at a time; the consider/commit pair is an unguarded
//! two-step transaction, so a graph must never be shared between concurrent
//! schedulers.
//!
//! Local state 0 always means "unassigned". Any pairwise lookup touching an
//! unassigned endpoint contributes exactly 0 energy.

pub mod dense;

pub use dense::DensePairGraph;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("position {position} out of range (graph has {count} positions)")]
    PositionOutOfRange { position: usize, count: usize },

    #[error("state {state} out of range for position {position} ({count} candidate states)")]
    StateOutOfRange {
        position: usize,
        state: usize,
        count: usize,
    },

    #[error("edge ({a}, {b}) already exists")]
    DuplicateEdge { a: usize, b: usize },

    #[error("edge endpoints must differ (got position {0} twice)")]
    SelfEdge(usize),

    #[error("no edge between positions {a} and {b}")]
    MissingEdge { a: usize, b: usize },

    #[error("energies are declared final; tables are read-only")]
    EnergiesFinal,

    #[error("energies must be declared final before preparing for annealing")]
    EnergiesNotFinal,

    #[error("graph is not prepared for annealing")]
    NotPrepared,

    #[error("commit called with no substitution under consideration")]
    NoPendingSubstitution,

    #[error("assignment has {got} entries but the graph has {expected} positions")]
    AssignmentLength { got: usize, expected: usize },
}

/// Result of considering a single-position substitution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Substitution {
    /// Energy change the substitution would cause if committed.
    pub delta_energy: f64,
    /// The position's own one-body + incident-edge energy contribution
    /// before the change. The Metropolis test operates per position, so the
    /// scheduler needs this alongside the delta.
    pub previous_node_energy: f64,
}

/// Contract every pairwise-decomposable energy graph must satisfy for the
/// scheduler to remain representation-agnostic.
pub trait AnnealableGraph {
    fn position_count(&self) -> usize;

    /// Number of candidate states at `position` (state 0 excluded).
    fn state_count(&self, position: usize) -> usize;

    /// Currently committed state at `position` (0 when unassigned).
    fn current_state(&self, position: usize) -> usize;

    /// Finalize internal caches. Fails unless all edge energies have been
    /// declared final.
    fn prepare_for_annealing(&mut self) -> Result<(), GraphError>;

    /// Reset every position to unassigned and the running totals to zero.
    fn blanket_assign_unassigned(&mut self);

    /// Bulk-assign every position (0 entries leave a position unassigned)
    /// and return the exact recomputed total energy.
    fn set_assignment(&mut self, states: &[usize]) -> Result<f64, GraphError>;

    /// Compute, without mutating the committed assignment, the energy change
    /// of moving `position` to `new_state`.
    fn consider_substitution(
        &mut self,
        position: usize,
        new_state: usize,
    ) -> Result<Substitution, GraphError>;

    /// Promote the most recently considered substitution into the committed
    /// assignment and return the running total energy. Fails loudly when no
    /// substitution is pending: silently ignoring the call would
    /// desynchronize the energy accounting downstream.
    fn commit_considered_substitution(&mut self) -> Result<f64, GraphError>;

    /// Exact total energy of the committed assignment, recomputed from
    /// scratch (clears any accumulated drift).
    fn total_energy(&mut self) -> f64;

    fn any_position_unassigned(&self) -> bool;

    /// Advisory hint for implementations that take lower-precision delta
    /// shortcuts; exact implementations ignore it.
    fn set_errorful_delta_threshold(&mut self, _threshold: f64) {}
}
