//! Substitution proposal policies.
//!
//! The scheduler never draws randomness for proposals itself: it asks a
//! [`ProposalPolicy`] for the next candidate substitution. Policies are
//! seedable so a run is reproducible end to end. A policy may return `None`
//! as a sentinel to skip one inner-loop iteration.

use crate::core::catalog::StateCatalog;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// A proposed substitution: move `position` to local state `state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proposal {
    pub position: usize,
    pub state: usize,
}

pub trait ProposalPolicy {
    /// Produce the next candidate substitution, or `None` to skip this
    /// iteration. `current` is the working assignment (one state per
    /// position, 0 = unassigned); policies may ignore it.
    fn propose(&mut self, catalog: &dyn StateCatalog, current: &[usize]) -> Option<Proposal>;
}

/// Uniform proposals over the *global* state numbering.
///
/// Drawing a uniform global id (rather than a uniform position) weights
/// positions by their candidate count, so state-rich positions are visited
/// proportionally more often.
#[derive(Debug)]
pub struct UniformStateProposal {
    rng: StdRng,
}

impl UniformStateProposal {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl ProposalPolicy for UniformStateProposal {
    fn propose(&mut self, catalog: &dyn StateCatalog, _current: &[usize]) -> Option<Proposal> {
        let total = catalog.total_state_count();
        if total == 0 {
            return None;
        }
        let global_id = self.rng.gen_range(0..total);
        Some(Proposal {
            position: catalog.position_for_global(global_id),
            state: catalog.local_state_for_global(global_id),
        })
    }
}

/// Decorator biasing flagged positions towards their designated null state.
///
/// For a flagged position with `K` candidate states, the inner policy's
/// proposal is overridden to the last state (the null state) with
/// probability `(K/2 - 1) / K`. Positions with fewer than three states are
/// never overridden by this formula.
pub struct NullStateBias<P> {
    inner: P,
    flagged: HashSet<usize>,
    rng: StdRng,
}

impl<P> NullStateBias<P> {
    pub fn new(inner: P, flagged_positions: impl IntoIterator<Item = usize>, seed: u64) -> Self {
        Self {
            inner,
            flagged: flagged_positions.into_iter().collect(),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<P: ProposalPolicy> ProposalPolicy for NullStateBias<P> {
    fn propose(&mut self, catalog: &dyn StateCatalog, current: &[usize]) -> Option<Proposal> {
        let mut proposal = self.inner.propose(catalog, current)?;
        if self.flagged.contains(&proposal.position) {
            let count = catalog.state_count(proposal.position);
            let threshold = (count as f64 / 2.0 - 1.0) / count as f64;
            if self.rng.r#gen::<f64>() < threshold {
                proposal.state = count;
            }
        }
        Some(proposal)
    }
}
