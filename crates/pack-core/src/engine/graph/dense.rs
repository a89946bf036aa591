//! Dense pairwise energy graph.
//!
//! Stores one one-body energy vector per node and a complete `K_a x K_b`
//! pairwise table per edge. Positions typically carry tens to low hundreds
//! of candidate states and only a handful of neighbors, so the dense tables
//! are memory-cheap and keep the substitution hot path a strided array walk
//! over the incident edges. Per-node caches (current state, current pair
//! energies, node total, neighbors' current states) make
//! `consider_substitution` and `commit_considered_substitution` O(degree).
//!
//! Incremental floating-point updates accumulate error, so the graph forces
//! a from-scratch recomputation of every cache and the running total after
//! [`COMMITS_BETWEEN_REFRESH`] commits. This bounds drift to a constant
//! regardless of run length.

use super::{AnnealableGraph, GraphError, Substitution};
use std::collections::HashMap;
use tracing::trace;

/// Commits tolerated between full cache recomputations.
pub const COMMITS_BETWEEN_REFRESH: usize = 1024;

#[derive(Debug, Clone)]
struct IncidentEdge {
    edge_id: usize,
    neighbor: usize,
    /// Table stride for this node's state, precomputed per orientation so
    /// the lookup below needs no branching on endpoint order.
    stride_self: usize,
    stride_neighbor: usize,
    /// Index of the reciprocal entry in the neighbor's incident list.
    reciprocal_index: usize,
}

impl IncidentEdge {
    #[inline]
    fn energy(&self, table: &[f64], state_self: usize, state_neighbor: usize) -> f64 {
        if state_self == 0 || state_neighbor == 0 {
            return 0.0;
        }
        table[(state_self - 1) * self.stride_self + (state_neighbor - 1) * self.stride_neighbor]
    }
}

#[derive(Debug, Clone)]
struct Node {
    one_body: Vec<f64>,

    incident: Vec<IncidentEdge>,
    neighbor_states: Vec<usize>,

    current_state: usize,
    curr_one_body: f64,
    curr_total: f64,
    curr_two_body: Vec<f64>,

    alt_state: usize,
    alt_one_body: f64,
    alt_total: f64,
    alt_two_body: Vec<f64>,
    considering: bool,
}

impl Node {
    fn new(state_count: usize) -> Self {
        Self {
            one_body: vec![0.0; state_count],
            incident: Vec::new(),
            neighbor_states: Vec::new(),
            current_state: 0,
            curr_one_body: 0.0,
            curr_total: 0.0,
            curr_two_body: Vec::new(),
            alt_state: 0,
            alt_one_body: 0.0,
            alt_total: 0.0,
            alt_two_body: Vec::new(),
            considering: false,
        }
    }
}

#[derive(Debug, Clone)]
struct Edge {
    a: usize,
    b: usize,
    states_b: usize,
    /// Dense table, `a`-major: entry for `(sa, sb)` sits at
    /// `(sa - 1) * states_b + (sb - 1)`.
    table: Vec<f64>,
    curr_energy: f64,
}

/// Concrete [`AnnealableGraph`] over dense pairwise tables.
///
/// Lifecycle: construct with per-position state counts, populate energies,
/// call [`declare_energies_final`](Self::declare_energies_final), then
/// [`prepare_for_annealing`](AnnealableGraph::prepare_for_annealing). Tables
/// are read-only from finalization onward.
#[derive(Debug, Clone)]
pub struct DensePairGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    edge_index: HashMap<(usize, usize), usize>,
    energies_final: bool,
    prepared: bool,
    considering: Option<usize>,
    total_current: f64,
    total_alternate: f64,
    commits_since_refresh: usize,
}

impl DensePairGraph {
    pub fn new(state_counts: &[usize]) -> Self {
        Self {
            nodes: state_counts.iter().map(|&k| Node::new(k)).collect(),
            edges: Vec::new(),
            edge_index: HashMap::new(),
            energies_final: false,
            prepared: false,
            considering: None,
            total_current: 0.0,
            total_alternate: 0.0,
            commits_since_refresh: 0,
        }
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn set_one_body_energy(
        &mut self,
        position: usize,
        state: usize,
        energy: f64,
    ) -> Result<(), GraphError> {
        self.ensure_mutable()?;
        self.check_state(position, state)?;
        self.nodes[position].one_body[state - 1] = energy;
        Ok(())
    }

    pub fn add_to_one_body_energy(
        &mut self,
        position: usize,
        state: usize,
        energy: f64,
    ) -> Result<(), GraphError> {
        self.ensure_mutable()?;
        self.check_state(position, state)?;
        self.nodes[position].one_body[state - 1] += energy;
        Ok(())
    }

    pub fn one_body_energy(&self, position: usize, state: usize) -> f64 {
        if state == 0 {
            return 0.0;
        }
        self.nodes[position].one_body[state - 1]
    }

    /// Declare positions `p` and `q` as interacting, allocating their dense
    /// pairwise table. Edges are created once; re-adding a pair is an error.
    pub fn add_edge(&mut self, p: usize, q: usize) -> Result<(), GraphError> {
        self.ensure_mutable()?;
        self.check_position(p)?;
        self.check_position(q)?;
        if p == q {
            return Err(GraphError::SelfEdge(p));
        }

        let (a, b) = (p.min(q), p.max(q));
        if self.edge_index.contains_key(&(a, b)) {
            return Err(GraphError::DuplicateEdge { a, b });
        }

        let states_a = self.nodes[a].one_body.len();
        let states_b = self.nodes[b].one_body.len();
        self.edge_index.insert((a, b), self.edges.len());
        self.edges.push(Edge {
            a,
            b,
            states_b,
            table: vec![0.0; states_a * states_b],
            curr_energy: 0.0,
        });
        Ok(())
    }

    pub fn set_two_body_energy(
        &mut self,
        p: usize,
        q: usize,
        state_p: usize,
        state_q: usize,
        energy: f64,
    ) -> Result<(), GraphError> {
        self.ensure_mutable()?;
        let index = self.two_body_index(p, q, state_p, state_q)?;
        let edge_id = self.edge_id(p, q)?;
        self.edges[edge_id].table[index] = energy;
        Ok(())
    }

    pub fn add_to_two_body_energy(
        &mut self,
        p: usize,
        q: usize,
        state_p: usize,
        state_q: usize,
        energy: f64,
    ) -> Result<(), GraphError> {
        self.ensure_mutable()?;
        let index = self.two_body_index(p, q, state_p, state_q)?;
        let edge_id = self.edge_id(p, q)?;
        self.edges[edge_id].table[index] += energy;
        Ok(())
    }

    /// Pairwise energy between `state_p` at `p` and `state_q` at `q`. An
    /// unassigned endpoint (state 0) contributes exactly 0.
    pub fn two_body_energy(
        &self,
        p: usize,
        q: usize,
        state_p: usize,
        state_q: usize,
    ) -> Result<f64, GraphError> {
        if state_p == 0 || state_q == 0 {
            return Ok(0.0);
        }
        let index = self.two_body_index(p, q, state_p, state_q)?;
        let edge_id = self.edge_id(p, q)?;
        Ok(self.edges[edge_id].table[index])
    }

    /// Freeze all energy tables. Mutation afterwards is an error; annealing
    /// preparation requires it.
    pub fn declare_energies_final(&mut self) {
        self.energies_final = true;
    }

    fn ensure_mutable(&self) -> Result<(), GraphError> {
        if self.energies_final {
            return Err(GraphError::EnergiesFinal);
        }
        Ok(())
    }

    fn check_position(&self, position: usize) -> Result<(), GraphError> {
        if position >= self.nodes.len() {
            return Err(GraphError::PositionOutOfRange {
                position,
                count: self.nodes.len(),
            });
        }
        Ok(())
    }

    fn check_state(&self, position: usize, state: usize) -> Result<(), GraphError> {
        self.check_position(position)?;
        let count = self.nodes[position].one_body.len();
        if state == 0 || state > count {
            return Err(GraphError::StateOutOfRange {
                position,
                state,
                count,
            });
        }
        Ok(())
    }

    fn edge_id(&self, p: usize, q: usize) -> Result<usize, GraphError> {
        let key = (p.min(q), p.max(q));
        self.edge_index
            .get(&key)
            .copied()
            .ok_or(GraphError::MissingEdge { a: key.0, b: key.1 })
    }

    fn two_body_index(
        &self,
        p: usize,
        q: usize,
        state_p: usize,
        state_q: usize,
    ) -> Result<usize, GraphError> {
        self.check_state(p, state_p)?;
        self.check_state(q, state_q)?;
        let edge_id = self.edge_id(p, q)?;
        let edge = &self.edges[edge_id];
        let (sa, sb) = if p == edge.a {
            (state_p, state_q)
        } else {
            (state_q, state_p)
        };
        Ok((sa - 1) * edge.states_b + (sb - 1))
    }

    /// Rebuild every per-node cache, edge energy, and the running total from
    /// the committed states alone. Clears accumulated drift.
    fn refresh_from_scratch(&mut self) {
        let states: Vec<usize> = self.nodes.iter().map(|n| n.current_state).collect();

        let mut total = 0.0;
        for node in self.nodes.iter_mut() {
            let state = node.current_state;
            node.curr_one_body = if state == 0 {
                0.0
            } else {
                node.one_body[state - 1]
            };
            let mut node_total = node.curr_one_body;
            for (k, inc) in node.incident.iter().enumerate() {
                let neighbor_state = states[inc.neighbor];
                node.neighbor_states[k] = neighbor_state;
                let energy = inc.energy(&self.edges[inc.edge_id].table, state, neighbor_state);
                node.curr_two_body[k] = energy;
                node_total += energy;
            }
            node.curr_total = node_total;
            total += node.curr_one_body;
        }

        for edge in self.edges.iter_mut() {
            let (sa, sb) = (states[edge.a], states[edge.b]);
            edge.curr_energy = if sa == 0 || sb == 0 {
                0.0
            } else {
                edge.table[(sa - 1) * edge.states_b + (sb - 1)]
            };
            total += edge.curr_energy;
        }

        self.total_current = total;
        self.commits_since_refresh = 0;
        trace!(total, "refreshed energy totals from scratch");
    }
}

impl AnnealableGraph for DensePairGraph {
    fn position_count(&self) -> usize {
        self.nodes.len()
    }

    fn state_count(&self, position: usize) -> usize {
        self.nodes[position].one_body.len()
    }

    fn current_state(&self, position: usize) -> usize {
        self.nodes[position].current_state
    }

    fn prepare_for_annealing(&mut self) -> Result<(), GraphError> {
        if !self.energies_final {
            return Err(GraphError::EnergiesNotFinal);
        }

        for node in self.nodes.iter_mut() {
            node.incident.clear();
        }
        for (edge_id, edge) in self.edges.iter().enumerate() {
            let reciprocal_a = self.nodes[edge.b].incident.len();
            let reciprocal_b = self.nodes[edge.a].incident.len();
            self.nodes[edge.a].incident.push(IncidentEdge {
                edge_id,
                neighbor: edge.b,
                stride_self: edge.states_b,
                stride_neighbor: 1,
                reciprocal_index: reciprocal_a,
            });
            self.nodes[edge.b].incident.push(IncidentEdge {
                edge_id,
                neighbor: edge.a,
                stride_self: 1,
                stride_neighbor: edge.states_b,
                reciprocal_index: reciprocal_b,
            });
        }
        for node in self.nodes.iter_mut() {
            let degree = node.incident.len();
            node.neighbor_states = vec![0; degree];
            node.curr_two_body = vec![0.0; degree];
            node.alt_two_body = vec![0.0; degree];
        }

        self.prepared = true;
        self.blanket_assign_unassigned();
        Ok(())
    }

    fn blanket_assign_unassigned(&mut self) {
        for node in self.nodes.iter_mut() {
            node.current_state = 0;
            node.curr_one_body = 0.0;
            node.curr_total = 0.0;
            node.neighbor_states.fill(0);
            node.curr_two_body.fill(0.0);
            node.considering = false;
        }
        for edge in self.edges.iter_mut() {
            edge.curr_energy = 0.0;
        }
        self.considering = None;
        self.total_current = 0.0;
        self.total_alternate = 0.0;
        self.commits_since_refresh = 0;
    }

    fn set_assignment(&mut self, states: &[usize]) -> Result<f64, GraphError> {
        if !self.prepared {
            return Err(GraphError::NotPrepared);
        }
        if states.len() != self.nodes.len() {
            return Err(GraphError::AssignmentLength {
                got: states.len(),
                expected: self.nodes.len(),
            });
        }
        for (position, &state) in states.iter().enumerate() {
            if state != 0 {
                self.check_state(position, state)?;
            }
        }

        for (node, &state) in self.nodes.iter_mut().zip(states) {
            node.current_state = state;
            node.considering = false;
        }
        self.considering = None;
        self.refresh_from_scratch();
        Ok(self.total_current)
    }

    fn consider_substitution(
        &mut self,
        position: usize,
        new_state: usize,
    ) -> Result<Substitution, GraphError> {
        if !self.prepared {
            return Err(GraphError::NotPrepared);
        }
        self.check_state(position, new_state)?;

        // Abandon any substitution still pending on another node.
        if let Some(previous) = self.considering.replace(position) {
            if previous != position {
                self.nodes[previous].considering = false;
            }
        }

        let edges = &self.edges;
        let node = &mut self.nodes[position];
        node.considering = true;
        node.alt_state = new_state;
        node.alt_one_body = node.one_body[new_state - 1];

        let mut alt_total = node.alt_one_body;
        for (k, inc) in node.incident.iter().enumerate() {
            let energy = inc.energy(&edges[inc.edge_id].table, new_state, node.neighbor_states[k]);
            node.alt_two_body[k] = energy;
            alt_total += energy;
        }
        node.alt_total = alt_total;

        let delta_energy = alt_total - node.curr_total;
        self.total_alternate = self.total_current + delta_energy;

        Ok(Substitution {
            delta_energy,
            previous_node_energy: node.curr_total,
        })
    }

    fn commit_considered_substitution(&mut self) -> Result<f64, GraphError> {
        let position = self
            .considering
            .take()
            .ok_or(GraphError::NoPendingSubstitution)?;

        let node = &mut self.nodes[position];
        debug_assert!(node.considering);
        node.considering = false;
        let new_state = node.alt_state;
        node.current_state = new_state;
        node.curr_one_body = node.alt_one_body;
        node.curr_total = node.alt_total;
        node.curr_two_body.copy_from_slice(&node.alt_two_body);

        // Each neighbor updates exactly one cached pair-energy slot.
        let degree = self.nodes[position].incident.len();
        for k in 0..degree {
            let (edge_id, neighbor, reciprocal, energy) = {
                let node = &self.nodes[position];
                let inc = &node.incident[k];
                (
                    inc.edge_id,
                    inc.neighbor,
                    inc.reciprocal_index,
                    node.curr_two_body[k],
                )
            };
            self.edges[edge_id].curr_energy = energy;
            let ngb = &mut self.nodes[neighbor];
            ngb.curr_total += energy - ngb.curr_two_body[reciprocal];
            ngb.curr_two_body[reciprocal] = energy;
            ngb.neighbor_states[reciprocal] = new_state;
        }

        self.total_current = self.total_alternate;
        self.commits_since_refresh += 1;
        if self.commits_since_refresh >= COMMITS_BETWEEN_REFRESH {
            self.refresh_from_scratch();
        }
        Ok(self.total_current)
    }

    fn total_energy(&mut self) -> f64 {
        self.refresh_from_scratch();
        self.total_current
    }

    fn any_position_unassigned(&self) -> bool {
        self.nodes.iter().any(|node| node.current_state == 0)
    }
}
