use crate::core::catalog::DenseStateCatalog;
use crate::core::problem::PackProblem;
use crate::engine::annealer::{AnnealHooks, AnnealOutcome, Annealer};
use crate::engine::config::AnnealConfig;
use crate::engine::error::EngineError;
use crate::engine::graph::DensePairGraph;
use crate::engine::policy::{NullStateBias, ProposalPolicy, UniformStateProposal};
use crate::engine::progress::{Progress, ProgressReporter};
use itertools::Itertools;
use tracing::{info, instrument};

// Distinct deterministic streams derived from the single user-facing seed.
const PROPOSAL_SEED_OFFSET: u64 = 0x9E3779B97F4A7C15;
const BIAS_SEED_OFFSET: u64 = 0xD1B54A32D192ED03;

/// Run the packing optimization described by `problem`.
#[instrument(skip_all, name = "pack_workflow")]
pub fn run(
    problem: &PackProblem,
    config: &AnnealConfig,
    reporter: &ProgressReporter,
) -> Result<AnnealOutcome, EngineError> {
    run_with_hooks(problem, config, reporter, AnnealHooks::default())
}

/// [`run`], with optional per-substitution observer and trajectory hooks.
pub fn run_with_hooks(
    problem: &PackProblem,
    config: &AnnealConfig,
    reporter: &ProgressReporter,
    hooks: AnnealHooks<'_>,
) -> Result<AnnealOutcome, EngineError> {
    problem.validate()?;

    reporter.report(Progress::PhaseStart {
        name: "Graph Construction",
    });
    info!(
        positions = problem.positions.len(),
        states = problem.total_state_count(),
        interactions = problem.interactions.len(),
        "building the energy graph"
    );

    let state_counts = problem.state_counts();
    let catalog = DenseStateCatalog::new(&state_counts);
    let mut graph = build_graph(problem, &state_counts)?;
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Simulated Annealing",
    });
    let mut policy = build_policy(problem, config);
    let outcome =
        Annealer::new(&mut graph, &catalog, config).run(policy.as_mut(), hooks, reporter)?;
    reporter.report(Progress::PhaseFinish);

    info!(best_energy = outcome.best_energy, "packing complete");
    Ok(outcome)
}

fn build_graph(
    problem: &PackProblem,
    state_counts: &[usize],
) -> Result<DensePairGraph, EngineError> {
    let mut graph = DensePairGraph::new(state_counts);
    for (position, spec) in problem.positions.iter().enumerate() {
        for (index, &energy) in spec.one_body.iter().enumerate() {
            graph.set_one_body_energy(position, index + 1, energy)?;
        }
    }
    for interaction in &problem.interactions {
        let [a, b] = interaction.positions;
        graph.add_edge(a, b)?;
        for (i, row) in interaction.energies.iter().enumerate() {
            for (j, &energy) in row.iter().enumerate() {
                graph.set_two_body_energy(a, b, i + 1, j + 1, energy)?;
            }
        }
    }
    graph.declare_energies_final();
    Ok(graph)
}

fn build_policy(problem: &PackProblem, config: &AnnealConfig) -> Box<dyn ProposalPolicy> {
    let uniform =
        UniformStateProposal::seeded(config.seed.wrapping_add(PROPOSAL_SEED_OFFSET));
    if problem.null_biased_positions.is_empty() {
        Box::new(uniform)
    } else {
        Box::new(NullStateBias::new(
            uniform,
            problem.null_biased_positions.iter().copied(),
            config.seed.wrapping_add(BIAS_SEED_OFFSET),
        ))
    }
}

/// Total energy of a full or partial assignment, summed directly from the
/// problem tables (unassigned endpoints contribute nothing).
pub fn assignment_energy(problem: &PackProblem, states: &[usize]) -> f64 {
    let mut total = 0.0;
    for (spec, &state) in problem.positions.iter().zip(states) {
        if state != 0 {
            total += spec.one_body[state - 1];
        }
    }
    for interaction in &problem.interactions {
        let [a, b] = interaction.positions;
        let (sa, sb) = (states[a], states[b]);
        if sa != 0 && sb != 0 {
            total += interaction.energies[sa - 1][sb - 1];
        }
    }
    total
}

/// Brute-force global optimum by enumerating every complete assignment.
///
/// Exponential in the position count; intended for validating annealing
/// results on toy problems. Returns `None` when any position has no
/// candidate states (no complete assignment exists).
pub fn exhaustive_minimum(problem: &PackProblem) -> Option<(Vec<usize>, f64)> {
    let state_counts = problem.state_counts();
    if state_counts.iter().any(|&count| count == 0) {
        return None;
    }

    state_counts
        .iter()
        .map(|&count| 1..=count)
        .multi_cartesian_product()
        .map(|states| {
            let energy = assignment_energy(problem, &states);
            (states, energy)
        })
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}
