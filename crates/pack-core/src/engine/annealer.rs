//! The simulated annealing scheduler.
//!
//! Drives a nested outer/inner loop over an [`AnnealableGraph`]: the outer
//! loop walks the temperature schedule, the inner loop proposes single
//! position substitutions and applies a Metropolis acceptance test. The
//! scheduler is graph-representation-agnostic and holds the graph
//! exclusively for the duration of a run; the consider/commit pair is an
//! unguarded two-step transaction and must never interleave with another
//! writer.

use super::config::AnnealConfig;
use super::error::{EngineError, UnassignedPosition};
use super::graph::AnnealableGraph;
use super::observer::{AnnealObserver, SubstitutionEvent, TrajectorySink};
use super::policy::ProposalPolicy;
use super::progress::{Progress, ProgressReporter};
use super::schedule::ScheduleStep;
use crate::core::catalog::StateCatalog;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, instrument};

/// Metropolis shortcut: uphill moves with `delta/T` beyond this never pass,
/// so the exponential is not evaluated.
const METROPOLIS_LN_CUTOFF: f64 = 10.0;

const DEFAULT_INNER_PER_STATE: usize = 5;
const MIN_INNER_ITERATIONS: usize = 100;
const MAX_INNER_ITERATIONS: usize = 100_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptanceStats {
    pub attempted: u64,
    pub accepted: u64,
    pub rejected: u64,
}

/// Result of a completed annealing run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnealOutcome {
    /// Best local state per position (1-based; never 0 on success).
    pub best_assignment: Vec<usize>,
    /// The same assignment in the catalog's global numbering.
    pub best_global_states: Vec<usize>,
    pub best_energy: f64,
    /// Working total energy at the end of each executed outer step.
    pub step_energies: Vec<f64>,
    /// Per-global-state visitation frequencies, when tracking was enabled.
    pub state_frequencies: Option<Vec<f64>>,
    pub stats: AcceptanceStats,
}

/// Optional per-substitution collaborators; both default to absent.
#[derive(Default)]
pub struct AnnealHooks<'a> {
    pub observer: Option<&'a mut dyn AnnealObserver>,
    pub trajectory: Option<&'a mut dyn TrajectorySink>,
}

pub struct Annealer<'a> {
    graph: &'a mut dyn AnnealableGraph,
    catalog: &'a dyn StateCatalog,
    config: &'a AnnealConfig,
    rng: StdRng,
}

impl<'a> Annealer<'a> {
    pub fn new(
        graph: &'a mut dyn AnnealableGraph,
        catalog: &'a dyn StateCatalog,
        config: &'a AnnealConfig,
    ) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            graph,
            catalog,
            config,
            rng,
        }
    }

    #[instrument(skip_all, name = "anneal")]
    pub fn run(
        &mut self,
        policy: &mut dyn ProposalPolicy,
        mut hooks: AnnealHooks<'_>,
        reporter: &ProgressReporter,
    ) -> Result<AnnealOutcome, EngineError> {
        let positions = self.graph.position_count();
        if self.catalog.position_count() != positions {
            return Err(EngineError::CatalogMismatch {
                catalog: self.catalog.position_count(),
                graph: positions,
            });
        }

        self.graph.prepare_for_annealing()?;
        self.graph.blanket_assign_unassigned();

        let total_states = self.catalog.total_state_count();
        if total_states == 0 {
            info!("catalog holds no candidate states; returning the trivial result");
            return Ok(AnnealOutcome {
                best_assignment: vec![0; positions],
                best_global_states: Vec::new(),
                best_energy: 0.0,
                step_energies: Vec::new(),
                state_frequencies: None,
                stats: AcceptanceStats::default(),
            });
        }

        let mut working = vec![0usize; positions];
        let mut best = vec![0usize; positions];
        let mut best_energy = f64::INFINITY;
        let mut current_energy = 0.0;

        if let Some(start) = &self.config.starting_assignment {
            if start.len() != positions {
                return Err(EngineError::StartingAssignmentLength {
                    got: start.len(),
                    expected: positions,
                });
            }
            current_energy = self.graph.set_assignment(start)?;
            working.copy_from_slice(start);
            best.copy_from_slice(start);
            best_energy = current_energy;
        }

        let inner_iterations = self
            .config
            .inner_iterations
            .unwrap_or_else(|| default_inner_iterations(total_states));
        debug!(positions, total_states, inner_iterations, "annealing starts");

        let mut stats = AcceptanceStats::default();
        let mut step_energies = Vec::new();
        let mut frequency_counts = vec![0u64; total_states];
        let mut frequency_samples = 0u64;

        for step in self.config.schedule.steps() {
            if step.quench {
                // Quenching always searches from the best point found so far.
                working.copy_from_slice(&best);
                current_energy = self.graph.set_assignment(&working)?;
            }
            self.graph
                .set_errorful_delta_threshold(step.temperature.sqrt());

            for _ in 0..inner_iterations {
                let Some(proposal) = policy.propose(self.catalog, &working) else {
                    continue;
                };
                let (position, state) = (proposal.position, proposal.state);
                if position >= positions
                    || state == 0
                    || state > self.catalog.state_count(position)
                {
                    return Err(EngineError::InvalidProposal { position, state });
                }

                let previous_state = working[position];
                if state == previous_state {
                    continue;
                }

                let substitution = self.graph.consider_substitution(position, state)?;
                let was_unassigned = previous_state == 0;
                let accepted =
                    was_unassigned || self.pass_metropolis(substitution.delta_energy, &step);

                stats.attempted += 1;
                if accepted {
                    stats.accepted += 1;
                    current_energy = self.graph.commit_considered_substitution()?;
                    working[position] = state;
                    if was_unassigned || current_energy < best_energy {
                        best.copy_from_slice(&working);
                        best_energy = current_energy;
                    }
                } else {
                    stats.rejected += 1;
                }

                if let Some(sink) = hooks.trajectory.as_deref_mut() {
                    sink.record(position, state, accepted)?;
                }
                if let Some(observer) = hooks.observer.as_deref_mut() {
                    observer.observe_substitution(&SubstitutionEvent {
                        position,
                        previous_state,
                        candidate_state: state,
                        temperature: if step.quench { 0.0 } else { step.temperature },
                        accepted,
                    });
                }

                if self.config.track_state_frequencies
                    && step.temperature <= self.config.frequency_temperature
                {
                    frequency_samples += 1;
                    for (p, &s) in working.iter().enumerate() {
                        if s != 0 {
                            frequency_counts[self.catalog.global_id(p, s)] += 1;
                        }
                    }
                }
            }

            step_energies.push(current_energy);
            reporter.report(Progress::TemperatureStep {
                step,
                energy: current_energy,
            });
            debug!(
                step = step.index,
                temperature = step.temperature,
                quench = step.quench,
                energy = current_energy,
                "outer step complete"
            );
        }

        if self.graph.any_position_unassigned() {
            let unassigned: Vec<UnassignedPosition> = (0..positions)
                .filter(|&p| self.graph.current_state(p) == 0)
                .map(|p| UnassignedPosition {
                    position: p,
                    candidate_states: self.catalog.state_count(p),
                })
                .collect();
            for entry in &unassigned {
                error!(
                    position = entry.position,
                    candidate_states = entry.candidate_states,
                    "position finished annealing unassigned"
                );
            }
            return Err(EngineError::IncompleteAssignment {
                positions: unassigned,
            });
        }

        let best_global_states = best
            .iter()
            .enumerate()
            .map(|(p, &s)| self.catalog.global_id(p, s))
            .collect();

        let state_frequencies = if self.config.track_state_frequencies {
            let samples = frequency_samples.max(1) as f64;
            Some(
                frequency_counts
                    .iter()
                    .map(|&count| count as f64 / samples)
                    .collect(),
            )
        } else {
            None
        };

        info!(best_energy, attempted = stats.attempted, "annealing complete");
        Ok(AnnealOutcome {
            best_assignment: best,
            best_global_states,
            best_energy,
            step_energies,
            state_frequencies,
            stats,
        })
    }

    fn pass_metropolis(&mut self, delta_energy: f64, step: &ScheduleStep) -> bool {
        if step.quench {
            return delta_energy <= 0.0;
        }
        if delta_energy < 0.0 {
            return true;
        }
        let ln_prob = delta_energy / step.temperature;
        ln_prob < METROPOLIS_LN_CUTOFF && self.rng.r#gen::<f64>() < (-ln_prob).exp()
    }
}

fn default_inner_iterations(total_states: usize) -> usize {
    (total_states * DEFAULT_INNER_PER_STATE).clamp(MIN_INNER_ITERATIONS, MAX_INNER_ITERATIONS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::DenseStateCatalog;
    use crate::engine::config::AnnealConfigBuilder;
    use crate::engine::graph::DensePairGraph;
    use crate::engine::observer::TrajectoryWriter;
    use crate::engine::policy::{Proposal, UniformStateProposal};
    use crate::engine::schedule::TemperatureSchedule;

    // Three fully connected positions with two states each. Everything is
    // zero except the (2, 2) pair energies, so the unique optimum is
    // [2, 2, 2] with total -4 - 3 - 3 = -10.
    fn toy_graph() -> DensePairGraph {
        let mut graph = DensePairGraph::new(&[2, 2, 2]);
        for (p, q, energy) in [(0, 1, -4.0), (0, 2, -3.0), (1, 2, -3.0)] {
            graph.add_edge(p, q).unwrap();
            graph.set_two_body_energy(p, q, 2, 2, energy).unwrap();
        }
        graph.declare_energies_final();
        graph
    }

    fn toy_catalog() -> DenseStateCatalog {
        DenseStateCatalog::new(&[2, 2, 2])
    }

    fn quench_config(seed: u64) -> AnnealConfig {
        AnnealConfigBuilder::new()
            .seed(seed)
            .schedule(TemperatureSchedule::quench_only(3))
            .inner_iterations(200)
            .build()
            .unwrap()
    }

    fn run_toy(config: &AnnealConfig) -> AnnealOutcome {
        let mut graph = toy_graph();
        let catalog = toy_catalog();
        let mut policy = UniformStateProposal::seeded(config.seed ^ 1);
        Annealer::new(&mut graph, &catalog, config)
            .run(&mut policy, AnnealHooks::default(), &ProgressReporter::new())
            .unwrap()
    }

    #[test]
    fn quench_finds_the_closed_form_optimum() {
        let outcome = run_toy(&quench_config(42));

        assert_eq!(outcome.best_assignment, vec![2, 2, 2]);
        assert!((outcome.best_energy - (-10.0)).abs() < 1e-12);
        assert_eq!(outcome.best_global_states, vec![1, 3, 5]);
        assert!(outcome.stats.attempted > 0);
    }

    #[test]
    fn full_schedule_also_finds_the_optimum() {
        let config = AnnealConfigBuilder::new()
            .seed(7)
            .schedule(TemperatureSchedule::default())
            .inner_iterations(100)
            .build()
            .unwrap();
        let outcome = run_toy(&config);

        assert_eq!(outcome.best_assignment, vec![2, 2, 2]);
        assert!((outcome.best_energy - (-10.0)).abs() < 1e-12);
        assert_eq!(outcome.step_energies.len(), config.schedule.steps().len());
    }

    #[test]
    fn best_energy_is_consistent_and_bounds_the_trajectory() {
        let outcome = run_toy(&quench_config(3));

        // The recorded best equals a from-scratch evaluation of the best
        // assignment, and no later step improved on it.
        let mut graph = toy_graph();
        graph.prepare_for_annealing().unwrap();
        let exact = graph.set_assignment(&outcome.best_assignment).unwrap();
        assert!((exact - outcome.best_energy).abs() < 1e-9);

        let min_step = outcome
            .step_energies
            .iter()
            .cloned()
            .fold(f64::INFINITY, f64::min);
        assert!(outcome.best_energy <= min_step + 1e-9);
    }

    #[test]
    fn identical_seeds_reproduce_trajectory_and_outcome() {
        let config = quench_config(1234);

        let run_with_trajectory = || {
            let mut graph = toy_graph();
            let catalog = toy_catalog();
            let mut policy = UniformStateProposal::seeded(config.seed ^ 1);
            let mut writer = TrajectoryWriter::new(Vec::new());
            let outcome = Annealer::new(&mut graph, &catalog, &config)
                .run(
                    &mut policy,
                    AnnealHooks {
                        observer: None,
                        trajectory: Some(&mut writer),
                    },
                    &ProgressReporter::new(),
                )
                .unwrap();
            (outcome, writer.into_inner().unwrap())
        };

        let (outcome_a, trajectory_a) = run_with_trajectory();
        let (outcome_b, trajectory_b) = run_with_trajectory();
        assert_eq!(outcome_a, outcome_b);
        assert_eq!(trajectory_a, trajectory_b);
        assert!(!trajectory_a.is_empty());
    }

    #[test]
    fn first_assignment_is_accepted_even_uphill() {
        // Positive one-body energies everywhere: a quench would reject every
        // move on energy grounds, so completion proves the unassigned rule.
        let mut graph = DensePairGraph::new(&[1, 1]);
        graph.set_one_body_energy(0, 1, 5.0).unwrap();
        graph.set_one_body_energy(1, 1, 7.0).unwrap();
        graph.declare_energies_final();

        let catalog = DenseStateCatalog::new(&[1, 1]);
        let config = quench_config(5);
        let mut policy = UniformStateProposal::seeded(6);
        let outcome = Annealer::new(&mut graph, &catalog, &config)
            .run(&mut policy, AnnealHooks::default(), &ProgressReporter::new())
            .unwrap();

        assert_eq!(outcome.best_assignment, vec![1, 1]);
        assert!((outcome.best_energy - 12.0).abs() < 1e-12);
    }

    #[test]
    fn starved_position_aborts_with_diagnostics() {
        let mut graph = DensePairGraph::new(&[2, 0, 2]);
        graph.declare_energies_final();
        let catalog = DenseStateCatalog::new(&[2, 0, 2]);

        let config = quench_config(9);
        let mut policy = UniformStateProposal::seeded(10);
        let err = Annealer::new(&mut graph, &catalog, &config)
            .run(&mut policy, AnnealHooks::default(), &ProgressReporter::new())
            .unwrap_err();

        match err {
            EngineError::IncompleteAssignment { positions } => {
                assert_eq!(
                    positions,
                    vec![UnassignedPosition {
                        position: 1,
                        candidate_states: 0,
                    }]
                );
            }
            other => panic!("expected IncompleteAssignment, got {other:?}"),
        }
    }

    #[test]
    fn empty_catalog_returns_the_trivial_result() {
        let mut graph = DensePairGraph::new(&[0, 0]);
        graph.declare_energies_final();
        let catalog = DenseStateCatalog::new(&[0, 0]);

        let config = quench_config(1);
        let mut policy = UniformStateProposal::seeded(2);
        let outcome = Annealer::new(&mut graph, &catalog, &config)
            .run(&mut policy, AnnealHooks::default(), &ProgressReporter::new())
            .unwrap();

        assert_eq!(outcome.best_assignment, vec![0, 0]);
        assert_eq!(outcome.best_energy, 0.0);
        assert_eq!(outcome.stats.attempted, 0);
    }

    #[test]
    fn catalog_graph_size_mismatch_is_rejected() {
        let mut graph = toy_graph();
        let catalog = DenseStateCatalog::new(&[2, 2]);
        let config = quench_config(1);
        let mut policy = UniformStateProposal::seeded(2);

        let err = Annealer::new(&mut graph, &catalog, &config)
            .run(&mut policy, AnnealHooks::default(), &ProgressReporter::new())
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::CatalogMismatch {
                catalog: 2,
                graph: 3,
            }
        ));
    }

    #[test]
    fn invalid_proposals_are_configuration_errors() {
        struct BrokenPolicy;
        impl ProposalPolicy for BrokenPolicy {
            fn propose(
                &mut self,
                _catalog: &dyn StateCatalog,
                _current: &[usize],
            ) -> Option<Proposal> {
                Some(Proposal {
                    position: 0,
                    state: 99,
                })
            }
        }

        let mut graph = toy_graph();
        let catalog = toy_catalog();
        let config = quench_config(1);
        let err = Annealer::new(&mut graph, &catalog, &config)
            .run(
                &mut BrokenPolicy,
                AnnealHooks::default(),
                &ProgressReporter::new(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidProposal {
                position: 0,
                state: 99,
            }
        ));
    }

    #[test]
    fn starting_assignment_seeds_best_and_length_is_checked() {
        let config = AnnealConfigBuilder::new()
            .seed(8)
            .schedule(TemperatureSchedule::quench_only(1))
            .inner_iterations(1)
            .starting_assignment(vec![2, 2, 2])
            .build()
            .unwrap();
        let outcome = run_toy(&config);
        assert_eq!(outcome.best_assignment, vec![2, 2, 2]);
        assert!((outcome.best_energy - (-10.0)).abs() < 1e-12);

        let bad = AnnealConfigBuilder::new()
            .seed(8)
            .starting_assignment(vec![1])
            .build()
            .unwrap();
        let mut graph = toy_graph();
        let catalog = toy_catalog();
        let mut policy = UniformStateProposal::seeded(1);
        let err = Annealer::new(&mut graph, &catalog, &bad)
            .run(&mut policy, AnnealHooks::default(), &ProgressReporter::new())
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::StartingAssignmentLength {
                got: 1,
                expected: 3,
            }
        ));
    }

    #[test]
    fn observer_sees_every_attempt_with_quench_temperature_zero() {
        #[derive(Default)]
        struct Recorder {
            events: Vec<SubstitutionEvent>,
        }
        impl AnnealObserver for Recorder {
            fn observe_substitution(&mut self, event: &SubstitutionEvent) {
                self.events.push(*event);
            }
        }

        let mut graph = toy_graph();
        let catalog = toy_catalog();
        let config = quench_config(21);
        let mut policy = UniformStateProposal::seeded(22);
        let mut recorder = Recorder::default();
        let outcome = Annealer::new(&mut graph, &catalog, &config)
            .run(
                &mut policy,
                AnnealHooks {
                    observer: Some(&mut recorder),
                    trajectory: None,
                },
                &ProgressReporter::new(),
            )
            .unwrap();

        assert_eq!(recorder.events.len() as u64, outcome.stats.attempted);
        assert!(recorder.events.iter().all(|e| e.temperature == 0.0));
        // First attempt on any position is a first assignment: always taken.
        for position in 0..3 {
            if let Some(first) = recorder.events.iter().find(|e| e.position == position) {
                assert_eq!(first.previous_state, 0);
                assert!(first.accepted);
            }
        }
    }

    #[test]
    fn state_frequencies_form_per_position_distributions() {
        let config = AnnealConfigBuilder::new()
            .seed(31)
            .schedule(TemperatureSchedule::quench_only(3))
            .inner_iterations(200)
            .track_state_frequencies(true)
            .frequency_temperature(f64::INFINITY)
            .build()
            .unwrap();
        let outcome = run_toy(&config);

        let frequencies = outcome.state_frequencies.unwrap();
        assert_eq!(frequencies.len(), 6);
        let catalog = toy_catalog();
        for position in 0..3 {
            let sum: f64 = (1..=2)
                .map(|state| frequencies[catalog.global_id(position, state)])
                .sum();
            // Every sample counts each assigned position exactly once.
            assert!(sum <= 1.0 + 1e-9);
            assert!(sum > 0.9, "position {position} frequency sum {sum}");
        }
    }
}
