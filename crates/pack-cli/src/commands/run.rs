use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::progress::CliProgressHandler;
use packmc::core::problem::PackProblem;
use packmc::engine::annealer::{AnnealHooks, AnnealOutcome};
use packmc::engine::config::{AnnealConfig, AnnealConfigBuilder};
use packmc::engine::observer::TrajectoryWriter;
use packmc::engine::progress::ProgressReporter;
use packmc::engine::schedule::TemperatureSchedule;
use packmc::workflows::pack;
use std::fs::File;
use tracing::info;

pub fn run(args: RunArgs) -> Result<()> {
    let problem = PackProblem::load(&args.problem)?;
    info!(
        positions = problem.positions.len(),
        states = problem.total_state_count(),
        "problem loaded"
    );

    let config = build_config(&args)?;

    let handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(handler.callback());

    let outcome = if let Some(path) = &args.trajectory {
        let mut writer = TrajectoryWriter::new(File::create(path)?);
        let outcome = pack::run_with_hooks(
            &problem,
            &config,
            &reporter,
            AnnealHooks {
                observer: None,
                trajectory: Some(&mut writer),
            },
        )?;
        writer.into_inner()?;
        info!("trajectory written to {}", path.display());
        outcome
    } else {
        pack::run(&problem, &config, &reporter)?
    };
    handler.finish();

    print_outcome(&problem, &outcome, args.frequencies);
    Ok(())
}

fn build_config(args: &RunArgs) -> Result<AnnealConfig> {
    let mut schedule = if args.quench_only {
        let outer = args
            .outer_iterations
            .unwrap_or(TemperatureSchedule::default().outer_iterations);
        TemperatureSchedule::quench_only(outer)
    } else {
        let mut schedule = TemperatureSchedule::default();
        if let Some(outer) = args.outer_iterations {
            schedule.outer_iterations = outer;
        }
        schedule
    };
    if let Some(high) = args.high_temperature {
        schedule.high_temperature = high;
    }
    if let Some(low) = args.low_temperature {
        schedule.low_temperature = low;
    }

    let mut builder = AnnealConfigBuilder::new()
        .seed(args.seed)
        .schedule(schedule)
        .track_state_frequencies(args.frequencies);
    if let Some(inner) = args.inner_iterations {
        builder = builder.inner_iterations(inner);
    }
    builder.build().map_err(|e| CliError::Config(e.to_string()))
}

fn print_outcome(problem: &PackProblem, outcome: &AnnealOutcome, show_frequencies: bool) {
    println!("Best total energy: {:.6}", outcome.best_energy);
    println!("Assignment:");
    for (position, &state) in outcome.best_assignment.iter().enumerate() {
        let label = problem.positions[position]
            .name
            .clone()
            .unwrap_or_else(|| format!("position {position}"));
        println!(
            "  {label:<20} state {state:>4}  (global {})",
            outcome.best_global_states[position]
        );
    }
    println!(
        "Proposals: {} attempted, {} accepted, {} rejected",
        outcome.stats.attempted, outcome.stats.accepted, outcome.stats.rejected
    );

    if show_frequencies {
        if let Some(frequencies) = &outcome.state_frequencies {
            println!("Visitation frequency of the chosen states:");
            for (position, &global) in outcome.best_global_states.iter().enumerate() {
                let label = problem.positions[position]
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("position {position}"));
                println!("  {label:<20} {:.3}", frequencies[global]);
            }
        }
    }
}
