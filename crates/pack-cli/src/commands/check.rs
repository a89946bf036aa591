use crate::cli::CheckArgs;
use crate::error::Result;
use packmc::core::problem::PackProblem;

pub fn run(args: CheckArgs) -> Result<()> {
    let problem = PackProblem::load(&args.problem)?;

    let state_counts = problem.state_counts();
    let positions = state_counts.len();
    let max_pairs = positions * positions.saturating_sub(1) / 2;

    println!("Problem OK: {}", args.problem.display());
    println!("  positions:    {positions}");
    println!("  states total: {}", problem.total_state_count());
    println!(
        "  states/pos:   min {} / max {}",
        state_counts.iter().min().unwrap_or(&0),
        state_counts.iter().max().unwrap_or(&0)
    );
    println!("  interactions: {}", problem.interactions.len());
    if max_pairs > 0 {
        println!(
            "  pair density: {:.1}%",
            100.0 * problem.interactions.len() as f64 / max_pairs as f64
        );
    }
    if !problem.null_biased_positions.is_empty() {
        println!(
            "  null-biased:  {} position(s)",
            problem.null_biased_positions.len()
        );
    }

    let starved: Vec<usize> = state_counts
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count == 0)
        .map(|(position, _)| position)
        .collect();
    if !starved.is_empty() {
        println!(
            "  warning: {} position(s) declare no candidate states and can never be assigned: {:?}",
            starved.len(),
            starved
        );
    }

    Ok(())
}
