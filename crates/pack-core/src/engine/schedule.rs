//! Outer-loop temperature program.
//!
//! The schedule is generated up front as the list of steps actually meant to
//! run, instead of rewinding a loop counter mid-iteration: a geometric first
//! wave from [`TemperatureSchedule::high_temperature`] down to
//! [`TemperatureSchedule::low_temperature`], one late re-heat step (the
//! "second wave"), and a trailing quench phase at effectively zero
//! temperature. With [`TemperatureSchedule::skip_second_wave`] set (the
//! default), the re-heat is elided and the run falls straight through to the
//! quench.

/// Fraction of the high temperature used for the late re-heat step.
const SECOND_WAVE_SCALE: f64 = 0.25;

/// One executed outer-loop step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleStep {
    /// 1-based index within the full (unskipped) schedule.
    pub index: usize,
    pub temperature: f64,
    /// Quench steps accept only non-worsening moves and restart the search
    /// from the best assignment found so far.
    pub quench: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureSchedule {
    pub outer_iterations: usize,
    pub high_temperature: f64,
    pub low_temperature: f64,
    pub skip_second_wave: bool,
    /// Number of trailing steps run as quench.
    pub quench_steps: usize,
}

impl Default for TemperatureSchedule {
    fn default() -> Self {
        Self {
            outer_iterations: 20,
            high_temperature: 100.0,
            low_temperature: 0.3,
            skip_second_wave: true,
            quench_steps: 1,
        }
    }
}

impl TemperatureSchedule {
    /// A schedule that quenches from the first step: deterministic descent,
    /// useful for tests and for polishing a known-good starting assignment.
    pub fn quench_only(outer_iterations: usize) -> Self {
        Self {
            outer_iterations,
            quench_steps: outer_iterations,
            ..Self::default()
        }
    }

    /// The steps that will actually run, in order.
    pub fn steps(&self) -> Vec<ScheduleStep> {
        let n = self.outer_iterations;
        let quench = self.quench_steps.min(n);
        let hot_steps = n - quench;

        let mut steps = Vec::with_capacity(n);
        let mut previous = f64::INFINITY;
        for nn in 1..=hot_steps {
            let temperature = self.raw_temperature(nn, hot_steps);
            if self.skip_second_wave && temperature > previous {
                // Drop the re-heat and everything after it; the quench tail
                // still runs.
                break;
            }
            steps.push(ScheduleStep {
                index: nn,
                temperature,
                quench: false,
            });
            previous = temperature;
        }
        for nn in hot_steps + 1..=n {
            steps.push(ScheduleStep {
                index: nn,
                temperature: self.low_temperature,
                quench: true,
            });
        }
        steps
    }

    /// Temperature of the full (unskipped) program at hot step `nn`: decay
    /// over `1..hot_steps`, re-heat at the final hot step.
    fn raw_temperature(&self, nn: usize, hot_steps: usize) -> f64 {
        if nn == hot_steps && hot_steps >= 2 {
            return self.high_temperature * SECOND_WAVE_SCALE;
        }
        let span = hot_steps.saturating_sub(2).max(1) as f64;
        let ratio = self.low_temperature / self.high_temperature;
        self.high_temperature * ratio.powf((nn - 1) as f64 / span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_decays_then_quenches() {
        let schedule = TemperatureSchedule::default();
        let steps = schedule.steps();

        assert!(!steps.is_empty());
        let hot: Vec<_> = steps.iter().filter(|s| !s.quench).collect();
        for pair in hot.windows(2) {
            assert!(pair[1].temperature < pair[0].temperature);
        }
        assert!((hot[0].temperature - schedule.high_temperature).abs() < 1e-9);
        assert!(hot.last().unwrap().temperature >= schedule.low_temperature - 1e-9);
        assert!(steps.last().unwrap().quench);
    }

    #[test]
    fn skip_second_wave_elides_the_reheat() {
        let skipped = TemperatureSchedule::default();
        let full = TemperatureSchedule {
            skip_second_wave: false,
            ..TemperatureSchedule::default()
        };

        let skipped_steps = skipped.steps();
        let full_steps = full.steps();

        // The full program contains exactly one rise; the skipped one none.
        let rises = |steps: &[ScheduleStep]| {
            steps
                .windows(2)
                .filter(|w| w[1].temperature > w[0].temperature)
                .count()
        };
        assert_eq!(rises(&full_steps), 1);
        assert_eq!(rises(&skipped_steps), 0);
        assert_eq!(full_steps.len(), skipped_steps.len() + 1);
    }

    #[test]
    fn quench_only_schedule_is_all_quench() {
        let schedule = TemperatureSchedule::quench_only(5);
        let steps = schedule.steps();
        assert_eq!(steps.len(), 5);
        assert!(steps.iter().all(|s| s.quench));
    }

    #[test]
    fn quench_tail_survives_the_skip() {
        let schedule = TemperatureSchedule {
            outer_iterations: 10,
            quench_steps: 3,
            ..TemperatureSchedule::default()
        };
        let steps = schedule.steps();
        assert_eq!(steps.iter().filter(|s| s.quench).count(), 3);
        assert!(steps.iter().rev().take(3).all(|s| s.quench));
    }
}
