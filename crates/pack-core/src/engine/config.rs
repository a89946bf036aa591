use super::schedule::TemperatureSchedule;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnealConfig {
    pub schedule: TemperatureSchedule,
    /// Proposals per outer step; `None` derives a count from the problem
    /// size at run time.
    pub inner_iterations: Option<usize>,
    /// Seed for every random stream of the run (acceptance and proposals).
    pub seed: u64,
    /// Assignment to bulk-apply before the outer loop instead of starting
    /// from all-unassigned.
    pub starting_assignment: Option<Vec<usize>>,
    pub track_state_frequencies: bool,
    /// Visitation counts accumulate only once the temperature falls to this
    /// value or below.
    pub frequency_temperature: f64,
}

#[derive(Default)]
pub struct AnnealConfigBuilder {
    schedule: Option<TemperatureSchedule>,
    inner_iterations: Option<usize>,
    seed: Option<u64>,
    starting_assignment: Option<Vec<usize>>,
    track_state_frequencies: Option<bool>,
    frequency_temperature: Option<f64>,
}

impl AnnealConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(mut self, schedule: TemperatureSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }
    pub fn inner_iterations(mut self, iterations: usize) -> Self {
        self.inner_iterations = Some(iterations);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn starting_assignment(mut self, assignment: Vec<usize>) -> Self {
        self.starting_assignment = Some(assignment);
        self
    }
    pub fn track_state_frequencies(mut self, setting: bool) -> Self {
        self.track_state_frequencies = Some(setting);
        self
    }
    pub fn frequency_temperature(mut self, temperature: f64) -> Self {
        self.frequency_temperature = Some(temperature);
        self
    }

    pub fn build(self) -> Result<AnnealConfig, ConfigError> {
        let seed = self.seed.ok_or(ConfigError::MissingParameter("seed"))?;
        let schedule = self.schedule.unwrap_or_default();

        if schedule.outer_iterations == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "schedule.outer_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(schedule.low_temperature > 0.0) || !(schedule.high_temperature > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "schedule.temperatures",
                reason: "temperatures must be positive".to_string(),
            });
        }
        if schedule.low_temperature > schedule.high_temperature {
            return Err(ConfigError::InvalidParameter {
                name: "schedule.low_temperature",
                reason: "must not exceed high_temperature".to_string(),
            });
        }
        if let Some(0) = self.inner_iterations {
            return Err(ConfigError::InvalidParameter {
                name: "inner_iterations",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(AnnealConfig {
            schedule,
            inner_iterations: self.inner_iterations,
            seed,
            starting_assignment: self.starting_assignment,
            track_state_frequencies: self.track_state_frequencies.unwrap_or(false),
            frequency_temperature: self.frequency_temperature.unwrap_or(1.0),
        })
    }
}
