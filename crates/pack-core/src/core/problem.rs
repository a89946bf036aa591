//! Declarative packing problem description.
//!
//! A [`PackProblem`] is the serialized form of everything the engine needs:
//! per-position one-body energies (the vector length fixes the candidate
//! count) and dense pairwise tables for every interacting pair. Problems are
//! typically loaded from TOML, validated once, and handed to
//! [`crate::workflows::pack::run`].

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProblemError {
    #[error("failed to read problem file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse problem file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("problem declares no positions")]
    NoPositions,

    #[error("interaction {index} references position {position}, but only {count} positions are declared")]
    InteractionOutOfRange {
        index: usize,
        position: usize,
        count: usize,
    },

    #[error("interaction {index} pairs position {position} with itself")]
    SelfInteraction { index: usize, position: usize },

    #[error("interactions {first} and {second} both cover the pair ({a}, {b})")]
    DuplicateInteraction {
        first: usize,
        second: usize,
        a: usize,
        b: usize,
    },

    #[error(
        "interaction {index} table has {rows}x{cols} entries, expected {expected_rows}x{expected_cols} for pair ({a}, {b})"
    )]
    TableShape {
        index: usize,
        a: usize,
        b: usize,
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },

    #[error("null-biased position {position} is out of range ({count} positions declared)")]
    NullBiasOutOfRange { position: usize, count: usize },
}

/// One assignable position and its one-body energies.
///
/// `one_body[s - 1]` is the energy of local state `s`; the vector length is
/// the position's candidate-state count. An empty vector is legal in the
/// model (the position is then unassignable, which the scheduler reports as
/// a fatal configuration error at the end of a run).
#[derive(Debug, Clone, Deserialize)]
pub struct PositionSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub one_body: Vec<f64>,
}

/// Dense pairwise table for one interacting pair of positions.
///
/// `energies[sa - 1][sb - 1]` is the pair energy between local state `sa` of
/// `positions[0]` and local state `sb` of `positions[1]`.
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionSpec {
    pub positions: [usize; 2],
    pub energies: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackProblem {
    pub positions: Vec<PositionSpec>,
    #[serde(default)]
    pub interactions: Vec<InteractionSpec>,
    /// Positions whose last candidate state is a designated "null" state that
    /// proposals should be biased towards (see
    /// [`crate::engine::policy::NullStateBias`]).
    #[serde(default)]
    pub null_biased_positions: Vec<usize>,
}

impl PackProblem {
    pub fn from_toml_str(text: &str) -> Result<Self, ProblemError> {
        let problem: PackProblem = toml::from_str(text)?;
        problem.validate()?;
        Ok(problem)
    }

    pub fn load(path: &Path) -> Result<Self, ProblemError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProblemError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Per-position candidate-state counts, in declaration order.
    pub fn state_counts(&self) -> Vec<usize> {
        self.positions.iter().map(|p| p.one_body.len()).collect()
    }

    pub fn total_state_count(&self) -> usize {
        self.positions.iter().map(|p| p.one_body.len()).sum()
    }

    pub fn validate(&self) -> Result<(), ProblemError> {
        let count = self.positions.len();
        if count == 0 {
            return Err(ProblemError::NoPositions);
        }

        let mut seen: Vec<((usize, usize), usize)> = Vec::with_capacity(self.interactions.len());
        for (index, interaction) in self.interactions.iter().enumerate() {
            let [a, b] = interaction.positions;
            for position in [a, b] {
                if position >= count {
                    return Err(ProblemError::InteractionOutOfRange {
                        index,
                        position,
                        count,
                    });
                }
            }
            if a == b {
                return Err(ProblemError::SelfInteraction { index, position: a });
            }

            let key = (a.min(b), a.max(b));
            if let Some(&(_, first)) = seen.iter().find(|(k, _)| *k == key) {
                return Err(ProblemError::DuplicateInteraction {
                    first,
                    second: index,
                    a: key.0,
                    b: key.1,
                });
            }
            seen.push((key, index));

            let expected_rows = self.positions[a].one_body.len();
            let expected_cols = self.positions[b].one_body.len();
            let rows = interaction.energies.len();
            let cols = interaction.energies.iter().map(Vec::len).max().unwrap_or(0);
            let ragged = interaction.energies.iter().any(|row| row.len() != cols);
            if rows != expected_rows || cols != expected_cols || ragged {
                return Err(ProblemError::TableShape {
                    index,
                    a,
                    b,
                    rows,
                    cols,
                    expected_rows,
                    expected_cols,
                });
            }
        }

        for &position in &self.null_biased_positions {
            if position >= count {
                return Err(ProblemError::NullBiasOutOfRange { position, count });
            }
        }

        Ok(())
    }
}
