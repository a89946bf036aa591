//! Per-substitution observation hooks.
//!
//! Both collaborators are optional: the scheduler runs identically with or
//! without them, and the only externally observable side effects of a run
//! are these hooks and the returned result.

use std::io::{self, BufWriter, Write};

/// One attempted substitution, reported after the acceptance decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubstitutionEvent {
    pub position: usize,
    /// State before the attempt (0 when the position was unassigned).
    pub previous_state: usize,
    pub candidate_state: usize,
    /// Effective temperature; quench steps report 0.
    pub temperature: f64,
    pub accepted: bool,
}

/// Callback invoked once per attempted (not skipped) inner-loop iteration.
pub trait AnnealObserver {
    fn observe_substitution(&mut self, event: &SubstitutionEvent);
}

/// Append-only text record of every attempted substitution.
pub trait TrajectorySink {
    fn record(&mut self, position: usize, state: usize, accepted: bool) -> io::Result<()>;
}

/// Buffered [`TrajectorySink`] writing one `"<position> <state> A"` or
/// `"<position> <state> R"` line per attempt.
pub struct TrajectoryWriter<W: Write> {
    out: BufWriter<W>,
}

impl<W: Write> TrajectoryWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            out: BufWriter::new(writer),
        }
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> io::Result<W> {
        self.out.into_inner().map_err(io::IntoInnerError::into_error)
    }
}

impl<W: Write> TrajectorySink for TrajectoryWriter<W> {
    fn record(&mut self, position: usize, state: usize, accepted: bool) -> io::Result<()> {
        let mark = if accepted { 'A' } else { 'R' };
        writeln!(self.out, "{} {} {}", position, state, mark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trajectory_lines_match_the_expected_format() {
        let mut writer = TrajectoryWriter::new(Vec::new());
        writer.record(3, 7, true).unwrap();
        writer.record(0, 2, false).unwrap();

        let bytes = writer.into_inner().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "3 7 A\n0 2 R\n");
    }
}
