/// Job state definitions for tracking crawl progress
///
/// A job moves strictly forward through its states; there is no cancel.
use crate::HarvestError;
use std::fmt;

/// Represents the current state of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Job id derived, nothing fetched yet
    Created,

    /// Page workers (or nested crawls) are producing records
    Running,

    /// All producers finished; the output channel is being closed
    Draining,

    /// Output closed and finish metadata written
    Finished,
}

impl JobState {
    /// Returns true if `next` is the state directly after this one
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Running)
                | (Self::Running, Self::Draining)
                | (Self::Draining, Self::Finished)
        )
    }

    /// Moves to `next`, refusing anything but the next state in line
    pub fn transition(self, next: JobState) -> Result<JobState, HarvestError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(HarvestError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
