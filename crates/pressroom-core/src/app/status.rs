//! Status - run counts by state.

use serde::{Deserialize, Serialize};

use crate::domain::{RunRecord, RunState};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineCounts {
    pub queued: usize,
    pub running: usize,
    pub waiting: usize,
    pub complete: usize,
    pub errored: usize,
}

impl PipelineCounts {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a RunRecord>) -> Self {
        let mut counts = Self::default();
        for record in records {
            match record.state {
                RunState::Queued => counts.queued += 1,
                RunState::Running => counts.running += 1,
                RunState::Waiting => counts.waiting += 1,
                RunState::Complete => counts.complete += 1,
                RunState::Errored => counts.errored += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.queued + self.running + self.waiting + self.complete + self.errored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RenderRequest, RunId, RunOutcome};
    use chrono::Utc;
    use ulid::Ulid;

    fn record() -> RunRecord {
        let request = RenderRequest::new("https://example.com/a", "x@y.com").unwrap();
        RunRecord::new(RunId::from_ulid(Ulid::new()), request, Utc::now())
    }

    #[test]
    fn counts_each_state() {
        let queued = record();
        let mut complete = record();
        complete.mark_complete(RunOutcome::delivered(), Utc::now());
        let mut errored = record();
        errored.mark_errored("boom", Utc::now());

        let counts = PipelineCounts::from_records([&queued, &complete, &errored]);
        assert_eq!(counts.queued, 1);
        assert_eq!(counts.complete, 1);
        assert_eq!(counts.errored, 1);
        assert_eq!(counts.total(), 3);
    }
}
