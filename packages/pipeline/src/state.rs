//! Analysis state and the most recent published result per period.

use std::sync::Arc;

use bekasi_flood_geography_models::Period;
use serde::{Deserialize, Serialize};

use crate::outcome::PeriodOutcome;

/// Which periods currently have a published result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisState {
    /// Pre-flood risk scores are available.
    pub pre: bool,
    /// The during-flood mask and exposure are available.
    pub during: bool,
    /// The post-flood mask and exposure are available.
    pub post: bool,
}

impl AnalysisState {
    /// Flag of `period`.
    #[must_use]
    pub const fn get(self, period: Period) -> bool {
        match period {
            Period::Pre => self.pre,
            Period::During => self.during,
            Period::Post => self.post,
        }
    }

    /// A copy with the flag of `period` set to `value`.
    #[must_use]
    pub const fn with(mut self, period: Period, value: bool) -> Self {
        match period {
            Period::Pre => self.pre = value,
            Period::During => self.during = value,
            Period::Post => self.post = value,
        }
        self
    }
}

#[derive(Debug, Default)]
struct Slot {
    ticket: Option<u64>,
    outcome: Option<Arc<PeriodOutcome>>,
}

/// Published results guarded by run tickets.
///
/// Every run takes an increasing ticket before it starts. A successful run
/// replaces the period's result, unless a run with a newer ticket has
/// already published, so the latest request always wins. Flags only ever
/// go from `false` to `true`; failed runs never reach this table.
#[derive(Debug, Default)]
pub(crate) struct PublishedResults {
    state: AnalysisState,
    slots: [Slot; 3],
}

impl PublishedResults {
    /// Publishes the result of run `ticket`. Returns `false` if the run was
    /// superseded.
    pub(crate) fn publish(
        &mut self,
        period: Period,
        ticket: u64,
        outcome: Arc<PeriodOutcome>,
    ) -> bool {
        let slot = &mut self.slots[period.index()];
        if slot.ticket.is_some_and(|published| published > ticket) {
            return false;
        }

        slot.ticket = Some(ticket);
        slot.outcome = Some(outcome);
        self.state = self.state.with(period, true);
        true
    }

    pub(crate) const fn state(&self) -> AnalysisState {
        self.state
    }

    pub(crate) fn outcome(&self, period: Period) -> Option<Arc<PeriodOutcome>> {
        self.slots[period.index()].outcome.clone()
    }
}
