//! The decision log: every branch the instrumentation has recorded with
//! the explorer, with the constraints that discriminate the branches.
//!
//! The simplifier reads the log to widen its view beyond the current
//! path: a type variant proven unreachable anywhere in the recorded tree
//! can be pruned from oracle queries before the branch is ever revisited.

use crate::dispatch::cache::CallSiteKey;
use crate::expr::ExprRef;

use super::UnreachableSet;

/// One recorded dispatch decision.
#[derive(Debug, Clone)]
pub struct Decision {
    pub site: CallSiteKey,
    /// Index of the taken branch into the site's frozen type order.
    pub branch: usize,
    /// The full branch-discrimination constraint list, one entry per
    /// possible type. `None` on replay (the constraints are already in
    /// the log from the first visit).
    pub constraints: Option<Vec<ExprRef>>,
}

/// Append-only log of decisions for one analysis.
#[derive(Debug, Default)]
pub struct DecisionLog {
    decisions: Vec<Decision>,
}

impl DecisionLog {
    pub fn new() -> Self {
        DecisionLog::default()
    }

    pub fn record(&mut self, site: CallSiteKey, branch: usize, constraints: Option<Vec<ExprRef>>) {
        self.decisions.push(Decision {
            site,
            branch,
            constraints,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decision> {
        self.decisions.iter()
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Every high-level constraint recorded anywhere in the log, across
    /// all branches of all decisions. Duplicates are tolerated by the
    /// consumer.
    pub fn high_level_constraints(&self) -> Vec<ExprRef> {
        self.decisions
            .iter()
            .filter_map(|d| d.constraints.as_ref())
            .flatten()
            .filter(|c| c.contains_high_level())
            .cloned()
            .collect()
    }

    /// Mark every exact-type predicate inside the given branch's
    /// constraint as unreachable. Used when the explorer finds a recorded
    /// branch unrealisable.
    pub fn mark_branch_unreachable(
        &self,
        site: &CallSiteKey,
        branch: usize,
        unreachable: &mut UnreachableSet,
    ) {
        for decision in &self.decisions {
            if &decision.site != site {
                continue;
            }
            if let Some(constraint) = decision
                .constraints
                .as_ref()
                .and_then(|cs| cs.get(branch))
            {
                unreachable.mark_all_in(constraint);
            }
        }
    }

    pub fn clear(&mut self) {
        self.decisions.clear();
    }
}
