//! Solving layer: the `ConstraintSolver` contract, the scope-stacked
//! constraint partitioning, the type-constraint simplifier, and the
//! hybrid context that delegates high-level constraints to the oracle.

pub mod concrete;
pub mod hybrid;
pub mod scope;
pub mod simplify;
pub mod valuation;

use std::fmt;

use crate::expr::ExprRef;

pub use concrete::ConcreteSolver;
pub use hybrid::{HybridSolver, SolveStats};
pub use scope::ScopeStack;
pub use valuation::Valuation;

/// Satisfiability verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Sat,
    Unsat,
    Unknown,
    DontKnow,
}

impl Verdict {
    pub fn is_sat(&self) -> bool {
        matches!(self, Verdict::Sat)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Sat => "SAT",
            Verdict::Unsat => "UNSAT",
            Verdict::Unknown => "UNKNOWN",
            Verdict::DontKnow => "DONT_KNOW",
        };
        f.write_str(s)
    }
}

/// The push/pop/add/solve contract shared by the underlying solver and
/// the hybrid context layered on top of it.
pub trait ConstraintSolver {
    /// Open a new constraint scope.
    fn push(&mut self);

    /// Close the top `frames` scopes.
    fn pop(&mut self, frames: usize);

    /// Add constraints to the current scope.
    fn add(&mut self, constraints: Vec<ExprRef>);

    /// Decide satisfiability of everything added so far; on SAT the
    /// valuation is augmented with a model.
    fn solve(&mut self, valuation: &mut Valuation) -> Verdict;

    /// Release solver resources. Further use is undefined.
    fn dispose(&mut self) {}
}
