//! Pythia - hybrid concolic constraint solving with oracle delegation.
//!
//! Pythia extends a concolic execution engine with reasoning about
//! **high-level constraints**: predicates over runtime types, references,
//! and heap shape that a numeric solver cannot discharge. Base
//! constraints flow to an underlying solver; high-level constraints are
//! held in scope frames and delegated to an external LLM-backed oracle
//! over HTTP, together with the context the oracle needs to answer.
//!
//! # Architecture
//!
//! - **Expression algebra** (`expr`): immutable constraint trees with a
//!   visitor; `IsExactType` and `InstanceOf` nodes mark the high-level
//!   fragment, reference variables carry the `(ref)` naming convention.
//! - **Runtime model** (`runtime`): the class registry (with a scannable
//!   class path), the heap, and thread frames the collectors read.
//! - **Analysis session** (`session`): all per-analysis state - decision
//!   log, symbolic-objects registry, unreachability side table, call-site
//!   cache - owned in one value instead of process globals.
//! - **Solving** (`solver`): the scope stack that partitions constraints,
//!   the exact-type simplifier, a concrete base solver, and the
//!   [`solver::HybridSolver`] that orchestrates the oracle round trip.
//! - **Collectors** (`collect`): the bounded heap slice and annotated
//!   source excerpts shipped with each query.
//! - **Oracle** (`oracle`): wire protocol, blocking HTTP client, and the
//!   materialiser that allocates fresh objects for SAT replies and
//!   re-symbolises their fields.
//! - **Dispatch** (`dispatch`): instrumentation that fires before a
//!   virtual or interface call, enumerates implementing types, emits
//!   mutually exclusive `InstanceOf` cascades, and records stable branch
//!   indices.
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use pythia::config::Config;
//! use pythia::expr::{CompareOp, Expr, Variable};
//! use pythia::session::AnalysisSession;
//! use pythia::solver::{ConcreteSolver, ConstraintSolver, HybridSolver, Valuation};
//!
//! let session = Arc::new(Mutex::new(AnalysisSession::new(Config::default())));
//! let mut solver = HybridSolver::new(ConcreteSolver::new(), session);
//!
//! solver.push();
//! solver.add(vec![Expr::compare(
//!     CompareOp::Ne,
//!     Expr::var(Variable::reference("head")),
//!     Expr::null(),
//! )]);
//! let mut valuation = Valuation::new();
//! let verdict = solver.solve(&mut valuation);
//! # let _ = verdict;
//! ```
//!
//! The oracle endpoint and timeout come from `pythia.toml` or the
//! `SERVICE_URL` / `TIMEOUT_SECONDS` environment variables; an
//! unreachable oracle never fails an analysis - the base solver's verdict
//! stands.

pub mod collect;
pub mod config;
pub mod dispatch;
pub mod expr;
pub mod oracle;
pub mod runtime;
pub mod session;
pub mod solver;

pub use config::Config;
pub use dispatch::{instrument_invocation, DispatchKind, InvokeSite};
pub use expr::{Expr, ExprRef, Variable};
pub use oracle::{OracleClient, OracleReply, OracleRequest};
pub use session::AnalysisSession;
pub use solver::{ConcreteSolver, ConstraintSolver, HybridSolver, Valuation, Verdict};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_hybrid_solver_builds_from_defaults() {
        let session = Arc::new(Mutex::new(AnalysisSession::new(Config::default())));
        let mut solver = HybridSolver::new(ConcreteSolver::new(), session);
        let mut valuation = Valuation::new();
        assert_eq!(solver.solve(&mut valuation), Verdict::Sat);
    }

    #[test]
    fn test_high_level_constraint_is_held_back() {
        let session = Arc::new(Mutex::new(AnalysisSession::new(Config::default())));
        let mut solver = HybridSolver::new(ConcreteSolver::new(), session);
        solver.add(vec![Expr::instance_of(
            Expr::var(Variable::reference("a")),
            "Dog",
        )]);
        assert_eq!(solver.high_level_constraints().len(), 1);
    }
}
