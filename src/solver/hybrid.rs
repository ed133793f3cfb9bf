//! The hybrid solver context: base constraints go to the underlying
//! solver, high-level constraints are held back and delegated to the
//! oracle when the base layer is satisfiable.
//!
//! Solve order:
//! 1. no high-level constraints anywhere: pure base solve;
//! 2. base solver UNSAT or unknown: returned verbatim, no oracle call;
//! 3. early UNSAT over the merged view (current path plus every recorded
//!    decision constraint);
//! 4. redundancy pruning and the direct exact-type conflict check on the
//!    current path;
//! 5. context collection (parameter types, source, heap slice), each
//!    failure degrading to an omitted field;
//! 6. the oracle round trip, materialising the reply's valuation on SAT.
//!
//! A transport failure never fails the analysis: the base verdict (SAT at
//! that point) is returned and exploration continues.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::collect::{collect_heap, collect_source};
use crate::expr::ExprRef;
use crate::oracle::{apply_valuation, OracleClient, OracleRequest};
use crate::session::AnalysisSession;

use super::scope::ScopeStack;
use super::simplify;
use super::{ConstraintSolver, Valuation, Verdict};

/// Counters kept across a solver context's lifetime; logged on dispose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveStats {
    pub base_calls: usize,
    pub oracle_queries: usize,
    pub early_unsat: usize,
    pub type_conflicts: usize,
    pub materialised: usize,
    pub degraded: usize,
}

/// `ConstraintSolver` implementation layering oracle delegation over an
/// underlying solver `S`.
pub struct HybridSolver<S: ConstraintSolver> {
    base: S,
    scopes: ScopeStack,
    session: Arc<Mutex<AnalysisSession>>,
    client: OracleClient,
    stats: SolveStats,
}

impl<S: ConstraintSolver> HybridSolver<S> {
    /// Layer over `base`, reading the oracle endpoint from the session's
    /// configuration (with environment overrides).
    pub fn new(base: S, session: Arc<Mutex<AnalysisSession>>) -> Self {
        let client = {
            let session = session.lock().expect("session mutex");
            OracleClient::from_config(&session.config.oracle)
        };
        HybridSolver::with_client(base, session, client)
    }

    pub fn with_client(
        base: S,
        session: Arc<Mutex<AnalysisSession>>,
        client: OracleClient,
    ) -> Self {
        HybridSolver {
            base,
            scopes: ScopeStack::new(),
            session,
            client,
            stats: SolveStats::default(),
        }
    }

    pub fn stats(&self) -> SolveStats {
        self.stats
    }

    pub fn session(&self) -> Arc<Mutex<AnalysisSession>> {
        Arc::clone(&self.session)
    }

    /// High-level constraints currently in scope, flattened.
    pub fn high_level_constraints(&self) -> Vec<ExprRef> {
        self.scopes.all_constraints()
    }

    /// Pre-oracle work done under the session lock: the early-UNSAT and
    /// conflict checks, then context collection into a ready request.
    fn prepare_query(&mut self, valuation: &Valuation) -> Result<OracleRequest, Verdict> {
        let mut guard = self.session.lock().expect("session mutex");
        let session: &mut AnalysisSession = &mut guard;

        // Merged view: the current path plus every decision constraint
        // recorded anywhere in the tree (duplicates tolerated)
        let mut merged = self.scopes.all_constraints();
        merged.extend(session.decisions.high_level_constraints());
        if simplify::has_unreachable_group(&merged, &session.unreachable) {
            debug!("early UNSAT: an exact-type group is fully unreachable");
            self.stats.early_unsat += 1;
            return Err(Verdict::Unsat);
        }

        let pruned = simplify::prune_unreachable(&self.scopes.all_constraints(), &session.unreachable);
        if let Some((a, b)) = simplify::conflicting_exact_types(&pruned) {
            debug!(first = %a, second = %b, "conflicting exact types");
            self.stats.type_conflicts += 1;
            return Err(Verdict::Unsat);
        }

        let params = session.parameter_types.clone();

        let source_context = match collect_source(
            &session.config.source,
            &session.registry,
            &session.thread,
            session.method_under_analysis.as_ref(),
            &pruned,
            &params,
            &mut session.source_cache,
        ) {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                debug!(error = %e, "source context unavailable, omitting");
                None
            }
        };

        let heap_state = match collect_heap(
            &session.config.heap,
            &session.registry,
            &session.heap,
            &session.thread,
            &pruned,
            valuation,
        ) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                debug!(error = %e, "heap state unavailable, omitting");
                None
            }
        };

        let hint = session
            .method_under_analysis
            .as_ref()
            .map(|m| m.qualified())
            .unwrap_or_else(|| "solve".to_string());

        Ok(OracleRequest::new(&pruned, hint)
            .with_heap_state(heap_state)
            .with_parameter_types(params)
            .with_source_context(source_context))
    }
}

impl<S: ConstraintSolver> ConstraintSolver for HybridSolver<S> {
    fn push(&mut self) {
        self.scopes.push();
        self.base.push();
    }

    fn pop(&mut self, frames: usize) {
        self.scopes.pop(frames);
        self.base.pop(frames);
    }

    fn add(&mut self, constraints: Vec<ExprRef>) {
        let (high, normal): (Vec<ExprRef>, Vec<ExprRef>) = constraints
            .into_iter()
            .partition(|c| c.contains_high_level());
        if !normal.is_empty() {
            self.base.add(normal);
        }
        for constraint in high {
            self.scopes.add(constraint);
        }
    }

    fn solve(&mut self, valuation: &mut Valuation) -> Verdict {
        if !self.scopes.has_high_level() {
            self.stats.base_calls += 1;
            return self.base.solve(valuation);
        }

        self.stats.base_calls += 1;
        let base_verdict = self.base.solve(valuation);
        if !base_verdict.is_sat() {
            debug!(verdict = %base_verdict, "base solver not SAT, skipping oracle");
            return base_verdict;
        }

        // The lock is dropped before the HTTP round trip
        let request = match self.prepare_query(valuation) {
            Ok(request) => request,
            Err(verdict) => return verdict,
        };

        self.stats.oracle_queries += 1;
        match self.client.query(&request) {
            Ok(reply) => {
                let verdict: Verdict = reply.result.into();
                debug!(verdict = %verdict, "oracle answered");
                if verdict.is_sat() {
                    if let Some(entries) = &reply.valuation {
                        let mut session = self.session.lock().expect("session mutex");
                        let outcome = apply_valuation(
                            &mut session,
                            entries,
                            self.scopes.free_variables(),
                            valuation,
                        );
                        self.stats.materialised += outcome.allocated;
                    }
                }
                verdict
            }
            Err(e) => {
                warn!(error = %e, verdict = %base_verdict, "oracle unreachable, keeping base verdict");
                self.stats.degraded += 1;
                base_verdict
            }
        }
    }

    fn dispose(&mut self) {
        debug!(stats = ?self.stats, "disposing hybrid solver");
        self.base.dispose();
    }
}
