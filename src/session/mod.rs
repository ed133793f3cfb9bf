//! The analysis session: all per-analysis mutable state in one owned
//! value.
//!
//! The session stands in for the concolic explorer's handle. It owns the
//! VM model (class registry, heap, thread), the decision log, the
//! symbolic-objects registry, the unreachability side table, and the
//! call-site cache. Components receive a borrow of the session instead of
//! reaching for process globals, so multiple analyses never share state.

pub mod decisions;
pub mod symbolic;

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::Config;
use crate::dispatch::cache::{CallSiteCache, CallSiteKey};
use crate::expr::{Expr, ExprRef, ExprVisitor, NodeId};
use crate::runtime::{ClassRegistry, Heap, ThreadState};

pub use decisions::{Decision, DecisionLog};
pub use symbolic::{SymbolicBinding, SymbolicObjects};

/// Side table of exact-type predicates proven unrealisable. Keys are the
/// stable node ids of `Expr::IsExactType` nodes; the nodes themselves stay
/// immutable and shareable.
#[derive(Debug, Clone, Default)]
pub struct UnreachableSet {
    ids: HashSet<NodeId>,
}

impl UnreachableSet {
    pub fn new() -> Self {
        UnreachableSet::default()
    }

    pub fn mark(&mut self, id: NodeId) {
        self.ids.insert(id);
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.ids.contains(&id)
    }

    /// Mark every exact-type predicate in `expr` unreachable.
    pub fn mark_all_in(&mut self, expr: &ExprRef) {
        struct Marker<'a> {
            ids: &'a mut HashSet<NodeId>,
        }
        impl ExprVisitor for Marker<'_> {
            fn visit_is_exact_type(&mut self, id: NodeId, _target: &ExprRef, _sig: &str) {
                self.ids.insert(id);
            }
        }
        crate::expr::walk(expr, &mut Marker { ids: &mut self.ids });
    }

    /// Is any exact-type predicate in `expr` marked?
    pub fn contains_any_in(&self, expr: &ExprRef) -> bool {
        struct Probe<'a> {
            ids: &'a HashSet<NodeId>,
            hit: bool,
        }
        impl ExprVisitor for Probe<'_> {
            fn visit_is_exact_type(&mut self, id: NodeId, _target: &ExprRef, _sig: &str) {
                if self.ids.contains(&id) {
                    self.hit = true;
                }
            }
        }
        let mut probe = Probe {
            ids: &self.ids,
            hit: false,
        };
        crate::expr::walk(expr, &mut probe);
        probe.hit
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// The method currently under analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    pub class_name: String,
    pub method_name: String,
    pub signature: String,
}

impl MethodRef {
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        MethodRef {
            class_name: class_name.into(),
            method_name: method_name.into(),
            signature: signature.into(),
        }
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}{}", self.class_name, self.method_name, self.signature)
    }
}

/// All mutable state for one concolic analysis.
#[derive(Debug)]
pub struct AnalysisSession {
    pub config: Config,
    pub registry: ClassRegistry,
    pub heap: Heap,
    pub thread: ThreadState,
    pub decisions: DecisionLog,
    pub symbolic: SymbolicObjects,
    pub unreachable: UnreachableSet,
    pub dispatch_cache: CallSiteCache,
    /// The method driving this analysis, when known.
    pub method_under_analysis: Option<MethodRef>,
    /// Parameter name -> declared static type, including `this` for
    /// instance methods.
    pub parameter_types: BTreeMap<String, String>,
    /// Cached class source text, keyed by class name. `None` records a
    /// failed lookup so it is not retried.
    pub source_cache: HashMap<String, Option<String>>,
    collecting: bool,
}

impl AnalysisSession {
    pub fn new(config: Config) -> Self {
        AnalysisSession {
            config,
            registry: ClassRegistry::new(),
            heap: Heap::new(),
            thread: ThreadState::new(),
            decisions: DecisionLog::new(),
            symbolic: SymbolicObjects::new(),
            unreachable: UnreachableSet::new(),
            dispatch_cache: CallSiteCache::new(),
            method_under_analysis: None,
            parameter_types: BTreeMap::new(),
            source_cache: HashMap::new(),
            collecting: true,
        }
    }

    /// Are we collecting fresh decisions (true) or replaying a recorded
    /// path prefix (false)?
    pub fn needs_decisions(&self) -> bool {
        self.collecting
    }

    pub fn set_needs_decisions(&mut self, collecting: bool) {
        self.collecting = collecting;
    }

    /// Record a branch decision with the explorer. On replay the
    /// constraints argument is `None`.
    pub fn decision(
        &mut self,
        site: CallSiteKey,
        branch: usize,
        constraints: Option<Vec<ExprRef>>,
    ) {
        self.decisions.record(site, branch, constraints);
    }

    /// Reset per-analysis state for a fresh analysis over the same VM.
    /// The class registry and heap survive; caches and logs do not.
    pub fn start_analysis(&mut self) {
        self.dispatch_cache.clear();
        self.decisions.clear();
        self.symbolic.clear();
        self.unreachable.clear();
        self.source_cache.clear();
        self.collecting = true;
    }

    /// Convenience: is this expression's exact-type group fully dead as
    /// far as this session knows?
    pub fn is_unreachable(&self, expr: &ExprRef) -> bool {
        match expr.as_ref() {
            Expr::IsExactType { id, .. } => self.unreachable.contains(*id),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Variable;

    #[test]
    fn test_start_analysis_clears_caches_but_keeps_vm() {
        let mut session = AnalysisSession::new(Config::default());
        session
            .registry
            .define(crate::runtime::ClassInfo::class("Dog"));
        let class = session.registry.lookup("Dog").unwrap().clone();
        let id = session.heap.allocate(&class).unwrap();

        session.dispatch_cache.store(
            CallSiteKey::new("A.m()V", 0, "B.n()V"),
            vec!["B".to_string()],
        );
        session.decision(CallSiteKey::new("A.m()V", 0, "B.n()V"), 0, None);
        session.set_needs_decisions(false);

        session.start_analysis();

        assert!(session.dispatch_cache.is_empty());
        assert!(session.decisions.is_empty());
        assert!(session.needs_decisions());
        assert!(session.heap.contains(id), "heap survives");
        assert!(session.registry.lookup("Dog").is_some(), "classes survive");
    }

    #[test]
    fn test_unreachable_set_marks_nested_predicates() {
        let exact = Expr::is_exact_type(Expr::var(Variable::reference("x")), "LDog;");
        let wrapped = Expr::or(exact.clone(), Expr::instance_of(
            Expr::var(Variable::reference("x")),
            "Cat",
        ));

        let mut set = UnreachableSet::new();
        assert!(!set.contains_any_in(&wrapped));
        set.mark_all_in(&wrapped);
        assert!(set.contains_any_in(&exact));
        assert_eq!(set.len(), 1, "only exact-type nodes are tracked");
    }
}
