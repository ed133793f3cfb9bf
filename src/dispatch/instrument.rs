//! Invocation instrumentation: runs before a virtual or interface
//! dispatch executes, on the symbolic side only. The concrete dispatch is
//! never altered.

use tracing::{trace, warn};

use crate::expr::{Expr, ExprRef};
use crate::runtime::ObjectId;
use crate::session::AnalysisSession;

use super::cache::CallSiteKey;
use super::hierarchy::{enumerate_implementors, sort_types, type_hierarchy};

/// Virtual (class-receiver) vs. interface dispatch. The qualification
/// predicate is the same; the kind is kept for the call-site descriptor
/// and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    Virtual,
    Interface,
}

/// One invoke instruction, as seen by the instrumentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeSite {
    /// Fully qualified caller method.
    pub caller: String,
    /// Bytecode position of the instruction within the caller.
    pub position: u32,
    pub kind: DispatchKind,
    /// Static class reference from the bytecode; `None` falls back to the
    /// callee's declaring class.
    pub declared_class: Option<String>,
    pub method_name: String,
    pub signature: String,
}

/// What one instrumented dispatch produced.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Index of the actual receiver type in the frozen order.
    pub branch: usize,
    /// The frozen type order at this site.
    pub types: Vec<String>,
    /// The exclusive discrimination constraints; `Some` on first visit
    /// only.
    pub constraints: Option<Vec<ExprRef>>,
}

/// Instrument one invocation. Returns `None` when the preconditions fail
/// (null or untracked receiver, no symbolic expression on the receiver
/// slot) or the declared type is filtered out; the concrete dispatch
/// proceeds either way.
pub fn instrument_invocation(
    session: &mut AnalysisSession,
    site: &InvokeSite,
    receiver: ObjectId,
    receiver_expr: Option<&ExprRef>,
) -> Option<DispatchOutcome> {
    let receiver_expr = receiver_expr?;
    if receiver.is_null() {
        return None;
    }
    let actual = session.heap.class_of(receiver)?.to_string();

    let declared = site
        .declared_class
        .clone()
        .or_else(|| {
            session
                .registry
                .declaring_class(&actual, &site.method_name, &site.signature)
        })
        .unwrap_or_else(|| actual.clone());

    if !session.config.dispatch.matches(&declared) {
        trace!(declared = %declared, "dispatch filtered out");
        return None;
    }

    let key = CallSiteKey::new(
        &site.caller,
        site.position,
        format!("{}.{}{}", declared, site.method_name, site.signature),
    );

    let (types, first_visit) = match session.dispatch_cache.lookup(&key) {
        Some(cached) => {
            let mut types = cached.to_vec();
            if !types.iter().any(|t| t == &actual) {
                // A runtime type the enumeration missed: extend and
                // re-sort once, then keep the new order frozen
                warn!(site = %key, class = %actual, "extending frozen type order with new receiver type");
                types.push(actual.clone());
                sort_types(&session.registry, &mut types);
                session.dispatch_cache.store(key.clone(), types.clone());
            }
            (types, false)
        }
        None => {
            let mut types = enumerate_implementors(
                &session.registry,
                &declared,
                &site.method_name,
                &site.signature,
            );
            if types.is_empty() {
                warn!(site = %key, declared = %declared, "no implementing types found, using declared type");
                types.push(declared.clone());
            }
            if !types.iter().any(|t| t == &actual) {
                types.push(actual.clone());
            }
            sort_types(&session.registry, &mut types);
            for name in &types {
                if let Some(record) = type_hierarchy(&session.registry, name) {
                    trace!(site = %key, hierarchy = ?record, "dispatch candidate");
                }
            }
            session.dispatch_cache.store(key.clone(), types.clone());
            (types, true)
        }
    };

    // Exclusive discrimination constraints, first visit only; replays
    // already have them in the recorded tree
    let constraints = first_visit.then(|| exclusive_constraints(receiver_expr, &types));

    let branch = match types.iter().position(|t| t == &actual) {
        Some(idx) => idx,
        None => {
            warn!(site = %key, class = %actual, "receiver type missing from frozen order, taking branch 0");
            0
        }
    };

    session.decision(key, branch, constraints.clone());

    Some(DispatchOutcome {
        branch,
        types,
        constraints,
    })
}

/// The cascade `c_i = InstanceOf(T_i) && !InstanceOf(T_0) && ... &&
/// !InstanceOf(T_{i-1})`, partitioning the branches.
fn exclusive_constraints(receiver: &ExprRef, types: &[String]) -> Vec<ExprRef> {
    types
        .iter()
        .enumerate()
        .map(|(i, type_name)| {
            let mut constraint = Expr::instance_of(receiver.clone(), type_name.clone());
            for earlier in &types[..i] {
                constraint = Expr::and(
                    constraint,
                    Expr::not(Expr::instance_of(receiver.clone(), earlier.clone())),
                );
            }
            constraint
        })
        .collect()
}
