//! Type-constraint simplification over exact-type predicates.
//!
//! Three checks run before any oracle query:
//!
//! 1. **Early UNSAT**: some type's predicate group is entirely
//!    unreachable - no model can pick that type, and if it is the only
//!    group left the formula is dead.
//! 2. **Conflicting exact types**: two top-level predicates pin the same
//!    path to two different runtime types.
//! 3. **Redundancy pruning**: unreachable duplicates of a type that still
//!    has a reachable predicate are rewritten to FALSE and the
//!    surrounding compounds simplified, shrinking the oracle query.

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;

use crate::expr::{walk, Expr, ExprRef, ExprVisitor, NodeId};
use crate::session::UnreachableSet;

/// Exact-type predicates grouped by type signature.
#[derive(Debug, Default)]
pub struct ExactTypeGroups {
    groups: BTreeMap<String, Vec<NodeId>>,
}

impl ExactTypeGroups {
    /// Collect every `IsExactType` node in `constraints`, grouped by its
    /// type signature.
    pub fn collect(constraints: &[ExprRef]) -> Self {
        struct Collector<'a> {
            groups: &'a mut BTreeMap<String, Vec<NodeId>>,
        }
        impl ExprVisitor for Collector<'_> {
            fn visit_is_exact_type(&mut self, id: NodeId, _target: &ExprRef, type_sig: &str) {
                self.groups.entry(type_sig.to_string()).or_default().push(id);
            }
        }

        let mut groups = BTreeMap::new();
        for constraint in constraints {
            walk(constraint, &mut Collector { groups: &mut groups });
        }
        ExactTypeGroups { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<NodeId>)> {
        self.groups.iter()
    }

    /// Type signatures whose every predicate is marked unreachable.
    pub fn fully_unreachable(&self, unreachable: &UnreachableSet) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|(_, ids)| !ids.is_empty() && ids.iter().all(|id| unreachable.contains(*id)))
            .map(|(sig, _)| sig.as_str())
            .collect()
    }

    /// Node ids of unreachable predicates belonging to types that still
    /// have at least one reachable predicate. These are the safe-to-prune
    /// duplicates.
    pub fn prunable(&self, unreachable: &UnreachableSet) -> HashSet<NodeId> {
        self.groups
            .values()
            .filter(|ids| ids.iter().any(|id| !unreachable.contains(*id)))
            .flatten()
            .filter(|id| unreachable.contains(**id))
            .copied()
            .collect()
    }
}

/// Does some exact-type group exist whose every predicate is unreachable?
/// Such a formula admits no model for that type and the solve can return
/// UNSAT without consulting the oracle.
pub fn has_unreachable_group(constraints: &[ExprRef], unreachable: &UnreachableSet) -> bool {
    !ExactTypeGroups::collect(constraints)
        .fully_unreachable(unreachable)
        .is_empty()
}

/// Two *top-level* exact-type predicates with different signatures: an
/// object has exactly one runtime type, so the formula is UNSAT. Returns
/// the first conflicting pair.
pub fn conflicting_exact_types(constraints: &[ExprRef]) -> Option<(String, String)> {
    let top_level: Vec<&str> = constraints
        .iter()
        .filter_map(|c| match c.as_ref() {
            Expr::IsExactType { type_sig, .. } => Some(type_sig.as_str()),
            _ => None,
        })
        .collect();

    top_level
        .iter()
        .tuple_combinations()
        .find(|(a, b)| a != b)
        .map(|(a, b)| (a.to_string(), b.to_string()))
}

/// Rewrite the constraint list, replacing prunable unreachable exact-type
/// predicates with FALSE and simplifying the surrounding compounds.
/// Constraints without prunable nodes are returned unchanged (shared).
pub fn prune_unreachable(constraints: &[ExprRef], unreachable: &UnreachableSet) -> Vec<ExprRef> {
    let prunable = ExactTypeGroups::collect(constraints).prunable(unreachable);
    if prunable.is_empty() {
        return constraints.to_vec();
    }
    constraints
        .iter()
        .map(|c| rewrite(c, &prunable))
        .collect()
}

/// Replace marked nodes with FALSE, folding:
/// `AND(FALSE, x) = AND(x, FALSE) = FALSE`, `OR(FALSE, x) = x`,
/// `OR(x, FALSE) = x`. Other nodes are rebuilt only when a child changed.
fn rewrite(expr: &ExprRef, prunable: &HashSet<NodeId>) -> ExprRef {
    match expr.as_ref() {
        Expr::IsExactType { id, .. } if prunable.contains(id) => {
            std::sync::Arc::new(Expr::False)
        }

        Expr::And(lhs, rhs) => {
            let l = rewrite(lhs, prunable);
            let r = rewrite(rhs, prunable);
            if matches!(l.as_ref(), Expr::False) || matches!(r.as_ref(), Expr::False) {
                std::sync::Arc::new(Expr::False)
            } else if unchanged(lhs, &l) && unchanged(rhs, &r) {
                expr.clone()
            } else {
                Expr::and(l, r)
            }
        }

        Expr::Or(lhs, rhs) => {
            let l = rewrite(lhs, prunable);
            let r = rewrite(rhs, prunable);
            if matches!(l.as_ref(), Expr::False) {
                r
            } else if matches!(r.as_ref(), Expr::False) {
                l
            } else if unchanged(lhs, &l) && unchanged(rhs, &r) {
                expr.clone()
            } else {
                Expr::or(l, r)
            }
        }

        Expr::Not(inner) => {
            let i = rewrite(inner, prunable);
            if unchanged(inner, &i) {
                expr.clone()
            } else {
                Expr::not(i)
            }
        }

        // Remaining nodes cannot contain an IsExactType in a position the
        // pruner targets, so they pass through shared.
        _ => expr.clone(),
    }
}

fn unchanged(before: &ExprRef, after: &ExprRef) -> bool {
    std::sync::Arc::ptr_eq(before, after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Variable;

    fn exact(sig: &str) -> ExprRef {
        Expr::is_exact_type(Expr::var(Variable::reference("x")), sig)
    }

    fn node_id(expr: &ExprRef) -> NodeId {
        match expr.as_ref() {
            Expr::IsExactType { id, .. } => *id,
            _ => panic!("not an exact-type node"),
        }
    }

    // ========================================================================
    // Early UNSAT
    // ========================================================================

    #[test]
    fn test_fully_unreachable_group_is_unsat() {
        let dog = exact("LDog;");
        let mut unreachable = UnreachableSet::new();
        unreachable.mark(node_id(&dog));

        assert!(has_unreachable_group(&[dog], &unreachable));
    }

    #[test]
    fn test_group_with_reachable_member_is_not_unsat() {
        let dog1 = exact("LDog;");
        let dog2 = exact("LDog;");
        let mut unreachable = UnreachableSet::new();
        unreachable.mark(node_id(&dog1));

        assert!(!has_unreachable_group(&[dog1, dog2], &unreachable));
    }

    #[test]
    fn test_no_groups_no_unsat() {
        assert!(!has_unreachable_group(&[], &UnreachableSet::new()));
    }

    // ========================================================================
    // Conflicting exact types
    // ========================================================================

    #[test]
    fn test_distinct_top_level_exact_types_conflict() {
        let conflict = conflicting_exact_types(&[exact("LDog;"), exact("LCat;")]);
        assert_eq!(
            conflict,
            Some(("LDog;".to_string(), "LCat;".to_string()))
        );
    }

    #[test]
    fn test_same_type_twice_is_fine() {
        assert_eq!(conflicting_exact_types(&[exact("LDog;"), exact("LDog;")]), None);
    }

    #[test]
    fn test_nested_exact_types_do_not_conflict() {
        // Only direct top-level predicates count; disjunctions are fine
        let nested = Expr::or(exact("LDog;"), exact("LCat;"));
        assert_eq!(conflicting_exact_types(&[nested]), None);
    }

    // ========================================================================
    // Redundancy pruning
    // ========================================================================

    #[test]
    fn test_prune_replaces_unreachable_duplicate_in_or() {
        let dead = exact("LDog;");
        let live = exact("LDog;");
        let other = exact("LCat;");
        let formula = Expr::or(dead.clone(), other.clone());

        let mut unreachable = UnreachableSet::new();
        unreachable.mark(node_id(&dead));

        // `live` keeps the LDog; group reachable, so `dead` is prunable
        let pruned = prune_unreachable(&[formula, live.clone()], &unreachable);
        assert_eq!(pruned.len(), 2);
        assert!(
            std::sync::Arc::ptr_eq(&pruned[0], &other),
            "OR(FALSE, x) collapses to x"
        );
        assert!(std::sync::Arc::ptr_eq(&pruned[1], &live));
    }

    #[test]
    fn test_prune_collapses_and_to_false() {
        let dead = exact("LDog;");
        let live = exact("LDog;");
        let keep = Expr::instance_of(Expr::var(Variable::reference("x")), "Cat");
        let formula = Expr::and(keep, dead.clone());

        let mut unreachable = UnreachableSet::new();
        unreachable.mark(node_id(&dead));

        let pruned = prune_unreachable(&[formula, live], &unreachable);
        assert!(matches!(pruned[0].as_ref(), Expr::False));
    }

    #[test]
    fn test_prune_leaves_untouched_constraints_shared() {
        let live = exact("LDog;");
        let plain = Expr::instance_of(Expr::var(Variable::reference("x")), "Cat");
        let input = vec![live.clone(), plain.clone()];

        let pruned = prune_unreachable(&input, &UnreachableSet::new());
        assert!(std::sync::Arc::ptr_eq(&pruned[0], &live));
        assert!(std::sync::Arc::ptr_eq(&pruned[1], &plain));
    }

    #[test]
    fn test_prune_does_not_touch_fully_dead_groups() {
        // A fully unreachable group is the early-UNSAT case, not pruning
        let dead = exact("LDog;");
        let mut unreachable = UnreachableSet::new();
        unreachable.mark(node_id(&dead));

        let pruned = prune_unreachable(&[dead.clone()], &unreachable);
        assert!(
            std::sync::Arc::ptr_eq(&pruned[0], &dead),
            "no reachable member, so nothing is prunable"
        );
    }

    #[test]
    fn test_pruning_preserves_reachable_variant() {
        // Scenario: one type variant of a dispatch proven dead, its
        // sibling still live - the query keeps the live branch only.
        let recv = Expr::var(Variable::reference("a"));
        let dead = exact("LCat;");
        let live_cat = exact("LCat;");
        let dog = Expr::instance_of(recv, "Dog");
        let formula = Expr::or(dog.clone(), dead.clone());

        let mut unreachable = UnreachableSet::new();
        unreachable.mark(node_id(&dead));

        let pruned = prune_unreachable(&[formula, live_cat], &unreachable);
        assert!(std::sync::Arc::ptr_eq(&pruned[0], &dog));
    }
}
