//! Scope-stacked storage for high-level constraints.
//!
//! Each frame owns the high-level constraints added within that scope and
//! a map of the free variables those constraints mention. Pushing a frame
//! clones the variable map from the enclosing scope so outer variables
//! stay in view when inner frames add new ones; popping removes frames
//! pairwise. The bottom frame is a sentinel that is never popped.

use std::collections::BTreeMap;

use crate::expr::{collect_variables, ExprRef, Variable};

/// Stack of (constraints, free-variables) frames for high-level
/// constraints.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    constraints: Vec<Vec<ExprRef>>,
    variables: Vec<BTreeMap<String, Variable>>,
}

impl ScopeStack {
    /// A stack with the single sentinel frame.
    pub fn new() -> Self {
        ScopeStack {
            constraints: vec![Vec::new()],
            variables: vec![BTreeMap::new()],
        }
    }

    /// Open a new scope: an empty constraint list and a clone of the
    /// enclosing scope's variable map.
    pub fn push(&mut self) {
        self.constraints.push(Vec::new());
        let inherited = self.variables.last().cloned().unwrap_or_default();
        self.variables.push(inherited);
    }

    /// Close the top `frames` scopes pairwise. The sentinel frame always
    /// survives.
    pub fn pop(&mut self, frames: usize) {
        for _ in 0..frames {
            if self.constraints.len() > 1 {
                self.constraints.pop();
                self.variables.pop();
            }
        }
    }

    /// Append a high-level constraint to the top frame, unioning its free
    /// variables into the top variable map.
    pub fn add(&mut self, constraint: ExprRef) {
        let vars = self
            .variables
            .last_mut()
            .expect("scope stack keeps a sentinel frame");
        collect_variables(&constraint, vars);
        self.constraints
            .last_mut()
            .expect("scope stack keeps a sentinel frame")
            .push(constraint);
    }

    /// Number of frames, sentinel included.
    pub fn depth(&self) -> usize {
        debug_assert_eq!(self.constraints.len(), self.variables.len());
        self.constraints.len()
    }

    /// Any high-level constraint in any frame?
    pub fn has_high_level(&self) -> bool {
        self.constraints.iter().any(|frame| !frame.is_empty())
    }

    /// All high-level constraints, flattened over frames in push order.
    pub fn all_constraints(&self) -> Vec<ExprRef> {
        self.constraints.iter().flatten().cloned().collect()
    }

    /// Free variables visible in the current scope.
    pub fn free_variables(&self) -> &BTreeMap<String, Variable> {
        self.variables
            .last()
            .expect("scope stack keeps a sentinel frame")
    }

    pub fn clear(&mut self) {
        self.constraints.clear();
        self.variables.clear();
        self.constraints.push(Vec::new());
        self.variables.push(BTreeMap::new());
    }
}
