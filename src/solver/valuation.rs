//! Variable-to-value bindings produced by a solve.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use crate::expr::{VarType, Variable};
use crate::runtime::{ObjectId, Value};

/// A set of `(Variable, Value)` bindings with typed writes.
#[derive(Debug, Clone, Default)]
pub struct Valuation {
    entries: BTreeMap<String, (Variable, Value)>,
}

impl Valuation {
    pub fn new() -> Self {
        Valuation::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries.get(name).map(|(_, v)| *v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.entries.get(name).map(|(var, _)| var)
    }

    /// Bind `variable` to `value`, coercing the value to the variable's
    /// declared type where the coercion is meaningful. A reference
    /// variable accepts an integer as a raw object id (0 is null).
    pub fn set(&mut self, variable: &Variable, value: Value) {
        let coerced = match (variable.vtype, value) {
            (VarType::Reference, Value::Long(n)) => Value::Ref(ObjectId(n.max(0) as u64)),
            (VarType::Long, Value::Double(x)) => Value::Long(x as i64),
            (VarType::Long, Value::Bool(b)) => Value::Long(b as i64),
            (VarType::Double, Value::Long(n)) => Value::Double(n as f64),
            (VarType::Bool, Value::Long(n)) => Value::Bool(n != 0),
            _ => value,
        };
        self.entries
            .insert(variable.name.clone(), (variable.clone(), coerced));
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.entries.values().map(|(var, _)| var)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variable, Value)> {
        self.entries.values().map(|(var, value)| (var, *value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Valuation {
    type Item = (&'a String, &'a (Variable, Value));
    type IntoIter = btree_map::Iter<'a, String, (Variable, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for Valuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, (_, value))) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", name, value)?;
        }
        write!(f, "}}")
    }
}
