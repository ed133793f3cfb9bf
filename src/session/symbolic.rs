//! Symbolic-objects registry: which heap locations carry symbolic names.
//!
//! After the oracle materialises a fresh object for a reference variable,
//! the object's fields are re-symbolised here under the dotted-path
//! convention (`head(ref).next(ref)`, `head(ref).value`) so the next
//! round of exploration observes them as symbolic.

use std::collections::{BTreeMap, HashSet};

use tracing::trace;

use crate::expr::{VarType, Variable, REF_SUFFIX};
use crate::runtime::{ClassRegistry, Heap, ObjectId};

/// A symbolic name attached to one field of one live object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicBinding {
    pub variable: Variable,
    pub object: ObjectId,
    pub field: String,
}

/// Registry of symbolic field bindings, keyed by variable name.
#[derive(Debug, Default)]
pub struct SymbolicObjects {
    by_name: BTreeMap<String, SymbolicBinding>,
}

impl SymbolicObjects {
    pub fn new() -> Self {
        SymbolicObjects::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&SymbolicBinding> {
        self.by_name.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.by_name.keys()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn register(&mut self, variable: Variable, object: ObjectId, field: impl Into<String>) {
        self.by_name.insert(
            variable.name.clone(),
            SymbolicBinding {
                variable,
                object,
                field: field.into(),
            },
        );
    }

    /// Re-symbolise a freshly materialised object under `name`.
    ///
    /// Walks the declared instance fields of the object's class, skipping
    /// irrelevant field names, and registers a fresh symbolic variable per
    /// field: `{name}.{field}(ref)` for reference fields, `{name}.{field}`
    /// for primitives. Returns how many bindings were created.
    pub fn process_polymorphic_object(
        &mut self,
        registry: &ClassRegistry,
        heap: &Heap,
        irrelevant: &HashSet<&str>,
        object: ObjectId,
        name: &str,
    ) -> usize {
        let Some(class_name) = heap.class_of(object) else {
            return 0;
        };
        let Some(class) = registry.lookup(class_name) else {
            return 0;
        };

        let base = name.strip_suffix(REF_SUFFIX).map(str::to_string);
        let base = base.as_deref().unwrap_or(name);

        let mut created = 0;
        for field in &class.fields {
            if irrelevant.contains(field.name.as_str()) {
                continue;
            }
            let variable = if field.is_reference() {
                Variable::reference(format!("{}.{}", name, field.name))
            } else {
                let vtype = match field.type_name.as_str() {
                    "boolean" => VarType::Bool,
                    "float" | "double" => VarType::Double,
                    _ => VarType::Long,
                };
                Variable::new(format!("{}.{}", base, field.name), vtype)
            };
            trace!(
                object = %object,
                field = %field.name,
                symbol = %variable.name,
                "re-symbolised field"
            );
            self.register(variable, object, field.name.clone());
            created += 1;
        }
        created
    }

    pub fn clear(&mut self) {
        self.by_name.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ClassInfo;

    #[test]
    fn test_process_polymorphic_object_names_fields() {
        let mut registry = ClassRegistry::new();
        registry.define(
            ClassInfo::class("Node")
                .with_field("next", "Node")
                .with_field("value", "int")
                .with_field("modCount", "int"),
        );
        let mut heap = Heap::new();
        let class = registry.lookup("Node").unwrap().clone();
        let id = heap.allocate(&class).unwrap();

        let mut symbolic = SymbolicObjects::new();
        let irrelevant: HashSet<&str> = ["modCount"].into_iter().collect();
        let created =
            symbolic.process_polymorphic_object(&registry, &heap, &irrelevant, id, "head(ref)");

        assert_eq!(created, 2, "modCount is skipped");
        assert!(symbolic.contains("head(ref).next(ref)"));
        assert!(symbolic.contains("head.value"));

        let next = symbolic.get("head(ref).next(ref)").unwrap();
        assert_eq!(next.object, id);
        assert_eq!(next.field, "next");
        assert!(next.variable.is_reference());
    }

    #[test]
    fn test_unknown_object_is_a_noop() {
        let registry = ClassRegistry::new();
        let heap = Heap::new();
        let mut symbolic = SymbolicObjects::new();
        let created = symbolic.process_polymorphic_object(
            &registry,
            &heap,
            &HashSet::new(),
            ObjectId(42),
            "x(ref)",
        );
        assert_eq!(created, 0);
        assert!(symbolic.is_empty());
    }
}
