//! Implementing-type enumeration and the stable type order.
//!
//! Enumeration prefers the class-path scan (definitions visible without
//! resolving, the way a lightweight bytecode reader walks `.class`
//! entries); when the scan yields nothing it falls back to the classes
//! the loader has already resolved. A type qualifies when it is concrete,
//! is a subtype of the declared dispatch type, and inherits or declares a
//! concrete method with the dispatched name and signature.

use std::collections::BTreeSet;

use tracing::{trace, warn};

use crate::runtime::{type_signature, ClassInfo, ClassRegistry};

/// Diagnostic record of one type's position in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeHierarchy {
    pub name: String,
    pub signature: String,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub is_array: bool,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub ancestors: Vec<String>,
    pub interface_closure: BTreeSet<String>,
}

/// Build the hierarchy record for `name`, when the class is known.
pub fn type_hierarchy(registry: &ClassRegistry, name: &str) -> Option<TypeHierarchy> {
    let class = registry.lookup(name)?;
    Some(TypeHierarchy {
        name: class.name.clone(),
        signature: type_signature(&class.name),
        is_interface: class.is_interface,
        is_abstract: class.is_abstract,
        is_array: class.is_array(),
        super_name: class.super_name.clone(),
        interfaces: class.interfaces.clone(),
        ancestors: registry.ancestors(name),
        interface_closure: registry.interface_closure(name),
    })
}

fn qualifies(registry: &ClassRegistry, class: &ClassInfo, declared: &str, method: &str, signature: &str) -> bool {
    !class.is_interface
        && !class.is_abstract
        && registry.is_subtype(&class.name, declared)
        && registry.has_concrete_method(&class.name, method, signature)
}

/// Enumerate the concrete classes that `declared.method(signature)` could
/// dispatch to. The class-path scan runs first; the resolved-class
/// fallback only when the scan finds nothing.
pub fn enumerate_implementors(
    registry: &ClassRegistry,
    declared: &str,
    method: &str,
    signature: &str,
) -> Vec<String> {
    let scanned: Vec<String> = registry
        .definitions()
        .filter(|class| qualifies(registry, class, declared, method, signature))
        .map(|class| class.name.clone())
        .collect();
    if !scanned.is_empty() {
        trace!(
            declared = %declared,
            method = %method,
            found = scanned.len(),
            "class-path scan found implementors"
        );
        return scanned;
    }

    warn!(
        declared = %declared,
        method = %method,
        "class-path scan empty, falling back to resolved classes"
    );
    registry
        .resolved_classes()
        .filter(|class| qualifies(registry, class, declared, method, signature))
        .map(|class| class.name.clone())
        .collect()
}

/// Stable order for the frozen type list: inheritance depth from the
/// root, deeper first, then full class name lexicographically.
pub fn sort_types(registry: &ClassRegistry, types: &mut [String]) {
    types.sort_by(|a, b| {
        let depth_a = registry.inheritance_depth(a);
        let depth_b = registry.inheritance_depth(b);
        depth_b.cmp(&depth_a).then_with(|| a.cmp(b))
    });
}
