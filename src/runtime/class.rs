//! Class metadata and the registry that stands in for the class loader.
//!
//! The registry keeps two views of the same class universe:
//!
//! - a **class path** of definitions that can be scanned without resolving
//!   (the equivalent of walking `.class` entries with a lightweight
//!   bytecode reader), and
//! - the set of **resolved** classes the loader has actually materialised.
//!
//! Implementing-type enumeration scans the class path first and falls back
//! to the resolved set; allocation and initialisation require resolution.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::RuntimeError;

/// Root of the class hierarchy.
pub const OBJECT_CLASS: &str = "java.lang.Object";

/// Qualified-name prefixes treated as standard library when emitting
/// per-class schemas.
pub const STDLIB_PREFIXES: &[&str] = &["java.", "javax.", "jdk.", "sun."];

/// JVM-style type signature for a dotted class name:
/// `com.foo.Node` -> `Lcom/foo/Node;`.
pub fn type_signature(class_name: &str) -> String {
    format!("L{};", class_name.replace('.', "/"))
}

/// Inverse of [`type_signature`]. Returns `None` when `sig` is not of the
/// `L...;` form.
pub fn class_name_from_signature(sig: &str) -> Option<String> {
    let inner = sig.strip_prefix('L')?.strip_suffix(';')?;
    if inner.is_empty() {
        return None;
    }
    Some(inner.replace('/', "."))
}

/// Bare class name: `com.foo.Node` -> `Node`.
pub fn simple_name(class_name: &str) -> &str {
    class_name.rsplit('.').next().unwrap_or(class_name)
}

/// A declared instance field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    /// Dotted class name for reference fields, primitive name otherwise
    /// (`int`, `long`, `boolean`, `double`, ...). Array types carry a
    /// trailing `[]`.
    pub type_name: String,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        FieldInfo {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    /// Reference fields are everything that is not a primitive.
    pub fn is_reference(&self) -> bool {
        !matches!(
            self.type_name.as_str(),
            "boolean" | "byte" | "char" | "short" | "int" | "long" | "float" | "double"
        )
    }

    /// True for `T[]` style types.
    pub fn is_array(&self) -> bool {
        self.type_name.ends_with("[]")
    }
}

/// A declared method, identified by `(name, signature)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub name: String,
    /// JVM-style descriptor, e.g. `()V` or `(I)Ljava/lang/String;`.
    pub signature: String,
    pub is_abstract: bool,
    pub is_static: bool,
    /// Source line range, when source is attached to the declaring class.
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
}

impl MethodInfo {
    pub fn concrete(name: impl Into<String>, signature: impl Into<String>) -> Self {
        MethodInfo {
            name: name.into(),
            signature: signature.into(),
            is_abstract: false,
            is_static: false,
            start_line: None,
            end_line: None,
        }
    }

    pub fn declared_abstract(name: impl Into<String>, signature: impl Into<String>) -> Self {
        MethodInfo {
            is_abstract: true,
            ..MethodInfo::concrete(name, signature)
        }
    }

    pub fn static_method(name: impl Into<String>, signature: impl Into<String>) -> Self {
        MethodInfo {
            is_static: true,
            ..MethodInfo::concrete(name, signature)
        }
    }

    pub fn with_lines(mut self, start: u32, end: u32) -> Self {
        self.start_line = Some(start);
        self.end_line = Some(end);
        self
    }

    /// Fully qualified form used in call-site descriptors.
    pub fn qualified(&self, class_name: &str) -> String {
        format!("{}.{}{}", class_name, self.name, self.signature)
    }
}

/// Metadata for one class: hierarchy links, members, optional source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    /// Basename of the defining source file.
    pub source_file: Option<String>,
    /// Full source text of the defining file, when available.
    pub source: Option<String>,
}

impl ClassInfo {
    /// A concrete class extending `java.lang.Object`.
    pub fn class(name: impl Into<String>) -> Self {
        let name = name.into();
        let super_name = if name == OBJECT_CLASS {
            None
        } else {
            Some(OBJECT_CLASS.to_string())
        };
        ClassInfo {
            name,
            super_name,
            interfaces: Vec::new(),
            is_interface: false,
            is_abstract: false,
            fields: Vec::new(),
            methods: Vec::new(),
            source_file: None,
            source: None,
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        ClassInfo {
            is_interface: true,
            is_abstract: true,
            super_name: None,
            ..ClassInfo::class(name)
        }
    }

    pub fn abstract_class(name: impl Into<String>) -> Self {
        ClassInfo {
            is_abstract: true,
            ..ClassInfo::class(name)
        }
    }

    pub fn extending(mut self, super_name: impl Into<String>) -> Self {
        self.super_name = Some(super_name.into());
        self
    }

    pub fn implementing(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.fields.push(FieldInfo::new(name, type_name));
        self
    }

    pub fn with_method(mut self, method: MethodInfo) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_source(mut self, file: impl Into<String>, text: impl Into<String>) -> Self {
        self.source_file = Some(file.into());
        self.source = Some(text.into());
        self
    }

    pub fn is_array(&self) -> bool {
        self.name.ends_with("[]")
    }

    pub fn signature(&self) -> String {
        type_signature(&self.name)
    }

    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    /// Locally declared method by `(name, signature)`.
    pub fn method(&self, name: &str, signature: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.signature == signature)
    }

    /// Locally declared method by name only (first match).
    pub fn method_by_name(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// The class universe: scannable definitions plus the resolved subset.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    /// Every definition reachable on the class path, keyed by name.
    path: BTreeMap<String, ClassInfo>,
    /// Names the loader has resolved.
    resolved: BTreeSet<String>,
    /// Names whose static initialisation has run.
    initialized: HashSet<String>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        let mut registry = ClassRegistry::default();
        registry.define(ClassInfo::class(OBJECT_CLASS));
        registry
    }

    /// Put a definition on the class path. Redefinition replaces the
    /// previous entry (last definition wins, as with a classpath shadow).
    pub fn define(&mut self, class: ClassInfo) {
        self.path.insert(class.name.clone(), class);
    }

    /// Look a definition up without resolving it.
    pub fn lookup(&self, name: &str) -> Option<&ClassInfo> {
        self.path.get(name)
    }

    /// Resolve a class, materialising it for allocation and initialisation.
    pub fn resolve(&mut self, name: &str) -> Result<&ClassInfo, RuntimeError> {
        if !self.path.contains_key(name) {
            return Err(RuntimeError::ClassNotFound(name.to_string()));
        }
        self.resolved.insert(name.to_string());
        Ok(&self.path[name])
    }

    /// Resolve without failing; `None` when the class path has no entry.
    pub fn try_resolve(&mut self, name: &str) -> Option<&ClassInfo> {
        self.resolve(name).ok()
    }

    pub fn is_resolved(&self, name: &str) -> bool {
        self.resolved.contains(name)
    }

    pub fn is_initialized(&self, name: &str) -> bool {
        self.initialized.contains(name)
    }

    /// Run static initialisation if it has not run yet. Requires the class
    /// to be resolved first.
    pub fn initialize(&mut self, name: &str) -> Result<(), RuntimeError> {
        if !self.resolved.contains(name) {
            return Err(RuntimeError::NotResolved(name.to_string()));
        }
        self.initialized.insert(name.to_string());
        Ok(())
    }

    /// Scan view over every class-path definition, without resolving any.
    pub fn definitions(&self) -> impl Iterator<Item = &ClassInfo> {
        self.path.values()
    }

    /// Only the classes the loader has resolved so far.
    pub fn resolved_classes(&self) -> impl Iterator<Item = &ClassInfo> {
        self.path
            .values()
            .filter(|c| self.resolved.contains(&c.name))
    }

    /// Super-class chain of `name`, nearest first, excluding `name` itself.
    pub fn ancestors(&self, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = self.lookup(name).and_then(|c| c.super_name.clone());
        while let Some(super_name) = current {
            current = self.lookup(&super_name).and_then(|c| c.super_name.clone());
            out.push(super_name);
        }
        out
    }

    /// Transitive closure of implemented interfaces, including those
    /// inherited through the super chain and super-interfaces.
    pub fn interface_closure(&self, name: &str) -> BTreeSet<String> {
        let mut closure = BTreeSet::new();
        let mut work: Vec<String> = vec![name.to_string()];
        while let Some(current) = work.pop() {
            let Some(class) = self.lookup(&current) else {
                continue;
            };
            for iface in &class.interfaces {
                if closure.insert(iface.clone()) {
                    work.push(iface.clone());
                }
            }
            if let Some(super_name) = &class.super_name {
                work.push(super_name.clone());
            }
        }
        closure
    }

    /// Is `sub` the same as, a subclass of, or an implementor of `sup`?
    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        if sub == sup {
            return true;
        }
        self.ancestors(sub).iter().any(|a| a == sup)
            || self.interface_closure(sub).contains(sup)
    }

    /// Distance from the hierarchy root; `java.lang.Object` is 0. Unknown
    /// classes count the links we can still see.
    pub fn inheritance_depth(&self, name: &str) -> usize {
        self.ancestors(name).len()
    }

    /// Does `class_name` inherit or declare a *concrete* `(method, sig)`?
    /// The first declaration found walking up the super chain decides.
    pub fn has_concrete_method(&self, class_name: &str, method: &str, signature: &str) -> bool {
        let mut current = Some(class_name.to_string());
        while let Some(name) = current {
            let Some(class) = self.lookup(&name) else {
                return false;
            };
            if let Some(m) = class.method(method, signature) {
                return !m.is_abstract;
            }
            current = class.super_name.clone();
        }
        false
    }

    /// The class in the super chain of `class_name` that declares
    /// `(method, sig)`, if any.
    pub fn declaring_class(&self, class_name: &str, method: &str, signature: &str) -> Option<String> {
        let mut current = Some(class_name.to_string());
        while let Some(name) = current {
            let class = self.lookup(&name)?;
            if class.method(method, signature).is_some() {
                return Some(name);
            }
            current = class.super_name.clone();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animal_registry() -> ClassRegistry {
        let mut registry = ClassRegistry::new();
        registry.define(
            ClassInfo::interface("IAnimal")
                .with_method(MethodInfo::declared_abstract("makeSound", "()V")),
        );
        registry.define(
            ClassInfo::class("Dog")
                .implementing("IAnimal")
                .with_method(MethodInfo::concrete("makeSound", "()V")),
        );
        registry.define(
            ClassInfo::class("Cat")
                .implementing("IAnimal")
                .with_method(MethodInfo::concrete("makeSound", "()V")),
        );
        registry.define(ClassInfo::class("Puppy").extending("Dog"));
        registry
    }

    #[test]
    fn test_signature_round_trip() {
        assert_eq!(type_signature("com.foo.Node"), "Lcom/foo/Node;");
        assert_eq!(
            class_name_from_signature("Lcom/foo/Node;").as_deref(),
            Some("com.foo.Node")
        );
        assert_eq!(class_name_from_signature("LNode;").as_deref(), Some("Node"));
        assert_eq!(class_name_from_signature("I"), None);
        assert_eq!(class_name_from_signature("L;"), None);
    }

    #[test]
    fn test_resolution_and_initialisation_order() {
        let mut registry = animal_registry();
        assert!(!registry.is_resolved("Dog"));
        assert!(
            registry.initialize("Dog").is_err(),
            "initialisation requires resolution"
        );

        registry.resolve("Dog").unwrap();
        assert!(registry.is_resolved("Dog"));
        registry.initialize("Dog").unwrap();
        assert!(registry.is_initialized("Dog"));

        assert!(matches!(
            registry.resolve("Ferret"),
            Err(RuntimeError::ClassNotFound(_))
        ));
    }

    #[test]
    fn test_subtyping_through_interfaces_and_supers() {
        let registry = animal_registry();
        assert!(registry.is_subtype("Dog", "IAnimal"));
        assert!(registry.is_subtype("Puppy", "Dog"));
        assert!(registry.is_subtype("Puppy", "IAnimal"), "inherited interface");
        assert!(registry.is_subtype("Puppy", OBJECT_CLASS));
        assert!(!registry.is_subtype("Dog", "Cat"));
    }

    #[test]
    fn test_concrete_method_inheritance() {
        let registry = animal_registry();
        assert!(registry.has_concrete_method("Dog", "makeSound", "()V"));
        assert!(
            registry.has_concrete_method("Puppy", "makeSound", "()V"),
            "inherited concrete method counts"
        );
        assert!(
            !registry.has_concrete_method("IAnimal", "makeSound", "()V"),
            "abstract declaration is not concrete"
        );
        assert_eq!(
            registry.declaring_class("Puppy", "makeSound", "()V").as_deref(),
            Some("Dog")
        );
    }

    #[test]
    fn test_inheritance_depth() {
        let registry = animal_registry();
        assert_eq!(registry.inheritance_depth(OBJECT_CLASS), 0);
        assert_eq!(registry.inheritance_depth("Dog"), 1);
        assert_eq!(registry.inheritance_depth("Puppy"), 2);
    }

    #[test]
    fn test_scan_sees_unresolved_definitions() {
        let mut registry = animal_registry();
        registry.resolve("Dog").unwrap();

        let scanned: Vec<&str> = registry.definitions().map(|c| c.name.as_str()).collect();
        assert!(scanned.contains(&"Cat"), "unresolved classes are scannable");

        let resolved: Vec<&str> = registry
            .resolved_classes()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(resolved, vec!["Dog"]);
    }
}
