//! In-crate VM model consumed by the solving layer.
//!
//! The hybrid solver and the dispatch instrumentation only need a narrow
//! runtime surface: a class registry with a scannable class path, a heap
//! that can allocate objects of a resolved class, and the current thread's
//! frames. This module provides that surface.

pub mod class;
pub mod heap;
pub mod thread;

use std::fmt;

pub use class::{
    class_name_from_signature, simple_name, type_signature, ClassInfo, ClassRegistry, FieldInfo,
    MethodInfo,
};
pub use heap::{Heap, HeapObject, ObjectId, Value};
pub use thread::{Frame, ThreadState};

/// Errors surfaced by the runtime model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// No class of this name on the class path.
    ClassNotFound(String),
    /// Class must be resolved before the operation.
    NotResolved(String),
    /// Static initialisation failed.
    InitFailed(String),
    /// Allocation target is abstract or an interface.
    NotInstantiable(String),
    /// Dereferenced an id with no live object.
    DanglingReference(ObjectId),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::ClassNotFound(name) => write!(f, "class not found: {}", name),
            RuntimeError::NotResolved(name) => write!(f, "class not resolved: {}", name),
            RuntimeError::InitFailed(name) => write!(f, "class initialisation failed: {}", name),
            RuntimeError::NotInstantiable(name) => {
                write!(f, "cannot instantiate abstract type: {}", name)
            }
            RuntimeError::DanglingReference(id) => write!(f, "dangling reference: {:?}", id),
        }
    }
}

impl std::error::Error for RuntimeError {}
