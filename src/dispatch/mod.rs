//! Polymorphic-dispatch instrumentation.
//!
//! When a symbolic reference is dispatched through a virtual or interface
//! call, the instrumentation enumerates the concrete types the call could
//! dispatch to, emits mutually exclusive type-discrimination constraints,
//! and records the branch actually taken. Branch indices point into a
//! per-site type order frozen on first visit, so replays see identical
//! indexing.

pub mod cache;
pub mod hierarchy;
pub mod instrument;

pub use cache::{CallSiteCache, CallSiteKey};
pub use hierarchy::{enumerate_implementors, sort_types, type_hierarchy, TypeHierarchy};
pub use instrument::{instrument_invocation, DispatchKind, DispatchOutcome, InvokeSite};
