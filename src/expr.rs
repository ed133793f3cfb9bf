//! Expression algebra for path constraints.
//!
//! Constraints are immutable trees shared via `Arc`. Two node kinds carry
//! the "high-level" classification that routes a constraint to the oracle
//! instead of the underlying numeric solver:
//!
//! - [`Expr::IsExactType`] - "the runtime type of this reference is exactly T"
//! - [`Expr::InstanceOf`] - "this reference is an instance of T" (dispatch branches)
//!
//! Reference variables are recognised by the `(ref)` suffix convention on
//! their names; dotted paths (`head(ref).next(ref)`) denote field access.
//!
//! Reachability of `IsExactType` branches is *not* stored on the nodes
//! themselves: each node carries a stable [`NodeId`], and unreachability is
//! tracked in a side table owned by the analysis session. This keeps shared
//! subtrees immutable across replays.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;

/// Conventional suffix marking a symbolic reference variable.
pub const REF_SUFFIX: &str = "(ref)";

/// Static type of a symbolic variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Long,
    Double,
    Bool,
    Reference,
}

/// A named, typed symbolic placeholder. Identity is the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub vtype: VarType,
}

impl Variable {
    pub fn new(name: impl Into<String>, vtype: VarType) -> Self {
        Variable {
            name: name.into(),
            vtype,
        }
    }

    pub fn long(name: impl Into<String>) -> Self {
        Variable::new(name, VarType::Long)
    }

    /// A reference variable. The `(ref)` suffix is appended when missing so
    /// the naming convention holds regardless of the caller.
    pub fn reference(name: impl Into<String>) -> Self {
        let mut name = name.into();
        if !name.ends_with(REF_SUFFIX) {
            name.push_str(REF_SUFFIX);
        }
        Variable::new(name, VarType::Reference)
    }

    /// True iff the name carries the `(ref)` suffix.
    pub fn is_reference(&self) -> bool {
        self.name.ends_with(REF_SUFFIX)
    }

    /// Last segment of a dotted path, e.g. `"next(ref)"` for
    /// `"head(ref).next(ref)"`.
    pub fn last_segment(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Last segment with the `(ref)` suffix stripped.
    pub fn base_name(&self) -> &str {
        self.last_segment()
            .strip_suffix(REF_SUFFIX)
            .unwrap_or(self.last_segment())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Stable identity for an `IsExactType` node, assigned at construction and
/// preserved by cloning. Keys the session's unreachability side table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate a fresh id. Ids are unique per process, which is all the
    /// side table needs.
    pub fn fresh() -> NodeId {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        NodeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
        };
        f.write_str(s)
    }
}

/// Shared handle to an expression node.
pub type ExprRef = Arc<Expr>;

/// A constraint expression.
///
/// Arithmetic and comparison nodes are opaque leaves as far as high-level
/// classification is concerned; only type predicates and reference
/// variables make a tree high-level.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Var(Variable),
    IntLit(i64),
    RealLit(f64),
    Null,
    True,
    False,

    /// "The runtime type of `target` is exactly `type_sig`" where
    /// `type_sig` is a JVM-style signature (`Lpkg/Name;`).
    IsExactType {
        id: NodeId,
        target: ExprRef,
        type_sig: String,
    },

    /// "`target` is an instance of `class_name`" (dotted class name).
    InstanceOf { target: ExprRef, class_name: String },

    Not(ExprRef),
    And(ExprRef, ExprRef),
    Or(ExprRef, ExprRef),

    Compare {
        op: CompareOp,
        lhs: ExprRef,
        rhs: ExprRef,
    },

    Arith {
        op: ArithOp,
        lhs: ExprRef,
        rhs: ExprRef,
    },
}

impl Expr {
    pub fn var(v: Variable) -> ExprRef {
        Arc::new(Expr::Var(v))
    }

    pub fn int(n: i64) -> ExprRef {
        Arc::new(Expr::IntLit(n))
    }

    pub fn real(x: f64) -> ExprRef {
        Arc::new(Expr::RealLit(x))
    }

    pub fn null() -> ExprRef {
        Arc::new(Expr::Null)
    }

    /// Exact-type predicate with a fresh node id.
    pub fn is_exact_type(target: ExprRef, type_sig: impl Into<String>) -> ExprRef {
        Arc::new(Expr::IsExactType {
            id: NodeId::fresh(),
            target,
            type_sig: type_sig.into(),
        })
    }

    pub fn instance_of(target: ExprRef, class_name: impl Into<String>) -> ExprRef {
        Arc::new(Expr::InstanceOf {
            target,
            class_name: class_name.into(),
        })
    }

    pub fn not(inner: ExprRef) -> ExprRef {
        Arc::new(Expr::Not(inner))
    }

    pub fn and(lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        Arc::new(Expr::And(lhs, rhs))
    }

    pub fn or(lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        Arc::new(Expr::Or(lhs, rhs))
    }

    pub fn compare(op: CompareOp, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        Arc::new(Expr::Compare { op, lhs, rhs })
    }

    pub fn arith(op: ArithOp, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        Arc::new(Expr::Arith { op, lhs, rhs })
    }

    /// Is this node itself high-level? Type predicates always are;
    /// a bare variable is high-level iff it is a reference variable.
    pub fn is_high_level(&self) -> bool {
        match self {
            Expr::IsExactType { .. } | Expr::InstanceOf { .. } => true,
            Expr::Var(v) => v.is_reference(),
            _ => false,
        }
    }

    /// True iff this node or any transitive child is high-level.
    pub fn contains_high_level(&self) -> bool {
        if self.is_high_level() {
            return true;
        }
        self.children()
            .iter()
            .any(|child| child.contains_high_level())
    }

    /// Direct children, in left-to-right order.
    pub fn children(&self) -> SmallVec<[&ExprRef; 2]> {
        let mut out = SmallVec::new();
        match self {
            Expr::Var(_)
            | Expr::IntLit(_)
            | Expr::RealLit(_)
            | Expr::Null
            | Expr::True
            | Expr::False => {}
            Expr::IsExactType { target, .. } | Expr::InstanceOf { target, .. } => {
                out.push(target);
            }
            Expr::Not(inner) => out.push(inner),
            Expr::And(lhs, rhs)
            | Expr::Or(lhs, rhs)
            | Expr::Compare { lhs, rhs, .. }
            | Expr::Arith { lhs, rhs, .. } => {
                out.push(lhs);
                out.push(rhs);
            }
        }
        out
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(v) => write!(f, "{}", v),
            Expr::IntLit(n) => write!(f, "{}", n),
            Expr::RealLit(x) => write!(f, "{}", x),
            Expr::Null => f.write_str("null"),
            Expr::True => f.write_str("true"),
            Expr::False => f.write_str("false"),
            Expr::IsExactType {
                target, type_sig, ..
            } => write!(f, "IsExactType({}, {})", target, type_sig),
            Expr::InstanceOf { target, class_name } => {
                write!(f, "InstanceOf({}, {})", target, class_name)
            }
            Expr::Not(inner) => write!(f, "!({})", inner),
            Expr::And(lhs, rhs) => write!(f, "({} && {})", lhs, rhs),
            Expr::Or(lhs, rhs) => write!(f, "({} || {})", lhs, rhs),
            Expr::Compare { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op, rhs),
            Expr::Arith { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op, rhs),
        }
    }
}

/// Pre-order visitor over expression trees.
///
/// Default methods do nothing; implementors override what they collect.
pub trait ExprVisitor {
    fn visit_var(&mut self, _var: &Variable) {}
    fn visit_is_exact_type(&mut self, _id: NodeId, _target: &ExprRef, _type_sig: &str) {}
    fn visit_instance_of(&mut self, _target: &ExprRef, _class_name: &str) {}
    fn visit_compare(&mut self, _op: CompareOp, _lhs: &ExprRef, _rhs: &ExprRef) {}
}

/// Walk `expr` pre-order, dispatching to `visitor` and recursing into every
/// child.
pub fn walk(expr: &ExprRef, visitor: &mut impl ExprVisitor) {
    match expr.as_ref() {
        Expr::Var(v) => visitor.visit_var(v),
        Expr::IsExactType {
            id,
            target,
            type_sig,
        } => visitor.visit_is_exact_type(*id, target, type_sig),
        Expr::InstanceOf { target, class_name } => visitor.visit_instance_of(target, class_name),
        Expr::Compare { op, lhs, rhs } => visitor.visit_compare(*op, lhs, rhs),
        _ => {}
    }
    for child in expr.children() {
        walk(child, visitor);
    }
}

/// Union the free variables of `expr` into `out`, keyed by name.
pub fn collect_variables(expr: &ExprRef, out: &mut BTreeMap<String, Variable>) {
    struct Collector<'a> {
        out: &'a mut BTreeMap<String, Variable>,
    }
    impl ExprVisitor for Collector<'_> {
        fn visit_var(&mut self, var: &Variable) {
            self.out
                .entry(var.name.clone())
                .or_insert_with(|| var.clone());
        }
    }
    walk(expr, &mut Collector { out });
}
