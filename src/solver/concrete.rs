//! A small concrete base solver.
//!
//! Evaluates base constraints against the current valuation: SAT when
//! every constraint evaluates to true, UNSAT when any evaluates to false,
//! DONT_KNOW when a constraint cannot be decided (an unbound variable or
//! a predicate outside the numeric fragment). It stands in for the
//! numeric SMT backend behind the same `ConstraintSolver` contract and is
//! what exploration and the test suite run against.

use crate::expr::{ArithOp, CompareOp, Expr, ExprRef};
use crate::runtime::Value;

use super::{ConstraintSolver, Valuation, Verdict};

/// Scope-stacked concrete evaluator.
#[derive(Debug, Default)]
pub struct ConcreteSolver {
    frames: Vec<Vec<ExprRef>>,
}

impl ConcreteSolver {
    pub fn new() -> Self {
        ConcreteSolver {
            frames: vec![Vec::new()],
        }
    }

    /// Every constraint currently in scope.
    pub fn constraints(&self) -> impl Iterator<Item = &ExprRef> {
        self.frames.iter().flatten()
    }
}

impl ConstraintSolver for ConcreteSolver {
    fn push(&mut self) {
        self.frames.push(Vec::new());
    }

    fn pop(&mut self, frames: usize) {
        for _ in 0..frames {
            if self.frames.len() > 1 {
                self.frames.pop();
            }
        }
    }

    fn add(&mut self, constraints: Vec<ExprRef>) {
        self.frames
            .last_mut()
            .expect("concrete solver keeps a sentinel frame")
            .extend(constraints);
    }

    fn solve(&mut self, valuation: &mut Valuation) -> Verdict {
        let mut verdict = Verdict::Sat;
        for constraint in self.constraints() {
            match eval(constraint, valuation) {
                Some(Value::Bool(true)) => {}
                Some(Value::Bool(false)) => return Verdict::Unsat,
                _ => verdict = Verdict::DontKnow,
            }
        }
        verdict
    }

    fn dispose(&mut self) {
        self.frames.clear();
    }
}

/// Evaluate an expression under a valuation. `None` when the value cannot
/// be decided concretely.
pub fn eval(expr: &ExprRef, valuation: &Valuation) -> Option<Value> {
    match expr.as_ref() {
        Expr::Var(v) => valuation.get(&v.name),
        Expr::IntLit(n) => Some(Value::Long(*n)),
        Expr::RealLit(x) => Some(Value::Double(*x)),
        Expr::Null => Some(Value::NULL),
        Expr::True => Some(Value::Bool(true)),
        Expr::False => Some(Value::Bool(false)),

        // Type predicates are outside the concrete fragment
        Expr::IsExactType { .. } | Expr::InstanceOf { .. } => None,

        Expr::Not(inner) => match eval(inner, valuation)? {
            Value::Bool(b) => Some(Value::Bool(!b)),
            _ => None,
        },

        Expr::And(lhs, rhs) => {
            match (eval(lhs, valuation), eval(rhs, valuation)) {
                (Some(Value::Bool(false)), _) | (_, Some(Value::Bool(false))) => {
                    Some(Value::Bool(false))
                }
                (Some(Value::Bool(true)), Some(Value::Bool(true))) => Some(Value::Bool(true)),
                _ => None,
            }
        }

        Expr::Or(lhs, rhs) => {
            match (eval(lhs, valuation), eval(rhs, valuation)) {
                (Some(Value::Bool(true)), _) | (_, Some(Value::Bool(true))) => {
                    Some(Value::Bool(true))
                }
                (Some(Value::Bool(false)), Some(Value::Bool(false))) => Some(Value::Bool(false)),
                _ => None,
            }
        }

        Expr::Compare { op, lhs, rhs } => {
            let l = eval(lhs, valuation)?;
            let r = eval(rhs, valuation)?;
            compare(*op, l, r)
        }

        Expr::Arith { op, lhs, rhs } => {
            let l = eval(lhs, valuation)?;
            let r = eval(rhs, valuation)?;
            arith(*op, l, r)
        }
    }
}

fn compare(op: CompareOp, l: Value, r: Value) -> Option<Value> {
    // Reference comparison: only equality is meaningful
    if let (Value::Ref(a), Value::Ref(b)) = (l, r) {
        return match op {
            CompareOp::Eq => Some(Value::Bool(a == b)),
            CompareOp::Ne => Some(Value::Bool(a != b)),
            _ => None,
        };
    }

    let (a, b) = numeric_pair(l, r)?;
    let result = match op {
        CompareOp::Eq => a == b,
        CompareOp::Ne => a != b,
        CompareOp::Lt => a < b,
        CompareOp::Le => a <= b,
        CompareOp::Gt => a > b,
        CompareOp::Ge => a >= b,
    };
    Some(Value::Bool(result))
}

fn arith(op: ArithOp, l: Value, r: Value) -> Option<Value> {
    if let (Value::Long(a), Value::Long(b)) = (l, r) {
        let result = match op {
            ArithOp::Add => a.checked_add(b)?,
            ArithOp::Sub => a.checked_sub(b)?,
            ArithOp::Mul => a.checked_mul(b)?,
            ArithOp::Div => a.checked_div(b)?,
            ArithOp::Rem => a.checked_rem(b)?,
        };
        return Some(Value::Long(result));
    }
    let (a, b) = numeric_pair(l, r)?;
    let result = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Rem => a % b,
    };
    Some(Value::Double(result))
}

fn numeric_pair(l: Value, r: Value) -> Option<(f64, f64)> {
    let widen = |v: Value| match v {
        Value::Long(n) => Some(n as f64),
        Value::Double(x) => Some(x),
        _ => None,
    };
    Some((widen(l)?, widen(r)?))
}
