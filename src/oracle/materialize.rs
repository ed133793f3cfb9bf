//! Valuation materialiser: folds a SAT oracle reply back into the
//! engine's valuation and heap.
//!
//! For a reference variable the oracle answers with either `"null"` or a
//! type signature `"Lpkg/Name;"` meaning "give this variable a fresh
//! instance of that type". Materialising allocates the object, rebinds
//! the variable, and re-symbolises the new object's fields so the next
//! round of exploration sees them as symbolic. If the variable already
//! holds a live instance of the named type, nothing is allocated.
//!
//! The materialiser never fails the solve: unknown names, unresolvable
//! classes, and failed initialisation are logged and skipped.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::expr::{VarType, Variable};
use crate::runtime::{class_name_from_signature, Value};
use crate::session::AnalysisSession;
use crate::solver::Valuation;

/// What a materialisation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialiseOutcome {
    /// Valuation entries written.
    pub updated: usize,
    /// Fresh objects allocated on the heap.
    pub allocated: usize,
}

/// Apply the oracle's `valuation` array to `valuation`, allocating and
/// re-symbolising through `session` as needed.
pub fn apply_valuation(
    session: &mut AnalysisSession,
    reply_valuation: &[BTreeMap<String, serde_json::Value>],
    scope_vars: &BTreeMap<String, Variable>,
    valuation: &mut Valuation,
) -> MaterialiseOutcome {
    let mut outcome = MaterialiseOutcome::default();

    for entry in reply_valuation {
        for (name, json) in entry {
            // The variable must be known: either already valued or free in
            // the current scope.
            let variable = valuation
                .variable(name)
                .cloned()
                .or_else(|| scope_vars.get(name).cloned());
            let Some(variable) = variable else {
                warn!(name = %name, "oracle named an unknown variable, skipping");
                continue;
            };

            if json.is_null() {
                valuation.set(&variable, Value::NULL);
                outcome.updated += 1;
                continue;
            }

            let text = match json {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };

            if text == "null" {
                valuation.set(&variable, Value::NULL);
                outcome.updated += 1;
                continue;
            }

            if let Some(class_name) = class_name_from_signature(&text) {
                match materialise_reference(session, &variable, &class_name, valuation) {
                    RefOutcome::Allocated => {
                        outcome.updated += 1;
                        outcome.allocated += 1;
                    }
                    RefOutcome::Kept => outcome.updated += 1,
                    RefOutcome::Skipped => {}
                }
                continue;
            }

            // Primitive bindings for non-reference variables; any other
            // string encoding is ignored.
            if variable.vtype != VarType::Reference {
                let value = match json {
                    serde_json::Value::Number(n) => {
                        if let Some(i) = n.as_i64() {
                            Some(Value::Long(i))
                        } else {
                            n.as_f64().map(Value::Double)
                        }
                    }
                    serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
                    serde_json::Value::String(s) => s.parse::<i64>().ok().map(Value::Long),
                    _ => None,
                };
                match value {
                    Some(value) => {
                        valuation.set(&variable, value);
                        outcome.updated += 1;
                    }
                    None => {
                        debug!(name = %name, value = %json, "ignoring undecodable binding")
                    }
                }
            } else {
                debug!(name = %name, value = %text, "ignoring non-signature reference binding");
            }
        }
    }

    debug!(
        updated = outcome.updated,
        allocated = outcome.allocated,
        "applied oracle valuation"
    );
    outcome
}

/// Does the variable already hold a live instance of `class_name`?
fn keeps_existing(
    session: &AnalysisSession,
    valuation: &Valuation,
    name: &str,
    class_name: &str,
) -> bool {
    valuation
        .get(name)
        .and_then(|v| v.as_ref_id())
        .filter(|id| !id.is_null())
        .and_then(|id| session.heap.class_of(id))
        .is_some_and(|runtime_class| runtime_class == class_name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefOutcome {
    /// Existing instance of the right type, left untouched.
    Kept,
    /// Fresh object allocated and bound.
    Allocated,
    /// Entry could not be applied.
    Skipped,
}

/// Allocate (if needed) and rebind one reference variable.
fn materialise_reference(
    session: &mut AnalysisSession,
    variable: &Variable,
    class_name: &str,
    valuation: &mut Valuation,
) -> RefOutcome {
    // Keep an existing instance of the right runtime type untouched
    if keeps_existing(session, valuation, &variable.name, class_name) {
        debug!(name = %variable.name, class = %class_name, "variable already holds the target type");
        return RefOutcome::Kept;
    }

    let class = match session.registry.resolve(class_name) {
        Ok(class) => class.clone(),
        Err(e) => {
            warn!(name = %variable.name, class = %class_name, error = %e, "cannot resolve class, skipping");
            return RefOutcome::Skipped;
        }
    };
    if !session.registry.is_initialized(class_name) {
        if let Err(e) = session.registry.initialize(class_name) {
            warn!(class = %class_name, error = %e, "class initialisation failed, skipping");
            return RefOutcome::Skipped;
        }
    }

    let id = match session.heap.allocate(&class) {
        Ok(id) => id,
        Err(e) => {
            warn!(class = %class_name, error = %e, "allocation failed, skipping");
            return RefOutcome::Skipped;
        }
    };
    valuation.set(variable, Value::Ref(id));

    let irrelevant = session.config.heap.irrelevant_set();
    session.symbolic.process_polymorphic_object(
        &session.registry,
        &session.heap,
        &irrelevant,
        id,
        &variable.name,
    );
    debug!(name = %variable.name, class = %class_name, id = %id, "materialised fresh object");
    RefOutcome::Allocated
}
