//! Wire protocol for the oracle endpoint.
//!
//! The request is one JSON object; `constraints` and `hint` are always
//! present, the context fields are omitted when a collector produced
//! nothing. The reply's `valuation` is an array of objects, each binding
//! one or more variable names to primitive JSON values or strings. The
//! conventional reference encodings are the literal string `"null"` and
//! the JVM signature form `"Lpkg/Name;"`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::collect::{HeapSnapshot, SourceContext};
use crate::expr::ExprRef;
use crate::solver::Verdict;

/// A solve query for the oracle.
#[derive(Debug, Clone, Serialize)]
pub struct OracleRequest {
    pub constraints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heap_state: Option<HeapSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_type_constraints: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_context: Option<SourceContext>,
    pub hint: String,
}

impl OracleRequest {
    /// Bare query: stringified constraints plus an opaque tag.
    pub fn new(constraints: &[ExprRef], hint: impl Into<String>) -> Self {
        OracleRequest {
            constraints: constraints.iter().map(|c| c.to_string()).collect(),
            heap_state: None,
            parameter_type_constraints: None,
            source_context: None,
            hint: hint.into(),
        }
    }

    pub fn with_heap_state(mut self, heap_state: Option<HeapSnapshot>) -> Self {
        self.heap_state = heap_state;
        self
    }

    pub fn with_parameter_types(mut self, params: BTreeMap<String, String>) -> Self {
        self.parameter_type_constraints = (!params.is_empty()).then_some(params);
        self
    }

    pub fn with_source_context(mut self, source_context: Option<SourceContext>) -> Self {
        self.source_context = source_context;
        self
    }
}

/// Verdict field of the oracle reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleVerdict {
    #[serde(rename = "SAT")]
    Sat,
    #[serde(rename = "UNSAT")]
    Unsat,
    #[serde(rename = "UNKNOWN")]
    Unknown,
    #[serde(rename = "DONT_KNOW")]
    DontKnow,
}

impl From<OracleVerdict> for Verdict {
    fn from(v: OracleVerdict) -> Verdict {
        match v {
            OracleVerdict::Sat => Verdict::Sat,
            OracleVerdict::Unsat => Verdict::Unsat,
            OracleVerdict::Unknown => Verdict::Unknown,
            OracleVerdict::DontKnow => Verdict::DontKnow,
        }
    }
}

/// The oracle's answer.
#[derive(Debug, Clone, Deserialize)]
pub struct OracleReply {
    pub result: OracleVerdict,
    /// Present on SAT: an array of objects, each carrying variable
    /// bindings.
    #[serde(default)]
    pub valuation: Option<Vec<BTreeMap<String, serde_json::Value>>>,
}
