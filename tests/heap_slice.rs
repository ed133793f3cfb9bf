//! End-to-end heap slicing: the query's heap state for a cyclic list
//! contains exactly the reachable nodes and terminates despite the cycle.

mod common;

use std::sync::{Arc, Mutex};

use pythia::expr::{CompareOp, Expr, Variable};
use pythia::runtime::{ObjectId, Value};
use pythia::solver::{ConcreteSolver, ConstraintSolver, HybridSolver, Valuation, Verdict};

use common::StubOracle;

#[test]
fn cyclic_list_slices_exactly_and_terminates() {
    let stub = StubOracle::start(vec![r#"{"result":"SAT"}"#]);
    let session = Arc::new(Mutex::new(common::list_session()));

    // n0 -> n1 -> n2 -> n0, plus an unrelated object the slice must skip
    let (n0, others) = {
        let mut session = session.lock().unwrap();
        let node = session.registry.lookup("Node").unwrap().clone();
        let list = session.registry.lookup("demo.LinkedList").unwrap().clone();
        let n0 = session.heap.allocate(&node).unwrap();
        let n1 = session.heap.allocate(&node).unwrap();
        let n2 = session.heap.allocate(&node).unwrap();
        session.heap.get_mut(n0).unwrap().set_field("next", Value::Ref(n1));
        session.heap.get_mut(n1).unwrap().set_field("next", Value::Ref(n2));
        session.heap.get_mut(n2).unwrap().set_field("next", Value::Ref(n0));
        let unrelated = session.heap.allocate(&list).unwrap();
        (n0, [n1, n2, unrelated])
    };
    let [n1, n2, unrelated] = others;

    let mut solver =
        HybridSolver::with_client(ConcreteSolver::new(), Arc::clone(&session), stub.client());
    solver.add(vec![Expr::compare(
        CompareOp::Ne,
        Expr::var(Variable::reference("head")),
        Expr::null(),
    )]);

    let mut valuation = Valuation::new();
    valuation.set(&Variable::reference("head"), Value::Ref(n0));
    assert_eq!(solver.solve(&mut valuation), Verdict::Sat);

    let requests = stub.requests();
    let heap_state = &requests[0]["heap_state"];

    let object_ids: Vec<u64> = heap_state["objects"]
        .as_object()
        .unwrap()
        .keys()
        .map(|k| k.parse().unwrap())
        .collect();
    let expected: Vec<u64> = vec![n0.0, n1.0, n2.0];
    assert_eq!(object_ids, expected, "exactly the cycle, nothing else");
    assert!(!object_ids.contains(&unrelated.0));

    assert_eq!(
        heap_state["modifiable_objects"],
        serde_json::json!([n0.0]),
        "only the bound head is modifiable"
    );
    assert_eq!(heap_state["bindings"]["head(ref)"], serde_json::json!(n0.0));

    // The cycle closes in the dump: n2.next points back at n0
    let n2_dump = &heap_state["objects"][&n2.0.to_string()];
    assert_eq!(n2_dump["fields"]["next"], serde_json::json!(n0.0));

    // Schemas describe Node but not the stdlib root
    assert!(heap_state["schemas"]["Node"]["fields"]["next"].is_string());
    assert!(heap_state["schemas"].get("java.lang.Object").is_none());
}

#[test]
fn null_valued_binding_reaches_the_oracle_as_null() {
    let stub = StubOracle::start(vec![r#"{"result":"SAT"}"#]);
    let session = Arc::new(Mutex::new(common::list_session()));
    let mut solver =
        HybridSolver::with_client(ConcreteSolver::new(), Arc::clone(&session), stub.client());

    solver.add(vec![Expr::compare(
        CompareOp::Eq,
        Expr::var(Variable::reference("head")),
        Expr::null(),
    )]);
    let mut valuation = Valuation::new();
    valuation.set(&Variable::reference("head"), Value::Ref(ObjectId::NULL));
    assert_eq!(solver.solve(&mut valuation), Verdict::Sat);

    let requests = stub.requests();
    let heap_state = &requests[0]["heap_state"];
    assert_eq!(heap_state["bindings"]["head(ref)"], serde_json::Value::Null);
    assert_eq!(heap_state["modifiable_objects"], serde_json::json!([]));
}
