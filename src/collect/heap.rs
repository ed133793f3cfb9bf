//! Heap-reachability collector: a depth- and size-bounded slice of the
//! heap reachable from the constraint variables, with per-class schemas.
//!
//! Seeding order:
//! 1. reference variables of the constraints, read from the valuation;
//! 2. if none resolves to a live object, heap objects whose class name
//!    matches a PascalCase guess derived from the variable names;
//! 3. if there are no reference variables at all, the top frame's
//!    reference slots plus any valuation entry resolving to a live
//!    object.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use serde::Serialize;
use tracing::debug;

use crate::config::HeapConfig;
use crate::expr::{collect_variables, ExprRef, Variable};
use crate::runtime::class::STDLIB_PREFIXES;
use crate::runtime::{simple_name, ClassRegistry, Heap, ObjectId, ThreadState, Value};
use crate::solver::Valuation;

use super::CollectError;

/// Element sample cap for reference arrays in the dump.
const ARRAY_SAMPLE: usize = 10;

/// One object in the slice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectDump {
    pub class: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<serde_json::Value>>,
}

/// Declared-field schema for one class in the slice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSchema {
    pub fields: BTreeMap<String, String>,
}

/// The heap slice shipped to the oracle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeapSnapshot {
    /// Constraint reference-variable name -> object id, null entries kept.
    pub bindings: BTreeMap<String, Option<u64>>,
    /// Object id -> dump, only objects admitted by the bounded BFS.
    pub objects: BTreeMap<u64, ObjectDump>,
    /// Ids the oracle may rebind: the non-null binding values.
    pub modifiable_objects: BTreeSet<u64>,
    /// Class name -> declared instance fields, stdlib and arrays excluded.
    pub schemas: BTreeMap<String, ClassSchema>,
    pub allowed_to_allocate: bool,
}

/// Collect the bounded heap slice for `constraints` under `valuation`.
pub fn collect_heap(
    config: &HeapConfig,
    registry: &ClassRegistry,
    heap: &Heap,
    thread: &ThreadState,
    constraints: &[ExprRef],
    valuation: &Valuation,
) -> Result<HeapSnapshot, CollectError> {
    let irrelevant = config.irrelevant_set();

    let mut vars = BTreeMap::new();
    for constraint in constraints {
        collect_variables(constraint, &mut vars);
    }
    let ref_vars: Vec<&Variable> = vars.values().filter(|v| v.is_reference()).collect();

    // Primary seeding: valuation values of the constraint reference vars
    let mut bindings: BTreeMap<String, Option<u64>> = BTreeMap::new();
    let mut seeds: Vec<ObjectId> = Vec::new();
    for var in &ref_vars {
        let id = valuation.get(&var.name).and_then(|v| v.as_ref_id());
        match id {
            Some(id) if !id.is_null() && heap.contains(id) => {
                bindings.insert(var.name.clone(), Some(id.0));
                seeds.push(id);
            }
            _ => {
                bindings.insert(var.name.clone(), None);
            }
        }
    }

    // Secondary seeding: class-name guesses from the variable names
    if seeds.is_empty() && !ref_vars.is_empty() {
        let candidates: HashSet<String> = ref_vars
            .iter()
            .map(|v| pascal_case(v.base_name()))
            .collect();
        for (id, object) in heap.iter() {
            if candidates.contains(simple_name(&object.class_name))
                || candidates.contains(&object.class_name)
            {
                seeds.push(id);
            }
        }
        if !seeds.is_empty() {
            debug!(candidates = ?candidates, seeds = seeds.len(), "seeded slice by class name");
        }
    }

    // Last resort: frame reference slots and valuation entries
    if seeds.is_empty() && ref_vars.is_empty() {
        if let Some(frame) = thread.top_frame() {
            seeds.extend(
                frame
                    .locals
                    .iter()
                    .filter_map(Value::as_ref_id)
                    .filter(|id| !id.is_null() && heap.contains(*id)),
            );
        }
        for (_, value) in valuation.iter() {
            let id = match value {
                Value::Ref(id) => id,
                Value::Long(n) if n > 0 => ObjectId(n as u64),
                _ => continue,
            };
            if !id.is_null() && heap.contains(id) {
                seeds.push(id);
            }
        }
    }

    // Bounded BFS over reference fields and array elements
    let mut admitted: BTreeSet<ObjectId> = BTreeSet::new();
    let mut queue: VecDeque<(ObjectId, usize)> = VecDeque::new();
    for seed in seeds {
        if admitted.insert(seed) {
            queue.push_back((seed, 0));
        }
    }
    while let Some((id, depth)) = queue.pop_front() {
        if depth >= config.max_depth {
            continue;
        }
        let Some(object) = heap.get(id) else { continue };
        let neighbours: Vec<ObjectId> = if let Some(elements) = &object.elements {
            elements.iter().filter_map(Value::as_ref_id).collect()
        } else {
            object
                .fields
                .iter()
                .filter(|(name, _)| !irrelevant.contains(name.as_str()))
                .filter_map(|(_, value)| value.as_ref_id())
                .collect()
        };
        for next in neighbours {
            if next.is_null() || !heap.contains(next) {
                continue;
            }
            if admitted.len() >= config.max_objects {
                break;
            }
            if admitted.insert(next) {
                queue.push_back((next, depth + 1));
            }
        }
    }

    // Dump objects; references leaving the slice dump as null so every id
    // in the output resolves within it
    let mut objects = BTreeMap::new();
    for &id in &admitted {
        let object = heap.get(id).expect("admitted objects are live");
        let dump = if let Some(elements) = &object.elements {
            let sample: Vec<serde_json::Value> = elements
                .iter()
                .take(ARRAY_SAMPLE)
                .map(|v| value_to_json(*v, &admitted))
                .collect();
            ObjectDump {
                class: object.class_name.clone(),
                fields: BTreeMap::new(),
                length: Some(elements.len()),
                elements: Some(sample),
            }
        } else {
            let fields = object
                .fields
                .iter()
                .filter(|(name, _)| !irrelevant.contains(name.as_str()))
                .map(|(name, value)| (name.clone(), value_to_json(*value, &admitted)))
                .collect();
            ObjectDump {
                class: object.class_name.clone(),
                fields,
                length: None,
                elements: None,
            }
        };
        objects.insert(id.0, dump);
    }

    let modifiable_objects: BTreeSet<u64> = bindings.values().flatten().copied().collect();

    let mut schemas = BTreeMap::new();
    for dump in objects.values() {
        let class_name = &dump.class;
        if class_name.ends_with("[]")
            || STDLIB_PREFIXES.iter().any(|p| class_name.starts_with(p))
            || schemas.contains_key(class_name)
        {
            continue;
        }
        if let Some(class) = registry.lookup(class_name) {
            let fields = class
                .fields
                .iter()
                .filter(|f| !irrelevant.contains(f.name.as_str()))
                .map(|f| (f.name.clone(), simple_name(&f.type_name).to_string()))
                .collect();
            schemas.insert(class_name.clone(), ClassSchema { fields });
        }
    }

    Ok(HeapSnapshot {
        bindings,
        objects,
        modifiable_objects,
        schemas,
        allowed_to_allocate: true,
    })
}

fn value_to_json(value: Value, slice: &BTreeSet<ObjectId>) -> serde_json::Value {
    match value {
        Value::Long(n) => serde_json::json!(n),
        Value::Double(x) => serde_json::json!(x),
        Value::Bool(b) => serde_json::json!(b),
        Value::Ref(id) if id.is_null() || !slice.contains(&id) => serde_json::Value::Null,
        Value::Ref(id) => serde_json::json!(id.0),
    }
}

fn pascal_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{CompareOp, Expr};
    use crate::runtime::ClassInfo;

    fn node_class() -> ClassInfo {
        ClassInfo::class("Node")
            .with_field("next", "Node")
            .with_field("value", "int")
    }

    fn head_constraint() -> ExprRef {
        Expr::compare(
            CompareOp::Ne,
            Expr::var(Variable::reference("head")),
            Expr::null(),
        )
    }

    /// Build the cyclic list n0 -> n1 -> n2 -> n0 plus one unrelated object.
    fn cyclic_setup() -> (ClassRegistry, Heap, [ObjectId; 3], ObjectId) {
        let mut registry = ClassRegistry::new();
        registry.define(node_class());
        registry.define(ClassInfo::class("Unrelated"));

        let node = registry.lookup("Node").unwrap().clone();
        let unrelated = registry.lookup("Unrelated").unwrap().clone();
        let mut heap = Heap::new();
        let n0 = heap.allocate(&node).unwrap();
        let n1 = heap.allocate(&node).unwrap();
        let n2 = heap.allocate(&node).unwrap();
        heap.get_mut(n0).unwrap().set_field("next", Value::Ref(n1));
        heap.get_mut(n1).unwrap().set_field("next", Value::Ref(n2));
        heap.get_mut(n2).unwrap().set_field("next", Value::Ref(n0));
        let other = heap.allocate(&unrelated).unwrap();
        (registry, heap, [n0, n1, n2], other)
    }

    #[test]
    fn test_cycle_terminates_and_slices_exactly() {
        let (registry, heap, [n0, n1, n2], other) = cyclic_setup();
        let mut val = Valuation::new();
        val.set(&Variable::reference("head"), Value::Ref(n0));

        let snapshot = collect_heap(
            &HeapConfig::default(),
            &registry,
            &heap,
            &ThreadState::new(),
            &[head_constraint()],
            &val,
        )
        .unwrap();

        let ids: BTreeSet<u64> = snapshot.objects.keys().copied().collect();
        assert_eq!(ids, BTreeSet::from([n0.0, n1.0, n2.0]));
        assert!(!ids.contains(&other.0), "unreachable objects stay out");
        assert_eq!(snapshot.modifiable_objects, BTreeSet::from([n0.0]));
        assert_eq!(snapshot.bindings.get("head(ref)"), Some(&Some(n0.0)));
        assert!(snapshot.allowed_to_allocate);
    }

    #[test]
    fn test_null_bindings_are_preserved() {
        let (registry, heap, _, _) = cyclic_setup();
        let val = Valuation::new(); // head unbound

        let snapshot = collect_heap(
            &HeapConfig::default(),
            &registry,
            &heap,
            &ThreadState::new(),
            &[head_constraint()],
            &val,
        )
        .unwrap();

        assert_eq!(snapshot.bindings.get("head(ref)"), Some(&None));
        assert!(snapshot.modifiable_objects.is_empty());
    }

    #[test]
    fn test_class_name_fallback_seeding() {
        let (registry, heap, [n0, n1, n2], _) = cyclic_setup();
        // "node(ref)" has no valuation entry; PascalCase gives "Node"
        let constraint = Expr::compare(
            CompareOp::Ne,
            Expr::var(Variable::reference("node")),
            Expr::null(),
        );

        let snapshot = collect_heap(
            &HeapConfig::default(),
            &registry,
            &heap,
            &ThreadState::new(),
            &[constraint],
            &Valuation::new(),
        )
        .unwrap();

        let ids: BTreeSet<u64> = snapshot.objects.keys().copied().collect();
        assert_eq!(ids, BTreeSet::from([n0.0, n1.0, n2.0]));
    }

    #[test]
    fn test_frame_fallback_when_no_reference_vars() {
        let (registry, heap, [n0, ..], _) = cyclic_setup();
        let mut thread = ThreadState::new();
        thread.push_frame(
            crate::runtime::Frame::new("Zoo", "walk", "()V")
                .with_locals(vec![Value::Ref(n0), Value::Long(3)]),
        );

        // Purely numeric constraint: no reference variables at all
        let constraint = Expr::compare(
            CompareOp::Lt,
            Expr::var(Variable::long("i")),
            Expr::int(10),
        );

        let snapshot = collect_heap(
            &HeapConfig::default(),
            &registry,
            &heap,
            &thread,
            &[constraint],
            &Valuation::new(),
        )
        .unwrap();
        assert!(snapshot.objects.contains_key(&n0.0));
    }

    #[test]
    fn test_depth_and_object_bounds() {
        let (registry, heap, [n0, n1, n2], _) = cyclic_setup();
        let mut val = Valuation::new();
        val.set(&Variable::reference("head"), Value::Ref(n0));

        let shallow = HeapConfig {
            max_depth: 1,
            ..HeapConfig::default()
        };
        let snapshot = collect_heap(
            &shallow,
            &registry,
            &heap,
            &ThreadState::new(),
            &[head_constraint()],
            &val,
        )
        .unwrap();
        let ids: BTreeSet<u64> = snapshot.objects.keys().copied().collect();
        assert_eq!(ids, BTreeSet::from([n0.0, n1.0]), "depth 1 stops after one hop");

        let tiny = HeapConfig {
            max_objects: 2,
            ..HeapConfig::default()
        };
        let snapshot = collect_heap(
            &tiny,
            &registry,
            &heap,
            &ThreadState::new(),
            &[head_constraint()],
            &val,
        )
        .unwrap();
        assert_eq!(snapshot.objects.len(), 2);
        // n1's next leaves the slice, so it dumps as null
        let n1_dump = &snapshot.objects[&n1.0];
        assert_eq!(n1_dump.fields.get("next"), Some(&serde_json::Value::Null));
        let _ = n2;
    }

    #[test]
    fn test_schemas_and_irrelevant_fields() {
        let mut registry = ClassRegistry::new();
        registry.define(node_class().with_field("modCount", "int"));
        let node = registry.lookup("Node").unwrap().clone();
        let mut heap = Heap::new();
        let n0 = heap.allocate(&node).unwrap();

        let mut val = Valuation::new();
        val.set(&Variable::reference("head"), Value::Ref(n0));

        let snapshot = collect_heap(
            &HeapConfig::default(),
            &registry,
            &heap,
            &ThreadState::new(),
            &[head_constraint()],
            &val,
        )
        .unwrap();

        let schema = &snapshot.schemas["Node"];
        assert_eq!(schema.fields.get("next"), Some(&"Node".to_string()));
        assert_eq!(schema.fields.get("value"), Some(&"int".to_string()));
        assert!(!schema.fields.contains_key("modCount"));
        assert!(!snapshot.objects[&n0.0].fields.contains_key("modCount"));
    }

    #[test]
    fn test_array_objects_dump_length_and_sample() {
        let mut registry = ClassRegistry::new();
        registry.define(node_class());
        let node = registry.lookup("Node").unwrap().clone();
        let mut heap = Heap::new();
        let n0 = heap.allocate(&node).unwrap();
        let arr = heap.allocate_array("Node", 15);
        for i in 0..15 {
            heap.get_mut(arr).unwrap().elements.as_mut().unwrap()[i] = Value::Ref(n0);
        }

        let mut val = Valuation::new();
        val.set(&Variable::reference("nodes"), Value::Ref(arr));
        let constraint = Expr::compare(
            CompareOp::Ne,
            Expr::var(Variable::reference("nodes")),
            Expr::null(),
        );

        let snapshot = collect_heap(
            &HeapConfig::default(),
            &registry,
            &heap,
            &ThreadState::new(),
            &[constraint],
            &val,
        )
        .unwrap();

        let dump = &snapshot.objects[&arr.0];
        assert_eq!(dump.length, Some(15));
        assert_eq!(dump.elements.as_ref().unwrap().len(), ARRAY_SAMPLE);
        assert!(snapshot.objects.contains_key(&n0.0), "elements are traversed");
        assert!(
            !snapshot.schemas.contains_key("Node[]"),
            "array types get no schema"
        );
    }
}
