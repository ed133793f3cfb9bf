//! Heap model: object ids, runtime values, and the allocator.

use std::collections::BTreeMap;
use std::fmt;

use super::class::{ClassInfo, FieldInfo};
use super::RuntimeError;

/// A heap reference. Id 0 is the null reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl ObjectId {
    pub const NULL: ObjectId = ObjectId(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("null")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// A concrete runtime value: primitive or reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Long(i64),
    Double(f64),
    Bool(bool),
    Ref(ObjectId),
}

impl Value {
    pub const NULL: Value = Value::Ref(ObjectId::NULL);

    pub fn as_ref_id(&self) -> Option<ObjectId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Default value for a declared field type.
    pub fn default_for(type_name: &str) -> Value {
        match type_name {
            "boolean" => Value::Bool(false),
            "float" | "double" => Value::Double(0.0),
            "byte" | "char" | "short" | "int" | "long" => Value::Long(0),
            _ => Value::NULL,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Long(n) => write!(f, "{}", n),
            Value::Double(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Ref(id) => write!(f, "{}", id),
        }
    }
}

/// A live heap object: instance fields, or elements for arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct HeapObject {
    pub class_name: String,
    pub fields: BTreeMap<String, Value>,
    /// `Some` iff the object is an array.
    pub elements: Option<Vec<Value>>,
}

impl HeapObject {
    pub fn is_array(&self) -> bool {
        self.elements.is_some()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }
}

/// The object heap. Allocation hands out monotonically increasing ids.
#[derive(Debug, Default)]
pub struct Heap {
    objects: BTreeMap<ObjectId, HeapObject>,
    next_id: u64,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            objects: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn fresh_id(&mut self) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Allocate an instance of `class`, with every declared field (own and
    /// inherited fields are the caller's concern; the registry flattens
    /// declarations per class here) set to its type default.
    pub fn allocate(&mut self, class: &ClassInfo) -> Result<ObjectId, RuntimeError> {
        if class.is_interface || class.is_abstract {
            return Err(RuntimeError::NotInstantiable(class.name.clone()));
        }
        let fields = class
            .fields
            .iter()
            .map(|f: &FieldInfo| (f.name.clone(), Value::default_for(&f.type_name)))
            .collect();
        let id = self.fresh_id();
        self.objects.insert(
            id,
            HeapObject {
                class_name: class.name.clone(),
                fields,
                elements: None,
            },
        );
        Ok(id)
    }

    /// Allocate an array of `length` elements of `element_type`, each set
    /// to the element-type default.
    pub fn allocate_array(&mut self, element_type: &str, length: usize) -> ObjectId {
        let id = self.fresh_id();
        self.objects.insert(
            id,
            HeapObject {
                class_name: format!("{}[]", element_type),
                fields: BTreeMap::new(),
                elements: Some(vec![Value::default_for(element_type); length]),
            },
        );
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&HeapObject> {
        if id.is_null() {
            return None;
        }
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut HeapObject> {
        if id.is_null() {
            return None;
        }
        self.objects.get_mut(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Runtime class name of a live object.
    pub fn class_of(&self, id: ObjectId) -> Option<&str> {
        self.get(id).map(|o| o.class_name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &HeapObject)> {
        self.objects.iter().map(|(id, obj)| (*id, obj))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
