//! Runtime value model walked by the graph builder.
//!
//! Scalars carry no identity and are compared by value. Every container is a
//! shared handle (`Arc<RwLock<_>>`), so two `Value`s cloned from the same
//! handle alias one allocation. That allocation is the value's identity: the
//! builder collapses aliases onto one atom and terminates on cycles.
//!
//! ## Type Rules
//!
//! - `Int(1) != Float(1.0)`: different variants are never equal
//! - `Map`, `Set` and `Object` attributes compare order-insensitively
//! - Float equality follows IEEE-754 (`NaN != NaN`)
//! - Pointer-equal handles compare equal without inspecting contents
//!
//! Deep equality on a cyclic value that is not pointer-equal to its
//! counterpart does not terminate; compare cyclic values by identity.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Shared, interior-mutable handle used by every container variant.
pub type Shared<T> = Arc<RwLock<T>>;

/// Wrap a value in a fresh [`Shared`] handle.
pub fn shared<T>(inner: T) -> Shared<T> {
    Arc::new(RwLock::new(inner))
}

/// Built-in type names produced by [`Value::type_name`].
pub mod type_names {
    /// Absent value.
    pub const NULL: &str = "null";
    /// Boolean.
    pub const BOOL: &str = "bool";
    /// Signed integer.
    pub const INT: &str = "int";
    /// Floating point.
    pub const FLOAT: &str = "float";
    /// UTF-8 string.
    pub const STR: &str = "str";
    /// Key/value mapping.
    pub const MAP: &str = "map";
    /// Ordered sequence.
    pub const LIST: &str = "list";
    /// Fixed-size tuple.
    pub const TUPLE: &str = "tuple";
    /// Unordered set.
    pub const SET: &str = "set";
    /// Named callable.
    pub const FUNCTION: &str = "function";
    /// Root of every type hierarchy.
    pub const OBJECT: &str = "object";

    /// Types the exchange format flags as `builtin`.
    pub const BUILTIN: &[&str] = &[
        NULL, BOOL, INT, FLOAT, STR, MAP, LIST, TUPLE, SET, FUNCTION, OBJECT,
    ];

    /// Whether a type name is one of the built-in types.
    pub fn is_builtin(name: &str) -> bool {
        BUILTIN.contains(&name)
    }
}

/// Declared shape of a structured record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    /// Type name.
    pub name: String,
    /// Ancestor type names, most specific first (excluding `object`).
    pub bases: Vec<String>,
    /// Declared field names in declaration order.
    pub fields: Vec<String>,
}

impl RecordSchema {
    /// Create a schema with the given fields and no base types.
    pub fn new(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Set the ancestor types.
    pub fn with_bases(mut self, bases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.bases = bases.into_iter().map(Into::into).collect();
        self
    }

    /// Position of a field in the declaration.
    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }
}

/// Instance of a [`RecordSchema`]: one value per declared field.
#[derive(Clone, PartialEq)]
pub struct Record {
    /// The declared schema.
    pub schema: Arc<RecordSchema>,
    /// Field values, parallel to `schema.fields`.
    pub values: Vec<Value>,
}

impl Record {
    /// Create a record. Values are parallel to the schema's fields.
    pub fn new(schema: Arc<RecordSchema>, values: Vec<Value>) -> Self {
        Self { schema, values }
    }

    /// Get a field value by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.schema.field_index(field).and_then(|i| self.values.get(i))
    }

    /// Set a field value by name. Returns false for undeclared fields.
    pub fn set(&mut self, field: &str, value: Value) -> bool {
        match self.schema.field_index(field) {
            Some(i) if i < self.values.len() => {
                self.values[i] = value;
                true
            }
            _ => false,
        }
    }
}

/// Object with open, introspected attributes.
#[derive(Clone)]
pub struct Object {
    /// Class name.
    pub class: String,
    /// Ancestor type names, most specific first (excluding `object`).
    pub bases: Vec<String>,
    /// Attributes in insertion order.
    pub attrs: Vec<(String, Value)>,
}

impl Object {
    /// Create an object with no attributes.
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            bases: Vec::new(),
            attrs: Vec::new(),
        }
    }

    /// Set the ancestor types.
    pub fn with_bases(mut self, bases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.bases = bases.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value.into());
        self
    }

    /// Set an attribute, replacing an existing one of the same name.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.attrs.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    /// Get an attribute by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Named callable. Never decomposed as an object attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// Callable name.
    pub name: String,
}

/// Caller-owned payload the built-in handlers cannot look into.
#[derive(Clone)]
pub struct Opaque {
    /// Type name reported for the atom.
    pub type_name: String,
    /// Human-readable tag, used as the fallback label when present.
    pub name: Option<String>,
    /// Arbitrary payload for custom handlers to downcast.
    pub payload: Option<Arc<dyn Any + Send + Sync>>,
}

impl Opaque {
    /// Create an opaque value without payload.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: None,
            payload: None,
        }
    }

    /// Attach a human-readable name tag.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a payload.
    pub fn with_payload<T: Any + Send + Sync>(mut self, payload: T) -> Self {
        self.payload = Some(Arc::new(payload));
        self
    }

    /// Downcast the payload.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref().and_then(|p| p.downcast_ref::<T>())
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Opaque")
            .field("type_name", &self.type_name)
            .field("name", &self.name)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Insertion-ordered key/value pairs.
    Map(Shared<Vec<(Value, Value)>>),
    /// Ordered sequence.
    List(Shared<Vec<Value>>),
    /// Fixed-size tuple; positions are distinct fields.
    Tuple(Shared<Vec<Value>>),
    /// Unordered collection of unique values.
    Set(Shared<Vec<Value>>),
    /// Structured record with a declared schema.
    Record(Shared<Record>),
    /// Object with introspected attributes.
    Object(Shared<Object>),
    /// Named callable.
    Function(Arc<Function>),
    /// Caller payload.
    Opaque(Arc<Opaque>),
}

fn addr<T: ?Sized>(handle: &Arc<T>) -> usize {
    Arc::as_ptr(handle) as *const () as usize
}

impl Value {
    /// Create a mapping from key/value pairs (later duplicates replace earlier ones).
    pub fn map(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut entries: Vec<(Value, Value)> = Vec::new();
        for (k, v) in pairs {
            match entries.iter_mut().find(|(existing, _)| *existing == k) {
                Some(slot) => slot.1 = v,
                None => entries.push((k, v)),
            }
        }
        Value::Map(shared(entries))
    }

    /// Create a list.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(shared(items.into_iter().collect()))
    }

    /// Create a tuple.
    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Tuple(shared(items.into_iter().collect()))
    }

    /// Create a set, dropping duplicates.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut unique = Vec::new();
        for item in items {
            insert_unique(&mut unique, item);
        }
        Value::Set(shared(unique))
    }

    /// Create a record instance.
    pub fn record(schema: Arc<RecordSchema>, values: Vec<Value>) -> Self {
        Value::Record(shared(Record::new(schema, values)))
    }

    /// Wrap an object.
    pub fn object(object: Object) -> Self {
        Value::Object(shared(object))
    }

    /// Create a named callable.
    pub fn function(name: impl Into<String>) -> Self {
        Value::Function(Arc::new(Function { name: name.into() }))
    }

    /// Wrap an opaque payload.
    pub fn opaque(opaque: Opaque) -> Self {
        Value::Opaque(Arc::new(opaque))
    }

    /// Whether this is a scalar (no identity).
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_)
        )
    }

    /// Reference identity token of the underlying allocation.
    ///
    /// `None` for scalars. Stable only while some handle keeps the
    /// allocation alive.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => None,
            Value::Map(h) => Some(addr(h)),
            Value::List(h) | Value::Tuple(h) | Value::Set(h) => Some(addr(h)),
            Value::Record(h) => Some(addr(h)),
            Value::Object(h) => Some(addr(h)),
            Value::Function(h) => Some(addr(h)),
            Value::Opaque(h) => Some(addr(h)),
        }
    }

    /// Whether two values share one allocation.
    pub fn same_identity(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Most specific type name.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => type_names::NULL.to_string(),
            Value::Bool(_) => type_names::BOOL.to_string(),
            Value::Int(_) => type_names::INT.to_string(),
            Value::Float(_) => type_names::FLOAT.to_string(),
            Value::Str(_) => type_names::STR.to_string(),
            Value::Map(_) => type_names::MAP.to_string(),
            Value::List(_) => type_names::LIST.to_string(),
            Value::Tuple(_) => type_names::TUPLE.to_string(),
            Value::Set(_) => type_names::SET.to_string(),
            Value::Record(r) => r.read_recursive().schema.name.clone(),
            Value::Object(o) => o.read_recursive().class.clone(),
            Value::Function(_) => type_names::FUNCTION.to_string(),
            Value::Opaque(o) => o.type_name.clone(),
        }
    }

    /// Full ancestor chain, most specific first, always ending in `object`.
    pub fn type_hierarchy(&self) -> Vec<String> {
        let mut chain = vec![self.type_name()];
        match self {
            Value::Record(r) => chain.extend(r.read_recursive().schema.bases.iter().cloned()),
            Value::Object(o) => chain.extend(o.read_recursive().bases.iter().cloned()),
            _ => {}
        }
        if chain.last().map(String::as_str) != Some(type_names::OBJECT) {
            chain.push(type_names::OBJECT.to_string());
        }
        chain
    }

    /// Textual rendering of a scalar, `None` for containers.
    pub fn primitive_text(&self) -> Option<String> {
        match self {
            Value::Null => Some("null".to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            // Debug keeps a trailing ".0" so the label parses back as a float.
            Value::Float(x) => Some(format!("{:?}", x)),
            Value::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Parse a scalar back from its type name and rendering.
    pub fn parse_primitive(type_name: &str, text: &str) -> Option<Value> {
        match type_name {
            type_names::NULL => Some(Value::Null),
            type_names::BOOL => text.parse().ok().map(Value::Bool),
            type_names::INT => text.parse().ok().map(Value::Int),
            type_names::FLOAT => text.parse().ok().map(Value::Float),
            type_names::STR => Some(Value::Str(text.to_string())),
            _ => None,
        }
    }

    /// Get as string slice if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as integer if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as float if this is a `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Get as bool if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Snapshot of a list or tuple's items.
    pub fn items(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(h) | Value::Tuple(h) | Value::Set(h) => Some(h.read_recursive().clone()),
            _ => None,
        }
    }

    /// Look up a mapping entry by key.
    pub fn get_key(&self, key: &Value) -> Option<Value> {
        match self {
            Value::Map(h) => h
                .read_recursive()
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    /// Look up a record field or object attribute.
    pub fn get_field(&self, name: &str) -> Option<Value> {
        match self {
            Value::Record(h) => h.read_recursive().get(name).cloned(),
            Value::Object(h) => h.read_recursive().get(name).cloned(),
            _ => None,
        }
    }

    /// Number of children held directly by a container.
    pub fn len(&self) -> usize {
        match self {
            Value::Map(h) => h.read_recursive().len(),
            Value::List(h) | Value::Tuple(h) | Value::Set(h) => h.read_recursive().len(),
            Value::Record(h) => h.read_recursive().values.len(),
            Value::Object(h) => h.read_recursive().attrs.len(),
            _ => 0,
        }
    }

    /// Whether a container holds no children (always true for scalars).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fmt_with_path(&self, f: &mut fmt::Formatter<'_>, path: &mut Vec<usize>) -> fmt::Result {
        if let Some(id) = self.identity() {
            if path.contains(&id) {
                return write!(f, "<cycle {}>", self.type_name());
            }
        }
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Function(func) => write!(f, "<function {}>", func.name),
            Value::Opaque(o) => write!(f, "<{} {}>", o.type_name, o.name.as_deref().unwrap_or("?")),
            Value::Map(h) => {
                path.push(addr(h));
                write!(f, "{{")?;
                for (i, (k, v)) in h.read_recursive().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    k.fmt_with_path(f, path)?;
                    write!(f, ": ")?;
                    v.fmt_with_path(f, path)?;
                }
                path.pop();
                write!(f, "}}")
            }
            Value::List(h) | Value::Tuple(h) | Value::Set(h) => {
                let (open, close) = match self {
                    Value::List(_) => ("[", "]"),
                    Value::Tuple(_) => ("(", ")"),
                    _ => ("set{", "}"),
                };
                path.push(addr(h));
                write!(f, "{}", open)?;
                for (i, item) in h.read_recursive().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt_with_path(f, path)?;
                }
                path.pop();
                write!(f, "{}", close)
            }
            Value::Record(h) => {
                path.push(addr(h));
                let record = h.read_recursive();
                write!(f, "{}(", record.schema.name)?;
                for (i, (name, value)) in record.schema.fields.iter().zip(&record.values).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}=", name)?;
                    value.fmt_with_path(f, path)?;
                }
                path.pop();
                write!(f, ")")
            }
            Value::Object(h) => {
                path.push(addr(h));
                let object = h.read_recursive();
                write!(f, "{} {{", object.class)?;
                for (i, (name, value)) in object.attrs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", name)?;
                    value.fmt_with_path(f, path)?;
                }
                path.pop();
                write!(f, "}}")
            }
        }
    }
}

/// Push `item` unless an equal value is already present.
pub fn insert_unique(items: &mut Vec<Value>, item: Value) -> bool {
    if items.iter().any(|existing| *existing == item) {
        false
    } else {
        items.push(item);
        true
    }
}

fn unordered_eq(a: &[Value], b: &[Value]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|x| {
        match b.iter().enumerate().position(|(i, y)| !used[i] && x == y) {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

fn map_eq(a: &[(Value, Value)], b: &[(Value, Value)]) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(k, v)| b.iter().any(|(bk, bv)| bk == k && bv == v))
}

fn object_eq(a: &Object, b: &Object) -> bool {
    a.class == b.class
        && a.attrs.len() == b.attrs.len()
        && a.attrs.iter().all(|(name, v)| b.get(name) == Some(v))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                Arc::ptr_eq(a, b) || *a.read_recursive() == *b.read_recursive()
            }
            (Value::Set(a), Value::Set(b)) => {
                Arc::ptr_eq(a, b) || unordered_eq(&a.read_recursive(), &b.read_recursive())
            }
            (Value::Map(a), Value::Map(b)) => {
                Arc::ptr_eq(a, b) || map_eq(&a.read_recursive(), &b.read_recursive())
            }
            (Value::Record(a), Value::Record(b)) => {
                Arc::ptr_eq(a, b) || *a.read_recursive() == *b.read_recursive()
            }
            (Value::Object(a), Value::Object(b)) => {
                Arc::ptr_eq(a, b) || object_eq(&a.read_recursive(), &b.read_recursive())
            }
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with_path(f, &mut Vec::new())
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("schema", &self.schema.name)
            .field("fields", &self.values.len())
            .finish()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class)
            .field("attrs", &self.attrs.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(f64::from(x))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::list(items.into_iter().map(Into::into))
    }
}
