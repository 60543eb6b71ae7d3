//! Runtime value model for sandboxed execution.
//!
//! Containers are copy-on-write: cloning a list or dict bumps a refcount,
//! and the first mutation of a shared container clones the backing store
//! (`Arc::make_mut`). A container can only ever hold values that existed
//! before it was built, so reference cycles are unconstructible and every
//! value is `Send + Sync`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::ast::Stmt;

/// Copy-on-write sequence. Cheap to clone (refcount bump).
/// Mutations clone the inner Vec if shared (Arc::make_mut).
#[derive(Clone, Debug, Default)]
pub struct ValueList(Arc<Vec<Value>>);

impl ValueList {
    pub fn new() -> Self {
        ValueList(Arc::new(Vec::new()))
    }

    pub fn from_vec(values: Vec<Value>) -> Self {
        ValueList(Arc::new(values))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Mutable slot access; unshares the backing store first.
    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        Arc::make_mut(&mut self.0).get_mut(index)
    }

    /// Replace the element at `index`. Returns false if out of bounds.
    pub fn set(&mut self, index: usize, value: Value) -> bool {
        let items = Arc::make_mut(&mut self.0);
        match items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn push(&mut self, value: Value) {
        Arc::make_mut(&mut self.0).push(value);
    }

    pub fn pop(&mut self) -> Option<Value> {
        Arc::make_mut(&mut self.0).pop()
    }

    /// Insert at `index`, clamped to the end like the embedded language does.
    pub fn insert(&mut self, index: usize, value: Value) {
        let items = Arc::make_mut(&mut self.0);
        let index = index.min(items.len());
        items.insert(index, value);
    }

    /// Remove the element at `index`. Returns None if out of bounds.
    pub fn remove(&mut self, index: usize) -> Option<Value> {
        let items = Arc::make_mut(&mut self.0);
        if index < items.len() {
            Some(items.remove(index))
        } else {
            None
        }
    }

    pub fn reverse(&mut self) {
        Arc::make_mut(&mut self.0).reverse();
    }

    pub fn clear(&mut self) {
        Arc::make_mut(&mut self.0).clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    /// True if no other handle shares this backing store.
    pub fn is_exclusively_owned(&self) -> bool {
        Arc::strong_count(&self.0) == 1
    }

    /// Extract the inner Vec, cloning only if the store is shared.
    pub fn into_vec(self) -> Vec<Value> {
        Arc::try_unwrap(self.0).unwrap_or_else(|arc| (*arc).clone())
    }
}

impl PartialEq for ValueList {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_ref() == other.0.as_ref()
    }
}

impl From<Vec<Value>> for ValueList {
    fn from(values: Vec<Value>) -> Self {
        ValueList(Arc::new(values))
    }
}

impl FromIterator<Value> for ValueList {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        ValueList(Arc::new(iter.into_iter().collect()))
    }
}

/// Copy-on-write string-keyed map. Keys are restricted to strings, so
/// iteration order is key order and therefore deterministic.
#[derive(Clone, Debug, Default)]
pub struct ValueDict(Arc<BTreeMap<String, Value>>);

impl ValueDict {
    pub fn new() -> Self {
        ValueDict(Arc::new(BTreeMap::new()))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Mutable slot access; unshares the backing store first.
    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        Arc::make_mut(&mut self.0).get_mut(key)
    }

    pub fn insert(&mut self, key: String, value: Value) {
        Arc::make_mut(&mut self.0).insert(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        Arc::make_mut(&mut self.0).remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        Arc::make_mut(&mut self.0).clear();
    }

    pub fn iter(&self) -> std::collections::btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    pub fn keys(&self) -> std::collections::btree_map::Keys<'_, String, Value> {
        self.0.keys()
    }

    pub fn values(&self) -> std::collections::btree_map::Values<'_, String, Value> {
        self.0.values()
    }

    pub fn is_exclusively_owned(&self) -> bool {
        Arc::strong_count(&self.0) == 1
    }
}

impl PartialEq for ValueDict {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_ref() == other.0.as_ref()
    }
}

impl From<BTreeMap<String, Value>> for ValueDict {
    fn from(map: BTreeMap<String, Value>) -> Self {
        ValueDict(Arc::new(map))
    }
}

/// A user-defined function captured at `def` time.
///
/// Defaults are evaluated once, when the definition executes, and align
/// with the trailing positional parameters.
#[derive(Debug, Clone)]
pub struct FunctionValue {
    pub name: String,
    pub params: Vec<String>,
    pub defaults: Vec<Value>,
    pub vararg: Option<String>,
    pub kwarg: Option<String>,
    pub body: Vec<Stmt>,
}

/// A method detached from `receiver.method` without being called.
///
/// Holds a snapshot of the receiver: calling the detached method later
/// mutates the snapshot, not the binding the receiver was read from.
/// Only direct `name.method(...)` calls write mutations back.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    pub receiver: Value,
    pub method: Arc<str>,
}

/// Runtime value type
#[derive(Clone)]
pub enum Value {
    /// The null value
    None,
    /// Boolean value
    Bool(bool),
    /// Integer value (64-bit; arithmetic overflow faults rather than wraps)
    Int(i64),
    /// Floating-point value (IEEE 754 double-precision)
    Float(f64),
    /// String value (reference-counted, immutable)
    Str(Arc<String>),
    /// Tuple value (immutable sequence)
    Tuple(Arc<Vec<Value>>),
    /// List value (copy-on-write, value semantics)
    List(ValueList),
    /// Dict value with string keys (copy-on-write)
    Dict(ValueDict),
    /// User-defined function
    Function(Arc<FunctionValue>),
    /// Detached bound method (snapshot receiver)
    BoundMethod(Arc<BoundMethod>),
    /// Builtin function (dispatched through the registry by name)
    Builtin(Arc<str>),
    /// Imported module handle (attribute access resolves registry members)
    Module(Arc<str>),
}

impl Value {
    /// Create a new string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(Arc::new(s.into()))
    }

    /// Create a new list value
    pub fn list(values: Vec<Value>) -> Self {
        Value::List(ValueList::from_vec(values))
    }

    /// Create a new tuple value
    pub fn tuple(values: Vec<Value>) -> Self {
        Value::Tuple(Arc::new(values))
    }

    /// Create a new builtin reference
    pub fn builtin(name: impl Into<Arc<str>>) -> Self {
        Value::Builtin(name.into())
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
            Value::BoundMethod(_) => "builtin_function_or_method",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Module(_) => "module",
        }
    }

    /// Truthiness: None, False, zero, and empty containers are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Dict(map) => !map.is_empty(),
            Value::Function(_) | Value::BoundMethod(_) | Value::Builtin(_) | Value::Module(_) => {
                true
            }
        }
    }

    /// Quoted form, as the embedded language's `repr` would render it.
    /// Container display uses this for elements, so `[1, 'a']` keeps its
    /// quotes while a top-level string displays raw.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => quote_str(s),
            other => other.to_string(),
        }
    }

    /// Integer view for arithmetic: bools count as 0/1.
    pub(crate) fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Float view for arithmetic: ints and bools widen.
    pub(crate) fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            Value::Bool(b) => Some(*b as i64 as f64),
            _ => None,
        }
    }
}

/// Equality used by the `==` operator. Numbers compare across int,
/// float, and bool; containers compare element-wise with the same rule;
/// functions compare by identity.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::None, Value::None) => true,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Tuple(x), Value::Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len()
                && x.iter().zip(y.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::Dict(x), Value::Dict(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        (Value::Function(x), Value::Function(y)) => Arc::ptr_eq(x, y),
        (Value::BoundMethod(x), Value::BoundMethod(y)) => {
            x.method == y.method && values_equal(&x.receiver, &y.receiver)
        }
        (Value::Builtin(x), Value::Builtin(y)) => x == y,
        (Value::Module(x), Value::Module(y)) => x == y,
        _ => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

/// Ordering used by `<`-family comparisons and by sorting builtins.
/// Numbers order across int, float, and bool; strings and sequences of
/// comparable elements order lexicographically. Anything else faults.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Result<Ordering, Fault> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Tuple(x), Value::Tuple(y)) => compare_sequences(x, y),
        (Value::List(x), Value::List(y)) => compare_sequences(x.as_slice(), y.as_slice()),
        _ => match (a.as_float(), b.as_float()) {
            // NaN is unordered; fall to Greater so it sinks in sorts.
            (Some(x), Some(y)) => Ok(x.partial_cmp(&y).unwrap_or(Ordering::Greater)),
            _ => Err(Fault::type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}

fn compare_sequences(a: &[Value], b: &[Value]) -> Result<Ordering, Fault> {
    for (x, y) in a.iter().zip(b.iter()) {
        match compare_values(x, y)? {
            Ordering::Equal => continue,
            other => return Ok(other),
        }
    }
    Ok(a.len().cmp(&b.len()))
}

/// Materialize the elements of an iterable value. Strings yield their
/// characters, dicts their keys. Returns None for non-iterables.
pub(crate) fn iter_elements(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Str(s) => Some(s.chars().map(|c| Value::string(c.to_string())).collect()),
        Value::Tuple(items) => Some(items.as_ref().clone()),
        Value::List(items) => Some(items.as_slice().to_vec()),
        Value::Dict(map) => Some(map.keys().map(|k| Value::string(k.clone())).collect()),
        _ => None,
    }
}

/// Equality contract:
///
/// Content equality per variant; different variants are never equal, so
/// `Int(1)` and `Float(1.0)` differ here even though the interpreter's
/// `==` operator compares them numerically. Functions and methods compare
/// by name.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.name == b.name,
            (Value::BoundMethod(a), Value::BoundMethod(b)) => {
                a.method == b.method && a.receiver == b.receiver
            }
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => f.write_str(&format_float(*n)),
            Value::Str(s) => f.write_str(s),
            Value::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                if parts.len() == 1 {
                    write!(f, "({},)", parts[0])
                } else {
                    write!(f, "({})", parts.join(", "))
                }
            }
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Dict(map) => {
                let parts: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quote_str(k), v.repr()))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Function(func) => write!(f, "<function {}>", func.name),
            Value::BoundMethod(m) => {
                write!(f, "<bound method {}.{}>", m.receiver.type_name(), m.method)
            }
            Value::Builtin(name) => write!(f, "<built-in function {}>", name),
            Value::Module(name) => write!(f, "<module '{}'>", name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(n) => write!(f, "Int({})", n),
            Value::Float(n) => write!(f, "Float({})", n),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Tuple(items) => write!(f, "Tuple({:?})", items),
            Value::List(items) => write!(f, "List({:?})", items.as_slice()),
            Value::Dict(map) => write!(f, "Dict({:?})", map),
            Value::Function(func) => write!(f, "Function({:?})", func.name),
            Value::BoundMethod(m) => {
                write!(f, "BoundMethod({:?}.{})", m.receiver, m.method)
            }
            Value::Builtin(name) => write!(f, "Builtin({:?})", name),
            Value::Module(name) => write!(f, "Module({:?})", name),
        }
    }
}

/// Float form matching the embedded language: integral values keep a
/// trailing `.0`, non-finite values render as `nan`/`inf`.
fn format_float(n: f64) -> String {
    if n.is_nan() {
        "nan".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else if n.fract() == 0.0 {
        format!("{:.1}", n)
    } else {
        format!("{}", n)
    }
}

fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

/// Runtime failure kind, named after the classic exception taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    NameError,
    TypeError,
    ZeroDivisionError,
    ValueError,
    OverflowError,
    RecursionError,
    IndexError,
    KeyError,
    AttributeError,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::NameError => "NameError",
            FaultKind::TypeError => "TypeError",
            FaultKind::ZeroDivisionError => "ZeroDivisionError",
            FaultKind::ValueError => "ValueError",
            FaultKind::OverflowError => "OverflowError",
            FaultKind::RecursionError => "RecursionError",
            FaultKind::IndexError => "IndexError",
            FaultKind::KeyError => "KeyError",
            FaultKind::AttributeError => "AttributeError",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A runtime fault raised by executed code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Fault {
            kind,
            message: message.into(),
        }
    }

    pub fn name_error(name: &str) -> Self {
        Fault::new(FaultKind::NameError, format!("name '{}' is not defined", name))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Fault::new(FaultKind::TypeError, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Fault::new(FaultKind::ValueError, message)
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        Fault::new(FaultKind::ZeroDivisionError, message)
    }

    pub fn overflow(message: impl Into<String>) -> Self {
        Fault::new(FaultKind::OverflowError, message)
    }

    pub fn recursion() -> Self {
        Fault::new(FaultKind::RecursionError, "maximum recursion depth exceeded")
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Fault::new(FaultKind::IndexError, message)
    }

    pub fn key_error(key: &str) -> Self {
        Fault::new(FaultKind::KeyError, format!("'{}'", key))
    }

    pub fn attribute_error(type_name: &str, attr: &str) -> Self {
        Fault::new(
            FaultKind::AttributeError,
            format!("'{}' object has no attribute '{}'", type_name, attr),
        )
    }
}
