//! Runtime values and variable bindings
//!
//! A [`Bindings`] scope maps names to [`Binding`]s: plain values, callables, or
//! nested scopes reached through dotted paths (`lib.inverse`).

use crate::error::{FormulaError, FormulaResult};
use ahash::AHashMap;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    String(String),
    Array(Vec<Value>),
}

impl Value {
    /// Get the number, if this is one
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the string, if this is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    /// Host truthiness: non-zero numbers, non-empty strings and every array
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) => true,
        }
    }

    /// Name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
        }
    }

    /// Describe the value for an error message (strings are quoted)
    pub(crate) fn describe(&self) -> String {
        match self {
            Value::String(s) => format!("\"{}\"", s),
            other => other.to_string(),
        }
    }
}

/// Format a number the way formulas render it (`4`, `0.3`, `-4`, `Infinity`)
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item.describe())?;
                }
                f.write_str("]")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            // JSON has no representation for these; keep them apart from null
            Value::Number(n) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$num", &format_number(*n))?;
                map.end()
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => serializer.collect_seq(items),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

/// Signature of host-supplied functions
pub type FunctionImpl = dyn Fn(&[Value]) -> FormulaResult<Value> + Send + Sync;

static NEXT_FUNCTION_ID: AtomicU64 = AtomicU64::new(0);

/// A host-supplied function that formulas can call
///
/// Every call to [`NativeFunction::new`] gets a process-unique id; clones share it.
#[derive(Clone)]
pub struct NativeFunction {
    id: u64,
    f: Arc<FunctionImpl>,
}

impl NativeFunction {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> FormulaResult<Value> + Send + Sync + 'static,
    {
        Self {
            id: NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed),
            f: Arc::new(f),
        }
    }

    pub fn call(&self, args: &[Value]) -> FormulaResult<Value> {
        (self.f)(args)
    }

    /// Identity used in memoization keys, never reused within a process
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction(#{})", self.id)
    }
}

impl PartialEq for NativeFunction {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// What a name is bound to
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Value(Value),
    Function(NativeFunction),
    Scope(Bindings),
}

impl Binding {
    /// Wrap a closure as a function binding
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> FormulaResult<Value> + Send + Sync + 'static,
    {
        Binding::Function(NativeFunction::new(f))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Binding::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&NativeFunction> {
        match self {
            Binding::Function(f) => Some(f),
            _ => None,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Binding::Value(_) => "value",
            Binding::Function(_) => "function",
            Binding::Scope(_) => "scope",
        }
    }
}

impl From<Value> for Binding {
    fn from(value: Value) -> Self {
        Binding::Value(value)
    }
}

impl From<f64> for Binding {
    fn from(n: f64) -> Self {
        Binding::Value(Value::Number(n))
    }
}

impl From<i32> for Binding {
    fn from(n: i32) -> Self {
        Binding::Value(Value::from(n))
    }
}

impl From<&str> for Binding {
    fn from(s: &str) -> Self {
        Binding::Value(Value::from(s))
    }
}

impl From<String> for Binding {
    fn from(s: String) -> Self {
        Binding::Value(Value::String(s))
    }
}

impl From<Vec<Value>> for Binding {
    fn from(items: Vec<Value>) -> Self {
        Binding::Value(Value::Array(items))
    }
}

impl From<Bindings> for Binding {
    fn from(scope: Bindings) -> Self {
        Binding::Scope(scope)
    }
}

impl From<NativeFunction> for Binding {
    fn from(f: NativeFunction) -> Self {
        Binding::Function(f)
    }
}

impl Serialize for Binding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Binding::Value(v) => v.serialize(serializer),
            Binding::Scope(scope) => scope.serialize(serializer),
            Binding::Function(f) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$fn", &f.id())?;
                map.end()
            }
        }
    }
}

/// A scope of named bindings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    entries: AHashMap<String, Binding>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, binding: impl Into<Binding>) -> Self {
        self.set(name, binding);
        self
    }

    /// Builder-style insert of a function
    pub fn with_function<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> FormulaResult<Value> + Send + Sync + 'static,
    {
        self.with(name, Binding::function(f))
    }

    /// Bind a name, returning the previous binding
    pub fn set(&mut self, name: impl Into<String>, binding: impl Into<Binding>) -> Option<Binding> {
        self.entries.insert(name.into(), binding.into())
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.entries.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Binding> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Walk a dotted path through nested scopes
    ///
    /// Returns `None` as soon as a segment is missing or a non-scope binding is
    /// found before the last segment.
    pub fn resolve<S: AsRef<str>>(&self, path: &[S]) -> Option<&Binding> {
        let (last, parents) = path.split_last()?;
        let mut scope = self;
        for segment in parents {
            match scope.get(segment.as_ref())? {
                Binding::Scope(inner) => scope = inner,
                _ => return None,
            }
        }
        scope.get(last.as_ref())
    }

    /// Build a scope from a JSON object
    ///
    /// Booleans become `1`/`0`, objects become nested scopes, `null` is rejected.
    pub fn from_json(json: &serde_json::Value) -> FormulaResult<Self> {
        match json {
            serde_json::Value::Object(map) => {
                let mut bindings = Bindings::new();
                for (name, value) in map {
                    let binding = match value {
                        serde_json::Value::Object(_) => Binding::Scope(Bindings::from_json(value)?),
                        other => Binding::Value(json_to_value(name, other)?),
                    };
                    bindings.set(name.clone(), binding);
                }
                Ok(bindings)
            }
            other => Err(FormulaError::InvalidBinding {
                name: String::new(),
                reason: format!("expected a JSON object, got {}", other),
            }),
        }
    }

    /// Deterministic serialization used as a memoization key
    ///
    /// Keys are sorted at every level, so insertion order does not matter.
    pub fn cache_key(&self) -> FormulaResult<String> {
        serde_json::to_string(self).map_err(|e| FormulaError::InvalidBinding {
            name: String::new(),
            reason: e.to_string(),
        })
    }
}

fn json_to_value(name: &str, json: &serde_json::Value) -> FormulaResult<Value> {
    match json {
        serde_json::Value::Number(n) => n.as_f64().map(Value::Number).ok_or_else(|| {
            FormulaError::InvalidBinding {
                name: name.to_string(),
                reason: format!("number {} is not representable", n),
            }
        }),
        serde_json::Value::String(s) => Ok(Value::String(s.clone())),
        serde_json::Value::Bool(b) => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| json_to_value(name, item))
            .collect::<FormulaResult<Vec<_>>>()
            .map(Value::Array),
        serde_json::Value::Null => Err(FormulaError::InvalidBinding {
            name: name.to_string(),
            reason: "null is not a value".to_string(),
        }),
        serde_json::Value::Object(_) => Err(FormulaError::InvalidBinding {
            name: name.to_string(),
            reason: "objects are only allowed as scopes, not inside arrays".to_string(),
        }),
    }
}

impl Serialize for Bindings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let sorted: BTreeMap<&str, &Binding> = self.iter().collect();
        serializer.collect_map(sorted)
    }
}

impl<K: Into<String>, B: Into<Binding>> FromIterator<(K, B)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, B)>>(iter: I) -> Self {
        let mut bindings = Bindings::new();
        for (name, binding) in iter {
            bindings.set(name, binding);
        }
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_truthiness() {
        assert!(Value::Number(2.0).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(Value::from("a").is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(-4.0), "-4");
        assert_eq!(format_number(0.3), "0.3");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn test_resolve_nested_path() {
        let bindings = Bindings::new()
            .with("x", 1.0)
            .with("lib", Bindings::new().with("scale", 2.5));

        assert_eq!(
            bindings.resolve(&["lib", "scale"]),
            Some(&Binding::Value(Value::Number(2.5)))
        );
        assert_eq!(bindings.resolve(&["lib", "missing"]), None);
        // `x` is a value, not a scope
        assert_eq!(bindings.resolve(&["x", "y"]), None);
        assert_eq!(bindings.resolve::<&str>(&[]), None);
    }

    #[test]
    fn test_cache_key_ignores_insertion_order() {
        let a = Bindings::new().with("x", 1.0).with("y", 2.0);
        let b = Bindings::new().with("y", 2.0).with("x", 1.0);
        assert_eq!(a.cache_key().unwrap(), b.cache_key().unwrap());
        assert_eq!(a.cache_key().unwrap(), r#"{"x":1.0,"y":2.0}"#);

        let c = Bindings::new().with("x", 1.0).with("y", "2");
        assert_ne!(a.cache_key().unwrap(), c.cache_key().unwrap());
    }

    #[test]
    fn test_cache_key_distinguishes_functions() {
        let f = NativeFunction::new(|args| Ok(args[0].clone()));
        let g = NativeFunction::new(|args| Ok(args[0].clone()));
        let a = Bindings::new().with("f", f.clone());
        let b = Bindings::new().with("f", f);
        let c = Bindings::new().with("f", g);
        assert_eq!(a.cache_key().unwrap(), b.cache_key().unwrap());
        assert_ne!(a.cache_key().unwrap(), c.cache_key().unwrap());
    }

    #[test]
    fn test_cache_key_keeps_non_finite_numbers_apart() {
        let key = |n: f64| Bindings::new().with("x", n).cache_key().unwrap();
        let (inf, neg_inf, nan) = (key(f64::INFINITY), key(f64::NEG_INFINITY), key(f64::NAN));

        assert_eq!(inf, r#"{"x":{"$num":"Infinity"}}"#);
        assert_eq!(neg_inf, r#"{"x":{"$num":"-Infinity"}}"#);
        assert_eq!(nan, r#"{"x":{"$num":"NaN"}}"#);
        assert_ne!(inf, neg_inf);
        assert_ne!(inf, nan);
        assert_ne!(neg_inf, nan);

        // Inside arrays too
        let array = |n: f64| {
            Bindings::new()
                .with("xs", vec![Value::Number(1.0), Value::Number(n)])
                .cache_key()
                .unwrap()
        };
        assert_ne!(array(f64::INFINITY), array(f64::NEG_INFINITY));
    }

    #[test]
    fn test_function_ids_are_never_reused() {
        let mut keys = Vec::new();
        for _ in 0..20 {
            // Each closure is dropped before the next one is allocated
            let key = Bindings::new()
                .with("f", NativeFunction::new(|args| Ok(args[0].clone())))
                .cache_key()
                .unwrap();
            keys.push(key);
        }
        let unique: std::collections::BTreeSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({
            "x": 3,
            "name": "foo",
            "flag": true,
            "list": [1, 2],
            "lib": { "k": 0.5 }
        });
        let bindings = Bindings::from_json(&json).unwrap();
        assert_eq!(bindings.get("x"), Some(&Binding::Value(Value::Number(3.0))));
        assert_eq!(bindings.get("flag"), Some(&Binding::Value(Value::Number(1.0))));
        assert_eq!(
            bindings.get("list"),
            Some(&Binding::Value(Value::Array(vec![
                Value::Number(1.0),
                Value::Number(2.0)
            ])))
        );
        assert_eq!(
            bindings.resolve(&["lib", "k"]),
            Some(&Binding::Value(Value::Number(0.5)))
        );

        assert!(Bindings::from_json(&serde_json::json!({ "x": null })).is_err());
        assert!(Bindings::from_json(&serde_json::json!([1, 2])).is_err());
    }
}
