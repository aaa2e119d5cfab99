//! Runtime values, objects and lexical scopes

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use super::JsError;
use super::ast::{ClassDef, FunctionDef};

pub type ArrayRef = Rc<RefCell<Items>>;
pub type ObjectRef = Rc<RefCell<Object>>;
pub type Env = Rc<Scope>;

/// Nesting depth past which `console.log` prints `[Object]` / `[Array]`
const INSPECT_DEPTH: usize = 2;

/// Deepest array/object nesting that JSON conversion and `join` will walk
pub const MAX_NESTING: usize = 1000;

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(Rc<Function>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

/// Array storage; dropping it frees nested children without recursing
#[derive(Clone, Default)]
pub struct Items(pub Vec<Value>);

impl From<Vec<Value>> for Items {
    fn from(items: Vec<Value>) -> Self {
        Self(items)
    }
}

impl Deref for Items {
    type Target = Vec<Value>;

    fn deref(&self) -> &Vec<Value> {
        &self.0
    }
}

impl DerefMut for Items {
    fn deref_mut(&mut self) -> &mut Vec<Value> {
        &mut self.0
    }
}

impl Drop for Items {
    fn drop(&mut self) {
        if !self.0.is_empty() {
            Teardown::from_values(std::mem::take(&mut self.0)).run();
        }
    }
}

/// Worklist that frees a value graph one container at a time
///
/// Dropping a million nested arrays through `Rc`'s own `Drop` would recurse a
/// million frames. Containers whose last strong reference is released here
/// have their children moved onto the worklist instead.
#[derive(Default)]
struct Teardown {
    values: Vec<Value>,
    scopes: Vec<Env>,
}

impl Teardown {
    fn from_values(values: Vec<Value>) -> Self {
        Self {
            values,
            scopes: Vec::new(),
        }
    }

    fn take_object(&mut self, object: &mut Object) {
        let entries = std::mem::take(&mut object.entries);
        let hidden = std::mem::take(&mut object.hidden);
        self.values
            .extend(entries.into_iter().chain(hidden).map(|(_, value)| value));
    }

    fn take_scope(&mut self, scope: &mut Scope) {
        let vars = std::mem::take(scope.vars.get_mut());
        self.values
            .extend(vars.into_values().map(|binding| binding.value));
        self.scopes.extend(scope.parent.take());
    }

    fn run(mut self) {
        loop {
            if let Some(value) = self.values.pop() {
                match value {
                    Value::Array(array) => {
                        if let Some(cell) = Rc::into_inner(array) {
                            let mut items = cell.into_inner();
                            self.values.append(&mut items.0);
                        }
                    }
                    Value::Object(object) => {
                        if let Some(cell) = Rc::into_inner(object) {
                            self.take_object(&mut cell.into_inner());
                        }
                    }
                    Value::Function(function) => match Rc::into_inner(function) {
                        Some(Function::Closure { env, .. } | Function::Class { env, .. }) => {
                            self.scopes.push(env);
                        }
                        Some(Function::Method { receiver, .. }) => self.values.push(receiver),
                        Some(Function::Native(_)) | None => {}
                    },
                    _ => {}
                }
            } else if let Some(scope) = self.scopes.pop() {
                if let Some(mut scope) = Rc::into_inner(scope) {
                    self.take_scope(&mut scope);
                }
            } else {
                break;
            }
        }
    }
}

#[derive(Default)]
pub struct Object {
    pub entries: Vec<(String, Value)>,
    /// Non-enumerable members: class methods, error name and message
    pub hidden: Vec<(String, Value)>,
    pub class_name: Option<String>,
    pub is_error: bool,
}

impl Drop for Object {
    fn drop(&mut self) {
        if self.entries.is_empty() && self.hidden.is_empty() {
            return;
        }
        let mut teardown = Teardown::default();
        teardown.take_object(self);
        teardown.run();
    }
}

impl Object {
    pub fn with_entries(entries: Vec<(String, Value)>) -> Self {
        Self {
            entries,
            hidden: Vec::new(),
            class_name: None,
            is_error: false,
        }
    }

    /// Empty instance of a class or constructor function
    pub fn instance(class_name: Option<String>) -> Self {
        Self {
            entries: Vec::new(),
            hidden: Vec::new(),
            class_name,
            is_error: false,
        }
    }

    pub fn error(name: &str, message: &str) -> Self {
        Self {
            entries: Vec::new(),
            hidden: vec![
                ("name".to_string(), Value::from(name)),
                ("message".to_string(), Value::from(message)),
            ],
            class_name: Some(name.to_string()),
            is_error: true,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .chain(self.hidden.iter())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        if let Some(i) = self.entries.iter().position(|(k, _)| k == key) {
            self.entries[i].1 = value;
        } else if let Some(i) = self.hidden.iter().position(|(k, _)| k == key) {
            self.hidden[i].1 = value;
        } else {
            self.entries.push((key.to_string(), value));
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    fn error_text(&self) -> String {
        let field = |key: &str| self.get(key).map(Value::to_js_string).unwrap_or_default();
        let name = field("name");
        let message = field("message");
        if message.is_empty() {
            name
        } else {
            format!("{name}: {message}")
        }
    }
}

pub enum Function {
    Closure { def: Rc<FunctionDef>, env: Env },
    Class { def: Rc<ClassDef>, env: Env },
    /// Builtin addressed by its dotted path, e.g. `Math.floor`
    Native(&'static str),
    /// Builtin method bound to the value it was read from, e.g. `[1, 2].push`
    Method { receiver: Value, name: String },
}

impl Function {
    pub fn name(&self) -> String {
        match self {
            Function::Closure { def, .. } => def.name.clone().unwrap_or_default(),
            Function::Class { def, .. } => def.name.clone(),
            Function::Native(path) => path.rsplit('.').next().unwrap_or(path).to_string(),
            Function::Method { name, .. } => name.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Binding {
    pub value: Value,
    pub mutable: bool,
}

pub struct Scope {
    vars: RefCell<HashMap<String, Binding>>,
    parent: Option<Env>,
}

impl Drop for Scope {
    fn drop(&mut self) {
        let mut teardown = Teardown::default();
        teardown.take_scope(self);
        teardown.run();
    }
}

impl Scope {
    pub fn new(parent: Option<Env>) -> Env {
        Rc::new(Self {
            vars: RefCell::new(HashMap::new()),
            parent,
        })
    }

    /// Copies this scope's own bindings into a fresh scope under `parent`
    pub fn snapshot(&self, parent: &Env) -> Env {
        Rc::new(Self {
            vars: RefCell::new(self.vars.borrow().clone()),
            parent: Some(parent.clone()),
        })
    }

    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.vars
            .borrow_mut()
            .insert(name.to_string(), Binding { value, mutable });
    }

    fn with_binding<R>(&self, name: &str, f: impl FnOnce(&mut Binding) -> R) -> Option<R> {
        if let Some(binding) = self.vars.borrow_mut().get_mut(name) {
            return Some(f(binding));
        }
        let mut next = self.parent.clone();
        while let Some(scope) = next {
            if let Some(binding) = scope.vars.borrow_mut().get_mut(name) {
                return Some(f(binding));
            }
            next = scope.parent.clone();
        }
        None
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.with_binding(name, |binding| binding.value.clone())
    }

    /// Updates an existing binding; `Ok(false)` when no scope declares `name`
    pub fn assign(&self, name: &str, value: Value) -> Result<bool, JsError> {
        let outcome = self.with_binding(name, |binding| {
            if binding.mutable {
                binding.value = value;
                true
            } else {
                false
            }
        });
        match outcome {
            Some(true) => Ok(true),
            Some(false) => Err(JsError::Type("Assignment to constant variable.".to_string())),
            None => Ok(false),
        }
    }

    /// Drops every binding, breaking reference cycles through closures
    pub fn clear(&self) {
        let vars = std::mem::take(&mut *self.vars.borrow_mut());
        drop(vars);
    }
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(Items(items))))
    }

    pub fn object(object: Object) -> Self {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) => "function",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => parse_number(s),
            Value::Array(items) => {
                let mut current = items.clone();
                loop {
                    let next = match current.borrow().as_slice() {
                        [] => return 0.0,
                        [Value::Array(inner)] => inner.clone(),
                        [only] => return only.to_number(),
                        _ => return f64::NAN,
                    };
                    current = next;
                }
            }
            Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// `String(value)`
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            // Past `MAX_NESTING` this is empty; `to_text` reports the error
            Value::Array(items) => join_array(items, &mut Vec::new()).unwrap_or_default(),
            Value::Object(object) => {
                let object = object.borrow();
                if object.is_error {
                    object.error_text()
                } else {
                    "[object Object]".to_string()
                }
            }
            Value::Function(f) => match &**f {
                Function::Class { def, .. } => format!("class {} {{ }}", def.name),
                other => format!("function {}() {{ [native code] }}", other.name()),
            },
        }
    }

    /// `String(value)`, raising `RangeError` for arrays nested too deeply to join
    pub fn to_text(&self) -> Result<String, JsError> {
        match self {
            Value::Array(items) => join_array(items, &mut Vec::new()),
            other => Ok(other.to_js_string()),
        }
    }

    pub fn to_property_key(&self) -> String {
        self.to_js_string()
    }

    /// Primitive used by `+` and relational comparisons
    pub fn to_primitive(&self) -> Value {
        match self {
            Value::Array(_) | Value::Object(_) | Value::Function(_) => {
                Value::from(self.to_js_string())
            }
            other => other.clone(),
        }
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `SameValueZero`, as used by `includes`
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }

    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::Str(_))
            | (Value::Str(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            (Value::Array(_) | Value::Object(_), Value::Str(_) | Value::Number(_))
            | (Value::Str(_) | Value::Number(_), Value::Array(_) | Value::Object(_)) => {
                self.to_primitive().loose_equals(&other.to_primitive())
            }
            _ => self.strict_equals(other),
        }
    }

    /// Formats a value the way `console.log` prints it
    pub fn inspect(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            Value::Object(object) if object.borrow().is_error => object.borrow().error_text(),
            other => {
                let mut out = String::new();
                let mut seen = Vec::new();
                other.inspect_into(&mut out, 0, &mut seen);
                out
            }
        }
    }

    /// Text reported for an exception nobody caught
    pub fn uncaught(&self) -> String {
        match self {
            Value::Object(object) if object.borrow().is_error => object.borrow().error_text(),
            other => {
                let mut out = String::from("Uncaught ");
                let mut seen = Vec::new();
                other.inspect_into(&mut out, 0, &mut seen);
                out
            }
        }
    }

    fn inspect_into(&self, out: &mut String, depth: usize, seen: &mut Vec<*const ()>) {
        match self {
            Value::Str(s) => quote_into(out, s),
            Value::Function(f) => match &**f {
                Function::Class { def, .. } => {
                    out.push_str(&format!("[class {}]", def.name));
                }
                other => {
                    let name = other.name();
                    if name.is_empty() {
                        out.push_str("[Function (anonymous)]");
                    } else {
                        out.push_str(&format!("[Function: {name}]"));
                    }
                }
            },
            Value::Array(items) => {
                let ptr = Rc::as_ptr(items) as *const ();
                if seen.contains(&ptr) {
                    out.push_str("[Circular *1]");
                    return;
                }
                let items = items.borrow();
                if items.is_empty() {
                    out.push_str("[]");
                    return;
                }
                if depth > INSPECT_DEPTH {
                    out.push_str("[Array]");
                    return;
                }
                seen.push(ptr);
                out.push_str("[ ");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.inspect_into(out, depth + 1, seen);
                }
                out.push_str(" ]");
                seen.pop();
            }
            Value::Object(object) => {
                let ptr = Rc::as_ptr(object) as *const ();
                if seen.contains(&ptr) {
                    out.push_str("[Circular *1]");
                    return;
                }
                let object = object.borrow();
                if object.is_error {
                    out.push_str(&format!("[{}]", object.error_text()));
                    return;
                }
                if let Some(class_name) = &object.class_name {
                    out.push_str(class_name);
                    out.push(' ');
                }
                if object.entries.is_empty() {
                    out.push_str("{}");
                    return;
                }
                if depth > INSPECT_DEPTH {
                    out.push_str("[Object]");
                    return;
                }
                seen.push(ptr);
                out.push_str("{ ");
                for (i, (key, value)) in object.entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    if is_identifier(key) {
                        out.push_str(key);
                    } else {
                        quote_into(out, key);
                    }
                    out.push_str(": ");
                    value.inspect_into(out, depth + 1, seen);
                }
                out.push_str(" }");
                seen.pop();
            }
            other => out.push_str(&other.to_js_string()),
        }
    }

    /// Converts to JSON; `None` for values `JSON.stringify` omits
    pub fn to_json(&self, seen: &mut Vec<*const ()>) -> Result<Option<serde_json::Value>, JsError> {
        use serde_json::Value as Json;

        let json = match self {
            Value::Undefined | Value::Function(_) => return Ok(None),
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                    Json::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number)
                }
            }
            Value::Str(s) => Json::String(s.to_string()),
            Value::Array(items) => {
                let ptr = Rc::as_ptr(items) as *const ();
                if seen.contains(&ptr) {
                    return Err(circular_json());
                }
                if seen.len() >= MAX_NESTING {
                    return Err(too_deep());
                }
                seen.push(ptr);
                let mut array = Vec::new();
                for item in items.borrow().iter() {
                    array.push(item.to_json(seen)?.unwrap_or(Json::Null));
                }
                seen.pop();
                Json::Array(array)
            }
            Value::Object(object) => {
                let ptr = Rc::as_ptr(object) as *const ();
                if seen.contains(&ptr) {
                    return Err(circular_json());
                }
                if seen.len() >= MAX_NESTING {
                    return Err(too_deep());
                }
                seen.push(ptr);
                let mut map = serde_json::Map::new();
                for (key, value) in object.borrow().entries.iter() {
                    if let Some(json) = value.to_json(seen)? {
                        map.insert(key.clone(), json);
                    }
                }
                seen.pop();
                Json::Object(map)
            }
        };
        Ok(Some(json))
    }

    pub fn from_json(json: serde_json::Value) -> Value {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s),
            Json::Array(items) => Value::array(items.into_iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::object(Object::with_entries(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            )),
        }
    }
}

fn circular_json() -> JsError {
    JsError::Type("Converting circular structure to JSON".to_string())
}

pub(super) fn too_deep() -> JsError {
    JsError::Range("Maximum call stack size exceeded".to_string())
}

fn join_array(items: &ArrayRef, seen: &mut Vec<*const ()>) -> Result<String, JsError> {
    let ptr = Rc::as_ptr(items) as *const ();
    if seen.contains(&ptr) {
        return Ok(String::new());
    }
    if seen.len() >= MAX_NESTING {
        return Err(too_deep());
    }
    seen.push(ptr);
    let mut parts = Vec::new();
    for item in items.borrow().iter() {
        parts.push(match item {
            Value::Undefined | Value::Null => String::new(),
            Value::Array(inner) => join_array(inner, seen)?,
            other => other.to_js_string(),
        });
    }
    seen.pop();
    Ok(parts.join(","))
}

fn quote_into(out: &mut String, s: &str) {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    out.push(quote);
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// `Number.prototype.toString()` for radix 10
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let magnitude = n.abs();
    if magnitude >= 1e21 || magnitude < 1e-6 {
        let formatted = format!("{n:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => formatted,
        };
    }
    format!("{n}")
}

/// `Number(string)`
pub fn parse_number(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }
    match text {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0b", 2), ("0B", 2), ("0o", 8), ("0O", 8)] {
        if let Some(digits) = text.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix).map_or(f64::NAN, |n| n as f64);
        }
    }
    let numeric = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if numeric {
        text.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("  42 "), 42.0);
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number("0x10"), 16.0);
        assert!(parse_number("12px").is_nan());
        assert!(parse_number("inf").is_nan());
    }

    #[test]
    fn test_inspect_nested() {
        let inner = Value::object(Object::with_entries(vec![
            ("a".to_string(), Value::Number(1.0)),
            ("my-key".to_string(), Value::from("x")),
        ]));
        let value = Value::array(vec![Value::Number(1.0), Value::from("two"), inner]);
        assert_eq!(value.inspect(), "[ 1, 'two', { a: 1, 'my-key': 'x' } ]");
        assert_eq!(value.to_js_string(), "1,two,[object Object]");
    }

    #[test]
    fn test_loose_and_strict_equality() {
        assert!(Value::from("1").loose_equals(&Value::Number(1.0)));
        assert!(!Value::from("1").strict_equals(&Value::Number(1.0)));
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.loose_equals(&Value::Number(0.0)));
        assert!(Value::Number(f64::NAN).same_value_zero(&Value::Number(f64::NAN)));
    }

    #[test]
    fn test_const_assignment_fails() {
        let scope = Scope::new(None);
        scope.declare("x", Value::Number(1.0), false);
        assert!(matches!(
            scope.assign("x", Value::Number(2.0)),
            Err(JsError::Type(_))
        ));
        assert!(matches!(scope.assign("missing", Value::Null), Ok(false)));
    }

    #[test]
    fn test_error_objects_print_name_and_message() {
        let error = Value::object(Object::error("TypeError", "bad"));
        assert_eq!(error.inspect(), "TypeError: bad");
        assert_eq!(error.uncaught(), "TypeError: bad");
        assert_eq!(Value::from("oops").uncaught(), "Uncaught 'oops'");
    }
}
