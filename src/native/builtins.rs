//! Builtin globals and methods of primitive values
//!
//! Natives are addressed by dotted path (`Math.floor`); methods read off a
//! value come back as `Function::Method` and are dispatched here by name.

use std::cmp::Ordering;
use std::rc::Rc;

use super::JsError;
use super::console::Channel;
use super::interp::{Interpreter, MAX_ARRAY_LEN, MAX_STRING_LEN, own_keys, to_int32};
use super::value::{Function, Items, MAX_NESTING, Object, Value, format_number, too_deep};

/// Names bound in the global scope at startup
pub(super) const GLOBALS: &[&str] = &[
    "console",
    "Math",
    "JSON",
    "Object",
    "Array",
    "Number",
    "String",
    "Boolean",
    "Error",
    "TypeError",
    "RangeError",
    "SyntaxError",
    "ReferenceError",
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    "prompt",
    "setTimeout",
    "setInterval",
    "clearTimeout",
    "clearInterval",
];

/// Callable members of the global namespaces
const NAMESPACED: &[&str] = &[
    "console.log",
    "console.info",
    "console.warn",
    "console.error",
    "console.debug",
    "Math.abs",
    "Math.floor",
    "Math.ceil",
    "Math.round",
    "Math.trunc",
    "Math.sign",
    "Math.sqrt",
    "Math.cbrt",
    "Math.pow",
    "Math.exp",
    "Math.log",
    "Math.log2",
    "Math.log10",
    "Math.sin",
    "Math.cos",
    "Math.tan",
    "Math.atan",
    "Math.atan2",
    "Math.hypot",
    "Math.min",
    "Math.max",
    "Math.random",
    "JSON.stringify",
    "JSON.parse",
    "Object.keys",
    "Object.values",
    "Object.entries",
    "Object.assign",
    "Object.fromEntries",
    "Array.isArray",
    "Array.from",
    "Array.of",
    "Number.isInteger",
    "Number.isSafeInteger",
    "Number.isFinite",
    "Number.isNaN",
    "Number.parseInt",
    "Number.parseFloat",
    "String.fromCharCode",
];

pub(super) const STRING_METHODS: &[&str] = &[
    "at",
    "charAt",
    "charCodeAt",
    "concat",
    "endsWith",
    "includes",
    "indexOf",
    "lastIndexOf",
    "padEnd",
    "padStart",
    "repeat",
    "replace",
    "replaceAll",
    "slice",
    "split",
    "startsWith",
    "substr",
    "substring",
    "toLowerCase",
    "toString",
    "toUpperCase",
    "trim",
    "trimEnd",
    "trimStart",
    "valueOf",
];

pub(super) const ARRAY_METHODS: &[&str] = &[
    "at",
    "concat",
    "every",
    "fill",
    "filter",
    "find",
    "findIndex",
    "findLast",
    "findLastIndex",
    "flat",
    "flatMap",
    "forEach",
    "includes",
    "indexOf",
    "join",
    "lastIndexOf",
    "map",
    "pop",
    "push",
    "reduce",
    "reduceRight",
    "reverse",
    "shift",
    "slice",
    "some",
    "sort",
    "splice",
    "toString",
    "unshift",
];

pub(super) const NUMBER_METHODS: &[&str] = &["toFixed", "toLocaleString", "toString", "valueOf"];

pub(super) const OBJECT_METHODS: &[&str] = &["hasOwnProperty", "toString"];

/// Resolves `Math.PI`, `console.log` and the like
pub(super) fn native_member(path: &str, key: &str) -> Option<Value> {
    let constant = match (path, key) {
        ("Math", "PI") => Some(std::f64::consts::PI),
        ("Math", "E") => Some(std::f64::consts::E),
        ("Math", "LN2") => Some(std::f64::consts::LN_2),
        ("Math", "LN10") => Some(std::f64::consts::LN_10),
        ("Math", "SQRT2") => Some(std::f64::consts::SQRT_2),
        ("Number", "MAX_SAFE_INTEGER") => Some(9_007_199_254_740_991.0),
        ("Number", "MIN_SAFE_INTEGER") => Some(-9_007_199_254_740_991.0),
        ("Number", "EPSILON") => Some(f64::EPSILON),
        ("Number", "MAX_VALUE") => Some(f64::MAX),
        ("Number", "POSITIVE_INFINITY") => Some(f64::INFINITY),
        ("Number", "NEGATIVE_INFINITY") => Some(f64::NEG_INFINITY),
        ("Number", "NaN") => Some(f64::NAN),
        _ => None,
    };
    if let Some(n) = constant {
        return Some(Value::Number(n));
    }
    if key == "name" {
        return Some(Value::from(path.rsplit('.').next().unwrap_or(path)));
    }
    let full = format!("{path}.{key}");
    NAMESPACED
        .iter()
        .find(|candidate| **candidate == full)
        .map(|&found| Value::Function(Rc::new(Function::Native(found))))
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

/// Optional numeric argument, `None` when absent or `undefined`
fn opt_number(args: &[Value], index: usize) -> Option<f64> {
    match args.get(index) {
        None | Some(Value::Undefined) => None,
        Some(value) => Some(value.to_number()),
    }
}

/// Resolves a possibly negative relative index against `len`
fn relative(position: Option<f64>, len: usize, default: usize) -> usize {
    let Some(position) = position else {
        return default;
    };
    let len_f = len as f64;
    let position = if position.is_nan() { 0.0 } else { position.trunc() };
    if position < 0.0 {
        (len_f + position).max(0.0) as usize
    } else {
        position.min(len_f) as usize
    }
}

fn find_chars(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(haystack.len()));
    }
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| haystack[i..].starts_with(needle))
}

fn rfind_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&i| haystack[i..].starts_with(needle))
}

/// Renders `console.log` arguments, honouring printf-style specifiers in
/// a leading format string
fn format_console(args: &[Value]) -> String {
    let mut parts = Vec::new();
    let mut rest = args;

    if let Some(Value::Str(format)) = args.first() {
        if args.len() > 1 && format.contains('%') {
            let mut out = String::new();
            let mut remaining = args[1..].iter();
            let mut chars = format.chars().peekable();
            while let Some(c) = chars.next() {
                if c != '%' {
                    out.push(c);
                    continue;
                }
                let Some(&spec) = chars.peek() else {
                    out.push('%');
                    break;
                };
                if spec == '%' {
                    chars.next();
                    out.push('%');
                    continue;
                }
                if !matches!(spec, 's' | 'd' | 'i' | 'f' | 'o' | 'O' | 'j' | 'c') {
                    out.push('%');
                    continue;
                }
                let Some(value) = remaining.next() else {
                    out.push('%');
                    continue;
                };
                chars.next();
                match spec {
                    's' => match value {
                        Value::Array(_) | Value::Object(_) => out.push_str(&value.inspect()),
                        other => out.push_str(&other.to_js_string()),
                    },
                    'd' => out.push_str(&format_number(value.to_number())),
                    'i' => out.push_str(&format_number(value.to_number().trunc())),
                    'f' => out.push_str(&format_number(parse_float(&value.to_js_string()))),
                    'j' => {
                        let json = value
                            .to_json(&mut Vec::new())
                            .ok()
                            .flatten()
                            .map_or_else(|| "undefined".to_string(), |j| j.to_string());
                        out.push_str(&json);
                    }
                    'c' => {}
                    _ => out.push_str(&value.inspect()),
                }
            }
            parts.push(out);
            rest = remaining.as_slice();
        }
    }
    parts.extend(rest.iter().map(Value::inspect));
    parts.join(" ")
}

/// Global `parseFloat`: the longest numeric prefix, or `NaN`
fn parse_float(text: &str) -> f64 {
    let text = text.trim_start();
    for (word, value) in [
        ("Infinity", f64::INFINITY),
        ("+Infinity", f64::INFINITY),
        ("-Infinity", f64::NEG_INFINITY),
    ] {
        if text.starts_with(word) {
            return value;
        }
    }
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || &text[digits_start..end] == "." {
        return f64::NAN;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && matches!(bytes[exp], b'+' | b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            while exp < bytes.len() && bytes[exp].is_ascii_digit() {
                exp += 1;
            }
            end = exp;
        }
    }
    text[..end].parse().unwrap_or(f64::NAN)
}

/// Global `parseInt`
fn parse_int(text: &str, radix: Option<f64>) -> f64 {
    let mut text = text.trim_start();
    let negative = text.starts_with('-');
    if negative || text.starts_with('+') {
        text = &text[1..];
    }
    let mut radix = radix.map_or(0, to_int32);
    if radix == 0 || radix == 16 {
        if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            text = hex;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let mut value: f64 = 0.0;
    let mut any = false;
    for c in text.chars() {
        let Some(digit) = c.to_digit(radix as u32) else {
            break;
        };
        value = value * f64::from(radix) + f64::from(digit);
        any = true;
    }
    match (any, negative) {
        (false, _) => f64::NAN,
        (true, true) => -value,
        (true, false) => value,
    }
}

/// `Number.prototype.toString(radix)` for radix other than 10
fn format_radix(n: f64, radix: u32) -> String {
    if !n.is_finite() {
        return format_number(n);
    }
    let negative = n < 0.0;
    let n = n.abs();
    let mut int_part = n.trunc();
    let mut frac = n - int_part;

    let mut digits = Vec::new();
    if int_part == 0.0 {
        digits.push('0');
    }
    while int_part >= 1.0 {
        let digit = (int_part % f64::from(radix)) as u32;
        digits.push(char::from_digit(digit, radix).unwrap_or('0'));
        int_part = (int_part / f64::from(radix)).trunc();
    }
    digits.reverse();
    let mut out: String = digits.into_iter().collect();

    if frac > 0.0 {
        out.push('.');
        for _ in 0..52 {
            frac *= f64::from(radix);
            let digit = frac.trunc() as u32;
            out.push(char::from_digit(digit, radix).unwrap_or('0'));
            frac -= frac.trunc();
            if frac == 0.0 {
                break;
            }
        }
    }
    if negative {
        out.insert(0, '-');
    }
    out
}

/// `toLocaleString()` in the `en-US` shape: grouped, at most 3 decimals
fn format_locale(n: f64) -> String {
    if !n.is_finite() {
        return format_number(n);
    }
    let rounded = format!("{:.3}", n.abs());
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((&rounded, ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if !frac_part.is_empty() {
        grouped.push('.');
        grouped.push_str(frac_part);
    }
    if n < 0.0 && grouped.chars().any(|c| c.is_ascii_digit() && c != '0') {
        grouped.insert(0, '-');
    }
    grouped
}

fn to_fixed(n: f64, digits: usize) -> String {
    if !n.is_finite() || n.abs() >= 1e21 {
        return format_number(n);
    }
    let formatted = format!("{n:.digits$}");
    // `-0.00` prints as `0.00`
    if formatted.starts_with('-') && formatted[1..].chars().all(|c| c == '0' || c == '.') {
        formatted[1..].to_string()
    } else {
        formatted
    }
}

fn default_compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => Ordering::Equal,
        (Value::Undefined, _) => Ordering::Greater,
        (_, Value::Undefined) => Ordering::Less,
        (a, b) => a.to_js_string().cmp(&b.to_js_string()),
    }
}

impl Interpreter {
    pub(super) fn call_native(&mut self, path: &str, args: Vec<Value>) -> Result<Value, JsError> {
        let number = |i: usize| args.get(i).map_or(f64::NAN, Value::to_number);
        let math =
            |f: fn(f64) -> f64| -> Result<Value, JsError> { Ok(Value::Number(f(number(0)))) };

        match path {
            "console.log" | "console.debug" => self.log(Channel::Log, &args),
            "console.info" => self.log(Channel::Info, &args),
            "console.warn" => self.log(Channel::Warn, &args),
            "console.error" => self.log(Channel::Error, &args),
            "prompt" => Ok(match self.stdin.pop() {
                Some(line) => {
                    self.console.echo(&line);
                    self.alloc_string(line)?
                }
                None => Value::Null,
            }),
            "parseInt" | "Number.parseInt" => Ok(Value::Number(parse_int(
                &arg(&args, 0).to_js_string(),
                opt_number(&args, 1),
            ))),
            "parseFloat" | "Number.parseFloat" => Ok(Value::Number(parse_float(
                &arg(&args, 0).to_js_string(),
            ))),
            "isNaN" => Ok(Value::Bool(number(0).is_nan())),
            "isFinite" => Ok(Value::Bool(number(0).is_finite())),
            "Number" => Ok(Value::Number(args.first().map_or(0.0, Value::to_number))),
            "String" => match args.first() {
                Some(value) => Ok(Value::from(value.to_text()?)),
                None => Ok(Value::from("")),
            },
            "Boolean" => Ok(Value::Bool(arg(&args, 0).truthy())),
            "Object" | "Array" | "Error" | "TypeError" | "RangeError" | "SyntaxError"
            | "ReferenceError" => self.construct_native(path, args),
            "setTimeout" | "setInterval" => {
                let callback = arg(&args, 0);
                if !matches!(callback, Value::Function(_)) {
                    return Err(JsError::Type(format!(
                        "The \"callback\" argument must be of type function. Received {}",
                        callback.type_of()
                    )));
                }
                let delay = opt_number(&args, 1).unwrap_or(0.0);
                let extra = args.get(2..).map(<[Value]>::to_vec).unwrap_or_default();
                let id = self.schedule(callback, delay, extra, path == "setInterval");
                Ok(Value::Number(f64::from(id)))
            }
            "clearTimeout" | "clearInterval" => {
                if let Some(id) = opt_number(&args, 0) {
                    if id.is_finite() && id >= 0.0 {
                        self.cancel_timer(id as u32);
                    }
                }
                Ok(Value::Undefined)
            }

            "Math.abs" => math(f64::abs),
            "Math.floor" => math(f64::floor),
            "Math.ceil" => math(f64::ceil),
            "Math.round" => math(|x| (x + 0.5).floor()),
            "Math.trunc" => math(f64::trunc),
            "Math.sign" => math(|x| if x == 0.0 || x.is_nan() { x } else { x.signum() }),
            "Math.sqrt" => math(f64::sqrt),
            "Math.cbrt" => math(f64::cbrt),
            "Math.exp" => math(f64::exp),
            "Math.log" => math(f64::ln),
            "Math.log2" => math(f64::log2),
            "Math.log10" => math(f64::log10),
            "Math.sin" => math(f64::sin),
            "Math.cos" => math(f64::cos),
            "Math.tan" => math(f64::tan),
            "Math.atan" => math(f64::atan),
            "Math.atan2" => Ok(Value::Number(number(0).atan2(number(1)))),
            "Math.pow" => {
                let (base, exp) = (number(0), number(1));
                Ok(Value::Number(if exp.is_nan() { f64::NAN } else { base.powf(exp) }))
            }
            "Math.hypot" => Ok(Value::Number(
                args.iter()
                    .map(|v| v.to_number().powi(2))
                    .sum::<f64>()
                    .sqrt(),
            )),
            "Math.min" | "Math.max" => {
                let is_min = path == "Math.min";
                let mut result = if is_min { f64::INFINITY } else { f64::NEG_INFINITY };
                for value in &args {
                    let n = value.to_number();
                    if n.is_nan() {
                        return Ok(Value::Number(f64::NAN));
                    }
                    result = if is_min { result.min(n) } else { result.max(n) };
                }
                Ok(Value::Number(result))
            }
            "Math.random" => Ok(Value::Number(self.next_random())),

            "JSON.stringify" => self.json_stringify(&args),
            "JSON.parse" => {
                let text = arg(&args, 0).to_js_string();
                match serde_json::from_str::<serde_json::Value>(&text) {
                    Ok(json) => {
                        let value = Value::from_json(json);
                        self.adopt(&value);
                        Ok(value)
                    }
                    Err(e) => {
                        let message = format!("{e} in JSON");
                        Err(JsError::Thrown(self.error_value("SyntaxError", &message)))
                    }
                }
            }

            "Object.keys" => {
                let keys = own_keys(&arg(&args, 0)).into_iter().map(Value::from).collect();
                Ok(self.alloc_array(keys))
            }
            "Object.values" | "Object.entries" => {
                let object = arg(&args, 0);
                let mut items = Vec::new();
                for key in own_keys(&object) {
                    let value = self.get_member(&object, &key)?;
                    items.push(if path == "Object.values" {
                        value
                    } else {
                        self.alloc_array(vec![Value::from(key), value])
                    });
                }
                Ok(self.alloc_array(items))
            }
            "Object.assign" => {
                let target = arg(&args, 0);
                for source in args.iter().skip(1) {
                    for key in own_keys(source) {
                        let value = self.get_member(source, &key)?;
                        self.set_member(&target, &key, value)?;
                    }
                }
                Ok(target)
            }
            "Object.fromEntries" => {
                let mut object = Object::default();
                for entry in self.iterate(&arg(&args, 0))? {
                    let pair = self.iterate(&entry)?;
                    object.set(&arg(&pair, 0).to_property_key(), arg(&pair, 1));
                }
                Ok(self.alloc_object(object))
            }

            "Array.isArray" => Ok(Value::Bool(matches!(arg(&args, 0), Value::Array(_)))),
            "Array.of" => Ok(self.alloc_array(args)),
            "Array.from" => {
                let source = arg(&args, 0);
                let items = match &source {
                    Value::Object(object) => {
                        let length = object.borrow().get("length").map_or(0.0, Value::to_number);
                        if !(0.0..=MAX_ARRAY_LEN as f64).contains(&length) {
                            return Err(JsError::Range("Invalid array length".to_string()));
                        }
                        vec![Value::Undefined; length as usize]
                    }
                    other => self.iterate(other)?,
                };
                let items = match args.get(1) {
                    Some(map) if matches!(map, Value::Function(_)) => {
                        let mut mapped = Vec::with_capacity(items.len());
                        for (i, item) in items.into_iter().enumerate() {
                            let args = vec![item, Value::Number(i as f64)];
                            mapped.push(self.call_value(map, None, args)?);
                        }
                        mapped
                    }
                    _ => items,
                };
                Ok(self.alloc_array(items))
            }

            "Number.isInteger" | "Number.isSafeInteger" => Ok(Value::Bool(match arg(&args, 0) {
                Value::Number(n) => {
                    n.is_finite()
                        && n.fract() == 0.0
                        && (path == "Number.isInteger" || n.abs() <= 9_007_199_254_740_991.0)
                }
                _ => false,
            })),
            "Number.isFinite" => Ok(Value::Bool(
                matches!(arg(&args, 0), Value::Number(n) if n.is_finite()),
            )),
            "Number.isNaN" => Ok(Value::Bool(
                matches!(arg(&args, 0), Value::Number(n) if n.is_nan()),
            )),

            "String.fromCharCode" => {
                let text: String = args
                    .iter()
                    .filter_map(|v| char::from_u32(u32::from(to_int32(v.to_number()) as u16)))
                    .collect();
                self.alloc_string(text)
            }

            other => Err(JsError::Type(format!("{other} is not a function"))),
        }
    }

    pub(super) fn construct_native(
        &mut self,
        path: &str,
        args: Vec<Value>,
    ) -> Result<Value, JsError> {
        match path {
            "Error" | "TypeError" | "RangeError" | "SyntaxError" | "ReferenceError" => {
                let message = match args.first() {
                    None | Some(Value::Undefined) => String::new(),
                    Some(value) => value.to_js_string(),
                };
                Ok(self.error_value(path, &message))
            }
            "Array" => match args.as_slice() {
                [Value::Number(n)] => {
                    if n.fract() != 0.0 || *n < 0.0 || *n > MAX_ARRAY_LEN as f64 {
                        return Err(JsError::Range("Invalid array length".to_string()));
                    }
                    Ok(self.alloc_array(vec![Value::Undefined; *n as usize]))
                }
                _ => Ok(self.alloc_array(args)),
            },
            "Object" => match args.into_iter().next() {
                Some(value @ (Value::Object(_) | Value::Array(_) | Value::Function(_))) => {
                    Ok(value)
                }
                _ => Ok(self.alloc_object(Object::default())),
            },
            "Number" | "String" | "Boolean" => self.call_native(path, args),
            other => Err(JsError::Type(format!("{other} is not a constructor"))),
        }
    }

    pub(super) fn call_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, JsError> {
        match receiver {
            Value::Str(s) => self.string_method(s, name, &args),
            Value::Array(_) => self.array_method(receiver, name, args),
            Value::Number(n) => self.number_method(*n, name, &args),
            Value::Bool(b) => Ok(Value::from(b.to_string())),
            Value::Object(object) => match name {
                "hasOwnProperty" => {
                    let key = arg(&args, 0).to_property_key();
                    Ok(Value::Bool(object.borrow().has_own(&key)))
                }
                _ => Ok(Value::from(receiver.to_js_string())),
            },
            other => Err(JsError::Type(format!(
                "{}.{name} is not a function",
                other.type_of()
            ))),
        }
    }

    fn log(&mut self, channel: Channel, args: &[Value]) -> Result<Value, JsError> {
        let line = format_console(args);
        self.console.write(channel, &line);
        Ok(Value::Undefined)
    }

    fn next_random(&mut self) -> f64 {
        let mut x = self.rng_state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.rng_state = x;
        (x.wrapping_mul(0x2545_f491_4f6c_dd1d) >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Registers a value built outside the interpreter so it is freed with the run
    fn adopt(&mut self, value: &Value) {
        match value {
            Value::Array(items) => {
                let items = items.borrow().to_vec();
                self.track(value);
                for item in &items {
                    self.adopt(item);
                }
            }
            Value::Object(object) => {
                let values: Vec<Value> =
                    object.borrow().entries.iter().map(|(_, v)| v.clone()).collect();
                self.track(value);
                for item in &values {
                    self.adopt(item);
                }
            }
            _ => {}
        }
    }

    fn json_stringify(&mut self, args: &[Value]) -> Result<Value, JsError> {
        use serde::Serialize;
        use serde_json::ser::{PrettyFormatter, Serializer};

        let Some(json) = arg(args, 0).to_json(&mut Vec::new())? else {
            return Ok(Value::Undefined);
        };
        let indent = match args.get(2) {
            Some(Value::Number(n)) if *n >= 1.0 => " ".repeat((*n as usize).min(10)),
            Some(Value::Str(s)) => s.chars().take(10).collect(),
            _ => String::new(),
        };
        let text = if indent.is_empty() {
            json.to_string()
        } else {
            let mut buffer = Vec::new();
            let formatter = PrettyFormatter::with_indent(indent.as_bytes());
            let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
            json.serialize(&mut serializer)
                .map_err(|e| JsError::Type(e.to_string()))?;
            String::from_utf8(buffer).map_err(|e| JsError::Type(e.to_string()))?
        };
        self.alloc_string(text)
    }

    fn string_method(&mut self, s: &Rc<str>, name: &str, args: &[Value]) -> Result<Value, JsError> {
        let chars: Vec<char> = s.chars().collect();
        let len = chars.len();
        let text_arg = |i: usize| arg(args, i).to_js_string();
        let collect = |range: &[char]| Value::from(range.iter().collect::<String>());

        let value = match name {
            "toString" | "valueOf" => Value::Str(s.clone()),
            "toUpperCase" => Value::from(s.to_uppercase()),
            "toLowerCase" => Value::from(s.to_lowercase()),
            "trim" => Value::from(s.trim()),
            "trimStart" => Value::from(s.trim_start()),
            "trimEnd" => Value::from(s.trim_end()),
            "at" => {
                let i = opt_number(args, 0).unwrap_or(0.0).trunc();
                let i = if i < 0.0 { len as f64 + i } else { i };
                if i >= 0.0 && (i as usize) < len {
                    Value::from(chars[i as usize].to_string())
                } else {
                    Value::Undefined
                }
            }
            "charAt" => {
                let i = opt_number(args, 0).unwrap_or(0.0);
                chars
                    .get(i as usize)
                    .filter(|_| i >= 0.0)
                    .map_or(Value::from(""), |c| Value::from(c.to_string()))
            }
            "charCodeAt" => {
                let i = opt_number(args, 0).unwrap_or(0.0);
                chars
                    .get(i as usize)
                    .filter(|_| i >= 0.0)
                    .map_or(Value::Number(f64::NAN), |c| Value::Number(f64::from(u32::from(*c))))
            }
            "indexOf" => {
                let needle: Vec<char> = text_arg(0).chars().collect();
                let from = relative(opt_number(args, 1).map(|n| n.max(0.0)), len, 0);
                Value::Number(find_chars(&chars, &needle, from).map_or(-1.0, |i| i as f64))
            }
            "lastIndexOf" => {
                let needle: Vec<char> = text_arg(0).chars().collect();
                Value::Number(rfind_chars(&chars, &needle).map_or(-1.0, |i| i as f64))
            }
            "includes" => Value::Bool(s.contains(text_arg(0).as_str())),
            "startsWith" => Value::Bool(s.starts_with(text_arg(0).as_str())),
            "endsWith" => Value::Bool(s.ends_with(text_arg(0).as_str())),
            "slice" => {
                let start = relative(opt_number(args, 0), len, 0);
                let end = relative(opt_number(args, 1), len, len);
                if start < end {
                    collect(&chars[start..end])
                } else {
                    Value::from("")
                }
            }
            "substring" => {
                let clamp = |n: Option<f64>, default: usize| {
                    n.map_or(default, |n| {
                        if n.is_nan() { 0 } else { n.clamp(0.0, len as f64) as usize }
                    })
                };
                let a = clamp(opt_number(args, 0), 0);
                let b = clamp(opt_number(args, 1), len);
                collect(&chars[a.min(b)..a.max(b)])
            }
            "substr" => {
                let start = relative(opt_number(args, 0), len, 0);
                let count = opt_number(args, 1).map_or(len, |n| n.max(0.0) as usize);
                collect(&chars[start..(start.saturating_add(count)).min(len)])
            }
            "concat" => {
                let mut text = s.to_string();
                for value in args {
                    text.push_str(&value.to_js_string());
                }
                return self.alloc_string(text);
            }
            "repeat" => {
                let count = opt_number(args, 0).unwrap_or(0.0);
                if count < 0.0 || count.is_infinite() {
                    return Err(JsError::Range(format!(
                        "Invalid count value: {}",
                        format_number(count)
                    )));
                }
                let count = if count.is_nan() { 0 } else { count as usize };
                if s.len().saturating_mul(count) > MAX_STRING_LEN {
                    return Err(JsError::Range("Invalid string length".to_string()));
                }
                return self.alloc_string(s.repeat(count));
            }
            "padStart" | "padEnd" => {
                let target = opt_number(args, 0).unwrap_or(0.0);
                if target > MAX_STRING_LEN as f64 {
                    return Err(JsError::Range("Invalid string length".to_string()));
                }
                let target = if target.is_nan() { 0 } else { target.max(0.0) as usize };
                let fill: Vec<char> = match args.get(1) {
                    None | Some(Value::Undefined) => vec![' '],
                    Some(value) => value.to_js_string().chars().collect(),
                };
                if target <= len || fill.is_empty() {
                    Value::Str(s.clone())
                } else {
                    let padding: String = fill.iter().cycle().take(target - len).collect();
                    if name == "padStart" {
                        Value::from(padding + &**s)
                    } else {
                        Value::from(s.to_string() + &padding)
                    }
                }
            }
            "split" => {
                let parts: Vec<Value> = match args.first() {
                    None | Some(Value::Undefined) => vec![Value::Str(s.clone())],
                    Some(separator) => {
                        let separator = separator.to_js_string();
                        if separator.is_empty() {
                            chars.iter().map(|c| Value::from(c.to_string())).collect()
                        } else {
                            s.split(separator.as_str()).map(Value::from).collect()
                        }
                    }
                };
                let limit = opt_number(args, 1).map_or(parts.len(), |n| n.max(0.0) as usize);
                return Ok(self.alloc_array(parts.into_iter().take(limit).collect()));
            }
            "replace" | "replaceAll" => {
                let pattern = text_arg(0);
                let replacement = arg(args, 1);
                let mut out = String::new();
                let mut rest: &str = s;
                let mut offset = 0;
                while let Some(pos) = rest.find(pattern.as_str()) {
                    out.push_str(&rest[..pos]);
                    let replaced = match &replacement {
                        Value::Function(_) => {
                            let index = s[..offset + pos].chars().count();
                            self.call_value(
                                &replacement,
                                None,
                                vec![Value::from(pattern.as_str()), Value::Number(index as f64)],
                            )?
                            .to_js_string()
                        }
                        other => other.to_js_string().replace("$&", &pattern),
                    };
                    out.push_str(&replaced);
                    let step = pos + pattern.len();
                    offset += step;
                    rest = &rest[step..];
                    if name == "replace" {
                        break;
                    }
                    if pattern.is_empty() {
                        // an empty pattern matches between every character
                        let Some(c) = rest.chars().next() else {
                            break;
                        };
                        out.push(c);
                        offset += c.len_utf8();
                        rest = &rest[c.len_utf8()..];
                    }
                }
                out.push_str(rest);
                return self.alloc_string(out);
            }
            other => {
                return Err(JsError::Type(format!("string.{other} is not a function")));
            }
        };
        Ok(value)
    }

    fn number_method(&mut self, n: f64, name: &str, args: &[Value]) -> Result<Value, JsError> {
        let text = match name {
            "valueOf" => return Ok(Value::Number(n)),
            "toFixed" => {
                let digits = opt_number(args, 0).unwrap_or(0.0);
                if !(0.0..=100.0).contains(&digits) {
                    return Err(JsError::Range(
                        "toFixed() digits argument must be between 0 and 100".to_string(),
                    ));
                }
                to_fixed(n, digits as usize)
            }
            "toLocaleString" => format_locale(n),
            _ => match opt_number(args, 0) {
                None => format_number(n),
                Some(radix) if (2.0..=36.0).contains(&radix) => {
                    let radix = radix as u32;
                    if radix == 10 {
                        format_number(n)
                    } else {
                        format_radix(n, radix)
                    }
                }
                Some(_) => {
                    return Err(JsError::Range(
                        "toString() radix must be between 2 and 36".to_string(),
                    ));
                }
            },
        };
        Ok(Value::from(text))
    }

    fn array_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, JsError> {
        let Value::Array(array) = receiver else {
            return Err(JsError::Type(format!("{name} called on non-array")));
        };
        let snapshot = || array.borrow().to_vec();
        let len = array.borrow().len();

        match name {
            "push" => {
                let mut items = array.borrow_mut();
                if items.len() + args.len() > MAX_ARRAY_LEN {
                    return Err(JsError::Range("Invalid array length".to_string()));
                }
                items.extend(args);
                Ok(Value::Number(items.len() as f64))
            }
            "pop" => Ok(array.borrow_mut().pop().unwrap_or(Value::Undefined)),
            "shift" => {
                let mut items = array.borrow_mut();
                Ok(if items.is_empty() {
                    Value::Undefined
                } else {
                    items.remove(0)
                })
            }
            "unshift" => {
                let mut items = array.borrow_mut();
                if items.len() + args.len() > MAX_ARRAY_LEN {
                    return Err(JsError::Range("Invalid array length".to_string()));
                }
                items.splice(0..0, args);
                Ok(Value::Number(items.len() as f64))
            }
            "at" => {
                let i = opt_number(&args, 0).unwrap_or(0.0).trunc();
                let i = if i < 0.0 { len as f64 + i } else { i };
                Ok(if i >= 0.0 {
                    array.borrow().get(i as usize).cloned().unwrap_or(Value::Undefined)
                } else {
                    Value::Undefined
                })
            }
            "slice" => {
                let start = relative(opt_number(&args, 0), len, 0);
                let end = relative(opt_number(&args, 1), len, len);
                let items = if start < end {
                    array.borrow()[start..end].to_vec()
                } else {
                    Vec::new()
                };
                Ok(self.alloc_array(items))
            }
            "splice" => {
                let start = relative(opt_number(&args, 0), len, 0);
                let delete = match args.len() {
                    0 => 0,
                    1 => len - start,
                    _ => (arg(&args, 1).to_number().max(0.0) as usize).min(len - start),
                };
                let inserted = args.into_iter().skip(2);
                let removed: Vec<Value> = array
                    .borrow_mut()
                    .splice(start..start + delete, inserted)
                    .collect();
                Ok(self.alloc_array(removed))
            }
            "concat" => {
                let mut items = snapshot();
                for value in args {
                    match value {
                        Value::Array(other) => items.extend(other.borrow().iter().cloned()),
                        other => items.push(other),
                    }
                }
                Ok(self.alloc_array(items))
            }
            "join" | "toString" => {
                let separator = match args.first() {
                    Some(value) if name == "join" && !matches!(value, Value::Undefined) => {
                        value.to_js_string()
                    }
                    _ => ",".to_string(),
                };
                let mut parts = Vec::new();
                for item in snapshot() {
                    parts.push(match item {
                        Value::Undefined | Value::Null => String::new(),
                        other => other.to_text()?,
                    });
                }
                self.alloc_string(parts.join(&separator))
            }
            "reverse" => {
                array.borrow_mut().reverse();
                Ok(receiver.clone())
            }
            "indexOf" | "lastIndexOf" | "includes" => {
                let needle = arg(&args, 0);
                let items = array.borrow();
                let found = match name {
                    "indexOf" => items.iter().position(|item| item.strict_equals(&needle)),
                    "lastIndexOf" => items.iter().rposition(|item| item.strict_equals(&needle)),
                    _ => items.iter().position(|item| item.same_value_zero(&needle)),
                };
                Ok(if name == "includes" {
                    Value::Bool(found.is_some())
                } else {
                    Value::Number(found.map_or(-1.0, |i| i as f64))
                })
            }
            "fill" => {
                let value = arg(&args, 0);
                let start = relative(opt_number(&args, 1), len, 0);
                let end = relative(opt_number(&args, 2), len, len);
                let mut items = array.borrow_mut();
                for slot in items.iter_mut().take(end).skip(start) {
                    *slot = value.clone();
                }
                drop(items);
                Ok(receiver.clone())
            }
            "flat" => {
                let depth = opt_number(&args, 0).unwrap_or(1.0);
                let mut out = Vec::new();
                flatten_into(&snapshot(), depth, 0, &mut out)?;
                Ok(self.alloc_array(out))
            }
            "sort" => {
                let comparator = match args.first() {
                    None | Some(Value::Undefined) => None,
                    Some(f @ Value::Function(_)) => Some(f.clone()),
                    Some(_) => {
                        return Err(JsError::Type(
                            "The comparison function must be either a function or undefined"
                                .to_string(),
                        ));
                    }
                };
                let sorted = self.merge_sort(snapshot(), comparator.as_ref())?;
                *array.borrow_mut() = Items(sorted);
                Ok(receiver.clone())
            }
            "reduce" | "reduceRight" => {
                let callback = self.callback(&args, name)?;
                let mut items: Vec<(usize, Value)> = snapshot().into_iter().enumerate().collect();
                if name == "reduceRight" {
                    items.reverse();
                }
                let mut items = items.into_iter();
                let mut accumulator = match args.get(1) {
                    Some(initial) => initial.clone(),
                    None => match items.next() {
                        Some((_, first)) => first,
                        None => {
                            return Err(JsError::Type(
                                "Reduce of empty array with no initial value".to_string(),
                            ));
                        }
                    },
                };
                for (i, item) in items {
                    accumulator = self.call_value(
                        &callback,
                        None,
                        vec![accumulator, item, Value::Number(i as f64), receiver.clone()],
                    )?;
                }
                Ok(accumulator)
            }
            _ => self.iterate_with_callback(receiver, name, &args, snapshot()),
        }
    }

    /// The callback-driven methods: `map`, `filter`, `find`, `some` and friends
    fn iterate_with_callback(
        &mut self,
        receiver: &Value,
        name: &str,
        args: &[Value],
        items: Vec<Value>,
    ) -> Result<Value, JsError> {
        let callback = self.callback(args, name)?;
        let this = args.get(1).cloned();
        let mut indices: Vec<usize> = (0..items.len()).collect();
        if matches!(name, "findLast" | "findLastIndex") {
            indices.reverse();
        }

        let mut out = Vec::new();
        for i in indices {
            let item = items[i].clone();
            let result = self.call_value(
                &callback,
                this.clone(),
                vec![item.clone(), Value::Number(i as f64), receiver.clone()],
            )?;
            match name {
                "forEach" => {}
                "map" => out.push(result),
                "flatMap" => match result {
                    Value::Array(inner) => out.extend(inner.borrow().iter().cloned()),
                    other => out.push(other),
                },
                "filter" => {
                    if result.truthy() {
                        out.push(item);
                    }
                }
                "find" | "findLast" => {
                    if result.truthy() {
                        return Ok(item);
                    }
                }
                "findIndex" | "findLastIndex" => {
                    if result.truthy() {
                        return Ok(Value::Number(i as f64));
                    }
                }
                "some" => {
                    if result.truthy() {
                        return Ok(Value::Bool(true));
                    }
                }
                "every" => {
                    if !result.truthy() {
                        return Ok(Value::Bool(false));
                    }
                }
                other => return Err(JsError::Type(format!("array.{other} is not a function"))),
            }
        }

        Ok(match name {
            "forEach" => Value::Undefined,
            "find" | "findLast" => Value::Undefined,
            "findIndex" | "findLastIndex" => Value::Number(-1.0),
            "some" => Value::Bool(false),
            "every" => Value::Bool(true),
            _ => self.alloc_array(out),
        })
    }

    fn callback(&self, args: &[Value], name: &str) -> Result<Value, JsError> {
        match args.first() {
            Some(f @ Value::Function(_)) => Ok(f.clone()),
            Some(other) => Err(JsError::Type(format!(
                "{} is not a function",
                other.inspect()
            ))),
            None => Err(JsError::Type(format!(
                "undefined is not a function (calling {name})"
            ))),
        }
    }

    /// Stable merge sort whose comparator may fail or call back into script
    fn merge_sort(
        &mut self,
        items: Vec<Value>,
        comparator: Option<&Value>,
    ) -> Result<Vec<Value>, JsError> {
        if items.len() <= 1 {
            return Ok(items);
        }
        let mut left = items;
        let right = left.split_off(left.len() / 2);
        let left = self.merge_sort(left, comparator)?;
        let right = self.merge_sort(right, comparator)?;

        let mut merged = Vec::with_capacity(left.len() + right.len());
        let mut left = left.into_iter().peekable();
        let mut right = right.into_iter().peekable();
        while let (Some(a), Some(b)) = (left.peek(), right.peek()) {
            let order = match comparator {
                Some(f) => {
                    let n = self
                        .call_value(f, None, vec![a.clone(), b.clone()])?
                        .to_number();
                    if n > 0.0 { Ordering::Greater } else { Ordering::Less }
                }
                None => default_compare(a, b),
            };
            let next = if order == Ordering::Greater {
                right.next()
            } else {
                left.next()
            };
            merged.extend(next);
        }
        merged.extend(left);
        merged.extend(right);
        Ok(merged)
    }
}

fn flatten_into(
    items: &[Value],
    depth: f64,
    level: usize,
    out: &mut Vec<Value>,
) -> Result<(), JsError> {
    if level >= MAX_NESTING {
        return Err(too_deep());
    }
    for item in items {
        match item {
            Value::Array(inner) if depth >= 1.0 => {
                let inner = inner.borrow().to_vec();
                flatten_into(&inner, depth - 1.0, level + 1, out)?;
            }
            other => out.push(other.clone()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_and_float() {
        assert_eq!(parse_int("42px", None), 42.0);
        assert_eq!(parse_int("  -0x1f", None), -31.0);
        assert_eq!(parse_int("101", Some(2.0)), 5.0);
        assert!(parse_int("abc", None).is_nan());
        assert_eq!(parse_float("3.14abc"), 3.14);
        assert_eq!(parse_float("1e3x"), 1000.0);
        assert_eq!(parse_float("2e"), 2.0);
        assert!(parse_float(".").is_nan());
    }

    #[test]
    fn test_number_formatting_helpers() {
        assert_eq!(to_fixed(3.14159, 2), "3.14");
        assert_eq!(to_fixed(-0.001, 2), "0.00");
        assert_eq!(format_radix(255.0, 16), "ff");
        assert_eq!(format_radix(-5.0, 2), "-101");
        assert_eq!(format_radix(0.5, 2), "0.1");
        assert_eq!(format_locale(1234567.891), "1,234,567.891");
        assert_eq!(format_locale(-1000.0), "-1,000");
    }

    #[test]
    fn test_console_format_specifiers() {
        let args = [
            Value::from("%s is %d years, %i%%"),
            Value::from("Ann"),
            Value::Number(30.0),
            Value::Number(4.7),
            Value::from("extra"),
        ];
        assert_eq!(format_console(&args), "Ann is 30 years, 4% extra");
        assert_eq!(format_console(&[Value::from("50%")]), "50%");
        assert_eq!(
            format_console(&[Value::Number(1.0), Value::from("a")]),
            "1 a"
        );
    }

    #[test]
    fn test_native_member_lookup() {
        assert!(matches!(
            native_member("Math", "PI"),
            Some(Value::Number(n)) if n == std::f64::consts::PI
        ));
        assert!(matches!(native_member("console", "log"), Some(Value::Function(_))));
        assert!(native_member("Math", "nope").is_none());
    }
}
