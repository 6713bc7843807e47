//! Runtime values of the reference interpreter and their JavaScript
//! conversions.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ir::FunctionDef;

/// Nesting depth past which a value is treated as cyclic.
const MAX_DEPTH: usize = 64;

#[derive(Clone, Debug)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    /// Insertion-ordered properties.
    Object(Rc<RefCell<Vec<(String, Value)>>>),
    Array(Rc<RefCell<Vec<Value>>>),
    Function(Closure),
    Builtin(Builtin),
    Request(Rc<RequestData>),
    /// The `env` argument of a handler.
    Env,
    /// A binding reached through `env`, e.g. `env.KV`.
    Binding(String),
    Response {
        status: u16,
        body: String,
    },
    /// Result of a capability call; identified by call site and sequence.
    Opaque(String),
}

/// Slot in the interpreter's scope arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScopeId(pub(crate) u32);

impl ScopeId {
    pub const GLOBAL: ScopeId = ScopeId(0);

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A function value together with the scope it was defined in.
#[derive(Clone, Debug)]
pub struct Closure {
    pub def: Rc<FunctionDef>,
    pub env: ScopeId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Json,
    Console,
    Response,
}

#[derive(Clone, Debug)]
pub struct RequestData {
    pub method: String,
    pub url: String,
    pub body: String,
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn object(fields: Vec<(String, Value)>) -> Self {
        Value::Object(Rc::new(RefCell::new(fields)))
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

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) => "function",
            _ => "object",
        }
    }

    fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) | Value::Str(_)
        )
    }

    /// JavaScript `ToString`.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.clone(),
            Value::Array(items) => items
                .borrow()
                .iter()
                .map(|v| match v {
                    Value::Undefined | Value::Null => String::new(),
                    other => other.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Function(f) => format!("function {}() {{ [code] }}", f.def.name),
            Value::Request(_) => "[object Request]".to_string(),
            Value::Response { .. } => "[object Response]".to_string(),
            _ => "[object Object]".to_string(),
        }
    }

    /// JavaScript `ToNumber`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => *b as u8 as f64,
            Value::Number(n) => *n,
            Value::Str(s) => parse_number(s),
            Value::Array(_) => parse_number(&self.to_js_string()),
            _ => f64::NAN,
        }
    }

    /// `===`
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(&a.def, &b.def) && a.env == b.env,
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Request(a), Value::Request(b)) => Rc::ptr_eq(a, b),
            (Value::Env, Value::Env) => true,
            (Value::Binding(a), Value::Binding(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a == b,
            _ => false,
        }
    }

    /// `==`
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(_), Value::Str(_)) | (Value::Str(_), Value::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (Value::Bool(_), _) => Value::Number(self.to_number()).loose_eq(other),
            (_, Value::Bool(_)) => self.loose_eq(&Value::Number(other.to_number())),
            (a, b) if a.is_primitive() != b.is_primitive() => {
                let (prim, obj) = if a.is_primitive() { (a, b) } else { (b, a) };
                prim.loose_eq(&Value::Str(obj.to_js_string()))
            }
            _ => self.strict_eq(other),
        }
    }

    /// `JSON.stringify`; `Ok(None)` where the result is `undefined`.
    pub fn to_json(&self) -> Result<Option<String>, String> {
        self.to_json_at(0)
    }

    fn to_json_at(&self, depth: usize) -> Result<Option<String>, String> {
        if depth > MAX_DEPTH {
            return Err("converting circular structure to JSON".to_string());
        }
        Ok(Some(match self {
            Value::Undefined | Value::Function(_) | Value::Builtin(_) => return Ok(None),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) if n.is_finite() => format_number(*n),
            Value::Number(_) => "null".to_string(),
            Value::Str(s) => quote_json(s),
            Value::Object(fields) => {
                let mut parts = Vec::new();
                for (k, v) in fields.borrow().iter() {
                    if let Some(text) = v.to_json_at(depth + 1)? {
                        parts.push(format!("{}:{}", quote_json(k), text));
                    }
                }
                format!("{{{}}}", parts.join(","))
            }
            Value::Array(items) => {
                let mut parts = Vec::new();
                for v in items.borrow().iter() {
                    parts.push(v.to_json_at(depth + 1)?.unwrap_or_else(|| "null".to_string()));
                }
                format!("[{}]", parts.join(","))
            }
            _ => "{}".to_string(),
        }))
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(Rc::new(RefCell::new(items.iter().map(Value::from_json).collect())))
            }
            serde_json::Value::Object(map) => Value::object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Stable textual form used when comparing observations.
    pub fn render(&self) -> String {
        self.render_at(0)
    }

    fn render_at(&self, depth: usize) -> String {
        if depth > MAX_DEPTH {
            return "<deep>".to_string();
        }
        match self {
            Value::Str(s) => quote_json(s),
            Value::Object(fields) => {
                let parts: Vec<String> = fields
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.render_at(depth + 1)))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Array(items) => {
                let parts: Vec<String> = items.borrow().iter().map(|v| v.render_at(depth + 1)).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Function(f) => format!("function {}", f.def.name),
            Value::Builtin(b) => format!("builtin {:?}", b),
            Value::Request(_) => "request".to_string(),
            Value::Env => "env".to_string(),
            Value::Binding(path) => format!("env.{}", path),
            Value::Response { status, body } => format!("Response({}, {})", status, quote_json(body)),
            Value::Opaque(id) => id.clone(),
            other => other.to_js_string(),
        }
    }
}

/// JavaScript `Number.prototype.toString` for the values that show up in
/// handlers.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else if n.abs() < 1e-6 || n.abs() >= 1e21 {
        format!("{:e}", n)
    } else {
        format!("{}", n)
    }
}

/// A string as a JSON string literal.
pub fn quote_json(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

fn parse_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map_or(f64::NAN, |v| v as f64);
    }
    // Rust accepts "inf" and "nan" spellings that JavaScript does not.
    if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    t.parse().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_print_like_javascript() {
        assert_eq!(format_number(200.0), "200");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn json_keeps_insertion_order_and_drops_undefined() {
        let v = Value::object(vec![
            ("ok".into(), Value::Bool(true)),
            ("skip".into(), Value::Undefined),
            ("url".into(), Value::str("http://x")),
        ]);
        assert_eq!(v.to_json().unwrap().unwrap(), r#"{"ok":true,"url":"http://x"}"#);
        assert_eq!(Value::Undefined.to_json().unwrap(), None);
    }

    #[test]
    fn parsed_bodies_preserve_key_order() {
        let json: serde_json::Value = serde_json::from_str(r#"{"z":1,"a":2}"#).unwrap();
        let v = Value::from_json(&json);
        assert_eq!(v.to_json().unwrap().unwrap(), r#"{"z":1,"a":2}"#);
    }

    #[test]
    fn loose_and_strict_equality() {
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(!Value::Null.strict_eq(&Value::Undefined));
        assert!(Value::str("1").loose_eq(&Value::Number(1.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Number(1.0)));
        assert!(!Value::Number(f64::NAN).strict_eq(&Value::Number(f64::NAN)));
    }

    #[test]
    fn to_number_follows_javascript() {
        assert_eq!(Value::str("").to_number(), 0.0);
        assert_eq!(Value::str(" 42 ").to_number(), 42.0);
        assert!(Value::str("inf").to_number().is_nan());
        assert_eq!(Value::str("0x10").to_number(), 16.0);
        assert!(Value::Undefined.to_number().is_nan());
    }
}
