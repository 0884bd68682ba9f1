//! The `Value` tagged union and the ECMA-262 §9 abstract conversions.
//!
//! Only the six user-visible kinds live here (undefined, null, boolean,
//! number, string, object). References and completions are internal VM
//! concepts and never escape to user code or into this type -- see
//! [`crate::bytecode::vm::VmValue`] and the design note this follows in
//! `SPEC_FULL.md` §3.

use std::fmt;

use crate::{
    exception::{ExcType, RunResult},
    heap::HeapId,
    intern::Atom,
    interp::Interpreter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Default,
    Number,
    String,
}

/// A runtime ECMAScript value.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(Atom),
    Object(HeapId),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Object(id) => write!(f, "Object({id:?})"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}
impl From<Atom> for Value {
    fn from(s: Atom) -> Self {
        Self::String(s)
    }
}
impl From<HeapId> for Value {
    fn from(id: HeapId) -> Self {
        Self::Object(id)
    }
}

impl Value {
    pub fn type_of(&self, interp: &Interpreter) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(id) => {
                if interp.heap.get(*id).is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    pub fn as_object(&self) -> Option<HeapId> {
        match self {
            Self::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// ToPrimitive(hint), ECMA-262 §9.1.
    pub fn to_primitive(&self, interp: &mut Interpreter, hint: Hint) -> RunResult<Self> {
        match self {
            Self::Object(id) => crate::object::default_value(interp, *id, hint),
            other => Ok(other.clone()),
        }
    }

    /// ToBoolean, ECMA-262 §9.2.
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Object(_) => true,
        }
    }

    /// ToNumber, ECMA-262 §9.3.
    pub fn to_number(&self, interp: &mut Interpreter) -> RunResult<f64> {
        Ok(match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Number(n) => *n,
            Self::String(s) => string_to_number(s.as_str()),
            Self::Object(_) => {
                let prim = self.to_primitive(interp, Hint::Number)?;
                if prim.is_object() {
                    return Err(interp.type_error("cannot convert object to primitive value"));
                }
                prim.to_number(interp)?
            }
        })
    }

    /// ToString, ECMA-262 §9.8.
    pub fn to_js_string(&self, interp: &mut Interpreter) -> RunResult<Atom> {
        Ok(match self {
            Self::Undefined => Atom::new("undefined"),
            Self::Null => Atom::new("null"),
            Self::Boolean(b) => Atom::new(if *b { "true" } else { "false" }),
            Self::Number(n) => Atom::new(number_to_string(*n)),
            Self::String(s) => s.clone(),
            Self::Object(_) => {
                let prim = self.to_primitive(interp, Hint::String)?;
                if prim.is_object() {
                    return Err(interp.type_error("cannot convert object to primitive value"));
                }
                prim.to_js_string(interp)?
            }
        })
    }

    /// ToObject, ECMA-262 §9.9. Wraps primitives is out of the engine's
    /// scope (there is no Boolean/Number/String wrapper library here;
    /// `undefined`/`null` still throw per the algorithm). Objects pass
    /// through unchanged; primitives that need boxing are handed to the
    /// host via `interp.box_primitive`, which the capability contract in
    /// §6 leaves to the library layer.
    pub fn to_object(&self, interp: &mut Interpreter) -> RunResult<HeapId> {
        match self {
            Self::Undefined | Self::Null => Err(interp.type_error("cannot convert undefined or null to object")),
            Self::Object(id) => Ok(*id),
            other => interp.box_primitive(other.clone()),
        }
    }

    /// ToInteger, ECMA-262 §9.4.
    pub fn to_integer(&self, interp: &mut Interpreter) -> RunResult<f64> {
        let n = self.to_number(interp)?;
        Ok(to_integer_num(n))
    }

    /// ToInt32, ECMA-262 §9.5.
    pub fn to_int32(&self, interp: &mut Interpreter) -> RunResult<i32> {
        Ok(to_int32_num(self.to_number(interp)?))
    }

    /// ToUint32, ECMA-262 §9.6.
    pub fn to_uint32(&self, interp: &mut Interpreter) -> RunResult<u32> {
        Ok(to_uint32_num(self.to_number(interp)?))
    }

    /// ToUint16, ECMA-262 §9.7.
    pub fn to_uint16(&self, interp: &mut Interpreter) -> RunResult<u16> {
        Ok(to_uint16_num(self.to_number(interp)?))
    }
}

pub fn to_integer_num(n: f64) -> f64 {
    if n.is_nan() {
        0.0
    } else if n.is_infinite() || n == 0.0 {
        n
    } else {
        n.trunc()
    }
}

pub fn to_int32_num(n: f64) -> i32 {
    if n.is_nan() || n.is_infinite() {
        return 0;
    }
    let n = n.trunc();
    let m = n.rem_euclid(4294967296.0);
    let m = if m < 0.0 { m + 4294967296.0 } else { m };
    if m >= 2147483648.0 {
        (m - 4294967296.0) as i32
    } else {
        m as i32
    }
}

pub fn to_uint32_num(n: f64) -> u32 {
    if n.is_nan() || n.is_infinite() {
        return 0;
    }
    let n = n.trunc();
    let m = n.rem_euclid(4294967296.0);
    (if m < 0.0 { m + 4294967296.0 } else { m }) as u32
}

pub fn to_uint16_num(n: f64) -> u16 {
    (to_uint32_num(n) % 65536) as u16
}

/// `ToNumber` applied to a string: ECMA-262 §9.3.1 `StringNumericLiteral`.
/// Leading/trailing whitespace is trimmed; the empty string is `0`;
/// anything that doesn't parse cleanly as a decimal or `0x`/`0X` literal is
/// `NaN`.
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map(|v| v as f64).unwrap_or(f64::NAN);
    }
    match t {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => t.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// `ToString` applied to a number: ECMA-262 §9.8.1.
///
/// Delegates the shortest-round-trip digit generation to Rust's formatter,
/// which (like the `dtoa`-family helpers the spec treats as an external
/// numeric-primitives collaborator, see spec.md §1) produces a minimal
/// decimal representation; only the `NaN`/`Infinity`/integer-vs-exponential
/// presentation rules are applied on top.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() };
    }
    let mut s = format!("{n}");
    // Rust renders e.g. 1e30 with no `+` and 1e-7 with the exponent already
    // present; ECMAScript wants the same shape but without a redundant
    // fractional `.0` on exponential forms (`1e30` not `1e30.0`).
    if let Some(epos) = s.find('e') {
        let (mantissa, exp) = s.split_at(epos);
        if let Some(m) = mantissa.strip_suffix(".0") {
            s = format!("{m}{exp}");
        }
    }
    s
}

/// Strict equality, ECMA-262 §11.9.6. `-0 === +0` is true; `NaN === NaN`
/// is false; strings compare by content.
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => x == y,
        _ => false,
    }
}

/// Abstract equality, ECMA-262 §11.9.3.
pub fn abstract_equals(a: &Value, b: &Value, interp: &mut Interpreter) -> RunResult<bool> {
    use Value::{Boolean, Null, Number, Object, String as Str, Undefined};
    Ok(match (a, b) {
        (Undefined | Null, Undefined | Null) => true,
        (Number(_), Number(_)) | (Str(_), Str(_)) | (Boolean(_), Boolean(_)) | (Object(_), Object(_)) => strict_equals(a, b),
        (Number(_), Str(_)) => abstract_equals(a, &Number(b.to_number(interp)?), interp)?,
        (Str(_), Number(_)) => abstract_equals(&Number(a.to_number(interp)?), b, interp)?,
        (Boolean(_), _) => abstract_equals(&Number(a.to_number(interp)?), b, interp)?,
        (_, Boolean(_)) => abstract_equals(a, &Number(b.to_number(interp)?), interp)?,
        (Number(_) | Str(_), Object(_)) => {
            let prim = b.to_primitive(interp, Hint::Default)?;
            abstract_equals(a, &prim, interp)?
        }
        (Object(_), Number(_) | Str(_)) => {
            let prim = a.to_primitive(interp, Hint::Default)?;
            abstract_equals(&prim, b, interp)?
        }
        _ => false,
    })
}

/// Tri-state result of the abstract relational comparison algorithm,
/// ECMA-262 §11.8.5: either operand being `NaN` yields `Undefined`, which
/// every relational operator (`<`,`>`,`<=`,`>=`) treats as `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriBool {
    True,
    False,
    Undefined,
}

/// Abstract relational comparison `x < y`, ECMA-262 §11.8.5.
pub fn less_than(x: &Value, y: &Value, interp: &mut Interpreter) -> RunResult<TriBool> {
    let px = x.to_primitive(interp, Hint::Number)?;
    let py = y.to_primitive(interp, Hint::Number)?;
    if let (Value::String(a), Value::String(b)) = (&px, &py) {
        return Ok(if a.as_str() < b.as_str() { TriBool::True } else { TriBool::False });
    }
    let nx = px.to_number(interp)?;
    let ny = py.to_number(interp)?;
    if nx.is_nan() || ny.is_nan() {
        return Ok(TriBool::Undefined);
    }
    Ok(if nx < ny { TriBool::True } else { TriBool::False })
}

/// Maps an exception-raising conversion to the TypeError the engine should
/// throw for it, used by callers that only need the common "not an object"
/// failure shape.
pub fn type_error_kind() -> ExcType {
    ExcType::TypeError
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_to_string_matches_ecma_shapes() {
        assert_eq!(number_to_string(0.0), "0");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::INFINITY), "Infinity");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(number_to_string(3.0), "3");
        assert!(number_to_string(0.1 + 0.2).starts_with("0.30000000000000004"));
    }

    #[test]
    fn to_int32_wraps_per_spec() {
        assert_eq!(to_int32_num(2f64.powi(31)), i32::MIN);
        assert_eq!(to_int32_num(2f64.powi(32) - 1.0), -1);
        assert_eq!(to_int32_num(2f64.powi(32) + 1.0), 1);
        assert_eq!(to_int32_num(f64::NAN), 0);
        assert_eq!(to_int32_num(f64::INFINITY), 0);
    }

    #[test]
    fn strict_equals_zero_and_nan() {
        assert!(strict_equals(&Value::Number(0.0), &Value::Number(-0.0)));
        assert!(!strict_equals(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
    }
}
