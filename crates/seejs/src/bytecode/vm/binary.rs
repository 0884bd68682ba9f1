//! Binary operator semantics (ECMA-262 §11.5-§11.10), kept out of the
//! dispatch loop's `match` so that grows with new opcodes stays readable.

use crate::{
    exception::RunResult,
    interp::Interpreter,
    value::{self, Hint, TriBool, Value},
};

/// `+`, ECMA-262 §11.6.1: `ToPrimitive` both operands with no hint; if
/// either result is a string, concatenate, otherwise add numerically.
pub fn add(interp: &mut Interpreter, l: Value, r: Value) -> RunResult<Value> {
    let lp = l.to_primitive(interp, Hint::Default)?;
    let rp = r.to_primitive(interp, Hint::Default)?;
    if matches!(lp, Value::String(_)) || matches!(rp, Value::String(_)) {
        let ls = lp.to_js_string(interp)?;
        let rs = rp.to_js_string(interp)?;
        Ok(Value::String(format!("{ls}{rs}").into()))
    } else {
        Ok(Value::Number(lp.to_number(interp)? + rp.to_number(interp)?))
    }
}

pub fn sub(interp: &mut Interpreter, l: Value, r: Value) -> RunResult<Value> {
    Ok(Value::Number(l.to_number(interp)? - r.to_number(interp)?))
}
pub fn mul(interp: &mut Interpreter, l: Value, r: Value) -> RunResult<Value> {
    Ok(Value::Number(l.to_number(interp)? * r.to_number(interp)?))
}
pub fn div(interp: &mut Interpreter, l: Value, r: Value) -> RunResult<Value> {
    Ok(Value::Number(l.to_number(interp)? / r.to_number(interp)?))
}
pub fn rem(interp: &mut Interpreter, l: Value, r: Value) -> RunResult<Value> {
    Ok(Value::Number(l.to_number(interp)? % r.to_number(interp)?))
}

/// `<<`, ECMA-262 §11.7.1.
pub fn lshift(interp: &mut Interpreter, l: Value, r: Value) -> RunResult<Value> {
    let a = l.to_int32(interp)?;
    let shift = r.to_uint32(interp)? & 0x1f;
    Ok(Value::Number((a.wrapping_shl(shift)) as f64))
}

/// `>>`, ECMA-262 §11.7.2 (arithmetic/sign-propagating).
pub fn rshift(interp: &mut Interpreter, l: Value, r: Value) -> RunResult<Value> {
    let a = l.to_int32(interp)?;
    let shift = r.to_uint32(interp)? & 0x1f;
    Ok(Value::Number((a >> shift) as f64))
}

/// `>>>`, ECMA-262 §11.7.3 (logical/zero-filling).
pub fn urshift(interp: &mut Interpreter, l: Value, r: Value) -> RunResult<Value> {
    let a = l.to_uint32(interp)?;
    let shift = r.to_uint32(interp)? & 0x1f;
    Ok(Value::Number((a >> shift) as f64))
}

pub fn band(interp: &mut Interpreter, l: Value, r: Value) -> RunResult<Value> {
    Ok(Value::Number((l.to_int32(interp)? & r.to_int32(interp)?) as f64))
}
pub fn bxor(interp: &mut Interpreter, l: Value, r: Value) -> RunResult<Value> {
    Ok(Value::Number((l.to_int32(interp)? ^ r.to_int32(interp)?) as f64))
}
pub fn bor(interp: &mut Interpreter, l: Value, r: Value) -> RunResult<Value> {
    Ok(Value::Number((l.to_int32(interp)? | r.to_int32(interp)?) as f64))
}

/// Relational comparisons, ECMA-262 §11.8: `NaN` on either side yields
/// `Undefined` from the abstract algorithm, which every operator below
/// treats as `false`.
pub fn lt(interp: &mut Interpreter, l: &Value, r: &Value) -> RunResult<bool> {
    Ok(value::less_than(l, r, interp)? == TriBool::True)
}
pub fn gt(interp: &mut Interpreter, l: &Value, r: &Value) -> RunResult<bool> {
    Ok(value::less_than(r, l, interp)? == TriBool::True)
}
pub fn le(interp: &mut Interpreter, l: &Value, r: &Value) -> RunResult<bool> {
    Ok(value::less_than(r, l, interp)? == TriBool::False)
}
pub fn ge(interp: &mut Interpreter, l: &Value, r: &Value) -> RunResult<bool> {
    Ok(value::less_than(l, r, interp)? == TriBool::False)
}

/// `instanceof`, ECMA-262 §11.8.6.
pub fn instance_of(interp: &mut Interpreter, l: &Value, r: &Value) -> RunResult<bool> {
    let Some(f) = r.as_object() else {
        return Err(interp.type_error("right-hand side of 'instanceof' is not an object"));
    };
    crate::object::has_instance(interp, f, l)
}

/// `in`, ECMA-262 §11.8.7.
pub fn in_op(interp: &mut Interpreter, key: &Value, obj: &Value) -> RunResult<bool> {
    let Some(id) = obj.as_object() else {
        return Err(interp.type_error("right-hand side of 'in' is not an object"));
    };
    let name = key.to_js_string(interp)?;
    Ok(crate::object::has_property(interp, id, &name))
}
