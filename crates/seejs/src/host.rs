//! The embedding contract: compatibility switches and a printf-like
//! argument marshaler for host functions (spec §6), grounded in the
//! teacher's `args::ArgValues` helper for turning a fixed format string
//! into typed extraction, adapted to the format-character list a
//! `SEE_native`-style host function historically accepted.

use crate::{
    exception::{RunError, RunResult},
    interp::Interpreter,
    value::Value,
};

bitflags::bitflags! {
    /// Dialect switches a host may enable before parsing, spec §6 /
    /// SPEC_FULL §6. Each bit loosens the ed.3 grammar/semantics toward an
    /// earlier JavaScript version or a documented unsafe relaxation; none
    /// are on by default.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CompatFlags: u16 {
        /// JavaScript 1.1: `arguments.callee`/`caller` style extensions.
        const JS11 = 0b0000_0001;
        /// JavaScript 1.2: `__proto__` accessor, `toSource`.
        const JS12 = 0b0000_0010;
        /// JavaScript 1.3.
        const JS13 = 0b0000_0100;
        /// JavaScript 1.4.
        const JS14 = 0b0000_1000;
        /// JavaScript 1.5: `function` statement name binding extension.
        const JS15 = 0b0001_0000;
        /// Accept `<!--` / `-->` as a line comment marker (legacy HTML
        /// embedding compatibility).
        const SGMLCOMMENT = 0b0010_0000;
        /// Accept non-shortest-form UTF-8 input instead of substituting
        /// the replacement character.
        const UTF_UNSAFE = 0b0100_0000;
        /// Conform to Annex B ("ECMA-262 3rd Edition, Annex B") web
        /// compatibility extensions (octal literals, `escape`/`unescape`).
        const ECMA_262_3B = 0b1000_0000;
    }
}

/// One positional argument extracted from a host call's argument vector,
/// by the format character that named its expected shape.
pub enum ArgValue {
    Value(Value),
    Number(f64),
    Integer(i32),
    Str(String),
    Boolean(bool),
    Object(crate::heap::HeapId),
}

/// Parses `args` against a printf-like format string:
/// - `v` - pass the raw [`Value`] through unconverted.
/// - `n` - `ToNumber`.
/// - `i` - `ToInt32`.
/// - `s` - `ToString`.
/// - `b` - `ToBoolean`.
/// - `o` - `ToObject` (throws `TypeError` on `undefined`/`null`).
///
/// Missing trailing arguments convert `Value::Undefined` per the usual
/// `ToX` rules rather than erroring, matching how ECMAScript functions
/// tolerate being called with too few arguments.
pub fn format_args(interp: &mut Interpreter, format: &str, args: &[Value]) -> RunResult<Vec<ArgValue>> {
    let mut out = Vec::with_capacity(format.len());
    for (i, ch) in format.chars().enumerate() {
        let arg = args.get(i).cloned().unwrap_or(Value::Undefined);
        out.push(match ch {
            'v' => ArgValue::Value(arg),
            'n' => ArgValue::Number(arg.to_number(interp)?),
            'i' => ArgValue::Integer(arg.to_int32(interp)?),
            's' => ArgValue::Str(arg.to_js_string(interp)?.as_str().to_string()),
            'b' => ArgValue::Boolean(arg.to_boolean()),
            'o' => ArgValue::Object(arg.to_object(interp)?),
            other => return Err(RunError::throw(Value::String(format!("unknown host argument format character '{other}'").into()))),
        });
    }
    Ok(out)
}
