//! Compiled function bodies (spec §3 "Function").

use crate::{bytecode::Code, intern::Atom};

/// A function once parsed and compiled: parameter names, compiled body,
/// and enough metadata to build an activation object at call time.
/// The enclosing scope snapshot that makes this a *closure* is not stored
/// here -- it is captured when `FUNC` creates the callable object
/// (`Exotic::Function(Rc<Function>, Option<Scope>)`), since the same
/// `Function` template is shared by every closure created from the same
/// `function` expression/statement (e.g. one created per loop iteration).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Function {
    pub name: Atom,
    pub params: Vec<Atom>,
    /// Every `var`/function-statement name declared anywhere in the body,
    /// used to pre-populate the activation object before the body runs
    /// (ECMA-262 §10.1.3 Variable Instantiation).
    pub var_names: Vec<Atom>,
    pub code: Code,
}

impl Function {
    pub fn new(name: Atom, params: Vec<Atom>, var_names: Vec<Atom>, code: Code) -> Self {
        Self { name, params, var_names, code }
    }
}
