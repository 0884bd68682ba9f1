//! The compiled unit (spec §3 "Code"/§4.6): an instruction vector, a
//! literal pool, a nested-function table, and bookkeeping the VM needs to
//! size its stacks up front.

use std::rc::Rc;

use crate::{bytecode::op::Op, function::Function, intern::Atom, value::Value};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Code {
    #[serde(skip)]
    pub instructions: Rc<Vec<Op>>,
    pub literals: Vec<Value>,
    /// Nested function templates, indexed by `Op::Func`'s operand. Stored
    /// as `Rc<Function>` rather than inline so the same template can be
    /// shared by every closure `Op::Func` ever instantiates from it.
    #[serde(skip)]
    pub functions: Vec<Rc<Function>>,
    pub var_names: Vec<Atom>,
    /// High-water mark of the operand stack the compiler computed while
    /// generating this code, so the VM can pre-size its stack (spec §4.6
    /// "maxstack").
    pub max_stack: u32,
    /// High-water mark of the block stack (`with`/`enum`/`try` markers),
    /// spec §4.6 "maxblock".
    pub max_block: u32,
    pub filename: Rc<str>,
}

impl Code {
    /// A human-readable dump of the instruction stream, supplementing the
    /// distilled spec per SPEC_FULL.md §10 (`code1`'s `SEE_code1_dprint`).
    /// Not used by the VM itself; a diagnostics/debugging aid only.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (i, op) in self.instructions.iter().enumerate() {
            out.push_str(&format!("{i:>5}  {op:?}\n"));
        }
        out
    }
}
