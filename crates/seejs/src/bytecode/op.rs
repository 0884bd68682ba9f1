//! The bytecode instruction set (spec §4.6), named after and ordered the
//! same as `original_source/libsee/code1.h`'s opcode table. Unlike the C
//! original this is a plain Rust enum carrying its own operands rather than
//! an opcode byte plus a separately-encoded 2-bit immediate-argument
//! descriptor: the bytecode format is private (SPEC_FULL.md §6, "reachable
//! only through the `CodeBuilder` interface, no on-disk persistence"), so
//! there is no external wire format whose byte layout needs to survive --
//! an enum is the idiomatic in-memory shape for a format nothing outside
//! this crate ever parses.

use crate::ast::{AssignOp, BinaryOp, UnaryOp};

/// An index into a [`crate::bytecode::code::Code`]'s literal table.
pub type LiteralIdx = u32;
/// An index into a function's hoisted `var`/function-statement name table
/// (`Code::var_names`/`Function::var_names`), pre-declared as `undefined`
/// at call/program start (ed.3 §10.1.3). No opcode operand actually carries
/// one of these -- every name lookup goes through the scope chain via
/// `Ref`/`VRef` -- the type alias exists so the table's element type has a
/// name distinct from a literal-table index.
pub type VarIdx = u32;
/// An index into a [`crate::bytecode::code::Code`]'s nested-function table.
pub type FuncIdx = u32;
/// A byte/instruction offset within the current code's instruction vector.
pub type CodeOffset = u32;

#[derive(Debug, Clone)]
pub enum Op {
    Nop,
    Dup,
    Pop,
    /// Exchanges the top two stack values.
    Exch,
    /// Rotates the top three stack values (`a b c -> b c a`), used by the
    /// compiler to reorder a reference's base/name pair around a value for
    /// compound assignment (spec §4.6).
    Roll3,
    Throw,
    /// Stores the top-of-stack into the completion register (spec §4.6
    /// "the last expression-statement's value", not the `Completion` sum
    /// type from spec §3/§9 -- see the design note in `value.rs`).
    SetC,
    /// Pushes the completion register's current value.
    GetC,
    /// Resolves an identifier name (next literal) to a `Reference` by
    /// walking the scope chain, per spec §4.3's `scope_lookup`.
    Ref(LiteralIdx),
    /// Pops a `Reference`, pushes its value (`ReferenceError` if
    /// unresolved).
    GetValue,
    /// Pops a `Reference`, pushes `true`/`false` for whether it resolved.
    Lookup,
    /// Pops a value then a `Reference`; writes the value, optionally
    /// attaching the named attribute mask when first declaring a binding
    /// (spec §4.6 "`PUTVALUE(attr)`").
    PutValue(Option<crate::heap::PropertyAttributes>),
    /// Pops an object and a key value, pushes a `Reference` to that
    /// property (used for `a.b`/`a[b]` targets rather than identifiers).
    VRef,
    /// Pops a `Reference`, deletes it, pushes the boolean result.
    Delete,
    /// Pops a `Reference` (or value), pushes the `typeof` string; resolves
    /// an *unresolved* reference to `"undefined"` rather than throwing.
    TypeOf,
    ToObject,
    ToNumber,
    ToBoolean,
    ToString,
    ToPrimitive,
    Neg,
    UnaryPlus,
    Inv,
    Not,
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    LShift,
    RShift,
    URShift,
    Lt,
    Gt,
    Le,
    Ge,
    InstanceOf,
    In,
    Eq,
    SEq,
    BAnd,
    BXor,
    BOr,
    /// Pops an object, pushes an enumerator snapshot of its enumerable
    /// property names (spec §4.7 `for-in` setup).
    SEnum,
    /// Pops an object, pushes a `with`-scope built from it onto the block
    /// stack.
    SWith,
    New(u32),
    Call(u32),
    /// Unwinds `n` levels of the block stack (spec §4.7's `END n`
    /// algorithm: pops `with`/`enum` markers, converts a `try`-catch block
    /// still active into a pending-`with` scope installation, converts a
    /// `try`-finally block still active into a run of its `finally` body).
    End(u32),
    BAlways(CodeOffset),
    /// Pops a boolean; branches if true.
    BTrue(CodeOffset),
    /// Pops the top enumerator; pushes the next name or branches to
    /// `target` when exhausted (spec §4.7 `for-in` iteration).
    BEnum(CodeOffset),
    /// Pops the catch parameter's name (a string value), pushes a
    /// `try`-catch block marker; `target` is the handler's entry.
    STryC(CodeOffset),
    /// Pushes a `try`-finally block marker; `target` is the finally body's
    /// entry.
    STryF(CodeOffset),
    /// Marks the textual end of a `finally` body. Resumes whatever
    /// completion (fallthrough/break/continue/return/throw) was pending
    /// when the enclosing `STryF`-pushed block was unwound into running
    /// this handler -- unless the finally body produced its own abrupt
    /// completion first, which takes priority (spec §4.7). Not part of
    /// `code1.h`'s opcode table: the reference engine threads this through
    /// `setjmp`/`longjmp` and a block-stack sentinel rather than a distinct
    /// instruction (see the design note in `bytecode/vm/exceptions.rs`).
    EndFinally,
    /// Pushes a closure over the named nested function template and the
    /// current scope.
    Func(FuncIdx),
    Literal(LiteralIdx),
    /// Pushes the activation's `this` value.
    This,
    /// Debug-only: records the source line for this point, consumed by
    /// tracebacks and the statement tracer (spec §4.7 "statement tracing").
    Loc(u32),
    /// Pops the top-of-stack and terminates the current function
    /// activation with it as the return value.
    ///
    /// Not one of the opcodes named in `code1.h` -- the reference engine
    /// signals "return" through its C call frame's control register
    /// rather than a bytecode instruction. A safe Rust VM has no such
    /// register to smuggle control through, so `Op::Return` makes the
    /// same control transfer an explicit, ordinary instruction instead.
    Return,
}

/// Compiled forms of the AST's operator enums, used by the compiler to
/// pick an instruction without re-matching on the AST node.
pub fn binary_op_to_inst(op: BinaryOp) -> Op {
    match op {
        BinaryOp::Add => Op::Add,
        BinaryOp::Sub => Op::Sub,
        BinaryOp::Mul => Op::Mul,
        BinaryOp::Div => Op::Div,
        BinaryOp::Mod => Op::Mod,
        BinaryOp::Shl => Op::LShift,
        BinaryOp::Shr => Op::RShift,
        BinaryOp::Ushr => Op::URShift,
        BinaryOp::Lt => Op::Lt,
        BinaryOp::Gt => Op::Gt,
        BinaryOp::Le => Op::Le,
        BinaryOp::Ge => Op::Ge,
        BinaryOp::Eq => Op::Eq,
        BinaryOp::Ne => Op::Eq, // compiler wraps with a NOT; see compiler.rs
        BinaryOp::StrictEq => Op::SEq,
        BinaryOp::StrictNe => Op::SEq, // compiler wraps with a NOT; see compiler.rs
        BinaryOp::BitAnd => Op::BAnd,
        BinaryOp::BitOr => Op::BOr,
        BinaryOp::BitXor => Op::BXor,
        BinaryOp::InstanceOf => Op::InstanceOf,
        BinaryOp::In => Op::In,
    }
}

pub fn assign_op_to_binary(op: AssignOp) -> Option<BinaryOp> {
    Some(match op {
        AssignOp::Assign => return None,
        AssignOp::Add => BinaryOp::Add,
        AssignOp::Sub => BinaryOp::Sub,
        AssignOp::Mul => BinaryOp::Mul,
        AssignOp::Div => BinaryOp::Div,
        AssignOp::Mod => BinaryOp::Mod,
        AssignOp::Shl => BinaryOp::Shl,
        AssignOp::Shr => BinaryOp::Shr,
        AssignOp::Ushr => BinaryOp::Ushr,
        AssignOp::BitAnd => BinaryOp::BitAnd,
        AssignOp::BitOr => BinaryOp::BitOr,
        AssignOp::BitXor => BinaryOp::BitXor,
    })
}

pub fn unary_op_to_inst(op: UnaryOp) -> Option<Op> {
    Some(match op {
        UnaryOp::Neg => Op::Neg,
        UnaryOp::Plus => Op::UnaryPlus,
        UnaryOp::Not => Op::Not,
        UnaryOp::BitNot => Op::Inv,
        UnaryOp::TypeOf => Op::TypeOf,
        UnaryOp::Void => return None, // compiled as POP + push undefined
        UnaryOp::Delete => Op::Delete,
        UnaryOp::PreIncr | UnaryOp::PreDecr | UnaryOp::PostIncr | UnaryOp::PostDecr => return None,
    })
}
