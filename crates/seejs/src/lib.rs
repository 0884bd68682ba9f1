//! An embeddable ECMAScript (ed. 3) engine: lazy Unicode input, a
//! recursive-descent lexer/parser, a single-pass bytecode compiler, and a
//! stack-based virtual machine.
//!
//! The crate is organized leaf-first, the same order the teacher lays out
//! its own modules in: values and interning at the bottom, the object
//! model and scope chain above them, then lexer/parser/compiler/VM, with
//! the interpreter struct tying everything together at the top.

mod ast;
mod bytecode;
mod exception;
mod function;
mod heap;
mod host;
mod input;
mod intern;
mod interp;
mod lexer;
mod loc;
mod object;
mod parser;
mod regex;
mod resource;
mod scope;
mod token;
mod tracer;
mod value;

pub use crate::{
    bytecode::code::Code,
    exception::{CallType, ExcType, Exception, RunError, RunResult, StackFrame},
    function::Function,
    heap::{HeapId, PropertyAttributes},
    host::{ArgValue, CompatFlags, format_args},
    input::{BAD_CHAR, Encoding, Input},
    interp::Interpreter,
    loc::CodeLoc,
    regex::{RegexEngine, RegexFlags, RegexRegistry},
    resource::{DEFAULT_MAX_RECURSION_DEPTH, LimitedTracker, NoLimitTracker, ResourceError, ResourceTracker},
    scope::ExecutionContext,
    tracer::{NoopTracer, RecordingTracer, StderrTracer, TraceEvent, VmTracer},
    value::{Hint, Value},
};
