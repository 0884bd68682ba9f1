//! Error kinds, the thrown-value propagation type, and tracebacks.
//!
//! Grounded in the teacher's `exception_private`/`exception_public` split:
//! an internal enum of error kinds with hierarchy-free, flat equality (ed.3
//! has no user-defined exception classes to subclass these), and a public
//! `Exception` type the embedder can format and whose frames it can walk.

use std::fmt;

use crate::{loc::CodeLoc, resource::ResourceError, value::Value};

/// The seven built-in error classes named in spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExcType {
    Error,
    EvalError,
    RangeError,
    ReferenceError,
    SyntaxError,
    TypeError,
    UriError,
}

impl ExcType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::EvalError => "EvalError",
            Self::RangeError => "RangeError",
            Self::ReferenceError => "ReferenceError",
            Self::SyntaxError => "SyntaxError",
            Self::TypeError => "TypeError",
            Self::UriError => "URIError",
        }
    }
}

impl fmt::Display for ExcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One frame of a traceback: callee name, call site, and how it was
/// invoked.
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub callee: String,
    pub loc: CodeLoc,
    pub call_type: CallType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    Call,
    Construct,
    Throw,
}

/// A propagating error: either a caught-or-catchable ECMAScript throw, or
/// an uncatchable resource-limit failure from the host.
///
/// `Throw` carries the thrown *value* (not necessarily an `Error`
/// instance -- `throw {e:1}` is valid ECMAScript) plus the traceback
/// accumulated as the exception unwound call frames.
#[derive(Debug)]
pub enum RunError {
    Throw(Value, Vec<StackFrame>),
    /// A resource limit failure. Per spec §5's cancellation model this
    /// still unwinds normally through `try/finally`, but per the resource
    /// tracker's sandboxing role it cannot be caught by a `try/catch` whose
    /// handler would otherwise swallow it and keep running -- the VM
    /// re-raises it after every `finally` runs. See `RunError::is_catchable`.
    Resource(ResourceError),
}

pub type RunResult<T> = Result<T, RunError>;

impl RunError {
    pub fn throw(value: Value) -> Self {
        Self::Throw(value, Vec::new())
    }

    pub fn push_frame(mut self, frame: StackFrame) -> Self {
        if let Self::Throw(_, frames) = &mut self {
            frames.push(frame);
        }
        self
    }

    /// Whether a `catch` clause may intercept this error. Resource errors
    /// still run `finally` blocks (they unwind through the block stack
    /// like any other throw) but are never matched by `catch`.
    pub fn is_catchable(&self) -> bool {
        matches!(self, Self::Throw(..))
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Throw(v, _) => Some(v),
            Self::Resource(_) => None,
        }
    }
}

impl From<ResourceError> for RunError {
    fn from(e: ResourceError) -> Self {
        Self::Resource(e)
    }
}

/// The host-facing view of an uncaught error: the thrown value (formatted
/// via `ToString` by the embedder) plus the traceback frames collected
/// while it unwound.
#[derive(Debug)]
pub struct Exception {
    pub value: Value,
    pub frames: Vec<StackFrame>,
}

impl From<RunError> for Exception {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Throw(value, frames) => Self { value, frames },
            RunError::Resource(e) => Self {
                value: Value::String(format!("{e}").into()),
                frames: Vec::new(),
            },
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.value)?;
        for frame in &self.frames {
            write!(f, "\n    at {} ({})", frame.callee, frame.loc)?;
        }
        Ok(())
    }
}

impl std::error::Error for Exception {}

