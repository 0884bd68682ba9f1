//! Block-stack unwinding (spec §4.7's `END n` algorithm), reproduced from
//! `original_source/libsee/code1.c`'s unified unwind loop (~lines 1490-1570)
//! but built around an explicit [`Completion`] value instead of `setjmp`/
//! `longjmp`, since nothing in safe Rust can smuggle a non-local jump
//! through an arbitrary call stack the way the reference engine's C
//! activation frames do.
//!
//! The same loop serves ordinary control-flow unwinding (`break`/
//! `continue`/`return`/falling off the end of a `with`/`try` region) and
//! actual exception propagation -- they differ only in which [`Completion`]
//! variant is being carried through, exactly as the source's single
//! `INST_END` case handles both via the value it was longjmp'd with.

use crate::{
    exception::{RunError, RunResult},
    heap::{Obj, PropertyAttributes},
    intern::Atom,
    interp::Interpreter,
    scope::{self, Scope},
    value::Value,
};

use super::Frame;

/// What a unit of control transfer is carrying as it crosses block-stack
/// markers: plain fallthrough, a `return`'s value, or a propagating throw.
pub enum Completion {
    Normal,
    Return(Value),
    Throw(RunError),
}

/// One entry of a frame's block stack.
pub enum Block {
    /// A `with` scope (or a caught exception's synthesized catch scope,
    /// which a `TryC` converts into one of these on entry to its handler).
    /// Carries the scope to restore once the block is left.
    With(Option<Scope>),
    /// A `for-in` enumerator. Discarded, not restored, on unwind -- the
    /// iteration state itself lives on the operand stack via `Op::BEnum`.
    Enum(std::vec::IntoIter<Atom>),
    /// An active `try`-catch region: `handler` is the catch body's entry
    /// point, `param` the catch parameter's name.
    TryC { handler: u32, param: Atom },
    /// An active `try`-finally region: `handler` is the finally body's
    /// entry point.
    TryF { handler: u32 },
}

/// What [`unwind`] accomplished.
pub enum UnwindOutcome {
    /// Execution was redirected into a `catch`/`finally` handler;
    /// `frame.ip` now points at it. The caller should just keep running the
    /// instruction loop -- nothing further to decide here.
    Redirected,
    /// The block stack was popped all the way down to `target` without any
    /// `TryC`/`TryF` claiming the completion. The caller decides what to do
    /// with it (continue, return from the call, or propagate the throw).
    Completed(Completion),
}

/// Pops `frame.blocks` down to `target`, applying each marker's unwind
/// behaviour to `completion`:
///
/// - `With`: restores the saved scope, keeps looping.
/// - `Enum`: dropped, keeps looping.
/// - `TryC`: if `completion` is a catchable throw, builds a catch scope
///   bound to the thrown value, leaves a `With` marker in its place (so the
///   scope is torn down correctly when the handler itself later unwinds),
///   and redirects into the handler. Otherwise (plain unwind, `return`, or
///   an uncatchable resource error) the marker is simply discarded.
/// - `TryF`: finally *always* runs. The in-progress completion is stashed
///   on `frame.pending_finally` (keyed by the target/resume point it was
///   headed for) and execution redirects into the handler; `Op::EndFinally`
///   resumes toward that stashed target once the finally body itself
///   completes normally.
///
/// `resume_ip` is the instruction offset execution was *going to* continue
/// at had no block needed unwinding (the fallthrough point for a plain
/// `End(n)`, or the `break`/`continue` target's `BAlways` for one compiled
/// ahead of an unwind) -- threaded through so a `TryF` redirect can hand it
/// back to `Op::EndFinally` once the finally body lets it resume.
pub fn unwind(interp: &mut Interpreter, frame: &mut Frame, target: usize, completion: Completion, resume_ip: u32) -> RunResult<UnwindOutcome> {
    let mut completion = completion;
    loop {
        if frame.blocks.len() <= target {
            return Ok(UnwindOutcome::Completed(completion));
        }
        match frame.blocks.pop().expect("checked non-empty above") {
            Block::With(saved) => {
                frame.scope = saved;
            }
            Block::Enum(_) => {}
            Block::TryC { handler, param } => match completion {
                Completion::Throw(err) if err.is_catchable() => {
                    let value = err.into_value().unwrap_or(Value::Undefined);
                    let saved_scope = frame.scope.clone();
                    let catch_obj = interp.heap.allocate(Obj::new(Some(interp.object_prototype()))).map_err(RunError::from)?;
                    crate::object::put(interp, catch_obj, param, value, Some(PropertyAttributes::DONT_DELETE))?;
                    frame.scope = Some(scope::push(frame.scope.clone(), catch_obj));
                    frame.blocks.push(Block::With(saved_scope));
                    frame.ip = handler;
                    return Ok(UnwindOutcome::Redirected);
                }
                other => completion = other,
            },
            Block::TryF { handler } => {
                frame.pending_finally.push((target, resume_ip, completion));
                frame.ip = handler;
                return Ok(UnwindOutcome::Redirected);
            }
        }
    }
}
