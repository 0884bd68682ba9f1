//! The bytecode interpreter loop (spec §4.7): one [`Frame`] per active
//! call, a `Value`-or-`Reference` operand stack, and the block-stack
//! unwind machinery in [`exceptions`] that backs `break`/`continue`/
//! `return`/`throw`/`with`/`for-in`/`try`.
//!
//! Grounded in the teacher's `namespace`/`engine` split: a flat, index-
//! addressed execution record (here, `Frame`) driven by one central
//! dispatch loop rather than a tree-walking evaluator.

pub mod binary;
pub mod exceptions;

use std::rc::Rc;

use exceptions::{unwind, Block, Completion, UnwindOutcome};

use crate::{
    bytecode::{code::Code, op::Op},
    exception::{RunError, RunResult},
    function::Function,
    heap::{Exotic, HeapId, Obj, PropertyAttributes},
    intern::{Atom, STATIC_ATOMS},
    interp::Interpreter,
    loc::CodeLoc,
    scope::{self, ExecutionContext, Reference, Scope},
    tracer::{TraceEvent, VmTracer},
    value::{Hint, Value},
};

/// One operand-stack slot: either a resolved value, or an unresolved
/// `Reference` awaiting `GETVALUE`/`PUTVALUE`/`LOOKUP`/`DELETE`/`TYPEOF`.
/// Kept out of [`crate::value::Value`] itself -- see that module's doc
/// comment -- since neither ever escapes a running frame.
#[derive(Debug, Clone)]
enum VmValue {
    Value(Value),
    Reference(Reference),
}

/// One function (or top-level program) activation: its operand stack,
/// block stack, scope chain, and bytecode position.
struct Frame<'c> {
    code: &'c Code,
    ip: u32,
    current_line: u32,
    scope: Option<Scope>,
    this: Value,
    stack: Vec<VmValue>,
    blocks: Vec<Block>,
    /// LIFO side-channel of completions still pending a `finally` body's
    /// resumption, keyed by `(unwind target, resume ip, completion)`. See
    /// `exceptions::unwind`'s doc comment.
    pending_finally: Vec<(usize, u32, Completion)>,
    /// `SETC`/`GETC`'s register: the most recently evaluated expression
    /// statement's value, reported as the whole program/`eval` call's
    /// result if execution falls off the end without an explicit `return`.
    completion_register: Value,
}

impl<'c> Frame<'c> {
    fn new(code: &'c Code, scope: Option<Scope>, this: Value) -> Self {
        Self {
            code,
            ip: 0,
            current_line: 0,
            scope,
            this,
            stack: Vec::with_capacity(code.max_stack as usize),
            blocks: Vec::with_capacity(code.max_block as usize),
            pending_finally: Vec::new(),
            completion_register: Value::Undefined,
        }
    }

    fn push_value(&mut self, v: Value) {
        self.stack.push(VmValue::Value(v));
    }

    fn push_ref(&mut self, r: Reference) {
        self.stack.push(VmValue::Reference(r));
    }

    fn pop(&mut self) -> VmValue {
        self.stack.pop().expect("operand stack underflow")
    }

    fn pop_value(&mut self) -> Value {
        match self.pop() {
            VmValue::Value(v) => v,
            VmValue::Reference(_) => unreachable!("compiler only leaves a reference where the following op resolves it"),
        }
    }

    fn pop_ref(&mut self) -> Reference {
        match self.pop() {
            VmValue::Reference(r) => r,
            VmValue::Value(_) => unreachable!("compiler only emits this op right after pushing a reference"),
        }
    }

    fn loc(&self) -> CodeLoc {
        CodeLoc::new(self.code.filename.clone(), self.current_line)
    }
}

/// What one instruction did. `Unwind` defers the actual block-popping to
/// the caller, which is the one place that owns `unwind()`'s result
/// handling -- see the module doc comment on `exceptions`.
enum Step {
    Continue,
    Return(Value),
    Unwind {
        target: usize,
        completion: Completion,
        resume_ip: u32,
        /// If `unwind` fully completes with `Completion::Normal` (no
        /// `TryC`/`TryF` redirected execution elsewhere), force `frame.ip`
        /// to this value. Only `Op::EndFinally` needs this: by the time it
        /// runs, `frame.ip` already points *past the whole `try` statement*
        /// rather than at the break/continue/fallthrough point the
        /// original unwind was headed for, so that point must be restored
        /// explicitly. `Op::End(n)`'s own `frame.ip` is already correct in
        /// that case (unwind never touched it), so it passes `None`.
        normal_ip_override: Option<u32>,
    },
}

enum FrameExit {
    Return(Value),
    FellOff,
}

fn run_frame(interp: &mut Interpreter, frame: &mut Frame) -> RunResult<FrameExit> {
    let len = frame.code.instructions.len() as u32;
    loop {
        if frame.ip >= len {
            return Ok(FrameExit::FellOff);
        }
        interp.heap.tick().map_err(RunError::from)?;
        let op = frame.code.instructions[frame.ip as usize].clone();
        frame.ip += 1;

        let step = match exec_one(interp, frame, &op) {
            Ok(step) => step,
            Err(e) => Step::Unwind { target: 0, completion: Completion::Throw(e), resume_ip: frame.ip, normal_ip_override: None },
        };

        match step {
            Step::Continue => {}
            Step::Return(v) => return Ok(FrameExit::Return(v)),
            Step::Unwind { target, completion, resume_ip, normal_ip_override } => match unwind(interp, frame, target, completion, resume_ip)? {
                UnwindOutcome::Redirected => {}
                UnwindOutcome::Completed(Completion::Normal) => {
                    if let Some(ip) = normal_ip_override {
                        frame.ip = ip;
                    }
                }
                UnwindOutcome::Completed(Completion::Return(v)) => return Ok(FrameExit::Return(v)),
                UnwindOutcome::Completed(Completion::Throw(e)) => return Err(e),
            },
        }
    }
}

fn literal_atom(code: &Code, idx: u32) -> Atom {
    match &code.literals[idx as usize] {
        Value::String(s) => s.clone(),
        other => unreachable!("Ref/STryC literal must be a string, got {other:?}"),
    }
}

#[allow(clippy::too_many_lines)]
fn exec_one(interp: &mut Interpreter, frame: &mut Frame, op: &Op) -> RunResult<Step> {
    match op {
        Op::Nop => {}
        Op::Dup => {
            let top = frame.stack.last().expect("operand stack underflow").clone();
            frame.stack.push(top);
        }
        Op::Pop => {
            frame.pop();
        }
        Op::Exch => {
            let len = frame.stack.len();
            frame.stack.swap(len - 1, len - 2);
        }
        Op::Roll3 => {
            // a b c -> b c a
            let c = frame.pop();
            let b = frame.pop();
            let a = frame.pop();
            frame.stack.push(b);
            frame.stack.push(c);
            frame.stack.push(a);
        }
        Op::Throw => {
            let v = frame.pop_value();
            interp.tracer.on_event(TraceEvent::Throw { loc: &frame.loc() });
            return Err(RunError::throw(v));
        }
        Op::SetC => {
            frame.completion_register = frame.pop_value();
        }
        Op::GetC => {
            frame.push_value(frame.completion_register.clone());
        }
        Op::Ref(idx) => {
            let name = literal_atom(frame.code, *idx);
            let r = scope::scope_lookup(interp, &frame.scope, &name);
            frame.push_ref(r);
        }
        Op::GetValue => match frame.pop() {
            VmValue::Value(v) => frame.push_value(v),
            VmValue::Reference(Reference::Property { base, name }) => {
                let v = crate::object::get(interp, base, &name)?;
                frame.push_value(v);
            }
            VmValue::Reference(Reference::Unresolved { name }) => {
                return Err(interp.reference_error(format!("'{name}' is not defined")));
            }
        },
        Op::Lookup => {
            let resolved = matches!(frame.pop_ref(), Reference::Property { .. });
            frame.push_value(Value::Boolean(resolved));
        }
        Op::PutValue(attrs) => {
            let r = frame.pop_ref();
            let v = frame.pop_value();
            match r {
                Reference::Property { base, name } => crate::object::put(interp, base, name, v, *attrs)?,
                Reference::Unresolved { name } => {
                    let global = interp.global_object();
                    crate::object::put(interp, global, name, v, *attrs)?;
                }
            }
        }
        Op::VRef => {
            let key = frame.pop_value();
            let obj = frame.pop_value();
            let base = obj.to_object(interp)?;
            let name = key.to_js_string(interp)?;
            frame.push_ref(Reference::Property { base, name });
        }
        Op::Delete => {
            let r = frame.pop_ref();
            let ok = match r {
                Reference::Property { base, name } => crate::object::delete(interp, base, &name),
                Reference::Unresolved { .. } => true,
            };
            frame.push_value(Value::Boolean(ok));
        }
        Op::TypeOf => {
            let s: &'static str = match frame.pop() {
                VmValue::Value(v) => v.type_of(interp),
                VmValue::Reference(Reference::Unresolved { .. }) => "undefined",
                VmValue::Reference(Reference::Property { base, name }) => crate::object::get(interp, base, &name)?.type_of(interp),
            };
            frame.push_value(Value::String(Atom::new(s)));
        }
        Op::ToObject => {
            let v = frame.pop_value();
            let id = v.to_object(interp)?;
            frame.push_value(Value::Object(id));
        }
        Op::ToNumber => {
            let v = frame.pop_value();
            let n = v.to_number(interp)?;
            frame.push_value(Value::Number(n));
        }
        Op::ToBoolean => {
            let v = frame.pop_value();
            frame.push_value(Value::Boolean(v.to_boolean()));
        }
        Op::ToString => {
            let v = frame.pop_value();
            let s = v.to_js_string(interp)?;
            frame.push_value(Value::String(s));
        }
        Op::ToPrimitive => {
            let v = frame.pop_value();
            let p = v.to_primitive(interp, Hint::Default)?;
            frame.push_value(p);
        }
        Op::Neg => {
            let n = frame.pop_value().to_number(interp)?;
            frame.push_value(Value::Number(-n));
        }
        Op::UnaryPlus => {
            let n = frame.pop_value().to_number(interp)?;
            frame.push_value(Value::Number(n));
        }
        Op::Inv => {
            let i = frame.pop_value().to_int32(interp)?;
            frame.push_value(Value::Number(f64::from(!i)));
        }
        Op::Not => {
            let b = frame.pop_value().to_boolean();
            frame.push_value(Value::Boolean(!b));
        }
        Op::Mul | Op::Div | Op::Mod | Op::Add | Op::Sub | Op::LShift | Op::RShift | Op::URShift | Op::BAnd | Op::BXor | Op::BOr => {
            let r = frame.pop_value();
            let l = frame.pop_value();
            let result = match op {
                Op::Mul => binary::mul(interp, l, r)?,
                Op::Div => binary::div(interp, l, r)?,
                Op::Mod => binary::rem(interp, l, r)?,
                Op::Add => binary::add(interp, l, r)?,
                Op::Sub => binary::sub(interp, l, r)?,
                Op::LShift => binary::lshift(interp, l, r)?,
                Op::RShift => binary::rshift(interp, l, r)?,
                Op::URShift => binary::urshift(interp, l, r)?,
                Op::BAnd => binary::band(interp, l, r)?,
                Op::BXor => binary::bxor(interp, l, r)?,
                Op::BOr => binary::bor(interp, l, r)?,
                _ => unreachable!(),
            };
            frame.push_value(result);
        }
        Op::Lt | Op::Gt | Op::Le | Op::Ge => {
            let r = frame.pop_value();
            let l = frame.pop_value();
            let result = match op {
                Op::Lt => binary::lt(interp, &l, &r)?,
                Op::Gt => binary::gt(interp, &l, &r)?,
                Op::Le => binary::le(interp, &l, &r)?,
                Op::Ge => binary::ge(interp, &l, &r)?,
                _ => unreachable!(),
            };
            frame.push_value(Value::Boolean(result));
        }
        Op::InstanceOf => {
            let r = frame.pop_value();
            let l = frame.pop_value();
            let result = binary::instance_of(interp, &l, &r)?;
            frame.push_value(Value::Boolean(result));
        }
        Op::In => {
            let r = frame.pop_value();
            let l = frame.pop_value();
            let result = binary::in_op(interp, &l, &r)?;
            frame.push_value(Value::Boolean(result));
        }
        Op::Eq => {
            let r = frame.pop_value();
            let l = frame.pop_value();
            let result = crate::value::abstract_equals(&l, &r, interp)?;
            frame.push_value(Value::Boolean(result));
        }
        Op::SEq => {
            let r = frame.pop_value();
            let l = frame.pop_value();
            frame.push_value(Value::Boolean(crate::value::strict_equals(&l, &r)));
        }
        Op::SEnum => {
            let v = frame.pop_value();
            let id = v.to_object(interp)?;
            let names = crate::object::enumerate(interp, id);
            frame.blocks.push(Block::Enum(names.into_iter()));
        }
        Op::SWith => {
            let v = frame.pop_value();
            let id = v.to_object(interp)?;
            let saved = frame.scope.clone();
            frame.scope = Some(scope::push(frame.scope.clone(), id));
            frame.blocks.push(Block::With(saved));
        }
        Op::New(n) => {
            let n = *n as usize;
            let mut args = Vec::with_capacity(n);
            for _ in 0..n {
                args.push(frame.pop_value());
            }
            args.reverse();
            let callee = frame.pop_value();
            let Some(id) = callee.as_object() else {
                return Err(interp.type_error("value is not a constructor"));
            };
            let name = callable_name(interp, id);
            interp.tracer.on_event(TraceEvent::Call { callee: &name, loc: &frame.loc() });
            let result = crate::object::construct(interp, id, &args)?;
            frame.push_value(result);
        }
        Op::Call(n) => {
            let n = *n as usize;
            let mut args = Vec::with_capacity(n);
            for _ in 0..n {
                args.push(frame.pop_value());
            }
            args.reverse();
            let callee = frame.pop_value();
            let this = frame.pop_value();
            let Some(id) = callee.as_object() else {
                return Err(interp.type_error("value is not callable"));
            };
            let name = callable_name(interp, id);
            interp.tracer.on_event(TraceEvent::Call { callee: &name, loc: &frame.loc() });
            let result = crate::object::call(interp, id, this, &args)?;
            frame.push_value(result);
        }
        Op::End(n) => {
            let target = frame.blocks.len().saturating_sub(*n as usize);
            return Ok(Step::Unwind { target, completion: Completion::Normal, resume_ip: frame.ip, normal_ip_override: None });
        }
        Op::BAlways(target) => {
            frame.ip = *target;
        }
        Op::BTrue(target) => {
            if frame.pop_value().to_boolean() {
                frame.ip = *target;
            }
        }
        Op::BEnum(target) => match frame.blocks.last_mut() {
            Some(Block::Enum(iter)) => match iter.next() {
                Some(name) => frame.push_value(Value::String(name)),
                None => frame.ip = *target,
            },
            _ => unreachable!("BEnum with no enumerator block on top"),
        },
        Op::STryC(target) => {
            let param = match frame.pop_value() {
                Value::String(s) => s,
                other => unreachable!("STryC's operand must be the catch parameter name, got {other:?}"),
            };
            frame.blocks.push(Block::TryC { handler: *target, param });
        }
        Op::STryF(target) => {
            frame.blocks.push(Block::TryF { handler: *target });
        }
        Op::EndFinally => {
            let (target, resume_ip, pending) = frame.pending_finally.pop().expect("EndFinally with no pending finally entry");
            return Ok(Step::Unwind { target, completion: pending, resume_ip, normal_ip_override: Some(resume_ip) });
        }
        Op::Func(idx) => {
            let template = frame.code.functions[*idx as usize].clone();
            let closure_scope = frame.scope.clone();
            let id = make_function_object(interp, template, closure_scope)?;
            frame.push_value(Value::Object(id));
        }
        Op::Literal(idx) => {
            frame.push_value(frame.code.literals[*idx as usize].clone());
        }
        Op::This => {
            frame.push_value(frame.this.clone());
        }
        Op::Loc(line) => {
            frame.current_line = *line;
            interp.tracer.on_event(TraceEvent::Statement { loc: &frame.loc() });
        }
        Op::Return => {
            let v = frame.pop_value();
            interp.tracer.on_event(TraceEvent::Return { loc: &frame.loc() });
            return Ok(Step::Unwind { target: 0, completion: Completion::Return(v), resume_ip: frame.ip, normal_ip_override: None });
        }
    }
    Ok(Step::Continue)
}

fn callable_name(interp: &Interpreter, id: HeapId) -> String {
    match &interp.heap.get(id).exotic {
        Exotic::Function(f, _) if f.name.is_empty() => "<anonymous>".to_string(),
        Exotic::Function(f, _) => f.name.to_string(),
        Exotic::Native(n) => n.name.to_string(),
        Exotic::Host(h) => h.class_name().to_string(),
        Exotic::None => "<not callable>".to_string(),
    }
}

/// Builds the callable object `Op::Func` pushes: a fresh `Function`-class
/// object closing over `scope`, with its own `prototype` object installed
/// (so `new` against it has somewhere to hang inherited properties) and the
/// `length`/`name` properties ECMA-262 §15.3.5 specifies for function
/// objects.
fn make_function_object(interp: &mut Interpreter, template: Rc<Function>, scope: Option<Scope>) -> RunResult<HeapId> {
    let func_proto = interp.function_prototype();
    let id = interp.heap.allocate(Obj::new(Some(func_proto))).map_err(RunError::from)?;
    let obj_proto = interp.object_prototype();
    let proto_obj = interp.heap.allocate(Obj::new(Some(obj_proto))).map_err(RunError::from)?;
    crate::object::put(interp, proto_obj, STATIC_ATOMS.constructor.clone(), Value::Object(id), Some(PropertyAttributes::DONT_ENUM))?;

    let length = template.params.len();
    let name = template.name.clone();
    interp.heap.get_mut(id).exotic = Exotic::Function(template, scope);
    crate::object::put(
        interp,
        id,
        STATIC_ATOMS.prototype.clone(),
        Value::Object(proto_obj),
        Some(PropertyAttributes::DONT_ENUM | PropertyAttributes::DONT_DELETE),
    )?;
    crate::object::put(
        interp,
        id,
        STATIC_ATOMS.length.clone(),
        Value::Number(length as f64),
        Some(PropertyAttributes::DONT_ENUM | PropertyAttributes::DONT_DELETE | PropertyAttributes::READ_ONLY),
    )?;
    crate::object::put(
        interp,
        id,
        STATIC_ATOMS.name.clone(),
        Value::String(name),
        Some(PropertyAttributes::DONT_ENUM | PropertyAttributes::DONT_DELETE | PropertyAttributes::READ_ONLY),
    )?;
    Ok(id)
}

/// Pre-declares hoisted `var`/function-statement names as `undefined` on
/// `var_obj` (ed.3 §10.1.3 Variable Instantiation), skipping any name that
/// already has an *own* property there -- a parameter of the same name, or
/// (processed earlier in the same pass) an argument/var with an explicit
/// value must not be clobbered back to `undefined`.
fn instantiate_vars(interp: &mut Interpreter, var_obj: HeapId, names: &[Atom], attrs: PropertyAttributes) -> RunResult<()> {
    for name in names {
        if !interp.heap.get(var_obj).properties.contains_key(name) {
            crate::object::put(interp, var_obj, name.clone(), Value::Undefined, Some(attrs))?;
        }
    }
    Ok(())
}

/// Builds the `arguments` object ed.3 §10.1.8 installs in every function
/// activation: own, enumerable, writable index properties plus a
/// non-enumerable `length`. `callee`/JS1.1 `arguments.callee` is gated
/// behind `CompatFlags::JS11` per spec §6's compatibility-switch design,
/// and is not installed here -- the core default is the plain ed.3 shape.
fn build_arguments_object(interp: &mut Interpreter, args: &[Value]) -> RunResult<HeapId> {
    let proto = interp.object_prototype();
    let id = interp.heap.allocate(Obj::new(Some(proto))).map_err(RunError::from)?;
    for (i, v) in args.iter().enumerate() {
        let key = Atom::new(i.to_string());
        crate::object::put(interp, id, key, v.clone(), Some(PropertyAttributes::empty()))?;
    }
    crate::object::put(interp, id, STATIC_ATOMS.length.clone(), Value::Number(args.len() as f64), Some(PropertyAttributes::DONT_ENUM))?;
    Ok(id)
}

/// Runs a top-level program (or `eval` code) in an explicit execution
/// context, spec.md §6 `global_eval`'s two-phase entry point. Falling off
/// the end without an explicit statement yields the last expression
/// statement's value (`SETC`/`GETC`'s completion register), matching
/// `eval`'s completion-value semantics; an inner `Op::Return` is a
/// `SyntaxError` the parser rejects before compilation ever reaches here.
pub fn run_program(interp: &mut Interpreter, code: &Code, ctx: ExecutionContext) -> RunResult<Value> {
    interp.with_call_depth(|interp| {
        instantiate_vars(interp, ctx.variable_object, &code.var_names, ctx.var_attrs)?;
        let mut frame = Frame::new(code, ctx.scope, ctx.this_value);
        match run_frame(interp, &mut frame)? {
            FrameExit::Return(v) => Ok(v),
            FrameExit::FellOff => Ok(frame.completion_register.clone()),
        }
    })
}

/// Invokes an interpreted function's `[[Call]]`, building a fresh
/// activation object (parameters, hoisted `var`s, `arguments`) per ed.3
/// §10.1.3/§10.1.8, then running its body. `scope` is the closure's
/// captured scope chain (`None` for [`crate::interp::Interpreter::eval_function_body`]'s direct
/// invocation of a standalone-compiled function).
pub fn call_function(interp: &mut Interpreter, func: &Rc<Function>, scope: Option<Scope>, this: Value, args: &[Value]) -> RunResult<Value> {
    interp.with_call_depth(|interp| {
        let var_obj = interp.heap.allocate(Obj::new(Some(interp.object_prototype()))).map_err(RunError::from)?;
        for (i, param) in func.params.iter().enumerate() {
            let v = args.get(i).cloned().unwrap_or(Value::Undefined);
            crate::object::put(interp, var_obj, param.clone(), v, Some(PropertyAttributes::DONT_DELETE))?;
        }
        instantiate_vars(interp, var_obj, &func.var_names, PropertyAttributes::DONT_DELETE)?;
        let arguments = build_arguments_object(interp, args)?;
        crate::object::put(interp, var_obj, STATIC_ATOMS.arguments.clone(), Value::Object(arguments), Some(PropertyAttributes::DONT_DELETE))?;

        let call_scope = scope::push(scope, var_obj);
        let mut frame = Frame::new(&func.code, Some(call_scope), this);
        match run_frame(interp, &mut frame)? {
            FrameExit::Return(v) => Ok(v),
            FrameExit::FellOff => Ok(Value::Undefined),
        }
    })
}
