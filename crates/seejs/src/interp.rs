//! The interpreter: the one piece of state every other module threads
//! through. Bundles the heap, the per-interpreter interner, the resource
//! tracker (owned by the heap), the trace hook, compatibility flags, the
//! regex engine registry, and the well-known objects (global object, the
//! seven error prototypes) installed once at construction.
//!
//! Grounded in the teacher's top-level `Db`/session object, which plays the
//! same "one struct everything borrows" role for a running interpreter.

use std::rc::Rc;

use crate::{
    bytecode::Code,
    exception::{ExcType, RunError, RunResult},
    heap::{Heap, Obj, PropertyAttributes},
    heap::HeapId,
    host::CompatFlags,
    intern::{Atom, Interner, STATIC_ATOMS},
    regex::RegexRegistry,
    resource::ResourceTracker,
    scope::ExecutionContext,
    tracer::VmTracer,
    value::Value,
};

/// The well-known objects every interpreter bootstraps before running any
/// script, so error construction never needs to re-look them up by name.
struct Globals {
    global_object: HeapId,
    object_prototype: HeapId,
    function_prototype: HeapId,
    error_prototypes: [HeapId; 7],
}

pub struct Interpreter {
    pub heap: Heap,
    pub interner: Interner,
    pub tracer: Box<dyn VmTracer>,
    pub compat: CompatFlags,
    pub regex: RegexRegistry,
    globals: Globals,
    call_depth: usize,
}

fn exc_index(kind: ExcType) -> usize {
    match kind {
        ExcType::Error => 0,
        ExcType::EvalError => 1,
        ExcType::RangeError => 2,
        ExcType::ReferenceError => 3,
        ExcType::SyntaxError => 4,
        ExcType::TypeError => 5,
        ExcType::UriError => 6,
    }
}

impl Interpreter {
    /// Builds an interpreter with a fresh heap and global object, running
    /// the bootstrap that installs `Object.prototype`, `Function.prototype`,
    /// and the seven error prototypes the engine itself throws against.
    pub fn new(tracker: Box<dyn ResourceTracker>, tracer: Box<dyn VmTracer>) -> Self {
        let mut heap = Heap::new(tracker);
        let object_prototype = heap.allocate(Obj::new(None)).expect("bootstrap allocation");
        let function_prototype = heap.allocate(Obj::new(Some(object_prototype))).expect("bootstrap allocation");
        let global_object = heap.allocate(Obj::new(Some(object_prototype))).expect("bootstrap allocation");

        let mut error_prototypes = [HeapId::from_index(0); 7];
        for (i, kind) in [
            ExcType::Error,
            ExcType::EvalError,
            ExcType::RangeError,
            ExcType::ReferenceError,
            ExcType::SyntaxError,
            ExcType::TypeError,
            ExcType::UriError,
        ]
        .into_iter()
        .enumerate()
        {
            let proto = heap.allocate(Obj::new(Some(object_prototype))).expect("bootstrap allocation");
            heap.get_mut(proto).properties.insert(
                STATIC_ATOMS.name.clone(),
                crate::heap::Property::new(Value::String(Atom::new(kind.name())), PropertyAttributes::DONT_ENUM),
            );
            heap.get_mut(proto).properties.insert(
                STATIC_ATOMS.message.clone(),
                crate::heap::Property::new(Value::String(STATIC_ATOMS.empty.clone()), PropertyAttributes::DONT_ENUM),
            );
            error_prototypes[i] = proto;
        }

        let mut interp = Self {
            heap,
            interner: Interner::new(),
            tracer,
            compat: CompatFlags::empty(),
            regex: RegexRegistry::with_defaults(),
            globals: Globals { global_object, object_prototype, function_prototype, error_prototypes },
            call_depth: 0,
        };
        interp.install_global_this();
        interp
    }

    fn install_global_this(&mut self) {
        let global = self.globals.global_object;
        let _ = crate::object::put(self, global, STATIC_ATOMS.this.clone(), Value::Object(global), Some(PropertyAttributes::DONT_ENUM | PropertyAttributes::DONT_DELETE));
    }

    /// Installs a native function under `name` on the global object, for a
    /// host that wants to hand the engine a callback (spec §6's "host
    /// function" capability) without going through a whole `HostObject`
    /// impl -- the `print`-only global `seejs-cli` registers is the
    /// intended caller.
    pub fn install_global_function(
        &mut self,
        name: &str,
        length: u32,
        call: impl Fn(&mut Self, Value, &[Value]) -> RunResult<Value> + 'static,
    ) -> RunResult<HeapId> {
        let name_atom = Atom::new(name);
        let proto = self.globals.function_prototype;
        let id = self.heap.allocate(Obj::new(Some(proto))).map_err(RunError::from)?;
        self.heap.get_mut(id).exotic = crate::heap::Exotic::Native(crate::heap::NativeFn {
            name: name_atom.clone(),
            length,
            call: Some(Rc::new(call)),
            construct: None,
        });
        let global = self.globals.global_object;
        crate::object::put(self, global, name_atom, Value::Object(id), Some(PropertyAttributes::DONT_ENUM))?;
        Ok(id)
    }

    pub fn global_object(&self) -> HeapId {
        self.globals.global_object
    }

    pub fn object_prototype(&self) -> HeapId {
        self.globals.object_prototype
    }

    pub fn function_prototype(&self) -> HeapId {
        self.globals.function_prototype
    }

    pub fn global_context(&self) -> ExecutionContext {
        ExecutionContext::global(self.globals.global_object)
    }

    /// Allocates a fresh `Error`-family instance of `kind` with the given
    /// message, linked to its prototype (spec §7: "each constructible as a
    /// host-visible `Object` with a `message` property").
    pub fn make_error(&mut self, kind: ExcType, message: impl Into<String>) -> Value {
        let proto = self.globals.error_prototypes[exc_index(kind)];
        let id = match self.heap.allocate(Obj::new(Some(proto))) {
            Ok(id) => id,
            Err(_) => return Value::String(Atom::new(message.into())),
        };
        let msg_atom = Atom::new(message.into());
        self.heap
            .get_mut(id)
            .properties
            .insert(STATIC_ATOMS.message.clone(), crate::heap::Property::new(Value::String(msg_atom), PropertyAttributes::DONT_ENUM));
        Value::Object(id)
    }

    fn throw_kind(&mut self, kind: ExcType, message: impl Into<String>) -> RunError {
        let value = self.make_error(kind, message);
        RunError::throw(value)
    }

    pub fn type_error(&mut self, message: impl Into<String>) -> RunError {
        self.throw_kind(ExcType::TypeError, message)
    }
    pub fn range_error(&mut self, message: impl Into<String>) -> RunError {
        self.throw_kind(ExcType::RangeError, message)
    }
    pub fn reference_error(&mut self, message: impl Into<String>) -> RunError {
        self.throw_kind(ExcType::ReferenceError, message)
    }
    pub fn syntax_error(&mut self, message: impl Into<String>) -> RunError {
        self.throw_kind(ExcType::SyntaxError, message)
    }
    pub fn eval_error(&mut self, message: impl Into<String>) -> RunError {
        self.throw_kind(ExcType::EvalError, message)
    }
    pub fn uri_error(&mut self, message: impl Into<String>) -> RunError {
        self.throw_kind(ExcType::UriError, message)
    }
    pub fn error(&mut self, message: impl Into<String>) -> RunError {
        self.throw_kind(ExcType::Error, message)
    }

    /// `ToObject` on a primitive (spec.md §3 "Value"/§9): wraps it in a
    /// plain object whose single internal `[[PrimitiveValue]]`-equivalent
    /// is the primitive itself, exposed as a non-enumerable own property,
    /// since no `Boolean`/`Number`/`String` wrapper library is in scope.
    pub fn box_primitive(&mut self, value: Value) -> RunResult<HeapId> {
        let proto = self.globals.object_prototype;
        let id = self.heap.allocate(Obj::new(Some(proto))).map_err(RunError::from)?;
        self.heap.get_mut(id).properties.insert(
            STATIC_ATOMS.value_of.clone(),
            crate::heap::Property::new(value, PropertyAttributes::DONT_ENUM | PropertyAttributes::INTERNAL),
        );
        Ok(id)
    }

    /// Checks and charges one level of call-stack recursion for the
    /// duration of `f`, restoring the depth counter afterward even on
    /// early return (spec §5's recursion-depth resource check).
    pub fn with_call_depth<T>(&mut self, f: impl FnOnce(&mut Self) -> RunResult<T>) -> RunResult<T> {
        self.heap.check_recursion(self.call_depth).map_err(RunError::from)?;
        self.call_depth += 1;
        let result = f(self);
        self.call_depth -= 1;
        result
    }

    /// Parses and compiles a top-level program, per spec.md §6's two-phase
    /// `parse_program` entry point.
    pub fn parse_program(&mut self, source: &str, filename: &str) -> Result<Code, crate::exception::Exception> {
        crate::bytecode::compiler::compile_program(self, source, filename).map_err(Into::into)
    }

    /// Compiles and runs a top-level program in the global execution
    /// context in one step (spec.md §6 `global_eval`).
    pub fn global_eval(&mut self, source: &str, filename: &str) -> Result<Value, crate::exception::Exception> {
        let code = self.parse_program(source, filename)?;
        let ctx = self.global_context();
        crate::bytecode::vm::run_program(self, &code, ctx).map_err(Into::into)
    }

    /// Compiles a standalone function body, as `Function(...)` or a host
    /// embedding a callback source string would (spec.md §6
    /// `parse_function`).
    pub fn parse_function(&mut self, name: &str, params: &[&str], body: &str, filename: &str) -> Result<Rc<crate::function::Function>, crate::exception::Exception> {
        crate::bytecode::compiler::compile_function(self, name, params, body, filename).map_err(Into::into)
    }

    /// Runs an already-parsed/compiled function body directly against an
    /// explicit `this`/argument list without going through `[[Call]]`
    /// property lookup -- the direct-invocation half of `eval_function_body`
    /// named in spec.md §6.
    pub fn eval_function_body(&mut self, func: &Rc<crate::function::Function>, this: Value, args: &[Value]) -> RunResult<Value> {
        crate::bytecode::vm::call_function(self, func, None, this, args)
    }
}
