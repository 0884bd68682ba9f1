//! The scope chain and execution context (spec §3 "Scope", §4.3).

use std::rc::Rc;

use crate::{
    heap::{HeapId, PropertyAttributes},
    intern::Atom,
    interp::Interpreter,
};

/// One link of the scope chain: an object plus the parent link. Shared via
/// `Rc` so closures can cheaply capture "the scope chain at this point" by
/// cloning the `Rc`, without copying the chain itself.
#[derive(Debug)]
pub struct ScopeNode {
    pub object: HeapId,
    pub parent: Option<Scope>,
}

pub type Scope = Rc<ScopeNode>;

pub fn push(parent: Option<Scope>, object: HeapId) -> Scope {
    Rc::new(ScopeNode { object, parent })
}

/// A binding produced by scope/property lookup: `(base, name)`, or an
/// absent base when no step in the chain (or the lone object being probed)
/// has the property. Consumers decide whether an absent base is a
/// `ReferenceError` (GETVALUE/PUTVALUE/DELETE/TYPEOF's "fetch" path) or
/// merely "undefined" (`typeof` on an unresolved reference).
#[derive(Debug, Clone)]
pub enum Reference {
    Unresolved { name: Atom },
    Property { base: HeapId, name: Atom },
}

impl Reference {
    pub fn name(&self) -> &Atom {
        match self {
            Self::Unresolved { name } | Self::Property { name, .. } => name,
        }
    }
}

/// `SEE_scope_lookup`: walk the chain, returning the first step whose
/// object `HasProperty(name)`, or an unresolved reference if none do.
pub fn scope_lookup(interp: &Interpreter, scope: &Option<Scope>, name: &Atom) -> Reference {
    let mut node = scope.clone();
    while let Some(n) = node {
        if crate::object::has_property(interp, n.object, name) {
            return Reference::Property { base: n.object, name: name.clone() };
        }
        node = n.parent.clone();
    }
    Reference::Unresolved { name: name.clone() }
}

/// The execution context: interpreter-visible state that lexical lookups
/// and `this` observe. One is active per call (including the top-level
/// program and each re-entrant `eval`).
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// The object new `var`/function declarations are installed on.
    pub variable_object: HeapId,
    /// Attribute mask applied to variables created in this context (global
    /// `var`s are deletable in non-strict "eval" contexts, function-local
    /// ones are `DontDelete`; both are always `DontEnum`-free, matching
    /// ed.3 §10.1.3).
    pub var_attrs: PropertyAttributes,
    pub this_value: crate::value::Value,
    pub scope: Option<Scope>,
}

impl ExecutionContext {
    /// Top-level program code: declarations get `DontDelete` (ed.3
    /// §10.2.1). A direct `eval` reuses the caller's context instead of
    /// this constructor, per Open Question 2 in SPEC_FULL.md.
    pub fn global(global_object: HeapId) -> Self {
        Self {
            variable_object: global_object,
            var_attrs: PropertyAttributes::DONT_DELETE,
            this_value: crate::value::Value::Object(global_object),
            scope: Some(push(None, global_object)),
        }
    }

    /// Indirect (non-direct) `eval` code: a fresh context against the
    /// global object whose declarations *are* deletable (ed.3 §10.2.1,
    /// "eval code"), unlike top-level program code.
    pub fn global_eval(global_object: HeapId) -> Self {
        Self {
            variable_object: global_object,
            var_attrs: PropertyAttributes::empty(),
            this_value: crate::value::Value::Object(global_object),
            scope: Some(push(None, global_object)),
        }
    }
}
