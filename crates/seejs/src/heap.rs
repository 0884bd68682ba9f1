//! The object arena.
//!
//! Objects have indefinite lifetime managed by "the collector" per the
//! spec, but the collector itself is out of scope -- specified purely as
//! an allocation contract (see [`crate::resource`]). This module is that
//! contract's concrete shape: a flat arena of [`Obj`]s addressed by
//! [`HeapId`], so the scope chain and closures can hold plain indices
//! instead of cyclic `Rc` graphs (the same rationale the teacher's
//! `namespace` module gives for indices-into-an-arena over raw pointers).

use std::fmt;

use indexmap::IndexMap;

use crate::{
    function::Function,
    intern::Atom,
    resource::{ResourceError, ResourceTracker},
    value::Value,
};

/// Index of an object in the heap arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct HeapId(u32);

impl HeapId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).expect("heap arena overflow"))
    }
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// `ReadOnly`/`DontEnum`/`DontDelete`/`Internal` attribute bits, gating
    /// `Put`/enumeration/`Delete` per spec §3 and §8.6.2.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct PropertyAttributes: u8 {
        const READ_ONLY   = 0b0001;
        const DONT_ENUM   = 0b0010;
        const DONT_DELETE = 0b0100;
        const INTERNAL    = 0b1000;
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Property {
    pub value: Value,
    pub attrs: PropertyAttributes,
}

impl Property {
    pub fn new(value: Value, attrs: PropertyAttributes) -> Self {
        Self { value, attrs }
    }
}

/// A callable registered directly by the host, as opposed to an
/// interpreted [`Function`].
pub struct NativeFn {
    pub name: Atom,
    pub length: u32,
    #[allow(clippy::type_complexity)]
    pub call: Option<std::rc::Rc<dyn Fn(&mut crate::interp::Interpreter, Value, &[Value]) -> crate::exception::RunResult<Value>>>,
    #[allow(clippy::type_complexity)]
    pub construct: Option<std::rc::Rc<dyn Fn(&mut crate::interp::Interpreter, &[Value]) -> crate::exception::RunResult<Value>>>,
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .field("call", &self.call.is_some())
            .field("construct", &self.construct.is_some())
            .finish()
    }
}

/// Host-supplied override of the native object algorithms.
///
/// Every method defaults to "not overridden" (`None`), in which case the
/// caller falls back to the native property-map algorithm. This is the
/// "optional host-data pointer" and per-class internal state the spec
/// describes: a host object class implements only the methods whose
/// behaviour differs from a plain object.
pub trait HostObject: fmt::Debug {
    fn class_name(&self) -> &'static str {
        "Object"
    }
    fn get(&self, _interp: &mut crate::interp::Interpreter, _key: &Atom) -> Option<crate::exception::RunResult<Value>> {
        None
    }
    fn put(
        &mut self,
        _interp: &mut crate::interp::Interpreter,
        _key: &Atom,
        _value: Value,
        _attrs: PropertyAttributes,
    ) -> Option<crate::exception::RunResult<()>> {
        None
    }
    fn has_property(&self, _key: &Atom) -> Option<bool> {
        None
    }
    fn delete(&mut self, _key: &Atom) -> Option<bool> {
        None
    }
    fn own_keys(&self) -> Option<Vec<Atom>> {
        None
    }
    fn call(
        &self,
        _interp: &mut crate::interp::Interpreter,
        _this: Value,
        _args: &[Value],
    ) -> Option<crate::exception::RunResult<Value>> {
        None
    }
    fn construct(&self, _interp: &mut crate::interp::Interpreter, _args: &[Value]) -> Option<crate::exception::RunResult<Value>> {
        None
    }
    fn has_instance(&self, _interp: &mut crate::interp::Interpreter, _v: &Value) -> Option<crate::exception::RunResult<bool>> {
        None
    }
}

/// What makes an object more than a plain property bag.
pub enum Exotic {
    None,
    /// An interpreted function: compiled body plus the scope it closes over.
    Function(std::rc::Rc<Function>, Option<crate::scope::Scope>),
    Native(NativeFn),
    Host(Box<dyn HostObject>),
}

impl fmt::Debug for Exotic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Function(func, _) => write!(f, "Function({})", func.name),
            Self::Native(n) => write!(f, "Native({n:?})"),
            Self::Host(h) => write!(f, "Host({})", h.class_name()),
        }
    }
}

/// A polymorphic object: prototype link, property map, and an [`Exotic`]
/// slot carrying whatever additional behaviour/state its class needs.
#[derive(Debug)]
pub struct Obj {
    pub prototype: Option<HeapId>,
    pub extensible: bool,
    pub properties: IndexMap<Atom, Property>,
    pub exotic: Exotic,
}

impl Obj {
    pub fn new(prototype: Option<HeapId>) -> Self {
        Self { prototype, extensible: true, properties: IndexMap::new(), exotic: Exotic::None }
    }

    pub fn class_name(&self) -> &'static str {
        match &self.exotic {
            Exotic::None => "Object",
            Exotic::Function(..) | Exotic::Native(_) => "Function",
            Exotic::Host(h) => h.class_name(),
        }
    }

    pub fn is_callable(&self) -> bool {
        match &self.exotic {
            Exotic::Function(..) => true,
            Exotic::Native(n) => n.call.is_some(),
            Exotic::Host(_) => true, // host decides at call time; has_call_hook below is the precise test
            Exotic::None => false,
        }
    }

    pub fn is_constructor(&self) -> bool {
        match &self.exotic {
            Exotic::Function(..) => true,
            Exotic::Native(n) => n.construct.is_some(),
            Exotic::Host(_) => true,
            Exotic::None => false,
        }
    }
}

/// The object arena plus the resource tracker gating its growth.
pub struct Heap {
    objects: Vec<Obj>,
    tracker: Box<dyn ResourceTracker>,
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap").field("objects", &self.objects.len()).finish()
    }
}

const OBJ_SIZE_ESTIMATE: usize = 128;

impl Heap {
    pub fn new(tracker: Box<dyn ResourceTracker>) -> Self {
        Self { objects: Vec::new(), tracker }
    }

    pub fn tracker_mut(&mut self) -> &mut dyn ResourceTracker {
        self.tracker.as_mut()
    }

    pub fn allocate(&mut self, obj: Obj) -> Result<HeapId, ResourceError> {
        self.tracker.on_allocate(OBJ_SIZE_ESTIMATE)?;
        let id = HeapId::from_index(self.objects.len());
        self.objects.push(obj);
        Ok(id)
    }

    pub fn get(&self, id: HeapId) -> &Obj {
        &self.objects[id.index()]
    }

    pub fn get_mut(&mut self, id: HeapId) -> &mut Obj {
        &mut self.objects[id.index()]
    }

    pub fn check_recursion(&self, depth: usize) -> Result<(), ResourceError> {
        self.tracker.check_recursion_depth(depth)
    }

    pub fn tick(&mut self) -> Result<(), ResourceError> {
        self.tracker.on_tick()
    }
}
