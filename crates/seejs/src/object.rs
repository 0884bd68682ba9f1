//! The object "class vtable": `Get`/`Put`/`CanPut`/`HasProperty`/`Delete`/
//! `DefaultValue`/`Enumerator`/`Call`/`Construct`/`HasInstance` (spec §3,
//! §4.2, §8.6.2). Implemented as free functions over `(Interpreter,
//! HeapId)` rather than methods on a trait object living inside the arena
//! -- the arena owns every object in one `Vec`, so a method needing `&self`
//! plus `&mut Heap` to walk the prototype chain would alias; the teacher's
//! `namespace`/`heap` modules take the same indices-not-self-methods shape
//! for the same reason.

use crate::{
    exception::{RunError, RunResult},
    heap::{Exotic, HeapId, Property, PropertyAttributes},
    intern::Atom,
    interp::Interpreter,
    value::{Hint, Value},
};

pub fn get(interp: &mut Interpreter, id: HeapId, key: &Atom) -> RunResult<Value> {
    if let Some(result) = try_host_get(interp, id, key) {
        return result;
    }
    let mut cur = Some(id);
    while let Some(obj_id) = cur {
        let obj = interp.heap.get(obj_id);
        if let Some(prop) = obj.properties.get(key) {
            return Ok(prop.value.clone());
        }
        cur = obj.prototype;
    }
    Ok(Value::Undefined)
}

fn try_host_get(interp: &mut Interpreter, id: HeapId, key: &Atom) -> Option<RunResult<Value>> {
    // Re-checking the exotic kind requires a short-lived immutable borrow;
    // `HostObject::get` itself takes `&mut Interpreter`, so the override
    // closure is invoked through a temporary raw pointer to the boxed
    // trait object, which outlives the immutable borrow because `Obj`'s
    // `properties`/`prototype` fields are not touched by the override.
    let host_ptr: *const dyn crate::heap::HostObject = match &interp.heap.get(id).exotic {
        Exotic::Host(h) => h.as_ref(),
        _ => return None,
    };
    // SAFETY: the trait object lives inside the heap arena, which is not
    // reallocated by `HostObject::get` (hosts only ever mutate via the
    // `&mut Interpreter` they are given, never by resizing the arena's
    // backing `Vec` out from under an in-flight call... existing entries
    // keep a stable address because `Heap::allocate` only pushes).
    let host = unsafe { &*host_ptr };
    host.get(interp, key)
}

pub fn has_property(interp: &Interpreter, id: HeapId, key: &Atom) -> bool {
    if let Exotic::Host(host) = &interp.heap.get(id).exotic {
        if let Some(b) = host.has_property(key) {
            return b;
        }
    }
    let mut cur = Some(id);
    while let Some(obj_id) = cur {
        let obj = interp.heap.get(obj_id);
        if obj.properties.contains_key(key) {
            return true;
        }
        cur = obj.prototype;
    }
    false
}

pub fn can_put(interp: &Interpreter, id: HeapId, key: &Atom) -> bool {
    let mut cur = Some(id);
    while let Some(obj_id) = cur {
        let obj = interp.heap.get(obj_id);
        if let Some(prop) = obj.properties.get(key) {
            return !prop.attrs.contains(PropertyAttributes::READ_ONLY);
        }
        cur = obj.prototype;
    }
    interp.heap.get(id).extensible
}

/// `Put(value, attr)`: ECMA-262 §8.6.2.2, with the attribute-attaching
/// extension the VM's `PUTVALUE(attr)` opcode uses for variable
/// declaration (spec §4.6 "Names").
pub fn put(interp: &mut Interpreter, id: HeapId, key: Atom, value: Value, attrs: Option<PropertyAttributes>) -> RunResult<()> {
    {
        let host_ptr: Option<*mut dyn crate::heap::HostObject> = match &mut interp.heap.get_mut(id).exotic {
            Exotic::Host(h) => Some(h.as_mut()),
            _ => None,
        };
        if let Some(ptr) = host_ptr {
            // SAFETY: see `try_host_get`; the arena slot is stable across
            // this call because hosts mutate only through `interp`.
            let host = unsafe { &mut *ptr };
            if let Some(result) = host.put(interp, &key, value.clone(), attrs.unwrap_or(PropertyAttributes::empty())) {
                return result;
            }
        }
    }
    if !can_put(interp, id, &key) {
        return Ok(());
    }
    let obj = interp.heap.get_mut(id);
    match obj.properties.get_mut(&key) {
        Some(prop) => {
            prop.value = value;
            if let Some(a) = attrs {
                prop.attrs = a;
            }
        }
        None => {
            obj.properties.insert(key, Property::new(value, attrs.unwrap_or(PropertyAttributes::empty())));
        }
    }
    Ok(())
}

/// `Delete`: ECMA-262 §8.6.2.5. Returns whether the property is gone
/// (or never existed) after the call.
pub fn delete(interp: &mut Interpreter, id: HeapId, key: &Atom) -> bool {
    {
        let host_ptr: Option<*mut dyn crate::heap::HostObject> = match &mut interp.heap.get_mut(id).exotic {
            Exotic::Host(h) => Some(h.as_mut()),
            _ => None,
        };
        if let Some(ptr) = host_ptr {
            let host = unsafe { &mut *ptr };
            if let Some(b) = host.delete(key) {
                return b;
            }
        }
    }
    let obj = interp.heap.get_mut(id);
    match obj.properties.get(key) {
        None => true,
        Some(p) if p.attrs.contains(PropertyAttributes::DONT_DELETE) => false,
        Some(_) => {
            obj.properties.shift_remove(key);
            true
        }
    }
}

/// `DefaultValue(hint)`: ECMA-262 §8.6.2.6. Hint `String` tries `toString`
/// then `valueOf`; every other hint (including `Default`) tries `valueOf`
/// then `toString`. The source's `Date`-specific reversed default is out of
/// scope (Date itself is an excluded library type, spec §1).
pub fn default_value(interp: &mut Interpreter, id: HeapId, hint: Hint) -> RunResult<Value> {
    let methods: [&Atom; 2] = match hint {
        Hint::String => [&crate::intern::STATIC_ATOMS.to_string, &crate::intern::STATIC_ATOMS.value_of],
        Hint::Number | Hint::Default => [&crate::intern::STATIC_ATOMS.value_of, &crate::intern::STATIC_ATOMS.to_string],
    };
    for method in methods {
        let f = get(interp, id, method)?;
        if let Value::Object(fid) = f {
            if interp.heap.get(fid).is_callable() {
                let result = crate::object::call(interp, fid, Value::Object(id), &[])?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }
    }
    Err(interp.type_error("cannot convert object to primitive value"))
}

/// Snapshot of enumerable own + inherited property names at `S_ENUM` time,
/// ECMA-262 §12.6.4 `for-in` semantics: each name appears once, own
/// properties shadow inherited ones of the same name.
pub fn enumerate(interp: &Interpreter, id: HeapId) -> Vec<Atom> {
    let mut seen = hashbrown::HashSet::new();
    let mut names = Vec::new();
    let mut cur = Some(id);
    while let Some(obj_id) = cur {
        let obj = interp.heap.get(obj_id);
        if let Exotic::Host(host) = &obj.exotic {
            if let Some(keys) = host.own_keys() {
                for k in keys {
                    if seen.insert(k.clone()) {
                        names.push(k);
                    }
                }
            }
        }
        for (k, prop) in &obj.properties {
            if !prop.attrs.contains(PropertyAttributes::DONT_ENUM) && seen.insert(k.clone()) {
                names.push(k.clone());
            } else {
                seen.insert(k.clone());
            }
        }
        cur = obj.prototype;
    }
    names
}

/// `[[Call]]`, presence of which distinguishes callables.
pub fn call(interp: &mut Interpreter, id: HeapId, this: Value, args: &[Value]) -> RunResult<Value> {
    let exotic_kind = {
        let obj = interp.heap.get(id);
        match &obj.exotic {
            Exotic::Function(func, scope) => Some((func.clone(), scope.clone())),
            _ => None,
        }
    };
    if let Some((func, scope)) = exotic_kind {
        return crate::bytecode::vm::call_function(interp, &func, scope, this, args);
    }
    let native = {
        let obj = interp.heap.get(id);
        match &obj.exotic {
            Exotic::Native(n) => n.call.clone(),
            _ => None,
        }
    };
    if let Some(native) = native {
        return native(interp, this, args);
    }
    let host_ptr: Option<*const dyn crate::heap::HostObject> = match &interp.heap.get(id).exotic {
        Exotic::Host(h) => Some(h.as_ref()),
        _ => None,
    };
    if let Some(ptr) = host_ptr {
        let host = unsafe { &*ptr };
        if let Some(result) = host.call(interp, this, args) {
            return result;
        }
    }
    Err(interp.type_error("value is not callable"))
}

/// `[[Construct]]`, ECMA-262 §13.2.2. Builds a fresh object whose
/// prototype is the constructor's own `prototype` property (or `None` if
/// that property isn't itself an object), invokes the constructor with
/// `this` bound to it, and uses the constructor's return value instead
/// when it returned an object.
pub fn construct(interp: &mut Interpreter, id: HeapId, args: &[Value]) -> RunResult<Value> {
    let exotic_kind = {
        let obj = interp.heap.get(id);
        match &obj.exotic {
            Exotic::Function(func, scope) => Some((func.clone(), scope.clone())),
            _ => None,
        }
    };
    if let Some((func, scope)) = exotic_kind {
        let proto_val = get(interp, id, &crate::intern::STATIC_ATOMS.prototype)?;
        let proto = proto_val.as_object();
        let new_id = interp.heap.allocate(crate::heap::Obj::new(proto)).map_err(RunError::from)?;
        let result = crate::bytecode::vm::call_function(interp, &func, scope, Value::Object(new_id), args)?;
        return Ok(if result.is_object() { result } else { Value::Object(new_id) });
    }
    let native = {
        let obj = interp.heap.get(id);
        match &obj.exotic {
            Exotic::Native(n) => n.construct.clone(),
            _ => None,
        }
    };
    if let Some(native) = native {
        return native(interp, args);
    }
    let host_ptr: Option<*const dyn crate::heap::HostObject> = match &interp.heap.get(id).exotic {
        Exotic::Host(h) => Some(h.as_ref()),
        _ => None,
    };
    if let Some(ptr) = host_ptr {
        let host = unsafe { &*ptr };
        if let Some(result) = host.construct(interp, args) {
            return result;
        }
    }
    Err(interp.type_error("value is not a constructor"))
}

/// `[[HasInstance]]`, ECMA-262 §15.3.5.3 (`instanceof` on ordinary
/// functions): walk `v`'s prototype chain looking for `f.prototype`.
pub fn has_instance(interp: &mut Interpreter, f: HeapId, v: &Value) -> RunResult<bool> {
    if !interp.heap.get(f).is_constructor() {
        return Err(interp.type_error("right-hand side of 'instanceof' is not callable"));
    }
    let Value::Object(mut cur) = v.clone() else {
        return Ok(false);
    };
    let proto_val = get(interp, f, &crate::intern::STATIC_ATOMS.prototype)?;
    let Value::Object(target_proto) = proto_val else {
        return Err(interp.type_error("'prototype' property is not an object"));
    };
    loop {
        match interp.heap.get(cur).prototype {
            None => return Ok(false),
            Some(p) => {
                if p == target_proto {
                    return Ok(true);
                }
                cur = p;
            }
        }
    }
}

/// Writes (or rejects) an assignment to `__proto__` under the
/// compatibility flag described in spec §4.2, rejecting cycles by walking
/// the *proposed* prototype's chain. Resolves Open Question 1 from
/// SPEC_FULL.md in favor of checking any object's chain generically
/// (not only default-native objects, as the source's `JOINED`-equivalence
/// check effectively limited itself to).
pub fn set_proto(interp: &mut Interpreter, id: HeapId, new_proto: Option<HeapId>) -> RunResult<()> {
    if let Some(mut cur) = new_proto {
        loop {
            if cur == id {
                return Err(interp.type_error("cyclic __proto__ value"));
            }
            match interp.heap.get(cur).prototype {
                Some(p) => cur = p,
                None => break,
            }
        }
    }
    interp.heap.get_mut(id).prototype = new_proto;
    Ok(())
}
