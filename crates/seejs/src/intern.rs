//! Interned, immutable strings.
//!
//! An [`Atom`] is the engine's string representation: a reference-counted,
//! immutable `str`. Identifiers, property names, and string literals are
//! interned through an [`Interner`] so that repeated occurrences of the same
//! text share one allocation; values built at runtime (string concatenation,
//! `ToString` results) are plain, uninterned `Atom`s.
//!
//! A small set of well-known atoms (keywords, the empty string, commonly
//! accessed property names like `length` and `prototype`) are seeded once,
//! process-wide, before any interpreter is created -- mirroring the "global
//! intern table... frozen on first interpreter creation" rule in the spec.
//! Atoms interned by an `Interner` after that point belong to that
//! interpreter only.

use std::{
    fmt,
    hash::{Hash, Hasher},
    rc::Rc,
    sync::LazyLock,
};

use ahash::AHashMap;

/// An immutable, reference-counted string.
///
/// Equality and hashing are by content, matching ECMAScript string
/// semantics (`"a" === "a"` even when built from two different buffers).
/// Pointer equality is only used internally by the [`Interner`] to dedupe
/// storage; it is never observable from script-level comparisons.
#[derive(Clone)]
pub struct Atom(Rc<str>);

impl Atom {
    /// Wraps `s` as an uninterned atom, without consulting any interner.
    ///
    /// Used for strings built at runtime (concatenation, number-to-string
    /// conversion) where canonicalizing into the dedup table would cost
    /// more than it saves.
    pub fn new(s: impl Into<Rc<str>>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len_utf16(&self) -> usize {
        self.0.encode_utf16().count()
    }

    /// True if `self` and `other` are the exact same allocation.
    ///
    /// A fast-path only; content equality is what ECMAScript observes.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}
impl Eq for Atom {}

impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_ref().hash(state);
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Serializes as a plain string -- the dedup/interning is a runtime
/// optimization, not part of an atom's observable identity, so a
/// deserialized `Atom` is simply uninterned (equality still holds, since
/// `Atom` compares by content).
impl serde::Serialize for Atom {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Atom {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

impl From<&str> for Atom {
    fn from(s: &str) -> Self {
        Self(Rc::from(s))
    }
}

impl From<String> for Atom {
    fn from(s: String) -> Self {
        Self(Rc::from(s.into_boxed_str()))
    }
}

impl std::ops::Deref for Atom {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

/// Process-wide, pre-seeded atoms for identifiers the engine itself needs:
/// reserved words and the handful of property names the VM and error
/// classes touch directly. Built once, shared by every interpreter.
pub struct StaticAtoms {
    pub empty: Atom,
    pub length: Atom,
    pub prototype: Atom,
    pub constructor: Atom,
    pub message: Atom,
    pub name: Atom,
    pub arguments: Atom,
    pub this: Atom,
    pub value_of: Atom,
    pub to_string: Atom,
    pub proto: Atom,
}

pub static STATIC_ATOMS: LazyLock<StaticAtoms> = LazyLock::new(|| StaticAtoms {
    empty: Atom::new(""),
    length: Atom::new("length"),
    prototype: Atom::new("prototype"),
    constructor: Atom::new("constructor"),
    message: Atom::new("message"),
    name: Atom::new("name"),
    arguments: Atom::new("arguments"),
    this: Atom::new("this"),
    value_of: Atom::new("valueOf"),
    to_string: Atom::new("toString"),
    proto: Atom::new("__proto__"),
});

/// Per-interpreter interning cache.
///
/// Not shared across interpreters: each `Interner` only canonicalizes the
/// identifiers and literals its own parser and compiler encounter.
#[derive(Default)]
pub struct Interner {
    table: AHashMap<Box<str>, Atom>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical atom for `s`, creating and caching one if this
    /// is the first time this interner has seen that content.
    pub fn intern(&mut self, s: &str) -> Atom {
        if let Some(atom) = self.table.get(s) {
            return atom.clone();
        }
        let atom = Atom::new(s);
        self.table.insert(s.into(), atom.clone());
        atom
    }
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interner({} entries)", self.table.len())
    }
}
