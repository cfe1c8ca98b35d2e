//! Heap object variants
//!
//! Every non-primitive value lives in the heap arena as one of these
//! variants, addressed through [`ObjRef`] handles. Handles are plain indices,
//! so moving or growing the arena never invalidates them and the collector
//! works without raw pointers.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::bytecode::Chunk;
use crate::value::Value;

/// Handle to an object in the heap arena.
///
/// Identity comparison of two refs is the language's object identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(pub(crate) u32);

/// A heap-allocated object
#[derive(Debug)]
pub enum Obj {
    Str(ObjString),
    Function(ObjFunction),
    Native(ObjNative),
    Closure(ObjClosure),
    Upvalue(ObjUpvalue),
    Class(ObjClass),
    Instance(ObjInstance),
    BoundMethod(ObjBoundMethod),
}

/// Immutable interned string with its FNV-1a hash cached at creation.
#[derive(Debug)]
pub struct ObjString {
    pub chars: Box<str>,
    pub hash: u32,
}

/// An immutable compiled function: its code plus call metadata.
///
/// Functions are never called directly; the VM always goes through a
/// [`ObjClosure`] wrapping one.
#[derive(Debug)]
pub struct ObjFunction {
    pub arity: u8,
    pub upvalue_count: usize,
    /// Shared so call frames can hold the code without borrowing the heap
    pub chunk: Rc<Chunk>,
    /// Interned name; `None` for the top-level script
    pub name: Option<ObjRef>,
}

/// Host function callable from the language
pub struct ObjNative {
    pub name: String,
    pub arity: u8,
    pub function: NativeFn,
}

/// Boxed host callable. Wrapped so natives can close over host state (the
/// `clock` epoch, test harness hooks).
#[derive(Clone)]
pub struct NativeFn(pub Rc<dyn Fn(&[Value]) -> Result<Value, String>>);

impl fmt::Debug for ObjNative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjNative")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Runtime binding of a function to its captured environment
#[derive(Debug)]
pub struct ObjClosure {
    pub function: ObjRef,
    /// One entry per declared upvalue of the function
    pub upvalues: Vec<ObjRef>,
}

/// A captured variable.
///
/// While open it aliases a live VM stack slot by index; closing copies the
/// value in. Index-based aliasing keeps the open list valid across stack
/// reallocation.
#[derive(Debug, Clone, Copy)]
pub enum ObjUpvalue {
    Open(usize),
    Closed(Value),
}

impl ObjUpvalue {
    pub fn open_slot(&self) -> Option<usize> {
        match self {
            ObjUpvalue::Open(slot) => Some(*slot),
            ObjUpvalue::Closed(_) => None,
        }
    }
}

/// A class with its method table. Methods are closures keyed by interned
/// name.
#[derive(Debug)]
pub struct ObjClass {
    pub name: ObjRef,
    pub methods: HashMap<ObjRef, Value>,
}

/// An instance of a class with its mutable field table
#[derive(Debug)]
pub struct ObjInstance {
    pub class: ObjRef,
    pub fields: HashMap<ObjRef, Value>,
}

/// A method closure pre-bound to a receiver
#[derive(Debug)]
pub struct ObjBoundMethod {
    pub receiver: Value,
    pub method: ObjRef,
}

/// 32-bit FNV-1a over the string's bytes
pub fn fnv1a(text: &str) -> u32 {
    let mut hash: u32 = 2166136261;
    for byte in text.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}
