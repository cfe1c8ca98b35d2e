//! Object arena and tracing garbage collector
//!
//! All heap objects live in one slot arena owned by the VM; [`ObjRef`]
//! handles are slot indices. The arena doubles as the allocation list: a
//! sweep walks every slot. Collection is mark-sweep with a gray worklist.
//!
//! The string table is weak: between marking and sweeping, entries whose
//! string was not marked are dropped so a swept string never leaves a
//! dangling intern entry.

use std::collections::HashMap;
use std::mem::size_of;

use crate::object::{fnv1a, Obj, ObjRef, ObjString, ObjUpvalue};
use crate::span::Line;
use crate::value::Value;

/// Heap size that triggers the first collection
const FIRST_GC_THRESHOLD: usize = 1024 * 1024;
/// After a collection the next threshold is live bytes times this factor
const GC_HEAP_GROW_FACTOR: usize = 2;

struct Slot {
    obj: Obj,
    marked: bool,
    /// Size recorded at allocation; subtracted when the slot is freed
    size: usize,
}

/// The object heap
pub struct Heap {
    slots: Vec<Option<Slot>>,
    free: Vec<u32>,
    /// Intern table: FNV-1a hash -> refs of live strings with that hash.
    /// Weak — the sweep prunes unmarked entries.
    strings: HashMap<u32, Vec<ObjRef>>,
    bytes_allocated: usize,
    next_gc: usize,
    /// Gray worklist for the mark phase
    gray: Vec<ObjRef>,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            strings: HashMap::new(),
            bytes_allocated: 0,
            next_gc: FIRST_GC_THRESHOLD,
            gray: Vec::new(),
        }
    }

    /// Allocate an object and return its handle.
    ///
    /// Never collects; callers that want collection check
    /// [`Heap::should_collect`] at their allocation points first, while
    /// everything under construction is still rooted.
    pub fn alloc(&mut self, obj: Obj) -> ObjRef {
        let size = obj_size(&obj);
        self.bytes_allocated += size;
        let slot = Slot {
            obj,
            marked: false,
            size,
        };
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(slot);
                ObjRef(index)
            }
            None => {
                self.slots.push(Some(slot));
                ObjRef((self.slots.len() - 1) as u32)
            }
        }
    }

    /// True when enough has been allocated since the last collection that the
    /// owner should collect before the next allocation.
    pub fn should_collect(&self) -> bool {
        cfg!(feature = "gc-stress") || self.bytes_allocated > self.next_gc
    }

    /// Intern a string, returning the existing object when one with the same
    /// content is already live.
    pub fn intern(&mut self, text: &str) -> ObjRef {
        let hash = fnv1a(text);
        if let Some(existing) = self.find_interned(hash, text) {
            return existing;
        }
        let r = self.alloc(Obj::Str(ObjString {
            chars: text.into(),
            hash,
        }));
        self.strings.entry(hash).or_default().push(r);
        r
    }

    /// Intern an owned string (used for concatenation results).
    pub fn take_string(&mut self, text: String) -> ObjRef {
        let hash = fnv1a(&text);
        if let Some(existing) = self.find_interned(hash, &text) {
            return existing;
        }
        let r = self.alloc(Obj::Str(ObjString {
            chars: text.into_boxed_str(),
            hash,
        }));
        self.strings.entry(hash).or_default().push(r);
        r
    }

    fn find_interned(&self, hash: u32, text: &str) -> Option<ObjRef> {
        let bucket = self.strings.get(&hash)?;
        bucket.iter().copied().find(|&r| self.as_str(r) == text)
    }

    // ── Typed access ─────────────────────────────────────────────────────────

    pub fn get(&self, r: ObjRef) -> &Obj {
        &self.slots[r.0 as usize]
            .as_ref()
            .expect("use of freed object")
            .obj
    }

    pub fn get_mut(&mut self, r: ObjRef) -> &mut Obj {
        &mut self.slots[r.0 as usize]
            .as_mut()
            .expect("use of freed object")
            .obj
    }

    pub fn as_str(&self, r: ObjRef) -> &str {
        match self.get(r) {
            Obj::Str(s) => &s.chars,
            _ => panic!("object is not a string"),
        }
    }

    pub fn function(&self, r: ObjRef) -> &crate::object::ObjFunction {
        match self.get(r) {
            Obj::Function(f) => f,
            _ => panic!("object is not a function"),
        }
    }

    pub fn closure(&self, r: ObjRef) -> &crate::object::ObjClosure {
        match self.get(r) {
            Obj::Closure(c) => c,
            _ => panic!("object is not a closure"),
        }
    }

    pub fn closure_mut(&mut self, r: ObjRef) -> &mut crate::object::ObjClosure {
        match self.get_mut(r) {
            Obj::Closure(c) => c,
            _ => panic!("object is not a closure"),
        }
    }

    pub fn class(&self, r: ObjRef) -> &crate::object::ObjClass {
        match self.get(r) {
            Obj::Class(c) => c,
            _ => panic!("object is not a class"),
        }
    }

    pub fn class_mut(&mut self, r: ObjRef) -> &mut crate::object::ObjClass {
        match self.get_mut(r) {
            Obj::Class(c) => c,
            _ => panic!("object is not a class"),
        }
    }

    pub fn instance(&self, r: ObjRef) -> &crate::object::ObjInstance {
        match self.get(r) {
            Obj::Instance(i) => i,
            _ => panic!("object is not an instance"),
        }
    }

    pub fn instance_mut(&mut self, r: ObjRef) -> &mut crate::object::ObjInstance {
        match self.get_mut(r) {
            Obj::Instance(i) => i,
            _ => panic!("object is not an instance"),
        }
    }

    pub fn upvalue(&self, r: ObjRef) -> ObjUpvalue {
        match self.get(r) {
            Obj::Upvalue(u) => *u,
            _ => panic!("object is not an upvalue"),
        }
    }

    pub fn upvalue_mut(&mut self, r: ObjRef) -> &mut ObjUpvalue {
        match self.get_mut(r) {
            Obj::Upvalue(u) => u,
            _ => panic!("object is not an upvalue"),
        }
    }

    // ── Display ──────────────────────────────────────────────────────────────

    /// Render an object the way the language prints it
    pub fn obj_to_string(&self, r: ObjRef) -> String {
        match self.get(r) {
            Obj::Str(s) => s.chars.to_string(),
            Obj::Function(f) => self.function_name(f.name),
            Obj::Native(_) => "<native fn>".to_string(),
            Obj::Closure(c) => self.function_name(self.function(c.function).name),
            Obj::Upvalue(_) => "upvalue".to_string(),
            Obj::Class(c) => self.as_str(c.name).to_string(),
            Obj::Instance(i) => {
                format!("{} instance", self.as_str(self.class(i.class).name))
            }
            Obj::BoundMethod(b) => {
                let function = self.closure(b.method).function;
                self.function_name(self.function(function).name)
            }
        }
    }

    fn function_name(&self, name: Option<ObjRef>) -> String {
        match name {
            Some(n) => format!("<fn {}>", self.as_str(n)),
            None => "<script>".to_string(),
        }
    }

    // ── Collection ───────────────────────────────────────────────────────────

    pub fn mark_value(&mut self, value: Value) {
        if let Value::Obj(r) = value {
            self.mark_object(r);
        }
    }

    pub fn mark_object(&mut self, r: ObjRef) {
        let slot = self.slots[r.0 as usize]
            .as_mut()
            .expect("marked a freed object");
        if slot.marked {
            return;
        }
        slot.marked = true;
        self.gray.push(r);
    }

    /// Drain the gray worklist, blackening each object by marking its
    /// children.
    pub fn trace_references(&mut self) {
        while let Some(r) = self.gray.pop() {
            self.blacken(r);
        }
    }

    fn blacken(&mut self, r: ObjRef) {
        let mut refs: Vec<ObjRef> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        match self.get(r) {
            Obj::Str(_) | Obj::Native(_) => {}
            Obj::Function(f) => {
                if let Some(name) = f.name {
                    refs.push(name);
                }
                values.extend(f.chunk.constants.iter().copied());
            }
            Obj::Closure(c) => {
                refs.push(c.function);
                refs.extend(c.upvalues.iter().copied());
            }
            Obj::Upvalue(u) => {
                if let ObjUpvalue::Closed(v) = u {
                    values.push(*v);
                }
            }
            Obj::Class(c) => {
                refs.push(c.name);
                for (&name, &method) in &c.methods {
                    refs.push(name);
                    values.push(method);
                }
            }
            Obj::Instance(i) => {
                refs.push(i.class);
                for (&name, &field) in &i.fields {
                    refs.push(name);
                    values.push(field);
                }
            }
            Obj::BoundMethod(b) => {
                values.push(b.receiver);
                refs.push(b.method);
            }
        }
        for value in values {
            self.mark_value(value);
        }
        for child in refs {
            self.mark_object(child);
        }
    }

    /// Free every unmarked object and clear the mark bit on survivors.
    ///
    /// Must run after [`Heap::trace_references`]; prunes the weak string
    /// table first so swept strings leave no dangling intern entries.
    pub fn sweep(&mut self) {
        let slots = &self.slots;
        self.strings.retain(|_, bucket| {
            bucket.retain(|r| slots[r.0 as usize].as_ref().is_some_and(|s| s.marked));
            !bucket.is_empty()
        });

        #[cfg(feature = "trace")]
        let before = self.bytes_allocated;

        for index in 0..self.slots.len() {
            let freed_size = match &mut self.slots[index] {
                Some(slot) if slot.marked => {
                    slot.marked = false;
                    continue;
                }
                Some(slot) => slot.size,
                None => continue,
            };
            self.bytes_allocated -= freed_size;
            self.slots[index] = None;
            self.free.push(index as u32);
        }

        self.next_gc = self.bytes_allocated * GC_HEAP_GROW_FACTOR;

        #[cfg(feature = "trace")]
        eprintln!(
            "-- gc: collected {} bytes ({} -> {}), next at {}",
            before - self.bytes_allocated,
            before,
            self.bytes_allocated,
            self.next_gc
        );
    }

    // ── Introspection (tests, disassembler) ──────────────────────────────────

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    pub fn is_live(&self, r: ObjRef) -> bool {
        self.slots
            .get(r.0 as usize)
            .is_some_and(|slot| slot.is_some())
    }

    pub fn live_objects(&self) -> impl Iterator<Item = (ObjRef, &Obj)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref().map(|s| (ObjRef(index as u32), &s.obj))
        })
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

fn obj_size(obj: &Obj) -> usize {
    let payload = match obj {
        Obj::Str(s) => s.chars.len(),
        Obj::Function(f) => {
            f.chunk.code.len()
                + f.chunk.lines.len() * size_of::<Line>()
                + f.chunk.constants.len() * size_of::<Value>()
        }
        Obj::Closure(c) => c.upvalues.len() * size_of::<ObjRef>(),
        Obj::Class(c) => c.methods.len() * size_of::<(ObjRef, Value)>(),
        Obj::Instance(i) => i.fields.len() * size_of::<(ObjRef, Value)>(),
        Obj::Native(_) | Obj::Upvalue(_) | Obj::BoundMethod(_) => 0,
    };
    size_of::<Obj>() + payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_dedups_by_content() {
        let mut heap = Heap::new();
        let a = heap.intern("hello");
        let b = heap.intern("hello");
        let c = heap.intern("world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(heap.as_str(a), "hello");
    }

    #[test]
    fn take_string_reuses_interned_instance() {
        let mut heap = Heap::new();
        let a = heap.intern("abc");
        let b = heap.take_string("abc".to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn unmarked_objects_are_swept_and_slots_reused() {
        let mut heap = Heap::new();
        let keep = heap.intern("keep");
        let drop = heap.intern("drop");
        heap.mark_object(keep);
        heap.trace_references();
        heap.sweep();
        assert!(heap.is_live(keep));
        assert!(!heap.is_live(drop));

        // The freed slot is recycled by the next allocation
        let reused = heap.intern("fresh");
        assert_eq!(reused, drop);
    }

    #[test]
    fn sweep_prunes_the_weak_string_table() {
        let mut heap = Heap::new();
        let old = heap.intern("ghost");
        heap.sweep(); // nothing marked: everything goes

        // Re-interning the same content must produce a fresh object, not a
        // dangling handle to the swept one
        let fresh = heap.intern("ghost");
        assert!(heap.is_live(fresh));
        assert_eq!(fresh, old, "slot is recycled, not resurrected");
        assert_eq!(heap.as_str(fresh), "ghost");
    }

    #[test]
    fn bytes_allocated_matches_live_set_after_sweep() {
        let mut heap = Heap::new();
        let keep = heap.intern("keep me around");
        heap.intern("collect me");
        heap.mark_object(keep);
        heap.trace_references();
        heap.sweep();

        let live_total: usize = heap
            .live_objects()
            .map(|(_, obj)| obj_size(obj))
            .sum();
        assert_eq!(heap.bytes_allocated(), live_total);
    }

    #[test]
    fn closed_upvalue_keeps_its_value_alive() {
        let mut heap = Heap::new();
        let s = heap.intern("captured");
        let upvalue = heap.alloc(Obj::Upvalue(ObjUpvalue::Closed(Value::Obj(s))));
        heap.mark_object(upvalue);
        heap.trace_references();
        heap.sweep();
        assert!(heap.is_live(s));
    }
}
