//! Stack-based virtual machine
//!
//! Executes bytecode against a value stack with call frames, closures over
//! upvalues, class instances with bound methods, and a tracing collector.
//! The VM owns all mutable runtime state: the heap, the globals, the open
//! upvalue list, and the frames.

mod frame;

pub use frame::CallFrame;

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use thiserror::Error;

use crate::bytecode::Opcode;
use crate::heap::Heap;
use crate::object::{
    NativeFn, Obj, ObjBoundMethod, ObjClass, ObjClosure, ObjInstance, ObjNative, ObjRef,
    ObjUpvalue,
};
use crate::value::Value;

/// The max number of call frames the VM handles
pub const FRAMES_MAX: usize = 64;
/// The max number of values on the VM's stack
pub const STACK_MAX: usize = FRAMES_MAX * 256;

/// Destination for `print` output, injectable so hosts and tests capture it
pub type OutputHandle = Rc<RefCell<dyn Write>>;

/// Errors raised while executing bytecode
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("Unknown opcode {0:#04x}.")]
    UnknownOpcode(u8),

    #[error("Stack overflow.")]
    StackOverflow,

    #[error("Stack underflow.")]
    StackUnderflow,

    #[error("Operand must be a number.")]
    OperandMustBeNumber,

    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers,

    #[error("Operands must be two numbers or two strings.")]
    BadAddOperands,

    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),

    #[error("Undefined property '{0}'.")]
    UndefinedProperty(String),

    #[error("Only instances have properties.")]
    PropertyOnNonInstance,

    #[error("Only instances have fields.")]
    FieldOnNonInstance,

    #[error("Only instances have methods.")]
    MethodOnNonInstance,

    #[error("Can only call functions and classes.")]
    NotCallable,

    #[error("Expected {expected} arguments but got {got}.")]
    ArityMismatch { expected: u8, got: u8 },

    #[error("Superclass must be a class.")]
    SuperclassNotClass,

    /// Error raised by a host-registered native function
    #[error("{0}")]
    Native(String),
}

/// Virtual machine state
pub struct Vm {
    heap: Heap,
    /// Value stack
    stack: Vec<Value>,
    /// Call frames, innermost last
    frames: Vec<CallFrame>,
    /// Global variables, keyed by interned name
    globals: HashMap<ObjRef, Value>,
    /// Open upvalues sorted by descending stack slot
    open_upvalues: Vec<ObjRef>,
    /// Cached interned `"init"` for initializer lookup
    init_string: ObjRef,
    /// Destination for `print`
    output: OutputHandle,
}

impl Vm {
    pub fn new(output: OutputHandle) -> Self {
        let mut heap = Heap::new();
        let init_string = heap.intern("init");
        Self {
            heap,
            stack: Vec::with_capacity(STACK_MAX),
            frames: Vec::with_capacity(FRAMES_MAX),
            globals: HashMap::new(),
            open_upvalues: Vec::new(),
            init_string,
            output,
        }
    }

    /// Register a host function under `name` in the globals.
    ///
    /// Both the name and the wrapper object ride the stack while the other
    /// is allocated so a stress collection can't sweep them mid-construction.
    pub fn define_native(
        &mut self,
        name: &str,
        arity: u8,
        function: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) -> Result<(), RuntimeError> {
        let name_ref = self.intern(name);
        self.push(Value::Obj(name_ref))?;
        let native = self.alloc(Obj::Native(ObjNative {
            name: name.to_string(),
            arity,
            function: NativeFn(Rc::new(function)),
        }));
        self.push(Value::Obj(native))?;
        self.globals.insert(name_ref, Value::Obj(native));
        self.pop()?;
        self.pop()?;
        Ok(())
    }

    /// Wrap the compiled script in a closure and execute it to completion.
    pub fn run_script(&mut self, script: ObjRef) -> Result<(), RuntimeError> {
        // The bare function rides the stack while the closure is allocated
        self.push(Value::Obj(script))?;
        let closure = self.alloc(Obj::Closure(ObjClosure {
            function: script,
            upvalues: Vec::new(),
        }));
        self.pop()?;
        self.push(Value::Obj(closure))?;
        self.call_closure(closure, 0)?;
        self.run()
    }

    /// Render the current call stack, innermost frame first.
    ///
    /// Call before [`Vm::reset`] when reporting a runtime error.
    pub fn stack_trace(&self) -> Vec<String> {
        self.frames
            .iter()
            .rev()
            .map(|frame| {
                let function_ref = self.heap.closure(frame.closure).function;
                let function = self.heap.function(function_ref);
                let line = frame.current_line();
                match function.name {
                    Some(name) => format!("[line {}] in {}()", line, self.heap.as_str(name)),
                    None => format!("[line {}] in script", line),
                }
            })
            .collect()
    }

    /// Discard all execution state after a runtime error. Globals and the
    /// heap survive so a REPL session can continue.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues.clear();
    }

    // ── Introspection ────────────────────────────────────────────────────────

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Force a full collection now; one also runs automatically at
    /// allocation points once enough has been allocated.
    pub fn collect(&mut self) {
        self.collect_garbage();
    }

    // ── Dispatch loop ────────────────────────────────────────────────────────

    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            #[cfg(feature = "trace")]
            {
                let mut dump = String::from("          ");
                for value in &self.stack {
                    dump.push_str(&format!("[ {} ]", value.to_display_string(&self.heap)));
                }
                eprintln!("{}", dump);
                let frame = self.frame();
                let (text, _) =
                    crate::bytecode::disassemble_instruction(&frame.chunk, frame.ip, &self.heap);
                eprintln!("{}", text);
            }

            let byte = self.read_byte();
            let opcode = Opcode::try_from(byte).map_err(RuntimeError::UnknownOpcode)?;

            match opcode {
                // ===== Constants and literals =====
                Opcode::Constant => {
                    let value = self.read_constant();
                    self.push(value)?;
                }
                Opcode::Nil => self.push(Value::Nil)?,
                Opcode::True => self.push(Value::Bool(true))?,
                Opcode::False => self.push(Value::Bool(false))?,
                Opcode::Pop => {
                    self.pop()?;
                }

                // ===== Variables =====
                Opcode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frame().base;
                    let value = self
                        .stack
                        .get(base + slot)
                        .copied()
                        .ok_or(RuntimeError::StackUnderflow)?;
                    self.push(value)?;
                }
                Opcode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frame().base;
                    let value = self.peek(0)?;
                    *self
                        .stack
                        .get_mut(base + slot)
                        .ok_or(RuntimeError::StackUnderflow)? = value;
                }
                Opcode::GetGlobal => {
                    let name = self.read_string();
                    let value = self.globals.get(&name).copied().ok_or_else(|| {
                        RuntimeError::UndefinedVariable(self.heap.as_str(name).to_string())
                    })?;
                    self.push(value)?;
                }
                Opcode::DefineGlobal => {
                    let name = self.read_string();
                    let value = self.peek(0)?;
                    self.globals.insert(name, value);
                    self.pop()?;
                }
                Opcode::SetGlobal => {
                    let name = self.read_string();
                    if !self.globals.contains_key(&name) {
                        return Err(RuntimeError::UndefinedVariable(
                            self.heap.as_str(name).to_string(),
                        ));
                    }
                    // Assignment is an expression, so the value stays pushed
                    let value = self.peek(0)?;
                    self.globals.insert(name, value);
                }
                Opcode::GetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let upvalue = self.heap.closure(self.frame().closure).upvalues[slot];
                    let value = match self.heap.upvalue(upvalue) {
                        ObjUpvalue::Open(stack_slot) => self.stack[stack_slot],
                        ObjUpvalue::Closed(value) => value,
                    };
                    self.push(value)?;
                }
                Opcode::SetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let value = self.peek(0)?;
                    let upvalue = self.heap.closure(self.frame().closure).upvalues[slot];
                    match self.heap.upvalue(upvalue) {
                        ObjUpvalue::Open(stack_slot) => self.stack[stack_slot] = value,
                        ObjUpvalue::Closed(_) => {
                            *self.heap.upvalue_mut(upvalue) = ObjUpvalue::Closed(value);
                        }
                    }
                }

                // ===== Properties =====
                Opcode::GetProperty => {
                    let name = self.read_string();
                    let instance = self
                        .peek(0)?
                        .as_obj()
                        .filter(|r| matches!(self.heap.get(*r), Obj::Instance(_)))
                        .ok_or(RuntimeError::PropertyOnNonInstance)?;

                    // Fields shadow methods
                    if let Some(&field) = self.heap.instance(instance).fields.get(&name) {
                        self.pop()?;
                        self.push(field)?;
                    } else {
                        let class = self.heap.instance(instance).class;
                        self.bind_method(class, name)?;
                    }
                }
                Opcode::SetProperty => {
                    let name = self.read_string();
                    let instance = self
                        .peek(1)?
                        .as_obj()
                        .filter(|r| matches!(self.heap.get(*r), Obj::Instance(_)))
                        .ok_or(RuntimeError::FieldOnNonInstance)?;

                    let value = self.peek(0)?;
                    self.heap.instance_mut(instance).fields.insert(name, value);
                    // Assignment result replaces the receiver on the stack
                    let value = self.pop()?;
                    self.pop()?;
                    self.push(value)?;
                }
                Opcode::GetSuper => {
                    let name = self.read_string();
                    let superclass = self
                        .pop()?
                        .as_obj()
                        .expect("compiler only emits GetSuper with a class on top");
                    self.bind_method(superclass, name)?;
                }

                // ===== Operators =====
                Opcode::Equal => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(a == b))?;
                }
                Opcode::Greater => self.binary_number_op(|a, b| Value::Bool(a > b))?,
                Opcode::Less => self.binary_number_op(|a, b| Value::Bool(a < b))?,
                Opcode::Add => {
                    let b = self.peek(0)?;
                    let a = self.peek(1)?;
                    match (a, b) {
                        (Value::Number(x), Value::Number(y)) => {
                            self.pop()?;
                            self.pop()?;
                            self.push(Value::Number(x + y))?;
                        }
                        (Value::Obj(x), Value::Obj(y))
                            if matches!(self.heap.get(x), Obj::Str(_))
                                && matches!(self.heap.get(y), Obj::Str(_)) =>
                        {
                            self.concatenate(x, y)?;
                        }
                        _ => return Err(RuntimeError::BadAddOperands),
                    }
                }
                Opcode::Subtract => self.binary_number_op(|a, b| Value::Number(a - b))?,
                Opcode::Multiply => self.binary_number_op(|a, b| Value::Number(a * b))?,
                Opcode::Divide => self.binary_number_op(|a, b| Value::Number(a / b))?,
                Opcode::Not => {
                    let value = self.pop()?;
                    self.push(Value::Bool(value.is_falsey()))?;
                }
                Opcode::Negate => match self.peek(0)? {
                    Value::Number(n) => {
                        self.pop()?;
                        self.push(Value::Number(-n))?;
                    }
                    _ => return Err(RuntimeError::OperandMustBeNumber),
                },

                // ===== Statements =====
                Opcode::Print => {
                    let value = self.pop()?;
                    let text = value.to_display_string(&self.heap);
                    let _ = writeln!(self.output.borrow_mut(), "{}", text);
                }

                // ===== Control flow =====
                Opcode::Jump => {
                    let offset = self.read_u16() as usize;
                    self.frame_mut().ip += offset;
                }
                Opcode::JumpIfFalse => {
                    let offset = self.read_u16() as usize;
                    if self.peek(0)?.is_falsey() {
                        self.frame_mut().ip += offset;
                    }
                }
                Opcode::Loop => {
                    let offset = self.read_u16() as usize;
                    self.frame_mut().ip -= offset;
                }

                // ===== Calls and closures =====
                Opcode::Call => {
                    let arg_count = self.read_byte();
                    let callee = self.peek(arg_count as usize)?;
                    self.call_value(callee, arg_count)?;
                }
                Opcode::Invoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte();
                    self.invoke(name, arg_count)?;
                }
                Opcode::SuperInvoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte();
                    let superclass = self
                        .pop()?
                        .as_obj()
                        .expect("compiler only emits SuperInvoke with a class on top");
                    self.invoke_from_class(superclass, name, arg_count)?;
                }
                Opcode::Closure => {
                    let function = self
                        .read_constant()
                        .as_obj()
                        .expect("Closure operand is a function constant");
                    let upvalue_count = self.heap.function(function).upvalue_count;

                    let closure = self.alloc(Obj::Closure(ObjClosure {
                        function,
                        upvalues: Vec::with_capacity(upvalue_count),
                    }));
                    self.push(Value::Obj(closure))?;

                    for _ in 0..upvalue_count {
                        let is_local = self.read_byte() == 1;
                        let index = self.read_byte() as usize;
                        let captured = if is_local {
                            let slot = self.frame().base + index;
                            self.capture_upvalue(slot)
                        } else {
                            self.heap.closure(self.frame().closure).upvalues[index]
                        };
                        self.heap.closure_mut(closure).upvalues.push(captured);
                    }
                }
                Opcode::CloseUpvalue => {
                    let top = self.stack.len() - 1;
                    self.close_upvalues(top);
                    self.pop()?;
                }
                Opcode::Return => {
                    let result = self.pop()?;
                    let frame = self.frames.pop().ok_or(RuntimeError::StackUnderflow)?;
                    self.close_upvalues(frame.base);

                    if self.frames.is_empty() {
                        // Pop the script closure; a finished program leaves
                        // the stack empty
                        self.pop()?;
                        return Ok(());
                    }
                    self.stack.truncate(frame.base);
                    self.push(result)?;
                }

                // ===== Classes =====
                Opcode::Class => {
                    let name = self.read_string();
                    let class = self.alloc(Obj::Class(ObjClass {
                        name,
                        methods: HashMap::new(),
                    }));
                    self.push(Value::Obj(class))?;
                }
                Opcode::Inherit => {
                    let superclass = self
                        .peek(1)?
                        .as_obj()
                        .filter(|r| matches!(self.heap.get(*r), Obj::Class(_)))
                        .ok_or(RuntimeError::SuperclassNotClass)?;
                    let subclass = self
                        .peek(0)?
                        .as_obj()
                        .expect("compiler only emits Inherit with the class on top");

                    // Runs before any Method instruction, so the subclass
                    // table starts as a copy and later methods overwrite
                    let methods = self.heap.class(superclass).methods.clone();
                    self.heap.class_mut(subclass).methods = methods;
                    self.pop()?;
                }
                Opcode::Method => {
                    let name = self.read_string();
                    let method = self.peek(0)?;
                    let class = self
                        .peek(1)?
                        .as_obj()
                        .expect("compiler only emits Method with the class below");
                    self.heap.class_mut(class).methods.insert(name, method);
                    self.pop()?;
                }
            }
        }
    }

    // ── Call protocol ────────────────────────────────────────────────────────

    fn call_value(&mut self, callee: Value, arg_count: u8) -> Result<(), RuntimeError> {
        let Some(callee_ref) = callee.as_obj() else {
            return Err(RuntimeError::NotCallable);
        };

        match self.heap.get(callee_ref) {
            Obj::Closure(_) => self.call_closure(callee_ref, arg_count),
            Obj::BoundMethod(bound) => {
                let receiver = bound.receiver;
                let method = bound.method;
                let slot = self.stack.len() - arg_count as usize - 1;
                self.stack[slot] = receiver;
                self.call_closure(method, arg_count)
            }
            Obj::Class(_) => {
                let instance = self.alloc(Obj::Instance(ObjInstance {
                    class: callee_ref,
                    fields: HashMap::new(),
                }));
                let slot = self.stack.len() - arg_count as usize - 1;
                self.stack[slot] = Value::Obj(instance);

                let initializer = self
                    .heap
                    .class(callee_ref)
                    .methods
                    .get(&self.init_string)
                    .copied();
                match initializer {
                    Some(init) => {
                        let init = init.as_obj().expect("methods are closures");
                        self.call_closure(init, arg_count)
                    }
                    None if arg_count != 0 => Err(RuntimeError::ArityMismatch {
                        expected: 0,
                        got: arg_count,
                    }),
                    None => Ok(()),
                }
            }
            Obj::Native(native) => {
                let function = native.function.clone();
                let arity = native.arity;
                if arg_count != arity {
                    return Err(RuntimeError::ArityMismatch {
                        expected: arity,
                        got: arg_count,
                    });
                }
                let args_start = self.stack.len() - arg_count as usize;
                let result =
                    (function.0)(&self.stack[args_start..]).map_err(RuntimeError::Native)?;
                self.stack.truncate(args_start - 1);
                self.push(result)
            }
            _ => Err(RuntimeError::NotCallable),
        }
    }

    fn call_closure(&mut self, closure: ObjRef, arg_count: u8) -> Result<(), RuntimeError> {
        let function_ref = self.heap.closure(closure).function;
        let function = self.heap.function(function_ref);
        if arg_count != function.arity {
            return Err(RuntimeError::ArityMismatch {
                expected: function.arity,
                got: arg_count,
            });
        }
        if self.frames.len() == FRAMES_MAX {
            return Err(RuntimeError::StackOverflow);
        }
        let chunk = Rc::clone(&function.chunk);
        let base = self.stack.len() - arg_count as usize - 1;
        self.frames.push(CallFrame {
            closure,
            chunk,
            ip: 0,
            base,
        });
        Ok(())
    }

    /// Fused method call: field shadowing first, then a class-method lookup
    /// that skips materializing a bound method.
    fn invoke(&mut self, name: ObjRef, arg_count: u8) -> Result<(), RuntimeError> {
        let receiver = self.peek(arg_count as usize)?;
        let instance = receiver
            .as_obj()
            .filter(|r| matches!(self.heap.get(*r), Obj::Instance(_)))
            .ok_or(RuntimeError::MethodOnNonInstance)?;

        if let Some(&field) = self.heap.instance(instance).fields.get(&name) {
            let slot = self.stack.len() - arg_count as usize - 1;
            self.stack[slot] = field;
            return self.call_value(field, arg_count);
        }

        let class = self.heap.instance(instance).class;
        self.invoke_from_class(class, name, arg_count)
    }

    fn invoke_from_class(
        &mut self,
        class: ObjRef,
        name: ObjRef,
        arg_count: u8,
    ) -> Result<(), RuntimeError> {
        let method = self.heap.class(class).methods.get(&name).copied();
        match method {
            Some(method) => {
                let method = method.as_obj().expect("methods are closures");
                self.call_closure(method, arg_count)
            }
            None => Err(RuntimeError::UndefinedProperty(
                self.heap.as_str(name).to_string(),
            )),
        }
    }

    /// Replace the instance on top of the stack with `class`'s method bound
    /// to it.
    fn bind_method(&mut self, class: ObjRef, name: ObjRef) -> Result<(), RuntimeError> {
        let Some(&method) = self.heap.class(class).methods.get(&name) else {
            return Err(RuntimeError::UndefinedProperty(
                self.heap.as_str(name).to_string(),
            ));
        };
        let receiver = self.peek(0)?;
        let method = method.as_obj().expect("methods are closures");
        let bound = self.alloc(Obj::BoundMethod(ObjBoundMethod { receiver, method }));
        self.pop()?;
        self.push(Value::Obj(bound))
    }

    // ── Upvalue protocol ─────────────────────────────────────────────────────

    /// Find or create the open upvalue for a stack slot. The open list is
    /// kept sorted by descending slot so closing can stop early.
    fn capture_upvalue(&mut self, slot: usize) -> ObjRef {
        let mut index = 0;
        while index < self.open_upvalues.len() {
            let existing = self.open_upvalues[index];
            match self.heap.upvalue(existing).open_slot() {
                Some(open_slot) if open_slot > slot => index += 1,
                Some(open_slot) if open_slot == slot => return existing,
                _ => break,
            }
        }
        let created = self.alloc(Obj::Upvalue(ObjUpvalue::Open(slot)));
        self.open_upvalues.insert(index, created);
        created
    }

    /// Close every open upvalue at or above `from_slot`: copy the stack
    /// value in and unlink from the open list.
    fn close_upvalues(&mut self, from_slot: usize) {
        while let Some(&upvalue) = self.open_upvalues.first() {
            let slot = self
                .heap
                .upvalue(upvalue)
                .open_slot()
                .expect("open list only holds open upvalues");
            if slot < from_slot {
                break;
            }
            let value = self.stack[slot];
            *self.heap.upvalue_mut(upvalue) = ObjUpvalue::Closed(value);
            self.open_upvalues.remove(0);
        }
    }

    // ── Stack and decoding helpers ───────────────────────────────────────────

    fn frame(&self) -> &CallFrame {
        self.frames.last().expect("no active call frame")
    }

    fn frame_mut(&mut self) -> &mut CallFrame {
        self.frames.last_mut().expect("no active call frame")
    }

    fn read_byte(&mut self) -> u8 {
        self.frame_mut().read_byte()
    }

    fn read_u16(&mut self) -> u16 {
        self.frame_mut().read_u16()
    }

    fn read_constant(&mut self) -> Value {
        let index = self.read_byte() as usize;
        self.frame().chunk.constants[index]
    }

    fn read_string(&mut self) -> ObjRef {
        self.read_constant()
            .as_obj()
            .expect("name constant is an interned string")
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() == STACK_MAX {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    fn peek(&self, distance: usize) -> Result<Value, RuntimeError> {
        let index = self
            .stack
            .len()
            .checked_sub(distance + 1)
            .ok_or(RuntimeError::StackUnderflow)?;
        Ok(self.stack[index])
    }

    fn binary_number_op(&mut self, op: fn(f64, f64) -> Value) -> Result<(), RuntimeError> {
        match (self.peek(1)?, self.peek(0)?) {
            (Value::Number(a), Value::Number(b)) => {
                self.pop()?;
                self.pop()?;
                self.push(op(a, b))
            }
            _ => Err(RuntimeError::OperandsMustBeNumbers),
        }
    }

    /// String concatenation; the result is interned like every other string.
    /// Operands stay on the stack until the result exists so a collection
    /// triggered by the allocation can't sweep them.
    fn concatenate(&mut self, a: ObjRef, b: ObjRef) -> Result<(), RuntimeError> {
        let mut text =
            String::with_capacity(self.heap.as_str(a).len() + self.heap.as_str(b).len());
        text.push_str(self.heap.as_str(a));
        text.push_str(self.heap.as_str(b));

        if self.heap.should_collect() {
            self.collect_garbage();
        }
        let result = self.heap.take_string(text);

        self.pop()?;
        self.pop()?;
        self.push(Value::Obj(result))
    }

    // ── Allocation and collection ────────────────────────────────────────────

    /// Every VM-side allocation funnels through here: the collection trigger
    /// check happens while whatever is under construction is still rooted.
    fn alloc(&mut self, obj: Obj) -> ObjRef {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
        self.heap.alloc(obj)
    }

    fn intern(&mut self, text: &str) -> ObjRef {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
        self.heap.intern(text)
    }

    /// Mark from every root, trace, then sweep. Roots: the value stack, each
    /// frame's closure, the open upvalues, the globals (names and values),
    /// and the cached init string.
    fn collect_garbage(&mut self) {
        #[cfg(feature = "trace")]
        eprintln!("-- gc begin");

        for value in &self.stack {
            self.heap.mark_value(*value);
        }
        for frame in &self.frames {
            self.heap.mark_object(frame.closure);
        }
        for upvalue in &self.open_upvalues {
            self.heap.mark_object(*upvalue);
        }
        for (&name, &value) in &self.globals {
            self.heap.mark_object(name);
            self.heap.mark_value(value);
        }
        self.heap.mark_object(self.init_string);

        self.heap.trace_references();
        self.heap.sweep();
    }
}
