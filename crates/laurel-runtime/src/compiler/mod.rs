//! Single-pass bytecode compiler
//!
//! A Pratt parser that emits bytecode straight from the token stream; no AST
//! is materialized. Each function being compiled has its own frame on an
//! explicit stack (`funcs`), and upvalue resolution is a recursive traversal
//! of that stack. Expression rules live in `expr`, declarations and
//! statements in `stmt`.

mod expr;
mod stmt;

use std::rc::Rc;

use crate::bytecode::{Chunk, Opcode};
use crate::diagnostic::Diagnostic;
use crate::heap::Heap;
use crate::lexer::Lexer;
use crate::object::{Obj, ObjFunction, ObjRef};
use crate::token::{Token, TokenKind};
use crate::value::Value;

/// One-byte operands cap locals and upvalues per function
const MAX_LOCALS: usize = 256;
const MAX_UPVALUES: usize = 256;

/// What kind of function body is being compiled.
///
/// Decides slot-0 naming (`this` for methods), the implicit return value,
/// and which `return` forms are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FunctionKind {
    Script,
    Function,
    Method,
    Initializer,
}

/// Local variable information
struct Local {
    name: String,
    /// Scope depth, or -1 while declared but not yet initialized
    depth: i32,
    /// Set when a nested function closes over this local; `end_scope` then
    /// emits `CloseUpvalue` instead of `Pop`
    is_captured: bool,
}

/// Compile-time record of one captured variable
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct UpvalueMeta {
    pub(crate) index: u8,
    /// Capture from the enclosing function's locals (`true`) or from its
    /// upvalue array (`false`)
    pub(crate) is_local: bool,
}

/// Per-function compilation state
struct FuncState {
    kind: FunctionKind,
    /// Interned function name; `None` for the top-level script
    name: Option<ObjRef>,
    arity: u8,
    chunk: Chunk,
    locals: Vec<Local>,
    scope_depth: i32,
    upvalues: Vec<UpvalueMeta>,
}

impl FuncState {
    fn new(kind: FunctionKind, name: Option<ObjRef>) -> Self {
        // Slot 0 is reserved: it holds the callee, or the receiver for
        // methods (where it is nameable as `this`)
        let slot_zero = Local {
            name: if matches!(kind, FunctionKind::Method | FunctionKind::Initializer) {
                "this".to_string()
            } else {
                String::new()
            },
            depth: 0,
            is_captured: false,
        };
        Self {
            kind,
            name,
            arity: 0,
            chunk: Chunk::new(),
            locals: vec![slot_zero],
            scope_depth: 0,
            upvalues: Vec::new(),
        }
    }
}

/// Tracks the class declaration being compiled (for `this` / `super` checks)
struct ClassState {
    has_superclass: bool,
}

/// Compiler state
pub struct Compiler<'h> {
    heap: &'h mut Heap,
    lexer: Lexer,
    current: Token,
    previous: Token,
    had_error: bool,
    /// Suppresses cascading diagnostics until the next statement boundary
    panic_mode: bool,
    diagnostics: Vec<Diagnostic>,
    /// Function compilation stack, innermost last
    funcs: Vec<FuncState>,
    /// Class compilation stack, innermost last
    classes: Vec<ClassState>,
}

/// Compile source to the top-level script function.
///
/// On failure every reported diagnostic is returned; the compiler
/// synchronizes at statement boundaries so one bad statement doesn't hide
/// errors in the next.
pub fn compile(source: &str, heap: &mut Heap) -> Result<ObjRef, Vec<Diagnostic>> {
    let mut compiler = Compiler::new(source, heap);
    compiler.advance();
    while !compiler.match_token(TokenKind::Eof) {
        compiler.declaration();
    }
    let (script, _) = compiler.end_function();
    if compiler.had_error {
        Err(compiler.diagnostics)
    } else {
        Ok(script)
    }
}

impl<'h> Compiler<'h> {
    fn new(source: &str, heap: &'h mut Heap) -> Self {
        Self {
            heap,
            lexer: Lexer::new(source),
            current: Token::empty(),
            previous: Token::empty(),
            had_error: false,
            panic_mode: false,
            diagnostics: Vec::new(),
            funcs: vec![FuncState::new(FunctionKind::Script, None)],
            classes: Vec::new(),
        }
    }

    // ── Token plumbing ───────────────────────────────────────────────────────

    pub(crate) fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, Token::empty());
        loop {
            self.current = self.lexer.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let message = self.current.lexeme.clone();
            self.error_at_current(&message);
        }
    }

    pub(crate) fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    pub(crate) fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    // ── Error reporting ──────────────────────────────────────────────────────

    fn error_at(&mut self, token: Token, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        let diagnostic = match token.kind {
            TokenKind::Eof => Diagnostic::at_end(token.line, message),
            TokenKind::Error => Diagnostic::bare(token.line, message),
            _ => Diagnostic::at_token(token.line, token.lexeme, message),
        };
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn error(&mut self, message: &str) {
        let token = self.previous.clone();
        self.error_at(token, message);
    }

    pub(crate) fn error_at_current(&mut self, message: &str) {
        let token = self.current.clone();
        self.error_at(token, message);
    }

    /// Skip tokens until a statement boundary so one error doesn't cascade
    pub(crate) fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => self.advance(),
            }
        }
    }

    // ── Function stack ───────────────────────────────────────────────────────

    fn func(&self) -> &FuncState {
        self.funcs.last().expect("function stack is never empty")
    }

    fn func_mut(&mut self) -> &mut FuncState {
        self.funcs.last_mut().expect("function stack is never empty")
    }

    fn level(&self) -> usize {
        self.funcs.len() - 1
    }

    pub(crate) fn function_kind(&self) -> FunctionKind {
        self.func().kind
    }

    pub(crate) fn in_class(&self) -> bool {
        !self.classes.is_empty()
    }

    pub(crate) fn in_subclass(&self) -> bool {
        self.classes.last().is_some_and(|c| c.has_superclass)
    }

    /// Open a fresh function frame. The function's name is the token just
    /// consumed (`None` only for the script frame created at construction).
    pub(crate) fn push_func(&mut self, kind: FunctionKind) {
        let name = self.heap.intern(&self.previous.lexeme);
        self.funcs.push(FuncState::new(kind, Some(name)));
    }

    /// Close the innermost function frame: emit the implicit return, build
    /// the function object, and hand back its upvalue layout for the
    /// enclosing `Closure` instruction.
    pub(crate) fn end_function(&mut self) -> (ObjRef, Vec<UpvalueMeta>) {
        self.emit_return();
        let state = self.funcs.pop().expect("function stack is never empty");
        let function = ObjFunction {
            arity: state.arity,
            upvalue_count: state.upvalues.len(),
            chunk: Rc::new(state.chunk),
            name: state.name,
        };
        let fn_ref = self.heap.alloc(Obj::Function(function));

        #[cfg(feature = "trace")]
        if !self.had_error {
            let heading = self.heap.obj_to_string(fn_ref);
            eprintln!(
                "{}",
                crate::bytecode::disassemble(&self.heap.function(fn_ref).chunk, &heading, self.heap)
            );
        }

        (fn_ref, state.upvalues)
    }

    // ── Emission ─────────────────────────────────────────────────────────────

    fn current_chunk(&mut self) -> &mut Chunk {
        &mut self.func_mut().chunk
    }

    pub(crate) fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.current_chunk().write(byte, line);
    }

    pub(crate) fn emit_op(&mut self, opcode: Opcode) {
        let line = self.previous.line;
        self.current_chunk().emit(opcode, line);
    }

    pub(crate) fn emit_ops(&mut self, first: Opcode, second: Opcode) {
        self.emit_op(first);
        self.emit_op(second);
    }

    pub(crate) fn emit_op_byte(&mut self, opcode: Opcode, byte: u8) {
        self.emit_op(opcode);
        self.emit_byte(byte);
    }

    /// Emit a forward jump with placeholder operands; returns the operand
    /// offset for `patch_jump`.
    pub(crate) fn emit_jump(&mut self, opcode: Opcode) -> usize {
        self.emit_op(opcode);
        self.emit_byte(0xFF);
        self.emit_byte(0xFF);
        self.current_chunk().code.len() - 2
    }

    pub(crate) fn patch_jump(&mut self, offset: usize) {
        if !self.current_chunk().patch_jump(offset) {
            self.error("Too much code to jump over.");
        }
    }

    /// Emit a backward jump to `loop_start`
    pub(crate) fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(Opcode::Loop);
        // +2 skips the Loop operand itself
        let offset = self.current_chunk().code.len() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.error("Loop body too large.");
        }
        self.emit_byte(((offset >> 8) & 0xFF) as u8);
        self.emit_byte((offset & 0xFF) as u8);
    }

    pub(crate) fn make_constant(&mut self, value: Value) -> u8 {
        match self.current_chunk().add_constant(value) {
            Some(index) => index,
            None => {
                self.error("Too many constants in one chunk.");
                0
            }
        }
    }

    pub(crate) fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_op_byte(Opcode::Constant, index);
    }

    /// Implicit return: initializers return the receiver, everything else nil
    pub(crate) fn emit_return(&mut self) {
        if self.func().kind == FunctionKind::Initializer {
            self.emit_op_byte(Opcode::GetLocal, 0);
        } else {
            self.emit_op(Opcode::Nil);
        }
        self.emit_op(Opcode::Return);
    }

    // ── Scopes and variables ─────────────────────────────────────────────────

    pub(crate) fn begin_scope(&mut self) {
        self.func_mut().scope_depth += 1;
    }

    pub(crate) fn end_scope(&mut self) {
        self.func_mut().scope_depth -= 1;
        loop {
            let close = {
                let func = self.func();
                match func.locals.last() {
                    Some(local) if local.depth > func.scope_depth => Some(local.is_captured),
                    _ => None,
                }
            };
            match close {
                Some(true) => self.emit_op(Opcode::CloseUpvalue),
                Some(false) => self.emit_op(Opcode::Pop),
                None => break,
            }
            self.func_mut().locals.pop();
        }
    }

    /// Intern an identifier and store it in the constant pool
    pub(crate) fn identifier_constant(&mut self, name: &str) -> u8 {
        let interned = self.heap.intern(name);
        self.make_constant(Value::Obj(interned))
    }

    pub(crate) fn add_local(&mut self, name: String) {
        if self.func().locals.len() >= MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.func_mut().locals.push(Local {
            name,
            depth: -1,
            is_captured: false,
        });
    }

    /// Record a local declaration; duplicate names in the same scope are an
    /// error. Globals are late-bound and not declared.
    pub(crate) fn declare_variable(&mut self) {
        if self.func().scope_depth == 0 {
            return;
        }
        let name = self.previous.lexeme.clone();
        let duplicate = {
            let func = self.func();
            func.locals
                .iter()
                .rev()
                .take_while(|local| local.depth == -1 || local.depth >= func.scope_depth)
                .any(|local| local.name == name)
        };
        if duplicate {
            self.error("Already a variable with this name in this scope.");
        }
        self.add_local(name);
    }

    /// Parse a variable name; returns its constant index for globals, 0 for
    /// locals (which are addressed by slot, not name).
    pub(crate) fn parse_variable(&mut self, message: &str) -> u8 {
        self.consume(TokenKind::Identifier, message);
        self.declare_variable();
        if self.func().scope_depth > 0 {
            return 0;
        }
        let name = self.previous.lexeme.clone();
        self.identifier_constant(&name)
    }

    pub(crate) fn mark_initialized(&mut self) {
        let func = self.func_mut();
        if func.scope_depth == 0 {
            return;
        }
        let depth = func.scope_depth;
        if let Some(local) = func.locals.last_mut() {
            local.depth = depth;
        }
    }

    pub(crate) fn define_variable(&mut self, global: u8) {
        if self.func().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_op_byte(Opcode::DefineGlobal, global);
    }

    // ── Resolution ───────────────────────────────────────────────────────────

    /// Resolve `name` as a local of the function at `level`, top of the
    /// locals array down.
    fn resolve_local(&mut self, level: usize, name: &str) -> Option<u8> {
        let mut uninitialized = false;
        let mut found = None;
        for (index, local) in self.funcs[level].locals.iter().enumerate().rev() {
            if local.name == name {
                if local.depth == -1 {
                    uninitialized = true;
                }
                found = Some(index as u8);
                break;
            }
        }
        if uninitialized {
            self.error("Can't read local variable in its own initializer.");
        }
        found
    }

    /// Resolve `name` as an upvalue of the function at `level`, recursing
    /// outward through the enclosing frames. Marks the captured local and
    /// registers chained upvalues in every intermediate frame.
    fn resolve_upvalue(&mut self, level: usize, name: &str) -> Option<u8> {
        if level == 0 {
            return None;
        }
        if let Some(local) = self.resolve_local(level - 1, name) {
            self.funcs[level - 1].locals[local as usize].is_captured = true;
            return Some(self.add_upvalue(level, local, true));
        }
        if let Some(upvalue) = self.resolve_upvalue(level - 1, name) {
            return Some(self.add_upvalue(level, upvalue, false));
        }
        None
    }

    fn add_upvalue(&mut self, level: usize, index: u8, is_local: bool) -> u8 {
        let meta = UpvalueMeta { index, is_local };
        if let Some(existing) = self.funcs[level].upvalues.iter().position(|u| *u == meta) {
            return existing as u8;
        }
        if self.funcs[level].upvalues.len() >= MAX_UPVALUES {
            self.error("Too many closure variables in function.");
            return 0;
        }
        self.funcs[level].upvalues.push(meta);
        (self.funcs[level].upvalues.len() - 1) as u8
    }

    /// Three-tier identifier resolution: local, then upvalue, then global
    pub(crate) fn named_variable(&mut self, name: &str, can_assign: bool) {
        let level = self.level();
        let (get_op, set_op, arg) = if let Some(index) = self.resolve_local(level, name) {
            (Opcode::GetLocal, Opcode::SetLocal, index)
        } else if let Some(index) = self.resolve_upvalue(level, name) {
            (Opcode::GetUpvalue, Opcode::SetUpvalue, index)
        } else {
            let index = self.identifier_constant(name);
            (Opcode::GetGlobal, Opcode::SetGlobal, index)
        };

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_op_byte(set_op, arg);
        } else {
            self.emit_op_byte(get_op, arg);
        }
    }
}
