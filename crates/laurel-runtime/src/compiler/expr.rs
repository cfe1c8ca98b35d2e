//! Expression parsing
//!
//! Precedence-climbing over a constant rule table indexed by token kind.
//! `can_assign` is threaded explicitly through the rules so only targets
//! parsed at assignment precedence may consume a trailing `=`.

use super::Compiler;
use crate::bytecode::Opcode;
use crate::token::TokenKind;
use crate::value::Value;

/// Operator precedence, lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Precedence {
    None,
    /// `=`
    Assignment,
    /// `or`
    Or,
    /// `and`
    And,
    /// `==` `!=`
    Equality,
    /// `<` `>` `<=` `>=`
    Comparison,
    /// `+` `-`
    Term,
    /// `*` `/`
    Factor,
    /// `!` unary `-`
    Unary,
    /// `.` `()`
    Call,
    Primary,
}

impl Precedence {
    /// One level tighter, for left-associative infix operators
    fn next(self) -> Self {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

/// Prefix rule selector
#[derive(Debug, Clone, Copy)]
enum PrefixRule {
    Grouping,
    Unary,
    Number,
    Str,
    Literal,
    Variable,
    This,
    Super,
}

/// Infix rule selector
#[derive(Debug, Clone, Copy)]
enum InfixRule {
    Binary,
    And,
    Or,
    Call,
    Dot,
}

#[derive(Clone, Copy)]
struct ParseRule {
    prefix: Option<PrefixRule>,
    infix: Option<InfixRule>,
    precedence: Precedence,
}

const fn rule(
    prefix: Option<PrefixRule>,
    infix: Option<InfixRule>,
    precedence: Precedence,
) -> ParseRule {
    ParseRule {
        prefix,
        infix,
        precedence,
    }
}

const fn none() -> ParseRule {
    rule(None, None, Precedence::None)
}

/// Rule table, indexed by `TokenKind as usize`; order must match the
/// `TokenKind` declaration.
const RULES: [ParseRule; TokenKind::COUNT] = [
    // LeftParen
    rule(Some(PrefixRule::Grouping), Some(InfixRule::Call), Precedence::Call),
    none(), // RightParen
    none(), // LeftBrace
    none(), // RightBrace
    none(), // Comma
    // Dot
    rule(None, Some(InfixRule::Dot), Precedence::Call),
    // Minus
    rule(Some(PrefixRule::Unary), Some(InfixRule::Binary), Precedence::Term),
    // Plus
    rule(None, Some(InfixRule::Binary), Precedence::Term),
    none(), // Semicolon
    // Slash
    rule(None, Some(InfixRule::Binary), Precedence::Factor),
    // Star
    rule(None, Some(InfixRule::Binary), Precedence::Factor),
    // Bang
    rule(Some(PrefixRule::Unary), None, Precedence::None),
    // BangEqual
    rule(None, Some(InfixRule::Binary), Precedence::Equality),
    none(), // Equal
    // EqualEqual
    rule(None, Some(InfixRule::Binary), Precedence::Equality),
    // Greater
    rule(None, Some(InfixRule::Binary), Precedence::Comparison),
    // GreaterEqual
    rule(None, Some(InfixRule::Binary), Precedence::Comparison),
    // Less
    rule(None, Some(InfixRule::Binary), Precedence::Comparison),
    // LessEqual
    rule(None, Some(InfixRule::Binary), Precedence::Comparison),
    // Identifier
    rule(Some(PrefixRule::Variable), None, Precedence::None),
    // Str
    rule(Some(PrefixRule::Str), None, Precedence::None),
    // Number
    rule(Some(PrefixRule::Number), None, Precedence::None),
    // And
    rule(None, Some(InfixRule::And), Precedence::And),
    none(), // Class
    none(), // Else
    // False
    rule(Some(PrefixRule::Literal), None, Precedence::None),
    none(), // For
    none(), // Fun
    none(), // If
    // Nil
    rule(Some(PrefixRule::Literal), None, Precedence::None),
    // Or
    rule(None, Some(InfixRule::Or), Precedence::Or),
    none(), // Print
    none(), // Return
    // Super
    rule(Some(PrefixRule::Super), None, Precedence::None),
    // This
    rule(Some(PrefixRule::This), None, Precedence::None),
    // True
    rule(Some(PrefixRule::Literal), None, Precedence::None),
    none(), // Var
    none(), // While
    none(), // Error
    none(), // Eof
];

fn rule_for(kind: TokenKind) -> ParseRule {
    RULES[kind as usize]
}

impl Compiler<'_> {
    pub(crate) fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    /// Parse everything at `precedence` or tighter: run the prefix rule for
    /// the token just consumed, then fold infix operators while they bind at
    /// least as tightly.
    pub(crate) fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix) = rule_for(self.previous.kind).prefix else {
            self.error("Expect expression.");
            return;
        };

        let can_assign = precedence <= Precedence::Assignment;
        self.run_prefix(prefix, can_assign);

        while precedence <= rule_for(self.current.kind).precedence {
            self.advance();
            let infix = rule_for(self.previous.kind)
                .infix
                .expect("rule table: nonzero precedence implies an infix rule");
            self.run_infix(infix, can_assign);
        }

        // A leftover `=` here means the target wasn't assignable
        if can_assign && self.match_token(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn run_prefix(&mut self, rule: PrefixRule, can_assign: bool) {
        match rule {
            PrefixRule::Grouping => self.grouping(),
            PrefixRule::Unary => self.unary(),
            PrefixRule::Number => self.number(),
            PrefixRule::Str => self.string(),
            PrefixRule::Literal => self.literal(),
            PrefixRule::Variable => self.variable(can_assign),
            PrefixRule::This => self.this_(),
            PrefixRule::Super => self.super_(),
        }
    }

    fn run_infix(&mut self, rule: InfixRule, can_assign: bool) {
        match rule {
            InfixRule::Binary => self.binary(),
            InfixRule::And => self.and_(),
            InfixRule::Or => self.or_(),
            InfixRule::Call => self.call(),
            InfixRule::Dot => self.dot(can_assign),
        }
    }

    // ── Prefix rules ─────────────────────────────────────────────────────────

    fn grouping(&mut self) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self) {
        let operator = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match operator {
            TokenKind::Minus => self.emit_op(Opcode::Negate),
            TokenKind::Bang => self.emit_op(Opcode::Not),
            _ => unreachable!("unary rule on non-unary token"),
        }
    }

    fn number(&mut self) {
        match self.previous.lexeme.parse::<f64>() {
            Ok(value) => self.emit_constant(Value::Number(value)),
            Err(_) => self.error("Invalid number literal."),
        }
    }

    fn string(&mut self) {
        // Trim the surrounding quotes
        let lexeme = &self.previous.lexeme;
        let contents = lexeme[1..lexeme.len() - 1].to_string();
        let interned = self.heap.intern(&contents);
        self.emit_constant(Value::Obj(interned));
    }

    fn literal(&mut self) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(Opcode::False),
            TokenKind::True => self.emit_op(Opcode::True),
            TokenKind::Nil => self.emit_op(Opcode::Nil),
            _ => unreachable!("literal rule on non-literal token"),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous.lexeme.clone();
        self.named_variable(&name, can_assign);
    }

    fn this_(&mut self) {
        if !self.in_class() {
            self.error("Can't use 'this' outside of a class.");
            return;
        }
        // `this` is the method's slot-0 local
        self.named_variable("this", false);
    }

    fn super_(&mut self) {
        if !self.in_class() {
            self.error("Can't use 'super' outside of a class.");
        } else if !self.in_subclass() {
            self.error("Can't use 'super' in a class with no superclass.");
        }

        self.consume(TokenKind::Dot, "Expect '.' after 'super'.");
        self.consume(TokenKind::Identifier, "Expect superclass method name.");
        let name = self.previous.lexeme.clone();
        let name_constant = self.identifier_constant(&name);

        // The receiver, then the superclass (the scoped `super` local) go on
        // the stack; the superclass must be on top when the opcode runs
        self.named_variable("this", false);
        if self.match_token(TokenKind::LeftParen) {
            let arg_count = self.argument_list();
            self.named_variable("super", false);
            self.emit_op_byte(Opcode::SuperInvoke, name_constant);
            self.emit_byte(arg_count);
        } else {
            self.named_variable("super", false);
            self.emit_op_byte(Opcode::GetSuper, name_constant);
        }
    }

    // ── Infix rules ──────────────────────────────────────────────────────────

    fn binary(&mut self) {
        let operator = self.previous.kind;
        self.parse_precedence(rule_for(operator).precedence.next());
        match operator {
            TokenKind::Plus => self.emit_op(Opcode::Add),
            TokenKind::Minus => self.emit_op(Opcode::Subtract),
            TokenKind::Star => self.emit_op(Opcode::Multiply),
            TokenKind::Slash => self.emit_op(Opcode::Divide),
            TokenKind::BangEqual => self.emit_ops(Opcode::Equal, Opcode::Not),
            TokenKind::EqualEqual => self.emit_op(Opcode::Equal),
            TokenKind::Greater => self.emit_op(Opcode::Greater),
            TokenKind::GreaterEqual => self.emit_ops(Opcode::Less, Opcode::Not),
            TokenKind::Less => self.emit_op(Opcode::Less),
            TokenKind::LessEqual => self.emit_ops(Opcode::Greater, Opcode::Not),
            _ => unreachable!("binary rule on non-binary token"),
        }
    }

    /// Short-circuit `and`: skip the right operand when the left is falsey
    fn and_(&mut self) {
        let end_jump = self.emit_jump(Opcode::JumpIfFalse);
        self.emit_op(Opcode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    /// Short-circuit `or`: keep the left operand when it is truthy
    fn or_(&mut self) {
        let else_jump = self.emit_jump(Opcode::JumpIfFalse);
        let end_jump = self.emit_jump(Opcode::Jump);
        self.patch_jump(else_jump);
        self.emit_op(Opcode::Pop);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn call(&mut self) {
        let arg_count = self.argument_list();
        self.emit_op_byte(Opcode::Call, arg_count);
    }

    fn dot(&mut self, can_assign: bool) {
        self.consume(TokenKind::Identifier, "Expect property name after '.'.");
        let name = self.previous.lexeme.clone();
        let name_constant = self.identifier_constant(&name);

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_op_byte(Opcode::SetProperty, name_constant);
        } else if self.match_token(TokenKind::LeftParen) {
            // Fused property-access-and-call
            let arg_count = self.argument_list();
            self.emit_op_byte(Opcode::Invoke, name_constant);
            self.emit_byte(arg_count);
        } else {
            self.emit_op_byte(Opcode::GetProperty, name_constant);
        }
    }

    pub(crate) fn argument_list(&mut self) -> u8 {
        let mut arg_count: u8 = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression();
                if arg_count == u8::MAX {
                    self.error("Can't have more than 255 arguments.");
                } else {
                    arg_count += 1;
                }
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after arguments.");
        arg_count
    }
}
