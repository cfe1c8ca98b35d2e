//! Bytecode disassembler
//!
//! Converts chunks back to a human-readable listing. Used for debugging,
//! tests, and `laurel --disasm` output.

use std::fmt::Write;

use super::{Chunk, Opcode};
use crate::heap::Heap;
use crate::object::Obj;
use crate::value::Value;

/// Disassemble a whole chunk under a heading.
///
/// ```text
/// == <script> ==
/// 0000    1 Constant            0 '1'
/// 0002    | Print
/// 0003    2 Return
/// ```
pub fn disassemble(chunk: &Chunk, name: &str, heap: &Heap) -> String {
    let mut output = String::new();
    writeln!(output, "== {} ==", name).unwrap();

    let mut offset = 0;
    while offset < chunk.code.len() {
        let (line, next) = disassemble_instruction(chunk, offset, heap);
        writeln!(output, "{}", line).unwrap();
        offset = next;
    }
    output
}

/// Disassemble the script function and, recursively, every function in its
/// constant pools.
pub fn disassemble_program(script: crate::object::ObjRef, heap: &Heap) -> String {
    let mut output = String::new();
    let mut pending = vec![script];
    while let Some(fn_ref) = pending.pop() {
        let function = heap.function(fn_ref);
        let name = match function.name {
            Some(n) => format!("<fn {}>", heap.as_str(n)),
            None => "<script>".to_string(),
        };
        output.push_str(&disassemble(&function.chunk, &name, heap));
        output.push('\n');
        for constant in &function.chunk.constants {
            if let Value::Obj(r) = constant {
                if matches!(heap.get(*r), Obj::Function(_)) {
                    pending.push(*r);
                }
            }
        }
    }
    output
}

/// Disassemble one instruction.
///
/// Returns the formatted line and the offset of the next instruction.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize, heap: &Heap) -> (String, usize) {
    let mut line = format!("{:04} ", offset);

    // Line column: `|` when unchanged from the previous instruction byte
    if offset > 0 && chunk.line_at(offset) == chunk.line_at(offset - 1) {
        line.push_str("   | ");
    } else {
        write!(line, "{:4} ", chunk.line_at(offset)).unwrap();
    }

    let byte = chunk.code[offset];
    let opcode = match Opcode::try_from(byte) {
        Ok(op) => op,
        Err(_) => {
            write!(line, "<unknown opcode {:#04x}>", byte).unwrap();
            return (line, offset + 1);
        }
    };

    match opcode {
        // No operands
        Opcode::Nil
        | Opcode::True
        | Opcode::False
        | Opcode::Pop
        | Opcode::Equal
        | Opcode::Greater
        | Opcode::Less
        | Opcode::Add
        | Opcode::Subtract
        | Opcode::Multiply
        | Opcode::Divide
        | Opcode::Not
        | Opcode::Negate
        | Opcode::Print
        | Opcode::CloseUpvalue
        | Opcode::Inherit
        | Opcode::Return => {
            write!(line, "{:?}", opcode).unwrap();
            (line, offset + 1)
        }

        // Single constant operand
        Opcode::Constant
        | Opcode::GetGlobal
        | Opcode::DefineGlobal
        | Opcode::SetGlobal
        | Opcode::GetProperty
        | Opcode::SetProperty
        | Opcode::GetSuper
        | Opcode::Class
        | Opcode::Method => {
            let index = chunk.code[offset + 1];
            let value = chunk.constants[index as usize];
            write!(
                line,
                "{:<16} {:4} '{}'",
                format!("{:?}", opcode),
                index,
                value.to_display_string(heap)
            )
            .unwrap();
            (line, offset + 2)
        }

        // Single slot or count operand
        Opcode::GetLocal | Opcode::SetLocal | Opcode::GetUpvalue | Opcode::SetUpvalue
        | Opcode::Call => {
            let operand = chunk.code[offset + 1];
            write!(line, "{:<16} {:4}", format!("{:?}", opcode), operand).unwrap();
            (line, offset + 2)
        }

        // 16-bit jump operand
        Opcode::Jump | Opcode::JumpIfFalse | Opcode::Loop => {
            let high = chunk.code[offset + 1] as usize;
            let low = chunk.code[offset + 2] as usize;
            let distance = (high << 8) | low;
            let target = if opcode == Opcode::Loop {
                offset + 3 - distance
            } else {
                offset + 3 + distance
            };
            write!(
                line,
                "{:<16} {:4} -> {}",
                format!("{:?}", opcode),
                offset,
                target
            )
            .unwrap();
            (line, offset + 3)
        }

        // Name constant plus argument count
        Opcode::Invoke | Opcode::SuperInvoke => {
            let index = chunk.code[offset + 1];
            let arg_count = chunk.code[offset + 2];
            let value = chunk.constants[index as usize];
            write!(
                line,
                "{:<16} ({} args) {:4} '{}'",
                format!("{:?}", opcode),
                arg_count,
                index,
                value.to_display_string(heap)
            )
            .unwrap();
            (line, offset + 3)
        }

        // Function constant plus per-upvalue payload pairs
        Opcode::Closure => {
            let index = chunk.code[offset + 1];
            let value = chunk.constants[index as usize];
            write!(
                line,
                "{:<16} {:4} {}",
                "Closure",
                index,
                value.to_display_string(heap)
            )
            .unwrap();

            let upvalue_count = value
                .as_obj()
                .map(|r| heap.function(r).upvalue_count)
                .unwrap_or(0);
            let mut next = offset + 2;
            for _ in 0..upvalue_count {
                let is_local = chunk.code[next];
                let slot = chunk.code[next + 1];
                write!(
                    line,
                    "\n{:04}    |   {:>10} {}",
                    next,
                    if is_local == 1 { "local" } else { "upvalue" },
                    slot
                )
                .unwrap();
                next += 2;
            }
            (line, next)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Line;

    #[test]
    fn simple_and_constant_instructions_render() {
        let heap = Heap::new();
        let mut chunk = Chunk::new();
        let index = chunk.add_constant(Value::Number(1.5)).unwrap();
        chunk.emit(Opcode::Constant, Line(1));
        chunk.write(index, Line(1));
        chunk.emit(Opcode::Negate, Line(1));
        chunk.emit(Opcode::Return, Line(2));

        let listing = disassemble(&chunk, "test", &heap);
        assert!(listing.starts_with("== test ==\n"));
        assert!(listing.contains("Constant"));
        assert!(listing.contains("'1.5'"));
        assert!(listing.contains("Negate"));

        let (line, next) = disassemble_instruction(&chunk, 0, &heap);
        assert!(line.starts_with("0000 "));
        assert_eq!(next, 2);
    }

    #[test]
    fn jump_targets_are_resolved() {
        let heap = Heap::new();
        let mut chunk = Chunk::new();
        chunk.emit(Opcode::JumpIfFalse, Line(1));
        chunk.write(0x00, Line(1));
        chunk.write(0x02, Line(1));
        chunk.emit(Opcode::Nil, Line(1));
        chunk.emit(Opcode::Pop, Line(1));

        let (line, next) = disassemble_instruction(&chunk, 0, &heap);
        assert!(line.contains("-> 5"));
        assert_eq!(next, 3);
    }

    #[test]
    fn repeated_lines_show_a_pipe() {
        let heap = Heap::new();
        let mut chunk = Chunk::new();
        chunk.emit(Opcode::Nil, Line(1));
        chunk.emit(Opcode::Pop, Line(1));
        let (line, _) = disassemble_instruction(&chunk, 1, &heap);
        assert!(line.contains("   | "));
    }
}
