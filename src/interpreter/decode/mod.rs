//! Instruction decoder for Intcode.
//!
//! # Instruction Format
//!
//! An instruction is a single memory word followed by its operands:
//!
//! | Digits | Meaning |
//! |--------|---------|
//! | units + tens | opcode (`word % 100`) |
//! | hundreds | mode of operand 0 |
//! | thousands | mode of operand 1 |
//! | ten-thousands | mode of operand 2 |
//!
//! Missing mode digits mean position mode, so `1002` is a MUL whose second
//! operand is immediate.
//!
//! Words are decoded fresh on every fetch. Programs rewrite their own operand
//! cells while running and the decoder must see the new values.
//!
//! # Example
//!
//! ```
//! use intcode_vm::interpreter::decode::{decode, Mode, Opcode};
//!
//! let instr = decode(1002, 0).unwrap();
//! assert_eq!(instr.opcode, Opcode::Mul);
//! assert_eq!(instr.mode(0), Mode::Position);
//! assert_eq!(instr.mode(1), Mode::Immediate);
//! assert_eq!(instr.size(), 4);
//! ```

mod decoder;

pub use decoder::{decode, split_word, Instruction};

use std::fmt;

/// Operation selected by the low two digits of an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// `dst := a + b`
    Add,
    /// `dst := a * b`
    Mul,
    /// `dst := receive(input)`
    Input,
    /// `send(output, a)`
    Output,
    /// Jump to `tgt` when `a != 0`.
    JumpIfTrue,
    /// Jump to `tgt` when `a == 0`.
    JumpIfFalse,
    /// `dst := (a < b) as i64`
    LessThan,
    /// `dst := (a == b) as i64`
    Equals,
    /// `relative_base += a`
    AdjustRelativeBase,
    /// Close output and stop.
    Halt,
}

impl Opcode {
    /// Look up an opcode by its numeric code.
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            1 => Opcode::Add,
            2 => Opcode::Mul,
            3 => Opcode::Input,
            4 => Opcode::Output,
            5 => Opcode::JumpIfTrue,
            6 => Opcode::JumpIfFalse,
            7 => Opcode::LessThan,
            8 => Opcode::Equals,
            9 => Opcode::AdjustRelativeBase,
            99 => Opcode::Halt,
            _ => return None,
        })
    }

    /// Numeric code of this opcode.
    pub fn code(self) -> i64 {
        match self {
            Opcode::Add => 1,
            Opcode::Mul => 2,
            Opcode::Input => 3,
            Opcode::Output => 4,
            Opcode::JumpIfTrue => 5,
            Opcode::JumpIfFalse => 6,
            Opcode::LessThan => 7,
            Opcode::Equals => 8,
            Opcode::AdjustRelativeBase => 9,
            Opcode::Halt => 99,
        }
    }

    /// Number of operand words following the instruction word.
    pub fn operand_count(self) -> usize {
        match self {
            Opcode::Add | Opcode::Mul | Opcode::LessThan | Opcode::Equals => 3,
            Opcode::JumpIfTrue | Opcode::JumpIfFalse => 2,
            Opcode::Input | Opcode::Output | Opcode::AdjustRelativeBase => 1,
            Opcode::Halt => 0,
        }
    }

    /// Assembly-style mnemonic, for trace output.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Mul => "mul",
            Opcode::Input => "in",
            Opcode::Output => "out",
            Opcode::JumpIfTrue => "jnz",
            Opcode::JumpIfFalse => "jz",
            Opcode::LessThan => "lt",
            Opcode::Equals => "eq",
            Opcode::AdjustRelativeBase => "arb",
            Opcode::Halt => "halt",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Addressing mode of one operand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Operand is an address to dereference.
    #[default]
    Position,
    /// Operand is the value itself. Never valid for a destination.
    Immediate,
    /// Operand is an offset from the relative base.
    Relative,
}

impl Mode {
    /// Map a mode digit to a mode.
    pub fn from_digit(digit: i64) -> Option<Self> {
        match digit {
            0 => Some(Mode::Position),
            1 => Some(Mode::Immediate),
            2 => Some(Mode::Relative),
            _ => None,
        }
    }

    /// Operand prefix used by the trace formatter.
    fn sigil(self) -> &'static str {
        match self {
            Mode::Position => "@",
            Mode::Immediate => "#",
            Mode::Relative => "~",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_round_trip() {
        for code in [1, 2, 3, 4, 5, 6, 7, 8, 9, 99] {
            let op = Opcode::from_code(code).unwrap();
            assert_eq!(op.code(), code);
        }
        assert_eq!(Opcode::from_code(0), None);
        assert_eq!(Opcode::from_code(10), None);
        assert_eq!(Opcode::from_code(98), None);
    }

    #[test]
    fn test_operand_counts() {
        assert_eq!(Opcode::Add.operand_count(), 3);
        assert_eq!(Opcode::JumpIfFalse.operand_count(), 2);
        assert_eq!(Opcode::AdjustRelativeBase.operand_count(), 1);
        assert_eq!(Opcode::Halt.operand_count(), 0);
    }

    #[test]
    fn test_mode_digits() {
        assert_eq!(Mode::from_digit(0), Some(Mode::Position));
        assert_eq!(Mode::from_digit(2), Some(Mode::Relative));
        assert_eq!(Mode::from_digit(3), None);
        assert_eq!(Mode::default(), Mode::Position);
    }
}
