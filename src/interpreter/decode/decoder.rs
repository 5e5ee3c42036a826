//! Word-to-instruction decoding.

use std::fmt;

use super::{Mode, Opcode};
use crate::interpreter::fault::Fault;

/// A decoded instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// The operation.
    pub opcode: Opcode,
    /// Per-operand modes. Slots past `operand_count()` are always `Position`.
    pub modes: [Mode; 3],
}

impl Instruction {
    /// Mode of operand `k`.
    #[inline]
    pub fn mode(&self, k: usize) -> Mode {
        self.modes[k]
    }

    /// Words occupied by the instruction, including the instruction word.
    #[inline]
    pub fn size(&self) -> usize {
        self.opcode.operand_count() + 1
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for k in 0..self.opcode.operand_count() {
            let sep = if k == 0 { " " } else { ", " };
            write!(f, "{}{}{}", sep, self.modes[k].sigil(), k)?;
        }
        Ok(())
    }
}

/// Split a word into its opcode and three raw mode digits.
///
/// `opcode = word % 100` and mode `k` is the digit at `10^(2+k)`.
/// No validation happens here.
pub fn split_word(word: i64) -> (i64, [i64; 3]) {
    let opcode = word % 100;
    let mut rest = word / 100;
    let mut modes = [0i64; 3];
    for mode in modes.iter_mut() {
        *mode = rest % 10;
        rest /= 10;
    }
    (opcode, modes)
}

/// Decode the word fetched from `pc`.
///
/// Only the modes of operands the opcode actually uses are validated.
pub fn decode(word: i64, pc: i64) -> Result<Instruction, Fault> {
    let (code, digits) = split_word(word);
    let opcode = Opcode::from_code(code).ok_or(Fault::IllegalOpcode { code, pc })?;

    let mut modes = [Mode::Position; 3];
    for (k, slot) in modes.iter_mut().enumerate().take(opcode.operand_count()) {
        *slot = Mode::from_digit(digits[k])
            .ok_or(Fault::IllegalParameterMode { mode: digits[k], pc })?;
    }

    Ok(Instruction { opcode, modes })
}
