//! Operand resolution.
//!
//! Sources resolve to a value, destinations resolve to an address:
//!
//! | Mode | Source | Destination |
//! |------|--------|-------------|
//! | Position | `mem[op]` | `op` |
//! | Immediate | `op` | fault |
//! | Relative | `mem[rb + op]` | `rb + op` |

use crate::interpreter::decode::{Instruction, Mode};
use crate::interpreter::fault::Fault;
use crate::interpreter::state::{ExecutionContext, Memory};

/// Raw operand word `k` of the instruction at the current pc.
#[inline]
fn raw(ctx: &ExecutionContext, memory: &mut Memory, k: usize) -> Result<i64, Fault> {
    memory.read(ctx.pc().wrapping_add(1 + k as i64))
}

/// Value of source operand `k`.
pub(super) fn source(
    instr: &Instruction,
    k: usize,
    ctx: &ExecutionContext,
    memory: &mut Memory,
) -> Result<i64, Fault> {
    let op = raw(ctx, memory, k)?;
    match instr.mode(k) {
        Mode::Position => memory.read(op),
        Mode::Immediate => Ok(op),
        Mode::Relative => memory.read(ctx.relative_base().wrapping_add(op)),
    }
}

/// Address named by destination operand `k`.
pub(super) fn destination(
    instr: &Instruction,
    k: usize,
    ctx: &ExecutionContext,
    memory: &mut Memory,
) -> Result<i64, Fault> {
    let op = raw(ctx, memory, k)?;
    match instr.mode(k) {
        Mode::Position => Ok(op),
        Mode::Relative => Ok(ctx.relative_base().wrapping_add(op)),
        Mode::Immediate => Err(Fault::IllegalWriteMode { pc: ctx.pc() }),
    }
}
