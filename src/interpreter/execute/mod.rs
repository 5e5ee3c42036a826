//! Execution of a single decoded instruction.
//!
//! | Group | Opcodes |
//! |-------|---------|
//! | Arithmetic | ADD, MUL |
//! | Compare | LT, EQ |
//! | Control | JNZ, JZ, HALT |
//! | I/O | IN, OUT |
//! | Addressing | ARB |
//!
//! `execute` never touches the instruction pointer. It reports what the
//! caller should do next through [`ExecuteResult`]; the engine then advances,
//! jumps, yields or halts. Arithmetic wraps on overflow.

mod operands;

use std::collections::VecDeque;

use crate::interpreter::decode::{Instruction, Opcode};
use crate::interpreter::fault::Fault;
use crate::interpreter::state::{ExecutionContext, Memory};

use operands::{destination, source};

/// Outcome of executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteResult {
    /// Advance past the instruction.
    Continue,
    /// Set the instruction pointer to `target`.
    Jump {
        /// New instruction pointer.
        target: i64,
    },
    /// IN found no pending input. Nothing was modified; re-execute once
    /// input is available.
    NeedsInput,
    /// OUT produced a value. Advance, then deliver it.
    Output(i64),
    /// HALT.
    Halt,
}

/// Execute `instr` located at `ctx.pc()`.
///
/// IN takes its value from the front of `inbox`.
pub fn execute(
    instr: &Instruction,
    ctx: &mut ExecutionContext,
    memory: &mut Memory,
    inbox: &mut VecDeque<i64>,
) -> Result<ExecuteResult, Fault> {
    match instr.opcode {
        Opcode::Add => binary(instr, ctx, memory, i64::wrapping_add),
        Opcode::Mul => binary(instr, ctx, memory, i64::wrapping_mul),
        Opcode::LessThan => binary(instr, ctx, memory, |a, b| (a < b) as i64),
        Opcode::Equals => binary(instr, ctx, memory, |a, b| (a == b) as i64),

        Opcode::Input => {
            // Resolve the destination first so a bad mode faults without
            // swallowing a value.
            let dst = destination(instr, 0, ctx, memory)?;
            match inbox.pop_front() {
                Some(value) => {
                    memory.write(dst, value)?;
                    ctx.inputs_consumed += 1;
                    Ok(ExecuteResult::Continue)
                }
                None => Ok(ExecuteResult::NeedsInput),
            }
        }

        Opcode::Output => {
            let value = source(instr, 0, ctx, memory)?;
            ctx.outputs_produced += 1;
            Ok(ExecuteResult::Output(value))
        }

        Opcode::JumpIfTrue => jump(instr, ctx, memory, |a| a != 0),
        Opcode::JumpIfFalse => jump(instr, ctx, memory, |a| a == 0),

        Opcode::AdjustRelativeBase => {
            let delta = source(instr, 0, ctx, memory)?;
            ctx.adjust_relative_base(delta);
            Ok(ExecuteResult::Continue)
        }

        Opcode::Halt => Ok(ExecuteResult::Halt),
    }
}

/// Two sources, one destination.
fn binary(
    instr: &Instruction,
    ctx: &ExecutionContext,
    memory: &mut Memory,
    op: impl FnOnce(i64, i64) -> i64,
) -> Result<ExecuteResult, Fault> {
    let a = source(instr, 0, ctx, memory)?;
    let b = source(instr, 1, ctx, memory)?;
    let dst = destination(instr, 2, ctx, memory)?;
    memory.write(dst, op(a, b))?;
    Ok(ExecuteResult::Continue)
}

/// Conditional jump on the first operand.
fn jump(
    instr: &Instruction,
    ctx: &ExecutionContext,
    memory: &mut Memory,
    taken: impl FnOnce(i64) -> bool,
) -> Result<ExecuteResult, Fault> {
    let a = source(instr, 0, ctx, memory)?;
    if taken(a) {
        let target = source(instr, 1, ctx, memory)?;
        Ok(ExecuteResult::Jump { target })
    } else {
        Ok(ExecuteResult::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::decode::decode;

    fn exec_at_zero(
        image: &[i64],
        inbox: &mut VecDeque<i64>,
    ) -> (Result<ExecuteResult, Fault>, Memory, ExecutionContext) {
        let mut mem = Memory::new(image, 0);
        let mut ctx = ExecutionContext::new();
        let instr = decode(image[0], 0).unwrap();
        let result = execute(&instr, &mut ctx, &mut mem, inbox);
        (result, mem, ctx)
    }

    #[test]
    fn test_add_position() {
        let (result, mem, _) = exec_at_zero(&[1, 0, 0, 0, 99], &mut VecDeque::new());
        assert_eq!(result, Ok(ExecuteResult::Continue));
        assert_eq!(mem.as_slice(), &[2, 0, 0, 0, 99]);
    }

    #[test]
    fn test_mul_immediate() {
        let (result, mem, _) = exec_at_zero(&[1102, 6, 7, 4, 0], &mut VecDeque::new());
        assert_eq!(result, Ok(ExecuteResult::Continue));
        assert_eq!(mem.as_slice()[4], 42);
    }

    #[test]
    fn test_arithmetic_wraps() {
        let (result, mem, _) = exec_at_zero(&[1101, i64::MAX, 1, 4, 0], &mut VecDeque::new());
        assert_eq!(result, Ok(ExecuteResult::Continue));
        assert_eq!(mem.as_slice()[4], i64::MIN);
    }

    #[test]
    fn test_compare() {
        let (_, mem, _) = exec_at_zero(&[1107, 3, 5, 4, 9], &mut VecDeque::new());
        assert_eq!(mem.as_slice()[4], 1);
        let (_, mem, _) = exec_at_zero(&[1108, 3, 5, 4, 9], &mut VecDeque::new());
        assert_eq!(mem.as_slice()[4], 0);
    }

    #[test]
    fn test_input_consumes_inbox() {
        let mut inbox = VecDeque::from(vec![42, 43]);
        let (result, mem, ctx) = exec_at_zero(&[3, 0, 99], &mut inbox);
        assert_eq!(result, Ok(ExecuteResult::Continue));
        assert_eq!(mem.as_slice()[0], 42);
        assert_eq!(ctx.inputs_consumed, 1);
        assert_eq!(inbox, VecDeque::from(vec![43]));
    }

    #[test]
    fn test_input_without_value_needs_input() {
        let (result, mem, ctx) = exec_at_zero(&[3, 0, 99], &mut VecDeque::new());
        assert_eq!(result, Ok(ExecuteResult::NeedsInput));
        assert_eq!(mem.as_slice(), &[3, 0, 99]);
        assert_eq!(ctx.inputs_consumed, 0);
    }

    #[test]
    fn test_input_immediate_destination_keeps_value() {
        let mut inbox = VecDeque::from(vec![5]);
        let (result, _, _) = exec_at_zero(&[103, 0, 99], &mut inbox);
        assert_eq!(result, Err(Fault::IllegalWriteMode { pc: 0 }));
        assert_eq!(inbox.len(), 1);
    }

    #[test]
    fn test_output() {
        let (result, _, ctx) = exec_at_zero(&[104, -17, 99], &mut VecDeque::new());
        assert_eq!(result, Ok(ExecuteResult::Output(-17)));
        assert_eq!(ctx.outputs_produced, 1);
    }

    #[test]
    fn test_jumps() {
        let (result, _, _) = exec_at_zero(&[1105, 1, 9], &mut VecDeque::new());
        assert_eq!(result, Ok(ExecuteResult::Jump { target: 9 }));
        let (result, _, _) = exec_at_zero(&[1105, 0, 9], &mut VecDeque::new());
        assert_eq!(result, Ok(ExecuteResult::Continue));
        let (result, _, _) = exec_at_zero(&[1106, 0, 9], &mut VecDeque::new());
        assert_eq!(result, Ok(ExecuteResult::Jump { target: 9 }));
    }

    #[test]
    fn test_adjust_relative_base() {
        let (result, _, ctx) = exec_at_zero(&[109, -20], &mut VecDeque::new());
        assert_eq!(result, Ok(ExecuteResult::Continue));
        assert_eq!(ctx.relative_base(), -20);
    }

    #[test]
    fn test_halt() {
        let (result, _, _) = exec_at_zero(&[99], &mut VecDeque::new());
        assert_eq!(result, Ok(ExecuteResult::Halt));
    }
}
