//! Execution faults.
//!
//! A fault is fatal to the engine that raised it. Execution is deterministic,
//! so re-running the same program over the same input reproduces the same
//! fault; there is nothing to retry.

use thiserror::Error;

/// Errors raised while executing an Intcode program.
///
/// `pc` is always the address of the instruction word being executed, not
/// the operand cell that triggered the problem.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Opcode not in the instruction table.
    #[error("illegal opcode {code} at pc {pc}")]
    IllegalOpcode {
        /// Low two decimal digits of the instruction word.
        code: i64,
        /// Address of the instruction word.
        pc: i64,
    },

    /// Parameter mode digit other than 0, 1 or 2.
    #[error("illegal parameter mode {mode} at pc {pc}")]
    IllegalParameterMode {
        /// The offending mode digit.
        mode: i64,
        /// Address of the instruction word.
        pc: i64,
    },

    /// Immediate mode used for a destination operand.
    #[error("immediate mode used for a write destination at pc {pc}")]
    IllegalWriteMode {
        /// Address of the instruction word.
        pc: i64,
    },

    /// Negative memory address.
    #[error("negative address {addr}")]
    AddressError {
        /// The address that was dereferenced.
        addr: i64,
    },

    /// Address beyond the configured memory ceiling.
    #[error("address {addr} exceeds memory limit of {limit} cells")]
    MemoryLimitExceeded {
        /// The address that was dereferenced.
        addr: i64,
        /// Maximum number of cells the memory may grow to.
        limit: usize,
    },

    /// The input port closed while an IN instruction was waiting.
    #[error("input closed with no value pending at pc {pc}")]
    InputClosedUnexpectedly {
        /// Address of the IN instruction.
        pc: i64,
    },

    /// The consumer of the output port went away before the value was taken.
    #[error("output port closed by its consumer at pc {pc}")]
    OutputClosed {
        /// Address of the OUT instruction.
        pc: i64,
    },
}

impl Fault {
    /// Short machine-friendly name, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Fault::IllegalOpcode { .. } => "illegal-opcode",
            Fault::IllegalParameterMode { .. } => "illegal-mode",
            Fault::IllegalWriteMode { .. } => "illegal-write-mode",
            Fault::AddressError { .. } => "address-error",
            Fault::MemoryLimitExceeded { .. } => "memory-limit",
            Fault::InputClosedUnexpectedly { .. } => "input-closed",
            Fault::OutputClosed { .. } => "output-closed",
        }
    }
}
