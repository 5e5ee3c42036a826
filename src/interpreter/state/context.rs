//! Execution context for an engine.
//!
//! The `ExecutionContext` holds the registers that sit next to memory: the
//! instruction pointer, the relative base, and execution statistics.

/// Registers and counters for one engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Instruction pointer.
    ip: i64,
    /// Offset applied to relative-mode operands.
    relative_base: i64,
    /// Address of the instruction most recently fetched.
    fetch_pc: i64,
    /// Instructions retired.
    pub instructions: u64,
    /// Values taken by IN instructions.
    pub inputs_consumed: u64,
    /// Values emitted by OUT instructions.
    pub outputs_produced: u64,
}

impl ExecutionContext {
    /// Fresh context: IP and relative base at 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current instruction pointer.
    #[inline]
    pub fn pc(&self) -> i64 {
        self.ip
    }

    /// Overwrite the instruction pointer (taken jump).
    #[inline]
    pub fn set_pc(&mut self, pc: i64) {
        self.ip = pc;
    }

    /// Move past an instruction of `size` words.
    #[inline]
    pub fn advance_pc(&mut self, size: usize) {
        self.ip = self.ip.wrapping_add(size as i64);
    }

    /// Address of the instruction being executed.
    #[inline]
    pub fn fetch_pc(&self) -> i64 {
        self.fetch_pc
    }

    #[inline]
    pub(crate) fn mark_fetch(&mut self) {
        self.fetch_pc = self.ip;
    }

    /// Current relative base.
    #[inline]
    pub fn relative_base(&self) -> i64 {
        self.relative_base
    }

    /// Add `delta` to the relative base.
    #[inline]
    pub fn adjust_relative_base(&mut self, delta: i64) {
        self.relative_base = self.relative_base.wrapping_add(delta);
    }
}
