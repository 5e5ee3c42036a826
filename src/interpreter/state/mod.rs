//! Engine state: memory plus the register context.
//!
//! | Piece | Type | Purpose |
//! |-------|------|---------|
//! | Memory | [`Memory`] | Growable `i64` cells, program and data |
//! | Instruction pointer | [`ExecutionContext`] | Next instruction to fetch |
//! | Relative base | [`ExecutionContext`] | Offset for relative-mode operands |
//!
//! # Example
//!
//! ```
//! use intcode_vm::interpreter::state::{ExecutionContext, Memory};
//!
//! let mut mem = Memory::new(&[1, 0, 0, 0, 99], 0);
//! mem.write(2000, 42).unwrap();
//! assert_eq!(mem.read(1999).unwrap(), 0);
//!
//! let mut ctx = ExecutionContext::new();
//! ctx.adjust_relative_base(2000);
//! assert_eq!(mem.read(ctx.relative_base()).unwrap(), 42);
//! ```

mod context;
mod memory;

pub use context::ExecutionContext;
pub use memory::{Memory, DEFAULT_MAX_CELLS};
