//! Intcode interpreter.
//!
//! # Architecture
//!
//! The interpreter is organized into several submodules:
//!
//! - [`decode`]: word-to-instruction decoding
//! - [`execute`]: semantics of a single instruction
//! - [`state`]: memory and the register context
//! - [`core`]: the resumable engine and its async port driver
//! - [`fault`]: execution faults
//!
//! # Example
//!
//! ```
//! use intcode_vm::interpreter::Engine;
//!
//! let mut engine = Engine::new([3, 9, 8, 9, 10, 9, 4, 9, 99, -1, 8], 0);
//! assert_eq!(engine.run_with_inputs(&[8]).unwrap(), vec![1]);
//! ```

pub mod core;
pub mod decode;
pub mod execute;
pub mod fault;
pub mod state;

pub use self::core::{
    Engine, EngineOptions, EngineSnapshot, EngineState, Halted, StepResult, Yield,
};
pub use decode::{Instruction, Mode, Opcode};
pub use execute::ExecuteResult;
pub use fault::Fault;
pub use state::{ExecutionContext, Memory};
