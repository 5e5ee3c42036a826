//! The Intcode engine.
//!
//! The `Engine` ties together memory, the decoder and the executor to run a
//! single program. It manages the execution loop, suspends on input, and
//! tracks engine state.
//!
//! # Execution Model
//!
//! 1. Fetch the word at the instruction pointer
//! 2. Decode it into an opcode and operand modes
//! 3. Execute
//! 4. Handle the result (advance, jump, yield output, wait for input, or halt)
//!
//! An IN with nothing queued does not execute. The engine moves to
//! `AwaitingInput` and the same instruction is retried once input arrives.
//!
//! # Example
//!
//! ```
//! use intcode_vm::interpreter::{Engine, Yield};
//!
//! let mut engine = Engine::new([3, 0, 4, 0, 99], 0);
//! assert_eq!(engine.resume().unwrap(), Yield::NeedsInput);
//! engine.push_input(42);
//! assert_eq!(engine.resume().unwrap(), Yield::Output(42));
//! assert_eq!(engine.resume().unwrap(), Yield::Halted);
//! ```

mod interpreter;

pub use interpreter::{
    Engine, EngineOptions, EngineSnapshot, EngineState, Halted, StepResult, Yield,
};
