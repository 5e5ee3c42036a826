//! Wiring engines together.
//!
//! Every pattern here runs each engine as its own tokio task, connected by
//! [ports](crate::port). Each engine gets a private copy of the program, so
//! no two engines ever share memory.
//!
//! | Pattern | Type | Result |
//! |---------|------|--------|
//! | Linear pipeline | [`Pipeline`] | everything the last stage emits |
//! | Feedback loop | [`FeedbackLoop`] | last value before the last stage halts |
//! | Call/response | [`Inquirer`] | first value of a fresh engine |
//! | Interactive control | [`Session`] | one [`Turn`] per control batch |
//!
//! # Example
//!
//! ```
//! use intcode_vm::compose::Pipeline;
//! use intcode_vm::program::Program;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let program = Program::parse("3,15,3,16,1002,16,10,16,1,16,15,15,4,15,99,0,0").unwrap();
//! let signal = Pipeline::new(program).run_signal(&[4, 3, 2, 1, 0], 0).await.unwrap();
//! assert_eq!(signal, 43210);
//! # }
//! ```

pub mod deadlock;
mod driver;
mod feedback;
mod inquiry;
mod phases;
mod pipeline;
mod session;

pub use deadlock::{DeadlockDetector, DeadlockReport};
pub use driver::{join_all, spawn_engine, EngineHandle, Finished};
pub use feedback::FeedbackLoop;
pub use inquiry::Inquirer;
pub use phases::{best_signal, permutations};
pub use pipeline::Pipeline;
pub use session::{Session, Turn};

use thiserror::Error;

use crate::interpreter::Fault;

/// Errors from a composition.
#[derive(Debug, Error)]
pub enum CompositionError {
    /// A composition needs at least one stage.
    #[error("composition has no stages")]
    NoStages,

    /// A stage faulted. The whole composition is treated as failed.
    #[error("stage {stage} faulted: {fault}")]
    Fault {
        /// Index of the faulting stage.
        stage: usize,
        /// The fault it raised.
        #[source]
        fault: Fault,
    },

    /// Every live stage is waiting for input that can never arrive.
    #[error("{0}")]
    Deadlock(DeadlockReport),

    /// The engine terminated without producing the expected value.
    #[error("engine halted without producing a response")]
    NoResponse,

    /// An engine task panicked or was cancelled.
    #[error("stage {stage} task failed: {message}")]
    TaskFailed {
        /// Index of the stage.
        stage: usize,
        /// Join error text.
        message: String,
    },
}

impl CompositionError {
    /// The engine fault behind this error, if any.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            CompositionError::Fault { fault, .. } => Some(fault),
            _ => None,
        }
    }
}
