//! Call/response with a fresh engine per question.

use crate::config::Config;
use crate::interpreter::{Engine, EngineOptions, Fault, Yield};
use crate::port::unbounded_port;
use crate::program::Program;

use super::driver::spawn_engine;
use super::CompositionError;

/// Asks a program questions, one throwaway engine per question.
///
/// Every [`ask`](Self::ask) builds a new engine over a private copy of the
/// program, feeds it a fixed input sequence and takes the first value it
/// emits. Nothing one question does to memory is visible to the next.
#[derive(Debug, Clone)]
pub struct Inquirer {
    program: Program,
    options: EngineOptions,
    patches: Vec<(i64, i64)>,
}

impl Inquirer {
    /// Inquirer with default engine options.
    pub fn new(program: Program) -> Self {
        Self {
            program,
            options: EngineOptions::default(),
            patches: Vec::new(),
        }
    }

    /// Inquirer using configured engine options.
    pub fn from_config(program: Program, config: &Config) -> Self {
        Self {
            options: EngineOptions::from_config(config),
            ..Self::new(program)
        }
    }

    /// Write `value` at `addr` in every engine before it runs.
    pub fn with_patch(mut self, addr: i64, value: i64) -> Self {
        self.patches.push((addr, value));
        self
    }

    fn fresh_engine(&self, inputs: &[i64]) -> Result<Engine, CompositionError> {
        let mut engine = Engine::with_options(&self.program, &self.options);
        for &(addr, value) in &self.patches {
            engine
                .poke(addr, value)
                .map_err(|fault| CompositionError::Fault { stage: 0, fault })?;
        }
        for &value in inputs {
            engine.push_input(value);
        }
        Ok(engine)
    }

    /// Run a fresh engine as a task over `inputs` and return its first output.
    ///
    /// The engine is stopped as soon as it answers. Asking for more input
    /// than given is an `InputClosedUnexpectedly` fault.
    pub async fn ask(&self, inputs: &[i64]) -> Result<i64, CompositionError> {
        let engine = self.fresh_engine(inputs)?;
        let (feed, input) = unbounded_port();
        feed.close();
        let (output, mut answers) = unbounded_port();

        let handle = spawn_engine(0, engine, input, output);
        match answers.recv().await {
            Some(answer) => {
                handle.abort();
                Ok(answer)
            }
            None => {
                handle.finish().await?;
                Err(CompositionError::NoResponse)
            }
        }
    }

    /// Same as [`ask`](Self::ask), driven inline on the calling thread.
    ///
    /// Suited to scans that ask thousands of questions.
    pub fn ask_now(&self, inputs: &[i64]) -> Result<i64, CompositionError> {
        let mut engine = self.fresh_engine(inputs)?;
        let fault = |fault| CompositionError::Fault { stage: 0, fault };
        match engine.resume().map_err(fault)? {
            Yield::Output(answer) => Ok(answer),
            Yield::Halted => Err(CompositionError::NoResponse),
            Yield::NeedsInput => {
                let pc = engine.context().pc();
                Err(fault(Fault::InputClosedUnexpectedly { pc }))
            }
        }
    }
}
