//! Linear pipelines.

use crate::config::Config;
use crate::interpreter::{Engine, EngineOptions};
use crate::port::{with_capacity, Capacity};
use crate::program::Program;

use super::driver::{join_all, spawn_engine};
use super::CompositionError;

/// A chain of engines, each one's output feeding the next one's input.
///
/// Stage `i` is seeded with `phases[i]`; stage 0 additionally gets the
/// driving signal. Stage 0's input closes after its seeds, so a stage that
/// reads more than it was given faults instead of hanging.
#[derive(Debug, Clone)]
pub struct Pipeline {
    program: Program,
    options: EngineOptions,
    capacity: Capacity,
}

impl Pipeline {
    /// Pipeline with default options and unbounded ports.
    pub fn new(program: Program) -> Self {
        Self {
            program,
            options: EngineOptions::default(),
            capacity: Capacity::Unbounded,
        }
    }

    /// Pipeline using configured engine options and port capacity.
    pub fn from_config(program: Program, config: &Config) -> Self {
        Self {
            program,
            options: EngineOptions::from_config(config),
            capacity: config.port_capacity(),
        }
    }

    /// Override the capacity of the ports between stages.
    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = capacity;
        self
    }

    /// Run one engine per phase and collect everything the last stage emits.
    pub async fn run(&self, phases: &[i64], signal: i64) -> Result<Vec<i64>, CompositionError> {
        if phases.is_empty() {
            return Err(CompositionError::NoStages);
        }
        log::debug!("pipeline: {} stages, phases {:?}", phases.len(), phases);

        let (feed, mut upstream) = with_capacity(self.capacity);
        feed.close();

        let mut handles = Vec::with_capacity(phases.len());
        for (stage, &phase) in phases.iter().enumerate() {
            let mut engine = Engine::with_options(&self.program, &self.options);
            engine.push_input(phase);
            if stage == 0 {
                engine.push_input(signal);
            }
            let (tx, rx) = with_capacity(self.capacity);
            handles.push(spawn_engine(stage, engine, upstream, tx));
            upstream = rx;
        }

        let outputs = upstream.collect().await;
        join_all(handles).await?;
        Ok(outputs)
    }

    /// Run and return the last value the last stage emitted.
    pub async fn run_signal(&self, phases: &[i64], signal: i64) -> Result<i64, CompositionError> {
        self.run(phases, signal)
            .await?
            .last()
            .copied()
            .ok_or(CompositionError::NoResponse)
    }
}
