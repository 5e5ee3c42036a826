//! Spawning engines as tokio tasks.

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::CompositionError;
use crate::interpreter::{Engine, EngineSnapshot, Fault, Halted};
use crate::port::{PortReceiver, PortSender};

/// An engine that ran to completion.
#[derive(Debug)]
pub struct Finished {
    /// The engine, with its final memory.
    pub engine: Engine,
    /// How `run` ended.
    pub outcome: Result<Halted, Fault>,
}

/// A running engine task.
#[derive(Debug)]
pub struct EngineHandle {
    stage: usize,
    status: watch::Receiver<EngineSnapshot>,
    task: JoinHandle<Finished>,
}

/// Spawn `engine` on the current runtime, wired to `input` and `output`.
///
/// `stage` labels the engine in logs and errors.
pub fn spawn_engine(
    stage: usize,
    mut engine: Engine,
    input: PortReceiver,
    output: PortSender,
) -> EngineHandle {
    let status = engine.subscribe();
    let task = tokio::spawn(async move {
        let outcome = engine.run(input, output).await;
        match &outcome {
            Ok(halted) => {
                log::debug!("stage {} halted after {} instructions", stage, halted.instructions)
            }
            Err(fault) => log::debug!("stage {} faulted: {}", stage, fault),
        }
        Finished { engine, outcome }
    });
    EngineHandle { stage, status, task }
}

impl EngineHandle {
    /// Stage label.
    pub fn stage(&self) -> usize {
        self.stage
    }

    /// Latest published snapshot.
    pub fn status(&self) -> EngineSnapshot {
        *self.status.borrow()
    }

    /// A receiver for snapshot changes.
    pub fn watch(&self) -> watch::Receiver<EngineSnapshot> {
        self.status.clone()
    }

    /// True once the task has returned.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task at its next suspension point.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the task.
    pub async fn join(self) -> Result<Finished, CompositionError> {
        let stage = self.stage;
        self.task.await.map_err(|e| CompositionError::TaskFailed {
            stage,
            message: e.to_string(),
        })
    }

    /// Wait for the task and turn a fault into an error.
    pub async fn finish(self) -> Result<Engine, CompositionError> {
        let stage = self.stage;
        let finished = self.join().await?;
        match finished.outcome {
            Ok(_) => Ok(finished.engine),
            Err(fault) => Err(CompositionError::Fault { stage, fault }),
        }
    }
}

/// Join every handle, reporting the lowest-numbered stage that failed.
pub async fn join_all(handles: Vec<EngineHandle>) -> Result<Vec<Engine>, CompositionError> {
    let mut engines = Vec::with_capacity(handles.len());
    let mut first_error = None;
    for handle in handles {
        match handle.finish().await {
            Ok(engine) => engines.push(engine),
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(engines),
    }
}
