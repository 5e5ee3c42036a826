//! Interactive, turn-based control of a running engine.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::{Config, DEFAULT_TICK_MS};
use crate::interpreter::{Engine, EngineSnapshot, EngineState};
use crate::port::{unbounded_port, with_capacity, Capacity, PortReceiver, PortSender};

use super::driver::{spawn_engine, EngineHandle};
use super::CompositionError;

/// Output of one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Turn {
    /// Everything the engine emitted during the turn.
    pub outputs: Vec<i64>,
    /// The engine halted; no further turns are possible.
    pub halted: bool,
}

/// An engine running as its own task, controlled in turns.
///
/// Each [`exchange`](Self::exchange) sends a batch of control values and
/// then collects output until the engine has consumed the whole batch and
/// is blocked asking for more, or until it halts. The wait multiplexes
/// output, engine state changes, engine termination and a periodic tick, so
/// "nothing to read yet" is never confused with "finished".
pub struct Session {
    control: Option<PortSender>,
    output: PortReceiver,
    status: watch::Receiver<EngineSnapshot>,
    handle: Option<EngineHandle>,
    sent: u64,
    tick: Duration,
    partial: Vec<i64>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("sent", &self.sent)
            .field("status", &*self.status.borrow())
            .field("finished", &self.handle.is_none())
            .finish()
    }
}

impl Session {
    /// Start `engine` with an unbounded output port.
    pub fn start(engine: Engine) -> Self {
        Self::start_with(engine, Capacity::Unbounded, Duration::from_millis(DEFAULT_TICK_MS))
    }

    /// Start `engine` with the configured output capacity and tick.
    pub fn from_config(engine: Engine, config: &Config) -> Self {
        Self::start_with(engine, config.port_capacity(), config.tick_interval())
    }

    /// Start `engine` with explicit output capacity and tick.
    ///
    /// The control port is always unbounded so a batch never blocks the
    /// orchestrator while the engine is busy emitting. Must be called from
    /// within a tokio runtime.
    pub fn start_with(engine: Engine, capacity: Capacity, tick: Duration) -> Self {
        let sent = engine.context().inputs_consumed + engine.pending_input() as u64;
        let (control, input) = unbounded_port();
        let (out_tx, output) = with_capacity(capacity);
        let handle = spawn_engine(0, engine, input, out_tx);
        Self {
            control: Some(control),
            status: handle.watch(),
            output,
            handle: Some(handle),
            sent,
            tick,
            partial: Vec::new(),
        }
    }

    /// Latest engine snapshot.
    pub fn status(&self) -> EngineSnapshot {
        *self.status.borrow()
    }

    /// True once the engine has halted or faulted.
    pub fn is_finished(&self) -> bool {
        self.handle.is_none()
    }

    /// Send `batch` and collect output until the engine wants more input or
    /// halts.
    ///
    /// A session whose engine already halted returns an empty halted turn.
    /// If the engine faults, the output it emitted before the fault is kept
    /// in [`partial_outputs`](Self::partial_outputs).
    pub async fn exchange(&mut self, batch: &[i64]) -> Result<Turn, CompositionError> {
        let mut turn = Turn::default();
        self.partial.clear();
        if self.handle.is_none() {
            turn.halted = true;
            return Ok(turn);
        }

        if let Some(control) = self.control.as_mut() {
            for &value in batch {
                if control.send(value).await.is_err() {
                    log::debug!("session: engine stopped reading control input");
                    break;
                }
                self.sent += 1;
            }
        }

        let mut ticker = interval(self.tick.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut watching = true;

        loop {
            tokio::select! {
                biased;
                value = self.output.recv() => match value {
                    Some(v) => turn.outputs.push(v),
                    None => {
                        if let Err(err) = self.finish().await {
                            log::debug!("session: {} outputs before failure", turn.outputs.len());
                            self.partial = turn.outputs;
                            return Err(err);
                        }
                        turn.halted = true;
                        return Ok(turn);
                    }
                },
                changed = self.status.changed(), if watching => {
                    if changed.is_err() {
                        watching = false;
                    }
                }
                _ = ticker.tick() => {}
            }

            if self.is_waiting() {
                turn.outputs.extend(self.output.drain());
                log::trace!("session turn: {} outputs", turn.outputs.len());
                return Ok(turn);
            }
        }
    }

    /// Output of the last turn that ended in an error.
    pub fn partial_outputs(&self) -> &[i64] {
        &self.partial
    }

    /// Blocked on IN with every control value consumed.
    fn is_waiting(&self) -> bool {
        let snap = self.status.borrow();
        snap.state == EngineState::AwaitingInput && snap.inputs_consumed >= self.sent
    }

    async fn finish(&mut self) -> Result<(), CompositionError> {
        self.control = None;
        match self.handle.take() {
            Some(handle) => handle.finish().await.map(|_| ()),
            None => Ok(()),
        }
    }

    /// Close the control port and wait for the engine.
    ///
    /// Returns the engine if it halted. An engine still waiting for input
    /// sees end of stream and faults.
    pub async fn shutdown(mut self) -> Result<Option<Engine>, CompositionError> {
        self.control = None;
        match self.handle.take() {
            Some(handle) => handle.finish().await.map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Fault;

    /// Doubles each input until it reads a zero.
    fn doubler() -> Engine {
        let mut image = vec![3, 20, 1006, 20, 14, 1002, 20, 2, 21, 4, 21, 1105, 1, 0, 99];
        image.resize(22, 0);
        Engine::new(image, 0)
    }

    #[tokio::test]
    async fn test_turns() {
        let mut session = Session::start(doubler());

        let turn = session.exchange(&[]).await.unwrap();
        assert_eq!(turn, Turn { outputs: vec![], halted: false });

        let turn = session.exchange(&[5]).await.unwrap();
        assert_eq!(turn, Turn { outputs: vec![10], halted: false });

        let turn = session.exchange(&[3, 4]).await.unwrap();
        assert_eq!(turn, Turn { outputs: vec![6, 8], halted: false });

        let turn = session.exchange(&[0]).await.unwrap();
        assert_eq!(turn, Turn { outputs: vec![], halted: true });
        assert!(session.is_finished());

        let turn = session.exchange(&[1]).await.unwrap();
        assert!(turn.halted);
    }

    #[tokio::test]
    async fn test_rendezvous_output() {
        let mut session =
            Session::start_with(doubler(), Capacity::Rendezvous, Duration::from_millis(5));
        let turn = session.exchange(&[1, 2, 3]).await.unwrap();
        assert_eq!(turn.outputs, vec![2, 4, 6]);
        assert!(!turn.halted);
    }

    #[tokio::test]
    async fn test_pre_queued_input_counts() {
        let mut engine = doubler();
        engine.push_input(21);
        let mut session = Session::start(engine);
        let turn = session.exchange(&[]).await.unwrap();
        assert_eq!(turn.outputs, vec![42]);
    }

    #[tokio::test]
    async fn test_prints_then_halts() {
        let mut session = Session::start(Engine::new([104, 7, 104, 8, 99], 0));
        let turn = session.exchange(&[]).await.unwrap();
        assert_eq!(turn, Turn { outputs: vec![7, 8], halted: true });
    }

    #[tokio::test]
    async fn test_fault_surfaces() {
        let mut session = Session::start(Engine::new([3, 5, 1105, 1, 50, 0], 0));
        session.exchange(&[]).await.unwrap();
        let err = session.exchange(&[1]).await.unwrap_err();
        assert_eq!(err.fault(), Some(&Fault::IllegalOpcode { code: 0, pc: 50 }));
    }

    #[tokio::test]
    async fn test_fault_keeps_partial_outputs() {
        // reads, prints 5, then jumps into zeroed memory
        let mut session = Session::start(Engine::new([3, 9, 104, 5, 1105, 1, 50, 0, 0, 0], 0));
        session.exchange(&[]).await.unwrap();
        let err = session.exchange(&[1]).await.unwrap_err();
        assert_eq!(err.fault(), Some(&Fault::IllegalOpcode { code: 0, pc: 50 }));
        assert_eq!(session.partial_outputs(), &[5]);
        assert!(session.is_finished());
    }

    #[tokio::test]
    async fn test_shutdown_while_waiting() {
        let mut session = Session::start(doubler());
        session.exchange(&[]).await.unwrap();
        let err = session.shutdown().await.unwrap_err();
        assert_eq!(err.fault(), Some(&Fault::InputClosedUnexpectedly { pc: 0 }));
    }
}
