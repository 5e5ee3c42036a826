//! Feedback loops.

use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use crate::config::{Config, DEFAULT_DEADLOCK_GRACE_TICKS, DEFAULT_TICK_MS};
use crate::interpreter::{Engine, EngineOptions, EngineSnapshot};
use crate::port::{unbounded_port, with_capacity, Capacity};
use crate::program::Program;

use super::deadlock::DeadlockDetector;
use super::driver::{join_all, spawn_engine, EngineHandle};
use super::CompositionError;

/// A pipeline whose last stage also feeds stage 0.
///
/// The orchestrator relays the last stage's output back into stage 0 and
/// remembers the most recent value. When the last stage halts and closes its
/// output, that value is the result.
///
/// Stage 0's input port is unbounded so the relay never blocks. A watchdog
/// samples every stage on each tick and fails the loop with
/// [`CompositionError::Deadlock`] once no stage can make progress.
#[derive(Debug, Clone)]
pub struct FeedbackLoop {
    program: Program,
    options: EngineOptions,
    capacity: Capacity,
    tick: Duration,
    grace_ticks: u32,
}

impl FeedbackLoop {
    /// Feedback loop with default options and unbounded ports.
    pub fn new(program: Program) -> Self {
        Self {
            program,
            options: EngineOptions::default(),
            capacity: Capacity::Unbounded,
            tick: Duration::from_millis(DEFAULT_TICK_MS),
            grace_ticks: DEFAULT_DEADLOCK_GRACE_TICKS,
        }
    }

    /// Feedback loop using configured options, port capacity and watchdog
    /// timing.
    pub fn from_config(program: Program, config: &Config) -> Self {
        Self {
            program,
            options: EngineOptions::from_config(config),
            capacity: config.port_capacity(),
            tick: config.tick_interval(),
            grace_ticks: config.deadlock_grace_ticks(),
        }
    }

    /// Override the capacity of the ports between stages.
    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = capacity;
        self
    }

    /// Override the watchdog tick.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Run the loop to completion and return the final signal.
    pub async fn run(&self, phases: &[i64], signal: i64) -> Result<i64, CompositionError> {
        if phases.is_empty() {
            return Err(CompositionError::NoStages);
        }
        log::debug!("feedback loop: {} stages, phases {:?}", phases.len(), phases);

        let (feed_tx, mut upstream) = unbounded_port();
        let mut feed = Some(feed_tx);

        let mut handles = Vec::with_capacity(phases.len());
        let mut seeds = Vec::with_capacity(phases.len());
        for (stage, &phase) in phases.iter().enumerate() {
            let mut engine = Engine::with_options(&self.program, &self.options);
            engine.push_input(phase);
            seeds.push(1);
            if stage == 0 {
                engine.push_input(signal);
                seeds[0] += 1;
            }
            let (tx, rx) = with_capacity(self.capacity);
            handles.push(spawn_engine(stage, engine, upstream, tx));
            upstream = rx;
        }
        let mut tail = upstream;

        let mut detector = DeadlockDetector::ring(seeds, self.grace_ticks);
        let mut ticker = interval(self.tick.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last = None;
        let mut deadlock = None;

        loop {
            tokio::select! {
                value = tail.recv() => match value {
                    Some(v) => {
                        last = Some(v);
                        if let Some(tx) = feed.as_mut() {
                            // Stage 0 may already have halted; the value is
                            // still the loop's latest signal.
                            if tx.send(v).await.is_err() {
                                log::debug!("feedback: stage 0 gone, dropping {}", v);
                            }
                        }
                    }
                    None => break,
                },
                _ = ticker.tick(), if deadlock.is_none() => {
                    if let Some(report) = detector.observe(&snapshots(&handles)) {
                        log::warn!("feedback loop {}", report);
                        deadlock = Some(report);
                        // Closing stage 0's input unwinds the ring: each
                        // stage faults on end of stream and closes its output.
                        feed = None;
                    }
                }
            }
        }
        drop(feed);

        let joined = join_all(handles).await;
        if let Some(report) = deadlock {
            return Err(CompositionError::Deadlock(report));
        }
        joined?;
        last.ok_or(CompositionError::NoResponse)
    }
}

fn snapshots(handles: &[EngineHandle]) -> Vec<EngineSnapshot> {
    handles.iter().map(EngineHandle::status).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Fault;

    const SAMPLE: &str =
        "3,26,1001,26,-4,26,3,27,1002,27,2,27,1,27,26,27,4,27,1001,28,-1,28,1005,28,6,99,0,0,5";

    #[tokio::test]
    async fn test_feedback_sample() {
        let looped = FeedbackLoop::new(Program::parse(SAMPLE).unwrap());
        assert_eq!(looped.run(&[9, 8, 7, 6, 5], 0).await.unwrap(), 139629729);
    }

    #[tokio::test]
    async fn test_feedback_sample_rendezvous() {
        let looped = FeedbackLoop::new(Program::parse(SAMPLE).unwrap())
            .with_capacity(Capacity::Rendezvous);
        assert_eq!(looped.run(&[9, 8, 7, 6, 5], 0).await.unwrap(), 139629729);
    }

    #[tokio::test]
    async fn test_feedback_second_sample() {
        let program = Program::parse(
            "3,52,1001,52,-5,52,3,53,1,52,56,54,1007,54,5,55,1005,55,26,1001,54,\
             -5,54,1105,1,12,1,53,54,53,1008,54,0,55,1001,55,1,55,2,53,55,53,4,\
             53,1001,56,-1,56,1005,56,6,99,0,0,0,0,10",
        )
        .unwrap();
        let looped = FeedbackLoop::new(program);
        assert_eq!(looped.run(&[9, 7, 8, 5, 6], 0).await.unwrap(), 18216);
    }

    #[tokio::test]
    async fn test_ring_of_readers_deadlocks() {
        let looped = FeedbackLoop::new(Program::parse("3,9,3,9,3,9,99").unwrap())
            .with_tick(Duration::from_millis(1));
        match looped.run(&[1, 2, 3], 0).await {
            Err(CompositionError::Deadlock(report)) => {
                assert_eq!(report.waiting.len(), 3);
                assert_eq!(report.waiting[0].consumed, 2);
                assert_eq!(report.waiting[1].ip, 2);
            }
            other => panic!("expected deadlock, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stage_fault_fails_loop() {
        let looped = FeedbackLoop::new(Program::parse("3,7,3,7,104,1,42,0").unwrap());
        match looped.run(&[0, 0], 0).await {
            Err(CompositionError::Fault { stage, fault }) => {
                assert_eq!(stage, 0);
                assert_eq!(fault, Fault::IllegalOpcode { code: 42, pc: 6 });
            }
            other => panic!("expected fault, got {:?}", other),
        }
    }
}
