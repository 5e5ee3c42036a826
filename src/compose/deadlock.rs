//! Deadlock detection for composed engines.
//!
//! A composition is stuck when every live stage is blocked on IN and no value
//! is on its way to any of them. Each stage's supply is known exactly:
//!
//! ```text
//! available[i] = seeds[i] + outputs_produced[feeder(i)]
//! ```
//!
//! A stage is *starved* when it is `AwaitingInput` and has consumed all of
//! its supply. A value sitting in a port, in a relay, or in a sender that has
//! not been scheduled yet still counts as supply, so a starved stage can only
//! be woken by a stage that is itself running. When no stage is running,
//! nothing will ever run again.
//!
//! # Usage
//!
//! ```
//! use intcode_vm::compose::deadlock::DeadlockDetector;
//! use intcode_vm::interpreter::{EngineSnapshot, EngineState};
//!
//! let waiting = EngineSnapshot {
//!     state: EngineState::AwaitingInput,
//!     inputs_consumed: 1,
//!     ..Default::default()
//! };
//!
//! // two stages feeding each other, one seed value each, grace of one tick
//! let mut detector = DeadlockDetector::ring(vec![1, 1], 1);
//! assert!(detector.observe(&[waiting, waiting]).is_some());
//! ```

use crate::interpreter::{EngineSnapshot, EngineState};

/// One stage stuck on IN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageWait {
    /// Stage index.
    pub stage: usize,
    /// Address of the blocked IN.
    pub ip: i64,
    /// Values the stage has consumed.
    pub consumed: u64,
}

/// A detected deadlock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlockReport {
    /// Every live stage, each waiting for input.
    pub waiting: Vec<StageWait>,
}

impl DeadlockReport {
    /// Check if this deadlock involves the given stage.
    pub fn involves(&self, stage: usize) -> bool {
        self.waiting.iter().any(|w| w.stage == stage)
    }
}

impl std::fmt::Display for DeadlockReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "deadlock: ")?;
        for (i, wait) in self.waiting.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(
                f,
                "stage {} waits at ip {} after {} inputs",
                wait.stage, wait.ip, wait.consumed
            )?;
        }
        Ok(())
    }
}

/// Watches stage snapshots for a composition that can make no progress.
///
/// A deadlock is reported only after the same stalled picture has been seen
/// on `grace_ticks` consecutive observations.
#[derive(Debug, Clone)]
pub struct DeadlockDetector {
    /// Stage whose output feeds each stage's input, if any.
    feeders: Vec<Option<usize>>,
    /// Values handed to each stage directly by the orchestrator.
    seeds: Vec<u64>,
    /// Consecutive stalled observations required.
    grace_ticks: u32,
    /// Stalled observations so far.
    quiet: u32,
    /// Previous observation.
    last: Option<Vec<EngineSnapshot>>,
}

impl DeadlockDetector {
    /// Create a detector for an arbitrary wiring.
    pub fn new(feeders: Vec<Option<usize>>, seeds: Vec<u64>, grace_ticks: u32) -> Self {
        debug_assert_eq!(feeders.len(), seeds.len());
        Self {
            feeders,
            seeds,
            grace_ticks: grace_ticks.max(1),
            quiet: 0,
            last: None,
        }
    }

    /// Detector for a feedback ring: stage `i` is fed by stage `i - 1` and
    /// stage 0 by the last stage.
    pub fn ring(seeds: Vec<u64>, grace_ticks: u32) -> Self {
        let n = seeds.len();
        let feeders = (0..n).map(|i| Some((i + n - 1) % n)).collect();
        Self::new(feeders, seeds, grace_ticks)
    }

    /// Values that have been made available to `stage`.
    pub fn available(&self, stage: usize, snapshots: &[EngineSnapshot]) -> u64 {
        let seeded = self.seeds.get(stage).copied().unwrap_or(0);
        let fed = self
            .feeders
            .get(stage)
            .copied()
            .flatten()
            .and_then(|feeder| snapshots.get(feeder))
            .map_or(0, |snap| snap.outputs_produced);
        seeded + fed
    }

    /// True if `stage` is blocked on IN with nothing left to read.
    pub fn is_starved(&self, stage: usize, snapshots: &[EngineSnapshot]) -> bool {
        match snapshots.get(stage) {
            Some(snap) => {
                snap.state == EngineState::AwaitingInput
                    && snap.inputs_consumed >= self.available(stage, snapshots)
            }
            None => false,
        }
    }

    /// Feed one observation of every stage.
    ///
    /// Returns a report once the composition has been stalled for the grace
    /// period.
    pub fn observe(&mut self, snapshots: &[EngineSnapshot]) -> Option<DeadlockReport> {
        let live: Vec<usize> = (0..snapshots.len())
            .filter(|&i| !snapshots[i].state.is_terminal())
            .collect();
        let stalled = !live.is_empty() && live.iter().all(|&i| self.is_starved(i, snapshots));

        if !stalled {
            self.quiet = 0;
            self.last = Some(snapshots.to_vec());
            return None;
        }

        if self.last.as_deref() == Some(snapshots) {
            self.quiet += 1;
        } else {
            self.quiet = 1;
            self.last = Some(snapshots.to_vec());
        }
        log::trace!("composition stalled ({}/{} ticks)", self.quiet, self.grace_ticks);

        if self.quiet < self.grace_ticks {
            return None;
        }

        Some(DeadlockReport {
            waiting: live
                .into_iter()
                .map(|stage| StageWait {
                    stage,
                    ip: snapshots[stage].ip,
                    consumed: snapshots[stage].inputs_consumed,
                })
                .collect(),
        })
    }
}
