//! Engine implementation.
//!
//! The engine manages the fetch-decode-execute loop for one Intcode program.

use std::collections::VecDeque;

use tokio::sync::watch;

use crate::config::Config;
use crate::interpreter::decode::{decode, Instruction};
use crate::interpreter::execute::{execute, ExecuteResult};
use crate::interpreter::fault::Fault;
use crate::interpreter::state::{ExecutionContext, Memory, DEFAULT_MAX_CELLS};
use crate::port::{PortReceiver, PortSender};

/// Engine execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// Executing, or ready to execute the next instruction.
    #[default]
    Running,
    /// Stopped on an IN with no input queued.
    AwaitingInput,
    /// Executed HALT.
    Halted,
    /// Raised a fault.
    Faulted,
}

impl EngineState {
    /// True for `Halted` and `Faulted`.
    pub fn is_terminal(self) -> bool {
        matches!(self, EngineState::Halted | EngineState::Faulted)
    }
}

/// Why [`Engine::resume`] returned control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Yield {
    /// Blocked on IN. Queue a value with [`Engine::push_input`].
    NeedsInput,
    /// OUT produced a value.
    Output(i64),
    /// The program halted.
    Halted,
}

/// Result of a single [`Engine::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// Instruction retired, nothing to report.
    Continue,
    /// IN has nothing to consume; the instruction did not execute.
    NeedsInput,
    /// OUT produced a value.
    Output(i64),
    /// HALT executed, or the engine had already halted.
    Halted,
}

/// Normal termination of [`Engine::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Halted {
    /// Instructions retired over the engine's lifetime.
    pub instructions: u64,
}

/// Point-in-time view of an engine, published to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineSnapshot {
    /// Execution state.
    pub state: EngineState,
    /// Instructions retired.
    pub instructions: u64,
    /// Values consumed by IN.
    pub inputs_consumed: u64,
    /// Values produced by OUT.
    pub outputs_produced: u64,
    /// Instruction pointer.
    pub ip: i64,
}

/// Construction options for [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Zero cells appended after the program image.
    pub extra_cells: usize,
    /// Memory growth ceiling in cells.
    pub max_memory_cells: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            extra_cells: 0,
            max_memory_cells: DEFAULT_MAX_CELLS,
        }
    }
}

impl EngineOptions {
    /// Options taken from a loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            extra_cells: config.extra_cells(),
            max_memory_cells: config.max_memory_cells(),
        }
    }
}

/// An Intcode virtual machine.
///
/// Owns a private copy of its program. The engine can be driven three ways:
///
/// - [`step`](Self::step): one instruction at a time
/// - [`resume`](Self::resume) / [`push_input`](Self::push_input): a
///   resumable state machine driven by the caller
/// - [`run`](Self::run): an async task wired to two ports
pub struct Engine {
    /// Program and data.
    memory: Memory,
    /// Instruction pointer, relative base, counters.
    ctx: ExecutionContext,
    /// Current state.
    state: EngineState,
    /// Input queued for IN.
    inbox: VecDeque<i64>,
    /// Set once the engine faults.
    fault: Option<Fault>,
    /// Snapshot publisher, created on first subscribe.
    monitor: Option<watch::Sender<EngineSnapshot>>,
    /// Last decoded instruction (for debugging).
    last_instruction: Option<Instruction>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .field("ip", &self.ctx.pc())
            .field("relative_base", &self.ctx.relative_base())
            .field("memory_cells", &self.memory.len())
            .field("pending_input", &self.inbox.len())
            .finish()
    }
}

impl Engine {
    /// Create an engine over a copy of `program` followed by `extra_cells`
    /// zero cells.
    pub fn new(program: impl AsRef<[i64]>, extra_cells: usize) -> Self {
        Self::with_options(
            program,
            &EngineOptions {
                extra_cells,
                ..EngineOptions::default()
            },
        )
    }

    /// Create an engine with explicit options.
    pub fn with_options(program: impl AsRef<[i64]>, options: &EngineOptions) -> Self {
        Self {
            memory: Memory::with_limit(
                program.as_ref(),
                options.extra_cells,
                options.max_memory_cells,
            ),
            ctx: ExecutionContext::new(),
            state: EngineState::Running,
            inbox: VecDeque::new(),
            fault: None,
            monitor: None,
            last_instruction: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// The fault that stopped the engine, if any.
    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Registers and counters.
    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Engine memory.
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Last decoded instruction (for debugging).
    pub fn last_instruction(&self) -> Option<&Instruction> {
        self.last_instruction.as_ref()
    }

    /// Values queued but not yet consumed.
    pub fn pending_input(&self) -> usize {
        self.inbox.len()
    }

    /// Read a cell without growing memory. Unmaterialized cells read as 0.
    pub fn peek(&self, addr: i64) -> Result<i64, Fault> {
        let idx = usize::try_from(addr).map_err(|_| Fault::AddressError { addr })?;
        Ok(self.memory.as_slice().get(idx).copied().unwrap_or(0))
    }

    /// Overwrite a cell, typically to patch a program before running it.
    pub fn poke(&mut self, addr: i64, value: i64) -> Result<(), Fault> {
        self.memory.write(addr, value)
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            state: self.state,
            instructions: self.ctx.instructions,
            inputs_consumed: self.ctx.inputs_consumed,
            outputs_produced: self.ctx.outputs_produced,
            ip: self.ctx.pc(),
        }
    }

    /// Watch snapshots. Updated whenever `resume` returns, input is queued,
    /// or the engine terminates.
    pub fn subscribe(&mut self) -> watch::Receiver<EngineSnapshot> {
        match &self.monitor {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = watch::channel(self.snapshot());
                self.monitor = Some(tx);
                rx
            }
        }
    }

    fn publish(&self) {
        if let Some(tx) = &self.monitor {
            tx.send_replace(self.snapshot());
        }
    }

    /// Queue a value for the next IN.
    pub fn push_input(&mut self, value: i64) {
        self.inbox.push_back(value);
        if self.state == EngineState::AwaitingInput {
            self.state = EngineState::Running;
        }
        self.publish();
    }

    /// Record a fault and move to `Faulted`.
    fn fail(&mut self, fault: Fault) -> Fault {
        log::debug!("engine faulted ({}): {}", fault.kind(), fault);
        self.state = EngineState::Faulted;
        self.fault = Some(fault.clone());
        self.publish();
        fault
    }

    /// Execute a single instruction.
    ///
    /// A terminal engine does nothing: a halted engine reports `Halted`
    /// again and a faulted one returns its fault again.
    pub fn step(&mut self) -> Result<StepResult, Fault> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }
        if self.state == EngineState::Halted {
            return Ok(StepResult::Halted);
        }

        self.ctx.mark_fetch();
        let (instr, result) = match self.fetch_and_execute() {
            Ok(outcome) => outcome,
            Err(fault) => return Err(self.fail(fault)),
        };

        match result {
            ExecuteResult::Continue => {
                self.retire();
                self.ctx.advance_pc(instr.size());
                Ok(StepResult::Continue)
            }
            ExecuteResult::Jump { target } => {
                self.retire();
                self.ctx.set_pc(target);
                Ok(StepResult::Continue)
            }
            ExecuteResult::NeedsInput => {
                self.state = EngineState::AwaitingInput;
                Ok(StepResult::NeedsInput)
            }
            ExecuteResult::Output(value) => {
                self.retire();
                self.ctx.advance_pc(instr.size());
                Ok(StepResult::Output(value))
            }
            ExecuteResult::Halt => {
                self.ctx.instructions += 1;
                self.state = EngineState::Halted;
                log::debug!("engine halted after {} instructions", self.ctx.instructions);
                Ok(StepResult::Halted)
            }
        }
    }

    fn retire(&mut self) {
        self.ctx.instructions += 1;
        self.state = EngineState::Running;
    }

    fn fetch_and_execute(&mut self) -> Result<(Instruction, ExecuteResult), Fault> {
        let pc = self.ctx.pc();
        let word = self.memory.read(pc)?;
        let instr = decode(word, pc)?;
        log::trace!("pc={:<6} rb={:<6} {}", pc, self.ctx.relative_base(), instr);
        self.last_instruction = Some(instr);
        let result = execute(&instr, &mut self.ctx, &mut self.memory, &mut self.inbox)?;
        Ok((instr, result))
    }

    /// Run until the engine needs input, produces output, or halts.
    pub fn resume(&mut self) -> Result<Yield, Fault> {
        let result = loop {
            match self.step() {
                Ok(StepResult::Continue) => continue,
                Ok(StepResult::NeedsInput) => break Ok(Yield::NeedsInput),
                Ok(StepResult::Output(value)) => break Ok(Yield::Output(value)),
                Ok(StepResult::Halted) => break Ok(Yield::Halted),
                Err(fault) => break Err(fault),
            }
        };
        self.publish();
        result
    }

    /// Run to completion over a fixed input sequence and collect the output.
    ///
    /// Running out of input is an `InputClosedUnexpectedly` fault.
    pub fn run_with_inputs(&mut self, inputs: &[i64]) -> Result<Vec<i64>, Fault> {
        for &value in inputs {
            self.push_input(value);
        }
        let mut outputs = Vec::new();
        loop {
            match self.resume()? {
                Yield::Output(value) => outputs.push(value),
                Yield::Halted => return Ok(outputs),
                Yield::NeedsInput => {
                    let pc = self.ctx.pc();
                    return Err(self.fail(Fault::InputClosedUnexpectedly { pc }));
                }
            }
        }
    }

    /// Run until halt or fault, reading IN values from `input` and sending
    /// OUT values to `output`.
    ///
    /// `output` is closed on return whatever the outcome, so the consumer
    /// always sees end of stream.
    pub async fn run(
        &mut self,
        mut input: PortReceiver,
        mut output: PortSender,
    ) -> Result<Halted, Fault> {
        let outcome = self.drive(&mut input, &mut output).await;
        output.close();
        log::debug!("engine output closed ({:?})", self.state);
        outcome
    }

    async fn drive(
        &mut self,
        input: &mut PortReceiver,
        output: &mut PortSender,
    ) -> Result<Halted, Fault> {
        loop {
            match self.resume()? {
                Yield::Output(value) => {
                    if output.send(value).await.is_err() {
                        let pc = self.ctx.fetch_pc();
                        return Err(self.fail(Fault::OutputClosed { pc }));
                    }
                }
                Yield::NeedsInput => match input.recv().await {
                    Some(value) => self.push_input(value),
                    None => {
                        let pc = self.ctx.pc();
                        return Err(self.fail(Fault::InputClosedUnexpectedly { pc }));
                    }
                },
                Yield::Halted => {
                    return Ok(Halted {
                        instructions: self.ctx.instructions,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{port, unbounded_port};

    const QUINE: [i64; 16] = [
        109, 1, 204, -1, 1001, 100, 1, 100, 1008, 100, 16, 101, 1006, 101, 0, 99,
    ];

    const COMPARE_TO_8: [i64; 47] = [
        3, 21, 1008, 21, 8, 20, 1005, 20, 22, 107, 8, 21, 20, 1006, 20, 31, 1106, 0, 36, 98,
        0, 0, 1002, 21, 125, 20, 4, 20, 1105, 1, 46, 104, 999, 1105, 1, 46, 1101, 1000, 1, 20,
        4, 20, 1105, 1, 46, 98, 99,
    ];

    fn run(program: &[i64], inputs: &[i64]) -> Vec<i64> {
        Engine::new(program, 0).run_with_inputs(inputs).unwrap()
    }

    #[test]
    fn test_arithmetic_halts_without_output() {
        let mut engine = Engine::new([1, 0, 0, 0, 99], 0);
        assert_eq!(engine.run_with_inputs(&[]).unwrap(), Vec::<i64>::new());
        assert_eq!(engine.memory().as_slice(), &[2, 0, 0, 0, 99]);
        assert_eq!(engine.state(), EngineState::Halted);
    }

    #[test]
    fn test_gravity_assist_sample() {
        let mut engine = Engine::new([1, 9, 10, 3, 2, 3, 11, 0, 99, 30, 40, 50], 0);
        engine.run_with_inputs(&[]).unwrap();
        assert_eq!(engine.peek(0).unwrap(), 3500);
    }

    #[test]
    fn test_echo() {
        assert_eq!(run(&[3, 0, 4, 0, 99], &[42]), vec![42]);
    }

    #[test]
    fn test_equality() {
        let program = [3, 9, 8, 9, 10, 9, 4, 9, 99, -1, 8];
        assert_eq!(run(&program, &[8]), vec![1]);
        assert_eq!(run(&program, &[7]), vec![0]);
    }

    #[test]
    fn test_compare_to_eight() {
        assert_eq!(run(&COMPARE_TO_8, &[7]), vec![999]);
        assert_eq!(run(&COMPARE_TO_8, &[8]), vec![1000]);
        assert_eq!(run(&COMPARE_TO_8, &[9]), vec![1001]);
    }

    #[test]
    fn test_quine() {
        assert_eq!(run(&QUINE, &[]), QUINE.to_vec());
    }

    #[test]
    fn test_large_values() {
        assert_eq!(run(&[104, 1125899906842624, 99], &[]), vec![1125899906842624]);
        assert_eq!(
            run(&[1102, 34915192, 34915192, 7, 4, 7, 99, 0], &[]),
            vec![1219070632396864]
        );
    }

    #[test]
    fn test_self_modifying() {
        // mul rewrites the 33 at address 4 into 99
        let mut engine = Engine::new([1002, 4, 3, 4, 33], 0);
        engine.run_with_inputs(&[]).unwrap();
        assert_eq!(engine.memory().as_slice(), &[1002, 4, 3, 4, 99]);
    }

    #[test]
    fn test_immediate_destination_faults() {
        let mut engine = Engine::new([11101, 1, 2, 5, 99, 0], 0);
        assert_eq!(
            engine.run_with_inputs(&[]),
            Err(Fault::IllegalWriteMode { pc: 0 })
        );
        assert_eq!(engine.state(), EngineState::Faulted);

        let mut engine = Engine::new([103, 0, 99], 0);
        assert_eq!(
            engine.run_with_inputs(&[1]),
            Err(Fault::IllegalWriteMode { pc: 0 })
        );

        // mul, lt and eq leave memory untouched as well
        for opcode in [11102, 11107, 11108] {
            let image = [opcode, 3, 3, 5, 99, 0];
            let mut engine = Engine::new(image, 0);
            assert_eq!(
                engine.run_with_inputs(&[]),
                Err(Fault::IllegalWriteMode { pc: 0 }),
                "opcode {}",
                opcode
            );
            assert_eq!(engine.memory().as_slice(), &image);
        }
    }

    #[test]
    fn test_relative_matches_position() {
        // rb := 10, then out ~0 and out @10
        assert_eq!(run(&[109, 10, 204, 0, 4, 10, 99, 0, 0, 0, 77], &[]), vec![77, 77]);
        // rb := 10, add into ~0, then read back through @10
        assert_eq!(run(&[109, 10, 21101, 5, 6, 0, 4, 10, 99, 0, 0], &[]), vec![11]);
    }

    #[test]
    fn test_memory_grows_past_image() {
        // write 7 at address 1000, then echo address 999
        let program = [1101, 3, 4, 1000, 4, 999, 4, 1000, 99];
        assert_eq!(run(&program, &[]), vec![0, 7]);
    }

    #[test]
    fn test_illegal_opcode() {
        let mut engine = Engine::new([1101, 1, 1, 5, 42, 0], 0);
        assert_eq!(
            engine.run_with_inputs(&[]),
            Err(Fault::IllegalOpcode { code: 42, pc: 4 })
        );
        // faulted engines stay faulted
        assert_eq!(engine.step(), Err(Fault::IllegalOpcode { code: 42, pc: 4 }));
    }

    #[test]
    fn test_negative_jump_target() {
        let mut engine = Engine::new([1105, 1, -4, 99], 0);
        assert_eq!(engine.run_with_inputs(&[]), Err(Fault::AddressError { addr: -4 }));
    }

    #[test]
    fn test_memory_limit() {
        let options = EngineOptions {
            extra_cells: 0,
            max_memory_cells: 64,
        };
        let mut engine = Engine::with_options([1101, 1, 1, 64, 99], &options);
        assert_eq!(
            engine.run_with_inputs(&[]),
            Err(Fault::MemoryLimitExceeded { addr: 64, limit: 64 })
        );
    }

    #[test]
    fn test_resume_yields() {
        let mut engine = Engine::new([3, 0, 4, 0, 99], 0);
        assert_eq!(engine.resume(), Ok(Yield::NeedsInput));
        assert_eq!(engine.state(), EngineState::AwaitingInput);

        engine.push_input(5);
        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(engine.resume(), Ok(Yield::Output(5)));
        assert_eq!(engine.resume(), Ok(Yield::Halted));
        assert_eq!(engine.resume(), Ok(Yield::Halted));
    }

    #[test]
    fn test_step_counts_instructions() {
        let mut engine = Engine::new([1101, 2, 3, 0, 99], 0);
        assert_eq!(engine.step(), Ok(StepResult::Continue));
        assert_eq!(engine.context().pc(), 4);
        assert_eq!(
            engine.last_instruction().map(|i| i.to_string()),
            Some("add #0, #1, @2".to_string())
        );
        assert_eq!(engine.step(), Ok(StepResult::Halted));
        assert_eq!(engine.context().instructions, 2);
    }

    #[test]
    fn test_run_out_of_input() {
        let mut engine = Engine::new([3, 0, 3, 0, 99], 0);
        assert_eq!(
            engine.run_with_inputs(&[1]),
            Err(Fault::InputClosedUnexpectedly { pc: 2 })
        );
    }

    #[test]
    fn test_poke_and_peek() {
        let mut engine = Engine::new([1, 0, 0, 0, 99, 0, 0, 0, 0, 0, 0, 0, 0], 0);
        engine.poke(1, 12).unwrap();
        engine.poke(2, 12).unwrap();
        assert_eq!(engine.peek(1).unwrap(), 12);
        assert_eq!(engine.peek(500).unwrap(), 0);
        assert_eq!(engine.memory().len(), 13);
        assert_eq!(engine.peek(-1), Err(Fault::AddressError { addr: -1 }));
    }

    #[test]
    fn test_deterministic() {
        let program = COMPARE_TO_8;
        let mut a = Engine::new(program, 0);
        let mut b = Engine::new(program, 0);
        assert_eq!(a.run_with_inputs(&[3]), b.run_with_inputs(&[3]));
        assert_eq!(a.memory().as_slice(), b.memory().as_slice());
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn test_snapshot_published() {
        let mut engine = Engine::new([3, 0, 4, 0, 99], 0);
        let rx = engine.subscribe();
        engine.resume().unwrap();
        assert_eq!(rx.borrow().state, EngineState::AwaitingInput);

        engine.push_input(1);
        engine.resume().unwrap();
        let snap = *rx.borrow();
        assert_eq!(snap.inputs_consumed, 1);
        assert_eq!(snap.outputs_produced, 1);
        assert_eq!(snap.ip, 4);
    }

    #[tokio::test]
    async fn test_run_over_ports() {
        let (mut in_tx, in_rx) = unbounded_port();
        let (out_tx, out_rx) = port(0);
        in_tx.send(8).await.unwrap();

        let task = tokio::spawn(async move {
            let mut engine = Engine::new([3, 9, 8, 9, 10, 9, 4, 9, 99, -1, 8], 0);
            engine.run(in_rx, out_tx).await
        });

        assert_eq!(out_rx.collect().await, vec![1]);
        let halted = task.await.unwrap().unwrap();
        assert_eq!(halted.instructions, 4);
    }

    #[tokio::test]
    async fn test_fault_closes_output() {
        let (_in_tx, in_rx) = unbounded_port();
        let (out_tx, out_rx) = unbounded_port();

        let task = tokio::spawn(async move {
            let mut engine = Engine::new([104, 1, 77], 0);
            engine.run(in_rx, out_tx).await
        });

        assert_eq!(out_rx.collect().await, vec![1]);
        assert_eq!(
            task.await.unwrap(),
            Err(Fault::IllegalOpcode { code: 77, pc: 2 })
        );
    }

    #[tokio::test]
    async fn test_closed_input_faults() {
        let (in_tx, in_rx) = unbounded_port();
        let (out_tx, _out_rx) = unbounded_port();
        in_tx.close();

        let mut engine = Engine::new([3, 0, 99], 0);
        assert_eq!(
            engine.run(in_rx, out_tx).await,
            Err(Fault::InputClosedUnexpectedly { pc: 0 })
        );
    }

    #[tokio::test]
    async fn test_send_to_closed_output_faults() {
        let (_in_tx, in_rx) = unbounded_port();
        let (out_tx, out_rx) = unbounded_port();
        drop(out_rx);

        let mut engine = Engine::new([1101, 0, 0, 0, 104, 5, 99], 0);
        assert_eq!(
            engine.run(in_rx, out_tx).await,
            Err(Fault::OutputClosed { pc: 4 })
        );
    }
}
