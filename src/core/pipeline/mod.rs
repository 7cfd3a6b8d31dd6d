//! The five-stage pipeline simulator.
//!
//! One `step` is one simulated cycle. Substeps run in a fixed order:
//! interrupt service, hazard inspection, writeback, execute, delayed
//! branch finalization, decode, breakpoint check, fetch, latch
//! advancement, snapshot publication. The pipeline owns the machine
//! state and the memory; decoding is a free function and execution
//! takes mutable references to both.

use tracing::trace;

use crate::common::{normalize_cpu_exception, CpuException};
use crate::config::PipelineConfig;
use crate::core::breakpoint::{BreakpointEngine, NoBreakpoints};
use crate::core::hazard::{self, HazardDecision};
use crate::core::interrupt::InterruptController;
use crate::core::state::MachineState;
use crate::isa::exec::ExecEffect;
use crate::isa::{decode, execute};
use crate::mem::Memory;
use crate::stats::SimStats;

/// Inter-stage latches.
pub mod latches;

/// Snapshot types and the subscriber registry.
pub mod snapshot;

use latches::{Latch, Slot};
use snapshot::{
    Observer, PipelineSnapshot, RuntimeSnapshot, StageSnapshot, StepOutcome, SubscriberRegistry,
    SubscriptionHandle,
};

pub struct Pipeline {
    pub state: MachineState,
    pub memory: Memory,
    pub interrupts: InterruptController,
    pub stats: SimStats,

    if_id: Latch,
    id_ex: Latch,
    ex_mem: Latch,
    mem_wb: Latch,

    breakpoints: Box<dyn BreakpointEngine>,
    subscribers: SubscriberRegistry,

    forwarding_enabled: bool,
    hazard_detection_enabled: bool,

    halt_requested: bool,
    resume_over_breakpoint: bool,
}

impl Pipeline {
    pub fn new(state: MachineState, memory: Memory, config: &PipelineConfig) -> Self {
        Self {
            state,
            memory,
            interrupts: InterruptController::new(),
            stats: SimStats::default(),
            if_id: Latch::default(),
            id_ex: Latch::default(),
            ex_mem: Latch::default(),
            mem_wb: Latch::default(),
            breakpoints: Box::new(NoBreakpoints),
            subscribers: SubscriberRegistry::new(),
            forwarding_enabled: config.forwarding_enabled,
            hazard_detection_enabled: config.hazard_detection_enabled,
            halt_requested: false,
            resume_over_breakpoint: false,
        }
    }

    pub fn set_breakpoint_engine(&mut self, engine: Box<dyn BreakpointEngine>) {
        self.breakpoints = engine;
    }

    pub fn subscribe(&mut self, observer: Box<dyn Observer>) -> SubscriptionHandle {
        self.subscribers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) {
        self.subscribers.unsubscribe(handle);
    }

    pub fn set_forwarding(&mut self, enabled: bool) {
        self.forwarding_enabled = enabled;
    }

    pub fn set_hazard_detection(&mut self, enabled: bool) {
        self.hazard_detection_enabled = enabled;
    }

    /// Requests a cooperative halt between steps.
    pub fn halt(&mut self) {
        self.halt_requested = true;
    }

    fn clear_pipeline(&mut self) {
        self.if_id.clear();
        self.id_ex.clear();
        self.ex_mem.clear();
        self.mem_wb.clear();
        self.stats.flushes += 1;
    }

    fn pipeline_empty(&self) -> bool {
        self.if_id.is_empty()
            && self.id_ex.is_empty()
            && self.ex_mem.is_empty()
            && self.mem_wb.is_empty()
    }

    /// Runs one simulated cycle.
    pub fn step(&mut self) -> Result<StepOutcome, CpuException> {
        self.stats.cycles += 1;

        // Device interrupts raised since the last step funnel into the
        // controller before anything else happens.
        for idx in self.memory.tick_devices() {
            let name = self.memory.device(idx).name();
            self.interrupts.request_device_interrupt(idx, name);
        }

        // 1. Interrupt service preempts the cycle. Clearing the
        // pipeline drops un-executed instructions, so resumption (and
        // the default EPC) is the oldest one in flight.
        if self.interrupts.has_pending() {
            let pc = self
                .id_ex
                .current()
                .or_else(|| self.if_id.current())
                .map(|slot| slot.pc)
                .unwrap_or(self.state.pc);
            self.state.pc = pc;
            self.interrupts
                .handle_next(&mut self.state, &mut self.memory, pc);
            self.stats.interrupts_taken += 1;
            self.clear_pipeline();
            let outcome = if self.state.is_terminated() {
                StepOutcome::Terminated
            } else {
                StepOutcome::Running
            };
            return Ok(self.finish(outcome, HazardDecision::default(), false, true));
        }

        // 2. Hazard inspection on the instruction waiting in IF/ID.
        let decision = self.inspect_hazards();

        // 3. Writeback: the payload leaving MEM/WB retires.
        if !self.mem_wb.is_empty() {
            self.stats.instructions_retired += 1;
        }
        self.mem_wb.set_next(self.ex_mem.take_current());

        // 4. Execute.
        let mut branch_registered = false;
        let mut flush_front_end = false;
        if let Some(slot) = self.id_ex.take_current() {
            let decoded = slot.decoded.as_ref().expect("ID always stages decoded ops");
            trace!(pc = format_args!("{:#010x}", slot.pc), op = decoded.name, "EX");
            match execute(&decoded.op, slot.pc, &mut self.state, &mut self.memory) {
                Ok(effect) => {
                    flush_front_end = effect == ExecEffect::FlushFrontEnd;
                    self.ex_mem.set_next(Some(slot));
                }
                Err(CpuException::Syscall { code, pc }) => {
                    return Ok(self.service_syscall(code, pc));
                }
                Err(err) => return self.surface(err, slot.pc),
            }
            branch_registered = self.state.branch.take_registered_flag();
        }

        if self.state.is_terminated() {
            self.clear_pipeline();
            return Ok(self.finish(StepOutcome::Terminated, decision, branch_registered, false));
        }

        // 5. Delayed branch advances exactly once per step.
        self.state.branch.finalize(&mut self.state.pc);

        // 6. Decode, or insert a bubble on a stall.
        if flush_front_end {
            self.if_id.clear();
        } else if decision.stall() {
            self.stats.stalls += 1;
            self.stats.bubbles += 1;
            if decision.load_use {
                self.stats.load_use_stalls += 1;
            }
            if decision.structural {
                self.stats.structural_stalls += 1;
            }
            if decision.raw_stall {
                self.stats.raw_stalls += 1;
            }
            self.id_ex.set_next(None);
            let kept = self.if_id.take_current();
            self.if_id.set_next(kept);
        } else if let Some(mut slot) = self.if_id.take_current() {
            match decode(slot.instruction, slot.pc) {
                Some(decoded) => {
                    trace!(
                        pc = format_args!("{:#010x}", slot.pc),
                        op = decoded.name,
                        "ID"
                    );
                    slot.decoded = Some(decoded);
                    self.id_ex.set_next(Some(slot));
                }
                None => {
                    let err = CpuException::InvalidInstruction {
                        word: slot.instruction,
                        pc: slot.pc,
                    };
                    return self.surface(err, slot.pc);
                }
            }
        }

        // 7. Breakpoint check against the next fetch address.
        let breakpoint_hit = if self.resume_over_breakpoint {
            self.resume_over_breakpoint = false;
            false
        } else {
            self.breakpoints.check(self.state.pc)
        };

        // 8. Fetch.
        if !breakpoint_hit
            && !self.state.is_terminated()
            && !branch_registered
            && !decision.stall()
            && self.memory.has_instruction(self.state.pc)
        {
            let pc = self.state.pc;
            if pc % 4 != 0 {
                let err = CpuException::AddressError {
                    addr: pc,
                    access: crate::common::AccessType::Execute,
                    pc,
                };
                return self.surface(err, pc);
            }
            match self.memory.load_word(pc) {
                Ok(word) => {
                    trace!(
                        pc = format_args!("{:#010x}", pc),
                        inst = format_args!("{:#010x}", word),
                        "IF"
                    );
                    self.state.pc = pc.wrapping_add(4);
                    self.if_id.set_next(Some(Slot::fetched(pc, word)));
                }
                Err(err) => return self.surface(err, pc),
            }
        }

        // 9. Advance every latch.
        self.advance();

        // 10. Resolve the step outcome and publish.
        let outcome = if breakpoint_hit {
            self.resume_over_breakpoint = true;
            StepOutcome::Breakpoint
        } else if self.pipeline_empty() && !self.memory.has_instruction(self.state.pc) {
            StepOutcome::Halted
        } else {
            StepOutcome::Running
        };
        Ok(self.finish(outcome, decision, branch_registered, false))
    }

    /// Loops `step` until a non-running outcome or the cycle budget is
    /// spent. A pending `halt()` stops between steps.
    pub fn run(&mut self, max_cycles: u64) -> Result<StepOutcome, CpuException> {
        let mut outcome = StepOutcome::Running;
        for _ in 0..max_cycles {
            if self.halt_requested {
                self.halt_requested = false;
                return Ok(StepOutcome::Halted);
            }
            outcome = self.step()?;
            if outcome != StepOutcome::Running {
                break;
            }
        }
        Ok(outcome)
    }

    fn inspect_hazards(&self) -> HazardDecision {
        if !self.hazard_detection_enabled {
            return HazardDecision::default();
        }
        let Some(waiting) = self.if_id.current() else {
            return HazardDecision::default();
        };
        let Some(decoded) = decode(waiting.instruction, waiting.pc) else {
            return HazardDecision::default();
        };
        let decoding = hazard::classify(&decoded.op);
        let executing = self
            .id_ex
            .current()
            .and_then(|s| s.decoded.as_ref())
            .map(|d| hazard::classify(&d.op));
        let memory_stage = self
            .mem_wb
            .current()
            .and_then(|s| s.decoded.as_ref())
            .map(|d| hazard::classify(&d.op));
        hazard::detect(
            &decoding,
            executing.as_ref(),
            memory_stage.as_ref(),
            self.forwarding_enabled,
        )
    }

    /// Converts an in-flight syscall into a serviced interrupt within
    /// the same cycle, clearing the pipeline.
    fn service_syscall(&mut self, code: u32, pc: u32) -> StepOutcome {
        self.stats.syscalls += 1;
        self.interrupts.request_syscall_interrupt(code, pc);

        // Resumption honors a branch whose delay slot raised the
        // syscall; otherwise execution continues past the syscall.
        let resume = match self.state.branch.target() {
            Some(target)
                if self.state.branch.state() == crate::core::state::BranchState::Triggered =>
            {
                target
            }
            _ => pc.wrapping_add(4),
        };
        self.state.branch.clear();
        self.state.pc = resume;

        let current_pc = self.state.pc;
        self.interrupts
            .handle_next(&mut self.state, &mut self.memory, current_pc);
        self.stats.interrupts_taken += 1;
        self.clear_pipeline();

        let outcome = if self.state.is_terminated() {
            StepOutcome::Terminated
        } else {
            StepOutcome::Running
        };
        self.finish(outcome, HazardDecision::default(), false, true)
    }

    /// Offers an execution fault to the interrupt controller; when it
    /// stays unserviced, normalizes and rethrows it.
    fn surface(&mut self, err: CpuException, pc: u32) -> Result<StepOutcome, CpuException> {
        let current_pc = self.state.pc;
        if self
            .interrupts
            .recover(&err, &mut self.state, &mut self.memory, current_pc)
        {
            self.stats.interrupts_taken += 1;
            self.clear_pipeline();
            return Ok(self.finish(
                StepOutcome::Running,
                HazardDecision::default(),
                false,
                true,
            ));
        }
        Err(normalize_cpu_exception(err, pc))
    }

    fn advance(&mut self) {
        self.mem_wb.advance();
        self.ex_mem.advance();
        self.id_ex.advance();
        self.if_id.advance();
    }

    fn finish(
        &mut self,
        outcome: StepOutcome,
        decision: HazardDecision,
        branch_registered: bool,
        flushed: bool,
    ) -> StepOutcome {
        if flushed {
            // The latches were cleared before the advance; make the
            // published registers reflect that.
            self.advance();
        }

        let pipeline = PipelineSnapshot {
            cycle: self.stats.cycles,
            if_id: StageSnapshot::of(&self.if_id, decision.stall(), flushed),
            id_ex: StageSnapshot::of(&self.id_ex, false, flushed),
            ex_mem: StageSnapshot::of(&self.ex_mem, false, flushed),
            mem_wb: StageSnapshot::of(&self.mem_wb, false, flushed),
            load_use_hazard: decision.load_use,
            structural_hazard: decision.structural,
            branch_registered,
            forwarding_enabled: self.forwarding_enabled,
            hazard_detection_enabled: self.hazard_detection_enabled,
            statistics: self.stats.snapshot(),
        };
        self.subscribers.publish_pipeline_snapshot(&pipeline);

        let mut registers = [0u32; 32];
        for (i, slot) in registers.iter_mut().enumerate() {
            *slot = self.state.regs.read(i);
        }
        let runtime = RuntimeSnapshot {
            cycle: self.stats.cycles,
            pc: self.state.pc,
            status: outcome,
            registers,
            hi: self.state.hi,
            lo: self.state.lo,
            terminated: self.state.is_terminated(),
            icache: self.memory.icache_stats(),
            dcache: self.memory.dcache_stats(),
        };
        self.subscribers.publish_runtime_snapshot(&runtime);

        outcome
    }
}
