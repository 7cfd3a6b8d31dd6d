//! Interrupt controller.
//!
//! A fixed-capacity FIFO of pending interrupt requests (timer, I/O,
//! syscall) plus the dispatch table of typed service routines. Handling
//! a request captures the EPC, sets the exception level in Status,
//! enters kernel mode, and invokes the routine registered for the
//! request's type; the routine may redirect the PC.

use tracing::error;

use crate::common::CpuException;
use crate::core::state::{MachineState, COP0_EPC, COP0_STATUS, STATUS_EXL};
use crate::mem::Memory;

const QUEUE_CAPACITY: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptKind {
    Timer,
    Io,
    Syscall,
    /// Recovery hook for execution faults offered to the controller.
    Exception,
}

#[derive(Clone, Debug)]
pub struct InterruptRequest {
    pub kind: InterruptKind,
    /// Device index for device-raised interrupts.
    pub source: Option<usize>,
    /// Syscall number or exception code.
    pub code: Option<u32>,
    /// PC to capture as EPC; the current PC is used when absent.
    pub pc: Option<u32>,
}

/// A service routine. Returning `Some(pc)` redirects execution there.
pub type InterruptRoutine =
    Box<dyn FnMut(&InterruptRequest, &mut MachineState, &mut Memory) -> Option<u32>>;

pub struct InterruptController {
    queue: [Option<InterruptRequest>; QUEUE_CAPACITY],
    head: usize,
    len: usize,
    routines: [Option<InterruptRoutine>; 4],
}

fn kind_slot(kind: InterruptKind) -> usize {
    match kind {
        InterruptKind::Timer => 0,
        InterruptKind::Io => 1,
        InterruptKind::Syscall => 2,
        InterruptKind::Exception => 3,
    }
}

impl InterruptController {
    pub fn new() -> Self {
        Self {
            queue: std::array::from_fn(|_| None),
            head: 0,
            len: 0,
            routines: [None, None, None, None],
        }
    }

    /// Registers the service routine for one interrupt type, replacing
    /// any previous one.
    pub fn register_routine(&mut self, kind: InterruptKind, routine: InterruptRoutine) {
        self.routines[kind_slot(kind)] = Some(routine);
    }

    pub fn has_pending(&self) -> bool {
        self.len > 0
    }

    fn enqueue(&mut self, request: InterruptRequest) {
        if self.len == QUEUE_CAPACITY {
            // One syscall per instruction and one request per device tick
            // bound the queue in practice; hitting the cap is a bug.
            error!("interrupt queue overflow, dropping {:?}", request.kind);
            debug_assert!(false, "interrupt queue overflow");
            return;
        }
        let tail = (self.head + self.len) % QUEUE_CAPACITY;
        self.queue[tail] = Some(request);
        self.len += 1;
    }

    fn dequeue(&mut self) -> Option<InterruptRequest> {
        if self.len == 0 {
            return None;
        }
        let request = self.queue[self.head].take();
        self.head = (self.head + 1) % QUEUE_CAPACITY;
        self.len -= 1;
        request
    }

    /// Enqueues the syscall raised at `pc` with `$v0`'s snapshot.
    pub fn request_syscall_interrupt(&mut self, code: u32, pc: u32) {
        self.enqueue(InterruptRequest {
            kind: InterruptKind::Syscall,
            source: None,
            code: Some(code),
            pc: Some(pc),
        });
    }

    /// Enqueues an interrupt raised by a device, typed by its class.
    pub fn request_device_interrupt(&mut self, device: usize, device_name: &str) {
        let kind = if device_name == "rtc" {
            InterruptKind::Timer
        } else {
            InterruptKind::Io
        };
        self.enqueue(InterruptRequest {
            kind,
            source: Some(device),
            code: None,
            pc: None,
        });
    }

    /// Services the oldest pending request, if any.
    ///
    /// Captures EPC, raises the Status exception level, enters kernel
    /// mode, and dispatches to the routine for the request's type.
    pub fn handle_next(
        &mut self,
        state: &mut MachineState,
        mem: &mut Memory,
        current_pc: u32,
    ) -> bool {
        let Some(request) = self.dequeue() else {
            return false;
        };

        let slot = kind_slot(request.kind);
        if self.routines[slot].is_none() {
            error!("no routine registered for {:?} interrupt", request.kind);
            return true;
        }

        state.cop0[COP0_EPC] = request.pc.unwrap_or(current_pc);
        state.cop0[COP0_STATUS] |= STATUS_EXL;
        mem.map.set_kernel_mode(true);

        if let Some(routine) = self.routines[slot].as_mut() {
            if let Some(new_pc) = routine(&request, state, mem) {
                state.pc = new_pc;
            }
        }
        true
    }

    /// Offers an execution fault to the controller for recovery.
    ///
    /// Returns true when a registered exception routine took it, in
    /// which case the machine has entered kernel mode with EPC set.
    pub fn recover(
        &mut self,
        err: &CpuException,
        state: &mut MachineState,
        mem: &mut Memory,
        current_pc: u32,
    ) -> bool {
        if self.routines[kind_slot(InterruptKind::Exception)].is_none() {
            return false;
        }
        let request = InterruptRequest {
            kind: InterruptKind::Exception,
            source: None,
            code: None,
            pc: err.pc().or(Some(current_pc)),
        };

        state.cop0[COP0_EPC] = request.pc.unwrap_or(current_pc);
        state.cop0[COP0_STATUS] |= STATUS_EXL;
        mem.map.set_kernel_mode(true);

        if let Some(routine) = self.routines[kind_slot(InterruptKind::Exception)].as_mut() {
            if let Some(new_pc) = routine(&request, state, mem) {
                state.pc = new_pc;
            }
        }
        true
    }
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new()
    }
}
