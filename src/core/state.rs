//! Architectural machine state.
//!
//! This module implements the register file, the HI/LO pair, the program
//! counter, the COP1 floating-point register file with its condition
//! flags, the COP0 registers, the delayed-branch state machine, and the
//! LL/SC reservation. It enforces the architectural invariant that
//! register `$zero` is hardwired to zero.

/// COP0 register index of the Status register.
pub const COP0_STATUS: usize = 12;
/// COP0 register index of the exception program counter.
pub const COP0_EPC: usize = 14;
/// Status bit 1: "exception level", set on interrupt entry, cleared by eret.
pub const STATUS_EXL: u32 = 1 << 1;

/// General-purpose register file.
///
/// Contains 32 registers. Register 0 is hardwired to zero: writes are
/// silently discarded and reads always yield 0.
#[derive(Clone)]
pub struct RegisterFile {
    regs: [u32; 32],
}

impl RegisterFile {
    pub fn new() -> Self {
        Self { regs: [0; 32] }
    }

    /// Reads a general-purpose register value.
    ///
    /// Register 0 always returns 0 regardless of storage. Indices outside
    /// [0, 32) are a caller bug and panic.
    pub fn read(&self, idx: usize) -> u32 {
        if idx == 0 {
            0
        } else {
            self.regs[idx]
        }
    }

    /// Writes a value to a general-purpose register.
    ///
    /// Writes to register 0 are silently ignored.
    pub fn write(&mut self, idx: usize, val: u32) {
        if idx != 0 {
            self.regs[idx] = val;
        }
    }

    /// Dumps all registers in pairs, two per line.
    pub fn dump(&self) {
        for i in (0..32).step_by(2) {
            println!(
                "r{:<2}={:#010x} r{:<2}={:#010x}",
                i,
                self.regs[i],
                i + 1,
                self.regs[i + 1]
            );
        }
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

/// COP1 register file: 32 single-word registers plus 8 condition flags.
///
/// Doubles occupy an (even, odd) register pair with the low word in the
/// even register.
#[derive(Clone)]
pub struct Fpu {
    regs: [u32; 32],
    flags: u8,
}

impl Fpu {
    pub fn new() -> Self {
        Self { regs: [0; 32], flags: 0 }
    }

    /// Raw bit pattern of register `fr`.
    pub fn read_raw(&self, fr: usize) -> u32 {
        self.regs[fr]
    }

    pub fn write_raw(&mut self, fr: usize, bits: u32) {
        self.regs[fr] = bits;
    }

    /// Reads register `fr` as an IEEE-754 binary32 value.
    pub fn read_single(&self, fr: usize) -> f32 {
        f32::from_bits(self.regs[fr])
    }

    pub fn write_single(&mut self, fr: usize, val: f32) {
        self.regs[fr] = val.to_bits();
    }

    /// Reads the (fr, fr+1) pair as a binary64 value, low word in `fr`.
    pub fn read_double(&self, fr: usize) -> f64 {
        let lo = self.regs[fr & !1] as u64;
        let hi = self.regs[(fr & !1) + 1] as u64;
        f64::from_bits((hi << 32) | lo)
    }

    pub fn write_double(&mut self, fr: usize, val: f64) {
        let bits = val.to_bits();
        self.regs[fr & !1] = bits as u32;
        self.regs[(fr & !1) + 1] = (bits >> 32) as u32;
    }

    /// Condition flag `cc` in [0, 8).
    pub fn condition(&self, cc: u8) -> bool {
        self.flags & (1 << cc) != 0
    }

    pub fn set_condition(&mut self, cc: u8, value: bool) {
        if value {
            self.flags |= 1 << cc;
        } else {
            self.flags &= !(1 << cc);
        }
    }
}

impl Default for Fpu {
    fn default() -> Self {
        Self::new()
    }
}

/// The delayed-branch state machine.
///
/// A taken branch registers its target; the delay-slot instruction then
/// executes; only after that does the target become the PC. The pipeline
/// advances this machine exactly once per step, right after the execute
/// substep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchState {
    Cleared,
    Registered,
    Triggered,
}

#[derive(Clone, Debug)]
pub struct DelayedBranch {
    state: BranchState,
    target: Option<u32>,
    just_registered: bool,
}

impl DelayedBranch {
    pub fn new() -> Self {
        Self {
            state: BranchState::Cleared,
            target: None,
            just_registered: false,
        }
    }

    pub fn state(&self) -> BranchState {
        self.state
    }

    pub fn target(&self) -> Option<u32> {
        self.target
    }

    /// Registers a branch target.
    ///
    /// First writer wins: a registration while a branch is already
    /// pending keeps the current target and state.
    pub fn register(&mut self, target: u32) {
        if self.state == BranchState::Cleared {
            self.target = Some(target);
            self.state = BranchState::Registered;
        }
        self.just_registered = true;
    }

    /// Advances the machine one instruction slot.
    ///
    /// `Registered` becomes `Triggered` (the delay slot runs next);
    /// `Triggered` redirects the PC to the target and clears.
    pub fn finalize(&mut self, pc: &mut u32) {
        match self.state {
            BranchState::Cleared => {}
            BranchState::Registered => self.state = BranchState::Triggered,
            BranchState::Triggered => {
                if let Some(target) = self.target.take() {
                    *pc = target;
                }
                self.state = BranchState::Cleared;
            }
        }
    }

    /// Drops any pending branch. Used by `eret` and pipeline clears.
    pub fn clear(&mut self) {
        self.state = BranchState::Cleared;
        self.target = None;
        self.just_registered = false;
    }

    /// Reports and resets the "a branch registered during this execute"
    /// latch the fetch substep consults.
    pub fn take_registered_flag(&mut self) -> bool {
        std::mem::take(&mut self.just_registered)
    }
}

impl Default for DelayedBranch {
    fn default() -> Self {
        Self::new()
    }
}

/// The complete architectural state of the simulated CPU.
pub struct MachineState {
    pub regs: RegisterFile,
    pub hi: u32,
    pub lo: u32,
    pub pc: u32,
    pub fpu: Fpu,
    pub cop0: [u32; 32],
    pub branch: DelayedBranch,
    /// Word-aligned address of the live LL reservation, if any.
    pub reservation: Option<u32>,
    terminated: bool,
    entry_pc: u32,
}

impl MachineState {
    /// Creates a machine whose PC starts at `entry` (the text base).
    pub fn new(entry: u32) -> Self {
        Self {
            regs: RegisterFile::new(),
            hi: 0,
            lo: 0,
            pc: entry,
            fpu: Fpu::new(),
            cop0: [0; 32],
            branch: DelayedBranch::new(),
            reservation: None,
            terminated: false,
            entry_pc: entry,
        }
    }

    /// Returns registers, PC, HI/LO, FPU, delayed branch, and the
    /// reservation to their power-on values.
    pub fn reset(&mut self) {
        self.regs = RegisterFile::new();
        self.hi = 0;
        self.lo = 0;
        self.pc = self.entry_pc;
        self.fpu = Fpu::new();
        self.cop0 = [0; 32];
        self.branch.clear();
        self.reservation = None;
        self.terminated = false;
    }

    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Invalidates the LL reservation if the store window
    /// [addr, addr+len) overlaps the reserved word.
    pub fn invalidate_reservation(&mut self, addr: u32, len: u32) {
        if let Some(res) = self.reservation {
            let store_end = addr.wrapping_add(len);
            let res_end = res.wrapping_add(4);
            if addr < res_end && res < store_end {
                self.reservation = None;
            }
        }
    }

    pub fn dump(&self) {
        println!("pc = {:#010x}  hi = {:#010x}  lo = {:#010x}", self.pc, self.hi, self.lo);
        self.regs.dump();
    }
}
