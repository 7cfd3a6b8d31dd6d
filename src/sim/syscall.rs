//! Syscall table.
//!
//! Dispatches by the integer code snapshotted from `$v0`. Console
//! handlers write to a pluggable sink and read from a pluggable source
//! so tests can capture both; file handlers keep a small descriptor
//! table over the host filesystem; the random handlers run seeded
//! per-stream generators. Dialog codes (50+) delegate to a host
//! handler when one is registered.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::common::{AccessType, CpuException};
use crate::core::interrupt::{InterruptController, InterruptKind};
use crate::core::state::{MachineState, COP0_STATUS, STATUS_EXL};
use crate::mem::Memory;
use crate::soc::devices::{BITMAP_BASE, DISPLAY_BASE};

const REG_V0: usize = 2;
const REG_A0: usize = 4;
const REG_A1: usize = 5;
const REG_A2: usize = 6;

/// First file descriptor handed out by `open`; 0..2 stay reserved.
const FD_BASE: u32 = 3;

/// Per-stream linear congruential generator.
struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.state >> 32) as u32
    }
}

/// A host hook for the dialog syscall family.
pub type DialogHandler = Box<dyn FnMut(u32, &mut MachineState, &mut Memory)>;

pub struct SyscallTable {
    out: Box<dyn Write>,
    input: Box<dyn BufRead>,
    files: Vec<Option<File>>,
    streams: HashMap<u32, Lcg>,
    dialog_handler: Option<DialogHandler>,
    exit_code: Option<u32>,
}

impl SyscallTable {
    pub fn new() -> Self {
        Self::with_io(
            Box::new(std::io::stdout()),
            Box::new(BufReader::new(std::io::stdin())),
        )
    }

    /// Builds a table over caller-supplied console streams.
    pub fn with_io(out: Box<dyn Write>, input: Box<dyn BufRead>) -> Self {
        Self {
            out,
            input,
            files: Vec::new(),
            streams: HashMap::new(),
            dialog_handler: None,
            exit_code: None,
        }
    }

    pub fn set_dialog_handler(&mut self, handler: DialogHandler) {
        self.dialog_handler = Some(handler);
    }

    /// The status passed to exit-with-status, if the program used it.
    pub fn exit_code(&self) -> Option<u32> {
        self.exit_code
    }

    fn read_c_string(mem: &mut Memory, mut addr: u32) -> Result<Vec<u8>, CpuException> {
        let mut bytes = Vec::new();
        loop {
            let byte = mem.read_byte(addr, AccessType::Read)?;
            if byte == 0 {
                break;
            }
            bytes.push(byte);
            addr = addr.wrapping_add(1);
        }
        Ok(bytes)
    }

    fn read_line(&mut self) -> String {
        let mut line = String::new();
        let _ = self.input.read_line(&mut line);
        line
    }

    fn stream(&mut self, id: u32) -> &mut Lcg {
        self.streams
            .entry(id)
            .or_insert_with(|| Lcg::new(id as u64 + 1))
    }

    /// Dispatches one syscall.
    pub fn handle(
        &mut self,
        code: u32,
        state: &mut MachineState,
        mem: &mut Memory,
    ) -> Result<(), CpuException> {
        match code {
            // print_int
            1 => {
                let value = state.regs.read(REG_A0) as i32;
                let _ = write!(self.out, "{}", value);
            }
            // print_float
            2 => {
                let value = state.fpu.read_single(12);
                let _ = write!(self.out, "{}", value);
            }
            // print_double
            3 => {
                let value = state.fpu.read_double(12);
                let _ = write!(self.out, "{}", value);
            }
            // print_string
            4 => {
                let bytes = Self::read_c_string(mem, state.regs.read(REG_A0))?;
                let _ = self.out.write_all(&bytes);
            }
            // read_int
            5 => {
                let line = self.read_line();
                let value = line.trim().parse::<i32>().unwrap_or(0);
                state.regs.write(REG_V0, value as u32);
            }
            // read_float
            6 => {
                let line = self.read_line();
                let value = line.trim().parse::<f32>().unwrap_or(0.0);
                state.fpu.write_single(0, value);
            }
            // read_double
            7 => {
                let line = self.read_line();
                let value = line.trim().parse::<f64>().unwrap_or(0.0);
                state.fpu.write_double(0, value);
            }
            // read_string
            8 => {
                let buffer = state.regs.read(REG_A0);
                let max_len = state.regs.read(REG_A1);
                if max_len > 0 {
                    let line = self.read_line();
                    let bytes = line.trim_end_matches('\n').as_bytes();
                    let keep = bytes.len().min(max_len as usize - 1);
                    for (i, byte) in bytes[..keep].iter().enumerate() {
                        mem.write_byte(buffer.wrapping_add(i as u32), *byte)?;
                    }
                    mem.write_byte(buffer.wrapping_add(keep as u32), 0)?;
                }
            }
            // sbrk
            9 => {
                let amount = state.regs.read(REG_A0);
                let previous = mem.map.sbrk(amount);
                state.regs.write(REG_V0, previous);
            }
            // exit
            10 => state.terminate(),
            // print_char
            11 => {
                let byte = state.regs.read(REG_A0) as u8;
                let _ = self.out.write_all(&[byte]);
            }
            // read_char
            12 => {
                let line = self.read_line();
                let ch = line.bytes().next().unwrap_or(0);
                state.regs.write(REG_V0, ch as u32);
            }
            // open
            13 => {
                let path_bytes = Self::read_c_string(mem, state.regs.read(REG_A0))?;
                let path = String::from_utf8_lossy(&path_bytes).into_owned();
                let flags = state.regs.read(REG_A1);
                let file = match flags {
                    0 => File::open(&path),
                    1 => File::create(&path),
                    9 => std::fs::OpenOptions::new().append(true).create(true).open(&path),
                    _ => File::open(&path),
                };
                match file {
                    Ok(f) => {
                        let fd = FD_BASE + self.files.len() as u32;
                        self.files.push(Some(f));
                        state.regs.write(REG_V0, fd);
                    }
                    Err(_) => state.regs.write(REG_V0, u32::MAX),
                }
            }
            // read
            14 => {
                let fd = state.regs.read(REG_A0);
                let buffer = state.regs.read(REG_A1);
                let len = state.regs.read(REG_A2) as usize;
                let mut scratch = vec![0u8; len];
                let count = match self.file_mut(fd) {
                    Some(file) => file.read(&mut scratch).unwrap_or(0),
                    None => {
                        state.regs.write(REG_V0, u32::MAX);
                        return Ok(());
                    }
                };
                for (i, byte) in scratch[..count].iter().enumerate() {
                    mem.write_byte(buffer.wrapping_add(i as u32), *byte)?;
                }
                state.regs.write(REG_V0, count as u32);
            }
            // write
            15 => {
                let fd = state.regs.read(REG_A0);
                let buffer = state.regs.read(REG_A1);
                let len = state.regs.read(REG_A2);
                let mut bytes = Vec::with_capacity(len as usize);
                for i in 0..len {
                    bytes.push(mem.read_byte(buffer.wrapping_add(i), AccessType::Read)?);
                }
                if fd == 1 || fd == 2 {
                    let _ = self.out.write_all(&bytes);
                    state.regs.write(REG_V0, len);
                } else {
                    match self.file_mut(fd) {
                        Some(file) => {
                            let count = file.write(&bytes).unwrap_or(0);
                            state.regs.write(REG_V0, count as u32);
                        }
                        None => state.regs.write(REG_V0, u32::MAX),
                    }
                }
            }
            // close
            16 => {
                let fd = state.regs.read(REG_A0);
                if fd >= FD_BASE {
                    let idx = (fd - FD_BASE) as usize;
                    if idx < self.files.len() {
                        self.files[idx] = None;
                    }
                }
            }
            // exit with status
            17 => {
                self.exit_code = Some(state.regs.read(REG_A0));
                state.terminate();
            }
            // time
            30 => {
                let millis = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or(0);
                state.regs.write(REG_A0, millis as u32);
                state.regs.write(REG_A1, (millis >> 32) as u32);
            }
            // print hex / binary / unsigned
            34 => {
                let value = state.regs.read(REG_A0);
                let _ = write!(self.out, "0x{:08x}", value);
            }
            35 => {
                let value = state.regs.read(REG_A0);
                let _ = write!(self.out, "{:032b}", value);
            }
            36 => {
                let value = state.regs.read(REG_A0);
                let _ = write!(self.out, "{}", value);
            }
            // seeded random streams
            40 => {
                let id = state.regs.read(REG_A0);
                let seed = state.regs.read(REG_A1) as u64;
                self.streams.insert(id, Lcg::new(seed));
            }
            41 => {
                let id = state.regs.read(REG_A0);
                let value = self.stream(id).next_u32();
                state.regs.write(REG_A0, value);
            }
            42 => {
                let id = state.regs.read(REG_A0);
                let bound = state.regs.read(REG_A1).max(1);
                let value = self.stream(id).next_u32() % bound;
                state.regs.write(REG_A0, value);
            }
            43 => {
                let id = state.regs.read(REG_A0);
                let value = self.stream(id).next_u32() as f32 / u32::MAX as f32;
                state.fpu.write_single(0, value);
            }
            44 => {
                let id = state.regs.read(REG_A0);
                let value = self.stream(id).next_u32() as f64 / u32::MAX as f64;
                state.fpu.write_double(0, value);
            }
            // dialog families
            50..=59 => match self.dialog_handler.as_mut() {
                Some(handler) => handler(code, state, mem),
                None => warn!(code, "dialog syscall with no host handler"),
            },
            // bitmap blit: copy $a2 bytes from $a0 into the framebuffer
            // at offset $a1.
            61 => {
                let src = state.regs.read(REG_A0);
                let offset = state.regs.read(REG_A1);
                let len = state.regs.read(REG_A2);
                for i in 0..len {
                    let byte = mem.read_byte(src.wrapping_add(i), AccessType::Read)?;
                    mem.write_byte(BITMAP_BASE.wrapping_add(offset).wrapping_add(i), byte)?;
                }
            }
            // display write: push $a0's low byte at the display.
            63 => {
                let byte = state.regs.read(REG_A0) as u8;
                mem.write_byte(DISPLAY_BASE + 4, byte)?;
            }
            other => warn!(code = other, "unassigned syscall code"),
        }
        Ok(())
    }

    fn file_mut(&mut self, fd: u32) -> Option<&mut File> {
        if fd < FD_BASE {
            return None;
        }
        self.files
            .get_mut((fd - FD_BASE) as usize)
            .and_then(|f| f.as_mut())
    }
}

impl Default for SyscallTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Wires the shared syscall table in as the controller's syscall
/// routine.
///
/// The routine reads the syscall number from `$v0`, dispatches through
/// the table, drops back to user mode, and leaves the PC unchanged so
/// execution resumes at the delay-slot-adjusted address the pipeline
/// prepared.
pub fn install_syscall_routine(
    interrupts: &mut InterruptController,
    table: Rc<RefCell<SyscallTable>>,
) {
    interrupts.register_routine(
        InterruptKind::Syscall,
        Box::new(move |_request, state, mem| {
            let code = state.regs.read(REG_V0);
            if let Err(err) = table.borrow_mut().handle(code, state, mem) {
                warn!(%err, "syscall handler fault");
            }
            state.cop0[COP0_STATUS] &= !STATUS_EXL;
            mem.map.set_kernel_mode(false);
            None
        }),
    );
}
