//! Shared helpers for the integration tests: instruction encoders and
//! a pipeline builder over the default layout.

#![allow(dead_code)]

use mips32_sim::config::Config;
use mips32_sim::core::{MachineState, Pipeline, StepOutcome};
use mips32_sim::mem::{Memory, MemoryMap};
use mips32_sim::soc::devices::{
    Audio, BitmapDisplay, Display, Keyboard, Rtc, SevenSegment, AUDIO_BASE, BITMAP_BASE,
    DISPLAY_BASE, KEYBOARD_BASE, RTC_BASE, SEVENSEG_BASE,
};

pub const TEXT_BASE: u32 = 0x0040_0000;
pub const DATA_BASE: u32 = 0x1000_0000;

pub fn r_type(op: u32, rs: u32, rt: u32, rd: u32, shamt: u32, funct: u32) -> u32 {
    (op << 26) | (rs << 21) | (rt << 16) | (rd << 11) | (shamt << 6) | funct
}

pub fn i_type(op: u32, rs: u32, rt: u32, imm: u16) -> u32 {
    (op << 26) | (rs << 21) | (rt << 16) | imm as u32
}

pub fn j_type(op: u32, index: u32) -> u32 {
    (op << 26) | (index & 0x03FF_FFFF)
}

pub fn addi(rt: u32, rs: u32, imm: i16) -> u32 {
    i_type(0x08, rs, rt, imm as u16)
}

pub fn addiu(rt: u32, rs: u32, imm: i16) -> u32 {
    i_type(0x09, rs, rt, imm as u16)
}

pub fn add(rd: u32, rs: u32, rt: u32) -> u32 {
    r_type(0, rs, rt, rd, 0, 0x20)
}

pub fn addu(rd: u32, rs: u32, rt: u32) -> u32 {
    r_type(0, rs, rt, rd, 0, 0x21)
}

pub fn sub(rd: u32, rs: u32, rt: u32) -> u32 {
    r_type(0, rs, rt, rd, 0, 0x22)
}

pub fn lui(rt: u32, imm: u16) -> u32 {
    i_type(0x0F, 0, rt, imm)
}

pub fn ori(rt: u32, rs: u32, imm: u16) -> u32 {
    i_type(0x0D, rs, rt, imm)
}

pub fn beq(rs: u32, rt: u32, offset: i16) -> u32 {
    i_type(0x04, rs, rt, offset as u16)
}

pub fn bne(rs: u32, rt: u32, offset: i16) -> u32 {
    i_type(0x05, rs, rt, offset as u16)
}

pub fn j(index: u32) -> u32 {
    j_type(0x02, index)
}

pub fn jal(index: u32) -> u32 {
    j_type(0x03, index)
}

pub fn jr(rs: u32) -> u32 {
    r_type(0, rs, 0, 0, 0, 0x08)
}

pub fn lw(rt: u32, offset: i16, base: u32) -> u32 {
    i_type(0x23, base, rt, offset as u16)
}

pub fn sw(rt: u32, offset: i16, base: u32) -> u32 {
    i_type(0x2B, base, rt, offset as u16)
}

pub fn lb(rt: u32, offset: i16, base: u32) -> u32 {
    i_type(0x20, base, rt, offset as u16)
}

pub fn sb(rt: u32, offset: i16, base: u32) -> u32 {
    i_type(0x28, base, rt, offset as u16)
}

pub fn ll(rt: u32, offset: i16, base: u32) -> u32 {
    i_type(0x30, base, rt, offset as u16)
}

pub fn sc(rt: u32, offset: i16, base: u32) -> u32 {
    i_type(0x38, base, rt, offset as u16)
}

pub fn syscall() -> u32 {
    0x0000_000C
}

pub fn mult(rs: u32, rt: u32) -> u32 {
    r_type(0, rs, rt, 0, 0, 0x18)
}

pub fn div(rs: u32, rt: u32) -> u32 {
    r_type(0, rs, rt, 0, 0, 0x1A)
}

pub fn mflo(rd: u32) -> u32 {
    r_type(0, 0, 0, rd, 0, 0x12)
}

pub fn mfhi(rd: u32) -> u32 {
    r_type(0, 0, 0, rd, 0, 0x10)
}

/// Builds a memory over the default layout with the standard device
/// set registered.
pub fn default_memory() -> Memory {
    let config = Config::default();
    let map = MemoryMap::new(&config.memory);
    let mut memory = Memory::new(map, &config.cache);
    memory.register_device(KEYBOARD_BASE, Box::new(Keyboard::new()));
    memory.register_device(DISPLAY_BASE, Box::new(Display::new()));
    memory.register_device(RTC_BASE, Box::new(Rtc::new()));
    memory.register_device(SEVENSEG_BASE, Box::new(SevenSegment::new()));
    memory.register_device(AUDIO_BASE, Box::new(Audio::new()));
    memory.register_device(BITMAP_BASE, Box::new(BitmapDisplay::new()));
    memory
}

/// Builds a pipeline with `program` placed at the text base.
pub fn build_pipeline(program: &[u32]) -> Pipeline {
    let config = Config::default();
    let mut memory = default_memory();
    for (i, word) in program.iter().enumerate() {
        memory.poke_word(TEXT_BASE + (i as u32) * 4, *word);
    }
    let state = MachineState::new(TEXT_BASE);
    Pipeline::new(state, memory, &config.pipeline)
}

/// Steps until the pipeline reports something other than `Running`.
pub fn run_to_halt(pipeline: &mut Pipeline) -> StepOutcome {
    pipeline.run(10_000).expect("program faulted")
}
