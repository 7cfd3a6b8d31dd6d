//! MIPS32 Instruction-Set Simulator Library.
//!
//! This crate implements the execution core of a MIPS32 simulator: it
//! takes a linked binary image and interprets its instruction stream,
//! producing observable effects on a register file, main memory,
//! memory-mapped devices, and a delayed-branch control flow.
//!
//! # Architecture
//!
//! * **Core**: 5-stage in-order pipeline (Fetch, Decode, Execute,
//!   Memory, Writeback) with hazard detection, forwarding, delayed
//!   branches, and interrupt funneling.
//! * **Memory**: segmented layout with TLB translation, access-rights
//!   enforcement, optional set-associative LRU caches, and MMIO.
//! * **Peripherals**: keyboard, display, bitmap display, real-time
//!   clock, seven-segment display, audio.
//!
//! # Modules
//!
//! * `common`: shared types and the exception taxonomy.
//! * `config`: configuration loading and parsing.
//! * `core`: machine state, hazards, interrupts, the pipeline.
//! * `isa`: instruction decoding and execution.
//! * `mem`: the memory hierarchy.
//! * `sim`: image loading and syscalls.
//! * `soc`: memory-mapped devices.
//! * `stats`: performance statistics collection.

/// Shared types, access classification, and the exception taxonomy.
pub mod common;

/// Configuration system for the memory layout, caches, and pipeline.
///
/// Loads and parses TOML configuration files to customize simulator
/// behavior for different scenarios.
pub mod config;

/// CPU core: machine state, hazard unit, interrupt controller, and the
/// five-stage pipeline simulator.
pub mod core;

/// Instruction Set Architecture: decoder, executor, FPU helpers.
pub mod isa;

/// Memory hierarchy: segmented map with TLB, caches, backing store,
/// MMIO dispatch.
pub mod mem;

/// Simulation harness: binary images, the loader, the syscall table.
pub mod sim;

/// Memory-mapped device set.
pub mod soc;

/// Performance statistics collection and reporting.
pub mod stats;
