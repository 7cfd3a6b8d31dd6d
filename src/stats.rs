//! Simulation statistics collection and reporting.
//!
//! Tracks cycle and instruction counts, stall and bubble breakdowns,
//! interrupt activity, and cache behavior for the end-of-run summary.

use std::time::Instant;

use serde::Serialize;

use crate::mem::CacheStats;

/// Counters accumulated over a run.
pub struct SimStats {
    start_time: Instant,
    pub cycles: u64,
    pub instructions_retired: u64,

    pub stalls: u64,
    pub load_use_stalls: u64,
    pub structural_stalls: u64,
    pub raw_stalls: u64,

    pub bubbles: u64,
    pub flushes: u64,

    pub interrupts_taken: u64,
    pub syscalls: u64,
}

impl Default for SimStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            instructions_retired: 0,
            stalls: 0,
            load_use_stalls: 0,
            structural_stalls: 0,
            raw_stalls: 0,
            bubbles: 0,
            flushes: 0,
            interrupts_taken: 0,
            syscalls: 0,
        }
    }
}

/// Point-in-time copy of the counters published with every pipeline
/// snapshot.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct StatisticsSnapshot {
    pub cycle_count: u64,
    pub instruction_count: u64,
    pub stall_count: u64,
    pub load_use_stalls: u64,
    pub structural_stalls: u64,
    pub bubble_count: u64,
    pub flush_count: u64,
    pub cpi: f64,
    pub bubble_rate: f64,
}

impl SimStats {
    pub fn cpi(&self) -> f64 {
        let instr = if self.instructions_retired == 0 {
            1
        } else {
            self.instructions_retired
        };
        self.cycles as f64 / instr as f64
    }

    pub fn bubble_rate(&self) -> f64 {
        let cyc = if self.cycles == 0 { 1 } else { self.cycles };
        self.bubbles as f64 / cyc as f64
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            cycle_count: self.cycles,
            instruction_count: self.instructions_retired,
            stall_count: self.stalls,
            load_use_stalls: self.load_use_stalls,
            structural_stalls: self.structural_stalls,
            bubble_count: self.bubbles,
            flush_count: self.flushes,
            cpi: self.cpi(),
            bubble_rate: self.bubble_rate(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Prints the run summary.
    pub fn print(&self, icache: Option<CacheStats>, dcache: Option<CacheStats>) {
        let duration = self.start_time.elapsed();
        let seconds = duration.as_secs_f64();

        let cyc = if self.cycles == 0 { 1 } else { self.cycles };
        let khz = (self.cycles as f64 / seconds) / 1000.0;

        println!("\n==========================================================");
        println!("MIPS32 SIMULATION STATISTICS");
        println!("==========================================================");
        println!("host_seconds             {:.4} s", seconds);
        println!("sim_cycles               {}", self.cycles);
        println!("sim_freq                 {:.2} kHz", khz);
        println!("sim_insts                {}", self.instructions_retired);
        println!("sim_cpi                  {:.4}", self.cpi());
        println!("----------------------------------------------------------");
        println!("PIPELINE");
        println!(
            "  stalls.total           {} ({:.2}%)",
            self.stalls,
            (self.stalls as f64 / cyc as f64) * 100.0
        );
        println!("  stalls.load_use        {}", self.load_use_stalls);
        println!("  stalls.structural      {}", self.structural_stalls);
        println!("  stalls.raw             {}", self.raw_stalls);
        println!(
            "  bubbles                {} ({:.2}%)",
            self.bubbles,
            self.bubble_rate() * 100.0
        );
        println!("  flushes                {}", self.flushes);
        println!("  interrupts             {}", self.interrupts_taken);
        println!("  syscalls               {}", self.syscalls);
        println!("----------------------------------------------------------");
        println!("MEMORY HIERARCHY");

        let print_cache = |name: &str, stats: Option<CacheStats>| match stats {
            Some(s) => {
                let total = s.hits + s.misses;
                let miss_rate = if total > 0 {
                    (s.misses as f64 / total as f64) * 100.0
                } else {
                    0.0
                };
                println!(
                    "  {:<6} accesses: {:<10} | hits: {:<10} | miss_rate: {:.2}% | evictions: {}",
                    name, total, s.hits, miss_rate, s.evictions
                );
            }
            None => println!("  {:<6} disabled", name),
        };

        print_cache("I", icache);
        print_cache("D", dcache);
        println!("==========================================================");
    }
}
