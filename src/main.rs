//! MIPS32 Simulator CLI.
//!
//! The main executable for the simulator. It parses command-line
//! arguments, loads the TOML configuration and the JSON binary image,
//! wires up the default device set and syscall table, and drives the
//! pipeline until the program halts or terminates.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::{fs, process};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mips32_sim::config::Config;
use mips32_sim::core::{MachineState, Pipeline, StepOutcome};
use mips32_sim::mem::{Memory, MemoryMap};
use mips32_sim::sim::{install_syscall_routine, load_image, BinaryImage, SyscallTable};
use mips32_sim::soc::devices::{
    Audio, BitmapDisplay, Display, Keyboard, Rtc, SevenSegment, AUDIO_BASE, BITMAP_BASE,
    DISPLAY_BASE, KEYBOARD_BASE, RTC_BASE, SEVENSEG_BASE,
};

/// Command-line arguments for the MIPS32 simulator.
#[derive(Parser, Debug)]
#[command(author, version, about = "MIPS32 pipeline simulator")]
struct Args {
    /// TOML configuration file; built-in defaults apply when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Linked binary image (JSON) to execute.
    #[arg(short, long)]
    image: PathBuf,

    /// Cycle budget override.
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Per-stage instruction tracing (sets the trace log level).
    #[arg(long)]
    trace: bool,
}

fn main() {
    let args = Args::parse();

    let config: Config = match &args.config {
        Some(path) => {
            let content = fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("[!] cannot read config {}: {}", path.display(), e);
                process::exit(1);
            });
            toml::from_str(&content).unwrap_or_else(|e| {
                eprintln!("[!] cannot parse config {}: {}", path.display(), e);
                process::exit(1);
            })
        }
        None => Config::default(),
    };

    let filter = if args.trace || config.general.trace_instructions {
        EnvFilter::new("mips32_sim=trace")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let image = BinaryImage::from_file(&args.image).unwrap_or_else(|e| {
        eprintln!("[!] {}", e);
        process::exit(1);
    });

    println!("Global Configuration");
    println!("--------------------");
    println!("Memory:");
    println!("  Text Base:          {:#010x}", config.memory.text_base_val());
    println!("  Data Base:          {:#010x}", config.memory.data_base_val());
    println!("  Stack Base:         {:#010x}", config.memory.stack_base_val());
    println!("Pipeline:");
    println!("  Forwarding:         {}", config.pipeline.forwarding_enabled);
    println!(
        "  Hazard Detection:   {}",
        config.pipeline.hazard_detection_enabled
    );
    let cache_line = |label: &str, c: &mips32_sim::config::CacheConfig| {
        println!(
            "  {:<6} {} ({} B, {} B lines, {} ways)",
            label,
            if c.enabled { "Enabled" } else { "Disabled" },
            c.size_bytes,
            c.line_bytes,
            c.ways
        );
    };
    println!("Caches:");
    cache_line("I:", &config.cache.instruction);
    cache_line("D:", &config.cache.data);
    println!("--------------------");

    let map = MemoryMap::new(&config.memory);
    let mut memory = Memory::new(map, &config.cache);
    memory.register_device(KEYBOARD_BASE, Box::new(Keyboard::new()));
    memory.register_device(DISPLAY_BASE, Box::new(Display::new()));
    memory.register_device(RTC_BASE, Box::new(Rtc::new()));
    memory.register_device(SEVENSEG_BASE, Box::new(SevenSegment::new()));
    memory.register_device(AUDIO_BASE, Box::new(Audio::new()));
    memory.register_device(BITMAP_BASE, Box::new(BitmapDisplay::new()));

    let mut state = MachineState::new(config.memory.text_base_val());
    load_image(&image, &mut state, &mut memory, config.memory.stack_base_val());

    let mut pipeline = Pipeline::new(state, memory, &config.pipeline);
    let syscalls = Rc::new(RefCell::new(SyscallTable::new()));
    install_syscall_routine(&mut pipeline.interrupts, Rc::clone(&syscalls));

    let max_cycles = args.max_cycles.unwrap_or(config.general.max_cycles);
    let outcome = match pipeline.run(max_cycles) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("\n[!] FATAL: {}", e);
            pipeline.state.dump();
            pipeline
                .stats
                .print(pipeline.memory.icache_stats(), pipeline.memory.dcache_stats());
            process::exit(1);
        }
    };

    println!("\n[*] {:?} after {} cycles", outcome, pipeline.stats.cycles);
    pipeline
        .stats
        .print(pipeline.memory.icache_stats(), pipeline.memory.dcache_stats());

    let exit_code = syscalls.borrow().exit_code().unwrap_or(0);
    if outcome == StepOutcome::Terminated && exit_code != 0 {
        process::exit(exit_code as i32);
    }
}
