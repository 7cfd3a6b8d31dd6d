//! Integration tests for the image format, the loader, configuration
//! parsing, and snapshot publication.

mod util;

use std::cell::RefCell;
use std::rc::Rc;

use mips32_sim::config::{Config, WritePolicy};
use mips32_sim::core::pipeline::snapshot::{Observer, PipelineSnapshot, RuntimeSnapshot};
use mips32_sim::core::{MachineState, Pipeline, StepOutcome};
use mips32_sim::sim::{load_image, BinaryImage};
use util::*;

/// Tests parsing a minimal image with defaults for optional fields.
#[test]
fn test_image_from_json() {
    let json = r#"{
        "text_base": 4194304,
        "data_base": 268435456,
        "text": [537395205, 537460743],
        "data": [1, 2, 3],
        "symbols": { "main": 4194304 }
    }"#;
    let image = BinaryImage::from_json(json).unwrap();
    assert_eq!(image.text_base, TEXT_BASE);
    assert_eq!(image.data_base, DATA_BASE);
    assert_eq!(image.text.len(), 2);
    assert_eq!(image.symbol("main"), Some(TEXT_BASE));
    assert!(image.ktext_base.is_none());
    assert!(image.relocations.is_empty());
}

/// Tests the loader placing segments and seeding PC, $sp, and $gp.
#[test]
fn test_loader_seeds_state() {
    let image = BinaryImage::from_json(
        r#"{
            "text_base": 4194304,
            "data_base": 268435456,
            "text": [537395205],
            "data": [170, 187]
        }"#,
    )
    .unwrap();

    let mut state = MachineState::new(TEXT_BASE);
    let mut mem = default_memory();
    load_image(&image, &mut state, &mut mem, 0x7FFF_FFFC);

    assert_eq!(mem.peek(TEXT_BASE), 0x05);
    assert!(mem.has_instruction(TEXT_BASE));
    assert_eq!(mem.peek(DATA_BASE), 170);
    assert_eq!(mem.peek(DATA_BASE + 1), 187);

    assert_eq!(state.pc, TEXT_BASE);
    assert_eq!(state.regs.read(29), 0x7FFF_FFFC);
    assert_eq!(state.regs.read(28), DATA_BASE + 0x8000);
}

/// Tests that a loaded image runs: the word 537395205 is
/// addi $t0,$zero,5.
#[test]
fn test_loaded_image_executes() {
    let image = BinaryImage::from_json(
        r#"{
            "text_base": 4194304,
            "data_base": 268435456,
            "text": [537395205]
        }"#,
    )
    .unwrap();

    let config = Config::default();
    let mut mem = default_memory();
    let mut state = MachineState::new(TEXT_BASE);
    load_image(&image, &mut state, &mut mem, config.memory.stack_base_val());

    let mut pipeline = Pipeline::new(state, mem, &config.pipeline);
    assert_eq!(run_to_halt(&mut pipeline), StepOutcome::Halted);
    assert_eq!(pipeline.state.regs.read(8), 5);
}

/// Tests TOML configuration parsing with partial overrides.
#[test]
fn test_config_parsing() {
    let toml = r#"
        [general]
        trace_instructions = true

        [cache.data]
        enabled = true
        size_bytes = 2048
        line_bytes = 32
        ways = 4
        write_policy = "write-through"

        [pipeline]
        forwarding_enabled = false
    "#;
    let config: Config = toml::from_str(toml).unwrap();
    assert!(config.general.trace_instructions);
    assert!(config.cache.data.enabled);
    assert_eq!(config.cache.data.size_bytes, 2048);
    assert_eq!(config.cache.data.write_policy, WritePolicy::WriteThrough);
    assert!(!config.cache.instruction.enabled);
    assert!(!config.pipeline.forwarding_enabled);
    assert!(config.pipeline.hazard_detection_enabled);
    assert_eq!(config.memory.text_base_val(), TEXT_BASE);
}

/// An observer that records every snapshot it is handed.
#[derive(Default)]
struct Recorder {
    pipeline: Rc<RefCell<Vec<u64>>>,
    runtime: Rc<RefCell<Vec<u32>>>,
}

impl Observer for Recorder {
    fn pipeline_snapshot(&mut self, snapshot: &PipelineSnapshot) {
        self.pipeline.borrow_mut().push(snapshot.cycle);
    }

    fn runtime_snapshot(&mut self, snapshot: &RuntimeSnapshot) {
        self.runtime.borrow_mut().push(snapshot.pc);
    }
}

/// Tests that both snapshots are published once per step, in cycle
/// order, and stop after unsubscribe.
#[test]
fn test_snapshot_publication() {
    let mut pipeline = build_pipeline(&[addi(8, 0, 1), addi(9, 0, 2)]);

    let recorder = Recorder::default();
    let cycles = Rc::clone(&recorder.pipeline);
    let pcs = Rc::clone(&recorder.runtime);
    let handle = pipeline.subscribe(Box::new(recorder));

    pipeline.step().unwrap();
    pipeline.step().unwrap();
    assert_eq!(*cycles.borrow(), vec![1, 2]);
    assert_eq!(pcs.borrow().len(), 2);

    pipeline.unsubscribe(handle);
    pipeline.step().unwrap();
    assert_eq!(cycles.borrow().len(), 2, "no publication after unsubscribe");
}

/// Tests the statistics snapshot carried inside the pipeline snapshot.
#[test]
fn test_statistics_snapshot() {
    let mut pipeline = build_pipeline(&[addi(8, 0, 1), addi(9, 0, 2), add(10, 8, 9)]);
    run_to_halt(&mut pipeline);

    let stats = pipeline.stats.snapshot();
    assert_eq!(stats.instruction_count, 3);
    assert!(stats.cycle_count >= 7, "fetch/decode/execute/retire depth");
    assert!(stats.cpi >= 1.0);
    assert_eq!(stats.stall_count, 0);
}

/// Tests that pipeline snapshots expose stage payloads and hazard
/// flags.
#[test]
fn test_pipeline_snapshot_contents() {
    #[derive(Default)]
    struct Last(Rc<RefCell<Option<PipelineSnapshot>>>);
    impl Observer for Last {
        fn pipeline_snapshot(&mut self, snapshot: &PipelineSnapshot) {
            *self.0.borrow_mut() = Some(snapshot.clone());
        }
    }

    let mut pipeline = build_pipeline(&[addi(8, 0, 1)]);
    let last = Last::default();
    let shared = Rc::clone(&last.0);
    pipeline.subscribe(Box::new(last));

    pipeline.step().unwrap();
    let snapshot = shared.borrow().clone().unwrap();
    assert_eq!(snapshot.cycle, 1);
    assert!(!snapshot.if_id.bubble, "first fetch landed in IF/ID");
    assert_eq!(snapshot.if_id.pc, TEXT_BASE);
    assert!(snapshot.id_ex.bubble);
    assert!(snapshot.forwarding_enabled);
    assert!(snapshot.hazard_detection_enabled);

    pipeline.step().unwrap();
    let snapshot = shared.borrow().clone().unwrap();
    assert_eq!(snapshot.id_ex.decoded_name, Some("addi"));
}
