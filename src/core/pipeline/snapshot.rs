//! Pipeline and runtime snapshots with their subscriber registry.
//!
//! Snapshots are published synchronously at the end of every step.
//! Observers (breakpoint engines, watches, UIs) subscribe against the
//! engine and receive both the pipeline view and the runtime view;
//! listeners must be non-blocking.

use serde::Serialize;

use crate::core::pipeline::latches::Latch;
use crate::mem::CacheStats;
use crate::stats::StatisticsSnapshot;

/// Outcome of one pipeline step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Running,
    Breakpoint,
    Halted,
    Terminated,
}

/// View of one pipeline latch.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StageSnapshot {
    pub pc: u32,
    pub instruction: u32,
    pub decoded_name: Option<&'static str>,
    pub bubble: bool,
    pub stalled: bool,
    pub flushed: bool,
}

impl StageSnapshot {
    pub(crate) fn of(latch: &Latch, stalled: bool, flushed: bool) -> Self {
        match latch.current() {
            Some(slot) => Self {
                pc: slot.pc,
                instruction: slot.instruction,
                decoded_name: slot.decoded.as_ref().map(|d| d.name),
                bubble: false,
                stalled,
                flushed,
            },
            None => Self {
                bubble: true,
                stalled,
                flushed,
                ..Self::default()
            },
        }
    }
}

/// The pipeline view published each step.
#[derive(Clone, Debug, Serialize)]
pub struct PipelineSnapshot {
    pub cycle: u64,
    pub if_id: StageSnapshot,
    pub id_ex: StageSnapshot,
    pub ex_mem: StageSnapshot,
    pub mem_wb: StageSnapshot,
    pub load_use_hazard: bool,
    pub structural_hazard: bool,
    pub branch_registered: bool,
    pub forwarding_enabled: bool,
    pub hazard_detection_enabled: bool,
    pub statistics: StatisticsSnapshot,
}

/// The runtime view published each step.
#[derive(Clone, Debug, Serialize)]
pub struct RuntimeSnapshot {
    pub cycle: u64,
    pub pc: u32,
    pub status: StepOutcome,
    pub registers: [u32; 32],
    pub hi: u32,
    pub lo: u32,
    pub terminated: bool,
    pub icache: Option<CacheStats>,
    pub dcache: Option<CacheStats>,
}

/// A snapshot listener.
pub trait Observer {
    fn pipeline_snapshot(&mut self, _snapshot: &PipelineSnapshot) {}
    fn runtime_snapshot(&mut self, _snapshot: &RuntimeSnapshot) {}
}

/// Disposal handle returned by `subscribe`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionHandle(usize);

/// Per-engine subscription registry. No process-wide singletons;
/// publication runs synchronously on the stepping thread.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: Vec<(usize, Box<dyn Observer>)>,
    next_id: usize,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Box<dyn Observer>) -> SubscriptionHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push((id, observer));
        SubscriptionHandle(id)
    }

    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) {
        self.subscribers.retain(|(id, _)| *id != handle.0);
    }

    pub fn publish_pipeline_snapshot(&mut self, snapshot: &PipelineSnapshot) {
        for (_, observer) in &mut self.subscribers {
            observer.pipeline_snapshot(snapshot);
        }
    }

    pub fn publish_runtime_snapshot(&mut self, snapshot: &RuntimeSnapshot) {
        for (_, observer) in &mut self.subscribers {
            observer.runtime_snapshot(snapshot);
        }
    }
}
