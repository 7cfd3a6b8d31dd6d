//! Pipeline latch structures for inter-stage communication.
//!
//! Four latches carry instruction payloads between the five stages:
//! IF/ID, ID/EX, EX/MEM, MEM/WB. Each holds either a payload or a
//! bubble. Substeps stage their result in the latch's `next` slot;
//! the advance at the end of a step moves every `next` into `current`
//! at once.

use crate::isa::Decoded;

/// One instruction payload flowing through the pipeline.
#[derive(Clone, Debug)]
pub struct Slot {
    /// Program counter of the instruction.
    pub pc: u32,
    /// Raw 32-bit instruction encoding.
    pub instruction: u32,
    /// Decoded operation, present from ID/EX onward.
    pub decoded: Option<Decoded>,
}

impl Slot {
    pub fn fetched(pc: u32, instruction: u32) -> Self {
        Self {
            pc,
            instruction,
            decoded: None,
        }
    }
}

/// One pipeline latch: the visible payload and the staged next value.
#[derive(Clone, Debug, Default)]
pub struct Latch {
    current: Option<Slot>,
    next: Option<Slot>,
}

impl Latch {
    pub fn current(&self) -> Option<&Slot> {
        self.current.as_ref()
    }

    pub fn take_current(&mut self) -> Option<Slot> {
        self.current.take()
    }

    pub fn set_next(&mut self, slot: Option<Slot>) {
        self.next = slot;
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Moves the staged payload into view.
    pub fn advance(&mut self) {
        self.current = self.next.take();
    }

    /// Drops both the visible and the staged payload.
    pub fn clear(&mut self) {
        self.current = None;
        self.next = None;
    }
}
