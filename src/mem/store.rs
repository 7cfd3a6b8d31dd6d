//! Sparse byte backing store.
//!
//! The simulated 4 GiB address space is backed by a map keyed by the
//! 32-bit address. Absent bytes read as zero but are distinguishable
//! from written zeros, which is what lets the pipeline tell "no program
//! here" from "a zero word".

use std::collections::HashMap;

/// Byte-addressable sparse memory.
#[derive(Default)]
pub struct SparseStore {
    bytes: HashMap<u32, u8>,
}

impl SparseStore {
    pub fn new() -> Self {
        Self {
            bytes: HashMap::new(),
        }
    }

    pub fn read_byte(&self, addr: u32) -> u8 {
        self.bytes.get(&addr).copied().unwrap_or(0)
    }

    pub fn write_byte(&mut self, addr: u32, val: u8) {
        self.bytes.insert(addr, val);
    }

    /// Whether any byte has ever been written at `addr`.
    pub fn contains(&self, addr: u32) -> bool {
        self.bytes.contains_key(&addr)
    }

    /// Whether any byte of the aligned word at `addr` is populated.
    pub fn contains_word(&self, addr: u32) -> bool {
        (0..4).any(|i| self.bytes.contains_key(&addr.wrapping_add(i)))
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}
