//! Set-associative LRU line cache.
//!
//! Lines own their byte buffers. Eviction picks the minimum `last_used`
//! within the set, ties broken by lowest way index so tests are
//! deterministic. A write-back cache defers stores until eviction or an
//! explicit flush; a write-through cache mirrors every store to the
//! backing store immediately.

use serde::Serialize;

use crate::config::{CacheConfig, WritePolicy};
use crate::mem::store::SparseStore;

/// One cache line: tag, state bits, LRU stamp, and the line's bytes.
#[derive(Clone)]
pub struct CacheLine {
    pub tag: u32,
    pub valid: bool,
    pub dirty: bool,
    pub last_used: u64,
    pub data: Vec<u8>,
}

/// Hit/miss/eviction counters for one cache.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub write_backs: u64,
}

/// A set-associative cache over the byte backing store.
pub struct Cache {
    lines: Vec<CacheLine>,
    sets: usize,
    ways: usize,
    line_size: usize,
    policy: WritePolicy,
    tick: u64,
    pub stats: CacheStats,
}

impl Cache {
    /// Builds a cache from its configuration.
    ///
    /// Line size must be a power of two; the set count derives from
    /// `size / (line_size * ways)` and must come out non-zero.
    pub fn new(config: &CacheConfig) -> Self {
        assert!(
            config.line_bytes.is_power_of_two(),
            "cache line size must be a power of two"
        );
        let sets = config.size_bytes / (config.line_bytes * config.ways);
        assert!(sets > 0, "cache geometry yields zero sets");

        let line = CacheLine {
            tag: 0,
            valid: false,
            dirty: false,
            last_used: 0,
            data: vec![0; config.line_bytes],
        };
        Self {
            lines: vec![line; sets * config.ways],
            sets,
            ways: config.ways,
            line_size: config.line_bytes,
            policy: config.write_policy,
            tick: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn line_size(&self) -> usize {
        self.line_size
    }

    fn set_index(&self, addr: u32) -> usize {
        (addr as usize / self.line_size) % self.sets
    }

    fn tag_of(&self, addr: u32) -> u32 {
        (addr / self.line_size as u32) / self.sets as u32
    }

    fn line_base(&self, addr: u32) -> u32 {
        addr & !(self.line_size as u32 - 1)
    }

    fn lookup(&self, addr: u32) -> Option<usize> {
        let set = self.set_index(addr);
        let tag = self.tag_of(addr);
        (0..self.ways)
            .map(|way| set * self.ways + way)
            .find(|&idx| self.lines[idx].valid && self.lines[idx].tag == tag)
    }

    /// Whether the line containing `addr` is resident.
    pub fn contains(&self, addr: u32) -> bool {
        self.lookup(addr).is_some()
    }

    /// Reads one byte through the cache, filling on miss.
    pub fn read_byte(&mut self, addr: u32, backing: &mut SparseStore) -> u8 {
        let idx = self.ensure_line(addr, backing);
        self.touch(idx);
        let offset = addr as usize % self.line_size;
        self.lines[idx].data[offset]
    }

    /// Writes one byte through the cache, filling on miss.
    ///
    /// Write-back marks the line dirty; write-through also stores the
    /// byte to the backing store right away.
    pub fn write_byte(&mut self, addr: u32, val: u8, backing: &mut SparseStore) {
        let idx = self.ensure_line(addr, backing);
        self.touch(idx);
        let offset = addr as usize % self.line_size;
        self.lines[idx].data[offset] = val;
        match self.policy {
            WritePolicy::WriteBack => self.lines[idx].dirty = true,
            WritePolicy::WriteThrough => backing.write_byte(addr, val),
        }
    }

    fn touch(&mut self, idx: usize) {
        self.tick += 1;
        self.lines[idx].last_used = self.tick;
    }

    /// Returns the index of a resident line for `addr`, loading it from
    /// the backing store (and evicting a victim) if needed.
    fn ensure_line(&mut self, addr: u32, backing: &mut SparseStore) -> usize {
        if let Some(idx) = self.lookup(addr) {
            self.stats.hits += 1;
            return idx;
        }
        self.stats.misses += 1;

        let set = self.set_index(addr);
        let victim = (0..self.ways)
            .map(|way| set * self.ways + way)
            .min_by_key(|&idx| {
                let line = &self.lines[idx];
                // Invalid lines lose every comparison.
                (line.valid, line.last_used, idx)
            })
            .expect("cache set is never empty");

        if self.lines[victim].valid {
            self.stats.evictions += 1;
            if self.lines[victim].dirty && self.policy == WritePolicy::WriteBack {
                self.write_back_line(victim, set, backing);
            }
        }

        let base = self.line_base(addr);
        for offset in 0..self.line_size {
            self.lines[victim].data[offset] = backing.read_byte(base + offset as u32);
        }
        self.lines[victim].tag = self.tag_of(addr);
        self.lines[victim].valid = true;
        self.lines[victim].dirty = false;
        victim
    }

    fn write_back_line(&mut self, idx: usize, set: usize, backing: &mut SparseStore) {
        self.stats.write_backs += 1;
        let line = &self.lines[idx];
        let base = (line.tag as usize * self.sets + set) as u32 * self.line_size as u32;
        for (offset, byte) in line.data.iter().enumerate() {
            backing.write_byte(base + offset as u32, *byte);
        }
    }

    /// Writes back every valid dirty line and clears its dirty bit.
    /// Valid lines stay resident.
    pub fn flush(&mut self, backing: &mut SparseStore) {
        for idx in 0..self.lines.len() {
            if self.lines[idx].valid && self.lines[idx].dirty {
                let set = idx / self.ways;
                self.write_back_line(idx, set, backing);
                self.lines[idx].dirty = false;
            }
        }
    }

    /// Drops the line containing `addr` without writing it back.
    pub fn invalidate(&mut self, addr: u32) {
        if let Some(idx) = self.lookup(addr) {
            self.lines[idx].valid = false;
            self.lines[idx].dirty = false;
        }
    }

    /// Drops every line without writing anything back.
    pub fn invalidate_all(&mut self) {
        for line in &mut self.lines {
            line.valid = false;
            line.dirty = false;
        }
        self.tick = 0;
        self.stats = CacheStats::default();
    }
}
