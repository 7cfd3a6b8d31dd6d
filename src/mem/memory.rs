//! Byte-addressable memory with caches and MMIO dispatch.
//!
//! Every access resolves each byte through the memory map (TLB, rights,
//! kernel gating). A byte that lands in a registered device range is
//! routed to the device, bypassing the caches. Otherwise the
//! instruction cache (fetches) or the data cache (reads/writes)
//! mediates when enabled, and the sparse backing store is the final
//! destination.

use crate::common::{AccessType, CpuException};
use crate::config::{CacheHierarchyConfig, WritePolicy};
use crate::mem::cache::{Cache, CacheStats};
use crate::mem::map::MemoryMap;
use crate::soc::Device;

pub struct Memory {
    pub map: MemoryMap,
    backing: crate::mem::store::SparseStore,
    icache: Option<Cache>,
    dcache: Option<Cache>,
    dcache_write_through: bool,
    devices: Vec<Box<dyn Device>>,
}

impl Memory {
    pub fn new(map: MemoryMap, caches: &CacheHierarchyConfig) -> Self {
        let icache = caches.instruction.enabled.then(|| Cache::new(&caches.instruction));
        let dcache = caches.data.enabled.then(|| Cache::new(&caches.data));
        let dcache_write_through = caches.data.write_policy == WritePolicy::WriteThrough;
        Self {
            map,
            backing: crate::mem::store::SparseStore::new(),
            icache,
            dcache,
            dcache_write_through,
            devices: Vec::new(),
        }
    }

    /// Registers a device at `base`, wiring its range into the map.
    /// Returns the device index.
    pub fn register_device(&mut self, base: u32, device: Box<dyn Device>) -> usize {
        let idx = self.devices.len();
        self.map.add_device_range(base, device.size(), idx);
        self.devices.push(device);
        idx
    }

    pub fn device(&self, idx: usize) -> &dyn Device {
        self.devices[idx].as_ref()
    }

    pub fn device_mut(&mut self, idx: usize) -> &mut (dyn Device + 'static) {
        self.devices[idx].as_mut()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Ticks every device; returns the indices of devices raising an
    /// interrupt this step.
    pub fn tick_devices(&mut self) -> Vec<usize> {
        let mut raised = Vec::new();
        for (idx, dev) in self.devices.iter_mut().enumerate() {
            if dev.tick() {
                raised.push(idx);
            }
        }
        raised
    }

    /// Reads one byte with full resolution and cache mediation.
    pub fn read_byte(&mut self, addr: u32, access: AccessType) -> Result<u8, CpuException> {
        let resolved = self.map.resolve(addr, access)?;
        if let Some((dev, offset)) = resolved.device {
            return Ok(self.devices[dev].read_byte(offset).unwrap_or(0));
        }
        let cache = match access {
            AccessType::Execute => self.icache.as_mut(),
            AccessType::Read | AccessType::Write => self.dcache.as_mut(),
        };
        if let Some(cache) = cache {
            return Ok(cache.read_byte(resolved.phys, &mut self.backing));
        }
        Ok(self.backing.read_byte(resolved.phys))
    }

    /// Writes one byte with full resolution and cache mediation.
    pub fn write_byte(&mut self, addr: u32, val: u8) -> Result<(), CpuException> {
        let resolved = self.map.resolve(addr, AccessType::Write)?;
        if let Some((dev, offset)) = resolved.device {
            self.devices[dev].write_byte(offset, val);
            return Ok(());
        }
        if let Some(dcache) = self.dcache.as_mut() {
            dcache.write_byte(resolved.phys, val, &mut self.backing);
            // Keep fetches coherent with self-modifying code: drop any
            // stale instruction-cache line covering the stored byte.
            // Only a write-through data cache guarantees the backing
            // store is current when the line is refilled.
            if self.dcache_write_through {
                if let Some(icache) = self.icache.as_mut() {
                    icache.invalidate(resolved.phys);
                }
            }
        } else {
            self.backing.write_byte(resolved.phys, val);
            if let Some(icache) = self.icache.as_mut() {
                icache.invalidate(resolved.phys);
            }
        }
        Ok(())
    }

    /// Reads an aligned 32-bit word, little-endian.
    pub fn read_word(&mut self, addr: u32, access: AccessType) -> Result<u32, CpuException> {
        if addr % 4 != 0 {
            return Err(CpuException::AddressError { addr, access, pc: 0 });
        }
        let mut word = 0u32;
        for i in 0..4 {
            word |= (self.read_byte(addr + i, access)? as u32) << (i * 8);
        }
        Ok(word)
    }

    /// Writes an aligned 32-bit word, little-endian.
    pub fn write_word(&mut self, addr: u32, val: u32) -> Result<(), CpuException> {
        if addr % 4 != 0 {
            return Err(CpuException::AddressError {
                addr,
                access: AccessType::Write,
                pc: 0,
            });
        }
        for i in 0..4 {
            self.write_byte(addr + i, (val >> (i * 8)) as u8)?;
        }
        Ok(())
    }

    /// Reads an aligned 16-bit halfword, little-endian.
    pub fn read_half(&mut self, addr: u32, access: AccessType) -> Result<u16, CpuException> {
        if addr % 2 != 0 {
            return Err(CpuException::AddressError { addr, access, pc: 0 });
        }
        let lo = self.read_byte(addr, access)? as u16;
        let hi = self.read_byte(addr + 1, access)? as u16;
        Ok((hi << 8) | lo)
    }

    /// Writes an aligned 16-bit halfword, little-endian.
    pub fn write_half(&mut self, addr: u32, val: u16) -> Result<(), CpuException> {
        if addr % 2 != 0 {
            return Err(CpuException::AddressError {
                addr,
                access: AccessType::Write,
                pc: 0,
            });
        }
        self.write_byte(addr, val as u8)?;
        self.write_byte(addr + 1, (val >> 8) as u8)
    }

    /// Convenience read: a word when `addr` is aligned, a byte otherwise.
    pub fn read(&mut self, addr: u32) -> Result<u32, CpuException> {
        if addr % 4 == 0 {
            self.read_word(addr, AccessType::Read)
        } else {
            Ok(self.read_byte(addr, AccessType::Read)? as u32)
        }
    }

    /// Fetches the instruction word at `addr`.
    pub fn load_word(&mut self, addr: u32) -> Result<u32, CpuException> {
        self.read_word(addr, AccessType::Execute)
    }

    /// Whether a program word has ever been placed at `addr`.
    pub fn has_instruction(&self, addr: u32) -> bool {
        self.backing.contains_word(addr)
    }

    /// Loader-side direct write to the backing store, bypassing
    /// translation and caches.
    pub fn poke(&mut self, addr: u32, val: u8) {
        self.backing.write_byte(addr, val);
    }

    pub fn poke_word(&mut self, addr: u32, val: u32) {
        for i in 0..4 {
            self.backing.write_byte(addr + i, (val >> (i * 8)) as u8);
        }
    }

    /// Debug-side direct read of the backing store.
    pub fn peek(&self, addr: u32) -> u8 {
        self.backing.read_byte(addr)
    }

    /// Writes back every dirty cache line.
    pub fn flush_caches(&mut self) {
        if let Some(c) = self.dcache.as_mut() {
            c.flush(&mut self.backing);
        }
        if let Some(c) = self.icache.as_mut() {
            c.flush(&mut self.backing);
        }
    }

    pub fn icache_stats(&self) -> Option<CacheStats> {
        self.icache.as_ref().map(|c| c.stats)
    }

    pub fn dcache_stats(&self) -> Option<CacheStats> {
        self.dcache.as_ref().map(|c| c.stats)
    }

    /// Clears all bytes and drops every cache line.
    pub fn reset(&mut self) {
        self.backing.clear();
        if let Some(c) = self.icache.as_mut() {
            c.invalidate_all();
        }
        if let Some(c) = self.dcache.as_mut() {
            c.invalidate_all();
        }
        self.map.reset_heap();
    }
}
