//! Segmented memory map with TLB translation.
//!
//! The map owns the segment layout, the TLB, the registered device
//! ranges, and the kernel-mode flag. Every byte access resolves through
//! it: TLB translation (identity where no entry covers the address),
//! access-rights enforcement, kernel-mode gating for the kernel
//! segments and MMIO, and device-range identification.

use crate::common::{AccessType, CpuException};
use crate::config::{default_segment_sizes, MemoryLayoutConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    Text,
    Data,
    Heap,
    Stack,
    KText,
    KData,
    Mmio,
}

/// One address range with a writable bit.
#[derive(Clone, Copy, Debug)]
pub struct Segment {
    pub kind: SegmentKind,
    pub start: u32,
    pub end: u32,
    pub writable: bool,
}

impl Segment {
    fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr <= self.end
    }

    fn requires_kernel(&self) -> bool {
        matches!(
            self.kind,
            SegmentKind::KText | SegmentKind::KData | SegmentKind::Mmio
        )
    }
}

/// TLB access rights.
#[derive(Clone, Copy, Debug, Default)]
pub struct TlbRights {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl TlbRights {
    pub fn rwx() -> Self {
        Self {
            read: true,
            write: true,
            execute: true,
        }
    }

    fn allows(&self, access: AccessType) -> bool {
        match access {
            AccessType::Read => self.read,
            AccessType::Write => self.write,
            AccessType::Execute => self.execute,
        }
    }
}

/// One TLB entry mapping a virtual page run to a physical one.
#[derive(Clone, Copy, Debug)]
pub struct TlbEntry {
    pub virt_page: u32,
    pub phys_page: u32,
    /// Page size in bytes; must be a power of two.
    pub page_size: u32,
    pub rights: TlbRights,
}

/// A device range registered inside the MMIO segment.
#[derive(Clone, Copy, Debug)]
pub struct DeviceRange {
    pub start: u32,
    pub end: u32,
    /// Index into the owning [`Memory`](crate::mem::Memory)'s device table.
    pub device: usize,
}

/// The result of resolving one byte address.
#[derive(Clone, Copy, Debug)]
pub struct Resolved {
    pub phys: u32,
    pub segment: SegmentKind,
    /// Device index and offset within its range, when the physical
    /// address falls inside a registered MMIO device.
    pub device: Option<(usize, u32)>,
}

pub struct MemoryMap {
    segments: Vec<Segment>,
    tlb: Vec<TlbEntry>,
    devices: Vec<DeviceRange>,
    kernel_mode: bool,
    heap_break: u32,
    heap_base: u32,
}

impl MemoryMap {
    /// Builds the default segment layout from the configured bases.
    pub fn new(layout: &MemoryLayoutConfig) -> Self {
        let sizes = default_segment_sizes();
        let text = layout.text_base_val();
        let data = layout.data_base_val();
        let heap = layout.heap_base_val();
        let stack = layout.stack_base_val();
        let ktext = layout.ktext_base_val();
        let kdata = layout.kdata_base_val();
        let mmio = layout.mmio_base_val();

        let segments = vec![
            Segment {
                kind: SegmentKind::Text,
                start: text,
                end: text + sizes.text - 1,
                writable: true,
            },
            Segment {
                kind: SegmentKind::Data,
                start: data,
                end: heap - 1,
                writable: true,
            },
            Segment {
                kind: SegmentKind::Heap,
                start: heap,
                end: stack - sizes.stack,
                writable: true,
            },
            Segment {
                kind: SegmentKind::Stack,
                start: stack - sizes.stack + 1,
                end: stack,
                writable: true,
            },
            Segment {
                kind: SegmentKind::KText,
                start: ktext,
                end: ktext + sizes.ktext - 1,
                writable: true,
            },
            Segment {
                kind: SegmentKind::KData,
                start: kdata,
                end: kdata + sizes.kdata - 1,
                writable: true,
            },
            Segment {
                kind: SegmentKind::Mmio,
                start: mmio,
                end: mmio.wrapping_add(sizes.mmio - 1),
                writable: true,
            },
        ];

        Self {
            segments,
            tlb: Vec::new(),
            devices: Vec::new(),
            kernel_mode: false,
            heap_break: heap,
            heap_base: heap,
        }
    }

    pub fn kernel_mode(&self) -> bool {
        self.kernel_mode
    }

    pub fn set_kernel_mode(&mut self, enabled: bool) {
        self.kernel_mode = enabled;
    }

    /// Advances the heap break by `amount` bytes and returns the previous
    /// break (the `sbrk` contract).
    pub fn sbrk(&mut self, amount: u32) -> u32 {
        let prev = self.heap_break;
        self.heap_break = self.heap_break.wrapping_add(amount);
        prev
    }

    pub fn reset_heap(&mut self) {
        self.heap_break = self.heap_base;
    }

    pub fn add_tlb_entry(&mut self, entry: TlbEntry) {
        debug_assert!(entry.page_size.is_power_of_two());
        self.tlb.push(entry);
    }

    pub fn clear_tlb(&mut self) {
        self.tlb.clear();
    }

    /// Registers a device range inside MMIO, keeping ranges sorted by
    /// start for binary search.
    pub fn add_device_range(&mut self, start: u32, size: u32, device: usize) {
        let range = DeviceRange {
            start,
            end: start + size - 1,
            device,
        };
        let pos = self
            .devices
            .partition_point(|r| r.start < range.start);
        self.devices.insert(pos, range);
    }

    fn find_device(&self, phys: u32) -> Option<(usize, u32)> {
        let idx = self.devices.partition_point(|r| r.start <= phys);
        if idx == 0 {
            return None;
        }
        let range = &self.devices[idx - 1];
        if phys <= range.end {
            Some((range.device, phys - range.start))
        } else {
            None
        }
    }

    fn translate(&self, addr: u32, access: AccessType) -> Result<u32, CpuException> {
        for entry in &self.tlb {
            let span = entry.page_size;
            if addr >= entry.virt_page && addr - entry.virt_page < span {
                if !entry.rights.allows(access) {
                    return Err(CpuException::PrivilegeViolation { addr, access });
                }
                return Ok(entry.phys_page + (addr - entry.virt_page));
            }
        }
        // Identity mapping where no TLB entry covers the address.
        Ok(addr)
    }

    /// Resolves one byte address: TLB translation, segment lookup,
    /// kernel gating, write protection, and device identification.
    pub fn resolve(&self, addr: u32, access: AccessType) -> Result<Resolved, CpuException> {
        let phys = self.translate(addr, access)?;

        let segment = self
            .segments
            .iter()
            .find(|s| s.contains(phys))
            .ok_or(CpuException::MemoryAccess {
                addr,
                access,
                pc: 0,
            })?;

        if segment.requires_kernel() && !self.kernel_mode {
            return Err(CpuException::PrivilegeViolation { addr, access });
        }
        if access == AccessType::Write && !segment.writable {
            return Err(CpuException::PrivilegeViolation { addr, access });
        }

        let device = if segment.kind == SegmentKind::Mmio {
            self.find_device(phys)
        } else {
            None
        };

        Ok(Resolved {
            phys,
            segment: segment.kind,
            device,
        })
    }
}
