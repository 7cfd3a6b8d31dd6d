use serde::Deserialize;

const DEFAULT_TEXT_BASE: u32 = 0x0040_0000;
const DEFAULT_DATA_BASE: u32 = 0x1000_0000;
const DEFAULT_HEAP_BASE: u32 = 0x1004_0000;
const DEFAULT_STACK_BASE: u32 = 0x7FFF_FFFC;
const DEFAULT_KTEXT_BASE: u32 = 0x8000_0000;
const DEFAULT_KDATA_BASE: u32 = 0x9000_0000;
const DEFAULT_MMIO_BASE: u32 = 0xFFFF_0000;

const DEFAULT_TEXT_SIZE: u32 = 4 * 1024 * 1024;
const DEFAULT_STACK_SIZE: u32 = 4 * 1024 * 1024;
const DEFAULT_KTEXT_SIZE: u32 = 4 * 1024 * 1024;
const DEFAULT_KDATA_SIZE: u32 = 4 * 1024 * 1024;
const DEFAULT_MMIO_SIZE: u32 = 64 * 1024;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub memory: MemoryLayoutConfig,
    #[serde(default)]
    pub cache: CacheHierarchyConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub trace_instructions: bool,

    #[serde(default = "default_max_cycles")]
    pub max_cycles: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            trace_instructions: false,
            max_cycles: default_max_cycles(),
        }
    }
}

fn default_max_cycles() -> u64 {
    100_000_000
}

#[derive(Debug, Deserialize)]
pub struct MemoryLayoutConfig {
    #[serde(default = "default_text_base")]
    pub text_base: String,

    #[serde(default = "default_data_base")]
    pub data_base: String,

    #[serde(default = "default_heap_base")]
    pub heap_base: String,

    #[serde(default = "default_stack_base")]
    pub stack_base: String,

    #[serde(default = "default_ktext_base")]
    pub ktext_base: String,

    #[serde(default = "default_kdata_base")]
    pub kdata_base: String,

    #[serde(default = "default_mmio_base")]
    pub mmio_base: String,
}

impl MemoryLayoutConfig {
    pub fn text_base_val(&self) -> u32 {
        parse_hex(&self.text_base, DEFAULT_TEXT_BASE)
    }

    pub fn data_base_val(&self) -> u32 {
        parse_hex(&self.data_base, DEFAULT_DATA_BASE)
    }

    pub fn heap_base_val(&self) -> u32 {
        parse_hex(&self.heap_base, DEFAULT_HEAP_BASE)
    }

    pub fn stack_base_val(&self) -> u32 {
        parse_hex(&self.stack_base, DEFAULT_STACK_BASE)
    }

    pub fn ktext_base_val(&self) -> u32 {
        parse_hex(&self.ktext_base, DEFAULT_KTEXT_BASE)
    }

    pub fn kdata_base_val(&self) -> u32 {
        parse_hex(&self.kdata_base, DEFAULT_KDATA_BASE)
    }

    pub fn mmio_base_val(&self) -> u32 {
        parse_hex(&self.mmio_base, DEFAULT_MMIO_BASE)
    }
}

impl Default for MemoryLayoutConfig {
    fn default() -> Self {
        Self {
            text_base: default_text_base(),
            data_base: default_data_base(),
            heap_base: default_heap_base(),
            stack_base: default_stack_base(),
            ktext_base: default_ktext_base(),
            kdata_base: default_kdata_base(),
            mmio_base: default_mmio_base(),
        }
    }
}

fn parse_hex(s: &str, default: u32) -> u32 {
    let s = s.trim_start_matches("0x");
    u32::from_str_radix(s, 16).unwrap_or(default)
}

fn default_text_base() -> String {
    format!("{:#x}", DEFAULT_TEXT_BASE)
}

fn default_data_base() -> String {
    format!("{:#x}", DEFAULT_DATA_BASE)
}

fn default_heap_base() -> String {
    format!("{:#x}", DEFAULT_HEAP_BASE)
}

fn default_stack_base() -> String {
    format!("{:#x}", DEFAULT_STACK_BASE)
}

fn default_ktext_base() -> String {
    format!("{:#x}", DEFAULT_KTEXT_BASE)
}

fn default_kdata_base() -> String {
    format!("{:#x}", DEFAULT_KDATA_BASE)
}

fn default_mmio_base() -> String {
    format!("{:#x}", DEFAULT_MMIO_BASE)
}

/// Segment sizes are fixed by the default layout rather than configured;
/// the bases above are the tunable part.
pub fn default_segment_sizes() -> SegmentSizes {
    SegmentSizes {
        text: DEFAULT_TEXT_SIZE,
        stack: DEFAULT_STACK_SIZE,
        ktext: DEFAULT_KTEXT_SIZE,
        kdata: DEFAULT_KDATA_SIZE,
        mmio: DEFAULT_MMIO_SIZE,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SegmentSizes {
    pub text: u32,
    pub stack: u32,
    pub ktext: u32,
    pub kdata: u32,
    pub mmio: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CacheHierarchyConfig {
    #[serde(default)]
    pub instruction: CacheConfig,
    #[serde(default)]
    pub data: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "d_c_size")]
    pub size_bytes: usize,

    #[serde(default = "d_c_line")]
    pub line_bytes: usize,

    #[serde(default = "d_c_ways")]
    pub ways: usize,

    #[serde(default = "d_c_policy")]
    pub write_policy: WritePolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            size_bytes: d_c_size(),
            line_bytes: d_c_line(),
            ways: d_c_ways(),
            write_policy: d_c_policy(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WritePolicy {
    WriteBack,
    WriteThrough,
}

fn d_c_size() -> usize {
    4096
}

fn d_c_line() -> usize {
    16
}

fn d_c_ways() -> usize {
    2
}

fn d_c_policy() -> WritePolicy {
    WritePolicy::WriteBack
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "d_true")]
    pub forwarding_enabled: bool,

    #[serde(default = "d_true")]
    pub hazard_detection_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            forwarding_enabled: true,
            hazard_detection_enabled: true,
        }
    }
}

fn d_true() -> bool {
    true
}
