//! Linked binary image interchange format.
//!
//! The assembler and linker live outside the core; they hand over a
//! `BinaryImage` as JSON. The core reads only the segment bases and
//! contents; relocations and the source map ride along for debugger
//! frontends.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Relocation {
    pub address: u32,
    pub symbol: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceLine {
    pub address: u32,
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BinaryImage {
    pub text_base: u32,
    pub data_base: u32,
    #[serde(default)]
    pub ktext_base: Option<u32>,
    #[serde(default)]
    pub kdata_base: Option<u32>,

    /// Text as instruction words, addressed word-by-word from `text_base`.
    pub text: Vec<u32>,
    /// Data bytes placed at `data_base`.
    #[serde(default)]
    pub data: Vec<u8>,
    /// Kernel text words placed at `ktext_base` when present.
    #[serde(default)]
    pub ktext: Vec<u32>,
    /// Kernel data bytes placed at `kdata_base` when present.
    #[serde(default)]
    pub kdata: Vec<u8>,

    #[serde(default)]
    pub symbols: HashMap<String, u32>,
    #[serde(default)]
    pub relocations: Vec<Relocation>,
    #[serde(default)]
    pub source_map: Vec<SourceLine>,
}

impl BinaryImage {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content =
            fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        Self::from_json(&content).map_err(|e| format!("cannot parse {}: {}", path.display(), e))
    }

    pub fn symbol(&self, name: &str) -> Option<u32> {
        self.symbols.get(name).copied()
    }
}
