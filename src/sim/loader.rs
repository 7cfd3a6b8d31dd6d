//! Program loader.
//!
//! Populates memory from a linked image and seeds the initial register
//! and PC state. Image bytes go straight into the backing store,
//! bypassing translation and caches.

use tracing::info;

use crate::core::MachineState;
use crate::mem::Memory;
use crate::sim::image::BinaryImage;

/// Conventional `$gp` offset into the data segment.
const GP_OFFSET: u32 = 0x8000;

const REG_GP: usize = 28;
const REG_SP: usize = 29;

/// Loads an image: text and data into memory, PC at the text base,
/// `$sp` at the stack base, `$gp` into the data segment.
pub fn load_image(
    image: &BinaryImage,
    state: &mut MachineState,
    mem: &mut Memory,
    stack_base: u32,
) {
    info!(
        text = image.text.len(),
        data = image.data.len(),
        text_base = format_args!("{:#010x}", image.text_base),
        "loading image"
    );

    for (i, word) in image.text.iter().enumerate() {
        mem.poke_word(image.text_base + (i as u32) * 4, *word);
    }
    for (i, byte) in image.data.iter().enumerate() {
        mem.poke(image.data_base + i as u32, *byte);
    }
    if let Some(ktext_base) = image.ktext_base {
        for (i, word) in image.ktext.iter().enumerate() {
            mem.poke_word(ktext_base + (i as u32) * 4, *word);
        }
    }
    if let Some(kdata_base) = image.kdata_base {
        for (i, byte) in image.kdata.iter().enumerate() {
            mem.poke(kdata_base + i as u32, *byte);
        }
    }

    state.pc = image.text_base;
    state.regs.write(REG_SP, stack_base);
    state.regs.write(REG_GP, image.data_base.wrapping_add(GP_OFFSET));
}
