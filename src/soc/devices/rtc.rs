//! Real-time clock with a countdown timer.
//!
//! Reads at offsets 0..8 deliver the host's milliseconds since the Unix
//! epoch, low word first. Writing the countdown word (offsets 0..4,
//! armed when the final byte lands) starts a tick countdown; when it
//! reaches zero the device raises a timer interrupt.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::soc::Device;

pub const RTC_BASE: u32 = 0xFFFF_0010;

#[derive(Default)]
pub struct Rtc {
    latch: [u8; 4],
    countdown: Option<u32>,
}

impl Rtc {
    pub fn new() -> Self {
        Self::default()
    }

    fn now_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

impl Device for Rtc {
    fn name(&self) -> &'static str {
        "rtc"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn size(&self) -> u32 {
        8
    }

    fn read_byte(&mut self, offset: u32) -> Option<u8> {
        if offset < 8 {
            Some((Self::now_millis() >> (offset * 8)) as u8)
        } else {
            Some(0)
        }
    }

    fn write_byte(&mut self, offset: u32, val: u8) {
        if offset < 4 {
            self.latch[offset as usize] = val;
            if offset == 3 {
                self.countdown = Some(u32::from_le_bytes(self.latch));
            }
        }
    }

    fn tick(&mut self) -> bool {
        match self.countdown {
            Some(0) => {
                self.countdown = None;
                true
            }
            Some(n) => {
                self.countdown = Some(n - 1);
                false
            }
            None => false,
        }
    }
}
