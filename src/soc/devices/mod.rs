pub mod audio;
pub mod bitmap;
pub mod display;
pub mod keyboard;
pub mod rtc;
pub mod sevenseg;

pub use audio::{Audio, Note, AUDIO_BASE};
pub use bitmap::{BitmapDisplay, BITMAP_BASE, BITMAP_SIZE};
pub use display::{Display, DISPLAY_BASE};
pub use keyboard::{Keyboard, KEYBOARD_BASE};
pub use rtc::{Rtc, RTC_BASE};
pub use sevenseg::{SevenSegment, SEVENSEG_BASE};
