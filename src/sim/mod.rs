//! Simulation harness.
//!
//! The linked-image interchange format, the program loader, and the
//! syscall table.

/// `BinaryImage` and its JSON form.
pub mod image;

/// Program loader.
pub mod loader;

/// Syscall dispatch.
pub mod syscall;

pub use image::BinaryImage;
pub use loader::load_image;
pub use syscall::{install_syscall_routine, SyscallTable};
