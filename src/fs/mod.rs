//! File-descriptor/inode/character-device indirection (spec.md §4.I).

pub mod chardev;
pub mod file;
pub mod inode;

use crate::drivers::rtc::RTC_DEVICE;
use crate::sync::pool::Pool;
use crate::syscall::errno::ENOMEM;
use file::File;

/// System-wide open-file ceiling (spec.md "Allocated from a fixed pool
/// sized to max-system-open").
pub const MAX_OPEN_FILES: usize = 32;

static FILES: Pool<File, MAX_OPEN_FILES> = Pool::create("files");

/// Draws a zeroed [`File`] slot from the system pool (spec.md §4.I
/// "File-descriptor allocator").
pub fn alloc_file() -> Result<*mut File, i32> {
    let ptr = FILES.alloc().ok_or(ENOMEM)?;
    // SAFETY: `ptr` was just allocated and zeroed by the pool; establish
    // the non-zero invariants `File::empty()` promises (an all-zero
    // `inode_index` would alias inode 0).
    unsafe {
        (*ptr).inode_index = usize::MAX;
    }
    Ok(ptr)
}

pub fn free_file(ptr: *mut File) {
    FILES.free(ptr);
}

/// Registers the hardcoded character devices and brings up the console
/// hardware. Must run after [`crate::tty::init`].
pub fn init() {
    chardev::register_chdev(inode::MAJOR_CONSOLE, "console", &crate::tty::CONSOLE_FAMILY)
        .expect("fs: console chardev registration failed");
    chardev::register_chdev(inode::MAJOR_SERIAL, "serial", &crate::tty::SERIAL_FAMILY)
        .expect("fs: serial chardev registration failed");
    chardev::register_chdev(inode::MAJOR_RTC, "rtc", &RTC_DEVICE)
        .expect("fs: rtc chardev registration failed");
}
