//! Panic handler for the kernel binary.
//!
//! Required for `no_std` environments. Implements spec.md §7's fatal band:
//! disable interrupts, print the register/location dump to the emergency
//! console, then halt.

use core::fmt::Write;
use core::panic::PanicInfo;

use pc32_kernel::arch::cpu;
use pc32_kernel::drivers::screen::{Color, Screen};
use pc32_kernel::logging::klog_panic;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    cpu::disable_interrupts();
    klog_panic("rust panic");

    let mut screen = Screen::new();
    screen.clear();
    screen.set_colors(Color::White, Color::Blue);

    let _ = writeln!(screen, "\n!!! KERNEL PANIC !!!");

    if let Some(location) = info.location() {
        let _ = writeln!(screen, "Location: {}:{}", location.file(), location.line());
    }

    if let Some(message) = info.message().as_str() {
        let _ = writeln!(screen, "Message: {}", message);
    } else {
        let _ = writeln!(screen, "Message: {}", info.message());
    }

    loop {
        // SAFETY:
        // - We are in the fatal panic path and intentionally stop forward progress.
        // - `cli; hlt` is the standard terminal halt sequence.
        unsafe {
            core::arch::asm!("cli", "hlt", options(nomem, nostack, preserves_flags));
        }
    }
}
