//! Fatal diagnostic paths: the CPU-exception and unhandled/spurious-IRQ
//! "blue screen" band described in spec.md §7.
//!
//! Distinct from the Rust-level `#[panic_handler]` (which lives in the
//! binary crate, since `no_std` allows exactly one definition of it): these
//! functions are invoked directly by [`crate::arch::interrupts`] and
//! [`crate::drivers::pic`] when hardware itself reports a condition the
//! kernel cannot recover from.

use core::fmt::Write;

use crate::arch::cpu;
use crate::arch::interrupts::CpuRegisterFrame;
use crate::drivers::screen::{Color, Screen};
use crate::logging::klog_panic;

/// Disables interrupts, paints the blue screen, dumps `frame`, and halts.
/// Never returns.
pub fn fatal_exception(frame: &CpuRegisterFrame) -> ! {
    cpu::disable_interrupts();
    klog_panic("fatal CPU exception");

    let mut screen = Screen::new();
    screen.clear();
    screen.set_colors(Color::White, Color::Blue);

    let _ = writeln!(screen, "\n!!! FATAL EXCEPTION !!!");
    let _ = writeln!(screen, "vector={:#x}  error_code={:#x}", { frame.vector }, { frame.error_code });
    let _ = writeln!(screen, "eip={:#08x}  cs={:#x}  eflags={:#08x}", { frame.eip }, { frame.cs }, { frame.eflags });
    let _ = writeln!(
        screen,
        "eax={:#08x} ebx={:#08x} ecx={:#08x} edx={:#08x}",
        { frame.eax }, { frame.ebx }, { frame.ecx }, { frame.edx }
    );
    let _ = writeln!(
        screen,
        "esi={:#08x} edi={:#08x} ebp={:#08x}",
        { frame.esi }, { frame.edi }, { frame.ebp }
    );
    if frame.is_privilege_change() {
        let _ = writeln!(screen, "esp={:#08x} ss={:#x}", { frame.esp }, { frame.ss });
    }

    halt_forever()
}

/// An IRQ line that was unmasked but no registered handler claimed it, or a
/// masked line that somehow still reached the dispatcher
/// (spec.md §4.C "An unmasked-but-unhandled IRQ is fatal").
pub fn fatal_unhandled_irq(irq: u8, frame: &CpuRegisterFrame) -> ! {
    cpu::disable_interrupts();
    klog_panic("unhandled IRQ");

    let mut screen = Screen::new();
    screen.clear();
    screen.set_colors(Color::White, Color::Blue);
    let _ = writeln!(screen, "\n!!! UNHANDLED IRQ {} !!!", irq);
    let _ = writeln!(screen, "eip={:#08x} cs={:#x}", { frame.eip }, { frame.cs });

    halt_forever()
}

/// A single IRQ line accumulated [`crate::drivers::pic::SPURIOUS_THRESH`]
/// spurious interrupts (spec.md §4.C).
pub fn fatal_spurious_irq(irq: u8, count: u32) -> ! {
    cpu::disable_interrupts();
    klog_panic("spurious IRQ storm");

    let mut screen = Screen::new();
    screen.clear();
    screen.set_colors(Color::White, Color::Blue);
    let _ = writeln!(screen, "\n!!! SPURIOUS IRQ STORM ON LINE {} !!!", irq);
    let _ = writeln!(screen, "accumulated count={}", count);

    halt_forever()
}

fn halt_forever() -> ! {
    loop {
        // SAFETY: fatal path, intentionally stops forward progress.
        unsafe {
            core::arch::asm!("cli", "hlt", options(nomem, nostack, preserves_flags));
        }
    }
}
