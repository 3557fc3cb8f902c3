//! Kernel entry point.
//!
//! The stage-2 loader (out of this core's scope, spec.md §1) jumps here
//! with interrupts disabled, a flat 1:1-mapped low-memory view, and a
//! stack already set up at `BootParams::stack_base` (spec.md §6). From
//! here the boot sequence brings up every subsystem in the order spec.md
//! §4 describes them, then falls through to the idle halt loop at the
//! end of `_exit`.

#![no_std]
#![no_main]

mod panic;

use pc32_kernel::arch::{cpu, gdt, interrupts};
use pc32_kernel::drivers::screen::Screen;
use pc32_kernel::drivers::{keyboard, pic, pit, ps2, serial};
use pc32_kernel::mm::{boot_params::BootParams, paging, pmm};
use pc32_kernel::{fs, kinfo, process, tty};

#[unsafe(no_mangle)]
pub extern "C" fn _start() -> ! {
    // SAFETY: the stage-2 loader publishes a fully initialized
    // `BootParams` at the fixed hand-off address before transferring
    // control here; this is the one call site that reads it.
    let boot_params = unsafe { BootParams::read() };

    // The debug serial sink comes up first so every later init step's
    // `kinfo!`/`kwarn!` line actually reaches the host (spec.md §7.1
    // "every boot step logs before it acts").
    serial::init();
    kinfo!("pc32_kernel: boot starting");

    pmm::init(boot_params);

    // `stack_base` is the loader's already-live ESP value, i.e. the top
    // of the ring-0 stack the CPU should switch to on a privilege-raising
    // trap (spec.md §6 boot-parameter hand-off; see DESIGN.md Open
    // Question on `stack_base` orientation).
    gdt::init(boot_params.stack_base);
    interrupts::init();
    pic::init();
    paging::init();

    ps2::init();
    pit::init();
    keyboard::init();

    tty::init();
    fs::init();

    cpu::enable_interrupts();
    kinfo!("pc32_kernel: boot complete, pid {} running", process::current_pid());

    let mut screen = Screen::new();
    screen.clear();
    let _ = core::fmt::Write::write_str(&mut screen, "pc32_kernel ready\n");

    // No user-mode `init` program is in scope (spec.md §1 Non-goals); the
    // single static task simply idles from here (spec.md §5).
    process::exit(0)
}
