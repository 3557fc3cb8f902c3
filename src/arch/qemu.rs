//! QEMU debug-exit device.
//!
//! Gives integration test binaries a way to report pass/fail to the host
//! process. QEMU must be started with
//! `-device isa-debug-exit,iobase=0xf4,iosize=0x04`.
//!
//! The exit code written to port 0xF4 is transformed by QEMU:
//! `actual_exit_code = (value << 1) | 1`.

use crate::arch::port::PortByte;

const QEMU_EXIT_PORT: u16 = 0xF4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum QemuExitCode {
    /// QEMU exits with code 33 (`(0x10 << 1) | 1`).
    Success = 0x10,
    /// QEMU exits with code 35 (`(0x11 << 1) | 1`).
    Failed = 0x11,
}

/// Exits QEMU with the given code. On real hardware (no debug-exit device)
/// this has no effect and the caller falls through to a halt loop.
pub fn exit_qemu(exit_code: QemuExitCode) -> ! {
    // SAFETY: writing to the debug-exit I/O port is only meaningful under
    // QEMU with the isa-debug-exit device attached; on real hardware the
    // write is harmless (unassigned port).
    unsafe {
        PortByte::new(QEMU_EXIT_PORT).write(exit_code as u8);
    }

    loop {
        // SAFETY: terminal halt; no further forward progress is expected.
        unsafe {
            core::arch::asm!("hlt", options(nomem, nostack, preserves_flags));
        }
    }
}
