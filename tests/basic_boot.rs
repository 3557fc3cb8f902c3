//! Basic boot integration test: brings up the same early-init sequence
//! `main.rs` runs (serial, GDT, IDT, PIC) and checks the kernel reaches
//! a running state without faulting, plus a direct VGA frame-buffer
//! observation (spec.md §8 end-to-end scenario 3's groundwork).

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(pc32_kernel::testing::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;
use pc32_kernel::arch::port::PortByte;
use pc32_kernel::arch::{gdt, interrupts};
use pc32_kernel::drivers::pic;
use pc32_kernel::drivers::screen::{Color, Screen};
use pc32_kernel::syscall::table;
use pc32_kernel::tty::termios::{Termios, OCRNL, OPOST, TCGETS, TCSETS};

const TEST_STACK_TOP: u32 = 0x0009_0000;
const VGA_BUFFER: usize = 0xB8000;

/// Reads the hardware CRT cursor position as (row, col), same registers
/// [`Screen::update_cursor`] writes (spec.md §6 "VGA text buffer").
fn read_cursor() -> (usize, usize) {
    // SAFETY: CRT controller index/data port pair, always present on
    // VGA-compatible hardware.
    let pos = unsafe {
        let ctrl = PortByte::new(0x3D4);
        let data = PortByte::new(0x3D5);
        ctrl.write(0x0E);
        let hi = data.read() as u16;
        ctrl.write(0x0F);
        let lo = data.read() as u16;
        (hi << 8) | lo
    };
    ((pos / 80) as usize, (pos % 80) as usize)
}

#[unsafe(no_mangle)]
pub extern "C" fn _start() -> ! {
    pc32_kernel::drivers::serial::init();
    gdt::init(TEST_STACK_TOP);
    interrupts::init();
    pic::init();
    pc32_kernel::tty::init();
    pc32_kernel::fs::init();

    test_main();

    loop {
        core::hint::spin_loop();
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    pc32_kernel::testing::test_panic_handler(info)
}

/// Contract: the VGA text buffer lives at the fixed physical address
/// spec.md §6 names, and `put_glyph` writes a `(glyph, attr)` cell there.
#[test_case]
fn test_vga_buffer_address() {
    let mut screen = Screen::new();
    screen.set_colors(Color::White, Color::Black);
    screen.put_glyph(0, 0, b'a', 0x0F);

    // SAFETY: identity-mapped low memory under the test boot environment;
    // read-only observation of a cell `put_glyph` just wrote.
    let cell = unsafe { core::ptr::read_volatile((VGA_BUFFER) as *const u16) };
    assert_eq!(cell & 0xFF, b'a' as u16);
}

#[test_case]
fn test_pic_initialized_masks_all_but_cascade() {
    for irq in 0..16u8 {
        if irq == 2 {
            assert!(!pic::is_masked(irq), "cascade line must stay unmasked");
        } else {
            assert!(pic::is_masked(irq), "line {irq} should start masked");
        }
    }
}

#[test_case]
fn test_kernel_boots() {
    assert!(gdt::is_initialized());
}

#[test_case]
fn test_trivial_assertion() {
    assert_eq!(1 + 1, 2);
}

/// Contract: a `write` with the default `OPOST|ONLCR` termios reaches the
/// VGA cell grid as the glyphs it wrote, with the trailing `\n` advancing
/// the cursor rather than leaving a glyph behind (spec.md §8 end-to-end
/// scenario 4).
#[test_case]
fn test_write_onlcr_reaches_vga() {
    static TTY1_PATH: &[u8] = b"/dev/tty1\0";
    let fd = table::call(3, TTY1_PATH.as_ptr() as u32, 0, 0);
    assert!(fd >= 0, "open(/dev/tty1) should succeed, got {}", fd);

    let msg = b"hi\n";
    let n = table::call(2, fd as u32, msg.as_ptr() as u32, msg.len());
    assert_eq!(n, 3);

    // SAFETY: identity-mapped low memory; read-only scan over the cells
    // `write` painted via the console's output processor, looking for the
    // adjacent 'h','i' glyph pair it must have produced somewhere on
    // screen (exact cursor position depends on prior tests in this file).
    let found = (0..80 * 25 - 1).any(|i| unsafe {
        let a = core::ptr::read_volatile((VGA_BUFFER + i * 2) as *const u16) & 0xFF;
        let b = core::ptr::read_volatile((VGA_BUFFER + (i + 1) * 2) as *const u16) & 0xFF;
        a == b'h' as u16 && b == b'i' as u16
    });
    assert!(found, "expected adjacent 'h','i' glyphs somewhere in the VGA buffer");

    table::call(4, fd as u32, 0, 0);
}

/// Contract: `OCRNL` maps a bare `\r` to `\n` on output, advancing the
/// cursor to the next row, rather than the bare column-reset a raw `\r`
/// would otherwise perform (spec.md §4.H "OCRNL maps CR→LF").
#[test_case]
fn test_ocrnl_translates_carriage_return_to_newline() {
    static TTY1_PATH: &[u8] = b"/dev/tty1\0";
    let fd = table::call(3, TTY1_PATH.as_ptr() as u32, 0, 0);
    assert!(fd >= 0, "open(/dev/tty1) should succeed, got {}", fd);

    let mut termios = Termios::defaults();
    let ret = table::call(5, fd as u32, TCGETS, &mut termios as *mut Termios as u32);
    assert_eq!(ret, 0);
    // OPOST|OCRNL only, ONLCR off, to isolate OCRNL's behavior.
    termios.c_oflag = OPOST | OCRNL;
    let ret = table::call(5, fd as u32, TCSETS, &termios as *const Termios as u32);
    assert_eq!(ret, 0);

    let (row_before, _) = read_cursor();
    let msg = b"\r";
    let n = table::call(2, fd as u32, msg.as_ptr() as u32, msg.len());
    assert_eq!(n, 1);
    let (row_after, col_after) = read_cursor();
    assert_eq!(row_after, row_before + 1, "OCRNL should turn \\r into a newline");
    assert_eq!(col_after, 0);

    let defaults = Termios::defaults();
    table::call(5, fd as u32, TCSETS, &defaults as *const Termios as u32);
    table::call(4, fd as u32, 0, 0);
}
