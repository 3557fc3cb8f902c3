//! Canonical line-discipline tests (spec.md §4.H).

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(pc32_kernel::testing::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;
use pc32_kernel::tty::line_discipline::LineDiscipline;
use pc32_kernel::tty::termios::Termios;

#[unsafe(no_mangle)]
pub extern "C" fn _start() -> ! {
    pc32_kernel::drivers::serial::init();
    test_main();
    loop {
        core::hint::spin_loop();
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    pc32_kernel::testing::test_panic_handler(info)
}

fn no_echo(_: u8) {}

/// Contract: `read` in canonical mode blocks (spins) until a full line
/// (newline-terminated) has been received, then returns exactly that line.
/// Given: a fresh discipline with default (cooked) termios.
/// When: "hi\n" arrives one byte at a time via `recv`.
/// Then: `read` returns the 3 bytes "hi\n" and no more.
/// Failure Impact: a shell reading a line before Enter was pressed would
/// see a truncated command.
#[test_case]
fn test_canonical_read_returns_full_line() {
    let ld = LineDiscipline::new();
    let termios = Termios::defaults();
    for &b in b"hi\n" {
        ld.recv(b, &termios, no_echo);
    }
    let mut buf = [0u8; 16];
    let n = ld.read(&termios, &mut buf);
    assert_eq!(&buf[..n], b"hi\n");
}

#[test_case]
fn test_verase_removes_last_unread_byte() {
    let ld = LineDiscipline::new();
    let termios = Termios::defaults();
    for &b in b"hix" {
        ld.recv(b, &termios, no_echo);
    }
    // VERASE defaults to 0x7F (DEL).
    ld.recv(0x7F, &termios, no_echo);
    ld.recv(b'\n', &termios, no_echo);

    let mut buf = [0u8; 16];
    let n = ld.read(&termios, &mut buf);
    assert_eq!(&buf[..n], b"hi\n");
}

#[test_case]
fn test_carriage_return_translated_to_newline_when_icrnl_set() {
    let ld = LineDiscipline::new();
    let termios = Termios::defaults();
    for &b in b"go" {
        ld.recv(b, &termios, no_echo);
    }
    ld.recv(b'\r', &termios, no_echo);

    let mut buf = [0u8; 16];
    let n = ld.read(&termios, &mut buf);
    assert_eq!(&buf[..n], b"go\n");
}

#[test_case]
fn test_raw_mode_read_does_not_wait_for_newline() {
    let ld = LineDiscipline::new();
    let mut termios = Termios::defaults();
    termios.c_lflag &= !pc32_kernel::tty::termios::ICANON;

    ld.recv(b'x', &termios, no_echo);
    ld.recv(b'y', &termios, no_echo);

    let mut buf = [0u8; 16];
    let n = ld.read(&termios, &mut buf);
    assert_eq!(&buf[..n], b"xy");
}

/// Contract: VEOF ends the current canonical read without the EOF byte
/// itself being delivered as data, and frees up `lines_ready` so the next
/// line can complete independently (spec.md §4.H "VEOF terminates the
/// current read").
#[test_case]
fn test_veof_terminates_read_without_delivering_byte() {
    let ld = LineDiscipline::new();
    let termios = Termios::defaults();
    for &b in b"hi" {
        ld.recv(b, &termios, no_echo);
    }
    // VEOF defaults to 0x04 (^D).
    ld.recv(0x04, &termios, no_echo);

    let mut buf = [0u8; 16];
    let n = ld.read(&termios, &mut buf);
    assert_eq!(&buf[..n], b"hi");

    for &b in b"ok\n" {
        ld.recv(b, &termios, no_echo);
    }
    let n = ld.read(&termios, &mut buf);
    assert_eq!(&buf[..n], b"ok\n");
}

/// Contract: `IGNCR` drops every `\r` byte before it ever reaches the
/// input ring (spec.md §4.H lower path c_iflag filtering).
#[test_case]
fn test_igncr_drops_carriage_return() {
    let ld = LineDiscipline::new();
    let mut termios = Termios::defaults();
    termios.c_iflag |= pc32_kernel::tty::termios::IGNCR;

    for &b in b"hi\r\n" {
        ld.recv(b, &termios, no_echo);
    }

    let mut buf = [0u8; 16];
    let n = ld.read(&termios, &mut buf);
    assert_eq!(&buf[..n], b"hi\n");
}

/// Contract: `INLCR` maps a bare `\n` to `\r` on the way into the input
/// ring (spec.md §4.H lower path c_iflag filtering). Checked in
/// non-canonical mode since a translated `\n` no longer signals a
/// canonical line terminator.
#[test_case]
fn test_inlcr_maps_newline_to_carriage_return() {
    let ld = LineDiscipline::new();
    let mut termios = Termios::defaults();
    termios.c_iflag |= pc32_kernel::tty::termios::INLCR;
    termios.c_lflag &= !pc32_kernel::tty::termios::ICANON;

    ld.recv(b'a', &termios, no_echo);
    ld.recv(b'\n', &termios, no_echo);

    let mut buf = [0u8; 16];
    let n = ld.read(&termios, &mut buf);
    assert_eq!(&buf[..n], b"a\r");
}

#[test_case]
fn test_input_len_tracks_queued_bytes() {
    let ld = LineDiscipline::new();
    let termios = Termios::defaults();
    assert_eq!(ld.input_len(), 0);
    ld.recv(b'a', &termios, no_echo);
    ld.recv(b'b', &termios, no_echo);
    assert_eq!(ld.input_len(), 2);
}
