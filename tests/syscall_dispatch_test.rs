//! `syscall::table::call` dispatch tests (spec.md §4.D, §4.J, §8
//! scenarios 5-6).

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(pc32_kernel::testing::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;
use pc32_kernel::syscall::errno::{EBADF, EBADRQC, EINVAL, ENOENT};
use pc32_kernel::syscall::table::{self, NR_SYSCALLS};
use pc32_kernel::tty::termios::{Termios, TCGETS};

#[unsafe(no_mangle)]
pub extern "C" fn _start() -> ! {
    pc32_kernel::drivers::serial::init();
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

static RTC_PATH: &[u8] = b"/dev/rtc\0";
static TTY1_PATH: &[u8] = b"/dev/tty1\0";
static MISSING_PATH: &[u8] = b"/dev/nonexistent\0";

/// Contract: `open` rejects a flags word naming more than one of
/// O_RDONLY/O_WRONLY/O_RDWR before ever touching the dentry table
/// (spec.md §4.I "open", §8 testable property).
#[test_case]
fn test_open_ambiguous_access_mode_is_einval() {
    const O_WRONLY: u32 = 0x0001;
    const O_RDWR: u32 = 0x0002;
    let path_ptr = TTY1_PATH.as_ptr() as u32;
    let ret = table::call(3, path_ptr, O_WRONLY | O_RDWR, 0);
    assert_eq!(ret, -EINVAL);
}

/// Contract: `open` on a path absent from the hardcoded dentry table
/// returns -ENOENT (spec.md §8 end-to-end scenario 6's sibling property).
#[test_case]
fn test_open_missing_path_is_enoent() {
    let path_ptr = MISSING_PATH.as_ptr() as u32;
    let ret = table::call(3, path_ptr, 0, 0);
    assert_eq!(ret, -ENOENT);
}

/// Contract: a syscall number at or beyond `NR_SYSCALLS` returns -ENOSYS.
/// Given: the dispatch table.
/// When: `call` is invoked with `eax == NR_SYSCALLS`.
/// Then: the return value is `-ENOSYS`.
/// Failure Impact: an unrecognized syscall falling through to some other
/// handler's arm would execute the wrong operation outright.
#[test_case]
fn test_unknown_syscall_number_returns_enosys() {
    let ret = table::call(NR_SYSCALLS, 0, 0, 0);
    assert_eq!(ret, -pc32_kernel::syscall::errno::ENOSYS);
}

#[test_case]
fn test_read_on_unopened_fd_returns_ebadf() {
    let ret = table::call(1, 99, 0, 0);
    assert_eq!(ret, -EBADF);
}

#[test_case]
fn test_open_read_close_round_trip_on_rtc() {
    let path_ptr = RTC_PATH.as_ptr() as u32;
    let fd = table::call(3, path_ptr, 0, 0);
    assert!(fd >= 0, "open(/dev/rtc) should succeed, got {}", fd);

    let mut buf = [0u8; 6];
    let read_ret = table::call(1, fd as u32, buf.as_mut_ptr() as u32, buf.len());
    assert_eq!(read_ret, 6, "RTC read should return exactly 6 bytes");

    let close_ret = table::call(4, fd as u32, 0, 0);
    assert_eq!(close_ret, 0);

    // The fd is no longer valid.
    let ret = table::call(1, fd as u32, buf.as_mut_ptr() as u32, 1);
    assert_eq!(ret, -EBADF);
}

/// Contract: `ioctl` rejects a direction-carrying op whose size field is
/// zero before ever touching the fd.
/// Given: an op word with direction bits set and size bits zero.
/// Then: the call returns `-EBADRQC` regardless of fd validity.
#[test_case]
fn test_ioctl_direction_with_zero_size_is_ebadrqc() {
    let op: u32 = 1 << 30;
    let ret = table::call(5, 0, op, 0);
    assert_eq!(ret, -EBADRQC);
}

#[test_case]
fn test_ioctl_direction_with_null_arg_is_einval() {
    let op: u32 = (1 << 30) | (1 << 16);
    let ret = table::call(5, 0, op, 0);
    assert_eq!(ret, -EINVAL);
}

#[test_case]
fn test_ioctl_tcgets_fills_termios_on_tty() {
    let path_ptr = TTY1_PATH.as_ptr() as u32;
    let fd = table::call(3, path_ptr, 0, 0);
    assert!(fd >= 0);

    let mut termios = Termios::defaults();
    let ret = table::call(5, fd as u32, TCGETS as u32, &mut termios as *mut Termios as u32);
    assert_eq!(ret, 0);

    table::call(4, fd as u32, 0, 0);
}
