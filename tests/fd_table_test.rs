//! Per-task file-descriptor table tests (spec.md §3 `FileDescriptorTable`,
//! §4.I `dup`/`dup2`).

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(pc32_kernel::testing::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;
use pc32_kernel::process::{self, MAX_OPEN};
use pc32_kernel::syscall::errno::ENFILE;
use pc32_kernel::syscall::table;

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

/// Contract: `next_free_fd` always returns the lowest-numbered empty slot.
/// Given: a task whose fd table has slots 0 and 1 occupied.
/// When: `next_free_fd` is called.
/// Then: it returns 2, not any higher empty slot.
/// Failure Impact: POSIX programs that assume `dup`-after-`close` reuses
/// the lowest fd (e.g. redirecting stdio) would observe fd churn.
#[test_case]
fn test_next_free_fd_picks_lowest_slot() {
    let mut task = process::current_task();
    task.fd_table[0] = Some(1 as *mut pc32_kernel::fs::file::File);
    task.fd_table[1] = Some(2 as *mut pc32_kernel::fs::file::File);
    assert_eq!(task.next_free_fd(), Some(2));
    task.fd_table[0] = None;
    task.fd_table[1] = None;
}

#[test_case]
fn test_fd_table_exhaustion_returns_enfile() {
    let path_ptr = RTC_PATH.as_ptr() as u32;
    let mut opened = [-1i32; MAX_OPEN];
    for slot in opened.iter_mut() {
        let fd = table::call(3, path_ptr, 0, 0);
        assert!(fd >= 0, "expected a valid fd, got {}", fd);
        *slot = fd;
    }

    let overflow = table::call(3, path_ptr, 0, 0);
    assert_eq!(overflow, -ENFILE);

    for fd in opened.iter() {
        assert_eq!(table::call(4, *fd as u32, 0, 0), 0);
    }
}

/// Contract: `dup` hands back an independent clone of the file struct, not
/// a shared alias — mutating one fd's flags must not affect the other.
#[test_case]
fn test_dup_produces_independent_file_clone() {
    let path_ptr = RTC_PATH.as_ptr() as u32;
    let fd = table::call(3, path_ptr, 0, 0);
    assert!(fd >= 0);

    let dup_fd = table::call(6, fd as u32, 0, 0);
    assert!(dup_fd >= 0);
    assert_ne!(fd, dup_fd);

    const F_SETFL: u32 = 4;
    const F_GETFL: u32 = 3;
    const O_NONBLOCK: u32 = 0x800;
    table::call(8, dup_fd as u32, F_SETFL, O_NONBLOCK);

    let original_flags = table::call(8, fd as u32, F_GETFL, 0);
    assert_eq!(original_flags, 0, "dup'd fd's flag change must not leak back");

    table::call(4, fd as u32, 0, 0);
    table::call(4, dup_fd as u32, 0, 0);
}

#[test_case]
fn test_dup2_closes_target_and_reuses_its_slot() {
    let path_ptr = RTC_PATH.as_ptr() as u32;
    let a = table::call(3, path_ptr, 0, 0);
    let b = table::call(3, path_ptr, 0, 0);
    assert!(a >= 0 && b >= 0);

    let ret = table::call(7, a as u32, b as u32, 0);
    assert_eq!(ret, b);

    // `b` now aliases `a`'s file, independently; closing it must not
    // affect `a`.
    assert_eq!(table::call(4, b as u32, 0, 0), 0);
    assert_eq!(table::call(4, a as u32, 0, 0), 0);
}
