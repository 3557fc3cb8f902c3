//! `cpu::bsf` bit-scan-forward tests (spec.md §4.B, used for free-slot
//! lookup in bitmap allocators).

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(pc32_kernel::testing::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;
use pc32_kernel::arch::cpu;

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

/// Contract: bsf(0) signals "no bit set" with -1 rather than an undefined
/// CPU result.
/// Given: a zero word.
/// When: `bsf` is called.
/// Then: it returns -1.
/// Failure Impact: a bitmap allocator treating 0 as "bit 0 free" would
/// hand out an already-occupied slot.
#[test_case]
fn test_bsf_of_zero_is_negative_one() {
    assert_eq!(cpu::bsf(0), -1);
}

#[test_case]
fn test_bsf_finds_lowest_set_bit() {
    assert_eq!(cpu::bsf(0b1000_0100), 2);
    assert_eq!(cpu::bsf(1), 0);
    assert_eq!(cpu::bsf(1 << 31), 31);
}

#[test_case]
fn test_bsf_ignores_higher_set_bits() {
    assert_eq!(cpu::bsf(0b1111_0000), 4);
}
