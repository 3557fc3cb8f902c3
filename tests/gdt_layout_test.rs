//! GDT/TSS layout tests (spec.md §4.D, §6 "IDT gate layout" neighbor —
//! the descriptor table the interrupt gates' cs selectors index into).

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(pc32_kernel::testing::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;
use pc32_kernel::arch::gdt;

const TEST_STACK_TOP: u32 = 0x0009_0000;

#[unsafe(no_mangle)]
pub extern "C" fn _start() -> ! {
    pc32_kernel::drivers::serial::init();
    gdt::init(TEST_STACK_TOP);
    test_main();
    loop {
        core::hint::spin_loop();
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    pc32_kernel::testing::test_panic_handler(info)
}

/// Contract: the four flat-model selectors and the TSS selector sit at
/// the fixed GDT indices spec.md's IDT gate layout assumes (cs=0x08 for
/// ring-0 gates, cs=0x1B for the ring-3 syscall trap gate's target).
#[test_case]
fn test_selector_constants() {
    assert_eq!(gdt::KERNEL_CODE_SELECTOR, 0x08);
    assert_eq!(gdt::KERNEL_DATA_SELECTOR, 0x10);
    assert_eq!(gdt::USER_CODE_SELECTOR, 0x1B);
    assert_eq!(gdt::USER_DATA_SELECTOR, 0x23);
    assert_eq!(gdt::TSS_SELECTOR, 0x28);
}

/// Contract: `init` marks the GDT initialized and the TSS descriptor it
/// installs is present and typed as a 32-bit available TSS.
#[test_case]
fn test_tss_descriptor_present() {
    assert!(gdt::is_initialized());

    let descriptors = gdt::descriptor_snapshot();
    let tss_low = descriptors[5];

    let tss_type = (tss_low >> 40) & 0x0F;
    let present = (tss_low >> 47) & 0x01;
    assert_eq!(tss_type, 0x9, "32-bit TSS (available) type field");
    assert_eq!(present, 1, "TSS descriptor must be marked present");

    let base_low = ((tss_low >> 16) & 0xFFFF) as u32;
    let base_mid = ((tss_low >> 32) & 0xFF) as u32;
    let base_high = ((tss_low >> 56) & 0xFF) as u32;
    let base = base_low | (base_mid << 16) | (base_high << 24);
    assert_ne!(base, 0, "TSS base address must be non-zero");
}

/// Contract: `init(stack_top)` publishes `stack_top` into TSS `esp0`, the
/// ring-0 stack the CPU loads on a ring3->ring0 privilege change
/// (spec.md §4.D privilege-change handling).
#[test_case]
fn test_esp0_matches_init_argument() {
    assert_eq!(gdt::kernel_stack_top(), TEST_STACK_TOP);
}

/// Contract: `set_kernel_stack` round-trips through `kernel_stack_top`.
#[test_case]
fn test_set_kernel_stack_roundtrip() {
    let original = gdt::kernel_stack_top();
    gdt::set_kernel_stack(0x0008_F000);
    assert_eq!(gdt::kernel_stack_top(), 0x0008_F000);
    gdt::set_kernel_stack(original);
}
