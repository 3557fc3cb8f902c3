//! 8259A PIC mask/unmask tests (spec.md §4.C).

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(pc32_kernel::testing::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;
use pc32_kernel::arch::interrupts::CpuRegisterFrame;
use pc32_kernel::drivers::pic;

#[unsafe(no_mangle)]
pub extern "C" fn _start() -> ! {
    pc32_kernel::drivers::serial::init();
    pic::init();
    test_main();
    loop {
        core::hint::spin_loop();
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    pc32_kernel::testing::test_panic_handler(info)
}

/// Contract: `mask`/`unmask` are readable back through `is_masked`.
/// Given: the PIC freshly initialized.
/// When: IRQ 3 is masked then unmasked.
/// Then: `is_masked(3)` reflects each state change.
/// Failure Impact: a driver masking its own IRQ during setup and never
/// seeing it take effect would silently miss every interrupt afterward.
#[test_case]
fn test_mask_then_unmask_round_trips() {
    pic::mask(3);
    assert!(pic::is_masked(3));
    pic::unmask(3);
    assert!(!pic::is_masked(3));
}

#[test_case]
fn test_masking_one_irq_does_not_affect_another() {
    pic::unmask(4);
    pic::unmask(5);
    pic::mask(4);
    assert!(pic::is_masked(4));
    assert!(!pic::is_masked(5));
    pic::unmask(4);
}

#[test_case]
fn test_double_mask_is_idempotent() {
    pic::mask(6);
    pic::mask(6);
    assert!(pic::is_masked(6));
    pic::unmask(6);
}

/// Contract: IRQ 7 arriving while masked is the hardware's spurious-
/// interrupt signature; it must be counted and warned about without
/// escalating to the fatal diagnostic screen on a single occurrence
/// (spec.md §4.C "Spurious detection", §8 testable property).
#[test_case]
fn test_spurious_irq7_is_counted_without_escalating() {
    assert!(pic::is_masked(7), "IRQ7 should still be masked after init");
    let before = pic::spurious_count(7);
    let mut frame = CpuRegisterFrame::default();
    pic::handle_irq(7, &mut frame);
    assert_eq!(pic::spurious_count(7), before + 1);
    // A single spurious hit must not have escalated (threshold is 3) or
    // flipped the line's mask state.
    assert!(pic::is_masked(7));
}

/// Contract: IRQ 15 arriving while masked is likewise spurious, but (unlike
/// IRQ 7) still needs the master told the cascade line resolved — the
/// asymmetry itself is exercised by reading the source, since there is no
/// port-trace harness here; this test locks in the accounting side
/// (spec.md §4.C, §8 "spurious IRQ 15 issues EOI to the master only").
#[test_case]
fn test_spurious_irq15_is_counted_without_escalating() {
    assert!(pic::is_masked(15), "IRQ15 should still be masked after init");
    let before = pic::spurious_count(15);
    let mut frame = CpuRegisterFrame::default();
    pic::handle_irq(15, &mut frame);
    assert_eq!(pic::spurious_count(15), before + 1);
    assert!(pic::is_masked(15));
}
