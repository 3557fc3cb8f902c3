//! Custom test framework for running tests in a bare-metal environment.
//!
//! Tests run inside QEMU; results are reported over the serial debug port
//! and the process exits via the isa-debug-exit device so the host test
//! runner sees a pass/fail status.
//!
//! ```ignore
//! #[test_case]
//! fn test_simple_assertion() {
//!     assert_eq!(1 + 1, 2);
//! }
//! ```

use crate::arch::qemu::{exit_qemu, QemuExitCode};
use crate::drivers::serial;

/// Anything that can be run and reported as a test.
pub trait Testable {
    fn run(&self);
}

impl<T: Fn()> Testable for T {
    fn run(&self) {
        serial::debug_print(format_args!("  {}...", core::any::type_name::<T>()));
        self();
        serial::debug_print(format_args!(" [ok]\n"));
    }
}

/// Runs every collected `#[test_case]` and exits QEMU with the outcome.
pub fn test_runner(tests: &[&dyn Testable]) {
    serial::debug_print(format_args!("running {} tests\n", tests.len()));
    for test in tests {
        test.run();
    }
    serial::debug_print(format_args!("test result: ok. {} passed\n", tests.len()));
    exit_qemu(QemuExitCode::Success);
}

/// Panic handler entry point for test binaries: reports the failure and
/// exits QEMU with the failure code.
pub fn test_panic_handler(info: &core::panic::PanicInfo) -> ! {
    serial::debug_print(format_args!(" [FAILED]\n{}\n", info));
    exit_qemu(QemuExitCode::Failed)
}
