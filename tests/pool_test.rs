//! Fixed-capacity object pool tests (spec.md §3 `Pool<T,N>`).

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(pc32_kernel::testing::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;
use pc32_kernel::sync::pool::Pool;

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

static POOL: Pool<u32, 4> = Pool::create("test_pool");

/// Contract: `alloc` hands out distinct, non-null slots up to capacity.
/// Given: a fresh pool of capacity 4.
/// When: `alloc` is called four times.
/// Then: every returned pointer is distinct and `live_count` reaches 4.
/// Failure Impact: two live allocations aliasing the same slot would
/// silently corrupt whichever struct happens to live there (a `File`, a
/// `Task`, ...).
#[test_case]
fn test_alloc_returns_distinct_slots() {
    let a = POOL.alloc().expect("slot 1");
    let b = POOL.alloc().expect("slot 2");
    let c = POOL.alloc().expect("slot 3");
    let d = POOL.alloc().expect("slot 4");
    assert_ne!(a, b);
    assert_ne!(b, c);
    assert_ne!(c, d);
    assert_eq!(POOL.live_count(), 4);

    POOL.free(a);
    POOL.free(b);
    POOL.free(c);
    POOL.free(d);
}

#[test_case]
fn test_pool_exhaustion_returns_none() {
    let mut taken = [core::ptr::null_mut(); 4];
    for slot in taken.iter_mut() {
        *slot = POOL.alloc().expect("pool should not be exhausted yet");
    }
    assert!(POOL.alloc().is_none(), "5th alloc on a capacity-4 pool must fail");
    for slot in taken.iter() {
        POOL.free(*slot);
    }
}

#[test_case]
fn test_free_allows_slot_reuse() {
    let a = POOL.alloc().expect("slot");
    assert_eq!(POOL.live_count(), 1);
    POOL.free(a);
    assert_eq!(POOL.live_count(), 0);
    let b = POOL.alloc().expect("slot should be reusable after free");
    assert_eq!(POOL.live_count(), 1);
    POOL.free(b);
}

#[test_case]
fn test_capacity_reports_const_generic_size() {
    assert_eq!(POOL.capacity(), 4);
}
