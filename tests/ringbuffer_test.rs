//! Ring buffer integration tests (spec.md §3/§4.A `RingBuffer`, §8
//! "count <= capacity" invariant).

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(pc32_kernel::testing::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;
use pc32_kernel::sync::ringbuffer::RingBuffer;

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

/// Contract: put/get preserves FIFO order.
/// Given: an empty ring buffer of capacity 4.
/// When: three bytes are pushed with `put` and then popped with `get`.
/// Then: they come back out in the same order they went in.
/// Failure Impact: any consumer reading queued input (keyboard, serial RX)
/// would see scrambled bytes.
#[test_case]
fn test_put_get_preserves_fifo_order() {
    let ring: RingBuffer<4> = RingBuffer::new();
    assert!(ring.put(b'a'));
    assert!(ring.put(b'b'));
    assert!(ring.put(b'c'));
    assert_eq!(ring.get(), Some(b'a'));
    assert_eq!(ring.get(), Some(b'b'));
    assert_eq!(ring.get(), Some(b'c'));
    assert_eq!(ring.get(), None);
}

#[test_case]
fn test_full_buffer_rejects_further_put() {
    let ring: RingBuffer<2> = RingBuffer::new();
    assert!(ring.put(1));
    assert!(ring.put(2));
    assert!(ring.is_full());
    assert!(!ring.put(3), "put must fail once count == capacity");
    assert_eq!(ring.len(), 2);
}

#[test_case]
fn test_empty_buffer_get_returns_none() {
    let ring: RingBuffer<4> = RingBuffer::new();
    assert!(ring.is_empty());
    assert_eq!(ring.get(), None);
}

/// Contract: insert/erase implement the opposite ends of the ring from
/// put/get, so a line discipline can both append and backspace-erase.
#[test_case]
fn test_insert_and_erase_operate_on_opposite_ends() {
    let ring: RingBuffer<4> = RingBuffer::new();
    ring.put(b'x');
    ring.put(b'y');
    assert_eq!(ring.erase(), Some(b'y'));
    assert!(ring.insert(b'w'));
    assert_eq!(ring.get(), Some(b'w'));
    assert_eq!(ring.get(), Some(b'x'));
}

#[test_case]
fn test_clear_resets_count_and_positions() {
    let ring: RingBuffer<4> = RingBuffer::new();
    ring.put(1);
    ring.put(2);
    ring.clear();
    assert!(ring.is_empty());
    assert_eq!(ring.len(), 0);
    assert!(ring.put(9));
    assert_eq!(ring.get(), Some(9));
}

#[test_case]
fn test_wraps_around_capacity_boundary() {
    let ring: RingBuffer<3> = RingBuffer::new();
    for b in 0..3u8 {
        assert!(ring.put(b));
    }
    assert_eq!(ring.get(), Some(0));
    assert!(ring.put(10));
    assert_eq!(ring.get(), Some(1));
    assert_eq!(ring.get(), Some(2));
    assert_eq!(ring.get(), Some(10));
}
