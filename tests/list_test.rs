//! Intrusive doubly-linked list tests (spec.md §3 `ListHead`).
//!
//! Uses `LinkArray`, the `sync::list` storage backend documented as "for
//! callers that don't need a full Pool (e.g. tests)".

#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(pc32_kernel::testing::test_runner)]
#![reexport_test_harness_main = "test_main"]

use core::panic::PanicInfo;
use pc32_kernel::sync::list::{LinkArray, LinkStorage, ListHead, NIL};

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

#[test_case]
fn test_new_list_is_empty() {
    let head = ListHead::new(0);
    assert!(head.is_empty());
}

/// Contract: `add_tail` appends in insertion order; `iter` walks the list
/// front to back.
/// Given: an empty list backed by a 4-slot `LinkArray`.
/// When: nodes 1, 2, 3 are pushed with `add_tail`.
/// Then: iterating the list yields 1, 2, 3 in that order.
/// Failure Impact: a task run-queue or free-file list built on this
/// primitive would process entries out of FIFO order.
#[test_case]
fn test_add_tail_preserves_insertion_order() {
    let mut links: LinkArray<4> = LinkArray::new();
    let mut head = ListHead::new(usize::MAX);
    head.add_tail(1, &mut links);
    head.add_tail(2, &mut links);
    head.add_tail(3, &mut links);

    let collected: [usize; 3] = {
        let mut out = [0usize; 3];
        let mut i = 0;
        for node in head.iter(&links) {
            out[i] = node;
            i += 1;
        }
        out
    };
    assert_eq!(collected, [1, 2, 3]);
}

#[test_case]
fn test_add_front_prepends() {
    let mut links: LinkArray<4> = LinkArray::new();
    let mut head = ListHead::new(usize::MAX);
    head.add_tail(2, &mut links);
    head.add_front(1, &mut links);

    let mut iter = head.iter(&links);
    assert_eq!(iter.next(), Some(1));
    assert_eq!(iter.next(), Some(2));
    assert_eq!(iter.next(), None);
}

#[test_case]
fn test_remove_detaches_middle_node() {
    let mut links: LinkArray<4> = LinkArray::new();
    let mut head = ListHead::new(usize::MAX);
    head.add_tail(1, &mut links);
    head.add_tail(2, &mut links);
    head.add_tail(3, &mut links);

    head.remove(2, &mut links);

    let mut iter = head.iter(&links);
    assert_eq!(iter.next(), Some(1));
    assert_eq!(iter.next(), Some(3));
    assert_eq!(iter.next(), None);
    let link = links.link_of(2);
    assert_eq!(link.next, NIL);
    assert_eq!(link.prev, NIL);
}

#[test_case]
fn test_remove_last_node_empties_list() {
    let mut links: LinkArray<2> = LinkArray::new();
    let mut head = ListHead::new(usize::MAX);
    head.add_tail(0, &mut links);
    head.remove(0, &mut links);
    assert!(head.is_empty());
}
