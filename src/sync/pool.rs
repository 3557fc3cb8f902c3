//! Fixed-capacity slab allocator (spec.md §3/§4.A `Pool`).
//!
//! Statically backed storage for `N` identically sized `T` slots, plus a
//! freelist threaded through the unused slots themselves (no separate
//! bitmap). `alloc`/`free` are O(1); a pool's capacity never changes after
//! `create`.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;

const FREE_MAGIC: u32 = 0xF00D_CAFE;

union Slot<T> {
    value: MaybeUninit<T>,
    next_free: usize,
}

struct PoolInner<T, const N: usize> {
    slots: [Slot<T>; N],
    free_head: Option<usize>,
    live_count: usize,
}

/// A fixed-size, fixed-capacity object pool.
///
/// `name` is purely diagnostic (it shows up in overflow/underflow log
/// lines); `magic` guards against using a pool after [`Pool::destroy`].
pub struct Pool<T, const N: usize> {
    name: &'static str,
    magic: UnsafeCell<u32>,
    inner: UnsafeCell<PoolInner<T, N>>,
}

impl<T, const N: usize> Pool<T, N> {
    /// Builds an empty pool backed entirely by static/inline storage; no
    /// heap allocation (spec.md Non-goal: no paging-based demand loading,
    /// and no general-purpose allocator is in scope either).
    pub const fn create(name: &'static str) -> Self {
        // Building the initial freelist at const-eval time would need a
        // const loop over `Slot<T>`, which isn't possible generically here;
        // `new` instead lazily links the freelist on first use via
        // `ensure_linked`.
        Self {
            name,
            magic: UnsafeCell::new(FREE_MAGIC),
            inner: UnsafeCell::new(PoolInner {
                slots: unsafe { MaybeUninit::uninit().assume_init() },
                free_head: None,
                live_count: 0,
            }),
        }
    }

    fn ensure_linked(&self, inner: &mut PoolInner<T, N>) {
        if inner.free_head.is_some() || inner.live_count != 0 {
            return;
        }
        if N == 0 {
            return;
        }
        for i in 0..N - 1 {
            inner.slots[i].next_free = i + 1;
        }
        inner.slots[N - 1].next_free = usize::MAX;
        inner.free_head = Some(0);
    }

    fn check_magic(&self) {
        // SAFETY: read-only inspection of a plain `u32`.
        let magic = unsafe { *self.magic.get() };
        debug_assert_eq!(magic, FREE_MAGIC, "pool '{}' used after destroy", self.name);
    }

    /// Detaches the freelist head, zero-initializes it, and returns a
    /// pointer to it; `None` if the pool is exhausted.
    pub fn alloc(&self) -> Option<*mut T> {
        self.check_magic();
        // SAFETY: single-threaded access to this pool's own storage; the
        // caller is responsible for not aliasing a slot across two live
        // `alloc`s (guaranteed by the freelist never handing out the same
        // index twice before a matching `free`).
        unsafe {
            let inner = &mut *self.inner.get();
            self.ensure_linked(inner);

            let head = inner.free_head?;
            let next = inner.slots[head].next_free;
            inner.free_head = if next == usize::MAX { None } else { Some(next) };
            inner.live_count += 1;

            let ptr = inner.slots[head].value.as_mut_ptr();
            ptr.write_bytes(0, 1);
            Some(ptr)
        }
    }

    /// Reattaches `ptr`'s slot to the freelist. `ptr` must have come from
    /// [`Pool::alloc`] on this exact pool and must not already be free.
    pub fn free(&self, ptr: *mut T) {
        self.check_magic();
        // SAFETY: see `alloc`; `assert` below enforces the "came from this
        // pool's storage" invariant before any pointer arithmetic is trusted.
        unsafe {
            let inner = &mut *self.inner.get();
            let base = inner.slots.as_mut_ptr() as *mut Slot<T>;
            let slot_ptr = ptr as *mut Slot<T>;
            let offset = slot_ptr.offset_from(base);
            assert!(
                offset >= 0 && (offset as usize) < N,
                "pool '{}': freed pointer outside pool storage",
                self.name
            );
            let index = offset as usize;

            inner.slots[index].next_free = match inner.free_head {
                Some(h) => h,
                None => usize::MAX,
            };
            inner.free_head = Some(index);
            inner.live_count -= 1;
        }
    }

    /// Number of currently allocated slots.
    pub fn live_count(&self) -> usize {
        // SAFETY: read-only snapshot.
        unsafe { (*self.inner.get()).live_count }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Invalidates the pool's magic; subsequent `alloc`/`free` calls trip a
    /// debug assertion.
    pub fn destroy(&self) {
        // SAFETY: plain `u32` write.
        unsafe {
            *self.magic.get() = 0;
        }
    }
}

// SAFETY: this kernel is single-threaded; all pool mutation happens with
// interrupts disabled around the relevant critical section at call sites.
unsafe impl<T, const N: usize> Sync for Pool<T, N> {}
