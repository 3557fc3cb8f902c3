//! Physical-memory-map validation (spec.md §4.E, §8 scenarios 1/2).
//!
//! This core does no demand paging and no general-purpose frame allocator
//! (spec.md §1 Non-goals); `init` only has to total up the usable E820
//! regions and refuse to boot below [`MIN_KB`]. The total is cached for
//! diagnostics and for [`super::paging::init`] to size the identity map.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::mm::boot_params::BootParams;
use crate::{kinfo, kwarn};

/// Minimum usable RAM required to continue booting (spec.md §4.E, §7.3,
/// §8 scenario 2: "need at least 512 KB").
pub const MIN_KB: u64 = 512;

static USABLE_KB: AtomicU64 = AtomicU64::new(0);

/// Sums the usable E820 regions in `boot_params`, panicking if the total
/// falls below [`MIN_KB`] (spec.md §8 scenario 2's exact panic wording is
/// reproduced so the message-matching test in `tests/` stays accurate).
pub fn init(boot_params: &BootParams) {
    let mut total_bytes: u64 = 0;
    let mut entries = 0u32;

    for region in boot_params.e820_entries() {
        entries += 1;
        if region.is_usable() {
            total_bytes = total_bytes.saturating_add(region.length);
        }
    }

    let total_kb = total_bytes / 1024;
    kinfo!("pmm: {} E820 entries, {} KB usable", entries, total_kb);

    if total_kb < MIN_KB {
        panic!("pmm: need at least 512 KB of usable RAM, found {} KB", total_kb);
    }

    if entries == 0 {
        kwarn!("pmm: no E820 entries found; falling back to legacy memory probes");
    }

    USABLE_KB.store(total_kb, Ordering::Release);
}

/// Total usable KB counted at [`init`] time.
pub fn kb_free() -> u64 {
    USABLE_KB.load(Ordering::Acquire)
}
