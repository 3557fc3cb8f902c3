//! Two-level (10+10+12) i386 page table mutation (spec.md §3 `PageTable`,
//! §4.E).
//!
//! The kernel identity-maps its own image plus low memory with 4 MiB large
//! pages at boot (cheap: one PDE per 4 MiB, no page-table allocation
//! needed to get paging turned on at all). [`update_mappings`] is the sole
//! mutator of ordinary 4 KiB mappings afterwards, backed by a small fixed
//! pool of page tables allocated on demand.

use core::cell::UnsafeCell;

use crate::arch::cpu;
use crate::arch::constants::PAGE_SIZE_U32;

const ENTRIES_PER_TABLE: usize = 1024;

/// Page-directory/page-table entry flag bits (spec.md §3 `PageTable`
/// per-entry field list).
pub mod flags {
    pub const PRESENT: u32 = 1 << 0;
    pub const WRITABLE: u32 = 1 << 1;
    pub const USER: u32 = 1 << 2;
    pub const WRITE_THROUGH: u32 = 1 << 3;
    pub const CACHE_DISABLE: u32 = 1 << 4;
    pub const ACCESSED: u32 = 1 << 5;
    pub const DIRTY: u32 = 1 << 6;
    /// PDE-only: this entry maps a 4 MiB page directly, no page table.
    pub const LARGE: u32 = 1 << 7;
    pub const GLOBAL: u32 = 1 << 8;
}

/// How many 4 KiB pages [`update_mappings`] accepts in one call
/// (spec.md §4.E "asserts count <= 4096").
pub const MAX_MAPPING_COUNT: usize = 4096;

/// How many 4 MiB large pages are identity-mapped at boot, covering the
/// kernel image and low memory (spec.md §4.E "identity mapping for the
/// kernel image plus low memory").
const IDENTITY_LARGE_PAGES: usize = 16; // 64 MiB

/// Page tables available for [`update_mappings`] to hand out when a PDE it
/// touches has no backing table yet.
const EXTRA_PAGE_TABLES: usize = 32;

#[repr(align(4096))]
#[derive(Clone, Copy)]
struct PageTablePage([u32; ENTRIES_PER_TABLE]);

struct PagingState {
    directory: UnsafeCell<[u32; ENTRIES_PER_TABLE]>,
    extra_tables: UnsafeCell<[PageTablePage; EXTRA_PAGE_TABLES]>,
    extra_tables_used: UnsafeCell<usize>,
}

// SAFETY: all mutation happens during boot-time init or under the caller's
// own serialization (spec.md §5: "mutated only by `update_mappings` under
// the caller's responsibility to serialize").
unsafe impl Sync for PagingState {}

static STATE: PagingState = PagingState {
    directory: UnsafeCell::new([0; ENTRIES_PER_TABLE]),
    extra_tables: UnsafeCell::new([PageTablePage([0; ENTRIES_PER_TABLE]); EXTRA_PAGE_TABLES]),
    extra_tables_used: UnsafeCell::new(0),
};

fn pd_index(va: u32) -> usize {
    (va >> 22) as usize & 0x3FF
}

fn pt_index(va: u32) -> usize {
    (va >> 12) as usize & 0x3FF
}

/// Builds the boot-time identity map (kernel image + low memory via 4 MiB
/// large pages) and switches the CPU into paged mode
/// (spec.md §4.E "install it by loading CR3 and setting CR0.PG with
/// CR4.PSE").
pub fn init() {
    // SAFETY: single boot-time writer, before CR3/CR0.PG publish the table
    // to the MMU.
    unsafe {
        let directory = &mut *STATE.directory.get();
        for i in 0..IDENTITY_LARGE_PAGES {
            let base = (i as u32) * 4 * 1024 * 1024;
            directory[i] = base
                | flags::PRESENT
                | flags::WRITABLE
                | flags::LARGE
                | flags::GLOBAL;
        }

        cpu::enable_large_pages();
        cpu::load_page_directory(directory.as_ptr() as u32);
        cpu::enable_paging();
    }
}

/// Failure modes for [`update_mappings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingError {
    /// `count` exceeded [`MAX_MAPPING_COUNT`].
    CountTooLarge,
    /// A PDE touched by this call had no backing page table, and the
    /// fixed `extra_tables` pool is exhausted. spec.md §4.E / §9 leaves it
    /// open whether on-demand page-table allocation here is a stub or
    /// accepted behavior; this core resolves that by refusing the request
    /// instead of panicking (see `DESIGN.md`).
    TableAllocUnsupported,
}

/// Returns the address of the PTE mapping `va`, or `false` if the
/// containing PDE is not present (spec.md §4.E `walk`).
pub fn walk(va: u32) -> Option<*mut u32> {
    // SAFETY: read-only table walk over the single-core page directory.
    unsafe {
        let directory = &*STATE.directory.get();
        let pde = directory[pd_index(va)];
        if pde & flags::PRESENT == 0 {
            return None;
        }
        if pde & flags::LARGE != 0 {
            // A large-page PDE has no page table to point into; callers
            // that need a PTE address for a large-paged VA must treat the
            // PDE itself as the mapping (spec.md leaves large-page walk
            // granularity to the implementer; this core reports "present,
            // no distinct PTE" by returning the PDE's own address).
            return Some(&mut (*STATE.directory.get())[pd_index(va)] as *mut u32);
        }
        let table_base = (pde & 0xFFFF_F000) as *mut u32;
        Some(table_base.add(pt_index(va)))
    }
}

/// True iff [`walk`] succeeds and the resulting entry's present bit is set
/// (spec.md §4.E `virt_addr_valid`).
pub fn virt_addr_valid(va: u32) -> bool {
    match walk(va) {
        // SAFETY: `walk` returns a live pointer into either the directory
        // or a backing table, both of which outlive this read.
        Some(pte) => unsafe { *pte & flags::PRESENT != 0 },
        None => false,
    }
}

fn alloc_table() -> Option<*mut u32> {
    // SAFETY: single-core, callers serialize `update_mappings` themselves.
    unsafe {
        let used = &mut *STATE.extra_tables_used.get();
        if *used >= EXTRA_PAGE_TABLES {
            return None;
        }
        let table = &mut (*STATE.extra_tables.get())[*used];
        table.0 = [0; ENTRIES_PER_TABLE];
        *used += 1;
        Some(table.0.as_mut_ptr())
    }
}

/// The sole mutator of ordinary 4 KiB mappings (spec.md §4.E
/// `update_mappings`). For each of `count` consecutive pages starting at
/// `va`/`pa`, locates or allocates the containing page table and writes
/// `pte = pa | flags` (or clears it when `flags == 0`, i.e. an unmap).
/// Flushes the TLB once after the whole batch.
pub fn update_mappings(va: u32, pa: u32, count: usize, entry_flags: u32) -> Result<(), MappingError> {
    if count > MAX_MAPPING_COUNT {
        return Err(MappingError::CountTooLarge);
    }

    for i in 0..count {
        let page_va = va.wrapping_add((i as u32) * PAGE_SIZE_U32);
        let page_pa = pa.wrapping_add((i as u32) * PAGE_SIZE_U32);
        let pd_idx = pd_index(page_va);

        // SAFETY: single-core; `update_mappings` callers serialize access
        // per spec.md §5.
        unsafe {
            let directory = &mut *STATE.directory.get();
            if directory[pd_idx] & flags::PRESENT == 0 {
                let table = match alloc_table() {
                    Some(t) => t,
                    None => return Err(MappingError::TableAllocUnsupported),
                };
                directory[pd_idx] = (table as u32) | flags::PRESENT | flags::WRITABLE | flags::USER;
            } else if directory[pd_idx] & flags::LARGE != 0 {
                return Err(MappingError::TableAllocUnsupported);
            }

            let table_base = (directory[pd_idx] & 0xFFFF_F000) as *mut u32;
            let pte_ptr = table_base.add(pt_index(page_va));
            *pte_ptr = if entry_flags == 0 {
                0
            } else {
                (page_pa & 0xFFFF_F000) | entry_flags
            };
        }
    }

    cpu::flush_tlb();
    Ok(())
}
