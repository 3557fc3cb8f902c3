//! Physical memory discovery and paging (spec.md §4.E).
//!
//! `boot_params` models the read-only hand-off block the stage-2 loader
//! leaves behind (spec.md §6); `pmm` validates it has enough usable RAM;
//! `paging` owns the page directory and the page-table mutation surface.

pub mod boot_params;
pub mod paging;
pub mod pmm;
