//! Low-level CPU primitives: flag save/restore, TLB flush, descriptor table
//! register access, segment loads, and bit-scan-forward.
//!
//! Mirrors spec.md §4.B: a small inlined surface that every other subsystem
//! builds critical sections on top of.

use core::arch::asm;

/// An opaque token returned by [`save_interrupts`] and consumed by
/// [`restore_interrupts`]. Nested save/restore pairs compose: an inner
/// `save_interrupts()` captures "interrupts are currently off" and its
/// matching `restore_interrupts` leaves them off, even though the outer
/// pair will later turn them back on.
#[derive(Clone, Copy)]
pub struct InterruptToken(bool);

/// Globally enables interrupts (`sti`).
#[inline]
pub fn enable_interrupts() {
    // SAFETY: `sti` has no memory effects visible to the optimizer beyond
    // the documented flags changes.
    unsafe {
        asm!("sti", options(nomem, nostack, preserves_flags));
    }
}

/// Globally disables interrupts (`cli`).
#[inline]
pub fn disable_interrupts() {
    // SAFETY: `cli` has no memory effects visible to the optimizer beyond
    // the documented flags changes.
    unsafe {
        asm!("cli", options(nomem, nostack, preserves_flags));
    }
}

/// Returns whether EFLAGS.IF is currently set.
#[inline]
pub fn interrupts_enabled() -> bool {
    let eflags: u32;
    // SAFETY: `pushfd`/`pop` only reads flags into a GPR, no other effect.
    unsafe {
        asm!("pushfd", "pop {}", out(reg) eflags, options(nomem, preserves_flags));
    }
    (eflags & (1 << 9)) != 0
}

/// Atomically captures EFLAGS.IF and disables interrupts. Returns a token
/// that [`restore_interrupts`] uses to put IF back exactly how it found it.
#[inline]
pub fn save_interrupts() -> InterruptToken {
    let was_enabled = interrupts_enabled();
    disable_interrupts();
    InterruptToken(was_enabled)
}

/// Restores EFLAGS.IF to the state captured by the paired [`save_interrupts`].
#[inline]
pub fn restore_interrupts(token: InterruptToken) {
    if token.0 {
        enable_interrupts();
    }
}

/// Runs `f` with interrupts disabled, restoring the prior IF state
/// afterwards. The building block every shared-table critical section
/// (spec.md §5) is expressed in terms of.
#[inline]
pub fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
    let token = save_interrupts();
    let result = f();
    restore_interrupts(token);
    result
}

/// Flushes the entire TLB by reloading CR3 with its current value.
#[inline]
pub fn flush_tlb() {
    // SAFETY: reloading CR3 with its own value is always valid and is the
    // documented way to flush non-global TLB entries.
    unsafe {
        asm!(
            "mov {tmp}, cr3",
            "mov cr3, {tmp}",
            tmp = out(reg) _,
            options(nostack, preserves_flags)
        );
    }
}

/// Loads CR3 with a new page directory's physical address.
///
/// # Safety
/// `pdbr` must be the physical address of a valid page directory with
/// identity/kernel mappings the current code is executing from still intact.
#[inline]
pub unsafe fn load_page_directory(pdbr: u32) {
    asm!("mov cr3, {}", in(reg) pdbr, options(nostack, preserves_flags));
}

/// Reads CR3.
#[inline]
pub fn read_page_directory() -> u32 {
    let value: u32;
    // SAFETY: reading CR3 has no side effects.
    unsafe {
        asm!("mov {}, cr3", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Sets CR0.PG (bit 31), enabling paging.
///
/// # Safety
/// CR3 must already point at a valid page directory that identity-maps the
/// currently executing code, or the next instruction fetch will fault.
#[inline]
pub unsafe fn enable_paging() {
    asm!(
        "mov {tmp}, cr0",
        "or {tmp}, 0x80000000",
        "mov cr0, {tmp}",
        tmp = out(reg) _,
        options(nostack, preserves_flags)
    );
}

/// Sets CR4.PSE (bit 4), enabling 4 MiB large pages.
///
/// # Safety
/// Must run before any PDE that sets the "large" bit is consulted by the
/// MMU.
#[inline]
pub unsafe fn enable_large_pages() {
    asm!(
        "mov {tmp}, cr4",
        "or {tmp}, 0x10",
        "mov cr4, {tmp}",
        tmp = out(reg) _,
        options(nostack, preserves_flags)
    );
}

#[repr(C, packed)]
pub struct DescriptorTablePointer {
    pub limit: u16,
    pub base: u32,
}

/// Loads the GDTR.
///
/// # Safety
/// `ptr` must reference a live, correctly laid out GDT for the remainder of
/// its use; the caller is responsible for reloading segment registers
/// afterwards.
#[inline]
pub unsafe fn lgdt(ptr: &DescriptorTablePointer) {
    asm!("lgdt [{}]", in(reg) ptr, options(readonly, nostack, preserves_flags));
}

/// Loads the IDTR.
///
/// # Safety
/// `ptr` must reference a live, correctly laid out IDT that stays valid for
/// as long as interrupts may fire.
#[inline]
pub unsafe fn lidt(ptr: &DescriptorTablePointer) {
    asm!("lidt [{}]", in(reg) ptr, options(readonly, nostack, preserves_flags));
}

/// Loads all four data segment selectors (ds/es/fs/gs) plus ss.
///
/// # Safety
/// `selector` must reference a valid, present data-segment descriptor in
/// the currently loaded GDT.
#[inline]
pub unsafe fn load_data_segments(selector: u16) {
    asm!(
        "mov ds, {0:x}",
        "mov es, {0:x}",
        "mov fs, {0:x}",
        "mov gs, {0:x}",
        "mov ss, {0:x}",
        in(reg) selector,
        options(nostack, preserves_flags)
    );
}

/// Loads the task register (`ltr`) with `selector`.
///
/// # Safety
/// `selector` must reference a valid, present, available TSS descriptor.
#[inline]
pub unsafe fn load_task_register(selector: u16) {
    asm!("ltr {0:x}", in(reg) selector, options(nostack, preserves_flags));
}

/// Returns the least-significant set bit index of `word`, or `-1` if `word`
/// is zero (spec.md §8 "Bit-scan-forward" property).
///
/// Uses the native `bsf` instruction, which leaves the result undefined (not
/// UB in the Rust sense, just an unspecified register value) when the input
/// is zero, so the zero case is special-cased in software first.
#[inline]
pub fn bsf(word: u32) -> i32 {
    if word == 0 {
        return -1;
    }
    let index: u32;
    // SAFETY: `word != 0` is checked above, so `bsf`'s result is well
    // defined per the instruction's own contract.
    unsafe {
        asm!("bsf {0:e}, {1:e}", out(reg) index, in(reg) word, options(nomem, nostack, pure));
    }
    index as i32
}
