//! Global Descriptor Table (GDT) and Task State Segment (TSS) setup.
//!
//! Installs the flat-memory-model GDT a protected-mode kernel needs before
//! ring-3 tasks can run:
//!
//! - kernel code/data segments (ring 0, base 0, limit 4 GiB)
//! - user code/data segments (ring 3, base 0, limit 4 GiB)
//! - one 32-bit TSS descriptor, used only for its `esp0`/`ss0` fields so the
//!   CPU knows which kernel stack to switch to on a ring 3 -> ring 0
//!   transition (spec.md §4.D privilege-change handling)

use core::cell::UnsafeCell;
use core::mem::size_of;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch::constants::{KERNEL_CS, KERNEL_DS, USER_CS, USER_DS};
use crate::arch::cpu::{self, DescriptorTablePointer};

const GDT_ENTRY_COUNT: usize = 6;

const NULL_INDEX: u16 = 0;
const KERNEL_CODE_INDEX: u16 = 1;
const KERNEL_DATA_INDEX: u16 = 2;
const USER_CODE_INDEX: u16 = 3;
const USER_DATA_INDEX: u16 = 4;
const TSS_INDEX: u16 = 5;

/// Kernel code segment selector (ring 0). Mirrors [`KERNEL_CS`].
pub const KERNEL_CODE_SELECTOR: u16 = KERNEL_CS;
/// Kernel data segment selector (ring 0). Mirrors [`KERNEL_DS`].
pub const KERNEL_DATA_SELECTOR: u16 = KERNEL_DS;
/// User code segment selector (ring 3). Mirrors [`USER_CS`].
pub const USER_CODE_SELECTOR: u16 = USER_CS;
/// User data segment selector (ring 3). Mirrors [`USER_DS`].
pub const USER_DATA_SELECTOR: u16 = USER_DS;
/// TSS selector.
pub const TSS_SELECTOR: u16 = TSS_INDEX << 3;

const ACCESS_PRESENT: u8 = 1 << 7;
const ACCESS_SEGMENT: u8 = 1 << 4;
const ACCESS_EXECUTABLE: u8 = 1 << 3;
const ACCESS_RW: u8 = 1 << 1;
const ACCESS_RING3: u8 = 0b11 << 5;
const ACCESS_TSS_32BIT_AVAILABLE: u8 = 0x9;

const FLAGS_GRANULARITY_4K: u8 = 1 << 3;
const FLAGS_32BIT: u8 = 1 << 2;

/// 32-bit Task State Segment. Only `ss0`/`esp0` (the ring-0 stack the CPU
/// loads on a privilege-raising interrupt/trap) are used by this core; the
/// rest of the fields are zeroed and unused, matching the "hardware wants a
/// whole TSS, we want one field of it" shape spec.md §4.D implies.
#[repr(C, packed)]
struct TaskStateSegment {
    prev_task_link: u16,
    _reserved0: u16,
    esp0: u32,
    ss0: u16,
    _reserved1: u16,
    esp1: u32,
    ss1: u16,
    _reserved2: u16,
    esp2: u32,
    ss2: u16,
    _reserved3: u16,
    cr3: u32,
    eip: u32,
    eflags: u32,
    eax: u32,
    ecx: u32,
    edx: u32,
    ebx: u32,
    esp: u32,
    ebp: u32,
    esi: u32,
    edi: u32,
    es: u16,
    _reserved4: u16,
    cs: u16,
    _reserved5: u16,
    ss: u16,
    _reserved6: u16,
    ds: u16,
    _reserved7: u16,
    fs: u16,
    _reserved8: u16,
    gs: u16,
    _reserved9: u16,
    ldt_selector: u16,
    _reserved10: u16,
    trap: u16,
    io_map_base: u16,
}

impl TaskStateSegment {
    const fn new() -> Self {
        Self {
            prev_task_link: 0,
            _reserved0: 0,
            esp0: 0,
            ss0: 0,
            _reserved1: 0,
            esp1: 0,
            ss1: 0,
            _reserved2: 0,
            esp2: 0,
            ss2: 0,
            _reserved3: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            _reserved4: 0,
            cs: 0,
            _reserved5: 0,
            ss: 0,
            _reserved6: 0,
            ds: 0,
            _reserved7: 0,
            fs: 0,
            _reserved8: 0,
            gs: 0,
            _reserved9: 0,
            ldt_selector: 0,
            _reserved10: 0,
            trap: 0,
            io_map_base: size_of::<TaskStateSegment>() as u16,
        }
    }
}

struct GdtState {
    gdt: UnsafeCell<[u64; GDT_ENTRY_COUNT]>,
    tss: UnsafeCell<TaskStateSegment>,
}

impl GdtState {
    const fn new() -> Self {
        Self {
            gdt: UnsafeCell::new([0; GDT_ENTRY_COUNT]),
            tss: UnsafeCell::new(TaskStateSegment::new()),
        }
    }
}

// SAFETY: the kernel runs on a single CPU core; mutation happens only
// during boot sequencing before interrupts (and hence any re-entry into
// this module) are enabled.
unsafe impl Sync for GdtState {}

static STATE: GdtState = GdtState::new();
static INITIALIZED: AtomicBool = AtomicBool::new(false);

#[inline]
const fn descriptor(base: u32, limit: u32, access: u8, flags: u8) -> u64 {
    let mut value: u64 = 0;
    value |= (limit as u64) & 0xFFFF;
    value |= ((base as u64) & 0xFFFFFF) << 16;
    value |= (access as u64) << 40;
    value |= (((limit >> 16) as u64) & 0xF) << 48;
    value |= ((flags as u64) & 0xF) << 52;
    value |= ((base as u64) >> 24) << 56;
    value
}

const fn code_or_data_descriptor(ring3: bool, executable: bool) -> u64 {
    let mut access = ACCESS_PRESENT | ACCESS_SEGMENT | ACCESS_RW;
    if executable {
        access |= ACCESS_EXECUTABLE;
    }
    if ring3 {
        access |= ACCESS_RING3;
    }
    descriptor(0, 0xFFFFF, access, FLAGS_GRANULARITY_4K | FLAGS_32BIT)
}

const fn tss_descriptor(base: u32, limit: u32) -> u64 {
    descriptor(base, limit, ACCESS_PRESENT | ACCESS_TSS_32BIT_AVAILABLE, 0)
}

/// Initializes and loads the kernel GDT/TSS. Idempotent.
///
/// Builds a flat-memory-model descriptor table, publishes a TSS whose
/// `esp0`/`ss0` point at the current kernel stack, then loads GDTR/segment
/// registers/TR in that order.
pub fn init(kernel_stack_top: u32) {
    // SAFETY: `STATE` is a boot-time singleton; we build a fully consistent
    // table before publishing it to the CPU via `lgdt`.
    unsafe {
        let gdt = &mut *STATE.gdt.get();
        gdt[NULL_INDEX as usize] = 0;
        gdt[KERNEL_CODE_INDEX as usize] = code_or_data_descriptor(false, true);
        gdt[KERNEL_DATA_INDEX as usize] = code_or_data_descriptor(false, false);
        gdt[USER_CODE_INDEX as usize] = code_or_data_descriptor(true, true);
        gdt[USER_DATA_INDEX as usize] = code_or_data_descriptor(true, false);

        let tss = &mut *STATE.tss.get();
        tss.esp0 = kernel_stack_top;
        tss.ss0 = KERNEL_DATA_SELECTOR;
        let tss_base = tss as *mut TaskStateSegment as u32;
        let tss_limit = (size_of::<TaskStateSegment>() - 1) as u32;
        gdt[TSS_INDEX as usize] = tss_descriptor(tss_base, tss_limit);

        let gdt_ptr = DescriptorTablePointer {
            limit: (size_of::<[u64; GDT_ENTRY_COUNT]>() - 1) as u16,
            base: gdt.as_ptr() as u32,
        };

        cpu::lgdt(&gdt_ptr);
        cpu::load_data_segments(KERNEL_DATA_SELECTOR);
        reload_cs(KERNEL_CODE_SELECTOR);
        cpu::load_task_register(TSS_SELECTOR);
    }

    INITIALIZED.store(true, Ordering::Release);
}

/// Updates the ring-0 stack the CPU switches to on the next privilege-raising
/// interrupt (used when a new per-task kernel stack is installed).
pub fn set_kernel_stack(kernel_stack_top: u32) {
    // SAFETY: single-core kernel; `tss.esp0` is read only by the CPU on
    // interrupt entry, which cannot race a same-core write.
    unsafe {
        (*STATE.tss.get()).esp0 = kernel_stack_top;
    }
}

/// Far-jumps through a dedicated code stub to reload CS with `selector`.
///
/// # Safety
/// `selector` must reference a valid, present code-segment descriptor in
/// the currently loaded GDT.
unsafe fn reload_cs(selector: u16) {
    core::arch::asm!(
        "push {sel}",
        "lea {tmp}, [2f]",
        "push {tmp}",
        "retf",
        "2:",
        sel = in(reg) selector as u32,
        tmp = out(reg) _,
        options(nostack)
    );
}

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

/// Returns the ring-0 stack top currently published in the TSS `esp0`
/// field (test/diagnostic use; mirrors [`set_kernel_stack`]).
pub fn kernel_stack_top() -> u32 {
    // SAFETY: read-only observation of a field only ever written from
    // this same core while interrupts are masked around boot sequencing.
    unsafe { (*STATE.tss.get()).esp0 }
}

/// Returns the raw GDT entries as currently loaded (test/diagnostic use).
pub fn descriptor_snapshot() -> [u64; GDT_ENTRY_COUNT] {
    // SAFETY: read-only snapshot of boot-time-initialized, single-core
    // state.
    unsafe { *STATE.gdt.get() }
}
