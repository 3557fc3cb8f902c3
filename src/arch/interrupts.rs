//! IDT construction and the common interrupt/trap/syscall dispatcher.
//!
//! Every gate in the IDT — exception, IRQ, or the `int 0x80` syscall trap —
//! points at an assembly thunk in [`interrupts_stubs`] that builds a
//! [`CpuRegisterFrame`] on the current stack and calls
//! [`kernel_interrupt_dispatch`] with a pointer to it (spec.md §4.D).

use core::cell::UnsafeCell;
use core::mem::size_of;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch::cpu::{self, DescriptorTablePointer};
use crate::arch::gdt::KERNEL_CODE_SELECTOR;
use crate::drivers::pic;
use crate::{kinfo, kwarn};
use crate::syscall;

const IDT_ENTRIES: usize = 256;

/// First vector assigned to hardware IRQs (spec.md §6 "PIC port map").
pub const IRQ_BASE: u8 = 0x20;
/// Trap gate used for the POSIX-ish syscall ABI (`int 0x80`).
pub const SYSCALL_VECTOR: u8 = 0x80;

pub const EXCEPTION_DIVIDE_ERROR: u8 = 0;
pub const EXCEPTION_DEBUG: u8 = 1;
pub const EXCEPTION_NMI: u8 = 2;
pub const EXCEPTION_BREAKPOINT: u8 = 3;
pub const EXCEPTION_OVERFLOW: u8 = 4;
pub const EXCEPTION_BOUND_RANGE: u8 = 5;
pub const EXCEPTION_INVALID_OPCODE: u8 = 6;
pub const EXCEPTION_DEVICE_NOT_AVAILABLE: u8 = 7;
pub const EXCEPTION_DOUBLE_FAULT: u8 = 8;
pub const EXCEPTION_INVALID_TSS: u8 = 10;
pub const EXCEPTION_SEGMENT_NOT_PRESENT: u8 = 11;
pub const EXCEPTION_STACK_FAULT: u8 = 12;
pub const EXCEPTION_GENERAL_PROTECTION: u8 = 13;
pub const EXCEPTION_PAGE_FAULT: u8 = 14;

const IDT_TYPE_INTERRUPT_GATE_32: u8 = 0x0E;
const IDT_TYPE_TRAP_GATE_32: u8 = 0x0F;
const IDT_PRESENT: u8 = 0x80;

/// Up to this many independent handlers may be chained on one IRQ line
/// (spec.md §3 `IrqHandlerTable`).
pub const MAX_HANDLERS_PER_IRQ: usize = 8;
const IRQ_LINE_COUNT: usize = 16;

/// The canonical register snapshot every interrupt entry stub builds.
///
/// Field order matches the layout the entry stub leaves on the stack, read
/// low address to high address (i.e. in reverse chronological push order —
/// the dispatcher receives a pointer to `ebx`, the last thing pushed before
/// the call). `esp`/`ss` are populated by hardware, and therefore
/// meaningful, only when the trap caused a privilege-level change; check
/// `cs_rpl()` before trusting them (spec.md §3 `CpuRegisterFrame`).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuRegisterFrame {
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
    pub ebp: u32,
    pub eax: u32,
    pub ds: u32,
    pub es: u32,
    pub fs: u32,
    pub gs: u32,
    pub vector: u32,
    pub error_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub esp: u32,
    pub ss: u32,
}

impl CpuRegisterFrame {
    /// Requested privilege level of the interrupted code, from the low two
    /// bits of the pushed `cs`.
    pub fn cs_rpl(&self) -> u8 {
        (self.cs & 0x3) as u8
    }

    /// True if this trap crossed from ring 3 into ring 0 (`esp`/`ss` valid).
    pub fn is_privilege_change(&self) -> bool {
        self.cs_rpl() == 3
    }

    /// Recovers the IRQ line number from a one's-complemented IRQ vector.
    /// Only meaningful when [`Self::is_irq_vector`] is true.
    pub fn irq_line(&self) -> u8 {
        (!self.vector) as u8
    }

    pub fn is_irq_vector(&self) -> bool {
        self.vector > (u32::from(u8::MAX) as u32) && self.vector != u32::from(SYSCALL_VECTOR)
    }

    pub fn is_syscall_vector(&self) -> bool {
        self.vector == u32::from(SYSCALL_VECTOR)
    }
}

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl IdtEntry {
    const fn missing() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            zero: 0,
            type_attr: 0,
            offset_high: 0,
        }
    }

    fn set(&mut self, handler: usize, gate_type: u8, dpl: u8) {
        self.offset_low = handler as u16;
        self.selector = KERNEL_CODE_SELECTOR;
        self.zero = 0;
        self.type_attr = IDT_PRESENT | gate_type | ((dpl & 0x3) << 5);
        self.offset_high = (handler >> 16) as u16;
    }
}

/// A single chained IRQ handler. Returns `true` if it recognized and
/// serviced the interrupt (spec.md §3 "handled" invariant).
pub type IrqHandler = fn(irq: u8, frame: &mut CpuRegisterFrame) -> bool;

struct HandlerTable {
    handlers: UnsafeCell<[[Option<IrqHandler>; MAX_HANDLERS_PER_IRQ]; IRQ_LINE_COUNT]>,
}

// SAFETY: entries are appended only from kernel init code running with
// interrupts disabled; lookups happen from IRQ context on the same core,
// so there is never a concurrent writer during a read.
unsafe impl Sync for HandlerTable {}

impl HandlerTable {
    const fn new() -> Self {
        Self {
            handlers: UnsafeCell::new([[None; MAX_HANDLERS_PER_IRQ]; IRQ_LINE_COUNT]),
        }
    }
}

struct IdtTable {
    entries: UnsafeCell<[IdtEntry; IDT_ENTRIES]>,
}

// SAFETY: `IDT` is written only by `init()` before `lidt` publishes it and
// before interrupts are enabled; there is no concurrent writer afterwards.
unsafe impl Sync for IdtTable {}

static IDT: IdtTable = IdtTable {
    entries: UnsafeCell::new([IdtEntry::missing(); IDT_ENTRIES]),
};
static HANDLER_TABLE: HandlerTable = HandlerTable::new();
static INITIALIZED: AtomicBool = AtomicBool::new(false);

#[path = "interrupts_stubs.rs"]
mod interrupts_stubs;

use interrupts_stubs::*;

/// Appends `handler` to IRQ line `irq`'s chain.
///
/// Per spec.md §3, a handler may be registered at most once per line and at
/// most [`MAX_HANDLERS_PER_IRQ`] handlers may be chained; both are enforced
/// here, returning `false` on violation instead of silently dropping it.
pub fn register_irq_handler(irq: u8, handler: IrqHandler) -> bool {
    if irq as usize >= IRQ_LINE_COUNT {
        return false;
    }
    cpu::without_interrupts(|| {
        // SAFETY: mutation happens with interrupts disabled, so no IRQ
        // dispatch can observe a partially updated slot.
        let slots = unsafe { &mut (*HANDLER_TABLE.handlers.get())[irq as usize] };
        if slots.iter().flatten().any(|h| *h as usize == handler as usize) {
            return false;
        }
        match slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(handler);
                true
            }
            None => false,
        }
    })
}

pub(crate) fn irq_handlers(irq: u8) -> [Option<IrqHandler>; MAX_HANDLERS_PER_IRQ] {
    // SAFETY: snapshot read; the table is append-only after boot.
    unsafe { (*HANDLER_TABLE.handlers.get())[irq as usize] }
}

/// Builds the IDT and installs it. Does not touch the PIC; callers run
/// [`crate::drivers::pic::init`] separately (spec.md keeps IDT construction
/// and PIC programming as distinct steps).
pub fn init() {
    // SAFETY: single boot-time writer, before `lidt` publishes the table
    // and before interrupts are enabled.
    unsafe {
        let idt = &mut *IDT.entries.get();

        idt[EXCEPTION_DIVIDE_ERROR as usize].set(isr_divide_error as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[EXCEPTION_DEBUG as usize].set(isr_debug as usize, IDT_TYPE_TRAP_GATE_32, 3);
        idt[EXCEPTION_NMI as usize].set(isr_nmi as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[EXCEPTION_BREAKPOINT as usize].set(isr_breakpoint as usize, IDT_TYPE_TRAP_GATE_32, 3);
        idt[EXCEPTION_OVERFLOW as usize].set(isr_overflow as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[EXCEPTION_BOUND_RANGE as usize].set(isr_bound_range as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[EXCEPTION_INVALID_OPCODE as usize]
            .set(isr_invalid_opcode as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[EXCEPTION_DEVICE_NOT_AVAILABLE as usize]
            .set(isr_device_not_available as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[EXCEPTION_DOUBLE_FAULT as usize].set(isr_double_fault as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[EXCEPTION_INVALID_TSS as usize].set(isr_invalid_tss as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[EXCEPTION_SEGMENT_NOT_PRESENT as usize]
            .set(isr_segment_not_present as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[EXCEPTION_STACK_FAULT as usize].set(isr_stack_fault as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[EXCEPTION_GENERAL_PROTECTION as usize]
            .set(isr_general_protection as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[EXCEPTION_PAGE_FAULT as usize].set(isr_page_fault as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);

        idt[(IRQ_BASE + 0) as usize].set(irq0_stub as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[(IRQ_BASE + 1) as usize].set(irq1_stub as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[(IRQ_BASE + 2) as usize].set(irq2_stub as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[(IRQ_BASE + 3) as usize].set(irq3_stub as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[(IRQ_BASE + 4) as usize].set(irq4_stub as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[(IRQ_BASE + 5) as usize].set(irq5_stub as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[(IRQ_BASE + 6) as usize].set(irq6_stub as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[(IRQ_BASE + 7) as usize].set(irq7_stub as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[(IRQ_BASE + 8) as usize].set(irq8_stub as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[(IRQ_BASE + 9) as usize].set(irq9_stub as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[(IRQ_BASE + 10) as usize].set(irq10_stub as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[(IRQ_BASE + 11) as usize].set(irq11_stub as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[(IRQ_BASE + 12) as usize].set(irq12_stub as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[(IRQ_BASE + 13) as usize].set(irq13_stub as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[(IRQ_BASE + 14) as usize].set(irq14_stub as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);
        idt[(IRQ_BASE + 15) as usize].set(irq15_stub as usize, IDT_TYPE_INTERRUPT_GATE_32, 0);

        idt[SYSCALL_VECTOR as usize].set(isr_syscall as usize, IDT_TYPE_TRAP_GATE_32, 3);

        let idtr = DescriptorTablePointer {
            limit: (size_of::<[IdtEntry; IDT_ENTRIES]>() - 1) as u16,
            base: idt.as_ptr() as u32,
        };
        cpu::lidt(&idtr);
    }

    INITIALIZED.store(true, Ordering::Release);
}

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

/// The single entry point every thunk in [`interrupts_stubs`] calls
/// (spec.md §4.D step 4, "fastcall: pointer in ecx").
///
/// # Safety
/// Must only be called by the assembly thunks, with `frame` pointing at a
/// live, correctly laid out [`CpuRegisterFrame`] on the current stack.
#[no_mangle]
pub unsafe extern "fastcall" fn kernel_interrupt_dispatch(frame: *mut CpuRegisterFrame) {
    let frame = &mut *frame;

    if frame.is_syscall_vector() {
        dispatch_syscall(frame);
    } else if frame.is_irq_vector() {
        pic::handle_irq(frame.irq_line(), frame);
    } else {
        dispatch_exception(frame);
    }
}

fn dispatch_syscall(frame: &mut CpuRegisterFrame) {
    let result = syscall::dispatch(frame.eax, frame.ebx, frame.ecx, frame.edx);
    frame.eax = result as u32;
}

fn dispatch_exception(frame: &mut CpuRegisterFrame) {
    match frame.vector as u8 {
        EXCEPTION_DEBUG | EXCEPTION_BREAKPOINT => {
            // No standalone gdb-stub subsystem in this core; a real one
            // would pump the serial-debug protocol here instead of
            // resuming immediately.
            kwarn!("debug exception (vector {}) at eip={:#x}", frame.vector, { frame.eip });
        }
        EXCEPTION_NMI => {
            kwarn!("non-maskable interrupt received");
        }
        _ => crate::diagnostics::fatal_exception(frame),
    }
}

/// Logs a one-line summary of the frame; used by diagnostics that don't
/// escalate to a full blue-screen.
pub fn log_frame_summary(frame: &CpuRegisterFrame) {
    kinfo!(
        "vector={:#x} err={:#x} eip={:#x} cs={:#x} eflags={:#x}",
        frame.vector,
        frame.error_code,
        { frame.eip },
        { frame.cs },
        { frame.eflags }
    );
}
