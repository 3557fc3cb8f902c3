//! 8259A Programmable Interrupt Controller driver.
//!
//! Views the cascaded master/slave pair as one 16-line controller
//! (spec.md §3 `PicState`, §4.C).

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::arch::interrupts::{CpuRegisterFrame, MAX_HANDLERS_PER_IRQ};
use crate::arch::port::{io_wait, PortByte};
use crate::kwarn;

const PIC1_COMMAND: u16 = 0x20;
const PIC1_DATA: u16 = 0x21;
const PIC2_COMMAND: u16 = 0xA0;
const PIC2_DATA: u16 = 0xA1;

const PIC_EOI: u8 = 0x20;

const ICW1_INIT: u8 = 0x10;
const ICW1_ICW4: u8 = 0x01;
const ICW4_8086: u8 = 0x01;

const MASTER_VECTOR_BASE: u8 = 0x20;
const SLAVE_VECTOR_BASE: u8 = 0x28;
const CASCADE_IRQ: u8 = 2;

const IRQ7_SPURIOUS: u8 = 7;
const IRQ15_SPURIOUS: u8 = 15;

/// Spurious interrupts accumulated on one line before the line escalates to
/// a diagnostic screen (spec.md §4.C).
pub const SPURIOUS_THRESH: u32 = 3;

const IRQ_LINE_COUNT: usize = 16;

static SPURIOUS_COUNTS: [AtomicU32; IRQ_LINE_COUNT] = [
    AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0),
    AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0),
    AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0),
    AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0),
];

static MASTER_MASK: AtomicU8 = AtomicU8::new(0xFF);
static SLAVE_MASK: AtomicU8 = AtomicU8::new(0xFF);

fn master_data() -> PortByte {
    PortByte::new(PIC1_DATA)
}

fn slave_data() -> PortByte {
    PortByte::new(PIC2_DATA)
}

/// Issues the ICW1..ICW4 init sequence to both chips, then masks every line
/// except the cascade (spec.md §4.C "Initialization").
pub fn init() {
    // SAFETY: single boot-time caller; PIC ports are always present on the
    // target platform.
    unsafe {
        let cmd1 = PortByte::new(PIC1_COMMAND);
        let cmd2 = PortByte::new(PIC2_COMMAND);
        let data1 = master_data();
        let data2 = slave_data();

        cmd1.write(ICW1_INIT | ICW1_ICW4);
        io_wait();
        cmd2.write(ICW1_INIT | ICW1_ICW4);
        io_wait();

        data1.write(MASTER_VECTOR_BASE);
        io_wait();
        data2.write(SLAVE_VECTOR_BASE);
        io_wait();

        data1.write(1 << CASCADE_IRQ);
        io_wait();
        data2.write(CASCADE_IRQ);
        io_wait();

        data1.write(ICW4_8086);
        io_wait();
        data2.write(ICW4_8086);
        io_wait();

        let master_mask = !(1 << CASCADE_IRQ);
        let slave_mask = 0xFFu8;
        data1.write(master_mask);
        data2.write(slave_mask);
        MASTER_MASK.store(master_mask, Ordering::Relaxed);
        SLAVE_MASK.store(slave_mask, Ordering::Relaxed);
    }
}

fn chip_for(irq: u8) -> (&'static AtomicU8, PortByte) {
    if irq < 8 {
        (&MASTER_MASK, master_data())
    } else {
        (&SLAVE_MASK, slave_data())
    }
}

/// Masks `irq`, then reads the OCW1 register back and asserts the write was
/// accepted (spec.md §4.C "Mask / unmask").
pub fn mask(irq: u8) {
    set_mask_bit(irq, true);
}

/// Unmasks `irq`, asserting the write took effect the same way [`mask`]
/// does.
pub fn unmask(irq: u8) {
    set_mask_bit(irq, false);
}

fn set_mask_bit(irq: u8, masked: bool) {
    debug_assert!((irq as usize) < IRQ_LINE_COUNT);
    let bit = 1u8 << (irq % 8);
    let (cached, port) = chip_for(irq);

    // SAFETY: this chip's data port is always readable/writable once
    // `init()` has run.
    unsafe {
        let mut value = cached.load(Ordering::Relaxed);
        if masked {
            value |= bit;
        } else {
            value &= !bit;
        }
        port.write(value);
        cached.store(value, Ordering::Relaxed);

        let readback = port.read();
        debug_assert_eq!(
            readback, value,
            "PIC did not accept OCW1 write for IRQ {}",
            irq
        );
    }
}

pub fn is_masked(irq: u8) -> bool {
    let (cached, _) = chip_for(irq);
    let bit = 1u8 << (irq % 8);
    cached.load(Ordering::Relaxed) & bit != 0
}

/// Sends specific-EOI. For `irq >= 8` the slave is acknowledged before the
/// master, in that order (spec.md §4.C "EOI").
pub fn end_of_interrupt(irq: u8) {
    // SAFETY: command ports are always present once `init()` has run.
    unsafe {
        if irq >= 8 {
            PortByte::new(PIC2_COMMAND).write(PIC_EOI);
        }
        PortByte::new(PIC1_COMMAND).write(PIC_EOI);
    }
}

fn note_spurious(irq: u8) -> u32 {
    SPURIOUS_COUNTS[irq as usize].fetch_add(1, Ordering::Relaxed) + 1
}

/// Accumulated spurious-interrupt count for `irq` (spec.md §7 band 2
/// "diagnostic but continued").
pub fn spurious_count(irq: u8) -> u32 {
    SPURIOUS_COUNTS[irq as usize].load(Ordering::Relaxed)
}

/// True if `irq` (7 or 15) fired while masked, i.e. the hardware's own
/// spurious-interrupt signature (spec.md §4.C "Spurious detection").
fn is_spurious(irq: u8) -> bool {
    (irq == IRQ7_SPURIOUS || irq == IRQ15_SPURIOUS) && is_masked(irq)
}

/// Runs every registered handler for `irq` in registration order, EOIs if
/// warranted, and escalates unmasked-but-unhandled lines as fatal
/// (spec.md §4.C "Handled dispatch").
///
/// Called only from [`crate::arch::interrupts::kernel_interrupt_dispatch`]
/// with a live frame pointer for the duration of the IRQ.
pub fn handle_irq(irq: u8, frame: &mut CpuRegisterFrame) {
    if is_spurious(irq) {
        let count = note_spurious(irq);
        if irq == IRQ15_SPURIOUS {
            // The slave itself has nothing latched to acknowledge, but the
            // master still saw the cascade line fire; tell the master only
            // (spec.md §4.C, §8: "spurious IRQ 15 issues EOI to the master
            // only").
            // SAFETY: command port is always present once `init()` has run.
            unsafe {
                PortByte::new(PIC1_COMMAND).write(PIC_EOI);
            }
        }
        kwarn!("spurious IRQ{} (count={})", irq, count);
        if count % SPURIOUS_THRESH == 0 {
            crate::diagnostics::fatal_spurious_irq(irq, count);
        }
        return;
    }

    if is_masked(irq) {
        // A masked line should never reach the dispatcher; treat it the
        // same as an unhandled interrupt rather than silently acking it.
        crate::diagnostics::fatal_unhandled_irq(irq, frame);
        return;
    }

    let mut handled = false;
    for slot in crate::arch::interrupts::irq_handlers(irq).into_iter().take(MAX_HANDLERS_PER_IRQ) {
        if let Some(handler) = slot {
            if handler(irq, frame) {
                handled = true;
            }
        }
    }

    if !handled {
        crate::diagnostics::fatal_unhandled_irq(irq, frame);
        return;
    }

    end_of_interrupt(irq);
}
