//! 16550-style serial UART driver (spec.md §3 `Tty` low-level driver,
//! §6 "Serial UART (16550)").
//!
//! Two things live here: the always-on debug serial sink
//! ([`init`]/[`debug_print`]) that [`crate::logging`] mirrors every line
//! to, and [`SerialPort`], the generic per-COM-port driver backing
//! `/dev/ttyS0..ttyS3`. Both ultimately talk to the same 16550 register
//! layout; `/dev/ttyS0` and the debug sink happen to share COM1's wire,
//! same as a real system's serial console doubling as its kernel log.

use core::fmt;

use crate::arch::port::PortByte;

/// Standard COM1..COM4 I/O bases (spec.md §6).
pub const COM1_BASE: u16 = 0x3F8;
pub const COM2_BASE: u16 = 0x2F8;
pub const COM3_BASE: u16 = 0x3E8;
pub const COM4_BASE: u16 = 0x2E8;

/// IRQ line COM1/COM3 share; COM2/COM4 share IRQ3.
pub fn irq_for_base(base: u16) -> u8 {
    match base {
        COM1_BASE | COM3_BASE => 4,
        _ => 3,
    }
}

const DATA_REGISTER: u16 = 0;
const INTERRUPT_ENABLE: u16 = 1;
const FIFO_CONTROL: u16 = 2;
const LINE_CONTROL: u16 = 3;
const MODEM_CONTROL: u16 = 4;
const LINE_STATUS: u16 = 5;

const LINE_STATUS_DATA_READY: u8 = 0x01;
const LINE_STATUS_THRE: u8 = 0x20;

const IER_RX_AVAILABLE: u8 = 0x01;

/// A single 16550-compatible UART at a fixed I/O base.
pub struct SerialPort {
    base_port: u16,
}

impl SerialPort {
    pub const fn new(base_port: u16) -> Self {
        Self { base_port }
    }

    /// 115200 8N1, FIFO enabled. `enable_rx_irq` additionally unmasks the
    /// "data available" interrupt so an ISR can drive `/dev/ttyS*`;
    /// the debug-only sink leaves it off and polls instead.
    pub fn init(&self, enable_rx_irq: bool) {
        // SAFETY: fixed, always-present legacy UART I/O ports.
        unsafe {
            let interrupt_enable = PortByte::new(self.base_port + INTERRUPT_ENABLE);
            let fifo_control = PortByte::new(self.base_port + FIFO_CONTROL);
            let line_control = PortByte::new(self.base_port + LINE_CONTROL);
            let modem_control = PortByte::new(self.base_port + MODEM_CONTROL);

            interrupt_enable.write(0x00);

            line_control.write(0x80);
            PortByte::new(self.base_port + DATA_REGISTER).write(0x01);
            PortByte::new(self.base_port + INTERRUPT_ENABLE).write(0x00);

            line_control.write(0x03);
            fifo_control.write(0xC7);
            modem_control.write(0x0B);

            interrupt_enable.write(if enable_rx_irq { IER_RX_AVAILABLE } else { 0x00 });
        }
    }

    fn is_transmit_empty(&self) -> bool {
        // SAFETY: reading the line status register has no side effects
        // beyond clearing pending status the hardware documents.
        unsafe { (PortByte::new(self.base_port + LINE_STATUS).read() & LINE_STATUS_THRE) != 0 }
    }

    /// True if a received byte is waiting in the UART's RX register
    /// (checked by the IRQ handler before reading it).
    pub fn has_data(&self) -> bool {
        // SAFETY: see `is_transmit_empty`.
        unsafe { (PortByte::new(self.base_port + LINE_STATUS).read() & LINE_STATUS_DATA_READY) != 0 }
    }

    /// Reads one received byte. Callers should check [`Self::has_data`]
    /// first; called from IRQ context this never blocks.
    pub fn read_byte(&self) -> u8 {
        // SAFETY: always-present UART data register.
        unsafe { PortByte::new(self.base_port + DATA_REGISTER).read() }
    }

    /// The IRQ line this port's RX/TX interrupt fires on.
    pub fn irq(&self) -> u8 {
        irq_for_base(self.base_port)
    }

    pub fn write_byte(&self, byte: u8) {
        while !self.is_transmit_empty() {
            core::hint::spin_loop();
        }
        // SAFETY: transmit holding register is confirmed empty above.
        unsafe {
            PortByte::new(self.base_port + DATA_REGISTER).write(byte);
        }
    }

    pub fn write_str_raw(&self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
    }
}

impl fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        SerialPort::write_str_raw(self, s);
        Ok(())
    }
}

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

struct DebugSerial {
    serial: UnsafeCell<SerialPort>,
    initialized: AtomicBool,
}

// SAFETY: single-threaded kernel; `initialized` gates use before `init`.
unsafe impl Sync for DebugSerial {}

static DEBUG_SERIAL: DebugSerial = DebugSerial {
    serial: UnsafeCell::new(SerialPort::new(COM1_BASE)),
    initialized: AtomicBool::new(false),
};

/// Initializes the always-on debug serial sink (polling, no RX interrupt;
/// the full interrupt-driven `/dev/ttyS0` driver is brought up later by
/// `crate::tty` once the line discipline exists to receive into).
pub fn init() {
    // SAFETY: boot-time singleton, single writer.
    unsafe {
        (*DEBUG_SERIAL.serial.get()).init(false);
    }
    DEBUG_SERIAL.initialized.store(true, Ordering::Release);
}

#[doc(hidden)]
pub fn debug_print(args: fmt::Arguments) {
    use fmt::Write;
    if DEBUG_SERIAL.initialized.load(Ordering::Acquire) {
        // SAFETY: single-threaded kernel; writes never overlap because
        // interrupts that might also log are masked around their own
        // critical sections (spec.md §5).
        unsafe {
            let _ = (*DEBUG_SERIAL.serial.get()).write_fmt(args);
        }
    }
}
