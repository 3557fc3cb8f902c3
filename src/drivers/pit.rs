//! Intel 8253/8254 Programmable Interval Timer: tick source + PC speaker
//! beep (spec.md §4.F).

use core::sync::atomic::{AtomicU64, AtomicU32, Ordering};

use crate::arch::interrupts::CpuRegisterFrame;
use crate::arch::port::PortByte;

const CHANNEL0_PORT: u16 = 0x40;
const CHANNEL2_PORT: u16 = 0x42;
const MODE_COMMAND_PORT: u16 = 0x43;

/// Reference oscillator frequency driving all three PIT channels
/// (spec.md §6).
const PIT_FREQUENCY_HZ: u32 = 1_193_182;

/// Target tick period (spec.md §4.F "QUANTUM_MS~=20 ms (50 Hz)").
pub const QUANTUM_MS: u32 = 20;

const SPEAKER_PORT: u16 = 0x61;
const SPEAKER_GATE_AND_DATA: u8 = 0b11;

/// IRQ line the PIT's channel 0 fires on.
pub const PIT_IRQ: u8 = 0;

const CHANNEL0_MODE_RATE_GENERATOR: u8 = 0b00_11_010_0; // channel 0, lobyte/hibyte, mode 2
const CHANNEL2_MODE_SQUARE_WAVE: u8 = 0b10_11_011_0; // channel 2, lobyte/hibyte, mode 3

static TICKS: AtomicU64 = AtomicU64::new(0);
static SPEAKER_COUNTDOWN: AtomicU32 = AtomicU32::new(0);

fn divisor_for(hz: u32) -> u16 {
    (PIT_FREQUENCY_HZ / hz.max(1)).clamp(1, u16::MAX as u32) as u16
}

/// Programs channel 0 for `QUANTUM_MS` periodic ticks and registers the
/// IRQ0 handler (spec.md §4.F "Channel 0 is programmed to rate-generator
/// mode").
pub fn init() {
    let divisor = divisor_for(1000 / QUANTUM_MS);
    // SAFETY: fixed, always-present legacy timer ports.
    unsafe {
        PortByte::new(MODE_COMMAND_PORT).write(CHANNEL0_MODE_RATE_GENERATOR);
        PortByte::new(CHANNEL0_PORT).write((divisor & 0xFF) as u8);
        PortByte::new(CHANNEL0_PORT).write((divisor >> 8) as u8);
    }
    crate::arch::interrupts::register_irq_handler(PIT_IRQ, handle_tick);
    crate::drivers::pic::unmask(PIT_IRQ);
}

/// Monotonic tick count since [`init`] (spec.md §5 "lock-free monotonic
/// counter").
pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

fn handle_tick(_irq: u8, _frame: &mut CpuRegisterFrame) -> bool {
    TICKS.fetch_add(1, Ordering::Relaxed);

    if SPEAKER_COUNTDOWN.load(Ordering::Relaxed) > 0 {
        if SPEAKER_COUNTDOWN.fetch_sub(1, Ordering::Relaxed) == 1 {
            silence_speaker();
        }
    }

    true
}

fn silence_speaker() {
    // SAFETY: port 0x61 is the always-present PC speaker gate register.
    unsafe {
        let port = PortByte::new(SPEAKER_PORT);
        let value = port.read();
        port.write(value & !SPEAKER_GATE_AND_DATA);
    }
}

/// Sounds the PC speaker at `hz` for `ms`, non-blocking: programs channel
/// 2 and a tick countdown, then returns immediately. Requires interrupts
/// enabled for the countdown to ever reach zero (spec.md §4.F).
pub fn beep(hz: u32, ms: u32) {
    let divisor = divisor_for(hz);
    // SAFETY: fixed, always-present legacy timer/speaker ports.
    unsafe {
        PortByte::new(MODE_COMMAND_PORT).write(CHANNEL2_MODE_SQUARE_WAVE);
        PortByte::new(CHANNEL2_PORT).write((divisor & 0xFF) as u8);
        PortByte::new(CHANNEL2_PORT).write((divisor >> 8) as u8);

        let port = PortByte::new(SPEAKER_PORT);
        let value = port.read();
        port.write(value | SPEAKER_GATE_AND_DATA);
    }

    let countdown = (ms + QUANTUM_MS - 1) / QUANTUM_MS;
    SPEAKER_COUNTDOWN.store(countdown.max(1), Ordering::Relaxed);
}
