//! MC146818 CMOS real-time clock (spec.md §1 "real-time clock",
//! §4.I device-node directory "/dev/rtc").
//!
//! No IRQ8 periodic-interrupt support; `/dev/rtc` here is read-only and
//! polls the CMOS registers directly, matching the kernel's single
//! polling read per `read()` call rather than the update-ended-interrupt
//! model a fuller driver would offer.

use crate::arch::port::PortByte;
use crate::fs::file::{File, FileOps};
use crate::syscall::errno::EINVAL;

const CMOS_ADDRESS: u16 = 0x70;
const CMOS_DATA: u16 = 0x71;

const REG_SECONDS: u8 = 0x00;
const REG_MINUTES: u8 = 0x02;
const REG_HOURS: u8 = 0x04;
const REG_DAY: u8 = 0x07;
const REG_MONTH: u8 = 0x08;
const REG_YEAR: u8 = 0x09;
const REG_STATUS_A: u8 = 0x0A;
const REG_STATUS_B: u8 = 0x0B;

const STATUS_A_UPDATE_IN_PROGRESS: u8 = 0x80;
const STATUS_B_BINARY_MODE: u8 = 0x04;
const STATUS_B_24_HOUR: u8 = 0x02;

/// Wall-clock snapshot as read from CMOS, already normalized to binary
/// (not BCD) and 24-hour form.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct RtcTime {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub day: u8,
    pub month: u8,
    /// Two-digit year as stored by the CMOS (no century register on this
    /// class of hardware); callers add the epoch base themselves.
    pub year: u8,
}

fn read_register(reg: u8) -> u8 {
    // SAFETY: CMOS index/data port pair, always present on PC-class
    // hardware; bit 7 of the address byte (NMI disable) is left clear.
    unsafe {
        PortByte::new(CMOS_ADDRESS).write(reg);
        PortByte::new(CMOS_DATA).read()
    }
}

fn update_in_progress() -> bool {
    read_register(REG_STATUS_A) & STATUS_A_UPDATE_IN_PROGRESS != 0
}

fn bcd_to_bin(value: u8) -> u8 {
    (value & 0x0F) + ((value >> 4) * 10)
}

/// Reads the current time, retrying until two consecutive samples agree
/// (guards against tearing across the periodic CMOS update).
pub fn read_time() -> RtcTime {
    loop {
        while update_in_progress() {
            core::hint::spin_loop();
        }
        let first = read_raw();
        while update_in_progress() {
            core::hint::spin_loop();
        }
        let second = read_raw();
        if fields_equal(&first, &second) {
            return normalize(first);
        }
    }
}

fn fields_equal(a: &RtcTime, b: &RtcTime) -> bool {
    a.seconds == b.seconds
        && a.minutes == b.minutes
        && a.hours == b.hours
        && a.day == b.day
        && a.month == b.month
        && a.year == b.year
}

fn read_raw() -> RtcTime {
    RtcTime {
        seconds: read_register(REG_SECONDS),
        minutes: read_register(REG_MINUTES),
        hours: read_register(REG_HOURS),
        day: read_register(REG_DAY),
        month: read_register(REG_MONTH),
        year: read_register(REG_YEAR),
    }
}

fn normalize(raw: RtcTime) -> RtcTime {
    let status_b = read_register(REG_STATUS_B);
    let binary = status_b & STATUS_B_BINARY_MODE != 0;
    let is_24h = status_b & STATUS_B_24_HOUR != 0;

    let mut time = if binary {
        raw
    } else {
        RtcTime {
            seconds: bcd_to_bin(raw.seconds),
            minutes: bcd_to_bin(raw.minutes),
            hours: bcd_to_bin(raw.hours & 0x7F),
            day: bcd_to_bin(raw.day),
            month: bcd_to_bin(raw.month),
            year: bcd_to_bin(raw.year),
        }
    };

    if !is_24h && raw.hours & 0x80 != 0 {
        time.hours = (time.hours % 12) + 12;
    }
    time
}

/// `/dev/rtc`'s `FileOps`: `read` fills the caller's buffer with one
/// [`RtcTime`] (6 bytes, field order as declared) and reports that many
/// bytes read, same as writing a fixed-size record.
pub struct RtcDevice;

impl FileOps for RtcDevice {
    fn open(&self, _file: &mut File) -> Result<(), i32> {
        Ok(())
    }

    fn read(&self, _file: &mut File, buf: &mut [u8]) -> Result<usize, i32> {
        const RECORD_LEN: usize = core::mem::size_of::<RtcTime>();
        if buf.len() < RECORD_LEN {
            return Err(EINVAL);
        }
        let time = read_time();
        buf[0] = time.seconds;
        buf[1] = time.minutes;
        buf[2] = time.hours;
        buf[3] = time.day;
        buf[4] = time.month;
        buf[5] = time.year;
        Ok(RECORD_LEN)
    }
}

pub static RTC_DEVICE: RtcDevice = RtcDevice;
