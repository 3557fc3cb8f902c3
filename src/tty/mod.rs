//! Terminal subsystem: line discipline, ANSI console, and the fixed
//! device table backing `/dev/tty0..tty7` and `/dev/ttyS0..ttyS3`
//! (spec.md §3 `Tty`, §4.H, §6 device-node directory).

pub mod console;
pub mod line_discipline;
pub mod termios;

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::arch::interrupts::CpuRegisterFrame;
use crate::drivers::screen::Screen;
use crate::drivers::serial::{SerialPort, COM1_BASE, COM2_BASE, COM3_BASE, COM4_BASE};
use crate::fs::file::{File, FileOps};
use crate::sync::spinlock::SpinLock;
use crate::syscall::errno::{EINVAL, ENOTTY};
use console::{Console, ConsoleDriver, TtyDriver};
use line_discipline::LineDiscipline;
use termios::Termios;

/// Number of virtual console ttys multiplexed onto the single VGA
/// frame buffer (spec.md §4.H). Only [`ACTIVE_CONSOLE`] actually paints
/// hardware; this core never implements a console-switch syscall, so
/// that index never changes, but the other six still run their own
/// `Console` state machine so the simplification is documented rather
/// than silently absent.
pub const NR_CONSOLE: usize = 7;
/// Number of serial ttys (`/dev/ttyS0..ttyS3`).
pub const NR_SERIAL: usize = 4;

const ACTIVE_CONSOLE: usize = 0;

static CONSOLE_SCREEN: SpinLock<Screen> = SpinLock::new(Screen::new());
static CONSOLE_DRIVER: ConsoleDriver = ConsoleDriver::new(&CONSOLE_SCREEN);

/// A `TtyDriver` that discards everything; backs the inactive virtual
/// consoles so their `Console` state machine still runs without ever
/// touching real VGA hardware.
struct NullDriver;
impl TtyDriver for NullDriver {
    fn output_byte(&self, _byte: u8) {}
    fn put_glyph(&self, _row: usize, _col: usize, _glyph: u8, _attr: u8) {}
    fn set_cursor(&self, _row: usize, _col: usize) {}
    fn set_cursor_shape(&self, _start: u8, _end: u8) {}
}
static NULL_DRIVER: NullDriver = NullDriver;

static SERIAL_PORTS: [SerialPort; NR_SERIAL] = [
    SerialPort::new(COM1_BASE),
    SerialPort::new(COM2_BASE),
    SerialPort::new(COM3_BASE),
    SerialPort::new(COM4_BASE),
];

/// Where a `Tty`'s processed output bytes ultimately land.
enum Output {
    Console(SpinLock<Console>),
    Raw(&'static SerialPort),
}

/// One terminal: line discipline plus termios config plus an output sink
/// (spec.md §3 `Tty`).
pub struct Tty {
    name: &'static str,
    termios: SpinLock<Termios>,
    discipline: LineDiscipline,
    output: Output,
}

impl Tty {
    const fn console(name: &'static str, driver: &'static dyn TtyDriver) -> Self {
        Self {
            name,
            termios: SpinLock::new(Termios::defaults()),
            discipline: LineDiscipline::new(),
            output: Output::Console(SpinLock::new(Console::new(driver))),
        }
    }

    const fn serial(name: &'static str, port: &'static SerialPort) -> Self {
        Self {
            name,
            termios: SpinLock::new(Termios::defaults()),
            discipline: LineDiscipline::new(),
            output: Output::Raw(port),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Applies `OPOST` translation (bare `\n` -> `\r\n` under `ONLCR`,
    /// bare `\r` -> `\n` under `OCRNL`) and pushes the resulting byte(s) to
    /// the output sink.
    fn emit(&self, byte: u8, termios: &Termios) {
        let opost = termios.c_oflag & termios::OPOST != 0;
        if opost && byte == b'\n' && termios.c_oflag & termios::ONLCR != 0 {
            self.sink(b'\r');
            self.sink(b'\n');
            return;
        }
        if opost && byte == b'\r' && termios.c_oflag & termios::OCRNL != 0 {
            self.sink(b'\n');
            return;
        }
        self.sink(byte);
    }

    fn sink(&self, byte: u8) {
        match &self.output {
            Output::Console(console) => console.lock().write_byte(byte),
            Output::Raw(port) => port.output_byte(byte),
        }
    }

    fn echo_byte(&self, byte: u8) {
        // Echo bypasses OPOST (it already traveled through it once, if at
        // all, on the way in); write straight to the sink.
        self.sink(byte);
    }

    /// Lower entry point used by a driver ISR (keyboard, serial RX) to
    /// hand decoded bytes to this tty's line discipline.
    fn recv(&self, bytes: &[u8]) {
        let termios = *self.termios.lock();
        for &byte in bytes {
            self.discipline.recv(byte, &termios, |echo| self.echo_byte(echo));
        }
    }
}

impl FileOps for Tty {
    fn open(&self, _file: &mut File) -> Result<(), i32> {
        Ok(())
    }

    fn close(&self, _file: &mut File) -> Result<(), i32> {
        Ok(())
    }

    fn read(&self, _file: &mut File, buf: &mut [u8]) -> Result<usize, i32> {
        let termios = *self.termios.lock();
        Ok(self.discipline.read(&termios, buf))
    }

    fn write(&self, _file: &mut File, buf: &[u8]) -> Result<usize, i32> {
        let termios = *self.termios.lock();
        for &byte in buf {
            self.emit(byte, &termios);
        }
        Ok(buf.len())
    }

    /// `TCGETS`/`TCSETS` (spec.md §8 scenario 5); `arg` is a pointer to a
    /// [`Termios`] in this single-address-space kernel, dereferenced
    /// directly since there is no separate user/kernel mapping to copy
    /// across.
    fn ioctl(&self, _file: &mut File, cmd: u32, arg: usize) -> Result<i32, i32> {
        match cmd {
            termios::TCGETS => {
                if arg == 0 {
                    return Err(EINVAL);
                }
                // SAFETY: single address space; caller-supplied pointer is
                // trusted the same way every other raw syscall arg is.
                unsafe {
                    *(arg as *mut Termios) = *self.termios.lock();
                }
                Ok(0)
            }
            termios::TCSETS => {
                if arg == 0 {
                    return Err(EINVAL);
                }
                // SAFETY: see above.
                let value = unsafe { *(arg as *const Termios) };
                *self.termios.lock() = value;
                Ok(0)
            }
            _ => Err(ENOTTY),
        }
    }
}

static CONSOLES: [Tty; NR_CONSOLE] = [
    Tty::console("tty1", &CONSOLE_DRIVER),
    Tty::console("tty2", &NULL_DRIVER),
    Tty::console("tty3", &NULL_DRIVER),
    Tty::console("tty4", &NULL_DRIVER),
    Tty::console("tty5", &NULL_DRIVER),
    Tty::console("tty6", &NULL_DRIVER),
    Tty::console("tty7", &NULL_DRIVER),
];

static SERIALS: [Tty; NR_SERIAL] = [
    Tty::serial("ttyS0", &SERIAL_PORTS[0]),
    Tty::serial("ttyS1", &SERIAL_PORTS[1]),
    Tty::serial("ttyS2", &SERIAL_PORTS[2]),
    Tty::serial("ttyS3", &SERIAL_PORTS[3]),
];

/// Index of the console currently receiving keyboard input; `/dev/tty0`
/// is a synthetic alias for whichever console this names (spec.md §6).
static CONTROLLING: AtomicUsize = AtomicUsize::new(ACTIVE_CONSOLE);

pub fn console(index: usize) -> Option<&'static Tty> {
    CONSOLES.get(index)
}

pub fn serial(index: usize) -> Option<&'static Tty> {
    SERIALS.get(index)
}

/// `/dev/tty0`'s target: the controlling console.
pub fn controlling() -> &'static Tty {
    &CONSOLES[CONTROLLING.load(Ordering::Relaxed)]
}

/// Entry point [`crate::drivers::keyboard`] calls with decoded bytes.
pub fn keyboard_recv(bytes: &[u8]) {
    controlling().recv(bytes);
}

/// Major-level driver registered for [`crate::fs::inode::MAJOR_CONSOLE`]:
/// resolves the inode's minor to one of [`CONSOLES`] (or, for the
/// `tty0` alias minor, the controlling console) and rebinds `file.fops`
/// to that specific tty.
pub struct ConsoleFamily;
impl FileOps for ConsoleFamily {
    fn open(&self, file: &mut File) -> Result<(), i32> {
        use crate::fs::inode::inode_by_index;
        let inode = inode_by_index(file.inode_index).ok_or(crate::syscall::errno::ENODEV)?;
        let tty = console(inode.minor() as usize).ok_or(crate::syscall::errno::ENODEV)?;
        file.fops = Some(tty);
        tty.open(file)
    }
}
pub static CONSOLE_FAMILY: ConsoleFamily = ConsoleFamily;

/// Major-level driver registered for [`crate::fs::inode::MAJOR_SERIAL`].
pub struct SerialFamily;
impl FileOps for SerialFamily {
    fn open(&self, file: &mut File) -> Result<(), i32> {
        use crate::fs::inode::inode_by_index;
        let inode = inode_by_index(file.inode_index).ok_or(crate::syscall::errno::ENODEV)?;
        let tty = serial(inode.minor() as usize).ok_or(crate::syscall::errno::ENODEV)?;
        file.fops = Some(tty);
        tty.open(file)
    }
}
pub static SERIAL_FAMILY: SerialFamily = SerialFamily;

/// Lower entry point for the shared COM1/COM3 (IRQ4) and COM2/COM4 (IRQ3)
/// serial RX lines (spec.md §4.H "lower path (recv)... UART ISR"). Each
/// 16550 on the line is drained in turn since a shared IRQ gives no
/// indication of which one actually raised it.
fn serial_irq_handler(irq: u8, _frame: &mut CpuRegisterFrame) -> bool {
    let mut handled = false;
    for (port, tty) in SERIAL_PORTS.iter().zip(SERIALS.iter()) {
        if port.irq() != irq {
            continue;
        }
        while port.has_data() {
            tty.recv(&[port.read_byte()]);
            handled = true;
        }
    }
    handled
}

/// Brings up the active console (clears the screen, resets cursor), the
/// serial ports' hardware with RX interrupts enabled, and registers the
/// shared serial IRQ lines.
pub fn init() {
    CONSOLE_SCREEN.lock().clear();
    for port in &SERIAL_PORTS {
        port.init(true);
    }
    crate::arch::interrupts::register_irq_handler(3, serial_irq_handler);
    crate::arch::interrupts::register_irq_handler(4, serial_irq_handler);
    crate::drivers::pic::unmask(3);
    crate::drivers::pic::unmask(4);
}
