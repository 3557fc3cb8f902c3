//! ECMA-48/ANSI output processor: turns a byte stream into VGA cell
//! writes, cursor moves, and SGR attribute changes (spec.md §4.H
//! "Console escape parser").
//!
//! State machine: `Normal` accumulates printable bytes straight to the
//! driver; `0x1B` enters `Escape`; `[` enters `Csi`, which collects
//! up to [`MAX_CSI_PARAMS`] numeric parameters before a final byte
//! dispatches the command. Anything that doesn't fit a recognized
//! sequence is dropped silently, matching how a real terminal ignores
//! unknown escapes rather than corrupting the visible buffer.

use crate::drivers::screen::{Color, Screen};
use crate::sync::spinlock::SpinLock;

const NR_COLS: usize = 80;
const NR_ROWS: usize = 25;
const MAX_CSI_PARAMS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Normal,
    Escape,
    Csi,
}

/// Low-level sink a [`Console`] renders onto: a VGA-backed display or a
/// serial line both implement this (spec.md §4.H's "VGA back end" and
/// the serial ports share one console/ANSI layer above them).
pub trait TtyDriver: Sync {
    fn output_byte(&self, byte: u8);
    fn put_glyph(&self, row: usize, col: usize, glyph: u8, attr: u8);
    fn set_cursor(&self, row: usize, col: usize);
    fn set_cursor_shape(&self, start: u8, end: u8);
}

/// A VGA-backed console: one of [`crate::tty::NR_CONSOLE`] logical
/// screens sharing the single physical adapter. Only the active index
/// actually writes through to hardware; inactive ones still track
/// cursor/attribute state so switching to them later is exact (no
/// console-switch syscall exists yet, so `is_active` is always `true`
/// for the single console wired up in [`crate::tty::init`]).
pub struct ConsoleDriver {
    screen: &'static SpinLock<Screen>,
}

impl ConsoleDriver {
    pub const fn new(screen: &'static SpinLock<Screen>) -> Self {
        Self { screen }
    }
}

impl TtyDriver for ConsoleDriver {
    fn output_byte(&self, byte: u8) {
        self.screen.lock().print_char(byte);
    }

    fn put_glyph(&self, row: usize, col: usize, glyph: u8, attr: u8) {
        self.screen.lock().put_glyph(row, col, glyph, attr);
    }

    fn set_cursor(&self, row: usize, col: usize) {
        self.screen.lock().set_cursor(row, col);
    }

    fn set_cursor_shape(&self, start: u8, end: u8) {
        self.screen.lock().set_cursor_shape(start, end);
    }
}

/// A serial line used as a tty (`/dev/ttyS0..ttyS3`): no addressable
/// cursor or glyph grid, so those calls are no-ops and only `output_byte`
/// does anything.
impl TtyDriver for crate::drivers::serial::SerialPort {
    fn output_byte(&self, byte: u8) {
        self.write_byte(byte);
    }

    fn put_glyph(&self, _row: usize, _col: usize, _glyph: u8, _attr: u8) {}
    fn set_cursor(&self, _row: usize, _col: usize) {}
    fn set_cursor_shape(&self, _start: u8, _end: u8) {}
}

fn vga_attr(fg: Color, bg: Color, bold: bool) -> u8 {
    let fg_bits = fg as u8 | if bold { 0x08 } else { 0 };
    (bg as u8) << 4 | fg_bits
}

/// One logical screen's ANSI/ECMA-48 engine: cursor position, current
/// SGR attribute, and the escape-sequence parser state.
pub struct Console {
    driver: &'static dyn TtyDriver,
    row: usize,
    col: usize,
    fg: Color,
    bg: Color,
    bold: bool,
    /// Cursor position saved by DECSC (`ESC 7`), restored by DECRC
    /// (`ESC 8`).
    saved: Option<(usize, usize)>,
    state: ParserState,
    params: [u32; MAX_CSI_PARAMS],
    param_count: usize,
    /// Set when a `?` private-marker byte precedes the CSI parameters
    /// (spec.md names "blink enable/disable" without giving exact
    /// bytes; this core resolves it as a DEC-private-mode-style
    /// sequence, `CSI ? 5 h`/`CSI ? 5 l`, the same shape xterm uses for
    /// its private modes).
    private: bool,
    tabstops: [bool; NR_COLS],
}

const DEFAULT_FG: Color = Color::LightGray;
const DEFAULT_BG: Color = Color::Black;

impl Console {
    pub const fn new(driver: &'static dyn TtyDriver) -> Self {
        let mut tabstops = [false; NR_COLS];
        let mut i = 0;
        while i < NR_COLS {
            tabstops[i] = i % 8 == 0;
            i += 1;
        }
        Self {
            driver,
            row: 0,
            col: 0,
            fg: DEFAULT_FG,
            bg: DEFAULT_BG,
            bold: false,
            saved: None,
            state: ParserState::Normal,
            params: [0; MAX_CSI_PARAMS],
            param_count: 0,
            private: false,
            tabstops,
        }
    }

    /// Feeds one output byte through the escape-sequence parser.
    pub fn write_byte(&mut self, byte: u8) {
        match self.state {
            ParserState::Normal => self.write_normal(byte),
            ParserState::Escape => self.write_escape(byte),
            ParserState::Csi => self.write_csi(byte),
        }
    }

    fn write_normal(&mut self, byte: u8) {
        match byte {
            0x1B => {
                self.state = ParserState::Escape;
            }
            b'\n' => self.newline(),
            b'\r' => self.col = 0,
            0x08 => self.backspace(),
            b'\t' => self.tab(),
            _ => self.put_printable(byte),
        }
    }

    fn write_escape(&mut self, byte: u8) {
        match byte {
            b'[' => {
                self.state = ParserState::Csi;
                self.params = [0; MAX_CSI_PARAMS];
                self.param_count = 0;
                self.private = false;
            }
            b'7' => {
                self.saved = Some((self.row, self.col));
                self.state = ParserState::Normal;
            }
            b'8' => {
                if let Some((row, col)) = self.saved {
                    self.row = row;
                    self.col = col;
                    self.sync_cursor();
                }
                self.state = ParserState::Normal;
            }
            b'H' => {
                self.set_tabstop(self.col, true);
                self.state = ParserState::Normal;
            }
            _ => self.state = ParserState::Normal,
        }
    }

    fn write_csi(&mut self, byte: u8) {
        match byte {
            b'?' if self.param_count == 0 => self.private = true,
            b'0'..=b'9' => {
                if let Some(slot) = self.params.get_mut(self.param_count) {
                    *slot = slot.saturating_mul(10).saturating_add((byte - b'0') as u32);
                }
            }
            b';' => {
                if self.param_count + 1 < MAX_CSI_PARAMS {
                    self.param_count += 1;
                }
            }
            _ => {
                if self.param_count < MAX_CSI_PARAMS {
                    self.param_count += 1;
                }
                self.dispatch_csi(byte);
                self.state = ParserState::Normal;
            }
        }
    }

    fn param(&self, index: usize) -> u32 {
        self.params.get(index).copied().unwrap_or(0)
    }

    fn param_or(&self, index: usize, default: u32) -> u32 {
        let value = self.param(index);
        if value == 0 { default } else { value }
    }

    fn dispatch_csi(&mut self, final_byte: u8) {
        match final_byte {
            b'A' => self.row = self.row.saturating_sub(self.param_or(0, 1) as usize),
            b'B' => self.row = (self.row + self.param_or(0, 1) as usize).min(NR_ROWS - 1),
            b'C' => self.col = (self.col + self.param_or(0, 1) as usize).min(NR_COLS - 1),
            b'D' => self.col = self.col.saturating_sub(self.param_or(0, 1) as usize),
            b'H' | b'f' => {
                self.row = self.param_or(0, 1).saturating_sub(1) as usize % NR_ROWS;
                self.col = self.param_or(1, 1).saturating_sub(1) as usize % NR_COLS;
            }
            b'J' => self.erase_display(self.param(0)),
            b'K' => self.erase_line(self.param(0)),
            b'g' => {
                match self.param(0) {
                    0 => self.set_tabstop(self.col, false),
                    3 => self.tabstops = [false; NR_COLS],
                    _ => {}
                }
            }
            b'm' => self.apply_sgr(),
            b'h' | b'l' if self.private => self.apply_private_mode(final_byte == b'h'),
            _ => {}
        }
        self.sync_cursor();
    }

    fn apply_private_mode(&mut self, enable: bool) {
        // `CSI ? 5 h`/`CSI ? 5 l`: blink enable/disable (spec.md §4.H),
        // routed straight to the VGA attribute controller.
        if self.param(0) == 5 {
            self.driver.set_cursor_shape(if enable { 0x0D } else { 0x0E }, 0x0F);
        }
    }

    fn apply_sgr(&mut self) {
        if self.param_count == 0 {
            self.reset_sgr();
            return;
        }
        for i in 0..self.param_count {
            match self.param(i) {
                0 => self.reset_sgr(),
                1 => self.bold = true,
                22 => self.bold = false,
                30..=37 => self.fg = Color::from_ansi((self.param(i) - 30) as u8),
                90..=97 => self.fg = Color::from_ansi((self.param(i) - 90) as u8 + 8),
                40..=47 => self.bg = Color::from_ansi((self.param(i) - 40) as u8),
                100..=107 => self.bg = Color::from_ansi((self.param(i) - 100) as u8 + 8),
                _ => {}
            }
        }
    }

    fn reset_sgr(&mut self) {
        self.fg = DEFAULT_FG;
        self.bg = DEFAULT_BG;
        self.bold = false;
    }

    fn erase_display(&mut self, mode: u32) {
        let attr = vga_attr(self.fg, self.bg, self.bold);
        let (start, end) = match mode {
            1 => (0, self.row * NR_COLS + self.col),
            2 | 3 => (0, NR_ROWS * NR_COLS),
            _ => (self.row * NR_COLS + self.col, NR_ROWS * NR_COLS),
        };
        for cell in start..end {
            self.driver.put_glyph(cell / NR_COLS, cell % NR_COLS, b' ', attr);
        }
    }

    fn erase_line(&mut self, mode: u32) {
        let attr = vga_attr(self.fg, self.bg, self.bold);
        let (start, end) = match mode {
            1 => (0, self.col),
            2 => (0, NR_COLS),
            _ => (self.col, NR_COLS),
        };
        for col in start..end {
            self.driver.put_glyph(self.row, col, b' ', attr);
        }
    }

    fn set_tabstop(&mut self, col: usize, set: bool) {
        if let Some(slot) = self.tabstops.get_mut(col) {
            *slot = set;
        }
    }

    fn tab(&mut self) {
        let next = (self.col + 1..NR_COLS).find(|&c| self.tabstops[c]);
        self.col = next.unwrap_or(NR_COLS - 1);
        self.sync_cursor();
    }

    fn backspace(&mut self) {
        if self.col > 0 {
            self.col -= 1;
        }
        self.sync_cursor();
    }

    fn newline(&mut self) {
        self.col = 0;
        if self.row + 1 < NR_ROWS {
            self.row += 1;
        } else {
            self.row = NR_ROWS - 1;
        }
        self.sync_cursor();
    }

    fn put_printable(&mut self, byte: u8) {
        let attr = vga_attr(self.fg, self.bg, self.bold);
        self.driver.put_glyph(self.row, self.col, byte, attr);
        self.col += 1;
        if self.col >= NR_COLS {
            self.newline();
        } else {
            self.sync_cursor();
        }
    }

    fn sync_cursor(&self) {
        self.driver.set_cursor(self.row, self.col);
    }
}
