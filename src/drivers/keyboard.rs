//! PS/2 keyboard scancode decoder (spec.md §4.G "Keyboard ISR").
//!
//! Runs entirely inside the IRQ1 handler: read one scancode byte, feed it
//! through the make/break + modifier state machine, and hand the decoded
//! byte(s) to the controlling TTY's line discipline via its lower `recv`
//! entry point (spec.md §3 `LineDiscipline`). No bottom half / deferred
//! work queue exists in this single-task core.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::arch::interrupts::CpuRegisterFrame;
use crate::drivers::ps2;

/// IRQ line the keyboard controller's port 1 fires on.
pub const KEYBOARD_IRQ: u8 = 1;

/// How scancodes are translated before reaching the line discipline
/// (spec.md §4.G "three modes: raw passthrough, medium-raw = VK codes,
/// cooked = ASCII sequences").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyboardMode {
    /// Deliver the raw scancode byte untranslated.
    Raw = 0,
    /// Deliver a stable virtual-key code (make code with the 0x80 break
    /// bit always clear, extended-prefix folded into the VK space).
    MediumRaw = 1,
    /// Deliver ASCII, applying shift/caps-lock, with special keys turned
    /// into ANSI escape sequences (spec.md "optionally convert to an
    /// escape sequence for function/arrow/lock keys").
    Cooked = 2,
}

const EXTENDED_PREFIX: u8 = 0xE0;
const BREAK_BIT: u8 = 0x80;

const SC_LEFT_SHIFT: u8 = 0x2A;
const SC_RIGHT_SHIFT: u8 = 0x36;
const SC_LEFT_CTRL: u8 = 0x1D;
const SC_CAPS_LOCK: u8 = 0x3A;

const SC_UP: u8 = 0x48;
const SC_DOWN: u8 = 0x50;
const SC_RIGHT: u8 = 0x4D;
const SC_LEFT: u8 = 0x4B;
const SC_HOME: u8 = 0x47;
const SC_END: u8 = 0x4F;
const SC_DELETE: u8 = 0x53;

const SCANCODE_TABLE_LEN: usize = 0x59;

const SCANCODES_LOWER: [u8; SCANCODE_TABLE_LEN] = [
    0, 0, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 0x08, b'\t',
    b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', b'\n', 0, b'a', b's',
    b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`', 0, b'\\', b'z', b'x', b'c', b'v',
    b'b', b'n', b'm', b',', b'.', b'/', 0, b'*', 0, b' ', 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0,
];

const SCANCODES_UPPER: [u8; SCANCODE_TABLE_LEN] = [
    0, 0, b'!', b'@', b'#', b'$', b'%', b'^', b'&', b'*', b'(', b')', b'_', b'+', 0x08, b'\t',
    b'Q', b'W', b'E', b'R', b'T', b'Y', b'U', b'I', b'O', b'P', b'{', b'}', b'\n', 0, b'A', b'S',
    b'D', b'F', b'G', b'H', b'J', b'K', b'L', b':', b'"', b'~', 0, b'|', b'Z', b'X', b'C', b'V',
    b'B', b'N', b'M', b'<', b'>', b'?', 0, b'*', 0, b' ', 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0,
];

fn is_alpha(code: u8) -> bool {
    matches!(
        code,
        0x10..=0x19 | 0x1e..=0x26 | 0x2c..=0x32
    )
}

struct KeyState {
    shift: bool,
    caps_lock: bool,
    ctrl: bool,
    pending_extended: bool,
}

static MODE: AtomicU8 = AtomicU8::new(KeyboardMode::Cooked as u8);
static STATE: spin_cell::Cell<KeyState> = spin_cell::Cell::new(KeyState {
    shift: false,
    caps_lock: false,
    ctrl: false,
    pending_extended: false,
});

/// A tiny single-field `UnsafeCell` wrapper so `STATE` doesn't need to pull
/// in `crate::sync::spinlock` for a word this ISR-only module already
/// serializes by construction (the PIC never re-enters IRQ1 while it is
/// being handled).
mod spin_cell {
    use core::cell::UnsafeCell;

    pub struct Cell<T> {
        inner: UnsafeCell<T>,
    }

    impl<T> Cell<T> {
        pub const fn new(value: T) -> Self {
            Self { inner: UnsafeCell::new(value) }
        }

        pub fn get_mut(&self) -> &mut T {
            // SAFETY: only ever called from the IRQ1 handler, which the PIC
            // never re-enters concurrently with itself.
            unsafe { &mut *self.inner.get() }
        }
    }

    unsafe impl<T> Sync for Cell<T> {}
}

pub fn set_mode(mode: KeyboardMode) {
    MODE.store(mode as u8, Ordering::Relaxed);
}

pub fn mode() -> KeyboardMode {
    match MODE.load(Ordering::Relaxed) {
        0 => KeyboardMode::Raw,
        1 => KeyboardMode::MediumRaw,
        _ => KeyboardMode::Cooked,
    }
}

/// Registers the IRQ1 handler. Must run after [`ps2::init`].
pub fn init() {
    crate::arch::interrupts::register_irq_handler(KEYBOARD_IRQ, handle_irq);
    crate::drivers::pic::unmask(KEYBOARD_IRQ);
}

fn handle_irq(_irq: u8, _frame: &mut CpuRegisterFrame) -> bool {
    if !ps2::output_buffer_full() {
        return false;
    }

    let code = ps2::read_output();
    let state = STATE.get_mut();

    if code == EXTENDED_PREFIX {
        state.pending_extended = true;
        return true;
    }
    let extended = core::mem::take(&mut state.pending_extended);

    let is_break = code & BREAK_BIT != 0;
    let plain = code & !BREAK_BIT;

    match mode() {
        KeyboardMode::Raw => {
            let mut bytes = [0u8; 2];
            let mut len = 0;
            if extended {
                bytes[len] = EXTENDED_PREFIX;
                len += 1;
            }
            bytes[len] = code;
            len += 1;
            deliver(&bytes[..len]);
            return true;
        }
        KeyboardMode::MediumRaw => {
            update_modifiers(state, plain, is_break, extended);
            deliver(&[plain]);
            return true;
        }
        KeyboardMode::Cooked => {}
    }

    update_modifiers(state, plain, is_break, extended);
    if is_break || matches!(plain, SC_LEFT_SHIFT | SC_RIGHT_SHIFT | SC_LEFT_CTRL | SC_CAPS_LOCK) {
        return true;
    }

    if extended {
        if let Some(seq) = extended_escape_sequence(plain) {
            deliver(seq);
        }
        return true;
    }

    let use_upper = if is_alpha(plain) {
        state.shift ^ state.caps_lock
    } else {
        state.shift
    };
    let table = if use_upper { &SCANCODES_UPPER } else { &SCANCODES_LOWER };

    let Some(&ascii) = table.get(plain as usize) else {
        return true;
    };
    if ascii == 0 {
        return true;
    }

    if state.ctrl && ascii.is_ascii_alphabetic() {
        deliver(&[ascii.to_ascii_uppercase() & 0x1F]);
    } else {
        deliver(&[ascii]);
    }
    true
}

fn update_modifiers(state: &mut KeyState, plain: u8, is_break: bool, extended: bool) {
    match plain {
        SC_LEFT_SHIFT | SC_RIGHT_SHIFT => state.shift = !is_break,
        SC_LEFT_CTRL if !extended => state.ctrl = !is_break,
        SC_CAPS_LOCK if !is_break => state.caps_lock = !state.caps_lock,
        _ => {}
    }
}

/// ANSI escape sequences for the extended-prefixed navigation keys
/// (spec.md §4.G "convert to an escape sequence for function/arrow/lock
/// keys"; the console's CSI parser in [`crate::tty::console`] is what
/// these round-trip through on loopback/echo).
fn extended_escape_sequence(plain: u8) -> Option<&'static [u8]> {
    Some(match plain {
        SC_UP => b"\x1b[A",
        SC_DOWN => b"\x1b[B",
        SC_RIGHT => b"\x1b[C",
        SC_LEFT => b"\x1b[D",
        SC_HOME => b"\x1b[H",
        SC_END => b"\x1b[F",
        SC_DELETE => b"\x1b[3~",
        _ => return None,
    })
}

fn deliver(bytes: &[u8]) {
    crate::tty::keyboard_recv(bytes);
}
