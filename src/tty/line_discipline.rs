//! Canonical/raw input processing between a driver's `recv` and a reader's
//! `read` (spec.md §3 `LineDiscipline`, §4.H).
//!
//! There is no scheduler on this core, so a blocking canonical read is a
//! spin-poll on `lines_ready` rather than a wait queue (spec.md §9 Open
//! Question: "blocking read is spin-poll only because there is no
//! scheduler"). Interrupts are masked around every ring access so the
//! IRQ1 `recv` path and a `read()` call never interleave a partial
//! line (spec.md §5 "the reader masks the interrupt around the read").

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::arch::cpu;
use crate::sync::ringbuffer::RingBuffer;
use crate::tty::termios::{self, Termios};

/// Input ring capacity; generous relative to a single 80-column line
/// (spec.md doesn't size this, so it's picked to hold a handful of
/// in-flight lines without ever growing).
pub const INPUT_RING_SIZE: usize = 1024;

/// Line discipline state owned by each [`crate::tty::Tty`]. Upper calls
/// (`read`/`write`/`ioctl`) are driven by syscalls; lower calls (`recv`)
/// are driven by the keyboard or serial RX interrupt handler.
pub struct LineDiscipline {
    input: RingBuffer<INPUT_RING_SIZE>,
    /// Number of complete lines currently buffered in `input`, in
    /// canonical mode. Incremented by `recv` on a line terminator,
    /// decremented by `read` once it has drained a full line.
    lines_ready: AtomicUsize,
}

impl LineDiscipline {
    pub const fn new() -> Self {
        Self {
            input: RingBuffer::new(),
            lines_ready: AtomicUsize::new(0),
        }
    }

    /// Lower entry point: one decoded input byte arriving from a driver
    /// (spec.md §4.G keyboard decoder, or a serial RX interrupt).
    ///
    /// `echo` is the tty's configured output sink (only `Some` when
    /// `ECHO` is set in `termios.c_lflag`); echoing happens here so a
    /// canonical-mode backspace can erase the byte just echoed.
    pub fn recv(&self, byte: u8, termios: &Termios, mut echo: impl FnMut(u8)) {
        let canonical = termios.c_lflag & termios::ICANON != 0;
        let do_echo = termios.c_lflag & termios::ECHO != 0;
        let echo_ctl = termios.c_lflag & termios::ECHOCTL != 0;

        let erase = termios.c_cc[termios::VERASE];
        let eof = termios.c_cc[termios::VEOF];
        let intr = termios.c_cc[termios::VINTR];

        if canonical && byte == erase {
            let without_interrupts = cpu::save_interrupts();
            let erased = self.input.erase();
            cpu::restore_interrupts(without_interrupts);
            if erased.is_some() && do_echo {
                echo(0x08);
                echo(b' ');
                echo(0x08);
            }
            return;
        }

        if byte == intr {
            if do_echo && echo_ctl {
                echo(b'^');
                echo(b'C');
            }
            return;
        }

        if byte == b'\r' && termios.c_iflag & termios::IGNCR != 0 {
            return;
        }

        let translated = if byte == b'\r' && termios.c_iflag & termios::ICRNL != 0 {
            b'\n'
        } else if byte == b'\n' && termios.c_iflag & termios::INLCR != 0 {
            b'\r'
        } else {
            byte
        };

        let is_line_end = canonical && (translated == b'\n' || byte == eof);

        let without_interrupts = cpu::save_interrupts();
        let stored = self.input.put(translated);
        if stored && is_line_end {
            self.lines_ready.fetch_add(1, Ordering::Release);
        }
        cpu::restore_interrupts(without_interrupts);

        if stored && do_echo {
            if translated.is_ascii_control() && echo_ctl && translated != b'\n' {
                echo(b'^');
                echo(translated ^ 0x40);
            } else {
                echo(translated);
            }
        }
    }

    /// Upper entry point: a `read()` syscall draining decoded bytes.
    /// In canonical mode this spins until a full line is available; in
    /// raw mode it returns whatever is already buffered (possibly 0
    /// bytes) without waiting.
    pub fn read(&self, termios: &Termios, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        let canonical = termios.c_lflag & termios::ICANON != 0;
        let eof = termios.c_cc[termios::VEOF];

        if canonical {
            while self.lines_ready.load(Ordering::Acquire) == 0 {
                core::hint::spin_loop();
            }
        }

        let mut n = 0;
        let mut line_ended = false;
        while n < buf.len() {
            let without_interrupts = cpu::save_interrupts();
            let next = self.input.get();
            cpu::restore_interrupts(without_interrupts);
            let Some(byte) = next else { break };
            // VEOF terminates the read without being delivered as data
            // (spec.md §4.H "lower path (recv)... VEOF terminates the
            // current read").
            if canonical && byte == eof {
                line_ended = true;
                break;
            }
            buf[n] = byte;
            n += 1;
            if canonical && byte == b'\n' {
                line_ended = true;
                break;
            }
        }
        if canonical && line_ended {
            self.lines_ready.fetch_sub(1, Ordering::AcqRel);
        }
        n
    }

    /// Bytes currently queued, for `FIONREAD`-style introspection.
    pub fn input_len(&self) -> usize {
        self.input.len()
    }
}

impl Default for LineDiscipline {
    fn default() -> Self {
        Self::new()
    }
}
