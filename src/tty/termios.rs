//! Line-discipline configuration (spec.md §3 `Termios`).

/// Number of entries in the control-character array.
pub const NCCS: usize = 8;

pub const VINTR: usize = 0;
pub const VEOF: usize = 1;
pub const VERASE: usize = 2;

// -- input flags (c_iflag) --
pub const ICRNL: u32 = 1 << 0;
pub const INLCR: u32 = 1 << 1;
pub const IGNCR: u32 = 1 << 2;
pub const IXON: u32 = 1 << 3;
pub const IXOFF: u32 = 1 << 4;

// -- output flags (c_oflag) --
pub const OPOST: u32 = 1 << 0;
pub const OCRNL: u32 = 1 << 1;
pub const ONLCR: u32 = 1 << 2;

// -- control flags (c_cflag) --
pub const CRTSCTS: u32 = 1 << 0;

// -- local flags (c_lflag) --
pub const ECHO: u32 = 1 << 0;
pub const ECHOCTL: u32 = 1 << 1;
/// Canonical (line-buffered, editing) input mode. Not named explicitly in
/// spec.md's `Termios` field list, but required by §4.H's described
/// canonical/non-canonical `read` split; kept alongside the spec-named
/// local flags rather than introducing a separate mode enum.
pub const ICANON: u32 = 1 << 2;

/// `ioctl` operation codes this core understands on a tty fd (spec.md
/// §8 scenario 5, `TCGETS`).
pub const TCGETS: u32 = 0x5401;
pub const TCSETS: u32 = 0x5402;

/// Line-discipline configuration attached to each [`crate::tty::Tty`].
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct Termios {
    pub c_iflag: u32,
    pub c_oflag: u32,
    pub c_cflag: u32,
    pub c_lflag: u32,
    /// Line discipline selector; this core implements exactly one
    /// discipline (N_TTY-equivalent), so the field is carried for ABI
    /// completeness rather than dispatched on.
    pub c_line: u8,
    pub c_cc: [u8; NCCS],
}

impl Termios {
    /// The cooked-mode defaults every tty starts with: `ICRNL` on input,
    /// `OPOST|ONLCR` on output, `ECHO|ECHOCTL|ICANON` locally, ^C/^D/backspace
    /// bound to VINTR/VEOF/VERASE.
    pub const fn defaults() -> Self {
        let mut c_cc = [0u8; NCCS];
        c_cc[VINTR] = 0x03;
        c_cc[VEOF] = 0x04;
        c_cc[VERASE] = 0x7F;
        Self {
            c_iflag: ICRNL,
            c_oflag: OPOST | ONLCR,
            c_cflag: 0,
            c_lflag: ECHO | ECHOCTL | ICANON,
            c_line: 0,
            c_cc,
        }
    }
}

impl Default for Termios {
    fn default() -> Self {
        Self::defaults()
    }
}
