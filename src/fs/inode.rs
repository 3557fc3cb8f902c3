//! Hardcoded device-node directory: inodes and the dentries naming them
//! (spec.md §3 `Inode`/`Dentry`, §4.I "Inode lookup", §6 device-node
//! directory).
//!
//! Nothing here is created or freed at runtime; the whole table is the
//! fixed set of devices this core ever exposes, built once by
//! [`crate::fs::init`] into pre-sized fixed arrays (spec.md: "created at
//! file-system init, never freed in this core").

use crate::fs::chardev::CHDEV_OPS;
use crate::fs::file::FileOps;

pub const DENTRY_NAME_LENGTH: usize = 32;
/// 7 consoles + 4 serial ports + 1 RTC + the synthetic `tty0` alias.
pub const MAX_DENTRIES: usize = 13;
/// Backing inodes: one per real device (the `tty0` alias has none).
pub const MAX_INODES: usize = 12;

/// Sentinel stored in a [`Dentry`] that names no backing inode (`/dev/tty0`).
pub const NO_INODE: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeMode {
    Regular,
    Character,
}

pub struct Inode {
    /// Packed major (high byte) : minor (low byte).
    pub device_id: u16,
    pub mode: InodeMode,
    pub fops: &'static dyn FileOps,
}

impl Inode {
    pub const fn character(major: u8, minor: u8) -> Self {
        Self {
            device_id: ((major as u16) << 8) | minor as u16,
            mode: InodeMode::Character,
            fops: &CHDEV_OPS,
        }
    }

    pub const fn major(&self) -> u8 {
        (self.device_id >> 8) as u8
    }

    pub const fn minor(&self) -> u8 {
        (self.device_id & 0xFF) as u8
    }
}

pub struct Dentry {
    pub name: &'static str,
    pub inode_index: usize,
}

pub const MAJOR_CONSOLE: u8 = 4;
pub const MAJOR_SERIAL: u8 = 5;
pub const MAJOR_RTC: u8 = 10;

static INODES: [Inode; MAX_INODES] = [
    Inode::character(MAJOR_CONSOLE, 0),
    Inode::character(MAJOR_CONSOLE, 1),
    Inode::character(MAJOR_CONSOLE, 2),
    Inode::character(MAJOR_CONSOLE, 3),
    Inode::character(MAJOR_CONSOLE, 4),
    Inode::character(MAJOR_CONSOLE, 5),
    Inode::character(MAJOR_CONSOLE, 6),
    Inode::character(MAJOR_SERIAL, 0),
    Inode::character(MAJOR_SERIAL, 1),
    Inode::character(MAJOR_SERIAL, 2),
    Inode::character(MAJOR_SERIAL, 3),
    Inode::character(MAJOR_RTC, 0),
];

static DENTRIES: [Dentry; MAX_DENTRIES] = [
    Dentry { name: "/dev/tty1", inode_index: 0 },
    Dentry { name: "/dev/tty2", inode_index: 1 },
    Dentry { name: "/dev/tty3", inode_index: 2 },
    Dentry { name: "/dev/tty4", inode_index: 3 },
    Dentry { name: "/dev/tty5", inode_index: 4 },
    Dentry { name: "/dev/tty6", inode_index: 5 },
    Dentry { name: "/dev/tty7", inode_index: 6 },
    Dentry { name: "/dev/ttyS0", inode_index: 7 },
    Dentry { name: "/dev/ttyS1", inode_index: 8 },
    Dentry { name: "/dev/ttyS2", inode_index: 9 },
    Dentry { name: "/dev/ttyS3", inode_index: 10 },
    Dentry { name: "/dev/rtc", inode_index: 11 },
    Dentry { name: "/dev/tty0", inode_index: NO_INODE },
];

const _: () = assert!(DENTRY_NAME_LENGTH >= 10, "device paths must fit DENTRY_NAME_LENGTH");

/// Walks the hardcoded dentry table comparing names (spec.md §4.I
/// `find_inode`). Returns the dentry's inode index (which may be
/// [`NO_INODE`] for the `tty0` alias) on a name match.
pub fn find_inode(path: &str) -> Option<usize> {
    DENTRIES.iter().find(|d| d.name == path).map(|d| d.inode_index)
}

pub fn inode_by_index(index: usize) -> Option<&'static Inode> {
    INODES.get(index)
}
