//! Character-device registry, indexed by major number (spec.md §4.I
//! "Character-device registry").

use core::cell::UnsafeCell;

use crate::fs::file::{File, FileOps};
use crate::fs::inode::inode_by_index;
use crate::syscall::errno::{EINVAL, ENODEV};

/// Major 0 is reserved; majors 1..MAX_CHDEV-1 are assignable.
pub const MAX_CHDEV: usize = 16;

#[derive(Clone, Copy)]
struct Entry {
    name: &'static str,
    fops: &'static dyn FileOps,
}

struct Registry {
    slots: UnsafeCell<[Option<Entry>; MAX_CHDEV]>,
}

// SAFETY: registrations happen once at boot before interrupts are enabled
// and before any other CPU context exists; reads afterwards never race a
// write (spec.md §5 "process-wide... one-time-initialized globals").
unsafe impl Sync for Registry {}

static REGISTRY: Registry = Registry {
    slots: UnsafeCell::new([None; MAX_CHDEV]),
};

fn slots() -> &'static mut [Option<Entry>; MAX_CHDEV] {
    // SAFETY: see `Registry`'s Sync justification.
    unsafe { &mut *REGISTRY.slots.get() }
}

/// Records `(major, name, fops)`. `major == 0` or out of range is
/// rejected; a major already in use is rejected too (this core never
/// re-registers over a live driver).
pub fn register_chdev(major: u8, name: &'static str, fops: &'static dyn FileOps) -> Result<(), i32> {
    let index = major as usize;
    if index == 0 || index >= MAX_CHDEV {
        return Err(EINVAL);
    }
    let slot = &mut slots()[index];
    if slot.is_some() {
        return Err(EINVAL);
    }
    *slot = Some(Entry { name, fops });
    Ok(())
}

/// Clears `major`'s slot if its registered name matches.
pub fn unregister_chdev(major: u8, name: &str) -> Result<(), i32> {
    let index = major as usize;
    if index == 0 || index >= MAX_CHDEV {
        return Err(EINVAL);
    }
    let slot = &mut slots()[index];
    match slot {
        Some(entry) if entry.name == name => {
            *slot = None;
            Ok(())
        }
        Some(_) => Err(EINVAL),
        None => Err(ENODEV),
    }
}

fn lookup(major: u8) -> Option<&'static dyn FileOps> {
    slots().get(major as usize).copied().flatten().map(|entry| entry.fops)
}

/// The generic `chdev_ops` every character-device [`crate::fs::inode::Inode`]
/// points at: `open` resolves the inode's major, rebinds `file.fops` to the
/// registered driver, and delegates the open call to it (spec.md §4.I "The
/// default `chdev_ops` has only `open`, which looks up the driver by the
/// inode's major and delegates").
pub struct ChardevOps;

impl FileOps for ChardevOps {
    fn open(&self, file: &mut File) -> Result<(), i32> {
        let inode = inode_by_index(file.inode_index).ok_or(ENODEV)?;
        let driver = lookup(inode.major()).ok_or(ENODEV)?;
        file.fops = Some(driver);
        driver.open(file)
    }
}

pub static CHDEV_OPS: ChardevOps = ChardevOps;
