//! Architecture-wide constants shared across subsystems.

/// Page size used by i386 4 KiB pages.
pub const PAGE_SIZE: usize = 4096;

/// Page size as `u32` for address arithmetic.
pub const PAGE_SIZE_U32: u32 = PAGE_SIZE as u32;

/// Kernel code segment selector (GDT index 1, RPL 0).
pub const KERNEL_CS: u16 = 0x08;

/// Kernel data segment selector (GDT index 2, RPL 0).
pub const KERNEL_DS: u16 = 0x10;

/// User code segment selector (GDT index 3, RPL 3).
pub const USER_CS: u16 = 0x1B;

/// User data segment selector (GDT index 4, RPL 3).
pub const USER_DS: u16 = 0x23;
