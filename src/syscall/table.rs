//! Individual syscall handlers and the numbered dispatch table (spec.md
//! §4.J, §4.I).

use crate::fs::file::{self, File};
use crate::fs::inode;
use crate::process::{self, MAX_OPEN};
use crate::syscall::errno::*;

pub const NR_SYSCALLS: usize = 9;

pub fn call(number: usize, arg0: u32, arg1: u32, arg2: u32) -> i32 {
    let result = match number {
        0 => sys_exit(arg0 as i32),
        1 => sys_read(arg0 as usize, arg1, arg2 as usize),
        2 => sys_write(arg0 as usize, arg1, arg2 as usize),
        3 => sys_open(arg0, arg1),
        4 => sys_close(arg0 as usize),
        5 => sys_ioctl(arg0 as usize, arg1, arg2),
        6 => sys_dup(arg0 as usize),
        7 => sys_dup2(arg0 as usize, arg1 as usize),
        8 => sys_fcntl(arg0 as usize, arg1, arg2),
        _ => return to_return(ENOSYS),
    };
    match result {
        Ok(value) => value,
        Err(errno) => to_return(errno),
    }
}

/// Reads a NUL-terminated path out of this single-address-space kernel's
/// own memory. User pointers are trusted, not validated (spec.md §4.I
/// "All user pointers are assumed valid in this core (future work)");
/// the length cap just bounds the scan rather than enforcing a fault.
const MAX_PATH_LEN: usize = 256;

fn read_c_str(ptr: u32) -> Option<&'static str> {
    if ptr == 0 {
        return None;
    }
    // SAFETY: trusted per spec's user-pointer assumption; bounded by
    // `MAX_PATH_LEN` so a missing NUL terminator can't run away.
    unsafe {
        let base = ptr as *const u8;
        for len in 0..MAX_PATH_LEN {
            if *base.add(len) == 0 {
                let slice = core::slice::from_raw_parts(base, len);
                return core::str::from_utf8(slice).ok();
            }
        }
    }
    None
}

fn user_slice_mut(ptr: u32, len: usize) -> &'static mut [u8] {
    // SAFETY: see `read_c_str`.
    unsafe { core::slice::from_raw_parts_mut(ptr as *mut u8, len) }
}

fn user_slice(ptr: u32, len: usize) -> &'static [u8] {
    // SAFETY: see `read_c_str`.
    unsafe { core::slice::from_raw_parts(ptr as *const u8, len) }
}

fn file_for_fd(task: &process::Task, fd: usize) -> Result<*mut File, i32> {
    task.fd_table.get(fd).copied().flatten().ok_or(EBADF)
}

fn sys_exit(status: i32) -> Result<i32, i32> {
    process::exit(status);
}

fn sys_read(fd: usize, buf_ptr: u32, count: usize) -> Result<i32, i32> {
    let task = process::current_task();
    let file_ptr = file_for_fd(&task, fd)?;
    // SAFETY: `file_ptr` came from this task's fd table, which only ever
    // holds pointers into the live system file pool.
    let file = unsafe { &mut *file_ptr };
    let fops = file.fops.ok_or(ENOSYS)?;
    drop(task);
    if count == 0 {
        return Ok(0);
    }
    let buf = user_slice_mut(buf_ptr, count);
    fops.read(file, buf).map(|n| n as i32)
}

fn sys_write(fd: usize, buf_ptr: u32, count: usize) -> Result<i32, i32> {
    let task = process::current_task();
    let file_ptr = file_for_fd(&task, fd)?;
    // SAFETY: see `sys_read`.
    let file = unsafe { &mut *file_ptr };
    let fops = file.fops.ok_or(ENOSYS)?;
    drop(task);
    if count == 0 {
        return Ok(0);
    }
    let buf = user_slice(buf_ptr, count);
    fops.write(file, buf).map(|n| n as i32)
}

fn sys_open(path_ptr: u32, flags: u32) -> Result<i32, i32> {
    if file::has_ambiguous_access_mode(flags) {
        return Err(EINVAL);
    }
    let path = read_c_str(path_ptr).ok_or(ENOENT)?;

    let mut task = process::current_task();
    let fd = task.next_free_fd().ok_or(ENFILE)?;
    drop(task);

    let file_ptr = crate::fs::alloc_file()?;
    // SAFETY: freshly allocated from the system pool; exclusively owned
    // until stored in the fd table below.
    let file = unsafe { &mut *file_ptr };
    file.flags = flags;

    let open_result = (|| -> Result<(), i32> {
        let inode_index = inode::find_inode(path).ok_or(ENOENT)?;
        if inode_index == inode::NO_INODE {
            file.fops = Some(crate::tty::controlling());
        } else {
            file.inode_index = inode_index;
            let node = inode::inode_by_index(inode_index).ok_or(ENOENT)?;
            file.fops = Some(node.fops);
        }
        file.fops.ok_or(ENOSYS)?.open(file)
    })();

    match open_result {
        Ok(()) => {
            let mut task = process::current_task();
            task.fd_table[fd] = Some(file_ptr);
            Ok(fd as i32)
        }
        Err(errno) => {
            crate::fs::free_file(file_ptr);
            Err(errno)
        }
    }
}

fn sys_close(fd: usize) -> Result<i32, i32> {
    let mut task = process::current_task();
    let file_ptr = file_for_fd(&task, fd)?;
    // SAFETY: see `sys_read`.
    let file = unsafe { &mut *file_ptr };
    if let Some(fops) = file.fops {
        let _ = fops.close(file);
    }
    task.fd_table[fd] = None;
    drop(task);
    crate::fs::free_file(file_ptr);
    Ok(0)
}

/// Decodes `op` into `{direction:2, size:14, code:8, seq:8}` from the MSB
/// (spec.md §4.I "ioctl").
fn sys_ioctl(fd: usize, op: u32, arg: u32) -> Result<i32, i32> {
    let direction = op >> 30;
    let size = (op >> 16) & 0x3FFF;
    if direction != 0 {
        if size == 0 {
            return Err(EBADRQC);
        }
        if arg == 0 {
            return Err(EINVAL);
        }
    }

    let task = process::current_task();
    let file_ptr = file_for_fd(&task, fd)?;
    // SAFETY: see `sys_read`.
    let file = unsafe { &mut *file_ptr };
    let fops = file.fops.ok_or(ENOSYS)?;
    drop(task);
    fops.ioctl(file, op, arg as usize)
}

fn sys_dup(fd: usize) -> Result<i32, i32> {
    let mut task = process::current_task();
    let src_ptr = file_for_fd(&task, fd)?;
    let newfd = task.next_free_fd().ok_or(ENFILE)?;
    // SAFETY: see `sys_read`.
    let src = unsafe { &*src_ptr };
    let clone_ptr = crate::fs::alloc_file()?;
    // SAFETY: freshly allocated, exclusively owned here.
    unsafe {
        (*clone_ptr).fops = src.fops;
        (*clone_ptr).inode_index = src.inode_index;
        (*clone_ptr).flags = src.flags;
        (*clone_ptr).offset = src.offset;
    }
    task.fd_table[newfd] = Some(clone_ptr);
    Ok(newfd as i32)
}

fn sys_dup2(fd: usize, newfd: usize) -> Result<i32, i32> {
    if newfd >= MAX_OPEN {
        return Err(EBADF);
    }
    let mut task = process::current_task();
    let src_ptr = file_for_fd(&task, fd)?;
    if let Some(old_ptr) = task.fd_table[newfd].take() {
        // SAFETY: `old_ptr` was this slot's own live file pointer.
        let old = unsafe { &mut *old_ptr };
        if let Some(fops) = old.fops {
            let _ = fops.close(old);
        }
        crate::fs::free_file(old_ptr);
    }
    // SAFETY: see `sys_read`.
    let src = unsafe { &*src_ptr };
    let clone_ptr = crate::fs::alloc_file()?;
    // SAFETY: freshly allocated, exclusively owned here.
    unsafe {
        (*clone_ptr).fops = src.fops;
        (*clone_ptr).inode_index = src.inode_index;
        (*clone_ptr).flags = src.flags;
        (*clone_ptr).offset = src.offset;
    }
    task.fd_table[newfd] = Some(clone_ptr);
    Ok(newfd as i32)
}

fn sys_fcntl(fd: usize, op: u32, arg: u32) -> Result<i32, i32> {
    let task = process::current_task();
    let file_ptr = file_for_fd(&task, fd)?;
    // SAFETY: see `sys_read`.
    let f = unsafe { &mut *file_ptr };
    match op {
        file::F_GETFL => Ok(f.flags as i32),
        file::F_SETFL => {
            f.flags = arg;
            Ok(0)
        }
        _ => Err(EINVAL),
    }
}
