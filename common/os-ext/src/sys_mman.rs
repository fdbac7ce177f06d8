use std::{io, ptr::{NonNull, null_mut}};

/// Call mmap(2) to create an anonymous private mapping.
///
/// The kernel chooses the address of the mapping.
/// `flags` is combined with `MAP_PRIVATE | MAP_ANONYMOUS`.
pub fn mmap_anonymous(len: usize, prot: libc::c_int, flags: libc::c_int)
    -> io::Result<NonNull<u8>>
{
    let flags = flags | libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

    // SAFETY: A null address never replaces an existing mapping.
    let ptr = unsafe { libc::mmap(null_mut(), len, prot, flags, -1, 0) };

    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }

    // mmap(2) never returns null for a kernel-chosen address.
    NonNull::new(ptr.cast())
        .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOMEM))
}

/// Call munmap(2) with the given arguments.
///
/// # Safety
///
/// No references into the mapping may outlive this call.
pub unsafe fn munmap(addr: NonNull<u8>, len: usize) -> io::Result<()>
{
    let result = libc::munmap(addr.as_ptr().cast(), len);

    if result == -1 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// Call mprotect(2) with the given arguments.
///
/// # Safety
///
/// Memory that is still referenced must remain accessible
/// in the way it is referenced.
pub unsafe fn mprotect(addr: NonNull<u8>, len: usize, prot: libc::c_int)
    -> io::Result<()>
{
    let result = libc::mprotect(addr.as_ptr().cast(), len, prot);

    if result == -1 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}
