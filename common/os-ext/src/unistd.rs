use std::io;

/// Call sysconf(3) with the given argument.
///
/// sysconf(3) returns -1 without setting `errno` for options
/// that have no limit; this is reported as `Ok(-1)`.
pub fn sysconf(name: libc::c_int) -> io::Result<libc::c_long>
{
    // sysconf(3) leaves errno alone on success,
    // so it must be cleared to tell the two -1 cases apart.
    // SAFETY: errno is thread-local.
    unsafe { *libc::__errno_location() = 0; }

    // SAFETY: This is always safe.
    let result = unsafe { libc::sysconf(name) };

    if result == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(0) {
            return Err(err);
        }
    }

    Ok(result)
}

/// Equivalent to [`sysconf`] with `_SC_PAGESIZE`.
pub fn page_size() -> io::Result<usize>
{
    let size = sysconf(libc::_SC_PAGESIZE)?;
    usize::try_from(size)
        .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn page_size_is_power_of_two()
    {
        let size = page_size().unwrap();
        assert!(size.is_power_of_two(), "{size}");
    }

    #[test]
    fn sysconf_rejects_unknown_name()
    {
        let err = sysconf(-1).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
    }
}
