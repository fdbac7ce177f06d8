use {crate::ucontext_t, std::{io, mem}};

/// Entry point accepted by [`makecontext`].
///
/// The two arguments are the low and high halves of the pointer
/// that was passed to [`makecontext`]; use [`join_ptr`] to rejoin them.
pub type ContextEntry = extern "C" fn(libc::c_uint, libc::c_uint);

/// Call getcontext(3) with the given argument.
///
/// # Safety
///
/// `ucp` must be valid for writes.
/// If the context is ever resumed as saved (rather than after
/// [`makecontext`]), execution continues as if this call returned again.
pub unsafe fn getcontext(ucp: *mut ucontext_t) -> io::Result<()>
{
    let result = libc::getcontext(ucp);

    if result == -1 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// Call makecontext(3) with a single pointer argument.
///
/// makecontext(3) only passes `int` arguments portably,
/// so the pointer is split into its low and high 32 bits,
/// which are passed to `func` as two arguments.
///
/// # Safety
///
///  - `ucp` must have been initialized by [`getcontext`].
///  - `uc_stack` and `uc_link` must be set to a usable stack
///    and to a context that outlives this one (or null).
///  - `ucp` must not be moved before the context finishes.
pub unsafe fn makecontext(ucp: *mut ucontext_t, func: ContextEntry, arg: *mut ())
{
    let (lo, hi) = split_ptr(arg);

    // SAFETY: makecontext(3) calls func with exactly the arguments given,
    //         so the signature it sees is that of ContextEntry.
    let func = mem::transmute::<ContextEntry, extern "C" fn()>(func);

    libc::makecontext(ucp, func, 2, lo, hi);
}

/// Call swapcontext(3) with the given arguments.
///
/// Returns when some other flow resumes `oucp`.
///
/// # Safety
///
///  - `oucp` must be valid for writes and must not move
///    while the saved context may still be resumed.
///  - `ucp` must be a context saved by [`getcontext`], [`swapcontext`],
///    or prepared by [`makecontext`], whose stack is intact.
pub unsafe fn swapcontext(oucp: *mut ucontext_t, ucp: *const ucontext_t)
    -> io::Result<()>
{
    let result = libc::swapcontext(oucp, ucp);

    if result == -1 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// Rejoin a pointer split by [`makecontext`].
pub fn join_ptr(lo: libc::c_uint, hi: libc::c_uint) -> *mut ()
{
    (((hi as u64) << 32) | lo as u64) as usize as *mut ()
}

fn split_ptr(ptr: *mut ()) -> (libc::c_uint, libc::c_uint)
{
    let addr = ptr as usize as u64;
    (addr as libc::c_uint, (addr >> 32) as libc::c_uint)
}

#[cfg(test)]
mod tests
{
    use {
        super::*,
        std::{cell::Cell, mem::MaybeUninit, ptr::null_mut},
    };

    #[test]
    fn split_and_join_ptr()
    {
        let value = 0u8;
        let ptr = &value as *const u8 as *mut ();
        let (lo, hi) = split_ptr(ptr);
        assert_eq!(join_ptr(lo, hi), ptr);
        assert_eq!(join_ptr(0, 0), null_mut());
    }

    thread_local! {
        static MAIN: Cell<*mut ucontext_t> = Cell::new(null_mut());
        static CHILD: Cell<*mut ucontext_t> = Cell::new(null_mut());
    }

    extern "C" fn ping(lo: libc::c_uint, hi: libc::c_uint)
    {
        let counter = join_ptr(lo, hi).cast::<u32>();
        // SAFETY: The test keeps the counter and both contexts alive.
        unsafe {
            *counter += 1;
            swapcontext(CHILD.with(Cell::get), MAIN.with(Cell::get)).unwrap();
            *counter += 10;
        }
    }

    #[test]
    fn swapcontext_round_trip()
    {
        let mut stack = vec![0u8; 64 * 1024];
        let mut main = MaybeUninit::<ucontext_t>::zeroed();
        let mut child = MaybeUninit::<ucontext_t>::zeroed();
        let mut counter = 0u32;

        MAIN.with(|c| c.set(main.as_mut_ptr()));
        CHILD.with(|c| c.set(child.as_mut_ptr()));

        // SAFETY: Stack, contexts, and counter outlive the child flow.
        unsafe {
            let ucp = child.as_mut_ptr();
            getcontext(ucp).unwrap();
            (*ucp).uc_stack.ss_sp = stack.as_mut_ptr().cast();
            (*ucp).uc_stack.ss_size = stack.len();
            (*ucp).uc_link = main.as_mut_ptr();
            makecontext(ucp, ping, (&mut counter as *mut u32).cast());

            swapcontext(main.as_mut_ptr(), ucp).unwrap();
            assert_eq!(counter, 1);

            swapcontext(main.as_mut_ptr(), ucp).unwrap();
            assert_eq!(counter, 11);
        }
    }
}
