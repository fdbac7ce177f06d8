//! Saved machine state of a flow of control.

use {
    crate::stack::SharedStack,
    os_ext::{ContextEntry, getcontext, makecontext, swapcontext, ucontext_t},
    std::{cell::UnsafeCell, io, mem::MaybeUninit},
};

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("Reading the saved stack pointer is not implemented for this architecture");

/// Index of the stack pointer in `gregs`, from <sys/ucontext.h>.
#[cfg(target_arch = "x86_64")]
const REG_RSP: usize = 15;

/// Execution context: registers and stack pointer of a suspended flow.
///
/// A context must not move once it has been prepared or switched from,
/// as the saved state may point into the context itself.
/// Contexts are therefore only ever stored behind a [`Box`]
/// or in a pinned scheduler.
pub struct Context
{
    inner: UnsafeCell<ucontext_t>,
}

impl Context
{
    /// Create an empty context.
    ///
    /// An empty context can only be switched *from*;
    /// switching from it fills it in.
    pub fn new() -> Self
    {
        // SAFETY: ucontext_t is plain old data.
        let inner = unsafe { MaybeUninit::zeroed().assume_init() };
        Self{inner: UnsafeCell::new(inner)}
    }

    fn as_ptr(&self) -> *mut ucontext_t
    {
        self.inner.get()
    }

    /// Prepare the context to run `entry(arg)` on `stack`.
    ///
    /// The new flow starts at the top of the stack and grows downwards.
    /// When `entry` returns, execution continues in `link`.
    ///
    /// # Safety
    ///
    ///  - Neither this context nor `link` may move afterwards.
    ///  - `link` and `stack` must outlive the new flow.
    ///  - No other flow may be running on `stack`.
    pub unsafe fn prepare(
        &self,
        stack: &SharedStack,
        link:  &Context,
        entry: ContextEntry,
        arg:   *mut (),
    ) -> io::Result<()>
    {
        let ucp = self.as_ptr();
        getcontext(ucp)?;
        (*ucp).uc_stack.ss_sp = stack.bottom().cast();
        (*ucp).uc_stack.ss_size = stack.size();
        (*ucp).uc_stack.ss_flags = 0;
        (*ucp).uc_link = link.as_ptr();
        makecontext(ucp, entry, arg);
        Ok(())
    }

    /// Save the current flow into this context and resume `target`.
    ///
    /// Returns when another flow switches back to this context.
    ///
    /// # Safety
    ///
    /// `target` must have been prepared or switched from,
    /// and its stack must be exactly as it was at that time.
    pub unsafe fn switch_to(&self, target: &Context) -> io::Result<()>
    {
        swapcontext(self.as_ptr(), target.as_ptr())
    }

    /// The stack pointer saved when this context was last switched from.
    ///
    /// Everything the suspended flow still needs
    /// is at or above this address.
    pub fn stack_pointer(&self) -> usize
    {
        // SAFETY: Only called while the flow is suspended,
        //         so nothing writes to the context concurrently.
        let mcontext = unsafe { &(*self.as_ptr()).uc_mcontext };

        #[cfg(target_arch = "x86_64")]
        return mcontext.gregs[REG_RSP] as usize;

        #[cfg(target_arch = "aarch64")]
        return mcontext.sp as usize;
    }
}

impl Default for Context
{
    fn default() -> Self
    {
        Self::new()
    }
}
