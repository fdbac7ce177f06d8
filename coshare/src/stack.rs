//! The stack shared by all coroutines of a scheduler.

use {
    os_ext::{
        MAP_STACK, PROT_NONE, PROT_READ, PROT_WRITE,
        mmap_anonymous, mprotect, munmap, page_size,
    },
    scope_exit::ScopeExit,
    std::{io, ptr::{self, NonNull}, slice},
};

/// Fixed-size memory region used as the machine stack of coroutines.
///
/// The region is mapped once and never moves,
/// which is what allows saved frames to be copied back
/// to the addresses they were taken from.
/// Stacks grow downwards, so the *top* of the region
/// (its highest address) is where every coroutine starts.
///
/// One inaccessible guard page sits below the region.
/// A coroutine that overflows the stack faults
/// instead of silently overwriting unrelated memory.
pub struct SharedStack
{
    /// Start of the mapping, which begins with the guard page.
    mapping: NonNull<u8>,

    /// Size of the guard page.
    guard: usize,

    /// Size of the usable region above the guard page.
    size: usize,
}

impl SharedStack
{
    /// Map a shared stack of at least `size` bytes.
    ///
    /// The size is rounded up to a multiple of the page size.
    pub fn new(size: usize) -> io::Result<Self>
    {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "shared stack size must not be zero",
            ));
        }

        let guard = page_size()?;
        let size = size.checked_next_multiple_of(guard)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOMEM))?;
        let mapping_len = size.checked_add(guard)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOMEM))?;

        let mapping = mmap_anonymous(mapping_len, PROT_READ | PROT_WRITE, MAP_STACK)?;

        let unmap = ScopeExit::new(|| {
            // SAFETY: Nothing references the mapping yet.
            let _ = unsafe { munmap(mapping, mapping_len) };
        });

        // SAFETY: Nothing references the guard page.
        unsafe { mprotect(mapping, guard, PROT_NONE)?; }

        unmap.dismiss();

        Ok(Self{mapping, guard, size})
    }

    /// Size of the usable region, in bytes.
    pub fn size(&self) -> usize
    {
        self.size
    }

    /// Lowest usable address.
    pub fn bottom(&self) -> *mut u8
    {
        // SAFETY: The guard page is part of the mapping.
        unsafe { self.mapping.as_ptr().add(self.guard) }
    }

    /// One past the highest usable address.
    pub fn top(&self) -> *mut u8
    {
        // SAFETY: One past the end of the mapping.
        unsafe { self.bottom().add(self.size) }
    }

    /// Whether `addr` lies within the usable region or at its top.
    pub fn contains(&self, addr: usize) -> bool
    {
        (self.bottom() as usize ..= self.top() as usize).contains(&addr)
    }

    /// Number of bytes between `addr` and the top of the stack.
    ///
    /// For a stack pointer within the region,
    /// this is how much of the stack is in use.
    /// Returns [`None`] if `addr` is not within the region.
    pub fn depth(&self, addr: usize) -> Option<usize>
    {
        self.contains(addr).then(|| self.top() as usize - addr)
    }

    /// The topmost `len` bytes of the stack.
    ///
    /// # Safety
    ///
    /// No coroutine may be running on the stack
    /// while the returned slice is alive.
    pub unsafe fn tail(&self, len: usize) -> &[u8]
    {
        assert!(len <= self.size, "{len} exceeds stack size {}", self.size);
        slice::from_raw_parts(self.top().sub(len), len)
    }

    /// Copy `bytes` to the topmost `bytes.len()` bytes of the stack.
    ///
    /// This is the inverse of [`tail`][`Self::tail`]:
    /// the bytes end up at the same addresses they were read from.
    ///
    /// # Safety
    ///
    /// No coroutine may be running on the stack.
    pub unsafe fn restore(&self, bytes: &[u8])
    {
        let len = bytes.len();
        assert!(len <= self.size, "{len} exceeds stack size {}", self.size);
        ptr::copy_nonoverlapping(bytes.as_ptr(), self.top().sub(len), len);
    }
}

impl Drop for SharedStack
{
    fn drop(&mut self)
    {
        // SAFETY: The scheduler outlives every coroutine using the stack.
        let result = unsafe { munmap(self.mapping, self.guard + self.size) };

        if let Err(err) = result {
            tracing::error!(%err, "Cannot unmap shared stack");
        }
    }
}
