//! Ad-hoc scope guards.

#![warn(missing_docs)]

use std::mem::ManuallyDrop;

/// Guard that calls a function when it is dropped.
///
/// Use [`scope_exit!`] for guards that always run.
/// Construct the guard directly when it may need to be dismissed.
#[must_use = "the function runs immediately if the guard is not bound"]
pub struct ScopeExit<F>
    where F: FnOnce()
{
    f: ManuallyDrop<F>,
}

impl<F> ScopeExit<F>
    where F: FnOnce()
{
    /// Create a guard that calls `f` when dropped.
    pub fn new(f: F) -> Self
    {
        Self{f: ManuallyDrop::new(f)}
    }

    /// Drop the guard without calling the function.
    pub fn dismiss(mut self)
    {
        // SAFETY: self.f is not used anymore, and Drop will not run.
        unsafe { ManuallyDrop::drop(&mut self.f); }
        std::mem::forget(self);
    }
}

impl<F> Drop for ScopeExit<F>
    where F: FnOnce()
{
    fn drop(&mut self)
    {
        // SAFETY: self.f will not be used anymore.
        let f = unsafe { ManuallyDrop::take(&mut self.f) };
        f();
    }
}

/// Define an ad-hoc scope guard.
///
/// The code passed to this macro is performed at the end of the scope.
/// It is performed when the scope ends or when a panic passes through.
///
/// # Examples
///
/// ```
/// # use scope_exit::scope_exit;
/// use std::cell::Cell;
/// let x = Cell::new(0);
/// {
///     scope_exit! { x.set(1); }
///     x.set(2);
/// }
/// assert_eq!(x.get(), 1);
/// ```
#[macro_export]
macro_rules! scope_exit
{
    { $($tt:tt)* } => {
        let __scope_exit = $crate::ScopeExit::new(|| { $($tt)* });
    };
}

#[cfg(test)]
mod tests
{
    use {super::*, std::{cell::Cell, panic::{AssertUnwindSafe, catch_unwind}}};

    #[test]
    fn dismissed_guard_does_not_run()
    {
        let x = Cell::new(0);
        let guard = ScopeExit::new(|| x.set(1));
        guard.dismiss();
        assert_eq!(x.get(), 0);
    }

    #[test]
    fn guard_runs_on_panic()
    {
        let x = Cell::new(0);
        let result = catch_unwind(AssertUnwindSafe(|| {
            scope_exit! { x.set(1); }
            panic!("unwinding");
        }));
        assert!(result.is_err());
        assert_eq!(x.get(), 1);
    }
}
