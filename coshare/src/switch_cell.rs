use std::{cell, ops::{Deref, DerefMut}};

#[cfg(debug_assertions)]
type Storage<T> = cell::RefCell<T>;

#[cfg(not(debug_assertions))]
type Storage<T> = cell::UnsafeCell<T>;

#[cfg(debug_assertions)]
type SharedGuard<'a, T> = cell::Ref<'a, T>;

#[cfg(not(debug_assertions))]
type SharedGuard<'a, T> = &'a T;

#[cfg(debug_assertions)]
type UniqueGuard<'a, T> = cell::RefMut<'a, T>;

#[cfg(not(debug_assertions))]
type UniqueGuard<'a, T> = &'a mut T;

/// Scheduler bookkeeping that is touched on both sides of a context switch.
///
/// Borrows must end before the stack switches,
/// because the flow that holds them stops running.
/// Debug builds track borrows like [`RefCell`][`cell::RefCell`]
/// and panic on a conflicting one; release builds do not check.
pub struct SwitchCell<T>
    where T: ?Sized
{
    inner: Storage<T>,
}

/// Shared borrow of a [`SwitchCell`].
pub struct SwitchRef<'a, T>
    where T: 'a + ?Sized
{
    guard: SharedGuard<'a, T>,
}

/// Unique borrow of a [`SwitchCell`].
pub struct SwitchRefMut<'a, T>
    where T: 'a + ?Sized
{
    guard: UniqueGuard<'a, T>,
}

impl<T> SwitchCell<T>
{
    pub const fn new(value: T) -> Self
    {
        Self{inner: Storage::new(value)}
    }
}

impl<T> SwitchCell<T>
    where T: ?Sized
{
    /// # Safety
    ///
    /// No unique borrow may exist or be created while this one lives.
    pub unsafe fn borrow(&self) -> SwitchRef<'_, T>
    {
        #[cfg(debug_assertions)]
        let guard = self.inner.borrow();

        #[cfg(not(debug_assertions))]
        let guard = &*self.inner.get();

        SwitchRef{guard}
    }

    /// # Safety
    ///
    /// No other borrow may exist or be created while this one lives.
    pub unsafe fn borrow_mut(&self) -> SwitchRefMut<'_, T>
    {
        #[cfg(debug_assertions)]
        let guard = self.inner.borrow_mut();

        #[cfg(not(debug_assertions))]
        let guard = &mut *self.inner.get();

        SwitchRefMut{guard}
    }

    /// Access the value through a unique reference, without any checks.
    pub fn get_mut(&mut self) -> &mut T
    {
        self.inner.get_mut()
    }
}

impl<T> Deref for SwitchRef<'_, T>
    where T: ?Sized
{
    type Target = T;

    fn deref(&self) -> &T
    {
        &self.guard
    }
}

impl<T> Deref for SwitchRefMut<'_, T>
    where T: ?Sized
{
    type Target = T;

    fn deref(&self) -> &T
    {
        &self.guard
    }
}

impl<T> DerefMut for SwitchRefMut<'_, T>
    where T: ?Sized
{
    fn deref_mut(&mut self) -> &mut T
    {
        &mut self.guard
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn borrows_see_writes()
    {
        let cell = SwitchCell::new(vec![1, 2]);

        // SAFETY: Borrows do not overlap.
        unsafe {
            cell.borrow_mut().push(3);
            assert_eq!(*cell.borrow(), [1, 2, 3]);
        }
    }

    #[test]
    fn get_mut_skips_tracking()
    {
        let mut cell = SwitchCell::new(1);
        *cell.get_mut() += 1;

        // SAFETY: No other borrows.
        assert_eq!(unsafe { *cell.borrow() }, 2);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn overlapping_borrows_panic_in_debug_builds()
    {
        let cell = SwitchCell::new(0);

        // SAFETY: Only sound because debug builds check borrows.
        unsafe {
            let _shared = cell.borrow();
            let _unique = cell.borrow_mut();
        }
    }
}
