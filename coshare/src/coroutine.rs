use {
    crate::{Scheduler, context::Context, frame::SavedFrame, switch_cell::SwitchCell},
    std::{cell::Cell, fmt},
};

/// Identifies a coroutine within its scheduler.
///
/// Ids are indices into the scheduler's slot table.
/// An id stays valid while its coroutine is alive,
/// and may be reused once the coroutine has finished.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CoroutineId(pub usize);

/// Status of a coroutine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status
{
    /// The coroutine finished, or never existed.
    Dead,

    /// The coroutine was created but has not been resumed yet.
    Ready,

    /// The coroutine is executing.
    Running,

    /// The coroutine yielded and awaits being resumed.
    Suspended,
}

/// Task body with its input already captured.
pub(crate) type Body = Box<dyn FnOnce(&Scheduler)>;

/// Bookkeeping for a live coroutine.
///
/// Records are boxed and never move while alive,
/// because the context inside is referenced while switched from.
pub(crate) struct Coroutine
{
    /// Taken by the trampoline when the coroutine first runs.
    body: Cell<Option<Body>>,

    pub context: Context,

    /// The coroutine's stack while it is suspended.
    pub frame: SwitchCell<SavedFrame>,

    status: Cell<Status>,
}

impl Coroutine
{
    pub fn new(body: Body) -> Self
    {
        Self{
            body: Cell::new(Some(body)),
            context: Context::new(),
            frame: SwitchCell::new(SavedFrame::new()),
            status: Cell::new(Status::Ready),
        }
    }

    pub fn status(&self) -> Status
    {
        self.status.get()
    }

    pub fn set_status(&self, status: Status)
    {
        debug_assert_ne!(status, Status::Dead, "Dead coroutines have no record");
        self.status.set(status);
    }

    /// Take the body out of the record.
    ///
    /// Returns [`None`] if the body was taken before.
    pub fn take_body(&self) -> Option<Body>
    {
        self.body.take()
    }
}

impl fmt::Display for CoroutineId
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Status
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
    {
        let name = match self {
            Self::Dead      => "dead",
            Self::Ready     => "ready",
            Self::Running   => "running",
            Self::Suspended => "suspended",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn new_coroutine_is_ready()
    {
        let coroutine = Coroutine::new(Box::new(|_: &Scheduler| ()));
        assert_eq!(coroutine.status(), Status::Ready);
        assert!(coroutine.take_body().is_some());
        assert!(coroutine.take_body().is_none());
    }

    #[test]
    fn display()
    {
        assert_eq!(CoroutineId(7).to_string(), "7");
        assert_eq!(Status::Suspended.to_string(), "suspended");
    }
}
