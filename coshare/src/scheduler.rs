use {
    crate::{
        Config, Error, GrowthPolicy,
        context::Context,
        coroutine::{Coroutine, CoroutineId, Status},
        stack::SharedStack,
        switch_cell::SwitchCell,
    },
    os_ext::join_ptr,
    scope_exit::scope_exit,
    std::{
        any::Any,
        cell::Cell,
        marker::PhantomPinned,
        panic::{self, AssertUnwindSafe},
        pin::Pin,
    },
};

/// Runs coroutines one at a time on a single shared stack.
///
/// Coroutines are registered with [`create`][`Self::create`]
/// and run only inside [`resume`][`Self::resume`].
/// A running coroutine hands control back to the caller of `resume`
/// by calling [`yield_now`][`Self::yield_now`] or by returning.
/// The scheduler never decides what runs next; the caller does.
///
/// The scheduler is pinned because the contexts of its coroutines
/// refer to it and to its main context.
///
/// # Teardown
///
/// Dropping the scheduler releases every coroutine record,
/// including those of suspended coroutines.
/// Values that live on the stack of a suspended coroutine
/// (including the input it was created with) are not dropped,
/// because a frame that is not running cannot be unwound.
///
/// # Panics
///
/// Misuse is fatal: resuming while a coroutine is running,
/// passing an id that is out of range,
/// or yielding outside of a coroutine panics.
/// The `try_` variants report these as [`Error`] instead.
/// A panic inside a coroutine finishes that coroutine
/// and continues unwinding from the `resume` call that ran it.
pub struct Scheduler
{
    _pinned: PhantomPinned,

    /// The stack all coroutines run on.
    stack: SharedStack,

    /// The flow that called [`Scheduler::resume`].
    ///
    /// Saved on every resume and restored on every yield
    /// and every time a coroutine finishes.
    main: Context,

    /// Coroutine records, indexed by id.
    ///
    /// No borrow of the slots is ever held across a context switch.
    slots: SwitchCell<Vec<Option<Box<Coroutine>>>>,

    /// Number of occupied slots.
    live: Cell<usize>,

    running: Cell<Option<CoroutineId>>,

    growth: GrowthPolicy,

    /// Panic payload of a coroutine that panicked,
    /// to be rethrown on the main flow.
    panic: Cell<Option<Box<dyn Any + Send>>>,
}

/* -------------------------------------------------------------------------- */
/*                          Creating and destroying                           */
/* -------------------------------------------------------------------------- */

impl Scheduler
{
    /// Open a scheduler with the default configuration.
    pub fn open() -> Result<Pin<Box<Self>>, Error>
    {
        Self::with_config(&Config::default())
    }

    /// Open a scheduler with the given configuration.
    ///
    /// This maps the shared stack and allocates the slot table.
    /// No coroutines exist yet.
    pub fn with_config(config: &Config) -> Result<Pin<Box<Self>>, Error>
    {
        let stack = SharedStack::new(config.stack_size).map_err(Error::Stack)?;
        let slots = (0 .. config.capacity).map(|_| None).collect();

        tracing::debug!(
            stack_size = stack.size(),
            capacity = config.capacity,
            growth = ?config.growth,
            "Opened scheduler"
        );

        Ok(Box::pin(Self{
            _pinned: PhantomPinned,
            stack,
            main: Context::new(),
            slots: SwitchCell::new(slots),
            live: Cell::new(0),
            running: Cell::new(None),
            growth: config.growth,
            panic: Cell::new(None),
        }))
    }

    /// Create a coroutine that will call `body` with `input`.
    ///
    /// The coroutine starts out [ready][`Status::Ready`];
    /// `body` is not called until the coroutine is first resumed.
    ///
    /// The coroutine takes the first free slot,
    /// scanning from the slot whose index equals the number of live
    /// coroutines, as lower slots are likely to be occupied.
    /// If every slot is occupied, the slot table grows
    /// according to the configured [`GrowthPolicy`]
    /// and the coroutine takes the first new slot.
    ///
    /// This may be called from within a coroutine.
    pub fn create<F, T>(&self, body: F, input: T) -> CoroutineId
        where F: 'static + FnOnce(&Scheduler, T)
            , T: 'static
    {
        let body = Box::new(move |scheduler: &Scheduler| body(scheduler, input));
        let coroutine = Box::new(Coroutine::new(body));

        // SAFETY: No borrow of the slots lives across a context switch.
        let mut slots = unsafe { self.slots.borrow_mut() };

        let live = self.live.get();
        let capacity = slots.len();

        let index =
            if live < capacity {
                (0 .. capacity)
                    .map(|i| (i + live) % capacity)
                    .find(|&i| slots[i].is_none())
                    .expect("Fewer live coroutines than slots, so one is free")
            } else {
                let grown = match self.growth {
                    GrowthPolicy::Linear    => capacity + 1,
                    GrowthPolicy::Geometric => (capacity * 2).max(capacity + 1),
                };
                slots.resize_with(grown, || None);
                capacity
            };

        slots[index] = Some(coroutine);
        drop(slots);

        self.live.set(live + 1);

        let id = CoroutineId(index);
        tracing::trace!(%id, "Created coroutine");
        id
    }
}

impl Drop for Scheduler
{
    fn drop(&mut self)
    {
        let slots = self.slots.get_mut();

        let suspended =
            slots.iter()
            .flatten()
            .filter(|coroutine| coroutine.status() == Status::Suspended)
            .count();

        tracing::debug!(live = self.live.get(), suspended, "Closing scheduler");

        slots.clear();
    }
}

/* -------------------------------------------------------------------------- */
/*                                 Switching                                  */
/* -------------------------------------------------------------------------- */

impl Scheduler
{
    /// Run coroutine `id` until it yields or finishes.
    ///
    /// A ready coroutine starts executing its body.
    /// A suspended coroutine continues right after
    /// the [`yield_now`][`Self::yield_now`] call that suspended it.
    /// Resuming a dead coroutine does nothing.
    ///
    /// # Panics
    ///
    /// Panics if a coroutine is running (that is, when called from
    /// within a coroutine), or if `id` is out of range.
    /// Continues unwinding if the coroutine panics.
    pub fn resume(&self, id: CoroutineId)
    {
        if let Err(err) = self.try_resume(id) {
            panic!("{err}");
        }
    }

    /// Like [`resume`][`Self::resume`], but misuse is reported as an error.
    pub fn try_resume(&self, id: CoroutineId) -> Result<(), Error>
    {
        if let Some(running) = self.running.get() {
            return Err(Error::AlreadyRunning{running});
        }

        let Some(coroutine) = self.record(id)? else {
            return Ok(());
        };

        // SAFETY: The coroutine is not running, so it cannot finish
        //         before we are done with it below.
        let coroutine = unsafe { &*coroutine };

        let status = coroutine.status();
        match status {

            Status::Ready => {
                let arg = self as *const Self as *mut ();
                // SAFETY: The scheduler is pinned and the record is boxed,
                //         so neither context moves.
                //         No coroutine is running on the stack.
                unsafe {
                    coroutine.context
                        .prepare(&self.stack, &self.main, trampoline, arg)
                        .map_err(Error::Context)?;
                }
            },

            Status::Suspended => {
                // SAFETY: No coroutine is running on the stack,
                //         and the frame is only borrowed here and in settle.
                unsafe {
                    let frame = coroutine.frame.borrow();
                    self.stack.restore(frame.as_bytes());
                    tracing::trace!(%id, depth = frame.len(), "Restored frame");
                }
            },

            Status::Running | Status::Dead =>
                unreachable!("Coroutine {id} is {status} while nothing runs"),

        }

        coroutine.set_status(Status::Running);
        self.running.set(Some(id));

        tracing::trace!(%id, from = %status, "Resuming coroutine");

        // SAFETY: The coroutine's stack was prepared or restored above.
        let switched = unsafe { self.main.switch_to(&coroutine.context) };

        if let Err(err) = switched {
            coroutine.set_status(status);
            self.running.set(None);
            return Err(Error::Context(err));
        }

        // The coroutine may have finished, so the record
        // must not be used without looking it up again.
        self.settle(id);

        Ok(())
    }

    /// Suspend the running coroutine and return to its resumer.
    ///
    /// Returns when the coroutine is resumed.
    ///
    /// # Panics
    ///
    /// Panics if no coroutine is running,
    /// or if the coroutine uses more stack than is available.
    pub fn yield_now(&self)
    {
        if let Err(err) = self.try_yield_now() {
            panic!("{err}");
        }
    }

    /// Like [`yield_now`][`Self::yield_now`],
    /// but misuse is reported as an error.
    pub fn try_yield_now(&self) -> Result<(), Error>
    {
        let id = self.running.get().ok_or(Error::NotRunning)?;

        // The exact depth is taken from the saved context in settle,
        // but overflow must be detected before switching.
        let marker = 0u8;
        let addr = &marker as *const u8 as usize;
        let size = self.stack.size();
        if self.stack.depth(addr).is_none() {
            let used = (self.stack.top() as usize).checked_sub(addr);
            return Err(Error::StackOverflow{used, size});
        }

        let coroutine = self.record(id)?
            .expect("The running coroutine has a record");

        // SAFETY: The running coroutine cannot finish while it yields.
        let coroutine = unsafe { &*coroutine };

        coroutine.set_status(Status::Suspended);
        self.running.set(None);

        // SAFETY: main was saved by the resume waiting for us,
        //         and that flow does not run on the shared stack.
        let switched = unsafe { coroutine.context.switch_to(&self.main) };

        if let Err(err) = switched {
            coroutine.set_status(Status::Running);
            self.running.set(Some(id));
            return Err(Error::Context(err));
        }

        Ok(())
    }

    /// Finish switching back from coroutine `id` to the main flow.
    ///
    /// A panic left by the coroutine is rethrown.
    /// If the coroutine yielded, the stack it uses is saved.
    fn settle(&self, id: CoroutineId)
    {
        if let Some(payload) = self.panic.take() {
            tracing::trace!(%id, "Coroutine panicked");
            panic::resume_unwind(payload);
        }

        // SAFETY: No coroutine is running, so nothing else borrows the slots.
        let slots = unsafe { self.slots.borrow() };

        let Some(coroutine) = slots[id.0].as_deref() else {
            tracing::trace!(%id, "Coroutine finished");
            return;
        };

        debug_assert_eq!(coroutine.status(), Status::Suspended);

        let size = self.stack.size();
        let sp = coroutine.context.stack_pointer();
        let depth = self.stack.depth(sp)
            .unwrap_or_else(|| panic!(
                "Coroutine {id} yielded with its stack pointer \
                 outside of the {size}-byte shared stack",
            ));

        // SAFETY: The coroutine is suspended, so the stack is quiescent.
        //         The frame is only borrowed here and in try_resume.
        let buffer = unsafe {
            let mut frame = coroutine.frame.borrow_mut();
            frame.save(self.stack.tail(depth));
            frame.capacity()
        };

        tracing::trace!(%id, depth, buffer, "Coroutine yielded");
    }

    /// Release the slot of coroutine `id`, which has finished.
    fn release(&self, id: CoroutineId)
    {
        // SAFETY: The main flow holds no borrows while a coroutine runs.
        let mut slots = unsafe { self.slots.borrow_mut() };
        let coroutine = slots[id.0].take();
        drop(slots);

        // Dropping the record also drops the context we are running on.
        // That is fine: finishing switches to main without consulting it.
        drop(coroutine);

        self.live.set(self.live.get() - 1);
        self.running.set(None);
    }

    /// Find the record of coroutine `id`.
    ///
    /// The pointer is valid until the coroutine finishes.
    fn record(&self, id: CoroutineId) -> Result<Option<*const Coroutine>, Error>
    {
        // SAFETY: Borrows of the slots are never held across a switch.
        let slots = unsafe { self.slots.borrow() };
        let capacity = slots.len();
        let slot = slots.get(id.0).ok_or(Error::OutOfRange{id, capacity})?;
        Ok(slot.as_deref().map(|coroutine| coroutine as *const Coroutine))
    }
}

/// Entry point of every coroutine.
///
/// Runs the body of the running coroutine, then releases its slot.
/// Returning from here switches to the main context through `uc_link`.
extern "C" fn trampoline(lo: libc::c_uint, hi: libc::c_uint)
{
    // SAFETY: try_resume passes a pointer to the pinned scheduler,
    //         which outlives all of its coroutines.
    let scheduler = unsafe { &*join_ptr(lo, hi).cast::<Scheduler>() };

    // Panicking outside of catch_unwind aborts,
    // as there is nothing to unwind into.
    let id = match scheduler.running.get() {
        Some(id) => id,
        None     => std::process::abort(),
    };

    scope_exit! { scheduler.release(id); }

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let coroutine = scheduler.record(id)
            .ok()
            .flatten()
            .expect("The running coroutine has a record");

        // SAFETY: The record lives until release.
        let body = unsafe { (*coroutine).take_body() }
            .expect("A ready coroutine has its body");

        body(scheduler);
    }));

    if let Err(payload) = result {
        scheduler.panic.set(Some(payload));
    }
}

/* -------------------------------------------------------------------------- */
/*                                  Queries                                   */
/* -------------------------------------------------------------------------- */

impl Scheduler
{
    /// The status of coroutine `id`.
    ///
    /// Finished coroutines and free slots are [dead][`Status::Dead`].
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    pub fn status(&self, id: CoroutineId) -> Status
    {
        self.try_status(id).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Like [`status`][`Self::status`], but misuse is reported as an error.
    pub fn try_status(&self, id: CoroutineId) -> Result<Status, Error>
    {
        // SAFETY: Borrows of the slots are never held across a switch.
        let slots = unsafe { self.slots.borrow() };
        let capacity = slots.len();
        let slot = slots.get(id.0).ok_or(Error::OutOfRange{id, capacity})?;
        Ok(slot.as_ref().map_or(Status::Dead, |coroutine| coroutine.status()))
    }

    /// The running coroutine, if any.
    pub fn running(&self) -> Option<CoroutineId>
    {
        self.running.get()
    }

    /// The number of slots; ids below this are in range.
    pub fn capacity(&self) -> usize
    {
        // SAFETY: Borrows of the slots are never held across a switch.
        unsafe { self.slots.borrow().len() }
    }

    /// The number of coroutines that have not finished.
    pub fn live(&self) -> usize
    {
        self.live.get()
    }

    /// The size of the shared stack, in bytes.
    pub fn stack_size(&self) -> usize
    {
        self.stack.size()
    }
}
