use {crate::CoroutineId, std::io, thiserror::Error};

/// Error returned by the scheduler.
///
/// Apart from [`Stack`][`Error::Stack`] and [`Context`][`Error::Context`],
/// every variant describes a mistake by the caller.
/// The non-`try` methods of [`Scheduler`][`crate::Scheduler`]
/// panic with the error message instead of returning these.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error
{
    #[error("Cannot map the shared stack")]
    Stack(#[source] io::Error),

    #[error("Cannot switch execution context")]
    Context(#[source] io::Error),

    #[error("Coroutine {id} is out of range (capacity is {capacity})")]
    OutOfRange{id: CoroutineId, capacity: usize},

    #[error("Cannot resume a coroutine while coroutine {running} is running")]
    AlreadyRunning{running: CoroutineId},

    #[error("Cannot yield outside of a running coroutine")]
    NotRunning,

    /// `used` is the distance below the top of the shared stack,
    /// or [`None`] if the coroutine is above it.
    #[error("Coroutine is running outside of the shared stack of {size} bytes")]
    StackOverflow{used: Option<usize>, size: usize},
}

/// Error returned when reading configuration.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ConfigError
{
    #[error("Invalid value {value:?} for {var}")]
    InvalidValue{var: &'static str, value: String},

    #[error("The shared stack size must not be zero")]
    ZeroStackSize,
}
