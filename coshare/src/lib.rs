//! Stackful coroutines sharing a single execution stack.
//!
//! A [`Scheduler`] multiplexes many coroutines over one fixed-size stack.
//! Only the running coroutine occupies the stack.
//! When a coroutine yields, the part of the stack it uses
//! is copied into a buffer owned by the coroutine,
//! and when it is resumed, those bytes are copied back
//! to exactly the same addresses.
//! Memory use is therefore proportional to how deep
//! each suspended coroutine actually is, not to the stack size.
//!
//! Scheduling is cooperative and entirely up to the caller:
//! a coroutine runs only inside [`Scheduler::resume`],
//! and returns control only through [`Scheduler::yield_now`]
//! or by finishing.
//!
//! # Examples
//!
//! ```
//! use coshare::{Scheduler, Status};
//!
//! let scheduler = Scheduler::open().unwrap();
//!
//! let id = scheduler.create(|scheduler, start: u32| {
//!     for i in 0 .. 3 {
//!         println!("{}", start + i);
//!         scheduler.yield_now();
//!     }
//! }, 42);
//!
//! while scheduler.status(id) != Status::Dead {
//!     scheduler.resume(id);
//! }
//! ```
//!
//! The shared stack and execution contexts are internal;
//! coroutines are only ever driven through the scheduler.
//!
//! ```compile_fail
//! use coshare::stack::SharedStack;
//! ```

#![warn(missing_docs)]

pub use self::{
    config::*,
    coroutine::{CoroutineId, Status},
    error::*,
    scheduler::*,
};

mod config;
mod context;
mod coroutine;
mod error;
mod frame;
mod scheduler;
mod stack;
mod switch_cell;
