//! Extra items for talking to the operating system.
//!
//! This crate provides a thin, low-level interface to the operating system.
//! The functions in this crate are named after their underlying calls,
//! and their behavior is identical except for the differences listed below.
//! The exact semantics of each function can be found in their man pages.
//! This is in contrast with the std crate, which gives no such guarantees.
//! This is a trade-off against cross-platform compatibility.
//!
//! # Differences with underlying calls
//!
//! Errors are reported using [`Result`] rather than
//! through `errno` and an arbitrary return value.
//!
//! [`makecontext`] accepts a single pointer argument
//! rather than a variable number of `int` arguments.
//! See its documentation for how to retrieve the pointer.
//!
//! [`Result`]: `std::io::Result`

#![warn(missing_docs)]

pub use {
    self::{sys_mman::*, ucontext::*, unistd::*},
    libc::{
        MAP_ANONYMOUS, MAP_PRIVATE, MAP_STACK,
        PROT_NONE, PROT_READ, PROT_WRITE,
        _SC_PAGESIZE,
        ucontext_t,
    },
};

mod sys_mman;
mod ucontext;
mod unistd;
