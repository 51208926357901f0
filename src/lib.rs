//! A shared byte budget for capping how much data is buffered in memory at once.
//!
//! Producers and consumers moving data at different speeds (network to disk, or disk to network)
//! reserve bytes before buffering them and release them once the data has been handed on. The
//! [CacheLimiter] refuses, or makes callers wait, when the budget is used up.

#![deny(missing_docs)]

#[cfg(doctest)]
use doc_comment::doctest;
#[cfg(doctest)]
doctest!("../README.md");

mod error;
pub mod limiter;

pub use error::WaitError;
pub use limiter::{CacheLimiter, LimiterState, Options, Reservation};
