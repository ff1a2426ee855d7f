//! Resilient execution of the analysis job.
//!
//! This module provides the retry loop that rotates backends on
//! rate-limit failures and backs off between attempts.

pub mod backend;
pub mod retry;

pub use backend::{Backend, BackendPool, BackendPoolError};
pub use retry::{
    execute, AttemptError, Completed, ErrorKind, ExhaustedRetriesError, Job, RetryPolicy,
    RetryState, Sleeper, TokioSleeper,
};
