//! Concurrency control shared by the analysis pipeline
//!
//! - [`limiter`]: bounds how many futures run at once
//! - [`scheduler`]: coalesces bursts of triggers into few executions
//! - [`any_of`]: short-circuiting disjunction over async checks

pub mod any_of;
pub mod limiter;
pub mod scheduler;

pub use any_of::any_of;
pub use limiter::ConcurrencyLimiter;
pub use scheduler::CoalescingScheduler;
