//! Retry policy: pure backoff computation, no live state.

mod policy;

pub use policy::{RetryPolicy, RetryStrategy};
