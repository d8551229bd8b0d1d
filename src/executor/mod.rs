//! Upload executor boundary.
//!
//! Platform modules implement `UploadExecutor`; the scheduler only ever sees
//! this interface. What happens inside, browser automation or API calls, is
//! out of scope here.

mod contract;
mod registry;

pub use contract::{FailureKind, UploadExecutor, UploadOutcome, UploadRequest};
pub use registry::ExecutorRegistry;
