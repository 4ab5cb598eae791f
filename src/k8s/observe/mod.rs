pub mod backoff;
pub mod conditions;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod handler;
pub mod poller;
pub mod resource;
pub mod source;
pub mod watch_loop;

pub use backoff::{RetryPolicy, RetryState};
pub use conditions::{Condition, WaitFor};
pub use dispatch::{SessionEnd, SessionReport, dispatch_session};
pub use errors::ClientError;
pub use handler::HandlerSet;
pub use poller::{WaitError, WaitOutcome, WaitSpec, poll_until};
pub use resource::{ChangeEvent, EventKind, ResourceIdentity, ResourceKind, Snapshot};
pub use source::{EventStream, ResourceClient};
pub use watch_loop::{WatchError, WatchLoop, WatchSpec, WatchStats};
