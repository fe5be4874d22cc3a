//! Debounced file-follow service.
//!
//! Consumers register handlers against resource URIs; change
//! notifications for a URI are debounced so a burst of writes fires the
//! handlers once, after the burst settles.

pub mod error;
pub mod follow;
pub mod scheduler;

pub use error::{FollowError, Result};
pub use follow::{FollowHandle, FollowService, DEBOUNCE_WINDOW};
pub use scheduler::Scheduler;
