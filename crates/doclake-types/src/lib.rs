//! Foundation types for the doclake engine.
//!
//! This crate provides the addressing, mutation, and lifecycle types used
//! throughout the doclake workspace. Every other doclake crate depends on
//! `doclake-types`.
//!
//! # Key Types
//!
//! - [`DataLakePath`] — Validated `/`-delimited address of a node in the
//!   merged data graph
//! - [`ObjectUrl`] — Richer `@entity/path` addressing for declared domain
//!   objects with an optional presentation and query parameters
//! - [`DataLakeChange`] — The atomic unit of mutation against the graph
//! - [`TransactionStatus`] / [`InitStatus`] — Lifecycle state enums
//! - [`Problem`] — "Errors as data" record for the problem channel
//! - [`LakeEvent`] — Events emitted around reloads and transactions

pub mod change;
pub mod error;
pub mod event;
pub mod object_url;
pub mod path;
pub mod problem;
pub mod status;

pub use change::{ChangeAction, DataLakeChange};
pub use error::TypeError;
pub use event::LakeEvent;
pub use object_url::ObjectUrl;
pub use path::DataLakePath;
pub use problem::Problem;
pub use status::{InitStatus, TransactionStatus};
