//! Transport protocol contract for the doclake engine.
//!
//! A [`ProtocolDriver`] is a pluggable transport (git hosting, HTTP, an
//! in-memory store) that serves resource requests for a URI scheme. The
//! [`ProtocolRegistry`] maps schemes to driver instances and is the only way
//! engine components reach a transport — there is no ambient global state.
//!
//! Beyond the classic HTTP verbs, drivers may support:
//!
//! - `SCAN` — resource metadata, including folder listings
//! - `VERSIONS` — version history of a resource
//! - `COMMIT` / `PUSH` — batched file mutation with a structured action list
//! - `CHECKOUT` — branch creation
//!
//! A driver signals non-support of an operation by omitting the method from
//! [`ProtocolDriver::available_methods_for`].

pub mod driver;
pub mod error;
pub mod registry;
pub mod request;

pub use driver::{BootstrapContext, ProtocolDriver};
pub use error::{ProtocolError, Result};
pub use registry::ProtocolRegistry;
pub use request::{
    CommitAction, ProtocolMethod, RequestConfig, ResourceFileMeta, ResourceMeta, Response,
};
