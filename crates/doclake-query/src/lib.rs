//! Query engine for the doclake engine.
//!
//! Evaluates JSONata-family expressions against a merged graph snapshot.
//! Three surfaces:
//!
//! - [`QueryEngine::pull_data`] — evaluate an expression, a bare lake path,
//!   or a literal against the graph
//! - [`QueryEngine::resolve_profile`] — resolve a dataset profile: `origin`
//!   entries first (recursively), bound as named variables, then `source`
//! - [`QueryDebugger`] — a registered debugger suspends evaluation
//!   cooperatively at each step until it answers with run/next/into/stop
//!
//! The expression language is a deliberate subset: path navigation,
//! variables, predicate filters, comparisons, `and`/`or`, and literals.
//! Source strings are discriminated once at ingestion into a closed
//! [`SourceKind`] union, never re-sniffed.

pub mod ast;
pub mod debugger;
pub mod engine;
pub mod error;
pub mod eval;
pub mod parser;
pub mod source;

pub use debugger::{DebugAction, DebugContext, DebugFrame, QueryDebugger};
pub use engine::{DataSourceResolver, QueryEngine, QueryOptions};
pub use error::{QueryError, Result};
pub use source::{DataSetProfile, OriginSet, SourceKind};
