//! Transaction manager for the doclake engine.
//!
//! Changes pushed against the lake are not written through immediately.
//! They accumulate inside a transaction as versioned per-file mutations;
//! `commit` writes the final content of every touched file through its
//! protocol driver, `rollback` discards everything. At most one
//! transaction is open at a time.

pub mod error;
pub mod manager;
pub mod mutation;

pub use error::{Result, TxnError};
pub use manager::TransactionManager;
pub use mutation::{FileMutation, FileMutationKind};
