//! High-level SDK for the doclake engine.
//!
//! Provides a unified API over the protocol and content registries, the
//! manifest graph, the query engine, transactions, and file following.
//! This is the main entry point for applications embedding a data lake.

pub mod config;
pub mod editors;
pub mod error;
pub mod lake;
pub mod memory;

pub use config::LakeConfig;
pub use editors::{DifferDescriptor, EditorDescriptor, PatternRegistry};
pub use error::{Result, SdkError};
pub use lake::DataLake;
pub use memory::MemoryDriver;

// Re-export key types
pub use doclake_follow::FollowHandle;
pub use doclake_graph::ReloadPattern;
pub use doclake_query::{DataSetProfile, QueryOptions};
pub use doclake_types::{
    ChangeAction, DataLakeChange, DataLakePath, InitStatus, LakeEvent, ObjectUrl, Problem,
    TransactionStatus,
};
