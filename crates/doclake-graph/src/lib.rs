//! Manifest graph loader for the doclake engine.
//!
//! A [`ManifestGraph`] assembles the merged data graph from one or more
//! mounted manifest files. Mounting fetches a manifest through the protocol
//! registry, decodes it through the content registry, merges its subtree
//! into the graph, and transitively mounts any manifests it declares under
//! its `imports` key.
//!
//! Merge precedence is mount order: later mounts win. Object nodes merge
//! key-wise; arrays and scalars are replaced wholesale. The merged graph is
//! rebuilt wholesale on reload, never incrementally patched — transaction
//! commits go through file content mutation followed by a scoped reload of
//! the affected URIs.

pub mod error;
pub mod graph;
pub mod manifest;
pub mod merge;

pub use error::{GraphError, Result};
pub use graph::ManifestGraph;
pub use manifest::{Manifest, ReloadPattern};
pub use merge::deep_merge;
