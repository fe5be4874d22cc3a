//! URI resolution for the doclake engine.
//!
//! Two operations live here:
//!
//! - [`resolve_uri`] folds a sequence of absolute and relative references
//!   left-to-right into one absolute URI, with `"."` meaning "the base file
//!   itself" (used when a document's `template`/`source` field is `"."`).
//! - [`relative_path`] computes a minimal relative path between two URIs
//!   that may carry a `repo@branch@` prefix. Mismatched prefixes mean no
//!   relative form exists, in which case the target is returned unchanged.

pub mod error;

pub use error::{ResolverError, Result};

use url::Url;

/// Fold URI parts left-to-right using URL-relative resolution.
///
/// The first part must be an absolute URI. Each subsequent part is resolved
/// against the accumulated result; an absolute part replaces it entirely. A
/// part equal to `"."` is a self-reference and leaves the accumulator
/// untouched.
pub fn resolve_uri(parts: &[&str]) -> Result<String> {
    let (first, rest) = parts.split_first().ok_or(ResolverError::Empty)?;
    let mut base = Url::parse(first).map_err(|e| ResolverError::Value {
        uri: first.to_string(),
        reason: e.to_string(),
    })?;
    for part in rest {
        if *part == "." {
            continue;
        }
        base = base.join(part).map_err(|e| ResolverError::Value {
            uri: part.to_string(),
            reason: e.to_string(),
        })?;
    }
    Ok(base.to_string())
}

/// Parse a URI that may be relative, anchoring it to an opaque `null:/` base.
fn parse_loose(input: &str) -> Result<Url> {
    Url::parse(input)
        .or_else(|_| Url::parse("null:/").and_then(|base| base.join(input)))
        .map_err(|e| ResolverError::Value {
            uri: input.to_string(),
            reason: e.to_string(),
        })
}

/// Compute a minimal relative path from `base` to `target`.
///
/// Both URIs may carry a repository/branch prefix, `repo@branch@/path`. If
/// the `@`-segment counts or prefix values differ the target is returned
/// unchanged: no relative form exists between different repositories or
/// branches, and that is an expected outcome, not an error. Once the prefix
/// is stripped, the remaining URIs must share a scheme and host.
pub fn relative_path(base: &str, target: &str) -> Result<String> {
    let base_struct: Vec<&str> = base.split('@').collect();
    let target_struct: Vec<&str> = target.split('@').collect();
    if base_struct.len() != target_struct.len()
        || base_struct[..base_struct.len() - 1] != target_struct[..target_struct.len() - 1]
    {
        return Ok(target.to_string());
    }

    let base_url = parse_loose(base_struct.last().copied().unwrap_or("/"))?;
    let target_url = parse_loose(target_struct.last().copied().unwrap_or("/"))?;
    if base_url.scheme() != target_url.scheme() || base_url.host_str() != target_url.host_str() {
        return Err(ResolverError::HostMismatch {
            base: base.to_string(),
            target: target.to_string(),
        });
    }

    let base_segments: Vec<&str> = base_url.path().split('/').filter(|s| !s.is_empty()).collect();
    let target_segments: Vec<&str> =
        target_url.path().split('/').filter(|s| !s.is_empty()).collect();

    let mut common = 0;
    while common < base_segments.len()
        && common < target_segments.len()
        && base_segments[common] == target_segments[common]
    {
        common += 1;
    }

    let mut relative: Vec<&str> = Vec::new();
    // The last base segment is the file name, which does not count as a
    // directory level to climb out of.
    for _ in (common + 1)..base_segments.len() {
        relative.push("..");
    }
    relative.extend(&target_segments[common..]);
    Ok(relative.join("/"))
}
