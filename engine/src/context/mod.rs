//! Repository context: loading, canonical form, fingerprint and deltas.
//!
//! The context is produced by an external collector and consumed read-only.
//! Its fingerprint keys the result cache and deduplicates work across runs.

pub mod types;

pub use types::*;

use crate::errors::{FacultyError, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Metadata fields that change on every collection and carry no meaning
const VOLATILE_METADATA_FIELDS: &[&str] = &["collected_at"];

impl RepositoryContext {
    /// Load a context snapshot from a JSON file.
    ///
    /// Missing, unreadable or malformed files are fatal for a run.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FacultyError::context_with_source(
                format!("failed to read context at {}", path.display()),
                e,
            )
        })?;
        Self::parse(&contents).map_err(|e| match e {
            FacultyError::ContextUnavailable { message, source } => {
                FacultyError::ContextUnavailable {
                    message: format!("{message} ({})", path.display()),
                    source,
                }
            }
            other => other,
        })
    }

    /// Parse a context snapshot from a JSON string
    pub fn parse(contents: &str) -> Result<Self> {
        let ctx: RepositoryContext = serde_json::from_str(contents)
            .map_err(|e| FacultyError::context_with_source("malformed context JSON", e))?;
        if ctx.metadata.name.trim().is_empty() {
            return Err(FacultyError::context("context metadata.name is empty"));
        }
        Ok(ctx)
    }

    /// Canonical JSON value: sorted keys, volatile metadata removed
    pub fn canonical_value(&self) -> Result<Value> {
        let mut value = serde_json::to_value(self)
            .map_err(|e| FacultyError::internal_with_source("failed to serialize context", e))?;
        if let Some(metadata) = value.get_mut("metadata").and_then(Value::as_object_mut) {
            for field in VOLATILE_METADATA_FIELDS {
                metadata.remove(*field);
            }
        }
        Ok(canonicalize(&value))
    }

    /// Canonical compact JSON string
    pub fn canonical_string(&self) -> Result<String> {
        let value = self.canonical_value()?;
        serde_json::to_string(&value)
            .map_err(|e| FacultyError::internal_with_source("failed to encode context", e))
    }

    /// Stable SHA-256 fingerprint of the canonical form (hex)
    pub fn fingerprint(&self) -> Result<String> {
        Ok(compute_hash(&self.canonical_string()?))
    }
}

/// Rebuild a JSON value with object keys inserted in sorted order
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let mut out = Map::new();
            for (key, inner) in sorted {
                out.insert(key.clone(), canonicalize(inner));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Compute SHA-256 hash of input, returning hex string
pub fn compute_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Structural difference between two contexts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextDelta {
    /// Leaves whose value differs or that exist on one side only
    pub changed_nodes: usize,
    /// Leaves in the union of both trees
    pub total_nodes: usize,
}

impl ContextDelta {
    /// Diff two contexts leaf by leaf over their canonical forms
    pub fn between(previous: &RepositoryContext, current: &RepositoryContext) -> Result<Self> {
        let mut before = BTreeMap::new();
        flatten_leaves("", &previous.canonical_value()?, &mut before);
        let mut after = BTreeMap::new();
        flatten_leaves("", &current.canonical_value()?, &mut after);

        let mut changed = 0usize;
        let mut total = 0usize;
        for (path, value) in &before {
            total += 1;
            if after.get(path) != Some(value) {
                changed += 1;
            }
        }
        for path in after.keys() {
            if !before.contains_key(path) {
                total += 1;
                changed += 1;
            }
        }

        Ok(Self {
            changed_nodes: changed,
            total_nodes: total,
        })
    }

    /// changed / total; an empty diff has ratio 0
    pub fn change_ratio(&self) -> f64 {
        if self.total_nodes == 0 {
            0.0
        } else {
            self.changed_nodes as f64 / self.total_nodes as f64
        }
    }
}

fn flatten_leaves(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, inner) in map {
                flatten_leaves(&format!("{prefix}/{key}"), inner, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (idx, inner) in items.iter().enumerate() {
                flatten_leaves(&format!("{prefix}/{idx}"), inner, out);
            }
        }
        leaf => {
            out.insert(prefix.to_string(), leaf.clone());
        }
    }
}
