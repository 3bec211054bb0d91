//! Read and replace values at nested key paths inside a document.
//!
//! A [`KeyPath`] names a chain of dictionary keys, e.g. `Lockdown.BuildVersion`.
//! Walking never creates missing intermediate dictionaries: a path that does
//! not resolve all the way to an existing leaf is reported as missing.

use plist::{Dictionary, Value};

use crate::{Error, Result};

/// A chain of dictionary keys from the document root to a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPath<'a>(&'a [&'a str]);

impl<'a> KeyPath<'a> {
    pub const fn new(segments: &'a [&'a str]) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &'a [&'a str] {
        self.0
    }

    /// Split into the parent chain and the leaf key.
    fn split_leaf(&self) -> Option<(&'a [&'a str], &'a str)> {
        let (leaf, parents) = self.0.split_last()?;
        Some((parents, *leaf))
    }
}

impl std::fmt::Display for KeyPath<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// Look up the value at `path`, or `None` if any segment does not resolve.
pub fn get<'d>(root: &'d Dictionary, path: KeyPath<'_>) -> Option<&'d Value> {
    let (parents, leaf) = path.split_leaf()?;
    let mut node = root;
    for &key in parents {
        node = node.get(key)?.as_dictionary()?;
    }
    node.get(leaf)
}

/// Look up the string at `path`.
///
/// A present but non-string leaf reads as `None`.
pub fn get_str<'d>(root: &'d Dictionary, path: KeyPath<'_>) -> Option<&'d str> {
    get(root, path)?.as_string()
}

/// Replace the existing value at `path`, returning the previous value.
///
/// Sibling keys and their order are left untouched.
pub fn set(root: &mut Dictionary, path: KeyPath<'_>, value: Value) -> Result<Value> {
    let missing = || Error::PathMissing(path.to_string());
    let (parents, leaf) = path.split_leaf().ok_or_else(missing)?;

    let mut node = root;
    for &key in parents {
        node = node
            .get_mut(key)
            .and_then(Value::as_dictionary_mut)
            .ok_or_else(missing)?;
    }
    let slot = node.get_mut(leaf).ok_or_else(missing)?;
    Ok(std::mem::replace(slot, value))
}
