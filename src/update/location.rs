//! Fixed field locations inside the two bundle documents.

use serde::Serialize;

use crate::path::KeyPath;
use crate::{Error, Result};

/// Which of the two bundle documents a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentRole {
    Info,
    Manifest,
}

impl DocumentRole {
    /// Commit order.
    pub const ALL: [DocumentRole; 2] = [DocumentRole::Info, DocumentRole::Manifest];

    pub fn file_name(&self) -> &'static str {
        match self {
            DocumentRole::Info => "Info.plist",
            DocumentRole::Manifest => "Manifest.plist",
        }
    }

    /// Product and build version locations, in that order.
    ///
    /// Info keeps both at the top level with spaces in the key names; Manifest
    /// nests them under `Lockdown` without spaces.
    pub fn locations(&self) -> [FieldLocation; 2] {
        match self {
            DocumentRole::Info => [INFO_PRODUCT_VERSION, INFO_BUILD_VERSION],
            DocumentRole::Manifest => [MANIFEST_PRODUCT_VERSION, MANIFEST_BUILD_VERSION],
        }
    }
}

impl std::fmt::Display for DocumentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// A field inside one of the bundle documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLocation {
    pub role: DocumentRole,
    pub path: KeyPath<'static>,
}

pub const INFO_PRODUCT_VERSION: FieldLocation = FieldLocation {
    role: DocumentRole::Info,
    path: KeyPath::new(&["Product Version"]),
};

pub const INFO_BUILD_VERSION: FieldLocation = FieldLocation {
    role: DocumentRole::Info,
    path: KeyPath::new(&["Build Version"]),
};

pub const MANIFEST_PRODUCT_VERSION: FieldLocation = FieldLocation {
    role: DocumentRole::Manifest,
    path: KeyPath::new(&["Lockdown", "ProductVersion"]),
};

pub const MANIFEST_BUILD_VERSION: FieldLocation = FieldLocation {
    role: DocumentRole::Manifest,
    path: KeyPath::new(&["Lockdown", "BuildVersion"]),
};

/// A product version and build version written together.
///
/// Only emptiness is checked; whether a version string is plausible is up to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionPair {
    pub product_version: String,
    pub build_version: String,
}

impl VersionPair {
    pub fn new(product_version: impl Into<String>, build_version: impl Into<String>) -> Result<Self> {
        let product_version = product_version.into().trim().to_string();
        let build_version = build_version.into().trim().to_string();
        if product_version.is_empty() {
            return Err(Error::InvalidInput(
                "no Product Version provided".to_string(),
            ));
        }
        if build_version.is_empty() {
            return Err(Error::InvalidInput("no Build Version provided".to_string()));
        }
        Ok(Self {
            product_version,
            build_version,
        })
    }
}

impl std::fmt::Display for VersionPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.product_version, self.build_version)
    }
}
