//! Bundlever - rewrite the OS version fields of a device backup bundle.
//!
//! This library provides the core functionality for the `bundlever` CLI tool:
//! decoding property-list documents in whichever encoding they were stored,
//! editing nested fields in place, and persisting the result with an atomic
//! rename so an interrupted run never leaves a half-written file behind.

pub mod atomic;
pub mod cli;
pub mod codec;
pub mod commands;
pub mod config;
pub mod logging;
pub mod path;
pub mod update;

use std::path::PathBuf;

use update::DocumentRole;

/// Test utilities for isolated test environments.
#[cfg(test)]
pub(crate) mod test_utils {
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    use crate::codec::{self, EncodingKind};

    pub const INFO_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>Build Version</key>
	<string>22G100</string>
	<key>Device Name</key>
	<string>Test iPhone</string>
	<key>GUID</key>
	<string>8A0C2E5B1F6D4C3A</string>
	<key>Last Backup Date</key>
	<date>2025-03-14T09:26:53Z</date>
	<key>Product Type</key>
	<string>iPhone15,2</string>
	<key>Product Version</key>
	<string>18.6.2</string>
	<key>iTunes Settings</key>
	<dict>
		<key>LibraryApplications</key>
		<array>
			<string>com.example.notes</string>
			<string>com.example.maps</string>
		</array>
	</dict>
</dict>
</plist>
"#;

    pub const MANIFEST_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>IsEncrypted</key>
	<false/>
	<key>Lockdown</key>
	<dict>
		<key>BuildVersion</key>
		<string>22G100</string>
		<key>DeviceName</key>
		<string>Test iPhone</string>
		<key>ProductType</key>
		<string>iPhone15,2</string>
		<key>ProductVersion</key>
		<string>18.6.2</string>
		<key>com.apple.Accessibility</key>
		<dict>
			<key>ClosedCaptioningEnabledByiTunes</key>
			<integer>0</integer>
		</dict>
	</dict>
	<key>SystemDomainsVersion</key>
	<real>24.5</real>
	<key>Version</key>
	<string>10.0</string>
	<key>WasPasscodeSet</key>
	<true/>
	<key>Salt</key>
	<data>3q2+7w==</data>
</dict>
</plist>
"#;

    /// Info document written by Python's plistlib (XML), byte for byte.
    pub const PLISTLIB_INFO_XML: &[u8] = include_bytes!("testdata/Info.xml.plist");

    /// Manifest document written by Python's plistlib (binary), byte for byte.
    pub const PLISTLIB_MANIFEST_BINARY: &[u8] = include_bytes!("testdata/Manifest.bin.plist");

    /// Re-encode a textual fixture into the canonical bytes for `kind`.
    pub fn canonical(xml: &str, kind: EncodingKind) -> Vec<u8> {
        let doc = codec::decode(xml.as_bytes(), EncodingKind::Textual).unwrap();
        codec::encode(&doc, kind).unwrap()
    }

    /// Temporary backup bundle holding an Info and a Manifest document.
    pub struct TestBundle {
        pub dir: TempDir,
    }

    impl TestBundle {
        /// Create a bundle whose documents use the given encodings.
        pub fn new(info: EncodingKind, manifest: EncodingKind) -> Self {
            Self::with_documents(&canonical(INFO_XML, info), &canonical(MANIFEST_XML, manifest))
        }

        /// Create a bundle from raw document bytes.
        pub fn with_documents(info: &[u8], manifest: &[u8]) -> Self {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("Info.plist"), info).unwrap();
            fs::write(dir.path().join("Manifest.plist"), manifest).unwrap();
            Self { dir }
        }

        pub fn path(&self) -> &Path {
            self.dir.path()
        }

        pub fn info_path(&self) -> PathBuf {
            self.dir.path().join("Info.plist")
        }

        pub fn manifest_path(&self) -> PathBuf {
            self.dir.path().join("Manifest.plist")
        }
    }
}

/// Process exit codes for non-interactive embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    /// Bad input paths, bundle layout, or arguments
    ValidationFailed = 2,
    /// Either document could not be read or decoded
    ParseFailed = 3,
    /// Either target field is absent
    FieldMissing = 4,
    /// A commit failed, possibly after the other document was written
    WriteFailed = 5,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Library-level error type for Bundlever operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unrecognized property-list format: {0}")]
    UnrecognizedFormat(String),

    #[error("Malformed property list: {0}")]
    MalformedDocument(String),

    #[error("Key path not found: {0}")]
    PathMissing(String),

    #[error("Cannot read metadata of {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot back up {} to {}: {source}", path.display(), backup.display())]
    Backup {
        path: PathBuf,
        backup: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{role}: {source}")]
    Document {
        role: DocumentRole,
        #[source]
        source: Box<Error>,
    },

    #[error("Mixed state: {written} was updated but {failed} was not: {source}")]
    MixedState {
        written: DocumentRole,
        failed: DocumentRole,
        #[source]
        source: Box<Error>,
    },

    #[error("Invalid bundle: {0}")]
    InvalidBundle(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Attach the document the error happened on.
    pub fn in_document(self, role: DocumentRole) -> Self {
        Error::Document {
            role,
            source: Box::new(self),
        }
    }

    /// Exit code a non-interactive caller should report for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::Document { source, .. } => source.exit_code(),
            Error::Read { .. } | Error::UnrecognizedFormat(_) | Error::MalformedDocument(_) => {
                ExitCode::ParseFailed
            }
            Error::PathMissing(_) => ExitCode::FieldMissing,
            Error::Stat { .. }
            | Error::Backup { .. }
            | Error::Write { .. }
            | Error::MixedState { .. } => ExitCode::WriteFailed,
            // Plain I/O errors only come from the confirmation prompt
            Error::Io(_) | Error::InvalidBundle(_) | Error::InvalidInput(_) | Error::Config(_) => {
                ExitCode::ValidationFailed
            }
        }
    }

    /// Documents that were already persisted when this error was raised.
    ///
    /// Only a mixed-state failure leaves anything modified; every other error
    /// is raised before the first rename.
    pub fn modified_documents(&self) -> Vec<DocumentRole> {
        match self {
            Error::MixedState { written, .. } => vec![*written],
            _ => Vec::new(),
        }
    }

    /// One-line statement of what happened to the bundle, for display.
    pub fn modification_notice(&self) -> String {
        match self {
            Error::MixedState { written, failed, .. } => format!(
                "The bundle is in a mixed state: {} holds the new versions, {} still holds the old ones.",
                written, failed
            ),
            _ => "No files were modified.".to_string(),
        }
    }
}

/// Result type alias for Bundlever operations.
pub type Result<T> = std::result::Result<T, Error>;
