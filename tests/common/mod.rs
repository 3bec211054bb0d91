//! Common test utilities for bundlever integration tests.
//!
//! Provides `TestEnv` for isolated test environments: a temporary backup
//! bundle plus a private config directory so the user's real config.kdl is
//! never read.

#![allow(dead_code)]

use assert_cmd::Command;
use bundlever::codec::{self, EncodingKind};
use std::fs;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

pub const INFO_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>Build Version</key>
	<string>22G100</string>
	<key>Device Name</key>
	<string>Integration iPhone</string>
	<key>Product Type</key>
	<string>iPhone15,2</string>
	<key>Product Version</key>
	<string>18.6.2</string>
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
		<string>Integration iPhone</string>
		<key>ProductVersion</key>
		<string>18.6.2</string>
	</dict>
	<key>Version</key>
	<string>10.0</string>
</dict>
</plist>
"#;

/// Encode an XML fixture in the canonical form for `kind`.
pub fn canonical(xml: &str, kind: EncodingKind) -> Vec<u8> {
    let doc = codec::decode(xml.as_bytes(), EncodingKind::Textual).unwrap();
    codec::encode(&doc, kind).unwrap()
}

/// A test environment with an isolated bundle and config directory.
pub struct TestEnv {
    pub bundle_dir: TempDir,
    pub config_dir: TempDir,
}

impl TestEnv {
    /// Create a bundle with binary Info.plist and textual Manifest.plist.
    pub fn new() -> Self {
        Self::with_encodings(EncodingKind::Binary, EncodingKind::Textual)
    }

    pub fn with_encodings(info: EncodingKind, manifest: EncodingKind) -> Self {
        Self::with_documents(&canonical(INFO_XML, info), &canonical(MANIFEST_XML, manifest))
    }

    pub fn with_documents(info: &[u8], manifest: &[u8]) -> Self {
        let env = Self {
            bundle_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
        };
        fs::write(env.info_path(), info).unwrap();
        fs::write(env.manifest_path(), manifest).unwrap();
        env
    }

    /// Get a Command for the bundlever binary with an isolated config directory.
    pub fn bundlever(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_bundlever"));
        cmd.env("BUNDLEVER_CONFIG_DIR", self.config_dir.path());
        cmd.env_remove("BUNDLEVER_LOG");
        cmd
    }

    pub fn write_config(&self, kdl: &str) {
        fs::write(self.config_dir.path().join("config.kdl"), kdl).unwrap();
    }

    pub fn bundle_path(&self) -> &Path {
        self.bundle_dir.path()
    }

    pub fn bundle_arg(&self) -> String {
        self.bundle_dir.path().display().to_string()
    }

    pub fn info_path(&self) -> PathBuf {
        self.bundle_dir.path().join("Info.plist")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.bundle_dir.path().join("Manifest.plist")
    }

    pub fn read_info(&self) -> Vec<u8> {
        fs::read(self.info_path()).unwrap()
    }

    pub fn read_manifest(&self) -> Vec<u8> {
        fs::read(self.manifest_path()).unwrap()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a command's stdout as JSON.
pub fn parse_json(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).expect("stdout should be JSON")
}
