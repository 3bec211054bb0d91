//! Command implementations for the Bundlever CLI.
//!
//! Each command returns a value implementing [`Output`] so `main` can print it
//! as JSON or as human-readable text:
//! - `show` - read the current versions of a bundle
//! - `update` - confirm, then rewrite both documents
//! - `config` - resolved configuration with sources

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::atomic::CommitOptions;
use crate::config::ResolvedConfig;
use crate::update::{
    Bundle, BundleSnapshot, DocumentStatus, LoadedBundle, UpdateReport, VersionPair,
};
use crate::{Error, Result};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

/// Validate the bundle and decode both documents.
pub fn load(bundle_path: &Path) -> Result<LoadedBundle> {
    let bundle = Bundle::open(expand_home(bundle_path))?;
    LoadedBundle::load(&bundle)
}

// === show ===

/// Current versions of a bundle.
#[derive(Debug, Serialize)]
pub struct ShowResult {
    #[serde(flatten)]
    pub snapshot: BundleSnapshot,
}

impl Output for ShowResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec!["Current values:".to_string()];
        for doc in &self.snapshot.documents {
            let [product, build] = doc.document.locations();
            lines.push(format!(
                "- {} ({}): {}={:?}, {}={:?}",
                doc.document,
                doc.encoding,
                product.path,
                doc.product_version,
                build.path,
                doc.build_version
            ));
        }
        lines.join("\n")
    }
}

/// Read the current versions of a bundle.
pub fn show(bundle_path: &Path) -> Result<ShowResult> {
    Ok(ShowResult {
        snapshot: load(bundle_path)?.snapshot(),
    })
}

// === update ===

/// Outcome of `update`.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum UpdateResult {
    /// The caller declined; nothing was written
    Cancelled {
        #[serde(flatten)]
        snapshot: BundleSnapshot,
    },
    Done {
        #[serde(flatten)]
        report: UpdateReport,
    },
}

impl Output for UpdateResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match self {
            UpdateResult::Cancelled { .. } => "Cancelled. No changes made.".to_string(),
            UpdateResult::Done { report } => {
                let mut lines = Vec::new();
                for doc in &report.documents {
                    match doc.status {
                        DocumentStatus::Updated => lines.push(format!(
                            "Updated {}: Product Version {} -> {}, Build Version {} -> {}",
                            doc.document,
                            doc.before.product_version,
                            doc.after.product_version,
                            doc.before.build_version,
                            doc.after.build_version
                        )),
                        DocumentStatus::Unchanged => lines.push(format!(
                            "{} already has target versions. No change.",
                            doc.document
                        )),
                    }
                    if let Some(backup) = &doc.backup {
                        lines.push(format!("  backup: {}", backup.display()));
                    }
                }
                if report.any_updated() {
                    lines.push("Done: Plists updated as requested.".to_string());
                } else {
                    lines.push(
                        "No changes: Both plists already contained target versions.".to_string(),
                    );
                }
                lines.join("\n")
            }
        }
    }
}

/// Answers to the interactive questions asked before an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Declined,
    Confirmed(VersionPair),
}

/// Ask for confirmation, then for any version not given on the command line.
///
/// End of input counts as "no" for the confirmation and as an empty answer
/// for the version prompts.
pub fn confirm_update<R: BufRead, W: Write>(
    input: &mut R,
    prompt: &mut W,
    skip_confirmation: bool,
    product_version: Option<String>,
    build_version: Option<String>,
) -> Result<Confirmation> {
    if !skip_confirmation {
        let answer = ask(input, prompt, "Overwrite with new version? (Y/N): ")?;
        if !matches!(answer.to_lowercase().as_str(), "y" | "yes") {
            return Ok(Confirmation::Declined);
        }
    }

    let product_version = match product_version.filter(|v| !v.trim().is_empty()) {
        Some(v) => v,
        None => ask(input, prompt, "Enter Product Version (e.g., 17.0): ")?,
    };
    if product_version.trim().is_empty() {
        return Err(Error::InvalidInput(
            "no Product Version provided; use --version or the interactive prompt".to_string(),
        ));
    }

    let build_version = match build_version.filter(|v| !v.trim().is_empty()) {
        Some(v) => v,
        None => ask(input, prompt, "Enter Build Version (e.g., 21A123): ")?,
    };
    if build_version.trim().is_empty() {
        return Err(Error::InvalidInput(
            "no Build Version provided; use --build or the interactive prompt".to_string(),
        ));
    }

    Ok(Confirmation::Confirmed(VersionPair::new(
        product_version,
        build_version,
    )?))
}

fn ask<R: BufRead, W: Write>(input: &mut R, prompt: &mut W, question: &str) -> Result<String> {
    write!(prompt, "{}", question)?;
    prompt.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Apply a confirmed decision to a loaded bundle.
pub fn update(
    loaded: LoadedBundle,
    confirmation: Confirmation,
    options: &CommitOptions,
) -> Result<UpdateResult> {
    match confirmation {
        Confirmation::Declined => Ok(UpdateResult::Cancelled {
            snapshot: loaded.snapshot(),
        }),
        Confirmation::Confirmed(target) => Ok(UpdateResult::Done {
            report: loaded.confirm(target).apply(options)?,
        }),
    }
}

// === config ===

/// Resolved configuration.
#[derive(Debug, Serialize)]
pub struct ConfigResult {
    #[serde(flatten)]
    pub config: ResolvedConfig,
}

impl Output for ConfigResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let path = match &self.config.path {
            Some(path) => path.display().to_string(),
            None => "(no config directory)".to_string(),
        };
        let mut doc = self.config.effective().to_kdl();
        doc.autoformat();
        format!(
            "// {}\n// backup: {}, output-format: {}\n{}",
            path, self.config.backup.source, self.config.output_format.source, doc
        )
        .trim_end()
        .to_string()
    }
}

/// Wrap the resolved configuration for display.
pub fn config(resolved: &ResolvedConfig) -> ConfigResult {
    ConfigResult {
        config: resolved.clone(),
    }
}
