//! Update orchestration for a backup bundle.
//!
//! A run moves through typed states so a write can only happen after both
//! documents have been loaded and a target version pair has been chosen:
//!
//! ```text
//! Bundle::open -> LoadedBundle::load -> confirm -> ConfirmedUpdate
//!     -> prepare -> PreparedUpdate -> commit -> UpdateReport
//! ```
//!
//! Everything up to and including [`PreparedUpdate`] leaves the bundle as it
//! was: new content and backup copies only exist as temp files. Only
//! [`PreparedUpdate::commit`] renames files, every backup first, then Info,
//! then Manifest. The pair is not
//! transactional: if the second rename fails the run ends in
//! [`Error::MixedState`].

mod location;

pub use location::{DocumentRole, FieldLocation, VersionPair};

use std::fs;
use std::path::{Path, PathBuf};

use plist::Value;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::atomic::{self, CommitOptions, StagedFile};
use crate::codec::{self, EncodingKind, PropertyDocument};
use crate::path;
use crate::{Error, Result};

/// A validated backup bundle directory.
#[derive(Debug, Clone)]
pub struct Bundle {
    root: PathBuf,
}

impl Bundle {
    /// Validate that `root` is a directory holding both target documents.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            return Err(Error::InvalidBundle(format!(
                "path does not exist: {}",
                root.display()
            )));
        }
        if !root.is_dir() {
            return Err(Error::InvalidBundle(format!(
                "path is not a directory-like bundle: {}",
                root.display()
            )));
        }

        let bundle = Self { root };
        let missing: Vec<String> = DocumentRole::ALL
            .iter()
            .map(|role| bundle.document_path(*role))
            .filter(|p| !p.is_file())
            .map(|p| p.display().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::InvalidBundle(format!(
                "missing required files: {}",
                missing.join(", ")
            )));
        }
        Ok(bundle)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document_path(&self, role: DocumentRole) -> PathBuf {
        self.root.join(role.file_name())
    }
}

/// One decoded document and the version pair currently stored in it.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    role: DocumentRole,
    path: PathBuf,
    document: PropertyDocument,
    current: VersionPair,
    digest: String,
}

impl LoadedDocument {
    /// Decode the document at `path` and read both of its version fields.
    pub fn load(role: DocumentRole, path: &Path) -> Result<Self> {
        let load = || -> Result<Self> {
            let bytes = fs::read(path).map_err(|e| Error::Read {
                path: path.to_path_buf(),
                source: e,
            })?;
            let document = codec::decode_detected(&bytes)?;
            let current = read_pair(role, &document)?;
            debug!(
                document = %role,
                encoding = %document.encoding(),
                product = %current.product_version,
                build = %current.build_version,
                "loaded"
            );
            Ok(Self {
                role,
                path: path.to_path_buf(),
                document,
                current,
                digest: sha256_hex(&bytes),
            })
        };
        load().map_err(|e| e.in_document(role))
    }

    pub fn role(&self) -> DocumentRole {
        self.role
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn encoding(&self) -> EncodingKind {
        self.document.encoding()
    }

    pub fn current(&self) -> &VersionPair {
        &self.current
    }

    pub fn document(&self) -> &PropertyDocument {
        &self.document
    }
}

fn read_pair(role: DocumentRole, document: &PropertyDocument) -> Result<VersionPair> {
    let [product, build] = role.locations();
    let read = |location: FieldLocation| -> Result<String> {
        match path::get(document.root(), location.path) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(Error::MalformedDocument(format!(
                "{} is not a string",
                location.path
            ))),
            None => Err(Error::PathMissing(location.path.to_string())),
        }
    };
    Ok(VersionPair {
        product_version: read(product)?,
        build_version: read(build)?,
    })
}

/// Both documents of a bundle, decoded, with their current values read.
#[derive(Debug, Clone)]
pub struct LoadedBundle {
    bundle: Bundle,
    info: LoadedDocument,
    manifest: LoadedDocument,
}

impl LoadedBundle {
    /// Decode both documents and read all four fields.
    ///
    /// Fails without touching the filesystem if either document cannot be
    /// decoded or any field is missing.
    pub fn load(bundle: &Bundle) -> Result<Self> {
        let info = LoadedDocument::load(DocumentRole::Info, &bundle.document_path(DocumentRole::Info))?;
        let manifest = LoadedDocument::load(
            DocumentRole::Manifest,
            &bundle.document_path(DocumentRole::Manifest),
        )?;
        info!(bundle = %bundle.root().display(), "bundle loaded");
        Ok(Self {
            bundle: bundle.clone(),
            info,
            manifest,
        })
    }

    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    pub fn info(&self) -> &LoadedDocument {
        &self.info
    }

    pub fn manifest(&self) -> &LoadedDocument {
        &self.manifest
    }

    pub fn documents(&self) -> [&LoadedDocument; 2] {
        [&self.info, &self.manifest]
    }

    /// Current values of both documents, for display before confirmation.
    pub fn snapshot(&self) -> BundleSnapshot {
        BundleSnapshot {
            bundle: self.bundle.root().to_path_buf(),
            documents: self
                .documents()
                .iter()
                .map(|d| DocumentSnapshot {
                    document: d.role,
                    path: d.path.clone(),
                    encoding: d.encoding(),
                    product_version: d.current.product_version.clone(),
                    build_version: d.current.build_version.clone(),
                })
                .collect(),
        }
    }

    /// Record the caller's confirmed target values. Nothing is written yet.
    pub fn confirm(self, target: VersionPair) -> ConfirmedUpdate {
        ConfirmedUpdate {
            loaded: self,
            target,
        }
    }
}

/// Current values of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSnapshot {
    pub document: DocumentRole,
    pub path: PathBuf,
    pub encoding: EncodingKind,
    pub product_version: String,
    pub build_version: String,
}

/// Current values of both documents in a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleSnapshot {
    pub bundle: PathBuf,
    pub documents: Vec<DocumentSnapshot>,
}

/// A loaded bundle plus the version pair the caller agreed to apply.
#[derive(Debug, Clone)]
pub struct ConfirmedUpdate {
    loaded: LoadedBundle,
    target: VersionPair,
}

impl ConfirmedUpdate {
    pub fn target(&self) -> &VersionPair {
        &self.target
    }

    /// Set the fields, re-encode and stage both documents.
    ///
    /// Both documents are encoded before anything is staged, and both are
    /// staged before anything is renamed, so a failure here leaves both
    /// targets and any existing backups exactly as they were. Documents that already hold the target
    /// values are skipped.
    pub fn prepare(self, options: &CommitOptions) -> Result<PreparedUpdate> {
        let ConfirmedUpdate { loaded, target } = self;

        let mut encoded = Vec::with_capacity(2);
        for doc in [loaded.info, loaded.manifest] {
            let role = doc.role;
            let bytes = if doc.current == target {
                debug!(document = %role, "already at target");
                None
            } else {
                let mut document = doc.document.clone();
                apply_pair(role, &mut document, &target).map_err(|e| e.in_document(role))?;
                Some(codec::encode_pinned(&document).map_err(|e| e.in_document(role))?)
            };
            encoded.push((doc, bytes));
        }

        let mut documents = Vec::with_capacity(2);
        for (doc, bytes) in encoded {
            let staged = match &bytes {
                Some(bytes) => Some(
                    atomic::stage(&doc.path, bytes, options).map_err(|e| e.in_document(doc.role))?,
                ),
                None => None,
            };
            documents.push(PreparedDocument {
                before: doc,
                after_digest: bytes.as_deref().map(sha256_hex),
                staged,
            });
        }

        Ok(PreparedUpdate {
            bundle: loaded.bundle,
            target,
            documents,
        })
    }

    /// Prepare and commit in one step.
    pub fn apply(self, options: &CommitOptions) -> Result<UpdateReport> {
        self.prepare(options)?.commit()
    }
}

fn apply_pair(role: DocumentRole, document: &mut PropertyDocument, target: &VersionPair) -> Result<()> {
    let [product, build] = role.locations();
    path::set(
        document.root_mut(),
        product.path,
        Value::String(target.product_version.clone()),
    )?;
    path::set(
        document.root_mut(),
        build.path,
        Value::String(target.build_version.clone()),
    )?;
    Ok(())
}

#[derive(Debug)]
struct PreparedDocument {
    before: LoadedDocument,
    after_digest: Option<String>,
    staged: Option<StagedFile>,
}

/// Both documents encoded and staged next to their targets.
#[derive(Debug)]
pub struct PreparedUpdate {
    bundle: Bundle,
    target: VersionPair,
    documents: Vec<PreparedDocument>,
}

impl PreparedUpdate {
    /// Documents that will be rewritten by [`PreparedUpdate::commit`].
    pub fn pending(&self) -> Vec<DocumentRole> {
        self.documents
            .iter()
            .filter(|d| d.staged.is_some())
            .map(|d| d.before.role)
            .collect()
    }

    /// Put the backups in place, then rename the staged documents over their
    /// targets, Info first.
    pub fn commit(self) -> Result<UpdateReport> {
        let PreparedUpdate {
            bundle,
            target,
            mut documents,
        } = self;

        // Backups first, so a failed backup never follows a replaced target
        for doc in &mut documents {
            if let Some(staged) = doc.staged.as_mut() {
                let role = doc.before.role;
                staged.commit_backup().map_err(|e| e.in_document(role))?;
            }
        }

        let mut written: Option<DocumentRole> = None;
        let mut reports = Vec::with_capacity(documents.len());
        for doc in documents {
            let role = doc.before.role;
            let (status, backup) = match doc.staged {
                Some(staged) => match staged.commit() {
                    Ok(receipt) => {
                        info!(document = %role, "updated");
                        written.get_or_insert(role);
                        (DocumentStatus::Updated, receipt.backup)
                    }
                    Err(e) => {
                        return Err(match written {
                            Some(written) => {
                                warn!(written = %written, failed = %role, "bundle left in mixed state");
                                Error::MixedState {
                                    written,
                                    failed: role,
                                    source: Box::new(e),
                                }
                            }
                            None => e.in_document(role),
                        });
                    }
                },
                None => (DocumentStatus::Unchanged, None),
            };
            reports.push(DocumentReport {
                document: role,
                path: doc.before.path.clone(),
                encoding: doc.before.encoding(),
                status,
                before: doc.before.current.clone(),
                after: target.clone(),
                backup,
                digest_before: doc.before.digest.clone(),
                digest_after: doc.after_digest.unwrap_or(doc.before.digest),
            });
        }

        Ok(UpdateReport {
            bundle: bundle.root().to_path_buf(),
            target,
            documents: reports,
        })
    }
}

/// Whether a document was rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Updated,
    /// Already held the target values; not rewritten
    Unchanged,
}

/// Outcome for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentReport {
    pub document: DocumentRole,
    pub path: PathBuf,
    pub encoding: EncodingKind,
    pub status: DocumentStatus,
    pub before: VersionPair,
    pub after: VersionPair,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,
    /// SHA-256 of the file before the run
    pub digest_before: String,
    /// SHA-256 of the file after the run
    pub digest_after: String,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub bundle: PathBuf,
    pub target: VersionPair,
    pub documents: Vec<DocumentReport>,
}

impl UpdateReport {
    pub fn any_updated(&self) -> bool {
        self.documents
            .iter()
            .any(|d| d.status == DocumentStatus::Updated)
    }
}

/// Load `bundle_path`, apply `target` to both documents and commit.
pub fn update_bundle(
    bundle_path: impl Into<PathBuf>,
    target: VersionPair,
    options: &CommitOptions,
) -> Result<UpdateReport> {
    let bundle = Bundle::open(bundle_path)?;
    LoadedBundle::load(&bundle)?.confirm(target).apply(options)
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
