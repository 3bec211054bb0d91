//! KDL schema for config.kdl.

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User preferences stored in config.kdl.
///
/// # KDL Schema
///
/// ```kdl
/// backup #true           // write <file>.bak before updating
/// output-format "human"  // or "json"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleverConfig {
    /// Copy each document to `<file>.bak` before rewriting it
    pub backup: Option<bool>,

    /// Default output format for CLI commands
    pub output_format: Option<OutputFormat>,
}

impl BundleverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config from a KDL document.
    ///
    /// Unknown nodes are ignored; a known node with a value of the wrong type
    /// is an error.
    pub fn from_kdl(doc: &KdlDocument) -> Result<Self, String> {
        let mut config = Self::new();

        if let Some(value) = first_value(doc, "backup") {
            config.backup = Some(
                value
                    .as_bool()
                    .ok_or_else(|| format!("backup must be #true or #false, got {}", value))?,
            );
        }

        if let Some(value) = first_value(doc, "output-format") {
            let format = value
                .as_string()
                .and_then(OutputFormat::parse)
                .ok_or_else(|| format!("output-format must be \"json\" or \"human\", got {}", value))?;
            config.output_format = Some(format);
        }

        Ok(config)
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(backup) = self.backup {
            let mut node = KdlNode::new("backup");
            node.push(KdlEntry::new(KdlValue::Bool(backup)));
            doc.nodes_mut().push(node);
        }

        if let Some(format) = self.output_format {
            let mut node = KdlNode::new("output-format");
            node.push(KdlEntry::new(KdlValue::String(format.as_str().to_string())));
            doc.nodes_mut().push(node);
        }

        doc
    }
}

fn first_value<'d>(doc: &'d KdlDocument, name: &str) -> Option<&'d KdlValue> {
    doc.get(name)?.entries().first().map(|entry| entry.value())
}
