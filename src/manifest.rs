//! Manifest Parser.
//!
//! Loads a manifest document from a source (path or byte buffer) and
//! produces the generic tree (here: the typed `Manifest`, since Rust's
//! `serde` deserialization already gives us a generic-enough tree while
//! preserving structure for later stages). The parser never interprets
//! semantics: cross-reference and domain rules live in `reference`.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthesisError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceFramework {
    Commercial,
    FedrampModerate,
    FedrampHigh,
}

impl ComplianceFramework {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceFramework::Commercial => "commercial",
            ComplianceFramework::FedrampModerate => "fedramp-moderate",
            ComplianceFramework::FedrampHigh => "fedramp-high",
        }
    }

    pub fn is_fedramp(&self) -> bool {
        !matches!(self, ComplianceFramework::Commercial)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Read,
    Write,
    Readwrite,
    Admin,
    Use,
    Invoke,
    Consume,
    Forward,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingDirective {
    pub from: String,
    pub to: String,
    pub capability: String,
    pub access: AccessMode,
    #[serde(default)]
    pub env: IndexMap<String, String>,
    #[serde(default)]
    pub options: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerDirective {
    pub from: String,
    pub event: String,
    pub to: String,
    pub action: String,
    #[serde(default)]
    pub configuration: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub service: String,
    pub owner: String,
    pub compliance_framework: ComplianceFramework,
    pub environment: String,
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
    #[serde(default)]
    pub binds: Vec<BindingDirective>,
    #[serde(default)]
    pub triggers: Vec<TriggerDirective>,
    #[serde(default)]
    pub tags: IndexMap<String, String>,
    #[serde(default)]
    pub extensions: serde_json::Value,
}

/// Source a manifest is parsed from. The parser accepts either extension;
/// content is self-describing.
pub enum ManifestSource<'a> {
    Path(&'a Path),
    Bytes { content: &'a [u8], label: &'a str },
}

pub fn parse(source: ManifestSource<'_>) -> Result<(Manifest, serde_json::Value)> {
    let (bytes, label) = match source {
        ManifestSource::Path(path) => {
            let bytes = fs::read(path).map_err(|source| SynthesisError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            (bytes, path.display().to_string())
        }
        ManifestSource::Bytes { content, label } => (content.to_vec(), label.to_string()),
    };

    let text = String::from_utf8_lossy(&bytes);

    let raw: serde_json::Value = serde_yaml_bw::from_str(&text).map_err(|err| SynthesisError::InvalidYaml {
        source_label: label.clone(),
        message: err.to_string(),
    })?;

    let manifest: Manifest = serde_json::from_value(raw.clone()).map_err(|err| SynthesisError::InvalidYaml {
        source_label: label,
        message: err.to_string(),
    })?;

    Ok((manifest, raw))
}
