//! Core boundary types for zkweave
//!
//! These types describe what the compiler core decides about secret state and
//! hands to the generators: the boilerplate vocabulary (`bpType`), the
//! whole/partitioned classification of a state variable, and the compiler
//! configuration.

use crate::error::{Result, ZkWeaveError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A category of cryptographic boilerplate attached to a secret state variable.
///
/// The serialized names are the `bpType` strings understood by the circuit and
/// orchestration generators.
///
/// # Examples
///
/// ```
/// use zkweave_runtime::BoilerplateKind;
///
/// assert_eq!(BoilerplateKind::OldCommitmentExistence.as_str(), "oldCommitmentExistence");
/// assert_eq!(BoilerplateKind::ProofOfKeyOwnership.to_string(), "PoKoSK");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BoilerplateKind {
    #[serde(rename = "PoKoSK")]
    ProofOfKeyOwnership,
    #[serde(rename = "nullification")]
    Nullification,
    #[serde(rename = "oldCommitmentPreimage")]
    OldCommitmentPreimage,
    #[serde(rename = "oldCommitmentExistence")]
    OldCommitmentExistence,
    #[serde(rename = "newCommitment")]
    NewCommitment,
    #[serde(rename = "mapping")]
    Mapping,
    #[serde(rename = "encryption")]
    Encryption,
    #[serde(rename = "incrementation")]
    Incrementation,
    #[serde(rename = "decrementation")]
    Decrementation,
}

impl BoilerplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProofOfKeyOwnership => "PoKoSK",
            Self::Nullification => "nullification",
            Self::OldCommitmentPreimage => "oldCommitmentPreimage",
            Self::OldCommitmentExistence => "oldCommitmentExistence",
            Self::NewCommitment => "newCommitment",
            Self::Mapping => "mapping",
            Self::Encryption => "encryption",
            Self::Incrementation => "incrementation",
            Self::Decrementation => "decrementation",
        }
    }

    /// Whether this kind describes a partitioned write rather than a parameter.
    pub fn is_partitioned_write(&self) -> bool {
        matches!(self, Self::Incrementation | Self::Decrementation)
    }
}

impl fmt::Display for BoilerplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a secret state variable is represented on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StateClassification {
    /// One authoritative commitment, replaced wholesale on every write
    Whole,
    /// A multiset of commitments whose values sum to the true value
    Partitioned,
}

impl fmt::Display for StateClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Whole => f.write_str("whole"),
            Self::Partitioned => f.write_str("partitioned"),
        }
    }
}

/// Configuration for a compiler run
///
/// # Examples
///
/// ```
/// use zkweave_runtime::CompilerConfig;
///
/// let config = CompilerConfig::from_json_str(r#"{ "knownTokenInterfaces": ["IERC20"] }"#).unwrap();
/// assert!(config.is_known_token_interface("IERC20"));
/// assert!(!config.is_known_token_interface("ERC721"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerConfig {
    /// Contract type names recognised as common token interfaces. External
    /// calls on these produce an informational notice.
    pub known_token_interfaces: Vec<String>,
    /// Free-form parameters handed through to the generators
    custom_params: Vec<(String, String)>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            known_token_interfaces: ["ERC20", "IERC20", "ERC721", "IERC721", "ERC1155", "IERC1155"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            custom_params: Vec::new(),
        }
    }
}

impl CompilerConfig {
    pub fn from_json_str(input: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn is_known_token_interface(&self, contract_name: &str) -> bool {
        self.known_token_interfaces.iter().any(|name| name == contract_name)
    }

    pub fn custom_params(&self) -> &[(String, String)] {
        &self.custom_params
    }

    pub fn add_param(&mut self, key: String, value: String) {
        self.custom_params.push((key, value));
    }

    fn validate(&self) -> Result<()> {
        if let Some(empty) = self.known_token_interfaces.iter().position(|name| name.is_empty()) {
            return Err(ZkWeaveError::invalid_config(format!(
                "knownTokenInterfaces[{}] is empty",
                empty
            )));
        }
        if let Some((_, value)) = self.custom_params.iter().find(|(key, _)| key.is_empty()) {
            return Err(ZkWeaveError::invalid_config(format!(
                "custom parameter with value '{}' has an empty key",
                value
            )));
        }
        Ok(())
    }
}
