//! Loading of the compiled NFT contract artifact

use std::{fs, path::Path};

use alloy_primitives::Bytes;
use serde::Deserialize;

use crate::errors::DeployError;

/// The compiled contract, as much of it as deployment needs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractArtifact {
    /// The contract name recorded by the compiler, if any
    pub contract_name: Option<String>,
    /// The creation bytecode
    pub bytecode: Bytes,
    /// The compiler version recorded in the artifact, if any
    pub compiler_version: Option<String>,
}

/// A JSON compilation artifact
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    /// The contract name
    #[serde(default)]
    contract_name: Option<String>,
    /// The creation bytecode
    bytecode: RawBytecode,
    /// Compiler metadata
    #[serde(default)]
    compiler: Option<RawCompiler>,
}

/// Bytecode is either a bare hex string or wrapped in an object
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    /// A hex string
    Hex(String),
    /// An object holding the hex string
    Object {
        /// The hex string
        object: String,
    },
}

/// Compiler metadata of an artifact
#[derive(Deserialize)]
struct RawCompiler {
    /// The compiler version string
    version: Option<String>,
}

impl ContractArtifact {
    /// Load an artifact from a JSON artifact file, or from a `.bin` hex file
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            DeployError::Configuration(format!("error reading artifact {}: {e}", path.display()))
        })?;

        let artifact = if path.extension().is_some_and(|ext| ext == "bin") {
            Self::from_hex(&contents)
        } else {
            Self::from_json(&contents)
        };
        artifact.map_err(|e| e.context(format!("artifact {}", path.display())))
    }

    /// Parse a JSON compilation artifact
    pub fn from_json(json: &str) -> Result<Self, DeployError> {
        let raw: RawArtifact = serde_json::from_str(json)
            .map_err(|e| DeployError::Configuration(format!("error parsing artifact: {e}")))?;

        let hex = match raw.bytecode {
            RawBytecode::Hex(hex) | RawBytecode::Object { object: hex } => hex,
        };

        Ok(Self {
            contract_name: raw.contract_name,
            bytecode: parse_bytecode(&hex)?,
            compiler_version: raw.compiler.and_then(|c| c.version),
        })
    }

    /// Parse raw hex-encoded creation bytecode
    pub fn from_hex(hex: &str) -> Result<Self, DeployError> {
        Ok(Self {
            contract_name: None,
            bytecode: parse_bytecode(hex)?,
            compiler_version: None,
        })
    }

    /// Whether the artifact was built with the expected solc version.
    ///
    /// Artifacts that do not record a version are accepted.
    pub fn matches_compiler(&self, expected: &str) -> bool {
        match &self.compiler_version {
            Some(version) => version
                .strip_prefix(expected)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('+')),
            None => true,
        }
    }

    /// The init code of a creation transaction: bytecode followed by the
    /// encoded constructor arguments
    pub fn init_code(&self, encoded_args: &[u8]) -> Bytes {
        let mut code = Vec::with_capacity(self.bytecode.len() + encoded_args.len());
        code.extend_from_slice(&self.bytecode);
        code.extend_from_slice(encoded_args);
        code.into()
    }
}

/// Decode creation bytecode, rejecting empty and unlinked code
fn parse_bytecode(hex: &str) -> Result<Bytes, DeployError> {
    let hex = hex.trim();
    if hex.contains("__") {
        return Err(DeployError::Configuration(
            "bytecode contains unlinked library placeholders".to_string(),
        ));
    }

    let bytecode: Bytes = hex
        .parse()
        .map_err(|e| DeployError::Configuration(format!("invalid bytecode: {e}")))?;
    if bytecode.is_empty() {
        return Err(DeployError::Configuration(
            "artifact has no creation bytecode".to_string(),
        ));
    }

    Ok(bytecode)
}

#[cfg(test)]
mod tests {
    use crate::errors::DeployError;

    use super::ContractArtifact;

    #[test]
    fn test_truffle_artifact() {
        let artifact = ContractArtifact::from_json(
            r#"{
                "contractName": "NFT",
                "abi": [],
                "bytecode": "0x6080604052",
                "compiler": { "name": "solc", "version": "0.8.4+commit.c7e474f2.Emscripten.clang" }
            }"#,
        )
        .unwrap();

        assert_eq!(artifact.contract_name.as_deref(), Some("NFT"));
        assert_eq!(artifact.bytecode.to_vec(), vec![0x60, 0x80, 0x60, 0x40, 0x52]);
        assert!(artifact.matches_compiler("0.8.4"));
        assert!(!artifact.matches_compiler("0.8.1"));
    }

    #[test]
    fn test_object_bytecode() {
        let artifact =
            ContractArtifact::from_json(r#"{ "bytecode": { "object": "0x6001" } }"#).unwrap();
        assert_eq!(artifact.bytecode.to_vec(), vec![0x60, 0x01]);
        assert!(artifact.matches_compiler("0.8.4"));
    }

    #[test]
    fn test_compiler_prefix_is_not_a_match() {
        let artifact = ContractArtifact::from_json(
            r#"{ "bytecode": "0x6001", "compiler": { "version": "0.8.40" } }"#,
        )
        .unwrap();
        assert!(!artifact.matches_compiler("0.8.4"));
    }

    #[test]
    fn test_empty_bytecode_rejected() {
        let err = ContractArtifact::from_json(r#"{ "bytecode": "0x" }"#).unwrap_err();
        assert!(matches!(err, DeployError::Configuration(_)));
    }

    #[test]
    fn test_unlinked_bytecode_rejected() {
        let err = ContractArtifact::from_hex("0x6080__$abcdef$__6040").unwrap_err();
        assert!(err.message().contains("unlinked"));
    }

    #[test]
    fn test_init_code_appends_args() {
        let artifact = ContractArtifact::from_hex("0x6080\n").unwrap();
        let init_code = artifact.init_code(&[0xaa, 0xbb]);
        assert_eq!(init_code.to_vec(), vec![0x60, 0x80, 0xaa, 0xbb]);
    }

    #[test]
    fn test_load_bin_file() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("NFT.bin");
        std::fs::write(&path, "6080604052")?;

        let artifact = ContractArtifact::load(&path)?;
        assert_eq!(artifact.bytecode.len(), 5);
        Ok(())
    }
}
