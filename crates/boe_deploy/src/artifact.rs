//! Hardhat compilation outputs: the per-contract artifact and the build-info
//! file holding the exact compiler input.

use std::path::Path;

use alloy_primitives::Bytes;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardhatArtifact {
    pub contract_name: String,
    pub source_name: String,
    pub abi: Vec<Value>,
    pub bytecode: String,
}

impl HardhatArtifact {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read artifact {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("failed to parse artifact {}", path.display()))
    }

    /// Creation bytecode. Unlinked library placeholders are rejected.
    pub fn creation_code(&self) -> Result<Bytes> {
        if self.bytecode.contains("__") {
            anyhow::bail!("{} has unlinked library references", self.contract_name);
        }
        let code: Bytes = self
            .bytecode
            .parse()
            .with_context(|| format!("{} bytecode is not hex", self.contract_name))?;
        if code.is_empty() {
            anyhow::bail!("{} has no creation bytecode (abstract contract or interface?)", self.contract_name);
        }
        Ok(code)
    }

    /// `contracts/Foo.sol:Foo`, the name explorers expect.
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }

    /// Solidity types of the constructor parameters, in order.
    pub fn constructor_inputs(&self) -> Vec<String> {
        self.abi
            .iter()
            .find(|item| item.get("type").and_then(Value::as_str) == Some("constructor"))
            .and_then(|ctor| ctor.get("inputs"))
            .and_then(Value::as_array)
            .map(|inputs| {
                inputs
                    .iter()
                    .filter_map(|i| i.get("type").and_then(Value::as_str).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// The subset of a Hardhat `build-info/*.json` needed for verification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub solc_long_version: String,
    pub input: Value,
}

impl BuildInfo {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read build info {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("failed to parse build info {}", path.display()))
    }

    /// Compiler version in the `v0.8.28+commit.7893614a` form explorers use.
    pub fn compiler_version(&self) -> String {
        if self.solc_long_version.starts_with('v') {
            self.solc_long_version.clone()
        } else {
            format!("v{}", self.solc_long_version)
        }
    }

    /// Standard-JSON compiler input, serialized.
    pub fn standard_json_input(&self) -> Result<String> {
        serde_json::to_string(&self.input).context("failed to serialize compiler input")
    }
}
