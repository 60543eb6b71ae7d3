//! Sandbox policy definition
//!
//! A policy is the complete capability table for one sandbox: which
//! builtins resolve, which modules may be imported, and which guards
//! mediate attribute access, item access, and imports. Anything the
//! policy does not name is unreachable from executed code. Policies are
//! plain data supplied by the embedding application, never computed by
//! inspecting a live runtime.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sandbox::guards::{AttributeGuard, GuardConfig, ImportGuard, ItemGuard};
use crate::sandbox::{builtins, modules};

/// Sandbox policy errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Policy parse error: {0}")]
    ParseError(String),

    #[error("Invalid policy field: {field} - {reason}")]
    InvalidField { field: String, reason: String },
}

/// Capability table for a sandbox.
#[derive(Debug, Clone)]
pub struct SandboxPolicy {
    /// Builtin functions resolvable from executed code
    pub builtins: BTreeSet<String>,
    /// Modules that may be imported
    pub modules: BTreeSet<String>,
    /// Guard for attribute get/set
    pub attribute_guard: AttributeGuard,
    /// Guard for subscript, iteration, and unpack operations
    pub item_guard: ItemGuard,
    /// Guard applied to imports after the module allow-list
    pub import_guard: ImportGuard,
}

impl SandboxPolicy {
    /// Every registry builtin and module, with standard guards.
    pub fn baseline() -> Self {
        SandboxPolicy {
            builtins: builtins::names().map(String::from).collect(),
            modules: modules::names().map(String::from).collect(),
            attribute_guard: AttributeGuard::Standard,
            item_guard: ItemGuard::Standard,
            import_guard: ImportGuard::Standard,
        }
    }

    /// Empty allow-lists and deny-all guards.
    pub fn locked() -> Self {
        SandboxPolicy {
            builtins: BTreeSet::new(),
            modules: BTreeSet::new(),
            attribute_guard: AttributeGuard::DenyAll,
            item_guard: ItemGuard::DenyAll,
            import_guard: ImportGuard::DenyAll,
        }
    }

    /// Load a policy from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, PolicyError> {
        let file: PolicyFile =
            toml::from_str(content).map_err(|e| PolicyError::ParseError(e.to_string()))?;
        Ok(file.into_policy())
    }

    /// Load a policy from a JSON string.
    pub fn from_json(content: &str) -> Result<Self, PolicyError> {
        let file: PolicyFile =
            serde_json::from_str(content).map_err(|e| PolicyError::ParseError(e.to_string()))?;
        Ok(file.into_policy())
    }

    /// Validate policy.
    ///
    /// Names absent from the registries are permitted here; they simply
    /// never resolve at runtime.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for name in &self.builtins {
            if name.is_empty() {
                return Err(PolicyError::InvalidField {
                    field: "builtins".to_string(),
                    reason: "builtin name cannot be empty".to_string(),
                });
            }
        }
        for name in &self.modules {
            if name.is_empty() {
                return Err(PolicyError::InvalidField {
                    field: "modules".to_string(),
                    reason: "module name cannot be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Allow one more builtin.
    pub fn allow_builtin(mut self, name: impl Into<String>) -> Self {
        self.builtins.insert(name.into());
        self
    }

    /// Allow one more module.
    pub fn allow_module(mut self, name: impl Into<String>) -> Self {
        self.modules.insert(name.into());
        self
    }

    /// Replace the attribute guard.
    pub fn with_attribute_guard(mut self, guard: AttributeGuard) -> Self {
        self.attribute_guard = guard;
        self
    }

    /// Replace the item guard.
    pub fn with_item_guard(mut self, guard: ItemGuard) -> Self {
        self.item_guard = guard;
        self
    }

    /// Replace the import guard.
    pub fn with_import_guard(mut self, guard: ImportGuard) -> Self {
        self.import_guard = guard;
        self
    }
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        SandboxPolicy::locked()
    }
}

/// Serialized policy shape. Guards are declarative (`GuardConfig`);
/// predicate guards can only be attached in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    builtins: Vec<String>,

    #[serde(default)]
    modules: Vec<String>,

    #[serde(default)]
    attribute_guard: GuardConfig,

    #[serde(default)]
    item_guard: GuardConfig,

    #[serde(default)]
    import_guard: GuardConfig,
}

impl PolicyFile {
    fn into_policy(self) -> SandboxPolicy {
        SandboxPolicy {
            builtins: self.builtins.into_iter().collect(),
            modules: self.modules.into_iter().collect(),
            attribute_guard: self.attribute_guard.attribute_guard(),
            item_guard: self.item_guard.item_guard(),
            import_guard: self.import_guard.import_guard(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_toml() {
        let toml_str = r#"
            builtins = ["len", "sum"]
            modules = ["math"]
            attribute_guard = "standard"
            item_guard = "standard"
            import_guard = "deny_all"
        "#;

        let policy = SandboxPolicy::from_toml(toml_str).unwrap();
        assert!(policy.builtins.contains("len"));
        assert!(policy.builtins.contains("sum"));
        assert!(policy.modules.contains("math"));
        assert!(matches!(policy.attribute_guard, AttributeGuard::Standard));
        assert!(matches!(policy.import_guard, ImportGuard::DenyAll));
    }

    #[test]
    fn test_policy_from_toml_defaults() {
        let policy = SandboxPolicy::from_toml("").unwrap();
        assert!(policy.builtins.is_empty());
        assert!(policy.modules.is_empty());
        assert!(matches!(policy.attribute_guard, AttributeGuard::Standard));
        assert!(matches!(policy.item_guard, ItemGuard::Standard));
        assert!(matches!(policy.import_guard, ImportGuard::Standard));
    }

    #[test]
    fn test_policy_from_json() {
        let json_str = r#"{
            "builtins": ["abs"],
            "modules": ["math", "string"],
            "import_guard": "standard"
        }"#;

        let policy = SandboxPolicy::from_json(json_str).unwrap();
        assert!(policy.builtins.contains("abs"));
        assert!(policy.modules.contains("string"));
    }

    #[test]
    fn test_policy_parse_error() {
        let result = SandboxPolicy::from_toml("builtins = not-a-list");
        assert!(matches!(result, Err(PolicyError::ParseError(_))));
    }

    #[test]
    fn test_validate_rejects_empty_names() {
        let policy = SandboxPolicy::locked().allow_builtin("");
        let err = policy.validate().unwrap_err();
        assert!(matches!(err, PolicyError::InvalidField { field, .. } if field == "builtins"));

        let policy = SandboxPolicy::locked().allow_module("");
        let err = policy.validate().unwrap_err();
        assert!(matches!(err, PolicyError::InvalidField { field, .. } if field == "modules"));
    }

    #[test]
    fn test_validate_accepts_unknown_names() {
        // Unknown entries stay in the table; the registries refuse them later.
        let policy = SandboxPolicy::locked()
            .allow_builtin("frobnicate")
            .allow_module("os");
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_baseline_covers_registries() {
        let policy = SandboxPolicy::baseline();
        assert!(policy.builtins.contains("len"));
        assert!(policy.builtins.contains("sorted"));
        assert!(policy.modules.contains("math"));
        assert!(policy.modules.contains("string"));
        assert!(matches!(policy.attribute_guard, AttributeGuard::Standard));
    }

    #[test]
    fn test_locked_denies_everything() {
        let policy = SandboxPolicy::locked();
        assert!(policy.builtins.is_empty());
        assert!(policy.modules.is_empty());
        assert!(matches!(policy.attribute_guard, AttributeGuard::DenyAll));
        assert!(matches!(policy.item_guard, ItemGuard::DenyAll));
        assert!(matches!(policy.import_guard, ImportGuard::DenyAll));
    }

    #[test]
    fn test_default_is_locked() {
        let policy = SandboxPolicy::default();
        assert!(policy.builtins.is_empty());
        assert!(matches!(policy.import_guard, ImportGuard::DenyAll));
    }

    #[test]
    fn test_builder_helpers() {
        let policy = SandboxPolicy::locked()
            .allow_builtin("len")
            .allow_module("math")
            .with_attribute_guard(AttributeGuard::Standard)
            .with_item_guard(ItemGuard::Standard)
            .with_import_guard(ImportGuard::Standard);

        assert!(policy.builtins.contains("len"));
        assert!(policy.modules.contains("math"));
        assert!(matches!(policy.item_guard, ItemGuard::Standard));
    }
}
