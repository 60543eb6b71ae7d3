//! Capability guards
//!
//! Guards mediate attribute access, item access, and imports while a
//! fragment runs. Each guard is a closed set of variants rather than an
//! ad hoc closure, so policies stay composable and testable apart from
//! execution. The predicate variants exist for embedders that need a
//! custom decision function; they cannot be expressed in policy files.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// How an item capability is being exercised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemAccess {
    /// Subscript read (`x[k]`)
    Get,
    /// Subscript write (`x[k] = v`)
    Set,
    /// Iteration (`for v in x`)
    Iterate,
    /// Sequence unpacking (`a, b = x`)
    Unpack,
}

impl ItemAccess {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemAccess::Get => "get",
            ItemAccess::Set => "set",
            ItemAccess::Iterate => "iterate",
            ItemAccess::Unpack => "unpack",
        }
    }
}

/// Decision function for attribute get/set.
#[derive(Clone)]
pub enum AttributeGuard {
    /// Refuse every attribute access
    DenyAll,
    /// Allow ordinary attributes, refuse underscore-prefixed names
    Standard,
    /// Custom predicate over (receiver type or module name, attribute name)
    Predicate(Arc<dyn Fn(&str, &str) -> bool + Send + Sync>),
}

impl AttributeGuard {
    /// Wrap a custom predicate.
    pub fn predicate(f: impl Fn(&str, &str) -> bool + Send + Sync + 'static) -> Self {
        AttributeGuard::Predicate(Arc::new(f))
    }

    /// True if touching `attr` on a value of `target` is allowed.
    pub fn allows(&self, target: &str, attr: &str) -> bool {
        match self {
            AttributeGuard::DenyAll => false,
            AttributeGuard::Standard => !attr.starts_with('_'),
            AttributeGuard::Predicate(pred) => pred(target, attr),
        }
    }
}

impl fmt::Debug for AttributeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeGuard::DenyAll => f.write_str("AttributeGuard::DenyAll"),
            AttributeGuard::Standard => f.write_str("AttributeGuard::Standard"),
            AttributeGuard::Predicate(_) => f.write_str("AttributeGuard::Predicate(..)"),
        }
    }
}

/// Decision function for subscript, iteration, and unpack operations.
#[derive(Clone)]
pub enum ItemGuard {
    /// Refuse every item operation
    DenyAll,
    /// Allow all item operations on container values
    Standard,
    /// Custom predicate over (container type name, access kind)
    Predicate(Arc<dyn Fn(&str, ItemAccess) -> bool + Send + Sync>),
}

impl ItemGuard {
    /// Wrap a custom predicate.
    pub fn predicate(f: impl Fn(&str, ItemAccess) -> bool + Send + Sync + 'static) -> Self {
        ItemGuard::Predicate(Arc::new(f))
    }

    /// True if `access` on a value of `container` is allowed.
    pub fn allows(&self, container: &str, access: ItemAccess) -> bool {
        match self {
            ItemGuard::DenyAll => false,
            ItemGuard::Standard => true,
            ItemGuard::Predicate(pred) => pred(container, access),
        }
    }
}

impl fmt::Debug for ItemGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemGuard::DenyAll => f.write_str("ItemGuard::DenyAll"),
            ItemGuard::Standard => f.write_str("ItemGuard::Standard"),
            ItemGuard::Predicate(_) => f.write_str("ItemGuard::Predicate(..)"),
        }
    }
}

/// Decision function for imports, applied after the module allow-list.
#[derive(Clone)]
pub enum ImportGuard {
    /// Refuse every import
    DenyAll,
    /// Defer entirely to the policy's module allow-list
    Standard,
    /// Custom predicate over the module name
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl ImportGuard {
    /// Wrap a custom predicate.
    pub fn predicate(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        ImportGuard::Predicate(Arc::new(f))
    }

    /// True if importing `module` is allowed.
    pub fn allows(&self, module: &str) -> bool {
        match self {
            ImportGuard::DenyAll => false,
            ImportGuard::Standard => true,
            ImportGuard::Predicate(pred) => pred(module),
        }
    }
}

impl fmt::Debug for ImportGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportGuard::DenyAll => f.write_str("ImportGuard::DenyAll"),
            ImportGuard::Standard => f.write_str("ImportGuard::Standard"),
            ImportGuard::Predicate(_) => f.write_str("ImportGuard::Predicate(..)"),
        }
    }
}

/// Declarative guard selection for policy files.
///
/// Predicates are code, not data, so a file can only choose between the
/// closed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardConfig {
    DenyAll,
    #[default]
    Standard,
}

impl GuardConfig {
    pub fn attribute_guard(self) -> AttributeGuard {
        match self {
            GuardConfig::DenyAll => AttributeGuard::DenyAll,
            GuardConfig::Standard => AttributeGuard::Standard,
        }
    }

    pub fn item_guard(self) -> ItemGuard {
        match self {
            GuardConfig::DenyAll => ItemGuard::DenyAll,
            GuardConfig::Standard => ItemGuard::Standard,
        }
    }

    pub fn import_guard(self) -> ImportGuard {
        match self {
            GuardConfig::DenyAll => ImportGuard::DenyAll,
            GuardConfig::Standard => ImportGuard::Standard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_attribute_guard_refuses_underscores() {
        let guard = AttributeGuard::Standard;
        assert!(guard.allows("math", "sqrt"));
        assert!(guard.allows("list", "append"));
        assert!(!guard.allows("math", "_private"));
        assert!(!guard.allows("dict", "__class__"));
    }

    #[test]
    fn test_deny_all_guards() {
        assert!(!AttributeGuard::DenyAll.allows("math", "pi"));
        assert!(!ItemGuard::DenyAll.allows("list", ItemAccess::Get));
        assert!(!ImportGuard::DenyAll.allows("math"));
    }

    #[test]
    fn test_standard_item_and_import_guards_allow() {
        assert!(ItemGuard::Standard.allows("list", ItemAccess::Set));
        assert!(ItemGuard::Standard.allows("dict", ItemAccess::Iterate));
        assert!(ImportGuard::Standard.allows("anything"));
    }

    #[test]
    fn test_predicate_guards_are_honored() {
        let attrs = AttributeGuard::predicate(|target, attr| target == "math" && attr == "pi");
        assert!(attrs.allows("math", "pi"));
        assert!(!attrs.allows("math", "sqrt"));

        let items = ItemGuard::predicate(|_, access| access != ItemAccess::Set);
        assert!(items.allows("list", ItemAccess::Get));
        assert!(!items.allows("list", ItemAccess::Set));

        let imports = ImportGuard::predicate(|module| module == "math");
        assert!(imports.allows("math"));
        assert!(!imports.allows("os"));
    }

    #[test]
    fn test_item_access_names() {
        assert_eq!(ItemAccess::Get.as_str(), "get");
        assert_eq!(ItemAccess::Set.as_str(), "set");
        assert_eq!(ItemAccess::Iterate.as_str(), "iterate");
        assert_eq!(ItemAccess::Unpack.as_str(), "unpack");
    }

    #[test]
    fn test_guard_config_default_and_parsing() {
        assert_eq!(GuardConfig::default(), GuardConfig::Standard);

        let parsed: GuardConfig = serde_json::from_str(r#""deny_all""#).unwrap();
        assert_eq!(parsed, GuardConfig::DenyAll);
        let parsed: GuardConfig = serde_json::from_str(r#""standard""#).unwrap();
        assert_eq!(parsed, GuardConfig::Standard);
    }

    #[test]
    fn test_guard_config_conversions() {
        assert!(matches!(
            GuardConfig::DenyAll.attribute_guard(),
            AttributeGuard::DenyAll
        ));
        assert!(matches!(GuardConfig::Standard.item_guard(), ItemGuard::Standard));
        assert!(matches!(
            GuardConfig::DenyAll.import_guard(),
            ImportGuard::DenyAll
        ));
    }
}
