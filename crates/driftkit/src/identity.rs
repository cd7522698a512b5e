//! Resource identity and matching keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How identities are compared when matching baseline against live state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Identities are equal iff names are equal
    #[default]
    NameOnly,
    /// Names and resource types must both be equal
    NameAndType,
}

impl MatchMode {
    /// Pick the mode from a `match_by_type` flag.
    pub fn from_flag(match_by_type: bool) -> Self {
        if match_by_type {
            Self::NameAndType
        } else {
            Self::NameOnly
        }
    }
}

/// Identifies a resource by name and, where known, type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity {
    /// Resource name (the `name:` literal, or the symbolic name)
    pub name: String,
    /// Fully-qualified resource type, e.g. `Microsoft.Network/virtualNetworks`
    pub resource_type: Option<String>,
}

impl ResourceIdentity {
    /// Create an identity with a known type.
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_type: Some(resource_type.into()),
        }
    }

    /// Create an identity whose type is unknown.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_type: None,
        }
    }

    /// Project this identity onto the key used for matching.
    ///
    /// Types are compared ASCII case-insensitively; Azure treats
    /// `Microsoft.Network/virtualNetworks` and `microsoft.network/virtualnetworks`
    /// as the same type.
    pub fn key(&self, mode: MatchMode) -> ResourceKey {
        let resource_type = match mode {
            MatchMode::NameOnly => None,
            MatchMode::NameAndType => self.resource_type.as_deref().map(str::to_ascii_lowercase),
        };
        ResourceKey {
            name: self.name.clone(),
            resource_type,
        }
    }

    /// Whether two identities match under the given mode.
    pub fn matches(&self, other: &Self, mode: MatchMode) -> bool {
        self.key(mode) == other.key(mode)
    }

    /// Type for display, `unknown` when not known.
    pub fn type_or_unknown(&self) -> &str {
        self.resource_type.as_deref().unwrap_or("unknown")
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.type_or_unknown())
    }
}

/// Ordered, hashable projection of an identity under a [`MatchMode`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Resource name
    pub name: String,
    /// Lowercased type, present only in strict mode
    pub resource_type: Option<String>,
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource_type {
            Some(t) => write!(f, "{}|{}", self.name, t),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Whether `resource_type` is one of `types` (ASCII case-insensitive).
pub fn type_in<'a, I>(resource_type: &str, types: I) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    types
        .into_iter()
        .any(|t| t.eq_ignore_ascii_case(resource_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_only_ignores_type() {
        let a = ResourceIdentity::new("vnetA", "Microsoft.Network/virtualNetworks");
        let b = ResourceIdentity::new("vnetA", "Microsoft.Compute/virtualMachines");
        assert!(a.matches(&b, MatchMode::NameOnly));
        assert!(!a.matches(&b, MatchMode::NameAndType));
    }

    #[test]
    fn test_strict_mode_is_case_insensitive_on_type() {
        let a = ResourceIdentity::new("vnetA", "Microsoft.Network/virtualNetworks");
        let b = ResourceIdentity::new("vnetA", "microsoft.network/VIRTUALNETWORKS");
        assert!(a.matches(&b, MatchMode::NameAndType));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let a = ResourceIdentity::untyped("vnetA");
        let b = ResourceIdentity::untyped("VNETA");
        assert!(!a.matches(&b, MatchMode::NameOnly));
    }

    #[test]
    fn test_key_display() {
        let id = ResourceIdentity::new("sqlX", "Microsoft.Sql/servers");
        assert_eq!(id.key(MatchMode::NameOnly).to_string(), "sqlX");
        assert_eq!(
            id.key(MatchMode::NameAndType).to_string(),
            "sqlX|microsoft.sql/servers"
        );
        assert_eq!(id.to_string(), "sqlX (Microsoft.Sql/servers)");
    }

    #[test]
    fn test_type_in() {
        let types = vec!["Microsoft.Something/exotic".to_string()];
        assert!(type_in("microsoft.something/EXOTIC", &types));
        assert!(!type_in("Microsoft.Something/other", &types));
    }
}
