use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Wire form of the "all services" wildcard.
pub const WILDCARD: &str = "*";

/// A managed host or device, addressed by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(String);

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Entity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Entity {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// The alert services a change targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceScope {
    /// Every service on the entity.
    All,
    /// Only the named services.
    Named(BTreeSet<String>),
}

impl ServiceScope {
    /// Build a scope from names; a `*` anywhere in the list means [`ServiceScope::All`].
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() || names.contains(WILDCARD) {
            Self::All
        } else {
            Self::Named(names)
        }
    }

    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn contains(&self, service: &str) -> bool {
        match self {
            Self::All => true,
            Self::Named(names) => names.contains(service),
        }
    }

    /// Services present in both scopes.
    pub fn intersect(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::All, scope) | (scope, Self::All) => scope.clone(),
            (Self::Named(a), Self::Named(b)) => Self::Named(a.intersection(b).cloned().collect()),
        }
    }

    pub fn is_subset_of(&self, other: &Self) -> bool {
        match (self, other) {
            (_, Self::All) => true,
            (Self::All, Self::Named(_)) => false,
            (Self::Named(a), Self::Named(b)) => a.is_subset(b),
        }
    }

    /// True for a named scope with no services left in it.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Named(names) if names.is_empty())
    }

    /// The `service_list` sent to the monitoring API.
    pub fn to_wire(&self) -> Vec<String> {
        match self {
            Self::All => vec![WILDCARD.to_string()],
            Self::Named(names) => names.iter().cloned().collect(),
        }
    }
}

impl fmt::Display for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire().join(", "))
    }
}
