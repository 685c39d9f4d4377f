// src/name.rs
//! Hierarchical names used for router identities, prefixes and request names.
//!
//! A name is an ordered list of components, written `/a/b/c`. The root name
//! `/` has no components.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("name must start with '/': {0:?}")]
    MissingSlash(String),
    #[error("empty component in name {0:?}")]
    EmptyComponent(String),
}

/// An immutable hierarchical name.
///
/// Ordering is component-wise, so a `BTreeMap<Name, _>` iterates in a stable
/// order. The wire codec relies on that for deterministic encoding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name {
    components: Vec<String>,
}

impl Name {
    /// The root name `/`.
    pub fn root() -> Self {
        Name::default()
    }

    pub fn from_components<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Name {
            components: components.into_iter().map(Into::into).collect(),
        }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Return a new name with `component` appended.
    pub fn append(&self, component: impl Into<String>) -> Self {
        let mut components = self.components.clone();
        components.push(component.into());
        Name { components }
    }

    /// Return a new name with all components of `other` appended.
    pub fn join(&self, other: &Name) -> Self {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        Name { components }
    }

    pub fn starts_with(&self, prefix: &Name) -> bool {
        self.components.starts_with(&prefix.components)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for c in &self.components {
            write!(f, "/{c}")?;
        }
        Ok(())
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| NameError::MissingSlash(s.to_string()))?;
        // Tolerate a single trailing slash ("/a/b/").
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if rest.is_empty() {
            return Ok(Name::root());
        }

        let mut components = Vec::new();
        for c in rest.split('/') {
            if c.is_empty() {
                return Err(NameError::EmptyComponent(s.to_string()));
            }
            components.push(c.to_string());
        }
        Ok(Name { components })
    }
}

impl TryFrom<String> for Name {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let n: Name = "/ndn/edu/ucla".parse().unwrap();
        assert_eq!(n.len(), 3);
        assert_eq!(n.to_string(), "/ndn/edu/ucla");
    }

    #[test]
    fn root_name() {
        let n: Name = "/".parse().unwrap();
        assert!(n.is_empty());
        assert_eq!(n.to_string(), "/");
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(
            "a/b".parse::<Name>(),
            Err(NameError::MissingSlash("a/b".into()))
        );
        assert!(matches!(
            "/a//b".parse::<Name>(),
            Err(NameError::EmptyComponent(_))
        ));
    }

    #[test]
    fn append_and_prefix() {
        let a: Name = "/a".parse().unwrap();
        let ab = a.append("b");
        assert_eq!(ab.to_string(), "/a/b");
        assert!(ab.starts_with(&a));
        assert!(!a.starts_with(&ab));
    }

    #[test]
    fn ordering_is_component_wise() {
        let a: Name = "/a/z".parse().unwrap();
        let b: Name = "/b".parse().unwrap();
        assert!(a < b);
    }

    #[test]
    fn serde_as_string() {
        let n: Name = serde_json::from_str("\"/x/y\"").unwrap();
        assert_eq!(n.to_string(), "/x/y");
        assert_eq!(serde_json::to_string(&n).unwrap(), "\"/x/y\"");
    }
}
