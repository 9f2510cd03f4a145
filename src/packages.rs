// src/packages.rs

//! Package records read from repository indexes
//!
//! A [`Package`] is one installable (or virtual) name together with the
//! artifact that satisfies it and the dependency terms it declares.

use crate::version::compare_versions;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single dependency term from a `Depends`/`Pre-Depends` field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dependency {
    /// Exactly this package is required
    Single(String),

    /// Any one of these packages satisfies the requirement, in declared order
    Alternatives(Vec<String>),
}

impl Dependency {
    /// Build a term from the names of one relation, collapsing duplicates
    ///
    /// Returns `None` when no names are given.
    pub fn from_names<I, S>(names: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !unique.contains(&name) {
                unique.push(name);
            }
        }

        match unique.len() {
            0 => None,
            1 => unique.pop().map(Dependency::Single),
            _ => Some(Dependency::Alternatives(unique)),
        }
    }

    /// Package names referenced by this term
    pub fn names(&self) -> &[String] {
        match self {
            Dependency::Single(name) => std::slice::from_ref(name),
            Dependency::Alternatives(names) => names,
        }
    }
}

/// A package available from a repository index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,

    /// Version, absent for virtual packages provided without one
    pub version: Option<String>,

    /// Absolute download URL of the `.deb`
    pub url: String,

    pub sha256: String,

    pub dependencies: Vec<Dependency>,
}

impl Package {
    pub fn new(
        name: impl Into<String>,
        version: Option<String>,
        url: impl Into<String>,
        sha256: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            url: url.into(),
            sha256: sha256.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Compare versions under Debian ordering; an absent version sorts lowest
    pub fn compare_version(&self, other: &Package) -> Ordering {
        match (&self.version, &other.version) {
            (Some(a), Some(b)) => compare_versions(a, b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
    }
}
