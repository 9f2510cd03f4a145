// src/repository/parsers/debian.rs

//! Debian/Ubuntu binary package index parser
//!
//! Parses xz-compressed `Packages` files which use RFC 822-like format
//! (paragraphs of `Key: value` lines separated by blank lines).

use crate::error::{Error, Result};
use crate::packages::{Dependency, Package};
use serde::Deserialize;
use std::io::Read;
use tracing::{debug, info, warn};
use xz2::read::XzDecoder;

/// Group the lines of an index into paragraphs
///
/// Blank and whitespace-only lines only separate paragraphs; any number of
/// them may appear between two paragraphs.
fn split_paragraphs(content: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }

    paragraphs
}

/// Comparison operators allowed in a relation's version constraint
const VERSION_OPERATORS: &[&str] = &["<<", "<=", "=", ">=", ">>", "<", ">"];

/// Parser for one repository channel's `Packages.xz`
pub struct DebianIndexParser {
    /// URL that each entry's `Filename` is relative to
    pool_root_url: String,
}

/// Debian package entry structure for rfc822-like parsing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DebianPackageEntry {
    package: String,
    version: String,
    filename: String,
    #[serde(rename = "SHA256")]
    sha256: String,
    #[serde(default)]
    depends: Option<String>,
    #[serde(rename = "Pre-Depends", default)]
    pre_depends: Option<String>,
    #[serde(default)]
    provides: Option<String>,
}

/// One alternative inside a relation, e.g. `libc6 (>= 2.36)`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Relation {
    name: String,
    constraint: Option<Constraint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Constraint {
    Version { operator: String, version: String },
    Malformed(String),
}

impl DebianIndexParser {
    pub fn new(pool_root_url: impl Into<String>) -> Self {
        Self {
            pool_root_url: pool_root_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Decompress an xz stream and parse the index it contains
    pub fn parse_compressed<R: Read>(&self, reader: R) -> Result<Vec<Package>> {
        let mut xz = XzDecoder::new(reader);
        let mut content = String::new();
        xz.read_to_string(&mut content)
            .map_err(|e| Error::ParseError(format!("Failed to decompress Packages.xz: {}", e)))?;

        debug!("Decompressed Packages file: {} bytes", content.len());
        self.parse(&content)
    }

    /// Parse an uncompressed index
    ///
    /// Each paragraph yields its concrete package followed by one virtual
    /// package per `Provides` entry.
    pub fn parse(&self, content: &str) -> Result<Vec<Package>> {
        let paragraphs = split_paragraphs(content);
        if paragraphs.is_empty() {
            return Ok(Vec::new());
        }

        // rfc822-like stops at the first run of blank lines, so paragraphs are
        // rejoined with exactly one separator before deserializing
        let mut normalized = paragraphs.join("\n\n");
        normalized.push('\n');
        let entries: Vec<DebianPackageEntry> = rfc822_like::from_str(&normalized)
            .map_err(|e| Error::ParseError(format!("Failed to parse Packages file: {}", e)))?;

        if entries.len() != paragraphs.len() {
            return Err(Error::ParseError(format!(
                "Parsed {} of {} paragraphs in Packages file",
                entries.len(),
                paragraphs.len()
            )));
        }

        debug!("Parsed {} package entries", entries.len());

        let mut packages = Vec::with_capacity(entries.len());
        for entry in entries {
            packages.extend(self.entry_to_packages(entry));
        }

        info!(
            "Loaded {} packages (including virtual) from {}",
            packages.len(),
            self.pool_root_url
        );
        Ok(packages)
    }

    fn entry_to_packages(&self, entry: DebianPackageEntry) -> Vec<Package> {
        let mut dependencies: Vec<Dependency> = Vec::new();
        let relations = [entry.depends.as_deref(), entry.pre_depends.as_deref()];
        for group in relations.into_iter().flatten().flat_map(parse_relation_field) {
            let term = Dependency::from_names(group.into_iter().map(|r| r.name));
            if let Some(term) = term
                && !dependencies.contains(&term)
            {
                dependencies.push(term);
            }
        }

        let url = format!("{}/{}", self.pool_root_url, entry.filename);
        let package = Package::new(entry.package, Some(entry.version), url, entry.sha256)
            .with_dependencies(dependencies);

        let mut packages = Vec::new();
        if let Some(provides) = entry.provides.as_deref() {
            for group in parse_relation_field(provides) {
                let Some(relation) = group.into_iter().next() else {
                    continue;
                };

                let version = match relation.constraint {
                    None => None,
                    Some(Constraint::Version { version, .. }) => Some(version),
                    Some(Constraint::Malformed(raw)) => {
                        warn!(
                            "Ignoring malformed version '{}' for '{}' provided by '{}'",
                            raw, relation.name, package.name
                        );
                        None
                    }
                };

                packages.push(Package::new(
                    relation.name,
                    version,
                    package.url.clone(),
                    package.sha256.clone(),
                ));
            }
        }

        packages.insert(0, package);
        packages
    }
}

/// Split a relation field into comma-separated groups of `|` alternatives
fn parse_relation_field(field: &str) -> Vec<Vec<Relation>> {
    field
        .split(',')
        .map(|group| {
            group
                .split('|')
                .filter_map(parse_relation)
                .collect::<Vec<_>>()
        })
        .filter(|group| !group.is_empty())
        .collect()
}

/// Parse one alternative: `name[:qualifier] [(op version)] [[archs]] [<profiles>]`
fn parse_relation(text: &str) -> Option<Relation> {
    let text = text.trim();
    let end = text
        .find(|c: char| c.is_whitespace() || matches!(c, '(' | '[' | '<'))
        .unwrap_or(text.len());

    let name = text[..end].split(':').next().unwrap_or_default().trim();
    if name.is_empty() {
        return None;
    }

    let rest = &text[end..];
    let constraint = rest.find('(').map(|start| {
        let inner = &rest[start + 1..];
        match inner.find(')') {
            Some(close) => parse_constraint(&inner[..close]),
            None => Constraint::Malformed(inner.trim().to_string()),
        }
    });

    Some(Relation {
        name: name.to_string(),
        constraint,
    })
}

fn parse_constraint(text: &str) -> Constraint {
    let text = text.trim();
    let split = text
        .find(|c: char| !matches!(c, '<' | '>' | '='))
        .unwrap_or(text.len());
    let (operator, version) = text.split_at(split);
    let version = version.trim();

    if !VERSION_OPERATORS.contains(&operator)
        || version.is_empty()
        || version.contains(char::is_whitespace)
    {
        return Constraint::Malformed(text.to_string());
    }

    Constraint::Version {
        operator: operator.to_string(),
        version: version.to_string(),
    }
}
