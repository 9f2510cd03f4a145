// src/version.rs

//! Debian package version ordering
//!
//! Versions have the form `[epoch:]upstream_version[-debian_revision]` and are
//! compared the way dpkg compares them: epoch numerically, then upstream and
//! revision segment by segment, alternating non-digit runs (with `~` sorting
//! before everything, even the end of the string) and numeric runs.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing a Debian version string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("empty version string")]
    Empty,

    #[error("invalid epoch in version '{0}'")]
    InvalidEpoch(String),

    #[error("empty upstream version in '{0}'")]
    EmptyUpstream(String),
}

/// A parsed Debian version
#[derive(Debug, Clone)]
pub struct DebianVersion {
    pub epoch: u32,
    pub upstream: String,
    pub revision: String,
}

impl DebianVersion {
    /// Parse a version string, rejecting a non-numeric epoch or an empty upstream part
    pub fn parse(version: &str) -> Result<Self, VersionError> {
        let version = version.trim();
        if version.is_empty() {
            return Err(VersionError::Empty);
        }

        let (epoch, rest) = match version.split_once(':') {
            Some((epoch, rest)) => {
                let epoch = epoch
                    .parse::<u32>()
                    .map_err(|_| VersionError::InvalidEpoch(version.to_string()))?;
                (epoch, rest)
            }
            None => (0, version),
        };

        let (upstream, revision) = match rest.rsplit_once('-') {
            Some((upstream, revision)) => (upstream, revision),
            None => (rest, ""),
        };

        if upstream.is_empty() {
            return Err(VersionError::EmptyUpstream(version.to_string()));
        }

        Ok(Self {
            epoch,
            upstream: upstream.to_string(),
            revision: revision.to_string(),
        })
    }
}

impl FromStr for DebianVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DebianVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.upstream)?;
        if !self.revision.is_empty() {
            write!(f, "-{}", self.revision)?;
        }
        Ok(())
    }
}

impl Ord for DebianVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| verrevcmp(&self.upstream, &other.upstream))
            .then_with(|| verrevcmp(&self.revision, &other.revision))
    }
}

impl PartialOrd for DebianVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DebianVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DebianVersion {}

/// Compare two raw version strings under Debian ordering
///
/// Strings that fail to parse are compared segment-wise as a whole, so this
/// never fails.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (DebianVersion::parse(a), DebianVersion::parse(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => verrevcmp(a, b),
    }
}

/// Weight of a single character in a non-digit run
fn order(c: Option<u8>) -> i32 {
    match c {
        None => 0,
        Some(c) if c.is_ascii_digit() => 0,
        Some(c) if c.is_ascii_alphabetic() => c as i32,
        Some(b'~') => -1,
        Some(c) => c as i32 + 256,
    }
}

fn verrevcmp(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0, 0);

    let is_digit = |s: &[u8], k: usize| s.get(k).is_some_and(u8::is_ascii_digit);

    while i < a.len() || j < b.len() {
        while (i < a.len() && !is_digit(a, i)) || (j < b.len() && !is_digit(b, j)) {
            let ac = order(a.get(i).copied());
            let bc = order(b.get(j).copied());
            if ac != bc {
                return ac.cmp(&bc);
            }
            i += 1;
            j += 1;
        }

        while a.get(i) == Some(&b'0') {
            i += 1;
        }
        while b.get(j) == Some(&b'0') {
            j += 1;
        }

        let mut first_diff = Ordering::Equal;
        while is_digit(a, i) && is_digit(b, j) {
            if first_diff == Ordering::Equal {
                first_diff = a[i].cmp(&b[j]);
            }
            i += 1;
            j += 1;
        }

        if is_digit(a, i) {
            return Ordering::Greater;
        }
        if is_digit(b, j) {
            return Ordering::Less;
        }
        if first_diff != Ordering::Equal {
            return first_diff;
        }
    }

    Ordering::Equal
}
