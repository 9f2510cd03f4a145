// src/config.rs

//! Distribution, architecture and config-file definitions
//!
//! Distribution families differ in mirror layout and snapshot discovery; they
//! are modelled as a closed enum and every family-specific rule is a `match`
//! on the variant.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Mapping of `{kind}-{codename}-{channel}` to a mirror snapshot id
pub type SnapshotMap = BTreeMap<String, String>;

/// Target CPU architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Amd64,
    Arm,
    Arm64,
    Ppc64le,
    S390x,
}

impl Architecture {
    pub const ALL: [Architecture; 5] = [
        Architecture::Amd64,
        Architecture::Arm,
        Architecture::Arm64,
        Architecture::Ppc64le,
        Architecture::S390x,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Amd64 => "amd64",
            Architecture::Arm => "arm",
            Architecture::Arm64 => "arm64",
            Architecture::Ppc64le => "ppc64le",
            Architecture::S390x => "s390x",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Architecture::ALL
            .into_iter()
            .find(|arch| arch.as_str() == s)
            .ok_or_else(|| Error::UnknownArchitecture(s.to_string()))
    }
}

/// Repository update tier, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Main,
    Updates,
    Security,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Main, Channel::Updates, Channel::Security];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Main => "main",
            Channel::Updates => "updates",
            Channel::Security => "security",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A distribution release, tagged by family and carrying its codename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Distribution {
    Debian(&'static str),
    Ubuntu(&'static str),
}

/// Accepted distribution names: version aliases and codenames
const DISTRIBUTIONS: &[(&str, Distribution)] = &[
    ("debian8", Distribution::Debian("jessie")),
    ("debian9", Distribution::Debian("stretch")),
    ("debian10", Distribution::Debian("buster")),
    ("debian11", Distribution::Debian("bullseye")),
    ("debian12", Distribution::Debian("bookworm")),
    ("debian13", Distribution::Debian("trixie")),
    ("jessie", Distribution::Debian("jessie")),
    ("stretch", Distribution::Debian("stretch")),
    ("buster", Distribution::Debian("buster")),
    ("bullseye", Distribution::Debian("bullseye")),
    ("bookworm", Distribution::Debian("bookworm")),
    ("trixie", Distribution::Debian("trixie")),
    ("ubuntu1404", Distribution::Ubuntu("trusty")),
    ("ubuntu1604", Distribution::Ubuntu("xenial")),
    ("ubuntu1804", Distribution::Ubuntu("bionic")),
    ("ubuntu2004", Distribution::Ubuntu("focal")),
    ("ubuntu2204", Distribution::Ubuntu("jammy")),
    ("ubuntu2404", Distribution::Ubuntu("noble")),
    ("trusty", Distribution::Ubuntu("trusty")),
    ("xenial", Distribution::Ubuntu("xenial")),
    ("bionic", Distribution::Ubuntu("bionic")),
    ("focal", Distribution::Ubuntu("focal")),
    ("jammy", Distribution::Ubuntu("jammy")),
    ("noble", Distribution::Ubuntu("noble")),
];

/// Debian releases whose security suite lives at `{codename}/updates`
const OLD_SECURITY_CODENAMES: &[&str] = &["jessie", "stretch", "buster"];

impl Distribution {
    /// Look up a distribution by codename or version alias
    pub fn from_name(name: &str) -> Option<Distribution> {
        DISTRIBUTIONS
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, distro)| *distro)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Distribution::Debian(_) => "debian",
            Distribution::Ubuntu(_) => "ubuntu",
        }
    }

    pub fn codename(&self) -> &'static str {
        match self {
            Distribution::Debian(codename) | Distribution::Ubuntu(codename) => *codename,
        }
    }

    pub fn default_mirror(&self) -> &'static str {
        match self {
            Distribution::Debian(_) => "https://snapshot.debian.org",
            Distribution::Ubuntu(_) => "https://snapshot.ubuntu.com",
        }
    }

    /// Repository components indexed for this family, in precedence order
    pub fn repositories(&self) -> &'static [&'static str] {
        match self {
            Distribution::Debian(_) => &["main", "contrib", "non-free"],
            Distribution::Ubuntu(_) => &["main", "restricted", "universe", "multiverse"],
        }
    }

    /// Key under which a channel's snapshot is stored in the snapshot map
    pub fn snapshot_key(&self, channel: Channel) -> String {
        format!("{}-{}-{}", self.kind(), self.codename(), channel)
    }

    /// Root URL that index `Filename` entries are relative to
    pub fn pool_root_url(&self, mirror: &str, channel: Channel, snapshot: &str) -> String {
        let mirror = mirror.trim_end_matches('/');
        match (self, channel) {
            (Distribution::Debian(_), Channel::Security) => {
                format!("{}/archive/debian-security/{}", mirror, snapshot)
            }
            (Distribution::Debian(_), _) => format!("{}/archive/debian/{}", mirror, snapshot),
            (Distribution::Ubuntu(_), _) => format!("{}/ubuntu/{}", mirror, snapshot),
        }
    }

    /// Suite name under `dists/` for a channel
    pub fn suite(&self, channel: Channel) -> String {
        let codename = self.codename();
        match (self, channel) {
            (_, Channel::Main) => codename.to_string(),
            (_, Channel::Updates) => format!("{}-updates", codename),
            (Distribution::Debian(_), Channel::Security)
                if OLD_SECURITY_CODENAMES.contains(&codename) =>
            {
                format!("{}/updates", codename)
            }
            (_, Channel::Security) => format!("{}-security", codename),
        }
    }

    /// URL of the `Packages.xz` index for one repository/channel/arch
    pub fn packages_url(
        &self,
        mirror: &str,
        repository: &str,
        channel: Channel,
        arch: Architecture,
        snapshot: &str,
    ) -> String {
        format!(
            "{}/dists/{}/{}/binary-{}/Packages.xz",
            self.pool_root_url(mirror, channel, snapshot),
            self.suite(channel),
            repository,
            arch
        )
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind(), self.codename())
    }
}

impl FromStr for Distribution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Distribution::from_name(s).ok_or_else(|| Error::UnknownDistribution(s.to_string()))
    }
}

/// One set of packages to lock for a matrix of distributions and architectures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagesConfig {
    pub architectures: Vec<Architecture>,
    pub distros: Vec<String>,
    pub packages: Vec<String>,
    #[serde(default, alias = "exclude-packages", alias = "excludePackages")]
    pub exclude_packages: Vec<String>,
    #[serde(default, alias = "package-priorities", alias = "packagePriorities")]
    pub package_priorities: Vec<Vec<String>>,
}

impl PackagesConfig {
    /// Resolve every configured distro name
    pub fn distributions(&self) -> Result<Vec<Distribution>> {
        self.distros.iter().map(|d| d.parse()).collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PackagesFile {
    Many(Vec<PackagesConfig>),
    One(PackagesConfig),
}

/// Parse a packages file: a list of package sets, or a single one
pub fn parse_packages_config(contents: &str) -> Result<Vec<PackagesConfig>> {
    let configs = match serde_yaml::from_str::<PackagesFile>(contents)? {
        PackagesFile::Many(configs) => configs,
        PackagesFile::One(config) => vec![config],
    };

    if configs.is_empty() {
        return Err(Error::ConfigError("packages file defines no package sets".to_string()));
    }

    for config in &configs {
        config.distributions()?;
        if config.architectures.is_empty() || config.distros.is_empty() {
            return Err(Error::ConfigError(format!(
                "package set {:?} needs at least one architecture and one distro",
                config.packages
            )));
        }
    }

    Ok(configs)
}

/// Load and validate a packages YAML file
pub fn load_packages_config(path: &Path) -> Result<Vec<PackagesConfig>> {
    debug!("Loading packages config from {}", path.display());
    let contents = fs::read_to_string(path)?;
    parse_packages_config(&contents)
}

/// Load a snapshots YAML file
pub fn load_snapshots(path: &Path) -> Result<SnapshotMap> {
    debug!("Loading snapshots from {}", path.display());
    let contents = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&contents)?)
}

/// Write a snapshots YAML file
pub fn save_snapshots(path: &Path, snapshots: &SnapshotMap) -> Result<()> {
    debug!("Writing snapshots to {}", path.display());
    fs::write(path, serde_yaml::to_string(snapshots)?)?;
    Ok(())
}
