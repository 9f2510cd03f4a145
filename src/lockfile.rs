// src/lockfile.rs

//! Lockfile assembly
//!
//! Every package set in the config is resolved for each (distro, arch) pair
//! it names. The results are accumulated into two tables keyed by distro and
//! architecture: one row per resolved package, and one deduplicated row per
//! downloadable artifact. All maps are ordered and all lists are sorted by
//! name, so the same snapshots and config always serialize byte-identically.

use crate::config::{Architecture, Distribution, PackagesConfig, SnapshotMap};
use crate::error::{Error, Result};
use crate::graph::PackageGraph;
use crate::packages::Package;
use crate::repository::{IndexFetcher, PackageIndex};
use crate::resolver::{Resolution, Resolver};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Table keyed by distro name, then architecture
pub type TargetTable<T> = BTreeMap<String, BTreeMap<String, Vec<T>>>;

/// A resolved package and the sanitized names of everything it needs
///
/// Fields are declared alphabetically so serialized keys come out sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedPackage {
    pub dependencies: Vec<String>,
    pub name: String,
}

/// A downloadable `.deb`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockedFile {
    pub name: String,
    pub sha256: String,
    pub url: String,
    pub version: Option<String>,
}

impl LockedFile {
    fn from_package(package: &Package) -> Self {
        Self {
            name: sanitize_name(&package.name),
            sha256: package.sha256.clone(),
            url: package.url.clone(),
            version: package.version.clone(),
        }
    }
}

/// The pinned result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    pub files: TargetTable<LockedFile>,
    pub packages: TargetTable<LockedPackage>,
    pub snapshots: SnapshotMap,
}

impl Lockfile {
    /// Two-space indented JSON with a trailing newline
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        debug!("Writing lockfile to {}", path.display());
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Make a package name safe for use as a build-file identifier
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '-' | '.' => '_',
            '+' => 'p',
            c => c,
        })
        .collect()
}

/// Per-run accumulator for the package and file tables
#[derive(Debug, Default)]
struct LockfileBuilder {
    packages: TargetTable<LockedPackage>,
    files: TargetTable<LockedFile>,
    seen_files: HashSet<(String, Architecture, LockedFile)>,
}

impl LockfileBuilder {
    /// Make sure a target appears in both tables even if it resolves nothing
    fn visit(&mut self, distro: &str, arch: Architecture) {
        self.packages
            .entry(distro.to_string())
            .or_default()
            .entry(arch.to_string())
            .or_default();
        self.files
            .entry(distro.to_string())
            .or_default()
            .entry(arch.to_string())
            .or_default();
    }

    fn record(&mut self, distro: &str, arch: Architecture, resolution: &Resolution) {
        let mut dependencies: Vec<String> = resolution
            .dependencies
            .iter()
            .map(|d| sanitize_name(&d.name))
            .collect();
        dependencies.sort();

        self.packages
            .entry(distro.to_string())
            .or_default()
            .entry(arch.to_string())
            .or_default()
            .push(LockedPackage {
                dependencies,
                name: sanitize_name(&resolution.package.name),
            });

        let files = self
            .files
            .entry(distro.to_string())
            .or_default()
            .entry(arch.to_string())
            .or_default();

        for package in std::iter::once(&resolution.package).chain(&resolution.dependencies) {
            let file = LockedFile::from_package(package);
            if self
                .seen_files
                .insert((distro.to_string(), arch, file.clone()))
            {
                files.push(file);
            }
        }
    }

    fn finish(mut self, snapshots: SnapshotMap) -> Lockfile {
        for packages in self.packages.values_mut().flat_map(|archs| archs.values_mut()) {
            packages.sort_by(|a, b| a.name.cmp(&b.name));
        }
        for files in self.files.values_mut().flat_map(|archs| archs.values_mut()) {
            files.sort_by(|a, b| a.name.cmp(&b.name));
        }

        Lockfile {
            files: self.files,
            packages: self.packages,
            snapshots,
        }
    }
}

/// Builds lockfiles, fetching and caching one package graph per target
pub struct LockfileGenerator<F: IndexFetcher> {
    snapshots: SnapshotMap,
    fetcher: F,
    mirror: Option<String>,
    graphs: HashMap<(Distribution, Architecture), PackageGraph>,
}

impl<F: IndexFetcher> LockfileGenerator<F> {
    pub fn new(snapshots: SnapshotMap, fetcher: F) -> Self {
        Self {
            snapshots,
            fetcher,
            mirror: None,
            graphs: HashMap::new(),
        }
    }

    /// Fetch indexes from this mirror instead of each distribution's default
    pub fn with_mirror(mut self, mirror: Option<String>) -> Self {
        self.mirror = mirror;
        self
    }

    /// The graph for a target, fetching its indexes on first use
    pub fn graph(&mut self, distro: Distribution, arch: Architecture) -> Result<&PackageGraph> {
        let key = (distro, arch);
        if !self.graphs.contains_key(&key) {
            info!("Building package graph for {} {}", distro, arch);
            let indexes =
                PackageIndex::for_target(distro, arch, &self.snapshots, self.mirror.as_deref())?;
            let graph = PackageGraph::load(&self.fetcher, &indexes)?;
            self.graphs.insert(key, graph);
        }

        Ok(&self.graphs[&key])
    }

    /// Resolve every package set and assemble the lockfile
    pub fn generate(mut self, configs: &[PackagesConfig]) -> Result<Lockfile> {
        let targets = configs
            .iter()
            .map(|config| config.distributions())
            .collect::<Result<Vec<_>>>()?;
        let mut builder = LockfileBuilder::default();

        for (config, distributions) in configs.iter().zip(&targets) {
            debug!("package set: {:?}", config);

            for (distro_name, &distro) in config.distros.iter().zip(distributions) {
                for &arch in &config.architectures {
                    debug!("target: {} {}", distro_name, arch);
                    builder.visit(distro_name, arch);
                    let graph = self.graph(distro, arch)?;
                    let resolver = Resolver::new(graph)
                        .exclude(&config.exclude_packages)
                        .priorities(&config.package_priorities);

                    for package_name in &config.packages {
                        let resolution =
                            resolver
                                .resolve(package_name)
                                .map_err(|source| Error::Resolve {
                                    distro: distro_name.clone(),
                                    arch: arch.to_string(),
                                    source,
                                })?;

                        info!(
                            "{}/{}: {} {} with {} dependencies",
                            distro_name,
                            arch,
                            resolution.package.name,
                            resolution.package.version.as_deref().unwrap_or("(virtual)"),
                            resolution.dependencies.len()
                        );
                        builder.record(distro_name, arch, &resolution);
                    }
                }
            }
        }

        Ok(builder.finish(self.snapshots))
    }
}
