// src/repository/mod.rs

//! Repository access
//!
//! This module provides functionality for:
//! - Enumerating the channel indexes that make up one (distribution, arch) target
//! - Fetching and parsing those indexes over HTTP
//! - Discovering the latest mirror snapshots

pub mod parsers;
pub mod snapshot;

use crate::config::{Architecture, Channel, Distribution, SnapshotMap};
use crate::error::{Error, Result};
use crate::packages::Package;
use parsers::DebianIndexParser;
use reqwest::blocking::{Client, Response};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Timeout for a whole HTTP request; large indexes take a while
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for establishing a connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// One repository component of one channel for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIndex {
    pub distro: Distribution,
    pub arch: Architecture,
    pub repository: &'static str,
    pub channel: Channel,
    pub snapshot: String,
    pub mirror: String,
}

impl PackageIndex {
    /// List every index of a target in precedence order (repository, then channel)
    pub fn for_target(
        distro: Distribution,
        arch: Architecture,
        snapshots: &SnapshotMap,
        mirror: Option<&str>,
    ) -> Result<Vec<PackageIndex>> {
        let mirror = mirror.unwrap_or(distro.default_mirror());

        let mut indexes = Vec::new();
        for repository in distro.repositories() {
            for channel in Channel::ALL {
                let key = distro.snapshot_key(channel);
                let snapshot = snapshots
                    .get(&key)
                    .ok_or_else(|| Error::MissingSnapshot(key.clone()))?;

                indexes.push(PackageIndex {
                    distro,
                    arch,
                    repository,
                    channel,
                    snapshot: snapshot.clone(),
                    mirror: mirror.to_string(),
                });
            }
        }

        Ok(indexes)
    }

    pub fn url(&self) -> String {
        self.distro.packages_url(
            &self.mirror,
            self.repository,
            self.channel,
            self.arch,
            &self.snapshot,
        )
    }

    pub fn pool_root_url(&self) -> String {
        self.distro
            .pool_root_url(&self.mirror, self.channel, &self.snapshot)
    }
}

impl fmt::Display for PackageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{} {} @ {}",
            self.distro, self.repository, self.channel, self.arch, self.snapshot
        )
    }
}

/// Source of parsed package indexes
pub trait IndexFetcher {
    /// Fetch and parse one index; any failure is fatal for the target
    fn fetch(&self, index: &PackageIndex) -> Result<Vec<Package>>;
}

impl<F: IndexFetcher + ?Sized> IndexFetcher for &F {
    fn fetch(&self, index: &PackageIndex) -> Result<Vec<Package>> {
        (**self).fetch(index)
    }
}

/// Blocking HTTP client for mirror access
pub struct RepositoryClient {
    client: Client,
}

impl RepositoryClient {
    /// Create a new repository client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("aptlock/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::DownloadError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// GET a URL, failing on transport errors and non-success statuses
    pub fn get(&self, url: &str) -> Result<Response> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::DownloadError(format!("Failed to download {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::DownloadError(format!(
                "Failed to download {}: HTTP {}",
                url,
                response.status()
            )));
        }

        Ok(response)
    }

    /// GET a URL and return the body as text
    pub fn get_text(&self, url: &str) -> Result<String> {
        self.get(url)?
            .text()
            .map_err(|e| Error::DownloadError(format!("Failed to read response from {}: {}", url, e)))
    }

    /// Whether a HEAD request for the URL succeeds
    pub fn exists(&self, url: &str) -> Result<bool> {
        debug!("HEAD {}", url);

        let response = self
            .client
            .head(url)
            .send()
            .map_err(|e| Error::DownloadError(format!("Failed to reach {}: {}", url, e)))?;

        Ok(response.status().is_success())
    }
}

impl IndexFetcher for RepositoryClient {
    fn fetch(&self, index: &PackageIndex) -> Result<Vec<Package>> {
        let url = index.url();
        info!("Fetching index {}", index);

        let response = self.get(&url)?;
        let packages = DebianIndexParser::new(index.pool_root_url()).parse_compressed(response)?;

        debug!("{}: loaded {} packages", index, packages.len());
        Ok(packages)
    }
}
