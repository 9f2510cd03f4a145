// src/repository/snapshot.rs

//! Latest snapshot discovery
//!
//! snapshot.debian.org publishes a monthly listing of snapshot timestamps per
//! archive; snapshot.ubuntu.com has no listing, so recent daily timestamps are
//! probed until one serves an index.

use super::RepositoryClient;
use crate::config::{Architecture, Channel, Distribution, SnapshotMap};
use crate::error::{Error, Result};
use chrono::{Datelike, Duration, NaiveDate, Utc};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Shape of a snapshot timestamp, e.g. `20240115T030205Z`
static SNAPSHOT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+T[0-9]+Z").expect("snapshot pattern is a valid regex"));

/// How many days back to probe for an Ubuntu snapshot
const UBUNTU_PROBE_DAYS: i64 = 10;

/// Find the latest snapshot of every channel of a distribution
///
/// Returns a map keyed by [`Distribution::snapshot_key`].
pub fn latest_snapshots(
    client: &RepositoryClient,
    distro: Distribution,
    arch: Architecture,
    mirror: Option<&str>,
) -> Result<SnapshotMap> {
    let mirror = mirror.unwrap_or(distro.default_mirror());
    let today = Utc::now().date_naive();

    debug!("Retrieving latest snapshot for {} from '{}'", distro, mirror);

    match distro {
        Distribution::Debian(_) => latest_debian_snapshots(client, distro, mirror, today),
        Distribution::Ubuntu(_) => latest_ubuntu_snapshots(client, distro, arch, mirror, today),
    }
}

fn latest_debian_snapshots(
    client: &RepositoryClient,
    distro: Distribution,
    mirror: &str,
    today: NaiveDate,
) -> Result<SnapshotMap> {
    let main = latest_archive_snapshot(client, mirror, "debian", today)?;
    let security = latest_archive_snapshot(client, mirror, "debian-security", today)?;

    let mut snapshots = SnapshotMap::new();
    snapshots.insert(distro.snapshot_key(Channel::Main), main.clone());
    // updates lives in the main archive
    snapshots.insert(distro.snapshot_key(Channel::Updates), main);
    snapshots.insert(distro.snapshot_key(Channel::Security), security);
    Ok(snapshots)
}

fn latest_archive_snapshot(
    client: &RepositoryClient,
    mirror: &str,
    archive: &str,
    today: NaiveDate,
) -> Result<String> {
    for (year, month) in [(today.year(), today.month()), previous_month(today)] {
        let url = format!(
            "{}/archive/{}/?year={}&month={}",
            mirror.trim_end_matches('/'),
            archive,
            year,
            month
        );
        let listing = client.get_text(&url)?;
        if let Some(snapshot) = last_snapshot_in(&listing) {
            debug!("Latest snapshot for '{}': {}", archive, snapshot);
            return Ok(snapshot);
        }
    }

    Err(Error::SnapshotNotFound(format!(
        "no snapshot listed for '{}' on {}",
        archive, mirror
    )))
}

fn latest_ubuntu_snapshots(
    client: &RepositoryClient,
    distro: Distribution,
    arch: Architecture,
    mirror: &str,
    today: NaiveDate,
) -> Result<SnapshotMap> {
    for candidate in ubuntu_candidates(today) {
        let url = distro.packages_url(mirror, "main", Channel::Main, arch, &candidate);
        if client.exists(&url)? {
            debug!("Latest snapshot for '{}': {}", distro.codename(), candidate);
            return Ok(Channel::ALL
                .into_iter()
                .map(|channel| (distro.snapshot_key(channel), candidate.clone()))
                .collect());
        }
    }

    Err(Error::SnapshotNotFound(format!(
        "no snapshot of {} within {} days on {}",
        distro, UBUNTU_PROBE_DAYS, mirror
    )))
}

/// The last snapshot timestamp mentioned in a listing page
fn last_snapshot_in(listing: &str) -> Option<String> {
    SNAPSHOT_PATTERN
        .find_iter(listing)
        .last()
        .map(|m| m.as_str().to_string())
}

/// Midnight timestamps for today and the preceding days, newest first
fn ubuntu_candidates(today: NaiveDate) -> Vec<String> {
    (0..UBUNTU_PROBE_DAYS)
        .map(|days| {
            (today - Duration::days(days))
                .format("%Y%m%dT000000Z")
                .to_string()
        })
        .collect()
}

fn previous_month(date: NaiveDate) -> (i32, u32) {
    if date.month() == 1 {
        (date.year() - 1, 12)
    } else {
        (date.year(), date.month() - 1)
    }
}
