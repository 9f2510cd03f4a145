// src/lib.rs

//! aptlock
//!
//! Resolves named packages against APT repository snapshots and produces a
//! deterministic lockfile: for every requested package, its pinned transitive
//! dependency closure, plus download URL and SHA-256 for every artifact.
//!
//! # Architecture
//!
//! - Index parsing: xz-compressed `Packages` files into package records
//! - Graph: one merged graph per (distribution, architecture), latest version wins
//! - Resolver: closure with exclusions and alternative-group tie-breaking,
//!   no backtracking
//! - Lockfile: sorted, deduplicated tables serialized as key-sorted JSON

pub mod config;
mod error;
pub mod graph;
pub mod lockfile;
pub mod packages;
pub mod repository;
pub mod resolver;
pub mod version;

pub use config::{Architecture, Channel, Distribution, PackagesConfig, SnapshotMap};
pub use error::{Error, Result};
pub use graph::PackageGraph;
pub use lockfile::{Lockfile, LockfileGenerator};
pub use packages::{Dependency, Package};
pub use resolver::{Resolution, ResolveError, Resolver};
