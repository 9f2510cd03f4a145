// src/repository/parsers/mod.rs

//! Repository metadata parsers
//!
//! Only the Debian/Ubuntu `Packages.xz` format is understood; it is the one
//! format served by both snapshot mirrors.

pub mod debian;

pub use debian::DebianIndexParser;
