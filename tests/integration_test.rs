// tests/integration_test.rs

//! Integration tests for aptlock
//!
//! These tests run whole lockfile generations against xz-compressed fixture
//! indexes served by an in-memory fetcher.

use aptlock::config::{self, Architecture, Channel, Distribution, PackagesConfig, SnapshotMap};
use aptlock::repository::parsers::DebianIndexParser;
use aptlock::repository::{IndexFetcher, PackageIndex};
use aptlock::{Error, Lockfile, LockfileGenerator, Package, PackageGraph, ResolveError, Resolver};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use tempfile::NamedTempFile;
use xz2::write::XzEncoder;

const MAIN_INDEX: &str = "\
Package: app
Version: 1.0-1
Architecture: amd64
Depends: liba (>= 1.0), libb | libc, libstdc++6
Filename: pool/main/a/app/app_1.0-1_amd64.deb
Size: 1000
SHA256: 1111
Description: demo application

Package: liba
Version: 1.0
Architecture: amd64
Filename: pool/main/l/liba/liba_1.0_amd64.deb
SHA256: 2222


Package: libb
Version: 2.0
Architecture: amd64
Filename: pool/main/l/libb/libb_2.0_amd64.deb
SHA256: 3333

Package: libc
Version: 3.0
Architecture: amd64
Depends: libc-extra
Filename: pool/main/l/libc/libc_3.0_amd64.deb
SHA256: 4444

Package: libc-extra
Version: 3.0
Architecture: amd64
Filename: pool/main/l/libc/libc-extra_3.0_amd64.deb
SHA256: 4545

Package: libstdc++6
Version: 12.2.0-14
Architecture: amd64
Filename: pool/main/g/gcc-12/libstdc++6_12.2.0-14_amd64.deb
SHA256: 7777

Package: tzdata
Version: 2024a-0+deb12u1
Architecture: all
Filename: pool/main/t/tzdata/tzdata_2024a-0+deb12u1_all.deb
SHA256: 5555

Package: broken
Version: 0.1
Architecture: amd64
Depends: not-in-any-index
Filename: pool/main/b/broken/broken_0.1_amd64.deb
SHA256: 8888
";

const UPDATES_INDEX: &str = "\
Package: liba
Version: 1.0
Architecture: amd64
Filename: pool/main/l/liba/liba_1.0_amd64_rebuild.deb
SHA256: 9999
";

const SECURITY_INDEX: &str = "\
Package: tzdata
Version: 2024a-0+deb12u2
Architecture: all
Filename: pool/updates/main/t/tzdata/tzdata_2024a-0+deb12u2_all.deb
SHA256: 6666
";

const MAIN_POOL: &str = "https://snapshot.debian.org/archive/debian/20240101T000000Z";
const SECURITY_POOL: &str = "https://snapshot.debian.org/archive/debian-security/20240102T000000Z";

fn compress(content: &str) -> Vec<u8> {
    let mut encoder = XzEncoder::new(Vec::new(), 6);
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// Serves fixture indexes for the `main` repository; every other index is empty
struct FixtureFetcher {
    indexes: HashMap<Channel, Vec<u8>>,
    fail_on: Option<Channel>,
    fetched: RefCell<Vec<String>>,
}

impl FixtureFetcher {
    fn new() -> Self {
        let indexes = HashMap::from([
            (Channel::Main, compress(MAIN_INDEX)),
            (Channel::Updates, compress(UPDATES_INDEX)),
            (Channel::Security, compress(SECURITY_INDEX)),
        ]);
        Self {
            indexes,
            fail_on: None,
            fetched: RefCell::new(Vec::new()),
        }
    }

    fn failing_on(channel: Channel) -> Self {
        Self {
            fail_on: Some(channel),
            ..Self::new()
        }
    }

    fn fetch_count(&self) -> usize {
        self.fetched.borrow().len()
    }
}

impl IndexFetcher for FixtureFetcher {
    fn fetch(&self, index: &PackageIndex) -> aptlock::Result<Vec<Package>> {
        self.fetched.borrow_mut().push(index.url());

        if self.fail_on == Some(index.channel) {
            return Err(Error::DownloadError(format!("HTTP 503 from {}", index.url())));
        }

        let empty = compress("");
        let bytes = match index.repository {
            "main" => self.indexes.get(&index.channel).unwrap_or(&empty),
            _ => &empty,
        };
        DebianIndexParser::new(index.pool_root_url()).parse_compressed(bytes.as_slice())
    }
}

fn snapshots() -> SnapshotMap {
    let distro = Distribution::Debian("bookworm");
    SnapshotMap::from([
        (distro.snapshot_key(Channel::Main), "20240101T000000Z".to_string()),
        (distro.snapshot_key(Channel::Updates), "20240101T000000Z".to_string()),
        (distro.snapshot_key(Channel::Security), "20240102T000000Z".to_string()),
    ])
}

fn package_set(distros: &[&str], packages: &[&str]) -> PackagesConfig {
    PackagesConfig {
        architectures: vec![Architecture::Amd64],
        distros: distros.iter().map(|d| d.to_string()).collect(),
        packages: packages.iter().map(|p| p.to_string()).collect(),
        exclude_packages: Vec::new(),
        package_priorities: Vec::new(),
    }
}

fn generate(configs: &[PackagesConfig]) -> aptlock::Result<Lockfile> {
    let fetcher = FixtureFetcher::new();
    LockfileGenerator::new(snapshots(), &fetcher).generate(configs)
}

#[test]
fn test_end_to_end_lockfile() {
    let lockfile = generate(&[package_set(&["bookworm"], &["tzdata", "app"])]).unwrap();

    assert_eq!(lockfile.snapshots, snapshots());

    let packages = &lockfile.packages["bookworm"]["amd64"];
    assert_eq!(packages.len(), 2);
    assert_eq!(packages[0].name, "app");
    assert_eq!(packages[0].dependencies, vec!["liba", "libb", "libstdcpp6"]);
    assert_eq!(packages[1].name, "tzdata");
    assert!(packages[1].dependencies.is_empty());

    let files = &lockfile.files["bookworm"]["amd64"];
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["app", "liba", "libb", "libstdcpp6", "tzdata"]);

    let app = &files[0];
    assert_eq!(app.version.as_deref(), Some("1.0-1"));
    assert_eq!(app.url, format!("{}/pool/main/a/app/app_1.0-1_amd64.deb", MAIN_POOL));
    assert_eq!(app.sha256, "1111");
}

#[test]
fn test_newer_security_version_wins() {
    let lockfile = generate(&[package_set(&["bookworm"], &["tzdata"])]).unwrap();

    let tzdata = &lockfile.files["bookworm"]["amd64"][0];
    assert_eq!(tzdata.version.as_deref(), Some("2024a-0+deb12u2"));
    assert_eq!(
        tzdata.url,
        format!("{}/pool/updates/main/t/tzdata/tzdata_2024a-0+deb12u2_all.deb", SECURITY_POOL)
    );
    assert_eq!(tzdata.sha256, "6666");
}

#[test]
fn test_equal_version_keeps_earlier_channel() {
    let lockfile = generate(&[package_set(&["bookworm"], &["liba"])]).unwrap();

    let liba = &lockfile.files["bookworm"]["amd64"][0];
    assert_eq!(liba.sha256, "2222");
}

#[test]
fn test_priorities_and_exclusions_from_config() {
    let mut prefer_libc = package_set(&["bookworm"], &["app"]);
    prefer_libc.package_priorities = vec![vec!["libc".to_string(), "libb".to_string()]];
    let lockfile = generate(&[prefer_libc]).unwrap();
    assert_eq!(
        lockfile.packages["bookworm"]["amd64"][0].dependencies,
        vec!["liba", "libc", "libc_extra", "libstdcpp6"]
    );

    let mut exclude = package_set(&["bookworm"], &["app"]);
    exclude.exclude_packages = vec!["liba".to_string(), "libstdc++6".to_string()];
    let lockfile = generate(&[exclude]).unwrap();
    assert_eq!(lockfile.packages["bookworm"]["amd64"][0].dependencies, vec!["libb"]);
}

#[test]
fn test_graph_is_built_once_per_target() {
    let fetcher = FixtureFetcher::new();
    let configs = [
        package_set(&["bookworm"], &["app"]),
        package_set(&["debian12"], &["tzdata"]),
    ];

    let lockfile = LockfileGenerator::new(snapshots(), &fetcher)
        .generate(&configs)
        .unwrap();

    // three repositories times three channels, fetched once
    assert_eq!(fetcher.fetch_count(), 9);
    assert!(lockfile.packages.contains_key("bookworm"));
    assert!(lockfile.packages.contains_key("debian12"));
}

#[test]
fn test_missing_package_reports_target() {
    let result = generate(&[package_set(&["bookworm"], &["app", "nope"])]);

    match result {
        Err(Error::Resolve {
            distro,
            arch,
            source,
        }) => {
            assert_eq!(distro, "bookworm");
            assert_eq!(arch, "amd64");
            assert_eq!(source, ResolveError::PackageNotFound("nope".to_string()));
        }
        other => panic!("expected resolve error, got {:?}", other),
    }
}

#[test]
fn test_missing_dependency_is_fatal() {
    let result = generate(&[package_set(&["bookworm"], &["broken"])]);

    assert!(matches!(
        result,
        Err(Error::Resolve {
            source: ResolveError::DependencyNotFound { ref package, ref dependency_of },
            ..
        }) if package == "not-in-any-index" && dependency_of == "broken"
    ));
}

#[test]
fn test_fetch_failure_aborts_run() {
    let fetcher = FixtureFetcher::failing_on(Channel::Security);
    let result = LockfileGenerator::new(snapshots(), &fetcher)
        .generate(&[package_set(&["bookworm"], &["app"])]);

    assert!(matches!(result, Err(Error::DownloadError(_))));
}

#[test]
fn test_missing_snapshot_entry() {
    let fetcher = FixtureFetcher::new();
    let result = LockfileGenerator::new(snapshots(), &fetcher)
        .generate(&[package_set(&["trixie"], &["app"])]);

    assert!(matches!(
        result,
        Err(Error::MissingSnapshot(key)) if key == "debian-trixie-main"
    ));
    assert_eq!(fetcher.fetch_count(), 0);
}

#[test]
fn test_unknown_distro_fails_before_fetching() {
    let fetcher = FixtureFetcher::new();
    let result = LockfileGenerator::new(snapshots(), &fetcher).generate(&[
        package_set(&["bookworm"], &["app"]),
        package_set(&["hamm"], &["app"]),
    ]);

    assert!(matches!(result, Err(Error::UnknownDistribution(name)) if name == "hamm"));
    assert_eq!(fetcher.fetch_count(), 0);
}

#[test]
fn test_empty_package_set_still_lists_target() {
    let fetcher = FixtureFetcher::new();
    let lockfile = LockfileGenerator::new(snapshots(), &fetcher)
        .generate(&[package_set(&["bookworm"], &[])])
        .unwrap();

    assert_eq!(fetcher.fetch_count(), 9);
    assert!(lockfile.packages["bookworm"]["amd64"].is_empty());
    assert!(lockfile.files["bookworm"]["amd64"].is_empty());
}

#[test]
fn test_lockfile_is_deterministic() {
    let configs = [
        package_set(&["bookworm"], &["tzdata", "app", "liba"]),
        package_set(&["bookworm"], &["libc"]),
    ];

    let first = generate(&configs).unwrap().to_json().unwrap();
    let second = generate(&configs).unwrap().to_json().unwrap();
    assert_eq!(first, second);

    let names: Vec<String> = generate(&configs).unwrap().packages["bookworm"]["amd64"]
        .iter()
        .map(|p| p.name.clone())
        .collect();
    assert_eq!(names, vec!["app", "liba", "libc", "tzdata"]);
}

#[test]
fn test_lockfile_write_and_read() {
    let lockfile = generate(&[package_set(&["bookworm"], &["app"])]).unwrap();
    let temp_file = NamedTempFile::new().unwrap();

    lockfile.write(temp_file.path()).unwrap();
    let written = std::fs::read_to_string(temp_file.path()).unwrap();
    assert!(written.contains("\n  \"packages\": {\n"));

    let read_back = Lockfile::read(temp_file.path()).unwrap();
    assert_eq!(read_back, lockfile);
}

#[test]
fn test_shared_graph_resolves_repeatedly() {
    let fetcher = FixtureFetcher::new();
    let distro = Distribution::Debian("bookworm");
    let indexes = PackageIndex::for_target(distro, Architecture::Amd64, &snapshots(), None).unwrap();
    let graph = PackageGraph::load(&fetcher, &indexes).unwrap();

    let exclude = vec!["libb".to_string()];
    let first = Resolver::new(&graph).resolve("app").unwrap();
    let pruned = Resolver::new(&graph).exclude(&exclude).resolve("app").unwrap();
    let again = Resolver::new(&graph).resolve("app").unwrap();

    assert_eq!(first, again);
    let pruned_names: Vec<&str> = pruned.dependencies.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(pruned_names, vec!["liba", "libc", "libc-extra", "libstdc++6"]);
}

#[test]
fn test_config_files_round_trip() {
    let mut packages_file = NamedTempFile::new().unwrap();
    writeln!(
        packages_file,
        "- architectures: [amd64, arm64]\n  distros: [bookworm, ubuntu2204]\n  packages: [app]\n  package_priorities:\n    - [libc, libb]"
    )
    .unwrap();

    let configs = config::load_packages_config(packages_file.path()).unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].architectures, vec![Architecture::Amd64, Architecture::Arm64]);
    assert_eq!(
        configs[0].distributions().unwrap(),
        vec![Distribution::Debian("bookworm"), Distribution::Ubuntu("jammy")]
    );

    let snapshots_file = NamedTempFile::new().unwrap();
    config::save_snapshots(snapshots_file.path(), &snapshots()).unwrap();
    assert_eq!(config::load_snapshots(snapshots_file.path()).unwrap(), snapshots());
}
