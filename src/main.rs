// src/main.rs

use anyhow::{Context, Result};
use aptlock::config::{self, Architecture, Distribution, PackagesConfig, SnapshotMap};
use aptlock::repository::snapshot::latest_snapshots;
use aptlock::repository::{PackageIndex, RepositoryClient};
use aptlock::{LockfileGenerator, PackageGraph, Resolver};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "aptlock")]
#[command(author, version, about = "Deterministic lockfiles for APT package snapshots", long_about = None)]
struct Cli {
    /// Log progress
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log resolution details, including the dependency path of every package
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve all configured package sets and write the lockfile
    Lock {
        /// YAML map of channel key to snapshot id
        #[arg(long)]
        snapshots_file: PathBuf,
        /// YAML list of package sets
        #[arg(long)]
        packages_file: PathBuf,
        /// Lockfile to write
        #[arg(long)]
        lock_file: PathBuf,
        /// Look up the latest snapshots first and write them back
        #[arg(long)]
        update_snapshots_file: bool,
        /// Mirror URL overriding each distribution's default snapshot mirror
        #[arg(long)]
        mirror: Option<String>,
        /// Resolve everything but do not write any file
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the latest snapshots of a distribution
    Snapshots {
        /// Distribution codename or alias (e.g. bookworm, ubuntu2204)
        #[arg(long)]
        distro: Distribution,
        /// Architecture used to probe mirrors without a listing
        #[arg(long, default_value = "amd64")]
        arch: Architecture,
        /// Mirror URL overriding the distribution's default
        #[arg(long)]
        mirror: Option<String>,
    },
    /// Resolve a single package and print its dependency closure
    Resolve {
        /// Package name
        package: String,
        /// YAML map of channel key to snapshot id
        #[arg(long)]
        snapshots_file: PathBuf,
        /// Distribution codename or alias
        #[arg(long)]
        distro: Distribution,
        /// Target architecture
        #[arg(long, default_value = "amd64")]
        arch: Architecture,
        /// Package to leave out of the closure (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
        /// Comma-separated preference order for alternatives (repeatable)
        #[arg(long)]
        prefer: Vec<String>,
        /// Mirror URL overriding the distribution's default
        #[arg(long)]
        mirror: Option<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}

fn init_tracing(verbose: bool, debug: bool) {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("warn,aptlock={}", level))),
        )
        .with_writer(io::stderr)
        .init();
}

/// Latest snapshots for every distribution named in the package sets
///
/// Each distribution is probed with the first architecture of the first set
/// that names it.
fn refresh_snapshots(
    client: &RepositoryClient,
    configs: &[PackagesConfig],
    mirror: Option<&str>,
) -> Result<SnapshotMap> {
    let mut targets: Vec<(Distribution, Architecture)> = Vec::new();
    for config in configs {
        let Some(&arch) = config.architectures.first() else {
            continue;
        };
        for distro in config.distributions()? {
            if !targets.iter().any(|(d, _)| *d == distro) {
                targets.push((distro, arch));
            }
        }
    }

    let mut snapshots = SnapshotMap::new();
    for (distro, arch) in targets {
        debug!("Retrieving latest snapshots for {} ...", distro);
        snapshots.extend(latest_snapshots(client, distro, arch, mirror)?);
    }
    Ok(snapshots)
}

fn load_snapshots(path: &Path) -> Result<SnapshotMap> {
    config::load_snapshots(path)
        .with_context(|| format!("Failed to read snapshots file {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.debug);

    match cli.command {
        Commands::Lock {
            snapshots_file,
            packages_file,
            lock_file,
            update_snapshots_file,
            mirror,
            dry_run,
        } => {
            let packages = config::load_packages_config(&packages_file)
                .with_context(|| format!("Failed to read packages file {}", packages_file.display()))?;

            let mut snapshots = if update_snapshots_file && !snapshots_file.exists() {
                SnapshotMap::new()
            } else {
                load_snapshots(&snapshots_file)?
            };

            if let Some(mirror) = &mirror {
                info!("Using mirror: {}", mirror);
            }

            let client = RepositoryClient::new()?;

            if update_snapshots_file {
                debug!("Retrieving latest snapshots ...");
                let latest = refresh_snapshots(&client, &packages, mirror.as_deref())?;
                if latest == snapshots {
                    info!("Already at latest snapshots.");
                } else {
                    info!("Using new snapshots: {:?}", latest);
                    snapshots = latest;
                }
            }

            debug!("Generating lockfile ...");
            let lockfile = LockfileGenerator::new(snapshots.clone(), &client)
                .with_mirror(mirror)
                .generate(&packages)?;

            if dry_run {
                info!("Dry run, not writing files");
                debug!("{}", lockfile.to_json()?);
            } else {
                config::save_snapshots(&snapshots_file, &snapshots)?;
                lockfile
                    .write(&lock_file)
                    .with_context(|| format!("Failed to write lockfile {}", lock_file.display()))?;
                println!("Wrote lockfile: {}", lock_file.display());
            }

            Ok(())
        }
        Commands::Snapshots {
            distro,
            arch,
            mirror,
        } => {
            let client = RepositoryClient::new()?;
            let snapshots = latest_snapshots(&client, distro, arch, mirror.as_deref())?;
            print!("{}", serde_yaml::to_string(&snapshots)?);
            Ok(())
        }
        Commands::Resolve {
            package,
            snapshots_file,
            distro,
            arch,
            exclude,
            prefer,
            mirror,
        } => {
            let snapshots = load_snapshots(&snapshots_file)?;
            let priorities: Vec<Vec<String>> = prefer
                .iter()
                .map(|list| list.split(',').map(|p| p.trim().to_string()).collect())
                .collect();

            let client = RepositoryClient::new()?;
            let indexes = PackageIndex::for_target(distro, arch, &snapshots, mirror.as_deref())?;
            let graph = PackageGraph::load(&client, &indexes)?;

            let resolution = Resolver::new(&graph)
                .exclude(&exclude)
                .priorities(&priorities)
                .resolve(&package)?;

            println!(
                "{} {}",
                resolution.package.name,
                resolution.package.version.as_deref().unwrap_or("(virtual)")
            );
            for dependency in &resolution.dependencies {
                println!(
                    "  {} {}",
                    dependency.name,
                    dependency.version.as_deref().unwrap_or("(virtual)")
                );
            }
            println!("\nTotal: {} dependencies", resolution.dependencies.len());
            Ok(())
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "aptlock", &mut io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_lock_command() {
        let cli = Cli::try_parse_from([
            "aptlock",
            "lock",
            "--snapshots-file",
            "snapshots.yaml",
            "--packages-file",
            "packages.yaml",
            "--lock-file",
            "packages.lock.json",
            "--dry-run",
            "--debug",
        ])
        .unwrap();

        assert!(cli.debug);
        match cli.command {
            Commands::Lock {
                dry_run,
                update_snapshots_file,
                mirror,
                ..
            } => {
                assert!(dry_run);
                assert!(!update_snapshots_file);
                assert!(mirror.is_none());
            }
            _ => panic!("expected lock command"),
        }
    }

    #[test]
    fn test_parse_resolve_command() {
        let cli = Cli::try_parse_from([
            "aptlock",
            "resolve",
            "bash",
            "--snapshots-file",
            "s.yaml",
            "--distro",
            "debian12",
            "--arch",
            "arm64",
            "--exclude",
            "perl-base",
            "--prefer",
            "mawk,gawk",
        ])
        .unwrap();

        match cli.command {
            Commands::Resolve {
                package,
                distro,
                arch,
                exclude,
                prefer,
                ..
            } => {
                assert_eq!(package, "bash");
                assert_eq!(distro, Distribution::Debian("bookworm"));
                assert_eq!(arch, Architecture::Arm64);
                assert_eq!(exclude, vec!["perl-base"]);
                assert_eq!(prefer, vec!["mawk,gawk"]);
            }
            _ => panic!("expected resolve command"),
        }
    }

    #[test]
    fn test_rejects_unknown_distro() {
        let result = Cli::try_parse_from(["aptlock", "snapshots", "--distro", "hamm"]);
        assert!(result.is_err());
    }
}
