// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn mirror_arg() -> Arg {
    Arg::new("mirror")
        .long("mirror")
        .value_name("URL")
        .help("Mirror URL overriding the distribution's default")
}

fn snapshots_file_arg() -> Arg {
    Arg::new("snapshots_file")
        .long("snapshots-file")
        .value_name("PATH")
        .required(true)
        .help("YAML map of channel key to snapshot id")
}

fn build_cli() -> Command {
    Command::new("aptlock")
        .version(env!("CARGO_PKG_VERSION"))
        .author("aptlock Contributors")
        .about("Deterministic lockfiles for APT package snapshots")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log progress"),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log resolution details"),
        )
        .subcommand(
            Command::new("lock")
                .about("Resolve all configured package sets and write the lockfile")
                .arg(snapshots_file_arg())
                .arg(
                    Arg::new("packages_file")
                        .long("packages-file")
                        .value_name("PATH")
                        .required(true)
                        .help("YAML list of package sets"),
                )
                .arg(
                    Arg::new("lock_file")
                        .long("lock-file")
                        .value_name("PATH")
                        .required(true)
                        .help("Lockfile to write"),
                )
                .arg(
                    Arg::new("update_snapshots_file")
                        .long("update-snapshots-file")
                        .action(ArgAction::SetTrue)
                        .help("Look up the latest snapshots first and write them back"),
                )
                .arg(mirror_arg())
                .arg(
                    Arg::new("dry_run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Resolve everything but do not write any file"),
                ),
        )
        .subcommand(
            Command::new("snapshots")
                .about("Print the latest snapshots of a distribution")
                .arg(
                    Arg::new("distro")
                        .long("distro")
                        .required(true)
                        .help("Distribution codename or alias"),
                )
                .arg(
                    Arg::new("arch")
                        .long("arch")
                        .default_value("amd64")
                        .help("Architecture used to probe mirrors without a listing"),
                )
                .arg(mirror_arg()),
        )
        .subcommand(
            Command::new("resolve")
                .about("Resolve a single package and print its dependency closure")
                .arg(Arg::new("package").required(true).help("Package name"))
                .arg(snapshots_file_arg())
                .arg(
                    Arg::new("distro")
                        .long("distro")
                        .required(true)
                        .help("Distribution codename or alias"),
                )
                .arg(
                    Arg::new("arch")
                        .long("arch")
                        .default_value("amd64")
                        .help("Target architecture"),
                )
                .arg(
                    Arg::new("exclude")
                        .long("exclude")
                        .action(ArgAction::Append)
                        .help("Package to leave out of the closure"),
                )
                .arg(
                    Arg::new("prefer")
                        .long("prefer")
                        .action(ArgAction::Append)
                        .help("Comma-separated preference order for alternatives"),
                )
                .arg(mirror_arg()),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("aptlock.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
