// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("quarry")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Quarry Contributors")
        .about("Synchronize source package repositories")
        .subcommand_required(true)
        .arg(
            Arg::new("no_checksums")
                .long("no-checksums")
                .global(true)
                .action(clap::ArgAction::SetTrue)
                .help("Disable checksum verification of downloaded artifacts"),
        )
        .subcommand(
            Command::new("init")
                .about("Initialize a repository mirror from scratch")
                .arg(Arg::new("name").required(true).help("Repository name"))
                .arg(
                    Arg::new("address")
                        .required(true)
                        .help("Backend address: a directory, an HTTP URL, or a git remote"),
                )
                .arg(
                    Arg::new("kind")
                        .short('k')
                        .long("kind")
                        .default_value("http")
                        .help("Backend kind"),
                )
                .arg(
                    Arg::new("priority")
                        .short('p')
                        .long("priority")
                        .default_value("0")
                        .help("Priority (higher = preferred)"),
                )
                .arg(
                    Arg::new("root")
                        .short('r')
                        .long("root")
                        .help("Mirror root directory (default: ./<name>)"),
                ),
        )
        .subcommand(
            Command::new("update")
                .about("Update repository mirrors")
                .arg(
                    Arg::new("roots")
                        .required(true)
                        .num_args(1..)
                        .help("Repository roots to update"),
                )
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .default_value("4")
                        .help("Maximum concurrent updates"),
                )
                .arg(
                    Arg::new("max_age")
                        .long("max-age")
                        .help("Skip repositories updated within this many seconds"),
                ),
        )
        .subcommand(
            Command::new("list")
                .about("List the packages and compilers mirrored under a repository root")
                .arg(Arg::new("root").required(true).help("Repository root directory")),
        )
        .subcommand(
            Command::new("revision")
                .about("Show a repository's backend revision marker")
                .arg(Arg::new("root").required(true).help("Repository root directory")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell"])
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

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer)
        .expect("Failed to render man page");

    let man_path = man_dir.join("quarry.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
