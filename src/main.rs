// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use quarry::graph::DirectedGraph;
use quarry::repository::{self, state, Repository};
use quarry::{backend, config, fetch};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(author, version, about = "Synchronize source package repositories", long_about = None)]
struct Cli {
    /// Disable checksum verification of downloaded artifacts
    #[arg(long, global = true)]
    no_checksums: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a repository mirror from scratch (destroys any existing root)
    Init {
        /// Repository name
        name: String,
        /// Backend address: a directory, an HTTP URL, or a git remote
        address: String,
        /// Backend kind
        #[arg(short, long, default_value = "http")]
        kind: String,
        /// Priority; higher is preferred when several repositories carry a package
        #[arg(short, long, default_value_t = 0)]
        priority: i32,
        /// Mirror root directory (default: ./<name>)
        #[arg(short, long)]
        root: Option<PathBuf>,
    },
    /// Update repository mirrors
    Update {
        /// Repository roots to update (each holds a repo.json)
        #[arg(required = true)]
        roots: Vec<PathBuf>,
        /// Maximum concurrent updates
        #[arg(short, long, default_value_t = 4)]
        jobs: usize,
        /// Skip repositories updated within this many seconds
        #[arg(long)]
        max_age: Option<u64>,
    },
    /// List the packages and compilers mirrored under a repository root
    List {
        /// Repository root directory
        root: PathBuf,
    },
    /// Show a repository's backend revision marker
    Revision {
        /// Repository root directory
        root: PathBuf,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn load_repo(root: &PathBuf) -> Result<Repository> {
    let config_path = root.join("repo.json");
    let repo = config::read_repo_config(&config_path)?;
    Ok(repo)
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Backends are registered before any update can run concurrently
    backend::register_defaults()?;
    fetch::set_checksum_verification(!cli.no_checksums);

    match cli.command {
        Commands::Init {
            name,
            address,
            kind,
            priority,
            root,
        } => {
            let root = root.unwrap_or_else(|| PathBuf::from(&name));
            let repo = Repository::new(name, kind, address, priority, root);
            repository::init(&repo)?;
            println!("Initialized repository {}", repo);
            Ok(())
        }
        Commands::Update {
            roots,
            jobs,
            max_age,
        } => {
            let mut graph = DirectedGraph::new();
            for root in &roots {
                let repo = load_repo(root)?;
                if let Some(max_age) = max_age {
                    if !repository::needs_update(&repo, max_age) {
                        info!("{} is recent enough, skipping", repo);
                        continue;
                    }
                }
                graph.add_vertex(repo);
            }

            repository::update_all(&graph, jobs)?;
            println!("Updated {} repositories", graph.len());
            Ok(())
        }
        Commands::List { root } => {
            let repo = load_repo(&root)?;
            for (prefix, package) in state::packages(&repo)? {
                match prefix {
                    Some(prefix) => println!("package  {}/{}", prefix, package),
                    None => println!("package  {}", package),
                }
            }
            for (prefix, compiler) in state::compilers(&repo)? {
                match prefix {
                    Some(prefix) => println!("compiler {}/{}", prefix, compiler),
                    None => println!("compiler {}", compiler),
                }
            }
            Ok(())
        }
        Commands::Revision { root } => {
            let repo = load_repo(&root)?;
            match repository::revision(&repo)? {
                Some(revision) => println!("{}", revision),
                None => println!("(no revision marker)"),
            }
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    }
}
