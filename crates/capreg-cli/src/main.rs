// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use capreg_config::RegistryConfig;
use capreg_core::ResolutionContext;
use capreg_events::InMemoryEventPublisher;
use capreg_registry::{
    BootstrapRequest, DescribeRequest, DiscoverFilters, DiscoverRequest, ListMajorsRequest,
    RegistryCore, ResolveRequest,
};
use capreg_repo::memory::InMemoryRepository;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const EXIT_RUNTIME_ERROR: i32 = 1;

/// Local operator CLI over an in-memory registry core, for inspection and
/// smoke-testing without a running bus (`spec.md` §2's `capreg-cli` entry).
/// Every invocation starts from an empty repository, so `resolve`/
/// `discover`/`describe` mainly exercise request validation and error
/// shapes rather than real lookups.
#[derive(Parser, Debug)]
#[command(name = "capreg-cli", version, about = "Capabilities registry CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a capability reference to a subject and version.
    Resolve {
        /// `"app.name"` capability reference, optionally with `@alias/` and `@range`.
        cap: String,
        /// Version or range override, taking priority over any range in `cap`.
        #[arg(long)]
        version: Option<String>,
        /// Tenant id for the resolution context.
        #[arg(long)]
        tenant: Option<String>,
        /// Environment for the resolution context.
        #[arg(long)]
        env: Option<String>,
        /// Attach a method summary list to the response.
        #[arg(long)]
        include_methods: bool,
        /// Attach a decoded per-method schema map to the response.
        #[arg(long)]
        include_schemas: bool,
    },

    /// Page through registered capabilities.
    Discover {
        /// Restrict to one `app`.
        #[arg(long)]
        app: Option<String>,
        /// Required tag, repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Free-text match against `app`/`name`/`description`.
        #[arg(long)]
        query: Option<String>,
        /// Status filter; `"all"` disables the default active-only filter.
        #[arg(long)]
        status: Option<String>,
        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Page size.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Describe a capability's current default version.
    Describe {
        /// `"app.name"` capability reference.
        cap: String,
        /// Exact version to describe; overrides `major`.
        #[arg(long)]
        version: Option<String>,
        /// Major to describe when `version` is absent.
        #[arg(long)]
        major: Option<u32>,
    },

    /// List the majors registered for a capability.
    ListMajors {
        /// `"app.name"` capability reference.
        cap: String,
        /// Include disabled/deprecated majors.
        #[arg(long)]
        include_inactive: bool,
    },

    /// Report registry health.
    Health,

    /// Assemble the startup bootstrap snapshot.
    Bootstrap {
        /// Environment to assemble the snapshot for.
        #[arg(long)]
        env: Option<String>,
    },
}

type Registry = RegistryCore<InMemoryRepository, InMemoryEventPublisher>;

fn build_registry() -> Result<Registry> {
    let config = RegistryConfig::from_env()?;
    let repo = Arc::new(InMemoryRepository::new());
    let events = Arc::new(InMemoryEventPublisher::new());
    Ok(RegistryCore::new(repo, events, config))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("capreg=debug")
    } else {
        EnvFilter::new("capreg=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = run(cli.command).await;
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(EXIT_RUNTIME_ERROR);
    }
}

async fn run(command: Commands) -> Result<()> {
    let registry = build_registry()?;

    match command {
        Commands::Resolve {
            cap,
            version,
            tenant,
            env,
            include_methods,
            include_schemas,
        } => {
            let ctx = ResolutionContext {
                tenant_id: tenant,
                env,
                ..Default::default()
            };
            let output = registry
                .resolve(ResolveRequest {
                    cap,
                    ver: version,
                    ctx,
                    include_methods,
                    include_schemas,
                    deadline: Duration::from_secs(25),
                })
                .await?;
            print_json(&output)
        }
        Commands::Discover {
            app,
            tags,
            query,
            status,
            page,
            limit,
        } => {
            let output = registry
                .discover(DiscoverRequest {
                    filters: DiscoverFilters {
                        app,
                        tags,
                        query,
                        status,
                        supports_method: None,
                    },
                    ctx: None,
                    page,
                    limit,
                })
                .await?;
            print_json(&output)
        }
        Commands::Describe { cap, version, major } => {
            let output = registry
                .describe(DescribeRequest { cap, version, major })
                .await?;
            print_json(&output)
        }
        Commands::ListMajors { cap, include_inactive } => {
            let output = registry
                .list_majors(ListMajorsRequest { cap, include_inactive })
                .await?;
            print_json(&output)
        }
        Commands::Health => {
            let output = registry.health().await?;
            print_json(&output)
        }
        Commands::Bootstrap { env } => {
            let output = registry
                .bootstrap(BootstrapRequest {
                    env,
                    minimum_capabilities: Vec::new(),
                })
                .await?;
            print_json(&output)
        }
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
