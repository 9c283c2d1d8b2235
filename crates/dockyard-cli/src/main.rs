//! dockyard CLI - render LXC configuration for containers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dockyard_core::resolv::{self, HostInterfaces};
use dockyard_core::startup::StartupMode;
use dockyard_core::{ContainerDescriptor, HostConfig, Startup};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dockyard")]
#[command(author, version, about = "LXC configuration for containers")]
struct Cli {
    /// Host configuration file (JSON); defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the LXC configuration of one or more containers
    Render {
        /// Container descriptor files (JSON)
        #[arg(required = true)]
        descriptors: Vec<PathBuf>,
    },

    /// Reconcile the host resolv.conf and print the path containers will use
    Resolv,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, rendered configuration to stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("dockyard=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => HostConfig::from_file(path)?,
        None => HostConfig::default(),
    };

    if StartupMode::detect(&config.init_path) == StartupMode::Init {
        tracing::info!(init = ?config.init_path, "running as container init, skipping host setup");
        return Ok(());
    }

    match cli.command {
        Commands::Render { descriptors } => render(&config, descriptors).await,
        Commands::Resolv => {
            let resolved = resolv::reconcile(&config, &HostInterfaces)
                .context("resolv.conf reconciliation failed")?;
            println!("{}", resolved.path().display());
            Ok(())
        }
    }
}

async fn render(config: &HostConfig, descriptors: Vec<PathBuf>) -> Result<()> {
    let startup = Arc::new(Startup::run(config, &HostInterfaces).context("host setup failed")?);

    for text in render_all(startup, descriptors).await? {
        print!("{text}");
    }

    Ok(())
}

/// Render every descriptor concurrently.
///
/// All tasks are joined before returning; any failure fails the whole
/// batch so no partial output is printed.
async fn render_all(startup: Arc<Startup>, descriptors: Vec<PathBuf>) -> Result<Vec<String>> {
    let tasks: Vec<_> = descriptors
        .into_iter()
        .map(|path| {
            let startup = Arc::clone(&startup);
            let task = tokio::task::spawn_blocking({
                let path = path.clone();
                move || -> Result<String> {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    let desc = ContainerDescriptor::from_json(&raw)
                        .with_context(|| format!("invalid descriptor {}", path.display()))?;
                    Ok(startup.render(&desc).to_string())
                }
            });
            (path, task)
        })
        .collect();

    let total = tasks.len();
    let mut documents = Vec::with_capacity(total);
    let mut failed = 0usize;
    for (path, task) in tasks {
        match task.await.map_err(anyhow::Error::from).and_then(|r| r) {
            Ok(text) => documents.push(text),
            Err(e) => {
                tracing::error!(path = ?path, "{e:#}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {total} descriptors failed to render");
    }

    Ok(documents)
}
