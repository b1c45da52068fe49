use anyhow::Result;
use clap::{Parser, Subcommand};
use flowsync::presentation::cli_summary::print_pull_summary;
use flowsync::{
    AppConfig, ConnectRepoRequest, LogLevel, ProjectId, PullView, RepoId, SyncEngine, TargetId,
};

#[derive(Parser, Debug)]
#[command(
    name = "flowsync",
    about = "Flowsync — keep project flows and a git repository in sync."
)]
struct Cli {
    #[arg(short, long)]
    config: Option<String>,

    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect a project to a git remote (upserts the project's config).
    Connect {
        #[arg(long)]
        project: String,
        #[arg(long)]
        remote_url: String,
        #[arg(long, default_value = "main")]
        branch: String,
        /// Path to an SSH private key file; omit for keyless remotes.
        #[arg(long)]
        ssh_key_file: Option<String>,
        #[arg(long)]
        slug: String,
    },
    /// List repository configurations for a project.
    Repos {
        #[arg(long)]
        project: String,
    },
    /// Disconnect a repository configuration.
    Disconnect {
        #[arg(long)]
        repo: String,
    },
    /// Push a single flow's current definition to git.
    Push {
        #[arg(long)]
        repo: String,
        #[arg(long)]
        flow: String,
        /// Delete the flow's file instead of writing it.
        #[arg(long)]
        delete: bool,
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Pull the git state into the project database.
    Pull {
        #[arg(long)]
        repo: String,
        /// Compute and print the plan without applying anything.
        #[arg(long)]
        dry_run: bool,
        #[arg(long, default_value = "table")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    flowsync::init_tracing(if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });

    let config_path = cli
        .config
        .unwrap_or_else(|| AppConfig::default_path().display().to_string());
    let cfg = AppConfig::load(&config_path)?;
    let engine = SyncEngine::connect(&cfg).await?;

    match cli.command {
        Command::Connect {
            project,
            remote_url,
            branch,
            ssh_key_file,
            slug,
        } => {
            let ssh_private_key = match ssh_key_file {
                Some(path) => std::fs::read_to_string(path)?,
                None => String::new(),
            };
            let stored = engine
                .repos
                .connect(ConnectRepoRequest {
                    project_id: ProjectId(project),
                    remote_url,
                    branch,
                    ssh_private_key,
                    slug,
                })
                .await?;
            println!("Connected: {} -> {}", stored.id, stored.remote_url);
        }
        Command::Repos { project } => {
            let configs = engine.repos.list(&ProjectId(project)).await?;
            if configs.is_empty() {
                println!("No repository configured.");
            }
            for cfg in configs {
                println!(
                    "{}  {}  branch={}  slug={}",
                    cfg.id, cfg.remote_url, cfg.branch, cfg.slug
                );
            }
        }
        Command::Disconnect { repo } => {
            engine.repos.disconnect(&RepoId(repo)).await?;
            println!("Disconnected.");
        }
        Command::Push {
            repo,
            flow,
            delete,
            message,
        } => {
            let repo = RepoId(repo);
            let flow = TargetId(flow);
            if delete {
                engine
                    .push
                    .delete_flow(&repo, &flow, message.as_deref())
                    .await?;
            } else {
                engine
                    .push
                    .push_flow(&repo, &flow, message.as_deref())
                    .await?;
            }
            println!("Pushed.");
        }
        Command::Pull {
            repo,
            dry_run,
            format,
        } => {
            let report = engine.pull.pull(&RepoId(repo), dry_run).await?;
            match format.as_str() {
                "json" => println!(
                    "{}",
                    serde_json::to_string_pretty(&PullView::from(&report))?
                ),
                _ => print_pull_summary(&report),
            }
        }
    }

    Ok(())
}
