//! blogadmin - Command-line administration for the blog platform

mod cli;

use anyhow::{bail, Context, Result};
use blogadmin_core::models::ReviewDecision;
use blogadmin_core::{
    ApiError, ClientConfig, LoadState, ResourceKind, SessionEndReason, Snapshot,
    SyncCoordinator, SyncEvent,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(
    name = "blogadmin",
    version,
    about = "Administration client for the blog platform",
    long_about = "Logs in to the blog admin API, runs one command and logs out.\n\
                  \n\
                  Examples:\n\
                    blogadmin list users                 # All accounts\n\
                    blogadmin list articles --json       # Articles as JSON\n\
                    blogadmin show 7                     # One user in detail\n\
                    blogadmin ban 7 --hours 24           # Ban for a day\n\
                    blogadmin delete comments 3 4 5      # Batch-delete comments\n\
                    blogadmin review 12 rejected --reason spam\n\
                    blogadmin stats                      # Site statistics\n\
                    blogadmin watch --interval 30        # Refresh everything periodically\n\
                  \n\
                  Environment Variables:\n\
                    BLOGADMIN_BASE_URL                   # API root (default http://localhost:3000/api)\n\
                    BLOGADMIN_CONFIG                     # Config file path\n\
                    BLOGADMIN_USERNAME                   # Admin username\n\
                    BLOGADMIN_PASSWORD                   # Admin password\n\
                    BLOGADMIN_NO_COLOR                   # Disable ANSI colors\n\
                    RUST_LOG                             # Log filter (default warn)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// API root, overrides the config file
    #[arg(long, env = "BLOGADMIN_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Config file (default: <config dir>/blogadmin/config.toml)
    #[arg(long, env = "BLOGADMIN_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[arg(long, short = 'u', env = "BLOGADMIN_USERNAME", global = true)]
    username: Option<String>,

    #[arg(long, env = "BLOGADMIN_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable ANSI colors (log-friendly)
    #[arg(long, env = "BLOGADMIN_NO_COLOR", global = true)]
    no_color: bool,

    /// Debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Collection {
    Users,
    Articles,
    Comments,
}

impl From<Collection> for ResourceKind {
    fn from(c: Collection) -> Self {
        match c {
            Collection::Users => ResourceKind::Users,
            Collection::Articles => ResourceKind::Articles,
            Collection::Comments => ResourceKind::Comments,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Decision {
    Published,
    Rejected,
}

impl From<Decision> for ReviewDecision {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Published => ReviewDecision::Published,
            Decision::Rejected => ReviewDecision::Rejected,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List a collection
    List { collection: Collection },
    /// Show one user in detail
    Show { id: i64 },
    /// Delete one or more records (articles and comments are batch-deleted)
    Delete {
        collection: Collection,
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,
    },
    /// Ban a user
    Ban {
        id: i64,
        /// Reason shown to the user (default from config)
        #[arg(long)]
        reason: Option<String>,
        /// Ban duration in hours (default from config)
        #[arg(long)]
        hours: Option<u32>,
    },
    /// Lift a ban
    Unban { id: i64 },
    /// Grant the admin role
    Promote { id: i64 },
    /// Revoke the admin role
    Demote { id: i64 },
    /// Publish or reject an article
    Review {
        id: i64,
        decision: Decision,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Print site statistics
    Stats,
    /// Refresh everything periodically and print sync events until Ctrl-C
    Watch {
        /// Seconds between refreshes
        #[arg(long, default_value = "60")]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();

    let config = load_config(&cli)?;
    let coordinator = SyncCoordinator::connect(&config).context("Invalid client configuration")?;

    let username = cli
        .username
        .clone()
        .context("No username given (use --username or BLOGADMIN_USERNAME)")?;
    let password = cli
        .password
        .clone()
        .context("No password given (use --password or BLOGADMIN_PASSWORD)")?;

    coordinator
        .login(&username, &password)
        .await
        .with_context(|| format!("Login to {} failed", config.base_url))?;

    let result = run_command(&coordinator, &cli).await;

    if coordinator.session().is_authenticated() {
        if let Err(e) = coordinator.logout().await {
            warn!(error = %e, "Logout failed");
        }
    }

    result
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let config = match &cli.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ClientConfig::load_default().context("Failed to load config")?,
    };

    Ok(match &cli.base_url {
        Some(url) => config.with_base_url(url.clone()),
        None => config,
    })
}

async fn run_command(coordinator: &Arc<SyncCoordinator>, args: &Cli) -> Result<()> {
    let json = args.json;
    let no_color = args.no_color;

    match &args.command {
        Command::List { collection } => {
            let kind = ResourceKind::from(*collection);
            let snapshot = load(coordinator, kind).await?;
            let output = match collection {
                Collection::Users => cli::format_users(
                    snapshot.users.as_deref().map(Vec::as_slice).unwrap_or(&[]),
                    json,
                    no_color,
                ),
                Collection::Articles => cli::format_articles(
                    snapshot.articles.as_deref().map(Vec::as_slice).unwrap_or(&[]),
                    json,
                    no_color,
                ),
                Collection::Comments => cli::format_comments(
                    snapshot.comments.as_deref().map(Vec::as_slice).unwrap_or(&[]),
                    json,
                    no_color,
                ),
            };
            println!("{}", output);
            report_diagnostics(coordinator, json);
        }
        Command::Show { id } => {
            let user = coordinator
                .api()
                .users()
                .get(*id)
                .await
                .map_err(api_error)?;
            println!("{}", cli::format_user_detail(&user, json));
        }
        Command::Delete { collection, ids } => {
            let reloads = match (collection, ids.as_slice()) {
                (Collection::Users, ids) => {
                    let mut reloads = Vec::with_capacity(ids.len());
                    for id in ids {
                        reloads.push(coordinator.delete_user(*id).await.map_err(api_error)?);
                    }
                    reloads
                }
                (Collection::Articles, [id]) => {
                    vec![coordinator.delete_article(*id).await.map_err(api_error)?]
                }
                (Collection::Articles, ids) => {
                    vec![coordinator.delete_articles(ids).await.map_err(api_error)?]
                }
                (Collection::Comments, [id]) => {
                    vec![coordinator.delete_comment(*id).await.map_err(api_error)?]
                }
                (Collection::Comments, ids) => {
                    vec![coordinator.delete_comments(ids).await.map_err(api_error)?]
                }
            };
            for reload in reloads {
                settle(reload).await?;
            }
            println!("Deleted {} {}(s).", ids.len(), ResourceKind::from(*collection));
        }
        Command::Ban { id, reason, hours } => {
            let reload = coordinator
                .ban_user(*id, reason.as_deref(), *hours)
                .await
                .map_err(api_error)?;
            settle(reload).await?;
            let policy = coordinator.api().ban_policy();
            println!(
                "User {} banned for {} hours.",
                id,
                hours.unwrap_or(policy.duration_hours)
            );
        }
        Command::Unban { id } => {
            settle(coordinator.unban_user(*id).await.map_err(api_error)?).await?;
            println!("User {} unbanned.", id);
        }
        Command::Promote { id } => {
            settle(coordinator.promote_user(*id).await.map_err(api_error)?).await?;
            println!("User {} is now an admin.", id);
        }
        Command::Demote { id } => {
            settle(coordinator.demote_user(*id).await.map_err(api_error)?).await?;
            println!("User {} is no longer an admin.", id);
        }
        Command::Review {
            id,
            decision,
            reason,
        } => {
            let decision = ReviewDecision::from(*decision);
            let reload = coordinator
                .review_article(*id, decision, reason.as_deref())
                .await
                .map_err(api_error)?;
            settle(reload).await?;
            println!("Article {} {}.", id, decision.as_str());
        }
        Command::Stats => {
            let snapshot = load(coordinator, ResourceKind::Stats).await?;
            let stats = snapshot.stats.context("Stats missing after load")?;
            println!("{}", cli::format_stats(&stats, json, no_color));
        }
        Command::Watch { interval } => watch(coordinator, *interval).await?,
    }

    Ok(())
}

/// Load one kind and wait for it to settle
async fn load(coordinator: &Arc<SyncCoordinator>, kind: ResourceKind) -> Result<Snapshot> {
    coordinator
        .refresh(kind)
        .await
        .context("Load task aborted")?;

    match coordinator.load_state(kind) {
        LoadState::Failed { error, .. } => Err(api_error(error)),
        LoadState::Loaded { count, .. } => {
            debug!(%kind, count, "Loaded");
            Ok(coordinator.snapshot())
        }
        other => bail!("{} load did not complete ({:?})", kind, other),
    }
}

/// Wait for a mutation's follow-up refresh
async fn settle(reload: JoinHandle<()>) -> Result<()> {
    reload.await.context("Reload task aborted")
}

async fn watch(coordinator: &Arc<SyncCoordinator>, interval: u64) -> Result<()> {
    if interval == 0 {
        bail!("--interval must be at least 1 second");
    }

    let mut events = coordinator.subscribe();
    let mut ticker = tokio::time::interval(Duration::from_secs(interval));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                coordinator.refresh_all();
            }
            event = events.recv() => match event {
                Ok(event) => {
                    println!("{}", cli::format_event(&event));
                    if event
                        == (SyncEvent::SessionEnded {
                            reason: SessionEndReason::Expired,
                        })
                    {
                        bail!("Session expired");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

fn report_diagnostics(coordinator: &SyncCoordinator, json: bool) {
    if json {
        return;
    }
    let summary = cli::format_diagnostics(&coordinator.diagnostics().entries());
    if !summary.is_empty() {
        eprintln!("{}", summary);
    }
}

/// Attach the operator-facing message to a client error
fn api_error(error: ApiError) -> anyhow::Error {
    let message = error.user_message();
    anyhow::Error::new(error).context(message)
}
