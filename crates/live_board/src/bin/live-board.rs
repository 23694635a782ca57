use anyhow::Context;
use clap::Parser;
use domain::NewLive;
use domain::embed::ThumbnailQuality;
use live_board::client::DEFAULT_API_BASE_URL;
use live_board::{Action, ApiClient, BoardController, BoardOptions, Mode, Snapshot};
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Terminal front end and admin tool for the live board
#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the lives API
    #[clap(long, env = "API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    api_base_url: String,

    /// Bearer token for admin commands
    #[clap(long, env = "LIVE_BOARD_TOKEN")]
    token: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Follow the board: show the current live and re-render on changes
    Watch {
        /// Seconds between liveness checks
        #[clap(long, default_value_t = 30)]
        poll_interval_secs: u64,

        /// Browse the archive, filtered by this title search
        #[clap(long)]
        query: Option<String>,

        /// Use the small thumbnails of the mobile layout
        #[clap(long)]
        mobile: bool,
    },

    /// Print records, newest first
    List {
        /// Only live (true) or ended (false) records
        #[clap(long)]
        is_live: Option<bool>,
    },

    /// Log in and print a bearer token
    Login {
        #[clap(long, env = "ADMIN_EMAIL")]
        email: String,
        #[clap(long, env = "ADMIN_PASSWORD")]
        password: String,
    },

    /// Register a live (requires a token)
    Add {
        #[clap(long)]
        title: String,
        #[clap(long)]
        url: String,
        /// Register the record as already ended
        #[clap(long)]
        ended: bool,
    },

    /// Delete a live by id (requires a token)
    Delete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();
    let mut client = ApiClient::new(&cli.api_base_url).context("invalid API base URL")?;
    if let Some(token) = &cli.token {
        client = client.with_token(token.clone());
    }

    match cli.command {
        Commands::Watch {
            poll_interval_secs,
            query,
            mobile,
        } => {
            let options = BoardOptions {
                poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
                thumbnail_quality: if mobile {
                    ThumbnailQuality::Default
                } else {
                    ThumbnailQuality::High
                },
            };
            watch(client, options, query).await?;
        }
        Commands::List { is_live } => {
            let lives = client.list_lives(is_live).await.map_err(user_facing)?;
            for live in lives {
                let flag = if live.is_live { "LIVE" } else { "    " };
                println!("{flag} {} {}  {}  {}", live.created_at.to_rfc3339(), live.id, live.title, live.url);
            }
        }
        Commands::Login { email, password } => {
            let token = client.login(&email, &password).await.map_err(user_facing)?;
            println!("{token}");
        }
        Commands::Add { title, url, ended } => {
            let new = NewLive {
                title,
                url,
                is_live: !ended,
            };
            let live = client.create_live(&new).await.map_err(user_facing)?;
            println!("{} {}", live.id, live.url);
        }
        Commands::Delete { id } => {
            client.delete_live(&id).await.map_err(user_facing)?;
            println!("deleted {id}");
        }
    }

    Ok(())
}

fn user_facing(e: live_board::Error) -> anyhow::Error {
    tracing::debug!(error = ?e, "command failed");
    anyhow::anyhow!(e.user_message())
}

async fn watch(client: ApiClient, options: BoardOptions, query: Option<String>) -> anyhow::Result<()> {
    let controller = BoardController::new(Arc::new(client), options);
    let mut updates = controller.subscribe();

    if let Err(e) = controller.refresh().await {
        tracing::warn!(error = %e, "initial load failed");
    }
    if let Some(query) = query {
        controller.dispatch(Action::ShowPrevious);
        controller.dispatch(Action::Search(query));
    }
    render(&controller.snapshot());
    updates.mark_unchanged();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if !snapshot.loading {
                    render(&snapshot);
                }
            }
        }
    }

    controller.teardown();
    Ok(())
}

fn render(snapshot: &Snapshot) {
    println!();
    if let Some(error) = &snapshot.error {
        println!("! {error}");
    }
    match (&snapshot.active, &snapshot.player_src) {
        (Some(live), Some(src)) => println!("▶ {}  {}", live.title, src),
        _ if snapshot.mode == Mode::Current => println!("No live stream right now."),
        _ => {
            if !snapshot.query.is_empty() {
                println!("Search: {:?}", snapshot.query);
            }
            if snapshot.filtered.is_empty() {
                println!("No previous lives found matching your search.");
            }
            for entry in &snapshot.filtered {
                println!("  {}  {}  {}", entry.live.id, entry.live.title, entry.thumbnail);
            }
        }
    }
}
