//! Idea Board console.
//!
//! Entry point: loads configuration, wires the backend client and hosts the
//! session and feed stores behind a line-oriented console.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use futures::StreamExt;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use idea_board::ErrorKind;
use idea_board::backend::{AppwriteClient, Backend, MemoryBackend};
use idea_board::config::{AppConfig, Cli, Command, LogConfig};
use idea_board::console::{Console, ConsoleCommand, HELP, render_feed};
use idea_board::feed::{FeedSettings, IdeaFeedStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let cli = Cli::parse();
    let config = match AppConfig::from_cli(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.log);

    let backend: Arc<dyn Backend> = if cli.offline() {
        info!(name: "backend.offline", "Using in-process backend");
        Arc::new(MemoryBackend::new())
    } else {
        info!(
            name: "backend.config.loaded",
            endpoint = %config.backend.endpoint,
            project_id = %config.backend.project_id,
            "Backend configuration loaded"
        );
        Arc::new(AppwriteClient::from_config(&config.backend)?)
    };
    let settings = FeedSettings::from_config(&config);

    match cli.command.unwrap_or(Command::Feed) {
        Command::Feed => {
            let feed = IdeaFeedStore::new(backend, settings);
            let items = feed.fetch().await?;
            println!("{}", render_feed(&items));
        }
        Command::Shell { .. } => run_shell(backend, settings).await?,
    }

    Ok(())
}

/// Initialize tracing (M-LOG-STRUCTURED). `RUST_LOG` wins over the
/// configured filter.
fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let (json, plain) = if log.json {
        (Some(fmt::layer().json().with_target(true)), None)
    } else {
        (None, Some(fmt::layer().with_target(true)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .init();
}

async fn run_shell(backend: Arc<dyn Backend>, settings: FeedSettings) -> anyhow::Result<()> {
    let console = Console::mount(backend, settings);

    let state = console.session().wait_until_ready().await;
    match state.current {
        Some(user) => println!("signed in as {}", user.email),
        None => println!("not signed in; `register` or `login` to post ideas"),
    }
    println!("type `help` for commands");

    let mut lines = FramedRead::new(tokio::io::stdin(), LinesCodec::new());
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next().await else {
            break;
        };
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ConsoleCommand>() {
            Ok(ConsoleCommand::Quit) => break,
            Ok(ConsoleCommand::Help) => {
                println!("{HELP}");
                continue;
            }
            Ok(command) => command,
            Err(usage) => {
                println!("{usage}");
                continue;
            }
        };

        match console.execute(command).await {
            Ok(output) => println!("{output}"),
            Err(e) => match e.kind() {
                ErrorKind::AuthFailure => println!("not allowed: {e}"),
                ErrorKind::ValidationFailure => println!("rejected: {e}"),
                _ => println!("error: {e} (try again)"),
            },
        }
        for path in console.take_navigation() {
            println!("-> {path}");
        }
        if let Some(notice) = console.feed().snapshot().notice {
            println!("! {notice}");
            console.feed().dismiss_notice();
        }
    }

    Ok(())
}
