//! roomsync command-line client.
//!
//! Drives the cache-aside synchronizer and the discover queue against a
//! remote matching API, using the configured local store.

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use roomsync::config::{Cli, Command, Config};
use roomsync::discover::state::QueuePhase;
use roomsync::model::listing::{Match, Property};
use roomsync::stack::SyncStack;
use roomsync::{LoadOutcome, SwipeDecision};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "roomsync=debug"
    } else {
        "roomsync=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("roomsync v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    if let Some(base_url) = cli.base_url {
        config.remote.base_url = base_url;
    }
    let config = Arc::new(config);

    info!(
        max_age_ms = config.cache.default_max_age_ms,
        scoped_refresh = ?config.cache.scoped_refresh,
        page_size = config.prefetch.page_size,
        low_water_mark = config.prefetch.low_water_mark,
        "Configuration loaded"
    );

    let stack = SyncStack::open(config.clone()).await?;
    let max_age = config.cache.default_max_age();

    match cli.command {
        Command::Property { id, force } => {
            let sync = stack.synchronizer::<Property>().await?;
            match sync.fetch_one(&id, force, max_age).await? {
                Some(property) => println!("{}", serde_json::to_string_pretty(&property)?),
                None => println!("property {id} not found"),
            }
        }
        Command::Matches { seeker_id, force } => {
            let sync = stack.synchronizer::<Match>().await?;
            match sync.fetch_scoped(&seeker_id, force, max_age).await? {
                Some(matches) => println!("{}", serde_json::to_string_pretty(&matches)?),
                None => println!("no matches for {seeker_id}"),
            }
        }
        Command::Discover {
            seeker_id,
            swipes,
            like,
        } => {
            let decision = if like {
                SwipeDecision::Like
            } else {
                SwipeDecision::Pass
            };
            let controller = stack.discover(&seeker_id);
            let mut states = controller.subscribe();

            let mut swiped = 0;
            while swiped < swipes {
                let state = states.wait_for(|s| !s.is_loading || s.buffered > 0).await?.clone();
                match state.phase() {
                    QueuePhase::Ready => {
                        if let Some(candidate) = controller.on_consume(decision).await {
                            println!("{decision}: {} ({})", candidate.display_name, candidate.id);
                            swiped += 1;
                        }
                    }
                    QueuePhase::Exhausted => {
                        println!("no more candidates");
                        break;
                    }
                    QueuePhase::Failed => {
                        warn!(error = ?state.last_error, "Discover load failed");
                        break;
                    }
                    QueuePhase::Loading | QueuePhase::Empty => {
                        // Idle with nothing buffered: ask for another page.
                        match controller.load_more().await {
                            Ok(LoadOutcome::Loaded { added: 0 }) => {
                                println!("no new candidates");
                                break;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!("Discover load failed: {e}");
                                break;
                            }
                        }
                    }
                }
            }
            controller.dispose().await;
        }
        Command::Clear => {
            stack.clear().await?;
            println!("cache cleared");
        }
    }

    if let Ok(text) = stack.metrics().gather_text() {
        tracing::debug!("metrics:\n{text}");
    }

    Ok(())
}
