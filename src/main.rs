mod catalog;
mod player;
mod protocol;
mod server;
mod transport;

use crate::catalog::{CatalogProvider, DEFAULT_CATALOG_URL, TwistCatalog};
use crate::player::{DEFAULT_PLAYER, ProcessLauncher};
use crate::protocol::DEFAULT_SERVER_NAME;
use crate::server::IrcServer;
use crate::transport::DEFAULT_LISTEN_ADDR;
use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use futures::future;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "plottwist")]
#[command(about = "Browse a video catalog from any IRC client and voice episodes to play them")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the IRC server
    Serve {
        /// TCP address to listen on
        #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
        listen: String,

        /// Server name used as the prefix of every reply
        #[arg(long, default_value = DEFAULT_SERVER_NAME)]
        server_name: String,

        /// Base URL of the catalog site
        #[arg(long, default_value = DEFAULT_CATALOG_URL)]
        catalog_url: String,

        /// Player program started for every voiced episode
        #[arg(long, default_value = DEFAULT_PLAYER)]
        player: String,

        /// Extra argument passed to the player before the URL (repeatable)
        #[arg(long = "player-arg", allow_hyphen_values = true)]
        player_args: Vec<String>,
    },

    /// Print the series of the catalog
    Series {
        /// Base URL of the catalog site
        #[arg(long, default_value = DEFAULT_CATALOG_URL)]
        catalog_url: String,
    },

    /// Print the episodes of one or more series
    Episodes {
        /// Series slugs, e.g. naruto
        #[arg(required = true)]
        slugs: Vec<String>,

        /// Base URL of the catalog site
        #[arg(long, default_value = DEFAULT_CATALOG_URL)]
        catalog_url: String,
    },
}

async fn serve(
    listen: &str,
    server_name: &str,
    catalog_url: &str,
    player: String,
    player_args: Vec<String>,
) -> Result<()> {
    let catalog = TwistCatalog::new(catalog_url)
        .map_err(|e| anyhow!("Failed to create catalog client: {}", e))?;
    let launcher = ProcessLauncher::new(player, player_args);

    if !launcher.is_available().await {
        log::warn!(
            "Player '{}' not found on PATH, voicing episodes will fail",
            launcher.program()
        );
    }

    log::info!("Catalog: {}", catalog.base_url());
    log::info!("Player: {}", launcher.program());

    let server = IrcServer::bind(listen, server_name, Arc::new(catalog), Arc::new(launcher))
        .await
        .map_err(|e| anyhow!("Failed to start server: {}", e))?;

    server
        .run()
        .await
        .map_err(|e| anyhow!("Server error: {}", e))
}

async fn print_series(catalog_url: &str) -> Result<()> {
    let catalog = TwistCatalog::new(catalog_url)?;
    let series = catalog
        .list_series()
        .await
        .map_err(|e| anyhow!("Failed to fetch series list: {}", e))?;

    println!("{:<40} Topic", "Channel");
    println!("{}", "-".repeat(80));
    for entry in &series {
        println!("{:<40} {}", protocol::slug_channel(&entry.slug), entry.topic);
    }
    println!("\n{} series", series.len());

    Ok(())
}

async fn print_episodes(catalog_url: &str, slugs: &[String]) -> Result<()> {
    let catalog = TwistCatalog::new(catalog_url)?;

    // Fetch all series in parallel, print in the order given
    let results = future::join_all(slugs.iter().map(|slug| catalog.get_episodes(slug))).await;

    for (slug, result) in slugs.iter().zip(results) {
        match result {
            Ok(detail) => {
                println!("{} ({} episodes)", detail.topic(), detail.episodes.len());
                for episode in &detail.episodes {
                    println!(
                        "  {:<30} {}",
                        episode.display_token(),
                        episode.source.as_deref().unwrap_or("N/A")
                    );
                }
            }
            Err(e) if e.is_not_found() => eprintln!("Series '{}' not found", slug),
            Err(e) => eprintln!("Failed to fetch '{}': {}", slug, e),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve {
            listen,
            server_name,
            catalog_url,
            player,
            player_args,
        } => serve(&listen, &server_name, &catalog_url, player, player_args).await,
        Commands::Series { catalog_url } => print_series(&catalog_url).await,
        Commands::Episodes { slugs, catalog_url } => print_episodes(&catalog_url, &slugs).await,
    };

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["plottwist", "serve"]).unwrap();
        match cli.command {
            Commands::Serve {
                listen,
                server_name,
                catalog_url,
                player,
                player_args,
            } => {
                assert_eq!(listen, "0.0.0.0:6667");
                assert_eq!(server_name, "ircd.twist.moe");
                assert_eq!(catalog_url, "https://twist.moe");
                assert_eq!(player, "mpv");
                assert!(player_args.is_empty());
            }
            _ => panic!("Wrong command"),
        }
    }

    #[test]
    fn test_repeated_player_args() {
        let cli = Cli::try_parse_from([
            "plottwist",
            "serve",
            "--player",
            "vlc",
            "--player-arg",
            "--fullscreen",
            "--player-arg",
            "--no-audio",
        ])
        .unwrap();
        match cli.command {
            Commands::Serve {
                player,
                player_args,
                ..
            } => {
                assert_eq!(player, "vlc");
                assert_eq!(player_args, ["--fullscreen", "--no-audio"]);
            }
            _ => panic!("Wrong command"),
        }
    }

    #[test]
    fn test_episodes_requires_slug() {
        assert!(Cli::try_parse_from(["plottwist", "episodes"]).is_err());
    }
}
