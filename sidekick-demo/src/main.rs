use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sidekick::QueryClient;
use sidekick_demo::{pages, Hero, SuperHeroApi};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sidekick-demo", about = "Browse and add super heroes")]
struct Cli {
    /// Base URL of the superhero API
    #[arg(long, env = "SIDEKICK_URL", default_value = "http://localhost:4000")]
    url: String,
    /// Seconds fetched data stays fresh
    #[arg(long, default_value_t = 0)]
    stale_time: u64,
    /// How often a failed request is retried
    #[arg(long, default_value_t = 3)]
    retry: u32,
    #[command(subcommand)]
    command: Command
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the names of all heroes
    Heroes,
    /// Show a single hero
    Hero { id: u64 },
    /// Load heroes and friends at the same time
    Parallel,
    /// Load several heroes by ID at the same time
    DynamicParallel {
        #[arg(default_values_t = vec![1, 3])]
        ids: Vec<u64>
    },
    /// Show the courses of a user's channel
    Dependent {
        #[arg(default_value = "vishwas@example.com")]
        email: String
    },
    /// Add a hero
    Add { name: String, alter_ego: String }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let api = SuperHeroApi::new(&cli.url)
        .map_err(|e| e.compat())
        .with_context(|| format!("invalid API url {}", cli.url))?;
    let client = QueryClient::builder()
        .with_stale_time(Duration::from_secs(cli.stale_time))
        .with_retry(cli.retry)
        .build();

    let lines = match cli.command {
        Command::Heroes => pages::super_heroes_page(&client, &api).await,
        Command::Hero { id } => pages::super_hero_page(&client, &api, id).await,
        Command::Parallel => pages::parallel_queries_page(&client, &api).await,
        Command::DynamicParallel { ids } => Ok(pages::dynamic_parallel_page(&client, &api, &ids).await),
        Command::Dependent { email } => pages::dependent_queries_page(&client, &api, &email).await,
        Command::Add { name, alter_ego } => {
            pages::add_hero_page(&client, &api, Hero::new(name, alter_ego)).await
        }
    }
    .map_err(|e| e.compat())?;

    for line in lines {
        println!("{}", line);
    }

    Ok(())
}
