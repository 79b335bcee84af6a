use anyhow::{Context, Result};
use clap::Parser;
use gridfeed::config::Config;
use gridfeed::feed::{Column, ContentKind, FeedOrchestrator, MasonryLayout};
use gridfeed::provider::{build_client, ProviderKind, ProviderRegistry};
use std::path::PathBuf;

/// Get the default config file path (~/.config/gridfeed/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("gridfeed")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(name = "gridfeed", about = "Browse Tenor and Klipy media feeds from the terminal")]
struct Args {
    /// Content provider (tenor or klipy)
    #[arg(long, default_value = "tenor")]
    provider: ProviderKind,

    /// Content kind (gif, sticker or clip)
    #[arg(long, default_value = "gif")]
    kind: ContentKind,

    /// Search text; trending content is shown when omitted
    #[arg(long)]
    query: Option<String>,

    /// Number of pages to load
    #[arg(long, default_value_t = 1, value_name = "N")]
    pages: usize,

    /// Select the display item at this index (repeatable)
    #[arg(long = "select", value_name = "INDEX")]
    select: Vec<usize>,

    /// Config file path
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.apply_env();
    tracing::debug!(config = ?config, "Effective configuration");

    let client = build_client().context("Failed to build HTTP client")?;
    let providers =
        ProviderRegistry::from_config(&config, client).context("Invalid provider configuration")?;

    let mut feed = FeedOrchestrator::new(providers, args.provider, args.kind);
    if let Some(query) = args.query {
        feed.set_query(query);
    }

    feed.start();
    feed.settle().await;

    for _ in 1..args.pages {
        if !feed.load_more() {
            break;
        }
        feed.settle().await;
    }

    let display = feed.display_items();
    if display.is_empty() {
        eprintln!(
            "No {} results from {} (check the API key in {} or the environment)",
            feed.kind(),
            feed.provider(),
            config_path.display()
        );
    }

    let columns = MasonryLayout::assignments(&display);
    for (index, (item, column)) in display.iter().zip(&columns).enumerate() {
        let side = match column {
            Column::Left => "L",
            Column::Right => "R",
        };
        if item.is_ad {
            println!("{index:>4} {side} [sponsored] {}", item.id);
        } else {
            println!(
                "{index:>4} {side} {} {}x{} {}",
                item.id, item.width, item.height, item.url
            );
        }
    }

    let layout = feed.layout();
    println!(
        "columns: left {} items ({:.2}), right {} items ({:.2})",
        layout.left.len(),
        layout.left_total,
        layout.right.len(),
        layout.right_total
    );
    if feed.state().next_cursor().is_none() {
        println!("end of feed");
    }

    for index in args.select {
        let Some(item) = display.get(index) else {
            eprintln!("Warning: no item at index {index}");
            continue;
        };
        if feed.select(item).is_none() {
            eprintln!("Warning: item {index} is not selectable");
        }
    }

    for selected in feed.selections() {
        println!(
            "selected {} [{}] {} (aspect {:.3})",
            selected.id, selected.kind, selected.url, selected.aspect_ratio
        );
    }

    Ok(())
}
