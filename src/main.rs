//! Scryfall Cache CLI
//!
//! Looks up cards through the local cache, fetching from Scryfall only when
//! needed, and prints where cached images live.

use clap::{ArgGroup, Args, Parser, Subcommand};
use scryfall_cache::{CacheConfig, ImageFormat, LookupKey, Result, ScryfallCache};
use std::path::PathBuf;
use std::time::Duration;

/// Local cache for Scryfall card data and images
#[derive(Parser, Debug)]
#[command(name = "scryfall-cache")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Application name used to scope the cache directory
    #[arg(short, long, env = "SCRYFALL_CACHE_APPLICATION", default_value = "scryfall-cache-cli")]
    application: String,

    /// Optional application version, adds a level to the cache directory
    #[arg(long, env = "SCRYFALL_CACHE_VERSION")]
    app_version: Option<String>,

    /// Cache root directory (default: platform data directory)
    #[arg(long, env = "SCRYFALL_CACHE_ROOT")]
    cache_root: Option<PathBuf>,

    /// Scryfall API base URL
    #[arg(long, env = "SCRYFALL_CACHE_BASE_URL", default_value = scryfall_cache::config::DEFAULT_BASE_URL)]
    base_url: String,

    /// Minimum delay between Scryfall requests in milliseconds
    #[arg(long, env = "SCRYFALL_CACHE_REQUEST_INTERVAL_MS", default_value_t = scryfall_cache::config::DEFAULT_REQUEST_INTERVAL_MS)]
    request_interval_ms: u64,

    /// HTTP timeout in seconds
    #[arg(long, env = "SCRYFALL_CACHE_TIMEOUT_SECS", default_value_t = scryfall_cache::config::DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up a card, optionally downloading images
    Card(CardArgs),
    /// Print the cache directory
    Path,
    /// Print cache statistics
    Stats,
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("key")
        .required(true)
        .args(["id", "mtgo", "mtgo_foil", "multiverse", "name", "number"])
))]
struct CardArgs {
    /// Scryfall ID
    #[arg(long)]
    id: Option<String>,

    /// MTGO ID
    #[arg(long)]
    mtgo: Option<u64>,

    /// Foil MTGO ID
    #[arg(long)]
    mtgo_foil: Option<u64>,

    /// Multiverse ID
    #[arg(long)]
    multiverse: Option<u64>,

    /// Exact card name
    #[arg(long)]
    name: Option<String>,

    /// Collector number (requires --set)
    #[arg(long, requires = "set")]
    number: Option<String>,

    /// Set code, restricts --name or qualifies --number
    #[arg(long)]
    set: Option<String>,

    /// Image format to download and print the path of (repeatable)
    #[arg(long = "image", value_name = "FORMAT")]
    images: Vec<ImageFormat>,

    /// Print the full card record as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl CardArgs {
    fn lookup_key(&self) -> Option<LookupKey> {
        if let Some(id) = &self.id {
            return Some(LookupKey::id(id.as_str()));
        }
        if let Some(id) = self.mtgo {
            return Some(LookupKey::Mtgo(id));
        }
        if let Some(id) = self.mtgo_foil {
            return Some(LookupKey::MtgoFoil(id));
        }
        if let Some(id) = self.multiverse {
            return Some(LookupKey::Multiverse(id));
        }
        if let Some(name) = &self.name {
            return Some(match &self.set {
                Some(set) => LookupKey::name_in_set(name.as_str(), set),
                None => LookupKey::name(name.as_str()),
            });
        }
        match (&self.set, &self.number) {
            (Some(set), Some(number)) => Some(LookupKey::set_number(set, number.as_str())),
            _ => None,
        }
    }
}

impl Cli {
    fn config(&self) -> CacheConfig {
        let mut config = CacheConfig::new(self.application.as_str())
            .base_url(self.base_url.as_str())
            .request_interval(Duration::from_millis(self.request_interval_ms))
            .timeout(Duration::from_secs(self.timeout_secs));
        if let Some(version) = &self.app_version {
            config = config.version(version.as_str());
        }
        if let Some(root) = &self.cache_root {
            config = config.root_dir(root);
        }
        config
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let cache = ScryfallCache::from_config(&cli.config())?;

    match &cli.command {
        Command::Path => {
            println!("{}", cache.cache_directory().display());
        }
        Command::Stats => {
            let stats = cache.store().stats()?;
            println!("Cache directory: {}", cache.cache_directory().display());
            println!("Cards:           {}", stats.cards);
            println!("Lookup keys:     {}", stats.lookup_keys);
            println!("Images:          {}", stats.images);
        }
        Command::Card(args) => {
            let Some(key) = args.lookup_key() else {
                return Err(scryfall_cache::CacheError::Config(
                    "no lookup key given".to_string(),
                ));
            };
            let card = cache.get_card(key).await?;

            if args.json {
                let json = serde_json::to_string_pretty(card.record()).map_err(|e| {
                    scryfall_cache::CacheError::Config(format!("failed to render JSON: {}", e))
                })?;
                println!("{}", json);
            } else {
                let record = card.record();
                println!("{} ({} #{})", record.name, record.set, record.collector_number);
                println!("  id: {}", record.id);
                if let Some(type_line) = record.type_line() {
                    println!("  type: {}", type_line);
                }
            }

            for format in &args.images {
                let path = card.image_path(*format).await?;
                println!("  {}: {}", format, path.display());
            }
        }
    }

    Ok(())
}
