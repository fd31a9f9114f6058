use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

use glossa::db::{self, LookupCache};
use glossa::normalize::{Normalized, normalize};
use glossa::{
    Bot, Config, DictionaryFormatter, Fetched, Formatter, RequestCoordinator, TelegramChannel,
    YandexDictionary, fetch_or_cache, messages,
};

/// Glossa - dictionary lookup bot for Telegram
#[derive(Parser)]
#[command(name = "glossa", version, about)]
struct Cli {
    /// Config file (default: ~/.config/glossa/config.toml)
    #[arg(short, long, env = "GLOSSA_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Telegram bot (default)
    Run,
    /// Look words up through the cache and print the answer
    Lookup {
        /// Words to look up
        #[arg(required = true)]
        words: Vec<String>,
    },
    /// Show the most requested words
    Stats {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.verbose, std::io::stdout);

    let debug = config.as_ref().is_ok_and(|c| c.debug);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_filter(cli.verbose, debug)))
        .init();

    let result = match config {
        Ok(config) => run(cli.command.unwrap_or(Command::Run), config).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Load the config with a scoped subscriber, so config file messages are
/// logged before the config's own debug flag is known
fn load_config<W>(path: Option<&Path>, verbose: u8, writer: W) -> glossa::Result<Config>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_filter(verbose, false)))
        .with_writer(writer)
        .finish();
    tracing::subscriber::with_default(bootstrap, || Config::load(path))
}

/// Log filter for a verbosity count and the config's debug flag
fn log_filter(verbose: u8, debug: bool) -> &'static str {
    match (verbose, debug) {
        (0, false) => "info,glossa=info",
        (0, true) | (1, _) => "info,glossa=debug",
        (2, _) => "debug",
        _ => "trace",
    }
}

async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    match command {
        Command::Run => run_bot(config).await,
        Command::Lookup { words } => lookup(&config, &words.join(" ")).await,
        Command::Stats { limit } => stats(&config, limit),
    }
}

fn dictionary(config: &Config) -> anyhow::Result<YandexDictionary> {
    let key = config.require_dictionary_key()?;
    Ok(YandexDictionary::new(
        key.to_string(),
        config.dictionary.lang.clone(),
        config.dictionary.endpoint.clone(),
        config.dictionary.timeout,
    )?)
}

async fn run_bot(config: Config) -> anyhow::Result<()> {
    let token = config.require_telegram_token()?.to_string();
    let provider = dictionary(&config)?;
    let pool = db::init(&config.db_path)?;

    tracing::info!(
        db = %config.db_path.display(),
        lang = %config.dictionary.lang,
        "starting glossa"
    );

    let (channel, updates) = TelegramChannel::with_receiver(token);
    let coordinator = RequestCoordinator::new(
        pool.clone(),
        Arc::new(provider),
        Arc::new(channel.clone()),
        Arc::new(DictionaryFormatter),
    )
    .with_provider_timeout(config.dictionary.timeout);

    let mut bot = Bot::new(channel.clone(), coordinator, pool);
    bot.prepare().await?;

    let poller = channel.start_polling(config.poll_interval)?;

    tokio::select! {
        () = Arc::new(bot).run(updates) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("shutting down");
        }
    }

    poller.abort();
    Ok(())
}

async fn lookup(config: &Config, text: &str) -> anyhow::Result<()> {
    let key = match normalize(text) {
        Normalized::Query(key) => key,
        Normalized::Empty => anyhow::bail!("{}", messages::EMPTY_REQUEST),
        Normalized::OnlyMarkup => anyhow::bail!("{}", messages::ONLY_TILDE),
    };

    let provider = dictionary(config)?;
    let pool = db::init(&config.db_path)?;
    let lookups = LookupCache::new(pool);

    match fetch_or_cache(&lookups, &provider, config.dictionary.timeout, &key).await? {
        Fetched::Cached(entry) | Fetched::Stored(entry) => {
            tracing::debug!(key = %key, hits = entry.hit_count, "lookup resolved");
            println!("{}", DictionaryFormatter.render(&entry.raw)?);
        }
        Fetched::NotFound => println!("nothing found for {key:?}"),
        Fetched::Failed(e) => return Err(e.into()),
    }
    Ok(())
}

fn stats(config: &Config, limit: usize) -> anyhow::Result<()> {
    let pool = db::init(&config.db_path)?;
    let lookups = LookupCache::new(pool);

    let top = lookups.top(limit)?;
    if top.is_empty() {
        println!("{}", messages::NO_STATS);
        return Ok(());
    }

    let width = top.iter().map(|e| e.content.chars().count()).max().unwrap_or(0);
    for entry in &top {
        println!("{:<width$}  {}", entry.content, entry.hit_count);
    }
    println!("\n{} words cached", lookups.count()?);
    Ok(())
}
