//! SkyMate CLI entry point.
//!
//! Operator and demo subcommands over the preference engine: extract and
//! persist preferences, inspect or forget them, compile a search plan, and
//! rank a saved flight-offer response.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use skymate::config::SkymateConfig;
use skymate::engine::PreferenceEngine;
use skymate::flights::amadeus::parse_offers;
use skymate::flights::{SearchRequest, TravelClass};
use skymate::memory::{MemoryBackend, MemoryEngine};
use skymate::preferences::{
    persistable_preferences, PatternExtractor, PreferenceCategory, PreferenceStore, UiPreferences,
};

/// SkyMate: travel preference resolution and flight ranking.
#[derive(Parser)]
#[command(name = "skymate", version, about)]
struct Cli {
    /// User whose preferences to read or write.
    #[arg(long, global = true, default_value = "local")]
    user: String,

    /// Write JSON logs to this directory in addition to stderr.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Print the preferences a message would yield, without storing them.
    Extract {
        /// Chat message to analyse.
        message: String,
    },
    /// Extract preferences from a message and store them.
    Learn {
        /// Chat message to learn from.
        message: String,
    },
    /// Store an explicit preference statement.
    Remember {
        /// Preference text, e.g. "window seat".
        preference: String,
    },
    /// List stored preferences and the resolved summary.
    Prefs {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Forget stored preferences.
    Forget {
        /// Preference text (raw or canonical) to forget.
        text: Option<String>,
        /// Forget every preference in this category.
        #[arg(long, conflicts_with_all = ["text", "all", "id"])]
        category: Option<String>,
        /// Forget one preference by id.
        #[arg(long, conflicts_with_all = ["text", "all"])]
        id: Option<String>,
        /// Forget everything.
        #[arg(long, conflicts_with = "text")]
        all: bool,
    },
    /// Compile a search plan from a request and resolved preferences.
    Plan {
        /// Search request.
        #[command(flatten)]
        request: RequestArgs,
        /// UI selections for this request.
        #[command(flatten)]
        ui: UiArgs,
    },
    /// Filter and tag offers from a saved flight-offers JSON response.
    Rank {
        /// Path to the response file.
        file: PathBuf,
        /// Apply the user's resolved preferences as a filter.
        #[arg(long)]
        filter: bool,
    },
}

/// Search request flags.
#[derive(Args)]
struct RequestArgs {
    /// Origin IATA code.
    #[arg(long)]
    origin: String,
    /// Destination IATA code.
    #[arg(long)]
    destination: String,
    /// Departure date, YYYY-MM-DD.
    #[arg(long)]
    date: String,
    /// Return date, YYYY-MM-DD.
    #[arg(long)]
    return_date: Option<String>,
    /// Adult passengers.
    #[arg(long)]
    adults: Option<u32>,
    /// Cabin class (economy, premium_economy, business, first).
    #[arg(long = "class")]
    travel_class: Option<String>,
    /// Explicitly request or refuse direct flights.
    #[arg(long)]
    non_stop: Option<bool>,
}

/// UI selection flags.
#[derive(Args)]
struct UiArgs {
    /// Cabin class selected in the UI.
    #[arg(long)]
    ui_cabin: Option<String>,
    /// Direct-flights toggle.
    #[arg(long)]
    ui_direct: bool,
    /// Avoid red-eye toggle.
    #[arg(long)]
    ui_no_red_eye: bool,
    /// Preferred departure time (morning, afternoon, evening).
    #[arg(long)]
    ui_time: Option<String>,
    /// Trip type (one-way, round-trip).
    #[arg(long)]
    ui_trip: Option<String>,
}

impl UiArgs {
    fn into_preferences(self) -> UiPreferences {
        UiPreferences {
            cabin_class: self.ui_cabin,
            direct_flights_only: Some(self.ui_direct),
            avoid_red_eye: Some(self.ui_no_red_eye),
            preferred_time: self.ui_time,
            trip_type: self.ui_trip,
        }
    }
}

impl RequestArgs {
    fn into_request(self) -> anyhow::Result<SearchRequest> {
        let travel_class = self
            .travel_class
            .as_deref()
            .map(TravelClass::parse)
            .transpose()?;
        Ok(SearchRequest {
            origin: self.origin.to_uppercase(),
            destination: self.destination.to_uppercase(),
            departure_date: self.date,
            return_date: self.return_date,
            adults: self.adults,
            travel_class,
            non_stop: self.non_stop,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = SkymateConfig::load().context("failed to load configuration")?;
    let _logging_guard = match &cli.log_dir {
        Some(dir) => Some(skymate::logging::init_production(dir, &config.logging.level)?),
        None => {
            skymate::logging::init_cli(&config.logging.level);
            None
        }
    };

    if let Command::Extract { message } = &cli.command {
        handle_extract(message);
        return Ok(());
    }

    let (engine, memory) = open_engine(&config).await?;
    let user = cli.user.as_str();

    let result = match cli.command {
        Command::Extract { .. } => Ok(()),
        Command::Learn { message } => handle_learn(&engine, user, &message).await,
        Command::Remember { preference } => handle_remember(&engine, user, &preference).await,
        Command::Prefs { json } => handle_prefs(&engine, user, json).await,
        Command::Forget {
            text,
            category,
            id,
            all,
        } => handle_forget(&engine, user, text, category, id, all).await,
        Command::Plan { request, ui } => handle_plan(&engine, user, request, ui).await,
        Command::Rank { file, filter } => handle_rank(&engine, user, &file, filter).await,
    };

    if let Some(memory) = memory {
        if let Err(e) = memory.flush().await {
            debug!(error = %e, "fuzzy memory flush failed");
        }
    }
    result
}

/// Open the (migrated) database and build the engine.
async fn open_engine(
    config: &SkymateConfig,
) -> anyhow::Result<(PreferenceEngine, Option<Arc<MemoryEngine>>)> {
    let path = config.database_path()?;
    let pool = skymate::db::open(&path, config.database.max_connections).await?;

    let memory = config
        .memory
        .enabled
        .then(|| Arc::new(MemoryEngine::new(pool.clone())));
    let backend = memory
        .as_ref()
        .map(|m| Arc::clone(m) as Arc<dyn MemoryBackend>);
    let engine = PreferenceEngine::from_config(PreferenceStore::new(pool), backend, config);
    Ok((engine, memory))
}

fn handle_extract(message: &str) {
    let extracted = PatternExtractor::new().extract_detailed(message);
    let persistable = persistable_preferences(message, extracted.clone());
    for item in &extracted {
        let marker = if persistable.contains(item) { "" } else { "  (transient)" };
        println!("{}: {}{marker}", item.category, item.label);
    }
}

async fn handle_learn(engine: &PreferenceEngine, user: &str, message: &str) -> anyhow::Result<()> {
    let stored = engine.learn_from_message(user, message).await?;
    if stored.is_empty() {
        println!("No preferences found.");
    }
    for record in stored {
        println!("Stored {}: {}", record.category, record.canonical_text);
    }
    Ok(())
}

async fn handle_remember(
    engine: &PreferenceEngine,
    user: &str,
    preference: &str,
) -> anyhow::Result<()> {
    let record = engine.remember(user, preference).await?;
    println!("I'll remember: {} ({})", record.canonical_text, record.category);
    Ok(())
}

async fn handle_prefs(engine: &PreferenceEngine, user: &str, json: bool) -> anyhow::Result<()> {
    let records = engine.preferences(user).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No stored preferences.");
        return Ok(());
    }
    for record in &records {
        println!("{}  {:<16} {}", record.id, record.category.as_str(), record.canonical_text);
    }
    println!();
    let resolved = engine.resolve(user, &UiPreferences::default()).await?;
    for line in resolved.summary_lines() {
        println!("{line}");
    }
    Ok(())
}

async fn handle_forget(
    engine: &PreferenceEngine,
    user: &str,
    text: Option<String>,
    category: Option<String>,
    id: Option<String>,
    all: bool,
) -> anyhow::Result<()> {
    let removed = if all {
        engine.forget_all(user).await?
    } else if let Some(category) = category {
        let category = PreferenceCategory::parse(&category)?;
        engine.forget_category(user, category).await?
    } else if let Some(id) = id {
        u64::from(engine.forget_by_id(user, &id).await?)
    } else if let Some(text) = text {
        engine.forget(user, &text).await?
    } else {
        anyhow::bail!("nothing to forget: pass TEXT, --category, --id, or --all");
    };
    println!("Removed {removed} preference(s).");
    Ok(())
}

async fn handle_plan(
    engine: &PreferenceEngine,
    user: &str,
    request: RequestArgs,
    ui: UiArgs,
) -> anyhow::Result<()> {
    let request = request.into_request()?;
    let (params, filter) = engine
        .plan_search(user, &request, &ui.into_preferences())
        .await?;
    let plan = serde_json::json!({"params": params, "filter": filter});
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

async fn handle_rank(
    engine: &PreferenceEngine,
    user: &str,
    file: &std::path::Path,
    filter: bool,
) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let response: serde_json::Value =
        serde_json::from_str(&contents).context("response is not valid JSON")?;
    let offers = parse_offers(&response)?;

    let spec = if filter {
        engine
            .plan_search(user, &SearchRequest::default(), &UiPreferences::default())
            .await?
            .1
    } else {
        skymate::flights::FilterSpec::default()
    };
    let ranked = engine.filter_and_rank(offers, &spec);
    println!("{}", serde_json::to_string_pretty(&ranked)?);
    Ok(())
}
