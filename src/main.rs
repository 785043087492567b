use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use lol_live_predict::config::{
    DEFAULT_FEED_URL, DEFAULT_POLL_COUNT, DEFAULT_TIMEOUT_SECS, FeedConfig, ModelConfig,
    ServerConfig,
};
use lol_live_predict::export::{GameRows, write_rows};
use lol_live_predict::features::{build_match_features, expand_all};
use lol_live_predict::feed::LiveStatsClient;
use lol_live_predict::model::XgbBooster;
use lol_live_predict::pipeline::predict_game;
use lol_live_predict::server::{self, AppState};
use lol_live_predict::timeline::{fetch_timeline, load_timeline, parse_start_time, save_timeline};
use lol_live_predict::training::prepare_training_set;

#[derive(Parser, Debug)]
#[command(
    name = "lol-live-predict",
    about = "Win probabilities for live LoL esports games from the lolesports feed",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP prediction service
    Serve {
        #[command(flatten)]
        feed: FeedArgs,
        #[command(flatten)]
        model: ModelArgs,
        /// Address to bind
        #[arg(long, env = "LOL_BIND", default_value = "0.0.0.0:8000")]
        bind: SocketAddr,
    },
    /// Download a game's timeline and save the ordered frames as JSON
    Fetch {
        #[command(flatten)]
        feed: FeedArgs,
        #[arg(long = "game-id")]
        game_id: String,
        /// Game start, e.g. 2024-03-01T17:00:00.000Z
        #[arg(long = "starting-time")]
        starting_time: String,
        #[arg(long)]
        out: PathBuf,
    },
    /// Build the expanded feature rows of a game and write them to .csv or .parquet
    Features {
        #[command(flatten)]
        feed: FeedArgs,
        /// Live game to poll (ignored when --timeline is given)
        #[arg(long = "game-id", required_unless_present = "timeline")]
        game_id: Option<String>,
        /// Previously saved timeline JSON
        #[arg(long)]
        timeline: Option<PathBuf>,
        #[arg(long = "starting-time")]
        starting_time: String,
        #[arg(long)]
        out: PathBuf,
    },
    /// Predict one game and print the interleaved probabilities
    Predict {
        #[command(flatten)]
        feed: FeedArgs,
        #[command(flatten)]
        model: ModelArgs,
        #[arg(long = "game-id")]
        game_id: String,
        #[arg(long = "starting-time")]
        starting_time: String,
    },
    /// Turn an Oracle's Elixir match-data CSV into an expanded training Parquet
    PrepareTraining {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
struct FeedArgs {
    /// Live-stats base URL
    #[arg(long = "feed-url", env = "LOL_FEED_URL", default_value = DEFAULT_FEED_URL)]
    feed_url: String,

    /// Number of one-minute windows to poll
    #[arg(long = "polls", env = "LOL_FEED_POLLS", default_value_t = DEFAULT_POLL_COUNT)]
    polls: u32,

    /// Per-request timeout in seconds
    #[arg(long = "timeout-secs", env = "LOL_FEED_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,
}

impl FeedArgs {
    fn to_config(&self) -> FeedConfig {
        FeedConfig::default()
            .with_base_url(&self.feed_url)
            .with_poll_count(self.polls)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// XGBoost model saved as JSON
    #[arg(long = "model", env = "LOL_MODEL_PATH")]
    model_path: PathBuf,

    /// Replace missing features with 0 before scoring
    #[arg(long = "fill-missing-zero", env = "LOL_FILL_MISSING_ZERO")]
    fill_missing_zero: bool,
}

impl ModelArgs {
    fn to_config(&self) -> ModelConfig {
        ModelConfig {
            model_path: self.model_path.clone(),
            fill_missing_zero: self.fill_missing_zero,
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lol_live_predict=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn load_model(config: &ModelConfig) -> Result<XgbBooster> {
    XgbBooster::load(&config.model_path, config.fill_missing_zero)
        .with_context(|| format!("loading model {}", config.model_path.display()))
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging();

    match args.command {
        Command::Serve { feed, model, bind } => {
            let feed_config = feed.to_config();
            let model = load_model(&model.to_config())?;
            let state = AppState {
                source: Arc::new(LiveStatsClient::new(&feed_config)?),
                model: Arc::new(model),
                feed: Arc::new(feed_config),
            };

            // The feed client is blocking, so it is built outside the runtime and
            // only used from `spawn_blocking`.
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(state, ServerConfig { bind }))?;
        }
        Command::Fetch {
            feed,
            game_id,
            starting_time,
            out,
        } => {
            let start = parse_start_time(&starting_time)?;
            let config = feed.to_config();
            let client = LiveStatsClient::new(&config)?;

            let frames = fetch_timeline(&client, &config, &game_id, start);
            save_timeline(&out, &frames)?;
            eprintln!("Saved {} frames to {}", frames.len(), out.display());
        }
        Command::Features {
            feed,
            game_id,
            timeline,
            starting_time,
            out,
        } => {
            let start = parse_start_time(&starting_time)?;

            let (label, frames) = match (timeline, game_id) {
                (Some(path), game_id) => {
                    let label = game_id.unwrap_or_else(|| {
                        path.file_stem()
                            .and_then(|s| s.to_str())
                            .unwrap_or("timeline")
                            .to_string()
                    });
                    (label, load_timeline(&path)?)
                }
                (None, Some(game_id)) => {
                    let config = feed.to_config();
                    let client = LiveStatsClient::new(&config)?;
                    let frames = fetch_timeline(&client, &config, &game_id, start);
                    (game_id, frames)
                }
                (None, None) => return Err(anyhow!("either --game-id or --timeline is required")),
            };

            let features = build_match_features(&frames, start);
            let rows = expand_all(&features.rows);
            write_rows(
                &out,
                &[GameRows {
                    game_id: &label,
                    rows: &rows,
                }],
            )?;
            eprintln!(
                "Wrote {} rows for {} (last observed minute: {:?}) to {}",
                rows.len(),
                label,
                features.last_minute,
                out.display()
            );
        }
        Command::Predict {
            feed,
            model,
            game_id,
            starting_time,
        } => {
            let start = parse_start_time(&starting_time)?;
            let config = feed.to_config();
            let client = LiveStatsClient::new(&config)?;
            let model = load_model(&model.to_config())?;

            let prediction = predict_game(&client, &config, &model, &game_id, start)?;
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        Command::PrepareTraining { csv, out } => {
            let rows = prepare_training_set(&csv, &out)?;
            eprintln!("Wrote {} training rows to {}", rows, out.display());
        }
    }

    Ok(())
}
