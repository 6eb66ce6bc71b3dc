//! Phantom Log terminal driver.
//!
//! Plays one session at a time over stdin/stdout. Sessions are saved after
//! every action, so a game can be picked up again with `--session`.
//!
//! ```bash
//! cargo run -p phantom -- --store-dir ./saves
//! cargo run -p phantom -- --offline --seed 7
//! ```

mod repl;

use clap::Parser;
use phantom_core::{
    new_session_id, ClaudeDialogue, DialogueConfig, DialogueGenerator, FileStore, GameConfig,
    PhaseMachine, ScriptedDialogue, SessionDriver, SpeakerStrategy,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "phantom")]
#[command(about = "Find the phantom among five AI participants")]
struct Args {
    /// Resume (or create) the session with this id
    #[arg(short, long)]
    session: Option<String>,

    /// Directory where sessions are saved
    #[arg(long, default_value = "saves")]
    store_dir: PathBuf,

    /// Seed for the phantom draw and night choices
    #[arg(long)]
    seed: Option<u64>,

    /// Let the model pick the next speaker instead of round-robin
    #[arg(long)]
    ranked: bool,

    /// Claude model to use
    #[arg(long)]
    model: Option<String>,

    /// Use canned dialogue instead of the API
    #[arg(long)]
    offline: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let dialogue: Arc<dyn DialogueGenerator> = if args.offline {
        Arc::new(ScriptedDialogue::new())
    } else {
        let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") else {
            eprintln!("Error: ANTHROPIC_API_KEY environment variable not set.");
            eprintln!("Set it in .env, export it, or run with --offline.");
            std::process::exit(1);
        };
        let config = DialogueConfig {
            model: args.model.clone(),
            ..DialogueConfig::default()
        };
        Arc::new(ClaudeDialogue::new(api_key, config)?)
    };

    let strategy = if args.ranked {
        SpeakerStrategy::Ranked
    } else {
        SpeakerStrategy::RoundRobin
    };
    let config = GameConfig::new().with_speaker_strategy(strategy);
    let machine = PhaseMachine::new(config, dialogue)?;

    let store = Arc::new(FileStore::open(args.store_dir.clone()).await?);
    let mut driver = SessionDriver::new(machine, store.clone());
    if let Some(seed) = args.seed {
        driver = driver.with_seed(seed);
    }

    let session_id = args.session.unwrap_or_else(new_session_id);
    tracing::info!(session_id = %session_id, store = %args.store_dir.display(), "starting");

    repl::run(driver, store, session_id).await?;
    Ok(())
}
