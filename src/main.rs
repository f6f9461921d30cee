//! Battle Phases - Script Runner
//!
//! Loads a TOML battle script, drives its phases on a tokio runtime and
//! prints what ran.

use std::path::PathBuf;

use battle_phases::core::config::SchedulerConfig;
use battle_phases::core::error::Result;
use battle_phases::scheduler::{run, PhaseManager, RunSummary};
use battle_phases::script::{BattleScript, ScriptedHandler};
use clap::Parser;
use serde::Serialize;
use tokio::runtime::Runtime;

/// Run a battle script through the phase scheduler
#[derive(Parser, Debug)]
#[command(name = "battle-phases")]
#[command(about = "Drive a scripted battle through the phase scheduler")]
struct Args {
    /// Battle script (TOML)
    script: PathBuf,

    /// Scheduler config (TOML); overrides the script's own [config]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many turns
    #[arg(long)]
    max_turns: Option<u32>,

    /// Seed for dynamic-queue tie-breaks
    #[arg(long)]
    seed: Option<u64>,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Log every scheduler transition
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// JSON output structure
#[derive(Serialize)]
struct ScriptResult {
    script: String,
    #[serde(flatten)]
    summary: RunSummary,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        "battle_phases=debug"
    } else {
        "battle_phases=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let script = BattleScript::load(&args.script)?;
    let mut config = match &args.config {
        Some(path) => SchedulerConfig::load(path)?,
        None => script.config.clone().unwrap_or_default(),
    };
    if args.max_turns.is_some() {
        config.max_turns = args.max_turns;
    }
    if args.seed.is_some() {
        config.tie_break_seed = args.seed;
    }
    config.validate()?;

    tracing::info!("Running '{}'", script.name);

    let mut manager = PhaseManager::new(config);
    script.seed(&mut manager)?;
    let mut handler = ScriptedHandler::new(&script)?;

    let rt = Runtime::new()?;
    let summary = rt.block_on(run(&mut manager, &mut handler))?;

    let result = ScriptResult {
        script: script.name.clone(),
        summary,
    };

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("=== {} ===", result.script);
        for (i, phase) in result.summary.started.iter().enumerate() {
            println!("{:>4}  {}", i + 1, phase);
        }
        println!();
        println!("Turns:       {}", result.summary.turns);
        println!("Transitions: {}", result.summary.transitions);
        println!("Stopped:     {:?}", result.summary.stop_reason);
    }

    Ok(())
}
