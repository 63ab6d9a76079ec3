//! POS Bridge simulator CLI
//!
//! Runs a CSV scenario against the bridge backed by the simulated SDK and
//! prints one outcome row per step.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- scenario.csv > outcomes.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity
//! - `POS_BRIDGE_RUNTIME_MODE`: `dedicated` or `generic`
//! - `POS_BRIDGE_SIM__STEP_DELAY_MS`: simulated hardware delay per step

use pos_bridge::{BridgeConfig, ScenarioRunner, ScriptError};
use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), ScriptError> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(ScriptError::MissingArgument);
    }

    let config = BridgeConfig::load()?;
    let file = File::open(&args[1])?;
    let reader = BufReader::new(file);

    let mut runner = ScenarioRunner::new(config);
    runner.process_csv(reader).await?;

    let stdout = io::stdout();
    let handle = stdout.lock();
    runner.write_output(handle)?;

    Ok(())
}
