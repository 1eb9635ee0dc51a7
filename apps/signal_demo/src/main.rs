use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use traffic_core::{SignalConfig, SignalController};

/// Run a traffic signal and log every green it shows.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Signal config file (default: configs/signal.toml, else built-in timings).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of green phases to wait for before stopping.
    #[arg(long, default_value_t = 3)]
    greens: u32,

    /// Print the JSON schema of the signal config and exit.
    #[arg(long, default_value_t = false)]
    schema: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.schema {
        let schema = schemars::schema_for!(SignalConfig);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => traffic_config::load_signal_config_from(path)?,
        None => traffic_config::load_signal_config()?,
    };
    let controller = Arc::new(SignalController::new(config)?);
    controller.start()?;
    log::info!("Signal is {}", controller.current_phase());

    let greens = args.greens;
    for n in 1..=greens {
        let waiting = Arc::clone(&controller);
        let wait = tokio::task::spawn_blocking(move || waiting.wait_for_green());

        tokio::select! {
            result = wait => {
                result??;
                log::info!(
                    "Green {}/{}: traffic may proceed ({} transitions so far)",
                    n,
                    greens,
                    controller.transitions()
                );
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Ctrl-C received, stopping signal");
                break;
            }
        }
    }

    // Joins the cycle thread and releases a waiter left behind by Ctrl-C.
    tokio::task::spawn_blocking(move || controller.shutdown()).await?;
    Ok(())
}
