use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use pathsense::kernel::distress::AmbientSignal;
use pathsense::services::console::offline_services;
use pathsense::services::model::ModelClient;
use pathsense::{Orchestrator, OrchestratorConfig};

const HELP: &str = "\
Commands:
  <enter> or !    press the button
  <text>          answer the microphone (after pressing the button)
  ~<text>         ambient speech overheard by the distress monitor
  !!              a sudden loud bang
  quit            shut down";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("PathSense booting...");

    let config = match std::env::var("PATHSENSE_CONFIG") {
        Ok(path) => OrchestratorConfig::from_json_file(&path).with_context(|| format!("loading {}", path))?,
        Err(_) => OrchestratorConfig::default(),
    };

    let (transcript_tx, transcript_rx) = mpsc::channel(8);
    let (ambient_tx, ambient_rx) = mpsc::channel(32);

    let mut services = offline_services(transcript_rx, config.rng_seed);
    if let Ok(url) = std::env::var("PATHSENSE_MODEL_URL") {
        tracing::info!(%url, "using remote model server");
        let client = Arc::new(ModelClient::new(url, Duration::from_secs(10)));
        services.vision = client.clone();
        services.directions = client;
    }

    let orchestrator = Orchestrator::new(config, services);
    let handle = orchestrator.handle();
    handle.attach_ambient(ambient_rx);
    let running = tokio::spawn(orchestrator.run());

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let line = line.trim();
        match line {
            "quit" => break,
            "" | "!" => handle.trigger().await,
            "!!" => {
                let bang = vec![0.0, 0.97, -0.95, 0.4];
                if ambient_tx.send(AmbientSignal::Samples(bang)).await.is_err() {
                    tracing::warn!("distress monitor is not running");
                }
            }
            _ => {
                if let Some(overheard) = line.strip_prefix('~') {
                    if ambient_tx.send(AmbientSignal::Speech(overheard.trim().to_string())).await.is_err() {
                        tracing::warn!("distress monitor is not running");
                    }
                } else if transcript_tx.try_send(line.to_string()).is_err() {
                    tracing::warn!("too many unanswered lines, input dropped");
                }
            }
        }
    }

    handle.shutdown();
    running.await.context("orchestrator task panicked")?;
    let telemetry = serde_json::to_string_pretty(&handle.telemetry())?;
    println!("{}", telemetry);
    Ok(())
}
