//! # Console Example
//!
//! A line-oriented console for a running Game Service:
//!
//! 1. Connect to the service over HTTP and fetch the first snapshot
//! 2. Read commands from stdin (`start`, `stop`, `shot x y`, anything else)
//! 3. Print both boards whenever they change, plus every log line
//! 4. Exit on game over, `quit`, end of input or Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! # Start a Game Service on localhost:8080, then:
//! cargo run --example console
//!
//! # Override the address, or use the legacy text endpoint:
//! SALVO_ADDRESS=10.0.0.5:8080 SALVO_SNAPSHOT_FORMAT=text cargo run --example console
//! ```

use salvo_client::{
    CommandDispatcher, HttpConfig, HttpGameService, SessionConfig, SessionController,
    SessionEvent, SnapshotFormat,
};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Default service address when `SALVO_ADDRESS` is not set.
const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for request-level output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let address = std::env::var("SALVO_ADDRESS").unwrap_or_else(|_| DEFAULT_ADDRESS.to_string());
    let format = match std::env::var("SALVO_SNAPSHOT_FORMAT").as_deref() {
        Ok("text") => SnapshotFormat::Text,
        _ => SnapshotFormat::Structured,
    };
    let service = HttpGameService::new(HttpConfig::new(&address).with_snapshot_format(format))?;
    let (controller, mut events) = SessionController::new(service, SessionConfig::default());
    let dispatcher = CommandDispatcher::new(controller.clone());

    // ── First snapshot ──────────────────────────────────────────────
    // A service that is not up yet is not fatal; `start` retries.
    if let Err(e) = controller.initialize().await {
        tracing::warn!("could not reach {address}: {e}");
        println!("Type `start` once the game service is up.");
    }

    // ── Console loop ────────────────────────────────────────────────
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    SessionEvent::BoardsUpdated { own, enemy } => {
                        println!("Your ships:\n{own}Enemy ships:\n{enemy}");
                    }
                    SessionEvent::Log(line) => println!("{line}"),
                    SessionEvent::GameOver { winner } => {
                        tracing::info!(?winner, "game finished");
                        // The banner follows as a log line.
                        while let Ok(SessionEvent::Log(line)) = events.try_recv() {
                            println!("{line}");
                        }
                        break;
                    }
                    SessionEvent::Started { session_id } => {
                        tracing::info!(%session_id, "polling started");
                    }
                    SessionEvent::Stopped { session_id } => {
                        tracing::info!(%session_id, "polling stopped");
                    }
                    SessionEvent::ShotApplied(shot) => {
                        tracing::debug!(coordinate = %shot.coordinate, outcome = %shot.outcome, "shot applied");
                    }
                }
            }

            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                if line == "quit" {
                    break;
                }
                // Dispatch in the background so board updates keep printing
                // while the command and its refresh are in flight. Failures
                // arrive as log lines.
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    let _ = dispatcher.submit(&line).await;
                });
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, exiting");
                break;
            }
        }
    }

    Ok(())
}
