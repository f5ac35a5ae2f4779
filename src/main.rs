mod adapters;
mod audio;
mod config;
mod data;
mod messages;
mod routers;
mod switchboard;

use adapters::{DesktopPermissions, DeviceRecorder, FsCatalog, QueuePlayer};
use audio::AudioFormat;
use config::Config;
use messages::{
    CatalogMessage, Message, Output, PermissionMessage, PlaybackStatus, PlayerMessage,
    RecorderMessage,
};
use routers::{CatalogRouter, PermissionRouter, PlayerRouter, RecorderRouter};
use switchboard::{Switchboard, SwitchboardHandle};

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    tracing::info!("Starting dictaphone");

    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    // Create LocalSet for !Send futures (needed for DeviceRecorder which holds cpal::Stream)
    let local = tokio::task::LocalSet::new();

    local.run_until(async move { run_app(config).await }).await
}

async fn run_app(config: Config) -> Result<()> {
    std::fs::create_dir_all(&config.recordings_dir)?;

    let format = AudioFormat {
        sample_rate: config.sample_rate,
        channels: config.channels,
    };

    let recorder = Arc::new(DeviceRecorder::spawn(format, config.recordings_dir.clone()));
    let player = Arc::new(QueuePlayer::new());
    let catalog = Arc::new(FsCatalog::new(config.recordings_dir.clone()));
    let permissions = Arc::new(DesktopPermissions::new());

    let mut switchboard = Switchboard::new();
    let permission_router = PermissionRouter::new(permissions, switchboard.dispatcher())
        .map_err(|e| anyhow::anyhow!("Failed to wire permission handling: {e}"))?;
    switchboard.add_router(Box::new(RecorderRouter::new(recorder)));
    switchboard.add_router(Box::new(PlayerRouter::new(
        player,
        switchboard.dispatcher(),
        Duration::from_millis(config.progress_poll_ms),
    )));
    switchboard.add_router(Box::new(CatalogRouter::new(catalog)));
    switchboard.add_router(Box::new(permission_router));

    let handle = switchboard.handle();
    tokio::spawn(switchboard.run());

    let mut outputs = handle.subscribe_outputs();
    tokio::spawn(async move {
        while let Ok(output) = outputs.recv().await {
            match output {
                Output::FilesChanged(items) => {
                    tracing::info!(count = items.len(), "Recordings list updated");
                }
                Output::PermissionsUpdated(state) => {
                    tracing::info!(microphone = state.microphone, "Permissions updated");
                }
                Output::RecordingStatusChanged(status) => {
                    tracing::info!(?status, "Recording status");
                }
                Output::PlaybackStatusChanged(PlaybackStatus::Playing {
                    media_id,
                    position_ms,
                    progress,
                }) => {
                    tracing::debug!(%media_id, position_ms, progress, "Playing");
                }
                Output::PlaybackStatusChanged(status) => {
                    tracing::info!(?status, "Playback status");
                }
            }
        }
    });

    handle.dispatch(Message::Permissions(PermissionMessage::Initialize));
    handle.dispatch(Message::Catalog(CatalogMessage::Scan));

    print_help();

    // Command loop
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_command(line.trim(), &handle) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    tracing::info!("Dictaphone shutdown complete");
    Ok(())
}

/// Run one console command. Returns false when the app should exit.
fn handle_command(line: &str, handle: &SwitchboardHandle) -> bool {
    let mut parts = line.splitn(3, char::is_whitespace);
    let command = parts.next().unwrap_or("");

    match command {
        "" => {}
        "record" | "r" => {
            handle.dispatch(Message::Recorder(RecorderMessage::Toggle));
        }
        "play" | "p" => {
            let Some(index) = parts.next().and_then(|s| s.parse::<usize>().ok()) else {
                println!("usage: play <index>");
                return true;
            };
            let media_id = handle
                .state()
                .borrow()
                .recordings
                .get(index)
                .map(|item| item.media_id.clone());
            match media_id {
                Some(media_id) => {
                    handle.dispatch(Message::Player(PlayerMessage::Start { index, media_id }));
                }
                None => println!("no recording at index {index}"),
            }
        }
        "stop" | "s" => {
            handle.dispatch(Message::Player(PlayerMessage::Stop));
        }
        "rename" | "n" => {
            let index = parts.next().and_then(|s| s.parse::<usize>().ok());
            let name = parts.next();
            let (Some(index), Some(name)) = (index, name) else {
                println!("usage: rename <index> <name>");
                return true;
            };
            let locator = handle
                .state()
                .borrow()
                .recordings
                .get(index)
                .map(|item| item.locator.clone());
            match locator {
                Some(locator) => {
                    handle.dispatch(Message::Catalog(CatalogMessage::Rename {
                        locator,
                        name: name.to_string(),
                    }));
                }
                None => println!("no recording at index {index}"),
            }
        }
        "list" | "l" => {
            let state = handle.state();
            let state = state.borrow();
            if state.recordings.is_empty() {
                println!("no recordings yet");
            }
            for (i, item) in state.recordings.iter().enumerate() {
                println!(
                    "{i:3}  {:<30}  {:>7.1}s  {}",
                    item.name,
                    item.duration_ms as f64 / 1000.0,
                    item.locator
                );
            }
        }
        "help" | "h" | "?" => print_help(),
        "quit" | "q" => return false,
        other => println!("unknown command: {other} (try 'help')"),
    }

    true
}

fn print_help() {
    println!("commands:");
    println!("  record | r               toggle recording");
    println!("  list   | l               list recordings");
    println!("  play   | p <index>       play from <index> to the end of the list");
    println!("  stop   | s               stop playback");
    println!("  rename | n <idx> <name>  rename a recording");
    println!("  quit   | q               exit");
}
