use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dialoguer::Input;
use tracing::error;

use soundwave_rs::link::{
    ReceiveSession, ReceiveState, TransmitEvent, TransmitSession, TransmitterConfig,
};
use soundwave_rs::modem::{LoopbackModem, Modem};
use soundwave_rs::ui::progress::{ProgressManager, templates};
use soundwave_rs::ui::print_banner;
use soundwave_rs::utils::consts::MAX_CHUNK_CHARS;
use soundwave_rs::utils::logging::init_logging;

/// Loopback demo: both sessions share one in-process modem, so everything
/// typed at the prompt comes back as received text.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Maximum characters per chunk
    #[arg(long, default_value_t = MAX_CHUNK_CHARS)]
    chunk_size: usize,

    /// Delay between chunks in milliseconds
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,

    /// JSON transmitter configuration (overrides the flags above)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    init_logging();
    print_banner();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match TransmitterConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("failed to load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => TransmitterConfig {
            max_chunk_chars: cli.chunk_size,
            inter_chunk_delay_ms: cli.delay_ms,
        },
    };

    let modem: Arc<dyn Modem> = Arc::new(LoopbackModem::new());
    let transmitter = TransmitSession::new(Arc::clone(&modem), config);
    let receiver = ReceiveSession::new(Arc::clone(&modem));

    receiver.start().unwrap();

    let events = transmitter.events();
    let observations = receiver.observations();

    loop {
        let message: String = Input::new()
            .with_prompt("message (empty line to quit)")
            .allow_empty(true)
            .interact_text()
            .unwrap();
        if message.is_empty() {
            break;
        }

        if let Err(e) = transmitter.submit(&message) {
            error!("submit rejected: {}", e);
            continue;
        }

        let progress = ProgressManager::new();
        loop {
            match events.recv() {
                Ok(TransmitEvent::Started { total_chunks }) => {
                    progress
                        .create_bar("chunks", total_chunks as u64, templates::CHUNKS, "transmitting")
                        .unwrap();
                }
                Ok(TransmitEvent::ChunkSent { .. }) => {
                    let _ = progress.inc("chunks", 1);
                }
                Ok(TransmitEvent::Completed) | Ok(TransmitEvent::Cancelled) => break,
                Ok(TransmitEvent::Failed(e)) => {
                    error!("transmission failed: {}", e);
                    break;
                }
                Err(_) => break,
            }
        }
        progress.finish_all();

        while let Ok(text) = observations.try_recv() {
            println!("received: {}", text);
        }
    }

    if receiver.state() == ReceiveState::Listening {
        receiver.stop().unwrap();
    }
}
