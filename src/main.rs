//! Card Lens
//!
//! Identifies trading cards from photos. Reads the name and footer bands
//! with Tesseract, resolves the printing against a card search service,
//! and collects the results into a reviewable batch. Cards can also be
//! received from a paired device as JSON lines on stdin.

mod config;
mod ocr;
mod paths;
mod search;
mod session;

use anyhow::Result;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use config::{get_config, init_config, LensConfig};
use ocr::TesseractFactory;
use search::HttpCardSearch;
use session::{
    export_batch, AdditionMode, CaptureOutcome, FinishSettings, ScanSession, SessionOptions,
};

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join("card_lens.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

#[derive(Parser, Debug)]
#[command(name = "card-lens")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Identify cards from image files
    Scan {
        #[arg(required = true)]
        images: Vec<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Collect cards sent by a paired device as JSON lines on stdin
    Remote {
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Where to write the finished batch
    #[arg(short, long, default_value = "batch.json")]
    out: PathBuf,

    /// Target deck for the batch
    #[arg(short, long)]
    deck: Option<String>,

    /// Move existing copies instead of adding new ones
    #[arg(short, long, default_value_t = false)]
    transfer: bool,
}

impl OutputArgs {
    fn settings(&self, config: &LensConfig) -> FinishSettings {
        FinishSettings {
            target_deck_id: self.deck.clone(),
            addition_mode: if self.transfer {
                AdditionMode::Transfer
            } else {
                AdditionMode::New
            },
            default_finish: config.default_finish,
        }
    }
}

fn session_options(config: &LensConfig) -> SessionOptions {
    SessionOptions {
        capabilities: config.capabilities(),
        default_finish: config.default_finish,
        remote_debounce: Duration::from_millis(config.remote_debounce_ms),
        channel_capacity: config.channel_capacity,
        preview_dir: config.preview_dir(),
    }
}

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(paths::get_logs_dir().join("card_lens.log"))
        {
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));

    paths::ensure_directories()?;
    init_config();
    let config = get_config();

    let cli = Cli::parse();

    let (session, output) = match &cli.command {
        Command::Scan { output, .. } => {
            if let Err(e) = ocr::ensure_tessdata() {
                log(&format!("Warning: Failed to set up tessdata: {}", e));
                log("OCR may not work correctly.");
            }
            let factory = TesseractFactory {
                executable: config.tesseract_path.clone(),
                tessdata: config.tessdata_dir.clone(),
            };
            let search = HttpCardSearch::new(&config.search_base_url, config.search_timeout_secs)?;
            let session =
                ScanSession::start_local(&factory, Arc::new(search), session_options(config))?;
            (session, output)
        }
        Command::Remote { output } => {
            (ScanSession::start_remote_only(session_options(config)), output)
        }
    };

    match &cli.command {
        Command::Scan { images, .. } => scan_images(&session, images),
        Command::Remote { .. } => receive_remote(&session)?,
    }

    let batch = session.finalize(output.settings(config))?;
    export_batch(&batch, &output.out)?;
    log(&format!(
        "Wrote {} cards to {}",
        batch.cards.len(),
        output.out.display()
    ));

    session.close();
    Ok(())
}

fn scan_images(session: &ScanSession, images: &[PathBuf]) {
    for path in images {
        log(&format!("Scanning {}", path.display()));
        match session.capture_file(path) {
            Ok(CaptureOutcome::Added { detection, .. }) => log(&format!("Detected: {}", detection)),
            Ok(CaptureOutcome::Unresolved { detection, .. }) => {
                log(&format!("Not detected: {}", detection))
            }
            Ok(CaptureOutcome::Discarded(e)) => log(&format!("Skipped {}: {}", path.display(), e)),
            Ok(CaptureOutcome::Busy) => log(&format!("Skipped {}: busy", path.display())),
            Err(e) => log(&format!("Failed to scan {}: {:#}", path.display(), e)),
        }
    }
}

/// Reads pairing messages from stdin, one JSON object per line, until EOF.
fn receive_remote(session: &ScanSession) -> Result<()> {
    let inbox = session.remote_inbox()?;
    log(&format!(
        "Waiting for remote cards for session {}",
        inbox.session_id()
    ));

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = inbox.deliver_json(&line) {
            log(&format!("Rejected remote message: {:#}", e));
        }
    }

    // Queued cards are applied before the listing is answered.
    let received = session.list()?;
    if let Some(detection) = session.last_detection() {
        log(&format!("Last received: {}", detection));
    }
    log(&format!("{} entries received", received.len()));
    Ok(())
}
