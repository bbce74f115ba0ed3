//! Scanning session controller.
//!
//! A session owns the aggregator worker, the command queue and, for local
//! scanning, the recognizer. Captures run one at a time: a capture that
//! arrives while another is in flight is dropped, not queued.

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::aggregator::{Capabilities, EntryUpdate, Finish, ScanAggregator, ScannedEntry, Submission};
use super::queue::{create_command_queue, SessionCommand};
use super::remote::RemoteInbox;
use super::worker::run_aggregator_worker;
use crate::log;
use crate::ocr::{read_card, RecognizerFactory, RecognizerGuard, ScanError};
use crate::search::{CardSearch, ResolutionEngine, ResolutionResult, ResolveFailure};

/// Settings for a new session.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub capabilities: Capabilities,
    pub default_finish: Finish,
    pub remote_debounce: Duration,
    pub channel_capacity: usize,
    /// Where to write binarized crops, if anywhere.
    pub preview_dir: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            capabilities: Capabilities { batch_scan: true },
            default_finish: Finish::Nonfoil,
            remote_debounce: Duration::from_millis(2000),
            channel_capacity: 32,
            preview_dir: None,
        }
    }
}

/// Status line shown to the operator after a capture.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Detection {
    Success { name: String, price: String },
    Failure { message: String, raw: Option<String> },
}

impl std::fmt::Display for Detection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Detection::Success { name, price } => write!(f, "{} (${})", name, price),
            Detection::Failure { message, raw: Some(raw) } if !raw.is_empty() => {
                write!(f, "{} [read: \"{}\"]", message, raw)
            }
            Detection::Failure { message, .. } => write!(f, "{}", message),
        }
    }
}

/// Outcome of one capture.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// Another capture was in flight; this one was ignored.
    Busy,
    Added { entry: ScannedEntry, detection: Detection },
    Unresolved { failure: ResolveFailure, detection: Detection },
    /// The capture itself was unusable.
    Discarded(ScanError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdditionMode {
    /// Add the cards as new copies.
    #[default]
    New,
    /// Move existing copies into the target deck.
    Transfer,
}

/// How the caller should file a finished batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FinishSettings {
    pub target_deck_id: Option<String>,
    pub addition_mode: AdditionMode,
    pub default_finish: Finish,
}

/// A batch handed off to the caller.
#[derive(Clone, Debug, Serialize)]
pub struct FinishedBatch {
    pub session_id: String,
    pub finished_at: String,
    pub settings: FinishSettings,
    pub cards: Vec<ScannedEntry>,
}

/// Recognizer and search service for local captures.
struct LocalPipeline {
    recognizer: Mutex<RecognizerGuard>,
    search: Arc<dyn CardSearch>,
}

/// Clears the processing flag however the capture ends.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..9].to_string()
}

pub struct ScanSession {
    id: String,
    commands: Option<SyncSender<SessionCommand>>,
    worker: Option<JoinHandle<Vec<ScannedEntry>>>,
    local: Option<LocalPipeline>,
    processing: AtomicBool,
    last_detection: Arc<Mutex<Option<Detection>>>,
    preview_dir: Option<PathBuf>,
}

impl ScanSession {
    /// Starts a session that scans images locally.
    ///
    /// Acquires the recognizer once; it is released when the session closes
    /// or is dropped.
    pub fn start_local(
        factory: &dyn RecognizerFactory,
        search: Arc<dyn CardSearch>,
        options: SessionOptions,
    ) -> Result<Self> {
        let recognizer = RecognizerGuard::acquire(factory).context("Failed to initialize OCR engine")?;
        let mut session = Self::start(&options);
        session.local = Some(LocalPipeline {
            recognizer: Mutex::new(recognizer),
            search,
        });
        Ok(session)
    }

    /// Starts a session that only receives cards from a paired device.
    /// No recognizer is acquired.
    pub fn start_remote_only(options: SessionOptions) -> Self {
        Self::start(&options)
    }

    fn start(options: &SessionOptions) -> Self {
        let id = new_session_id();
        let (sender, receiver) = create_command_queue(options.channel_capacity);
        let aggregator = ScanAggregator::new(options.capabilities, options.default_finish);
        let debounce = options.remote_debounce;
        let last_detection: Arc<Mutex<Option<Detection>>> = Arc::default();
        let status = last_detection.clone();
        let worker = thread::spawn(move || {
            run_aggregator_worker(receiver, aggregator, debounce, status)
        });

        log(&format!(
            "Session {} started (batch scan: {})",
            id, options.capabilities.batch_scan
        ));

        Self {
            id,
            commands: Some(sender),
            worker: Some(worker),
            local: None,
            processing: AtomicBool::new(false),
            last_detection,
            preview_dir: options.preview_dir.clone(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.id
    }

    #[cfg(test)]
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Inbox for the paired device's messages.
    pub fn remote_inbox(&self) -> Result<RemoteInbox> {
        Ok(RemoteInbox::new(self.id.clone(), self.sender()?.clone()))
    }

    /// Status of the latest local capture or remote arrival.
    pub fn last_detection(&self) -> Option<Detection> {
        self.last_detection.lock().ok().and_then(|d| d.clone())
    }

    fn set_detection(&self, detection: &Detection) {
        if let Ok(mut d) = self.last_detection.lock() {
            *d = Some(detection.clone());
        }
    }

    fn sender(&self) -> Result<&SyncSender<SessionCommand>> {
        self.commands.as_ref().ok_or_else(|| anyhow!("Session closed"))
    }

    fn request<T>(&self, build: impl FnOnce(std::sync::mpsc::Sender<T>) -> SessionCommand) -> Result<T> {
        let (reply, response): (_, Receiver<T>) = channel();
        self.sender()?
            .send(build(reply))
            .map_err(|_| anyhow!("Aggregator worker stopped"))?;
        response
            .recv()
            .map_err(|_| anyhow!("Aggregator worker stopped"))
    }

    /// Loads an image file and captures it.
    pub fn capture_file(&self, path: &Path) -> Result<CaptureOutcome> {
        let img = image::open(path)
            .context(format!("Failed to load {}", path.display()))?
            .to_rgba8();
        self.capture(&img)
    }

    /// Runs one image through the local pipeline and into the batch.
    pub fn capture(&self, img: &RgbaImage) -> Result<CaptureOutcome> {
        let local = self
            .local
            .as_ref()
            .ok_or_else(|| anyhow!("Session {} only accepts remote cards", self.id))?;

        if self.processing.swap(true, Ordering::SeqCst) {
            log("Capture ignored: another image is still processing");
            return Ok(CaptureOutcome::Busy);
        }
        let _processing = ProcessingGuard(&self.processing);

        log(&format!("Processing image {}x{}", img.width(), img.height()));

        let identity = {
            let mut recognizer = local
                .recognizer
                .lock()
                .map_err(|_| anyhow!("Recognizer lock poisoned"))?;
            match read_card(img, &mut recognizer, self.preview_dir.as_deref()) {
                Ok(identity) => identity,
                Err(e) => {
                    log(&format!("Capture discarded: {}", e));
                    self.set_detection(&Detection::Failure {
                        message: e.to_string(),
                        raw: None,
                    });
                    return Ok(CaptureOutcome::Discarded(e));
                }
            }
        };

        let result = ResolutionEngine::new(local.search.as_ref()).resolve(&identity);

        if let ResolutionResult::Unresolved(failure) = &result {
            let detection = Detection::Failure {
                message: failure.to_string(),
                raw: Some(identity.raw_footer_text.clone()),
            };
            log(&format!("Unresolved: {}", detection));
            self.set_detection(&detection);
            return Ok(CaptureOutcome::Unresolved {
                failure: failure.clone(),
                detection,
            });
        }

        let added = self.request(|reply| SessionCommand::Submit {
            submission: Submission::Local {
                result,
                evidence: identity,
            },
            reply: Some(reply),
        })?;
        let entry = added.ok_or_else(|| anyhow!("Resolved card was not added"))?;

        let detection = Detection::Success {
            name: entry.card.name.clone(),
            price: entry.data.price(entry.finish.is_foil()).to_string(),
        };
        self.set_detection(&detection);
        Ok(CaptureOutcome::Added { entry, detection })
    }

    pub fn list(&self) -> Result<Vec<ScannedEntry>> {
        self.request(|reply| SessionCommand::List { reply })
    }

    pub fn remove(&self, id: &str) -> Result<bool> {
        self.request(|reply| SessionCommand::Remove {
            id: id.to_string(),
            reply,
        })
    }

    pub fn update(&self, id: &str, update: EntryUpdate) -> Result<bool> {
        self.request(|reply| SessionCommand::Update {
            id: id.to_string(),
            update,
            reply,
        })
    }

    pub fn switch_variant(&self, id: &str, candidate_id: &str) -> Result<bool> {
        self.request(|reply| SessionCommand::SwitchVariant {
            id: id.to_string(),
            candidate_id: candidate_id.to_string(),
            reply,
        })
    }

    /// Hands the current batch off and keeps the session open for the next one.
    pub fn finalize(&self, settings: FinishSettings) -> Result<FinishedBatch> {
        let cards = self.request(|reply| SessionCommand::TakeAll { reply })?;
        log(&format!("Batch finalized ({} cards)", cards.len()));
        Ok(FinishedBatch {
            session_id: self.id.clone(),
            finished_at: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            settings,
            cards,
        })
    }

    /// Ends the session: stops the worker, releases the recognizer, and
    /// returns whatever was still in the batch.
    ///
    /// Remote inboxes still held elsewhere start failing once this returns.
    pub fn close(mut self) -> Vec<ScannedEntry> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Vec<ScannedEntry> {
        self.local.take();
        if let Some(commands) = self.commands.take() {
            // Already gone if the worker died.
            let _ = commands.send(SessionCommand::Shutdown);
        }
        let remaining = match self.worker.take().map(|w| w.join()) {
            Some(Ok(entries)) => entries,
            Some(Err(_)) => {
                log("Aggregator worker panicked");
                Vec::new()
            }
            None => Vec::new(),
        };
        log(&format!("Session {} closed", self.id));
        remaining
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shutdown();
        }
    }
}
