//! Aggregator worker thread.
//!
//! Owns the session's `ScanAggregator` and applies commands from the queue
//! one at a time until every sender is gone or the session shuts it down.

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::aggregator::{ScanAggregator, ScannedEntry, Submission};
use super::queue::SessionCommand;
use super::state::Detection;
use crate::log;

/// Drops a remote card that repeats the last accepted card's name too quickly.
/// Paired phones tend to fire the same scan several times in a row.
struct Debounce {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl Debounce {
    fn is_repeat(&self, name: &str, now: Instant) -> bool {
        match &self.last {
            Some((last_name, at)) => last_name == name && now.duration_since(*at) < self.window,
            None => false,
        }
    }

    fn record(&mut self, name: &str, now: Instant) {
        self.last = Some((name.to_string(), now));
    }
}

fn apply_submission(
    aggregator: &mut ScanAggregator,
    debounce: &mut Debounce,
    status: &Mutex<Option<Detection>>,
    submission: Submission,
) -> Option<ScannedEntry> {
    let now = Instant::now();
    let remote = matches!(submission, Submission::Remote(_));
    if let Submission::Remote(card) = &submission {
        let name = card.display().name;
        if debounce.is_repeat(&name, now) {
            log(&format!("Debounced duplicate remote scan: {}", name));
            return None;
        }
    }

    let entry = aggregator.submit(submission)?;
    debounce.record(&entry.card.name, now);
    // Local captures report their own status.
    if remote {
        if let Ok(mut last) = status.lock() {
            *last = Some(Detection::Success {
                name: entry.card.name.clone(),
                price: entry.data.price(entry.finish.is_foil()).to_string(),
            });
        }
    }
    Some(entry)
}

/// Runs the aggregator loop.
///
/// Blocks until the channel closes or a `Shutdown` arrives, then returns
/// whatever is left in the batch. Remote arrivals are written to `status`.
/// Run it in a dedicated thread.
pub fn run_aggregator_worker(
    receiver: Receiver<SessionCommand>,
    mut aggregator: ScanAggregator,
    remote_debounce: Duration,
    status: Arc<Mutex<Option<Detection>>>,
) -> Vec<ScannedEntry> {
    log("Aggregator worker started");
    let mut debounce = Debounce {
        window: remote_debounce,
        last: None,
    };

    // A caller that stopped waiting for its reply is not an error.
    while let Ok(command) = receiver.recv() {
        match command {
            SessionCommand::Submit { submission, reply } => {
                let entry = apply_submission(&mut aggregator, &mut debounce, &status, submission);
                if let Some(reply) = reply {
                    let _ = reply.send(entry);
                }
            }
            SessionCommand::Remove { id, reply } => {
                let _ = reply.send(aggregator.remove(&id));
            }
            SessionCommand::Update { id, update, reply } => {
                let _ = reply.send(aggregator.update(&id, &update));
            }
            SessionCommand::SwitchVariant {
                id,
                candidate_id,
                reply,
            } => {
                let _ = reply.send(aggregator.switch_variant(&id, &candidate_id));
            }
            SessionCommand::List { reply } => {
                let _ = reply.send(aggregator.list().to_vec());
            }
            SessionCommand::TakeAll { reply } => {
                let _ = reply.send(aggregator.take_all());
            }
            SessionCommand::Shutdown => {
                log("Aggregator worker: shutdown requested, exiting");
                return aggregator.take_all();
            }
        }
    }

    log("Aggregator worker: channel closed, exiting");
    aggregator.take_all()
}
