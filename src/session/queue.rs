//! Command queue into the session's aggregator worker.
//!
//! Uses a bounded std::sync::mpsc channel with many producers (the capture
//! path, remote inboxes, review actions) and a single consumer. Because only
//! the worker touches the batch, mutations never interleave.

use std::sync::mpsc::{sync_channel, Receiver, Sender, SyncSender};

use super::aggregator::{EntryUpdate, ScannedEntry, Submission};

/// A request for the aggregator worker. Replies travel on one-shot channels.
pub enum SessionCommand {
    Submit {
        submission: Submission,
        reply: Option<Sender<Option<ScannedEntry>>>,
    },
    Remove {
        id: String,
        reply: Sender<bool>,
    },
    Update {
        id: String,
        update: EntryUpdate,
        reply: Sender<bool>,
    },
    SwitchVariant {
        id: String,
        candidate_id: String,
        reply: Sender<bool>,
    },
    List {
        reply: Sender<Vec<ScannedEntry>>,
    },
    /// Drain the batch and start a new one.
    TakeAll {
        reply: Sender<Vec<ScannedEntry>>,
    },
    /// Stop the worker even while remote inboxes still hold senders.
    Shutdown,
}

/// Creates a new command queue.
///
/// Returns a tuple of (sender, receiver). Senders block once `capacity`
/// commands are waiting.
pub fn create_command_queue(capacity: usize) -> (SyncSender<SessionCommand>, Receiver<SessionCommand>) {
    sync_channel(capacity.max(1))
}
