pub mod aggregator;
pub mod export;
pub mod queue;
pub mod remote;
pub mod state;
pub mod worker;

pub use aggregator::{
    Capabilities, CardDisplay, EntryUpdate, Finish, ScanAggregator, ScannedEntry, Submission,
};
pub use export::export_batch;
pub use remote::{RemoteCard, RemoteInbox, RemoteMessage};
pub use state::{
    AdditionMode, CaptureOutcome, Detection, FinishSettings, FinishedBatch, ScanSession,
    SessionOptions,
};
