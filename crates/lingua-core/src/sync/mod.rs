//! Offline result synchronization: retry policy, flush pass, activity
//! markers, and the single-writer queue task that owns the local store.

mod flusher;
mod marker;
mod queue;
mod retry;

pub use flusher::{FlushOutcome, FlushReport, Flusher};
pub use marker::{ActivityMarkerWriter, MarkerSummary};
pub use queue::{RequeueTarget, ResultQueue, ResultQueueHandle};
pub use retry::{FailureDecision, RetryPolicy};
