use crate::PipelineState;

/// Lifecycle events sent from the engine to the UI.
///
/// Spectrum frames do not travel on this channel; they go through the
/// single-slot mailbox so a slow display never queues up stale frames.
#[derive(Debug, Clone)]
pub enum Event {
    /// Sent once the graph has been built, before any samples flow.
    StateSnapshot(PipelineState),
    /// The pipeline has stopped. `error` is set when it stopped because of a failure.
    Finished { error: Option<String> },
}
