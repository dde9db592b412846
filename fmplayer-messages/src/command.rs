/// Commands sent from the UI (or the binary) to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Stop the engine and cancel the DSP graph.
    Stop,
}
