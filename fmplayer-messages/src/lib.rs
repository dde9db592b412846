mod command;
mod event;
mod frame;
mod state;
mod units;

pub use command::Command;
pub use event::Event;
pub use frame::{FramePublisher, FrameReceiver, SpectrumFrame, frame_mailbox};
pub use state::{DemodMode, PipelineState};
pub use units::{Decibels, Hertz};
