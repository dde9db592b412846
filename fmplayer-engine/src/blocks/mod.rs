//! `rustradio` blocks wrapping the pure DSP stages.

mod source;
mod stage;

pub use source::IqFileSource;
pub use stage::{ChannelFilterBlock, DemodBlock, ResamplerBlock, StageRunner};
