//! Pure DSP stages of the player.
//!
//! Every stage follows the same contract: consume one input block, append
//! zero or more output samples. Stages keep whatever history they need
//! between calls, so splitting a stream into blocks differently never
//! changes the output.

mod channel;
mod demod;
mod fir;
mod mixer;
mod resample;
mod spectrum;

pub use channel::ChannelFilter;
pub use demod::FmDemodulator;
pub use resample::Resampler;
pub use spectrum::SpectrumAnalyzer;

use fir::FirDecimator;
use mixer::Mixer;

/// A streaming stage: one input block in, zero or more samples out.
pub trait Stage {
    type In;
    type Out;

    /// Process `input`, appending results to `out`.
    fn process(&mut self, input: &[Self::In], out: &mut Vec<Self::Out>);
}
