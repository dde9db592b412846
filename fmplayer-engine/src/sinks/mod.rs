mod audio;
mod spectrum;

pub use audio::AudioOutSink;
pub use spectrum::SpectrumSink;
