use crate::Hertz;
use std::fmt;

/// FM demodulator variant, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemodMode {
    /// Narrowband receive chain (land-mobile / amateur FM).
    #[default]
    Narrowband,
    /// Wideband discriminator with de-emphasis ahead of the audio filter.
    Wideband,
}

impl fmt::Display for DemodMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemodMode::Narrowband => write!(f, "NBFM"),
            DemodMode::Wideband => write!(f, "WBFM"),
        }
    }
}

/// Snapshot of the running pipeline, sent to the display once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    /// Rate of the recording
    pub input_rate: Hertz,
    /// Rate after the channel filter
    pub quadrature_rate: Hertz,
    /// Rate at the demodulator output, before resampling
    pub demod_audio_rate: Hertz,
    /// Rate handed to the audio sink
    pub output_rate: Hertz,
    /// Channel offset removed by the channel filter
    pub frequency_offset: Hertz,
    /// Center frequency shown on the spectrum axis
    pub center_frequency: Hertz,
    pub demod: DemodMode,
    pub volume: f32,
    /// FFT size (number of bins)
    pub fft_size: usize,
    /// Recording name, used as the spectrum line label
    pub label: String,
}
