use std::path::PathBuf;

use fmplayer_messages::{Decibels, DemodMode, Hertz, PipelineState};
use rustradio::fir;
use rustradio::window::WindowType;
use std::f64::consts::TAU;
use thiserror::Error;

/// Fixed rate of the audio sink.
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// Full-scale value of a recorded 16-bit I or Q sample.
pub const IQ_SCALE: f32 = 32767.0;

/// Parameters of a low-pass FIR design.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPassDesign {
    /// Pass-band edge, Hz
    pub cutoff: f64,
    /// Transition width, Hz
    pub transition: f64,
}

impl LowPassDesign {
    /// Hamming-windowed taps at `sample_rate`, unity gain at DC.
    ///
    /// The tap count follows from the window's attenuation and the
    /// transition width, always odd.
    pub fn taps(&self, sample_rate: f64) -> Vec<f32> {
        fir::low_pass(
            sample_rate as f32,
            self.cutoff as f32,
            self.transition as f32,
            &WindowType::Hamming,
        )
    }
}

/// Invalid pipeline parameters, detected before any stage is built.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("input sample rate must be a positive number, got {0}")]
    SampleRate(f64),
    #[error("{name} decimation must be at least 1")]
    Decimation { name: &'static str },
    #[error("volume must be a non-negative number, got {0}")]
    Volume(f32),
    #[error("deviation must be a positive number, got {0} Hz")]
    Deviation(f64),
    #[error("frequency offset {offset} Hz is outside the input band (+/- {nyquist} Hz)")]
    Offset { offset: f64, nyquist: f64 },
    #[error("FFT size must be at least 16, got {0}")]
    FftSize(usize),
    #[error("{name} interval must be a positive number of seconds, got {value}")]
    Interval { name: &'static str, value: f64 },
    #[error("audio output rate must be non-zero")]
    AudioRate,
    #[error("{0} is too low for the configured decimation")]
    RateTooLow(&'static str),
}

/// Immutable configuration of one run. No stage mutates it after construction.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_path: PathBuf,
    /// Sample rate of the recording, Hz
    pub input_rate: f64,
    /// Channel offset from the recording's center, Hz
    pub frequency_offset: f64,
    pub demod: DemodMode,
    /// Linear output gain
    pub volume: f32,
    /// Center frequency shown on the spectrum display, Hz
    pub center_frequency: f64,
    pub rf_decimation: usize,
    pub audio_decimation: usize,
    /// Peak FM deviation, Hz
    pub deviation: f64,
    pub audio_rate: u32,
    /// De-emphasis time constant, seconds
    pub tau: f64,
    pub channel: LowPassDesign,
    /// Wideband audio filter; the transition is `stop - pass`
    pub wideband_audio: LowPassDesign,
    pub fft_size: usize,
    /// Spectrum averaging time constant, seconds
    pub average_interval: f64,
    /// Spectrum publication period, seconds
    pub update_interval: f64,
    pub min_db: Decibels,
    pub max_db: Decibels,
    /// Pace samples to wall-clock time
    pub throttle: bool,
    pub label: String,
}

impl PipelineConfig {
    /// Configuration with the player's defaults for everything but the
    /// two required parameters.
    pub fn new(input_path: impl Into<PathBuf>, input_rate: f64) -> Self {
        let input_path = input_path.into();
        let label = input_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            input_path,
            input_rate,
            frequency_offset: 0.0,
            demod: DemodMode::Narrowband,
            volume: 0.3,
            center_frequency: 0.0,
            rf_decimation: 10,
            audio_decimation: 4,
            deviation: 5e3,
            audio_rate: AUDIO_SAMPLE_RATE,
            tau: 75e-6,
            channel: LowPassDesign {
                cutoff: 15e3,
                transition: 1.5e3,
            },
            wideband_audio: LowPassDesign {
                cutoff: 15e3,
                transition: 1e3,
            },
            fft_size: 1024,
            average_interval: 0.1,
            update_interval: 0.1,
            min_db: Decibels(-140.0),
            max_db: Decibels(10.0),
            throttle: true,
            label,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.input_rate.is_finite() && self.input_rate > 0.0) {
            return Err(ConfigError::SampleRate(self.input_rate));
        }
        if self.rf_decimation == 0 {
            return Err(ConfigError::Decimation { name: "RF" });
        }
        if self.audio_decimation == 0 {
            return Err(ConfigError::Decimation { name: "audio" });
        }
        if !(self.volume.is_finite() && self.volume >= 0.0) {
            return Err(ConfigError::Volume(self.volume));
        }
        if !(self.deviation.is_finite() && self.deviation > 0.0) {
            return Err(ConfigError::Deviation(self.deviation));
        }
        let nyquist = self.input_rate / 2.0;
        if !self.frequency_offset.is_finite() || self.frequency_offset.abs() >= nyquist {
            return Err(ConfigError::Offset {
                offset: self.frequency_offset,
                nyquist,
            });
        }
        if self.fft_size < 16 {
            return Err(ConfigError::FftSize(self.fft_size));
        }
        for (name, value) in [
            ("averaging", self.average_interval),
            ("update", self.update_interval),
            ("de-emphasis", self.tau),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Interval { name, value });
            }
        }
        if self.audio_rate == 0 {
            return Err(ConfigError::AudioRate);
        }
        // A ratio in milli-Hz has to stay representable.
        if self.demod_audio_rate() < 1e-3 {
            return Err(ConfigError::RateTooLow("input sample rate"));
        }
        Ok(())
    }

    /// Rate after the channel filter.
    pub fn quadrature_rate(&self) -> f64 {
        self.input_rate / self.rf_decimation as f64
    }

    /// Rate at the demodulator output.
    pub fn demod_audio_rate(&self) -> f64 {
        self.quadrature_rate() / self.audio_decimation as f64
    }

    /// Quadrature demodulator gain mapping `+/- deviation` to `+/- 1.0`.
    pub fn quadrature_gain(&self) -> f32 {
        (self.quadrature_rate() / (TAU * self.deviation)) as f32
    }

    /// Input-over-output ratio of the audio resampler.
    pub fn resample_ratio(&self) -> ResampleRatio {
        ResampleRatio::new(self.demod_audio_rate(), self.audio_rate as f64)
    }

    /// Channel filter design, with the pass edge pulled below the
    /// post-decimation Nyquist frequency when the default would alias.
    pub fn channel_design(&self) -> LowPassDesign {
        let transition = self.channel.transition;
        let limit = self.quadrature_rate() / 2.0 - transition;
        let cutoff = if limit > 0.0 {
            self.channel.cutoff.min(limit)
        } else {
            self.quadrature_rate() * 0.4
        };
        LowPassDesign { cutoff, transition }
    }

    /// Wideband audio filter design, applied at the quadrature rate.
    pub fn wideband_audio_design(&self) -> LowPassDesign {
        let transition = self.wideband_audio.transition;
        let audio_rate = self.demod_audio_rate();
        let limit = audio_rate / 2.0 - transition;
        let cutoff = if limit > 0.0 {
            self.wideband_audio.cutoff.min(limit)
        } else {
            audio_rate * 0.4
        };
        LowPassDesign { cutoff, transition }
    }

    /// Narrowband audio filter design: transition of 1/32 of the audio
    /// rate, pass edge one transition below Nyquist.
    pub fn narrowband_audio_design(&self) -> LowPassDesign {
        let audio_rate = self.demod_audio_rate();
        let transition = audio_rate / 32.0;
        LowPassDesign {
            cutoff: audio_rate / 2.0 - transition,
            transition,
        }
    }

    /// Snapshot for the display.
    pub fn state(&self) -> PipelineState {
        PipelineState {
            input_rate: Hertz(self.input_rate),
            quadrature_rate: Hertz(self.quadrature_rate()),
            demod_audio_rate: Hertz(self.demod_audio_rate()),
            output_rate: Hertz(self.audio_rate as f64),
            frequency_offset: Hertz(self.frequency_offset),
            center_frequency: Hertz(self.center_frequency),
            demod: self.demod,
            volume: self.volume,
            fft_size: self.fft_size,
            label: self.label.clone(),
        }
    }
}

/// Exact rational resampling ratio, `num / den` input samples per output sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleRatio {
    pub num: u64,
    pub den: u64,
}

impl ResampleRatio {
    /// Build from two rates, rounded to milli-Hz and reduced.
    pub fn new(input_rate: f64, output_rate: f64) -> Self {
        let num = ((input_rate * 1000.0).round() as u64).max(1);
        let den = ((output_rate * 1000.0).round() as u64).max(1);
        let g = gcd(num, den);
        Self {
            num: num / g,
            den: den / g,
        }
    }

    pub fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
