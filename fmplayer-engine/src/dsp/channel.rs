use log::debug;
use num_complex::Complex;

use super::{FirDecimator, Mixer, Stage};
use crate::config::PipelineConfig;

/// Channel isolation: optional frequency translation, then a decimating
/// low-pass filter.
///
/// With a zero offset the mixer is skipped entirely. The taps are designed
/// once and shared by both modes; translation happens before filtering, so
/// the filter always works on a baseband channel.
pub struct ChannelFilter {
    mixer: Option<Mixer>,
    fir: FirDecimator<Complex<f32>>,
    mixed: Vec<Complex<f32>>,
}

impl ChannelFilter {
    pub fn new(taps: &[f32], decimation: usize, offset: f64, sample_rate: f64) -> Self {
        let mixer = (offset != 0.0).then(|| Mixer::new(offset, sample_rate));
        let taps: Vec<Complex<f32>> = taps.iter().map(|&t| Complex::new(t, 0.0)).collect();
        Self {
            mixer,
            fir: FirDecimator::new(&taps, decimation),
            mixed: Vec::new(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        let design = config.channel_design();
        let taps = design.taps(config.input_rate);
        debug!(
            "channel filter: {} taps, cutoff {} Hz, decimation {}, offset {} Hz",
            taps.len(),
            design.cutoff,
            config.rf_decimation,
            config.frequency_offset
        );
        Self::new(
            &taps,
            config.rf_decimation,
            config.frequency_offset,
            config.input_rate,
        )
    }

    pub fn is_translating(&self) -> bool {
        self.mixer.is_some()
    }
}

impl Stage for ChannelFilter {
    type In = Complex<f32>;
    type Out = Complex<f32>;

    fn process(&mut self, input: &[Complex<f32>], out: &mut Vec<Complex<f32>>) {
        match &mut self.mixer {
            Some(mixer) => {
                self.mixed.clear();
                mixer.process(input, &mut self.mixed);
                self.fir.process(&self.mixed, out);
            }
            None => self.fir.process(input, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    fn tone(freq: f64, fs: f64, len: usize) -> Vec<Complex<f32>> {
        (0..len)
            .map(|n| {
                let phase = (TAU * freq * n as f64 / fs).rem_euclid(TAU);
                Complex::from_polar(0.5, phase as f32)
            })
            .collect()
    }

    fn mean_power(samples: &[Complex<f32>]) -> f32 {
        samples.iter().map(|s| s.norm_sqr()).sum::<f32>() / samples.len() as f32
    }

    #[test]
    fn test_zero_offset_skips_mixer() {
        let config = PipelineConfig::new("x.iq", 250_000.0);
        assert!(!ChannelFilter::from_config(&config).is_translating());
    }

    #[test]
    fn test_out_of_band_tone_is_rejected() {
        let config = PipelineConfig::new("x.iq", 250_000.0);
        let mut filter = ChannelFilter::from_config(&config);
        let mut out = Vec::new();
        filter.process(&tone(60_000.0, 250_000.0, 20_000), &mut out);
        assert_eq!(out.len(), 2_000);
        // Skip the start-up transient, then expect > 40 dB rejection.
        assert!(mean_power(&out[100..]) < 0.25e-4);
    }

    #[test]
    fn test_offset_tone_lands_at_dc() {
        let mut config = PipelineConfig::new("x.iq", 250_000.0);
        config.frequency_offset = 60_000.0;
        let mut filter = ChannelFilter::from_config(&config);
        assert!(filter.is_translating());

        let mut out = Vec::new();
        for chunk in tone(60_000.0, 250_000.0, 20_000).chunks(4096) {
            filter.process(chunk, &mut out);
        }
        let settled = &out[100..];
        for pair in settled.windows(2) {
            let step = (pair[1] * pair[0].conj()).arg();
            assert!(step.abs() < 1e-3, "residual rotation {step}");
        }
        assert!((mean_power(settled) - 0.25).abs() < 0.01);
    }
}
