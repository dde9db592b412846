//! Post-detection half of the FM receivers: audio filtering and
//! de-emphasis of the instantaneous frequency coming out of
//! `rustradio::blocks::QuadratureDemod`.

use log::debug;

use super::{FirDecimator, Stage};
use crate::config::PipelineConfig;
use fmplayer_messages::DemodMode;

/// Single-pole de-emphasis, bilinear transform of `1 / (1 + s tau)` with
/// the corner frequency prewarped. Unity gain at DC.
#[derive(Debug, Clone)]
pub struct Deemphasis {
    b0: f32,
    a1: f32,
    x1: f32,
    y1: f32,
}

impl Deemphasis {
    pub fn new(sample_rate: f64, tau: f64) -> Self {
        let w_c = 1.0 / tau;
        let w_ca = 2.0 * sample_rate * (w_c / (2.0 * sample_rate)).tan();
        let k = -w_ca / (2.0 * sample_rate);
        let pole = (1.0 + k) / (1.0 - k);
        let b0 = -k / (1.0 - k);
        Self {
            b0: b0 as f32,
            a1: pole as f32,
            x1: 0.0,
            y1: 0.0,
        }
    }
}

impl Stage for Deemphasis {
    type In = f32;
    type Out = f32;

    fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        out.reserve(input.len());
        for &x in input {
            let y = self.b0 * (x + self.x1) + self.a1 * self.y1;
            self.x1 = x;
            self.y1 = y;
            out.push(y);
        }
    }
}

/// Wideband chain: de-emphasis at the quadrature rate, then the audio
/// low-pass decimating to the audio rate.
pub struct WidebandFm {
    deemphasis: Deemphasis,
    audio: FirDecimator<f32>,
    deemph: Vec<f32>,
}

/// Narrowband chain: audio low-pass decimating to the audio rate, then
/// de-emphasis at the audio rate.
pub struct NarrowbandFm {
    audio: FirDecimator<f32>,
    deemphasis: Deemphasis,
    filtered: Vec<f32>,
}

/// The two interchangeable demodulators, fed with discriminator output
/// scaled by [`PipelineConfig::quadrature_gain`]. Picked once at
/// construction.
pub enum FmDemodulator {
    Wideband(WidebandFm),
    Narrowband(NarrowbandFm),
}

impl FmDemodulator {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let quad_rate = config.quadrature_rate();
        match config.demod {
            DemodMode::Wideband => {
                let design = config.wideband_audio_design();
                let taps = design.taps(quad_rate);
                debug!(
                    "wideband FM: deviation {} Hz, audio filter {} taps, cutoff {} Hz",
                    config.deviation,
                    taps.len(),
                    design.cutoff
                );
                FmDemodulator::Wideband(WidebandFm {
                    deemphasis: Deemphasis::new(quad_rate, config.tau),
                    audio: FirDecimator::new(&taps, config.audio_decimation),
                    deemph: Vec::new(),
                })
            }
            DemodMode::Narrowband => {
                let design = config.narrowband_audio_design();
                let taps = design.taps(quad_rate);
                debug!(
                    "narrowband FM: deviation {} Hz, audio filter {} taps, cutoff {} Hz",
                    config.deviation,
                    taps.len(),
                    design.cutoff
                );
                FmDemodulator::Narrowband(NarrowbandFm {
                    audio: FirDecimator::new(&taps, config.audio_decimation),
                    deemphasis: Deemphasis::new(config.demod_audio_rate(), config.tau),
                    filtered: Vec::new(),
                })
            }
        }
    }

    pub fn mode(&self) -> DemodMode {
        match self {
            FmDemodulator::Wideband(_) => DemodMode::Wideband,
            FmDemodulator::Narrowband(_) => DemodMode::Narrowband,
        }
    }
}

impl Stage for FmDemodulator {
    type In = f32;
    type Out = f32;

    fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        match self {
            FmDemodulator::Wideband(fm) => {
                fm.deemph.clear();
                fm.deemphasis.process(input, &mut fm.deemph);
                fm.audio.process(&fm.deemph, out);
            }
            FmDemodulator::Narrowband(fm) => {
                fm.filtered.clear();
                fm.audio.process(input, &mut fm.filtered);
                fm.deemphasis.process(&fm.filtered, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex;
    use std::f64::consts::{PI, TAU};

    fn deemphasis_gain(filter: &Deemphasis, freq: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq / sample_rate;
        let z1 = Complex::from_polar(1.0, -w);
        let num = (Complex::new(1.0, 0.0) + z1) * filter.b0 as f64;
        let den = Complex::new(1.0, 0.0) - z1 * filter.a1 as f64;
        (num / den).norm()
    }

    #[test]
    fn test_deemphasis_response() {
        let fs = 48_000.0;
        let filter = Deemphasis::new(fs, 75e-6);
        assert!((deemphasis_gain(&filter, 0.0, fs) - 1.0).abs() < 1e-6);
        let corner = 1.0 / (TAU * 75e-6);
        let at_corner = deemphasis_gain(&filter, corner, fs);
        assert!((at_corner - 0.5f64.sqrt()).abs() < 0.01, "{at_corner}");
        assert!(deemphasis_gain(&filter, 15_000.0, fs) < 0.2);
    }

    #[test]
    fn test_deemphasis_settles_to_dc() {
        let mut filter = Deemphasis::new(25_000.0, 75e-6);
        let mut out = Vec::new();
        filter.process(&[1.0; 200], &mut out);
        assert!((out[199] - 1.0).abs() < 1e-4);
        assert!(out.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_mode_dispatch() {
        let mut config = PipelineConfig::new("x.iq", 250_000.0);
        assert_eq!(FmDemodulator::from_config(&config).mode(), DemodMode::Narrowband);
        config.demod = DemodMode::Wideband;
        assert_eq!(FmDemodulator::from_config(&config).mode(), DemodMode::Wideband);
    }

    #[test]
    fn test_both_chains_decimate_to_audio_rate() {
        let mut config = PipelineConfig::new("x.iq", 250_000.0);
        for mode in [DemodMode::Narrowband, DemodMode::Wideband] {
            config.demod = mode;
            let mut demod = FmDemodulator::from_config(&config);
            let mut out = Vec::new();
            demod.process(&vec![0.0; 25_000], &mut out);
            assert_eq!(out.len(), 6_250, "{mode}");
            assert!(out.iter().all(|v| v.abs() < 1e-3), "{mode}");
        }
    }

    #[test]
    fn test_both_chains_pass_a_steady_deviation() {
        // A constant frequency error comes out as a DC level.
        let mut config = PipelineConfig::new("x.iq", 250_000.0);
        for mode in [DemodMode::Narrowband, DemodMode::Wideband] {
            config.demod = mode;
            let mut demod = FmDemodulator::from_config(&config);
            let mut out = Vec::new();
            demod.process(&vec![0.5; 25_000], &mut out);
            let settled = &out[3_000..];
            assert!(settled.iter().all(|v| (v - 0.5).abs() < 1e-3), "{mode}");
        }
    }
}
