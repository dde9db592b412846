use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use rustradio::window::WindowType;
use std::sync::Arc;

use super::Stage;
use crate::config::PipelineConfig;
use fmplayer_messages::{Decibels, Hertz, SpectrumFrame};

/// Windowed-FFT power spectrum with exponential time averaging.
///
/// Input is cut into consecutive, non-overlapping `fft_size` windows. Each
/// window's power spectrum (Blackman-Harris, normalized so a full-scale
/// bin-centered tone reads 0 dB) is folded into a linear-power moving
/// average. A frame is emitted every `update_interval` worth of samples.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// `(sum of window)^2`, the power of a full-scale tone after windowing
    full_scale: f32,
    buffer: Vec<Complex<f32>>,
    average: Vec<f32>,
    alpha: f32,
    averaged: u64,
    publish_every: u64,
    since_publish: u64,
    seq: u64,
    center_frequency: Hertz,
    bandwidth: Hertz,
    label: String,
    min_db: Decibels,
    max_db: Decibels,
}

impl SpectrumAnalyzer {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let n = config.fft_size;
        let rate = config.input_rate;
        let frame_time = n as f64 / rate;
        let alpha = 1.0 - (-frame_time / config.average_interval).exp();
        let publish_every = ((config.update_interval * rate).round() as u64).max(n as u64);

        let window = WindowType::BlackmanHarris.make_window(n).0;
        let sum: f32 = window.iter().sum();

        let mut planner = FftPlanner::<f32>::new();
        Self {
            fft: planner.plan_fft_forward(n),
            window,
            full_scale: sum * sum,
            buffer: Vec::with_capacity(n),
            average: vec![0.0; n],
            alpha: alpha as f32,
            averaged: 0,
            publish_every,
            since_publish: 0,
            seq: 0,
            center_frequency: Hertz(config.center_frequency),
            bandwidth: Hertz(rate),
            label: config.label.clone(),
            min_db: config.min_db,
            max_db: config.max_db,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    /// The current average as a frame, if at least one window has been analyzed.
    pub fn snapshot(&mut self) -> Option<SpectrumFrame> {
        if self.averaged == 0 {
            return None;
        }
        let n = self.average.len();
        let half = n / 2;
        let bins = self.average[half..]
            .iter()
            .chain(self.average[..half].iter())
            .map(|&p| Decibels::from_power(p).clamp(self.min_db, self.max_db).0)
            .collect();
        let frame = SpectrumFrame {
            bins,
            center_frequency: self.center_frequency,
            bandwidth: self.bandwidth,
            label: self.label.clone(),
            min_db: self.min_db,
            max_db: self.max_db,
            seq: self.seq,
        };
        self.seq += 1;
        Some(frame)
    }

    fn analyze(&mut self) {
        for (s, &w) in self.buffer.iter_mut().zip(&self.window) {
            *s *= w;
        }
        self.fft.process(&mut self.buffer);
        for (avg, x) in self.average.iter_mut().zip(&self.buffer) {
            let power = x.norm_sqr() / self.full_scale;
            *avg += self.alpha * (power - *avg);
        }
        self.averaged += 1;
        self.buffer.clear();
    }
}

impl Stage for SpectrumAnalyzer {
    type In = Complex<f32>;
    type Out = SpectrumFrame;

    fn process(&mut self, input: &[Complex<f32>], out: &mut Vec<SpectrumFrame>) {
        let n = self.fft_size();
        let mut rest = input;
        while !rest.is_empty() {
            let take = (n - self.buffer.len()).min(rest.len());
            self.buffer.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            self.since_publish += take as u64;
            if self.buffer.len() == n {
                self.analyze();
            }
            if self.since_publish >= self.publish_every {
                self.since_publish -= self.publish_every;
                out.extend(self.snapshot());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    fn config(rate: f64) -> PipelineConfig {
        let mut config = PipelineConfig::new("capture.iq", rate);
        config.center_frequency = 100e6;
        config
    }

    fn bin_tone(bin: usize, n: usize, len: usize, amplitude: f32) -> Vec<Complex<f32>> {
        (0..len)
            .map(|k| {
                let phase = TAU * ((bin * k) % n) as f64 / n as f64;
                Complex::from_polar(amplitude, phase as f32)
            })
            .collect()
    }

    #[test]
    fn test_one_frame_per_update_interval() {
        let mut analyzer = SpectrumAnalyzer::from_config(&config(250_000.0));
        let mut frames = Vec::new();
        for chunk in vec![Complex::new(0.0, 0.0); 250_000].chunks(3000) {
            analyzer.process(chunk, &mut frames);
        }
        assert_eq!(frames.len(), 10);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.seq, i as u64);
            assert_eq!(frame.bin_count(), 1024);
            assert_eq!(frame.center_frequency, Hertz(100e6));
            assert_eq!(frame.bandwidth, Hertz(250_000.0));
            assert_eq!(frame.label, "capture.iq");
            assert!(frame.bins.iter().all(|&db| db == -140.0));
        }
    }

    #[test]
    fn test_values_stay_in_display_range() {
        let mut analyzer = SpectrumAnalyzer::from_config(&config(102_400.0));
        let mut frames = Vec::new();
        analyzer.process(&bin_tone(100, 1024, 102_400, 1000.0), &mut frames);
        assert!(!frames.is_empty());
        for frame in &frames {
            assert!(frame.bins.iter().all(|&db| (-140.0..=10.0).contains(&db)));
        }
        let last = frames.last().unwrap();
        assert_eq!(last.bins[512 + 100], 10.0);
    }

    #[test]
    fn test_average_converges_monotonically() {
        let mut analyzer = SpectrumAnalyzer::from_config(&config(102_400.0));
        let mut frames = Vec::new();
        for chunk in bin_tone(64, 1024, 102_400, 1.0).chunks(5000) {
            analyzer.process(chunk, &mut frames);
        }
        assert_eq!(frames.len(), 10);
        let peak: Vec<f32> = frames.iter().map(|f| f.bins[512 + 64]).collect();
        assert!(peak.windows(2).all(|w| w[1] >= w[0]), "{peak:?}");
        assert!(peak[4].abs() < 0.1, "{peak:?}");
        assert!(peak[9].abs() < 1e-3, "{peak:?}");
        let dc = frames[9].bins[512];
        assert!(dc < -80.0, "{dc}");
    }

    #[test]
    fn test_snapshot_before_any_window_is_empty() {
        let mut analyzer = SpectrumAnalyzer::from_config(&config(250_000.0));
        assert!(analyzer.snapshot().is_none());
        let mut frames = Vec::new();
        analyzer.process(&[Complex::new(0.0, 0.0); 1024], &mut frames);
        assert!(frames.is_empty());
        assert!(analyzer.snapshot().is_some());
    }
}
