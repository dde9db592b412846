use std::f64::consts::PI;

use super::Stage;
use crate::config::ResampleRatio;

/// Interpolation filter half-length, in input samples, when upsampling.
const HALF_TAPS: usize = 16;
/// Cap on the half-length when a large downsampling ratio widens the kernel.
const MAX_HALF_TAPS: usize = 1024;
/// Number of precomputed fractional phases.
const PHASES: usize = 128;
/// Pass-band edge as a fraction of the narrower Nyquist frequency.
const ROLLOFF: f64 = 0.9;

/// Polyphase rational resampler.
///
/// Output `k` sits at input position `k * num / den`. Positions are kept
/// as exact integers in units of `1/den`, so `n` input samples produce
/// exactly `ceil(n * den / num)` outputs with no drift. The kernel is a
/// Blackman-windowed sinc whose cutoff follows the lower of the two
/// Nyquist frequencies; adjacent phases are linearly interpolated.
/// Group delay is `HALF_TAPS` input samples when upsampling.
#[derive(Debug, Clone)]
pub struct Resampler {
    num: u64,
    den: u64,
    ntaps: usize,
    /// `PHASES + 1` rows of `ntaps` taps, each ordered oldest-sample-first
    table: Vec<f32>,
    history: DelayLine,
    /// Position of the next output relative to the newest input, in `1/den` units
    acc: u64,
}

impl Resampler {
    pub fn new(ratio: ResampleRatio) -> Self {
        let r = ratio.as_f64();
        let stretch = r.max(1.0);
        let half = ((HALF_TAPS as f64 * stretch).ceil() as usize).min(MAX_HALF_TAPS);
        let ntaps = 2 * half;
        let fc = 0.5 * ROLLOFF / stretch;

        let mut table = Vec::with_capacity((PHASES + 1) * ntaps);
        for p in 0..=PHASES {
            let frac = p as f64 / PHASES as f64;
            let row: Vec<f64> = (0..ntaps)
                .map(|j| kernel(frac + half as f64 - 1.0 - j as f64, fc, half as f64))
                .collect();
            let sum: f64 = row.iter().sum();
            table.extend(row.iter().map(|&h| (h / sum) as f32));
        }

        Self {
            num: ratio.num,
            den: ratio.den,
            ntaps,
            table,
            history: DelayLine::new(ntaps),
            acc: 0,
        }
    }

    fn interpolate(&self, frac: f64) -> f32 {
        let pos = frac * PHASES as f64;
        let p0 = (pos as usize).min(PHASES - 1);
        let t = (pos - p0 as f64) as f32;
        let window = self.history.window();
        let row = |p: usize| &self.table[p * self.ntaps..(p + 1) * self.ntaps];
        let y0 = dot(window, row(p0));
        let y1 = dot(window, row(p0 + 1));
        y0 + t * (y1 - y0)
    }
}

/// Fixed-length history, readable oldest-to-newest as one contiguous slice.
///
/// Every sample is written twice, `len` apart, so the most recent `len`
/// samples always sit contiguously in `buf[pos..pos + len]`.
#[derive(Debug, Clone)]
struct DelayLine {
    buf: Vec<f32>,
    pos: usize,
    len: usize,
}

impl DelayLine {
    fn new(len: usize) -> Self {
        let len = len.max(1);
        Self {
            buf: vec![0.0; 2 * len],
            pos: 0,
            len,
        }
    }

    fn push(&mut self, sample: f32) {
        self.buf[self.pos] = sample;
        self.buf[self.pos + self.len] = sample;
        self.pos = (self.pos + 1) % self.len;
    }

    fn window(&self) -> &[f32] {
        &self.buf[self.pos..self.pos + self.len]
    }
}

fn dot(window: &[f32], taps: &[f32]) -> f32 {
    window.iter().zip(taps).map(|(x, h)| x * h).sum()
}

/// Windowed sinc with cutoff `fc` (cycles per input sample), support `(-half, half)`.
fn kernel(x: f64, fc: f64, half: f64) -> f64 {
    if x.abs() >= half {
        return 0.0;
    }
    let u = 2.0 * fc * x;
    let sinc = if u == 0.0 { 1.0 } else { (PI * u).sin() / (PI * u) };
    let a = PI * x / half;
    let window = 0.42 + 0.5 * a.cos() + 0.08 * (2.0 * a).cos();
    2.0 * fc * sinc * window
}

impl Stage for Resampler {
    type In = f32;
    type Out = f32;

    fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        for &x in input {
            self.history.push(x);
            while self.acc < self.den {
                let frac = self.acc as f64 / self.den as f64;
                out.push(self.interpolate(frac));
                self.acc += self.num;
            }
            self.acc -= self.den;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    fn sine(freq: f64, fs: f64, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| (TAU * freq * n as f64 / fs).sin() as f32)
            .collect()
    }

    #[test]
    fn test_delay_line_orders_oldest_first() {
        let mut line = DelayLine::new(3);
        assert_eq!(line.window(), &[0.0, 0.0, 0.0]);
        for x in 1..=5 {
            line.push(x as f32);
        }
        assert_eq!(line.window(), &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_one_second_at_6250_gives_48000() {
        let mut resampler = Resampler::new(ResampleRatio::new(6_250.0, 48_000.0));
        let mut out = Vec::new();
        for chunk in vec![0.0f32; 6_250].chunks(1000) {
            resampler.process(chunk, &mut out);
        }
        assert_eq!(out.len(), 48_000);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_output_count_for_odd_rates() {
        for (fs_in, n) in [(2_400.0, 2_400), (62_500.0, 62_500), (11_025.0, 22_050)] {
            let ratio = ResampleRatio::new(fs_in, 48_000.0);
            let mut resampler = Resampler::new(ratio);
            let mut out = Vec::new();
            resampler.process(&vec![0.0; n], &mut out);
            let expected = (n as f64 * 48_000.0 / fs_in).ceil() as usize;
            assert_eq!(out.len(), expected, "{fs_in}");
        }
    }

    #[test]
    fn test_upsampled_tone_matches_reference() {
        let fs_in = 6_250.0;
        let ratio = ResampleRatio::new(fs_in, 48_000.0);
        let mut resampler = Resampler::new(ratio);
        let mut out = Vec::new();
        resampler.process(&sine(1_000.0, fs_in, 6_250), &mut out);

        let step = ratio.as_f64();
        for (k, &y) in out.iter().enumerate().skip(1_000) {
            let t = k as f64 * step - HALF_TAPS as f64;
            let expected = (TAU * 1_000.0 * t / fs_in).sin() as f32;
            assert!((y - expected).abs() < 0.01, "sample {k}: {y} vs {expected}");
        }
    }

    #[test]
    fn test_downsampling_rejects_above_output_nyquist() {
        let ratio = ResampleRatio::new(48_000.0, 8_000.0);
        let mut resampler = Resampler::new(ratio);
        let mut out = Vec::new();
        resampler.process(&sine(10_000.0, 48_000.0, 48_000), &mut out);
        assert_eq!(out.len(), 8_000);
        let rms = (out[200..].iter().map(|v| v * v).sum::<f32>() / (out.len() - 200) as f32).sqrt();
        assert!(rms < 0.01, "{rms}");
    }
}
