use num_complex::Complex;
use std::f64::consts::TAU;

use super::Stage;

/// Digital mixer: multiplies the stream by `exp(-j 2 pi f n / fs)`,
/// moving a signal at `+f` down to DC.
#[derive(Debug, Clone)]
pub struct Mixer {
    /// Current rotation factor
    rot: Complex<f64>,
    /// Per-sample rotation multiplier
    mult: Complex<f64>,
}

impl Mixer {
    pub fn new(offset: f64, sample_rate: f64) -> Self {
        let angle = -TAU * offset / sample_rate;
        Self {
            rot: Complex::new(1.0, 0.0),
            mult: Complex::from_polar(1.0, angle),
        }
    }
}

impl Stage for Mixer {
    type In = Complex<f32>;
    type Out = Complex<f32>;

    fn process(&mut self, input: &[Complex<f32>], out: &mut Vec<Complex<f32>>) {
        out.reserve(input.len());
        for &s in input {
            out.push(s * Complex::new(self.rot.re as f32, self.rot.im as f32));
            self.rot *= self.mult;
        }
        // Keep rounding error from growing the magnitude.
        let norm = self.rot.norm();
        if norm > 0.0 {
            self.rot /= norm;
        }
    }
}
