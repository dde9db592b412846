use rustradio::Sample;
use rustradio::fir::Fir;
use std::ops::{Add, Mul};

use super::Stage;

/// Streaming, decimating wrapper around [`rustradio::fir::Fir`].
///
/// The filter starts from an all-zero history. Every `decimation`-th
/// input sample, starting with the first, yields one output, so `n`
/// inputs give `ceil(n / decimation)` outputs over the life of the filter
/// however the input is split into blocks.
pub struct FirDecimator<T> {
    fir: Fir<T>,
    ntaps: usize,
    decimation: usize,
    /// Last `ntaps - 1` inputs followed by the current block.
    buf: Vec<T>,
    /// Start in `buf` of the next window to compute.
    next: usize,
}

impl<T> FirDecimator<T>
where
    T: Sample + Mul<T, Output = T> + Add<T, Output = T>,
{
    pub fn new(taps: &[T], decimation: usize) -> Self {
        let ntaps = taps.len().max(1);
        Self {
            fir: Fir::new(taps),
            ntaps,
            decimation: decimation.max(1),
            buf: vec![T::default(); ntaps - 1],
            next: 0,
        }
    }
}

impl<T> Stage for FirDecimator<T>
where
    T: Sample + Mul<T, Output = T> + Add<T, Output = T>,
{
    type In = T;
    type Out = T;

    fn process(&mut self, input: &[T], out: &mut Vec<T>) {
        self.buf.extend_from_slice(input);
        let mut start = self.next;
        while start + self.ntaps <= self.buf.len() {
            out.push(self.fir.filter(&self.buf[start..start + self.ntaps]));
            start += self.decimation;
        }
        let spent = self.buf.len() + 1 - self.ntaps;
        self.buf.drain(..spent);
        self.next = start - spent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex;

    #[test]
    fn test_impulse_response_is_taps() {
        let taps = [0.1, 0.2, 0.3, 0.4];
        let mut fir = FirDecimator::<f32>::new(&taps, 1);
        let mut out = Vec::new();
        fir.process(&[1.0, 0.0, 0.0, 0.0, 0.0], &mut out);
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.4, 0.0]);
    }

    #[test]
    fn test_decimation_keeps_every_nth() {
        let taps = [1.0];
        let mut fir = FirDecimator::<f32>::new(&taps, 3);
        let mut out = Vec::new();
        fir.process(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &mut out);
        assert_eq!(out, vec![0.0, 3.0, 6.0]);
    }

    #[test]
    fn test_block_boundaries_do_not_matter() {
        let taps = [
            Complex::new(0.25, 0.0),
            Complex::new(0.5, 0.0),
            Complex::new(0.25, 0.0),
        ];
        let input: Vec<Complex<f32>> = (0..50)
            .map(|n| Complex::new(n as f32, -(n as f32) * 0.5))
            .collect();

        let mut whole = FirDecimator::new(&taps, 4);
        let mut expected = Vec::new();
        whole.process(&input, &mut expected);

        let mut split = FirDecimator::new(&taps, 4);
        let mut got = Vec::new();
        for chunk in input.chunks(7) {
            split.process(chunk, &mut got);
        }
        assert_eq!(got, expected);
        assert_eq!(got.len(), 13);
    }

    #[test]
    fn test_empty_blocks_are_harmless() {
        let mut fir = FirDecimator::<f32>::new(&[0.5, 0.5], 2);
        let mut out = Vec::new();
        fir.process(&[], &mut out);
        fir.process(&[2.0], &mut out);
        fir.process(&[], &mut out);
        fir.process(&[4.0, 6.0], &mut out);
        assert_eq!(out, vec![1.0, 5.0]);
    }
}
