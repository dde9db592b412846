use num_complex::Complex;
use rustradio::block::{Block, BlockRet};
use rustradio::stream::{ReadStream, WriteStream};
use rustradio::{Error, rustradio_macros};

use crate::dsp::{ChannelFilter, FmDemodulator, Resampler, Stage};

/// Drives a [`Stage`] inside a block.
///
/// A stage can emit more than fits in the output buffer (the resampler
/// interpolates), so whatever does not fit waits here and is written before
/// any more input is read.
pub struct StageRunner<S: Stage> {
    stage: S,
    input: Vec<S::In>,
    backlog: Vec<S::Out>,
    sent: usize,
}

impl<S> StageRunner<S>
where
    S: Stage,
    S::In: Copy,
    S::Out: Copy,
{
    pub fn new(stage: S) -> Self {
        Self {
            stage,
            input: Vec::new(),
            backlog: Vec::new(),
            sent: 0,
        }
    }

    pub fn has_backlog(&self) -> bool {
        self.sent < self.backlog.len()
    }

    /// Copy as much backlog as fits into `out`, returning the count.
    pub fn drain_into(&mut self, out: &mut [S::Out]) -> usize {
        let pending = &self.backlog[self.sent..];
        let n = pending.len().min(out.len());
        out[..n].copy_from_slice(&pending[..n]);
        self.sent += n;
        if self.sent == self.backlog.len() {
            self.backlog.clear();
            self.sent = 0;
        }
        n
    }

    /// Run one input block through the stage into the backlog.
    pub fn feed(&mut self, input: impl Iterator<Item = S::In>) {
        self.input.clear();
        self.input.extend(input);
        self.stage.process(&self.input, &mut self.backlog);
    }
}

// Every stage block has the same shape: flush backlog, then pull one
// input block. Only the stream element types differ. A block with backlog
// never reports itself as waiting, so end of input cannot strand it.
macro_rules! stage_block {
    ($(#[$doc:meta])* $name:ident, $stage:ty, $in:ty, $out:ty) => {
        $(#[$doc])*
        #[derive(rustradio_macros::Block)]
        #[rustradio(new)]
        pub struct $name {
            #[rustradio(in)]
            src: ReadStream<$in>,
            runner: StageRunner<$stage>,
            #[rustradio(out)]
            dst: WriteStream<$out>,
        }

        impl Block for $name {
            fn work(&mut self) -> Result<BlockRet<'_>, Error> {
                if self.runner.has_backlog() {
                    let mut o = self.dst.write_buf()?;
                    let n = self.runner.drain_into(o.slice());
                    if n > 0 {
                        o.produce(n, &[]);
                    }
                    if self.runner.has_backlog() {
                        return Ok(BlockRet::Pending);
                    }
                }

                let eof = self.src.eof();
                let (input, _tags) = self.src.read_buf()?;
                if input.is_empty() {
                    if eof {
                        return Ok(BlockRet::EOF);
                    }
                    return Ok(BlockRet::WaitForStream(&self.src, 1));
                }
                let n = input.len();
                self.runner.feed(input.iter().copied());
                input.consume(n);
                Ok(BlockRet::Again)
            }
        }
    };
}

stage_block!(
    /// Optional frequency translation, channel low-pass and RF decimation.
    ChannelFilterBlock,
    ChannelFilter,
    Complex<f32>,
    Complex<f32>
);

stage_block!(
    /// The mode's audio filter and de-emphasis after the discriminator.
    DemodBlock,
    FmDemodulator,
    f32,
    f32
);

stage_block!(
    /// Rational resampler to the audio output rate.
    ResamplerBlock,
    Resampler,
    f32,
    f32
);

#[cfg(test)]
mod tests {
    use super::*;

    /// Emits every input twice, scaled.
    struct Stutter(f32);

    impl Stage for Stutter {
        type In = f32;
        type Out = f32;

        fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
            for &x in input {
                out.extend([x * self.0, x * self.0]);
            }
        }
    }

    #[test]
    fn test_runner_holds_what_does_not_fit() {
        let mut runner = StageRunner::new(Stutter(2.0));
        runner.feed([1.0f32, 2.0].into_iter());
        assert!(runner.has_backlog());

        let mut out = [0.0f32; 3];
        assert_eq!(runner.drain_into(&mut out), 3);
        assert_eq!(out, [2.0, 2.0, 4.0]);
        assert!(runner.has_backlog());

        assert_eq!(runner.drain_into(&mut out), 1);
        assert_eq!(out[0], 4.0);
        assert!(!runner.has_backlog());
    }

    #[test]
    fn test_runner_drains_nothing_into_empty_buffer() {
        let mut runner = StageRunner::new(Stutter(1.0));
        runner.feed([0.5f32].into_iter());
        assert_eq!(runner.drain_into(&mut []), 0);
        assert!(runner.has_backlog());
    }
}
