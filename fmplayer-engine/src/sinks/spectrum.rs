use fmplayer_messages::{FramePublisher, SpectrumFrame};
use log::{debug, info};
use num_complex::Complex;
use rustradio::block::{Block, BlockRet};
use rustradio::stream::ReadStream;
use rustradio::{Error, rustradio_macros};

use crate::dsp::{SpectrumAnalyzer, Stage};

/// Feeds the analyzer and publishes its frames to the display mailbox.
///
/// Never blocks the pipeline: a frame the display has not picked up yet
/// is replaced by the newer one.
#[derive(rustradio_macros::Block)]
#[rustradio(new)]
pub struct SpectrumSink {
    #[rustradio(in)]
    src: ReadStream<Complex<f32>>,
    analyzer: SpectrumAnalyzer,
    publisher: FramePublisher,
    #[rustradio(default)]
    frames: Vec<SpectrumFrame>,
    #[rustradio(default)]
    input: Vec<Complex<f32>>,
    #[rustradio(default)]
    display_gone: bool,
}

impl SpectrumSink {
    fn publish(&mut self, frame: SpectrumFrame) {
        if self.display_gone {
            return;
        }
        if !self.publisher.has_display() {
            info!("No display attached, no longer publishing spectrum frames");
            self.display_gone = true;
            return;
        }
        self.publisher.publish(frame);
    }
}

impl Block for SpectrumSink {
    fn work(&mut self) -> Result<BlockRet<'_>, Error> {
        let eof = self.src.eof();
        let n = {
            let (input, _tags) = self.src.read_buf()?;
            let n = input.len();
            self.input.clear();
            self.input.extend(input.iter().copied());
            input.consume(n);
            n
        };
        if n == 0 {
            if eof {
                // Leave the display showing the state at end of stream.
                if let Some(frame) = self.analyzer.snapshot() {
                    debug!("Publishing final spectrum frame {}", frame.seq);
                    self.publish(frame);
                }
                return Ok(BlockRet::EOF);
            }
            return Ok(BlockRet::Pending);
        }

        let mut frames = std::mem::take(&mut self.frames);
        self.analyzer.process(&self.input, &mut frames);
        for frame in frames.drain(..) {
            self.publish(frame);
        }
        self.frames = frames;
        Ok(BlockRet::Again)
    }
}
