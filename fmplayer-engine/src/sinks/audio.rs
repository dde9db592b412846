use log::{debug, warn};
use rustradio::block::{Block, BlockRet};
use rustradio::stream::ReadStream;
use rustradio::{Error, rustradio_macros};

use crate::audio::AudioSink;

/// Hands the final audio stream to an [`AudioSink`].
///
/// Sink failures are logged and the block of audio is dropped; they never
/// stop the graph.
#[derive(rustradio_macros::Block)]
#[rustradio(new)]
pub struct AudioOutSink {
    #[rustradio(in)]
    src: ReadStream<f32>,
    sink: Box<dyn AudioSink>,
    #[rustradio(default)]
    buf: Vec<f32>,
    #[rustradio(default)]
    failures: u64,
    #[rustradio(default)]
    flushed: bool,
}

impl AudioOutSink {
    fn flush_once(&mut self) {
        if self.flushed {
            return;
        }
        self.flushed = true;
        if let Err(e) = self.sink.flush() {
            warn!("Flushing audio output failed: {e:#}");
        }
    }
}

impl Block for AudioOutSink {
    fn work(&mut self) -> Result<BlockRet<'_>, Error> {
        let eof = self.src.eof();
        let n = {
            let (input, _tags) = self.src.read_buf()?;
            let n = input.len();
            self.buf.clear();
            self.buf.extend(input.iter().copied());
            input.consume(n);
            n
        };
        if n == 0 {
            if eof {
                debug!("Audio stream ended, flushing output");
                self.flush_once();
                return Ok(BlockRet::EOF);
            }
            return Ok(BlockRet::Pending);
        }

        if let Err(e) = self.sink.write(&self.buf) {
            self.failures += 1;
            // One line per burst of failures is enough.
            if self.failures.is_power_of_two() {
                warn!(
                    "Audio output failed ({} blocks dropped so far): {e:#}",
                    self.failures
                );
            }
        }
        Ok(BlockRet::Again)
    }
}

impl Drop for AudioOutSink {
    fn drop(&mut self) {
        self.flush_once();
    }
}
