use flume::Sender;
use log::{error, info};
use num_complex::Complex;
use rustradio::block::{Block, BlockRet};
use rustradio::stream::WriteStream;
use rustradio::{Error, rustradio_macros};
use std::path::PathBuf;

use crate::source::{FileIqSource, IqSource};

/// Graph source reading a recording once, front to back.
///
/// A read failure ends the stream like end of file does, so everything
/// before it still plays out. The error itself goes to `failure` for the
/// engine to report once the graph is done.
#[derive(rustradio_macros::Block)]
#[rustradio(new)]
pub struct IqFileSource {
    reader: FileIqSource,
    path: PathBuf,
    failure: Sender<Error>,
    #[rustradio(out)]
    dst: WriteStream<Complex<f32>>,
}

impl Block for IqFileSource {
    fn work(&mut self) -> Result<BlockRet<'_>, Error> {
        let mut o = self.dst.write_buf()?;
        if o.is_empty() {
            return Ok(BlockRet::WaitForStream(&self.dst, 1));
        }
        let n = match self.reader.read_samples(o.slice()) {
            Ok(n) => n,
            Err(e) => {
                error!(
                    "Reading {} failed after {} samples: {e}",
                    self.path.display(),
                    self.reader.samples_read()
                );
                let _ = self.failure.send(Error::file_io(e, &self.path));
                return Ok(BlockRet::EOF);
            }
        };
        if n == 0 {
            info!(
                "End of recording after {} samples",
                self.reader.samples_read()
            );
            return Ok(BlockRet::EOF);
        }
        o.produce(n, &[]);
        Ok(BlockRet::Again)
    }
}
