use num_complex::Complex;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::config::IQ_SCALE;

/// Bytes per complex sample: two little-endian i16 values.
const BYTES_PER_SAMPLE: usize = 4;

/// Abstraction for IQ sample sources.
pub trait IqSource {
    /// Read IQ samples into the provided buffer.
    /// Returns the number of samples read; 0 means end of stream.
    fn read_samples(&mut self, buf: &mut [Complex<f32>]) -> io::Result<usize>;
}

/// Recording of interleaved signed 16-bit little-endian I/Q pairs, no header.
///
/// Samples are normalized by `IQ_SCALE`. The file is read once, front to
/// back; a trailing partial sample is reported as `UnexpectedEof`.
#[derive(Debug)]
pub struct FileIqSource<R = BufReader<File>> {
    reader: R,
    bytes: Vec<u8>,
    samples_read: u64,
}

impl FileIqSource {
    /// Open a recording.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> FileIqSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            bytes: Vec::new(),
            samples_read: 0,
        }
    }

    /// Total samples delivered so far.
    pub fn samples_read(&self) -> u64 {
        self.samples_read
    }
}

impl<R: Read> IqSource for FileIqSource<R> {
    fn read_samples(&mut self, buf: &mut [Complex<f32>]) -> io::Result<usize> {
        let bytes_needed = buf.len() * BYTES_PER_SAMPLE;
        self.bytes.resize(bytes_needed, 0);

        let mut total_read = 0;
        while total_read < bytes_needed {
            match self.reader.read(&mut self.bytes[total_read..]) {
                Ok(0) => break,
                Ok(n) => total_read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if total_read % BYTES_PER_SAMPLE != 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "recording ends with a partial sample after {} samples",
                    self.samples_read + (total_read / BYTES_PER_SAMPLE) as u64
                ),
            ));
        }

        let samples = total_read / BYTES_PER_SAMPLE;
        for (out, chunk) in buf
            .iter_mut()
            .zip(self.bytes[..total_read].chunks_exact(BYTES_PER_SAMPLE))
        {
            let i = i16::from_le_bytes([chunk[0], chunk[1]]);
            let q = i16::from_le_bytes([chunk[2], chunk[3]]);
            *out = Complex::new(i as f32 / IQ_SCALE, q as f32 / IQ_SCALE);
        }
        self.samples_read += samples as u64;
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper function to create a temp file with interleaved i16 values
    fn create_iq_file(values: &[i16]) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        for &val in values {
            temp_file.write_all(&val.to_le_bytes()).unwrap();
        }
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_file_iq_source_reads_and_normalizes() {
        let temp_file = create_iq_file(&[
            32767, 0, // 1+0j
            0, 32767, // 0+1j
            -32767, 0, // -1+0j
            16384, -16384,
        ]);

        let mut source = FileIqSource::open(temp_file.path()).unwrap();
        let mut buf = vec![Complex::new(0.0, 0.0); 4];

        let n = source.read_samples(&mut buf).unwrap();

        assert_eq!(n, 4);
        assert_eq!(buf[0], Complex::new(1.0, 0.0));
        assert_eq!(buf[1], Complex::new(0.0, 1.0));
        assert_eq!(buf[2], Complex::new(-1.0, 0.0));
        assert!((buf[3].re - 0.5).abs() < 1e-4);
        assert!((buf[3].im + 0.5).abs() < 1e-4);
        assert_eq!(source.samples_read(), 4);
    }

    #[test]
    fn test_file_iq_source_eof_does_not_wrap() {
        let temp_file = create_iq_file(&[100, 200, 300, 400]);

        let mut source = FileIqSource::open(temp_file.path()).unwrap();
        let mut buf = vec![Complex::new(0.0, 0.0); 2];

        assert_eq!(source.read_samples(&mut buf).unwrap(), 2);
        assert_eq!(source.read_samples(&mut buf).unwrap(), 0);
        assert_eq!(source.read_samples(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_file_iq_source_file_not_found() {
        let result = FileIqSource::open("/nonexistent/path/to/file.iq");
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_file_iq_source_partial_read() {
        // 3 samples available, 5 requested
        let temp_file = create_iq_file(&[1, 0, 2, 0, 3, 0]);

        let mut source = FileIqSource::open(temp_file.path()).unwrap();
        let mut buf = vec![Complex::new(0.0, 0.0); 5];

        let n = source.read_samples(&mut buf).unwrap();

        assert_eq!(n, 3);
        assert_eq!(buf[2], Complex::new(3.0 / IQ_SCALE, 0.0));
        // Remaining buffer elements should be unchanged
        assert_eq!(buf[3], Complex::new(0.0, 0.0));
        assert_eq!(buf[4], Complex::new(0.0, 0.0));
    }

    #[test]
    fn test_trailing_partial_sample_is_an_error() {
        let mut bytes = Vec::new();
        for v in [10i16, 20, 30] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let mut source = FileIqSource::new(io::Cursor::new(bytes));
        let mut buf = vec![Complex::new(0.0, 0.0); 4];
        let err = source.read_samples(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
