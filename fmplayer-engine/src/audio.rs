//! Audio outputs for the demodulated 48 kHz mono stream.

use anyhow::{Result, anyhow};
use flume::Sender;
use std::io::Write;

/// Destination for mono f32 audio at the output rate.
///
/// `write` may block to apply backpressure. `flush` returns once
/// everything written so far has been handed to the output.
pub trait AudioSink: Send {
    fn write(&mut self, samples: &[f32]) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// Forwards audio blocks over a channel. Used by tests and embedders.
pub struct ChannelSink {
    tx: Sender<Vec<f32>>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Vec<f32>>) -> Self {
        Self { tx }
    }
}

impl AudioSink for ChannelSink {
    fn write(&mut self, samples: &[f32]) -> Result<()> {
        self.tx
            .send(samples.to_vec())
            .map_err(|_| anyhow!("audio receiver went away"))
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes signed 16-bit little-endian PCM, clipping at full scale.
pub struct PcmWriterSink<W: Write + Send> {
    out: W,
    buf: Vec<u8>,
}

impl PcmWriterSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> PcmWriterSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            buf: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn to_s16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

impl<W: Write + Send> AudioSink for PcmWriterSink<W> {
    fn write(&mut self, samples: &[f32]) -> Result<()> {
        self.buf.clear();
        self.buf.reserve(samples.len() * 2);
        for &s in samples {
            self.buf.extend_from_slice(&to_s16(s).to_le_bytes());
        }
        self.out.write_all(&self.buf)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Discards audio, counting what it was given.
#[derive(Debug, Default)]
pub struct NullSink {
    written: u64,
}

impl NullSink {
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl AudioSink for NullSink {
    fn write(&mut self, samples: &[f32]) -> Result<()> {
        self.written += samples.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(feature = "audio")]
pub use device::DeviceSink;

#[cfg(feature = "audio")]
mod device {
    use super::AudioSink;
    use anyhow::{Result, anyhow, bail};
    use log::{debug, info, warn};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    type Queue = Arc<Mutex<VecDeque<f32>>>;

    /// Plays through the default (or a named) output device.
    ///
    /// The cpal stream lives on its own thread. Writers fill a shared
    /// queue that the device callback drains, padding underruns with
    /// silence.
    pub struct DeviceSink {
        queue: Queue,
        max_queued: usize,
        drain_timeout: Duration,
        shutdown: Option<flume::Sender<()>>,
        thread: Option<thread::JoinHandle<()>>,
    }

    impl DeviceSink {
        pub fn open(device_name: Option<String>, sample_rate: u32) -> Result<Self> {
            let queue: Queue = Arc::new(Mutex::new(VecDeque::with_capacity(
                sample_rate as usize,
            )));
            let (ready_tx, ready_rx) = flume::bounded(1);
            let (shutdown_tx, shutdown_rx) = flume::bounded::<()>(1);
            let stream_queue = queue.clone();
            let thread = thread::Builder::new()
                .name("audio-out".into())
                .spawn(move || {
                    let stream = match build_stream(device_name, sample_rate, stream_queue) {
                        Ok(stream) => {
                            let _ = ready_tx.send(Ok(()));
                            stream
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    // Holds the stream open until the sink goes away.
                    let _ = shutdown_rx.recv();
                    drop(stream);
                    debug!("Audio output stream closed");
                })?;
            ready_rx
                .recv()
                .map_err(|_| anyhow!("audio thread exited during setup"))??;
            Ok(Self {
                queue,
                max_queued: sample_rate as usize / 2,
                drain_timeout: Duration::from_secs(2),
                shutdown: Some(shutdown_tx),
                thread: Some(thread),
            })
        }

        fn queued(&self) -> Result<usize> {
            Ok(self
                .queue
                .lock()
                .map_err(|_| anyhow!("audio queue poisoned"))?
                .len())
        }
    }

    fn build_stream(
        device_name: Option<String>,
        sample_rate: u32,
        queue: Queue,
    ) -> Result<cpal::Stream> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();
        let device = if let Some(ref name) = device_name {
            host.output_devices()?
                .find(|d| d.name().map(|n| n == *name).unwrap_or(false))
                .ok_or_else(|| anyhow!("audio output device '{name}' not found"))?
        } else {
            host.default_output_device()
                .ok_or_else(|| anyhow!("no default audio output device"))?
        };
        info!(
            "Audio output: using device '{}'",
            device.name().unwrap_or_else(|_| "unknown".into())
        );

        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if let Ok(mut queue) = queue.lock() {
                    for sample in data.iter_mut() {
                        *sample = queue.pop_front().unwrap_or(0.0);
                    }
                } else {
                    data.fill(0.0);
                }
            },
            |err| warn!("Audio output stream error: {err}"),
            None,
        )?;
        stream.play()?;
        Ok(stream)
    }

    impl AudioSink for DeviceSink {
        fn write(&mut self, samples: &[f32]) -> Result<()> {
            let deadline = Instant::now() + self.drain_timeout;
            while self.queued()? > self.max_queued {
                if Instant::now() > deadline {
                    bail!("audio device stopped consuming samples");
                }
                thread::sleep(Duration::from_millis(5));
            }
            self.queue
                .lock()
                .map_err(|_| anyhow!("audio queue poisoned"))?
                .extend(samples);
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            let deadline = Instant::now() + self.drain_timeout;
            while self.queued()? > 0 {
                if Instant::now() > deadline {
                    warn!("Audio output did not drain in {:?}", self.drain_timeout);
                    break;
                }
                thread::sleep(Duration::from_millis(10));
            }
            Ok(())
        }
    }

    impl Drop for DeviceSink {
        fn drop(&mut self) {
            self.shutdown.take();
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }
}
