use flume::{Receiver, Sender, TryRecvError, TrySendError};

use crate::{Decibels, Hertz};

/// One time-averaged power spectrum, ready for display.
///
/// Bins are ordered from the lowest to the highest frequency (DC in the
/// middle) and every value lies within `[min_db, max_db]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    /// Power per bin, dB relative to full scale
    pub bins: Vec<f32>,
    pub center_frequency: Hertz,
    /// Width of the displayed band (the input sample rate)
    pub bandwidth: Hertz,
    pub label: String,
    pub min_db: Decibels,
    pub max_db: Decibels,
    /// Sequence number, starting at 0
    pub seq: u64,
}

impl SpectrumFrame {
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Frequency at the center of `bin`.
    pub fn bin_frequency(&self, bin: usize) -> Hertz {
        let n = self.bins.len().max(1) as f64;
        let offset = (bin as f64 - n / 2.0) * self.bandwidth.0 / n;
        Hertz(self.center_frequency.0 + offset)
    }
}

/// Create a single-slot "latest frame" mailbox.
///
/// Publishing never blocks: a frame the display has not picked up yet is
/// replaced by the newer one.
pub fn frame_mailbox() -> (FramePublisher, FrameReceiver) {
    let (tx, rx) = flume::bounded(1);
    (
        FramePublisher {
            tx,
            stale: rx.clone(),
        },
        FrameReceiver { rx },
    )
}

/// Engine side of the frame mailbox. Not `Clone`: the publisher owns
/// exactly one receiver handle, which `has_display` relies on.
pub struct FramePublisher {
    tx: Sender<SpectrumFrame>,
    // Own handle on the slot, used to evict a frame nobody picked up.
    stale: Receiver<SpectrumFrame>,
}

impl FramePublisher {
    /// Publish `frame`, replacing any unread one.
    ///
    /// Returns `false` once every display-side receiver has been dropped.
    pub fn publish(&self, frame: SpectrumFrame) -> bool {
        if !self.has_display() {
            return false;
        }
        let mut frame = frame;
        loop {
            match self.tx.try_send(frame) {
                Ok(()) => return true,
                Err(TrySendError::Full(f)) => {
                    frame = f;
                    match self.stale.try_recv() {
                        Ok(_) | Err(TryRecvError::Empty) => {}
                        Err(TryRecvError::Disconnected) => return false,
                    }
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }

    /// True while at least one `FrameReceiver` is alive.
    pub fn has_display(&self) -> bool {
        self.tx.receiver_count() > 1
    }
}

/// Display side of the frame mailbox.
#[derive(Clone)]
pub struct FrameReceiver {
    rx: Receiver<SpectrumFrame>,
}

impl FrameReceiver {
    /// Take the pending frame, if any.
    pub fn try_latest(&self) -> Option<SpectrumFrame> {
        self.rx.try_iter().last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(seq: u64) -> SpectrumFrame {
        SpectrumFrame {
            bins: vec![-100.0; 8],
            center_frequency: Hertz(0.0),
            bandwidth: Hertz(8.0),
            label: "test".into(),
            min_db: Decibels(-140.0),
            max_db: Decibels(10.0),
            seq,
        }
    }

    #[test]
    fn test_mailbox_keeps_only_latest() {
        let (publisher, receiver) = frame_mailbox();
        for seq in 0..5 {
            assert!(publisher.publish(frame(seq)));
        }
        let latest = receiver.try_latest().expect("a frame should be waiting");
        assert_eq!(latest.seq, 4);
        assert!(receiver.try_latest().is_none());
    }

    #[test]
    fn test_publish_reports_missing_display() {
        let (publisher, receiver) = frame_mailbox();
        assert!(publisher.has_display());
        drop(receiver);
        assert!(!publisher.has_display());
        assert!(!publisher.publish(frame(0)));
    }

    #[test]
    fn test_bin_frequency_is_centered() {
        let f = frame(0);
        assert_eq!(f.bin_count(), 8);
        assert_eq!(f.bin_frequency(4), Hertz(0.0));
        assert_eq!(f.bin_frequency(0), Hertz(-4.0));
        assert_eq!(f.bin_frequency(7), Hertz(3.0));
    }
}
