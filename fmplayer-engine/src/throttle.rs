use num_complex::Complex;
use rustradio::block::{Block, BlockRet};
use rustradio::stream::{ReadStream, WriteStream};
use rustradio::{Error, rustradio_macros};
use std::time::{Duration, Instant};

/// Longest a throttle sleeps in one go. Cancellation is noticed within this.
pub const THROTTLE_QUANTUM: Duration = Duration::from_millis(10);

/// Wall-clock pacing arithmetic.
///
/// The clock starts at the first `allowance` call. At any instant the
/// total released never exceeds `floor(rate * elapsed)`.
#[derive(Debug, Clone)]
pub struct Pacer {
    rate: f64,
    start: Option<Instant>,
    released: u64,
}

impl Pacer {
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            start: None,
            released: 0,
        }
    }

    fn elapsed(&mut self, now: Instant) -> f64 {
        let start = *self.start.get_or_insert(now);
        now.saturating_duration_since(start).as_secs_f64()
    }

    /// How many more samples may be released at `now`.
    pub fn allowance(&mut self, now: Instant) -> u64 {
        let budget = (self.rate * self.elapsed(now)).floor() as u64;
        budget.saturating_sub(self.released)
    }

    /// Record `n` released samples.
    pub fn release(&mut self, n: u64) {
        self.released += n;
    }

    pub fn released(&self) -> u64 {
        self.released
    }

    /// Time until the next sample is due, capped to one quantum.
    pub fn wait_hint(&mut self, now: Instant) -> Duration {
        let due = (self.released + 1) as f64 / self.rate;
        let wait = (due - self.elapsed(now)).max(0.0);
        Duration::from_secs_f64(wait).min(THROTTLE_QUANTUM)
    }
}

/// Releases complex samples no faster than the configured rate.
///
/// Never drops or reorders. Blocks (sleeps) for at most one quantum per
/// call, then yields back to the graph.
#[derive(rustradio_macros::Block)]
#[rustradio(new)]
pub struct Throttle {
    #[rustradio(in)]
    src: ReadStream<Complex<f32>>,
    pacer: Pacer,
    #[rustradio(out)]
    dst: WriteStream<Complex<f32>>,
}

impl Block for Throttle {
    fn work(&mut self) -> Result<BlockRet<'_>, Error> {
        let eof = self.src.eof();
        let (input, _tags) = self.src.read_buf()?;
        if input.is_empty() {
            if eof {
                return Ok(BlockRet::EOF);
            }
            return Ok(BlockRet::WaitForStream(&self.src, 1));
        }

        let now = Instant::now();
        let allowed = self.pacer.allowance(now) as usize;
        if allowed == 0 {
            std::thread::sleep(self.pacer.wait_hint(now));
            return Ok(BlockRet::Again);
        }

        let mut o = self.dst.write_buf()?;
        let n = input.len().min(o.len()).min(allowed);
        if n == 0 {
            return Ok(BlockRet::WaitForStream(&self.dst, 1));
        }
        for (dst, src) in o.slice()[..n].iter_mut().zip(input.iter()) {
            *dst = *src;
        }
        o.produce(n, &[]);
        input.consume(n);
        self.pacer.release(n as u64);
        Ok(BlockRet::Again)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_released_at_start() {
        let mut pacer = Pacer::new(1000.0);
        let t0 = Instant::now();
        assert_eq!(pacer.allowance(t0), 0);
    }

    #[test]
    fn test_allowance_tracks_elapsed_time() {
        let mut pacer = Pacer::new(250_000.0);
        let t0 = Instant::now();
        pacer.allowance(t0);

        let t1 = t0 + Duration::from_millis(10);
        assert_eq!(pacer.allowance(t1), 2_500);
        pacer.release(1_000);
        assert_eq!(pacer.allowance(t1), 1_500);
        pacer.release(1_500);
        assert_eq!(pacer.allowance(t1), 0);

        let t2 = t0 + Duration::from_millis(15);
        assert_eq!(pacer.allowance(t2), 1_250);
    }

    #[test]
    fn test_never_ahead_of_wall_clock() {
        let rate = 48_000.0;
        let mut pacer = Pacer::new(rate);
        let t0 = Instant::now();
        pacer.allowance(t0);
        for ms in 0..200u64 {
            let now = t0 + Duration::from_micros(ms * 1_337);
            // Greedy consumer takes everything it is offered.
            let n = pacer.allowance(now);
            pacer.release(n);
            let elapsed = now.duration_since(t0).as_secs_f64();
            assert!(pacer.released() as f64 <= rate * elapsed);
        }
    }

    #[test]
    fn test_wait_hint_is_capped() {
        let mut pacer = Pacer::new(1.0);
        let t0 = Instant::now();
        pacer.allowance(t0);
        assert_eq!(pacer.wait_hint(t0), THROTTLE_QUANTUM);

        let mut fast = Pacer::new(1_000_000.0);
        fast.allowance(t0);
        assert!(fast.wait_hint(t0) <= Duration::from_micros(1));
    }
}
