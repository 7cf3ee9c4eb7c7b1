use rand::Rng;
use tokio::time::Duration;

/// Capped exponential backoff. Each delay doubles the previous nominal value
/// up to `cap`, jittered to 50-150% so stalled clients do not retry in
/// lockstep.
pub struct Backoff {
    next: Duration,
    cap: Duration,
}

impl Backoff {
    pub fn new(start: Duration, cap: Duration) -> Self {
        Self { next: start, cap }
    }

    pub fn next_delay(&mut self) -> Duration {
        let nominal = self.next;
        self.next = (self.next * 2).min(self.cap);

        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        nominal.mul_f64(jitter)
    }
}
