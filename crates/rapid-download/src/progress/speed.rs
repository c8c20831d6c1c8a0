//! Exponentially-weighted transfer speed.

use std::time::Instant;

/// Smoothed bytes-per-second estimate over a monotonically growing byte count.
#[derive(Debug, Clone)]
pub struct SpeedMeter {
    smoothing: f64,
    speed: f64,
    last: Option<(u64, Instant)>,
    primed: bool,
}

impl SpeedMeter {
    /// Create a meter. `smoothing` is the weight of the newest sample.
    #[must_use]
    pub const fn new(smoothing: f64) -> Self {
        Self {
            smoothing,
            speed: 0.0,
            last: None,
            primed: false,
        }
    }

    /// Current estimate.
    #[must_use]
    pub const fn speed(&self) -> f64 {
        self.speed
    }

    /// Feed the total bytes transferred so far and return the new estimate.
    pub fn sample(&mut self, total: u64, now: Instant) -> f64 {
        let Some((last_bytes, last_time)) = self.last else {
            self.last = Some((total, now));
            return self.speed;
        };

        let elapsed = now.duration_since(last_time).as_secs_f64();
        if elapsed <= 0.0 {
            return self.speed;
        }

        let instant = total.saturating_sub(last_bytes) as f64 / elapsed;
        self.speed = if self.primed {
            self.smoothing
                .mul_add(instant, (1.0 - self.smoothing) * self.speed)
        } else {
            instant
        };
        self.primed = true;
        self.last = Some((total, now));
        self.speed
    }

    /// Forget history (on pause or restart).
    pub const fn reset(&mut self) {
        self.speed = 0.0;
        self.last = None;
        self.primed = false;
    }
}

/// Seconds remaining at `speed`, or `None` while the speed is zero.
#[must_use]
pub fn time_left(remaining: u64, speed: f64) -> Option<f64> {
    (speed > 0.0).then(|| remaining as f64 / speed)
}
