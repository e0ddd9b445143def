//! Single-shot deferred timer on simulation time.
//!
//! [`DebounceTimer`] is the one cancellable deferred task in the build mode.
//! It is armed at some tick, may be cancelled and re-armed by later ticks, and
//! otherwise fires on its own once its delay has elapsed. Nothing ever waits on
//! it: the session polls it with the current simulation time at the start of
//! every tick.

/// A cancellable single-shot timer.
#[derive(Debug, Clone)]
pub struct DebounceTimer {
    /// Seconds between arming and firing.
    delay: f64,
    /// Simulation time at which the timer fires, if armed.
    deadline: Option<f64>,
}

impl DebounceTimer {
    /// A disarmed timer with the given delay in seconds.
    ///
    /// # Panics
    ///
    /// Panics if `delay` is negative or not finite.
    pub fn new(delay: f64) -> Self {
        assert!(
            delay >= 0.0 && delay.is_finite(),
            "debounce delay must be non-negative and finite, got {delay}"
        );
        Self {
            delay,
            deadline: None,
        }
    }

    /// Arm the timer to fire `delay` seconds after `now`. Re-arming an armed
    /// timer moves its deadline.
    pub fn arm(&mut self, now: f64) {
        self.deadline = Some(now + self.delay);
    }

    /// Cancel a pending firing. Returns whether the timer was armed.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Cancel and arm again from `now`.
    pub fn restart(&mut self, now: f64) {
        self.cancel();
        self.arm(now);
    }

    /// Fire if the deadline has passed. Returns `true` exactly once per
    /// arming.
    pub fn poll(&mut self, now: f64) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<f64> {
        self.deadline
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }
}
