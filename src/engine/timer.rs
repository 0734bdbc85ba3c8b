// src/engine/timer.rs

/// What a single tick did to the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Clock decremented and still above zero.
    Running(u32),
    /// Clock reached zero. Reported once per countdown.
    Expired,
    /// Nothing to do: the clock is stopped or the expiry was already reported.
    Idle,
}

/// Whole-second countdown. No pause support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
    expiry_reported: bool,
}

impl Countdown {
    pub fn new(seconds: u32) -> Self {
        Self {
            remaining: seconds,
            expiry_reported: false,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining > 0 {
                return TickOutcome::Running(self.remaining);
            }
        }

        if self.expiry_reported {
            TickOutcome::Idle
        } else {
            self.expiry_reported = true;
            TickOutcome::Expired
        }
    }
}
