//! Tick-based timeouts
//!
//! Every blocking call takes a timeout in scheduler ticks. `NO_WAIT` makes
//! the call a non-blocking try; `WAIT_FOREVER` blocks indefinitely.

use crate::arch;

/// Timeout / duration in scheduler ticks.
pub type Ticks = u32;

/// Non-blocking try.
pub const NO_WAIT: Ticks = 0;

/// Block until the operation completes.
pub const WAIT_FOREVER: Ticks = u32::MAX;

/// A point in time a looping wait must not run past.
///
/// Loop-shaped waits (condition variables, wait states, semaphore reservation)
/// retry internally; converting the caller's timeout into a deadline once
/// keeps the total blocking time bounded by that timeout, no matter how many
/// retries happen. Tick arithmetic is wrapping, so deadlines survive tick
/// counter rollover as long as the timeout fits in half the counter range.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Option<Ticks>,
}

impl Deadline {
    pub fn new(timeout: Ticks) -> Self {
        let expires_at = if timeout == WAIT_FOREVER {
            None
        } else {
            Some(arch::tick_count().wrapping_add(timeout))
        };
        Self { expires_at }
    }

    pub fn expired(&self) -> bool {
        match self.expires_at {
            None => false,
            Some(at) => (at.wrapping_sub(arch::tick_count()) as i32) <= 0,
        }
    }

    /// Ticks left until expiry; `WAIT_FOREVER` for unbounded deadlines,
    /// zero once expired.
    pub fn remaining(&self) -> Ticks {
        match self.expires_at {
            None => WAIT_FOREVER,
            Some(at) => {
                let left = at.wrapping_sub(arch::tick_count()) as i32;
                if left <= 0 {
                    0
                } else {
                    left as Ticks
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forever_never_expires() {
        let d = Deadline::new(WAIT_FOREVER);
        assert!(!d.expired());
        assert_eq!(d.remaining(), WAIT_FOREVER);
    }

    #[test]
    fn test_zero_timeout_expires_immediately() {
        let d = Deadline::new(NO_WAIT);
        assert!(d.expired());
        assert_eq!(d.remaining(), 0);
    }

    #[test]
    fn test_deadline_counts_down() {
        let d = Deadline::new(5000);
        assert!(!d.expired());
        assert!(d.remaining() <= 5000);
        assert!(d.remaining() > 4000);
    }
}
