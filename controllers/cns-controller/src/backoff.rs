//! # Fibonacci Backoff
//!
//! Retry delays that grow along the Fibonacci sequence, capped at a maximum.
//! Used for cold-start retries in `main` and for requeueing failed
//! reconciles in the watch runner.
//!
//! The node agent sits on the pod startup path, so delays are in seconds:
//! with min 1 and max 30 the sequence is 1s, 1s, 2s, 3s, 5s, 8s, 13s, 21s, 30s.

use std::time::Duration;

/// Fibonacci backoff calculator
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    prev_seconds: u64,
    current_seconds: u64,
    max_seconds: u64,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min_seconds` and capped at `max_seconds`.
    #[must_use]
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            prev_seconds: 0,
            current_seconds: min_seconds,
            max_seconds,
        }
    }

    /// Return the current delay and advance the sequence.
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current_seconds;
        let next = self.prev_seconds + self.current_seconds;
        self.prev_seconds = self.current_seconds;
        self.current_seconds = std::cmp::min(next, self.max_seconds);
        Duration::from_secs(result)
    }

    /// Delay for the given number of consecutive errors (stateless).
    ///
    /// `error_count` is 0-indexed: counts 0 and 1 both yield `min_seconds`.
    #[must_use]
    pub fn delay_for_error_count(error_count: u32, min_seconds: u64, max_seconds: u64) -> Duration {
        let mut prev = min_seconds;
        let mut current = min_seconds;
        for _ in 2..=error_count {
            let next = prev + current;
            prev = current;
            current = std::cmp::min(next, max_seconds);
            if current >= max_seconds {
                break;
            }
        }
        Duration::from_secs(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(backoff: &mut FibonacciBackoff) -> u64 {
        backoff.next_backoff().as_secs()
    }

    #[test]
    fn test_fibonacci_backoff_sequence() {
        let mut backoff = FibonacciBackoff::new(1, 30);
        let sequence: Vec<u64> = (0..10).map(|_| secs(&mut backoff)).collect();
        assert_eq!(sequence, vec![1, 1, 2, 3, 5, 8, 13, 21, 30, 30]);
    }

    #[test]
    fn test_delay_for_error_count_matches_sequence() {
        let mut backoff = FibonacciBackoff::new(2, 60);
        for count in 0..12 {
            let expected = backoff.next_backoff();
            assert_eq!(FibonacciBackoff::delay_for_error_count(count, 2, 60), expected, "count {}", count);
        }
    }
}
