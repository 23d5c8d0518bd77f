//! Bounded retry with linear backoff
//!
//! Used by the startup acquisition protocol: each attempt either
//! succeeds, fails transiently (retried after a delay) or fails
//! permanently (returned immediately).

use std::thread;
use std::time::{Duration, Instant};

/// Retry policy
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least 1)
    pub attempts: u32,

    /// Attempt `n` (1-based) is followed by a `n * backoff` delay
    pub backoff: Duration,

    /// No new attempt starts after this instant
    pub deadline: Option<Instant>,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Delay after a failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

/// What the operation tells the retry loop
#[derive(Debug)]
pub enum Backoff<E> {
    /// Worth another attempt
    Transient(E),

    /// Give up immediately
    Permanent(E),
}

/// Information passed to each attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number
    pub number: u32,

    /// No further attempt follows this one
    pub is_final: bool,
}

/// Why the retry loop gave up
#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed transiently; holds the last error
    Exhausted { attempts: u32, last: E },

    /// An attempt failed permanently
    Permanent(E),

    /// The deadline passed before an attempt could start
    TimedOut { attempts: u32 },
}

/// Run `op` until it succeeds, fails permanently, or the policy is spent
pub fn retry<T, E, F>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryError<E>>
where
    F: FnMut(Attempt) -> Result<T, Backoff<E>>,
{
    let mut number = 1;
    loop {
        if let Some(deadline) = policy.deadline {
            if Instant::now() >= deadline {
                return Err(RetryError::TimedOut {
                    attempts: number - 1,
                });
            }
        }

        let attempt = Attempt {
            number,
            is_final: number >= policy.attempts,
        };

        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(Backoff::Permanent(e)) => return Err(RetryError::Permanent(e)),
            Err(Backoff::Transient(e)) if attempt.is_final => {
                return Err(RetryError::Exhausted {
                    attempts: number,
                    last: e,
                })
            }
            Err(Backoff::Transient(_)) => {
                let mut delay = policy.delay_after(number);
                if let Some(deadline) = policy.deadline {
                    delay = delay.min(deadline.saturating_duration_since(Instant::now()));
                }
                tracing::debug!("Attempt {} failed, retrying in {:?}", number, delay);
                thread::sleep(delay);
                number += 1;
            }
        }
    }
}
