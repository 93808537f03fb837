//! Bounded, fixed-interval connection retry.
//!
//! Startup connection establishment is a small state machine:
//!
//! ```text
//! Attempting(1) --fail--> Attempting(2) --fail--> ... --fail--> Exhausted
//!      |                        |
//!      +--ok--> Connected       +--ok--> Connected
//! ```
//!
//! The wait between attempts goes through a [`Sleeper`], so tests can drive
//! the machine to exhaustion without touching the wall clock.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ConnectError;

/// How many times to try, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ReconnectPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Fixed delay between consecutive attempts.
    pub interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interval: Duration::from_secs(2),
        }
    }
}

impl ReconnectPolicy {
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Clock used to wait between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Where a connection attempt sequence currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectState {
    /// About to make attempt number `attempt` (1-based).
    Attempting { attempt: u32 },
    /// Succeeded on attempt number `attempts`.
    Connected { attempts: u32 },
    /// Gave up after `attempts` failures.
    Exhausted { attempts: u32, last_error: String },
}

impl ConnectState {
    fn start() -> Self {
        ConnectState::Attempting { attempt: 1 }
    }

    /// Advance after one attempt finished with `outcome`.
    fn advance(self, outcome: Result<(), String>, policy: &ReconnectPolicy) -> Self {
        match self {
            ConnectState::Attempting { attempt } => match outcome {
                Ok(()) => ConnectState::Connected { attempts: attempt },
                Err(last_error) if attempt >= policy.attempts() => ConnectState::Exhausted {
                    attempts: attempt,
                    last_error,
                },
                Err(_) => ConnectState::Attempting {
                    attempt: attempt + 1,
                },
            },
            terminal => terminal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConnectState::Attempting { .. })
    }
}

/// Run `dial` until it succeeds or the policy is exhausted.
///
/// `dial` receives the 1-based attempt number. There is no wait after the
/// final failed attempt.
pub async fn connect_with_retry<T, E, F, Fut>(
    policy: &ReconnectPolicy,
    sleeper: &dyn Sleeper,
    mut dial: F,
) -> Result<T, ConnectError>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut state = ConnectState::start();
    let mut connection = None;

    while let ConnectState::Attempting { attempt } = state {
        let outcome = match dial(attempt).await {
            Ok(conn) => {
                connection = Some(conn);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    attempt,
                    max_attempts = policy.attempts(),
                    error = %err,
                    "Waiting for broker"
                );
                Err(err.to_string())
            }
        };

        state = state.advance(outcome, policy);
        if !state.is_terminal() {
            sleeper.sleep(policy.interval).await;
        }
    }

    match (state, connection) {
        (ConnectState::Connected { attempts }, Some(conn)) => {
            tracing::info!(attempts, "Connected to broker");
            Ok(conn)
        }
        (ConnectState::Exhausted { attempts, last_error }, _) => {
            Err(ConnectError::Exhausted { attempts, last_error })
        }
        (state, _) => Err(ConnectError::Exhausted {
            attempts: policy.attempts(),
            last_error: format!("connect loop ended in unexpected state {state:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        naps: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.naps.lock().unwrap().push(duration);
        }
    }

    fn policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy::default()
            .with_max_attempts(max_attempts)
            .with_interval(Duration::from_millis(250))
    }

    #[tokio::test]
    async fn connects_after_transient_failures() {
        let sleeper = RecordingSleeper::default();
        let result = connect_with_retry(&policy(5), &sleeper, |attempt| async move {
            if attempt < 3 {
                Err("connection refused")
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        let naps = sleeper.naps.lock().unwrap();
        assert_eq!(naps.as_slice(), &[Duration::from_millis(250); 2]);
    }

    #[tokio::test]
    async fn exhausts_without_sleeping_after_last_attempt() {
        let sleeper = RecordingSleeper::default();
        let result: Result<(), _> =
            connect_with_retry(&policy(5), &sleeper, |attempt| async move {
                Err(format!("refused #{attempt}"))
            })
            .await;

        match result {
            Err(ConnectError::Exhausted { attempts, last_error }) => {
                assert_eq!(attempts, 5);
                assert_eq!(last_error, "refused #5");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(sleeper.naps.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;
        let result: Result<(), _> = connect_with_retry(&policy(0), &sleeper, |_| {
            calls += 1;
            async { Err("down") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
        assert!(sleeper.naps.lock().unwrap().is_empty());
    }

    #[test]
    fn terminal_states_do_not_advance() {
        let p = policy(3);
        let connected = ConnectState::Connected { attempts: 1 };
        assert_eq!(connected.clone().advance(Err("x".into()), &p), connected);

        let state = ConnectState::start()
            .advance(Err("a".into()), &p)
            .advance(Err("b".into()), &p)
            .advance(Err("c".into()), &p);
        assert_eq!(
            state,
            ConnectState::Exhausted {
                attempts: 3,
                last_error: "c".into()
            }
        );
    }
}
