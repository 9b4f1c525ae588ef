use std::time::Duration;

use log::{debug, info, warn};

use crate::core::{error::IssuanceError, types::DownloadOutcome};

/// Fixed-interval polling bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

/// Source of the wait between download attempts.
pub trait PollClock {
    fn sleep(&self, duration: Duration);
}

/// Blocks the calling thread for real.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadClock;

impl PollClock for ThreadClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<C: PollClock + ?Sized> PollClock for &C {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Calls `attempt` until it yields something other than `Pending`.
///
/// After each pending attempt one interval is added to the accumulated wait
/// and the clock sleeps one interval; once the accumulated wait reaches
/// `max_wait` the loop ends with `TimedOut`. Errors from `attempt` end the
/// loop immediately. The returned outcome is never `Pending`.
pub fn poll_until_issued<F>(
    label: &str,
    policy: PollPolicy,
    clock: &dyn PollClock,
    mut attempt: F,
) -> Result<DownloadOutcome, IssuanceError>
where
    F: FnMut() -> Result<DownloadOutcome, IssuanceError>,
{
    let mut waited = Duration::ZERO;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        debug!("[poll] download attempt {attempts} for {label}");

        let (code, description) = match attempt()? {
            DownloadOutcome::Pending { code, description } => (code, description),
            done => {
                debug!("[poll] {label} finished after {attempts} attempt(s)");
                return Ok(done);
            }
        };

        waited += policy.interval;
        info!(
            "[poll] {label} still processing (code {code}{}); waited {}s / {}s",
            if description.is_empty() {
                String::new()
            } else {
                format!(": {description}")
            },
            waited.as_secs(),
            policy.max_wait.as_secs()
        );
        clock.sleep(policy.interval);

        if waited >= policy.max_wait {
            warn!(
                "[poll] {label} timed out after {}s ({attempts} attempts, last code {code})",
                waited.as_secs()
            );
            return Ok(DownloadOutcome::TimedOut {
                last_code: code,
                waited_secs: waited.as_secs(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::IssuedCertificate;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClock {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl PollClock for RecordingClock {
        fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn policy(interval: u64, max_wait: u64) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(interval),
            max_wait: Duration::from_secs(max_wait),
        }
    }

    fn pending(code: i64) -> Result<DownloadOutcome, IssuanceError> {
        Ok(DownloadOutcome::Pending {
            code,
            description: "pending".into(),
        })
    }

    #[test]
    fn returns_immediately_when_issued() {
        let clock = RecordingClock::default();
        let outcome = poll_until_issued("42", policy(10, 60), &clock, || {
            Ok(DownloadOutcome::Issued(IssuedCertificate { pem: "pem".into() }))
        })
        .unwrap();
        assert!(matches!(outcome, DownloadOutcome::Issued(_)));
        assert!(clock.sleeps.lock().unwrap().is_empty());
    }

    #[test]
    fn retries_until_issued() {
        let clock = RecordingClock::default();
        let mut calls = 0;
        let outcome = poll_until_issued("42", policy(10, 60), &clock, || {
            calls += 1;
            if calls < 3 {
                pending(0)
            } else {
                Ok(DownloadOutcome::Issued(IssuedCertificate { pem: "pem".into() }))
            }
        })
        .unwrap();
        assert!(matches!(outcome, DownloadOutcome::Issued(_)));
        assert_eq!(calls, 3);
        assert_eq!(
            *clock.sleeps.lock().unwrap(),
            vec![Duration::from_secs(10); 2]
        );
    }

    #[test]
    fn times_out_once_accumulated_wait_reaches_max() {
        let clock = RecordingClock::default();
        let mut calls = 0;
        let outcome = poll_until_issued("42", policy(10, 30), &clock, || {
            calls += 1;
            pending(-1400)
        })
        .unwrap();
        assert_eq!(
            outcome,
            DownloadOutcome::TimedOut {
                last_code: -1400,
                waited_secs: 30
            }
        );
        assert_eq!(calls, 3);
        assert_eq!(clock.sleeps.lock().unwrap().len(), 3);
    }

    #[test]
    fn uneven_interval_overshoots_max() {
        let clock = RecordingClock::default();
        let outcome = poll_until_issued("42", policy(7, 20), &clock, || pending(0)).unwrap();
        assert_eq!(
            outcome,
            DownloadOutcome::TimedOut {
                last_code: 0,
                waited_secs: 21
            }
        );
    }

    #[test]
    fn errors_stop_polling_without_sleeping() {
        let clock = RecordingClock::default();
        let mut calls = 0;
        let err = poll_until_issued("42", policy(10, 600), &clock, || {
            calls += 1;
            Err(IssuanceError::PermanentRejection {
                code: -1500,
                description: "rejected".into(),
            })
        })
        .unwrap_err();
        assert!(matches!(err, IssuanceError::PermanentRejection { .. }));
        assert_eq!(calls, 1);
        assert!(clock.sleeps.lock().unwrap().is_empty());
    }
}
