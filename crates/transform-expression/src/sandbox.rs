//! Wall-clock bound around interpretation.
//!
//! The job runs on a dedicated worker thread and the caller waits on a
//! channel with a timeout. No signals are involved, so the behavior is the
//! same on every platform. A worker that outlives the wait is detached; its
//! result is dropped with the channel and never reaches the caller.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::EvaluationError;

pub(crate) fn run_bounded<T, F>(timeout: Duration, job: F) -> Result<T, EvaluationError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, EvaluationError> + Send + 'static,
{
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    let (sender, receiver) = mpsc::sync_channel(1);
    let spawned = thread::Builder::new()
        .name("expression-eval".into())
        .spawn(move || {
            // the receiver is gone once the caller timed out
            let _ = sender.send(job());
        });
    if let Err(err) = spawned {
        warn!(error = %err, "failed to spawn evaluation worker");
        return Err(worker_failed("evaluation worker could not be started"));
    }
    match receiver.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(EvaluationError::Timeout { timeout_ms }),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(worker_failed("evaluation worker stopped unexpectedly"))
        }
    }
}

fn worker_failed(detail: &str) -> EvaluationError {
    EvaluationError::FunctionFailed {
        function: "evaluate".into(),
        detail: detail.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_the_job_result() {
        assert_eq!(run_bounded(Duration::from_secs(1), || Ok(7)), Ok(7));
        assert_eq!(
            run_bounded::<(), _>(Duration::from_secs(1), || Err(EvaluationError::DivisionByZero)),
            Err(EvaluationError::DivisionByZero)
        );
    }

    #[test]
    fn slow_job_times_out() {
        let result = run_bounded(Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(500));
            Ok(1)
        });
        assert_eq!(result, Err(EvaluationError::Timeout { timeout_ms: 20 }));
    }

    #[test]
    fn panicking_job_is_contained() {
        let result = run_bounded::<(), _>(Duration::from_secs(1), || panic!("boom"));
        assert!(matches!(result, Err(EvaluationError::FunctionFailed { .. })));
    }
}
