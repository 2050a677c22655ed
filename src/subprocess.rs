//! Timeout-guarded external command execution.
//!
//! Runs the blocking `output()` call on a worker thread so a wedged query
//! command cannot stall the sampling loop indefinitely.

use std::process::Command;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{MonitorError, Result};

/// Runs `cmd args...` and returns its stdout as a lossy UTF-8 string.
///
/// Spawn failure, non-zero exit, and timeout all map to
/// [`MonitorError::QueryUnavailable`]: the caller cannot usefully
/// distinguish a missing binary from a dead driver and treats both the
/// same way.
pub fn run_with_timeout(cmd: &str, args: &[&str], timeout: Duration) -> Result<String> {
    let program = cmd.to_string();
    let args: Vec<String> = args.iter().map(|s| (*s).to_string()).collect();

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = Command::new(&program).args(&args).output();
        let _ = tx.send(result);
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(output)) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(Ok(output)) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(MonitorError::QueryUnavailable(format!(
                "{cmd} exited with {}: {}",
                output.status,
                stderr.trim()
            )))
        }
        Ok(Err(e)) => Err(MonitorError::QueryUnavailable(format!("{cmd}: {e}"))),
        // Worker is still blocked on the child; it cleans up on its own.
        Err(mpsc::RecvTimeoutError::Timeout) => Err(MonitorError::QueryUnavailable(format!(
            "{cmd} did not respond within {timeout:?}"
        ))),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(MonitorError::QueryUnavailable(
            format!("{cmd}: worker thread terminated unexpectedly"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_successful_command() {
        let out = run_with_timeout("echo", &["hello"], Duration::from_secs(1));
        assert_eq!(out.unwrap().trim(), "hello");
    }

    #[test]
    fn test_nonexistent_command_is_unavailable() {
        let out = run_with_timeout("this_command_does_not_exist_4821", &[], Duration::from_secs(1));
        assert!(matches!(out, Err(MonitorError::QueryUnavailable(_))));
    }

    #[test]
    fn test_nonzero_exit_is_unavailable() {
        let out = run_with_timeout("false", &[], Duration::from_secs(1));
        assert!(matches!(out, Err(MonitorError::QueryUnavailable(_))));
    }

    #[test]
    fn test_timeout_bounds_slow_command() {
        let start = Instant::now();
        let out = run_with_timeout("sleep", &["10"], Duration::from_millis(100));
        assert!(matches!(out, Err(MonitorError::QueryUnavailable(_))));
        assert!(
            start.elapsed() < Duration::from_secs(1),
            "should give up quickly, took {:?}",
            start.elapsed()
        );
    }
}
