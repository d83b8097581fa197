//! Retry loop for primitives interrupted by a signal.

use gpibprims_binding::ErrorCode;
use tracing::trace;

/// Invoke `op` until it reports something other than an interrupted call.
///
/// There is no retry limit: instrument I/O either completes or times out in
/// the binding, so an interrupt is always followed by a fresh attempt.
pub fn retry_interrupted<T>(mut op: impl FnMut() -> Result<T, ErrorCode>) -> Result<T, ErrorCode> {
    let mut interrupts = 0u64;
    loop {
        match op() {
            Err(code) if code.is_interrupt() => {
                interrupts += 1;
                trace!(interrupts, "primitive interrupted, retrying");
                continue;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorbs_interrupts_until_success() {
        let mut calls = 0;
        let result = retry_interrupted(|| {
            calls += 1;
            if calls <= 5 {
                Err(ErrorCode::INTERRUPTED)
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result, Ok(6));
        assert_eq!(calls, 6);
    }

    #[test]
    fn other_failures_are_terminal() {
        let mut calls = 0;
        let result: Result<(), _> = retry_interrupted(|| {
            calls += 1;
            if calls == 1 {
                Err(ErrorCode::INTERRUPTED)
            } else {
                Err(ErrorCode::TIMEOUT)
            }
        });
        assert_eq!(result, Err(ErrorCode::TIMEOUT));
        assert_eq!(calls, 2);
    }

    #[test]
    fn success_is_not_repeated() {
        let mut calls = 0;
        let result = retry_interrupted(|| {
            calls += 1;
            Ok::<_, ErrorCode>("done")
        });
        assert_eq!(result, Ok("done"));
        assert_eq!(calls, 1);
    }
}
