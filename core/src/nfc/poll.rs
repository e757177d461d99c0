//! Retrying an attempt until it settles or the time runs out.

use std::time::Duration;

/// Calls `attempt` until it succeeds, fails with an error other than `pending`, or `timeout`
/// has been spent sleeping between the attempts.
///
/// The first attempt is always made, even if `timeout` is zero.
pub(crate) fn retry<T, E>(
    timeout: Duration,
    interval: Duration,
    mut attempt: impl FnMut() -> Result<T, E>,
    pending: impl Fn(&E) -> bool,
    mut sleep: impl FnMut(Duration),
) -> Result<T, E> {
    let mut waited = Duration::ZERO;
    loop {
        match attempt() {
            Err(e) if pending(&e) && waited < timeout => {
                let pause = interval.min(timeout - waited);
                sleep(pause);
                waited += pause;
            }
            result => return result,
        }
    }
}
