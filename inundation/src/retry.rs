use std::{thread, time::Duration};

/// Runs `op` up to `attempts` times with a fixed `delay` between
/// attempts, returning the first success or the last failure.
///
/// Intended for best-effort cleanup of resources another reader may
/// still hold transiently locked.
pub fn with_retries<T, E>(
    attempts: usize,
    delay: Duration,
    mut op: impl FnMut() -> Result<T, E>,
) -> Result<T, E> {
    let mut last = op();
    for _ in 1..attempts {
        if last.is_ok() {
            break;
        }
        thread::sleep(delay);
        last = op();
    }
    last
}
