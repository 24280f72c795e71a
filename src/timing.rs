use std::time::{Duration, Instant};

/// Runs `f` once and returns its result with the wall time it took.
pub fn time_one<R, F: FnOnce() -> R>(f: F) -> (R, Duration) {
    let now = Instant::now();

    let res = f();

    return (res, now.elapsed());
}

pub fn millis(d: Duration) -> f64 {
    return d.as_secs_f64() * 1e3;
}
