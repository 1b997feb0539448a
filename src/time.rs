use std::time::Duration;

/// Suspends the current task for `dur`.
///
/// Backed by `futures-timer`, so it works the same on either runtime.
pub(crate) async fn sleep(dur: Duration) {
    if dur > Duration::ZERO {
        futures_timer::Delay::new(dur).await;
    }
}

/// Polls `done` every `every` until it returns true.
pub(crate) async fn wait_until<F>(every: Duration, mut done: F)
where
    F: FnMut() -> bool,
{
    while !done() {
        futures_timer::Delay::new(every).await;
    }
}
