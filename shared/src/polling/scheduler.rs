use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Repeating timer owned by one polling session. Dropping it cancels the
/// timer synchronously; work already spawned by earlier ticks keeps running.
#[derive(Debug)]
pub(crate) struct SessionTimer {
    handle: JoinHandle<()>,
}

impl SessionTimer {
    /// Starts a local task that calls `on_tick` every `period`, first after
    /// one full period. Each returned future is spawned as its own local task;
    /// returning `None` stops the timer.
    ///
    /// Must be called from within a `LocalSet`.
    pub(crate) fn start<F, Fut>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Option<Fut> + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let handle = tokio::task::spawn_local(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match on_tick() {
                    Some(work) => {
                        tokio::task::spawn_local(work);
                    }
                    None => break,
                }
            }
        });
        Self { handle }
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
