use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerKind {
    Idle,
    Timer,
}

/// Grants slots to background work. Each slot lets the queue process one item.
pub trait BackgroundRunner: Send + Sync {
    fn kind(&self) -> RunnerKind;
    fn next_slot(&self) -> BoxFuture<'_, ()>;
}

/// Host-side handle announcing idle windows to an [`IdleRunner`].
#[derive(Debug, Clone)]
pub struct IdleSignal {
    deadline: Arc<watch::Sender<Option<Instant>>>,
}

impl Default for IdleSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleSignal {
    pub fn new() -> Self {
        let (deadline, _) = watch::channel(None);
        Self {
            deadline: Arc::new(deadline),
        }
    }

    /// Opens an idle window lasting `budget` from now.
    pub fn notify_idle(&self, budget: Duration) {
        self.deadline.send_replace(Some(Instant::now() + budget));
    }

    pub fn notify_busy(&self) {
        self.deadline.send_replace(None);
    }

    pub fn runner(&self) -> IdleRunner {
        IdleRunner {
            deadline: self.deadline.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdleRunner {
    deadline: watch::Receiver<Option<Instant>>,
}

impl BackgroundRunner for IdleRunner {
    fn kind(&self) -> RunnerKind {
        RunnerKind::Idle
    }

    fn next_slot(&self) -> BoxFuture<'_, ()> {
        let mut deadline = self.deadline.clone();
        Box::pin(async move {
            loop {
                let open = deadline
                    .borrow_and_update()
                    .is_some_and(|until| until > Instant::now());
                if open {
                    return;
                }
                if deadline.changed().await.is_err() {
                    return;
                }
            }
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TimerRunner {
    throttle: Duration,
}

impl TimerRunner {
    pub fn new(throttle: Duration) -> Self {
        Self { throttle }
    }
}

impl BackgroundRunner for TimerRunner {
    fn kind(&self) -> RunnerKind {
        RunnerKind::Timer
    }

    fn next_slot(&self) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(self.throttle))
    }
}

/// Uses idle scheduling when the host can announce idle time, otherwise a throttled timer.
pub fn select_runner(idle: Option<&IdleSignal>, throttle: Duration) -> Arc<dyn BackgroundRunner> {
    match idle {
        Some(signal) => Arc::new(signal.runner()),
        None => Arc::new(TimerRunner::new(throttle)),
    }
}
