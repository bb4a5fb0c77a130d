use std::{future::Future, time::Duration};

use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{MissedTickBehavior, interval, sleep},
};
use tracing::debug;

/// Owns at most one background task and cancels it deterministically.
///
/// Cancellation aborts the task and waits for it to unwind, so once
/// [`TaskSlot::cancel`] returns nothing the task started can still run.
/// A closed slot refuses new tasks until [`TaskSlot::reopen`].
pub struct TaskSlot {
    name: &'static str,
    task: Mutex<Slot>,
}

#[derive(Default)]
struct Slot {
    handle: Option<JoinHandle<()>>,
    closed: bool,
}

impl Slot {
    fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|t| !t.is_finished())
    }

    async fn cancel(&mut self, name: &str) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };

        handle.abort();
        let _ = handle.await;
        debug!("{} cancelled", name);
        true
    }
}

impl TaskSlot {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            task: Mutex::new(Slot::default()),
        }
    }

    /// Starts `tick` every `period`, first immediately.
    ///
    /// Returns `false` without scheduling anything if the slot is closed or
    /// already runs a task.
    pub async fn start_repeating<F, Fut>(&self, period: Duration, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.task.lock().await;
        if slot.closed {
            debug!("{} is closed", self.name);
            return false;
        }
        if slot.is_running() {
            debug!("{} already running", self.name);
            return false;
        }

        let name = self.name;
        slot.handle = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!("{} started (every {:?})", name, period);
            loop {
                ticker.tick().await;
                tick().await;
            }
        }));

        true
    }

    /// Runs `job` once after `delay`, replacing whatever the slot held.
    ///
    /// Returns `false` and drops `job` if the slot is closed.
    pub async fn schedule_once<Fut>(&self, delay: Duration, job: Fut) -> bool
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.task.lock().await;
        if slot.closed {
            debug!("{} is closed, dropping job", self.name);
            return false;
        }
        if let Some(previous) = slot.handle.take() {
            previous.abort();
        }

        slot.handle = Some(tokio::spawn(async move {
            sleep(delay).await;
            job.await;
        }));
        true
    }

    /// Aborts the task, if any, and waits until it is gone.
    pub async fn cancel(&self) -> bool {
        self.task.lock().await.cancel(self.name).await
    }

    /// Cancels like [`TaskSlot::cancel`] and refuses every later task.
    pub async fn close(&self) -> bool {
        let mut slot = self.task.lock().await;
        slot.closed = true;
        slot.cancel(self.name).await
    }

    pub async fn reopen(&self) {
        self.task.lock().await.closed = false;
    }

    pub async fn is_active(&self) -> bool {
        self.task.lock().await.is_running()
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().handle.take() {
            task.abort();
        }
    }
}
