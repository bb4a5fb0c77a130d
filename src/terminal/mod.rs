//! Command submission and output retrieval over the stateless control-plane API.
//!
//! Output only ever reaches the log through the poll cycle. A successful
//! submission appends nothing by itself.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use futures_util::{
    FutureExt,
    future::{self, BoxFuture},
};
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info, warn};

use crate::{
    client::ControlPlane,
    error::{Error, Result},
    machinery::task::TaskSlot,
    resources::terminal::TerminalLine,
};

pub struct TerminalChannel {
    control: Arc<dyn ControlPlane>,
    poll_interval: Duration,
    log: RwLock<Vec<TerminalLine>>,
    // serializes fetch+append so lines land in delivery order
    poll_lock: Mutex<()>,
    submitting: Arc<AtomicBool>,
    line_tx: broadcast::Sender<TerminalLine>,
    poll_task: TaskSlot,
}

impl TerminalChannel {
    pub fn new(control: Arc<dyn ControlPlane>, poll_interval: Duration) -> Arc<Self> {
        let (line_tx, _) = broadcast::channel(256);

        Arc::new(Self {
            control,
            poll_interval,
            log: RwLock::new(Vec::new()),
            poll_lock: Mutex::new(()),
            submitting: Arc::new(AtomicBool::new(false)),
            line_tx,
            poll_task: TaskSlot::new("terminal output poll"),
        })
    }

    /// Sends `command` to the VM shell.
    ///
    /// Both rejections happen before this returns, so two calls in a row
    /// without awaiting the first yield one request and one [`Error::Busy`].
    /// The flag is released when the returned future completes or is dropped.
    pub fn submit(&self, command: &str) -> BoxFuture<'static, Result<String>> {
        let command = command.trim().to_string();
        if command.is_empty() {
            return future::ready(Err(Error::validation("Command must not be empty"))).boxed();
        }

        if self
            .submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("rejecting '{}': submission in flight", command);
            return future::ready(Err(Error::Busy)).boxed();
        }

        let release = scopeguard::guard(self.submitting.clone(), |submitting| {
            submitting.store(false, Ordering::SeqCst);
        });
        let control = self.control.clone();

        async move {
            let _release = release;
            info!("submitting command: {}", command);
            match control.run_command(&command).await {
                Ok(reply) => Ok(reply.message),
                Err(e) => {
                    warn!("failed to submit '{}': {}", command, e);
                    Err(Error::from(e))
                }
            }
        }
        .boxed()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    /// Fetches new output once and appends it in the order received.
    ///
    /// Transport failures are logged and reported as zero new lines.
    pub async fn poll_output_once(&self) -> usize {
        let _serial = self.poll_lock.lock().await;

        let lines = match self.control.get_terminal_output().await {
            Ok(lines) => lines,
            Err(e) => {
                debug!("terminal output poll failed: {}", e);
                return 0;
            }
        };

        let count = lines.len();
        let mut log = self.log.write().await;
        for line in lines {
            let _ = self.line_tx.send(line.clone());
            log.push(line);
        }
        count
    }

    pub async fn start_polling(self: &Arc<Self>) -> bool {
        let channel = Arc::downgrade(self);
        self.poll_task
            .start_repeating(self.poll_interval, move || {
                let channel = channel.clone();
                async move {
                    if let Some(channel) = channel.upgrade() {
                        channel.poll_output_once().await;
                    }
                }
            })
            .await
    }

    pub async fn stop_polling(&self) {
        self.poll_task.cancel().await;
    }

    pub async fn is_polling(&self) -> bool {
        self.poll_task.is_active().await
    }

    /// Empties the local log; the server is not told.
    pub async fn clear(&self) {
        self.log.write().await.clear();
    }

    pub async fn lines(&self) -> Vec<TerminalLine> {
        self.log.read().await.clone()
    }

    /// Receives every line appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TerminalLine> {
        self.line_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::sleep;

    use super::*;
    use crate::{
        client::scripted::{ScriptedControlPlane, offline},
        error::TransportError,
        resources::terminal::LineKind,
    };

    fn channel_with(control: Arc<ScriptedControlPlane>) -> Arc<TerminalChannel> {
        TerminalChannel::new(control, Duration::from_millis(1500))
    }

    #[tokio::test]
    async fn test_second_submit_is_busy() {
        let control = Arc::new(ScriptedControlPlane::new());
        let gate = control.hold_commands();
        let terminal = channel_with(control.clone());

        let first = terminal.submit("ls -la");
        let second = terminal.submit("ps aux");
        assert!(terminal.is_submitting());

        assert_eq!(second.await, Err(Error::Busy));

        let first = tokio::spawn(first);
        while ScriptedControlPlane::calls(&control.run_calls) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(terminal.submit("df -h").await, Err(Error::Busy));

        gate.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), "Command sent to terminal");

        assert_eq!(ScriptedControlPlane::calls(&control.run_calls), 1);
        assert_eq!(control.commands(), vec!["ls -la".to_string()]);
        assert!(!terminal.is_submitting());
    }

    #[tokio::test]
    async fn test_failed_submit_releases_flag() {
        let control = Arc::new(ScriptedControlPlane::new());
        control.set_run_reply(Err(TransportError::http(400, "No command provided")));
        let terminal = channel_with(control.clone());

        let err = terminal.submit("uname -a").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(!terminal.is_submitting());

        assert!(terminal.submit("uname -a").await.is_err());
        assert_eq!(ScriptedControlPlane::calls(&control.run_calls), 2);
    }

    #[tokio::test]
    async fn test_dropped_submit_releases_flag() {
        let control = Arc::new(ScriptedControlPlane::new());
        let terminal = channel_with(control.clone());

        drop(terminal.submit("ls"));
        assert!(!terminal.is_submitting());
        assert_eq!(ScriptedControlPlane::calls(&control.run_calls), 0);
    }

    #[tokio::test]
    async fn test_blank_command_is_rejected_locally() {
        let control = Arc::new(ScriptedControlPlane::new());
        let terminal = channel_with(control.clone());

        assert!(matches!(
            terminal.submit("   ").await,
            Err(Error::Validation(_))
        ));
        assert!(!terminal.is_submitting());
        assert_eq!(ScriptedControlPlane::calls(&control.run_calls), 0);
    }

    #[tokio::test]
    async fn test_clear_then_poll_keeps_server_order() {
        let control = Arc::new(ScriptedControlPlane::new());
        control.push_output(Ok(vec![TerminalLine::output("old")]));
        control.push_output(Ok(vec![
            TerminalLine::new(LineKind::Command, "$ ps aux"),
            TerminalLine::output("PID TTY"),
            TerminalLine::output("1 ?"),
        ]));
        let terminal = channel_with(control);

        assert_eq!(terminal.poll_output_once().await, 1);
        terminal.clear().await;
        assert!(terminal.lines().await.is_empty());

        assert_eq!(terminal.poll_output_once().await, 3);
        let texts: Vec<String> = terminal
            .lines()
            .await
            .into_iter()
            .map(|l| l.text)
            .collect();
        assert_eq!(texts, vec!["$ ps aux", "PID TTY", "1 ?"]);
    }

    #[tokio::test]
    async fn test_submit_then_output_arrives_by_polling() {
        let control = Arc::new(ScriptedControlPlane::new());
        control.push_output(Ok(vec![TerminalLine::new(LineKind::Info, "ready")]));
        control.push_output(Ok(vec![]));
        control.push_output(Ok(vec![TerminalLine::output("file1")]));
        let terminal = channel_with(control);

        terminal.poll_output_once().await;
        let before = terminal.lines().await;

        terminal.submit("ls -la").await.unwrap();
        assert!(!terminal.is_submitting());
        assert_eq!(terminal.lines().await, before);

        assert_eq!(terminal.poll_output_once().await, 0);
        assert!(!terminal.is_submitting());
        assert_eq!(terminal.poll_output_once().await, 1);

        let lines = terminal.lines().await;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], before[0]);
        assert_eq!(lines[1], TerminalLine::output("file1"));
    }

    #[tokio::test]
    async fn test_poll_failure_appends_nothing() {
        let control = Arc::new(ScriptedControlPlane::new());
        control.push_output(Err(offline()));
        let terminal = channel_with(control);

        assert_eq!(terminal.poll_output_once().await, 0);
        assert!(terminal.lines().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_cycle_feeds_subscribers() {
        let control = Arc::new(ScriptedControlPlane::new());
        control.push_output(Ok(vec![TerminalLine::output("a")]));
        control.push_output(Ok(vec![TerminalLine::output("b")]));
        let terminal = channel_with(control.clone());
        let mut rx = terminal.subscribe();

        assert!(terminal.start_polling().await);
        assert!(!terminal.start_polling().await);
        sleep(Duration::from_millis(1600)).await;

        assert_eq!(rx.recv().await.unwrap().text, "a");
        assert_eq!(rx.recv().await.unwrap().text, "b");

        terminal.stop_polling().await;
        let polls = ScriptedControlPlane::calls(&control.output_calls);
        sleep(Duration::from_secs(10)).await;
        assert_eq!(ScriptedControlPlane::calls(&control.output_calls), polls);
    }
}
