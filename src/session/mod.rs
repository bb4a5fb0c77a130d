use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

use crate::{
    client::ControlPlane,
    constants::{
        DEFAULT_START_REPOLL_DELAY, DEFAULT_STATUS_POLL_INTERVAL, DEFAULT_STOP_REPOLL_DELAY,
    },
    error::{Error, Result},
    machinery::task::TaskSlot,
    resources::vm::{RunState, VmConfig},
};

#[derive(Debug, Clone)]
pub struct VmSessionConfig {
    pub status_poll_interval: Duration,
    pub start_repoll_delay: Duration,
    pub stop_repoll_delay: Duration,
}

impl Default for VmSessionConfig {
    fn default() -> Self {
        Self {
            status_poll_interval: DEFAULT_STATUS_POLL_INTERVAL,
            start_repoll_delay: DEFAULT_START_REPOLL_DELAY,
            stop_repoll_delay: DEFAULT_STOP_REPOLL_DELAY,
        }
    }
}

/// Last applied probe outcome and the sequence number of the probe that produced it.
#[derive(Debug, Clone, Copy)]
struct Observed {
    state: RunState,
    seq: u64,
}

/// Tracks the believed run-state of the VM and drives start/stop.
///
/// State only changes from status probes: the periodic poll cycle and the
/// single re-poll scheduled after a start or stop request. A probe that
/// completes after a later-issued one is discarded.
pub struct VmSession {
    control: Arc<dyn ControlPlane>,
    config: VmSessionConfig,
    probe_seq: AtomicU64,
    state: RwLock<Observed>,
    state_tx: broadcast::Sender<RunState>,
    draft: RwLock<VmConfig>,
    poll_task: TaskSlot,
    repoll_task: TaskSlot,
}

impl VmSession {
    pub fn new(control: Arc<dyn ControlPlane>, config: VmSessionConfig) -> Arc<Self> {
        let (state_tx, _) = broadcast::channel(16);

        Arc::new(Self {
            control,
            config,
            probe_seq: AtomicU64::new(0),
            state: RwLock::new(Observed {
                state: RunState::Unknown,
                seq: 0,
            }),
            state_tx,
            draft: RwLock::new(VmConfig::default()),
            poll_task: TaskSlot::new("vm status poll"),
            repoll_task: TaskSlot::new("vm status re-poll"),
        })
    }

    pub async fn state(&self) -> RunState {
        self.state.read().await.state
    }

    /// Receives every run-state transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RunState> {
        self.state_tx.subscribe()
    }

    /// Starts the periodic status poll; a no-op while it is already running.
    ///
    /// Also re-allows the post-request re-poll that [`VmSession::stop_polling`] shut off.
    pub async fn start_polling(self: &Arc<Self>) -> bool {
        self.repoll_task.reopen().await;

        let session = Arc::downgrade(self);
        self.poll_task
            .start_repeating(self.config.status_poll_interval, move || {
                let session = session.clone();
                async move {
                    if let Some(session) = session.upgrade() {
                        session.poll_once().await;
                    }
                }
            })
            .await
    }

    /// Cancels the poll cycle and any pending re-poll.
    ///
    /// After this returns no probe started by this session can change its state.
    /// A start or stop request still in flight schedules no re-poll until
    /// [`VmSession::start_polling`] is called again.
    pub async fn stop_polling(&self) {
        self.poll_task.cancel().await;
        self.repoll_task.close().await;
    }

    pub async fn is_polling(&self) -> bool {
        self.poll_task.is_active().await
    }

    /// Probes the control plane once and records the outcome.
    ///
    /// Returns what this probe observed, even when a newer probe has already
    /// been applied and this outcome is discarded.
    pub async fn poll_once(&self) -> RunState {
        let seq = self.probe_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let next = match self.control.get_status().await {
            Ok(status) => RunState::from_status(status),
            Err(e) => {
                debug!("status poll failed: {}", e);
                RunState::Unreachable
            }
        };
        self.set_state(next, seq).await;
        next
    }

    async fn set_state(&self, next: RunState, seq: u64) {
        let mut observed = self.state.write().await;
        if seq < observed.seq {
            debug!("discarding stale probe #{} ({:?})", seq, next);
            return;
        }

        observed.seq = seq;
        if observed.state == next {
            return;
        }

        info!("vm state {:?} -> {:?}", observed.state, next);
        observed.state = next;
        let _ = self.state_tx.send(next);
    }

    /// Replaces the working configuration with the server's defaults.
    ///
    /// On failure the working configuration is left untouched.
    pub async fn load_defaults(&self) -> Result<VmConfig> {
        let defaults = self.control.get_defaults().await.map_err(|e| {
            warn!("failed to load default settings: {}", e);
            Error::from(e)
        })?;
        *self.draft.write().await = defaults.clone();
        Ok(defaults)
    }

    pub async fn draft(&self) -> VmConfig {
        self.draft.read().await.clone()
    }

    /// Mutates the working configuration in place.
    pub async fn edit_draft<T>(
        &self,
        edit: impl FnOnce(&mut VmConfig) -> Result<T>,
    ) -> Result<T> {
        let mut draft = self.draft.write().await;
        let mut candidate = draft.clone();
        let result = edit(&mut candidate)?;
        *draft = candidate;
        Ok(result)
    }

    pub async fn can_start(&self) -> bool {
        self.state().await != RunState::Running
    }

    pub async fn can_stop(&self) -> bool {
        self.state().await != RunState::Stopped
    }

    /// Submits `config` and returns the server's message verbatim.
    ///
    /// Validation runs locally first; nothing is sent if it fails. A failed
    /// request leaves the run-state alone for the poll cycle to reconcile.
    pub async fn start(self: &Arc<Self>, config: &VmConfig) -> Result<String> {
        let config = config.normalized();
        config.validate()?;

        if !self.can_start().await {
            return Err(Error::precondition("VM is already running"));
        }

        info!(
            "starting vm ({} MB, {} cores, disk {})",
            config.ram_mb, config.cores, config.primary_disk_path
        );
        let reply = self.control.start_vm(&config).await?;
        self.schedule_repoll(self.config.start_repoll_delay).await;

        Ok(reply.message)
    }

    /// Starts the VM with the working configuration.
    pub async fn start_draft(self: &Arc<Self>) -> Result<String> {
        let draft = self.draft().await;
        self.start(&draft).await
    }

    /// Requests a stop. Allowed from any state except `Stopped`: the server decides.
    pub async fn stop(self: &Arc<Self>) -> Result<String> {
        if !self.can_stop().await {
            return Err(Error::precondition("VM is not running"));
        }

        info!("stopping vm");
        let reply = self.control.stop_vm().await?;
        self.schedule_repoll(self.config.stop_repoll_delay).await;

        Ok(reply.message)
    }

    /// Recent hypervisor log lines, for diagnostics only.
    pub async fn qemu_logs(&self) -> Result<Vec<String>> {
        Ok(self.control.get_qemu_logs().await?)
    }

    async fn schedule_repoll(self: &Arc<Self>, delay: Duration) {
        let session = Arc::downgrade(self);
        self.repoll_task
            .schedule_once(delay, async move {
                if let Some(session) = session.upgrade() {
                    session.poll_once().await;
                }
            })
            .await;
    }
}
