use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{ControlPlane, TransportResult};
use crate::{
    error::TransportError,
    resources::{
        terminal::TerminalLine,
        vm::{ServerMessage, VmConfig, VmStatus},
    },
};

/// In-process control plane that answers from scripted queues and counts calls.
pub struct ScriptedControlPlane {
    statuses: Mutex<VecDeque<TransportResult<VmStatus>>>,
    outputs: Mutex<VecDeque<TransportResult<Vec<TerminalLine>>>>,
    defaults: Mutex<TransportResult<VmConfig>>,
    start_reply: Mutex<TransportResult<ServerMessage>>,
    stop_reply: Mutex<TransportResult<ServerMessage>>,
    run_reply: Mutex<TransportResult<ServerMessage>>,
    run_gate: Mutex<Option<Arc<Notify>>>,
    start_gate: Mutex<Option<Arc<Notify>>>,
    status_gate: Mutex<Option<Arc<Notify>>>,
    commands: Mutex<Vec<String>>,
    pub status_calls: AtomicUsize,
    pub start_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    pub run_calls: AtomicUsize,
    pub output_calls: AtomicUsize,
}

fn reply(message: &str) -> TransportResult<ServerMessage> {
    Ok(ServerMessage {
        status: Some("success".to_string()),
        message: message.to_string(),
    })
}

impl ScriptedControlPlane {
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(VecDeque::new()),
            outputs: Mutex::new(VecDeque::new()),
            defaults: Mutex::new(Ok(VmConfig::default())),
            start_reply: Mutex::new(reply("VM started successfully")),
            stop_reply: Mutex::new(reply("VM stopped successfully")),
            run_reply: Mutex::new(Ok(ServerMessage {
                status: Some("processing".to_string()),
                message: "Command sent to terminal".to_string(),
            })),
            run_gate: Mutex::new(None),
            start_gate: Mutex::new(None),
            status_gate: Mutex::new(None),
            commands: Mutex::new(Vec::new()),
            status_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            run_calls: AtomicUsize::new(0),
            output_calls: AtomicUsize::new(0),
        }
    }

    /// Queues a status answer; the last queued answer repeats forever.
    pub fn push_status(&self, status: TransportResult<bool>) {
        self.statuses
            .lock()
            .unwrap()
            .push_back(status.map(|running| VmStatus { running }));
    }

    pub fn push_output(&self, output: TransportResult<Vec<TerminalLine>>) {
        self.outputs.lock().unwrap().push_back(output);
    }

    pub fn set_defaults(&self, defaults: TransportResult<VmConfig>) {
        *self.defaults.lock().unwrap() = defaults;
    }

    pub fn set_start_reply(&self, reply: TransportResult<ServerMessage>) {
        *self.start_reply.lock().unwrap() = reply;
    }

    pub fn set_run_reply(&self, reply: TransportResult<ServerMessage>) {
        *self.run_reply.lock().unwrap() = reply;
    }

    /// Makes `run_command` wait until the returned handle is notified.
    pub fn hold_commands(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.run_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Makes `start_vm` wait until the returned handle is notified.
    pub fn hold_starts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.start_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Holds only the next `get_status` call, after it has taken its answer.
    pub fn hold_next_status(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.status_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub fn offline() -> TransportError {
    TransportError::network("connection refused")
}

#[async_trait]
impl ControlPlane for ScriptedControlPlane {
    async fn get_status(&self) -> TransportResult<VmStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let answer = {
            let mut statuses = self.statuses.lock().unwrap();
            match statuses.len() {
                0 => Err(TransportError::network("no scripted status")),
                1 => statuses[0].clone(),
                _ => statuses.pop_front().unwrap_or_else(|| Err(offline())),
            }
        };

        let gate = self.status_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        answer
    }

    async fn get_defaults(&self) -> TransportResult<VmConfig> {
        self.defaults.lock().unwrap().clone()
    }

    async fn start_vm(&self, _config: &VmConfig) -> TransportResult<ServerMessage> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.start_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.start_reply.lock().unwrap().clone()
    }

    async fn stop_vm(&self) -> TransportResult<ServerMessage> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.stop_reply.lock().unwrap().clone()
    }

    async fn run_command(&self, command: &str) -> TransportResult<ServerMessage> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        self.commands.lock().unwrap().push(command.to_string());

        let gate = self.run_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.run_reply.lock().unwrap().clone()
    }

    async fn get_terminal_output(&self) -> TransportResult<Vec<TerminalLine>> {
        self.output_calls.fetch_add(1, Ordering::SeqCst);
        self.outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_qemu_logs(&self) -> TransportResult<Vec<String>> {
        Ok(vec!["No recent logs available".to_string()])
    }
}
